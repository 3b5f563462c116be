//! Logical protocol messages and their size accounting
//!
//! The transport byte format is out of scope, but message size is not: each
//! message is charged a fixed header plus, per attribute, a 4-byte attribute
//! header and its payload padded to a 4-byte boundary. Writers refuse to grow
//! a message past the configured limit.

use crate::attr::AttrId;
use crate::error::{DpllError, Result};
use crate::types::wire_enum;

/// Bytes charged per message for transport and family headers
pub const MESSAGE_HEADER_LEN: usize = 20;

/// Bytes charged per attribute before its payload
pub const ATTR_HEADER_LEN: usize = 4;

const fn align4(len: usize) -> usize {
    (len + 3) & !3
}

wire_enum! {
    /// Protocol commands; the last three only appear as events
    pub enum Command: "command" {
        /// Query one device, or dump all of them
        DeviceGet = 1 => "device-get",
        /// Change device mode or selected source
        DeviceSet = 2 => "device-set",
        /// Change pin configuration on a device
        PinSet = 3 => "pin-set",
        /// A device became visible
        DeviceCreate = 4 => "device-create",
        /// A device was hidden
        DeviceDelete = 5 => "device-delete",
        /// Device or pin state changed
        DeviceChange = 6 => "device-change",
    }
}

impl Command {
    /// Whether this command is only ever sent as a notification
    #[must_use]
    pub fn is_event(self) -> bool {
        matches!(
            self,
            Command::DeviceCreate | Command::DeviceDelete | Command::DeviceChange
        )
    }
}

/// Value carried by an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    /// Unsigned byte
    U8(u8),
    /// Unsigned 32-bit
    U32(u32),
    /// Signed 32-bit
    S32(i32),
    /// Unsigned 64-bit
    U64(u64),
    /// NUL-terminated string
    Str(String),
    /// Nested attribute list
    Nested(Vec<Attribute>),
}

impl AttrValue {
    /// Payload length before padding
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            AttrValue::U8(_) => 1,
            AttrValue::U32(_) | AttrValue::S32(_) => 4,
            AttrValue::U64(_) => 8,
            AttrValue::Str(s) => s.len() + 1,
            AttrValue::Nested(attrs) => attrs.iter().map(Attribute::size).sum(),
        }
    }
}

/// One attribute: numeric id plus value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Raw attribute id; ids unknown to this crate are carried through
    pub id: u16,
    /// Value
    pub value: AttrValue,
}

impl Attribute {
    /// Create an attribute with a known id
    #[must_use]
    pub fn new(id: AttrId, value: AttrValue) -> Self {
        Self {
            id: id.as_u16(),
            value,
        }
    }

    /// `u32` attribute
    #[must_use]
    pub fn u32(id: AttrId, value: u32) -> Self {
        Self::new(id, AttrValue::U32(value))
    }

    /// `i32` attribute
    #[must_use]
    pub fn s32(id: AttrId, value: i32) -> Self {
        Self::new(id, AttrValue::S32(value))
    }

    /// `u64` attribute
    #[must_use]
    pub fn u64(id: AttrId, value: u64) -> Self {
        Self::new(id, AttrValue::U64(value))
    }

    /// String attribute
    #[must_use]
    pub fn string(id: AttrId, value: impl Into<String>) -> Self {
        Self::new(id, AttrValue::Str(value.into()))
    }

    /// Nested attribute
    #[must_use]
    pub fn nested(id: AttrId, attrs: Vec<Attribute>) -> Self {
        Self::new(id, AttrValue::Nested(attrs))
    }

    /// Known id, if any
    #[must_use]
    pub fn attr_id(&self) -> Option<AttrId> {
        AttrId::from_raw(self.id)
    }

    /// Accounted size: header plus padded payload
    #[must_use]
    pub fn size(&self) -> usize {
        ATTR_HEADER_LEN + align4(self.value.payload_len())
    }

    /// Value as `u32`, if it is one
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        match self.value {
            AttrValue::U32(v) => Some(v),
            _ => None,
        }
    }

    /// Value as `i32`, if it is one
    #[must_use]
    pub fn as_s32(&self) -> Option<i32> {
        match self.value {
            AttrValue::S32(v) => Some(v),
            _ => None,
        }
    }

    /// Value as `u64`, if it is one
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            AttrValue::U64(v) => Some(v),
            _ => None,
        }
    }

    /// Value as a string, if it is one
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            AttrValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Nested attributes, if this is a nest
    #[must_use]
    pub fn as_nested(&self) -> Option<&[Attribute]> {
        match &self.value {
            AttrValue::Nested(attrs) => Some(attrs),
            _ => None,
        }
    }
}

/// A logical protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Command
    pub command: Command,
    /// Attributes in emission order
    pub attrs: Vec<Attribute>,
}

impl Message {
    /// Empty message
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            command,
            attrs: Vec::new(),
        }
    }

    /// Builder-style attribute append (no size check)
    #[must_use]
    pub fn with(mut self, attr: Attribute) -> Self {
        self.attrs.push(attr);
        self
    }

    /// Accounted size of the whole message
    #[must_use]
    pub fn size(&self) -> usize {
        MESSAGE_HEADER_LEN + self.attrs.iter().map(Attribute::size).sum::<usize>()
    }

    /// First attribute with `id`
    #[must_use]
    pub fn find(&self, id: AttrId) -> Option<&Attribute> {
        self.attrs.iter().find(|a| a.id == id.as_u16())
    }

    /// Every attribute with `id`
    pub fn find_all(&self, id: AttrId) -> impl Iterator<Item = &Attribute> {
        self.attrs.iter().filter(move |a| a.id == id.as_u16())
    }

    /// Shorthand for a `u32` attribute's value
    #[must_use]
    pub fn get_u32(&self, id: AttrId) -> Option<u32> {
        self.find(id).and_then(Attribute::as_u32)
    }
}

/// Builds a message while enforcing the size limit
#[derive(Debug)]
pub struct MessageWriter {
    message: Message,
    size: usize,
    limit: usize,
}

impl MessageWriter {
    /// Start a message
    #[must_use]
    pub fn new(command: Command, limit: usize) -> Self {
        Self {
            message: Message::new(command),
            size: MESSAGE_HEADER_LEN,
            limit,
        }
    }

    /// Current accounted size
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Append one attribute
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::MessageTooLarge`] if the attribute does not fit;
    /// the message is left unchanged.
    pub fn put(&mut self, attr: Attribute) -> Result<()> {
        let size = self.size + attr.size();
        if size > self.limit {
            return Err(DpllError::MessageTooLarge {
                size,
                limit: self.limit,
            });
        }
        self.size = size;
        self.message.attrs.push(attr);
        Ok(())
    }

    /// Append several attributes
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::MessageTooLarge`] at the first attribute that does
    /// not fit.
    pub fn put_all(&mut self, attrs: impl IntoIterator<Item = Attribute>) -> Result<()> {
        for attr in attrs {
            self.put(attr)?;
        }
        Ok(())
    }

    /// Finish the message
    #[must_use]
    pub fn finish(self) -> Message {
        self.message
    }
}
