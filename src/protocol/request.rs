//! Request parsing
//!
//! Unknown attribute ids are skipped; known ids with the wrong value kind
//! or an out-of-range value fail with an argument error naming the attribute.

use super::message::{Attribute, Command, Message};
use crate::attr::AttrId;
use crate::error::{DpllError, Result};
use crate::types::{Mode, PinId, PinState, SignalType};

/// Which sections a device reply carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DumpFilter(u32);

impl DumpFilter {
    /// Device status fields
    pub const STATUS: Self = Self(1);
    /// Nested pin entries
    pub const PINS: Self = Self(1 << 1);
    /// Everything
    pub const ALL: Self = Self(0b11);

    /// Filter from wire bits; unknown bits are ignored and zero means all
    #[must_use]
    pub fn from_bits(bits: u32) -> Self {
        match bits & Self::ALL.0 {
            0 => Self::ALL,
            known => Self(known),
        }
    }

    /// Whether every bit of `other` is set
    #[must_use]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Raw bits
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }
}

impl Default for DumpFilter {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for DumpFilter {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// How a request names its device
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSelector {
    /// Device id attribute, if present
    pub id: Option<u32>,
    /// Device name attribute, if present
    pub name: Option<String>,
}

impl DeviceSelector {
    /// Neither id nor name given
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none()
    }
}

/// Device fields a client may change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceSetRequest {
    /// New working mode
    pub mode: Option<Mode>,
    /// Pin to select as source
    pub source_pin_idx: Option<u32>,
}

impl DeviceSetRequest {
    /// Nothing requested
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.source_pin_idx.is_none()
    }
}

/// Pin fields a client may change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PinSetRequest {
    /// New signal type
    pub signal_type: Option<SignalType>,
    /// New custom frequency in Hz
    pub custom_freq: Option<u32>,
    /// State to assert
    pub state: Option<PinState>,
    /// New priority
    pub prio: Option<u32>,
}

impl PinSetRequest {
    /// Nothing requested
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signal_type.is_none()
            && self.custom_freq.is_none()
            && self.state.is_none()
            && self.prio.is_none()
    }
}

/// A parsed client request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Query one device, or every device when the selector is empty
    DeviceGet {
        /// Device selector
        selector: DeviceSelector,
        /// Reply sections
        filter: DumpFilter,
    },
    /// Change device fields
    DeviceSet {
        /// Device selector
        selector: DeviceSelector,
        /// Requested changes
        set: DeviceSetRequest,
    },
    /// Change pin fields on one device
    PinSet {
        /// Device selector
        selector: DeviceSelector,
        /// Pin index
        pin: PinId,
        /// Requested changes
        set: PinSetRequest,
    },
}

impl Request {
    /// Parse a client message
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] for notification commands,
    /// malformed attributes, or a set request that changes nothing.
    pub fn parse(message: &Message) -> Result<Self> {
        let selector = selector(message)?;
        match message.command {
            Command::DeviceGet => {
                let filter = match message.find(AttrId::DumpFilter) {
                    Some(attr) => DumpFilter::from_bits(u32_value(attr, AttrId::DumpFilter)?),
                    None => DumpFilter::ALL,
                };
                Ok(Request::DeviceGet { selector, filter })
            }
            Command::DeviceSet => {
                let mut set = DeviceSetRequest::default();
                for attr in &message.attrs {
                    match attr.attr_id() {
                        Some(AttrId::Mode) => {
                            set.mode = Some(enum_value(attr, AttrId::Mode)?);
                        }
                        Some(AttrId::SourcePinIdx) => {
                            set.source_pin_idx = Some(u32_value(attr, AttrId::SourcePinIdx)?);
                        }
                        _ => {}
                    }
                }
                if set.is_empty() {
                    return Err(DpllError::invalid("request", "nothing to set"));
                }
                Ok(Request::DeviceSet { selector, set })
            }
            Command::PinSet => {
                let pin = message
                    .find(AttrId::PinIdx)
                    .ok_or(DpllError::NotSet {
                        attr: AttrId::PinIdx,
                    })
                    .and_then(|attr| u32_value(attr, AttrId::PinIdx))
                    .map(PinId::from_raw)?;
                let mut set = PinSetRequest::default();
                for attr in &message.attrs {
                    match attr.attr_id() {
                        Some(AttrId::PinSignalType) => {
                            set.signal_type = Some(enum_value(attr, AttrId::PinSignalType)?);
                        }
                        Some(AttrId::PinCustomFreq) => {
                            set.custom_freq = Some(u32_value(attr, AttrId::PinCustomFreq)?);
                        }
                        Some(AttrId::PinState) => {
                            set.state = Some(enum_value(attr, AttrId::PinState)?);
                        }
                        Some(AttrId::PinPrio) => {
                            set.prio = Some(u32_value(attr, AttrId::PinPrio)?);
                        }
                        _ => {}
                    }
                }
                if set.is_empty() {
                    return Err(DpllError::invalid("request", "nothing to set"));
                }
                Ok(Request::PinSet { selector, pin, set })
            }
            other => Err(DpllError::invalid(
                "command",
                format!("{other} is a notification"),
            )),
        }
    }

    /// Device selector of any request
    #[must_use]
    pub fn selector(&self) -> &DeviceSelector {
        match self {
            Request::DeviceGet { selector, .. }
            | Request::DeviceSet { selector, .. }
            | Request::PinSet { selector, .. } => selector,
        }
    }
}

fn selector(message: &Message) -> Result<DeviceSelector> {
    let id = message
        .find(AttrId::DeviceId)
        .map(|attr| u32_value(attr, AttrId::DeviceId))
        .transpose()?;
    let name = message
        .find(AttrId::DeviceName)
        .map(|attr| {
            attr.as_str().map(str::to_string).ok_or_else(|| {
                DpllError::invalid(AttrId::DeviceName.as_str(), "expected a string")
            })
        })
        .transpose()?;
    Ok(DeviceSelector { id, name })
}

fn u32_value(attr: &Attribute, id: AttrId) -> Result<u32> {
    attr.as_u32()
        .ok_or_else(|| DpllError::invalid(id.as_str(), "expected a u32"))
}

fn enum_value<T>(attr: &Attribute, id: AttrId) -> Result<T>
where
    T: TryFrom<u32, Error = DpllError>,
{
    let raw = u32_value(attr, id)?;
    T::try_from(raw).map_err(|_| DpllError::invalid(id.as_str(), format!("value {raw} out of range")))
}
