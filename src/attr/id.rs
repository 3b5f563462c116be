use std::fmt;

/// Attribute identifiers shared by the attribute records and protocol messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum AttrId {
    /// Device id
    DeviceId = 1,
    /// Device name
    DeviceName = 2,
    /// Device class
    DeviceClass = 3,
    /// Hardware clock id
    ClockId = 4,
    /// Working mode
    Mode = 5,
    /// One supported working mode (repeated)
    ModeSupported = 6,
    /// Lock status
    LockStatus = 7,
    /// Temperature in milli-degrees C
    Temp = 8,
    /// Index of the selected source pin
    SourcePinIdx = 9,
    /// Dump filter bits
    DumpFilter = 10,
    /// Nested pin entry
    Pin = 11,
    /// Pin index
    PinIdx = 12,
    /// Pin label
    PinLabel = 13,
    /// Pin type
    PinType = 14,
    /// Index of the mux parent pin
    PinParentIdx = 15,
    /// Pin signal type
    PinSignalType = 16,
    /// One supported signal type (repeated)
    PinSignalTypeSupported = 17,
    /// Custom frequency in Hz
    PinCustomFreq = 18,
    /// One asserted pin state (repeated)
    PinState = 19,
    /// One supported pin state (repeated)
    PinStateSupported = 20,
    /// Pin priority
    PinPrio = 21,
    /// Network interface index
    PinNetifindex = 22,
    /// Pin direction
    PinDirection = 23,
    /// Recovered-clock device description
    PinRclkDevice = 24,
    /// Kind of membership change carried by a change event
    ChangeType = 25,
}

impl AttrId {
    /// Every id, in wire order
    pub const ALL: &'static [AttrId] = &[
        AttrId::DeviceId,
        AttrId::DeviceName,
        AttrId::DeviceClass,
        AttrId::ClockId,
        AttrId::Mode,
        AttrId::ModeSupported,
        AttrId::LockStatus,
        AttrId::Temp,
        AttrId::SourcePinIdx,
        AttrId::DumpFilter,
        AttrId::Pin,
        AttrId::PinIdx,
        AttrId::PinLabel,
        AttrId::PinType,
        AttrId::PinParentIdx,
        AttrId::PinSignalType,
        AttrId::PinSignalTypeSupported,
        AttrId::PinCustomFreq,
        AttrId::PinState,
        AttrId::PinStateSupported,
        AttrId::PinPrio,
        AttrId::PinNetifindex,
        AttrId::PinDirection,
        AttrId::PinRclkDevice,
        AttrId::ChangeType,
    ];

    /// Look up a numeric id; unknown values yield `None`
    #[must_use]
    pub fn from_raw(raw: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_u16() == raw)
    }

    /// Look up an id by its [`as_str`](Self::as_str) name
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.as_str() == name)
    }

    /// Wire value
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Human readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            AttrId::DeviceId => "device-id",
            AttrId::DeviceName => "device-name",
            AttrId::DeviceClass => "device-class",
            AttrId::ClockId => "clock-id",
            AttrId::Mode => "mode",
            AttrId::ModeSupported => "mode-supported",
            AttrId::LockStatus => "lock-status",
            AttrId::Temp => "temp",
            AttrId::SourcePinIdx => "source-pin-idx",
            AttrId::DumpFilter => "dump-filter",
            AttrId::Pin => "pin",
            AttrId::PinIdx => "pin-idx",
            AttrId::PinLabel => "pin-label",
            AttrId::PinType => "pin-type",
            AttrId::PinParentIdx => "pin-parent-idx",
            AttrId::PinSignalType => "pin-signal-type",
            AttrId::PinSignalTypeSupported => "pin-signal-type-supported",
            AttrId::PinCustomFreq => "pin-custom-freq",
            AttrId::PinState => "pin-state",
            AttrId::PinStateSupported => "pin-state-supported",
            AttrId::PinPrio => "pin-prio",
            AttrId::PinNetifindex => "pin-netifindex",
            AttrId::PinDirection => "pin-direction",
            AttrId::PinRclkDevice => "pin-rclk-device",
            AttrId::ChangeType => "change-type",
        }
    }
}

impl fmt::Display for AttrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validity bitmask, one bit per [`AttrId`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttrMask(u32);

impl AttrMask {
    /// No attribute valid
    pub const EMPTY: Self = Self(0);

    /// Mark an attribute valid
    pub fn insert(&mut self, id: AttrId) {
        self.0 |= 1 << id.as_u16();
    }

    /// Mark an attribute invalid
    pub fn remove(&mut self, id: AttrId) {
        self.0 &= !(1 << id.as_u16());
    }

    /// Check one attribute
    #[must_use]
    pub fn contains(self, id: AttrId) -> bool {
        self.0 & (1 << id.as_u16()) != 0
    }

    /// True if no attribute is valid
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bits
    #[must_use]
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Valid ids in wire order
    pub fn iter(self) -> impl Iterator<Item = AttrId> {
        AttrId::ALL.iter().copied().filter(move |id| self.contains(*id))
    }
}
