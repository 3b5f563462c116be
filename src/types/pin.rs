use std::fmt;

use serde::{Deserialize, Serialize};

use super::{enum_set, wire_enum};

/// Highest pin priority
pub const PIN_PRIO_HIGHEST: u32 = 0;
/// Lowest pin priority
pub const PIN_PRIO_LOWEST: u32 = 0xff;

/// Registry-assigned pin identifier
///
/// The same number is the pin's index on every device it is registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId(pub(crate) u32);

impl PinId {
    /// Wrap a raw index (as received from a client)
    #[must_use]
    pub const fn from_raw(idx: u32) -> Self {
        Self(idx)
    }

    /// Raw index value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

wire_enum! {
    /// Kind of a pin
    pub enum PinType: "pin type" {
        /// Aggregates another layer of selectable pins
        Mux = 1 => "mux",
        /// External reference
        External = 2 => "ext",
        /// Ethernet port PHY's recovered clock
        SynceEthPort = 3 => "synce-eth-port",
        /// Device internal oscillator
        IntOscillator = 4 => "int-oscillator",
        /// GNSS recovered clock
        Gnss = 5 => "gnss",
    }
}

wire_enum! {
    /// Signal carried by a pin
    pub enum SignalType: "signal type" {
        /// Fixed 1 pulse per second
        OnePps = 1 => "1-pps",
        /// Fixed 10 MHz
        TenMhz = 2 => "10-mhz",
        /// Custom frequency, see the pin's frequency field
        CustomFreq = 3 => "custom-freq",
    }
}

wire_enum! {
    /// Whether a pin feeds or is fed by the DPLL
    pub enum PinDirection: "pin direction" {
        /// Pin is a source of a signal
        Source = 1 => "source",
        /// Pin outputs the signal
        Output = 2 => "output",
    }
}

wire_enum! {
    /// A single pin state bit
    pub enum PinState: "pin state" {
        /// Connected, active source of the loop
        Connected = 1 => "connected",
        /// Disconnected, not considered a valid source
        Disconnected = 2 => "disconnected",
        /// Enabled for automatic source selection
        Selectable = 3 => "selectable",
        /// Acting as a source
        Source = 4 => "source",
        /// Acting as an output
        Output = 5 => "output",
    }
}

enum_set! {
    /// Set of pin states; connected and disconnected never coexist in a record
    pub struct PinStateSet(PinState);
}

enum_set! {
    /// Set of signal types
    pub struct SignalTypeSet(SignalType);
}

/// What a pin registration allows to be reconfigured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PinCaps(u32);

impl PinCaps {
    /// Nothing can change
    pub const NONE: Self = Self(0);
    /// Direction can change
    pub const DIRECTION_CAN_CHANGE: Self = Self(1);
    /// Priority can change
    pub const PRIORITY_CAN_CHANGE: Self = Self(1 << 1);
    /// State can change (this includes selecting the pin as source)
    pub const STATE_CAN_CHANGE: Self = Self(1 << 2);
    /// Signal type can change
    pub const SIGNAL_TYPE_CAN_CHANGE: Self = Self(1 << 3);
    /// Custom frequency can change
    pub const FREQUENCY_CAN_CHANGE: Self = Self(1 << 4);
    /// Everything can change
    pub const ALL: Self = Self(0x1f);

    /// Check whether all capabilities in `other` are present
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

impl std::ops::BitOr for PinCaps {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Properties a driver supplies when allocating a pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinProperties {
    /// Human readable label, unique per device
    pub label: String,
    /// Pin kind
    pub kind: PinType,
    /// Description of the recovered-clock source device, if any
    pub rclk_device: Option<String>,
}

impl PinProperties {
    /// Properties with no recovered-clock device
    #[must_use]
    pub fn new(label: impl Into<String>, kind: PinType) -> Self {
        Self {
            label: label.into(),
            kind,
            rclk_device: None,
        }
    }

    /// Attach a recovered-clock device description
    #[must_use]
    pub fn with_rclk_device(mut self, device: impl Into<String>) -> Self {
        self.rclk_device = Some(device.into());
        self
    }
}

/// Immutable description of a pin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinInfo {
    /// Registry id, also the pin index
    pub id: PinId,
    /// Label
    pub label: String,
    /// Kind
    pub kind: PinType,
    /// Recovered-clock device description
    pub rclk_device: Option<String>,
}
