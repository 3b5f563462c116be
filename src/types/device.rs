use std::fmt;

use serde::{Deserialize, Serialize};

use super::{enum_set, wire_enum};

/// Registry-assigned device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub(crate) u32);

impl DeviceId {
    /// Wrap a raw id (as received from a client)
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Raw id value
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

wire_enum! {
    /// What a DPLL device drives
    pub enum DeviceClass: "device class" {
        /// Pulse-per-second generator
        Pps = 1 => "pps",
        /// Ethernet Equipment Clock (frequency generator)
        Eec = 2 => "eec",
    }
}

wire_enum! {
    /// Working mode of a DPLL, i.e. if and how it selects its source
    pub enum Mode: "mode" {
        /// Source can be selected only by an explicit request
        Forced = 1 => "forced",
        /// Highest priority valid source is selected by the device
        Automatic = 2 => "automatic",
        /// Device forced into holdover
        Holdover = 3 => "holdover",
        /// Device driven by the system clock
        Freerun = 4 => "freerun",
    }
}

wire_enum! {
    /// Synchronization state of a DPLL
    pub enum LockStatus: "lock status" {
        /// Not locked to any valid source
        Unlocked = 1 => "unlocked",
        /// Acquiring lock
        Calibrating = 2 => "calibrating",
        /// Locked to a valid signal, no holdover available
        Locked = 3 => "locked",
        /// Locked and holdover acquired
        LockedHoldoverAcquired = 4 => "locked-ho-acquired",
        /// Lost a valid lock, running on holdover
        Holdover = 5 => "holdover",
    }
}

enum_set! {
    /// Set of working modes a device supports
    pub struct ModeSet(Mode);
}

/// Caller-supplied hardware identity of a device
///
/// The triple (clock id, class, index) identifies one DPLL on one piece of
/// hardware; `parent` names the bus device that owns it and only feeds the
/// generated name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceIdentity {
    /// Hardware cookie, usually derived from a MAC/EUI-64
    pub clock_id: u64,
    /// Device class
    pub class: DeviceClass,
    /// Index of this DPLL on its parent
    pub index: u32,
    /// Name of the owning bus device
    pub parent: String,
}

impl DeviceIdentity {
    /// Create an identity
    #[must_use]
    pub fn new(clock_id: u64, class: DeviceClass, index: u32, parent: impl Into<String>) -> Self {
        Self {
            clock_id,
            class,
            index,
            parent: parent.into(),
        }
    }

    /// Stable device name derived from the identity
    #[must_use]
    pub fn device_name(&self) -> String {
        format!(
            "dpll_{}_{}_{}",
            self.parent,
            self.class.as_u32(),
            self.index
        )
    }
}

/// Immutable description of a device, handed to callbacks and lookups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Registry id
    pub id: DeviceId,
    /// Stable name
    pub name: String,
    /// Hardware identity
    pub identity: DeviceIdentity,
}

impl DeviceInfo {
    /// Device class
    #[must_use]
    pub fn class(&self) -> DeviceClass {
        self.identity.class
    }
}
