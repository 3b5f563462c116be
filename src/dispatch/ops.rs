use async_trait::async_trait;

use super::OwnerCtx;
use crate::error::{DpllError, Result};
use crate::types::{
    DeviceInfo, LockStatus, Mode, PinCaps, PinDirection, PinId, PinInfo, PinState, PinStateSet,
    SignalType,
};

/// Identity of the (device, pin) pair a pin callback is invoked for
#[derive(Debug, Clone, Copy)]
pub struct PinCall<'a> {
    /// Device the registration belongs to
    pub device: &'a DeviceInfo,
    /// Pin being operated on
    pub pin: &'a PinInfo,
    /// Mux parent the pin was registered through, if any
    pub parent: Option<PinId>,
}

/// Device callbacks a vendor driver provides
///
/// Every method defaults to [`DpllError::NotSupported`]; drivers override the
/// ones their hardware implements. Callbacks run with the device lock held and
/// must not call back into the registry.
#[async_trait]
pub trait DeviceOps: Send + Sync {
    /// Current working mode
    async fn mode_get(&self, _device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<Mode> {
        Err(DpllError::NotSupported { op: "mode_get" })
    }

    /// Switch the working mode
    async fn mode_set(&self, _device: &DeviceInfo, _ctx: &OwnerCtx, _mode: Mode) -> Result<()> {
        Err(DpllError::NotSupported { op: "mode_set" })
    }

    /// Whether `mode` can be selected
    async fn mode_supported(
        &self,
        _device: &DeviceInfo,
        _ctx: &OwnerCtx,
        _mode: Mode,
    ) -> Result<bool> {
        Err(DpllError::NotSupported {
            op: "mode_supported",
        })
    }

    /// Current lock status
    async fn lock_status_get(&self, _device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<LockStatus> {
        Err(DpllError::NotSupported {
            op: "lock_status_get",
        })
    }

    /// Temperature in milli-degrees C
    async fn temp_get(&self, _device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<i32> {
        Err(DpllError::NotSupported { op: "temp_get" })
    }

    /// Index of the currently selected source pin
    async fn source_pin_idx_get(&self, _device: &DeviceInfo, _ctx: &OwnerCtx) -> Result<u32> {
        Err(DpllError::NotSupported {
            op: "source_pin_idx_get",
        })
    }
}

/// Pin callbacks a vendor driver provides, per registration
#[async_trait]
pub trait PinOps: Send + Sync {
    /// What this registration allows to change
    fn capabilities(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> PinCaps {
        PinCaps::NONE
    }

    /// Pin direction
    async fn direction_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<PinDirection> {
        Err(DpllError::NotSupported {
            op: "direction_get",
        })
    }

    /// Current signal type
    async fn signal_type_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<SignalType> {
        Err(DpllError::NotSupported {
            op: "signal_type_get",
        })
    }

    /// Switch the signal type
    async fn signal_type_set(
        &self,
        _call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        _signal_type: SignalType,
    ) -> Result<()> {
        Err(DpllError::NotSupported {
            op: "signal_type_set",
        })
    }

    /// Whether `signal_type` can be selected
    async fn signal_type_supported(
        &self,
        _call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        _signal_type: SignalType,
    ) -> Result<bool> {
        Err(DpllError::NotSupported {
            op: "signal_type_supported",
        })
    }

    /// Custom frequency in Hz
    async fn frequency_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        Err(DpllError::NotSupported {
            op: "frequency_get",
        })
    }

    /// Set the custom frequency in Hz
    async fn frequency_set(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx, _freq: u32) -> Result<()> {
        Err(DpllError::NotSupported {
            op: "frequency_set",
        })
    }

    /// Asserted states
    async fn state_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<PinStateSet> {
        Err(DpllError::NotSupported { op: "state_get" })
    }

    /// Assert a state
    async fn state_set(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx, _state: PinState) -> Result<()> {
        Err(DpllError::NotSupported { op: "state_set" })
    }

    /// Whether `state` can be asserted
    async fn state_supported(
        &self,
        _call: &PinCall<'_>,
        _ctx: &OwnerCtx,
        _state: PinState,
    ) -> Result<bool> {
        Err(DpllError::NotSupported {
            op: "state_supported",
        })
    }

    /// Priority on this device
    async fn prio_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        Err(DpllError::NotSupported { op: "prio_get" })
    }

    /// Set the priority on this device
    async fn prio_set(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx, _prio: u32) -> Result<()> {
        Err(DpllError::NotSupported { op: "prio_set" })
    }

    /// Network interface index
    async fn netifindex_get(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<u32> {
        Err(DpllError::NotSupported {
            op: "netifindex_get",
        })
    }

    /// Select this pin as the device's source
    async fn select(&self, _call: &PinCall<'_>, _ctx: &OwnerCtx) -> Result<()> {
        Err(DpllError::NotSupported { op: "select" })
    }
}
