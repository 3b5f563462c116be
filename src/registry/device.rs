use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::attr::{DeviceAttrs, PinAttrs};
use crate::dispatch::{DeviceOps, PinCall, PinOps, Registration};
use crate::error::{DpllError, Result};
use crate::types::{DeviceInfo, PinId, PinInfo};

/// A live device: immutable description, driver registration and the
/// lock-protected cache
pub(crate) struct Device {
    pub(crate) info: DeviceInfo,
    pub(crate) registration: Registration<dyn DeviceOps>,
    registered: AtomicBool,
    state: Arc<Mutex<DeviceState>>,
}

/// Everything guarded by the device lock
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub(crate) attrs: DeviceAttrs,
    pub(crate) pins: BTreeMap<PinId, PinMember>,
}

/// One pin's registration with one device
#[derive(Debug, Clone)]
pub(crate) struct PinMember {
    pub(crate) info: Arc<PinInfo>,
    pub(crate) registration: Registration<dyn PinOps>,
    pub(crate) parent: Option<PinId>,
    pub(crate) attrs: PinAttrs,
}

impl PinMember {
    pub(crate) fn call<'a>(&'a self, device: &'a DeviceInfo) -> PinCall<'a> {
        PinCall {
            device,
            pin: &self.info,
            parent: self.parent,
        }
    }
}

impl Device {
    pub(crate) fn new(info: DeviceInfo, registration: Registration<dyn DeviceOps>) -> Self {
        Self {
            info,
            registration,
            registered: AtomicBool::new(false),
            state: Arc::new(Mutex::new(DeviceState::default())),
        }
    }

    pub(crate) fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub(crate) fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::Release);
    }

    /// Take the device lock, giving up after `timeout`
    pub(crate) async fn lock(&self, timeout: Duration) -> Result<OwnedMutexGuard<DeviceState>> {
        tokio::time::timeout(timeout, Arc::clone(&self.state).lock_owned())
            .await
            .map_err(|_| {
                tracing::debug!("device {} lock timed out", self.info.name);
                DpllError::Busy
            })
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("info", &self.info)
            .field("registered", &self.is_registered())
            .finish_non_exhaustive()
    }
}

/// Exclusive access to one device's cached state
///
/// Obtained from [`Registry::lock_device`](super::Registry::lock_device).
/// Every other operation on the device waits (up to the lock timeout) while
/// the guard is alive.
pub struct DeviceGuard {
    info: DeviceInfo,
    state: OwnedMutexGuard<DeviceState>,
}

impl DeviceGuard {
    pub(crate) fn new(info: DeviceInfo, state: OwnedMutexGuard<DeviceState>) -> Self {
        Self { info, state }
    }

    /// Device description
    #[must_use]
    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    /// Cached device fields
    #[must_use]
    pub fn attrs(&self) -> &DeviceAttrs {
        &self.state.attrs
    }

    /// Cached fields of one member pin
    #[must_use]
    pub fn pin_attrs(&self, pin: PinId) -> Option<&PinAttrs> {
        self.state.pins.get(&pin).map(|m| &m.attrs)
    }

    /// Member pins in index order
    #[must_use]
    pub fn pins(&self) -> Vec<PinId> {
        self.state.pins.keys().copied().collect()
    }
}

impl std::fmt::Debug for DeviceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceGuard")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}
