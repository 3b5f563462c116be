//! Cache maintenance: driver-pushed updates, polling refresh and priming

use super::device::DeviceState;
use super::{Device, PinMember, Registry};
use crate::attr::{DeviceAttrs, PinAttrs};
use crate::dispatch::{device_snapshot, pin_snapshot};
use crate::error::{DpllError, Result};
use crate::protocol::events;
use crate::types::{DeviceId, DeviceInfo, PinId};

/// Fill a device's cache from the driver; failures leave it as it was
pub(super) async fn prime_device(device: &Device, state: &mut DeviceState) {
    match device_snapshot(&device.info, &device.registration).await {
        Ok(attrs) => state.attrs = attrs,
        Err(e) => tracing::warn!("could not read {} at registration: {}", device.info.name, e),
    }
    for member in state.pins.values_mut() {
        prime_member(&device.info, member).await;
    }
}

/// Fill one member pin's cache from the driver; failures leave it as it was
pub(super) async fn prime_member(device: &DeviceInfo, member: &mut PinMember) {
    let snapshot = pin_snapshot(&member.call(device), &member.registration).await;
    match snapshot {
        Ok(attrs) => member.attrs = attrs,
        Err(e) => tracing::warn!(
            "could not read pin {} on {}: {}",
            member.info.label,
            device.name,
            e
        ),
    }
}

impl Registry {
    /// Merge driver-reported device fields into the cache
    ///
    /// Only fields that differ from the cache are applied and notified.
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device and
    /// [`DpllError::Busy`] if its lock is not obtained in time.
    pub async fn device_update(&self, device: DeviceId, new: &DeviceAttrs) -> Result<bool> {
        self.check_live()?;
        let dev = self.device(device).await?;
        let mut guard = dev.lock(self.config.lock_timeout).await?;

        let delta = DeviceAttrs::delta(new, &guard.attrs);
        if delta.is_empty() {
            return Ok(false);
        }
        guard.attrs.apply(&delta);
        self.notify(&dev, events::device_changed(device, &delta));
        Ok(true)
    }

    /// Merge driver-reported pin fields into the cache of `device`
    ///
    /// Changed common fields are also pushed to every other device the pin is
    /// registered with. Returns whether the addressed device changed.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] if the pin is not registered with the
    /// device and [`DpllError::Busy`] if a lock is not obtained in time.
    pub async fn pin_update(&self, device: DeviceId, pin: PinId, new: &PinAttrs) -> Result<bool> {
        self.check_live()?;
        let dev = self.device(device).await?;
        let sharing = self.sharing_devices(pin).await;

        let delta = {
            let mut guard = dev.lock(self.config.lock_timeout).await?;
            let member = guard
                .pins
                .get_mut(&pin)
                .ok_or_else(|| DpllError::not_found(format!("pin {pin} on device {device}")))?;
            let delta = PinAttrs::delta(new, &member.attrs);
            if delta.is_empty() {
                return Ok(false);
            }
            member.attrs.apply(&delta);
            self.notify(&dev, events::pin_changed(device, pin, &delta));
            delta
        };

        let (common, any) = PinAttrs::common(&delta);
        if any {
            for other in sharing.iter().filter(|d| d.info.id != device) {
                self.merge_pin(other, pin, &common).await?;
            }
        }
        Ok(true)
    }

    /// Apply `fields` to one device's copy of a pin, notifying what changed
    pub(super) async fn merge_pin(&self, device: &Device, pin: PinId, fields: &PinAttrs) -> Result<()> {
        let mut guard = device.lock(self.config.lock_timeout).await?;
        let Some(member) = guard.pins.get_mut(&pin) else {
            return Ok(());
        };
        let delta = PinAttrs::delta(fields, &member.attrs);
        if !delta.is_empty() {
            member.attrs.apply(&delta);
            self.notify(device, events::pin_changed(device.info.id, pin, &delta));
        }
        Ok(())
    }

    /// Re-read a device and its pins from the driver
    ///
    /// The new snapshot replaces the cache only if every read succeeds; each
    /// device or pin whose fields changed gets one change notification.
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns the first driver error, [`DpllError::NotFound`] for an unknown
    /// device and [`DpllError::Busy`] if its lock is not obtained in time.
    pub async fn refresh_device(&self, device: DeviceId) -> Result<bool> {
        self.check_live()?;
        let dev = self.device(device).await?;
        let mut guard = dev.lock(self.config.lock_timeout).await?;

        let attrs = device_snapshot(&dev.info, &dev.registration).await?;
        let mut pins = Vec::with_capacity(guard.pins.len());
        for (id, member) in &guard.pins {
            let snapshot = pin_snapshot(&member.call(&dev.info), &member.registration).await?;
            pins.push((*id, snapshot));
        }

        let mut changed = false;
        let delta = DeviceAttrs::delta(&attrs, &guard.attrs);
        guard.attrs = attrs;
        if !delta.is_empty() {
            changed = true;
            self.notify(&dev, events::device_changed(device, &delta));
        }
        for (id, snapshot) in pins {
            let Some(member) = guard.pins.get_mut(&id) else {
                continue;
            };
            let delta = PinAttrs::delta(&snapshot, &member.attrs);
            member.attrs = snapshot;
            if !delta.is_empty() {
                changed = true;
                self.notify(&dev, events::pin_changed(device, id, &delta));
            }
        }
        if changed {
            tracing::debug!("refresh of {} found changes", dev.info.name);
        }
        Ok(changed)
    }
}
