//! Client-initiated configuration changes
//!
//! Every request is validated in full before the first driver call. Fields
//! are then applied in a fixed order (signal type, frequency, state,
//! priority); the first driver failure stops the sequence and is returned.
//! Fields applied before the failure stay applied and are notified.

use std::sync::Arc;

use super::{Device, PinMember, Registry};
use crate::attr::{AttrId, DeviceAttrs, PinAttrs};
use crate::dispatch::optional;
use crate::error::{DpllError, Result};
use crate::protocol::events;
use crate::protocol::request::{DeviceSetRequest, PinSetRequest};
use crate::types::{
    DeviceId, DeviceInfo, PIN_PRIO_LOWEST, PinCaps, PinId, PinState, PinStateSet, SignalType,
};

/// Capability each requested field needs, with the callback name reported
/// when it is missing
fn required_caps(request: &PinSetRequest, with_prio: bool) -> Vec<(PinCaps, &'static str)> {
    let mut caps = Vec::new();
    if request.signal_type.is_some() {
        caps.push((PinCaps::SIGNAL_TYPE_CAN_CHANGE, "signal_type_set"));
    }
    if request.custom_freq.is_some() {
        caps.push((PinCaps::FREQUENCY_CAN_CHANGE, "frequency_set"));
    }
    if request.state.is_some() {
        caps.push((PinCaps::STATE_CAN_CHANGE, "state_set"));
    }
    if with_prio && request.prio.is_some() {
        caps.push((PinCaps::PRIORITY_CAN_CHANGE, "prio_set"));
    }
    caps
}

fn check_caps(device: &DeviceInfo, member: &PinMember, needed: &[(PinCaps, &'static str)]) -> Result<()> {
    let caps = member
        .registration
        .ops
        .capabilities(&member.call(device), &member.registration.ctx);
    for &(cap, op) in needed {
        if !caps.contains(cap) {
            return Err(DpllError::NotSupported { op });
        }
    }
    Ok(())
}

/// Argument checks that need the driver but change nothing
async fn validate_pin(device: &DeviceInfo, member: &PinMember, request: &PinSetRequest) -> Result<()> {
    check_caps(device, member, &required_caps(request, true))?;

    let call = member.call(device);
    let ops = &member.registration.ops;
    let ctx = &member.registration.ctx;

    if let Some(signal_type) = request.signal_type {
        if optional(ops.signal_type_supported(&call, ctx, signal_type).await)? == Some(false) {
            return Err(DpllError::invalid(
                AttrId::PinSignalType.as_str(),
                format!("{signal_type} not supported by pin {}", member.info.label),
            ));
        }
    }
    if request.custom_freq.is_some() {
        let effective = match request.signal_type {
            Some(t) => Some(t),
            None => optional(ops.signal_type_get(&call, ctx).await)?
                .or_else(|| member.attrs.signal_type().ok()),
        };
        if effective != Some(SignalType::CustomFreq) {
            return Err(DpllError::invalid(
                AttrId::PinCustomFreq.as_str(),
                "custom frequency needs the custom-freq signal type",
            ));
        }
    }
    if let Some(state) = request.state {
        if optional(ops.state_supported(&call, ctx, state).await)? == Some(false) {
            return Err(DpllError::invalid(
                AttrId::PinState.as_str(),
                format!("{state} not supported by pin {}", member.info.label),
            ));
        }
    }
    Ok(())
}

/// Cached state set after `state` was asserted by the driver
fn asserted(current: &PinAttrs, state: PinState) -> PinStateSet {
    let mut states = current.state().unwrap_or_default();
    match state {
        PinState::Connected => states.remove(PinState::Disconnected),
        PinState::Disconnected => states.remove(PinState::Connected),
        _ => {}
    }
    states.insert(state);
    states
}

impl Registry {
    /// Change a registered device's mode and/or selected source
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NoSuchDevice`] if the device is not registered,
    /// [`DpllError::InvalidArgument`] for an unsupported mode or a source pin
    /// not registered with the device, [`DpllError::NotSupported`] if the
    /// source pin cannot be selected, and the first driver error otherwise.
    pub async fn set_device(&self, device: DeviceId, request: &DeviceSetRequest) -> Result<()> {
        self.check_live()?;
        let dev = self.registered_device(device).await?;
        self.set_device_on(&dev, request).await
    }

    pub(crate) async fn set_device_on(&self, dev: &Device, request: &DeviceSetRequest) -> Result<()> {
        if request.is_empty() {
            return Err(DpllError::invalid("request", "nothing to set"));
        }
        let info = &dev.info;
        let reg = &dev.registration;
        let mut guard = dev.lock(self.config.lock_timeout).await?;

        if let Some(mode) = request.mode {
            if !reg.ops.mode_supported(info, &reg.ctx, mode).await? {
                return Err(DpllError::invalid(
                    AttrId::Mode.as_str(),
                    format!("{mode} not supported by {}", info.name),
                ));
            }
        }
        if let Some(idx) = request.source_pin_idx {
            let member = guard.pins.get(&PinId::from_raw(idx)).ok_or_else(|| {
                DpllError::invalid(
                    AttrId::SourcePinIdx.as_str(),
                    format!("pin {idx} is not registered with {}", info.name),
                )
            })?;
            check_caps(info, member, &[(PinCaps::STATE_CAN_CHANGE, "select")])?;
        }

        let mut applied = DeviceAttrs::new();
        let result = async {
            if let Some(mode) = request.mode {
                reg.ops.mode_set(info, &reg.ctx, mode).await?;
                applied.set_mode(mode);
            }
            if let Some(idx) = request.source_pin_idx {
                if let Some(member) = guard.pins.get(&PinId::from_raw(idx)) {
                    member
                        .registration
                        .ops
                        .select(&member.call(info), &member.registration.ctx)
                        .await?;
                    applied.set_source_pin_idx(idx);
                }
            }
            Ok::<(), DpllError>(())
        }
        .await;

        let delta = DeviceAttrs::delta(&applied, &guard.attrs);
        guard.attrs.apply(&applied);
        if !delta.is_empty() {
            self.notify(dev, events::device_changed(info.id, &delta));
        }
        if let Err(e) = &result {
            tracing::warn!("set on {} stopped: {}", info.name, e);
        }
        result
    }

    /// Change a pin's configuration as seen from `device`
    ///
    /// Signal type, frequency and state are shared by every device the pin
    /// is registered with; they are applied through each device's
    /// registration in ascending device id order. Priority only applies to
    /// `device`.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NoSuchDevice`] if the device is not registered,
    /// [`DpllError::NotFound`] if the pin is not registered with it,
    /// [`DpllError::NotSupported`] for a field the pin cannot change,
    /// [`DpllError::InvalidArgument`] for out-of-range values, and the first
    /// driver error otherwise.
    pub async fn set_pin(&self, device: DeviceId, pin: PinId, request: &PinSetRequest) -> Result<()> {
        self.check_live()?;
        let dev = self.registered_device(device).await?;
        self.set_pin_on(&dev, pin, request).await
    }

    pub(crate) async fn set_pin_on(
        &self,
        dev: &Arc<Device>,
        pin: PinId,
        request: &PinSetRequest,
    ) -> Result<()> {
        if request.is_empty() {
            return Err(DpllError::invalid("request", "nothing to set"));
        }
        if let Some(prio) = request.prio {
            if prio > PIN_PRIO_LOWEST {
                return Err(DpllError::invalid(
                    AttrId::PinPrio.as_str(),
                    format!("{prio} above lowest priority {PIN_PRIO_LOWEST}"),
                ));
            }
        }

        {
            let guard = dev.lock(self.config.lock_timeout).await?;
            let member = guard.pins.get(&pin).ok_or_else(|| {
                DpllError::not_found(format!("pin {pin} on device {}", dev.info.name))
            })?;
            validate_pin(&dev.info, member, request).await?;
        }

        let common = required_caps(request, false);
        let sharing = if common.is_empty() {
            Vec::new()
        } else {
            self.sharing_devices(pin).await
        };
        for other in sharing.iter().filter(|d| d.info.id != dev.info.id) {
            let guard = other.lock(self.config.lock_timeout).await?;
            if let Some(member) = guard.pins.get(&pin) {
                check_caps(&other.info, member, &common)?;
            }
        }

        for target in &sharing {
            self.apply_common(target, pin, request).await?;
        }
        if let Some(prio) = request.prio {
            self.apply_prio(dev, pin, prio).await?;
        }
        Ok(())
    }

    /// Apply the shared fields of `request` through one device's registration
    async fn apply_common(&self, dev: &Device, pin: PinId, request: &PinSetRequest) -> Result<()> {
        let mut guard = dev.lock(self.config.lock_timeout).await?;
        let Some(member) = guard.pins.get(&pin) else {
            return Ok(());
        };
        let registration = member.registration.clone();
        let mut next = member.attrs.clone();

        let result = async {
            let call = member.call(&dev.info);
            let (ops, ctx) = (&registration.ops, &registration.ctx);
            if let Some(signal_type) = request.signal_type {
                ops.signal_type_set(&call, ctx, signal_type).await?;
                next.set_signal_type(signal_type);
            }
            if let Some(freq) = request.custom_freq {
                ops.frequency_set(&call, ctx, freq).await?;
                next.set_custom_freq(freq);
            }
            if let Some(state) = request.state {
                ops.state_set(&call, ctx, state).await?;
                let states = asserted(&next, state);
                next.set_states(states)?;
            }
            Ok::<(), DpllError>(())
        }
        .await;

        if let Some(member) = guard.pins.get_mut(&pin) {
            let delta = PinAttrs::delta(&next, &member.attrs);
            member.attrs = next;
            if !delta.is_empty() {
                self.notify(dev, events::pin_changed(dev.info.id, pin, &delta));
            }
        }
        if let Err(e) = &result {
            tracing::warn!("pin {} set on {} stopped: {}", pin, dev.info.name, e);
        }
        result
    }

    async fn apply_prio(&self, dev: &Device, pin: PinId, prio: u32) -> Result<()> {
        let mut guard = dev.lock(self.config.lock_timeout).await?;
        let Some(member) = guard.pins.get_mut(&pin) else {
            return Err(DpllError::not_found(format!(
                "pin {pin} on device {}",
                dev.info.name
            )));
        };
        member
            .registration
            .ops
            .prio_set(&member.call(&dev.info), &member.registration.ctx, prio)
            .await?;

        let mut next = member.attrs.clone();
        next.set_prio(prio)?;
        let delta = PinAttrs::delta(&next, &member.attrs);
        member.attrs = next;
        if !delta.is_empty() {
            self.notify(dev, events::pin_changed(dev.info.id, pin, &delta));
        }
        Ok(())
    }
}
