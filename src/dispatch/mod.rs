//! Operation dispatch: vendor callback tables and snapshot building

mod ops;


use std::any::Any;
use std::fmt;
use std::sync::Arc;

pub use ops::{DeviceOps, PinCall, PinOps};

use crate::attr::{DeviceAttrs, PinAttrs};
use crate::error::{DpllError, Result};
use crate::types::{DeviceInfo, Mode, PinState, SignalType};

/// Opaque owner data stored with a registration and handed back to callbacks
#[derive(Clone)]
pub struct OwnerCtx(Option<Arc<dyn Any + Send + Sync>>);

impl OwnerCtx {
    /// Wrap driver data
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    /// Share already reference-counted driver data
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        let value: Arc<dyn Any + Send + Sync> = value;
        Self(Some(value))
    }

    /// Context carrying nothing
    #[must_use]
    pub fn empty() -> Self {
        Self(None)
    }

    /// Borrow the data as `T`
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_ref().and_then(|v| v.downcast_ref::<T>())
    }

    /// Whether both contexts point at the same data
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Default for OwnerCtx {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for OwnerCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OwnerCtx")
            .field(&self.0.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A callback table plus the owner context it is invoked with
pub struct Registration<O: ?Sized> {
    /// Callback table
    pub ops: Arc<O>,
    /// Owner context
    pub ctx: OwnerCtx,
}

impl<O: ?Sized> Registration<O> {
    /// Pair a table with a context
    pub fn new(ops: Arc<O>, ctx: OwnerCtx) -> Self {
        Self { ops, ctx }
    }
}

impl<O: ?Sized> Clone for Registration<O> {
    fn clone(&self) -> Self {
        Self {
            ops: Arc::clone(&self.ops),
            ctx: self.ctx.clone(),
        }
    }
}

impl<O: ?Sized> fmt::Debug for Registration<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("ctx", &self.ctx)
            .finish_non_exhaustive()
    }
}

/// Map "callback absent" to `None`, keep every other outcome
pub(crate) fn optional<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(DpllError::NotSupported { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Build a fresh device record from the driver
///
/// Fields whose callback is absent are left invalid.
pub(crate) async fn device_snapshot(
    device: &DeviceInfo,
    reg: &Registration<dyn DeviceOps>,
) -> Result<DeviceAttrs> {
    let ops = &reg.ops;
    let ctx = &reg.ctx;
    let mut attrs = DeviceAttrs::new();

    if let Some(mode) = optional(ops.mode_get(device, ctx).await)? {
        attrs.set_mode(mode);
    }
    for mode in Mode::ALL {
        match optional(ops.mode_supported(device, ctx, *mode).await)? {
            Some(true) => attrs.add_mode_supported(*mode),
            Some(false) => {}
            None => break,
        }
    }
    if let Some(status) = optional(ops.lock_status_get(device, ctx).await)? {
        attrs.set_lock_status(status);
    }
    if let Some(temp) = optional(ops.temp_get(device, ctx).await)? {
        attrs.set_temp(temp);
    }
    if let Some(idx) = optional(ops.source_pin_idx_get(device, ctx).await)? {
        attrs.set_source_pin_idx(idx);
    }

    tracing::trace!(device = %device.name, fields = attrs.iter_valid().count(), "device snapshot");
    Ok(attrs)
}

/// Build a fresh pin record for one registration from the driver
pub(crate) async fn pin_snapshot(
    call: &PinCall<'_>,
    reg: &Registration<dyn PinOps>,
) -> Result<PinAttrs> {
    let ops = &reg.ops;
    let ctx = &reg.ctx;
    let mut attrs = PinAttrs::new();

    attrs.set_kind(call.pin.kind);
    if let Some(direction) = optional(ops.direction_get(call, ctx).await)? {
        attrs.set_direction(direction);
    }
    if let Some(signal_type) = optional(ops.signal_type_get(call, ctx).await)? {
        attrs.set_signal_type(signal_type);
    }
    for signal_type in SignalType::ALL {
        match optional(ops.signal_type_supported(call, ctx, *signal_type).await)? {
            Some(true) => attrs.add_signal_type_supported(*signal_type),
            Some(false) => {}
            None => break,
        }
    }
    if let Some(freq) = optional(ops.frequency_get(call, ctx).await)? {
        attrs.set_custom_freq(freq);
    }
    if let Some(states) = optional(ops.state_get(call, ctx).await)? {
        attrs.set_states(states)?;
    }
    for state in PinState::ALL {
        match optional(ops.state_supported(call, ctx, *state).await)? {
            Some(true) => attrs.add_state_supported(*state),
            Some(false) => {}
            None => break,
        }
    }
    if let Some(prio) = optional(ops.prio_get(call, ctx).await)? {
        attrs.set_prio(prio)?;
    }
    if let Some(netifindex) = optional(ops.netifindex_get(call, ctx).await)? {
        attrs.set_netifindex(netifindex);
    }

    tracing::trace!(
        device = %call.device.name,
        pin = call.pin.id.get(),
        fields = attrs.iter_valid().count(),
        "pin snapshot"
    );
    Ok(attrs)
}
