//! Device and pin registry
//!
//! The registry owns every device and pin record, assigns their ids and
//! keeps the cross references between them: which devices a pin is
//! registered with, and which pins hang off a mux pin.
//!
//! # Locking
//!
//! Two levels of locks are used and always taken in the same order:
//!
//! 1. the registry lock, guarding the id maps and membership
//! 2. one lock per device, guarding that device's cached state and pin list
//!
//! Device locks are taken with [`RegistryConfig::lock_timeout`]; a timeout
//! surfaces as [`DpllError::Busy`]. Code holding a device lock never takes
//! the registry lock.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dpll::registry::Registry;
//! use dpll::testing::{MockDriver, test_identity};
//! use dpll::types::{DeviceClass, PinProperties, PinType, RegistryConfig};
//! use dpll::dispatch::OwnerCtx;
//!
//! # async fn example() -> dpll::Result<()> {
//! let registry = Arc::new(Registry::new(RegistryConfig::default()));
//! let driver = Arc::new(MockDriver::new());
//!
//! let dev = registry
//!     .alloc_device(test_identity(DeviceClass::Eec, 0), driver.clone(), OwnerCtx::empty())
//!     .await?;
//! let pin = registry.alloc_pin(PinProperties::new("SMA1", PinType::External)).await?;
//! registry.register_pin(dev, pin, driver, OwnerCtx::empty()).await?;
//! registry.register_device(dev).await?;
//! # Ok(())
//! # }
//! ```

mod device;
mod pin;
mod set;
mod update;

#[cfg(test)]
mod tests;

pub use device::DeviceGuard;
pub(crate) use device::{Device, PinMember};

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast};

use crate::attr::AttrId;
use crate::dispatch::{DeviceOps, OwnerCtx, PinOps, Registration};
use crate::error::{DpllError, Result};
use crate::protocol::events::{self, Event, EventBus};
use crate::protocol::message::Message;
use crate::types::{DeviceId, DeviceIdentity, DeviceInfo, PinId, PinInfo, RegistryConfig};

/// Owner of all devices and pins
#[derive(Debug)]
pub struct Registry {
    config: RegistryConfig,
    state: Mutex<RegistryState>,
    events: EventBus,
    shut_down: AtomicBool,
}

#[derive(Debug, Default)]
struct RegistryState {
    devices: BTreeMap<DeviceId, DeviceSlot>,
    pins: BTreeMap<PinId, PinNode>,
    next_device: u32,
    next_pin: u32,
}

#[derive(Debug)]
struct DeviceSlot {
    device: Arc<Device>,
    /// Holders obtained through [`Registry::device_get`]
    ref_count: u32,
}

#[derive(Debug)]
struct PinNode {
    info: Arc<PinInfo>,
    /// One entry per device the pin is registered with
    refs: BTreeMap<DeviceId, PinRef>,
    /// Mux children and the registration they were attached with
    children: BTreeMap<PinId, Registration<dyn PinOps>>,
    mux_parent: Option<PinId>,
}

#[derive(Debug)]
struct PinRef {
    registration: Registration<dyn PinOps>,
    parent: Option<PinId>,
}

impl RegistryState {
    fn device(&self, id: DeviceId) -> Result<&Arc<Device>> {
        self.devices
            .get(&id)
            .map(|slot| &slot.device)
            .ok_or_else(|| DpllError::not_found(format!("device {id}")))
    }

    fn pin(&self, id: PinId) -> Result<&PinNode> {
        self.pins
            .get(&id)
            .ok_or_else(|| DpllError::not_found(format!("pin {id}")))
    }

    fn registered(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices
            .values()
            .map(|slot| &slot.device)
            .filter(|d| d.is_registered())
    }

    fn label_taken(&self, device: DeviceId, label: &str) -> bool {
        self.pins
            .values()
            .any(|node| node.refs.contains_key(&device) && node.info.label == label)
    }
}

fn same_hardware(a: &DeviceIdentity, b: &DeviceIdentity) -> bool {
    a.clock_id == b.clock_id && a.class == b.class && a.index == b.index
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new(config: RegistryConfig) -> Self {
        let events = EventBus::new(config.event_capacity, config.max_message_size);
        Self {
            config,
            state: Mutex::new(RegistryState::default()),
            events,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Notification bus
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to monitor-group notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Whether [`shutdown`](Self::shutdown) has run
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub(crate) fn check_live(&self) -> Result<()> {
        if self.is_shut_down() {
            return Err(DpllError::ShutDown);
        }
        Ok(())
    }

    /// Send a notification about `device` if it is visible to clients
    fn notify(&self, device: &Device, message: Message) {
        if device.is_registered() {
            self.events.emit(message);
        }
    }

    // ===== Device lifecycle =====

    /// Allocate a device for `identity`
    ///
    /// The device is invisible to clients until
    /// [`register_device`](Self::register_device).
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::AlreadyExists`] if a device with the same
    /// hardware identity or name exists, [`DpllError::ResourceExhausted`] when
    /// the device table or id space is full.
    pub async fn alloc_device(
        &self,
        identity: DeviceIdentity,
        ops: Arc<dyn DeviceOps>,
        ctx: OwnerCtx,
    ) -> Result<DeviceId> {
        self.check_live()?;
        let mut st = self.state.lock().await;

        let name = identity.device_name();
        if st
            .devices
            .values()
            .any(|s| same_hardware(&s.device.info.identity, &identity) || s.device.info.name == name)
        {
            return Err(DpllError::exists(format!("device {name}")));
        }
        if st.devices.len() >= self.config.max_devices {
            return Err(DpllError::ResourceExhausted {
                what: format!("device table ({} entries)", self.config.max_devices),
            });
        }
        let raw = st.next_device;
        st.next_device = raw.checked_add(1).ok_or_else(|| DpllError::ResourceExhausted {
            what: "device ids".to_string(),
        })?;

        let id = DeviceId(raw);
        let info = DeviceInfo { id, name, identity };
        tracing::debug!("allocated device {} ({})", id, info.name);
        st.devices.insert(
            id,
            DeviceSlot {
                device: Arc::new(Device::new(info, Registration::new(ops, ctx))),
                ref_count: 0,
            },
        );
        Ok(id)
    }

    /// Take a reference on the device allocated for `identity`
    pub async fn device_get(&self, identity: &DeviceIdentity) -> Option<DeviceId> {
        let mut st = self.state.lock().await;
        let slot = st
            .devices
            .values_mut()
            .find(|s| same_hardware(&s.device.info.identity, identity))?;
        slot.ref_count += 1;
        Some(slot.device.info.id)
    }

    /// Drop a reference taken with [`device_get`](Self::device_get)
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device and
    /// [`DpllError::InvalidArgument`] if no reference is held.
    pub async fn device_put(&self, id: DeviceId) -> Result<()> {
        let mut st = self.state.lock().await;
        let slot = st
            .devices
            .get_mut(&id)
            .ok_or_else(|| DpllError::not_found(format!("device {id}")))?;
        if slot.ref_count == 0 {
            return Err(DpllError::invalid(
                AttrId::DeviceId.as_str(),
                format!("device {id} holds no references"),
            ));
        }
        slot.ref_count -= 1;
        Ok(())
    }

    /// Make a device visible to clients
    ///
    /// Primes the device's cache from the driver and emits a create
    /// notification.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device,
    /// [`DpllError::AlreadyExists`] if it is already registered, or
    /// [`DpllError::Busy`] if its lock cannot be taken.
    pub async fn register_device(&self, id: DeviceId) -> Result<()> {
        self.check_live()?;
        let st = self.state.lock().await;
        let device = Arc::clone(st.device(id)?);
        if device.is_registered() {
            return Err(DpllError::exists(format!("registration of {}", device.info.name)));
        }

        let mut guard = device.lock(self.config.lock_timeout).await?;
        update::prime_device(&device, &mut guard).await;
        device.set_registered(true);
        self.events.emit(events::device_created(&device.info));
        tracing::info!("registered device {} ({})", id, device.info.name);
        Ok(())
    }

    /// Hide a device from clients; its pins and cache are kept
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] if the device is unknown or not
    /// registered, [`DpllError::Busy`] if its lock cannot be taken.
    pub async fn unregister_device(&self, id: DeviceId) -> Result<()> {
        self.check_live()?;
        let st = self.state.lock().await;
        let device = Arc::clone(st.device(id)?);
        if !device.is_registered() {
            return Err(DpllError::not_found(format!("registration of {}", device.info.name)));
        }

        let _guard = device.lock(self.config.lock_timeout).await?;
        self.events.emit(events::device_deleted(&device.info));
        device.set_registered(false);
        tracing::info!("unregistered device {} ({})", id, device.info.name);
        Ok(())
    }

    /// Release a device
    ///
    /// Returns `Ok(false)` without doing anything while the device is still
    /// registered, referenced, or has pins registered with it.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device.
    pub async fn free_device(&self, id: DeviceId) -> Result<bool> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        let slot = st
            .devices
            .get(&id)
            .ok_or_else(|| DpllError::not_found(format!("device {id}")))?;

        let pins = st.pins.values().filter(|n| n.refs.contains_key(&id)).count();
        if slot.device.is_registered() || slot.ref_count > 0 || pins > 0 {
            tracing::warn!(
                "not freeing device {}: registered={} refs={} pins={}",
                slot.device.info.name,
                slot.device.is_registered(),
                slot.ref_count,
                pins
            );
            return Ok(false);
        }
        st.devices.remove(&id);
        tracing::debug!("freed device {}", id);
        Ok(true)
    }

    // ===== Device lookups =====

    /// Registered device by id
    pub async fn device_by_id(&self, id: DeviceId) -> Option<DeviceInfo> {
        let st = self.state.lock().await;
        st.devices
            .get(&id)
            .filter(|s| s.device.is_registered())
            .map(|s| s.device.info.clone())
    }

    /// Registered device by name
    pub async fn device_by_name(&self, name: &str) -> Option<DeviceInfo> {
        let st = self.state.lock().await;
        st.registered()
            .find(|d| d.info.name == name)
            .map(|d| d.info.clone())
    }

    /// Any allocated device with the given hardware identity
    pub async fn device_by_identity(&self, identity: &DeviceIdentity) -> Option<DeviceInfo> {
        let st = self.state.lock().await;
        st.devices
            .values()
            .find(|s| same_hardware(&s.device.info.identity, identity))
            .map(|s| s.device.info.clone())
    }

    /// Lowest registered device id
    pub async fn first_device(&self) -> Option<DeviceId> {
        let st = self.state.lock().await;
        st.registered().next().map(|d| d.info.id)
    }

    /// Next registered device id after `after`
    pub async fn next_device(&self, after: DeviceId) -> Option<DeviceId> {
        let st = self.state.lock().await;
        st.devices
            .range((Bound::Excluded(after), Bound::Unbounded))
            .map(|(_, s)| &s.device)
            .find(|d| d.is_registered())
            .map(|d| d.info.id)
    }

    /// Outstanding [`device_get`](Self::device_get) references
    pub async fn device_ref_count(&self, id: DeviceId) -> Option<u32> {
        let st = self.state.lock().await;
        st.devices.get(&id).map(|s| s.ref_count)
    }

    /// Whether the device exists and is registered
    pub async fn is_registered(&self, id: DeviceId) -> bool {
        self.device_by_id(id).await.is_some()
    }

    /// Number of allocated devices
    pub async fn device_count(&self) -> usize {
        self.state.lock().await.devices.len()
    }

    /// Take a device's lock and read its cached state
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device and
    /// [`DpllError::Busy`] if the lock is not obtained in time.
    pub async fn lock_device(&self, id: DeviceId) -> Result<DeviceGuard> {
        self.check_live()?;
        let device = self.device(id).await?;
        let state = device.lock(self.config.lock_timeout).await?;
        Ok(DeviceGuard::new(device.info.clone(), state))
    }

    // ===== Crate-internal access for the protocol and monitor =====

    /// Any allocated device
    pub(crate) async fn device(&self, id: DeviceId) -> Result<Arc<Device>> {
        let st = self.state.lock().await;
        st.device(id).cloned()
    }

    /// Registered device, as a client would address it
    pub(crate) async fn registered_device(&self, id: DeviceId) -> Result<Arc<Device>> {
        let st = self.state.lock().await;
        st.devices
            .get(&id)
            .map(|s| &s.device)
            .filter(|d| d.is_registered())
            .cloned()
            .ok_or(DpllError::NoSuchDevice)
    }

    /// Resolve a client's device selector
    ///
    /// When both id and name are given they must name the same device.
    pub(crate) async fn resolve(&self, id: Option<u32>, name: Option<&str>) -> Result<Arc<Device>> {
        let st = self.state.lock().await;
        let by_id = id.map(|raw| {
            st.devices
                .get(&DeviceId(raw))
                .map(|s| &s.device)
                .filter(|d| d.is_registered())
        });
        let by_name = name.map(|n| st.registered().find(|d| d.info.name == n));

        match (by_id, by_name) {
            (None, None) => Err(DpllError::invalid(
                AttrId::DeviceId.as_str(),
                "device id or name required",
            )),
            (Some(None), _) | (_, Some(None)) => Err(DpllError::NoSuchDevice),
            (Some(Some(a)), Some(Some(b))) if a.info.id != b.info.id => Err(DpllError::invalid(
                AttrId::DeviceName.as_str(),
                format!("{} does not name device {}", b.info.name, a.info.id),
            )),
            (Some(Some(d)), _) | (None, Some(Some(d))) => Ok(Arc::clone(d)),
        }
    }

    /// Registered devices in ascending id order
    pub(crate) async fn registered_devices(&self) -> Vec<Arc<Device>> {
        let st = self.state.lock().await;
        st.registered().cloned().collect()
    }

    /// Devices a pin is registered with, in ascending id order
    pub(crate) async fn sharing_devices(&self, pin: PinId) -> Vec<Arc<Device>> {
        let st = self.state.lock().await;
        let Some(node) = st.pins.get(&pin) else {
            return Vec::new();
        };
        node.refs
            .keys()
            .filter_map(|id| st.devices.get(id).map(|s| Arc::clone(&s.device)))
            .collect()
    }

    // ===== Teardown =====

    /// Hide every device and drop all records
    ///
    /// Registered devices get a delete notification. Every later mutating
    /// call fails with [`DpllError::ShutDown`].
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let mut st = self.state.lock().await;
        for slot in st.devices.values() {
            let device = &slot.device;
            if !device.is_registered() {
                continue;
            }
            let _guard = match device.lock(self.config.lock_timeout).await {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::warn!("shutting down {} without its lock: {}", device.info.name, e);
                    None
                }
            };
            self.events.emit(events::device_deleted(&device.info));
            device.set_registered(false);
        }
        let (devices, pins) = (st.devices.len(), st.pins.len());
        st.devices.clear();
        st.pins.clear();
        tracing::info!("registry shut down, dropped {} devices and {} pins", devices, pins);
    }
}
