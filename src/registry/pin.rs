use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Arc;

use super::update::prime_member;
use super::{PinMember, PinNode, PinRef, Registry, RegistryState};
use crate::attr::{AttrId, PinAttrs};
use crate::dispatch::{OwnerCtx, PinOps, Registration};
use crate::error::{DpllError, Result};
use crate::protocol::events::{self, ChangeType};
use crate::types::{DeviceId, PinId, PinInfo, PinProperties, PinType};

/// A pin about to join a device
struct Joining {
    info: Arc<PinInfo>,
    registration: Registration<dyn PinOps>,
    parent: Option<PinId>,
}

impl Registry {
    // ===== Pin lifecycle =====

    /// Allocate a pin
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] for an empty label and
    /// [`DpllError::ResourceExhausted`] when the pin table or id space is full.
    pub async fn alloc_pin(&self, props: PinProperties) -> Result<PinId> {
        self.check_live()?;
        if props.label.is_empty() {
            return Err(DpllError::invalid(AttrId::PinLabel.as_str(), "label is empty"));
        }
        let mut st = self.state.lock().await;
        if st.pins.len() >= self.config.max_pins {
            return Err(DpllError::ResourceExhausted {
                what: format!("pin table ({} entries)", self.config.max_pins),
            });
        }
        let raw = st.next_pin;
        st.next_pin = raw.checked_add(1).ok_or_else(|| DpllError::ResourceExhausted {
            what: "pin ids".to_string(),
        })?;

        let id = PinId(raw);
        tracing::debug!("allocated pin {} ({})", id, props.label);
        st.pins.insert(
            id,
            PinNode {
                info: Arc::new(PinInfo {
                    id,
                    label: props.label,
                    kind: props.kind,
                    rclk_device: props.rclk_device,
                }),
                refs: BTreeMap::new(),
                children: BTreeMap::new(),
                mux_parent: None,
            },
        );
        Ok(id)
    }

    /// Register a pin with a device
    ///
    /// Mux children already attached to the pin join the device as well.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown device or pin and
    /// [`DpllError::AlreadyExists`] if the pin, or a pin with the same label,
    /// is already registered with the device.
    pub async fn register_pin(
        &self,
        device: DeviceId,
        pin: PinId,
        ops: Arc<dyn PinOps>,
        ctx: OwnerCtx,
    ) -> Result<()> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        self.attach(&mut st, device, pin, Registration::new(ops, ctx))
            .await
    }

    /// Register a pin another device already owns with `target`
    ///
    /// `owner` must have `pin` registered. The pin keeps one set of common
    /// attributes across every device it is registered with.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] if `owner` does not have `pin`, plus
    /// every error of [`register_pin`](Self::register_pin).
    pub async fn register_shared_pin(
        &self,
        owner: DeviceId,
        pin: PinId,
        target: DeviceId,
        ops: Arc<dyn PinOps>,
        ctx: OwnerCtx,
    ) -> Result<()> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        if !st.pin(pin)?.refs.contains_key(&owner) {
            return Err(DpllError::not_found(format!("pin {pin} on device {owner}")));
        }
        self.attach(&mut st, target, pin, Registration::new(ops, ctx))
            .await
    }

    /// Remove a pin from a device, along with the mux children it brought
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] if the pin is not registered with the
    /// device.
    pub async fn deregister_pin(&self, device: DeviceId, pin: PinId) -> Result<()> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        let dev = Arc::clone(st.device(device)?);
        let node = st.pin(pin)?;
        if !node.refs.contains_key(&device) {
            return Err(DpllError::not_found(format!("pin {pin} on device {device}")));
        }

        let mut leaving: Vec<PinId> = node
            .children
            .keys()
            .filter(|child| {
                st.pins
                    .get(child)
                    .and_then(|c| c.refs.get(&device))
                    .is_some_and(|r| r.parent == Some(pin))
            })
            .copied()
            .collect();
        leaving.push(pin);

        let mut guard = dev.lock(self.config.lock_timeout).await?;
        for id in leaving {
            if let Some(node) = st.pins.get_mut(&id) {
                node.refs.remove(&device);
            }
            guard.pins.remove(&id);
            tracing::debug!("pin {} left device {}", id, dev.info.name);
            self.notify(&dev, events::pin_membership(device, id, ChangeType::PinRemoved));
        }
        Ok(())
    }

    /// Attach `child` under the mux pin `parent`
    ///
    /// The child joins every device the parent is registered with, and any
    /// device the parent registers with later.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::InvalidArgument`] if `parent` is not a mux or is
    /// `child` itself, [`DpllError::NotFound`] for unknown pins and
    /// [`DpllError::AlreadyExists`] if `child` already has a parent or would
    /// clash with a pin on one of the parent's devices.
    pub async fn register_muxed_pin(
        &self,
        parent: PinId,
        child: PinId,
        ops: Arc<dyn PinOps>,
        ctx: OwnerCtx,
    ) -> Result<()> {
        self.check_live()?;
        if parent == child {
            return Err(DpllError::invalid(
                AttrId::PinParentIdx.as_str(),
                format!("pin {child} cannot be its own parent"),
            ));
        }
        let mut st = self.state.lock().await;
        let parent_node = st.pin(parent)?;
        if parent_node.info.kind != PinType::Mux {
            return Err(DpllError::invalid(
                AttrId::PinParentIdx.as_str(),
                format!("pin {parent} is not a mux"),
            ));
        }
        let child_node = st.pin(child)?;
        if let Some(existing) = child_node.mux_parent {
            return Err(DpllError::exists(format!(
                "pin {child} already muxed under {existing}"
            )));
        }

        let targets: Vec<DeviceId> = parent_node.refs.keys().copied().collect();
        for device in &targets {
            if child_node.refs.contains_key(device) {
                return Err(DpllError::exists(format!("pin {child} on device {device}")));
            }
            if st.label_taken(*device, &child_node.info.label) {
                return Err(DpllError::exists(format!(
                    "label {} on device {device}",
                    child_node.info.label
                )));
            }
        }

        let mut locked = Vec::with_capacity(targets.len());
        for device in &targets {
            let dev = Arc::clone(st.device(*device)?);
            let guard = dev.lock(self.config.lock_timeout).await?;
            locked.push((dev, guard));
        }

        let registration = Registration::new(ops, ctx);
        let info = Arc::clone(&child_node.info);
        if let Some(node) = st.pins.get_mut(&parent) {
            node.children.insert(child, registration.clone());
        }
        if let Some(node) = st.pins.get_mut(&child) {
            node.mux_parent = Some(parent);
        }
        for (dev, mut guard) in locked {
            let id = dev.info.id;
            if let Some(node) = st.pins.get_mut(&child) {
                node.refs.insert(
                    id,
                    PinRef {
                        registration: registration.clone(),
                        parent: Some(parent),
                    },
                );
            }
            let mut member = PinMember {
                info: Arc::clone(&info),
                registration: registration.clone(),
                parent: Some(parent),
                attrs: PinAttrs::new(),
            };
            prime_member(&dev.info, &mut member).await;
            guard.pins.insert(child, member);
            self.notify(&dev, events::pin_membership(id, child, ChangeType::PinAdded));
        }
        tracing::debug!("pin {} muxed under {}", child, parent);
        Ok(())
    }

    /// Detach `child` from the mux pin `parent`
    ///
    /// The child leaves every device it joined through the parent.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] if `child` is not attached to `parent`.
    pub async fn deregister_muxed_pin(&self, parent: PinId, child: PinId) -> Result<()> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        let child_node = st.pin(child)?;
        if child_node.mux_parent != Some(parent) {
            return Err(DpllError::not_found(format!("pin {child} under mux {parent}")));
        }
        let targets: Vec<DeviceId> = child_node
            .refs
            .iter()
            .filter(|(_, r)| r.parent == Some(parent))
            .map(|(id, _)| *id)
            .collect();

        let mut locked = Vec::with_capacity(targets.len());
        for device in &targets {
            let dev = Arc::clone(st.device(*device)?);
            let guard = dev.lock(self.config.lock_timeout).await?;
            locked.push((dev, guard));
        }

        if let Some(node) = st.pins.get_mut(&parent) {
            node.children.remove(&child);
        }
        if let Some(node) = st.pins.get_mut(&child) {
            node.mux_parent = None;
            for device in &targets {
                node.refs.remove(device);
            }
        }
        for (dev, mut guard) in locked {
            guard.pins.remove(&child);
            self.notify(
                &dev,
                events::pin_membership(dev.info.id, child, ChangeType::PinRemoved),
            );
        }
        tracing::debug!("pin {} detached from mux {}", child, parent);
        Ok(())
    }

    /// Release a pin
    ///
    /// Returns `Ok(false)` without doing anything while the pin is
    /// registered with a device or linked to a mux parent or child.
    ///
    /// # Errors
    ///
    /// Returns [`DpllError::NotFound`] for an unknown pin.
    pub async fn free_pin(&self, pin: PinId) -> Result<bool> {
        self.check_live()?;
        let mut st = self.state.lock().await;
        let node = st.pin(pin)?;
        if !node.refs.is_empty() || !node.children.is_empty() || node.mux_parent.is_some() {
            tracing::warn!(
                "not freeing pin {} ({}): refs={} children={} parent={:?}",
                pin,
                node.info.label,
                node.refs.len(),
                node.children.len(),
                node.mux_parent
            );
            return Ok(false);
        }
        st.pins.remove(&pin);
        tracing::debug!("freed pin {}", pin);
        Ok(true)
    }

    /// Join `pin` and the mux children it carries to `device`
    async fn attach(
        &self,
        st: &mut RegistryState,
        device: DeviceId,
        pin: PinId,
        registration: Registration<dyn PinOps>,
    ) -> Result<()> {
        let dev = Arc::clone(st.device(device)?);
        let node = st.pin(pin)?;
        if node.refs.contains_key(&device) {
            return Err(DpllError::exists(format!("pin {pin} on device {device}")));
        }

        let mut joining = vec![Joining {
            info: Arc::clone(&node.info),
            registration,
            parent: None,
        }];
        for (child, child_registration) in &node.children {
            let Some(child_node) = st.pins.get(child) else {
                continue;
            };
            if child_node.refs.contains_key(&device) {
                continue;
            }
            joining.push(Joining {
                info: Arc::clone(&child_node.info),
                registration: child_registration.clone(),
                parent: Some(pin),
            });
        }

        {
            let mut labels = BTreeSet::new();
            for j in &joining {
                if st.label_taken(device, &j.info.label) || !labels.insert(j.info.label.as_str()) {
                    return Err(DpllError::exists(format!(
                        "label {} on device {device}",
                        j.info.label
                    )));
                }
            }
        }

        let mut guard = dev.lock(self.config.lock_timeout).await?;
        for j in joining {
            let id = j.info.id;
            if let Some(node) = st.pins.get_mut(&id) {
                node.refs.insert(
                    device,
                    PinRef {
                        registration: j.registration.clone(),
                        parent: j.parent,
                    },
                );
            }
            let mut member = PinMember {
                info: j.info,
                registration: j.registration,
                parent: j.parent,
                attrs: PinAttrs::new(),
            };
            prime_member(&dev.info, &mut member).await;
            guard.pins.insert(id, member);
            tracing::debug!("pin {} joined device {}", id, dev.info.name);
            self.notify(&dev, events::pin_membership(device, id, ChangeType::PinAdded));
        }
        Ok(())
    }

    // ===== Pin lookups =====

    /// Pin registered with `device` at index `idx`
    pub async fn pin_by_idx(&self, device: DeviceId, idx: PinId) -> Option<PinInfo> {
        let st = self.state.lock().await;
        st.pins
            .get(&idx)
            .filter(|n| n.refs.contains_key(&device))
            .map(|n| PinInfo::clone(&n.info))
    }

    /// Pin registered with `device` under `label`
    pub async fn pin_by_label(&self, device: DeviceId, label: &str) -> Option<PinInfo> {
        let st = self.state.lock().await;
        st.pins
            .values()
            .find(|n| n.refs.contains_key(&device) && n.info.label == label)
            .map(|n| PinInfo::clone(&n.info))
    }

    /// Lowest pin index registered with `device`
    pub async fn first_pin(&self, device: DeviceId) -> Option<PinId> {
        let st = self.state.lock().await;
        st.pins
            .iter()
            .find(|(_, n)| n.refs.contains_key(&device))
            .map(|(id, _)| *id)
    }

    /// Next pin index registered with `device` after `after`
    pub async fn next_pin(&self, device: DeviceId, after: PinId) -> Option<PinId> {
        let st = self.state.lock().await;
        st.pins
            .range((Bound::Excluded(after), Bound::Unbounded))
            .find(|(_, n)| n.refs.contains_key(&device))
            .map(|(id, _)| *id)
    }

    /// Pins registered with `device`, in index order
    pub async fn device_pins(&self, device: DeviceId) -> Vec<PinId> {
        let st = self.state.lock().await;
        st.pins
            .iter()
            .filter(|(_, n)| n.refs.contains_key(&device))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Devices `pin` is registered with, in id order
    pub async fn pin_devices(&self, pin: PinId) -> Vec<DeviceId> {
        let st = self.state.lock().await;
        st.pins
            .get(&pin)
            .map(|n| n.refs.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of devices `pin` is registered with
    pub async fn pin_ref_count(&self, pin: PinId) -> Option<usize> {
        let st = self.state.lock().await;
        st.pins.get(&pin).map(|n| n.refs.len())
    }

    /// Mux children attached to `parent`
    pub async fn pin_children(&self, parent: PinId) -> Vec<PinId> {
        let st = self.state.lock().await;
        st.pins
            .get(&parent)
            .map(|n| n.children.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Mux parent of `pin`
    pub async fn pin_parent(&self, pin: PinId) -> Option<PinId> {
        let st = self.state.lock().await;
        st.pins.get(&pin).and_then(|n| n.mux_parent)
    }
}
