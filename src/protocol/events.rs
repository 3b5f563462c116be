//! Event bus for monitor-group notifications

use tokio::sync::broadcast;

use super::encode;
use super::message::{Attribute, Command, Message};
use crate::attr::{AttrId, DeviceAttrs, PinAttrs};
use crate::types::{DeviceId, DeviceInfo, PinId, wire_enum};

/// Name of the multicast group every notification is sent to
pub const MONITOR_GROUP: &str = "monitor";

wire_enum! {
    /// Membership change carried by a pin change event
    pub enum ChangeType: "change type" {
        /// Pin registered with the device
        PinAdded = 1 => "pin-added",
        /// Pin deregistered from the device
        PinRemoved = 2 => "pin-removed",
    }
}

/// One notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Multicast group
    pub group: &'static str,
    /// Notification body
    pub message: Message,
}

impl Event {
    /// Device the event is about
    #[must_use]
    pub fn device_id(&self) -> Option<DeviceId> {
        self.message
            .get_u32(AttrId::DeviceId)
            .map(DeviceId::from_raw)
    }

    /// Pin the event is about, if any
    #[must_use]
    pub fn pin_id(&self) -> Option<PinId> {
        self.message.get_u32(AttrId::PinIdx).map(PinId::from_raw)
    }

    /// Notification command
    #[must_use]
    pub fn command(&self) -> Command {
        self.message.command
    }

    /// Membership change type, for pin add/remove events
    #[must_use]
    pub fn change_type(&self) -> Option<ChangeType> {
        self.message
            .get_u32(AttrId::ChangeType)
            .and_then(|v| ChangeType::try_from(v).ok())
    }
}

/// Event bus for distributing notifications
#[derive(Debug)]
pub struct EventBus {
    /// Broadcast sender
    tx: broadcast::Sender<Event>,
    max_message_size: usize,
}

impl EventBus {
    /// Create a new event bus
    #[must_use]
    pub fn new(capacity: usize, max_message_size: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            max_message_size,
        }
    }

    /// Subscribe to events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emit a notification to the monitor group
    ///
    /// Returns whether any subscriber received it. Oversized notifications
    /// are dropped.
    pub fn emit(&self, message: Message) -> bool {
        let size = message.size();
        if size > self.max_message_size {
            tracing::warn!(
                command = %message.command,
                size,
                limit = self.max_message_size,
                "dropping oversized notification"
            );
            return false;
        }
        tracing::trace!(command = %message.command, size, "notify");
        self.tx
            .send(Event {
                group: MONITOR_GROUP,
                message,
            })
            .is_ok()
    }

    /// Get subscriber count
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Event filter for selective subscription
pub struct EventFilter {
    rx: broadcast::Receiver<Event>,
    filter: Box<dyn Fn(&Event) -> bool + Send>,
}

impl EventFilter {
    /// Create a filtered event receiver
    pub fn new<F>(bus: &EventBus, filter: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + 'static,
    {
        Self {
            rx: bus.subscribe(),
            filter: Box::new(filter),
        }
    }

    /// Receive next matching event
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.recv().await {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if (self.filter)(&event) => return Some(event),
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Helper functions for common filters
impl EventFilter {
    /// Events about one device
    #[must_use]
    pub fn device(bus: &EventBus, id: DeviceId) -> Self {
        Self::new(bus, move |e| e.device_id() == Some(id))
    }

    /// Change events only
    #[must_use]
    pub fn changes(bus: &EventBus) -> Self {
        Self::new(bus, |e| e.command() == Command::DeviceChange)
    }

    /// Device create and delete events only
    #[must_use]
    pub fn lifecycle(bus: &EventBus) -> Self {
        Self::new(bus, |e| {
            matches!(e.command(), Command::DeviceCreate | Command::DeviceDelete)
        })
    }
}

/// Notification for a device becoming visible
pub(crate) fn device_created(info: &DeviceInfo) -> Message {
    let mut message = Message::new(Command::DeviceCreate);
    message.attrs.extend(encode::device_header(info));
    message
}

/// Notification for a device being hidden
pub(crate) fn device_deleted(info: &DeviceInfo) -> Message {
    Message::new(Command::DeviceDelete).with(Attribute::u32(AttrId::DeviceId, info.id.get()))
}

/// Notification carrying changed device fields
pub(crate) fn device_changed(id: DeviceId, delta: &DeviceAttrs) -> Message {
    let mut message =
        Message::new(Command::DeviceChange).with(Attribute::u32(AttrId::DeviceId, id.get()));
    message.attrs.extend(encode::device_status(delta));
    message
}

/// Notification carrying changed fields of one pin on one device
pub(crate) fn pin_changed(id: DeviceId, pin: PinId, delta: &PinAttrs) -> Message {
    let mut message = Message::new(Command::DeviceChange)
        .with(Attribute::u32(AttrId::DeviceId, id.get()))
        .with(Attribute::u32(AttrId::PinIdx, pin.get()));
    message.attrs.extend(encode::pin_fields(delta));
    message
}

/// Notification for a pin joining or leaving a device
pub(crate) fn pin_membership(id: DeviceId, pin: PinId, change: ChangeType) -> Message {
    Message::new(Command::DeviceChange)
        .with(Attribute::u32(AttrId::DeviceId, id.get()))
        .with(Attribute::u32(AttrId::PinIdx, pin.get()))
        .with(Attribute::u32(AttrId::ChangeType, change.as_u32()))
}
