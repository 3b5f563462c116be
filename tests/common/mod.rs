//! Shared setup for integration tests

#![allow(dead_code)]

use std::sync::{Arc, Once};

use dpll::prelude::*;
use dpll::protocol::Event;
use dpll::testing::{MockDriver, test_identity};
use tokio::sync::broadcast;

static INIT: Once = Once::new();

/// Initialize logging once per test binary
pub fn init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_test_writer()
            .try_init();
    });
}

/// A registry, a handler over it, and one board driver
pub struct Board {
    pub registry: Arc<Registry>,
    pub protocol: Protocol,
    pub driver: Arc<MockDriver>,
}

impl Board {
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        init();
        let registry = Arc::new(Registry::new(config));
        Self {
            protocol: Protocol::new(Arc::clone(&registry)),
            registry,
            driver: Arc::new(MockDriver::new()),
        }
    }

    /// Allocate a device without registering it
    pub async fn alloc(&self, class: DeviceClass, index: u32) -> DeviceId {
        self.registry
            .alloc_device(
                test_identity(class, index),
                self.driver.clone(),
                OwnerCtx::empty(),
            )
            .await
            .expect("alloc device")
    }

    /// Allocate and register a device
    pub async fn device(&self, class: DeviceClass, index: u32) -> DeviceId {
        let id = self.alloc(class, index).await;
        self.registry
            .register_device(id)
            .await
            .expect("register device");
        id
    }

    /// Allocate a pin and register it with `device`
    pub async fn pin(&self, device: DeviceId, label: &str, kind: PinType) -> PinId {
        let pin = self
            .registry
            .alloc_pin(PinProperties::new(label, kind))
            .await
            .expect("alloc pin");
        self.registry
            .register_pin(device, pin, self.driver.clone(), OwnerCtx::empty())
            .await
            .expect("register pin");
        pin
    }

    /// Query request for one device
    pub fn get(&self, device: DeviceId, filter: DumpFilter) -> Message {
        Message::new(Command::DeviceGet)
            .with(Attribute::u32(dpll::AttrId::DeviceId, device.get()))
            .with(Attribute::u32(dpll::AttrId::DumpFilter, filter.bits()))
    }
}

/// Every event queued on `rx`
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
