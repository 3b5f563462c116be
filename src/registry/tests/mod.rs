mod pins;
mod set;
mod update;

use std::sync::Arc;

use tokio::sync::broadcast;

use super::Registry;
use crate::dispatch::OwnerCtx;
use crate::protocol::Event;
use crate::testing::{MockDriver, test_identity};
use crate::types::{DeviceClass, DeviceId, PinId, PinProperties, PinType, RegistryConfig};

/// Registry plus one mock driver serving every device and pin
struct Fixture {
    registry: Arc<Registry>,
    driver: Arc<MockDriver>,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    fn with_config(config: RegistryConfig) -> Self {
        Self {
            registry: Arc::new(Registry::new(config)),
            driver: Arc::new(MockDriver::new()),
        }
    }

    async fn alloc(&self, index: u32) -> DeviceId {
        self.registry
            .alloc_device(
                test_identity(DeviceClass::Eec, index),
                self.driver.clone(),
                OwnerCtx::empty(),
            )
            .await
            .unwrap()
    }

    /// Allocated and registered device
    async fn device(&self, index: u32) -> DeviceId {
        let id = self.alloc(index).await;
        self.registry.register_device(id).await.unwrap();
        id
    }

    async fn pin(&self, label: &str, kind: PinType) -> PinId {
        self.registry
            .alloc_pin(PinProperties::new(label, kind))
            .await
            .unwrap()
    }

    async fn attach(&self, device: DeviceId, pin: PinId) {
        self.registry
            .register_pin(device, pin, self.driver.clone(), OwnerCtx::empty())
            .await
            .unwrap();
    }
}

/// Every event queued on `rx`
fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
