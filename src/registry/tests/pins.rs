use super::{Fixture, drain};
use crate::dispatch::OwnerCtx;
use crate::error::DpllError;
use crate::protocol::{ChangeType, Command};
use crate::types::{PinId, PinProperties, PinType};

#[tokio::test]
async fn test_alloc_pin_rejects_empty_label() {
    let fx = Fixture::new();

    let err = fx
        .registry
        .alloc_pin(PinProperties::new("", PinType::Gnss))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        DpllError::InvalidArgument {
            name: "pin-label".into(),
            message: "label is empty".into(),
        }
    );
}

#[tokio::test]
async fn test_register_pin_notifies_and_resolves() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("GNSS-1PPS", PinType::Gnss).await;
    let mut rx = fx.registry.subscribe();

    fx.attach(dev, pin).await;

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].command(), Command::DeviceChange);
    assert_eq!(events[0].pin_id(), Some(pin));
    assert_eq!(events[0].change_type(), Some(ChangeType::PinAdded));

    assert_eq!(fx.registry.pin_by_idx(dev, pin).await.unwrap().label, "GNSS-1PPS");
    assert_eq!(fx.registry.pin_by_label(dev, "GNSS-1PPS").await.unwrap().id, pin);
    assert!(fx.registry.pin_by_label(dev, "SMA1").await.is_none());
    assert_eq!(fx.registry.device_pins(dev).await, vec![pin]);
}

#[tokio::test]
async fn test_pins_on_hidden_device_are_silent() {
    let fx = Fixture::new();
    let dev = fx.alloc(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    let mut rx = fx.registry.subscribe();

    fx.attach(dev, pin).await;
    fx.registry.deregister_pin(dev, pin).await.unwrap();

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_duplicate_registration_rejected() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    let twin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;

    let again = fx
        .registry
        .register_pin(dev, pin, fx.driver.clone(), OwnerCtx::empty())
        .await;
    let same_label = fx
        .registry
        .register_pin(dev, twin, fx.driver.clone(), OwnerCtx::empty())
        .await;

    assert!(matches!(again, Err(DpllError::AlreadyExists { .. })));
    assert!(matches!(same_label, Err(DpllError::AlreadyExists { .. })));
    assert_eq!(fx.registry.pin_ref_count(pin).await, Some(1));
    assert_eq!(fx.registry.pin_ref_count(twin).await, Some(0));
}

#[tokio::test]
async fn test_shared_pin_reference_counting() {
    let fx = Fixture::new();
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let pin = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(a, pin).await;

    fx.registry
        .register_shared_pin(a, pin, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    assert_eq!(fx.registry.pin_ref_count(pin).await, Some(2));
    assert_eq!(fx.registry.pin_devices(pin).await, vec![a, b]);

    fx.registry.deregister_pin(a, pin).await.unwrap();
    assert_eq!(fx.registry.pin_ref_count(pin).await, Some(1));
    assert!(!fx.registry.free_pin(pin).await.unwrap());
    assert!(fx.registry.pin_by_idx(b, pin).await.is_some());

    fx.registry.deregister_pin(b, pin).await.unwrap();
    assert_eq!(fx.registry.pin_ref_count(pin).await, Some(0));
    assert!(fx.registry.free_pin(pin).await.unwrap());
    assert_eq!(fx.registry.pin_ref_count(pin).await, None);
}

#[tokio::test]
async fn test_shared_pin_requires_owner() {
    let fx = Fixture::new();
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let pin = fx.pin("SMA1", PinType::External).await;

    let err = fx
        .registry
        .register_shared_pin(a, pin, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::NotFound { .. }));
}

#[tokio::test]
async fn test_deregister_unknown_membership() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;

    assert!(matches!(
        fx.registry.deregister_pin(dev, pin).await,
        Err(DpllError::NotFound { .. })
    ));
    assert!(matches!(
        fx.registry.deregister_pin(dev, PinId::from_raw(99)).await,
        Err(DpllError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_muxed_pin_requires_mux_parent() {
    let fx = Fixture::new();
    let parent = fx.pin("SMA1", PinType::External).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;

    let err = fx
        .registry
        .register_muxed_pin(parent, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::InvalidArgument { ref name, .. } if name == "pin-parent-idx"));
}

#[tokio::test]
async fn test_muxed_pin_follows_parent_devices() {
    let fx = Fixture::new();
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let mux = fx.pin("RCLK-MUX", PinType::Mux).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(a, mux).await;
    fx.registry
        .register_shared_pin(a, mux, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();

    fx.registry
        .register_muxed_pin(mux, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();

    assert_eq!(fx.registry.pin_parent(child).await, Some(mux));
    assert_eq!(fx.registry.pin_children(mux).await, vec![child]);
    assert_eq!(fx.registry.pin_devices(child).await, vec![a, b]);

    let guard = fx.registry.lock_device(b).await.unwrap();
    assert_eq!(guard.pins(), vec![mux, child]);
}

#[tokio::test]
async fn test_muxed_pin_single_parent() {
    let fx = Fixture::new();
    let mux = fx.pin("MUX0", PinType::Mux).await;
    let other = fx.pin("MUX1", PinType::Mux).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.registry
        .register_muxed_pin(mux, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();

    let err = fx
        .registry
        .register_muxed_pin(other, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::AlreadyExists { .. }));
}

#[tokio::test]
async fn test_mux_registered_later_brings_children() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let mux = fx.pin("RCLK-MUX", PinType::Mux).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.registry
        .register_muxed_pin(mux, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    let mut rx = fx.registry.subscribe();

    fx.attach(dev, mux).await;

    assert_eq!(fx.registry.device_pins(dev).await, vec![mux, child]);
    let added: Vec<_> = drain(&mut rx).iter().filter_map(|e| e.pin_id()).collect();
    assert_eq!(added, vec![mux, child]);
}

#[tokio::test]
async fn test_deregister_mux_cascades_to_children() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let mux = fx.pin("RCLK-MUX", PinType::Mux).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(dev, mux).await;
    fx.registry
        .register_muxed_pin(mux, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    let mut rx = fx.registry.subscribe();

    fx.registry.deregister_pin(dev, mux).await.unwrap();

    assert!(fx.registry.device_pins(dev).await.is_empty());
    let removed: Vec<_> = drain(&mut rx)
        .iter()
        .filter(|e| e.change_type() == Some(ChangeType::PinRemoved))
        .filter_map(|e| e.pin_id())
        .collect();
    assert_eq!(removed, vec![child, mux]);
    // The mux link itself survives deregistration
    assert_eq!(fx.registry.pin_parent(child).await, Some(mux));
}

#[tokio::test]
async fn test_deregister_muxed_pin() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let mux = fx.pin("RCLK-MUX", PinType::Mux).await;
    let child = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(dev, mux).await;
    fx.registry
        .register_muxed_pin(mux, child, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    assert!(!fx.registry.free_pin(child).await.unwrap());

    fx.registry.deregister_muxed_pin(mux, child).await.unwrap();

    assert_eq!(fx.registry.device_pins(dev).await, vec![mux]);
    assert_eq!(fx.registry.pin_parent(child).await, None);
    assert!(fx.registry.pin_children(mux).await.is_empty());
    assert!(fx.registry.free_pin(child).await.unwrap());
    assert!(matches!(
        fx.registry.deregister_muxed_pin(mux, child).await,
        Err(DpllError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_pin_iteration() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let p0 = fx.pin("SMA0", PinType::External).await;
    let _unused = fx.pin("SMA1", PinType::External).await;
    let p2 = fx.pin("SMA2", PinType::External).await;
    fx.attach(dev, p0).await;
    fx.attach(dev, p2).await;

    assert_eq!(fx.registry.first_pin(dev).await, Some(p0));
    assert_eq!(fx.registry.next_pin(dev, p0).await, Some(p2));
    assert_eq!(fx.registry.next_pin(dev, p2).await, None);
}

#[tokio::test]
async fn test_pin_table_limit() {
    let fx = Fixture::with_config(crate::types::RegistryConfig::builder().max_pins(1).build());
    fx.pin("SMA0", PinType::External).await;

    let err = fx
        .registry
        .alloc_pin(PinProperties::new("SMA1", PinType::External))
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::ResourceExhausted { .. }));
}
