use super::{Fixture, drain};
use crate::attr::{AttrId, DeviceAttrs, PinAttrs};
use crate::dispatch::OwnerCtx;
use crate::error::DpllError;
use crate::types::{LockStatus, PinState, PinType, SignalType};

#[tokio::test]
async fn test_device_update_only_notifies_changes() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let mut rx = fx.registry.subscribe();

    let mut same = DeviceAttrs::new();
    same.set_lock_status(LockStatus::Unlocked);
    assert!(!fx.registry.device_update(dev, &same).await.unwrap());
    assert!(drain(&mut rx).is_empty());

    let mut locked = DeviceAttrs::new();
    locked.set_lock_status(LockStatus::Locked);
    locked.set_temp(35_000);
    assert!(fx.registry.device_update(dev, &locked).await.unwrap());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    let message = &events[0].message;
    assert_eq!(
        message.get_u32(AttrId::LockStatus),
        Some(LockStatus::Locked.as_u32())
    );
    assert!(message.find(AttrId::Temp).is_none());
    assert!(message.find(AttrId::Mode).is_none());

    let guard = fx.registry.lock_device(dev).await.unwrap();
    assert_eq!(guard.attrs().lock_status().unwrap(), LockStatus::Locked);
}

#[tokio::test]
async fn test_pin_update_pushes_common_fields_to_sharers() {
    let fx = Fixture::new();
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let pin = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(a, pin).await;
    fx.registry
        .register_shared_pin(a, pin, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    let mut rx = fx.registry.subscribe();

    let mut new = PinAttrs::new();
    new.set_signal_type(SignalType::TenMhz);
    assert!(fx.registry.pin_update(a, pin, &new).await.unwrap());

    let devices: Vec<_> = drain(&mut rx).iter().filter_map(|e| e.device_id()).collect();
    assert_eq!(devices, vec![a, b]);
    let guard = fx.registry.lock_device(b).await.unwrap();
    assert_eq!(
        guard.pin_attrs(pin).unwrap().signal_type().unwrap(),
        SignalType::TenMhz
    );
}

#[tokio::test]
async fn test_pin_update_keeps_priority_local() {
    let fx = Fixture::new();
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let pin = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(a, pin).await;
    fx.registry
        .register_shared_pin(a, pin, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    let mut rx = fx.registry.subscribe();

    let mut new = PinAttrs::new();
    new.set_prio(3).unwrap();
    assert!(fx.registry.pin_update(a, pin, &new).await.unwrap());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device_id(), Some(a));
    let guard = fx.registry.lock_device(b).await.unwrap();
    assert_eq!(guard.pin_attrs(pin).unwrap().prio().unwrap(), 10);
}

#[tokio::test]
async fn test_pin_update_requires_membership() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;

    let err = fx
        .registry
        .pin_update(dev, pin, &PinAttrs::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::NotFound { .. }));
}

#[tokio::test]
async fn test_refresh_detects_driver_changes() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;
    let mut rx = fx.registry.subscribe();

    assert!(!fx.registry.refresh_device(dev).await.unwrap());
    assert!(drain(&mut rx).is_empty());

    fx.driver.set_lock_status(dev, LockStatus::Locked).await;
    fx.driver
        .update_pin(pin, |p| {
            p.state.remove(PinState::Disconnected);
            p.state.insert(PinState::Connected);
        })
        .await;
    assert!(fx.registry.refresh_device(dev).await.unwrap());

    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].pin_id(), None);
    assert_eq!(events[1].pin_id(), Some(pin));

    let guard = fx.registry.lock_device(dev).await.unwrap();
    assert!(guard.pin_attrs(pin).unwrap().state_enabled(PinState::Connected));
}

#[tokio::test]
async fn test_refresh_failure_leaves_cache() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    fx.driver.set_lock_status(dev, LockStatus::Locked).await;
    fx.driver.fail("temp_get", "sensor offline").await;

    let err = fx.registry.refresh_device(dev).await.unwrap_err();

    assert!(matches!(err, DpllError::Hardware { op: "temp_get", .. }));
    let guard = fx.registry.lock_device(dev).await.unwrap();
    assert_eq!(guard.attrs().lock_status().unwrap(), LockStatus::Unlocked);
}
