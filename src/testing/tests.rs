use std::time::Duration;

use super::mock_driver::MockDriver;
use super::{TEST_BUS, test_identity};
use crate::dispatch::{DeviceOps, OwnerCtx, PinCall, PinOps};
use crate::error::DpllError;
use crate::types::{
    DeviceClass, DeviceId, DeviceInfo, LockStatus, Mode, PinCaps, PinId, PinInfo, PinState,
    PinType,
};

fn device(id: u32) -> DeviceInfo {
    let identity = test_identity(DeviceClass::Eec, id);
    DeviceInfo {
        id: DeviceId::from_raw(id),
        name: identity.device_name(),
        identity,
    }
}

fn pin(id: u32) -> PinInfo {
    PinInfo {
        id: PinId::from_raw(id),
        label: format!("SMA{id}"),
        kind: PinType::External,
        rclk_device: None,
    }
}

#[test]
fn test_identity_uses_test_bus() {
    let identity = test_identity(DeviceClass::Pps, 2);
    assert_eq!(identity.parent, TEST_BUS);
    assert_eq!(identity.device_name(), "dpll_0000:01:00.0_1_2");
}

#[tokio::test]
async fn test_mock_device_defaults() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let dev = device(0);

    assert_eq!(driver.mode_get(&dev, &ctx).await.unwrap(), Mode::Automatic);
    assert!(driver.mode_supported(&dev, &ctx, Mode::Holdover).await.unwrap());
    assert!(!driver.mode_supported(&dev, &ctx, Mode::Forced).await.unwrap());
    assert_eq!(
        driver.source_pin_idx_get(&dev, &ctx).await.unwrap_err(),
        DpllError::NotSupported {
            op: "source_pin_idx_get"
        }
    );
}

#[tokio::test]
async fn test_mock_tracks_lock_status() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let dev = device(1);

    driver.set_lock_status(dev.id, LockStatus::Locked).await;
    assert_eq!(
        driver.lock_status_get(&dev, &ctx).await.unwrap(),
        LockStatus::Locked
    );
}

#[tokio::test]
async fn test_mock_state_set_flips_connection() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let dev = device(0);
    let p = pin(3);
    let call = PinCall {
        device: &dev,
        pin: &p,
        parent: None,
    };

    driver.state_set(&call, &ctx, PinState::Connected).await.unwrap();
    let states = driver.state_get(&call, &ctx).await.unwrap();

    assert!(states.contains(PinState::Connected));
    assert!(!states.contains(PinState::Disconnected));
    assert!(states.contains(PinState::Selectable));
}

#[tokio::test]
async fn test_mock_prio_is_per_device() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let (d0, d1) = (device(0), device(1));
    let p = pin(0);

    let on_d0 = PinCall {
        device: &d0,
        pin: &p,
        parent: None,
    };
    let on_d1 = PinCall {
        device: &d1,
        pin: &p,
        parent: None,
    };
    driver.prio_set(&on_d0, &ctx, 1).await.unwrap();

    assert_eq!(driver.prio_get(&on_d0, &ctx).await.unwrap(), 1);
    assert_eq!(driver.prio_get(&on_d1, &ctx).await.unwrap(), 10);
}

#[tokio::test]
async fn test_mock_failure_injection() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let dev = device(0);

    driver.fail("mode_set", "AQ timeout").await;
    let err = driver.mode_set(&dev, &ctx, Mode::Holdover).await.unwrap_err();
    assert!(matches!(err, DpllError::Hardware { op: "mode_set", .. }));

    driver.heal("mode_set").await;
    driver.mode_set(&dev, &ctx, Mode::Holdover).await.unwrap();
    assert_eq!(driver.dpll(dev.id).await.mode, Mode::Holdover);
    assert_eq!(driver.calls().await, vec!["mode_set", "mode_set"]);
}

#[tokio::test]
async fn test_mock_callbacks_busy_while_held() {
    let driver = std::sync::Arc::new(MockDriver::with_lock_budget(3, Duration::from_micros(50)));
    let ctx = OwnerCtx::empty();
    let dev = device(0);

    let holder = {
        let driver = std::sync::Arc::clone(&driver);
        tokio::spawn(async move { driver.hold_for(Duration::from_millis(50)).await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert_eq!(driver.temp_get(&dev, &ctx).await.unwrap_err(), DpllError::Busy);
    holder.await.unwrap();
    assert!(driver.temp_get(&dev, &ctx).await.is_ok());
}

#[tokio::test]
async fn test_mock_capabilities() {
    let driver = MockDriver::new();
    let ctx = OwnerCtx::empty();
    let dev = device(0);
    let p = pin(5);
    let call = PinCall {
        device: &dev,
        pin: &p,
        parent: None,
    };

    assert_eq!(driver.capabilities(&call, &ctx), PinCaps::ALL);
    driver.set_caps(p.id, PinCaps::PRIORITY_CAN_CHANGE);
    assert_eq!(driver.capabilities(&call, &ctx), PinCaps::PRIORITY_CAN_CHANGE);
}
