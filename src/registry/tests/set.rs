use super::{Fixture, drain};
use crate::attr::AttrId;
use crate::dispatch::OwnerCtx;
use crate::error::DpllError;
use crate::protocol::request::{DeviceSetRequest, PinSetRequest};
use crate::types::{DeviceId, Mode, PinCaps, PinId, PinState, PinType, SignalType};

fn invalid_attr(err: &DpllError) -> Option<&str> {
    match err {
        DpllError::InvalidArgument { name, .. } => Some(name.as_str()),
        _ => None,
    }
}

async fn shared_pin(fx: &Fixture) -> (DeviceId, DeviceId, PinId) {
    let a = fx.device(0).await;
    let b = fx.device(1).await;
    let pin = fx.pin("SYNCE0", PinType::SynceEthPort).await;
    fx.attach(a, pin).await;
    fx.registry
        .register_shared_pin(a, pin, b, fx.driver.clone(), OwnerCtx::empty())
        .await
        .unwrap();
    (a, b, pin)
}

#[tokio::test]
async fn test_set_mode() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let mut rx = fx.registry.subscribe();

    let request = DeviceSetRequest {
        mode: Some(Mode::Holdover),
        ..Default::default()
    };
    fx.registry.set_device(dev, &request).await.unwrap();

    assert_eq!(fx.driver.dpll(dev).await.mode, Mode::Holdover);
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].message.get_u32(AttrId::Mode),
        Some(Mode::Holdover.as_u32())
    );
    let guard = fx.registry.lock_device(dev).await.unwrap();
    assert_eq!(guard.attrs().mode().unwrap(), Mode::Holdover);
}

#[tokio::test]
async fn test_set_unsupported_mode() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    fx.driver.clear_calls().await;

    let request = DeviceSetRequest {
        mode: Some(Mode::Forced),
        ..Default::default()
    };
    let err = fx.registry.set_device(dev, &request).await.unwrap_err();

    assert_eq!(invalid_attr(&err), Some("mode"));
    assert!(!fx.driver.calls().await.contains(&"mode_set"));
    assert_eq!(fx.driver.dpll(dev).await.mode, Mode::Automatic);
}

#[tokio::test]
async fn test_select_source() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("GNSS-1PPS", PinType::Gnss).await;
    fx.attach(dev, pin).await;
    let mut rx = fx.registry.subscribe();

    let request = DeviceSetRequest {
        source_pin_idx: Some(pin.get()),
        ..Default::default()
    };
    fx.registry.set_device(dev, &request).await.unwrap();

    assert_eq!(fx.driver.dpll(dev).await.source_pin_idx, Some(pin.get()));
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].message.get_u32(AttrId::SourcePinIdx), Some(pin.get()));
}

#[tokio::test]
async fn test_select_rejects_foreign_pin() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("GNSS-1PPS", PinType::Gnss).await;

    let request = DeviceSetRequest {
        source_pin_idx: Some(pin.get()),
        ..Default::default()
    };
    let err = fx.registry.set_device(dev, &request).await.unwrap_err();

    assert_eq!(invalid_attr(&err), Some("source-pin-idx"));
}

#[tokio::test]
async fn test_select_needs_state_capability() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("GNSS-1PPS", PinType::Gnss).await;
    fx.attach(dev, pin).await;
    fx.driver.set_caps(pin, PinCaps::PRIORITY_CAN_CHANGE);

    let request = DeviceSetRequest {
        source_pin_idx: Some(pin.get()),
        ..Default::default()
    };
    let err = fx.registry.set_device(dev, &request).await.unwrap_err();

    assert_eq!(err, DpllError::NotSupported { op: "select" });
    assert_eq!(fx.driver.dpll(dev).await.source_pin_idx, None);
}

#[tokio::test]
async fn test_empty_set_rejected() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;

    let err = fx
        .registry
        .set_device(dev, &DeviceSetRequest::default())
        .await
        .unwrap_err();

    assert_eq!(invalid_attr(&err), Some("request"));
}

#[tokio::test]
async fn test_prio_only_affects_addressed_device() {
    let fx = Fixture::new();
    let (a, b, pin) = shared_pin(&fx).await;
    let mut rx = fx.registry.subscribe();

    let request = PinSetRequest {
        prio: Some(2),
        ..Default::default()
    };
    fx.registry.set_pin(b, pin, &request).await.unwrap();

    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device_id(), Some(b));
    assert_eq!(events[0].message.get_u32(AttrId::PinPrio), Some(2));

    let mock = fx.driver.pin(pin).await;
    assert_eq!(mock.prio.get(&b), Some(&2));
    assert_eq!(mock.prio.get(&a), None);
    let guard = fx.registry.lock_device(a).await.unwrap();
    assert_eq!(guard.pin_attrs(pin).unwrap().prio().unwrap(), 10);
}

#[tokio::test]
async fn test_state_change_reaches_every_sharing_device() {
    let fx = Fixture::new();
    let (a, b, pin) = shared_pin(&fx).await;
    let mut rx = fx.registry.subscribe();

    let request = PinSetRequest {
        state: Some(PinState::Connected),
        ..Default::default()
    };
    fx.registry.set_pin(b, pin, &request).await.unwrap();

    let devices: Vec<_> = drain(&mut rx).iter().filter_map(|e| e.device_id()).collect();
    assert_eq!(devices, vec![a, b]);
    for dev in [a, b] {
        let guard = fx.registry.lock_device(dev).await.unwrap();
        let attrs = guard.pin_attrs(pin).unwrap();
        assert!(attrs.state_enabled(PinState::Connected));
        assert!(!attrs.state_enabled(PinState::Disconnected));
        assert!(attrs.state_enabled(PinState::Selectable));
    }
}

#[tokio::test]
async fn test_frequency_needs_custom_signal_type() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;

    let request = PinSetRequest {
        custom_freq: Some(25_000_000),
        ..Default::default()
    };
    let err = fx.registry.set_pin(dev, pin, &request).await.unwrap_err();

    assert_eq!(invalid_attr(&err), Some("pin-custom-freq"));
    assert_eq!(fx.driver.pin(pin).await.frequency, 0);
}

#[tokio::test]
async fn test_fields_applied_in_order() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;
    fx.driver.clear_calls().await;

    let request = PinSetRequest {
        signal_type: Some(SignalType::CustomFreq),
        custom_freq: Some(25_000_000),
        state: Some(PinState::Connected),
        prio: Some(1),
    };
    fx.registry.set_pin(dev, pin, &request).await.unwrap();

    let setters: Vec<_> = fx
        .driver
        .calls()
        .await
        .into_iter()
        .filter(|op| op.ends_with("_set"))
        .collect();
    assert_eq!(
        setters,
        vec!["signal_type_set", "frequency_set", "state_set", "prio_set"]
    );

    let guard = fx.registry.lock_device(dev).await.unwrap();
    let attrs = guard.pin_attrs(pin).unwrap();
    assert_eq!(attrs.signal_type().unwrap(), SignalType::CustomFreq);
    assert_eq!(attrs.custom_freq().unwrap(), 25_000_000);
    assert_eq!(attrs.prio().unwrap(), 1);
}

#[tokio::test]
async fn test_missing_capability_rejected_before_any_call() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;
    fx.driver.set_caps(pin, PinCaps::STATE_CAN_CHANGE);
    fx.driver.clear_calls().await;

    let request = PinSetRequest {
        state: Some(PinState::Connected),
        prio: Some(1),
        ..Default::default()
    };
    let err = fx.registry.set_pin(dev, pin, &request).await.unwrap_err();

    assert_eq!(err, DpllError::NotSupported { op: "prio_set" });
    assert!(fx.driver.calls().await.is_empty());
}

#[tokio::test]
async fn test_failure_keeps_earlier_fields() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;
    fx.driver.fail("frequency_set", "PLL rejected divider").await;
    let mut rx = fx.registry.subscribe();

    let request = PinSetRequest {
        signal_type: Some(SignalType::CustomFreq),
        custom_freq: Some(25_000_000),
        ..Default::default()
    };
    let err = fx.registry.set_pin(dev, pin, &request).await.unwrap_err();

    assert!(matches!(err, DpllError::Hardware { op: "frequency_set", .. }));
    let events = drain(&mut rx);
    assert_eq!(events.len(), 1);
    assert_eq!(
        events[0].message.get_u32(AttrId::PinSignalType),
        Some(SignalType::CustomFreq.as_u32())
    );
    assert!(events[0].message.find(AttrId::PinCustomFreq).is_none());
    let guard = fx.registry.lock_device(dev).await.unwrap();
    let attrs = guard.pin_attrs(pin).unwrap();
    assert_eq!(attrs.signal_type().unwrap(), SignalType::CustomFreq);
    assert_eq!(attrs.custom_freq().unwrap(), 0);
}

#[tokio::test]
async fn test_set_on_hidden_device() {
    let fx = Fixture::new();
    let dev = fx.alloc(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;

    let request = PinSetRequest {
        prio: Some(1),
        ..Default::default()
    };

    assert_eq!(
        fx.registry.set_pin(dev, pin, &request).await,
        Err(DpllError::NoSuchDevice)
    );
}

#[tokio::test]
async fn test_prio_range_checked() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;
    let pin = fx.pin("SMA1", PinType::External).await;
    fx.attach(dev, pin).await;

    let request = PinSetRequest {
        prio: Some(256),
        ..Default::default()
    };
    let err = fx.registry.set_pin(dev, pin, &request).await.unwrap_err();

    assert_eq!(invalid_attr(&err), Some("pin-prio"));
}

#[tokio::test]
async fn test_set_unknown_pin() {
    let fx = Fixture::new();
    let dev = fx.device(0).await;

    let request = PinSetRequest {
        prio: Some(1),
        ..Default::default()
    };
    let err = fx
        .registry
        .set_pin(dev, PinId::from_raw(7), &request)
        .await
        .unwrap_err();

    assert!(matches!(err, DpllError::NotFound { .. }));
}
