use dpll::prelude::*;
use dpll::protocol::{ChangeType, EventFilter};
use dpll::{AttrId, LockStatus, PinState};

mod common;
use common::{Board, drain};

const STATUS_FIELDS: &[AttrId] = &[
    AttrId::DeviceClass,
    AttrId::ClockId,
    AttrId::Mode,
    AttrId::ModeSupported,
    AttrId::LockStatus,
    AttrId::Temp,
];

#[tokio::test]
async fn test_status_only_query_omits_pins() {
    let board = Board::new();
    let dev = board.device(DeviceClass::Eec, 0).await;
    board.pin(dev, "GNSS-1PPS", PinType::Gnss).await;
    board.pin(dev, "SMA1", PinType::External).await;

    let response = board
        .protocol
        .handle(&board.get(dev, DumpFilter::STATUS))
        .await;

    let reply = &response.messages()[0];
    assert!(reply.find(AttrId::Pin).is_none());
    for field in STATUS_FIELDS {
        assert!(reply.find(*field).is_some(), "missing {field}");
    }
}

#[tokio::test]
async fn test_pins_only_query_omits_status() {
    let board = Board::new();
    let dev = board.device(DeviceClass::Eec, 0).await;
    board.pin(dev, "GNSS-1PPS", PinType::Gnss).await;
    board.pin(dev, "SMA1", PinType::External).await;

    let response = board
        .protocol
        .handle(&board.get(dev, DumpFilter::PINS))
        .await;

    let reply = &response.messages()[0];
    assert_eq!(reply.get_u32(AttrId::DeviceId), Some(dev.get()));
    assert!(reply.find(AttrId::DeviceName).is_some());
    assert_eq!(reply.find_all(AttrId::Pin).count(), 2);
    for field in STATUS_FIELDS {
        assert!(reply.find(*field).is_none(), "unexpected {field}");
    }
}

#[tokio::test]
async fn test_dump_every_device() {
    let board = Board::new();
    let eec = board.device(DeviceClass::Eec, 0).await;
    let pps = board.device(DeviceClass::Pps, 0).await;
    board.driver.set_lock_status(pps, LockStatus::Locked).await;

    let response = board.protocol.handle(&Message::new(Command::DeviceGet)).await;

    let replies = response.messages();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0].get_u32(AttrId::DeviceId), Some(eec.get()));
    assert_eq!(
        replies[1].get_u32(AttrId::LockStatus),
        Some(LockStatus::Locked.as_u32())
    );
}

#[tokio::test]
async fn test_client_session() {
    let board = Board::new();
    let mut lifecycle = EventFilter::lifecycle(board.registry.events());
    let mut changes = EventFilter::changes(board.registry.events());

    let dev = board.device(DeviceClass::Eec, 0).await;
    let pin = board.pin(dev, "SMA1", PinType::External).await;
    assert_eq!(
        lifecycle.try_recv().map(|e| e.command()),
        Some(Command::DeviceCreate)
    );
    assert_eq!(
        changes.try_recv().and_then(|e| e.change_type()),
        Some(ChangeType::PinAdded)
    );

    // Select the pin as source, then connect it
    let select = Message::new(Command::DeviceSet)
        .with(Attribute::u32(AttrId::DeviceId, dev.get()))
        .with(Attribute::u32(AttrId::SourcePinIdx, pin.get()));
    assert_eq!(board.protocol.handle(&select).await.code(), 0);

    let connect = Message::new(Command::PinSet)
        .with(Attribute::string(
            AttrId::DeviceName,
            "dpll_0000:01:00.0_2_0",
        ))
        .with(Attribute::u32(AttrId::PinIdx, pin.get()))
        .with(Attribute::u32(AttrId::PinState, PinState::Connected.as_u32()));
    assert_eq!(board.protocol.handle(&connect).await.code(), 0);

    let device_change = changes.try_recv().unwrap();
    assert_eq!(device_change.pin_id(), None);
    assert_eq!(
        device_change.message.get_u32(AttrId::SourcePinIdx),
        Some(pin.get())
    );
    let pin_change = changes.try_recv().unwrap();
    assert_eq!(pin_change.pin_id(), Some(pin));
    let states: Vec<_> = pin_change
        .message
        .find_all(AttrId::PinState)
        .filter_map(Attribute::as_u32)
        .collect();
    assert!(states.contains(&PinState::Connected.as_u32()));
    assert!(!states.contains(&PinState::Disconnected.as_u32()));
    assert!(changes.try_recv().is_none());
}

#[tokio::test]
async fn test_error_responses() {
    let board = Board::new();
    let dev = board.device(DeviceClass::Eec, 0).await;
    let pin = board.pin(dev, "SMA1", PinType::External).await;
    let mut rx = board.registry.subscribe();

    let cases = [
        (
            Message::new(Command::PinSet)
                .with(Attribute::u32(AttrId::PinIdx, pin.get()))
                .with(Attribute::u32(AttrId::PinPrio, 1)),
            -22,
            Some(AttrId::DeviceId),
        ),
        (
            Message::new(Command::PinSet)
                .with(Attribute::u32(AttrId::DeviceId, dev.get()))
                .with(Attribute::u32(AttrId::PinIdx, pin.get()))
                .with(Attribute::u32(AttrId::PinPrio, 300)),
            -22,
            Some(AttrId::PinPrio),
        ),
        (
            Message::new(Command::DeviceSet)
                .with(Attribute::u32(AttrId::DeviceId, dev.get()))
                .with(Attribute::u32(AttrId::Mode, 1)),
            -22,
            Some(AttrId::Mode),
        ),
        (
            Message::new(Command::DeviceGet).with(Attribute::u32(AttrId::DeviceId, 77)),
            -19,
            None,
        ),
        (Message::new(Command::DeviceCreate), -22, None),
    ];

    for (message, code, attr) in cases {
        let response = board.protocol.handle(&message).await;
        match response {
            Response::Error {
                code: got,
                attr: got_attr,
                ..
            } => {
                assert_eq!(got, code, "{message:?}");
                assert_eq!(got_attr, attr, "{message:?}");
            }
            Response::Reply(_) => panic!("{message:?} succeeded"),
        }
    }
    assert!(drain(&mut rx).is_empty());
}
