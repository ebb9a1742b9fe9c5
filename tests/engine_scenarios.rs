//! End-to-end engine scenarios mirroring spec.md §8's concrete scenarios,
//! driven against the in-memory `FakeTransport`.

mod support;

use glasses_protocol::codec::{DashboardMode, DashboardSubmode, DecodedValue, HostTag};
use glasses_protocol::{EngineError, Operation, ProtocolEngine, Side, SideState, Target};
use std::time::Duration;
use support::fake_transport_pair;

async fn wait_until_initialized(engine: &ProtocolEngine, side: Side) {
    for _ in 0..200 {
        if engine.side_state(side) == SideState::Initialized {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("side {side:?} never reached INITIALIZED");
}

async fn ready_engine() -> (ProtocolEngine, support::FakeTransportHandle, support::FakeTransportHandle) {
    let (left, left_handle) = fake_transport_pair();
    let (right, right_handle) = fake_transport_pair();
    let engine = ProtocolEngine::new(left, right, Duration::from_millis(1000));
    wait_until_initialized(&engine, Side::Left).await;
    wait_until_initialized(&engine, Side::Right).await;
    (engine, left_handle, right_handle)
}

#[tokio::test]
async fn scenario_1_brightness_both_sides() {
    let (engine, left, right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::SetBrightness { level: 50, auto: true }).unwrap();
    assert_eq!(cmd.target, Target::Both);
    let submitted = engine.submit(cmd).await.unwrap();

    assert_eq!(left.sent(), vec![bytes::Bytes::from_static(&[0x01, 0x1F, 0x01])]);
    assert_eq!(right.sent(), vec![bytes::Bytes::from_static(&[0x01, 0x1F, 0x01])]);

    left.push_response(&[0x01, 0xC9]);
    right.push_response(&[0x01, 0xC9]);

    let result = tokio::time::timeout(Duration::from_millis(200), submitted.completion)
        .await
        .expect("completion did not resolve")
        .expect("oneshot sender dropped")
        .expect("command failed");
    assert_eq!(result, DecodedValue::Ack(true));
}

#[tokio::test]
async fn scenario_2_heartbeat_packet_framing() {
    let (engine, left, _right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::Heartbeat { seq: 0x01 }).unwrap();
    let submitted = engine.submit(cmd).await.unwrap();
    assert_eq!(
        left.sent(),
        vec![bytes::Bytes::from_static(&[0x25, 0x06, 0x00, 0x01, 0x04, 0x02])]
    );

    left.push_response(&[0x25, 0xC9]);
    let result = submitted.completion.await.unwrap().unwrap();
    assert_eq!(result, DecodedValue::Ack(true));
}

#[tokio::test]
async fn scenario_3_invalid_dashboard_mode_rejected_before_any_send() {
    let (_engine, left, right) = ready_engine().await;

    let err = glasses_protocol::build(Operation::SetDashboardMode {
        mode: DashboardMode::Minimal,
        submode: DashboardSubmode::Stock,
    })
    .unwrap_err();
    assert!(matches!(err, EngineError::InvalidArgument(_)));
    assert_eq!(left.sent_count(), 0);
    assert_eq!(right.sent_count(), 0);
}

#[tokio::test]
async fn scenario_4_colliding_prefix_second_submit_fails_busy_without_writing() {
    let (engine, left, _right) = ready_engine().await;

    let first = glasses_protocol::build(Operation::SetBrightness { level: 10, auto: false }).unwrap();
    let _submitted_first = engine.submit(first).await.unwrap();
    assert_eq!(left.sent_count(), 1);

    let second = glasses_protocol::build(Operation::SetBrightness { level: 20, auto: false }).unwrap();
    let err = engine.submit(second).await.unwrap_err();
    assert!(matches!(err, EngineError::Busy));
    // The second command's bytes must never reach the transport.
    assert_eq!(left.sent_count(), 1);
}

#[tokio::test]
async fn scenario_5_bitmap_transfer_then_crc_check() {
    let (engine, left, _right) = ready_engine().await;

    let bitmap = vec![0xABu8; 500];
    let transfer = glasses_protocol::build(Operation::BeginBitmapTransfer { bitmap: bitmap.clone() }).unwrap();
    assert_eq!(transfer.target, Target::One(Side::Left));
    let submitted = engine.submit(transfer).await.unwrap();

    let sent = left.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(&sent[0][..6], &[0x15, 0x00, 0x00, 0x1C, 0x00, 0x00]);
    assert_eq!(&sent[1][..2], &[0x15, 0x01]);
    assert_eq!(&sent[2][..2], &[0x15, 0x02]);

    left.push_response(&[0x15, 0xC9]);
    assert_eq!(submitted.completion.await.unwrap().unwrap(), DecodedValue::Ack(true));

    let crc_cmd = glasses_protocol::build(Operation::BitmapCrcCheck { bitmap: bitmap.clone() }).unwrap();
    let submitted_crc = engine.submit(crc_cmd).await.unwrap();

    let crc_packet = left.sent().last().unwrap().clone();
    assert_eq!(crc_packet[0], 0x16);
    let expected = glasses_protocol::crc::bitmap_crc32(&bitmap);
    assert_eq!(u32::from_be_bytes(crc_packet[1..5].try_into().unwrap()), expected);

    left.push_response(&[0x16, 0xC9]);
    assert_eq!(submitted_crc.completion.await.unwrap().unwrap(), DecodedValue::Ack(true));
}

#[tokio::test]
async fn scenario_6_case_battery_event_with_no_pending_command() {
    use glasses_protocol::{install_standard_listeners, EventValue};
    use std::sync::{Arc, Mutex};

    let (engine, left, _right) = ready_engine().await;
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();
    install_standard_listeners(engine.listeners(), move |value, side| {
        received_clone.lock().unwrap().push((value, side));
    });

    left.push_response(&[0xF5, 0x0F, 0x20]);
    // Give the left side's receive loop a moment to process the injected frame.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let events = received.lock().unwrap();
    assert_eq!(events.as_slice(), &[(EventValue::CaseBattery(50), Side::Left)]);
}

#[tokio::test]
async fn submit_rejects_when_side_not_initialized() {
    let (left, _left_handle) = fake_transport_pair();
    let (right, _right_handle) = fake_transport_pair();
    // `#[tokio::test]` defaults to a current-thread runtime: the io tasks
    // spawned by `new` cannot run until this test future yields, and
    // `submit`'s side-readiness check returns before any `.await`, so this
    // reliably observes the side still `Disconnected`.
    let engine = ProtocolEngine::new(left, right, Duration::from_millis(1000));
    let cmd = glasses_protocol::build(Operation::QueryBattery {
        side: Side::Left,
        host: HostTag::Android,
    })
    .unwrap();
    let err = engine.submit(cmd).await.unwrap_err();
    assert!(matches!(err, EngineError::SideNotReady(Side::Left)));
}

#[tokio::test]
async fn timeout_fires_when_no_response_arrives() {
    let (engine, _left, _right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::SetSilentMode { on: true })
        .unwrap()
        .with_deadline(Duration::from_millis(30));
    let submitted = engine.submit(cmd).await.unwrap();

    let result = tokio::time::timeout(Duration::from_millis(500), submitted.completion)
        .await
        .expect("completion never resolved")
        .unwrap();
    assert!(matches!(result, Err(EngineError::Timeout)));
}

#[tokio::test]
async fn cancel_resolves_with_cancelled_and_frees_the_prefix() {
    let (engine, left, _right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::SetSilentMode { on: true }).unwrap();
    let submitted = engine.submit(cmd).await.unwrap();
    engine.cancel(submitted.id);

    let result = submitted.completion.await.unwrap();
    assert!(matches!(result, Err(EngineError::Cancelled)));

    // The response prefix should be free again for a fresh submission.
    let cmd2 = glasses_protocol::build(Operation::SetSilentMode { on: false }).unwrap();
    let submitted2 = engine.submit(cmd2).await.unwrap();
    left.push_response(&[0x03, 0xC9]);
    assert_eq!(submitted2.completion.await.unwrap().unwrap(), DecodedValue::Ack(true));
}

#[tokio::test]
async fn side_disconnect_frees_the_sibling_registry_entry_immediately() {
    use bytes::Bytes;
    use glasses_protocol::codec::decode_ack;
    use glasses_protocol::Command;
    use std::sync::Arc;

    let (engine, left, right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::SetSilentMode { on: true })
        .unwrap()
        .with_deadline(Duration::from_millis(1000));
    let submitted = engine.submit(cmd).await.unwrap();

    left.fail_recv();
    let result = tokio::time::timeout(Duration::from_millis(200), submitted.completion)
        .await
        .expect("completion did not resolve")
        .unwrap();
    assert!(matches!(result, Err(EngineError::SideDisconnected(Side::Left))));

    // LEFT disconnecting must not leave RIGHT's sibling registry entry for
    // the same command occupying response prefix `[0x03]`: a fresh
    // RIGHT-only command reusing that prefix is admitted right away rather
    // than rejected with `Busy`, and RIGHT itself is untouched by LEFT's
    // failure (still `Initialized`).
    let cmd2 = Command::new(
        vec![Bytes::from_static(&[0x03, 0x00])],
        Bytes::from_static(&[0x03]),
        Target::One(Side::Right),
        Arc::new(|data: &[u8]| decode_ack(data, 1)),
    );
    let submitted2 = engine.submit(cmd2).await.unwrap();
    right.push_response(&[0x03, 0xC9]);
    assert_eq!(submitted2.completion.await.unwrap().unwrap(), DecodedValue::Ack(true));
}

#[tokio::test]
async fn both_targeted_command_completes_on_first_side_and_drops_the_other() {
    let (engine, left, right) = ready_engine().await;

    let cmd = glasses_protocol::build(Operation::SetWearDetect { on: true }).unwrap();
    assert_eq!(cmd.target, Target::Both);
    let submitted = engine.submit(cmd).await.unwrap();

    left.push_response(&[0x27, 0xC9]);
    let result = submitted.completion.await.unwrap().unwrap();
    assert_eq!(result, DecodedValue::Ack(true));

    // The sibling entry on the right side must already be gone: a late
    // right-side response for the same prefix is simply an unmatched
    // frame now, not a double resolution (the oneshot is already consumed).
    right.push_response(&[0x27, 0xC9]);
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Proven indirectly: a fresh command re-using the same prefix on the
    // right side must be admitted without a Busy conflict.
    let cmd2 = glasses_protocol::build(Operation::SetWearDetect { on: false }).unwrap();
    let submitted2 = engine.submit(cmd2).await;
    assert!(submitted2.is_ok());
}
