//! Connection lifecycle against the recording radio.

use microtrynkit::advertising::{decode_name, MAX_LEGACY_ADV_LEN};
use microtrynkit::app::events::{BleEvent, IRQ_CENTRAL_CONNECT, IRQ_CENTRAL_DISCONNECT, IRQ_GATTS_WRITE};
use microtrynkit::config::PeripheralConfig;
use microtrynkit::error::{Error, RadioError};
use microtrynkit::peripheral::{Dispatch, IgnoreReason, PeripheralController, PeripheralState, WriteOutcome};

use crate::mock_radio::{MockClock, MockRadio, MockSystem, RadioCall, RX, TX};

type Controller = PeripheralController<MockRadio, MockSystem, MockClock>;

fn boot(config: &PeripheralConfig) -> (Controller, MockClock) {
    let clock = MockClock::default();
    let c = PeripheralController::new(MockRadio::new(), MockSystem::default(), clock.clone(), config)
        .expect("boot");
    (c, clock)
}

fn irq(c: &mut Controller, code: u32, data: &[u16]) -> Dispatch {
    let event = BleEvent::from_irq(code, data).expect("well-formed irq");
    c.handle_event(event)
}

#[test]
fn boot_activates_registers_then_advertises() {
    let (c, _) = boot(&PeripheralConfig::default());
    let calls = &c.radio().calls;
    assert_eq!(calls[0], RadioCall::Activate(true));
    assert_eq!(calls[1], RadioCall::Register(2));
    match &calls[2] {
        RadioCall::Advertise { interval_us, data } => {
            assert_eq!(*interval_us, 500_000);
            assert!(data.len() <= MAX_LEGACY_ADV_LEN);
            assert_eq!(decode_name(data).as_deref(), Some("MicroTrynkit"));
        }
        other => panic!("expected advertise, got {other:?}"),
    }
    assert_eq!(c.state(), PeripheralState::Advertising);
}

#[test]
fn wrong_handle_count_fails_boot() {
    let mut radio = MockRadio::new();
    radio.handle_override = Some(vec![TX]);
    let result = PeripheralController::new(
        radio,
        MockSystem::default(),
        MockClock::default(),
        &PeripheralConfig::default(),
    );
    assert!(matches!(result, Err(Error::Radio(RadioError::Registration))));
}

#[test]
fn json_config_changes_advertised_name_and_interval() {
    let cfg = PeripheralConfig::from_json(r#"{"device_name":"Board7","adv_interval_us":100000}"#)
        .expect("valid overlay");
    let (c, _) = boot(&cfg);
    let (interval, data) = &c.radio().adverts()[0];
    assert_eq!(*interval, 100_000);
    assert_eq!(decode_name(data).as_deref(), Some("Board7"));
}

#[test]
fn full_session_from_raw_irqs() {
    let (mut c, clock) = boot(&PeripheralConfig::default());
    clock.advance(100);

    assert_eq!(irq(&mut c, IRQ_CENTRAL_CONNECT, &[0, 0, 0]), Dispatch::Connected(0));

    c.radio_mut().values.insert(RX, b"print('a')\n".to_vec());
    assert_eq!(
        irq(&mut c, IRQ_GATTS_WRITE, &[0, RX]),
        Dispatch::Write(WriteOutcome::Accepted(11))
    );
    assert!(c.radio().calls.contains(&RadioCall::Read(RX)));
    assert_eq!(c.read(None), b"print('a')\n");

    c.broadcast(b">>> ").unwrap();
    assert_eq!(c.radio().notifications(), vec![(0, b">>> ".to_vec())]);

    clock.advance(42);
    assert_eq!(
        irq(&mut c, IRQ_CENTRAL_DISCONNECT, &[0, 0, 0]),
        Dispatch::SessionEnded { upload_secs: Some(42) }
    );
    assert_eq!(c.system().restarts, 1);
    assert_eq!(c.state(), PeripheralState::SessionEnded);
}

#[test]
fn write_before_any_connect_is_ignored() {
    let (mut c, _) = boot(&PeripheralConfig::default());
    c.radio_mut().values.insert(RX, b"x".to_vec());
    assert_eq!(
        irq(&mut c, IRQ_GATTS_WRITE, &[3, RX]),
        Dispatch::Write(WriteOutcome::Ignored(IgnoreReason::UnknownConnection))
    );
    assert!(!c.radio().calls.contains(&RadioCall::Read(RX)));
}

#[test]
fn disconnect_of_unknown_handle_still_ends_session() {
    let (mut c, _) = boot(&PeripheralConfig::default());
    irq(&mut c, IRQ_CENTRAL_CONNECT, &[1, 0, 0]);
    let d = irq(&mut c, IRQ_CENTRAL_DISCONNECT, &[9, 0, 0]);
    assert!(matches!(d, Dispatch::SessionEnded { .. }));
    assert_eq!(c.system().restarts, 1);
    // The tracked handle was not removed.
    assert!(c.is_connected(1));
}

#[test]
fn two_centrals_both_receive_broadcast() {
    let (mut c, _) = boot(&PeripheralConfig::default());
    irq(&mut c, IRQ_CENTRAL_CONNECT, &[1, 0, 0]);
    irq(&mut c, IRQ_CENTRAL_CONNECT, &[2, 0, 0]);
    c.broadcast(b"hi").unwrap();
    let mut conns: Vec<_> = c.radio().notifications().into_iter().map(|(conn, _)| conn).collect();
    conns.sort_unstable();
    assert_eq!(conns, vec![1, 2]);
}
