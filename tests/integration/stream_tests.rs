//! Chunked notify stream over the loopback Bluedroid adapter.

use std::cell::Cell;
use std::rc::Rc;

use microtrynkit::adapters::bluedroid::BluedroidRadio;
use microtrynkit::adapters::system::Esp32System;
use microtrynkit::config::PeripheralConfig;
use microtrynkit::peripheral::PeripheralController;
use microtrynkit::stream::ChunkedNotifyStream;
use microtrynkit::transport::DuplexStream;

use crate::mock_radio::{ManualTimer, MockClock};

type Stream = ChunkedNotifyStream<BluedroidRadio, Esp32System, MockClock, ManualTimer>;

fn connected_stream(config: &PeripheralConfig, rx_hits: Rc<Cell<u32>>) -> Stream {
    let peripheral = PeripheralController::new(
        BluedroidRadio::new(),
        Esp32System::new(),
        MockClock::default(),
        config,
    )
    .expect("boot");
    let mut stream = ChunkedNotifyStream::new(peripheral, ManualTimer::default(), config, move || {
        rx_hits.set(rx_hits.get() + 1);
    });
    pump(&mut stream, |r| r.sim_connect(0));
    stream
}

/// Let the central act on the radio, then deliver what it queued.
fn pump(stream: &mut Stream, central: impl FnOnce(&mut BluedroidRadio)) {
    let peripheral = stream.peripheral_mut();
    central(peripheral.radio_mut());
    while let Some(event) = peripheral.radio_mut().poll_event() {
        peripheral.handle_event(event);
    }
}

fn fire_until_idle(stream: &mut Stream) -> usize {
    let mut fires = 0;
    while stream.flush_scheduled() {
        stream.flush().expect("flush");
        fires += 1;
    }
    fires
}

#[test]
fn kilobyte_reply_goes_out_in_ten_chunks() {
    let mut s = connected_stream(&PeripheralConfig::default(), Rc::default());
    let reply: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    assert_eq!(s.write(&reply), 1000);

    assert_eq!(fire_until_idle(&mut s), 10);
    let sent = s.peripheral_mut().radio_mut().take_notified();
    assert!(sent.iter().all(|(_, _, chunk)| chunk.len() == 100));
    let tx = s.peripheral().handles().tx;
    assert!(sent.iter().all(|(conn, attr, _)| *conn == 0 && *attr == tx));
    let joined: Vec<u8> = sent.into_iter().flat_map(|(_, _, c)| c).collect();
    assert_eq!(joined, reply);
}

#[test]
fn configured_chunk_size_and_delay_are_used() {
    let cfg = PeripheralConfig {
        chunk_size: 20,
        flush_delay_ms: 5,
        ..PeripheralConfig::default()
    };
    let mut s = connected_stream(&cfg, Rc::default());
    s.write(&[0xAB; 45]);
    fire_until_idle(&mut s);
    let sizes: Vec<usize> = s.peripheral().radio().notified().iter().map(|(_, _, c)| c.len()).collect();
    assert_eq!(sizes, vec![20, 20, 5]);
    assert!(s.timer().arms.iter().all(|&d| d == 5));
}

#[test]
fn central_writes_reach_reader_and_hook() {
    let hits = Rc::new(Cell::new(0));
    let mut s = connected_stream(&PeripheralConfig::default(), hits.clone());
    let rx = s.peripheral().handles().rx;

    pump(&mut s, |r| {
        r.sim_write(0, rx, b"abc");
        r.sim_write(0, rx, b"de");
    });
    assert_eq!(hits.get(), 2);
    assert!(s.poll_readable());

    let mut buf = [0u8; 16];
    assert_eq!(s.read_into(&mut buf), Some(5));
    assert_eq!(&buf[..5], b"abcde");
    assert_eq!(s.read_into(&mut buf), None);
}

#[test]
fn output_without_central_is_dropped_quietly() {
    let cfg = PeripheralConfig::default();
    let peripheral =
        PeripheralController::new(BluedroidRadio::new(), Esp32System::new(), MockClock::default(), &cfg)
            .expect("boot");
    let mut s = ChunkedNotifyStream::new(peripheral, ManualTimer::default(), &cfg, || {});
    s.write(b"nobody listening");
    assert_eq!(fire_until_idle(&mut s), 1);
    assert_eq!(s.pending(), 0);
    assert!(s.peripheral().radio().notified().is_empty());
}
