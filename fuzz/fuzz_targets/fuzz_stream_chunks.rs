//! Fuzz target: `ChunkedNotifyStream` write/flush interleavings
//!
//! The first byte picks the chunk size; each following byte either writes
//! a run of bytes or fires the flush timer.  Whatever the order, the
//! notified bytes must equal the written bytes once the buffer drains.
//!
//! cargo fuzz run fuzz_stream_chunks

#![no_main]

use libfuzzer_sys::fuzz_target;
use microtrynkit::adapters::bluedroid::BluedroidRadio;
use microtrynkit::adapters::system::Esp32System;
use microtrynkit::app::events::BleEvent;
use microtrynkit::app::ports::{Clock, OneShotTimer};
use microtrynkit::config::PeripheralConfig;
use microtrynkit::peripheral::PeripheralController;
use microtrynkit::stream::ChunkedNotifyStream;
use microtrynkit::transport::DuplexStream;

struct Zero;
impl Clock for Zero {
    fn now_secs(&self) -> u64 {
        0
    }
}

struct Ignore;
impl OneShotTimer for Ignore {
    fn start_once(&mut self, _delay_ms: u32) {}
}

fuzz_target!(|data: &[u8]| {
    let Some((&first, ops)) = data.split_first() else {
        return;
    };
    let cfg = PeripheralConfig {
        chunk_size: usize::from(first % 128) + 1,
        ..PeripheralConfig::default()
    };
    let Ok(mut p) = PeripheralController::new(BluedroidRadio::new(), Esp32System::new(), Zero, &cfg) else {
        return;
    };
    p.handle_event(BleEvent::CentralConnect { conn: 1 });
    let mut s = ChunkedNotifyStream::new(p, Ignore, &cfg, || {});

    let mut written = Vec::new();
    for &op in ops {
        if op & 0x80 == 0 {
            let run = vec![op; usize::from(op % 17)];
            s.write(&run);
            written.extend_from_slice(&run);
        } else if s.flush_scheduled() {
            let _ = s.flush();
        }
    }
    while s.flush_scheduled() {
        let _ = s.flush();
    }

    assert_eq!(s.pending(), 0);
    let sent: Vec<u8> = s
        .peripheral_mut()
        .radio_mut()
        .take_notified()
        .into_iter()
        .flat_map(|(_, _, chunk)| chunk)
        .collect();
    assert_eq!(sent, written);
});
