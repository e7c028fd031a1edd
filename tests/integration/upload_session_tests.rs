//! End to end: central uploads a script line by line over RX.

use microtrynkit::adapters::bluedroid::BluedroidRadio;
use microtrynkit::adapters::system::Esp32System;
use microtrynkit::config::PeripheralConfig;
use microtrynkit::peripheral::{PeripheralController, PeripheralState};
use microtrynkit::stream::ChunkedNotifyStream;
use microtrynkit::terminal::{Terminal, MAX_LINE};
use microtrynkit::upload::UploadWriter;

use crate::mock_radio::{ManualTimer, MemStore, MockClock};

type Stream = ChunkedNotifyStream<BluedroidRadio, Esp32System, MockClock, ManualTimer>;

struct Device {
    terminal: Terminal<Stream>,
    writer: UploadWriter<MemStore>,
    clock: MockClock,
}

impl Device {
    fn boot() -> Self {
        let cfg = PeripheralConfig::default();
        let clock = MockClock::default();
        let peripheral =
            PeripheralController::new(BluedroidRadio::new(), Esp32System::new(), clock.clone(), &cfg)
                .expect("boot");
        let mut terminal = Terminal::new();
        terminal.attach(ChunkedNotifyStream::new(peripheral, ManualTimer::default(), &cfg, || {}));
        Self {
            terminal,
            writer: UploadWriter::new(MemStore::default()),
            clock,
        }
    }

    fn stream(&mut self) -> &mut Stream {
        self.terminal.stream_mut().expect("attached")
    }

    /// One main-loop pass: radio events, then complete lines.
    fn step(&mut self, central: impl FnOnce(&mut BluedroidRadio)) {
        let peripheral = self.stream().peripheral_mut();
        central(peripheral.radio_mut());
        while let Some(event) = peripheral.radio_mut().poll_event() {
            peripheral.handle_event(event);
        }
        let writer = &mut self.writer;
        self.terminal
            .poll_bytes(|piece, ended| writer.on_input(piece, ended).expect("store"));
    }

    fn send(&mut self, data: &[u8]) {
        let rx = self.stream().peripheral().handles().rx;
        self.step(|r| r.sim_write(0, rx, data));
    }
}

#[test]
fn script_split_across_writes_is_stored_line_by_line() {
    let mut dev = Device::boot();
    dev.step(|r| r.sim_connect(0));

    let script = b"erase\r\nimport time\r\nwhile True:\r\n    print('tick')\r\n    time.sleep(1)\r\n";
    for piece in script.chunks(7) {
        dev.send(piece);
    }

    assert_eq!(dev.writer.store().removes, 1);
    assert_eq!(
        dev.writer.store().contents,
        b"import time\nwhile True:\n    print('tick')\n    time.sleep(1)\n"
    );
    assert_eq!(dev.writer.lines_written(), 4);
}

#[test]
fn second_erase_restarts_the_file() {
    let mut dev = Device::boot();
    dev.step(|r| r.sim_connect(0));
    dev.send(b"a = 1\nerase\nb = 2\n");
    assert_eq!(dev.writer.store().contents, b"b = 2\n");
    assert_eq!(dev.writer.store().removes, 1);
}

#[test]
fn disconnect_reports_upload_time_and_restarts() {
    let mut dev = Device::boot();
    dev.clock.advance(5);
    dev.step(|r| r.sim_connect(0));
    dev.send(b"print(1)\n");
    dev.clock.advance(3);
    dev.step(|r| r.sim_disconnect(0));

    let peripheral = dev.stream().peripheral();
    assert_eq!(peripheral.state(), PeripheralState::SessionEnded);
    assert_eq!(peripheral.system().restart_count(), 1);
    assert_eq!(peripheral.upload_timer().elapsed(), 3);
    assert_eq!(dev.writer.store().contents, b"print(1)\n");
}

#[test]
fn echo_reply_is_notified_after_flush() {
    let mut dev = Device::boot();
    dev.step(|r| r.sim_connect(0));
    dev.terminal.write_line("OK");
    let stream = dev.stream();
    assert!(stream.flush_scheduled());
    stream.flush().expect("flush");
    let sent = stream.peripheral().radio().notified();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].2, b"OK\r\n");
}

#[test]
fn line_longer_than_terminal_limit_is_stored_whole() {
    let mut dev = Device::boot();
    dev.step(|r| r.sim_connect(0));

    let line: Vec<u8> = (0..MAX_LINE + 86).map(|i| b'a' + (i % 26) as u8).collect();
    for piece in line.chunks(180) {
        dev.send(piece);
    }
    dev.send(b"\n");

    let mut expected = line.clone();
    expected.push(b'\n');
    assert_eq!(dev.writer.store().contents, expected);
    assert_eq!(dev.writer.lines_written(), 1);
}

#[test]
fn binary_payload_is_stored_unchanged() {
    let mut dev = Device::boot();
    dev.step(|r| r.sim_connect(0));
    dev.send(b"\x80\xff data\n");
    assert_eq!(dev.writer.store().contents, b"\x80\xff data\n");
}
