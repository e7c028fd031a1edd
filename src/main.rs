//! MicroTrynkit firmware main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │  BluedroidRadio   Esp32System   Esp32Clock   FsUploadStore   │
//! │  FlushTimer (esp_timer one-shot)                             │
//! │                                                              │
//! │  ─────────────── Port Trait Boundary ──────────────────      │
//! │                                                              │
//! │  PeripheralController ─▶ ChunkedNotifyStream ─▶ Terminal     │
//! │                                      lines ─▶ UploadWriter   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Radio callbacks and the flush timer never do work themselves: they
//! queue or raise events that this loop drains.

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use log::{info, warn};

use microtrynkit::adapters::bluedroid::BluedroidRadio;
use microtrynkit::adapters::fs::{self, FsUploadStore};
use microtrynkit::adapters::system::Esp32System;
use microtrynkit::adapters::time::Esp32Clock;
use microtrynkit::config::PeripheralConfig;
use microtrynkit::drivers::hw_timer::FlushTimer;
use microtrynkit::events::{self, push_event, Event};
use microtrynkit::peripheral::{Dispatch, PeripheralController};
use microtrynkit::stream::ChunkedNotifyStream;
use microtrynkit::terminal::Terminal;
use microtrynkit::upload::UploadWriter;

const LOOP_DELAY_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MicroTrynkit v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config + storage ───────────────────────────────────
    let config = PeripheralConfig::default();
    config.validate()?;
    fs::mount_spiffs()?;
    let mut writer = UploadWriter::new(FsUploadStore::new(&config.upload_path));

    // ── 3. Radio, service, advertising ────────────────────────
    let peripheral = PeripheralController::new(
        BluedroidRadio::new(),
        Esp32System::new(),
        Esp32Clock::new(),
        &config,
    )?;
    info!(
        "Advertising as '{}' (tx={}, rx={})",
        config.device_name,
        peripheral.handles().tx,
        peripheral.handles().rx
    );

    // ── 4. Stream + terminal ──────────────────────────────────
    let stream = ChunkedNotifyStream::new(peripheral, FlushTimer::new()?, &config, || {
        push_event(Event::RxReady);
    });
    let mut terminal = Terminal::new();
    terminal.attach(stream);

    info!("System ready. Entering event loop.");

    // ── 5. Event loop ─────────────────────────────────────────
    loop {
        if let Some(stream) = terminal.stream_mut() {
            let peripheral = stream.peripheral_mut();
            while let Some(event) = peripheral.radio_mut().poll_event() {
                match peripheral.handle_event(event) {
                    Dispatch::Connected(conn) => info!("Central {} connected, upload started", conn),
                    Dispatch::SessionEnded { upload_secs } => {
                        info!("Session ended after {:?} s", upload_secs);
                    }
                    _ => {}
                }
            }
        }

        events::drain_events(|event| match event {
            Event::FlushDue => {
                if let Some(stream) = terminal.stream_mut() {
                    if let Err(e) = stream.flush() {
                        warn!("Flush failed: {}", e);
                    }
                }
            }
            Event::RxReady => {
                let mut received = Vec::new();
                terminal.poll_bytes(|piece, line_ended| {
                    if let Err(e) = writer.on_input(piece, line_ended) {
                        warn!("Upload write failed: {}", e);
                    }
                    received.push((piece.to_vec(), line_ended));
                });
                // Echo, as an interactive console would.
                for (piece, line_ended) in &received {
                    terminal.write_bytes(piece);
                    if *line_ended {
                        terminal.write_bytes(b"\r\n");
                    }
                }
            }
        });

        FreeRtos::delay_ms(LOOP_DELAY_MS);
    }
}
