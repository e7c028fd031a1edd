//! Buffered BLE byte stream for the duplex terminal.
//!
//! Inbound: RX writes accumulate in the controller; `read` / `read_into`
//! drain them directly, with no extra buffering on this side.
//!
//! Outbound: `write` only queues.  The first write into an empty buffer
//! arms a one-shot timer; each time it fires, [`ChunkedNotifyStream::flush`]
//! notifies at most `chunk_size` bytes and re-arms while anything is left.
//!
//! ```text
//! write("abc…")   ──▶ tx_buf ──(50 ms)──▶ flush ─▶ notify[0..100]
//!                        ▲                  │
//!                        └──── re-arm ◀─────┘  (only while tx_buf non-empty)
//! ```
//!
//! Bursts of small terminal writes therefore coalesce into few
//! notifications, each within the ATT payload limit.

use log::{debug, warn};

use crate::app::ports::{Clock, OneShotTimer, RadioPort, SystemPort};
use crate::config::PeripheralConfig;
use crate::error::Result;
use crate::peripheral::PeripheralController;
use crate::transport::DuplexStream;

pub struct ChunkedNotifyStream<R: RadioPort, S: SystemPort, C: Clock, T: OneShotTimer> {
    peripheral: PeripheralController<R, S, C>,
    timer: T,
    tx_buf: Vec<u8>,
    chunk_size: usize,
    flush_delay_ms: u32,
    scheduled: bool,
}

impl<R, S, C, T> ChunkedNotifyStream<R, S, C, T>
where
    R: RadioPort,
    S: SystemPort,
    C: Clock,
    T: OneShotTimer,
{
    /// Wrap `peripheral`.  `on_rx` becomes its write handler and runs after
    /// every accepted RX write (the terminal's "input ready" hook).
    pub fn new(
        mut peripheral: PeripheralController<R, S, C>,
        timer: T,
        config: &PeripheralConfig,
        on_rx: impl FnMut() + 'static,
    ) -> Self {
        peripheral.set_write_handler(on_rx);
        Self {
            peripheral,
            timer,
            tx_buf: Vec::new(),
            chunk_size: config.chunk_size.max(1),
            flush_delay_ms: config.flush_delay_ms,
            scheduled: false,
        }
    }

    /// One flush step, run when the one-shot timer fires.
    ///
    /// The chunk leaves the buffer before it is sent; a radio error loses
    /// that chunk and is returned, but the cycle keeps going while bytes
    /// remain.
    pub fn flush(&mut self) -> Result<()> {
        self.scheduled = false;
        if self.tx_buf.is_empty() {
            return Ok(());
        }

        let n = self.chunk_size.min(self.tx_buf.len());
        let chunk: Vec<u8> = self.tx_buf.drain(..n).collect();
        let result = self.peripheral.broadcast(&chunk);
        if let Err(e) = &result {
            warn!("stream: dropped {} byte chunk ({})", n, e);
        }

        if !self.tx_buf.is_empty() {
            self.schedule();
        }
        result
    }

    fn schedule(&mut self) {
        self.timer.start_once(self.flush_delay_ms);
        self.scheduled = true;
        debug!("stream: flush in {} ms ({} bytes queued)", self.flush_delay_ms, self.tx_buf.len());
    }

    /// Bytes waiting to be notified.
    pub fn pending(&self) -> usize {
        self.tx_buf.len()
    }

    /// Whether a flush step is armed.
    pub fn flush_scheduled(&self) -> bool {
        self.scheduled
    }

    pub fn peripheral(&self) -> &PeripheralController<R, S, C> {
        &self.peripheral
    }

    pub fn peripheral_mut(&mut self) -> &mut PeripheralController<R, S, C> {
        &mut self.peripheral
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }
}

impl<R, S, C, T> DuplexStream for ChunkedNotifyStream<R, S, C, T>
where
    R: RadioPort,
    S: SystemPort,
    C: Clock,
    T: OneShotTimer,
{
    fn read(&mut self, size: Option<usize>) -> Vec<u8> {
        self.peripheral.read(size)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Option<usize> {
        let avail = self.peripheral.read(Some(buf.len()));
        if avail.is_empty() {
            return None;
        }
        for (dst, src) in buf.iter_mut().zip(&avail) {
            *dst = *src;
        }
        Some(avail.len())
    }

    fn write(&mut self, data: &[u8]) -> usize {
        let was_empty = self.tx_buf.is_empty();
        self.tx_buf.extend_from_slice(data);
        if was_empty && !data.is_empty() {
            self.schedule();
        }
        data.len()
    }

    fn poll_readable(&self) -> bool {
        self.peripheral.any() > 0
    }
}

// ── Tests ────────────────────────────────────────────────────
