//! Upload session bookkeeping.
//!
//! - [`UploadTimer`]: stopwatch around one connect → disconnect session,
//!   owned by the peripheral controller.
//! - [`UploadWriter`]: turns terminal lines into file operations on an
//!   [`UploadStore`]: the line `erase` truncates the target, every other
//!   line is appended byte for byte with a newline.

use log::{info, warn};

use crate::app::ports::UploadStore;
use crate::error::Result;

/// Line that wipes the target file instead of being appended.
pub const ERASE_COMMAND: &str = "erase";

// ── Upload timer ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadTimer {
    started_at: u64,
    stopped_at: u64,
    running: bool,
}

impl UploadTimer {
    pub const fn new() -> Self {
        Self {
            started_at: 0,
            stopped_at: 0,
            running: false,
        }
    }

    /// Record the start time.  No-op while a session is already timed.
    pub fn start(&mut self, now_secs: u64) {
        if self.running {
            return;
        }
        self.running = true;
        self.started_at = now_secs;
    }

    /// Record the end time and clear the running flag.
    ///
    /// Returns the elapsed seconds, or `None` if the timer never started.
    pub fn stop(&mut self, now_secs: u64) -> Option<u64> {
        self.stopped_at = now_secs;
        if !self.running {
            warn!("upload: timer stopped without a start");
            return None;
        }
        self.running = false;
        let elapsed = self.elapsed();
        info!("Upload completed in {} seconds.", elapsed);
        Some(elapsed)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Seconds between the last start and the last stop.
    pub fn elapsed(&self) -> u64 {
        self.stopped_at.saturating_sub(self.started_at)
    }
}

// ── Upload writer ────────────────────────────────────────────

pub struct UploadWriter<U: UploadStore> {
    store: U,
    lines: u32,
    bytes: usize,
    /// Last input ended mid-line.
    continuing: bool,
}

impl<U: UploadStore> UploadWriter<U> {
    pub fn new(store: U) -> Self {
        Self {
            store,
            lines: 0,
            bytes: 0,
            continuing: false,
        }
    }

    /// Apply one complete received line.
    pub fn on_line(&mut self, line: &str) -> Result<()> {
        self.on_input(line.as_bytes(), true)
    }

    /// Apply one piece of input as yielded by
    /// [`Terminal::poll_bytes`](crate::terminal::Terminal::poll_bytes).
    ///
    /// Bytes are stored unchanged, including invalid UTF-8.  A newline is
    /// only added when `line_ended`, so a line split into several pieces
    /// lands in the file as one line.  `erase` is only honoured as a whole
    /// line.
    pub fn on_input(&mut self, data: &[u8], line_ended: bool) -> Result<()> {
        if line_ended && !self.continuing && data == ERASE_COMMAND.as_bytes() {
            self.store.remove()?;
            self.lines = 0;
            self.bytes = 0;
            info!("upload: target erased");
            return Ok(());
        }

        let mut record = Vec::with_capacity(data.len() + 1);
        record.extend_from_slice(data);
        if line_ended {
            record.push(b'\n');
        }
        self.store.append(&record)?;

        self.continuing = !line_ended;
        if line_ended {
            self.lines += 1;
        }
        self.bytes += record.len();
        Ok(())
    }

    pub fn lines_written(&self) -> u32 {
        self.lines
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes
    }

    pub fn store(&self) -> &U {
        &self.store
    }
}

// ── Tests ────────────────────────────────────────────────────
