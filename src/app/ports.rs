//! Port traits: the hexagonal boundary between the BLE peripheral logic
//! and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ PeripheralController / ChunkedNotifyStream
//! ```
//!
//! The radio, timers, restart and filesystem are all external
//! collaborators.  The domain types take them as generics, so every state
//! transition is testable on the host against recording mocks.

use crate::error::Result;
use crate::gatt::{AttrHandle, ConnHandle, ServiceDef};

// ───────────────────────────────────────────────────────────────
// Radio port (driven adapter: domain ↔ BLE host stack)
// ───────────────────────────────────────────────────────────────

/// The minimal slice of a BLE host stack the peripheral needs.
///
/// Events flow the other way through the adapter's own queue and are
/// handed to [`PeripheralController::handle_event`](crate::peripheral::PeripheralController::handle_event)
/// by the main loop.
pub trait RadioPort {
    /// Power the controller + host up or down.
    fn activate(&mut self, on: bool) -> Result<()>;

    /// Register one service; returns one value handle per characteristic,
    /// in declaration order.
    fn register_service(&mut self, service: &ServiceDef) -> Result<Vec<AttrHandle>>;

    /// Current value of a local characteristic (what the central last wrote).
    fn gatts_read(&mut self, attr: AttrHandle) -> Vec<u8>;

    /// Push `data` to one connection as a notification on `attr`.
    fn gatts_notify(&mut self, conn: ConnHandle, attr: AttrHandle, data: &[u8]) -> Result<()>;

    /// Start connectable undirected advertising with raw `adv_data`.
    fn gap_advertise(&mut self, interval_us: u32, adv_data: &[u8]) -> Result<()>;

    fn stop_advertising(&mut self) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Timer / clock / system ports
// ───────────────────────────────────────────────────────────────

/// Deferred single-shot callback source.
///
/// Arming while a shot is pending replaces it.  When the shot fires, the
/// owner of the timer calls back into whatever armed it (the main loop
/// routes `Event::FlushDue` to `ChunkedNotifyStream::flush`).
pub trait OneShotTimer {
    fn start_once(&mut self, delay_ms: u32);
}

/// Wall-clock seconds, used only for upload timing diagnostics.
pub trait Clock {
    fn now_secs(&self) -> u64;
}

/// Whole-device control.
pub trait SystemPort {
    /// Reboot the device.  On hardware this does not return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Upload storage port
// ───────────────────────────────────────────────────────────────

/// Destination file for an upload session.
pub trait UploadStore {
    /// Append raw bytes to the target, creating it if missing.
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Delete the target.  Succeeds if it did not exist.
    fn remove(&mut self) -> Result<()>;
}
