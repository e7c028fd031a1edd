//! Unified error types for the MicroTrynkit firmware.
//!
//! A single `Error` enum that every subsystem converts into.  Radio-layer
//! failures are never retried locally: they are returned to whoever called
//! `broadcast` / `start_advertising` and handled (or not) there.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The BLE stack rejected an operation.
    Radio(RadioError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
    /// The upload target could not be written or removed.
    Storage(&'static str),
    /// A one-shot timer could not be created (raw esp_err_t).
    Timer(i32),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Radio(e) => write!(f, "radio: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Storage(msg) => write!(f, "storage: {msg}"),
            Self::Timer(rc) => write!(f, "timer: create failed (rc={rc})"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Radio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// An operation was attempted before `activate(true)`.
    NotActive,
    /// Service registration returned the wrong number of handles or timed out.
    Registration,
    /// `gatts_notify` failed (raw stack status).
    Notify(i32),
    /// Advertising could not be configured or started (raw stack status).
    Advertise(i32),
    /// Controller / host bring-up failed (raw stack status).
    Stack(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotActive => write!(f, "BLE not active"),
            Self::Registration => write!(f, "GATT service registration failed"),
            Self::Notify(rc) => write!(f, "notify failed (rc={rc})"),
            Self::Advertise(rc) => write!(f, "advertising failed (rc={rc})"),
            Self::Stack(rc) => write!(f, "BLE stack init failed (rc={rc})"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(e: RadioError) -> Self {
        Self::Radio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
