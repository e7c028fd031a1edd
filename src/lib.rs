//! MicroTrynkit firmware library.
//!
//! A BLE peripheral that advertises a small GATT service and exposes it as
//! a byte stream: the central writes to RX, the device answers through TX
//! notifications.  Exposes the pure-logic modules for integration testing.
//! All ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod advertising;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod gatt;
pub mod peripheral;
pub mod stream;
pub mod terminal;
pub mod transport;
pub mod upload;

pub mod adapters;
pub mod drivers;
