//! Application boundary. Pure domain contracts, zero I/O.
//!
//! All interaction with the BLE stack, timers and flash happens through
//! the **port traits** in [`ports`]; radio events cross into the domain as
//! the typed [`events::BleEvent`].

pub mod events;
pub mod ports;
