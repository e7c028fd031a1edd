//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                   |
//! |-------------|---------------|-------------------------------|
//! | `bluedroid` | RadioPort     | Bluedroid GATT server + GAP   |
//! | `fs`        | UploadStore   | SPIFFS / host filesystem      |
//! | `system`    | SystemPort    | `esp_restart`                 |
//! | `time`      | Clock         | ESP32 high-resolution timer   |
//!
//! The one-shot flush timers live in `drivers::hw_timer`.

pub mod bluedroid;
pub mod fs;
pub mod system;
pub mod time;
