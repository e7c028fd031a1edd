//! Peripheral configuration parameters
//!
//! All tunable parameters for the upload peripheral.  Defaults match the
//! deployed device; a JSON overlay can replace any subset of them.

use serde::{Deserialize, Serialize};

use crate::advertising::{self, MAX_LEGACY_ADV_LEN};
use crate::error::{Error, Result};

/// Largest attribute value a notification can carry.
const MAX_ATT_VALUE: usize = 512;

/// Core peripheral configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeripheralConfig {
    // --- Advertising ---
    /// Complete local name.  Keep it short: the whole payload must fit 31 bytes.
    pub device_name: String,
    /// GAP appearance code (0 = omit).
    pub appearance: u16,
    /// Advertising interval in microseconds
    pub adv_interval_us: u32,

    // --- Stream ---
    /// Bytes per notification when flushing the TX buffer
    pub chunk_size: usize,
    /// Delay before each deferred flush (milliseconds)
    pub flush_delay_ms: u32,

    // --- Upload ---
    /// File that received lines are appended to
    pub upload_path: String,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            device_name: String::from("MicroTrynkit"),
            appearance: advertising::APPEARANCE_GENERIC_COMPUTER,
            adv_interval_us: 500_000, // 500 ms

            chunk_size: 100,
            flush_delay_ms: 50,

            upload_path: String::from("/spiffs/main.py"),
        }
    }
}

impl PeripheralConfig {
    /// Advertising data this configuration produces.
    pub fn advertising_payload(&self) -> advertising::AdvertisingPayload {
        advertising::advertising_payload(Some(&self.device_name), &[], self.appearance)
    }

    /// Reject values the radio or stream cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.device_name.is_empty() {
            return Err(Error::Config("device name empty"));
        }
        if self.device_name.len() > MAX_LEGACY_ADV_LEN
            || self.advertising_payload().len() > MAX_LEGACY_ADV_LEN
        {
            return Err(Error::Config("device name too long for 31-byte advertising payload"));
        }
        if self.adv_interval_us == 0 {
            return Err(Error::Config("advertising interval must be non-zero"));
        }
        if self.chunk_size == 0 || self.chunk_size > MAX_ATT_VALUE {
            return Err(Error::Config("chunk size must be 1..=512"));
        }
        Ok(())
    }

    /// Parse a JSON overlay; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed JSON"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
