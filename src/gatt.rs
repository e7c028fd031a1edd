//! Upload GATT service declaration.
//!
//! ## GATT Service Layout
//!
//! | Characteristic | UUID                                   | Perms  |
//! |----------------|----------------------------------------|--------|
//! | Service        | `0x1825`                               | n/a    |
//! | TX             | `30ff6dae-fbfe-453b-8a99-9688fea23832` | Notify |
//! | RX             | `fbdf3e86-c18c-4e5b-aace-e7cc03257f7c` | Write  |
//!
//! Registration hands back one value handle per characteristic, in the
//! order declared here.  [`register`] maps them positionally to
//! [`GattHandles`]; reordering [`UPLOAD_SERVICE`] means updating that map.

use log::info;

use crate::advertising::Uuid;
use crate::app::ports::RadioPort;
use crate::error::{RadioError, Result};

/// Runtime identifier of one link-layer connection.
pub type ConnHandle = u16;

/// Runtime value handle of a local characteristic.
pub type AttrHandle = u16;

// ── Constants ────────────────────────────────────────────────

pub const SERVICE_UUID: Uuid = Uuid::U16(0x1825);
pub const CHAR_TX_UUID: u128 = 0x30ff6dae_fbfe_453b_8a99_9688fea23832;
pub const CHAR_RX_UUID: u128 = 0xfbdf3e86_c18c_4e5b_aace_e7cc03257f7c;

/// Characteristic property bits (Bluetooth Core values).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharFlags(u8);

impl CharFlags {
    pub const READ: Self = Self(0x02);
    pub const WRITE_NO_RESPONSE: Self = Self(0x04);
    pub const WRITE: Self = Self(0x08);
    pub const NOTIFY: Self = Self(0x10);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharDef {
    pub uuid: u128,
    pub flags: CharFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDef {
    pub uuid: Uuid,
    pub characteristics: &'static [CharDef],
}

/// The one service this firmware exposes.  Order: TX, RX.
pub const UPLOAD_SERVICE: ServiceDef = ServiceDef {
    uuid: SERVICE_UUID,
    characteristics: &[
        CharDef {
            uuid: CHAR_TX_UUID,
            flags: CharFlags::NOTIFY,
        },
        CharDef {
            uuid: CHAR_RX_UUID,
            flags: CharFlags::WRITE,
        },
    ],
};

/// Value handles assigned at registration; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GattHandles {
    pub tx: AttrHandle,
    pub rx: AttrHandle,
}

/// Register [`UPLOAD_SERVICE`] and pick out the TX/RX handles.
pub fn register<R: RadioPort>(radio: &mut R) -> Result<GattHandles> {
    let handles = radio.register_service(&UPLOAD_SERVICE)?;
    match handles.as_slice() {
        &[tx, rx] => {
            info!("BLE: upload service registered (tx={}, rx={})", tx, rx);
            Ok(GattHandles { tx, rx })
        }
        other => {
            log::error!(
                "BLE: expected 2 characteristic handles, stack returned {}",
                other.len()
            );
            Err(RadioError::Registration.into())
        }
    }
}
