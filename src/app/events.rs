//! BLE events delivered to the peripheral controller.
//!
//! Radio stacks report events as an integer kind plus a loosely-typed
//! payload.  They are decoded once, at the adapter boundary, into
//! [`BleEvent`]; nothing past that point branches on raw codes.

use crate::gatt::{AttrHandle, ConnHandle};

// Raw event kind codes, one bit per kind.
pub const IRQ_CENTRAL_CONNECT: u32 = 1 << 0;
pub const IRQ_CENTRAL_DISCONNECT: u32 = 1 << 1;
pub const IRQ_GATTS_WRITE: u32 = 1 << 2;
pub const IRQ_GATTS_READ_REQUEST: u32 = 1 << 3;
pub const IRQ_GATTC_NOTIFY: u32 = 1 << 13;

/// One radio event with its associated fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleEvent {
    CentralConnect { conn: ConnHandle },
    CentralDisconnect { conn: ConnHandle },
    GattsWrite { conn: ConnHandle, attr: AttrHandle },
    GattsReadRequest { conn: ConnHandle, attr: AttrHandle },
    /// Central-role notification; never produced in a peripheral-only build.
    GattcNotify { conn: ConnHandle, attr: AttrHandle },
    /// Any kind this firmware does not act on (scan results, GATTC discovery…).
    Other(u32),
}

impl BleEvent {
    /// Decode a raw `(kind, data)` pair.
    ///
    /// `data[0]` is the connection handle, `data[1]` the attribute handle
    /// where the kind carries one.  Returns `None` when `data` is too short
    /// for the kind.
    pub fn from_irq(code: u32, data: &[u16]) -> Option<Self> {
        let conn = data.first().copied();
        let attr = data.get(1).copied();
        let event = match code {
            IRQ_CENTRAL_CONNECT => Self::CentralConnect { conn: conn? },
            IRQ_CENTRAL_DISCONNECT => Self::CentralDisconnect { conn: conn? },
            IRQ_GATTS_WRITE => Self::GattsWrite {
                conn: conn?,
                attr: attr?,
            },
            IRQ_GATTS_READ_REQUEST => Self::GattsReadRequest {
                conn: conn?,
                attr: attr?,
            },
            IRQ_GATTC_NOTIFY => Self::GattcNotify {
                conn: conn?,
                attr: attr?,
            },
            other => Self::Other(other),
        };
        Some(event)
    }
}
