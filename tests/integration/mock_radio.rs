//! Recording mocks for integration tests.
//!
//! Every radio call is logged so tests can assert on the full command
//! history without a BLE controller.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use microtrynkit::app::ports::{Clock, OneShotTimer, RadioPort, SystemPort, UploadStore};
use microtrynkit::error::{Error, RadioError, Result};
use microtrynkit::gatt::{AttrHandle, ConnHandle, ServiceDef};

pub const TX: AttrHandle = 11;
pub const RX: AttrHandle = 13;

// ── Radio call record ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum RadioCall {
    Activate(bool),
    Register(usize),
    Read(AttrHandle),
    Notify { conn: ConnHandle, attr: AttrHandle, data: Vec<u8> },
    Advertise { interval_us: u32, data: Vec<u8> },
    StopAdvertising,
}

// ── MockRadio ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockRadio {
    pub calls: Vec<RadioCall>,
    pub values: HashMap<AttrHandle, Vec<u8>>,
    pub fail_notify: bool,
    pub handle_override: Option<Vec<AttrHandle>>,
}

#[allow(dead_code)]
impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads notified so far, in order.
    pub fn notifications(&self) -> Vec<(ConnHandle, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RadioCall::Notify { conn, data, .. } => Some((*conn, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn adverts(&self) -> Vec<(u32, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                RadioCall::Advertise { interval_us, data } => Some((*interval_us, data.clone())),
                _ => None,
            })
            .collect()
    }
}

impl RadioPort for MockRadio {
    fn activate(&mut self, on: bool) -> Result<()> {
        self.calls.push(RadioCall::Activate(on));
        Ok(())
    }

    fn register_service(&mut self, service: &ServiceDef) -> Result<Vec<AttrHandle>> {
        self.calls.push(RadioCall::Register(service.characteristics.len()));
        Ok(self.handle_override.clone().unwrap_or_else(|| vec![TX, RX]))
    }

    fn gatts_read(&mut self, attr: AttrHandle) -> Vec<u8> {
        self.calls.push(RadioCall::Read(attr));
        self.values.get(&attr).cloned().unwrap_or_default()
    }

    fn gatts_notify(&mut self, conn: ConnHandle, attr: AttrHandle, data: &[u8]) -> Result<()> {
        if self.fail_notify {
            return Err(Error::Radio(RadioError::Notify(-1)));
        }
        self.calls.push(RadioCall::Notify {
            conn,
            attr,
            data: data.to_vec(),
        });
        Ok(())
    }

    fn gap_advertise(&mut self, interval_us: u32, adv_data: &[u8]) -> Result<()> {
        self.calls.push(RadioCall::Advertise {
            interval_us,
            data: adv_data.to_vec(),
        });
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<()> {
        self.calls.push(RadioCall::StopAdvertising);
        Ok(())
    }
}

// ── System / clock / timer ────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: u32,
}

impl SystemPort for MockSystem {
    fn restart(&mut self) {
        self.restarts += 1;
    }
}

/// Clock whose time the test advances through a shared cell.
#[derive(Clone, Default)]
pub struct MockClock(pub Rc<Cell<u64>>);

#[allow(dead_code)]
impl MockClock {
    pub fn advance(&self, secs: u64) {
        self.0.set(self.0.get() + secs);
    }
}

impl Clock for MockClock {
    fn now_secs(&self) -> u64 {
        self.0.get()
    }
}

/// Records every arm; the test decides when a shot "fires".
#[derive(Default)]
pub struct ManualTimer {
    pub arms: Vec<u32>,
}

impl OneShotTimer for ManualTimer {
    fn start_once(&mut self, delay_ms: u32) {
        self.arms.push(delay_ms);
    }
}

// ── Upload store ──────────────────────────────────────────────

#[derive(Default)]
pub struct MemStore {
    pub contents: Vec<u8>,
    pub removes: u32,
}

impl UploadStore for MemStore {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.contents.extend_from_slice(data);
        Ok(())
    }

    fn remove(&mut self) -> Result<()> {
        self.contents.clear();
        self.removes += 1;
        Ok(())
    }
}
