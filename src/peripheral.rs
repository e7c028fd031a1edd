//! BLE peripheral controller.
//!
//! Owns the radio, registers the upload service, advertises, and turns
//! [`BleEvent`]s into state changes.  Inbound RX writes accumulate in a
//! byte buffer that the stream layer drains.
//!
//! ```text
//!   Idle ──start_advertising──▶ Advertising ──connect──▶ Connected
//!                                                           │
//!                               disconnect (any handle) ────┘
//!                                         │
//!                                         ▼
//!                                   SessionEnded ──▶ SystemPort::restart()
//! ```
//!
//! A disconnect always ends the session with a full restart: a partially
//! received upload is discarded rather than resumed.  This is a
//! deployment policy, not a BLE requirement; a reconnect path would need
//! its own accumulator semantics.

use heapless::FnvIndexSet;
use log::{debug, info, warn};

use crate::advertising::AdvertisingPayload;
use crate::app::events::BleEvent;
use crate::app::ports::{Clock, RadioPort, SystemPort};
use crate::config::PeripheralConfig;
use crate::error::Result;
use crate::gatt::{self, AttrHandle, ConnHandle, GattHandles};
use crate::upload::UploadTimer;

/// Maximum simultaneously tracked centrals.
pub const MAX_CONNECTIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralState {
    Idle,
    Advertising,
    Connected,
    /// A central disconnected; the device has been asked to restart.
    SessionEnded,
}

/// Why an RX write was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    UnknownConnection,
    NotRxHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Bytes appended to the inbound accumulator.
    Accepted(usize),
    Ignored(IgnoreReason),
}

/// What [`PeripheralController::handle_event`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Connected(ConnHandle),
    SessionEnded { upload_secs: Option<u64> },
    Write(WriteOutcome),
    ReadRequest,
    Notify,
    Unhandled,
}

type WriteHandler = Box<dyn FnMut()>;

pub struct PeripheralController<R: RadioPort, S: SystemPort, C: Clock> {
    radio: R,
    system: S,
    clock: C,
    handles: GattHandles,
    payload: AdvertisingPayload,
    connections: FnvIndexSet<ConnHandle, MAX_CONNECTIONS>,
    rx_buffer: Vec<u8>,
    handler: Option<WriteHandler>,
    timer: UploadTimer,
    state: PeripheralState,
}

impl<R: RadioPort, S: SystemPort, C: Clock> PeripheralController<R, S, C> {
    /// Activate the radio, register the service and start advertising.
    pub fn new(mut radio: R, system: S, clock: C, config: &PeripheralConfig) -> Result<Self> {
        radio.activate(true)?;
        let handles = gatt::register(&mut radio)?;
        let payload = config.advertising_payload();

        let mut this = Self {
            radio,
            system,
            clock,
            handles,
            payload,
            connections: FnvIndexSet::new(),
            rx_buffer: Vec::new(),
            handler: None,
            timer: UploadTimer::new(),
            state: PeripheralState::Idle,
        };
        this.start_advertising(config.adv_interval_us)?;
        Ok(this)
    }

    /// Advertise the precomputed payload every `interval_us`.
    pub fn start_advertising(&mut self, interval_us: u32) -> Result<()> {
        self.radio.gap_advertise(interval_us, self.payload.as_bytes())?;
        if self.state == PeripheralState::Idle {
            self.state = PeripheralState::Advertising;
        }
        info!(
            "BLE: advertising every {} us ({} byte payload)",
            interval_us,
            self.payload.len()
        );
        Ok(())
    }

    /// Install the callback run after every accepted RX write.
    /// Replaces any previous handler.
    pub fn set_write_handler(&mut self, handler: impl FnMut() + 'static) {
        self.handler = Some(Box::new(handler));
    }

    /// Notify `data` on TX to every tracked connection.
    ///
    /// Stops at the first radio error and returns it; connections after
    /// that one in iteration order are not notified.
    pub fn broadcast(&mut self, data: &[u8]) -> Result<()> {
        for conn in self.connections.iter() {
            self.radio.gatts_notify(*conn, self.handles.tx, data)?;
        }
        Ok(())
    }

    /// Drain up to `size` bytes (everything for `None`) from the front of
    /// the inbound accumulator.
    pub fn read(&mut self, size: Option<usize>) -> Vec<u8> {
        let n = size.map_or(self.rx_buffer.len(), |s| s.min(self.rx_buffer.len()));
        self.rx_buffer.drain(..n).collect()
    }

    /// Number of unread inbound bytes.
    pub fn any(&self) -> usize {
        self.rx_buffer.len()
    }

    pub fn handle_event(&mut self, event: BleEvent) -> Dispatch {
        if self.state == PeripheralState::SessionEnded {
            debug!("BLE: session ended, dropping {:?}", event);
            return Dispatch::Unhandled;
        }

        match event {
            BleEvent::CentralConnect { conn } => self.on_connect(conn),
            BleEvent::CentralDisconnect { conn } => self.on_disconnect(conn),
            BleEvent::GattsWrite { conn, attr } => Dispatch::Write(self.on_write(conn, attr)),
            BleEvent::GattsReadRequest { conn, attr } => {
                info!("BLE: read request (conn={}, attr={})", conn, attr);
                Dispatch::ReadRequest
            }
            BleEvent::GattcNotify { conn, attr } => {
                info!("BLE: GATTC notify (conn={}, attr={})", conn, attr);
                Dispatch::Notify
            }
            BleEvent::Other(code) => {
                debug!("BLE: unhandled event 0x{:04x}", code);
                Dispatch::Unhandled
            }
        }
    }

    fn on_connect(&mut self, conn: ConnHandle) -> Dispatch {
        info!("BLE: central connected (conn={})", conn);
        if self.connections.insert(conn).is_err() {
            warn!(
                "BLE: connection table full ({}), conn={} not tracked",
                MAX_CONNECTIONS, conn
            );
        }
        self.timer.start(self.clock.now_secs());
        self.state = PeripheralState::Connected;
        Dispatch::Connected(conn)
    }

    fn on_disconnect(&mut self, conn: ConnHandle) -> Dispatch {
        info!("BLE: central disconnected (conn={}), restarting", conn);
        self.connections.remove(&conn);
        let upload_secs = self.timer.stop(self.clock.now_secs());
        self.state = PeripheralState::SessionEnded;
        self.system.restart();
        Dispatch::SessionEnded { upload_secs }
    }

    fn on_write(&mut self, conn: ConnHandle, attr: AttrHandle) -> WriteOutcome {
        if !self.connections.contains(&conn) {
            debug!("BLE: write from untracked conn={} ignored", conn);
            return WriteOutcome::Ignored(IgnoreReason::UnknownConnection);
        }
        if attr != self.handles.rx {
            debug!("BLE: write to attr={} ignored (rx={})", attr, self.handles.rx);
            return WriteOutcome::Ignored(IgnoreReason::NotRxHandle);
        }

        let data = self.radio.gatts_read(self.handles.rx);
        let n = data.len();
        self.rx_buffer.extend_from_slice(&data);
        if let Some(handler) = self.handler.as_mut() {
            handler();
        }
        WriteOutcome::Accepted(n)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> PeripheralState {
        self.state
    }

    pub fn handles(&self) -> GattHandles {
        self.handles
    }

    pub fn payload(&self) -> &AdvertisingPayload {
        &self.payload
    }

    pub fn is_connected(&self, conn: ConnHandle) -> bool {
        self.connections.contains(&conn)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn upload_timer(&self) -> &UploadTimer {
        &self.timer
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn system(&self) -> &S {
        &self.system
    }
}

// ── Tests ────────────────────────────────────────────────────
