//! Bluedroid radio adapter.
//!
//! Implements [`RadioPort`] on top of the ESP-IDF Bluedroid host.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_ble_gatts_*` / `esp_ble_gap_*` FFI.
//!   Bluedroid reports everything through C callbacks running in its own
//!   task; those callbacks only record handles and queue [`BleEvent`]s,
//!   which the main loop collects with [`BluedroidRadio::poll_event`].
//!
//! A write event carries its value in the same queue entry.  Polling the
//! event stores the value as the attribute's current value, which
//! `gatts_read` then returns.  A write the controller ignores is simply
//! overwritten by the next one, and an event dropped on overflow takes its
//! value with it.
//! - **all other targets**: an in-memory loopback.  Tests and the host
//!   simulation inject central activity with `sim_*` helpers and inspect
//!   what was notified and advertised.

use std::collections::HashMap;

use log::info;

use crate::app::events::BleEvent;
use crate::app::ports::RadioPort;
use crate::error::{RadioError, Result};
use crate::gatt::{AttrHandle, ConnHandle, ServiceDef};

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

/// A stack event plus, for writes, the value written.
type Pending = (BleEvent, Option<Vec<u8>>);

pub struct BluedroidRadio {
    active: bool,
    /// Current value of each written characteristic.
    values: HashMap<AttrHandle, Vec<u8>>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimState,
}

#[cfg(not(target_os = "espidf"))]
#[derive(Default)]
struct SimState {
    next_handle: AttrHandle,
    notified: Vec<(ConnHandle, AttrHandle, Vec<u8>)>,
    advertising: Option<(u32, Vec<u8>)>,
    pending: VecDeque<Pending>,
}

impl Default for BluedroidRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl BluedroidRadio {
    pub fn new() -> Self {
        Self {
            active: false,
            values: HashMap::new(),
            #[cfg(not(target_os = "espidf"))]
            sim: SimState {
                next_handle: 1,
                ..SimState::default()
            },
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn require_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(RadioError::NotActive.into())
        }
    }

    /// Next event reported by the stack, oldest first.  A write's value
    /// becomes readable through `gatts_read` as its event is returned.
    pub fn poll_event(&mut self) -> Option<BleEvent> {
        let (event, value) = self.next_pending()?;
        if let (BleEvent::GattsWrite { attr, .. }, Some(value)) = (event, value) {
            self.values.insert(attr, value);
        }
        Some(event)
    }

    #[cfg(target_os = "espidf")]
    fn next_pending(&mut self) -> Option<Pending> {
        stack::take_event()
    }

    #[cfg(not(target_os = "espidf"))]
    fn next_pending(&mut self) -> Option<Pending> {
        self.sim.pending.pop_front()
    }

    fn current_value(&self, attr: AttrHandle) -> Vec<u8> {
        self.values.get(&attr).cloned().unwrap_or_default()
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF
// ───────────────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
impl RadioPort for BluedroidRadio {
    fn activate(&mut self, on: bool) -> Result<()> {
        if on == self.active {
            return Ok(());
        }
        if on {
            stack::start()?;
        } else {
            stack::stop();
        }
        self.active = on;
        info!("BLE: radio {}", if on { "active" } else { "off" });
        Ok(())
    }

    fn register_service(&mut self, service: &ServiceDef) -> Result<Vec<AttrHandle>> {
        self.require_active()?;
        stack::register(service)
    }

    fn gatts_read(&mut self, attr: AttrHandle) -> Vec<u8> {
        self.current_value(attr)
    }

    fn gatts_notify(&mut self, conn: ConnHandle, attr: AttrHandle, data: &[u8]) -> Result<()> {
        self.require_active()?;
        stack::notify(conn, attr, data)
    }

    fn gap_advertise(&mut self, interval_us: u32, adv_data: &[u8]) -> Result<()> {
        self.require_active()?;
        stack::advertise(interval_us, adv_data)
    }

    fn stop_advertising(&mut self) -> Result<()> {
        self.require_active()?;
        stack::stop_advertising()
    }
}

#[cfg(target_os = "espidf")]
mod stack {
    //! Bluedroid callback bridge.
    //!
    //! Bluedroid callbacks are C function pointers that cannot capture Rust
    //! closures.  Atomics and mutex-guarded queues carry state between the
    //! callback task and the adapter.  GATTS callbacks run in the Bluedroid
    //! task (not ISR), so std `Mutex` is safe here.

    use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use esp_idf_svc::sys::*;
    use log::{error, info, warn};

    use crate::advertising::Uuid;
    use super::Pending;
    use crate::app::events::BleEvent;
    use crate::error::{RadioError, Result};
    use crate::gatt::{AttrHandle, CharDef, CharFlags, ConnHandle, ServiceDef};

    const EVENT_QUEUE_CAP: usize = 16;
    const MAX_CHARS: usize = 4;
    const CCCD_UUID: u16 = 0x2902;
    const LOCAL_MTU: u16 = 517;
    const REGISTER_POLL: Duration = Duration::from_millis(10);
    const REGISTER_ATTEMPTS: u32 = 200;

    static GATTS_IF: AtomicU32 = AtomicU32::new(0);
    static SVC_HANDLE: AtomicU32 = AtomicU32::new(0);
    static CHAR_STEP: AtomicU32 = AtomicU32::new(0);
    static REGISTERED: AtomicBool = AtomicBool::new(false);
    static ADV_INTERVAL_US: AtomicU32 = AtomicU32::new(500_000);
    static CHAR_HANDLES: [AtomicU32; MAX_CHARS] = [const { AtomicU32::new(0) }; MAX_CHARS];

    static SERVICE: Mutex<Option<ServiceDef>> = Mutex::new(None);
    static EVENTS: Mutex<heapless::Deque<Pending, EVENT_QUEUE_CAP>> = Mutex::new(heapless::Deque::new());

    fn check(ret: esp_err_t, err: fn(i32) -> RadioError) -> Result<()> {
        if ret == ESP_OK as i32 { Ok(()) } else { Err(err(ret).into()) }
    }

    fn push(event: BleEvent) {
        push_pending((event, None));
    }

    fn push_pending(entry: Pending) {
        match EVENTS.lock() {
            Ok(mut q) => {
                if let Err((event, _)) = q.push_back(entry) {
                    warn!("BLE: event queue full, dropped {:?}", event);
                }
            }
            Err(_) => error!("BLE: event queue poisoned"),
        }
    }

    pub(super) fn take_event() -> Option<Pending> {
        EVENTS.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn uuid_to_esp(uuid: Uuid) -> esp_bt_uuid_t {
        let mut t: esp_bt_uuid_t = unsafe { core::mem::zeroed() };
        match uuid {
            Uuid::U16(v) => {
                t.len = 2;
                t.uuid.uuid16 = v;
            }
            Uuid::U32(v) => {
                t.len = 4;
                t.uuid.uuid32 = v;
            }
            Uuid::U128(v) => {
                t.len = 16;
                t.uuid.uuid128 = v.to_le_bytes();
            }
        }
        t
    }

    fn perms(flags: CharFlags) -> esp_gatt_perm_t {
        let mut perm = 0;
        if flags.contains(CharFlags::READ) {
            perm |= ESP_GATT_PERM_READ;
        }
        if flags.contains(CharFlags::WRITE) || flags.contains(CharFlags::WRITE_NO_RESPONSE) {
            perm |= ESP_GATT_PERM_WRITE;
        }
        perm as esp_gatt_perm_t
    }

    fn chars() -> &'static [CharDef] {
        SERVICE
            .lock()
            .ok()
            .and_then(|s| (*s).map(|svc| svc.characteristics))
            .unwrap_or(&[])
    }

    /// Add characteristic `index`, or mark registration complete.
    unsafe fn add_char_or_finish(index: usize) {
        let defs = chars();
        let Some(def) = defs.get(index) else {
            REGISTERED.store(true, Ordering::Release);
            info!("BLE GATTS: {} characteristics registered", defs.len());
            return;
        };
        CHAR_STEP.store(index as u32, Ordering::Relaxed);
        let mut uuid = uuid_to_esp(Uuid::U128(def.uuid));
        let svc = SVC_HANDLE.load(Ordering::Relaxed) as u16;
        unsafe {
            esp_ble_gatts_add_char(
                svc,
                &mut uuid,
                perms(def.flags),
                def.flags.bits() as esp_gatt_char_prop_t,
                core::ptr::null_mut(),
                core::ptr::null_mut(),
            );
        }
    }

    unsafe extern "C" fn gap_event_handler(
        event: esp_gap_ble_cb_event_t,
        param: *mut esp_ble_gap_cb_param_t,
    ) {
        match event {
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_DATA_RAW_SET_COMPLETE_EVT => {
                let units = ADV_INTERVAL_US.load(Ordering::Relaxed) / 625;
                let units = units.clamp(0x20, 0x4000) as u16;
                let mut params = esp_ble_adv_params_t {
                    adv_int_min: units,
                    adv_int_max: units,
                    adv_type: esp_ble_adv_type_t_ADV_TYPE_IND,
                    own_addr_type: esp_ble_addr_type_t_BLE_ADDR_TYPE_PUBLIC,
                    channel_map: esp_ble_adv_channel_t_ADV_CHNL_ALL,
                    adv_filter_policy: esp_ble_adv_filter_t_ADV_FILTER_ALLOW_SCAN_ANY_CON_ANY,
                    ..unsafe { core::mem::zeroed() }
                };
                unsafe { esp_ble_gap_start_advertising(&mut params) };
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_START_COMPLETE_EVT => {
                let status = unsafe { (*param).adv_start_cmpl.status };
                if status == esp_bt_status_t_ESP_BT_STATUS_SUCCESS {
                    info!("BLE GAP: advertising started");
                } else {
                    warn!("BLE GAP: advertising start failed (status={})", status);
                }
            }
            esp_gap_ble_cb_event_t_ESP_GAP_BLE_ADV_STOP_COMPLETE_EVT => {
                info!("BLE GAP: advertising stopped");
            }
            _ => {}
        }
    }

    unsafe extern "C" fn gatts_event_handler(
        event: esp_gatts_cb_event_t,
        gatts_if: esp_gatt_if_t,
        param: *mut esp_ble_gatts_cb_param_t,
    ) {
        match event {
            esp_gatts_cb_event_t_ESP_GATTS_REG_EVT => {
                GATTS_IF.store(gatts_if as u32, Ordering::Relaxed);
                let Some(svc) = SERVICE.lock().ok().and_then(|s| *s) else {
                    return;
                };
                info!("BLE GATTS: app registered (if={})", gatts_if);
                let mut svc_id = esp_gatt_srvc_id_t {
                    id: esp_gatt_id_t {
                        uuid: uuid_to_esp(svc.uuid),
                        inst_id: 0,
                    },
                    is_primary: true,
                };
                // Service decl + (decl, value, CCCD) per characteristic.
                let num_handles = 1 + 3 * svc.characteristics.len() as u16;
                unsafe { esp_ble_gatts_create_service(gatts_if, &mut svc_id, num_handles) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_CREATE_EVT => {
                let svc_handle = unsafe { (*param).create.service_handle };
                SVC_HANDLE.store(svc_handle as u32, Ordering::Relaxed);
                info!("BLE GATTS: service created (handle={})", svc_handle);
                unsafe {
                    esp_ble_gatts_start_service(svc_handle);
                    add_char_or_finish(0);
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_EVT => {
                let handle = unsafe { (*param).add_char.attr_handle };
                let step = CHAR_STEP.load(Ordering::Relaxed) as usize;
                if let Some(slot) = CHAR_HANDLES.get(step) {
                    slot.store(handle as u32, Ordering::Relaxed);
                }
                info!("BLE GATTS: char {} (handle={})", step, handle);

                let notify = chars()
                    .get(step)
                    .is_some_and(|c| c.flags.contains(CharFlags::NOTIFY));
                if notify {
                    let mut cccd = uuid_to_esp(Uuid::U16(CCCD_UUID));
                    unsafe {
                        esp_ble_gatts_add_char_descr(
                            SVC_HANDLE.load(Ordering::Relaxed) as u16,
                            &mut cccd,
                            (ESP_GATT_PERM_READ | ESP_GATT_PERM_WRITE) as esp_gatt_perm_t,
                            core::ptr::null_mut(),
                            core::ptr::null_mut(),
                        );
                    }
                } else {
                    unsafe { add_char_or_finish(step + 1) };
                }
            }
            esp_gatts_cb_event_t_ESP_GATTS_ADD_CHAR_DESCR_EVT => {
                let step = CHAR_STEP.load(Ordering::Relaxed) as usize;
                unsafe { add_char_or_finish(step + 1) };
            }
            esp_gatts_cb_event_t_ESP_GATTS_CONNECT_EVT => {
                let conn = unsafe { (*param).connect.conn_id };
                push(BleEvent::CentralConnect { conn });
            }
            esp_gatts_cb_event_t_ESP_GATTS_DISCONNECT_EVT => {
                let conn = unsafe { (*param).disconnect.conn_id };
                push(BleEvent::CentralDisconnect { conn });
            }
            esp_gatts_cb_event_t_ESP_GATTS_MTU_EVT => {
                let p = unsafe { &(*param).mtu };
                info!("BLE GATTS: MTU {} (conn={})", p.mtu, p.conn_id);
            }
            esp_gatts_cb_event_t_ESP_GATTS_READ_EVT => {
                let p = unsafe { &(*param).read };
                push(BleEvent::GattsReadRequest {
                    conn: p.conn_id,
                    attr: p.handle,
                });
            }
            esp_gatts_cb_event_t_ESP_GATTS_WRITE_EVT => {
                let p = unsafe { &(*param).write };
                if p.need_rsp {
                    unsafe {
                        esp_ble_gatts_send_response(
                            gatts_if,
                            p.conn_id,
                            p.trans_id,
                            esp_gatt_status_t_ESP_GATT_OK,
                            core::ptr::null_mut(),
                        );
                    }
                }
                let is_char = CHAR_HANDLES
                    .iter()
                    .any(|h| h.load(Ordering::Relaxed) == p.handle as u32);
                if !is_char {
                    // CCCD subscription writes land here.
                    return;
                }
                let data = if p.value.is_null() {
                    Vec::new()
                } else {
                    unsafe { core::slice::from_raw_parts(p.value, p.len as usize) }.to_vec()
                };
                push_pending((
                    BleEvent::GattsWrite {
                        conn: p.conn_id,
                        attr: p.handle,
                    },
                    Some(data),
                ));
            }
            _ => {}
        }
    }

    pub(super) fn start() -> Result<()> {
        let stack_err = RadioError::Stack;
        unsafe {
            // BLE-only: release classic BT memory.
            esp_bt_controller_mem_release(esp_bt_mode_t_ESP_BT_MODE_CLASSIC_BT);

            let mut bt_cfg = esp_bt_controller_config_t::default();
            check(esp_bt_controller_init(&mut bt_cfg), stack_err)?;
            check(esp_bt_controller_enable(esp_bt_mode_t_ESP_BT_MODE_BLE), stack_err)?;
            check(esp_bluedroid_init(), stack_err)?;
            check(esp_bluedroid_enable(), stack_err)?;

            check(esp_ble_gap_register_callback(Some(gap_event_handler)), stack_err)?;
            check(esp_ble_gatts_register_callback(Some(gatts_event_handler)), stack_err)?;
            if esp_ble_gatt_set_local_mtu(LOCAL_MTU) != ESP_OK as i32 {
                warn!("BLE: could not raise local MTU to {}", LOCAL_MTU);
            }
        }
        info!("BLE(espidf): Bluedroid stack initialized");
        Ok(())
    }

    pub(super) fn stop() {
        unsafe {
            esp_ble_gap_stop_advertising();
            esp_bluedroid_disable();
            esp_bluedroid_deinit();
            esp_bt_controller_disable();
            esp_bt_controller_deinit();
        }
        info!("BLE(espidf): stack shut down");
    }

    pub(super) fn register(service: &ServiceDef) -> Result<Vec<AttrHandle>> {
        let count = service.characteristics.len();
        if count > MAX_CHARS {
            return Err(RadioError::Registration.into());
        }
        match SERVICE.lock() {
            Ok(mut s) => *s = Some(*service),
            Err(_) => return Err(RadioError::Registration.into()),
        }
        REGISTERED.store(false, Ordering::Release);
        for slot in &CHAR_HANDLES {
            slot.store(0, Ordering::Relaxed);
        }

        check(unsafe { esp_ble_gatts_app_register(0) }, RadioError::Stack)?;

        // Registration completes across several callbacks.
        for _ in 0..REGISTER_ATTEMPTS {
            if REGISTERED.load(Ordering::Acquire) {
                return Ok(CHAR_HANDLES[..count]
                    .iter()
                    .map(|h| h.load(Ordering::Relaxed) as AttrHandle)
                    .collect());
            }
            std::thread::sleep(REGISTER_POLL);
        }
        error!("BLE GATTS: service registration timed out");
        Err(RadioError::Registration.into())
    }

    pub(super) fn notify(conn: ConnHandle, attr: AttrHandle, data: &[u8]) -> Result<()> {
        let gatts_if = GATTS_IF.load(Ordering::Relaxed) as esp_gatt_if_t;
        let ret = unsafe {
            esp_ble_gatts_send_indicate(
                gatts_if,
                conn,
                attr,
                data.len() as u16,
                data.as_ptr() as *mut u8,
                false,
            )
        };
        check(ret, RadioError::Notify)
    }

    pub(super) fn advertise(interval_us: u32, adv_data: &[u8]) -> Result<()> {
        ADV_INTERVAL_US.store(interval_us, Ordering::Relaxed);
        // Advertising starts from the RAW_SET_COMPLETE callback.
        let ret = unsafe {
            esp_ble_gap_config_adv_data_raw(adv_data.as_ptr() as *mut u8, adv_data.len() as u32)
        };
        check(ret, RadioError::Advertise)
    }

    pub(super) fn stop_advertising() -> Result<()> {
        check(unsafe { esp_ble_gap_stop_advertising() }, RadioError::Advertise)
    }
}

// ───────────────────────────────────────────────────────────────
// Simulation
// ───────────────────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl RadioPort for BluedroidRadio {
    fn activate(&mut self, on: bool) -> Result<()> {
        self.active = on;
        info!("BLE(sim): radio {}", if on { "active" } else { "off" });
        Ok(())
    }

    fn register_service(&mut self, service: &ServiceDef) -> Result<Vec<AttrHandle>> {
        self.require_active()?;
        // Service declaration, then (declaration, value) per characteristic.
        self.sim.next_handle += 1;
        let handles: Vec<AttrHandle> = service
            .characteristics
            .iter()
            .map(|_| {
                let value = self.sim.next_handle + 1;
                self.sim.next_handle += 2;
                value
            })
            .collect();
        info!("BLE(sim): registered service {:?} -> {:?}", service.uuid, handles);
        Ok(handles)
    }

    fn gatts_read(&mut self, attr: AttrHandle) -> Vec<u8> {
        self.current_value(attr)
    }

    fn gatts_notify(&mut self, conn: ConnHandle, attr: AttrHandle, data: &[u8]) -> Result<()> {
        self.require_active()?;
        self.sim.notified.push((conn, attr, data.to_vec()));
        Ok(())
    }

    fn gap_advertise(&mut self, interval_us: u32, adv_data: &[u8]) -> Result<()> {
        self.require_active()?;
        self.sim.advertising = Some((interval_us, adv_data.to_vec()));
        info!("BLE(sim): advertising {} bytes every {} us", adv_data.len(), interval_us);
        Ok(())
    }

    fn stop_advertising(&mut self) -> Result<()> {
        self.sim.advertising = None;
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
impl BluedroidRadio {
    /// Queue a raw stack event, as the host callback would report it.
    /// Returns `false` if `data` is too short for `code`.
    pub fn sim_irq(&mut self, code: u32, data: &[u16]) -> bool {
        match BleEvent::from_irq(code, data) {
            Some(event) => {
                self.sim.pending.push_back((event, None));
                true
            }
            None => false,
        }
    }

    pub fn sim_connect(&mut self, conn: ConnHandle) {
        self.sim_irq(crate::app::events::IRQ_CENTRAL_CONNECT, &[conn, 0, 0]);
    }

    pub fn sim_disconnect(&mut self, conn: ConnHandle) {
        self.sim_irq(crate::app::events::IRQ_CENTRAL_DISCONNECT, &[conn, 0, 0]);
    }

    /// Central writes `data` to `attr` on `conn`.
    pub fn sim_write(&mut self, conn: ConnHandle, attr: AttrHandle, data: &[u8]) {
        self.sim
            .pending
            .push_back((BleEvent::GattsWrite { conn, attr }, Some(data.to_vec())));
    }

    /// Everything notified so far, as `(conn, attr, bytes)`.
    pub fn notified(&self) -> &[(ConnHandle, AttrHandle, Vec<u8>)] {
        &self.sim.notified
    }

    pub fn take_notified(&mut self) -> Vec<(ConnHandle, AttrHandle, Vec<u8>)> {
        core::mem::take(&mut self.sim.notified)
    }

    /// Current advertising interval and payload, if advertising.
    pub fn advertising(&self) -> Option<&(u32, Vec<u8>)> {
        self.sim.advertising.as_ref()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
