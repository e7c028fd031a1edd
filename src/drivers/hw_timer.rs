//! One-shot flush timers.
//!
//! Two [`OneShotTimer`] implementations, both ending in
//! `push_event(Event::FlushDue)` so the flush itself always runs on the
//! main loop:
//!
//! - [`FlushTimer`]: a real one-shot `esp_timer`.  The callback runs in
//!   the ESP timer task (not ISR) and only pushes the event.  On
//!   simulation targets it records a deadline and fires from
//!   [`FlushTimer::fire_if_due`].
//! - [`NextOpportunity`]: no hardware timer: the event is raised
//!   immediately and the flush happens on the next main-loop pass.

use log::debug;

use crate::app::ports::OneShotTimer;
use crate::events::{push_event, Event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
unsafe extern "C" fn flush_due_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::FlushDue);
}

// ── esp_timer one-shot ────────────────────────────────────────

pub struct FlushTimer {
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
    #[cfg(not(target_os = "espidf"))]
    deadline: Option<std::time::Instant>,
}

#[cfg(target_os = "espidf")]
impl FlushTimer {
    pub fn new() -> crate::error::Result<Self> {
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        let args = esp_timer_create_args_t {
            callback: Some(flush_due_cb),
            arg: core::ptr::null_mut(),
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: c"flush".as_ptr(),
            skip_unhandled_events: false,
        };
        // SAFETY: `args` outlives the call; `handle` is written only on success.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK as i32 {
            log::error!("hw_timer: flush timer create failed (rc={})", ret);
            return Err(crate::error::Error::Timer(ret));
        }
        log::info!("hw_timer: flush timer ready");
        Ok(Self { handle })
    }
}

#[cfg(target_os = "espidf")]
impl OneShotTimer for FlushTimer {
    fn start_once(&mut self, delay_ms: u32) {
        // SAFETY: `handle` came from a successful esp_timer_create and is
        // only deleted in Drop.  Stopping an idle timer just returns
        // ESP_ERR_INVALID_STATE.
        unsafe {
            esp_timer_stop(self.handle);
            let ret = esp_timer_start_once(self.handle, u64::from(delay_ms) * 1_000);
            if ret != ESP_OK as i32 {
                log::error!("hw_timer: flush start failed (rc={}), flushing now", ret);
                push_event(Event::FlushDue);
                return;
            }
        }
        debug!("hw_timer: flush armed ({} ms)", delay_ms);
    }
}

#[cfg(target_os = "espidf")]
impl Drop for FlushTimer {
    fn drop(&mut self) {
        // SAFETY: see `start_once`; the handle is not used after this.
        unsafe {
            esp_timer_stop(self.handle);
            esp_timer_delete(self.handle);
        }
    }
}

// ── Simulation ────────────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
impl FlushTimer {
    pub fn new() -> crate::error::Result<Self> {
        log::info!("hw_timer(sim): flush timer ready");
        Ok(Self { deadline: None })
    }

    /// Push `FlushDue` if the armed deadline has passed.  Returns whether
    /// it fired.
    pub fn fire_if_due(&mut self) -> bool {
        let due = self.take_due();
        if due {
            push_event(Event::FlushDue);
        }
        due
    }

    /// Disarm and return `true` if the deadline has passed.
    fn take_due(&mut self) -> bool {
        match self.deadline {
            Some(at) if std::time::Instant::now() >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }
}

#[cfg(not(target_os = "espidf"))]
impl OneShotTimer for FlushTimer {
    fn start_once(&mut self, delay_ms: u32) {
        let delay = std::time::Duration::from_millis(u64::from(delay_ms));
        self.deadline = Some(std::time::Instant::now() + delay);
        debug!("hw_timer(sim): flush armed ({} ms)", delay_ms);
    }
}

// ── No timer ──────────────────────────────────────────────────

/// Ignores the delay and schedules the flush for the next loop pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextOpportunity;

impl OneShotTimer for NextOpportunity {
    fn start_once(&mut self, _delay_ms: u32) {
        push_event(Event::FlushDue);
    }
}
