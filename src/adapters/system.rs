//! Device restart.
//!
//! `esp_restart()` on hardware.  The simulation only counts requests so the
//! host loop and tests can observe a session ending.

use log::warn;

use crate::app::ports::SystemPort;

#[derive(Debug, Default)]
pub struct Esp32System {
    #[cfg(not(target_os = "espidf"))]
    restarts: u32,
}

impl Esp32System {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn restart_count(&self) -> u32 {
        self.restarts
    }
}

impl SystemPort for Esp32System {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self) {
        warn!("system: restarting");
        unsafe { esp_idf_svc::sys::esp_restart() };
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self) {
        self.restarts += 1;
        warn!("system(sim): restart requested ({})", self.restarts);
    }
}
