//! ESP32 time adapter.
//!
//! Monotonic uptime for the main loop plus the SNTP-backed wall clock used
//! in heartbeat timestamps.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` (microsecond
//!   precision, monotonic) and `esp_idf_svc::sntp::EspSntp`.
//! - **`not(target_os = "espidf")`**: `std::time::Instant`, and the host
//!   clock counts as synchronised once sync has been started.

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sntp::{EspSntp, SyncStatus};

/// Wall-clock values before 2020-01-01 mean the clock was never set.
const EPOCH_2020: i64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    sync_started: bool,
    #[cfg(target_os = "espidf")]
    sntp: Option<EspSntp<'static>>,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sync_started: false,
            #[cfg(target_os = "espidf")]
            sntp: None,
        }
    }

    /// Milliseconds since boot, wrapping at `u32::MAX` (~49.7 days).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    /// Milliseconds since boot, wrapping at `u32::MAX` (~49.7 days).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }

    /// Start SNTP.  Idempotent.
    #[cfg(target_os = "espidf")]
    pub fn start_sync(&mut self) {
        if self.sntp.is_some() {
            return;
        }
        match EspSntp::new_default() {
            Ok(sntp) => {
                info!("time: SNTP started");
                self.sntp = Some(sntp);
            }
            Err(e) => warn!("time: SNTP start failed: {:?}", e),
        }
    }

    /// Start SNTP.  Idempotent.
    #[cfg(not(target_os = "espidf"))]
    pub fn start_sync(&mut self) {
        if !self.sync_started {
            info!("time(sim): sync started");
        }
        self.sync_started = true;
    }

    #[cfg(target_os = "espidf")]
    fn synchronised(&self) -> bool {
        self.sntp
            .as_ref()
            .is_some_and(|s| s.get_sync_status() == SyncStatus::Completed)
    }

    #[cfg(not(target_os = "espidf"))]
    fn synchronised(&self) -> bool {
        self.sync_started
    }

    /// Seconds since the Unix epoch, `None` until the clock is set.
    pub fn unix_time(&self) -> Option<i64> {
        if !self.synchronised() {
            return None;
        }
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()?;
        let secs = i64::try_from(now.as_secs()).ok()?;
        if secs < EPOCH_2020 {
            warn!("time: clock reports {} s, not yet set", secs);
            return None;
        }
        Some(secs)
    }
}
