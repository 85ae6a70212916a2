//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the Wi-Fi adapter, the clock, the status LED and the 1-Wire bus,
//! exposing them through [`NetworkPort`], [`SystemPort`], [`InputPort`] and
//! [`OneWirePort`].  The supervisor only ever sees the composite
//! [`NodeHardware`](crate::app::ports::NodeHardware) bound.  On non-espidf
//! targets the underlying drivers use cfg-gated simulation stubs.

use log::{info, warn};

use crate::adapters::time::Esp32TimeAdapter;
use crate::adapters::wifi::WifiAdapter;
use crate::app::ports::{InputPort, LinkInfo, NetworkPort, OneWirePort, RomCode, SystemPort};
use crate::drivers::hw_init;
use crate::drivers::status_led::StatusLed;
use crate::error::LinkError;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<B> {
    wifi: WifiAdapter,
    clock: Esp32TimeAdapter,
    led: StatusLed,
    bus: B,
    chip_id: u32,
    restart_requests: u32,
}

impl<B: OneWirePort> HardwareAdapter<B> {
    pub fn new(wifi: WifiAdapter, clock: Esp32TimeAdapter, led: StatusLed, bus: B, chip_id: u32) -> Self {
        Self {
            wifi,
            clock,
            led,
            bus,
            chip_id,
            restart_requests: 0,
        }
    }

    /// Milliseconds since boot, for the main loop.
    pub fn uptime_ms(&self) -> u32 {
        self.clock.uptime_ms()
    }

    pub fn wifi(&self) -> &WifiAdapter {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut WifiAdapter {
        &mut self.wifi
    }

    pub fn led(&self) -> &StatusLed {
        &self.led
    }

    /// Restart requests seen (only observable off-target).
    pub fn restart_requests(&self) -> u32 {
        self.restart_requests
    }
}

// ── NetworkPort implementation ────────────────────────────────

impl<B: OneWirePort> NetworkPort for HardwareAdapter<B> {
    fn is_associated(&self) -> bool {
        self.wifi.is_associated()
    }

    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        self.wifi.begin_association(ssid, password)
    }

    fn check_upstream(&mut self, host: &str, port: u16) -> bool {
        self.wifi.check_upstream(host, port)
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        self.wifi.start_access_point(ssid, password)
    }

    fn link_info(&self) -> LinkInfo {
        self.wifi.link_info()
    }
}

// ── SystemPort implementation ─────────────────────────────────

impl<B: OneWirePort> SystemPort for HardwareAdapter<B> {
    fn restart(&mut self) {
        self.restart_requests = self.restart_requests.saturating_add(1);
        warn!("system: restart requested");
        #[cfg(target_os = "espidf")]
        esp_idf_svc::hal::reset::restart();
    }

    #[cfg(target_os = "espidf")]
    fn free_heap(&self) -> u32 {
        // SAFETY: read-only heap statistics query.
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    #[cfg(not(target_os = "espidf"))]
    fn free_heap(&self) -> u32 {
        256 * 1024
    }

    fn chip_id(&self) -> u32 {
        self.chip_id
    }

    fn set_status_led(&mut self, on: bool) {
        self.led.set(on);
    }

    fn start_time_sync(&mut self) {
        info!("system: starting time sync");
        self.clock.start_sync();
    }

    fn unix_time(&self) -> Option<i64> {
        self.clock.unix_time()
    }
}

// ── InputPort implementation ──────────────────────────────────

impl<B: OneWirePort> InputPort for HardwareAdapter<B> {
    fn read_level(&mut self, gpio: i32) -> bool {
        hw_init::gpio_read(gpio)
    }
}

// ── OneWirePort implementation ────────────────────────────────

impl<B: OneWirePort> OneWirePort for HardwareAdapter<B> {
    fn device_count(&mut self) -> usize {
        self.bus.device_count()
    }

    fn device_address(&mut self, index: usize) -> Option<RomCode> {
        self.bus.device_address(index)
    }

    fn set_resolution(&mut self, rom: &RomCode, bits: u8) {
        self.bus.set_resolution(rom, bits);
    }

    fn is_parasite_powered(&mut self, rom: &RomCode) -> bool {
        self.bus.is_parasite_powered(rom)
    }

    fn request_conversions(&mut self) {
        self.bus.request_conversions();
    }

    fn read_celsius(&mut self, rom: &RomCode) -> f32 {
        self.bus.read_celsius(rom)
    }
}
