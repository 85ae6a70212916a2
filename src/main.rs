//! SensorNode Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter          MqttAdapter     NvsAdapter  HwTimers │
//! │  (Wi-Fi · clock · LED ·   (Transport)     (Config)    (Timer)  │
//! │   GPIO · 1-Wire)                                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            ConnectionSupervisor (pure logic)           │    │
//! │  │  FSM · debouncer · motion latch · sensors · scheduler  │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  ISR (PIR edge) and esp_timer callbacks only store atomics     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{error, info, warn};

use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::gpio::{IOPin, PinDriver, Pull};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::EspWifi;

use sensornode::adapters::device_id;
use sensornode::adapters::hardware::HardwareAdapter;
use sensornode::adapters::mqtt::MqttAdapter;
use sensornode::adapters::nvs::NvsAdapter;
use sensornode::adapters::time::Esp32TimeAdapter;
use sensornode::adapters::wifi::WifiAdapter;
use sensornode::app::ports::{ConfigError, ConfigPort};
use sensornode::app::supervisor::ConnectionSupervisor;
use sensornode::config::DeviceConfig;
use sensornode::drivers::hw_init;
use sensornode::drivers::hw_timer::HwTimers;
use sensornode::drivers::onewire::OneWireBus;
use sensornode::drivers::status_led::StatusLed;

/// Main-loop period.  The debouncer takes one sample per steady cycle.
const LOOP_PERIOD_MS: u32 = 5;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SensorNode v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Initialise hardware peripherals ────────────────────
    hw_init::init_peripherals()?;
    if let Err(e) = hw_init::init_isr_service() {
        error!("ISR service init failed: {} (motion reports disabled)", e);
    }

    // ── 3. Device identity ────────────────────────────────────
    let mac = device_id::read_mac();
    let node = device_id::chip_id(&mac);
    info!("Node {} (MAC {})", node, device_id::mac_string(&mac));

    // ── 4. Load config from NVS (or factory defaults) ─────────
    let store = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init: {e}"))?;
    let config = match store.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(ConfigError::NotFound) => {
            info!("No stored config, writing factory defaults");
            let cfg = DeviceConfig::factory_defaults(node);
            if let Err(e) = store.save(&cfg) {
                warn!("Saving factory defaults failed: {}", e);
            }
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using factory defaults", e);
            DeviceConfig::factory_defaults(node)
        }
    };

    // ── 5. Construct adapters ─────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let esp_wifi = EspWifi::new(peripherals.modem, sys_loop, Some(nvs_partition))?;
    let wifi = WifiAdapter::new(esp_wifi, &mac);

    let mut one_wire_pin = PinDriver::input_output_od(peripherals.pins.gpio5.downgrade())?;
    one_wire_pin.set_pull(Pull::Up)?;
    one_wire_pin.set_high()?;
    let bus = OneWireBus::new(one_wire_pin)?;

    let mut hw = HardwareAdapter::new(wifi, Esp32TimeAdapter::new(), StatusLed::new(), bus, node);
    let mut timers = HwTimers::new();

    let mut supervisor = ConnectionSupervisor::new(config, mac, MqttAdapter::new());
    supervisor.start(hw.uptime_ms(), &mut hw, &mut timers)?;

    info!("System ready. Entering main loop.");

    // ── 6. Main loop ──────────────────────────────────────────
    loop {
        let now_ms = hw.uptime_ms();
        supervisor.tick(now_ms, &mut hw, &mut timers, &store);

        if supervisor.restart_requested() {
            // `restart()` does not return on hardware; this only runs if
            // the restart call itself was skipped.
            warn!("Restart pending, halting main loop");
            FreeRtos::delay_ms(1_000);
            continue;
        }

        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
