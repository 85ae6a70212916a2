//! 1-Wire thermometer table.
//!
//! `enumerate()` runs once at startup and fills a fixed-capacity table;
//! devices beyond capacity are logged and ignored.  `poll_all()` triggers
//! one bus-wide conversion and reads every device, dropping the
//! disconnected sentinel so a flaky sensor never overwrites its last good
//! value.

use heapless::Vec;
use log::{info, warn};
use serde::Serialize;

use crate::adapters::utils::hex_join;
use crate::app::ports::{DEVICE_DISCONNECTED_C, OneWirePort, RomCode};

/// Capacity of the thermometer table.
pub const MAX_THERMOMETERS: usize = 32;

/// Resolution applied to every device at enumeration.
pub const RESOLUTION_BITS: u8 = 12;

/// One discovered thermometer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThermometerRecord {
    #[serde(skip)]
    pub address: RomCode,
    /// `28:FF:…` rendering of the address, also the topic suffix.
    pub name: String,
    pub last_temperature_c: Option<f32>,
    pub resolution_bits: u8,
    pub parasite_powered: bool,
}

/// A valid reading from one poll.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub index: usize,
    pub celsius: f32,
}

impl Reading {
    /// Two-decimal Celsius payload, e.g. `21.50`.
    pub fn payload(&self) -> String {
        format!("{:.2}", self.celsius)
    }
}

/// Owner of the thermometer table.
pub struct SensorBus {
    devices: Vec<ThermometerRecord, MAX_THERMOMETERS>,
    truncated: usize,
}

impl SensorBus {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
            truncated: 0,
        }
    }

    /// Discover devices and configure each one.  Returns the table length.
    pub fn enumerate(&mut self, bus: &mut impl OneWirePort) -> usize {
        self.devices.clear();
        let found = bus.device_count();
        self.truncated = found.saturating_sub(MAX_THERMOMETERS);
        if self.truncated > 0 {
            warn!(
                "sensors: {} thermometers on bus, keeping first {}",
                found, MAX_THERMOMETERS
            );
        }

        for index in 0..found.min(MAX_THERMOMETERS) {
            let Some(address) = bus.device_address(index) else {
                warn!("sensors: no address for device #{}", index);
                continue;
            };
            bus.set_resolution(&address, RESOLUTION_BITS);
            let parasite_powered = bus.is_parasite_powered(&address);
            let record = ThermometerRecord {
                address,
                name: address_name(&address),
                last_temperature_c: None,
                resolution_bits: RESOLUTION_BITS,
                parasite_powered,
            };
            info!(
                "sensors: {} ({})",
                record.name,
                if parasite_powered { "parasite" } else { "external" }
            );
            // Capacity is bounded by the loop range.
            let _ = self.devices.push(record);
        }
        self.devices.len()
    }

    /// Convert and read every device.  Only valid readings are returned.
    pub fn poll_all(&mut self, bus: &mut impl OneWirePort) -> std::vec::Vec<Reading> {
        let mut readings = std::vec::Vec::with_capacity(self.devices.len());
        if self.devices.is_empty() {
            return readings;
        }
        bus.request_conversions();
        for (index, dev) in self.devices.iter_mut().enumerate() {
            let celsius = bus.read_celsius(&dev.address);
            if is_sentinel(celsius) {
                warn!("sensors: {} disconnected", dev.name);
                continue;
            }
            dev.last_temperature_c = Some(celsius);
            readings.push(Reading { index, celsius });
        }
        readings
    }

    pub fn devices(&self) -> &[ThermometerRecord] {
        &self.devices
    }

    pub fn device(&self, index: usize) -> Option<&ThermometerRecord> {
        self.devices.get(index)
    }

    /// Devices found but not stored at the last enumeration.
    pub fn truncated(&self) -> usize {
        self.truncated
    }
}

impl Default for SensorBus {
    fn default() -> Self {
        Self::new()
    }
}

/// `28:FF:4C:5B:91:16:04:6A`.
pub fn address_name(address: &RomCode) -> String {
    hex_join(address, Some(':'))
}

fn is_sentinel(celsius: f32) -> bool {
    (celsius - DEVICE_DISCONNECTED_C).abs() < f32::EPSILON || celsius.is_nan()
}
