//! DS18B20 thermometers on the `one_wire_bus` master.
//!
//! The bus pin is an open-drain `PinDriver` with the line pulled up; slot
//! timing comes from `Ets`.  Every failed transaction reads back as
//! [`DEVICE_DISCONNECTED_C`], so the sensor table only ever sees a number.

use ds18b20::Resolution;
use one_wire_bus::Address;

use crate::app::ports::RomCode;

/// Read Power Supply: parasite-powered devices pull the next slot low.
pub const CMD_READ_POWER_SUPPLY: u8 = 0xB4;

/// ROM bytes as the search returns them (family code first) to a bus address.
pub fn address_of(rom: &RomCode) -> Address {
    Address(u64::from_le_bytes(*rom))
}

pub fn rom_of(address: Address) -> RomCode {
    address.0.to_le_bytes()
}

/// Nearest supported resolution, clamped to 9..=12 bits.
pub fn resolution_for(bits: u8) -> Resolution {
    match bits {
        0..=9 => Resolution::Bits9,
        10 => Resolution::Bits10,
        11 => Resolution::Bits11,
        _ => Resolution::Bits12,
    }
}

#[cfg(target_os = "espidf")]
pub use esp::OneWireBus;

#[cfg(target_os = "espidf")]
mod esp {
    use ds18b20::Ds18b20;
    use esp_idf_svc::hal::delay::Ets;
    use esp_idf_svc::hal::gpio::{AnyIOPin, InputOutput, PinDriver};
    use heapless::Vec;
    use log::{debug, info, warn};
    use one_wire_bus::OneWire;

    use super::{CMD_READ_POWER_SUPPLY, address_of, resolution_for, rom_of};
    use crate::app::ports::{DEVICE_DISCONNECTED_C, OneWirePort, RomCode};
    use crate::sensors::thermometers::MAX_THERMOMETERS;

    type BusPin = PinDriver<'static, AnyIOPin, InputOutput>;

    pub struct OneWireBus {
        bus: OneWire<BusPin>,
        delay: Ets,
        roms: Vec<RomCode, MAX_THERMOMETERS>,
        /// Highest resolution configured, sets the conversion wait.
        conversion_bits: u8,
    }

    impl OneWireBus {
        pub fn new(pin: BusPin) -> anyhow::Result<Self> {
            let bus = OneWire::new(pin)
                .map_err(|err| anyhow::anyhow!("one-wire bus init failed: {err:?}"))?;
            Ok(Self {
                bus,
                delay: Ets,
                roms: Vec::new(),
                conversion_bits: 9,
            })
        }
    }

    impl OneWirePort for OneWireBus {
        fn device_count(&mut self) -> usize {
            self.roms.clear();
            let mut found = 0usize;
            for result in self.bus.devices(false, &mut self.delay) {
                match result {
                    Ok(address) => {
                        found += 1;
                        if self.roms.push(rom_of(address)).is_err() {
                            debug!("onewire: table full, device #{} not stored", found);
                        }
                    }
                    Err(err) => {
                        warn!("onewire: search aborted: {err:?}");
                        break;
                    }
                }
            }
            info!("onewire: {} device(s) on bus", found);
            found
        }

        fn device_address(&mut self, index: usize) -> Option<RomCode> {
            self.roms.get(index).copied()
        }

        fn set_resolution(&mut self, rom: &RomCode, bits: u8) {
            let sensor = match Ds18b20::new::<core::convert::Infallible>(address_of(rom)) {
                Ok(sensor) => sensor,
                Err(err) => {
                    debug!("onewire: {:02X?} is not a DS18B20: {err:?}", rom);
                    return;
                }
            };
            // Alarm thresholds are unused; keep the power-on defaults.
            match sensor.set_config(-55, 125, resolution_for(bits), &mut self.bus, &mut self.delay) {
                Ok(()) => self.conversion_bits = self.conversion_bits.max(bits.clamp(9, 12)),
                Err(err) => warn!("onewire: resolution write failed: {err:?}"),
            }
        }

        fn is_parasite_powered(&mut self, rom: &RomCode) -> bool {
            let address = address_of(rom);
            if let Err(err) =
                self.bus
                    .send_command(CMD_READ_POWER_SUPPLY, Some(&address), &mut self.delay)
            {
                warn!("onewire: power query failed: {err:?}");
                return false;
            }
            matches!(self.bus.read_bit(&mut self.delay), Ok(false))
        }

        fn request_conversions(&mut self) {
            if let Err(err) =
                ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut self.delay)
            {
                warn!("onewire: conversion start failed: {err:?}");
                return;
            }
            resolution_for(self.conversion_bits).delay_for_measurement_time(&mut self.delay);
        }

        fn read_celsius(&mut self, rom: &RomCode) -> f32 {
            let Ok(sensor) = Ds18b20::new::<core::convert::Infallible>(address_of(rom)) else {
                return DEVICE_DISCONNECTED_C;
            };
            match sensor.read_data(&mut self.bus, &mut self.delay) {
                Ok(data) => data.temperature,
                Err(err) => {
                    debug!("onewire: read failed: {err:?}");
                    DEVICE_DISCONNECTED_C
                }
            }
        }
    }
}
