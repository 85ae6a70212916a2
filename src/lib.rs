//! SensorNode firmware library.
//!
//! Exposes the connection lifecycle, telemetry and adapter modules for
//! integration testing and for the firmware binary. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod pins;
pub mod scheduler;
pub mod timing;

// Hardware-facing modules: real implementations on espidf, simulation
// twins everywhere else.
pub mod adapters;
pub mod drivers;
pub mod sensors;
