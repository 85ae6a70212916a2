//! Application core: pure domain logic, zero I/O.
//!
//! The connectivity lifecycle, telemetry routing and remote commands of the
//! sensor node.  All interaction with hardware and the network happens
//! through **port traits** defined in [`ports`], keeping this layer fully
//! testable without real peripherals.

pub mod commands;
pub mod events;
pub mod ports;
pub mod publisher;
pub mod supervisor;
