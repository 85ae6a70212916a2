//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the supervisor against
//! the mock node plus the simulated broker, store and timers.  All tests
//! run on the host (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod command_tests;
mod config_tests;
mod lifecycle_tests;
mod mock_hw;
mod telemetry_tests;
