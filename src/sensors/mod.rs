//! Sensor subsystem: the 1-Wire thermometer table and the PIR latch.
//!
//! Digital inputs are debounced in [`crate::drivers::button`]; everything
//! here either owns bus state ([`thermometers::SensorBus`]) or is written
//! from interrupt context ([`motion::MotionChannel`]).

pub mod motion;
pub mod thermometers;

use motion::MotionChannel;

use crate::pins;

/// Motion channels reachable from the GPIO ISR.  Channel 0 is `PIR0`.
pub static MOTION_CHANNELS: [MotionChannel; 1] = [MotionChannel::new(pins::PIR_GPIO)];
