//! Peripheral drivers, hardware initialisation, and timing helpers.

pub mod button;
pub mod hw_init;
pub mod hw_timer;
pub mod led_patterns;
pub mod onewire;
pub mod status_led;
