//! Single-colour status LED driver.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the status GPIO via hw_init (polarity from `pins`).
//! On host/test: tracks state in-memory only.

use crate::drivers::hw_init;
use crate::pins;

pub struct StatusLed {
    gpio: i32,
    lit: bool,
    writes: u32,
}

impl StatusLed {
    pub fn new() -> Self {
        Self {
            gpio: pins::STATUS_LED_GPIO,
            lit: false,
            writes: 0,
        }
    }

    /// Light or darken the LED.  Repeated writes of the same level are
    /// skipped.
    pub fn set(&mut self, lit: bool) {
        if lit == self.lit && self.writes > 0 {
            return;
        }
        let level = if lit {
            pins::STATUS_LED_ACTIVE_LEVEL
        } else {
            !pins::STATUS_LED_ACTIVE_LEVEL
        };
        hw_init::gpio_write(self.gpio, level);
        self.lit = lit;
        self.writes = self.writes.wrapping_add(1);
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    /// GPIO writes issued so far.
    pub fn writes(&self) -> u32 {
        self.writes
    }
}

impl Default for StatusLed {
    fn default() -> Self {
        Self::new()
    }
}
