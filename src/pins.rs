//! GPIO pin assignments for the sensor node board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Digital inputs (push buttons / dry contacts, active LOW with pull-up)
// ---------------------------------------------------------------------------

/// Debounced digital inputs, in channel order (DI0..DI3).
pub const DIGITAL_INPUT_GPIOS: [i32; 4] = [12, 13, 14, 16];

/// Number of debounced input channels.
pub const DIGITAL_INPUT_COUNT: usize = DIGITAL_INPUT_GPIOS.len();

// ---------------------------------------------------------------------------
// Motion sensor
// ---------------------------------------------------------------------------

/// PIR motion sensor output.  Interrupt on any edge; HIGH = motion.
pub const PIR_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// 1-Wire bus
// ---------------------------------------------------------------------------

/// DS18B20 data line (open-drain, external 4.7 kΩ pull-up).
pub const ONE_WIRE_GPIO: i32 = 5;

// ---------------------------------------------------------------------------
// Status LED
// ---------------------------------------------------------------------------

/// On-board status LED.  Active LOW on most dev boards.
pub const STATUS_LED_GPIO: i32 = 2;

/// Logic level that lights the status LED.
pub const STATUS_LED_ACTIVE_LEVEL: bool = false;
