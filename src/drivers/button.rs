//! Shift-register debouncer for the digital inputs.
//!
//! ## Hardware
//!
//! Active-low switches with pull-ups: a raw HIGH sample means "open".
//! The main loop samples each pin once per steady cycle and shifts the
//! level into a 32-bit register (oldest sample falls off the top).
//!
//! ## Classification
//!
//! | Register       | State                                        |
//! |----------------|----------------------------------------------|
//! | all zeros      | `Pressed`, `LongPressed` once held past the threshold |
//! | all ones       | `NotPressed`                                 |
//! | anything else  | `Bouncing`                                   |
//!
//! Press timing uses 16-bit millisecond timestamps and wrap-safe
//! subtraction, so the long-press threshold must stay below 65 536 ms.
//! The debouncer never publishes; it reports the state plus a `changed`
//! flag and leaves publication to the caller.

use crate::timing::elapsed_ms16;

/// Number of identical consecutive samples needed for a stable state.
pub const REGISTER_WIDTH: u32 = u32::BITS;

const ALL_RELEASED: u32 = u32::MAX;
const ALL_PRESSED: u32 = 0;

/// Debounced logical state of one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ButtonState {
    NotPressed,
    Pressed,
    LongPressed,
    Bouncing,
}

impl ButtonState {
    /// Wire representation, also used on the status page.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotPressed => "not_pressed",
            Self::Pressed => "pressed",
            Self::LongPressed => "long_pressed",
            Self::Bouncing => "bouncing",
        }
    }

    const fn is_pressed_family(self) -> bool {
        matches!(self, Self::Pressed | Self::LongPressed)
    }

    const fn is_stable(self) -> bool {
        !matches!(self, Self::Bouncing)
    }
}

/// Per-pin debounce state.
#[derive(Debug, Clone, Copy)]
pub struct DigitalInputChannel {
    pub gpio: i32,
    register: u32,
    state: ButtonState,
    last_stable: ButtonState,
    press_start_ms: u16,
}

impl DigitalInputChannel {
    /// A channel that has seen nothing but "open" samples.
    pub const fn new(gpio: i32) -> Self {
        Self {
            gpio,
            register: ALL_RELEASED,
            state: ButtonState::NotPressed,
            last_stable: ButtonState::NotPressed,
            press_start_ms: 0,
        }
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Raw sample history, newest sample in bit 0.
    pub fn register(&self) -> u32 {
        self.register
    }
}

/// Outcome of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSample {
    pub state: ButtonState,
    /// The stable state differs from the previous stable state.
    pub changed: bool,
}

/// Owns the channel table for every debounced input.
pub struct InputDebouncer<const N: usize> {
    channels: [DigitalInputChannel; N],
    long_press_ms: u16,
}

impl<const N: usize> InputDebouncer<N> {
    pub fn new(gpios: [i32; N], long_press_ms: u16) -> Self {
        Self {
            channels: gpios.map(DigitalInputChannel::new),
            long_press_ms,
        }
    }

    pub fn set_long_press_ms(&mut self, long_press_ms: u16) {
        self.long_press_ms = long_press_ms;
    }

    pub fn channels(&self) -> &[DigitalInputChannel; N] {
        &self.channels
    }

    /// Shift one raw sample into channel `idx`.
    ///
    /// `raw_high` is the pin level (HIGH = open); `now_ms` is the 16-bit
    /// millisecond timestamp of the sample.  Returns `None` for an unknown
    /// channel index.
    pub fn sample(&mut self, idx: usize, raw_high: bool, now_ms: u16) -> Option<InputSample> {
        let long_press_ms = self.long_press_ms;
        let ch = self.channels.get_mut(idx)?;

        ch.register = (ch.register << 1) | u32::from(raw_high);

        ch.state = match ch.register {
            ALL_PRESSED => {
                if !ch.state.is_pressed_family() {
                    ch.press_start_ms = now_ms;
                }
                if ch.state == ButtonState::LongPressed
                    || elapsed_ms16(now_ms, ch.press_start_ms) > long_press_ms
                {
                    ButtonState::LongPressed
                } else {
                    ButtonState::Pressed
                }
            }
            ALL_RELEASED => ButtonState::NotPressed,
            _ => ButtonState::Bouncing,
        };

        let changed = ch.state.is_stable() && ch.state != ch.last_stable;
        if changed {
            ch.last_stable = ch.state;
        }

        Some(InputSample {
            state: ch.state,
            changed,
        })
    }
}
