//! Wrap-safe millisecond arithmetic.
//!
//! The main loop reads a free-running 32-bit millisecond counter and the
//! input debouncer keeps 16-bit press timestamps.  Both wrap, so every
//! elapsed-time computation goes through `wrapping_sub` here.

/// Elapsed milliseconds between two 16-bit timestamps (modulus 2¹⁶).
///
/// Correct as long as the true interval is below 65 536 ms.
#[inline]
pub const fn elapsed_ms16(now: u16, since: u16) -> u16 {
    now.wrapping_sub(since)
}

/// Truncate a 32-bit uptime to the 16-bit timestamp domain.
#[inline]
pub const fn ms16(now_ms: u32) -> u16 {
    (now_ms & 0xFFFF) as u16
}

/// A point in time after which some action becomes due.
///
/// Uses the usual half-range comparison so that it keeps working across
/// the 32-bit counter wrap (~49.7 days).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at_ms: u32,
}

impl Deadline {
    /// Deadline `period_ms` after `now_ms`.
    pub const fn after(now_ms: u32, period_ms: u32) -> Self {
        Self {
            at_ms: now_ms.wrapping_add(period_ms),
        }
    }

    /// Deadline that is already expired at `now_ms`.
    pub const fn immediate(now_ms: u32) -> Self {
        Self { at_ms: now_ms }
    }

    /// The same deadline pushed back by `period_ms`.
    pub const fn later(self, period_ms: u32) -> Self {
        Self {
            at_ms: self.at_ms.wrapping_add(period_ms),
        }
    }

    /// `true` once `now_ms` has reached or passed the deadline.
    pub const fn expired(&self, now_ms: u32) -> bool {
        now_ms.wrapping_sub(self.at_ms) < 0x8000_0000
    }
}
