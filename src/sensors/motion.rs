//! PIR motion edge latch.
//!
//! The GPIO interrupt fires on every edge of the PIR output.  The ISR only
//! stores the new level and raises `dirty`; the main loop swaps `dirty`
//! back to false and publishes the level it finds.  Several edges between
//! two observations collapse into the latest level (lossy, latest wins).
//!
//! The channel lives in a `static` because the ISR has no other way to
//! reach it; the main loop holds a `&'static` through [`MotionEdgeLatch`].

use core::sync::atomic::{AtomicBool, Ordering};

/// Edge-context half: written by the interrupt, drained by the main loop.
pub struct MotionChannel {
    pub gpio: i32,
    level: AtomicBool,
    dirty: AtomicBool,
}

impl MotionChannel {
    pub const fn new(gpio: i32) -> Self {
        Self {
            gpio,
            level: AtomicBool::new(false),
            dirty: AtomicBool::new(false),
        }
    }

    /// ISR entry point.  Lock-free; performs no allocation or I/O.
    pub fn on_edge(&self, level_high: bool) {
        self.level.store(level_high, Ordering::Relaxed);
        self.dirty.store(true, Ordering::Release);
    }

    /// Seed the level at boot without marking it dirty.
    pub fn seed(&self, level_high: bool) {
        self.level.store(level_high, Ordering::Relaxed);
    }

    /// Last level written by the edge context.
    pub fn level(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Main-loop only.  Clears `dirty` and returns the level if it was set.
    pub fn take(&self) -> Option<bool> {
        if self.dirty.swap(false, Ordering::AcqRel) {
            Some(self.level.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

/// Motion channels owned by the main loop.
pub struct MotionEdgeLatch {
    channels: &'static [MotionChannel],
}

impl MotionEdgeLatch {
    pub const fn new(channels: &'static [MotionChannel]) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &'static [MotionChannel] {
        self.channels
    }

    /// Drain every dirty channel, handing `(index, level)` to `publish`.
    ///
    /// Only call while a session is up: a channel left dirty is reported on
    /// the next call instead of being lost.
    pub fn drain(&self, mut publish: impl FnMut(usize, bool)) {
        for (idx, ch) in self.channels.iter().enumerate() {
            if let Some(level) = ch.take() {
                publish(idx, level);
            }
        }
    }
}

/// `on` / `off` payload for a motion level.
pub const fn payload(level_high: bool) -> &'static str {
    if level_high { "on" } else { "off" }
}
