//! Status LED pattern engine with priority-based selection.
//!
//! The main loop calls `tick(now_ms)` every cycle and writes the returned
//! level to the LED.  Nothing here blocks; bursts and blinks are phases
//! measured against the millisecond clock.
//!
//! ## Priority hierarchy (highest first)
//!
//! 1. **Fault burst**: 10 toggles, 50 ms apart, after a rejected command
//! 2. **Link**: lit while the link is down, a short flash per association
//!    poll, dark once associated
//!
//! | Pattern          | Description                       | Rate      |
//! |------------------|-----------------------------------|-----------|
//! | Off              | Dark                              | n/a       |
//! | Solid            | Lit                               | n/a       |
//! | AssociationBlink | 50 ms lit, 950 ms dark            | 1 Hz      |
//! | FaultBurst       | Toggle every 50 ms, 10 toggles    | 10 Hz     |

/// Link-layer pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternId {
    Off,
    Solid,
    AssociationBlink,
}

/// Toggles in one fault burst.
pub const FAULT_BURST_TOGGLES: u8 = 10;
/// Time between two burst toggles.
pub const FAULT_BURST_STEP_MS: u32 = 50;

const BLINK_PERIOD_MS: u32 = 1_000;
const BLINK_ON_MS: u32 = 50;

#[derive(Debug, Clone, Copy)]
struct Burst {
    started_ms: u32,
    /// Level the LED had when the burst started; toggles alternate from it.
    base: bool,
}

/// LED pattern engine.  Stack-allocated, no heap.
pub struct LedPatternEngine {
    link: PatternId,
    link_since_ms: u32,
    burst: Option<Burst>,
    bursts_started: u32,
    output: bool,
}

impl LedPatternEngine {
    pub fn new() -> Self {
        Self {
            link: PatternId::Off,
            link_since_ms: 0,
            burst: None,
            bursts_started: 0,
            output: false,
        }
    }

    /// Set the link-layer pattern.  Re-setting the same pattern keeps its phase.
    pub fn set_link_pattern(&mut self, pattern: PatternId, now_ms: u32) {
        if pattern != self.link {
            self.link = pattern;
            self.link_since_ms = now_ms;
        }
    }

    pub fn link_pattern(&self) -> PatternId {
        self.link
    }

    /// Start a fault burst.  A burst already running is restarted.
    pub fn start_fault_burst(&mut self, now_ms: u32) {
        self.burst = Some(Burst {
            started_ms: now_ms,
            base: self.output,
        });
        self.bursts_started = self.bursts_started.wrapping_add(1);
    }

    pub fn is_bursting(&self) -> bool {
        self.burst.is_some()
    }

    /// Number of bursts started since boot.
    pub fn bursts_started(&self) -> u32 {
        self.bursts_started
    }

    /// Current LED level without advancing.
    pub fn output(&self) -> bool {
        self.output
    }

    /// Advance to `now_ms` and return the LED level (`true` = lit).
    pub fn tick(&mut self, now_ms: u32) -> bool {
        self.output = match self.burst {
            Some(b) => {
                let toggles = now_ms.wrapping_sub(b.started_ms) / FAULT_BURST_STEP_MS;
                if toggles >= u32::from(FAULT_BURST_TOGGLES) {
                    self.burst = None;
                    self.link_level(now_ms)
                } else {
                    b.base ^ (toggles % 2 == 1)
                }
            }
            None => self.link_level(now_ms),
        };
        self.output
    }

    fn link_level(&self, now_ms: u32) -> bool {
        match self.link {
            PatternId::Off => false,
            PatternId::Solid => true,
            PatternId::AssociationBlink => {
                now_ms.wrapping_sub(self.link_since_ms) % BLINK_PERIOD_MS < BLINK_ON_MS
            }
        }
    }
}

impl Default for LedPatternEngine {
    fn default() -> Self {
        Self::new()
    }
}
