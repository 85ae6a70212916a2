//! Shared context threaded through every FSM handler.
//!
//! `LinkContext` is rebuilt by the supervisor for every tick.  It borrows
//! the platform (radio + chip services), the configuration, the LED pattern
//! engine and the long-lived [`LinkLifecycle`] record the handlers read
//! from and write to.  Think of it as the "blackboard" in a blackboard
//! architecture, with only the lifecycle part outliving the tick.

use crate::app::ports::LinkHardware;
use crate::config::DeviceConfig;
use crate::drivers::led_patterns::LedPatternEngine;
use crate::timing::Deadline;

// ---------------------------------------------------------------------------
// Lifecycle record (persists across ticks; owned by the supervisor)
// ---------------------------------------------------------------------------

/// Lifecycle bookkeeping that survives between ticks.
#[derive(Debug, Clone, Default)]
pub struct LinkLifecycle {
    /// Association polls consumed since the last `begin_association`.
    pub attempts: u8,
    /// Next association poll; `None` outside `AcquireLink`.
    pub retry_deadline: Option<Deadline>,
    /// Time sync has been started since the link was (re)acquired.
    pub time_sync_started: bool,
    /// Uptime of the last successful reachability check.
    pub last_reachable_ms: Option<u32>,
    pub access_point_started: bool,
    pub fallback_deadline: Option<Deadline>,
    pub restart_issued: bool,
    /// Successful associations since boot.
    pub associations: u32,
}

impl LinkLifecycle {
    /// A reachability success younger than `interval_ms` is still valid.
    pub fn reachability_fresh(&self, now_ms: u32, interval_ms: u32) -> bool {
        match self.last_reachable_ms {
            Some(at) if interval_ms > 0 => now_ms.wrapping_sub(at) < interval_ms,
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Access-point credentials (derived once from config + MAC)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPointCredentials {
    pub ssid: String,
    pub password: String,
}

// ---------------------------------------------------------------------------
// LinkContext
// ---------------------------------------------------------------------------

/// The context passed to every state handler function.
pub struct LinkContext<'a> {
    // -- Timing --
    /// Uptime at the start of this tick.
    pub now_ms: u32,

    // -- Configuration --
    pub config: &'a DeviceConfig,
    pub access_point: &'a AccessPointCredentials,

    // -- Platform --
    pub hw: &'a mut dyn LinkHardware,

    // -- Lifecycle --
    pub link: &'a mut LinkLifecycle,

    // -- Indicator --
    pub led: &'a mut LedPatternEngine,
}

impl<'a> LinkContext<'a> {
    pub fn new(
        now_ms: u32,
        config: &'a DeviceConfig,
        hw: &'a mut dyn LinkHardware,
        link: &'a mut LinkLifecycle,
        access_point: &'a AccessPointCredentials,
        led: &'a mut LedPatternEngine,
    ) -> Self {
        Self {
            now_ms,
            config,
            access_point,
            hw,
            link,
            led,
        }
    }
}
