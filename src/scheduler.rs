//! Telemetry scheduler.
//!
//! Two recurring tasks, each with its own period and its own due flag:
//!
//! ```text
//!   esp_timer ──raise()──▶ DueFlag ──take()──▶ main loop does the work
//! ```
//!
//! The timer side only ever raises a flag.  The main loop swaps it back to
//! false *before* doing the work, so one observation runs the work exactly
//! once, and any number of firings between two observations collapse into
//! a single due observation.
//!
//! Reconfiguring a task always disarms the old timer before arming the new
//! period; a task never has two live timers.

use core::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};

use crate::app::ports::TimerPort;
use crate::error::Error;

// ═══════════════════════════════════════════════════════════════
//  Due flags
// ═══════════════════════════════════════════════════════════════

/// Boolean latch raised by a timer and cleared by the main loop.
#[derive(Debug, Default)]
pub struct DueFlag(AtomicBool);

impl DueFlag {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Timer context.  Lock-free, allocation-free.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Main loop only.  Returns `true` at most once per raise.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tasks
// ═══════════════════════════════════════════════════════════════

/// Recurring telemetry tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TimerTask {
    Heartbeat = 0,
    Temperature = 1,
}

impl TimerTask {
    pub const COUNT: usize = 2;
    pub const ALL: [Self; Self::COUNT] = [Self::Heartbeat, Self::Temperature];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Heartbeat => "heartbeat",
            Self::Temperature => "temperature",
        }
    }
}

struct TaskSlot {
    flag: Arc<DueFlag>,
    period_ms: u32,
    suspended: bool,
}

// ═══════════════════════════════════════════════════════════════
//  Scheduler
// ═══════════════════════════════════════════════════════════════

pub struct TelemetryScheduler {
    slots: [TaskSlot; TimerTask::COUNT],
}

impl TelemetryScheduler {
    pub fn new(heartbeat_secs: u32, temperature_secs: u32) -> Self {
        let slot = |secs: u32| TaskSlot {
            flag: Arc::new(DueFlag::new()),
            period_ms: secs.saturating_mul(1_000),
            suspended: false,
        };
        Self {
            slots: [slot(heartbeat_secs), slot(temperature_secs)],
        }
    }

    /// Arm both timers.  Temperatures are due immediately so the first
    /// readings do not wait a full period.
    pub fn start(&mut self, timers: &mut impl TimerPort) -> Result<(), Error> {
        for task in TimerTask::ALL {
            self.rearm(task, timers)?;
        }
        self.slot(TimerTask::Temperature).flag.raise();
        info!(
            "scheduler: heartbeat every {} ms, temperature every {} ms",
            self.period_ms(TimerTask::Heartbeat),
            self.period_ms(TimerTask::Temperature)
        );
        Ok(())
    }

    /// Change the period of `task`.  Disarms the running timer first, then
    /// arms the new period (unless the task is suspended).  If the new
    /// timer cannot be armed the previous period is restored and re-armed,
    /// so the task keeps exactly one timer.
    pub fn reconfigure(
        &mut self,
        task: TimerTask,
        period_secs: u32,
        timers: &mut impl TimerPort,
    ) -> Result<(), Error> {
        let previous = self.slot(task).period_ms;
        self.slot_mut(task).period_ms = period_secs.saturating_mul(1_000);
        if self.slot(task).suspended {
            timers.disarm(task);
            info!("scheduler: {} period stored, task suspended", task.name());
            return Ok(());
        }
        if let Err(e) = self.rearm(task, timers) {
            warn!("scheduler: {} re-arm failed ({}), keeping {} ms", task.name(), e, previous);
            self.slot_mut(task).period_ms = previous;
            self.rearm(task, timers)?;
            return Err(e);
        }
        info!("scheduler: {} re-armed at {} s", task.name(), period_secs);
        Ok(())
    }

    /// Stop `task` until [`resume`](Self::resume).  A pending due flag is
    /// discarded.
    pub fn suspend(&mut self, task: TimerTask, timers: &mut impl TimerPort) {
        if self.slot(task).suspended {
            return;
        }
        timers.disarm(task);
        let slot = self.slot_mut(task);
        slot.suspended = true;
        slot.flag.take();
        info!("scheduler: {} suspended", task.name());
    }

    pub fn resume(&mut self, task: TimerTask, timers: &mut impl TimerPort) -> Result<(), Error> {
        if !self.slot(task).suspended {
            return Ok(());
        }
        self.slot_mut(task).suspended = false;
        self.rearm(task, timers)
    }

    /// Swap-clear the due flag of `task`.  `true` means "do the work now".
    pub fn take_due(&self, task: TimerTask) -> bool {
        self.slot(task).flag.take()
    }

    pub fn period_ms(&self, task: TimerTask) -> u32 {
        self.slot(task).period_ms
    }

    pub fn is_suspended(&self, task: TimerTask) -> bool {
        self.slot(task).suspended
    }

    /// Shared handle to the flag of `task` (for timer adapters and tests).
    pub fn flag(&self, task: TimerTask) -> Arc<DueFlag> {
        Arc::clone(&self.slot(task).flag)
    }

    fn rearm(&self, task: TimerTask, timers: &mut impl TimerPort) -> Result<(), Error> {
        let slot = self.slot(task);
        timers.disarm(task);
        timers.arm(task, slot.period_ms, Arc::clone(&slot.flag))
    }

    fn slot(&self, task: TimerTask) -> &TaskSlot {
        &self.slots[task as usize]
    }

    fn slot_mut(&mut self, task: TimerTask) -> &mut TaskSlot {
        &mut self.slots[task as usize]
    }
}
