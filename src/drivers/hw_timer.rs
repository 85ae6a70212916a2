//! Periodic telemetry timers.
//!
//! On ESP-IDF each [`TimerTask`] gets its own `esp_timer` whose callback
//! raises the task's [`DueFlag`].  Callbacks run in the esp_timer task
//! (not ISR) and touch nothing but that atomic.
//!
//! On the host the same [`TimerPort`] is backed by software deadlines that
//! the caller advances explicitly with [`HwTimers::advance`].

use std::sync::Arc;

use crate::app::ports::TimerPort;
use crate::error::Error;
use crate::scheduler::{DueFlag, TimerTask};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(not(target_os = "espidf"))]
use crate::timing::Deadline;

// ── ESP-IDF ───────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
struct Slot {
    handle: esp_timer_handle_t,
    period_ms: u32,
    /// Keeps the callback argument alive while the timer exists.
    flag: Arc<DueFlag>,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn due_flag_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is `Arc::as_ptr` of the flag held in `Slot::flag`;
    // the slot deletes the timer before releasing the Arc.
    let flag = unsafe { &*(arg as *const DueFlag) };
    flag.raise();
}

#[cfg(target_os = "espidf")]
pub struct HwTimers {
    slots: [Option<Slot>; TimerTask::COUNT],
}

#[cfg(target_os = "espidf")]
impl HwTimers {
    pub fn new() -> Self {
        Self { slots: [None, None] }
    }

    /// No-op on hardware: esp_timer drives the flags.
    pub fn advance(&mut self, _now_ms: u32) {}

    fn timer_name(task: TimerTask) -> &'static [u8] {
        match task {
            TimerTask::Heartbeat => b"heartbeat\0",
            TimerTask::Temperature => b"temperature\0",
        }
    }
}

#[cfg(target_os = "espidf")]
impl TimerPort for HwTimers {
    fn arm(&mut self, task: TimerTask, period_ms: u32, flag: Arc<DueFlag>) -> Result<(), Error> {
        self.disarm(task);

        let args = esp_timer_create_args_t {
            callback: Some(due_flag_cb),
            arg: Arc::as_ptr(&flag) as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: Self::timer_name(task).as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: args outlive the call; handle is written by esp_timer_create.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK {
            log::error!("hw_timer: {} create failed (rc={})", task.name(), ret);
            return Err(Error::Init("esp_timer_create failed"));
        }
        // SAFETY: handle was just created and is not running.
        let ret = unsafe { esp_timer_start_periodic(handle, u64::from(period_ms) * 1_000) };
        if ret != ESP_OK {
            log::error!("hw_timer: {} start failed (rc={})", task.name(), ret);
            // SAFETY: handle is valid and stopped.
            unsafe { esp_timer_delete(handle) };
            return Err(Error::Init("esp_timer_start_periodic failed"));
        }

        self.slots[task as usize] = Some(Slot { handle, period_ms, flag });
        log::info!("hw_timer: {} armed every {} ms", task.name(), period_ms);
        Ok(())
    }

    fn disarm(&mut self, task: TimerTask) {
        if let Some(slot) = self.slots[task as usize].take() {
            // SAFETY: handle came from esp_timer_create; stop on a stopped
            // timer only returns ESP_ERR_INVALID_STATE.  Deleting before
            // `slot.flag` drops keeps the callback argument valid.
            unsafe {
                esp_timer_stop(slot.handle);
                esp_timer_delete(slot.handle);
            }
            drop(slot.flag);
        }
    }

    fn is_armed(&self, task: TimerTask) -> bool {
        self.slots[task as usize].is_some()
    }
}

#[cfg(target_os = "espidf")]
impl HwTimers {
    pub fn period_ms(&self, task: TimerTask) -> Option<u32> {
        self.slots[task as usize].as_ref().map(|s| s.period_ms)
    }

    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
struct Slot {
    period_ms: u32,
    next: Deadline,
    flag: Arc<DueFlag>,
}

#[cfg(not(target_os = "espidf"))]
pub struct HwTimers {
    slots: [Option<Slot>; TimerTask::COUNT],
    now_ms: u32,
}

#[cfg(not(target_os = "espidf"))]
impl HwTimers {
    pub fn new() -> Self {
        Self {
            slots: [None, None],
            now_ms: 0,
        }
    }

    /// Move simulated time to `now_ms`, raising the flag of every timer
    /// whose period elapsed.
    pub fn advance(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
        for slot in self.slots.iter_mut().flatten() {
            if slot.period_ms == 0 {
                continue;
            }
            if slot.next.expired(now_ms) {
                slot.flag.raise();
                // Missed periods coalesce into this single raise.
                while slot.next.expired(now_ms) {
                    slot.next = slot.next.later(slot.period_ms);
                }
            }
        }
    }

    pub fn period_ms(&self, task: TimerTask) -> Option<u32> {
        self.slots[task as usize].as_ref().map(|s| s.period_ms)
    }

    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(not(target_os = "espidf"))]
impl TimerPort for HwTimers {
    fn arm(&mut self, task: TimerTask, period_ms: u32, flag: Arc<DueFlag>) -> Result<(), Error> {
        self.disarm(task);
        self.slots[task as usize] = Some(Slot {
            period_ms,
            next: Deadline::after(self.now_ms, period_ms),
            flag,
        });
        log::debug!("hw_timer(sim): {} armed every {} ms", task.name(), period_ms);
        Ok(())
    }

    fn disarm(&mut self, task: TimerTask) {
        self.slots[task as usize] = None;
    }

    fn is_armed(&self, task: TimerTask) -> bool {
        self.slots[task as usize].is_some()
    }
}

impl Default for HwTimers {
    fn default() -> Self {
        Self::new()
    }
}
