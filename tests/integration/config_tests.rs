//! Live reconfiguration through `ConnectionSupervisor::apply_config`.

use std::sync::Arc;

use sensornode::app::ports::TimerPort;
use sensornode::config::DeviceConfig;
use sensornode::drivers::hw_timer::HwTimers;
use sensornode::error::Error;
use sensornode::scheduler::{DueFlag, TimerTask};
use sensornode::sensors::motion::MotionChannel;

use crate::mock_hw::{MockNode, Rig, STEP_MS, test_config};

static INTERVALS: [MotionChannel; 1] = [MotionChannel::new(4)];
static INVALID: [MotionChannel; 1] = [MotionChannel::new(4)];
static TIMEZONE: [MotionChannel; 1] = [MotionChannel::new(4)];
static BROKER: [MotionChannel; 1] = [MotionChannel::new(4)];
static COSMETIC: [MotionChannel; 1] = [MotionChannel::new(4)];
static REARM_FAILS: [MotionChannel; 1] = [MotionChannel::new(4)];
static NEW_PERIOD: [MotionChannel; 1] = [MotionChannel::new(4)];

/// Rejects the next `refusals` arms of one task, like an exhausted
/// `esp_timer` pool.
struct RefusingTimers<'a> {
    inner: &'a mut HwTimers,
    task: TimerTask,
    refusals: u32,
}

impl TimerPort for RefusingTimers<'_> {
    fn arm(&mut self, task: TimerTask, period_ms: u32, flag: Arc<DueFlag>) -> Result<(), Error> {
        if task == self.task && self.refusals > 0 {
            self.refusals -= 1;
            self.inner.disarm(task);
            return Err(Error::Init("esp_timer_start_periodic"));
        }
        self.inner.arm(task, period_ms, flag)
    }

    fn disarm(&mut self, task: TimerTask) {
        self.inner.disarm(task);
    }

    fn is_armed(&self, task: TimerTask) -> bool {
        self.inner.is_armed(task)
    }
}

#[test]
fn interval_change_rearms_only_that_timer() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &INTERVALS).started();
    rig.until_online();

    let new = DeviceConfig {
        heartbeat_interval_secs: 120,
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();

    assert_eq!(rig.timers.period_ms(TimerTask::Heartbeat), Some(120_000));
    assert_eq!(rig.timers.period_ms(TimerTask::Temperature), Some(60_000));
    assert_eq!(rig.timers.armed_count(), 2);
    let logs = rig.logs_in(6);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["Data"], "120");
    assert!(rig.logs_in(8).is_empty());

    let new = DeviceConfig {
        temperature_interval_secs: 15,
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();
    assert_eq!(rig.timers.period_ms(TimerTask::Temperature), Some(15_000));
    assert_eq!(rig.logs_in(8)[0]["ID"], 3);
}

#[test]
fn failed_rearm_leaves_config_and_timers_untouched() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &REARM_FAILS).started();
    rig.until_online();
    let before = rig.sup.config().clone();

    let new = DeviceConfig {
        heartbeat_interval_secs: 120,
        temperature_interval_secs: 15,
        ..before.clone()
    };
    let mut timers = RefusingTimers {
        inner: &mut rig.timers,
        task: TimerTask::Temperature,
        refusals: 1,
    };
    let err = rig.sup.apply_config(new, &mut timers).unwrap_err();
    assert!(matches!(err, Error::Init(_)));

    assert_eq!(rig.sup.config(), &before);
    assert_eq!(rig.timers.armed_count(), 2);
    assert_eq!(rig.timers.period_ms(TimerTask::Heartbeat), Some(60_000));
    assert_eq!(rig.timers.period_ms(TimerTask::Temperature), Some(60_000));
    assert!(rig.logs_in(6).is_empty());
    assert!(rig.logs_in(8).is_empty());

    // The node keeps publishing on the old schedule.
    let heartbeat = rig.sup.publisher().topics().heartbeat.clone();
    rig.ticks((60_000 / STEP_MS) as usize + 10);
    assert_eq!(rig.published_on(&heartbeat).len(), 1);
}

#[test]
fn shortened_heartbeat_fires_at_new_period_only() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &NEW_PERIOD).started();
    rig.until_online();
    let heartbeat = rig.sup.publisher().topics().heartbeat.clone();
    assert!(rig.published_on(&heartbeat).is_empty());

    let new = DeviceConfig {
        heartbeat_interval_secs: 25,
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();
    let changed_at = rig.now;

    // Nothing before the new period elapses.
    rig.ticks((24_000 / STEP_MS) as usize);
    assert!(rig.published_on(&heartbeat).is_empty());

    // One publish once it does.
    rig.ticks((2_000 / STEP_MS) as usize);
    let first = rig.published_on(&heartbeat);
    assert_eq!(first.len(), 1);
    let record: serde_json::Value = serde_json::from_str(&first[0].payload).unwrap();
    assert_eq!(record["HeartbeatInterval"], 25);

    // Past the old 60 s mark: the second 25 s period has fired, the old
    // timer never does.
    rig.ticks((36_000 / STEP_MS) as usize);
    assert!(rig.now - changed_at > 60_000 && rig.now - changed_at < 75_000);
    assert_eq!(rig.published_on(&heartbeat).len(), 2);
}

#[test]
fn invalid_config_is_rejected_unchanged() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &INVALID).started();
    let before = rig.sup.config().clone();

    let bad = DeviceConfig {
        mqtt_port: 0,
        ..before.clone()
    };
    let err = rig.sup.apply_config(bad, &mut rig.timers).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert_eq!(rig.sup.config(), &before);
}

#[test]
fn timezone_change_is_logged() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &TIMEZONE).started();
    rig.until_online();

    let new = DeviceConfig {
        utc_offset_hours: -5,
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();
    let logs = rig.logs_in(4);
    assert_eq!(logs[0]["Title"], "New time zone");
    assert_eq!(logs[0]["Data"], "UTC -5");
}

#[test]
fn broker_change_moves_session_and_access_point() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &BROKER).started();
    rig.until_online();
    let old_log = rig.sup.publisher().topics().log.clone();

    let new = DeviceConfig {
        mqtt_topic: String::from("garage"),
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();

    // The change is announced on the old session before it closes.
    assert!(
        rig.published_on(&old_log)
            .iter()
            .any(|p| p.payload.contains(r#""Category":7"#))
    );
    assert!(!rig.sup.publisher().has_session());
    assert!(rig.sup.access_point().ssid.starts_with("garage-"));
    assert_eq!(rig.sup.publisher().client_id(), rig.sup.access_point().ssid);

    rig.steady_cycles(1);
    assert_eq!(rig.sup.publisher().sessions_opened(), 2);
    let state = rig.published_on("customer/project/garage/STATE");
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].payload, "online");
    assert_eq!(
        rig.sup.publisher().transport().sim().subscriptions,
        vec![String::from("customer/project/garage/cmnd")]
    );
}

#[test]
fn cosmetic_change_keeps_session() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &COSMETIC).started();
    rig.until_online();

    let new = DeviceConfig {
        friendly_name: String::from("Attic"),
        ..rig.sup.config().clone()
    };
    rig.sup.apply_config(new, &mut rig.timers).unwrap();
    assert!(rig.sup.publisher().has_session());
    assert_eq!(rig.sup.publisher().sessions_opened(), 1);
    assert_eq!(rig.logs_in(5)[0]["Data"], "Attic");
}
