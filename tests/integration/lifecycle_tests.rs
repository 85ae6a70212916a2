//! Connection lifecycle: association, reachability, steady servicing,
//! access-point fallback and restart.

use sensornode::adapters::device_id;
use sensornode::app::publisher::{STATE_OFFLINE, STATE_ONLINE};
use sensornode::drivers::button::ButtonState;
use sensornode::drivers::led_patterns::PatternId;
use sensornode::fsm::ConnectionState;
use sensornode::scheduler::TimerTask;
use sensornode::sensors::motion::MotionChannel;

use crate::mock_hw::{MAC, MockNode, Rig, test_config};

static BOOT: [MotionChannel; 1] = [MotionChannel::new(4)];
static FALLBACK: [MotionChannel; 1] = [MotionChannel::new(4)];
static RESTART_ONCE: [MotionChannel; 1] = [MotionChannel::new(4)];
static RELINK: [MotionChannel; 1] = [MotionChannel::new(4)];
static UNREACHABLE: [MotionChannel; 1] = [MotionChannel::new(4)];
static REACHABLE_AGAIN: [MotionChannel; 1] = [MotionChannel::new(4)];
static REFUSED: [MotionChannel; 1] = [MotionChannel::new(4)];
static REACH_CACHE: [MotionChannel; 1] = [MotionChannel::new(4)];
static LED: [MotionChannel; 1] = [MotionChannel::new(4)];
static STATUS: [MotionChannel; 1] = [MotionChannel::new(4)];

#[test]
fn boot_reaches_steady_and_announces_online() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &BOOT).started();
    assert_eq!(rig.sup.state(), ConnectionState::CheckLink);

    rig.until_online();

    let topics = rig.sup.publisher().topics().clone();
    let state = rig.published_on(&topics.state);
    assert_eq!(state.len(), 1);
    assert_eq!(state[0].payload, STATE_ONLINE);
    assert!(state[0].retained);

    let sim = rig.sup.publisher().transport().sim();
    let will = sim.will.clone().unwrap();
    assert_eq!(will.topic, topics.state);
    assert_eq!(will.payload, STATE_OFFLINE);
    assert!(will.retained);
    assert_eq!(sim.subscriptions, vec![topics.command.clone()]);

    let conn = rig.logs_in(12);
    assert_eq!(conn.len(), 1);
    assert_eq!(conn[0]["Title"], "Node online");
    assert_eq!(conn[0]["Data"], "10.0.0.42");

    assert_eq!(rig.hw.begins, 1);
    assert_eq!(rig.hw.time_syncs, 1);
    assert_eq!(rig.sup.lifecycle().associations, 1);
}

#[test]
fn unjoinable_network_falls_back_to_access_point() {
    let mut hw = MockNode::new();
    hw.joinable = false;
    let mut rig = Rig::new(test_config(), hw, &FALLBACK).started();

    // Three polls, 1 s apart.
    rig.run_until(400, |r| r.sup.state() == ConnectionState::FallbackPending);
    assert!(rig.now >= 3_000);

    let ssid = device_id::access_point_ssid(&rig.sup.config().mqtt_topic, &MAC);
    assert_eq!(
        rig.hw.access_points,
        vec![(ssid.clone(), device_id::access_point_password(&MAC))]
    );
    assert_eq!(rig.sup.access_point().ssid, ssid);

    rig.tick();
    assert!(rig.sup.scheduler().is_suspended(TimerTask::Heartbeat));
    assert_eq!(rig.timers.period_ms(TimerTask::Heartbeat), None);
    assert!(rig.published().is_empty());
}

#[test]
fn fallback_timeout_restarts_exactly_once() {
    let mut hw = MockNode::new();
    hw.joinable = false;
    let mut rig = Rig::new(test_config(), hw, &RESTART_ONCE).started();

    rig.run_until(400, |r| r.sup.state() == ConnectionState::FallbackPending);
    let entered = rig.now;
    rig.run_until(3_200, |r| r.hw.restarts > 0);
    assert!(rig.now.wrapping_sub(entered) >= 30_000);
    assert!(rig.sup.restart_requested());

    rig.ticks(500);
    assert_eq!(rig.hw.restarts, 1);
    assert_eq!(rig.hw.access_points.len(), 1);
    assert_eq!(rig.hw.begins, 1);
}

#[test]
fn link_loss_reassociates_and_restarts_time_sync() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &RELINK).started();
    rig.until_online();
    assert_eq!(rig.hw.time_syncs, 1);

    rig.hw.associated = false;
    rig.run_until(20, |r| r.hw.time_syncs == 2);

    assert_eq!(rig.hw.begins, 2);
    assert_eq!(rig.sup.lifecycle().associations, 2);
    assert_eq!(rig.sup.state(), ConnectionState::Steady);
}

#[test]
fn unreachable_upstream_never_escalates() {
    let mut hw = MockNode::new();
    hw.reachable = false;
    let mut rig = Rig::new(test_config(), hw, &UNREACHABLE).started();

    for _ in 0..1_000 {
        rig.tick();
        assert_ne!(rig.sup.state(), ConnectionState::FallbackPending);
        assert_ne!(rig.sup.state(), ConnectionState::Steady);
    }
    assert!(rig.hw.access_points.is_empty());
    assert!(rig.hw.reach_checks > 100);
    assert!(!rig.sup.publisher().has_session());
}

#[test]
fn reachability_restored_after_failures_reaches_steady() {
    let mut hw = MockNode::new();
    hw.reachable = false;
    let mut rig = Rig::new(test_config(), hw, &REACHABLE_AGAIN).started();
    rig.run_until(10, |r| r.hw.reach_checks == 1);

    // Every failed check goes back to CheckLink and straight to the next
    // check; the association budget is never touched.
    let mut failures = 1;
    while failures < 8 {
        assert_eq!(rig.sup.state(), ConnectionState::CheckLink);
        rig.run_until(5, |r| r.hw.reach_checks > failures);
        failures += 1;
        assert_eq!(rig.sup.lifecycle().attempts, 0);
    }
    assert_eq!(rig.hw.begins, 1);

    rig.hw.reachable = true;
    rig.run_until(5, |r| r.sup.state() == ConnectionState::Steady);

    assert_eq!(rig.sup.lifecycle().attempts, 0);
    assert_eq!(rig.hw.begins, 1);
    assert!(rig.hw.access_points.is_empty());
    assert_eq!(rig.hw.restarts, 0);
    rig.until_online();
    assert!(rig.sup.publisher().has_session());
}

#[test]
fn refused_broker_keeps_cycling_without_publishing() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &REFUSED).started();
    rig.sup
        .publisher_mut()
        .transport_mut()
        .sim_mut()
        .refuse = true;

    rig.steady_cycles(3);
    assert!(!rig.sup.publisher().has_session());
    assert!(rig.published().is_empty());

    rig.sup
        .publisher_mut()
        .transport_mut()
        .sim_mut()
        .refuse = false;
    rig.steady_cycles(1);
    assert!(rig.sup.publisher().has_session());
    assert_eq!(rig.sup.publisher().sessions_opened(), 1);
}

#[test]
fn reachability_result_is_cached_between_cycles() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &REACH_CACHE).started();
    rig.until_online();
    rig.steady_cycles(10);
    assert_eq!(rig.hw.reach_checks, 1);

    // Default cache lifetime is 30 s.
    rig.ticks(3_100);
    assert!(rig.hw.reach_checks >= 2);
}

#[test]
fn status_led_follows_lifecycle() {
    let mut hw = MockNode::new();
    hw.joinable = false;
    let mut rig = Rig::new(test_config(), hw, &LED).started();

    rig.tick();
    assert_eq!(rig.sup.state(), ConnectionState::AcquireLink);
    assert_eq!(rig.sup.led().link_pattern(), PatternId::AssociationBlink);

    rig.run_until(400, |r| r.sup.state() == ConnectionState::FallbackPending);
    rig.tick();
    assert_eq!(rig.sup.led().link_pattern(), PatternId::Solid);
    assert!(rig.hw.led);
}

#[test]
fn status_snapshot_reflects_node() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &STATUS).started();
    let before = rig.sup.status();
    assert_eq!(before.state, "CheckLink");
    assert!(!before.session);

    rig.until_online();
    STATUS[0].on_edge(true);
    let status = rig.sup.status();
    assert_eq!(status.state, "Steady");
    assert!(status.session);
    assert_eq!(status.digital_inputs, vec![ButtonState::NotPressed; 4]);
    assert_eq!(status.motion, vec![true]);
    assert!(status.thermometers.is_empty());
    assert_eq!(status.heartbeat_interval_secs, 60);
    assert_eq!(
        status.access_point_ssid,
        device_id::access_point_ssid(&rig.sup.config().mqtt_topic, &MAC)
    );
}
