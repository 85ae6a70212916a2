//! Remote commands on `.../cmnd`.

use sensornode::app::ports::ConfigPort;
use sensornode::config::DeviceConfig;
use sensornode::sensors::motion::MotionChannel;

use crate::mock_hw::{MockNode, NODE, Rig, test_config};

static RESTART: [MotionChannel; 1] = [MotionChannel::new(4)];
static RESET: [MotionChannel; 1] = [MotionChannel::new(4)];
static BOTH: [MotionChannel; 1] = [MotionChannel::new(4)];
static MALFORMED: [MotionChannel; 1] = [MotionChannel::new(4)];
static EXPLICIT_FALSE: [MotionChannel; 1] = [MotionChannel::new(4)];
static FOREIGN: [MotionChannel; 1] = [MotionChannel::new(4)];

#[test]
fn restart_command_restarts_once() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &RESTART).started();
    rig.until_online();

    rig.command(r#"{"restart":1}"#);
    rig.run_until(10, |r| r.sup.restart_requested());
    rig.ticks(100);

    assert_eq!(rig.hw.restarts, 1);
    let logs = rig.logs_in(11);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["ID"], 2);
    assert_eq!(logs[0]["Title"], "Restart");
    // Restart leaves the stored configuration alone.
    assert!(rig.store.load().is_err());
}

#[test]
fn reset_command_restores_factory_defaults() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &RESET).started();
    rig.store.save(&test_config()).unwrap();
    rig.until_online();

    rig.command(r#"{"reset":true}"#);
    rig.run_until(10, |r| r.sup.restart_requested());

    assert_eq!(rig.hw.restarts, 1);
    assert_eq!(rig.store.load().unwrap(), DeviceConfig::factory_defaults(NODE));
    let logs = rig.logs_in(11);
    assert_eq!(logs[0]["ID"], 1);
    assert_eq!(logs[0]["Title"], "Reset");
}

#[test]
fn reset_wins_when_both_keys_present() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &BOTH).started();
    rig.until_online();

    rig.command(r#"{"restart":true,"reset":true}"#);
    rig.run_until(10, |r| r.sup.restart_requested());

    assert_eq!(rig.hw.restarts, 1);
    assert!(rig.store.load().is_ok());
    assert_eq!(rig.logs_in(11)[0]["ID"], 1);
}

#[test]
fn malformed_command_is_logged_and_flashed() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &MALFORMED).started();
    rig.until_online();

    rig.command("restart please");
    rig.steady_cycles(2);

    assert_eq!(rig.hw.restarts, 0);
    assert!(!rig.sup.restart_requested());
    let logs = rig.logs_in(11);
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0]["ID"], 3);
    assert_eq!(rig.sup.led().bursts_started(), 1);
}

#[test]
fn explicit_false_is_not_a_request() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &EXPLICIT_FALSE).started();
    rig.until_online();

    rig.command(r#"{"restart":false}"#);
    rig.steady_cycles(2);

    assert_eq!(rig.hw.restarts, 0);
    assert_eq!(rig.logs_in(11)[0]["ID"], 3);
}

#[test]
fn messages_on_other_topics_are_ignored() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &FOREIGN).started();
    rig.until_online();

    rig.inject("customer/project/other-node/cmnd", r#"{"restart":1}"#);
    rig.steady_cycles(2);

    assert_eq!(rig.hw.restarts, 0);
    assert!(rig.logs_in(11).is_empty());
    assert_eq!(rig.sup.led().bursts_started(), 0);
}
