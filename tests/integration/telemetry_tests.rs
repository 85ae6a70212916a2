//! Steady-state telemetry: thermometers, heartbeat, digital inputs, motion.

use sensornode::pins::DIGITAL_INPUT_GPIOS;
use sensornode::sensors::motion::MotionChannel;

use crate::mock_hw::{MockNode, NODE, Rig, test_config};

const SENSOR_A: [u8; 8] = [0x28, 0xFF, 0x4C, 0x5B, 0x91, 0x16, 0x04, 0x6A];
const SENSOR_B: [u8; 8] = [0x28, 0x61, 0x64, 0x12, 0x3C, 0x7C, 0x2F, 0x27];

static FIRST_READING: [MotionChannel; 1] = [MotionChannel::new(4)];
static DEAD_SENSOR: [MotionChannel; 1] = [MotionChannel::new(4)];
static TEMP_PERIOD: [MotionChannel; 1] = [MotionChannel::new(4)];
static HEARTBEAT: [MotionChannel; 1] = [MotionChannel::new(4)];
static HEARTBEAT_TZ: [MotionChannel; 1] = [MotionChannel::new(4)];
static HEARTBEAT_NO_CLOCK: [MotionChannel; 1] = [MotionChannel::new(4)];
static INPUT: [MotionChannel; 1] = [MotionChannel::new(4)];
static MOTION: [MotionChannel; 1] = [MotionChannel::new(4)];
static MOTION_PENDING: [MotionChannel; 1] = [MotionChannel::new(4)];

// ── Thermometers ──────────────────────────────────────────────

#[test]
fn first_readings_published_without_waiting_a_period() {
    let hw = MockNode::new().with_thermometers(&[(SENSOR_A, 21.5), (SENSOR_B, -3.0)]);
    let mut rig = Rig::new(test_config(), hw, &FIRST_READING).started();
    assert_eq!(rig.sup.sensors().devices().len(), 2);

    rig.until_online();

    let topics = rig.sup.publisher().topics().clone();
    let a = rig.published_on(&topics.thermometer("28:FF:4C:5B:91:16:04:6A"));
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].payload, "21.50");
    assert!(!a[0].retained);
    let b = rig.published_on(&topics.thermometer("28:61:64:12:3C:7C:2F:27"));
    assert_eq!(b[0].payload, "-3.00");

    let logs = rig.logs_in(10);
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0]["Data"], "1Wire: 28:FF:4C:5B:91:16:04:6A: 21.50");
    assert_eq!(logs[0]["Node"], NODE);
    assert_eq!(rig.hw.conversions, 1);
}

#[test]
fn disconnected_thermometer_is_skipped() {
    let hw = MockNode::new().with_thermometers(&[(SENSOR_A, 20.0), (SENSOR_B, -127.0)]);
    let mut rig = Rig::new(test_config(), hw, &DEAD_SENSOR).started();
    rig.until_online();

    let topics = rig.sup.publisher().topics().clone();
    assert_eq!(rig.published_on(&topics.thermometer("28:FF:4C:5B:91:16:04:6A")).len(), 1);
    assert!(rig.published_on(&topics.thermometer("28:61:64:12:3C:7C:2F:27")).is_empty());
    assert_eq!(rig.sup.sensors().devices()[1].last_temperature_c, None);
}

#[test]
fn temperatures_repeat_on_their_period() {
    let config = sensornode::config::DeviceConfig {
        temperature_interval_secs: 2,
        ..test_config()
    };
    let hw = MockNode::new().with_thermometers(&[(SENSOR_A, 19.25)]);
    let mut rig = Rig::new(config, hw, &TEMP_PERIOD).started();
    rig.until_online();
    assert_eq!(rig.hw.conversions, 1);

    rig.ticks(150);
    assert_eq!(rig.hw.conversions, 1);
    rig.run_until(100, |r| r.hw.conversions == 2);
    assert!(rig.now >= 2_000);
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn heartbeat_record_on_period() {
    let config = sensornode::config::DeviceConfig {
        heartbeat_interval_secs: 1,
        friendly_name: String::from("Boiler room"),
        ..test_config()
    };
    let mut rig = Rig::new(config, MockNode::new(), &HEARTBEAT).started();
    rig.until_online();
    let topic = rig.sup.publisher().topics().heartbeat.clone();
    assert!(rig.published_on(&topic).is_empty());

    rig.run_until(150, |r| !r.published_on(&topic).is_empty());
    let hb: serde_json::Value = serde_json::from_str(&rig.published_on(&topic)[0].payload).unwrap();
    assert_eq!(hb["Time"], "2023-11-14 22:13:20");
    assert_eq!(hb["Node"], NODE);
    assert_eq!(hb["Freeheap"], 123_456);
    assert_eq!(hb["FriendlyName"], "Boiler room");
    assert_eq!(hb["HeartbeatInterval"], 1);
    assert_eq!(hb["Wifi"]["SSId"], "home");
    assert_eq!(hb["Wifi"]["MACAddress"], "24:6F:28:AA:BB:CC");
    assert_eq!(hb["Wifi"]["IPAddress"], "10.0.0.42");
}

#[test]
fn heartbeat_time_uses_configured_offset() {
    let config = sensornode::config::DeviceConfig {
        heartbeat_interval_secs: 1,
        utc_offset_hours: 2,
        ..test_config()
    };
    let mut rig = Rig::new(config, MockNode::new(), &HEARTBEAT_TZ).started();
    rig.until_online();
    let topic = rig.sup.publisher().topics().heartbeat.clone();
    rig.run_until(150, |r| !r.published_on(&topic).is_empty());
    let hb: serde_json::Value = serde_json::from_str(&rig.published_on(&topic)[0].payload).unwrap();
    assert_eq!(hb["Time"], "2023-11-15 00:13:20");
}

#[test]
fn heartbeat_before_clock_sync_has_empty_time() {
    let config = sensornode::config::DeviceConfig {
        heartbeat_interval_secs: 1,
        ..test_config()
    };
    let mut hw = MockNode::new();
    hw.unix_time = None;
    let mut rig = Rig::new(config, hw, &HEARTBEAT_NO_CLOCK).started();
    rig.until_online();
    let topic = rig.sup.publisher().topics().heartbeat.clone();
    rig.run_until(150, |r| !r.published_on(&topic).is_empty());
    let hb: serde_json::Value = serde_json::from_str(&rig.published_on(&topic)[0].payload).unwrap();
    assert_eq!(hb["Time"], "");
}

// ── Digital inputs ────────────────────────────────────────────

#[test]
fn input_press_long_press_and_release_each_publish_once() {
    let gpio = DIGITAL_INPUT_GPIOS[0];
    let mut rig = Rig::new(test_config(), MockNode::new(), &INPUT).started();
    rig.until_online();
    let topic = rig.sup.publisher().topics().digital_input(0);

    rig.hw.press(gpio, true);
    rig.steady_cycles(31);
    assert!(rig.published_on(&topic).is_empty());
    rig.steady_cycles(1);
    let seen: Vec<String> = rig.published_on(&topic).into_iter().map(|p| p.payload).collect();
    assert_eq!(seen, ["pressed"]);

    // 20 cycles of 30 ms outlast the 500 ms threshold.
    rig.steady_cycles(20);
    let seen: Vec<String> = rig.published_on(&topic).into_iter().map(|p| p.payload).collect();
    assert_eq!(seen, ["pressed", "long_pressed"]);

    rig.hw.press(gpio, false);
    rig.steady_cycles(32);
    let seen: Vec<String> = rig.published_on(&topic).into_iter().map(|p| p.payload).collect();
    assert_eq!(seen, ["pressed", "long_pressed", "not_pressed"]);

    let logs = rig.logs_in(13);
    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0]["ID"], 0);
    assert_eq!(logs[0]["Data"], "DI0: pressed");

    // Other channels never moved.
    assert!(rig.published_on(&rig.sup.publisher().topics().digital_input(1)).is_empty());
}

// ── Motion ────────────────────────────────────────────────────

#[test]
fn motion_edges_collapse_to_latest_level() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &MOTION).started();
    MOTION[0].on_edge(true);
    MOTION[0].on_edge(false);
    MOTION[0].on_edge(true);

    rig.until_online();
    let topic = rig.sup.publisher().topics().motion(0);
    let seen: Vec<String> = rig.published_on(&topic).into_iter().map(|p| p.payload).collect();
    assert_eq!(seen, ["on"]);

    MOTION[0].on_edge(false);
    rig.steady_cycles(3);
    let seen: Vec<String> = rig.published_on(&topic).into_iter().map(|p| p.payload).collect();
    assert_eq!(seen, ["on", "off"]);
}

#[test]
fn motion_waits_for_a_session() {
    let mut rig = Rig::new(test_config(), MockNode::new(), &MOTION_PENDING).started();
    rig.sup
        .publisher_mut()
        .transport_mut()
        .sim_mut()
        .refuse = true;
    MOTION_PENDING[0].on_edge(true);

    rig.steady_cycles(3);
    assert!(rig.published().is_empty());
    assert!(MOTION_PENDING[0].is_dirty());

    rig.sup
        .publisher_mut()
        .transport_mut()
        .sim_mut()
        .refuse = false;
    rig.steady_cycles(1);
    let topic = rig.sup.publisher().topics().motion(0);
    assert_eq!(rig.published_on(&topic).len(), 1);
    assert!(!MOTION_PENDING[0].is_dirty());
}
