//! Mock node hardware and a test rig for integration tests.
//!
//! `MockNode` implements every hardware port the supervisor touches and
//! records each call so tests can assert on the full history.  The broker,
//! config store and timers are the crate's own simulation adapters.

use std::collections::HashMap;

use sensornode::adapters::mqtt::{MqttAdapter, SimPublish};
use sensornode::adapters::nvs::NvsAdapter;
use sensornode::app::ports::{
    DEVICE_DISCONNECTED_C, InputPort, LinkInfo, NetworkPort, OneWirePort, RomCode, SystemPort,
};
use sensornode::app::supervisor::ConnectionSupervisor;
use sensornode::config::DeviceConfig;
use sensornode::drivers::hw_timer::HwTimers;
use sensornode::error::LinkError;
use sensornode::fsm::ConnectionState;
use sensornode::sensors::motion::MotionChannel;

pub const MAC: [u8; 6] = [0x24, 0x6F, 0x28, 0xAA, 0xBB, 0xCC];
pub const NODE: u32 = 0x00AA_BBCC;
/// Loop period used by the rig.
pub const STEP_MS: u32 = 10;

// ── MockNode ──────────────────────────────────────────────────

pub struct MockNode {
    // Network
    pub associated: bool,
    /// `begin_association` brings the link up immediately.
    pub joinable: bool,
    pub reachable: bool,
    pub begins: u32,
    pub reach_checks: u32,
    pub access_points: Vec<(String, String)>,
    pub ssid: String,
    // System
    pub restarts: u32,
    pub time_syncs: u32,
    pub led: bool,
    pub unix_time: Option<i64>,
    // Inputs: GPIO → level (missing = HIGH, switch open)
    pub levels: HashMap<i32, bool>,
    // 1-Wire
    pub thermometers: Vec<(RomCode, f32)>,
    pub conversions: u32,
}

#[allow(dead_code)]
impl MockNode {
    pub fn new() -> Self {
        Self {
            associated: false,
            joinable: true,
            reachable: true,
            begins: 0,
            reach_checks: 0,
            access_points: Vec::new(),
            ssid: String::new(),
            restarts: 0,
            time_syncs: 0,
            led: false,
            unix_time: Some(1_700_000_000),
            levels: HashMap::new(),
            thermometers: Vec::new(),
            conversions: 0,
        }
    }

    pub fn with_thermometers(mut self, devices: &[(RomCode, f32)]) -> Self {
        self.thermometers = devices.to_vec();
        self
    }

    /// Drive a digital input: `pressed` pulls the pin LOW.
    pub fn press(&mut self, gpio: i32, pressed: bool) {
        self.levels.insert(gpio, !pressed);
    }
}

impl Default for MockNode {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkPort for MockNode {
    fn is_associated(&self) -> bool {
        self.associated
    }

    fn begin_association(&mut self, ssid: &str, _password: &str) -> Result<(), LinkError> {
        self.begins += 1;
        self.ssid = ssid.into();
        self.associated = self.joinable;
        Ok(())
    }

    fn check_upstream(&mut self, _host: &str, _port: u16) -> bool {
        self.reach_checks += 1;
        self.reachable
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        self.associated = false;
        self.access_points.push((ssid.into(), password.into()));
        Ok(())
    }

    fn link_info(&self) -> LinkInfo {
        LinkInfo {
            ssid: self.ssid.clone(),
            mac: String::from("24:6F:28:AA:BB:CC"),
            ip: if self.associated {
                String::from("10.0.0.42")
            } else {
                String::new()
            },
        }
    }
}

impl SystemPort for MockNode {
    fn restart(&mut self) {
        self.restarts += 1;
    }

    fn free_heap(&self) -> u32 {
        123_456
    }

    fn chip_id(&self) -> u32 {
        NODE
    }

    fn set_status_led(&mut self, on: bool) {
        self.led = on;
    }

    fn start_time_sync(&mut self) {
        self.time_syncs += 1;
    }

    fn unix_time(&self) -> Option<i64> {
        self.unix_time
    }
}

impl InputPort for MockNode {
    fn read_level(&mut self, gpio: i32) -> bool {
        self.levels.get(&gpio).copied().unwrap_or(true)
    }
}

impl OneWirePort for MockNode {
    fn device_count(&mut self) -> usize {
        self.thermometers.len()
    }

    fn device_address(&mut self, index: usize) -> Option<RomCode> {
        self.thermometers.get(index).map(|(rom, _)| *rom)
    }

    fn set_resolution(&mut self, _rom: &RomCode, _bits: u8) {}

    fn is_parasite_powered(&mut self, _rom: &RomCode) -> bool {
        false
    }

    fn request_conversions(&mut self) {
        self.conversions += 1;
    }

    fn read_celsius(&mut self, rom: &RomCode) -> f32 {
        self.thermometers
            .iter()
            .find(|(r, _)| r == rom)
            .map_or(DEVICE_DISCONNECTED_C, |(_, c)| *c)
    }
}

// ── Test configuration ────────────────────────────────────────

/// Small budgets so every lifecycle path finishes in a few hundred ticks.
pub fn test_config() -> DeviceConfig {
    DeviceConfig {
        ssid: String::from("home"),
        password: String::from("password1"),
        association_attempts: 3,
        association_retry_ms: 1_000,
        fallback_timeout_secs: 30,
        heartbeat_interval_secs: 60,
        temperature_interval_secs: 60,
        long_press_ms: 500,
        ..DeviceConfig::factory_defaults(NODE)
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub struct Rig {
    pub sup: ConnectionSupervisor<MqttAdapter>,
    pub hw: MockNode,
    pub timers: HwTimers,
    pub store: NvsAdapter,
    pub now: u32,
}

#[allow(dead_code)]
impl Rig {
    /// Each test passes its own motion channel statics so parallel tests
    /// never share interrupt state.
    pub fn new(config: DeviceConfig, hw: MockNode, channels: &'static [MotionChannel]) -> Self {
        let sup = ConnectionSupervisor::new(config, MAC, MqttAdapter::new())
            .with_motion_channels(channels);
        Self {
            sup,
            hw,
            timers: HwTimers::new(),
            store: NvsAdapter::new().unwrap(),
            now: 0,
        }
    }

    pub fn started(mut self) -> Self {
        self.sup
            .start(self.now, &mut self.hw, &mut self.timers)
            .unwrap();
        self
    }

    pub fn tick(&mut self) {
        self.now = self.now.wrapping_add(STEP_MS);
        self.timers.advance(self.now);
        self.sup
            .tick(self.now, &mut self.hw, &mut self.timers, &self.store);
    }

    pub fn ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Tick until `cond` holds.  Panics after `max` ticks.
    pub fn run_until(&mut self, max: usize, cond: impl Fn(&Rig) -> bool) {
        for _ in 0..max {
            if cond(self) {
                return;
            }
            self.tick();
        }
        assert!(cond(self), "condition not reached within {max} ticks");
    }

    /// Run until the first steady-state servicing pass has happened.
    pub fn until_online(&mut self) {
        self.run_until(50, |r| r.sup.publisher().has_session());
    }

    /// Run `n` full steady cycles (Steady → CheckLink → CheckReachability).
    pub fn steady_cycles(&mut self, n: usize) {
        for _ in 0..n {
            self.run_until(10, |r| r.sup.state() == ConnectionState::Steady);
            self.tick();
        }
    }

    pub fn published(&self) -> &[SimPublish] {
        &self.sup.publisher().transport().sim().published
    }

    pub fn published_on(&self, topic: &str) -> Vec<SimPublish> {
        self.published()
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    /// Parsed log records.
    pub fn logs(&self) -> Vec<serde_json::Value> {
        let topic = self.sup.publisher().topics().log.clone();
        self.published_on(&topic)
            .iter()
            .map(|p| serde_json::from_str(&p.payload).unwrap())
            .collect()
    }

    pub fn logs_in(&self, category: u64) -> Vec<serde_json::Value> {
        self.logs()
            .into_iter()
            .filter(|l| l["Category"] == category)
            .collect()
    }

    /// Deliver a message on the command topic.
    pub fn command(&mut self, payload: &str) {
        let topic = self.sup.publisher().topics().command.clone();
        self.inject(&topic, payload);
    }

    pub fn inject(&mut self, topic: &str, payload: &str) {
        self.sup
            .publisher()
            .transport()
            .sim_inject(topic, payload.as_bytes());
    }
}
