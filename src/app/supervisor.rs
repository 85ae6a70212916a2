//! Connection supervisor: the hexagonal core.
//!
//! [`ConnectionSupervisor`] owns the lifecycle FSM and every stateful
//! component of the node.  The main loop calls [`tick`] once per cycle;
//! all I/O flows through port traits passed in at the call site.
//!
//! ```text
//!  NodeHardware ──▶ ┌──────────────────────────────┐ ──▶ TransportPort
//!                   │     ConnectionSupervisor      │
//!    TimerPort  ◀── │ FSM · debouncer · motion ·    │ ◀── ConfigPort
//!                   │ sensors · scheduler · LED     │
//!                   └──────────────────────────────┘
//! ```
//!
//! One tick:
//!
//! 1. In `Steady`: open the session if needed, dispatch inbound commands,
//!    then inputs → motion → temperatures → heartbeat.
//! 2. Advance the FSM one step.
//! 3. Suspend the heartbeat once in fallback.
//! 4. Drive the status LED.
//!
//! [`tick`]: ConnectionSupervisor::tick

use log::{error, info, warn};
use serde::Serialize;

use crate::adapters::device_id::{self, MacAddress};
use crate::config::DeviceConfig;
use crate::drivers::button::{ButtonState, InputDebouncer};
use crate::drivers::led_patterns::LedPatternEngine;
use crate::error::{CommandError, Error};
use crate::fsm::context::{AccessPointCredentials, LinkContext, LinkLifecycle};
use crate::fsm::states::build_state_table;
use crate::fsm::{ConnectionState, Fsm};
use crate::pins::{DIGITAL_INPUT_COUNT, DIGITAL_INPUT_GPIOS};
use crate::scheduler::{TelemetryScheduler, TimerTask};
use crate::sensors::MOTION_CHANNELS;
use crate::sensors::motion::{self, MotionChannel, MotionEdgeLatch};
use crate::sensors::thermometers::{SensorBus, ThermometerRecord};
use crate::timing::ms16;

use super::commands::NodeCommand;
use super::events::{HeartbeatRecord, LogCategory, local_timestamp};
use super::ports::{ConfigPort, NodeHardware, TimerPort, TransportPort};
use super::publisher::EventPublisher;

// ───────────────────────────────────────────────────────────────
// Status snapshot
// ───────────────────────────────────────────────────────────────

/// Read-only view for the configuration pages.
#[derive(Debug, Clone, Serialize)]
pub struct NodeStatus {
    pub state: &'static str,
    pub session: bool,
    pub association_attempts: u8,
    pub digital_inputs: Vec<ButtonState>,
    pub motion: Vec<bool>,
    pub thermometers: Vec<ThermometerRecord>,
    pub heartbeat_interval_secs: u32,
    pub temperature_interval_secs: u32,
    pub access_point_ssid: String,
}

// ───────────────────────────────────────────────────────────────
// ConnectionSupervisor
// ───────────────────────────────────────────────────────────────

pub struct ConnectionSupervisor<T: TransportPort> {
    fsm: Fsm,
    config: DeviceConfig,
    mac: MacAddress,
    node: u32,
    access_point: AccessPointCredentials,
    link: LinkLifecycle,
    led: LedPatternEngine,
    publisher: EventPublisher<T>,
    scheduler: TelemetryScheduler,
    inputs: InputDebouncer<DIGITAL_INPUT_COUNT>,
    motion: MotionEdgeLatch,
    sensors: SensorBus,
    started: bool,
    restart_requested: bool,
}

impl<T: TransportPort> ConnectionSupervisor<T> {
    /// Build the supervisor.  Does **not** touch hardware; call
    /// [`start`](Self::start) next.
    pub fn new(config: DeviceConfig, mac: MacAddress, transport: T) -> Self {
        let node = device_id::chip_id(&mac);
        let access_point = credentials_for(&config, &mac);
        let publisher = EventPublisher::new(transport, &config, access_point.ssid.clone(), node);
        let scheduler = TelemetryScheduler::new(
            config.heartbeat_interval_secs,
            config.temperature_interval_secs,
        );
        let inputs = InputDebouncer::new(DIGITAL_INPUT_GPIOS, config.long_press_ms);

        Self {
            fsm: Fsm::new(build_state_table(), ConnectionState::CheckLink),
            config,
            mac,
            node,
            access_point,
            link: LinkLifecycle::default(),
            led: LedPatternEngine::new(),
            publisher,
            scheduler,
            inputs,
            motion: MotionEdgeLatch::new(&MOTION_CHANNELS),
            sensors: SensorBus::new(),
            started: false,
            restart_requested: false,
        }
    }

    /// Use a different set of motion channels (tests run several
    /// supervisors side by side).
    pub fn with_motion_channels(mut self, channels: &'static [MotionChannel]) -> Self {
        self.motion = MotionEdgeLatch::new(channels);
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enumerate the thermometers, arm the telemetry timers and enter the
    /// initial state.
    pub fn start<H: NodeHardware>(
        &mut self,
        now_ms: u32,
        hw: &mut H,
        timers: &mut impl TimerPort,
    ) -> Result<(), Error> {
        let found = self.sensors.enumerate(hw);
        self.scheduler.start(timers)?;

        let mut ctx = LinkContext::new(
            now_ms,
            &self.config,
            &mut *hw,
            &mut self.link,
            &self.access_point,
            &mut self.led,
        );
        self.fsm.start(&mut ctx);
        self.started = true;
        info!(
            "supervisor: node {} started, {} thermometer(s), AP fallback '{}'",
            self.node, found, self.access_point.ssid
        );
        Ok(())
    }

    /// Run one main-loop cycle.
    pub fn tick<H: NodeHardware>(
        &mut self,
        now_ms: u32,
        hw: &mut H,
        timers: &mut impl TimerPort,
        store: &impl ConfigPort,
    ) {
        if !self.started || self.restart_requested {
            return;
        }

        if self.fsm.current_state() == ConnectionState::Steady {
            self.service(now_ms, hw, store);
            if self.restart_requested {
                return;
            }
        }

        {
            let mut ctx = LinkContext::new(
                now_ms,
                &self.config,
                &mut *hw,
                &mut self.link,
                &self.access_point,
                &mut self.led,
            );
            self.fsm.tick(&mut ctx);
        }
        if self.link.restart_issued {
            self.restart_requested = true;
        }

        if self.fsm.current_state() == ConnectionState::FallbackPending {
            self.scheduler.suspend(TimerTask::Heartbeat, timers);
        }

        let lit = self.led.tick(now_ms);
        hw.set_status_led(lit);
    }

    // ── Reconfiguration ───────────────────────────────────────

    /// The single write path for configuration.  Validates `new`, re-arms
    /// the timers whose interval changed, logs each change and moves the
    /// session when broker parameters changed.
    pub fn apply_config(
        &mut self,
        new: DeviceConfig,
        timers: &mut impl TimerPort,
    ) -> Result<(), Error> {
        new.validate()?;
        self.rearm_intervals(&new, timers)?;
        let old = std::mem::replace(&mut self.config, new);

        if old.utc_offset_hours != self.config.utc_offset_hours {
            let data = format!("UTC {:+}", self.config.utc_offset_hours);
            self.publisher
                .log_event(LogCategory::TimeZoneChange, 1, "New time zone", &data);
        }
        if old.friendly_name != self.config.friendly_name {
            let data = self.config.friendly_name.clone();
            self.publisher
                .log_event(LogCategory::FriendlyNameChange, 1, "New friendly name", &data);
        }
        if old.heartbeat_interval_secs != self.config.heartbeat_interval_secs {
            self.publisher.log_event(
                LogCategory::HeartbeatIntervalChange,
                1,
                "New Heartbeat interval",
                &self.config.heartbeat_interval_secs.to_string(),
            );
        }
        if old.temperature_interval_secs != self.config.temperature_interval_secs {
            self.publisher.log_event(
                LogCategory::TemperatureInterval,
                3,
                "New temperature refresh interval",
                &self.config.temperature_interval_secs.to_string(),
            );
        }
        if old.long_press_ms != self.config.long_press_ms {
            self.inputs.set_long_press_ms(self.config.long_press_ms);
        }

        if old.broker_differs(&self.config) {
            self.log_broker_changes(&old);
            self.access_point = credentials_for(&self.config, &self.mac);
            self.publisher
                .retarget(&self.config, self.access_point.ssid.clone());
        }
        Ok(())
    }

    /// Move both timers to the periods of `new`.  Nothing is committed
    /// unless every changed timer re-arms; a heartbeat already moved is
    /// put back when the temperature timer fails.
    fn rearm_intervals(
        &mut self,
        new: &DeviceConfig,
        timers: &mut impl TimerPort,
    ) -> Result<(), Error> {
        let heartbeat_changed = new.heartbeat_interval_secs != self.config.heartbeat_interval_secs;
        if heartbeat_changed {
            self.scheduler
                .reconfigure(TimerTask::Heartbeat, new.heartbeat_interval_secs, timers)?;
        }
        if new.temperature_interval_secs != self.config.temperature_interval_secs {
            if let Err(e) = self.scheduler.reconfigure(
                TimerTask::Temperature,
                new.temperature_interval_secs,
                timers,
            ) {
                if heartbeat_changed {
                    self.scheduler.reconfigure(
                        TimerTask::Heartbeat,
                        self.config.heartbeat_interval_secs,
                        timers,
                    )?;
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn log_broker_changes(&mut self, old: &DeviceConfig) {
        if old.mqtt_server != self.config.mqtt_server {
            let data = self.config.mqtt_server.clone();
            self.publisher
                .log_event(LogCategory::MqttParamChange, 1, "New MQTT broker", &data);
        }
        if old.mqtt_port != self.config.mqtt_port {
            let data = self.config.mqtt_port.to_string();
            self.publisher
                .log_event(LogCategory::MqttParamChange, 2, "New MQTT port", &data);
        }
        if old.topic_prefix() != self.config.topic_prefix() {
            let data = self.config.topic_prefix();
            self.publisher
                .log_event(LogCategory::MqttParamChange, 1, "New MQTT topic", &data);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ConnectionState {
        self.fsm.current_state()
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn node(&self) -> u32 {
        self.node
    }

    pub fn access_point(&self) -> &AccessPointCredentials {
        &self.access_point
    }

    pub fn lifecycle(&self) -> &LinkLifecycle {
        &self.link
    }

    pub fn scheduler(&self) -> &TelemetryScheduler {
        &self.scheduler
    }

    pub fn led(&self) -> &LedPatternEngine {
        &self.led
    }

    pub fn publisher(&self) -> &EventPublisher<T> {
        &self.publisher
    }

    pub fn publisher_mut(&mut self) -> &mut EventPublisher<T> {
        &mut self.publisher
    }

    pub fn sensors(&self) -> &SensorBus {
        &self.sensors
    }

    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }

    pub fn status(&self) -> NodeStatus {
        NodeStatus {
            state: self.fsm.current_name(),
            session: self.publisher.has_session(),
            association_attempts: self.link.attempts,
            digital_inputs: self.inputs.channels().iter().map(|c| c.state()).collect(),
            motion: self.motion.channels().iter().map(MotionChannel::level).collect(),
            thermometers: self.sensors.devices().to_vec(),
            heartbeat_interval_secs: self.config.heartbeat_interval_secs,
            temperature_interval_secs: self.config.temperature_interval_secs,
            access_point_ssid: self.access_point.ssid.clone(),
        }
    }

    // ── Steady-state servicing ────────────────────────────────

    fn service<H: NodeHardware>(&mut self, now_ms: u32, hw: &mut H, store: &impl ConfigPort) {
        if !self.publisher.has_session() {
            let ip = hw.link_info().ip;
            if let Err(e) = self.publisher.ensure_session(&ip) {
                warn!("supervisor: {}", e);
            }
        }

        self.dispatch_commands(now_ms, hw, store);
        if self.restart_requested {
            return;
        }

        self.service_inputs(now_ms, hw);
        self.service_motion();
        self.service_temperatures(hw);
        self.service_heartbeat(hw);
    }

    fn dispatch_commands<H: NodeHardware>(&mut self, now_ms: u32, hw: &mut H, store: &impl ConfigPort) {
        while let Some(parsed) = self.publisher.poll_command() {
            match parsed {
                Ok(NodeCommand::Reset) => {
                    self.publisher
                        .log_event(LogCategory::MqttMsg, 1, NodeCommand::Reset.name(), "");
                    let defaults = DeviceConfig::factory_defaults(self.node);
                    if let Err(e) = store.save(&defaults) {
                        error!("supervisor: factory defaults not saved: {}", e);
                    }
                    self.request_restart(hw, "remote reset");
                    return;
                }
                Ok(NodeCommand::Restart) => {
                    self.publisher
                        .log_event(LogCategory::MqttMsg, 2, NodeCommand::Restart.name(), "");
                    self.request_restart(hw, "remote restart");
                    return;
                }
                Err(e) => self.reject_command(now_ms, e),
            }
        }
    }

    fn reject_command(&mut self, now_ms: u32, e: CommandError) {
        warn!("supervisor: rejected command: {}", e);
        self.publisher
            .log_event(LogCategory::MqttMsg, 3, "Invalid command", &e.to_string());
        self.led.start_fault_burst(now_ms);
    }

    fn request_restart<H: NodeHardware>(&mut self, hw: &mut H, reason: &str) {
        if self.restart_requested {
            return;
        }
        self.restart_requested = true;
        warn!("supervisor: restarting ({})", reason);
        hw.restart();
    }

    fn service_inputs<H: NodeHardware>(&mut self, now_ms: u32, hw: &mut H) {
        let stamp = ms16(now_ms);
        for (idx, gpio) in DIGITAL_INPUT_GPIOS.into_iter().enumerate() {
            let level = hw.read_level(gpio);
            let Some(sample) = self.inputs.sample(idx, level, stamp) else {
                continue;
            };
            if !sample.changed {
                continue;
            }
            let topic = self.publisher.topics().digital_input(idx);
            let payload = sample.state.as_str();
            self.publisher.publish(&topic, payload.as_bytes(), false);
            self.publisher.log_event(
                LogCategory::DigitalInput,
                idx as u16,
                "Input changed",
                &format!("DI{}: {}", idx, payload),
            );
        }
    }

    fn service_motion(&mut self) {
        // Without a session the channels stay dirty for the next pass.
        if !self.publisher.has_session() {
            return;
        }
        let publisher = &mut self.publisher;
        self.motion.drain(|idx, level| {
            let topic = publisher.topics().motion(idx);
            publisher.publish(&topic, motion::payload(level).as_bytes(), false);
        });
    }

    fn service_temperatures<H: NodeHardware>(&mut self, hw: &mut H) {
        if !self.scheduler.take_due(TimerTask::Temperature) {
            return;
        }
        for reading in self.sensors.poll_all(hw) {
            let Some(dev) = self.sensors.device(reading.index) else {
                continue;
            };
            let topic = self.publisher.topics().thermometer(&dev.name);
            let payload = reading.payload();
            let data = format!("1Wire: {}: {}", dev.name, payload);
            self.publisher.publish(&topic, payload.as_bytes(), false);
            self.publisher
                .log_event(LogCategory::ReadTemp, 1, "Measurement", &data);
        }
    }

    fn service_heartbeat<H: NodeHardware>(&mut self, hw: &mut H) {
        if !self.scheduler.take_due(TimerTask::Heartbeat) {
            return;
        }
        let record = HeartbeatRecord {
            time: local_timestamp(hw.unix_time(), self.config.utc_offset_hours),
            node: self.node,
            free_heap: hw.free_heap(),
            friendly_name: self.config.friendly_name.clone(),
            heartbeat_interval: self.config.heartbeat_interval_secs,
            wifi: hw.link_info().into(),
        };
        self.publisher.heartbeat(&record);
    }
}

fn credentials_for(config: &DeviceConfig, mac: &MacAddress) -> AccessPointCredentials {
    AccessPointCredentials {
        ssid: device_id::access_point_ssid(&config.mqtt_topic, mac),
        password: device_id::access_point_password(mac),
    }
}
