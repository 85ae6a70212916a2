//! Device configuration.
//!
//! Everything the node needs to join the network, reach the broker and
//! pace its telemetry.  Stored as a JSON document (camel-case keys, the same
//! ones the configuration page posts) and loaded with `#[serde(default)]`
//! so a partially written document still yields a usable config.

use serde::{Deserialize, Serialize};

use crate::adapters::utils::is_printable_ascii;
use crate::app::ports::ConfigError;

/// Topic stem used until the user picks a device topic.
pub const DEFAULT_MQTT_TOPIC: &str = "sensornode";

/// Core device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DeviceConfig {
    // --- Station credentials ---
    pub ssid: String,
    pub password: String,

    // --- Broker ---
    pub mqtt_server: String,
    pub mqtt_port: u16,
    /// First topic level.
    pub mqtt_customer: String,
    /// Second topic level.
    pub mqtt_project: String,
    /// Device topic (third level).  Also the stem of the fallback AP SSID.
    pub mqtt_topic: String,

    // --- Presentation ---
    pub friendly_name: String,
    /// Whole-hour offset applied to heartbeat timestamps.
    #[serde(rename = "timezone")]
    pub utc_offset_hours: i8,

    // --- Telemetry ---
    pub heartbeat_interval_secs: u32,
    #[serde(rename = "temperatureRefreshInterval")]
    pub temperature_interval_secs: u32,

    // --- Connectivity lifecycle ---
    /// Polls allowed before giving up on association.
    pub association_attempts: u8,
    /// Wait between association polls (milliseconds).
    pub association_retry_ms: u32,
    /// Time spent in access-point fallback before restarting (seconds).
    pub fallback_timeout_secs: u32,
    /// Minimum age of a successful reachability check before it is
    /// repeated.  `0` rechecks on every cycle.
    pub reachability_recheck_secs: u32,
    /// Host contacted for upstream reachability.
    pub reachability_host: String,
    pub reachability_port: u16,

    // --- Inputs ---
    /// Hold time before a pressed input reports LongPressed (< 65 536 ms).
    pub long_press_ms: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            ssid: String::from("ESP"),
            password: String::from("password"),

            mqtt_server: String::from("test.mosquitto.org"),
            mqtt_port: 1883,
            mqtt_customer: String::from("customer"),
            mqtt_project: String::from("project"),
            mqtt_topic: String::from(DEFAULT_MQTT_TOPIC),

            friendly_name: String::from("Sensor node"),
            utc_offset_hours: 0,

            heartbeat_interval_secs: 60,
            temperature_interval_secs: 60,

            association_attempts: 30,
            association_retry_ms: 1_000,
            fallback_timeout_secs: 300,
            reachability_recheck_secs: 30,
            reachability_host: String::from("8.8.8.8"),
            reachability_port: 53,

            long_press_ms: 5_000,
        }
    }
}

impl DeviceConfig {
    /// Factory defaults for a specific board: the device topic carries the
    /// chip id so two fresh nodes never share a topic.
    pub fn factory_defaults(chip_id: u32) -> Self {
        Self {
            mqtt_topic: format!("{DEFAULT_MQTT_TOPIC}-{chip_id}"),
            ..Self::default()
        }
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || self.ssid.len() > 32 || !is_printable_ascii(&self.ssid) {
            return Err(ConfigError::ValidationFailed(
                "ssid must be 1–32 printable ASCII characters",
            ));
        }
        if !self.password.is_empty() && !(8..=64).contains(&self.password.len()) {
            return Err(ConfigError::ValidationFailed(
                "password must be empty (open network) or 8–64 bytes",
            ));
        }
        if self.mqtt_server.is_empty() {
            return Err(ConfigError::ValidationFailed("mqtt_server must not be empty"));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::ValidationFailed("mqtt_port must be non-zero"));
        }
        for (level, name) in [
            (&self.mqtt_customer, "mqtt_customer"),
            (&self.mqtt_project, "mqtt_project"),
            (&self.mqtt_topic, "mqtt_topic"),
        ] {
            if level.is_empty() || level.contains(['/', '+', '#']) {
                log::debug!("config: rejected topic level {}={:?}", name, level);
                return Err(ConfigError::ValidationFailed(
                    "topic levels must be non-empty and free of '/', '+', '#'",
                ));
            }
        }
        if !(1..=86_400).contains(&self.heartbeat_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_interval_secs must be 1–86400",
            ));
        }
        if !(1..=86_400).contains(&self.temperature_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "temperature_interval_secs must be 1–86400",
            ));
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::ValidationFailed(
                "utc_offset_hours must be -12–14",
            ));
        }
        if self.association_attempts == 0 {
            return Err(ConfigError::ValidationFailed(
                "association_attempts must be at least 1",
            ));
        }
        if !(100..=60_000).contains(&self.association_retry_ms) {
            return Err(ConfigError::ValidationFailed(
                "association_retry_ms must be 100–60000",
            ));
        }
        if !(30..=86_400).contains(&self.fallback_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "fallback_timeout_secs must be 30–86400",
            ));
        }
        if self.long_press_ms < 100 {
            return Err(ConfigError::ValidationFailed(
                "long_press_ms must be at least 100",
            ));
        }
        Ok(())
    }

    /// `<customer>/<project>/<topic>`, the prefix of every published topic.
    pub fn topic_prefix(&self) -> String {
        format!(
            "{}/{}/{}",
            self.mqtt_customer, self.mqtt_project, self.mqtt_topic
        )
    }

    /// `true` when the broker session must be re-established to pick up
    /// the difference between `self` and `other`.
    pub fn broker_differs(&self, other: &Self) -> bool {
        self.mqtt_server != other.mqtt_server
            || self.mqtt_port != other.mqtt_port
            || self.mqtt_customer != other.mqtt_customer
            || self.mqtt_project != other.mqtt_project
            || self.mqtt_topic != other.mqtt_topic
    }
}
