//! Outbound payload records.
//!
//! Everything the node publishes as JSON is built here: remote log events
//! (`.../log`) and the heartbeat (`.../HEARTBEAT`).  Field names are the
//! ones the dashboards already consume, hence the PascalCase renames.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use super::ports::LinkInfo;

/// Remote log categories.  The numeric value is the `Category` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogCategory {
    System = 0,
    Authentication = 1,
    Login = 2,
    PageHandler = 3,
    TimeZoneChange = 4,
    FriendlyNameChange = 5,
    HeartbeatIntervalChange = 6,
    MqttParamChange = 7,
    TemperatureInterval = 8,
    Reboot = 9,
    ReadTemp = 10,
    MqttMsg = 11,
    Conn = 12,
    DigitalInput = 13,
}

impl LogCategory {
    pub const fn id(self) -> u8 {
        self as u8
    }
}

/// One remote log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LogRecord<'a> {
    pub node: u32,
    pub category: u8,
    #[serde(rename = "ID")]
    pub id: u16,
    pub title: &'a str,
    pub data: &'a str,
}

impl<'a> LogRecord<'a> {
    pub fn new(node: u32, category: LogCategory, id: u16, title: &'a str, data: &'a str) -> Self {
        Self {
            node,
            category: category.id(),
            id,
            title,
            data,
        }
    }
}

/// Link section of the heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WifiDetails {
    #[serde(rename = "SSId")]
    pub ssid: String,
    #[serde(rename = "MACAddress")]
    pub mac_address: String,
    #[serde(rename = "IPAddress")]
    pub ip_address: String,
}

impl From<LinkInfo> for WifiDetails {
    fn from(info: LinkInfo) -> Self {
        Self {
            ssid: info.ssid,
            mac_address: info.mac,
            ip_address: info.ip,
        }
    }
}

/// Periodic liveness record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeartbeatRecord {
    /// Local wall-clock time, empty until the clock is synchronised.
    pub time: String,
    pub node: u32,
    #[serde(rename = "Freeheap")]
    pub free_heap: u32,
    pub friendly_name: String,
    pub heartbeat_interval: u32,
    pub wifi: WifiDetails,
}

/// `YYYY-MM-DD HH:MM:SS` in the zone `utc_offset_hours` east of UTC.
///
/// Returns an empty string for an unsynchronised clock or an offset chrono
/// rejects.
pub fn local_timestamp(unix_secs: Option<i64>, utc_offset_hours: i8) -> String {
    let Some(secs) = unix_secs else {
        return String::new();
    };
    let Some(offset) = FixedOffset::east_opt(i32::from(utc_offset_hours) * 3_600) else {
        return String::new();
    };
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(&offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => String::new(),
    }
}
