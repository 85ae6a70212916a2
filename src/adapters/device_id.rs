//! Device identity derived from the ESP32 factory MAC address.
//!
//! - `chip_id`: last 3 MAC bytes as an integer, reported as `Node` in every
//!   heartbeat and log record and used in the factory-default topic.
//! - `access_point_ssid` / `access_point_password`: credentials of the
//!   fallback soft AP, also used as the MQTT client id.

use core::fmt::Write;

use super::utils::hex_join;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly 6 bytes as the API requires.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Chip id: the last 3 MAC bytes, big-endian.
pub fn chip_id(mac: &MacAddress) -> u32 {
    u32::from_be_bytes([0, mac[3], mac[4], mac[5]])
}

/// `AA:BB:CC:DD:EE:FF`.
pub fn mac_string(mac: &MacAddress) -> String {
    hex_join(mac, Some(':'))
}

/// Fallback AP SSID: `<device topic>-XXYYZZ` (last 3 MAC bytes, uppercase).
pub fn access_point_ssid(topic: &str, mac: &MacAddress) -> String {
    format!("{topic}-{}", hex_join(&mac[3..], None))
}

/// Fallback AP password: `setup-xxyyzz` (WPA2 needs at least 8 bytes).
pub fn access_point_password(mac: &MacAddress) -> String {
    let mut pw = String::from("setup-");
    let _ = write!(pw, "{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    pw
}
