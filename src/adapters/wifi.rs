//! Wi-Fi adapter: station association, reachability check, fallback soft AP.
//!
//! Implements [`NetworkPort`].  Association is started here but never
//! waited on: the connection lifecycle polls [`NetworkPort::is_associated`]
//! once per retry window and owns the attempt budget.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::EspWifi` in non-blocking
//!   use, plus a TCP connect check through lwIP.
//! - **all other targets**: an in-memory radio whose link and upstream
//!   state tests can flip.

use log::{info, warn};

use crate::adapters::device_id::{MacAddress, mac_string};
use crate::adapters::utils::is_printable_ascii;
use crate::app::ports::{LinkInfo, NetworkPort};
use crate::error::LinkError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AuthMethod, ClientConfiguration, Configuration, EspWifi,
};

/// Upper bound on one reachability check.
#[cfg(target_os = "espidf")]
const CONNECT_TIMEOUT_MS: u64 = 2_000;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(LinkError::InvalidCredentials);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), LinkError> {
    if password.is_empty() || (8..=64).contains(&password.len()) {
        Ok(())
    } else {
        Err(LinkError::InvalidCredentials)
    }
}

// ───────────────────────────────────────────────────────────────
// Radio mode
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioMode {
    Idle,
    Station,
    AccessPoint,
}

// ───────────────────────────────────────────────────────────────
// Wi-Fi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(not(target_os = "espidf"))]
    sim: SimRadio,
    mode: RadioMode,
    ssid: heapless::String<32>,
    mac: String,
}

/// Host stand-in for the radio.
#[cfg(not(target_os = "espidf"))]
#[derive(Debug, Clone)]
pub struct SimRadio {
    /// Association succeeds as soon as it is requested.
    pub joinable: bool,
    pub associated: bool,
    pub reachable: bool,
    pub reach_checks: u32,
}

#[cfg(not(target_os = "espidf"))]
impl Default for SimRadio {
    fn default() -> Self {
        Self {
            joinable: true,
            associated: false,
            reachable: true,
            reach_checks: 0,
        }
    }
}

impl WifiAdapter {
    /// Wrap an initialised (not yet started) ESP-IDF Wi-Fi driver.
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>, mac: &MacAddress) -> Self {
        Self {
            wifi,
            mode: RadioMode::Idle,
            ssid: heapless::String::new(),
            mac: mac_string(mac),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new(mac: &MacAddress) -> Self {
        Self {
            sim: SimRadio::default(),
            mode: RadioMode::Idle,
            ssid: heapless::String::new(),
            mac: mac_string(mac),
        }
    }

    pub fn mode(&self) -> RadioMode {
        self.mode
    }

    /// Simulated radio state.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_mut(&mut self) -> &mut SimRadio {
        &mut self.sim
    }

    fn remember_ssid(&mut self, ssid: &str) {
        self.ssid.clear();
        // Validated to fit before this is reached.
        let _ = self.ssid.push_str(ssid);
    }

    // ── Platform: association ─────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        let auth_method = if password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPAWPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidCredentials)?,
            password: password
                .try_into()
                .map_err(|_| LinkError::InvalidCredentials)?,
            auth_method,
            ..Default::default()
        });

        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.disconnect();
        }
        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi: set_configuration: {:?}", e);
            LinkError::AssociationFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi: start: {:?}", e);
                LinkError::AssociationFailed
            })?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi: connect: {:?}", e);
            LinkError::AssociationFailed
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        self.sim.associated = self.sim.joinable;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_associated(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false) && self.wifi.is_up().unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_associated(&self) -> bool {
        self.sim.associated
    }

    // ── Platform: soft AP ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_access_point(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        let config = Configuration::AccessPoint(AccessPointConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidCredentials)?,
            password: password
                .try_into()
                .map_err(|_| LinkError::InvalidCredentials)?,
            auth_method: AuthMethod::WPA2Personal,
            channel: 1,
            ..Default::default()
        });
        if self.wifi.is_started().unwrap_or(false) {
            let _ = self.wifi.stop();
        }
        self.wifi
            .set_configuration(&config)
            .and_then(|()| self.wifi.start())
            .map_err(|e| {
                warn!("WiFi: access point: {:?}", e);
                LinkError::AccessPointFailed
            })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_access_point(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        self.sim.associated = false;
        Ok(())
    }

    // ── Platform: reachability ────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self, host: &str, port: u16) -> bool {
        use std::net::{TcpStream, ToSocketAddrs};
        use std::time::Duration;

        let Ok(mut addrs) = (host, port).to_socket_addrs() else {
            return false;
        };
        addrs.next().is_some_and(|addr| {
            TcpStream::connect_timeout(&addr, Duration::from_millis(CONNECT_TIMEOUT_MS)).is_ok()
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self, _host: &str, _port: u16) -> bool {
        self.sim.reach_checks += 1;
        self.sim.associated && self.sim.reachable
    }

    #[cfg(target_os = "espidf")]
    fn platform_ip(&self) -> String {
        self.wifi
            .sta_netif()
            .get_ip_info()
            .map(|info| info.ip.to_string())
            .unwrap_or_default()
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_ip(&self) -> String {
        if self.sim.associated {
            String::from("192.168.4.20")
        } else {
            String::new()
        }
    }
}

impl NetworkPort for WifiAdapter {
    fn is_associated(&self) -> bool {
        self.mode == RadioMode::Station && self.platform_associated()
    }

    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.remember_ssid(ssid);
        self.mode = RadioMode::Station;
        self.platform_begin(ssid, password)?;
        info!("WiFi: association with '{}' requested", ssid);
        Ok(())
    }

    fn check_upstream(&mut self, host: &str, port: u16) -> bool {
        if self.mode != RadioMode::Station {
            return false;
        }
        let ok = self.platform_connect(host, port);
        if !ok {
            warn!("WiFi: connect {}:{} failed", host, port);
        }
        ok
    }

    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.platform_access_point(ssid, password)?;
        self.remember_ssid(ssid);
        self.mode = RadioMode::AccessPoint;
        info!("WiFi: access point '{}' started", ssid);
        Ok(())
    }

    fn link_info(&self) -> LinkInfo {
        LinkInfo {
            ssid: self.ssid.as_str().into(),
            mac: self.mac.clone(),
            ip: if self.mode == RadioMode::Station {
                self.platform_ip()
            } else {
                String::new()
            },
        }
    }
}
