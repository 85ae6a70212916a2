//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ ConnectionSupervisor (domain)
//! ```
//!
//! Driven adapters (radio, broker client, 1-Wire bus, timers, storage)
//! implement these traits.  The
//! [`ConnectionSupervisor`](super::supervisor::ConnectionSupervisor)
//! consumes them via generics or `dyn`, so the domain core never touches
//! hardware directly and every path runs on the host under test.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - Asynchronous sources (timers, interrupts) never call back into the
//!   domain; they only raise a [`DueFlag`] or a motion latch.

use std::sync::Arc;

use crate::config::DeviceConfig;
use crate::error::{CommsError, Error, LinkError};
use crate::scheduler::{DueFlag, TimerTask};

// ───────────────────────────────────────────────────────────────
// Network port (driven adapter: domain ↔ Wi-Fi radio)
// ───────────────────────────────────────────────────────────────

/// Addresses reported in the heartbeat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkInfo {
    pub ssid: String,
    pub mac: String,
    pub ip: String,
}

/// Station / soft-AP control.
pub trait NetworkPort {
    /// Station is associated and holds an address.
    fn is_associated(&self) -> bool;

    /// Start (or restart) association.  Returns once the request is
    /// issued; completion is observed through [`is_associated`](Self::is_associated).
    fn begin_association(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    /// One bounded attempt to reach `host:port` upstream.
    fn check_upstream(&mut self, host: &str, port: u16) -> bool;

    /// Switch the radio to access-point mode.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;

    fn link_info(&self) -> LinkInfo;
}

// ───────────────────────────────────────────────────────────────
// System port (driven adapter: domain → chip services)
// ───────────────────────────────────────────────────────────────

/// Chip-level services: restart, heap, identity, LED, clock.
pub trait SystemPort {
    /// Request a full restart.  On hardware this does not return; mocks
    /// record the request.
    fn restart(&mut self);

    fn free_heap(&self) -> u32;

    fn chip_id(&self) -> u32;

    /// Drive the status LED (`true` = lit).
    fn set_status_led(&mut self, on: bool);

    /// Kick off wall-clock synchronisation (SNTP).
    fn start_time_sync(&mut self);

    /// Seconds since the Unix epoch, `None` until the clock is synchronised.
    fn unix_time(&self) -> Option<i64>;
}

// ───────────────────────────────────────────────────────────────
// Input port (driven adapter: GPIO → domain)
// ───────────────────────────────────────────────────────────────

pub trait InputPort {
    /// Raw level of a digital input (`true` = HIGH).
    fn read_level(&mut self, gpio: i32) -> bool;
}

// ───────────────────────────────────────────────────────────────
// 1-Wire port (driven adapter: thermometer bus → domain)
// ───────────────────────────────────────────────────────────────

/// 64-bit 1-Wire ROM code.
pub type RomCode = [u8; 8];

/// Reading returned for a device that did not answer.
pub const DEVICE_DISCONNECTED_C: f32 = -127.0;

/// Bus-level thermometer operations.
pub trait OneWirePort {
    /// Search the bus and return how many devices answered.
    fn device_count(&mut self) -> usize;

    /// ROM code of the `index`-th device found by the last search.
    fn device_address(&mut self, index: usize) -> Option<RomCode>;

    fn set_resolution(&mut self, rom: &RomCode, bits: u8);

    fn is_parasite_powered(&mut self, rom: &RomCode) -> bool;

    /// Start a conversion on every device at once.
    fn request_conversions(&mut self);

    /// Last converted temperature, or [`DEVICE_DISCONNECTED_C`].
    fn read_celsius(&mut self, rom: &RomCode) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Transport port (driven adapter: domain ↔ MQTT broker)
// ───────────────────────────────────────────────────────────────

/// Parameters of one broker session.
#[derive(Debug, Clone, Copy)]
pub struct SessionParams<'a> {
    pub server: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub will_topic: &'a str,
    pub will_payload: &'a str,
    pub will_retained: bool,
}

/// A message received on a subscribed topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

pub trait TransportPort {
    fn is_connected(&self) -> bool;

    /// Open a session with a last-will message registered.
    fn connect(&mut self, params: &SessionParams<'_>) -> Result<(), CommsError>;

    fn disconnect(&mut self);

    fn publish(&mut self, topic: &str, payload: &[u8], retained: bool) -> Result<(), CommsError>;

    fn subscribe(&mut self, topic: &str) -> Result<(), CommsError>;

    /// Next queued inbound message, if any.
    fn poll_inbound(&mut self) -> Option<InboundMessage>;
}

// ───────────────────────────────────────────────────────────────
// Timer port (driven adapter: periodic timers → due flags)
// ───────────────────────────────────────────────────────────────

/// Recurring timers.  A timer only raises its flag; it never runs work.
pub trait TimerPort {
    /// Arm `task` to raise `flag` every `period_ms`.  Implementations must
    /// disarm any previous timer for `task` first.
    fn arm(&mut self, task: TimerTask, period_ms: u32, flag: Arc<DueFlag>) -> Result<(), Error>;

    fn disarm(&mut self, task: TimerTask);

    fn is_armed(&self, task: TimerTask) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device configuration.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Composite hardware bounds
// ───────────────────────────────────────────────────────────────

/// Everything the connection lifecycle touches.
pub trait LinkHardware: NetworkPort + SystemPort {}
impl<T: NetworkPort + SystemPort> LinkHardware for T {}

/// Everything the steady-state servicing touches.
pub trait NodeHardware: LinkHardware + InputPort + OneWirePort {}
impl<T: LinkHardware + InputPort + OneWirePort> NodeHardware for T {}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::ValidationFailed(msg) => Self::Config(msg),
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::IoError => Self::Config("storage I/O"),
        }
    }
}
