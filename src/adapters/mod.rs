//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements              | Connects to                |
//! |--------------|-------------------------|----------------------------|
//! | `hardware`   | NetworkPort, SystemPort | Wi-Fi, clock, status LED   |
//! |              | InputPort, OneWirePort  | GPIO inputs, 1-Wire bus    |
//! | `mqtt`       | TransportPort           | ESP-IDF MQTT client        |
//! | `nvs`        | ConfigPort              | NVS / in-memory store      |
//! | `time`       | (used by `hardware`)    | esp_timer, SNTP            |
//! | `wifi`       | NetworkPort             | ESP-IDF Wi-Fi STA / soft AP|
//!
//! `device_id` derives the node identity from the factory MAC.

pub mod device_id;
pub mod hardware;
pub mod mqtt;
pub mod nvs;
pub mod time;
pub(crate) mod utils;
pub mod wifi;
