//! Fuzz target: stored configuration document
//!
//! Any blob read back from flash goes through `serde_json` and
//! `DeviceConfig::validate`.  Neither may panic, and a config that
//! validates must survive a save/load cycle unchanged.
//!
//! cargo fuzz run fuzz_config_document

#![no_main]

use libfuzzer_sys::fuzz_target;
use sensornode::config::DeviceConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<DeviceConfig>(data) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }
    let blob = serde_json::to_vec(&config).expect("serialise");
    let back: DeviceConfig = serde_json::from_slice(&blob).expect("re-parse");
    assert_eq!(back, config);
});
