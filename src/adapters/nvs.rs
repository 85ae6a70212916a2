//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the sensor node.  The whole
//! [`DeviceConfig`] is one JSON blob under `sensornode/devcfg`, the same
//! document the configuration page edits.
//!
//! Documents are validated before they are written and again after they
//! are read back.  The host build keeps the blob in a `RefCell`.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::DeviceConfig;
use log::info;

#[cfg(target_os = "espidf")]
use core::ffi::CStr;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &CStr = c"sensornode";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &CStr = c"devcfg";

/// Upper bound on the stored document.
const MAX_BLOB_SIZE: usize = 2048;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: std::cell::RefCell<Option<Vec<u8>>>,
}

impl NvsAdapter {
    /// Bring up the NVS partition.
    ///
    /// A partition that is full or was written by a newer IDF is erased
    /// and initialised again; the node then boots on factory defaults.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any NVS handle
            // is opened.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("nvs: partition unusable ({}), erasing", ret);
                esp_check(unsafe { nvs_flash_erase() })?;
                esp_check(unsafe { nvs_flash_init() })?;
            } else {
                esp_check(ret)?;
            }
            info!("nvs: partition ready");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("nvs: in-memory store");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: std::cell::RefCell::new(None),
        })
    }

    // ── Raw blob access ───────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        self.blob.borrow().clone().ok_or(ConfigError::NotFound)
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        *self.blob.borrow_mut() = Some(bytes);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_blob(&self) -> Result<Vec<u8>, ConfigError> {
        let ns = NvsHandle::open(CONFIG_NAMESPACE, nvs_open_mode_t_NVS_READONLY)?;

        let mut size: usize = 0;
        // SAFETY: a null buffer asks NVS for the stored length only.
        let ret = unsafe {
            nvs_get_blob(ns.0, CONFIG_KEY.as_ptr(), core::ptr::null_mut(), &mut size)
        };
        if ret == ESP_ERR_NVS_NOT_FOUND as i32 {
            return Err(ConfigError::NotFound);
        }
        esp_check(ret)?;
        if size == 0 || size > MAX_BLOB_SIZE {
            warn!("nvs: stored config has implausible size {}", size);
            return Err(ConfigError::Corrupted);
        }

        let mut buf = vec![0u8; size];
        // SAFETY: `buf` holds exactly `size` bytes.
        esp_check(unsafe {
            nvs_get_blob(ns.0, CONFIG_KEY.as_ptr(), buf.as_mut_ptr().cast(), &mut size)
        })?;
        buf.truncate(size);
        Ok(buf)
    }

    #[cfg(target_os = "espidf")]
    fn write_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        let ns = NvsHandle::open(CONFIG_NAMESPACE, nvs_open_mode_t_NVS_READWRITE)?;
        // SAFETY: pointer and length come from the same live Vec.
        esp_check(unsafe {
            nvs_set_blob(ns.0, CONFIG_KEY.as_ptr(), bytes.as_ptr().cast(), bytes.len())
        })?;
        esp_check(unsafe { nvs_commit(ns.0) })
    }
}

/// Open namespace handle, closed on drop.
#[cfg(target_os = "espidf")]
struct NvsHandle(nvs_handle_t);

#[cfg(target_os = "espidf")]
impl NvsHandle {
    fn open(namespace: &CStr, mode: nvs_open_mode_t) -> Result<Self, ConfigError> {
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(namespace.as_ptr(), mode, &mut handle) };
        // A read-only open of a namespace that was never written fails
        // with NOT_FOUND.
        if ret == ESP_ERR_NVS_NOT_FOUND as i32 {
            return Err(ConfigError::NotFound);
        }
        esp_check(ret)?;
        Ok(Self(handle))
    }
}

#[cfg(target_os = "espidf")]
impl Drop for NvsHandle {
    fn drop(&mut self) {
        unsafe { nvs_close(self.0) };
    }
}

#[cfg(target_os = "espidf")]
fn esp_check(ret: esp_err_t) -> Result<(), ConfigError> {
    if ret == ESP_OK as i32 {
        Ok(())
    } else {
        warn!("nvs: esp_err {}", ret);
        Err(ConfigError::IoError)
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        let bytes = self.read_blob()?;
        let cfg: DeviceConfig =
            serde_json::from_slice(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("nvs: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = serde_json::to_vec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::ValidationFailed("config document too large"));
        }
        let len = bytes.len();
        self.write_blob(bytes)?;
        info!("nvs: config saved ({} bytes)", len);
        Ok(())
    }
}
