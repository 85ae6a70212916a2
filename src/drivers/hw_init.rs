//! One-shot hardware peripheral initialization.
//!
//! Configures the digital inputs, the status LED output and the PIR
//! interrupt using raw ESP-IDF sys calls.  Called once from `main()` before
//! the event loop starts.  The 1-Wire pin is owned by its `PinDriver` and
//! is not touched here.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, Ordering};

use crate::pins;

/// Failure from one of the init steps, carrying the raw `esp_err_t`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "gpio_config rejected a pin group (esp_err {rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "PIR interrupt setup failed (esp_err {rc})"),
        }
    }
}

impl std::error::Error for HwInitError {}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::GpioConfigFailed(_) => Self::Init("GPIO config"),
            HwInitError::IsrInstallFailed(_) => Self::Init("GPIO ISR service"),
        }
    }
}

// ── Pin groups ────────────────────────────────────────────────

/// Electrical role of a group of pins configured in one `gpio_config` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinRole {
    /// Switch to ground, internal pull-up.
    PulledUpInput,
    /// Push-pull sensor output, interrupt on both edges.
    EdgeInput,
    Output,
}

fn pin_mask(gpios: &[i32]) -> u64 {
    gpios.iter().fold(0, |mask, &pin| mask | (1u64 << pin))
}

fn pin_groups() -> [(PinRole, u64); 3] {
    [
        (PinRole::PulledUpInput, pin_mask(&pins::DIGITAL_INPUT_GPIOS)),
        (PinRole::EdgeInput, pin_mask(&[pins::PIR_GPIO])),
        (PinRole::Output, pin_mask(&[pins::STATUS_LED_GPIO])),
    ]
}

#[cfg(target_os = "espidf")]
fn configure(role: PinRole, mask: u64) -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: mask,
        mode: match role {
            PinRole::Output => gpio_mode_t_GPIO_MODE_OUTPUT,
            _ => gpio_mode_t_GPIO_MODE_INPUT,
        },
        pull_up_en: match role {
            PinRole::PulledUpInput => gpio_pullup_t_GPIO_PULLUP_ENABLE,
            _ => gpio_pullup_t_GPIO_PULLUP_DISABLE,
        },
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: match role {
            PinRole::EdgeInput => gpio_int_type_t_GPIO_INTR_ANYEDGE,
            _ => gpio_int_type_t_GPIO_INTR_DISABLE,
        },
    };
    // SAFETY: plain register setup from the main task before the loop runs.
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    Ok(())
}

/// Configure every GPIO this module owns and drive the LED dark.
#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for (role, mask) in pin_groups() {
        configure(role, mask)?;
        info!("hw_init: {:?} mask {:#x}", role, mask);
    }
    gpio_write(pins::STATUS_LED_GPIO, !pins::STATUS_LED_ACTIVE_LEVEL);
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    for (role, mask) in pin_groups() {
        log::debug!("hw_init(sim): {:?} mask {:#x}", role, mask);
    }
    gpio_write(pins::STATUS_LED_GPIO, !pins::STATUS_LED_ACTIVE_LEVEL);
    Ok(())
}

// ── Levels ────────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub fn gpio_read(pin: i32) -> bool {
    // SAFETY: level register read.
    (unsafe { gpio_get_level(pin) }) != 0
}

/// Simulated pin levels.  Inputs idle HIGH (pull-up, switch open).
#[cfg(not(target_os = "espidf"))]
static SIM_LEVELS: [AtomicBool; 48] = [const { AtomicBool::new(true) }; 48];

#[cfg(not(target_os = "espidf"))]
pub fn gpio_read(pin: i32) -> bool {
    usize::try_from(pin)
        .ok()
        .and_then(|p| SIM_LEVELS.get(p))
        .is_none_or(|l| l.load(Ordering::Relaxed))
}

/// Force a simulated pin level.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_level(pin: i32, high: bool) {
    if let Some(l) = usize::try_from(pin).ok().and_then(|p| SIM_LEVELS.get(p)) {
        l.store(high, Ordering::Relaxed);
    }
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: level register write, main loop only.
    unsafe { gpio_set_level(pin, u32::from(high)); }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    sim_set_level(pin, high);
}

// ── GPIO ISR Service ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pir_gpio_isr(_arg: *mut core::ffi::c_void) {
    // SAFETY: gpio_get_level is a register read; safe in ISR context.
    let high = unsafe { gpio_get_level(pins::PIR_GPIO) } != 0;
    crate::sensors::MOTION_CHANNELS[0].on_edge(high);
}

/// Install per-pin GPIO ISR service and register the PIR handler.
/// Call after init_peripherals() and before the event loop.
#[cfg(target_os = "espidf")]
pub fn init_isr_service() -> Result<(), HwInitError> {
    // SAFETY: gpio_install_isr_service is idempotent; ESP_ERR_INVALID_STATE
    // means it was already installed (acceptable). The handler only stores
    // into the motion channel atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }

        // Seed with the current level so the first publish is accurate.
        crate::sensors::MOTION_CHANNELS[0].seed(gpio_get_level(pins::PIR_GPIO) != 0);

        let ret = gpio_isr_handler_add(pins::PIR_GPIO, Some(pir_gpio_isr), core::ptr::null_mut());
        if ret != ESP_OK as i32 {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        gpio_intr_enable(pins::PIR_GPIO);

        info!("hw_init: ISR service installed (PIR any-edge)");
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
