//! Application-wide constants and compile-time configuration.
//!
//! Identity strings, timing parameters, and protocol limits live here so
//! they can be tuned in one place. The two timing values can also be
//! overridden at build time without touching the code:
//!
//! ```text
//! PLANTMON_ADV_INTERVAL_MS=250 PLANTMON_SENSOR_TICK_MS=5000 cargo build ...
//! ```

// Identity

/// GAP device name, carried as the Complete Local Name in the advertising payload.
pub const DEVICE_NAME: &str = "PlantMonitorSensors";

/// Device Information Service strings.
pub const MANUFACTURER_NAME: &str = "PlantmonCo";
pub const MODEL_NUMBER: &str = "PlantmonGen1";
pub const SERIAL_NUMBER: &str = "ABC123";
pub const HARDWARE_REVISION: &str = "0.1.0";
pub const FIRMWARE_REVISION: &str = "0.1.0";
pub const SOFTWARE_REVISION: &str = "0.0.0";

// BLE

/// Default advertising interval (ms).
pub const DEFAULT_ADV_INTERVAL_MS: u32 = 1000;

/// Advertising interval (ms), `PLANTMON_ADV_INTERVAL_MS` at build time if set.
pub const ADV_INTERVAL_MS: u32 = env_or(option_env!("PLANTMON_ADV_INTERVAL_MS"), DEFAULT_ADV_INTERVAL_MS);

/// Maximum size of a legacy advertising payload (bytes).
pub const LEGACY_ADV_MAX_SIZE: usize = 31;

/// Legacy advertising interval limits, in 0.625 ms units (20 ms .. 10.24 s).
pub const ADV_INTERVAL_MIN_UNITS: u32 = 0x0020;
pub const ADV_INTERVAL_MAX_UNITS: u32 = 0x4000;

/// BLE connection interval range (in 1.25 ms units). 24..40 = 30..50 ms.
pub const BLE_CONN_INTERVAL_MIN: u16 = 24;
pub const BLE_CONN_INTERVAL_MAX: u16 = 40;

/// BLE slave latency (number of connection events the peripheral can skip).
pub const BLE_SLAVE_LATENCY: u16 = 0;

/// BLE supervision timeout (in 10 ms units). 400 = 4 s.
pub const BLE_SUP_TIMEOUT: u16 = 400;

// Sensors

/// Default period of the sensor-update tick (ms).
pub const DEFAULT_SENSOR_TICK_MS: u32 = 1000;

/// Sensor-update tick period (ms), `PLANTMON_SENSOR_TICK_MS` at build time if set.
pub const SENSOR_TICK_MS: u32 = env_or(option_env!("PLANTMON_SENSOR_TICK_MS"), DEFAULT_SENSOR_TICK_MS);

/// Battery level reported before the first update (%).
pub const BATTERY_INITIAL_PERCENT: u8 = 50;

/// Battery level the simulated reading wraps back to after passing the maximum (%).
pub const BATTERY_WRAP_FLOOR_PERCENT: u8 = 20;

/// Highest valid battery level (%).
pub const BATTERY_MAX_PERCENT: u8 = 100;

// Dispatcher

/// Number of pending events the dispatcher can hold.
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Number of periodic tasks the dispatcher can hold.
pub const MAX_PERIODIC_TASKS: usize = 4;

/// Runtime view of the tunable parameters, handed to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralConfig {
    pub adv_interval_ms: u32,
    pub sensor_tick_ms: u32,
    pub battery_initial: u8,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            adv_interval_ms: ADV_INTERVAL_MS,
            sensor_tick_ms: SENSOR_TICK_MS,
            battery_initial: BATTERY_INITIAL_PERCENT,
        }
    }
}

/// Parse a build-time override, falling back to `default` when it is
/// unset, empty, zero, or not a plain decimal number.
const fn env_or(value: Option<&str>, default: u32) -> u32 {
    let Some(s) = value else {
        return default;
    };
    let bytes = s.as_bytes();
    if bytes.is_empty() {
        return default;
    }

    let mut acc: u32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if !b.is_ascii_digit() {
            return default;
        }
        acc = match acc.checked_mul(10) {
            Some(v) => match v.checked_add((b - b'0') as u32) {
                Some(v) => v,
                None => return default,
            },
            None => return default,
        };
        i += 1;
    }

    if acc == 0 {
        default
    } else {
        acc
    }
}
