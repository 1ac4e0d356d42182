//! Fixed identity of the sensor node.

use crate::config;

/// Strings exposed through the Device Information Service and the
/// advertising payload. Set once at build time, never mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeripheralIdentity {
    pub device_name: &'static str,
    pub manufacturer: &'static str,
    pub model_number: &'static str,
    pub serial_number: &'static str,
    pub hardware_revision: &'static str,
    pub firmware_revision: &'static str,
    pub software_revision: &'static str,
}

/// Identity of the PlantmonGen1 board.
pub static PLANT_MONITOR: PeripheralIdentity = PeripheralIdentity {
    device_name: config::DEVICE_NAME,
    manufacturer: config::MANUFACTURER_NAME,
    model_number: config::MODEL_NUMBER,
    serial_number: config::SERIAL_NUMBER,
    hardware_revision: config::HARDWARE_REVISION,
    firmware_revision: config::FIRMWARE_REVISION,
    software_revision: config::SOFTWARE_REVISION,
};
