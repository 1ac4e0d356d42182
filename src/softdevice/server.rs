//! GATT server - Battery Service and Device Information Service.
//!
//! The device information characteristics are written once at boot from
//! the `PeripheralIdentity`; the battery level is written and notified
//! by `GattBattery` on every sensor tick.

use defmt::{debug, warn};
use heapless::String;
use nrf_softdevice::ble::gatt_server::SetValueError;
use plantmon::battery::{BatteryExposer, BatteryLevel};
use plantmon::identity::PeripheralIdentity;

use crate::softdevice::gap::LINK;

/// Capacity of the Device Information string characteristics.
const DIS_STRING_LEN: usize = 20;

#[nrf_softdevice::gatt_service(uuid = "180f")]
pub struct BatteryService {
    /// Battery Level (0x2A19), percent.
    #[characteristic(uuid = "2a19", read, notify)]
    pub battery_level: u8,
}

#[nrf_softdevice::gatt_service(uuid = "180a")]
pub struct DeviceInformationService {
    #[characteristic(uuid = "2a29", read)]
    pub manufacturer_name: String<DIS_STRING_LEN>,
    #[characteristic(uuid = "2a24", read)]
    pub model_number: String<DIS_STRING_LEN>,
    #[characteristic(uuid = "2a25", read)]
    pub serial_number: String<DIS_STRING_LEN>,
    #[characteristic(uuid = "2a27", read)]
    pub hardware_revision: String<DIS_STRING_LEN>,
    #[characteristic(uuid = "2a26", read)]
    pub firmware_revision: String<DIS_STRING_LEN>,
    #[characteristic(uuid = "2a28", read)]
    pub software_revision: String<DIS_STRING_LEN>,
}

#[nrf_softdevice::gatt_server]
pub struct Server {
    pub bas: BatteryService,
    pub dis: DeviceInformationService,
}

impl Server {
    /// Write the identity strings and the initial battery level.
    pub fn populate(
        &self,
        identity: &PeripheralIdentity,
        initial: BatteryLevel,
    ) -> Result<(), SetValueError> {
        let dis = &self.dis;
        dis.manufacturer_name_set(&gatt_string(identity.manufacturer))?;
        dis.model_number_set(&gatt_string(identity.model_number))?;
        dis.serial_number_set(&gatt_string(identity.serial_number))?;
        dis.hardware_revision_set(&gatt_string(identity.hardware_revision))?;
        dis.firmware_revision_set(&gatt_string(identity.firmware_revision))?;
        dis.software_revision_set(&gatt_string(identity.software_revision))?;
        self.bas.battery_level_set(&initial.percent())
    }
}

/// Copy into a characteristic string, truncating to capacity.
fn gatt_string(s: &str) -> String<DIS_STRING_LEN> {
    let mut out = String::new();
    for c in s.chars() {
        if out.push(c).is_err() {
            break;
        }
    }
    out
}

/// Battery exposer backed by the GATT Battery Level characteristic.
pub struct GattBattery {
    server: Option<&'static Server>,
}

impl GattBattery {
    /// `None` when the GATT server could not be registered; updates are
    /// then dropped.
    pub fn new(server: Option<&'static Server>) -> Self {
        Self { server }
    }
}

impl BatteryExposer for GattBattery {
    fn update_battery_level(&mut self, level: BatteryLevel) {
        let Some(server) = self.server else {
            return;
        };
        let value = level.percent();

        if let Err(e) = server.bas.battery_level_set(&value) {
            warn!("Battery level set failed: {}", e);
        }

        LINK.lock(|link| {
            if let Some(conn) = link.borrow().as_ref() {
                // Fails until the central enables notifications.
                if let Err(e) = server.bas.battery_level_notify(conn, &value) {
                    debug!("Battery level notify skipped: {}", e);
                }
            }
        });
    }
}
