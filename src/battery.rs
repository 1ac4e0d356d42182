//! Battery level reading and the exposer it is published through.

use crate::config::{BATTERY_MAX_PERCENT, BATTERY_WRAP_FLOOR_PERCENT};

/// Battery charge in percent, always within `0..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryLevel(u8);

impl BatteryLevel {
    /// Create a level, clamping anything above 100 %.
    pub const fn new(percent: u8) -> Self {
        if percent > BATTERY_MAX_PERCENT {
            Self(BATTERY_MAX_PERCENT)
        } else {
            Self(percent)
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }

    /// Simulated discharge step: one percent up, wrapping to the floor
    /// once the maximum is passed.
    pub const fn next(self) -> Self {
        let next = self.0 + 1;
        if next > BATTERY_MAX_PERCENT {
            Self(BATTERY_WRAP_FLOOR_PERCENT)
        } else {
            Self(next)
        }
    }
}

/// Publishes the battery level to the connected central.
///
/// Fire-and-forget: implementations log failed updates themselves and
/// never report them back to the caller.
pub trait BatteryExposer {
    fn update_battery_level(&mut self, level: BatteryLevel);
}
