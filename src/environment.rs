//! Plant-environment readings.
//!
//! Storage only: the readings are not sampled and have no GATT service
//! yet. The environment-sensing service needs its own characteristic
//! layout before anything here is exposed over the air.

/// One set of environment readings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EnvironmentReading {
    /// Temperature, signed.
    pub temperature: i16,
    /// Relative humidity.
    pub humidity: u16,
    /// Soil moisture.
    pub soil_moisture: u8,
    /// Ambient light.
    pub ambient_light: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reading_is_zeroed() {
        let r = EnvironmentReading::default();
        assert_eq!(r.temperature, 0);
        assert_eq!(r.humidity, 0);
        assert_eq!(r.soil_moisture, 0);
        assert_eq!(r.ambient_light, 0);
    }

    #[test]
    fn reading_holds_full_ranges() {
        let r = EnvironmentReading {
            temperature: i16::MIN,
            humidity: u16::MAX,
            soil_moisture: u8::MAX,
            ambient_light: u32::MAX,
        };
        assert_eq!(r.temperature, -32768);
        assert_eq!(r.ambient_light, 4_294_967_295);
    }
}
