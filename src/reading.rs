//! Sensor readings and per-tick environment input.
//!
//! A [`Reading`] is one sample across every sensor zone. It is validated
//! once at ingestion so that everything downstream (window, scorer,
//! ranking) can assume well-formed numeric input.

use crate::error::ReadingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw value reported by one sensor zone.
pub type SensorValue = i64;

/// One sample across all sensor zones, ordered by zone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reading {
    values: Vec<SensorValue>,
}

impl Reading {
    /// Create a reading from integer zone values.
    pub fn new(values: Vec<SensorValue>) -> Self {
        Self { values }
    }

    /// Create a reading with the same value in every zone.
    pub fn uniform(value: SensorValue, zone_count: usize) -> Self {
        Self {
            values: vec![value; zone_count],
        }
    }

    /// Create a reading from floating point samples.
    ///
    /// Values are rounded to the nearest integer. NaN, infinities and
    /// values outside the `i64` range are rejected.
    pub fn from_f64(samples: &[f64]) -> Result<Self, ReadingError> {
        let values = samples
            .iter()
            .enumerate()
            .map(|(zone, &value)| sensor_value_from_f64(zone, value))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    /// Check that the reading carries exactly one value per zone.
    pub fn validate(&self, zone_count: usize) -> Result<(), ReadingError> {
        if self.values.len() != zone_count {
            return Err(ReadingError::ZoneCountMismatch {
                expected: zone_count,
                actual: self.values.len(),
            });
        }
        Ok(())
    }

    /// Zone values in zone order.
    pub fn values(&self) -> &[SensorValue] {
        &self.values
    }

    /// Number of zones in this reading.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the reading carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value for one zone (0-based).
    pub fn get(&self, zone: usize) -> Option<SensorValue> {
        self.values.get(zone).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = SensorValue> + '_ {
        self.values.iter().copied()
    }
}

impl From<Vec<SensorValue>> for Reading {
    fn from(values: Vec<SensorValue>) -> Self {
        Self::new(values)
    }
}

/// Parses comma or whitespace separated zone values, e.g. `"1200, 1180, 1210, 1195"`.
impl FromStr for Reading {
    type Err = ReadingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = Vec::new();
        let tokens = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty());

        for (zone, token) in tokens.enumerate() {
            if let Ok(v) = token.parse::<SensorValue>() {
                values.push(v);
                continue;
            }
            let value: f64 = token.parse().map_err(|_| ReadingError::NonNumeric {
                zone,
                token: token.to_string(),
            })?;
            values.push(sensor_value_from_f64(zone, value)?);
        }

        Ok(Self { values })
    }
}

/// Round a float sample to a sensor value without saturating.
fn sensor_value_from_f64(zone: usize, value: f64) -> Result<SensorValue, ReadingError> {
    if !value.is_finite() {
        return Err(ReadingError::NonFinite { zone, value });
    }
    let rounded = value.round();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if rounded < SensorValue::MIN as f64 || rounded >= SensorValue::MAX as f64 {
        return Err(ReadingError::OutOfRange { zone, value });
    }
    Ok(rounded as SensorValue)
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

/// Environmental scalars supplied by the caller alongside each reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    /// Body temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Battery charge, 0-100.
    pub battery_level: f64,
    /// BLE link health.
    pub link_ok: bool,
    /// Sensor array health.
    pub sensor_ok: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            temperature_c: 36.5,
            battery_level: 80.0,
            link_ok: true,
            sensor_ok: true,
        }
    }
}

impl Environment {
    /// Create a healthy environment with the given temperature and battery.
    pub fn new(temperature_c: f64, battery_level: f64) -> Self {
        Self {
            temperature_c,
            battery_level,
            ..Default::default()
        }
    }

    pub fn with_link(mut self, link_ok: bool) -> Self {
        self.link_ok = link_ok;
        self
    }

    pub fn with_sensor(mut self, sensor_ok: bool) -> Self {
        self.sensor_ok = sensor_ok;
        self
    }

    /// Check the scalars are usable.
    pub fn validate(&self) -> Result<(), ReadingError> {
        if !self.battery_level.is_finite() || !(0.0..=100.0).contains(&self.battery_level) {
            return Err(ReadingError::BatteryOutOfRange(self.battery_level));
        }
        if !self.temperature_c.is_finite() {
            return Err(ReadingError::InvalidTemperature(self.temperature_c));
        }
        Ok(())
    }
}

/// Everything the control loop consumes for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickInput {
    pub reading: Reading,
    pub environment: Environment,
}

impl TickInput {
    pub fn new(reading: Reading, environment: Environment) -> Self {
        Self {
            reading,
            environment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reading_validate_zone_count() {
        let reading = Reading::new(vec![1200, 1200, 1200]);
        assert_eq!(
            reading.validate(4),
            Err(ReadingError::ZoneCountMismatch {
                expected: 4,
                actual: 3
            })
        );
        assert!(Reading::uniform(1200, 4).validate(4).is_ok());
    }

    #[test]
    fn test_reading_from_f64_rounds() {
        let reading = Reading::from_f64(&[1199.6, 1200.4, 0.0, 7.5]).unwrap();
        assert_eq!(reading.values(), &[1200, 1200, 0, 8]);
    }

    #[test]
    fn test_reading_from_f64_rejects_nan() {
        let err = Reading::from_f64(&[1200.0, f64::NAN]).unwrap_err();
        assert!(matches!(err, ReadingError::NonFinite { zone: 1, .. }));
    }

    #[test]
    fn test_reading_from_f64_rejects_out_of_range() {
        let err = Reading::from_f64(&[1e19; 9]).unwrap_err();
        assert!(matches!(err, ReadingError::OutOfRange { zone: 0, .. }));

        let err = Reading::from_f64(&[0.0, -1e19]).unwrap_err();
        assert!(matches!(err, ReadingError::OutOfRange { zone: 1, .. }));

        // 2^63 is one past i64::MAX
        assert!(Reading::from_f64(&[9_223_372_036_854_775_808.0]).is_err());
        let reading = Reading::from_f64(&[-9_223_372_036_854_775_808.0, 1e18]).unwrap();
        assert_eq!(reading.values(), &[i64::MIN, 1_000_000_000_000_000_000]);
    }

    #[test]
    fn test_reading_parse_rejects_out_of_range() {
        let err = "1200,1e19,1200".parse::<Reading>().unwrap_err();
        assert!(matches!(err, ReadingError::OutOfRange { zone: 1, .. }));

        let err = "99999999999999999999".parse::<Reading>().unwrap_err();
        assert!(matches!(err, ReadingError::OutOfRange { zone: 0, .. }));

        let reading: Reading = "9223372036854775807,1.5e3".parse().unwrap();
        assert_eq!(reading.values(), &[i64::MAX, 1500]);
    }

    #[test]
    fn test_reading_parse() {
        let reading: Reading = "1200, 1180 1210,1195".parse().unwrap();
        assert_eq!(reading.values(), &[1200, 1180, 1210, 1195]);

        let err = "1200,abc,1200".parse::<Reading>().unwrap_err();
        assert_eq!(
            err,
            ReadingError::NonNumeric {
                zone: 1,
                token: "abc".to_string()
            }
        );
    }

    #[test]
    fn test_reading_display() {
        let reading = Reading::new(vec![2000, 100, 1200]);
        assert_eq!(reading.to_string(), "[2000, 100, 1200]");
    }

    #[test]
    fn test_reading_serializes_as_plain_array() {
        let reading = Reading::new(vec![1, 2, 3]);
        assert_eq!(serde_json::to_string(&reading).unwrap(), "[1,2,3]");
    }

    #[test]
    fn test_environment_validation() {
        assert!(Environment::default().validate().is_ok());
        assert!(Environment::new(36.5, 0.0).validate().is_ok());
        assert!(Environment::new(36.5, 100.0).validate().is_ok());
        assert_eq!(
            Environment::new(36.5, 100.5).validate(),
            Err(ReadingError::BatteryOutOfRange(100.5))
        );
        assert!(Environment::new(f64::NAN, 50.0).validate().is_err());
    }
}
