//! Control loop configuration.
//!
//! Every constant the loop depends on lives here with its default value.
//! Configurations are plain `serde` structs so a host can load them from
//! JSON; missing fields fall back to their defaults.

use crate::error::ConfigError;
use crate::zone::ZoneLayout;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Master configuration for a control session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// Sliding window settings.
    pub window: WindowConfig,

    /// Sensor zone count and ranking layout.
    pub zones: ZoneConfig,

    /// Anomaly score normalization.
    pub scoring: ScoringConfig,

    /// Temperature-adaptive threshold.
    pub threshold: ThresholdConfig,

    /// Compression action policy.
    pub policy: PolicyConfig,

    /// Device-state adaptation bounds.
    pub device: DeviceConfig,

    /// Shutdown conditions.
    pub safety: SafetyConfig,
}

impl ControlConfig {
    /// Nine-sensor variant ranked over three named regions.
    pub fn nine_zone() -> Self {
        Self {
            zones: ZoneConfig {
                count: 9,
                layout: ZoneLayout::three_regions(),
            },
            ..Default::default()
        }
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.capacity == 0 {
            return Err(ConfigError::invalid("window.capacity", "must be at least 1"));
        }

        if self.zones.count == 0 {
            return Err(ConfigError::invalid("zones.count", "must be at least 1"));
        }
        self.zones.layout.validate(self.zones.count)?;

        let n = self.scoring.normalization;
        if !n.is_finite() || n <= 0.0 {
            return Err(ConfigError::invalid(
                "scoring.normalization",
                format!("must be a positive number, got {}", n),
            ));
        }

        let t = &self.threshold;
        if !t.base.is_finite() || t.base <= 0.0 {
            return Err(ConfigError::invalid("threshold.base", "must be positive"));
        }
        if t.cold_below_c >= t.hot_above_c {
            return Err(ConfigError::invalid(
                "threshold.cold_below_c",
                format!(
                    "must be below hot_above_c ({} >= {})",
                    t.cold_below_c, t.hot_above_c
                ),
            ));
        }

        let ratio = self.policy.decrease_ratio;
        if !(0.0..=1.0).contains(&ratio) {
            return Err(ConfigError::invalid(
                "policy.decrease_ratio",
                format!("must be within 0-1, got {}", ratio),
            ));
        }

        let d = &self.device;
        if d.min_sampling_rate == 0 || d.min_sampling_rate > d.max_sampling_rate {
            return Err(ConfigError::invalid(
                "device.min_sampling_rate",
                format!(
                    "need 1 <= min <= max, got {}..{}",
                    d.min_sampling_rate, d.max_sampling_rate
                ),
            ));
        }
        if !(d.min_sampling_rate..=d.max_sampling_rate).contains(&d.initial_sampling_rate) {
            return Err(ConfigError::invalid(
                "device.initial_sampling_rate",
                format!(
                    "{} is outside {}..={}",
                    d.initial_sampling_rate, d.min_sampling_rate, d.max_sampling_rate
                ),
            ));
        }
        if d.low_battery > d.high_battery {
            return Err(ConfigError::invalid(
                "device.low_battery",
                "must not exceed high_battery",
            ));
        }

        let s = &self.safety;
        if s.min_temperature_c >= s.max_temperature_c {
            return Err(ConfigError::invalid(
                "safety.min_temperature_c",
                "must be below max_temperature_c",
            ));
        }

        Ok(())
    }

    /// Parse from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Sliding window configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Readings kept for scoring; scoring starts once the window is full.
    pub capacity: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { capacity: 100 }
    }
}

/// Sensor zone configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Values per reading (4 or 9 on current hardware).
    pub count: usize,
    /// Ranking layout used to attribute actions.
    pub layout: ZoneLayout,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            count: 4,
            layout: ZoneLayout::Flat,
        }
    }
}

/// Anomaly score configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Divisor shared by the score and the threshold.
    pub normalization: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            normalization: 1000.0,
        }
    }
}

/// Temperature-adaptive threshold configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Threshold at nominal body temperature (before normalization).
    pub base: f64,
    /// Above this temperature the threshold is raised.
    pub hot_above_c: f64,
    /// Below this temperature the threshold is lowered.
    pub cold_below_c: f64,
    pub hot_factor: f64,
    pub cold_factor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            base: 500.0,
            hot_above_c: 38.0,
            cold_below_c: 30.0,
            hot_factor: 1.5,
            cold_factor: 0.8,
        }
    }
}

/// Compression action policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Scores below `threshold * decrease_ratio` relax compression.
    pub decrease_ratio: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            decrease_ratio: 0.7,
        }
    }
}

/// Device-state adaptation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Sampling rate at session start.
    pub initial_sampling_rate: u32,
    pub min_sampling_rate: u32,
    pub max_sampling_rate: u32,
    /// Below this battery level the sampling rate steps down.
    pub low_battery: f64,
    /// Above this battery level the sampling rate steps up.
    pub high_battery: f64,
    /// Below this battery level inference is disabled.
    pub inference_cutoff: f64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            initial_sampling_rate: 10,
            min_sampling_rate: 1,
            max_sampling_rate: 20,
            low_battery: 20.0,
            high_battery: 80.0,
            inference_cutoff: 10.0,
        }
    }
}

/// Shutdown ("mercy shutdown") thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Shutdown when battery drops below this level.
    pub min_battery: f64,
    /// Shutdown above this body temperature.
    pub max_temperature_c: f64,
    /// Shutdown below this body temperature.
    pub min_temperature_c: f64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            min_battery: 5.0,
            max_temperature_c: 42.0,
            min_temperature_c: 20.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ControlConfig::default();
        assert_eq!(config.window.capacity, 100);
        assert_eq!(config.zones.count, 4);
        assert_eq!(config.scoring.normalization, 1000.0);
        assert_eq!(config.threshold.base, 500.0);
        assert_eq!(config.device.initial_sampling_rate, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_nine_zone_preset() {
        let config = ControlConfig::nine_zone();
        assert_eq!(config.zones.count, 9);
        assert!(matches!(config.zones.layout, ZoneLayout::Grouped(ref r) if r.len() == 3));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = ControlConfig::nine_zone();
        let json = config.to_json_pretty().unwrap();
        let parsed = ControlConfig::from_json(&json).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ControlConfig::from_json(r#"{ "window": { "capacity": 10 } }"#).unwrap();
        assert_eq!(config.window.capacity, 10);
        assert_eq!(config.zones.count, 4);
        assert_eq!(config.safety.min_battery, 5.0);
    }

    #[test]
    fn test_invalid_configs_rejected() {
        let mut config = ControlConfig::default();
        config.window.capacity = 0;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.scoring.normalization = 0.0;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.device.initial_sampling_rate = 25;
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.zones.layout = ZoneLayout::three_regions();
        assert!(config.validate().is_err());

        let mut config = ControlConfig::default();
        config.threshold.cold_below_c = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("allayr.json");
        std::fs::write(&path, r#"{ "zones": { "count": 9, "layout": "Flat" } }"#).unwrap();

        let config = ControlConfig::from_json_file(&path).unwrap();
        assert_eq!(config.zones.count, 9);
        assert_eq!(config.zones.layout, ZoneLayout::Flat);
    }
}
