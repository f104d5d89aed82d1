//! Temperature-adaptive decision threshold.
//!
//! The threshold is divided by the same normalization constant as the
//! anomaly score. Both are built from one [`ScoringConfig`] so they cannot
//! drift apart.

use crate::config::{ScoringConfig, ThresholdConfig};
use serde::{Deserialize, Serialize};

/// Thermal band of the current body temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThermalBand {
    Cold,
    Nominal,
    Hot,
}

impl ThermalBand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThermalBand::Cold => "cold",
            ThermalBand::Nominal => "nominal",
            ThermalBand::Hot => "hot",
        }
    }
}

/// Derives the anomaly threshold from body temperature. Stateless.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdPolicy {
    config: ThresholdConfig,
    normalization: f64,
}

impl ThresholdPolicy {
    pub fn new(config: ThresholdConfig, scoring: &ScoringConfig) -> Self {
        Self {
            config,
            normalization: scoring.normalization,
        }
    }

    /// Band for a temperature. Breakpoints are exclusive.
    pub fn band(&self, temperature_c: f64) -> ThermalBand {
        if temperature_c > self.config.hot_above_c {
            ThermalBand::Hot
        } else if temperature_c < self.config.cold_below_c {
            ThermalBand::Cold
        } else {
            ThermalBand::Nominal
        }
    }

    /// Threshold before normalization (500 / 750 / 400 with defaults).
    pub fn raw(&self, temperature_c: f64) -> f64 {
        let base = self.config.base;
        match self.band(temperature_c) {
            ThermalBand::Hot => base * self.config.hot_factor,
            ThermalBand::Cold => base * self.config.cold_factor,
            ThermalBand::Nominal => base,
        }
    }

    /// Threshold on the score's scale.
    pub fn threshold(&self, temperature_c: f64) -> f64 {
        self.raw(temperature_c) / self.normalization
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::new(ThresholdConfig::default(), &ScoringConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_raw_thresholds() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.raw(39.0), 750.0);
        assert_eq!(policy.raw(36.5), 500.0);
        assert_eq!(policy.raw(25.0), 400.0);
        assert_eq!(policy.raw(39.0), 1.5 * policy.raw(35.0));
    }

    #[test]
    fn test_breakpoints_are_exclusive() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.band(38.0), ThermalBand::Nominal);
        assert_eq!(policy.band(38.01), ThermalBand::Hot);
        assert_eq!(policy.band(30.0), ThermalBand::Nominal);
        assert_eq!(policy.band(29.99), ThermalBand::Cold);
    }

    #[test]
    fn test_normalized_threshold() {
        let policy = ThresholdPolicy::default();
        assert_relative_eq!(policy.threshold(36.5), 0.5);
        assert_relative_eq!(policy.threshold(39.0), 0.75);
        assert_relative_eq!(policy.threshold(25.0), 0.4);
    }

    #[test]
    fn test_shares_score_normalization() {
        let scoring = ScoringConfig { normalization: 100.0 };
        let policy = ThresholdPolicy::new(ThresholdConfig::default(), &scoring);
        assert_relative_eq!(policy.threshold(36.5), 5.0);
    }

    #[test]
    fn test_band_names() {
        assert_eq!(ThermalBand::Hot.as_str(), "hot");
        assert_eq!(ThermalBand::Cold.as_str(), "cold");
    }
}
