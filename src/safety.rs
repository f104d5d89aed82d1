//! Terminal safety check ("mercy shutdown").
//!
//! The monitor only reports. Whether the host stops the device on a
//! positive verdict is outside the control loop.

use crate::config::SafetyConfig;
use crate::device::DeviceState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A condition that requires the device to shut down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShutdownReason {
    CriticalBattery { level: f64 },
    OverTemperature { temperature_c: f64 },
    UnderTemperature { temperature_c: f64 },
    /// Link or sensor failure forced fallback operation.
    FallbackActive,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::CriticalBattery { level } => {
                write!(f, "critical battery ({:.1}%)", level)
            }
            ShutdownReason::OverTemperature { temperature_c } => {
                write!(f, "over temperature ({:.1} C)", temperature_c)
            }
            ShutdownReason::UnderTemperature { temperature_c } => {
                write!(f, "under temperature ({:.1} C)", temperature_c)
            }
            ShutdownReason::FallbackActive => write!(f, "fallback active"),
        }
    }
}

/// Result of one safety evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SafetyVerdict {
    pub shutdown_required: bool,
    /// Every tripped condition, in check order.
    pub reasons: Vec<ShutdownReason>,
}

impl SafetyVerdict {
    pub fn nominal() -> Self {
        Self::default()
    }

    fn from_reasons(reasons: Vec<ShutdownReason>) -> Self {
        Self {
            shutdown_required: !reasons.is_empty(),
            reasons,
        }
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.shutdown_required {
            return write!(f, "nominal");
        }
        write!(f, "shutdown required: ")?;
        for (i, reason) in self.reasons.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", reason)?;
        }
        Ok(())
    }
}

/// Stateless shutdown predicate over [`DeviceState`]. No hysteresis.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SafetyMonitor {
    config: SafetyConfig,
}

impl SafetyMonitor {
    pub fn new(config: SafetyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    /// Evaluate every shutdown condition.
    pub fn evaluate(&self, state: &DeviceState) -> SafetyVerdict {
        let mut reasons = Vec::new();

        if state.battery_level < self.config.min_battery {
            reasons.push(ShutdownReason::CriticalBattery {
                level: state.battery_level,
            });
        }
        if state.temperature_c > self.config.max_temperature_c {
            reasons.push(ShutdownReason::OverTemperature {
                temperature_c: state.temperature_c,
            });
        }
        if state.temperature_c < self.config.min_temperature_c {
            reasons.push(ShutdownReason::UnderTemperature {
                temperature_c: state.temperature_c,
            });
        }
        if state.fallback_enabled {
            reasons.push(ShutdownReason::FallbackActive);
        }

        SafetyVerdict::from_reasons(reasons)
    }

    pub fn is_shutdown_required(&self, state: &DeviceState) -> bool {
        self.evaluate(state).shutdown_required
    }
}
