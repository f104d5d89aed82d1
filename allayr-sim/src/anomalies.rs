// Allayr Sim - Fault and anomaly injection
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Fault and anomaly injection.
//!
//! Injections alter either the zone signals (spikes, stuck or dropped
//! sensors, drift) or the device environment (battery drain, fever, link
//! and sensor failures) over a window of ticks.

use allayr::Environment;
use serde::{Deserialize, Serialize};

/// One scheduled injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Injection {
    /// What to inject.
    pub kind: InjectionKind,
    /// First tick (0-based) the injection is active.
    pub start_tick: u64,
    /// Duration in ticks (None = until end).
    pub duration_ticks: Option<u64>,
}

impl Injection {
    /// Create an open-ended injection.
    pub fn new(kind: InjectionKind, start_tick: u64) -> Self {
        Self {
            kind,
            start_tick,
            duration_ticks: None,
        }
    }

    /// Set duration in ticks.
    pub fn with_duration(mut self, ticks: u64) -> Self {
        self.duration_ticks = Some(ticks);
        self
    }

    /// Check if the injection is active at a tick.
    pub fn is_active(&self, tick: u64) -> bool {
        if tick < self.start_tick {
            return false;
        }
        match self.duration_ticks {
            Some(duration) => tick < self.start_tick + duration,
            None => true,
        }
    }

    /// Ticks since the injection started.
    pub fn ticks_since_start(&self, tick: u64) -> u64 {
        tick.saturating_sub(self.start_tick)
    }
}

/// Kind of injected fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InjectionKind {
    /// Pressure added to one zone while active.
    PressureSpike { zone: usize, magnitude: f64 },

    /// Zone value frozen at its first value after activation.
    StuckZone { zone: usize },

    /// Zone reads zero.
    Dropout { zone: usize },

    /// Zone value drifts away linearly.
    Drift { zone: usize, rate_per_tick: f64 },

    /// Battery level decreases by a fixed amount per tick.
    BatteryDrain { per_tick: f64 },

    /// Body temperature forced to a value.
    Fever { temperature_c: f64 },

    /// BLE link reported down.
    LinkLoss,

    /// Sensor array reported unhealthy.
    SensorFault,
}

impl InjectionKind {
    /// Short name for logs and dataset metadata.
    pub fn name(&self) -> &'static str {
        match self {
            InjectionKind::PressureSpike { .. } => "pressure_spike",
            InjectionKind::StuckZone { .. } => "stuck_zone",
            InjectionKind::Dropout { .. } => "dropout",
            InjectionKind::Drift { .. } => "drift",
            InjectionKind::BatteryDrain { .. } => "battery_drain",
            InjectionKind::Fever { .. } => "fever",
            InjectionKind::LinkLoss => "link_loss",
            InjectionKind::SensorFault => "sensor_fault",
        }
    }

    /// Whether the injection alters the environment rather than the signal.
    pub fn affects_environment(&self) -> bool {
        matches!(
            self,
            InjectionKind::BatteryDrain { .. }
                | InjectionKind::Fever { .. }
                | InjectionKind::LinkLoss
                | InjectionKind::SensorFault
        )
    }
}

/// Per-injection memory (stuck value, accumulated drift).
#[derive(Debug, Clone, Default)]
pub struct InjectionState {
    stuck_value: Option<f64>,
    drift_accumulated: f64,
}

impl InjectionState {
    /// Apply an injection to one tick's zone values and environment.
    ///
    /// Zone indices past the end of `values` are ignored.
    pub fn apply(&mut self, kind: &InjectionKind, values: &mut [f64], env: &mut Environment) {
        match kind {
            InjectionKind::PressureSpike { zone, magnitude } => {
                if let Some(v) = values.get_mut(*zone) {
                    *v += magnitude;
                }
            }

            InjectionKind::StuckZone { zone } => {
                if let Some(v) = values.get_mut(*zone) {
                    *v = *self.stuck_value.get_or_insert(*v);
                }
            }

            InjectionKind::Dropout { zone } => {
                if let Some(v) = values.get_mut(*zone) {
                    *v = 0.0;
                }
            }

            InjectionKind::Drift {
                zone,
                rate_per_tick,
            } => {
                self.drift_accumulated += rate_per_tick;
                if let Some(v) = values.get_mut(*zone) {
                    *v += self.drift_accumulated;
                }
            }

            InjectionKind::BatteryDrain { per_tick } => {
                env.battery_level = (env.battery_level - per_tick).clamp(0.0, 100.0);
            }

            InjectionKind::Fever { temperature_c } => {
                env.temperature_c = *temperature_c;
            }

            InjectionKind::LinkLoss => env.link_ok = false,

            InjectionKind::SensorFault => env.sensor_ok = false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injection_active_window() {
        let injection = Injection::new(InjectionKind::LinkLoss, 100).with_duration(50);

        assert!(!injection.is_active(99));
        assert!(injection.is_active(100));
        assert!(injection.is_active(149));
        assert!(!injection.is_active(150));
        assert_eq!(injection.ticks_since_start(120), 20);
    }

    #[test]
    fn test_open_ended_injection() {
        let injection = Injection::new(InjectionKind::SensorFault, 10);
        assert!(injection.is_active(1_000_000));
    }

    #[test]
    fn test_stuck_zone_holds_first_value() {
        let mut state = InjectionState::default();
        let mut env = Environment::default();
        let kind = InjectionKind::StuckZone { zone: 1 };

        let mut values = [1200.0, 1180.0];
        state.apply(&kind, &mut values, &mut env);
        assert_eq!(values[1], 1180.0);

        let mut values = [1200.0, 1250.0];
        state.apply(&kind, &mut values, &mut env);
        assert_eq!(values[1], 1180.0);
    }

    #[test]
    fn test_drift_accumulates() {
        let mut state = InjectionState::default();
        let mut env = Environment::default();
        let kind = InjectionKind::Drift {
            zone: 0,
            rate_per_tick: 5.0,
        };

        let mut last = 0.0;
        for _ in 0..3 {
            let mut values = [1000.0];
            state.apply(&kind, &mut values, &mut env);
            last = values[0];
        }
        assert_eq!(last, 1015.0);
    }

    #[test]
    fn test_environment_injections() {
        let mut state = InjectionState::default();
        let mut env = Environment::new(36.5, 3.0);
        let mut values = [0.0; 4];

        state.apply(&InjectionKind::BatteryDrain { per_tick: 5.0 }, &mut values, &mut env);
        assert_eq!(env.battery_level, 0.0);

        state.apply(&InjectionKind::Fever { temperature_c: 39.2 }, &mut values, &mut env);
        assert_eq!(env.temperature_c, 39.2);

        state.apply(&InjectionKind::LinkLoss, &mut values, &mut env);
        assert!(!env.link_ok);
        assert!(InjectionKind::LinkLoss.affects_environment());
        assert!(!InjectionKind::Dropout { zone: 0 }.affects_environment());
    }

    #[test]
    fn test_out_of_range_zone_ignored() {
        let mut state = InjectionState::default();
        let mut env = Environment::default();
        let mut values = [1200.0; 4];
        state.apply(
            &InjectionKind::PressureSpike {
                zone: 8,
                magnitude: 500.0,
            },
            &mut values,
            &mut env,
        );
        assert_eq!(values, [1200.0; 4]);
    }
}
