// Allayr Sim - Signal generator
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Seeded zone-signal generator.
//!
//! Each zone reads a base pressure plus an optional per-zone offset, a slow
//! gait oscillation and Gaussian noise. Scheduled injections are applied on
//! top. The same seed always yields the same sequence.

use crate::anomalies::{Injection, InjectionState};
use crate::dataset::Dataset;
use crate::error::SimError;
use allayr::{Environment, Reading, SampleSource, TickInput};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

/// Simulation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Values per reading.
    pub zone_count: usize,
    /// Nominal pressure for every zone.
    pub base_pressure: f64,
    /// Added to the base pressure per zone (missing entries are 0).
    #[serde(default)]
    pub zone_offsets: Vec<f64>,
    /// Standard deviation of per-value noise.
    pub noise_std: f64,
    /// Amplitude of the gait oscillation (0 = none).
    pub gait_amplitude: f64,
    /// Gait period in ticks.
    pub gait_period_ticks: u64,
    /// Environment before injections.
    pub environment: Environment,
    /// Stop after this many ticks (None = unbounded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_ticks: Option<u64>,
    /// Random seed for reproducibility.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Scheduled injections.
    #[serde(default)]
    pub injections: Vec<Injection>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            zone_count: 4,
            base_pressure: 1200.0,
            zone_offsets: Vec::new(),
            noise_std: 20.0,
            gait_amplitude: 0.0,
            gait_period_ticks: 10,
            environment: Environment::default(),
            max_ticks: None,
            seed: None,
            injections: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Create a new simulation config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set zone count.
    pub fn with_zones(mut self, zone_count: usize) -> Self {
        self.zone_count = zone_count;
        self
    }

    /// Set base pressure.
    pub fn with_base_pressure(mut self, pressure: f64) -> Self {
        self.base_pressure = pressure;
        self
    }

    /// Set per-zone offsets (graduated compression profile).
    pub fn with_zone_offsets(mut self, offsets: Vec<f64>) -> Self {
        self.zone_offsets = offsets;
        self
    }

    /// Set noise standard deviation.
    pub fn with_noise(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    /// Add a gait oscillation.
    pub fn with_gait(mut self, amplitude: f64, period_ticks: u64) -> Self {
        self.gait_amplitude = amplitude;
        self.gait_period_ticks = period_ticks;
        self
    }

    /// Set the environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Set body temperature.
    pub fn with_temperature(mut self, temperature_c: f64) -> Self {
        self.environment.temperature_c = temperature_c;
        self
    }

    /// Set battery level.
    pub fn with_battery(mut self, battery_level: f64) -> Self {
        self.environment.battery_level = battery_level;
        self
    }

    /// Limit the number of ticks.
    pub fn with_max_ticks(mut self, ticks: u64) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Set random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Add an injection.
    pub fn with_injection(mut self, injection: Injection) -> Self {
        self.injections.push(injection);
        self
    }

    /// Check the configuration.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.zone_count == 0 {
            return Err(SimError::InvalidConfig("zone_count must be at least 1".into()));
        }
        if !self.noise_std.is_finite() || self.noise_std < 0.0 {
            return Err(SimError::InvalidConfig(format!(
                "noise_std must be a non-negative number, got {}",
                self.noise_std
            )));
        }
        if self.gait_period_ticks == 0 {
            return Err(SimError::InvalidConfig(
                "gait_period_ticks must be at least 1".into(),
            ));
        }
        self.environment
            .validate()
            .map_err(|e| SimError::InvalidConfig(e.to_string()))
    }
}

/// Simulated sensor source.
#[derive(Debug, Clone)]
pub struct SimulatedSource {
    config: SimConfig,
    rng: StdRng,
    noise: Normal<f64>,
    states: Vec<InjectionState>,
    /// Environment carried across ticks so drains accumulate.
    environment: Environment,
    tick: u64,
}

impl SimulatedSource {
    /// Create a source from a validated configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        config.validate()?;

        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let noise = Normal::new(0.0, config.noise_std)
            .map_err(|e| SimError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            rng,
            noise,
            states: vec![InjectionState::default(); config.injections.len()],
            environment: config.environment,
            tick: 0,
            config,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ticks produced so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Generate the next input regardless of `max_ticks`.
    pub fn generate(&mut self) -> TickInput {
        let tick = self.tick;
        self.tick += 1;

        let gait = if self.config.gait_amplitude > 0.0 {
            let phase = (tick % self.config.gait_period_ticks) as f64
                / self.config.gait_period_ticks as f64;
            self.config.gait_amplitude * (2.0 * std::f64::consts::PI * phase).sin()
        } else {
            0.0
        };

        let mut values: Vec<f64> = (0..self.config.zone_count)
            .map(|z| {
                let offset = self.config.zone_offsets.get(z).copied().unwrap_or(0.0);
                self.config.base_pressure + offset + gait + self.noise.sample(&mut self.rng)
            })
            .collect();

        // Only the battery level carries over between ticks.
        let mut env = self.environment;
        env.link_ok = self.config.environment.link_ok;
        env.sensor_ok = self.config.environment.sensor_ok;
        env.temperature_c = self.config.environment.temperature_c;

        for (injection, state) in self.config.injections.iter().zip(self.states.iter_mut()) {
            if injection.is_active(tick) {
                state.apply(&injection.kind, &mut values, &mut env);
            }
        }
        self.environment = env;

        let reading = Reading::new(
            values
                .into_iter()
                .map(|v| v.max(0.0).round() as i64)
                .collect(),
        );
        TickInput::new(reading, env)
    }

    /// Generate `count` inputs into a dataset.
    pub fn take_dataset(&mut self, count: usize) -> Dataset {
        let mut dataset = Dataset::new(self.config.zone_count);
        for _ in 0..count {
            dataset.push(self.generate());
        }
        dataset
    }
}

impl SampleSource for SimulatedSource {
    fn next_input(&mut self) -> Option<TickInput> {
        if let Some(max) = self.config.max_ticks {
            if self.tick >= max {
                return None;
            }
        }
        Some(self.generate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomalies::InjectionKind;

    #[test]
    fn test_seeded_source_is_reproducible() {
        let config = SimConfig::new().with_seed(42);
        let mut a = SimulatedSource::new(config.clone()).unwrap();
        let mut b = SimulatedSource::new(config).unwrap();

        for _ in 0..50 {
            assert_eq!(a.next_input(), b.next_input());
        }
    }

    #[test]
    fn test_zone_count_and_range() {
        let mut source = SimulatedSource::new(SimConfig::new().with_zones(9).with_seed(1)).unwrap();
        for _ in 0..100 {
            let input = source.next_input().unwrap();
            assert_eq!(input.reading.len(), 9);
            assert!(input.reading.iter().all(|v| (1000..1400).contains(&v)));
        }
    }

    #[test]
    fn test_noiseless_source_is_flat() {
        let mut source = SimulatedSource::new(SimConfig::new().with_noise(0.0).with_seed(3)).unwrap();
        let input = source.next_input().unwrap();
        assert_eq!(input.reading, Reading::uniform(1200, 4));
    }

    #[test]
    fn test_max_ticks() {
        let mut source =
            SimulatedSource::new(SimConfig::new().with_max_ticks(3).with_seed(0)).unwrap();
        assert_eq!(std::iter::from_fn(|| source.next_input()).count(), 3);
        assert_eq!(source.tick(), 3);
    }

    #[test]
    fn test_battery_drain_accumulates() {
        let config = SimConfig::new()
            .with_battery(30.0)
            .with_seed(5)
            .with_injection(
                Injection::new(InjectionKind::BatteryDrain { per_tick: 1.0 }, 0).with_duration(10),
            );
        let mut source = SimulatedSource::new(config).unwrap();

        let mut last = 0.0;
        for _ in 0..15 {
            last = source.next_input().unwrap().environment.battery_level;
        }
        assert_eq!(last, 20.0);
    }

    #[test]
    fn test_link_loss_window() {
        let config = SimConfig::new().with_seed(9).with_injection(
            Injection::new(InjectionKind::LinkLoss, 2).with_duration(2),
        );
        let mut source = SimulatedSource::new(config).unwrap();
        let links: Vec<bool> = (0..6)
            .map(|_| source.next_input().unwrap().environment.link_ok)
            .collect();
        assert_eq!(links, vec![true, true, false, false, true, true]);
    }

    #[test]
    fn test_invalid_config() {
        assert!(SimulatedSource::new(SimConfig::new().with_zones(0)).is_err());
        assert!(SimulatedSource::new(SimConfig::new().with_noise(-1.0)).is_err());
        assert!(SimulatedSource::new(SimConfig::new().with_battery(120.0)).is_err());
    }
}
