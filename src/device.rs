//! Device operating state and its per-tick adaptation rules.
//!
//! The three rules are independent: each reads the state and writes a
//! different field, so their order does not matter. None of them touch the
//! score, threshold or action.

use crate::config::DeviceConfig;
use crate::reading::Environment;
use serde::{Deserialize, Serialize};

/// Mutable operating state of the device, owned by the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    /// Battery charge, 0-100.
    pub battery_level: f64,
    pub sensor_ok: bool,
    pub link_ok: bool,
    /// Body temperature in degrees Celsius.
    pub temperature_c: f64,
    /// Samples per second.
    pub sampling_rate: u32,
    pub inference_enabled: bool,
    pub fallback_enabled: bool,
}

impl DeviceState {
    /// State at session start: configured sampling rate, inference on,
    /// fallback off.
    pub fn new(config: &DeviceConfig, environment: &Environment) -> Self {
        Self {
            battery_level: environment.battery_level,
            sensor_ok: environment.sensor_ok,
            link_ok: environment.link_ok,
            temperature_c: environment.temperature_c,
            sampling_rate: config.initial_sampling_rate,
            inference_enabled: true,
            fallback_enabled: false,
        }
    }

    /// Copy the caller-supplied scalars into the state.
    pub fn apply_environment(&mut self, environment: &Environment) {
        self.battery_level = environment.battery_level;
        self.sensor_ok = environment.sensor_ok;
        self.link_ok = environment.link_ok;
        self.temperature_c = environment.temperature_c;
    }

    /// Run all adaptation rules.
    pub fn adapt(&mut self, config: &DeviceConfig) {
        self.adapt_sampling_rate(config);
        self.gate_inference(config);
        self.update_fallback();
    }

    /// Step the sampling rate down on low battery and up on high battery,
    /// within the configured bounds. Breakpoints are exclusive.
    pub fn adapt_sampling_rate(&mut self, config: &DeviceConfig) {
        if self.battery_level < config.low_battery {
            self.sampling_rate = self
                .sampling_rate
                .saturating_sub(1)
                .max(config.min_sampling_rate);
        } else if self.battery_level > config.high_battery {
            self.sampling_rate = self
                .sampling_rate
                .saturating_add(1)
                .min(config.max_sampling_rate);
        }
    }

    /// Disable inference when the battery is nearly empty.
    pub fn gate_inference(&mut self, config: &DeviceConfig) {
        self.inference_enabled = self.battery_level >= config.inference_cutoff;
    }

    /// Fall back when either the link or the sensor array is unhealthy.
    pub fn update_fallback(&mut self) {
        self.fallback_enabled = !self.link_ok || !self.sensor_ok;
    }
}

impl Default for DeviceState {
    fn default() -> Self {
        Self::new(&DeviceConfig::default(), &Environment::default())
    }
}
