// Allayr Sim - Named scenarios
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Named simulation scenarios.
//!
//! Each scenario is a [`SimConfig`] preset whose injections start after
//! the default window has filled, so the control loop is already scoring
//! when the fault appears.

use crate::anomalies::{Injection, InjectionKind};
use crate::error::SimError;
use crate::generator::SimConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// First tick at which scenario faults appear.
pub const FAULT_ONSET_TICK: u64 = 150;

/// Built-in scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scenario {
    /// Healthy wearer, no faults.
    Nominal,
    /// Sustained pressure rise at the ankle.
    PressureSpike,
    /// One zone freezes.
    StuckSensor,
    /// Battery drains towards shutdown.
    LowBattery,
    /// BLE link drops out for a while.
    LinkLoss,
    /// Body temperature climbs above the hot breakpoint.
    Fever,
}

impl Scenario {
    /// All scenarios.
    pub fn all() -> &'static [Scenario] {
        &[
            Scenario::Nominal,
            Scenario::PressureSpike,
            Scenario::StuckSensor,
            Scenario::LowBattery,
            Scenario::LinkLoss,
            Scenario::Fever,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Scenario::Nominal => "nominal",
            Scenario::PressureSpike => "pressure-spike",
            Scenario::StuckSensor => "stuck-sensor",
            Scenario::LowBattery => "low-battery",
            Scenario::LinkLoss => "link-loss",
            Scenario::Fever => "fever",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Scenario::Nominal => "Healthy wearer, steady pressure, no faults",
            Scenario::PressureSpike => "Ankle pressure rises by 800 for 30 ticks",
            Scenario::StuckSensor => "Second zone freezes at its last value",
            Scenario::LowBattery => "Battery drains 1% per tick from 30%",
            Scenario::LinkLoss => "BLE link down for 20 ticks",
            Scenario::Fever => "Body temperature held at 39.2 C",
        }
    }

    /// Simulation config for this scenario.
    pub fn config(&self, zone_count: usize) -> SimConfig {
        let base = SimConfig::new().with_zones(zone_count);
        let onset = FAULT_ONSET_TICK;

        match self {
            Scenario::Nominal => base,
            Scenario::PressureSpike => base.with_injection(
                Injection::new(
                    InjectionKind::PressureSpike {
                        zone: 0,
                        magnitude: 800.0,
                    },
                    onset,
                )
                .with_duration(30),
            ),
            Scenario::StuckSensor => {
                base.with_injection(Injection::new(InjectionKind::StuckZone { zone: 1 }, onset))
            }
            Scenario::LowBattery => base.with_battery(30.0).with_injection(Injection::new(
                InjectionKind::BatteryDrain { per_tick: 1.0 },
                onset,
            )),
            Scenario::LinkLoss => base.with_injection(
                Injection::new(InjectionKind::LinkLoss, onset).with_duration(20),
            ),
            Scenario::Fever => base.with_injection(Injection::new(
                InjectionKind::Fever {
                    temperature_c: 39.2,
                },
                onset,
            )),
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scenario {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_lowercase().replace('_', "-");
        Scenario::all()
            .iter()
            .copied()
            .find(|sc| sc.as_str() == key)
            .ok_or_else(|| SimError::UnknownScenario(s.to_string()))
    }
}
