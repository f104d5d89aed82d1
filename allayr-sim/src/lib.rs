// Allayr Sim - Simulated sensor sources
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! # Allayr Sim
//!
//! Simulated sample sources for the Allayr control loop.
//!
//! There is no real sensor driver or BLE transport; this crate stands in
//! for them with:
//!
//! - **Seeded signals**: Per-zone base pressure, gait oscillation and noise
//! - **Fault injection**: Pressure spikes, stuck or dropped zones, battery drain, fever, link loss
//! - **Scenarios**: Named presets for demos and tests
//! - **Datasets**: CSV / JSON recordings that replay as a source
//!
//! ## Quick Start
//!
//! ```rust
//! use allayr::{ControlConfig, ControlLoop, MemoryLog, Session};
//! use allayr_sim::{Scenario, SimulatedSource};
//!
//! let config = Scenario::PressureSpike.config(4).with_seed(42).with_max_ticks(200);
//! let mut source = SimulatedSource::new(config).unwrap();
//!
//! let control = ControlLoop::new(ControlConfig::default(), Default::default()).unwrap();
//! let mut session = Session::new(control, MemoryLog::new());
//! let ticks = session.run(&mut source, None).unwrap();
//! assert_eq!(ticks, 200);
//! ```

pub mod anomalies;
pub mod dataset;
pub mod error;
pub mod generator;
pub mod scenario;

// Re-exports for convenience
pub use anomalies::{Injection, InjectionKind, InjectionState};
pub use dataset::Dataset;
pub use error::SimError;
pub use generator::{SimConfig, SimulatedSource};
pub use scenario::{Scenario, FAULT_ONSET_TICK};
