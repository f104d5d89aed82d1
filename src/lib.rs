//! # Allayr - Compression control loop
//!
//! Sensor-to-decision control loop for an adaptive compression sock. Each
//! sampling tick takes one multi-zone pressure reading plus the device's
//! environment and produces a compression decision and a safety verdict.
//!
//! ## Key Features
//!
//! - **Variance Scoring**: Global dispersion of a sliding window of readings
//! - **Thermal Threshold**: Decision threshold adapts to body temperature
//! - **Zone Attribution**: Actions target the hottest or coolest zone or region
//! - **Device Adaptation**: Sampling rate, inference gate and fallback follow battery and link health
//! - **Mercy Shutdown**: Terminal safety verdict on every tick
//!
//! ## Quick Start
//!
//! ```rust
//! use allayr::{CompressionAction, ControlConfig, ControlLoop, Environment, MemoryLog, Reading, Session, TickInput};
//!
//! let mut config = ControlConfig::default();
//! config.window.capacity = 10;
//! let control = ControlLoop::new(config, Environment::default()).unwrap();
//! let mut session = Session::new(control, MemoryLog::new());
//!
//! // Window fills: no decision yet
//! for _ in 0..9 {
//!     let outcome = session.step(TickInput::new(Reading::uniform(1200, 4), Environment::default())).unwrap();
//!     assert!(outcome.is_warming_up());
//! }
//!
//! // Flat window: score 0, maintain
//! let outcome = session.step(TickInput::new(Reading::uniform(1200, 4), Environment::default())).unwrap();
//! assert_eq!(outcome.action(), Some(&CompressionAction::Maintain));
//! assert!(!outcome.shutdown_required());
//! ```
//!
//! ## Modules
//!
//! - [`window`]: Sliding window of recent readings
//! - [`anomaly`]: Window scoring
//! - [`threshold`]: Temperature-adaptive threshold
//! - [`policy`]: Compression actions and control modes
//! - [`device`]: Device state adaptation
//! - [`safety`]: Shutdown verdict
//! - [`engine`]: Per-tick orchestration
//! - [`event_log`]: Durable record stores
//! - [`metrics`]: Loop statistics

// Modules
pub mod anomaly;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod event_log;
pub mod metrics;
pub mod policy;
pub mod reading;
pub mod record;
pub mod safety;
pub mod session;
pub mod source;
pub mod threshold;
pub mod window;
pub mod zone;

// Re-exports for convenient access
pub use anomaly::{AnomalyScorer, VarianceScorer};
pub use config::{
    ControlConfig, DeviceConfig, PolicyConfig, SafetyConfig, ScoringConfig, ThresholdConfig,
    WindowConfig, ZoneConfig,
};
pub use device::DeviceState;
pub use engine::{ControlLoop, TickOutcome};
pub use error::{AllayrError, ConfigError, LogError, ReadingError, Result};
pub use event_log::{EventLog, JsonArrayLog, JsonLinesLog, LogFormat, MemoryLog};
pub use metrics::LoopStats;
pub use policy::{
    ActionKind, ActionPolicy, CompressionAction, ControlMode, Decision, ManualCommand,
};
pub use reading::{Environment, Reading, SensorValue, TickInput};
pub use record::{ActionRecord, Clock, FixedClock, LogEntry, SystemClock};
pub use safety::{SafetyMonitor, SafetyVerdict, ShutdownReason};
pub use session::Session;
pub use source::{SampleSource, ScriptedSource};
pub use threshold::{ThermalBand, ThresholdPolicy};
pub use window::SlidingWindow;
pub use zone::{
    zone_label, Region, ZoneLayout, ZoneMagnitude, ZoneRanking, ZoneTarget, FLAT_ZONE_LABELS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_session() {
        let mut config = ControlConfig::default();
        config.window.capacity = 2;
        let control = ControlLoop::new(config, Environment::default()).unwrap();
        let mut session = Session::new(control, MemoryLog::new());

        let mut source = ScriptedSource::repeat(Reading::uniform(1200, 4), Environment::default(), 3);
        session.run(&mut source, None).unwrap();

        let entries = session.log().read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].compression_action, "Maintain compression");
    }
}
