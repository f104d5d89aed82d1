//! Error types for Allayr
//!
//! This module defines all error types used throughout the library.
//! A cold-start tick and a safety shutdown verdict are normal outcomes,
//! not errors, and never appear here.

use crate::engine::TickOutcome;
use thiserror::Error;

/// Result type alias for Allayr operations
pub type Result<T> = std::result::Result<T, AllayrError>;

/// Main error type for Allayr operations
#[derive(Error, Debug)]
pub enum AllayrError {
    /// Tick input rejected before any state was touched
    #[error("Invalid input: {0}")]
    InvalidInput(#[from] ReadingError),

    /// The tick completed but its record could not be persisted.
    ///
    /// The computed outcome is carried along: persistence failure never
    /// rolls back the control decision.
    #[error("Log write failure at tick {}: {source}", .outcome.tick)]
    LogWriteFailure {
        outcome: Box<TickOutcome>,
        #[source]
        source: LogError,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Event log error outside of a tick (e.g. read-back)
    #[error("Event log error: {0}")]
    Log(#[from] LogError),
}

impl AllayrError {
    /// Outcome of the tick whose record failed to persist, if any.
    pub fn outcome(&self) -> Option<&TickOutcome> {
        match self {
            AllayrError::LogWriteFailure { outcome, .. } => Some(outcome),
            _ => None,
        }
    }
}

/// Errors raised while validating a reading or its environment
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadingError {
    /// Reading does not carry one value per configured zone
    #[error("Zone count mismatch: expected {expected} values, got {actual}")]
    ZoneCountMismatch { expected: usize, actual: usize },

    /// Value is not a finite number (NaN, Inf)
    #[error("Non-finite value {value} in zone {zone}")]
    NonFinite { zone: usize, value: f64 },

    /// Value does not fit a sensor value
    #[error("Value {value} in zone {zone} is out of range")]
    OutOfRange { zone: usize, value: f64 },

    /// Textual value could not be parsed as a number
    #[error("Non-numeric value {token:?} in zone {zone}")]
    NonNumeric { zone: usize, token: String },

    /// Battery level outside [0, 100]
    #[error("Battery level out of range: {0} (expected 0-100)")]
    BatteryOutOfRange(f64),

    /// Temperature is not a finite number
    #[error("Invalid temperature: {0}")]
    InvalidTemperature(f64),
}

/// Errors related to configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    /// Configuration file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid JSON for this schema
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors related to the persisted event log
#[derive(Error, Debug)]
pub enum LogError {
    /// Read, append or write failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded or decoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored line is not a valid record
    #[error("Corrupt log record at line {line}: {reason}")]
    Corrupt { line: usize, reason: String },
}
