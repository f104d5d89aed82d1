// Allayr Runner - Error types
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

use crate::replay::ReplayError;
use allayr::{AllayrError, ConfigError, LogError};
use allayr_sim::SimError;
use thiserror::Error;

/// Top-level runner errors.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Control(#[from] AllayrError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Simulation error: {0}")]
    Sim(#[from] SimError),

    #[error("Replay error: {0}")]
    Replay(#[from] ReplayError),

    #[error("Event log error: {0}")]
    Log(#[from] LogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Usage(String),
}
