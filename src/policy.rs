//! Compression action policy.
//!
//! Maps the latest reading, the window score and the current threshold to
//! a compression action. The control mode is a tagged variant so the
//! decision stays total over both autonomous and manual operation.

use crate::config::PolicyConfig;
use crate::reading::Reading;
use crate::zone::{ZoneLayout, ZoneRanking, ZoneTarget};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Operator command used in manual mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManualCommand {
    Increase,
    Decrease,
    Maintain,
}

impl ManualCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManualCommand::Increase => "Increase",
            ManualCommand::Decrease => "Decrease",
            ManualCommand::Maintain => "Maintain",
        }
    }

    /// The action dictated by this command; manual actions carry no zone.
    pub fn to_action(self) -> CompressionAction {
        match self {
            ManualCommand::Increase => CompressionAction::Increase { zone: None },
            ManualCommand::Decrease => CompressionAction::Decrease { zone: None },
            ManualCommand::Maintain => CompressionAction::Maintain,
        }
    }
}

impl FromStr for ManualCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "increase" | "inc" | "+" => Ok(ManualCommand::Increase),
            "decrease" | "dec" | "-" => Ok(ManualCommand::Decrease),
            "maintain" | "hold" | "=" => Ok(ManualCommand::Maintain),
            other => Err(format!(
                "unknown command {:?} (expected increase, decrease or maintain)",
                other
            )),
        }
    }
}

/// Who decides the compression action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlMode {
    /// Actions follow the score and zone ranking.
    #[default]
    Autonomous,
    /// Actions are dictated by the operator.
    Manual(ManualCommand),
}

impl fmt::Display for ControlMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlMode::Autonomous => write!(f, "autonomous"),
            ControlMode::Manual(cmd) => write!(f, "manual ({})", cmd.as_str()),
        }
    }
}

/// Kind of action, without zone attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Increase,
    Decrease,
    Maintain,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Increase => "increase",
            ActionKind::Decrease => "decrease",
            ActionKind::Maintain => "maintain",
        }
    }
}

/// Compression control decision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompressionAction {
    /// Tighten compression, optionally at a specific zone.
    Increase { zone: Option<ZoneTarget> },
    /// Relax compression, optionally at a specific zone.
    Decrease { zone: Option<ZoneTarget> },
    /// Keep the current compression.
    Maintain,
}

impl CompressionAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            CompressionAction::Increase { .. } => ActionKind::Increase,
            CompressionAction::Decrease { .. } => ActionKind::Decrease,
            CompressionAction::Maintain => ActionKind::Maintain,
        }
    }

    /// Zone the action is attributed to, if any.
    pub fn zone(&self) -> Option<&ZoneTarget> {
        match self {
            CompressionAction::Increase { zone } | CompressionAction::Decrease { zone } => {
                zone.as_ref()
            }
            CompressionAction::Maintain => None,
        }
    }
}

/// Log form: `"Increase compression in Zone 1"`, `"Maintain compression"`.
impl fmt::Display for CompressionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind() {
            ActionKind::Increase => "Increase",
            ActionKind::Decrease => "Decrease",
            ActionKind::Maintain => "Maintain",
        };
        match self.zone() {
            Some(zone) => write!(f, "{} compression in {}", verb, zone),
            None => write!(f, "{} compression", verb),
        }
    }
}

/// Error parsing an action string read back from a log.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized compression action: {0:?}")]
pub struct ParseActionError(pub String);

impl FromStr for CompressionAction {
    type Err = ParseActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseActionError(s.to_string());
        let s = s.trim();
        let (verb, rest) = s.split_once(" compression").ok_or_else(err)?;

        let zone = match rest.trim() {
            "" => None,
            rest => {
                let name = rest.strip_prefix("in ").ok_or_else(err)?.trim();
                if name.is_empty() {
                    return Err(err());
                }
                Some(ZoneTarget::from_str(name).unwrap_or_else(|never| match never {}))
            }
        };

        match (verb, zone) {
            ("Increase", zone) => Ok(CompressionAction::Increase { zone }),
            ("Decrease", zone) => Ok(CompressionAction::Decrease { zone }),
            ("Maintain", None) => Ok(CompressionAction::Maintain),
            _ => Err(err()),
        }
    }
}

/// Result of one policy decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub action: CompressionAction,
    /// `score > threshold`, regardless of control mode.
    pub is_anomaly: bool,
}

/// Zone-ranking compression policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionPolicy {
    layout: ZoneLayout,
    decrease_ratio: f64,
}

impl ActionPolicy {
    pub fn new(layout: ZoneLayout, config: &PolicyConfig) -> Self {
        Self {
            layout,
            decrease_ratio: config.decrease_ratio,
        }
    }

    pub fn layout(&self) -> &ZoneLayout {
        &self.layout
    }

    /// Per-zone magnitudes of a reading under this policy's layout.
    pub fn rank(&self, reading: &Reading) -> ZoneRanking {
        self.layout.rank(reading)
    }

    /// Decide the action for the latest reading.
    ///
    /// Autonomous rules:
    /// - `score > threshold`: increase at the zone with the largest magnitude
    /// - `0 < score < threshold * decrease_ratio`: decrease at the smallest
    /// - otherwise maintain; a score of exactly zero (flat window) maintains
    pub fn decide(
        &self,
        mode: &ControlMode,
        reading: &Reading,
        score: f64,
        threshold: f64,
    ) -> Decision {
        let is_anomaly = score > threshold;

        let action = match mode {
            ControlMode::Manual(command) => command.to_action(),
            ControlMode::Autonomous => {
                if is_anomaly {
                    CompressionAction::Increase {
                        zone: self.rank(reading).max().cloned(),
                    }
                } else if score > 0.0 && score < threshold * self.decrease_ratio {
                    CompressionAction::Decrease {
                        zone: self.rank(reading).min().cloned(),
                    }
                } else {
                    CompressionAction::Maintain
                }
            }
        };

        Decision { action, is_anomaly }
    }
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self::new(ZoneLayout::Flat, &PolicyConfig::default())
    }
}
