// Allayr Runner - CSV replay source
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Replays a recorded CSV dataset as a sample source.
//!
//! Expected columns: `temperature_c,battery_level,link_ok,sensor_ok`
//! followed by one column per zone. Rows with a malformed reading are
//! still replayed so the control loop can reject them.

use allayr::{Environment, Reading, SampleSource, TickInput};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const ENV_COLUMNS: [&str; 4] = ["temperature_c", "battery_level", "link_ok", "sensor_ok"];

/// Information about a loaded dataset.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DatasetInfo {
    pub path: PathBuf,
    pub zone_count: usize,
    pub sample_count: usize,
}

/// CSV-backed sample source.
#[derive(Debug, Clone)]
pub struct CsvReplaySource {
    info: DatasetInfo,
    rows: Vec<TickInput>,
    position: usize,
    loop_replay: bool,
}

impl CsvReplaySource {
    /// Load a CSV dataset.
    pub fn from_csv(path: impl AsRef<Path>, loop_replay: bool) -> Result<Self, ReplayError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReplayError::FileNotFound(path.display().to_string()));
        }

        let (zone_count, rows) = Self::parse_csv(path)?;
        if rows.is_empty() {
            return Err(ReplayError::EmptyDataset);
        }

        info!(
            "Loaded dataset: {} zones, {} samples from {}",
            zone_count,
            rows.len(),
            path.display()
        );

        Ok(Self {
            info: DatasetInfo {
                path: path.to_path_buf(),
                zone_count,
                sample_count: rows.len(),
            },
            rows,
            position: 0,
            loop_replay,
        })
    }

    /// Parse a CSV file into its zone count and rows.
    fn parse_csv(path: &Path) -> Result<(usize, Vec<TickInput>), ReplayError> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;

        let headers = reader.headers()?.clone();
        for (i, expected) in ENV_COLUMNS.iter().enumerate() {
            if headers.get(i) != Some(*expected) {
                return Err(ReplayError::InvalidFormat(format!(
                    "column {} must be '{}'",
                    i + 1,
                    expected
                )));
            }
        }
        let zone_count = headers.len().saturating_sub(ENV_COLUMNS.len());
        if zone_count == 0 {
            return Err(ReplayError::InvalidFormat("no zone columns".to_string()));
        }

        let mut rows = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result?;
            let line = i + 2;

            let field = |idx: usize| record.get(idx).unwrap_or("");
            let environment = Environment {
                temperature_c: parse_field(field(0), "temperature_c", line)?,
                battery_level: parse_field(field(1), "battery_level", line)?,
                link_ok: parse_field(field(2), "link_ok", line)?,
                sensor_ok: parse_field(field(3), "sensor_ok", line)?,
            };

            let zones: Vec<&str> = record.iter().skip(ENV_COLUMNS.len()).collect();
            let reading = match zones.join(",").parse::<Reading>() {
                Ok(reading) => reading,
                Err(e) => {
                    warn!("Line {}: {}; replaying as empty reading", line, e);
                    Reading::new(Vec::new())
                }
            };

            rows.push(TickInput::new(reading, environment));
        }

        Ok((zone_count, rows))
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    /// Current position (rows replayed in the current pass).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Environment of the first row, used to seed the device state.
    pub fn initial_environment(&self) -> Environment {
        self.rows
            .first()
            .map(|r| r.environment)
            .unwrap_or_default()
    }
}

impl SampleSource for CsvReplaySource {
    fn next_input(&mut self) -> Option<TickInput> {
        if self.position >= self.rows.len() {
            if !self.loop_replay {
                return None;
            }
            debug!("Replay reached end, looping");
            self.position = 0;
        }
        let input = self.rows.get(self.position).cloned();
        self.position += 1;
        input
    }
}

fn parse_field<T: std::str::FromStr>(s: &str, column: &str, line: usize) -> Result<T, ReplayError> {
    s.parse().map_err(|_| {
        ReplayError::InvalidFormat(format!("line {}: invalid {}: {:?}", line, column, s))
    })
}

/// Replay errors.
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Empty dataset")]
    EmptyDataset,
}
