// Allayr Sim - Dataset structures
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Recorded tick inputs and their CSV / JSON forms.
//!
//! CSV layout: `temperature_c,battery_level,link_ok,sensor_ok,zone_1,...,zone_n`.

use crate::error::SimError;
use allayr::{Environment, Reading, SampleSource, ScriptedSource, TickInput};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

const ENV_COLUMNS: [&str; 4] = ["temperature_c", "battery_level", "link_ok", "sensor_ok"];

/// A recorded sequence of tick inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    zone_count: usize,
    rows: Vec<TickInput>,
}

impl Dataset {
    /// Create an empty dataset.
    pub fn new(zone_count: usize) -> Self {
        Self {
            zone_count,
            rows: Vec::new(),
        }
    }

    /// Record every input a source yields, up to `limit`.
    pub fn collect<S: SampleSource + ?Sized>(zone_count: usize, source: &mut S, limit: usize) -> Self {
        let mut dataset = Self::new(zone_count);
        while dataset.len() < limit {
            match source.next_input() {
                Some(input) => dataset.push(input),
                None => break,
            }
        }
        dataset
    }

    /// Add a row.
    pub fn push(&mut self, input: TickInput) {
        self.rows.push(input);
    }

    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    pub fn rows(&self) -> &[TickInput] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Source replaying this dataset in order.
    pub fn into_source(self) -> ScriptedSource {
        ScriptedSource::new(self.rows)
    }

    /// Export to CSV file.
    pub fn to_csv(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        // Header
        write!(writer, "{}", ENV_COLUMNS.join(","))?;
        for zone in 1..=self.zone_count {
            write!(writer, ",zone_{}", zone)?;
        }
        writeln!(writer)?;

        // Data rows
        for row in &self.rows {
            let env = &row.environment;
            write!(
                writer,
                "{},{},{},{}",
                env.temperature_c, env.battery_level, env.link_ok, env.sensor_ok
            )?;
            for value in row.reading.iter() {
                write!(writer, ",{}", value)?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Import from CSV file.
    pub fn from_csv(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // Parse header
        let header = lines.next().ok_or(SimError::Empty)??;
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();

        for (i, expected) in ENV_COLUMNS.iter().enumerate() {
            if columns.get(i) != Some(expected) {
                return Err(SimError::MissingColumn(expected.to_string()));
            }
        }
        let zone_count = columns.len() - ENV_COLUMNS.len();
        if zone_count == 0 {
            return Err(SimError::MissingColumn("zone_1".to_string()));
        }

        let mut dataset = Dataset::new(zone_count);

        // Parse data rows
        for (line_num, line_result) in lines.enumerate() {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = line_num + 2;
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            dataset.push(parse_row(&fields, zone_count, line_no)?);
        }

        Ok(dataset)
    }

    /// Export to JSON file.
    pub fn to_json(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Import from JSON file.
    pub fn from_json(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let dataset = serde_json::from_reader(reader)?;
        Ok(dataset)
    }
}

fn parse_row(fields: &[&str], zone_count: usize, line: usize) -> Result<TickInput, SimError> {
    let err = |message: String| SimError::CsvParse { line, message };

    if fields.len() != ENV_COLUMNS.len() + zone_count {
        return Err(err(format!(
            "expected {} fields, got {}",
            ENV_COLUMNS.len() + zone_count,
            fields.len()
        )));
    }

    let number = |i: usize| -> Result<f64, SimError> {
        fields[i]
            .parse()
            .map_err(|_| err(format!("invalid {}: {:?}", ENV_COLUMNS[i], fields[i])))
    };
    let flag = |i: usize| -> Result<bool, SimError> {
        fields[i]
            .parse()
            .map_err(|_| err(format!("invalid {}: {:?}", ENV_COLUMNS[i], fields[i])))
    };

    let environment = Environment {
        temperature_c: number(0)?,
        battery_level: number(1)?,
        link_ok: flag(2)?,
        sensor_ok: flag(3)?,
    };

    let reading: Reading = fields[ENV_COLUMNS.len()..]
        .join(",")
        .parse()
        .map_err(|e| err(format!("{}", e)))?;

    Ok(TickInput::new(reading, environment))
}
