//! Action records and their persisted form.

use crate::policy::{CompressionAction, ParseActionError};
use crate::reading::{Reading, SensorValue};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Source of record timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Everything decided in one scored tick. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// 1-based tick index within the session.
    pub tick: u64,
    pub timestamp: DateTime<Utc>,
    pub reading: Reading,
    pub score: f64,
    pub threshold: f64,
    pub is_anomaly: bool,
    pub action: CompressionAction,
}

impl ActionRecord {
    /// Persisted form of this record.
    pub fn to_entry(&self) -> LogEntry {
        LogEntry::from(self)
    }
}

/// One record as stored in the event log.
///
/// Field names and value shapes are the on-disk format: an ISO-8601
/// timestamp string, integer sensor values and the action as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub sensor_values: Vec<SensorValue>,
    pub anomaly_score: f64,
    pub anomaly_detected: bool,
    pub compression_action: String,
}

impl LogEntry {
    /// Parse the stored action string.
    pub fn action(&self) -> Result<CompressionAction, ParseActionError> {
        self.compression_action.parse()
    }

    /// Parse the stored timestamp.
    pub fn timestamp(&self) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(&self.timestamp).map(|t| t.with_timezone(&Utc))
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.sensor_values.clone())
    }
}

impl From<&ActionRecord> for LogEntry {
    fn from(record: &ActionRecord) -> Self {
        Self {
            timestamp: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            sensor_values: record.reading.values().to_vec(),
            anomaly_score: record.score,
            anomaly_detected: record.is_anomaly,
            compression_action: record.action.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::ZoneTarget;
    use chrono::TimeZone;

    fn sample_record() -> ActionRecord {
        ActionRecord {
            tick: 101,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap(),
            reading: Reading::new(vec![2000, 100, 1200, 1200]),
            score: 4.6244375,
            threshold: 0.5,
            is_anomaly: true,
            action: CompressionAction::Increase {
                zone: Some(ZoneTarget::Sensor(0)),
            },
        }
    }

    #[test]
    fn test_entry_fields() {
        let entry = sample_record().to_entry();
        assert_eq!(entry.timestamp, "2025-03-14T09:26:53.000000Z");
        assert_eq!(entry.sensor_values, vec![2000, 100, 1200, 1200]);
        assert_eq!(entry.anomaly_score, 4.6244375);
        assert!(entry.anomaly_detected);
        assert_eq!(entry.compression_action, "Increase compression in Zone 1");
    }

    #[test]
    fn test_entry_json_shape() {
        let json = serde_json::to_value(sample_record().to_entry()).unwrap();
        assert_eq!(json["sensor_values"], serde_json::json!([2000, 100, 1200, 1200]));
        assert_eq!(json["anomaly_detected"], serde_json::json!(true));
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_entry_parses_back() {
        let record = sample_record();
        let entry = record.to_entry();
        assert_eq!(entry.action().unwrap(), record.action);
        assert_eq!(entry.timestamp().unwrap(), record.timestamp);
        assert_eq!(entry.reading(), record.reading);
    }

    #[test]
    fn test_fixed_clock() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock(at);
        assert_eq!(clock.now(), at);
        assert_eq!(clock.now(), clock.now());
    }
}
