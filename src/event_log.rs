//! Durable append-only event log.
//!
//! Three stores share the [`EventLog`] trait:
//! - [`JsonArrayLog`]: one pretty-printed JSON array, rewritten on every
//!   append (read, push, write)
//! - [`JsonLinesLog`]: one JSON object per line, appended in place
//! - [`MemoryLog`]: in-process, for tests and embedding
//!
//! Read-back order and content are identical across stores.

use crate::error::LogError;
use crate::record::LogEntry;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Ordered, append-only record store.
pub trait EventLog {
    /// Persist one record after all previous ones.
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError>;

    /// Every stored record, oldest first.
    fn read_all(&self) -> Result<Vec<LogEntry>, LogError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, LogError> {
        Ok(self.read_all()?.len())
    }

    fn is_empty(&self) -> Result<bool, LogError> {
        Ok(self.len()? == 0)
    }
}

impl<L: EventLog + ?Sized> EventLog for Box<L> {
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        (**self).append(entry)
    }

    fn read_all(&self) -> Result<Vec<LogEntry>, LogError> {
        (**self).read_all()
    }

    fn len(&self) -> Result<usize, LogError> {
        (**self).len()
    }
}

/// In-memory log.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Vec<LogEntry>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

impl EventLog for MemoryLog {
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogEntry>, LogError> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> Result<usize, LogError> {
        Ok(self.entries.len())
    }
}

/// Whole-file JSON array log.
///
/// A missing file reads as an empty array. Each append rewrites the file
/// through a temporary sibling and a rename, so a crash mid-write leaves
/// the previous contents intact. Cost grows with the log length.
#[derive(Debug, Clone)]
pub struct JsonArrayLog {
    path: PathBuf,
}

impl JsonArrayLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl EventLog for JsonArrayLog {
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        let mut entries = self.read_all()?;
        entries.push(entry.clone());

        let tmp = self.temp_path();
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &entries)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogEntry>, LogError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Streaming JSON-lines log: each append writes exactly one line.
#[derive(Debug, Clone)]
pub struct JsonLinesLog {
    path: PathBuf,
}

impl JsonLinesLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventLog for JsonLinesLog {
    fn append(&mut self, entry: &LogEntry) -> Result<(), LogError> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        Ok(())
    }

    fn read_all(&self) -> Result<Vec<LogEntry>, LogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|e| LogError::Corrupt {
                line: i + 1,
                reason: e.to_string(),
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

/// On-disk log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Single JSON array, rewritten per append.
    JsonArray,
    /// One JSON object per line.
    #[default]
    JsonLines,
}

impl LogFormat {
    /// Guess the format from a file extension (`.jsonl` / `.ndjson` are lines).
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => LogFormat::JsonArray,
            _ => LogFormat::JsonLines,
        }
    }

    /// Open a log of this format at `path`.
    pub fn open(self, path: impl Into<PathBuf>) -> Box<dyn EventLog + Send> {
        match self {
            LogFormat::JsonArray => Box::new(JsonArrayLog::new(path)),
            LogFormat::JsonLines => Box::new(JsonLinesLog::new(path)),
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" | "array" => Ok(LogFormat::JsonArray),
            "jsonl" | "lines" | "ndjson" => Ok(LogFormat::JsonLines),
            other => Err(format!("unknown log format: {} (expected json or jsonl)", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(i: i64) -> LogEntry {
        LogEntry {
            timestamp: format!("2025-01-01T00:00:{:02}.000000Z", i % 60),
            sensor_values: vec![1200 + i, 1200, 1200, 1200 - i],
            anomaly_score: i as f64 * 0.125,
            anomaly_detected: i % 2 == 0,
            compression_action: "Maintain compression".to_string(),
        }
    }

    #[test]
    fn test_memory_log_order() {
        let mut log = MemoryLog::new();
        for i in 0..5 {
            log.append(&entry(i)).unwrap();
        }
        assert_eq!(log.len().unwrap(), 5);
        let all = log.read_all().unwrap();
        assert_eq!(all[3], entry(3));
    }

    #[test]
    fn test_array_log_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonArrayLog::new(dir.path().join("absent.json"));
        assert!(log.read_all().unwrap().is_empty());
        assert!(log.is_empty().unwrap());
    }

    #[test]
    fn test_array_log_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        let mut log = JsonArrayLog::new(&path);
        log.append(&entry(1)).unwrap();
        log.append(&entry(2)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().map(|a| a.len()), Some(2));
        assert!(!log.temp_path().exists());
    }

    #[test]
    fn test_lines_log_one_line_per_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut log = JsonLinesLog::new(&path);
        for i in 0..3 {
            log.append(&entry(i)).unwrap();
        }
        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 3);
        assert_eq!(log.read_all().unwrap(), vec![entry(0), entry(1), entry(2)]);
    }

    #[test]
    fn test_lines_log_reports_corrupt_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut log = JsonLinesLog::new(&path);
        log.append(&entry(0)).unwrap();
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{not json\n")
            .unwrap();

        match log.read_all() {
            Err(LogError::Corrupt { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected corrupt error, got {:?}", other),
        }
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>(), Ok(LogFormat::JsonArray));
        assert_eq!("JSONL".parse::<LogFormat>(), Ok(LogFormat::JsonLines));
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(
            LogFormat::from_path(Path::new("allayr_log.json")),
            LogFormat::JsonArray
        );
        assert_eq!(
            LogFormat::from_path(Path::new("allayr_log.jsonl")),
            LogFormat::JsonLines
        );
    }

    #[test]
    fn test_boxed_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = LogFormat::JsonArray.open(dir.path().join("boxed.json"));
        log.append(&entry(7)).unwrap();
        assert_eq!(log.len().unwrap(), 1);
    }
}
