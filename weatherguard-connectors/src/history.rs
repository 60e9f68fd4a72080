//! JSON Lines history log
//!
//! Appends one [`HistoryEntry`] per published quantity to
//! `<storage>/<name>_history.jsonl`:
//!
//! ```json
//! {"time":1700000000,"pressure":1013.25}
//! {"time":1700000000,"temp":21.0}
//! {"time":1700000000,"humidity":45.5}
//! ```
//!
//! Appends run on the poll loop's tick, so their cost is bounded: entries
//! collect in a `BufWriter` and reach the file once per publish round
//! ([`FLUSH_EVERY`] entries, one per quantity), as one `write` into the
//! page cache. There is no `fsync`. Pending entries are also written by
//! [`JsonLinesHistory::flush`] and when the log is dropped.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use weatherguard_core::{HistoryEntry, HistorySink, SinkError};

/// Entries buffered before they are written out, one per quantity
pub const FLUSH_EVERY: usize = 3;

/// History storage errors
#[derive(Debug, Error)]
pub enum HistoryError {
    /// File system error
    #[error("History I/O on {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Entry could not be encoded or decoded
    #[error("History entry encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<HistoryError> for SinkError {
    fn from(err: HistoryError) -> Self {
        match err {
            HistoryError::Io { .. } => SinkError::Io(err.to_string()),
            HistoryError::Encoding(e) => SinkError::Serialization(e.to_string()),
        }
    }
}

/// Append-only history file
pub struct JsonLinesHistory {
    path: PathBuf,
    writer: BufWriter<File>,
    entries_written: u64,
    pending: usize,
}

impl JsonLinesHistory {
    /// Open (creating if needed) the history file for accessory `name`
    /// inside `storage_dir`
    pub fn open(storage_dir: impl AsRef<Path>, name: &str) -> Result<Self, HistoryError> {
        let dir = storage_dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| HistoryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let path = dir.join(file_name(name));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| HistoryError::Io {
                path: path.clone(),
                source,
            })?;

        log::info!("History log at {}", path.display());

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            entries_written: 0,
            pending: 0,
        })
    }

    /// Path of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries appended since open
    pub fn entries_written(&self) -> u64 {
        self.entries_written
    }

    /// Write buffered entries to the file
    pub fn flush(&mut self) -> Result<(), HistoryError> {
        self.pending = 0;
        self.writer.flush().map_err(|source| HistoryError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn append(&mut self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        serde_json::to_writer(&mut self.writer, entry)?;
        self.writer
            .write_all(b"\n")
            .map_err(|source| HistoryError::Io {
                path: self.path.clone(),
                source,
            })?;

        self.entries_written += 1;
        self.pending += 1;
        if self.pending >= FLUSH_EVERY {
            self.flush()?;
        }
        Ok(())
    }
}

impl HistorySink for JsonLinesHistory {
    fn add_entry(&mut self, entry: &HistoryEntry) -> Result<(), SinkError> {
        self.append(entry).map_err(SinkError::from)
    }
}

/// Load every entry from a history file, skipping blank lines
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<HistoryEntry>, HistoryError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| HistoryError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

/// `Living Room` → `Living_Room_history.jsonl`
fn file_name(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    format!("{}_history.jsonl", stem)
}

#[cfg(test)]
mod tests {
    use super::*;
    use weatherguard_core::Quantity;

    #[test]
    fn file_name_is_sanitised() {
        assert_eq!(file_name("Living Room"), "Living_Room_history.jsonl");
        assert_eq!(file_name("attic/north"), "attic_north_history.jsonl");
    }

    #[test]
    fn entries_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();

        history
            .add_entry(&HistoryEntry::single(1_700_000_000, Quantity::Pressure, 1013.25))
            .unwrap();
        history
            .add_entry(&HistoryEntry::single(1_700_000_150, Quantity::Temperature, 21.0))
            .unwrap();

        assert_eq!(history.entries_written(), 2);
        history.flush().unwrap();

        let entries = read_entries(history.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].pressure, Some(1013.25));
        assert_eq!(entries[1].time, 1_700_000_150);
        assert_eq!(entries[1].temp, Some(21.0));
    }

    #[test]
    fn only_published_field_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();

        history
            .add_entry(&HistoryEntry::single(1_700_000_000, Quantity::Humidity, 45.5))
            .unwrap();
        history.flush().unwrap();

        let text = fs::read_to_string(history.path()).unwrap();
        assert_eq!(text, "{\"time\":1700000000,\"humidity\":45.5}\n");
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let entry = HistoryEntry::single(1, Quantity::Temperature, 20.0);

        {
            let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();
            history.add_entry(&entry).unwrap();
        }
        let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();
        history.add_entry(&entry).unwrap();
        history.flush().unwrap();

        assert_eq!(read_entries(history.path()).unwrap().len(), 2);
    }

    #[test]
    fn publish_round_is_written_in_one_go() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();
        let path = history.path().to_path_buf();

        history
            .add_entry(&HistoryEntry::single(10, Quantity::Pressure, 1013.25))
            .unwrap();
        history
            .add_entry(&HistoryEntry::single(10, Quantity::Temperature, 21.0))
            .unwrap();
        assert!(read_entries(&path).unwrap().is_empty());

        history
            .add_entry(&HistoryEntry::single(10, Quantity::Humidity, 45.5))
            .unwrap();
        assert_eq!(read_entries(&path).unwrap().len(), FLUSH_EVERY);
    }

    #[test]
    fn pending_entries_written_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let mut history = JsonLinesHistory::open(dir.path(), "Weather").unwrap();
            history
                .add_entry(&HistoryEntry::single(10, Quantity::Pressure, 1013.25))
                .unwrap();
            history.path().to_path_buf()
        };

        assert_eq!(read_entries(&path).unwrap().len(), 1);
    }

    #[test]
    fn storage_dir_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("var").join("weatherguard");

        let history = JsonLinesHistory::open(&nested, "Weather").unwrap();

        assert!(history.path().starts_with(&nested));
        assert!(history.path().exists());
    }
}
