//! File-backed sensor driver
//!
//! Replays recorded readings from a JSON Lines file, one record per read:
//!
//! ```json
//! {"pressure":101325.0,"temperature":21.4,"humidity":45.0}
//! {"errcode":4,"errmsg":"bus read failed"}
//! ```
//!
//! An `errcode` record makes that read fail with the given driver error.
//! Playback wraps around at the end of the file. Lines that match neither
//! shape are skipped and counted.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use weatherguard_core::{DriverError, Reading, SensorDriver};

/// Replay file errors
#[derive(Debug, Error)]
pub enum ReplayError {
    /// File could not be opened or read
    #[error("Cannot read replay file {path}: {source}")]
    Io {
        /// Replay file
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File holds no usable record
    #[error("Replay file {0} contains no readings")]
    Empty(PathBuf),
}

impl From<ReplayError> for DriverError {
    fn from(err: ReplayError) -> Self {
        match err {
            ReplayError::Io { .. } => DriverError::new(
                DriverError::DEVICE,
                format!("could not initialize; are you using the right port? ({})", err),
            ),
            ReplayError::Empty(_) => DriverError::new(DriverError::DRIVER, err.to_string()),
        }
    }
}

/// One line of a replay file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReplayRecord {
    /// Successful read
    Reading(Reading),
    /// Failed read
    Failure {
        /// Driver error code
        errcode: i32,
        /// Driver error message
        errmsg: String,
    },
}

impl ReplayRecord {
    fn to_result(&self) -> Result<Reading, DriverError> {
        match self {
            ReplayRecord::Reading(reading) => Ok(*reading),
            ReplayRecord::Failure { errcode, errmsg } => {
                Err(DriverError::new(*errcode, errmsg.clone()))
            }
        }
    }
}

/// Statistics for replay
#[derive(Debug, Default, Clone)]
pub struct ReplayStats {
    /// Records loaded from the file
    pub records_loaded: usize,
    /// Lines that could not be parsed
    pub parse_errors: usize,
    /// Reads served
    pub reads: usize,
    /// Times playback wrapped to the first record
    pub wraps: usize,
}

/// Driver replaying a recorded session
///
/// `init()` takes the replay file path in place of a bus device.
#[derive(Debug, Default)]
pub struct ReplayDriver {
    records: Vec<ReplayRecord>,
    position: usize,
    stats: ReplayStats,
}

impl ReplayDriver {
    /// Driver with nothing loaded; `init()` loads the file
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver over in-memory records
    pub fn from_records(records: Vec<ReplayRecord>) -> Self {
        let stats = ReplayStats {
            records_loaded: records.len(),
            ..ReplayStats::default()
        };
        Self {
            records,
            position: 0,
            stats,
        }
    }

    /// Get statistics
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Load every record from `path`
    fn load(&mut self, path: &Path) -> Result<(), ReplayError> {
        let io_error = |source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_error)?;

        let mut records = Vec::new();
        let mut parse_errors = 0;
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(io_error)?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("{}:{}: skipping record: {}", path.display(), number + 1, e);
                    parse_errors += 1;
                }
            }
        }

        if records.is_empty() {
            return Err(ReplayError::Empty(path.to_path_buf()));
        }

        log::info!("Loaded {} readings from {}", records.len(), path.display());
        self.stats = ReplayStats {
            records_loaded: records.len(),
            parse_errors,
            ..ReplayStats::default()
        };
        self.records = records;
        self.position = 0;
        Ok(())
    }
}

impl SensorDriver for ReplayDriver {
    fn init(&mut self, interface_path: &str) -> Result<(), DriverError> {
        self.load(Path::new(interface_path)).map_err(DriverError::from)
    }

    fn read(&mut self) -> Result<Reading, DriverError> {
        let record = self
            .records
            .get(self.position)
            .ok_or_else(|| DriverError::new(DriverError::DRIVER, "no replay data loaded"))?;
        let result = record.to_result();

        self.stats.reads += 1;
        self.position += 1;
        if self.position == self.records.len() {
            self.position = 0;
            self.stats.wraps += 1;
        }
        result
    }
}
