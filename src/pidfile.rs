//! Plain-text pidfiles.
//!
//! A pidfile holds a single decimal PID, left aligned and padded with spaces to a
//! fixed width, followed by a newline. Files are truncated on every write so a
//! shorter PID never leaves stale digits behind.
use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::error::PidFileError;

/// Width of the PID field, excluding the trailing newline.
const PID_WIDTH: usize = 31;

/// A pidfile on disk.
#[derive(Debug, Clone)]
pub struct PidFile {
    path: PathBuf,
}

/// Contents and modification time of a pidfile.
#[derive(Debug, Clone, Copy)]
pub struct PidRecord {
    /// PID stored in the file.
    pub pid: i32,
    /// When the file was last written.
    pub modified: SystemTime,
}

impl PidFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `pid`, replacing any previous contents.
    pub fn write(&self, pid: u32) -> Result<(), PidFileError> {
        let contents = format!("{pid:<width$}\n", width = PID_WIDTH);
        fs::write(&self.path, contents).map_err(|source| PidFileError::Write {
            path: self.path.clone(),
            source,
        })
    }

    /// Reads the stored PID together with the file's modification time.
    pub fn read(&self) -> Result<PidRecord, PidFileError> {
        let read_error = |source| PidFileError::Read {
            path: self.path.clone(),
            source,
        };

        let metadata = fs::metadata(&self.path).map_err(read_error)?;
        let modified = metadata.modified().map_err(read_error)?;
        let raw = fs::read_to_string(&self.path).map_err(read_error)?;

        let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || c == '\0');
        match trimmed.parse::<i32>() {
            Ok(pid) if pid > 0 => Ok(PidRecord { pid, modified }),
            _ => Err(PidFileError::Parse {
                path: self.path.clone(),
                contents: trimmed.to_string(),
            }),
        }
    }
}
