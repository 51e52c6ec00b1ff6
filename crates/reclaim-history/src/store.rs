//! History storage backends.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::HistoryError;
use crate::record::HistoryEntry;

/// Append-only storage of history entries.
pub trait HistoryStore {
    /// Append one entry.
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), HistoryError>;

    /// Every entry, in the order it was appended.
    fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError>;

    /// Remove every entry.
    fn clear(&mut self) -> Result<(), HistoryError>;
}

/// Keeps entries in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Vec<HistoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryStore {
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        self.entries.push(entry.clone());
        Ok(())
    }

    fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        Ok(self.entries.clone())
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        self.entries.clear();
        Ok(())
    }
}

/// One JSON object per line in a single file.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

impl JsonLinesStore {
    /// Use the file at `path`; it is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the store at [`default_path`](Self::default_path).
    pub fn open_default() -> Result<Self, HistoryError> {
        Self::default_path()
            .map(Self::new)
            .ok_or(HistoryError::NoDefaultLocation)
    }

    /// `<data_dir>/reclaim/history.jsonl`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("reclaim").join("history.jsonl"))
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> HistoryError {
        HistoryError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl HistoryStore for JsonLinesStore {
    fn append(&mut self, entry: &HistoryEntry) -> Result<(), HistoryError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|e| self.io_error(e))?;
        file.write_all(line.as_bytes()).map_err(|e| self.io_error(e))?;
        debug!(path = %self.path.display(), "appended history entry");
        Ok(())
    }

    fn entries(&self) -> Result<Vec<HistoryEntry>, HistoryError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(err)),
        };

        let mut entries = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| self.io_error(e))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = serde_json::from_str(&line).map_err(|source| HistoryError::Corrupt {
                path: self.path.clone(),
                line: index + 1,
                source,
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    fn clear(&mut self) -> Result<(), HistoryError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(self.io_error(err)),
        }
    }
}
