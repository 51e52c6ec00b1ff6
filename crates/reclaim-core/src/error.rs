//! Error types and diagnostics.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid configuration. Raised before any file system work starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A scan root does not exist.
    #[error("Scan root does not exist: {path}")]
    RootNotFound { path: PathBuf },

    /// A scan root is not a directory.
    #[error("Scan root is not a directory: {path}")]
    RootNotADirectory { path: PathBuf },

    /// The worker limit must be positive.
    #[error("Worker limit must be at least 1")]
    InvalidWorkerLimit,

    /// The configuration file could not be read.
    #[error("Cannot read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file is not valid TOML.
    #[error("Invalid configuration {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Other invalid value.
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors that abort a whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The scan root itself could not be read.
    #[error("Cannot read scan root {path}: {source}")]
    RootUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker pool could not be started.
    #[error("Cannot start worker pool: {message}")]
    Pool { message: String },
}

/// A failure tied to one path. Never fatal for a scan or hash pass.
#[derive(Debug, Error)]
pub enum PathError {
    /// Permission denied.
    #[error("Permission denied: {path}")]
    Access { path: PathBuf },

    /// The entry disappeared between listing and use.
    #[error("Path vanished: {path}")]
    Vanished { path: PathBuf },

    /// I/O failure while reading file contents.
    #[error("Read error at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file changed size since it was recorded.
    #[error("File changed since scan: {path}")]
    Changed { path: PathBuf },

    /// No space left on the device.
    #[error("Disk full while processing {path}")]
    DiskFull { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PathError {
    /// Create an error with path context, classified by the I/O error kind.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::Access { path },
            io::ErrorKind::NotFound => Self::Vanished { path },
            io::ErrorKind::StorageFull => Self::DiskFull { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create an error for a failure while reading file contents.
    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    /// The path this error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Self::Access { path }
            | Self::Vanished { path }
            | Self::Read { path, .. }
            | Self::Changed { path }
            | Self::DiskFull { path }
            | Self::Io { path, .. } => path,
        }
    }

    /// Diagnostic kind for this error.
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::Access { .. } => DiagnosticKind::AccessDenied,
            Self::Vanished { .. } => DiagnosticKind::Vanished,
            Self::Read { .. } => DiagnosticKind::ReadError,
            Self::Changed { .. } => DiagnosticKind::Changed,
            Self::DiskFull { .. } => DiagnosticKind::DiskFull,
            Self::Io { .. } => DiagnosticKind::IoError,
        }
    }

    /// Whether this is a disk-full condition.
    pub fn is_disk_full(&self) -> bool {
        matches!(self, Self::DiskFull { .. })
    }
}

/// Kind of diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Permission was denied.
    AccessDenied,
    /// Entry disappeared between listing and stat/read.
    Vanished,
    /// I/O failure while reading contents.
    ReadError,
    /// File changed since it was recorded.
    Changed,
    /// Directory revisited through a link cycle.
    Cycle,
    /// No space left on device.
    DiskFull,
    /// Other I/O error.
    IoError,
}

/// Non-fatal problem attached to an operation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Path where the problem occurred.
    pub path: PathBuf,
    /// Kind of problem.
    pub kind: DiagnosticKind,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    /// Create a new diagnostic.
    pub fn new(path: impl Into<PathBuf>, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }

    /// Create a link cycle diagnostic.
    pub fn cycle(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            message: format!("Directory already visited (link cycle): {}", path.display()),
            path,
            kind: DiagnosticKind::Cycle,
        }
    }
}

impl From<&PathError> for Diagnostic {
    fn from(err: &PathError) -> Self {
        Self::new(err.path(), err.kind(), err.to_string())
    }
}

impl From<PathError> for Diagnostic {
    fn from(err: PathError) -> Self {
        Self::from(&err)
    }
}
