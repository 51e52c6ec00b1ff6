//! Completed scan container and statistics.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::config::ScanOptions;
use crate::error::Diagnostic;
use crate::node::{DirectoryNode, FileRecord, Records};

/// Summary statistics for a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories (excluding the root).
    pub total_dirs: u64,
    /// Maximum depth reached.
    pub max_depth: u32,
    /// Largest file (path, size).
    pub largest_file: Option<(PathBuf, u64)>,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Update stats with a file entry.
    pub fn record_file(&mut self, path: &Path, size: u64, depth: u32) {
        self.total_files += 1;
        self.total_size += size;
        self.max_depth = self.max_depth.max(depth);

        if self.largest_file.as_ref().is_none_or(|(_, s)| size > *s) {
            self.largest_file = Some((path.to_path_buf(), size));
        }
    }

    /// Record a directory.
    pub fn record_dir(&mut self, depth: u32) {
        self.total_dirs += 1;
        self.max_depth = self.max_depth.max(depth);
    }
}

/// Immutable snapshot produced by a completed (or cancelled) scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    /// Root node of the tree.
    pub root: DirectoryNode,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan finished.
    pub scanned_at: SystemTime,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Options used.
    pub options: ScanOptions,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Entries that were skipped, and why.
    pub diagnostics: Vec<Diagnostic>,

    /// The scan observed cancellation; the tree is partial.
    pub cancelled: bool,
}

impl ScanReport {
    /// Create a new report.
    pub fn new(
        root: DirectoryNode,
        options: ScanOptions,
        stats: ScanStats,
        scan_duration: Duration,
        diagnostics: Vec<Diagnostic>,
        cancelled: bool,
    ) -> Self {
        Self {
            root_path: root.path.clone(),
            root,
            scanned_at: SystemTime::now(),
            scan_duration,
            options,
            stats,
            diagnostics,
            cancelled,
        }
    }

    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.aggregate_size
    }

    /// Get the total number of files.
    pub fn file_count(&self) -> u64 {
        self.root.file_count
    }

    /// Iterate over every file record.
    pub fn records(&self) -> Records<'_> {
        self.root.records()
    }

    /// Look up a file record by path.
    pub fn find_file(&self, path: &Path) -> Option<&FileRecord> {
        self.root.find_file(path)
    }

    /// Look up a directory node by path.
    pub fn find_dir(&self, path: &Path) -> Option<&DirectoryNode> {
        self.root.find_dir(path)
    }

    /// Whether `path` lies inside the scanned root.
    pub fn covers(&self, path: &Path) -> bool {
        path.starts_with(&self.root_path)
    }

    /// Check if there were any diagnostics.
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}
