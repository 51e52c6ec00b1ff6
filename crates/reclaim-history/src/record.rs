//! Persisted record types.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use reclaim_analyze::{AnalysisResult, DuplicateGroup};
use reclaim_clean::CleaningResult;
use reclaim_core::{Category, DeleteMode};

/// One duplicate group, reduced to what history needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSummary {
    /// Hex-encoded content fingerprint.
    pub fingerprint: String,
    /// Size of each copy.
    pub size: u64,
    /// Number of copies.
    pub copies: usize,
    /// Bytes reclaimable by keeping one copy.
    pub wasted_bytes: u64,
}

impl From<&DuplicateGroup> for DuplicateSummary {
    fn from(group: &DuplicateGroup) -> Self {
        Self {
            fingerprint: group.fingerprint.to_hex(),
            size: group.size,
            copies: group.count(),
            wasted_bytes: group.wasted_bytes,
        }
    }
}

/// A completed analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub timestamp: DateTime<Utc>,
    pub root_path: PathBuf,
    pub total_size: u64,
    pub file_count: u64,
    /// Bytes per category, every category present.
    pub category_bytes: BTreeMap<Category, u64>,
    pub duplicates: Vec<DuplicateSummary>,
    /// Number of diagnostics the analysis produced.
    #[serde(default)]
    pub diagnostics: usize,
    /// The scan or hash pass was cancelled.
    #[serde(default)]
    pub partial: bool,
}

impl ScanRecord {
    /// Build a record from an analysis snapshot.
    pub fn from_analysis(result: &AnalysisResult) -> Self {
        Self {
            timestamp: DateTime::<Utc>::from(result.timestamp),
            root_path: result.root_path.clone(),
            total_size: result.total_size,
            file_count: result.file_count,
            category_bytes: result.category_bytes(),
            duplicates: result.duplicates.iter().map(DuplicateSummary::from).collect(),
            diagnostics: result.diagnostics.len(),
            partial: result.partial,
        }
    }

    /// Total wasted bytes across duplicate groups.
    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates.iter().map(|d| d.wasted_bytes).sum()
    }
}

/// A completed cleaning commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningRecord {
    pub timestamp: DateTime<Utc>,
    /// What was cleaned, e.g. `duplicates` or `category:logs`.
    pub operation: String,
    pub bytes_freed: u64,
    pub files_deleted: u64,
    pub targets: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub delete_mode: DeleteMode,
    /// The commit stopped early on a full disk.
    #[serde(default)]
    pub halted: bool,
    #[serde(default)]
    pub cancelled: bool,
}

impl CleaningRecord {
    /// Build a record from a commit result.
    pub fn from_result(operation: impl Into<String>, result: &CleaningResult) -> Self {
        Self {
            timestamp: DateTime::<Utc>::from(result.finished_at),
            operation: operation.into(),
            bytes_freed: result.bytes_freed,
            files_deleted: result.files_deleted,
            targets: result.outcomes.len(),
            deleted: result.deleted_count(),
            failed: result.failed_count(),
            skipped: result.skipped_count(),
            delete_mode: result.delete_mode,
            halted: result.is_fatal(),
            cancelled: result.cancelled,
        }
    }
}

/// An entry of the history log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Scan(ScanRecord),
    Cleaning(CleaningRecord),
}

impl HistoryEntry {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Scan(record) => record.timestamp,
            Self::Cleaning(record) => record.timestamp,
        }
    }
}

/// Average scanned size for one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTrend {
    pub day: NaiveDate,
    pub average_size: u64,
    pub scans: usize,
}
