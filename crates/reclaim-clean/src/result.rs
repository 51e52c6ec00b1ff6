//! Per-target outcomes of a commit.

use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use reclaim_core::{DeleteMode, Diagnostic, DiagnosticKind};

use crate::target::SafetyClass;

/// Why a target was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The path was already gone.
    AlreadyGone,
    /// A caution target in an unconfirmed plan.
    Unconfirmed,
    /// The directory gained entries that were not planned.
    DirectoryChanged,
    /// The commit was cancelled before this target.
    Cancelled,
    /// An earlier disk-full failure stopped the commit.
    Halted,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyGone => write!(f, "already gone"),
            Self::Unconfirmed => write!(f, "not confirmed"),
            Self::DirectoryChanged => write!(f, "directory changed since planning"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Halted => write!(f, "halted after disk full"),
        }
    }
}

/// What happened to one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TargetOutcome {
    Deleted { bytes_freed: u64, files: u64 },
    Skipped { reason: SkipReason },
    Failed { kind: DiagnosticKind, message: String },
}

impl TargetOutcome {
    /// Bytes freed by this target.
    pub fn bytes_freed(&self) -> u64 {
        match self {
            Self::Deleted { bytes_freed, .. } => *bytes_freed,
            _ => 0,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}

/// Outcome of one planned target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResult {
    pub path: PathBuf,
    pub safety: SafetyClass,
    pub outcome: TargetOutcome,
}

/// Result of executing a committed plan.
///
/// Outcomes are in plan order. Completed deletions are always reported, even
/// when the commit halted or was cancelled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningResult {
    /// One entry per planned target.
    pub outcomes: Vec<TargetResult>,
    /// Bytes actually freed, measured before each deletion.
    pub bytes_freed: u64,
    /// Files actually removed, including those inside deleted directories.
    pub files_deleted: u64,
    /// How paths were removed.
    pub delete_mode: DeleteMode,
    /// When execution started.
    pub started_at: SystemTime,
    /// When execution finished.
    pub finished_at: SystemTime,
    /// Failures, one per failed target.
    pub diagnostics: Vec<Diagnostic>,
    /// The failure that stopped the commit, if any.
    pub fatal: Option<Diagnostic>,
    /// The commit observed its cancellation signal.
    pub cancelled: bool,
}

impl CleaningResult {
    /// Number of deleted targets.
    pub fn deleted_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.outcome.is_deleted()).count()
    }

    /// Number of failed targets.
    pub fn failed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, TargetOutcome::Failed { .. }))
            .count()
    }

    /// Number of skipped targets.
    pub fn skipped_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.outcome, TargetOutcome::Skipped { .. }))
            .count()
    }

    /// Whether every target was deleted.
    pub fn is_complete(&self) -> bool {
        self.outcomes.iter().all(|o| o.outcome.is_deleted())
    }

    /// Whether the commit stopped on a fatal failure.
    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }
}
