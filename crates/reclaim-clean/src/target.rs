//! Selections, targets and safety classes.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use reclaim_core::{Category, Fingerprint};

/// Confirmation or authorization needed before a target may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyClass {
    /// Under a known cache location.
    Safe,
    /// User data; needs explicit confirmation.
    Caution,
    /// The process cannot remove it; goes through the privileged helper.
    RequiresPrivilege,
}

impl std::fmt::Display for SafetyClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Safe => write!(f, "safe"),
            Self::Caution => write!(f, "caution"),
            Self::RequiresPrivilege => write!(f, "requires-privilege"),
        }
    }
}

/// What the caller asked to clean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection {
    /// A single file or directory.
    Path(PathBuf),
    /// Every scanned file of a category.
    Category {
        category: Category,
        /// Only files last modified longer ago than this.
        #[serde(default)]
        older_than: Option<Duration>,
    },
    /// One duplicate group; all but one member become targets.
    Duplicates(Fingerprint),
    /// Every duplicate group.
    AllDuplicates,
    /// The contents of every existing safe cache location. The locations
    /// themselves are kept.
    SafeCaches,
}

impl Selection {
    /// Every scanned file of `category`.
    pub fn category(category: Category) -> Self {
        Self::Category {
            category,
            older_than: None,
        }
    }

    /// Files of `category` not modified within `age`.
    pub fn category_older_than(category: Category, age: Duration) -> Self {
        Self::Category {
            category,
            older_than: Some(age),
        }
    }
}

/// Whether a plan may be handed to the executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanMode {
    /// Dry run only.
    #[default]
    Preview,
    /// Plan intended for execution.
    Commit,
}

/// Why a path ended up in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetReason {
    /// Selected explicitly by path.
    Selected,
    /// Member of a selected category.
    Category(Category),
    /// Redundant copy of a duplicate group.
    Duplicate {
        fingerprint: Fingerprint,
        retained: PathBuf,
    },
    /// Entry inside a safe cache location.
    SafeCache { cache: PathBuf },
}

/// A concrete path scheduled for deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningTarget {
    /// Absolute path.
    pub path: PathBuf,
    /// Whether the target is a directory.
    pub is_dir: bool,
    /// Bytes the plan expects to free.
    pub estimated_size: u64,
    /// Safety classification.
    pub safety: SafetyClass,
    /// Why the target was planned.
    pub reason: TargetReason,
    /// For directories: every entry below it known at planning time.
    ///
    /// The directory is only removed if nothing outside this list has appeared.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<PathBuf>,
}

impl CleaningTarget {
    /// Create a file target.
    pub fn file(path: impl Into<PathBuf>, size: u64, safety: SafetyClass, reason: TargetReason) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            estimated_size: size,
            safety,
            reason,
            contents: Vec::new(),
        }
    }

    /// Create a directory target with its planned contents.
    pub fn directory(
        path: impl Into<PathBuf>,
        size: u64,
        safety: SafetyClass,
        reason: TargetReason,
        contents: Vec<PathBuf>,
    ) -> Self {
        Self {
            path: path.into(),
            is_dir: true,
            estimated_size: size,
            safety,
            reason,
            contents,
        }
    }
}
