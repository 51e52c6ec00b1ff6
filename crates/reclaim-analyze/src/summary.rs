//! Snapshot of a completed analysis.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use reclaim_core::{Category, Diagnostic, DirectoryNode, ScanReport};

use crate::duplicates::{DuplicateGroup, DuplicateReport};

/// Per-category totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    /// Number of files in the category.
    pub file_count: u64,
    /// Total size in bytes.
    pub total_size: u64,
}

/// One entry of a top-N list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LargestEntry {
    pub path: PathBuf,
    pub size: u64,
    pub is_dir: bool,
}

/// Immutable summary of a scan plus duplicate detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// When the scan finished.
    pub timestamp: SystemTime,
    /// Scanned root.
    pub root_path: PathBuf,
    /// Aggregate size of the root.
    pub total_size: u64,
    /// Number of files.
    pub file_count: u64,
    /// Totals per category, every category present.
    pub categories: BTreeMap<Category, CategoryStats>,
    /// Largest files, descending.
    pub largest_files: Vec<LargestEntry>,
    /// Largest directories below the root, descending.
    pub largest_dirs: Vec<LargestEntry>,
    /// Duplicate groups.
    pub duplicates: Vec<DuplicateGroup>,
    /// Scan and hashing diagnostics.
    pub diagnostics: Vec<Diagnostic>,
    /// Either stage was cancelled.
    pub partial: bool,
}

impl AnalysisResult {
    /// Summarize a scan and its duplicate report, keeping `top_n` largest entries.
    pub fn from_scan(scan: &ScanReport, duplicates: &DuplicateReport, top_n: usize) -> Self {
        let mut categories: BTreeMap<Category, CategoryStats> = Category::all()
            .map(|c| (c, CategoryStats::default()))
            .collect();
        let mut files = Vec::new();

        for record in scan.records() {
            let stats = categories.entry(record.category).or_default();
            stats.file_count += 1;
            stats.total_size += record.size;
            files.push(LargestEntry {
                path: record.path.clone(),
                size: record.size,
                is_dir: false,
            });
        }

        let mut dirs = Vec::new();
        collect_dirs(&scan.root, &mut dirs);

        let mut diagnostics = scan.diagnostics.clone();
        diagnostics.extend(duplicates.diagnostics.iter().cloned());

        Self {
            timestamp: scan.scanned_at,
            root_path: scan.root_path.clone(),
            total_size: scan.total_size(),
            file_count: scan.file_count(),
            categories,
            largest_files: top(files, top_n),
            largest_dirs: top(dirs, top_n),
            duplicates: duplicates.groups.clone(),
            diagnostics,
            partial: scan.cancelled || duplicates.cancelled,
        }
    }

    /// Bytes per category.
    pub fn category_bytes(&self) -> BTreeMap<Category, u64> {
        self.categories
            .iter()
            .map(|(category, stats)| (*category, stats.total_size))
            .collect()
    }

    /// Total bytes reclaimable by keeping one copy of each duplicate.
    pub fn wasted_bytes(&self) -> u64 {
        self.duplicates.iter().map(|g| g.wasted_bytes).sum()
    }
}

fn collect_dirs(node: &DirectoryNode, out: &mut Vec<LargestEntry>) {
    for child in &node.children {
        out.push(LargestEntry {
            path: child.path.clone(),
            size: child.aggregate_size,
            is_dir: true,
        });
        collect_dirs(child, out);
    }
}

/// Sort by size descending, then path, and keep the first `n`.
fn top(mut entries: Vec<LargestEntry>, n: usize) -> Vec<LargestEntry> {
    entries.sort_by(|a, b| b.size.cmp(&a.size).then_with(|| a.path.cmp(&b.path)));
    entries.truncate(n);
    entries
}
