//! Duplicate file detection using content hashing.
//!
//! Uses a three-phase algorithm for efficiency:
//! 1. Group files by size (instant, O(n)); zero-byte files are never considered
//! 2. Compute partial hash for size-matched files (first + last 4KB)
//! 3. Compute full BLAKE3 hash for partial-hash matches
//!
//! The resulting groups do not depend on the order in which buckets finish.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use derive_builder::Builder;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reclaim_core::{
    CancellationToken, Diagnostic, EngineEvent, EventReceiver, EventSink, FileRecord,
    Fingerprint, Operation, ScanReport, WorkerPool,
};

use crate::hasher::{ContentHasher, DEFAULT_CHUNK_SIZE, HashError};

/// Files hashed between two progress events.
const PROGRESS_EVERY: u64 = 64;

/// Configuration for duplicate detection.
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct DuplicateConfig {
    /// Use quick comparison (size + partial hash) before full hash.
    #[builder(default = "true")]
    pub quick_compare: bool,

    /// Number of bytes for partial hash from start of file.
    #[builder(default = "4096")]
    pub partial_hash_head: usize,

    /// Number of bytes for partial hash from end of file.
    #[builder(default = "4096")]
    pub partial_hash_tail: usize,

    /// Read size for full hashing.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    pub chunk_size: usize,

    /// Maximum number of groups to return (0 = unlimited).
    #[builder(default = "0")]
    pub max_groups: usize,
}

impl Default for DuplicateConfig {
    fn default() -> Self {
        Self {
            quick_compare: true,
            partial_hash_head: 4096,
            partial_hash_tail: 4096,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_groups: 0,
        }
    }
}

impl DuplicateConfig {
    /// Create a new config builder.
    pub fn builder() -> DuplicateConfigBuilder {
        DuplicateConfigBuilder::default()
    }
}

/// A set of files with identical size and content fingerprint.
///
/// Always holds at least two members, ordered by path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Content fingerprint shared by all members.
    pub fingerprint: Fingerprint,

    /// Size of each file in bytes.
    pub size: u64,

    /// Member records, each carrying the fingerprint.
    pub members: Vec<FileRecord>,

    /// Wasted space: size * (count - 1).
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    fn new(fingerprint: Fingerprint, size: u64, mut members: Vec<FileRecord>) -> Self {
        members.sort_by(|a, b| a.path.cmp(&b.path));
        let wasted_bytes = size * (members.len() as u64).saturating_sub(1);
        Self {
            fingerprint,
            size,
            members,
            wasted_bytes,
        }
    }

    /// Get the number of duplicate files.
    pub fn count(&self) -> usize {
        self.members.len()
    }

    /// If keeping one file, how many could be deleted.
    pub fn deletable_count(&self) -> usize {
        self.members.len().saturating_sub(1)
    }

    /// Member paths in order.
    pub fn paths(&self) -> impl Iterator<Item = &std::path::Path> {
        self.members.iter().map(|m| m.path.as_path())
    }
}

/// Results from duplicate analysis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Groups of duplicate files, sorted by wasted space descending.
    pub groups: Vec<DuplicateGroup>,

    /// Total size of all duplicate files.
    pub total_duplicate_size: u64,

    /// Total wasted space (could be reclaimed).
    pub total_wasted_space: u64,

    /// Number of non-empty files analyzed.
    pub files_analyzed: u64,

    /// Number of files that have duplicates.
    pub files_with_duplicates: u64,

    /// Files dropped from analysis, and why.
    pub diagnostics: Vec<Diagnostic>,

    /// Hashing stopped early; the groups are incomplete.
    pub cancelled: bool,
}

impl DuplicateReport {
    /// Check if any duplicates were found.
    pub fn has_duplicates(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Number of groups.
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Look up a group by fingerprint.
    pub fn group(&self, fingerprint: &Fingerprint) -> Option<&DuplicateGroup> {
        self.groups.iter().find(|g| &g.fingerprint == fingerprint)
    }
}

/// Finds groups of byte-identical files among scanned records.
pub struct DuplicateDetector {
    config: DuplicateConfig,
    hasher: ContentHasher,
    pool: Option<WorkerPool>,
    events: EventSink,
}

/// Shared state for one detection pass.
struct Pass<'a> {
    cancel: &'a CancellationToken,
    files_total: u64,
    files_hashed: AtomicU64,
    bytes_hashed: AtomicU64,
    cancelled: AtomicBool,
}

#[derive(Default)]
struct BucketOutcome {
    groups: Vec<DuplicateGroup>,
    diagnostics: Vec<Diagnostic>,
}

impl DuplicateDetector {
    /// Create a detector with default config that hashes on the calling thread.
    pub fn new() -> Self {
        Self::with_config(DuplicateConfig::default())
    }

    /// Create a detector with custom config.
    pub fn with_config(config: DuplicateConfig) -> Self {
        Self {
            hasher: ContentHasher::with_chunk_size(config.chunk_size),
            config,
            pool: None,
            events: EventSink::new(),
        }
    }

    /// Hash buckets in parallel on the given pool.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Publish progress on a shared sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to hashing progress events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Find duplicates among the files of a completed scan.
    pub fn find_duplicates(&self, scan: &ScanReport, cancel: &CancellationToken) -> DuplicateReport {
        self.detect(scan.records(), cancel)
    }

    /// Find duplicates among arbitrary records. Directory records are ignored.
    pub fn detect<'a>(
        &self,
        records: impl IntoIterator<Item = &'a FileRecord>,
        cancel: &CancellationToken,
    ) -> DuplicateReport {
        let files: Vec<&FileRecord> = records
            .into_iter()
            .filter(|r| !r.is_dir && r.size > 0)
            .collect();
        let files_analyzed = files.len() as u64;

        let buckets = group_by_size(files);
        let pass = Pass {
            cancel,
            files_total: buckets.iter().map(|(_, files)| files.len() as u64).sum(),
            files_hashed: AtomicU64::new(0),
            bytes_hashed: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
        };

        info!(
            files = files_analyzed,
            candidates = pass.files_total,
            buckets = buckets.len(),
            "duplicate detection started"
        );

        let outcomes: Vec<BucketOutcome> = match &self.pool {
            Some(pool) => pool.install(|| {
                buckets
                    .into_par_iter()
                    .map(|(size, files)| self.process_bucket(size, files, &pass))
                    .collect()
            }),
            None => buckets
                .into_iter()
                .map(|(size, files)| self.process_bucket(size, files, &pass))
                .collect(),
        };

        let mut groups = Vec::new();
        let mut diagnostics = Vec::new();
        for outcome in outcomes {
            groups.extend(outcome.groups);
            diagnostics.extend(outcome.diagnostics);
        }

        groups.sort_by(|a, b| {
            b.wasted_bytes
                .cmp(&a.wasted_bytes)
                .then_with(|| a.fingerprint.cmp(&b.fingerprint))
        });
        if self.config.max_groups > 0 && groups.len() > self.config.max_groups {
            groups.truncate(self.config.max_groups);
        }
        diagnostics.sort_by(|a, b| a.path.cmp(&b.path));

        let cancelled = pass.cancelled.load(Ordering::Relaxed) || cancel.is_cancelled();
        self.emit_progress(&pass, None);
        if cancelled {
            self.events.cancelled(Operation::Hash);
        } else {
            self.events.finished(Operation::Hash);
        }

        let report = DuplicateReport {
            total_duplicate_size: groups.iter().map(|g| g.size * g.count() as u64).sum(),
            total_wasted_space: groups.iter().map(|g| g.wasted_bytes).sum(),
            files_with_duplicates: groups.iter().map(|g| g.count() as u64).sum(),
            files_analyzed,
            groups,
            diagnostics,
            cancelled,
        };

        info!(
            groups = report.group_count(),
            wasted = report.total_wasted_space,
            diagnostics = report.diagnostics.len(),
            cancelled,
            "duplicate detection finished"
        );

        report
    }

    /// Find duplicates within one size bucket.
    fn process_bucket(&self, size: u64, files: Vec<&FileRecord>, pass: &Pass<'_>) -> BucketOutcome {
        let mut outcome = BucketOutcome::default();
        if pass.cancel.is_cancelled() {
            pass.cancelled.store(true, Ordering::Relaxed);
            return outcome;
        }

        let head = self.config.partial_hash_head;
        let tail = self.config.partial_hash_tail;
        let candidates: Vec<Vec<&FileRecord>> = if self.config.quick_compare && size > (head + tail) as u64 {
            let mut partial_groups: HashMap<Fingerprint, Vec<&FileRecord>> = HashMap::new();
            for file in files {
                match self.hasher.partial_hash(&file.path, size, head, tail) {
                    Ok(fp) => partial_groups.entry(fp).or_default().push(file),
                    Err(err) => self.record_failure(err, pass, &mut outcome),
                }
            }
            partial_groups
                .into_values()
                .filter(|group| group.len() > 1)
                .collect()
        } else {
            vec![files]
        };

        for candidates in candidates {
            let mut full_groups: BTreeMap<Fingerprint, Vec<FileRecord>> = BTreeMap::new();
            for file in candidates {
                match self.hasher.hash_sized(&file.path, size, pass.cancel) {
                    Ok(fp) => {
                        full_groups
                            .entry(fp)
                            .or_default()
                            .push(file.with_fingerprint(fp));
                        pass.bytes_hashed.fetch_add(size, Ordering::Relaxed);
                    }
                    Err(err) => self.record_failure(err, pass, &mut outcome),
                }
                let hashed = pass.files_hashed.fetch_add(1, Ordering::Relaxed) + 1;
                if hashed % PROGRESS_EVERY == 0 {
                    self.emit_progress(pass, Some(&file.path));
                }
            }

            outcome.groups.extend(
                full_groups
                    .into_iter()
                    .filter(|(_, members)| members.len() > 1)
                    .map(|(fp, members)| DuplicateGroup::new(fp, size, members)),
            );
        }

        outcome
    }

    fn record_failure(&self, err: HashError, pass: &Pass<'_>, outcome: &mut BucketOutcome) {
        match err {
            HashError::Cancelled { .. } => pass.cancelled.store(true, Ordering::Relaxed),
            HashError::Path(err) => {
                debug!(path = %err.path().display(), error = %err, "dropped from duplicate analysis");
                outcome.diagnostics.push(Diagnostic::from(err));
            }
        }
    }

    fn emit_progress(&self, pass: &Pass<'_>, current: Option<&std::path::Path>) {
        self.events.emit(EngineEvent::Hash {
            files_hashed: pass.files_hashed.load(Ordering::Relaxed),
            files_total: pass.files_total,
            bytes_hashed: pass.bytes_hashed.load(Ordering::Relaxed),
            current_path: current.map(|p| p.to_path_buf()),
        });
    }
}

impl Default for DuplicateDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Bucket files by size, keeping only buckets with 2+ files.
fn group_by_size(files: Vec<&FileRecord>) -> Vec<(u64, Vec<&FileRecord>)> {
    let mut buckets: BTreeMap<u64, Vec<&FileRecord>> = BTreeMap::new();
    for file in files {
        buckets.entry(file.size).or_default().push(file);
    }
    buckets.into_iter().filter(|(_, v)| v.len() > 1).collect()
}
