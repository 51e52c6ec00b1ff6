//! Building cleaning previews from scan and duplicate results.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use reclaim_analyze::{DuplicateGroup, DuplicateReport};
use reclaim_core::{
    CancellationToken, Category, DirectoryNode, EngineConfig, EventReceiver, EventSink, Fingerprint, Operation,
    ScanReport, access, paths,
};

use crate::contents::list_tree;
use crate::error::CleanError;
use crate::target::{CleaningTarget, PlanMode, SafetyClass, Selection, TargetReason};

/// Kind of planning warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanWarningKind {
    /// The path is outside every scan root and was not planned.
    OutsideScanRoots,
    /// The path no longer exists.
    Missing,
    /// The path could not be inspected.
    Unreadable,
    /// No duplicate group with the requested fingerprint.
    UnknownDuplicateGroup,
    /// A duplicate group's retained copy was itself targeted; the group was dropped.
    RetainedCopyTargeted,
}

/// A non-fatal note attached to a preview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanWarning {
    pub kind: PlanWarningKind,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl PlanWarning {
    fn at(kind: PlanWarningKind, path: &Path, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: Some(path.to_path_buf()),
            message: message.into(),
        }
    }
}

/// The plan a commit would execute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningPreview {
    /// Whether the plan may be executed.
    pub mode: PlanMode,
    /// Targets sorted by path; none nested inside another.
    pub targets: Vec<CleaningTarget>,
    /// Sum of target estimates.
    pub total_estimated_bytes: u64,
    /// Problems found while planning.
    pub warnings: Vec<PlanWarning>,
    /// When the plan was built.
    pub created_at: SystemTime,
    /// Caution targets were confirmed by the user.
    pub confirmed: bool,
}

impl CleaningPreview {
    /// True if nothing would be deleted.
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Number of targets.
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether any target needs confirmation before it is deleted.
    pub fn requires_confirmation(&self) -> bool {
        self.targets.iter().any(|t| t.safety == SafetyClass::Caution)
    }

    /// Confirm caution targets for deletion.
    pub fn confirm(&mut self) {
        self.confirmed = true;
    }

    /// Targets of one safety class.
    pub fn by_safety(&self, safety: SafetyClass) -> impl Iterator<Item = &CleaningTarget> {
        self.targets.iter().filter(move |t| t.safety == safety)
    }

    /// Estimated bytes per safety class.
    pub fn estimated_bytes(&self, safety: SafetyClass) -> u64 {
        self.by_safety(safety).map(|t| t.estimated_size).sum()
    }
}

/// Turns selections into a [`CleaningPreview`].
///
/// Planning only reads the filesystem. Nothing is modified until the preview
/// is handed to a [`CleaningExecutor`](crate::CleaningExecutor).
pub struct CleaningPlanner {
    config: EngineConfig,
    events: EventSink,
}

impl CleaningPlanner {
    /// Create a planner for the given configuration.
    ///
    /// Roots and cache locations are resolved to canonical paths, matching
    /// the paths a scan reports.
    pub fn new(mut config: EngineConfig) -> Self {
        config.canonicalize_paths();
        Self {
            config,
            events: EventSink::new(),
        }
    }

    /// Publish events on an existing sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to planning events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Build a plan for `selections`.
    ///
    /// Duplicate selections need `duplicates`; without it they produce an
    /// [`PlanWarningKind::UnknownDuplicateGroup`] warning.
    pub fn plan(
        &self,
        scan: &ScanReport,
        duplicates: Option<&DuplicateReport>,
        selections: &[Selection],
        mode: PlanMode,
        cancel: &CancellationToken,
    ) -> Result<CleaningPreview, CleanError> {
        let now = SystemTime::now();
        let mut builder = PlanBuilder {
            planner: self,
            scan,
            now,
            targets: Vec::new(),
            warnings: Vec::new(),
        };

        for selection in selections {
            if cancel.is_cancelled() {
                self.events.cancelled(Operation::Plan);
                return Err(CleanError::Cancelled);
            }
            builder.add(selection, duplicates, cancel);
        }
        if cancel.is_cancelled() {
            self.events.cancelled(Operation::Plan);
            return Err(CleanError::Cancelled);
        }

        let (targets, mut warnings) = builder.finish();
        warnings.sort_by(|a, b| a.path.cmp(&b.path));
        let total_estimated_bytes = targets.iter().map(|t| t.estimated_size).sum();

        info!(
            targets = targets.len(),
            bytes = total_estimated_bytes,
            warnings = warnings.len(),
            "cleaning plan built"
        );
        self.events.finished(Operation::Plan);

        Ok(CleaningPreview {
            mode,
            targets,
            total_estimated_bytes,
            warnings,
            created_at: now,
            confirmed: false,
        })
    }

    /// Safety class for a path that will be deleted.
    pub fn classify(&self, path: &Path, is_dir: bool) -> SafetyClass {
        let parent_writable = path.parent().is_none_or(access::can_write);
        if !parent_writable || (is_dir && !access::can_write(path)) {
            SafetyClass::RequiresPrivilege
        } else if self.config.is_safe_cache(path) {
            SafetyClass::Safe
        } else {
            SafetyClass::Caution
        }
    }

    fn in_scope(&self, scan: &ScanReport, path: &Path) -> bool {
        scan.covers(path) || self.config.is_within_roots(path)
    }
}

struct PlanBuilder<'a> {
    planner: &'a CleaningPlanner,
    scan: &'a ScanReport,
    /// Reference time for age filters.
    now: SystemTime,
    targets: Vec<CleaningTarget>,
    warnings: Vec<PlanWarning>,
}

impl PlanBuilder<'_> {
    fn add(&mut self, selection: &Selection, duplicates: Option<&DuplicateReport>, cancel: &CancellationToken) {
        match selection {
            Selection::Path(path) => self.add_path(path, TargetReason::Selected),
            Selection::Category { category, older_than } => {
                self.add_category(*category, *older_than, cancel);
            }
            Selection::Duplicates(fingerprint) => {
                match duplicates.and_then(|report| report.group(fingerprint)) {
                    Some(group) => self.add_group(group),
                    None => self.warnings.push(PlanWarning {
                        kind: PlanWarningKind::UnknownDuplicateGroup,
                        path: None,
                        message: format!("No duplicate group {}", fingerprint.to_hex()),
                    }),
                }
            }
            Selection::AllDuplicates => {
                let Some(report) = duplicates else {
                    self.warnings.push(PlanWarning {
                        kind: PlanWarningKind::UnknownDuplicateGroup,
                        path: None,
                        message: "No duplicate report available".to_string(),
                    });
                    return;
                };
                for group in &report.groups {
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.add_group(group);
                }
            }
            Selection::SafeCaches => self.add_caches(cancel),
        }
    }

    fn add_category(&mut self, category: Category, older_than: Option<Duration>, cancel: &CancellationToken) {
        let scan = self.scan;
        let now = self.now;
        let records: Vec<_> = scan
            .records()
            .filter(|r| r.category == category)
            .filter(|r| older_than.is_none_or(|age| age_at(now, r.modified) > age))
            .collect();

        for record in records {
            if cancel.is_cancelled() {
                return;
            }
            if self.exists(&record.path) {
                let safety = self.planner.classify(&record.path, false);
                self.targets.push(CleaningTarget::file(
                    &record.path,
                    record.size,
                    safety,
                    TargetReason::Category(category),
                ));
            }
        }
    }

    /// Plan every entry directly inside each safe cache location.
    fn add_caches(&mut self, cancel: &CancellationToken) {
        let planner = self.planner;
        for cache in &planner.config.safe_cache_paths {
            if cancel.is_cancelled() {
                return;
            }
            if !planner.in_scope(self.scan, cache) {
                self.outside(cache);
                continue;
            }

            let listing = fs::read_dir(cache).and_then(|entries| {
                entries
                    .map(|entry| entry.map(|e| e.path()))
                    .collect::<std::io::Result<Vec<_>>>()
            });
            let mut entries = match listing {
                Ok(entries) => entries,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    debug!(cache = %cache.display(), "cache location absent");
                    continue;
                }
                Err(err) => {
                    self.warnings
                        .push(PlanWarning::at(PlanWarningKind::Unreadable, cache, err.to_string()));
                    continue;
                }
            };
            entries.sort();

            for entry in entries {
                self.add_path(&entry, TargetReason::SafeCache { cache: cache.clone() });
            }
        }
    }

    fn add_path(&mut self, path: &Path, reason: TargetReason) {
        let path = match paths::resolve_parent(path) {
            Ok(path) => path,
            Err(err) => {
                self.warnings
                    .push(PlanWarning::at(PlanWarningKind::Unreadable, path, err.to_string()));
                return;
            }
        };

        if !self.planner.in_scope(self.scan, &path) {
            self.outside(&path);
            return;
        }

        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.missing(&path);
                return;
            }
            Err(err) => {
                self.warnings
                    .push(PlanWarning::at(PlanWarningKind::Unreadable, &path, err.to_string()));
                return;
            }
        };

        if !metadata.is_dir() {
            let size = self
                .scan
                .find_file(&path)
                .map_or(metadata.len(), |record| record.size);
            let safety = self.planner.classify(&path, false);
            self.targets.push(CleaningTarget::file(&path, size, safety, reason));
            return;
        }

        let (size, contents) = match self.scan.find_dir(&path) {
            Some(node) => (node.aggregate_size, planned_contents(node)),
            None => match list_tree(&path) {
                Ok(listing) => (listing.bytes, listing.entries),
                Err(err) => {
                    self.warnings
                        .push(PlanWarning::at(PlanWarningKind::Unreadable, &path, err.to_string()));
                    return;
                }
            },
        };
        let safety = self.planner.classify(&path, true);
        self.targets
            .push(CleaningTarget::directory(&path, size, safety, reason, contents));
    }

    /// Target every member but the retained one.
    ///
    /// The oldest surviving member is retained, ties broken by path.
    fn add_group(&mut self, group: &DuplicateGroup) {
        let survivors: Vec<_> = group
            .members
            .iter()
            .filter(|member| self.exists(&member.path))
            .collect();
        if survivors.len() < 2 {
            debug!(group = %group.fingerprint.to_hex(), "duplicate group has fewer than two copies left");
            return;
        }

        let Some(retained) = survivors
            .iter()
            .min_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)))
        else {
            return;
        };

        for member in &survivors {
            if member.path == retained.path {
                continue;
            }
            if !self.planner.in_scope(self.scan, &member.path) {
                self.outside(&member.path);
                continue;
            }
            let safety = self.planner.classify(&member.path, false);
            self.targets.push(CleaningTarget::file(
                &member.path,
                member.size,
                safety,
                TargetReason::Duplicate {
                    fingerprint: group.fingerprint,
                    retained: retained.path.clone(),
                },
            ));
        }
    }

    fn exists(&mut self, path: &Path) -> bool {
        match fs::symlink_metadata(path) {
            Ok(_) => true,
            Err(_) => {
                self.missing(path);
                false
            }
        }
    }

    fn outside(&mut self, path: &Path) {
        self.warnings.push(PlanWarning::at(
            PlanWarningKind::OutsideScanRoots,
            path,
            format!("{} is outside the scan roots", path.display()),
        ));
    }

    fn missing(&mut self, path: &Path) {
        self.warnings.push(PlanWarning::at(
            PlanWarningKind::Missing,
            path,
            format!("{} no longer exists", path.display()),
        ));
    }

    fn finish(mut self) -> (Vec<CleaningTarget>, Vec<PlanWarning>) {
        self.targets.sort_by(|a, b| a.path.cmp(&b.path));
        let mut merged = merge_nested(self.targets);

        // A duplicate group whose retained copy is also going away keeps all its copies.
        let doomed: BTreeSet<Fingerprint> = merged
            .iter()
            .filter_map(|target| match &target.reason {
                TargetReason::Duplicate { fingerprint, retained } if is_targeted(&merged, retained) => {
                    Some(*fingerprint)
                }
                _ => None,
            })
            .collect();

        for fingerprint in &doomed {
            self.warnings.push(PlanWarning {
                kind: PlanWarningKind::RetainedCopyTargeted,
                path: None,
                message: format!(
                    "Duplicate group {} skipped: its retained copy is also selected",
                    fingerprint.to_hex()
                ),
            });
        }
        merged.retain(|target| match &target.reason {
            TargetReason::Duplicate { fingerprint, .. } => !doomed.contains(fingerprint),
            _ => true,
        });

        (merged, self.warnings)
    }
}

/// Drop repeated paths and targets inside a directory target.
///
/// Expects `targets` sorted by path, so descendants follow their ancestor.
fn merge_nested(targets: Vec<CleaningTarget>) -> Vec<CleaningTarget> {
    let mut merged: Vec<CleaningTarget> = Vec::with_capacity(targets.len());
    let mut enclosing: Option<PathBuf> = None;

    for target in targets {
        if enclosing.as_ref().is_some_and(|dir| target.path.starts_with(dir)) {
            continue;
        }
        if merged.last().is_some_and(|last| last.path == target.path) {
            continue;
        }
        enclosing = target.is_dir.then(|| target.path.clone());
        merged.push(target);
    }

    merged
}

fn is_targeted(targets: &[CleaningTarget], path: &Path) -> bool {
    targets
        .iter()
        .any(|t| t.path == path || (t.is_dir && path.starts_with(&t.path)))
}

/// How long before `now` a file was last modified.
fn age_at(now: SystemTime, modified: SystemTime) -> Duration {
    now.duration_since(modified).unwrap_or(Duration::ZERO)
}

/// Every file and directory the scan saw below `node`.
fn planned_contents(node: &DirectoryNode) -> Vec<PathBuf> {
    let mut contents = Vec::new();
    collect_contents(node, &mut contents);
    contents.sort();
    contents
}

fn collect_contents(node: &DirectoryNode, out: &mut Vec<PathBuf>) {
    out.extend(node.files.iter().map(|f| f.path.clone()));
    for child in &node.children {
        out.push(child.path.clone());
        collect_contents(child, out);
    }
}
