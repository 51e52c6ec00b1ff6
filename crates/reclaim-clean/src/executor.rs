//! Carrying out a committed cleaning plan.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use reclaim_core::{
    CancellationToken, DeleteMode, Diagnostic, DiagnosticKind, EngineConfig, EngineEvent, EventReceiver, EventSink,
    Operation, PathError,
};

use crate::contents::list_tree;
use crate::error::CleanError;
use crate::helper::{CommandHelper, PrivilegedHelper, UnavailableHelper};
use crate::planner::CleaningPreview;
use crate::progress::CleanProgress;
use crate::remover::{Remover, remover_for};
use crate::result::{CleaningResult, SkipReason, TargetOutcome, TargetResult};
use crate::target::{CleaningTarget, PlanMode, SafetyClass};

/// Deletes the targets of a committed [`CleaningPreview`].
///
/// Targets are independent: a failure is recorded and the next target is
/// attempted. Only a full disk stops the commit early.
pub struct CleaningExecutor {
    remover: Box<dyn Remover>,
    helper: Box<dyn PrivilegedHelper>,
    events: EventSink,
}

impl CleaningExecutor {
    /// Create an executor using the configured delete mode and helper.
    pub fn new(config: &EngineConfig) -> Self {
        let helper: Box<dyn PrivilegedHelper> = match &config.helper_command {
            Some(argv) if !argv.is_empty() => Box::new(CommandHelper::new(argv.clone())),
            _ => Box::new(UnavailableHelper),
        };
        Self {
            remover: remover_for(config.delete_mode),
            helper,
            events: EventSink::new(),
        }
    }

    /// Replace the remover.
    pub fn with_remover(mut self, remover: impl Remover + 'static) -> Self {
        self.remover = Box::new(remover);
        self
    }

    /// Replace the privileged helper.
    pub fn with_helper(mut self, helper: impl PrivilegedHelper + 'static) -> Self {
        self.helper = Box::new(helper);
        self
    }

    /// Publish events on an existing sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to cleaning events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Execute `plan`.
    pub fn execute(&self, plan: &CleaningPreview, cancel: &CancellationToken) -> Result<CleaningResult, CleanError> {
        self.execute_with_progress(plan, cancel, |_| {})
    }

    /// Execute `plan`, calling `on_progress` after each target.
    pub fn execute_with_progress<F>(
        &self,
        plan: &CleaningPreview,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<CleaningResult, CleanError>
    where
        F: FnMut(&CleanProgress),
    {
        if plan.mode == PlanMode::Preview {
            return Err(CleanError::PreviewOnly);
        }

        info!(targets = plan.len(), mode = ?self.remover.mode(), "starting cleaning commit");
        let mut run = Run::new(plan, self.remover.mode());
        let mut privileged = Vec::new();

        for (index, target) in plan.targets.iter().enumerate() {
            if run.fatal.is_some() {
                run.record(index, TargetOutcome::Skipped { reason: SkipReason::Halted });
                continue;
            }
            if cancel.is_cancelled() {
                run.cancelled = true;
                run.record(index, TargetOutcome::Skipped { reason: SkipReason::Cancelled });
                continue;
            }
            if target.safety == SafetyClass::Caution && !plan.confirmed {
                debug!(path = %target.path.display(), "skipping unconfirmed target");
                run.record(index, TargetOutcome::Skipped { reason: SkipReason::Unconfirmed });
                self.report(&mut run, None, &mut on_progress);
                continue;
            }
            if target.safety == SafetyClass::RequiresPrivilege {
                privileged.push(index);
                continue;
            }

            self.report(&mut run, Some(&target.path), &mut on_progress);
            let outcome = self.delete_target(target);
            run.record(index, outcome);
            self.report(&mut run, None, &mut on_progress);
        }

        if !privileged.is_empty() {
            self.delete_privileged(plan, &privileged, &mut run, cancel);
            self.report(&mut run, None, &mut on_progress);
        }

        let result = run.finish();
        info!(
            deleted = result.deleted_count(),
            failed = result.failed_count(),
            skipped = result.skipped_count(),
            bytes_freed = result.bytes_freed,
            "cleaning commit finished"
        );
        if result.cancelled {
            self.events.cancelled(Operation::Clean);
        } else {
            self.events.finished(Operation::Clean);
        }
        Ok(result)
    }

    fn report<F>(&self, run: &mut Run<'_>, current: Option<&Path>, on_progress: &mut F)
    where
        F: FnMut(&CleanProgress),
    {
        run.progress.current_path = current.map(Path::to_path_buf);
        on_progress(&run.progress);
        self.events.emit(EngineEvent::Clean {
            targets_done: run.progress.targets_done,
            targets_total: run.progress.targets_total,
            bytes_freed: run.progress.bytes_freed,
            current_path: run.progress.current_path.clone(),
        });
    }

    /// Delete one target with this process's own permissions.
    fn delete_target(&self, target: &CleaningTarget) -> TargetOutcome {
        let path = &target.path;
        let (bytes, files) = match measure(target) {
            Ok(Measured::Ready { bytes, files }) => (bytes, files),
            Ok(Measured::Skip(reason)) => return TargetOutcome::Skipped { reason },
            Err(err) => return failed(path, err),
        };

        let removed = if target.is_dir {
            self.remover.remove_dir_all(path)
        } else {
            self.remover.remove_file(path)
        };

        match removed {
            Ok(()) => {
                debug!(path = %path.display(), bytes, "deleted");
                TargetOutcome::Deleted {
                    bytes_freed: bytes,
                    files,
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => TargetOutcome::Skipped {
                reason: SkipReason::AlreadyGone,
            },
            Err(err) => failed(path, err),
        }
    }

    /// Hand every privileged target to the helper in one call.
    fn delete_privileged(
        &self,
        plan: &CleaningPreview,
        indices: &[usize],
        run: &mut Run<'_>,
        cancel: &CancellationToken,
    ) {
        let mut batch: Vec<(usize, PathBuf)> = Vec::new();
        for &index in indices {
            let target = &plan.targets[index];
            if run.fatal.is_some() {
                run.record(index, TargetOutcome::Skipped { reason: SkipReason::Halted });
                continue;
            }
            if cancel.is_cancelled() {
                run.cancelled = true;
                run.record(index, TargetOutcome::Skipped { reason: SkipReason::Cancelled });
                continue;
            }
            match measure(target) {
                Ok(Measured::Ready { .. }) => batch.push((index, target.path.clone())),
                Ok(Measured::Skip(reason)) => run.record(index, TargetOutcome::Skipped { reason }),
                // Unreadable from here; the helper may still see it.
                Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
                    if target.is_dir {
                        run.record(index, failed(&target.path, err));
                    } else {
                        batch.push((index, target.path.clone()));
                    }
                }
                Err(err) => run.record(index, failed(&target.path, err)),
            }
        }
        if batch.is_empty() {
            return;
        }

        let paths: Vec<PathBuf> = batch.iter().map(|(_, path)| path.clone()).collect();
        info!(paths = paths.len(), "delegating targets to privileged helper");
        match self.helper.delete(&paths) {
            Ok(response) => {
                for (index, path) in &batch {
                    let outcome = match response.result_for(path) {
                        Some(reported) if reported.success => TargetOutcome::Deleted {
                            bytes_freed: reported.bytes_freed,
                            files: reported.files_deleted,
                        },
                        Some(reported) => TargetOutcome::Failed {
                            kind: DiagnosticKind::AccessDenied,
                            message: reported
                                .error
                                .clone()
                                .unwrap_or_else(|| "helper reported failure".to_string()),
                        },
                        None => TargetOutcome::Failed {
                            kind: DiagnosticKind::IoError,
                            message: "no result from helper".to_string(),
                        },
                    };
                    run.record(*index, outcome);
                }
            }
            Err(err) => {
                warn!(error = %err, "privileged helper failed");
                for (index, _) in &batch {
                    run.record(
                        *index,
                        TargetOutcome::Failed {
                            kind: DiagnosticKind::AccessDenied,
                            message: err.to_string(),
                        },
                    );
                }
            }
        }
    }
}

enum Measured {
    Ready { bytes: u64, files: u64 },
    Skip(SkipReason),
}

/// Check a target against the filesystem and measure what deleting it frees.
///
/// A directory is only ready if every entry now below it was planned.
fn measure(target: &CleaningTarget) -> io::Result<Measured> {
    let metadata = match fs::symlink_metadata(&target.path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Ok(Measured::Skip(SkipReason::AlreadyGone));
        }
        Err(err) => return Err(err),
    };

    if metadata.is_dir() != target.is_dir {
        return Ok(Measured::Skip(SkipReason::DirectoryChanged));
    }
    if !target.is_dir {
        let bytes = if metadata.is_file() { metadata.len() } else { 0 };
        return Ok(Measured::Ready { bytes, files: 1 });
    }

    let listing = list_tree(&target.path)?;
    let planned: HashSet<&Path> = target.contents.iter().map(PathBuf::as_path).collect();
    if let Some(extra) = listing.entries.iter().find(|entry| !planned.contains(entry.as_path())) {
        debug!(
            dir = %target.path.display(),
            extra = %extra.display(),
            "directory holds entries that were not planned"
        );
        return Ok(Measured::Skip(SkipReason::DirectoryChanged));
    }

    Ok(Measured::Ready {
        bytes: listing.bytes,
        files: listing.files,
    })
}

fn failed(path: &Path, err: io::Error) -> TargetOutcome {
    let err = PathError::io(path, err);
    warn!(path = %path.display(), error = %err, "failed to delete target");
    TargetOutcome::Failed {
        kind: err.kind(),
        message: err.to_string(),
    }
}

/// Mutable state of one commit.
struct Run<'a> {
    plan: &'a CleaningPreview,
    outcomes: Vec<Option<TargetOutcome>>,
    progress: CleanProgress,
    files_deleted: u64,
    diagnostics: Vec<Diagnostic>,
    fatal: Option<Diagnostic>,
    cancelled: bool,
    delete_mode: DeleteMode,
    started_at: SystemTime,
}

impl<'a> Run<'a> {
    fn new(plan: &'a CleaningPreview, delete_mode: DeleteMode) -> Self {
        Self {
            plan,
            outcomes: vec![None; plan.len()],
            progress: CleanProgress::new(plan.len()),
            files_deleted: 0,
            diagnostics: Vec::new(),
            fatal: None,
            cancelled: false,
            delete_mode,
            started_at: SystemTime::now(),
        }
    }

    fn record(&mut self, index: usize, outcome: TargetOutcome) {
        let path = &self.plan.targets[index].path;
        match &outcome {
            TargetOutcome::Deleted { bytes_freed, files } => {
                self.progress.bytes_freed += bytes_freed;
                self.files_deleted += files;
            }
            TargetOutcome::Failed { kind, message } => {
                let diagnostic = Diagnostic::new(path, *kind, message.clone());
                if *kind == DiagnosticKind::DiskFull && self.fatal.is_none() {
                    warn!(path = %path.display(), "disk full, halting commit");
                    self.fatal = Some(diagnostic.clone());
                }
                self.diagnostics.push(diagnostic);
            }
            TargetOutcome::Skipped { .. } => {}
        }
        self.progress.targets_done += 1;
        self.outcomes[index] = Some(outcome);
    }

    fn finish(self) -> CleaningResult {
        let outcomes = self
            .plan
            .targets
            .iter()
            .zip(self.outcomes)
            .map(|(target, outcome)| TargetResult {
                path: target.path.clone(),
                safety: target.safety,
                outcome: outcome.unwrap_or(TargetOutcome::Skipped {
                    reason: SkipReason::Cancelled,
                }),
            })
            .collect();

        CleaningResult {
            outcomes,
            bytes_freed: self.progress.bytes_freed,
            files_deleted: self.files_deleted,
            delete_mode: self.delete_mode,
            started_at: self.started_at,
            finished_at: SystemTime::now(),
            diagnostics: self.diagnostics,
            fatal: self.fatal,
            cancelled: self.cancelled,
        }
    }
}
