//! Progress reporting and the async commit driver.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use reclaim_core::CancellationToken;

use crate::error::CleanError;
use crate::executor::CleaningExecutor;
use crate::planner::CleaningPreview;
use crate::result::CleaningResult;

/// Capacity of the update channel returned by [`start_clean`].
pub const CLEAN_CHANNEL_SIZE: usize = 100;

/// Progress of an ongoing commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanProgress {
    /// Targets with a final outcome.
    pub targets_done: usize,
    /// Targets in the plan.
    pub targets_total: usize,
    /// Bytes freed so far.
    pub bytes_freed: u64,
    /// Target currently being processed.
    pub current_path: Option<PathBuf>,
}

impl CleanProgress {
    /// Create progress for a plan of `targets_total` targets.
    pub fn new(targets_total: usize) -> Self {
        Self {
            targets_total,
            ..Default::default()
        }
    }

    /// Percentage of targets handled (0-100).
    pub fn percentage(&self) -> f64 {
        if self.targets_total == 0 {
            100.0
        } else {
            (self.targets_done as f64 / self.targets_total as f64) * 100.0
        }
    }
}

/// Update sent by [`start_clean`].
#[derive(Debug)]
pub enum CleanUpdate {
    Progress(CleanProgress),
    Complete(Result<CleaningResult, CleanError>),
}

/// Execute `plan` on a blocking task and stream updates.
///
/// Must be called from within a tokio runtime. The last update is always
/// [`CleanUpdate::Complete`].
pub fn start_clean(
    executor: Arc<CleaningExecutor>,
    plan: CleaningPreview,
    cancel: CancellationToken,
) -> mpsc::Receiver<CleanUpdate> {
    let (tx, rx) = mpsc::channel(CLEAN_CHANNEL_SIZE);

    tokio::spawn(async move {
        let progress_tx = tx.clone();
        let joined = tokio::task::spawn_blocking(move || {
            executor.execute_with_progress(&plan, &cancel, |progress| {
                let _ = progress_tx.blocking_send(CleanUpdate::Progress(progress.clone()));
            })
        })
        .await;

        let result = joined.unwrap_or_else(|err| {
            Err(CleanError::Task {
                message: err.to_string(),
            })
        });
        let _ = tx.send(CleanUpdate::Complete(result)).await;
    });

    rx
}
