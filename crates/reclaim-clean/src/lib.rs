//! Cleaning previews and safe deletion for reclaim.
//!
//! Cleaning happens in two steps:
//!
//! 1. [`CleaningPlanner::plan`] turns [`Selection`]s into a [`CleaningPreview`]
//!    without touching the filesystem.
//! 2. [`CleaningExecutor::execute`] deletes the targets of a preview built in
//!    [`PlanMode::Commit`], one target at a time, and reports every outcome.
//!
//! Targets the process cannot remove itself are handed to a
//! [`PrivilegedHelper`] in a single batch.
//!
//! ```rust,ignore
//! use reclaim_clean::{CleaningExecutor, CleaningPlanner, PlanMode, Selection};
//! use reclaim_core::{CancellationToken, Category, EngineConfig};
//!
//! let config = EngineConfig::new("/home/me");
//! let cancel = CancellationToken::new();
//! let mut plan = CleaningPlanner::new(config.clone()).plan(
//!     &scan,
//!     Some(&duplicates),
//!     &[Selection::category(Category::Logs), Selection::AllDuplicates],
//!     PlanMode::Commit,
//!     &cancel,
//! )?;
//! plan.confirm();
//! let result = CleaningExecutor::new(&config).execute(&plan, &cancel)?;
//! println!("Freed {} bytes", result.bytes_freed);
//! ```

mod contents;
mod error;
mod executor;
mod helper;
mod planner;
mod progress;
mod remover;
mod result;
mod target;

pub use error::{CleanError, HelperError};
pub use executor::CleaningExecutor;
pub use helper::{
    CommandHelper, HELPER_OPERATION, HelperPathResult, HelperResponse, PrivilegedHelper, UnavailableHelper,
    serve_delete,
};
pub use planner::{CleaningPlanner, CleaningPreview, PlanWarning, PlanWarningKind};
pub use progress::{CLEAN_CHANNEL_SIZE, CleanProgress, CleanUpdate, start_clean};
pub use remover::{PermanentRemover, Remover, TrashRemover, remover_for};
pub use result::{CleaningResult, SkipReason, TargetOutcome, TargetResult};
pub use target::{CleaningTarget, PlanMode, SafetyClass, Selection, TargetReason};
