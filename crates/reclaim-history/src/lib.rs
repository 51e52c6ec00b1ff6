//! Scan and cleaning history for reclaim.
//!
//! [`AnalysisRecorder`] turns [`AnalysisResult`](reclaim_analyze::AnalysisResult)s
//! and [`CleaningResult`](reclaim_clean::CleaningResult)s into structured
//! records and hands them to a [`HistoryStore`]. Two stores are provided:
//! [`JsonLinesStore`] appends to a file, [`MemoryStore`] keeps entries in memory.

mod error;
mod record;
mod recorder;
mod store;

pub use error::HistoryError;
pub use record::{CleaningRecord, DailyTrend, DuplicateSummary, HistoryEntry, ScanRecord};
pub use recorder::AnalysisRecorder;
pub use store::{HistoryStore, JsonLinesStore, MemoryStore};
