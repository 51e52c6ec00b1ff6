//! Analysis algorithms for reclaim.
//!
//! This crate provides analysis capabilities for scanned file trees:
//!
//! - **Content hashing** - Chunked, cancellable BLAKE3 fingerprints
//! - **Duplicate detection** - Groups of byte-identical files
//! - **Summaries** - Category statistics and largest entries
//!
//! # Duplicate Detection
//!
//! Uses a three-phase algorithm for efficiency:
//!
//! 1. Group files by size (instant); empty files are excluded
//! 2. Compute partial hash (first + last 4KB) for size-matched files
//! 3. Compute full BLAKE3 hash for partial-hash matches
//!
//! ```rust,ignore
//! use reclaim_analyze::{AnalysisResult, DuplicateDetector};
//! use reclaim_scan::{CancellationToken, ScanOptions, TreeScanner};
//!
//! let cancel = CancellationToken::new();
//! let scan = TreeScanner::new().scan("/path/to/scan".as_ref(), &ScanOptions::default(), &cancel)?;
//!
//! let duplicates = DuplicateDetector::new().find_duplicates(&scan, &cancel);
//! println!("Found {} duplicate groups", duplicates.group_count());
//! println!("Wasted space: {} bytes", duplicates.total_wasted_space);
//!
//! let summary = AnalysisResult::from_scan(&scan, &duplicates, 20);
//! for (category, stats) in &summary.categories {
//!     println!("{category}: {} files", stats.file_count);
//! }
//! ```

mod duplicates;
mod hasher;
mod summary;

pub use duplicates::{
    DuplicateConfig, DuplicateConfigBuilder, DuplicateDetector, DuplicateGroup, DuplicateReport,
};
pub use hasher::{ContentHasher, DEFAULT_CHUNK_SIZE, HashError};
pub use summary::{AnalysisResult, CategoryStats, LargestEntry};

// Re-export core types
pub use reclaim_core::{FileRecord, Fingerprint, ScanReport};
