//! Directory tree scanner for reclaim.
//!
//! This crate walks a root directory in parallel using jwalk and produces
//! either a lazy stream of [`WalkItem`]s or a complete [`ScanReport`] with
//! aggregated directory sizes.
//!
//! # Overview
//!
//! - **Deterministic order**: siblings are visited lexicographically
//! - **Cycle safety**: a visited device+inode set stops link loops
//! - **Hardlinks** are counted once, at their first path
//! - **Partial-failure tolerant**: unreadable or vanished entries become
//!   diagnostics; only an unreadable root fails the scan
//! - **Cancellable** at every directory-entry boundary
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use reclaim_scan::{CancellationToken, ScanOptions, TreeScanner};
//!
//! let scanner = TreeScanner::new();
//! let report = scanner
//!     .scan(Path::new("/path/to/scan"), &ScanOptions::default(), &CancellationToken::new())
//!     .unwrap();
//!
//! println!("Total size: {} bytes", report.total_size());
//! println!("Total files: {}", report.file_count());
//! ```

mod inode;
mod progress;
mod scanner;

pub use inode::VisitedSet;
pub use scanner::{TreeScanner, Walk, WalkItem};

// Re-export core types for convenience
pub use reclaim_core::{
    CancellationToken, Diagnostic, DiagnosticKind, DirectoryNode, FileRecord, ScanError,
    ScanOptions, ScanReport, ScanStats,
};
