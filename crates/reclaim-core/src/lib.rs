//! Core types and traits for reclaim.
//!
//! This crate provides the fundamental data structures shared by the
//! scanning, analysis and cleaning crates: file records, directory trees,
//! categories, configuration, diagnostics, progress events and the worker
//! pool.

pub mod access;
mod category;
mod config;
mod error;
mod event;
mod node;
pub mod paths;
mod pool;
mod tree;

pub use category::{Category, PathClassifier};
pub use config::{
    DeleteMode, EngineConfig, EngineConfigBuilder, ScanOptions, default_safe_cache_paths,
    default_worker_limit, expand_tilde,
};
pub use error::{ConfigError, Diagnostic, DiagnosticKind, PathError, ScanError};
pub use event::{EVENT_CHANNEL_SIZE, EngineEvent, EventReceiver, EventSink, Operation};
pub use node::{DirectoryNode, FileRecord, Fingerprint, InodeInfo, Records};
pub use pool::WorkerPool;
pub use tree::{ScanReport, ScanStats};

/// Cooperative cancellation signal shared by every engine operation.
pub use tokio_util::sync::CancellationToken;
