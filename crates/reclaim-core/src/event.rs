//! Progress events published to the presentation layer.

use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::broadcast;

/// Default capacity of the event channel.
pub const EVENT_CHANNEL_SIZE: usize = 256;

/// Receiving end of an [`EventSink`].
pub type EventReceiver = broadcast::Receiver<EngineEvent>;

/// Which engine operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Scan,
    Hash,
    Plan,
    Clean,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scan => write!(f, "Scan"),
            Self::Hash => write!(f, "Hash"),
            Self::Plan => write!(f, "Plan"),
            Self::Clean => write!(f, "Clean"),
        }
    }
}

/// A progress event.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// Scan progress snapshot.
    Scan {
        files_scanned: u64,
        dirs_scanned: u64,
        bytes_scanned: u64,
        current_path: PathBuf,
        elapsed: Duration,
    },
    /// Duplicate hashing progress.
    Hash {
        files_hashed: u64,
        files_total: u64,
        bytes_hashed: u64,
        current_path: Option<PathBuf>,
    },
    /// Cleaning progress.
    Clean {
        targets_done: usize,
        targets_total: usize,
        bytes_freed: u64,
        current_path: Option<PathBuf>,
    },
    /// The operation observed its cancellation signal.
    Cancelled { operation: Operation },
    /// The operation finished.
    Finished { operation: Operation },
}

/// Fire-and-forget publisher of [`EngineEvent`]s.
///
/// Sending never blocks and never fails; events without receivers are dropped.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventSink {
    /// Create a sink with the default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self { tx }
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> EventReceiver {
        self.tx.subscribe()
    }

    /// Publish an event.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Publish a cancellation acknowledgement.
    pub fn cancelled(&self, operation: Operation) {
        self.emit(EngineEvent::Cancelled { operation });
    }

    /// Publish a completion notice.
    pub fn finished(&self, operation: Operation) {
        self.emit(EngineEvent::Finished { operation });
    }
}

impl Default for EventSink {
    fn default() -> Self {
        Self::new()
    }
}
