//! Scan progress tracking.

use std::path::Path;
use std::time::{Duration, Instant};

use reclaim_core::{EngineEvent, EventSink};

/// Entries between two progress events.
const EMIT_EVERY: u64 = 1000;

/// Running counters for one scan, published as [`EngineEvent::Scan`].
#[derive(Debug)]
pub(crate) struct ProgressTracker {
    start_time: Instant,
    files_scanned: u64,
    dirs_scanned: u64,
    bytes_scanned: u64,
    entries: u64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            files_scanned: 0,
            dirs_scanned: 0,
            bytes_scanned: 0,
            entries: 0,
        }
    }

    pub fn record_file(&mut self, size: u64) {
        self.files_scanned += 1;
        self.bytes_scanned += size;
        self.entries += 1;
    }

    pub fn record_dir(&mut self) {
        self.dirs_scanned += 1;
        self.entries += 1;
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Publish a snapshot if enough entries have passed since the last one.
    pub fn maybe_emit(&self, events: &EventSink, current_path: &Path) {
        if self.entries % EMIT_EVERY == 0 {
            self.emit(events, current_path);
        }
    }

    pub fn emit(&self, events: &EventSink, current_path: &Path) {
        events.emit(EngineEvent::Scan {
            files_scanned: self.files_scanned,
            dirs_scanned: self.dirs_scanned,
            bytes_scanned: self.bytes_scanned,
            current_path: current_path.to_path_buf(),
            elapsed: self.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttled_emission() {
        let events = EventSink::new();
        let mut rx = events.subscribe();
        let mut tracker = ProgressTracker::new();

        for _ in 0..(EMIT_EVERY * 2 + 5) {
            tracker.record_file(1);
            tracker.maybe_emit(&events, Path::new("/x"));
        }

        let mut received = 0;
        while let Ok(EngineEvent::Scan { bytes_scanned, .. }) = rx.try_recv() {
            received += 1;
            assert_eq!(bytes_scanned % EMIT_EVERY, 0);
        }
        assert_eq!(received, 2);
    }
}
