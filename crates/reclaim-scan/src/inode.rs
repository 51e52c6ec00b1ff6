//! Device and inode tracking for cycle and hardlink detection.

use dashmap::DashSet;
use reclaim_core::InodeInfo;

/// Concurrent set of visited (device, inode) pairs.
///
/// Used twice per scan: once for directories, to stop link cycles and
/// repeated mounts, and once for multiply-linked files, so a hardlinked file
/// is only counted at its first path.
#[derive(Debug, Default)]
pub struct VisitedSet {
    seen: DashSet<InodeInfo>,
}

impl VisitedSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self {
            seen: DashSet::new(),
        }
    }

    /// Mark an inode as visited. Returns `true` the first time it is seen.
    pub fn insert(&self, info: InodeInfo) -> bool {
        self.seen.insert(info)
    }

    /// Check if an inode has been visited.
    pub fn contains(&self, info: &InodeInfo) -> bool {
        self.seen.contains(info)
    }

    /// Number of distinct inodes visited.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Check if nothing has been visited.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
