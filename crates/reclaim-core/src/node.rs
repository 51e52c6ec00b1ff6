//! File records and directory nodes.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use compact_str::CompactString;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// BLAKE3 content fingerprint for duplicate detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    /// Create a new fingerprint from raw digest bytes.
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the fingerprint as a hex string.
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Device and inode pair identifying a file system object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InodeInfo {
    /// Inode number.
    pub inode: u64,
    /// Device ID.
    pub device: u64,
}

impl InodeInfo {
    /// Create new inode info.
    pub fn new(inode: u64, device: u64) -> Self {
        Self { inode, device }
    }

    /// Read the device and inode from metadata.
    #[cfg(unix)]
    pub fn from_metadata(metadata: &std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;
        Self::new(metadata.ino(), metadata.dev())
    }

    #[cfg(not(unix))]
    pub fn from_metadata(_metadata: &std::fs::Metadata) -> Self {
        Self::new(0, 0)
    }
}

/// A single file or directory observed by a scan.
///
/// Records are immutable once produced. Attaching a fingerprint yields a new
/// record via [`FileRecord::with_fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute path.
    pub path: PathBuf,
    /// Size in bytes (0 for directories).
    pub size: u64,
    /// Whether this record describes a directory.
    pub is_dir: bool,
    /// Last modification time.
    pub modified: SystemTime,
    /// Content category.
    pub category: Category,
    /// Content fingerprint, present only after hashing.
    pub fingerprint: Option<Fingerprint>,
}

impl FileRecord {
    /// Create a record for a regular file.
    pub fn file(path: impl Into<PathBuf>, size: u64, modified: SystemTime, category: Category) -> Self {
        Self {
            path: path.into(),
            size,
            is_dir: false,
            modified,
            category,
            fingerprint: None,
        }
    }

    /// Create a record for a directory.
    pub fn directory(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            size: 0,
            is_dir: true,
            modified,
            category: Category::Other,
            fingerprint: None,
        }
    }

    /// Return a copy of this record carrying the given fingerprint.
    pub fn with_fingerprint(&self, fingerprint: Fingerprint) -> Self {
        Self {
            fingerprint: Some(fingerprint),
            ..self.clone()
        }
    }

    /// File name component of the path.
    pub fn name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A directory in the scanned tree with its aggregate size.
///
/// The aggregate is the sum of the sizes of the files directly inside the
/// directory plus the aggregates of its subdirectories. Directory entry
/// overhead is not counted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Absolute path.
    pub path: PathBuf,
    /// Directory name (the full path for the root).
    pub name: CompactString,
    /// Depth below the scan root (root is 0).
    pub depth: u32,
    /// Last modification time.
    pub modified: SystemTime,
    /// Aggregate size of all descendant files.
    pub aggregate_size: u64,
    /// Number of files in this subtree.
    pub file_count: u64,
    /// Files directly inside this directory, ordered by name.
    pub files: Vec<FileRecord>,
    /// Subdirectories, ordered by name.
    pub children: Vec<DirectoryNode>,
}

impl DirectoryNode {
    /// Create an empty directory node.
    pub fn new(path: impl Into<PathBuf>, depth: u32, modified: SystemTime) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.to_string_lossy().to_string());

        Self {
            path,
            name: name.into(),
            depth,
            modified,
            aggregate_size: 0,
            file_count: 0,
            files: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Recompute aggregate size and file count from direct contents.
    ///
    /// Children must already be final.
    pub fn finalize(&mut self) {
        self.aggregate_size = self.files.iter().map(|f| f.size).sum::<u64>()
            + self.children.iter().map(|c| c.aggregate_size).sum::<u64>();
        self.file_count =
            self.files.len() as u64 + self.children.iter().map(|c| c.file_count).sum::<u64>();
    }

    /// Number of directories below this node.
    pub fn dir_count(&self) -> u64 {
        self.children.iter().map(|c| 1 + c.dir_count()).sum()
    }

    /// Iterate over every file record in this subtree, depth first.
    pub fn records(&self) -> Records<'_> {
        Records {
            stack: self.children.iter().rev().collect(),
            current: self.files.iter(),
        }
    }

    /// Find the directory node for `path` within this subtree.
    pub fn find_dir(&self, path: &Path) -> Option<&DirectoryNode> {
        if path == self.path {
            return Some(self);
        }
        if !path.starts_with(&self.path) {
            return None;
        }
        self.children
            .iter()
            .find(|c| path.starts_with(&c.path))
            .and_then(|c| c.find_dir(path))
    }

    /// Find the file record for `path` within this subtree.
    pub fn find_file(&self, path: &Path) -> Option<&FileRecord> {
        let parent = path.parent()?;
        self.find_dir(parent)?
            .files
            .iter()
            .find(|f| f.path == path)
    }
}

/// Depth-first iterator over the file records of a directory subtree.
pub struct Records<'a> {
    stack: Vec<&'a DirectoryNode>,
    current: std::slice::Iter<'a, FileRecord>,
}

impl<'a> Iterator for Records<'a> {
    type Item = &'a FileRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.current.next() {
                return Some(record);
            }
            let node = self.stack.pop()?;
            self.stack.extend(node.children.iter().rev());
            self.current = node.files.iter();
        }
    }
}
