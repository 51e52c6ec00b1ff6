//! JWalk-based directory tree scanner.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use jwalk::{DirEntry, Parallelism, WalkDirGeneric};
use tracing::{debug, info};

use reclaim_core::access;
use reclaim_core::{
    CancellationToken, Category, ConfigError, Diagnostic, DiagnosticKind, DirectoryNode,
    EventReceiver, EventSink, FileRecord, InodeInfo, Operation, PathClassifier, PathError,
    ScanError, ScanOptions, ScanReport, ScanStats, WorkerPool,
};

use crate::inode::VisitedSet;
use crate::progress::ProgressTracker;

/// Per-entry client state: `true` marks a directory already visited.
type WalkState = ((), bool);

type EntryResult = Result<DirEntry<WalkState>, jwalk::Error>;

/// One item of a lazy scan.
#[derive(Debug, Clone)]
pub enum WalkItem {
    /// A file or directory below the root.
    Record(FileRecord),
    /// An entry that was skipped.
    Diagnostic(Diagnostic),
}

/// Parallel directory scanner.
///
/// Without a worker pool the walk runs on the calling thread.
pub struct TreeScanner {
    events: EventSink,
    pool: Option<WorkerPool>,
    classifier: PathClassifier,
}

impl TreeScanner {
    /// Create a serial scanner with its own event sink.
    pub fn new() -> Self {
        Self {
            events: EventSink::new(),
            pool: None,
            classifier: PathClassifier::new(),
        }
    }

    /// Read directories on the given pool.
    pub fn with_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Publish progress on a shared sink.
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Subscribe to scan progress events.
    pub fn subscribe(&self) -> EventReceiver {
        self.events.subscribe()
    }

    /// Start a lazy walk of `root`.
    ///
    /// Fails only if the root itself cannot be read. Entries are yielded in
    /// lexicographic order within each directory, parents before children.
    pub fn walk(
        &self,
        root: &Path,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<Walk, ScanError> {
        let root_path = check_root(root)?;
        let options = options.resolved();

        let visited_dirs = Arc::new(VisitedSet::new());
        if let Ok(metadata) = fs::metadata(&root_path) {
            visited_dirs.insert(InodeInfo::from_metadata(&metadata));
        }

        let parallelism = match &self.pool {
            Some(pool) => Parallelism::RayonExistingPool {
                pool: pool.handle(),
                busy_timeout: None,
            },
            None => Parallelism::Serial,
        };

        let mut walker = WalkDirGeneric::<WalkState>::new(&root_path)
            .parallelism(parallelism)
            .sort(true)
            .skip_hidden(false)
            .follow_links(options.follow_symlinks);
        if let Some(max_depth) = options.max_depth {
            walker = walker.max_depth(max_depth as usize);
        }

        let filter_options = options.clone();
        let dir_cancel = cancel.clone();
        let walker = walker.process_read_dir(move |depth, _path, _state, children| {
            filter_children(depth, children, &filter_options, &visited_dirs, &dir_cancel);
        });

        info!(root = %root_path.display(), "scan started");

        Ok(Walk {
            inner: Box::new(walker.into_iter()),
            root: root_path,
            options,
            classifier: self.classifier,
            visited_files: VisitedSet::new(),
            cancel: cancel.clone(),
            cancelled: false,
            pending: None,
            unlisted: Vec::new(),
            progress: ProgressTracker::new(),
            events: self.events.clone(),
        })
    }

    /// Scan `root` to completion and build the directory tree.
    ///
    /// A cancelled scan returns the partial tree with `cancelled` set.
    pub fn scan(
        &self,
        root: &Path,
        options: &ScanOptions,
        cancel: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let start = Instant::now();
        let mut walk = self.walk(root, options, cancel)?;
        let root_path = walk.root().to_path_buf();

        let mut stats = ScanStats::new();
        let mut diagnostics = Vec::new();
        let mut entries_by_parent: HashMap<PathBuf, Vec<FileRecord>> = HashMap::new();

        for item in walk.by_ref() {
            match item {
                WalkItem::Record(record) => {
                    let depth = depth_below(&root_path, &record.path);
                    if record.is_dir {
                        stats.record_dir(depth);
                    } else {
                        stats.record_file(&record.path, record.size, depth);
                    }
                    if let Some(parent) = record.path.parent() {
                        entries_by_parent
                            .entry(parent.to_path_buf())
                            .or_default()
                            .push(record);
                    }
                }
                WalkItem::Diagnostic(diagnostic) => diagnostics.push(diagnostic),
            }
        }

        let cancelled = walk.is_cancelled();
        walk.finish();

        let root_modified = fs::metadata(&root_path)
            .and_then(|m| m.modified())
            .unwrap_or(UNIX_EPOCH);
        let root_node = build_node(&root_path, root_modified, 0, &mut entries_by_parent);

        info!(
            root = %root_path.display(),
            files = stats.total_files,
            bytes = stats.total_size,
            diagnostics = diagnostics.len(),
            cancelled,
            "scan finished"
        );

        Ok(ScanReport::new(
            root_node,
            options.clone(),
            stats,
            start.elapsed(),
            diagnostics,
            cancelled,
        ))
    }
}

impl Default for TreeScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy scan of one root. Yields [`WalkItem`]s until the tree is exhausted
/// or cancellation is observed.
pub struct Walk {
    inner: Box<dyn Iterator<Item = EntryResult>>,
    root: PathBuf,
    options: ScanOptions,
    classifier: PathClassifier,
    visited_files: VisitedSet,
    cancel: CancellationToken,
    cancelled: bool,
    pending: Option<WalkItem>,
    /// Directories reported as diagnostics; their descendants are dropped.
    unlisted: Vec<PathBuf>,
    progress: ProgressTracker,
    events: EventSink,
}

impl Walk {
    /// Canonical root of this walk.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the walk stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Publish the final progress snapshot and the completion event.
    pub fn finish(self) {
        self.progress.emit(&self.events, &self.root);
        if self.cancelled {
            self.events.cancelled(Operation::Scan);
        } else {
            self.events.finished(Operation::Scan);
        }
    }

    fn visit(&mut self, mut entry: DirEntry<WalkState>) -> Option<WalkItem> {
        let path = entry.path();

        if entry.client_state {
            debug!(path = %path.display(), "directory already visited");
            return Some(WalkItem::Diagnostic(Diagnostic::cycle(path)));
        }

        if self.unlisted.iter().any(|dir| path.starts_with(dir)) {
            debug!(path = %path.display(), "parent directory not recorded");
            return None;
        }

        // Only reported for links that are not followed.
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            return None;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                if file_type.is_dir() {
                    self.unlisted.push(path.clone());
                }
                return Some(WalkItem::Diagnostic(walk_diagnostic(err, &path)));
            }
        };
        let modified = metadata.modified().unwrap_or(UNIX_EPOCH);

        if file_type.is_dir() {
            if let Some(err) = entry.read_children_error.take() {
                let diagnostic = walk_diagnostic(err, &path);
                debug!(path = %path.display(), kind = ?diagnostic.kind, "directory not listed");
                self.pending = Some(WalkItem::Diagnostic(diagnostic));
            }
            self.progress.record_dir();
            self.progress.maybe_emit(&self.events, &path);
            return Some(WalkItem::Record(FileRecord::directory(path, modified)));
        }
        if !file_type.is_file() {
            return None;
        }

        if link_count(&metadata) > 1
            && !self.visited_files.insert(InodeInfo::from_metadata(&metadata))
        {
            debug!(path = %path.display(), "hardlink already counted");
            return None;
        }

        if self.options.check_readable && !access::can_read(&path) {
            debug!(path = %path.display(), "file not readable");
            return Some(WalkItem::Diagnostic(PathError::Access { path }.into()));
        }

        let size = metadata.len();
        let category = self.classify(&path, size);

        self.progress.record_file(size);
        self.progress.maybe_emit(&self.events, &path);

        Some(WalkItem::Record(FileRecord::file(path, size, modified, category)))
    }

    fn classify(&self, path: &Path, size: u64) -> Category {
        if let Some(category) = self.classifier.classify_name(path) {
            return category;
        }
        if size == 0 || size > self.options.sniff_max_size {
            return self.classifier.classify(path, None);
        }
        match read_prefix(path) {
            Ok(prefix) => self.classifier.classify(path, Some(&prefix)),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "content sniff failed");
                self.classifier.classify(path, None)
            }
        }
    }
}

impl Iterator for Walk {
    type Item = WalkItem;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.take() {
                return Some(item);
            }
            if self.cancel.is_cancelled() {
                self.cancelled = true;
                return None;
            }

            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let diagnostic = walk_diagnostic(err, &self.root);
                    debug!(path = %diagnostic.path.display(), kind = ?diagnostic.kind, "entry skipped");
                    return Some(WalkItem::Diagnostic(diagnostic));
                }
            };
            if entry.depth == 0 {
                continue;
            }
            if let Some(item) = self.visit(entry) {
                return Some(item);
            }
        }
    }
}

/// Runs once per directory listing, before its children are yielded.
fn filter_children(
    depth: Option<usize>,
    children: &mut Vec<EntryResult>,
    options: &ScanOptions,
    visited_dirs: &VisitedSet,
    cancel: &CancellationToken,
) {
    // The root's own listing.
    if depth.is_none() {
        return;
    }
    if cancel.is_cancelled() {
        children.clear();
        return;
    }

    children.retain(|child| match child {
        Ok(entry) => !options.is_excluded(&entry.path()),
        Err(_) => true,
    });

    for child in children.iter_mut().flatten() {
        if !child.file_type().is_dir() {
            continue;
        }
        let Ok(metadata) = child.metadata() else {
            // Reported when yielded; nothing below it is recorded.
            child.read_children_path = None;
            continue;
        };
        if !visited_dirs.insert(InodeInfo::from_metadata(&metadata)) {
            child.client_state = true;
            child.read_children_path = None;
        }
    }
}

fn check_root(root: &Path) -> Result<PathBuf, ScanError> {
    let metadata = fs::metadata(root).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => ScanError::Config(ConfigError::RootNotFound {
            path: root.to_path_buf(),
        }),
        _ => ScanError::RootUnreadable {
            path: root.to_path_buf(),
            source: err,
        },
    })?;
    if !metadata.is_dir() {
        return Err(ConfigError::RootNotADirectory {
            path: root.to_path_buf(),
        }
        .into());
    }

    let root_path = root.canonicalize().map_err(|source| ScanError::RootUnreadable {
        path: root.to_path_buf(),
        source,
    })?;
    fs::read_dir(&root_path).map_err(|source| ScanError::RootUnreadable {
        path: root_path.clone(),
        source,
    })?;
    Ok(root_path)
}

fn walk_diagnostic(err: jwalk::Error, fallback: &Path) -> Diagnostic {
    let path = err
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| fallback.to_path_buf());
    if err.loop_ancestor().is_some() {
        return Diagnostic::cycle(path);
    }
    let message = err.to_string();
    match err.into_io_error() {
        Some(io_err) => PathError::io(path, io_err).into(),
        None => Diagnostic::new(path, DiagnosticKind::IoError, message),
    }
}

fn read_prefix(path: &Path) -> io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(PathClassifier::SNIFF_LEN);
    File::open(path)?
        .take(PathClassifier::SNIFF_LEN as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix)
}

fn depth_below(root: &Path, path: &Path) -> u32 {
    path.strip_prefix(root)
        .map(|rel| rel.components().count() as u32)
        .unwrap_or(0)
}

/// Recursively build a node from the records collected under `path`.
fn build_node(
    path: &Path,
    modified: SystemTime,
    depth: u32,
    entries_by_parent: &mut HashMap<PathBuf, Vec<FileRecord>>,
) -> DirectoryNode {
    let mut node = DirectoryNode::new(path, depth, modified);

    let mut entries = entries_by_parent.remove(path).unwrap_or_default();
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    for entry in entries {
        if entry.is_dir {
            let child = build_node(&entry.path, entry.modified, depth + 1, entries_by_parent);
            node.children.push(child);
        } else {
            node.files.push(entry);
        }
    }

    node.finalize();
    node
}

#[cfg(unix)]
fn link_count(metadata: &fs::Metadata) -> u64 {
    metadata.nlink()
}

#[cfg(not(unix))]
fn link_count(_metadata: &fs::Metadata) -> u64 {
    1
}
