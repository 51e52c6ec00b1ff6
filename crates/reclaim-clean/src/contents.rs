//! Read-only listing of a directory subtree.

use std::io;
use std::path::{Path, PathBuf};

use jwalk::{Parallelism, WalkDir};

/// Everything below a directory, as seen right now.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TreeContents {
    /// Every entry below the directory, the directory itself excluded.
    pub entries: Vec<PathBuf>,
    /// Sum of regular file sizes.
    pub bytes: u64,
    /// Number of non-directory entries.
    pub files: u64,
}

/// List `dir` without following symlinks.
///
/// Any unreadable entry fails the whole listing; a directory that cannot be
/// fully seen is never treated as fully planned.
pub(crate) fn list_tree(dir: &Path) -> io::Result<TreeContents> {
    let mut contents = TreeContents::default();

    let walker = WalkDir::new(dir)
        .parallelism(Parallelism::Serial)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true);

    for entry in walker {
        let mut entry = entry.map_err(|err| {
            err.into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop"))
        })?;
        if let Some(err) = entry.read_children_error.take() {
            return Err(err
                .into_io_error()
                .unwrap_or_else(|| io::Error::other("filesystem loop")));
        }
        if entry.depth == 0 {
            continue;
        }

        let file_type = entry.file_type();
        if !file_type.is_dir() {
            contents.files += 1;
            if file_type.is_file() {
                contents.bytes += entry.metadata().map(|m| m.len()).map_err(|err| {
                    err.into_io_error()
                        .unwrap_or_else(|| io::Error::other("metadata unavailable"))
                })?;
            }
        }
        contents.entries.push(entry.path());
    }

    Ok(contents)
}
