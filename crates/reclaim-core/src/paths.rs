//! Path normalization for scope and prefix checks.
//!
//! `Path::starts_with` compares components, so `/data/../etc` "starts with"
//! `/data`. Every path that is compared against a root, an exclusion or a
//! cache prefix goes through one of these helpers first.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Make `path` absolute and resolve `.` and `..` without touching the file system.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let absolute = std::path::absolute(path)?;
    let mut normalized = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}

/// Canonical form of `path`, as far as it exists.
///
/// The longest existing ancestor is canonicalized and the remaining
/// components are appended, so configured paths that do not exist yet still
/// compare correctly once symlinks in their prefix are resolved.
pub fn resolve(path: &Path) -> PathBuf {
    let Ok(normalized) = normalize(path) else {
        return path.to_path_buf();
    };

    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest.iter().rev().fold(canonical, |acc, name| acc.join(name));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Resolve the parent of `path` but keep its last component as is.
///
/// Used for deletion targets: a symlink target stays the link itself, while
/// a symlinked directory in its prefix is resolved.
pub fn resolve_parent(path: &Path) -> io::Result<PathBuf> {
    let normalized = normalize(path)?;
    match (normalized.parent(), normalized.file_name()) {
        (Some(parent), Some(name)) => Ok(resolve(parent).join(name)),
        _ => Ok(normalized),
    }
}
