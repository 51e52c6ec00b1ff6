//! How the executor removes paths.

use std::fs;
use std::io;
use std::path::Path;

use reclaim_core::DeleteMode;

/// Removes files and directory trees.
pub trait Remover: Send + Sync {
    /// Remove a single non-directory entry.
    fn remove_file(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory and everything below it.
    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;

    /// The mode this remover implements.
    fn mode(&self) -> DeleteMode;
}

/// Unlinks immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct PermanentRemover;

impl Remover for PermanentRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }

    fn mode(&self) -> DeleteMode {
        DeleteMode::Permanent
    }
}

/// Moves entries to the desktop trash.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrashRemover;

impl TrashRemover {
    fn delete(path: &Path) -> io::Result<()> {
        trash::delete(path).map_err(trash_io_error)
    }
}

/// Keep the I/O error kind so a full disk halts the commit and a vanished
/// path is reported as already gone.
fn trash_io_error(err: trash::Error) -> io::Error {
    match err {
        #[cfg(all(unix, not(target_os = "macos"), not(target_os = "ios"), not(target_os = "android")))]
        trash::Error::FileSystem { source, .. } => source,
        trash::Error::CanonicalizePath { original } if fs::symlink_metadata(&original).is_err() => {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} does not exist", original.display()),
            )
        }
        trash::Error::CouldNotAccess { target } => io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("cannot access {target}"),
        ),
        other => io::Error::other(format!("trash error: {other}")),
    }
}

impl Remover for TrashRemover {
    fn remove_file(&self, path: &Path) -> io::Result<()> {
        Self::delete(path)
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        Self::delete(path)
    }

    fn mode(&self) -> DeleteMode {
        DeleteMode::Trash
    }
}

/// The remover for a configured delete mode.
pub fn remover_for(mode: DeleteMode) -> Box<dyn Remover> {
    match mode {
        DeleteMode::Permanent => Box::new(PermanentRemover),
        DeleteMode::Trash => Box::new(TrashRemover),
    }
}
