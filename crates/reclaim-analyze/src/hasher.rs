//! Chunked BLAKE3 content hashing.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use blake3::Hasher;
use thiserror::Error;

use reclaim_core::{CancellationToken, Fingerprint, PathError};

/// Default read size per chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Errors from hashing a single file.
#[derive(Debug, Error)]
pub enum HashError {
    /// The file could not be opened or read, or changed under us.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Cancellation was observed between two chunks.
    #[error("Hashing cancelled at {path}")]
    Cancelled { path: PathBuf },
}

/// Computes content fingerprints by reading files in bounded chunks.
///
/// A file is never loaded into memory at once. Failures are reported to the
/// caller and never retried.
#[derive(Debug, Clone)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl ContentHasher {
    /// Create a hasher with the default chunk size.
    pub fn new() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Create a hasher reading `chunk_size` bytes at a time.
    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Fingerprint the full contents of `path`.
    pub fn hash(&self, path: &Path, cancel: &CancellationToken) -> Result<Fingerprint, HashError> {
        self.hash_file(path, None, cancel)
    }

    /// Fingerprint `path`, which the caller recorded as `expected_size` bytes.
    ///
    /// Fails with [`PathError::Changed`] if the size on disk differs before
    /// or after reading.
    pub fn hash_sized(
        &self,
        path: &Path,
        expected_size: u64,
        cancel: &CancellationToken,
    ) -> Result<Fingerprint, HashError> {
        self.hash_file(path, Some(expected_size), cancel)
    }

    /// Cheap pre-filter: hash of the first `head` and last `tail` bytes plus the size.
    pub fn partial_hash(
        &self,
        path: &Path,
        expected_size: u64,
        head: usize,
        tail: usize,
    ) -> Result<Fingerprint, HashError> {
        let mut file = open(path, Some(expected_size))?;
        let mut hasher = Hasher::new();

        let head_size = (head as u64).min(expected_size);
        let mut head_buf = vec![0u8; head_size as usize];
        file.read_exact(&mut head_buf)
            .map_err(|e| read_error(path, e))?;
        hasher.update(&head_buf);

        if expected_size > head_size {
            let tail_size = (tail as u64).min(expected_size - head_size);
            if tail_size > 0 {
                file.seek(SeekFrom::End(-(tail_size as i64)))
                    .map_err(|e| read_error(path, e))?;
                let mut tail_buf = vec![0u8; tail_size as usize];
                file.read_exact(&mut tail_buf)
                    .map_err(|e| read_error(path, e))?;
                hasher.update(&tail_buf);
            }
        }

        hasher.update(&expected_size.to_le_bytes());
        Ok(Fingerprint::new(*hasher.finalize().as_bytes()))
    }

    fn hash_file(
        &self,
        path: &Path,
        expected_size: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<Fingerprint, HashError> {
        let mut file = open(path, expected_size)?;
        let mut hasher = Hasher::new();
        let mut buffer = vec![0u8; self.chunk_size];
        let mut total: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(HashError::Cancelled {
                    path: path.to_path_buf(),
                });
            }
            let bytes_read = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PathError::read(path, e).into()),
            };
            hasher.update(&buffer[..bytes_read]);
            total += bytes_read as u64;
        }

        if expected_size.is_some_and(|expected| expected != total) {
            return Err(PathError::Changed {
                path: path.to_path_buf(),
            }
            .into());
        }

        Ok(Fingerprint::new(*hasher.finalize().as_bytes()))
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

fn open(path: &Path, expected_size: Option<u64>) -> Result<File, HashError> {
    let file = File::open(path).map_err(|e| PathError::io(path, e))?;
    if let Some(expected) = expected_size {
        let actual = file.metadata().map_err(|e| PathError::io(path, e))?.len();
        if actual != expected {
            return Err(PathError::Changed {
                path: path.to_path_buf(),
            }
            .into());
        }
    }
    Ok(file)
}

fn read_error(path: &Path, err: io::Error) -> HashError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        PathError::Changed {
            path: path.to_path_buf(),
        }
        .into()
    } else {
        PathError::read(path, err).into()
    }
}
