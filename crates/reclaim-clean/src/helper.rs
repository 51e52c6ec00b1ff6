//! The privileged-helper contract.
//!
//! The executor hands `requires-privilege` targets to an external helper as
//! one batch: `<helper argv...> delete <absolute paths...>`. The helper prints
//! a JSON [`HelperResponse`] on stdout. How the helper gains its privileges is
//! its own business.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::contents::list_tree;
use crate::error::HelperError;

/// Operation name passed as the helper's first argument.
pub const HELPER_OPERATION: &str = "delete";

/// Per-path result reported by the helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperPathResult {
    pub path: PathBuf,
    pub success: bool,
    #[serde(default)]
    pub bytes_freed: u64,
    #[serde(default)]
    pub files_deleted: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Everything the helper reports for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperResponse {
    pub results: Vec<HelperPathResult>,
}

impl HelperResponse {
    /// The result reported for `path`.
    pub fn result_for(&self, path: &Path) -> Option<&HelperPathResult> {
        self.results.iter().find(|r| r.path == path)
    }
}

/// Something that can delete paths the process itself cannot.
pub trait PrivilegedHelper: Send + Sync {
    /// Delete `paths` and report per-path results.
    fn delete(&self, paths: &[PathBuf]) -> Result<HelperResponse, HelperError>;
}

/// Runs the configured helper command.
#[derive(Debug, Clone)]
pub struct CommandHelper {
    argv: Vec<String>,
}

impl CommandHelper {
    /// Create a helper from its argv, e.g. `["pkexec", "/usr/libexec/reclaim-helper"]`.
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl PrivilegedHelper for CommandHelper {
    fn delete(&self, paths: &[PathBuf]) -> Result<HelperResponse, HelperError> {
        let Some((program, args)) = self.argv.split_first() else {
            return Err(HelperError::Unavailable);
        };

        debug!(program = %program, paths = paths.len(), "invoking privileged helper");
        let output = Command::new(program)
            .args(args)
            .arg(HELPER_OPERATION)
            .args(paths)
            .output()
            .map_err(|source| HelperError::Spawn {
                program: program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(HelperError::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(serde_json::from_slice(&output.stdout)?)
    }
}

/// Used when no helper is configured; every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableHelper;

impl PrivilegedHelper for UnavailableHelper {
    fn delete(&self, _paths: &[PathBuf]) -> Result<HelperResponse, HelperError> {
        Err(HelperError::Unavailable)
    }
}

/// Helper side of the contract: delete each path and report.
///
/// Relative paths and the filesystem root are refused. Each path is handled
/// independently.
pub fn serve_delete(paths: &[PathBuf]) -> HelperResponse {
    let results = paths
        .iter()
        .map(|path| match delete_one(path) {
            Ok((bytes_freed, files_deleted)) => HelperPathResult {
                path: path.clone(),
                success: true,
                bytes_freed,
                files_deleted,
                error: None,
            },
            Err(err) => {
                warn!(path = %path.display(), error = %err, "helper could not delete path");
                HelperPathResult {
                    path: path.clone(),
                    success: false,
                    bytes_freed: 0,
                    files_deleted: 0,
                    error: Some(err.to_string()),
                }
            }
        })
        .collect();

    HelperResponse { results }
}

fn delete_one(path: &Path) -> Result<(u64, u64), HelperError> {
    if !path.is_absolute() {
        return Err(HelperError::Refused {
            path: path.to_path_buf(),
            message: "path is not absolute".to_string(),
        });
    }
    if path.parent().is_none() {
        return Err(HelperError::Refused {
            path: path.to_path_buf(),
            message: "refusing to delete the filesystem root".to_string(),
        });
    }

    let refused = |err: std::io::Error| HelperError::Refused {
        path: path.to_path_buf(),
        message: err.to_string(),
    };

    let metadata = fs::symlink_metadata(path).map_err(refused)?;
    if metadata.is_dir() {
        let contents = list_tree(path).map_err(refused)?;
        fs::remove_dir_all(path).map_err(refused)?;
        Ok((contents.bytes, contents.files))
    } else {
        fs::remove_file(path).map_err(refused)?;
        Ok((metadata.len(), 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_serve_delete_refuses_relative_paths() {
        let response = serve_delete(&[PathBuf::from("relative/file")]);
        assert_eq!(response.results.len(), 1);
        assert!(!response.results[0].success);
        assert!(response.results[0].error.as_deref().unwrap().contains("not absolute"));
    }

    #[test]
    fn test_serve_delete_handles_each_path() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        let dir = temp.path().join("d");
        fs::write(&file, "12345").unwrap();
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("inner"), "abc").unwrap();
        let missing = temp.path().join("missing");

        let response = serve_delete(&[file.clone(), missing.clone(), dir.clone()]);

        let file_result = response.result_for(&file).unwrap();
        assert!(file_result.success);
        assert_eq!(file_result.bytes_freed, 5);
        assert!(!response.result_for(&missing).unwrap().success);
        let dir_result = response.result_for(&dir).unwrap();
        assert!(dir_result.success);
        assert_eq!(dir_result.bytes_freed, 3);
        assert_eq!(dir_result.files_deleted, 1);
        assert!(!file.exists());
        assert!(!dir.exists());
    }

    #[test]
    fn test_response_round_trips_through_json() {
        let response = HelperResponse {
            results: vec![HelperPathResult {
                path: PathBuf::from("/tmp/x"),
                success: true,
                bytes_freed: 10,
                files_deleted: 1,
                error: None,
            }],
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(!json.contains("error"));
        let parsed: HelperResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, response);
    }

    #[test]
    fn test_unavailable_helper_fails() {
        assert!(matches!(
            UnavailableHelper.delete(&[PathBuf::from("/x")]),
            Err(HelperError::Unavailable)
        ));
    }

    #[test]
    fn test_command_helper_with_empty_argv() {
        let helper = CommandHelper::new(Vec::new());
        assert!(matches!(helper.delete(&[]), Err(HelperError::Unavailable)));
    }
}
