//! Engine configuration.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;

/// Upper bound on the default worker count, to avoid saturating spinning disks.
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// How the executor removes files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Unlink immediately.
    #[default]
    Permanent,
    /// Move to the desktop trash.
    Trash,
}

/// Configuration passed explicitly into every engine entry point.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Roots the user asked to analyze.
    #[builder(default)]
    #[serde(default)]
    pub scan_roots: Vec<PathBuf>,

    /// Path prefixes skipped by scans.
    #[builder(default)]
    #[serde(default)]
    pub excluded_paths: Vec<PathBuf>,

    /// Follow symbolic links while scanning.
    #[builder(default = "false")]
    #[serde(default)]
    pub follow_symlinks: bool,

    /// Maximum depth to traverse (None = unlimited).
    #[builder(default)]
    #[serde(default)]
    pub max_depth: Option<u32>,

    /// Number of worker threads for scanning and hashing.
    #[builder(default = "default_worker_limit()")]
    #[serde(default = "default_worker_limit")]
    pub worker_limit: usize,

    /// Directories whose contents are always safe to remove.
    #[builder(default = "default_safe_cache_paths()")]
    #[serde(default = "default_safe_cache_paths")]
    pub safe_cache_paths: Vec<PathBuf>,

    /// Files at most this large may be content-sniffed when their extension is unknown.
    #[builder(default = "default_sniff_max_size()")]
    #[serde(default = "default_sniff_max_size")]
    pub sniff_max_size: u64,

    /// Number of largest entries kept in analysis results.
    #[builder(default = "default_top_n()")]
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// How deletions are carried out.
    #[builder(default)]
    #[serde(default)]
    pub delete_mode: DeleteMode,

    /// Command line of the privileged helper, e.g. `["pkexec", "/usr/libexec/reclaim"]`.
    #[builder(default)]
    #[serde(default)]
    pub helper_command: Option<Vec<String>>,
}

/// Worker count derived from available CPU parallelism, capped.
pub fn default_worker_limit() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_WORKERS)
}

fn default_sniff_max_size() -> u64 {
    16 * 1024 * 1024
}

fn default_top_n() -> usize {
    20
}

/// Well-known cache locations on a Linux desktop.
pub fn default_safe_cache_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/var/cache/apt/archives")];

    if let Some(cache) = dirs::cache_dir() {
        for sub in [
            "thumbnails",
            "mozilla/firefox",
            "chromium",
            "google-chrome",
            "pip",
            "yarn",
        ] {
            paths.push(cache.join(sub));
        }
    }
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".npm/_cacache"));
        paths.push(home.join(".cargo/registry/cache"));
    }

    paths
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        if self.worker_limit == Some(0) {
            return Err("worker_limit must be at least 1".to_string());
        }
        let helper = self.helper_command.as_ref().and_then(Option::as_ref);
        if helper.is_some_and(Vec::is_empty) {
            return Err("helper_command must name a program".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create a config for a single scan root with defaults everywhere else.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            scan_roots: vec![root.into()],
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file. `~` is expanded in every path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.expand_home();
        Ok(config)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("reclaim").join("config.toml"))
    }

    /// Check the configuration against the file system.
    ///
    /// Must pass before any scanning begins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_limit == 0 {
            return Err(ConfigError::InvalidWorkerLimit);
        }
        for root in &self.scan_roots {
            let metadata = std::fs::metadata(root).map_err(|_| ConfigError::RootNotFound {
                path: root.clone(),
            })?;
            if !metadata.is_dir() {
                return Err(ConfigError::RootNotADirectory { path: root.clone() });
            }
        }
        if self.helper_command.as_ref().is_some_and(Vec::is_empty) {
            return Err(ConfigError::Invalid {
                message: "helper_command must name a program".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve roots, exclusions and cache locations to canonical paths.
    ///
    /// Scans report canonical paths, so prefixes given relative or through a
    /// symlink would otherwise never match. Paths that do not exist keep their
    /// missing tail.
    pub fn canonicalize_paths(&mut self) {
        for path in self
            .scan_roots
            .iter_mut()
            .chain(self.excluded_paths.iter_mut())
            .chain(self.safe_cache_paths.iter_mut())
        {
            *path = paths::resolve(path);
        }
    }

    /// Scan options derived from this configuration, with exclusions resolved.
    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            follow_symlinks: self.follow_symlinks,
            excluded_paths: self.excluded_paths.clone(),
            max_depth: self.max_depth,
            sniff_max_size: self.sniff_max_size,
            check_readable: true,
        }
        .resolved()
    }

    /// Whether `path` lies under one of the configured scan roots.
    ///
    /// Compares components as given; see [`canonicalize_paths`](Self::canonicalize_paths).
    pub fn is_within_roots(&self, path: &Path) -> bool {
        self.scan_roots.iter().any(|root| path.starts_with(root))
    }

    /// Whether `path` lies under one of the safe cache locations.
    pub fn is_safe_cache(&self, path: &Path) -> bool {
        self.safe_cache_paths.iter().any(|cache| path.starts_with(cache))
    }

    fn expand_home(&mut self) {
        for path in self
            .scan_roots
            .iter_mut()
            .chain(self.excluded_paths.iter_mut())
            .chain(self.safe_cache_paths.iter_mut())
        {
            *path = expand_tilde(path);
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_roots: Vec::new(),
            excluded_paths: Vec::new(),
            follow_symlinks: false,
            max_depth: None,
            worker_limit: default_worker_limit(),
            safe_cache_paths: default_safe_cache_paths(),
            sniff_max_size: default_sniff_max_size(),
            top_n: default_top_n(),
            delete_mode: DeleteMode::Permanent,
            helper_command: None,
        }
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Options for a single scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOptions {
    /// Follow symbolic links.
    pub follow_symlinks: bool,
    /// Path prefixes to skip.
    pub excluded_paths: Vec<PathBuf>,
    /// Maximum depth to traverse (None = unlimited).
    pub max_depth: Option<u32>,
    /// Largest file that may be content-sniffed.
    pub sniff_max_size: u64,
    /// Report files the process cannot read as diagnostics instead of records.
    pub check_readable: bool,
}

impl ScanOptions {
    /// The same options with every excluded prefix resolved to its canonical form.
    pub fn resolved(&self) -> Self {
        Self {
            excluded_paths: self.excluded_paths.iter().map(|p| paths::resolve(p)).collect(),
            ..self.clone()
        }
    }

    /// Whether `path` falls under an excluded prefix.
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.excluded_paths.iter().any(|prefix| path.starts_with(prefix))
    }
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            follow_symlinks: false,
            excluded_paths: Vec::new(),
            max_depth: None,
            sniff_max_size: default_sniff_max_size(),
            check_readable: true,
        }
    }
}
