//! Persisted settings and layered configuration.
//!
//! Settings are merged from, lowest priority first:
//!
//! 1. built-in defaults
//! 2. the TOML settings file (platform config dir, or `--config`)
//! 3. `DUPESCAN_*` environment variables (`DUPESCAN_MIN_SIZE=4096`)
//! 4. command-line flags ([`ScanSettings::merge_scan_args`])
//!
//! The settings file is a flat key-value document:
//!
//! ```toml
//! strategy = "exact"
//! hash_algorithm = "sha256"
//! min_size = 1
//! include_media_types = ["image/*"]
//! action = "move"
//! destination_path = "/srv/dupes"
//! ```
//!
//! Unknown keys are ignored.

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::{ActionPolicy, DeleteMode};
use crate::cli::{ActionKind, ScanArgs};
use crate::duplicates::{FinderConfig, MediaTypeFilter, PrefilterConfig, DEFAULT_IO_THREADS};
use crate::error_sink::ErrorSink;
use crate::scanner::{HashAlgorithm, PerceptualAlgorithm, Strategy, WalkerConfig};

/// Environment variable prefix for settings overrides.
pub const ENV_PREFIX: &str = "DUPESCAN_";

/// Largest meaningful threshold for the 64-bit image hashes produced here.
pub const MAX_THRESHOLD: u32 = 64;

/// Errors raised while loading, validating or saving settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A layer could not be parsed or a value has the wrong type.
    #[error("invalid settings: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Settings are individually valid but inconsistent.
    #[error("invalid settings: {0}")]
    Invalid(String),

    /// Settings could not be encoded as TOML.
    #[error("failed to encode settings: {0}")]
    Encode(#[from] toml::ser::Error),

    /// Settings file could not be written.
    #[error("failed to write settings file {path}: {source}")]
    Io {
        /// Settings file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// No platform config directory and no explicit path.
    #[error("could not determine the settings directory")]
    NoConfigDir,
}

/// Effective scan settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Directory to scan
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_path: Option<PathBuf>,
    /// Destination directory for the move action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_path: Option<PathBuf>,
    /// Smallest size considered, inclusive
    pub min_size: u64,
    /// Largest size considered, inclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Media types to keep (empty keeps all)
    pub include_media_types: Vec<String>,
    /// Media types to drop
    pub exclude_media_types: Vec<String>,
    /// Fingerprint strategy
    pub strategy: Strategy,
    /// Content hash for the exact strategy
    pub hash_algorithm: HashAlgorithm,
    /// Image hash for the perceptual strategy
    pub perceptual_algorithm: PerceptualAlgorithm,
    /// Maximum Hamming distance; the algorithm's default when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perceptual_threshold: Option<u32>,
    /// Action for redundant members
    pub action: ActionKind,
    /// Deletion mode for the delete action
    pub delete_mode: DeleteMode,
    /// Also key buckets by modification time
    pub bucket_by_mtime: bool,
    /// Confirm exact groups byte for byte
    pub verify_content: bool,
    /// Fingerprinting threads
    pub io_threads: usize,
    /// Follow symbolic links
    pub follow_symlinks: bool,
    /// Skip hidden entries
    pub skip_hidden: bool,
    /// Gitignore-style ignore patterns
    pub ignore_patterns: Vec<String>,
    /// Error log file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<PathBuf>,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            root_path: None,
            destination_path: None,
            min_size: 1,
            max_size: None,
            include_media_types: Vec::new(),
            exclude_media_types: Vec::new(),
            strategy: Strategy::Exact,
            hash_algorithm: HashAlgorithm::default(),
            perceptual_algorithm: PerceptualAlgorithm::default(),
            perceptual_threshold: None,
            action: ActionKind::None,
            delete_mode: DeleteMode::Permanent,
            bucket_by_mtime: false,
            verify_content: false,
            io_threads: DEFAULT_IO_THREADS,
            follow_symlinks: false,
            skip_hidden: false,
            ignore_patterns: Vec::new(),
            error_log: None,
        }
    }
}

impl ScanSettings {
    /// Platform settings file (`~/.config/dupescan/config.toml` on Linux).
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "dupescan").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load defaults, the settings file at `path` (or the platform default)
    /// and the environment.
    ///
    /// A missing settings file is not an error.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Load`] if a layer is malformed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).or_else(Self::default_path);
        Self::figment(path.as_deref())
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load with an explicit settings file.
    ///
    /// # Errors
    ///
    /// See [`ScanSettings::load`].
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            log::debug!("Reading settings from {}", path.display());
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Apply command-line overrides. Unset flags leave settings unchanged.
    pub fn merge_scan_args(&mut self, args: &ScanArgs) {
        self.root_path = Some(args.path.clone());

        if let Some(strategy) = args.strategy {
            self.strategy = strategy;
        }
        if let Some(algorithm) = args.algorithm {
            self.hash_algorithm = algorithm;
        }
        if let Some(algorithm) = args.perceptual_algorithm {
            self.perceptual_algorithm = algorithm;
        }
        if let Some(threshold) = args.threshold {
            self.perceptual_threshold = Some(threshold);
        }
        if let Some(min) = args.min_size {
            self.min_size = min;
        }
        if let Some(max) = args.max_size {
            self.max_size = Some(max);
        }
        if !args.include_types.is_empty() {
            self.include_media_types = args.include_types.clone();
        }
        if !args.exclude_types.is_empty() {
            self.exclude_media_types = args.exclude_types.clone();
        }
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if let Some(action) = args.action {
            self.action = action;
        }
        if let Some(dest) = &args.destination {
            self.destination_path = Some(dest.clone());
        }
        if let Some(log) = &args.error_log {
            self.error_log = Some(log.clone());
        }
        if !args.ignore_patterns.is_empty() {
            self.ignore_patterns = args.ignore_patterns.clone();
        }

        self.bucket_by_mtime |= args.bucket_by_mtime;
        self.verify_content |= args.verify;
        self.follow_symlinks |= args.follow_symlinks;
        self.skip_hidden |= args.skip_hidden;
        if args.trash {
            self.delete_mode = DeleteMode::Trash;
        }
    }

    /// Threshold in effect for perceptual scans.
    #[must_use]
    pub fn effective_threshold(&self) -> u32 {
        self.perceptual_threshold
            .unwrap_or_else(|| self.perceptual_algorithm.default_threshold())
    }

    /// Reject inconsistent settings.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max) = self.max_size {
            if self.min_size > max {
                return Err(ConfigError::Invalid(format!(
                    "min_size ({}) is greater than max_size ({})",
                    self.min_size, max
                )));
            }
        }
        if self.action == ActionKind::Move && self.destination_path.is_none() {
            return Err(ConfigError::Invalid(
                "the move action needs a destination_path".to_string(),
            ));
        }
        if let Some(threshold) = self.perceptual_threshold {
            if threshold > MAX_THRESHOLD {
                return Err(ConfigError::Invalid(format!(
                    "perceptual_threshold {} exceeds {}",
                    threshold, MAX_THRESHOLD
                )));
            }
        }
        if self.io_threads == 0 {
            return Err(ConfigError::Invalid("io_threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build the finder configuration for these settings.
    #[must_use]
    pub fn to_finder_config(&self, error_sink: ErrorSink) -> FinderConfig {
        let prefilter = PrefilterConfig {
            min_size: self.min_size,
            max_size: self.max_size,
            media_types: MediaTypeFilter::new(
                self.include_media_types.clone(),
                self.exclude_media_types.clone(),
            ),
            bucket_by_mtime: self.bucket_by_mtime,
            ..PrefilterConfig::default()
        };

        FinderConfig::default()
            .with_strategy(self.strategy)
            .with_hash_algorithm(self.hash_algorithm)
            .with_perceptual_algorithm(self.perceptual_algorithm)
            .with_threshold(self.effective_threshold())
            .with_prefilter(prefilter)
            .with_walker_config(WalkerConfig::new(
                self.follow_symlinks,
                self.skip_hidden,
                self.ignore_patterns.clone(),
            ))
            .with_io_threads(self.io_threads)
            .with_verify_content(self.verify_content)
            .with_error_sink(error_sink)
    }

    /// The action policy, or `None` for a report-only run.
    #[must_use]
    pub fn action_policy(&self) -> Option<ActionPolicy> {
        match self.action {
            ActionKind::None => None,
            ActionKind::Delete => Some(ActionPolicy::Delete(self.delete_mode)),
            ActionKind::Move => self
                .destination_path
                .clone()
                .map(|destination| ActionPolicy::Move { destination }),
        }
    }

    /// Settings as a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Encode`] if encoding fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the settings to `path` (or the platform default), creating
    /// parent directories. Returns the path written.
    ///
    /// # Errors
    ///
    /// [`ConfigError::NoConfigDir`], [`ConfigError::Encode`] or
    /// [`ConfigError::Io`].
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(Self::default_path)
            .ok_or(ConfigError::NoConfigDir)?;
        let content = self.to_toml()?;
        let io_err = |source| ConfigError::Io {
            path: path.clone(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(&path, content).map_err(io_err)?;
        log::info!("Saved settings to {}", path.display());
        Ok(path)
    }
}
