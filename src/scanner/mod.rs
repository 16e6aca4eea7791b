//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk, in a stable (sorted) traversal order
//! - Exact content hashing with a selectable algorithm
//! - Perceptual image hashing for near-duplicate detection
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`hasher`]: Streaming content hashing (exact strategy)
//! - [`perceptual`]: Image decoding and perceptual hashing
//! - [`fingerprint`]: Strategy selection and the [`Fingerprint`] value
//! - [`identity`]: Paths that resolve to the same file
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => println!("{}: {} bytes", file.path.display(), file.size_bytes),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod fingerprint;
pub mod hasher;
pub mod identity;
pub mod perceptual;
pub mod walker;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

pub use fingerprint::{Fingerprint, FingerprintEngine, Strategy};
pub use hasher::{files_identical, HashAlgorithm, Hasher, BLOCK_SIZE};
pub use identity::AliasTracker;
pub use perceptual::{PerceptualAlgorithm, PerceptualHasher, SimilarityIndex};
pub use walker::Walker;

/// Metadata for a discovered file.
///
/// Produced once by the [`Walker`] per regular file and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size_bytes: u64,
    /// Last modification time
    pub modified_at: SystemTime,
    /// MIME type guessed from the file extension, if any
    pub declared_media_type: Option<String>,
}

impl FileRecord {
    /// Create a new record without a declared media type.
    #[must_use]
    pub fn new(path: PathBuf, size_bytes: u64, modified_at: SystemTime) -> Self {
        Self {
            path,
            size_bytes,
            modified_at,
            declared_media_type: None,
        }
    }

    /// Attach a declared media type.
    #[must_use]
    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.declared_media_type = Some(media_type.into());
        self
    }

    /// Whether the declared media type is an image type.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.declared_media_type
            .as_deref()
            .is_some_and(|m| m.starts_with("image/"))
    }

    /// File name component as a lossy string.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Configuration for directory walking.
///
/// Size and media-type filters belong to the pre-filter, not the walker;
/// the walker only decides which entries are reachable regular files.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Cycles are detected and reported rather than followed.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

impl WalkerConfig {
    /// Create a new configuration.
    #[must_use]
    pub fn new(follow_symlinks: bool, skip_hidden: bool, ignore_patterns: Vec<String>) -> Self {
        Self {
            follow_symlinks,
            skip_hidden,
            ignore_patterns,
        }
    }
}

/// Errors that can occur during directory enumeration.
///
/// None of these are fatal to a scan: the entry is skipped and the error
/// is recorded in the error sink.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The entry disappeared between listing and inspection.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A symbolic link points back into one of its own ancestors.
    #[error("Symbolic link cycle: {0}")]
    SymlinkCycle(PathBuf),

    /// An I/O error occurred while accessing an entry.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::SymlinkCycle(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
///
/// A file that fails here is excluded from grouping.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The file could not be decoded as an image.
    #[error("Failed to decode image {path}: {message}")]
    Decode {
        /// Path of the undecodable file
        path: PathBuf,
        /// Decoder message
        message: String,
    },

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl HashError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) => p,
            Self::Decode { path, .. } | Self::Io { path, .. } => path,
        }
    }

    /// Classify an I/O error raised while reading `path`.
    #[must_use]
    pub fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
