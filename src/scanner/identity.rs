//! Detection of paths that name the same file.
//!
//! # Overview
//!
//! With symlink following enabled, a link and its target (or a file seen
//! both directly and through a linked directory) are two paths to one file.
//! They are not duplicates: acting on the "redundant" path would destroy
//! the canonical one.
//!
//! Identity is the fully resolved path, so hard links, which resolve to
//! distinct paths, stay separate files.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::identity::AliasTracker;
//! use std::path::Path;
//!
//! let mut tracker = AliasTracker::new();
//! for path in [Path::new("real.txt"), Path::new("link.txt")] {
//!     match tracker.alias_of(path) {
//!         Ok(Some(first)) => println!("{} is {}", path.display(), first.display()),
//!         Ok(None) => println!("new file: {}", path.display()),
//!         Err(e) => eprintln!("{}: {}", path.display(), e),
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Fully resolved location of `path`, following every symlink.
///
/// # Errors
///
/// Any error from [`std::fs::canonicalize`].
pub fn resolve(path: &Path) -> io::Result<PathBuf> {
    fs::canonicalize(path)
}

/// Whether `a` and `b` resolve to the same file.
///
/// # Errors
///
/// Fails if either path cannot be resolved.
pub fn same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(resolve(a)? == resolve(b)?)
}

/// Remembers resolved paths to report later aliases of a seen file.
///
/// Not thread-safe; the walker owns one per walk.
#[derive(Debug, Default)]
pub struct AliasTracker {
    /// Resolved path -> first path it was seen under
    seen: HashMap<PathBuf, PathBuf>,
}

impl AliasTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// If `path` resolves to a file already seen, return the path it was
    /// first seen under. Otherwise record it and return `None`.
    ///
    /// # Errors
    ///
    /// Fails if `path` cannot be resolved.
    pub fn alias_of(&mut self, path: &Path) -> io::Result<Option<PathBuf>> {
        let resolved = resolve(path)?;
        if let Some(first) = self.seen.get(&resolved) {
            return Ok(Some(first.clone()));
        }
        self.seen.insert(resolved, path.to_path_buf());
        Ok(None)
    }

    /// Number of distinct files seen.
    #[must_use]
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}
