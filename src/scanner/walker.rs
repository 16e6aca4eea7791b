//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing a directory
//! tree and producing one [`FileRecord`] per reachable regular file.
//!
//! # Ordering
//!
//! Children of every directory are sorted by file name before they are
//! yielded, so two walks over an unmodified tree produce records in the
//! same order. Downstream canonical-member selection depends on this.
//!
//! # Failure handling
//!
//! Unreadable entries, vanished files and symbolic-link cycles are yielded
//! as [`ScanError`] values; iteration continues past them.
//!
//! # Example
//!
//! ```no_run
//! use dupescan::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig {
//!     skip_hidden: true,
//!     ..Default::default()
//! };
//!
//! let walker = Walker::new(Path::new("/home/user/Downloads"), config);
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{AliasTracker, FileRecord, ScanError, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for cooperative termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag.
    ///
    /// When the flag is set to `true`, the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build gitignore matcher from config patterns and a root .gitignore file.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        let gitignore_path = self.root.join(".gitignore");
        if gitignore_path.exists() {
            if let Some(e) = builder.add(&gitignore_path) {
                log::warn!(
                    "Failed to load .gitignore from {}: {}",
                    gitignore_path.display(),
                    e
                );
            } else {
                log::debug!("Loaded .gitignore from {}", gitignore_path.display());
            }
        }

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    fn should_ignore(&self, path: &Path, is_dir: bool, gitignore: &Option<Gitignore>) -> bool {
        let Some(gi) = gitignore else {
            return false;
        };
        let relative_path = path.strip_prefix(&self.root).unwrap_or(path);
        let path_str = relative_path.to_string_lossy();
        let normalized_path = if cfg!(windows) {
            path_str.replace('\\', "/")
        } else {
            path_str.into_owned()
        };

        gi.matched_path_or_any_parents(normalized_path, is_dir)
            .is_ignore()
    }

    /// Walk the directory tree, yielding file records.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. The sequence is finite: with `follow_symlinks` enabled,
    /// links that lead back into an ancestor are reported as
    /// [`ScanError::SymlinkCycle`] and not descended into, and a file
    /// reachable under several paths is yielded once, under the first.
    pub fn walk(&self) -> impl Iterator<Item = Result<FileRecord, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let mut aliases = AliasTracker::new();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| {
                if self.is_shutdown_requested() {
                    log::debug!("Walker: Shutdown requested, stopping iteration");
                    false
                } else {
                    true
                }
            })
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if entry.file_type().is_dir() {
                        if let Some(err) = entry.read_children_error {
                            return Some(Err(self.handle_jwalk_error(path, err)));
                        }
                        return None;
                    }

                    if self.should_ignore(&path, false, &gitignore) {
                        log::trace!("Ignoring file: {}", path.display());
                        return None;
                    }

                    if entry.file_type().is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = if self.config.follow_symlinks {
                        std::fs::metadata(&path)
                    } else {
                        std::fs::symlink_metadata(&path)
                    };

                    match metadata {
                        Ok(m) if m.is_file() => {
                            if self.config.follow_symlinks {
                                match aliases.alias_of(&path) {
                                    Ok(Some(first)) => {
                                        log::debug!(
                                            "Skipping {}: same file as {}",
                                            path.display(),
                                            first.display()
                                        );
                                        return None;
                                    }
                                    Ok(None) => {}
                                    Err(e) => return Some(Err(Self::handle_io_error(&path, e))),
                                }
                            }
                            Some(Ok(Self::make_record(path, &m)))
                        }
                        Ok(_) => None,
                        Err(e) => Some(Err(Self::handle_io_error(&path, e))),
                    }
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, e)))
                }
            })
    }

    fn make_record(path: PathBuf, metadata: &Metadata) -> FileRecord {
        let declared_media_type = mime_guess::from_path(&path)
            .first_raw()
            .map(str::to_string);
        FileRecord {
            size_bytes: metadata.len(),
            modified_at: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            declared_media_type,
            path,
        }
    }

    fn handle_io_error(path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        if error.loop_ancestor().is_some() {
            log::warn!("Symbolic link cycle at {}", path.display());
            return ScanError::SymlinkCycle(path);
        }
        if let Some(kind) = error.io_error().map(std::io::Error::kind) {
            return Self::handle_io_error(&path, std::io::Error::new(kind, error.to_string()));
        }
        log::warn!("Walker error for {}: {}", path.display(), error);
        ScanError::Io {
            path,
            source: std::io::Error::other(error.to_string()),
        }
    }
}
