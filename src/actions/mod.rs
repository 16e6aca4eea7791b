//! Actions applied to redundant members of duplicate groups.
//!
//! - [`delete`] - system trash or permanent removal, with a pre-action
//!   check that the file still matches what the scan saw
//! - [`relocate`] - moves into a destination directory with collision-free
//!   naming
//! - [`executor`] - applies an [`ActionPolicy`] to every redundant member
//!   in parallel and reports one [`ActionResult`] each
//!
//! The canonical member of a group is never touched.
//!
//! ```no_run
//! use dupescan::actions::{ActionExecutor, ActionPolicy, DeleteMode};
//!
//! let executor = ActionExecutor::new(ActionPolicy::Delete(DeleteMode::Trash));
//! let report = executor.execute(&[]).unwrap();
//! println!("{}", report.summary());
//! ```

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod delete;
pub mod executor;
pub mod relocate;

pub use delete::{delete_file, delete_to_trash, permanent_delete, DeleteMode, FileSnapshot};
pub use executor::{ActionExecutor, ActionOutcome, ActionPolicy, ActionReport, ActionResult};
pub use relocate::{collision_free_name, move_file, DestinationAllocator};

/// Failure of an action on one file, or of the action pass as a whole.
#[derive(Debug, Error)]
pub enum ActionError {
    /// File was not found (may have been deleted or moved).
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// Permission denied when touching the file.
    #[error("permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// File size or modification time changed since the scan.
    #[error("file modified since scan: {0}")]
    Modified(PathBuf),

    /// The member resolves to the same file as its group's canonical
    /// member, so acting on it would destroy the file being kept.
    #[error("{path} is the same file as {canonical}")]
    SameFile {
        /// Redundant member
        path: PathBuf,
        /// Canonical member it aliases
        canonical: PathBuf,
    },

    /// Trash operation failed.
    #[error("trash operation failed for {path}: {message}")]
    TrashFailed {
        /// File that could not be trashed
        path: PathBuf,
        /// Platform message
        message: String,
    },

    /// Move into the destination failed.
    #[error("failed to move {path} to {destination}: {source}")]
    MoveFailed {
        /// File being moved
        path: PathBuf,
        /// Chosen destination path
        destination: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The destination directory is missing and cannot be created, or is
    /// not a directory. Fatal: reported before any file is touched.
    #[error("destination unusable {path}: {message}")]
    DestinationUnusable {
        /// Destination directory
        path: PathBuf,
        /// Reason
        message: String,
    },

    /// Other I/O error.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl ActionError {
    /// Classify an I/O error raised while touching `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }

    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::NotFound(p) | Self::PermissionDenied(p) | Self::Modified(p) => p,
            Self::SameFile { path, .. }
            | Self::TrashFailed { path, .. }
            | Self::MoveFailed { path, .. }
            | Self::DestinationUnusable { path, .. }
            | Self::Io { path, .. } => path,
        }
    }
}
