//! File deletion: system trash (recoverable) or permanent removal.
//!
//! Before a redundant member is touched, its [`FileSnapshot`] from the scan
//! is compared with the file on disk. A file whose size or modification
//! time changed is left alone and reported as [`ActionError::Modified`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::ActionError;
use crate::scanner::FileRecord;

/// How redundant members are deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteMode {
    /// Remove the file immediately.
    #[default]
    Permanent,
    /// Move the file to the platform trash.
    Trash,
}

impl fmt::Display for DeleteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permanent => f.write_str("permanent"),
            Self::Trash => f.write_str("trash"),
        }
    }
}

impl FromStr for DeleteMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permanent" => Ok(Self::Permanent),
            "trash" => Ok(Self::Trash),
            other => Err(format!(
                "Unknown delete mode '{}' (expected permanent or trash)",
                other
            )),
        }
    }
}

/// Size and modification time of a file at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSnapshot {
    /// Path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Last modification time.
    pub mtime: Option<SystemTime>,
}

impl FileSnapshot {
    /// Snapshot taken from a scanned record.
    #[must_use]
    pub fn from_record(record: &FileRecord) -> Self {
        Self {
            path: record.path.clone(),
            size: record.size_bytes,
            mtime: Some(record.modified_at),
        }
    }

    /// Snapshot of the file's current state on disk.
    ///
    /// # Errors
    ///
    /// Returns error if the file doesn't exist or can't be accessed.
    pub fn capture(path: &Path) -> Result<Self, ActionError> {
        let metadata = fs::metadata(path).map_err(|e| ActionError::from_io(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
            size: metadata.len(),
            mtime: metadata.modified().ok(),
        })
    }

    /// Check that the file on disk still matches this snapshot.
    ///
    /// # Errors
    ///
    /// [`ActionError::Modified`] if size or mtime changed, or an I/O flavoured
    /// error if the file is gone or unreadable.
    pub fn verify(&self) -> Result<(), ActionError> {
        let current = Self::capture(&self.path)?;

        if let (Some(orig), Some(curr)) = (self.mtime, current.mtime) {
            if orig != curr {
                log::warn!("File modified since scan: {} (mtime changed)", self.path.display());
                return Err(ActionError::Modified(self.path.clone()));
            }
        }

        if self.size != current.size {
            log::warn!(
                "File modified since scan: {} (size changed from {} to {})",
                self.path.display(),
                self.size,
                current.size
            );
            return Err(ActionError::Modified(self.path.clone()));
        }

        Ok(())
    }
}

/// Move a file to the system trash. Returns the bytes freed.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if it cannot be accessed
/// - `TrashFailed` if the trash operation fails
pub fn delete_to_trash(path: &Path) -> Result<u64, ActionError> {
    let size = fs::metadata(path)
        .map_err(|e| ActionError::from_io(path, e))?
        .len();

    trash::delete(path).map_err(|e| ActionError::TrashFailed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    log::info!("Moved to trash: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Permanently delete a file. Returns the bytes freed.
///
/// # Errors
///
/// - `NotFound` if the file doesn't exist
/// - `PermissionDenied` if deletion is not allowed
/// - `Io` for any other failure
pub fn permanent_delete(path: &Path) -> Result<u64, ActionError> {
    let size = fs::metadata(path)
        .map_err(|e| ActionError::from_io(path, e))?
        .len();

    fs::remove_file(path).map_err(|e| ActionError::from_io(path, e))?;

    log::info!("Permanently deleted: {} ({} bytes)", path.display(), size);
    Ok(size)
}

/// Delete a file in the given mode.
///
/// # Errors
///
/// See [`delete_to_trash`] and [`permanent_delete`].
pub fn delete_file(path: &Path, mode: DeleteMode) -> Result<u64, ActionError> {
    match mode {
        DeleteMode::Permanent => permanent_delete(path),
        DeleteMode::Trash => delete_to_trash(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_delete_mode_parse() {
        assert_eq!("trash".parse(), Ok(DeleteMode::Trash));
        assert_eq!("Permanent".parse(), Ok(DeleteMode::Permanent));
        assert!("shred".parse::<DeleteMode>().is_err());
        assert_eq!(DeleteMode::default(), DeleteMode::Permanent);
    }

    #[test]
    fn test_snapshot_verify_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = create(&dir, "a.txt", b"content");
        let snapshot = FileSnapshot::capture(&path).unwrap();
        assert_eq!(snapshot.size, 7);
        assert!(snapshot.verify().is_ok());
    }

    #[test]
    fn test_snapshot_detects_size_change() {
        let dir = TempDir::new().unwrap();
        let path = create(&dir, "a.txt", b"content");
        let mut snapshot = FileSnapshot::capture(&path).unwrap();
        snapshot.mtime = None;
        fs::write(&path, b"longer content").unwrap();
        assert!(matches!(snapshot.verify(), Err(ActionError::Modified(_))));
    }

    #[test]
    fn test_snapshot_detects_mtime_change() {
        let dir = TempDir::new().unwrap();
        let path = create(&dir, "a.txt", b"content");
        let snapshot = FileSnapshot::capture(&path).unwrap();
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(1_000_000, 0)).unwrap();
        assert!(matches!(snapshot.verify(), Err(ActionError::Modified(_))));
    }

    #[test]
    fn test_snapshot_verify_deleted() {
        let dir = TempDir::new().unwrap();
        let path = create(&dir, "a.txt", b"content");
        let snapshot = FileSnapshot::capture(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert!(matches!(snapshot.verify(), Err(ActionError::NotFound(_))));
    }

    #[test]
    fn test_permanent_delete() {
        let dir = TempDir::new().unwrap();
        let path = create(&dir, "gone.txt", b"12345");
        assert_eq!(permanent_delete(&path).unwrap(), 5);
        assert!(!path.exists());
        assert!(matches!(
            permanent_delete(&path),
            Err(ActionError::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_to_trash_not_found() {
        let result = delete_to_trash(Path::new("/nonexistent/dupescan/file.txt"));
        assert!(matches!(result, Err(ActionError::NotFound(_))));
    }
}
