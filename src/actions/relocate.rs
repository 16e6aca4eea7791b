//! Moving redundant members into a destination directory.
//!
//! Name collisions are resolved by inserting `_1`, `_2`, ... before the
//! extension (`a.txt` → `a_1.txt`) until a free name is found. A
//! [`DestinationAllocator`] serializes that choice for one destination
//! directory, so concurrent moves never pick the same name and existing
//! files are never overwritten.

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::ActionError;

/// Candidate name for `file_name` at collision counter `n` (0 = unchanged).
///
/// ```
/// use dupescan::actions::collision_free_name;
/// use std::ffi::OsStr;
///
/// assert_eq!(collision_free_name(OsStr::new("a.txt"), 0), "a.txt");
/// assert_eq!(collision_free_name(OsStr::new("a.txt"), 2), "a_2.txt");
/// assert_eq!(collision_free_name(OsStr::new("README"), 1), "README_1");
/// ```
#[must_use]
pub fn collision_free_name(file_name: &OsStr, n: usize) -> String {
    let name = file_name.to_string_lossy();
    if n == 0 {
        return name.into_owned();
    }
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(ext)) => {
            format!("{}_{}.{}", stem.to_string_lossy(), n, ext.to_string_lossy())
        }
        _ => format!("{}_{}", name, n),
    }
}

/// Hands out unique file names within one destination directory.
#[derive(Debug)]
pub struct DestinationAllocator {
    dir: PathBuf,
    reserved: Mutex<HashSet<PathBuf>>,
}

impl DestinationAllocator {
    /// Ensure `dir` exists (creating it if needed) and is a directory.
    ///
    /// # Errors
    ///
    /// [`ActionError::DestinationUnusable`] if it cannot be created or is
    /// not a directory.
    pub fn prepare(dir: &Path) -> Result<Self, ActionError> {
        let unusable = |message: String| ActionError::DestinationUnusable {
            path: dir.to_path_buf(),
            message,
        };

        if dir.exists() {
            if !dir.is_dir() {
                return Err(unusable("not a directory".to_string()));
            }
        } else {
            fs::create_dir_all(dir).map_err(|e| unusable(e.to_string()))?;
            log::info!("Created destination directory {}", dir.display());
        }

        Ok(Self {
            dir: dir.to_path_buf(),
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// The destination directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn reserved(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        self.reserved.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Reserve a destination path for a file called `file_name`.
    ///
    /// The returned path neither exists on disk nor has been handed out
    /// before by this allocator.
    pub fn reserve(&self, file_name: &OsStr) -> PathBuf {
        let mut reserved = self.reserved();
        let mut n = 0;
        loop {
            let candidate = self.dir.join(collision_free_name(file_name, n));
            if !reserved.contains(&candidate) && fs::symlink_metadata(&candidate).is_err() {
                reserved.insert(candidate.clone());
                if n > 0 {
                    log::debug!(
                        "Destination name collision for {}; using {}",
                        file_name.to_string_lossy(),
                        candidate.display()
                    );
                }
                return candidate;
            }
            n += 1;
        }
    }
}

/// Move `source` to `destination` without ever replacing an existing
/// file there.
///
/// The move links `destination` to the source and then unlinks the
/// source, so a file that appears at `destination` after it was reserved
/// makes the move fail instead of being overwritten. Where a link is not
/// possible (different filesystem, no link support) it falls back to an
/// exclusive-create copy followed by removal.
///
/// # Errors
///
/// [`ActionError::NotFound`] / [`ActionError::PermissionDenied`] for the
/// source, [`ActionError::MoveFailed`] otherwise, including when
/// `destination` already exists. A failed move leaves the source in place.
pub fn move_file(source: &Path, destination: &Path) -> Result<(), ActionError> {
    let failed = |e: io::Error| ActionError::MoveFailed {
        path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source: e,
    };

    match fs::hard_link(source, destination) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(destination);
                return Err(ActionError::from_io(source, e));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(failed(e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ActionError::from_io(source, e));
        }
        Err(e) => {
            log::debug!(
                "Linking {} failed ({}); copying instead",
                source.display(),
                e
            );
            copy_no_clobber(source, destination).map_err(failed)?;
            if let Err(e) = fs::remove_file(source) {
                let _ = fs::remove_file(destination);
                return Err(ActionError::from_io(source, e));
            }
        }
    }

    log::info!("Moved {} -> {}", source.display(), destination.display());
    Ok(())
}

fn copy_no_clobber(source: &Path, destination: &Path) -> io::Result<()> {
    let mut reader = fs::File::open(source)?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)?;
    let copied = io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    if copied.is_err() {
        let _ = fs::remove_file(destination);
    }
    copied
}
