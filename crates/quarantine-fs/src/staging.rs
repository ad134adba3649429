use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tempfile::TempDir;
use tracing::{debug, warn};

use crate::{Error, Result};

const DEFAULT_ROOT_NAME: &str = "quarantine-staging";
const RANDOM_SUFFIX_LEN: usize = 10;
const MAX_NAME_ATTEMPTS: u32 = 64;

static SUBDIR_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Outcome of removing a staging directory.
///
/// Removal never returns an error: a failure is reported here and logged,
/// so that it cannot mask the primary extraction outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Removal {
    Removed,
    AlreadyAbsent,
    Failed(String),
}

/// Dedicated temporary root under which per-request staging directories live.
#[derive(Clone, Debug)]
pub struct StagingRoot {
    path: PathBuf,
}

impl Default for StagingRoot {
    fn default() -> Self { Self::system_default() }
}

impl StagingRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<system temp dir>/quarantine-staging`
    pub fn system_default() -> Self {
        Self::new(std::env::temp_dir().join(DEFAULT_ROOT_NAME))
    }

    pub fn path(&self) -> &Path { &self.path }

    /// Allocate a fresh, collision-free staging directory.
    ///
    /// The name is `extract-<unix millis>-<random>`; the directory is created
    /// exclusively, so two requests can never share one.
    pub fn allocate(&self) -> Result<StagingDir> {
        std::fs::create_dir_all(&self.path).map_err(|e| Error::CreateDir {
            path: self.path.clone(),
            source: e,
        })?;

        let prefix = format!("extract-{}-", unix_millis());
        let guard = tempfile::Builder::new()
            .prefix(&prefix)
            .rand_bytes(RANDOM_SUFFIX_LEN)
            .tempdir_in(&self.path)
            .map_err(|e| Error::Allocate {
                root: self.path.clone(),
                source: e,
            })?;

        let path = guard.path().to_path_buf();
        debug!(path = %path.display(), "allocated staging directory");

        Ok(StagingDir {
            path,
            guard: Some(guard),
        })
    }
}

/// A request-scoped staging directory.
///
/// Call [`StagingDir::cleanup`] once the extracted content has been consumed.
/// Dropping the value performs the same cleanup as a backstop.
#[derive(Debug)]
pub struct StagingDir {
    path: PathBuf,
    guard: Option<TempDir>,
}

impl StagingDir {
    pub fn path(&self) -> &Path { &self.path }

    /// Whether `cleanup` has already run.
    pub fn is_released(&self) -> bool { self.guard.is_none() }

    /// Recursively delete the directory. Idempotent.
    pub fn cleanup(&mut self) -> Removal {
        match self.guard.take() {
            Some(guard) => match guard.close() {
                Ok(()) => {
                    debug!(path = %self.path.display(), "removed staging directory");
                    Removal::Removed
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::AlreadyAbsent,
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "failed to remove staging directory");
                    Removal::Failed(e.to_string())
                }
            },
            // A previous attempt may have failed half-way; retry on the path.
            None => remove_staging_dir(&self.path),
        }
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if self.guard.is_some() {
            self.cleanup();
        }
    }
}

/// Idempotent recursive delete for callers holding only a path.
pub fn remove_staging_dir(path: &Path) -> Removal {
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed staging directory");
            Removal::Removed
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Removal::AlreadyAbsent,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to remove staging directory");
            Removal::Failed(e.to_string())
        }
    }
}

/// Create `<parent>/<prefix><millis>-<n>` exclusively.
pub fn create_unique_dir(parent: &Path, prefix: &str) -> Result<PathBuf> {
    for _ in 0..MAX_NAME_ATTEMPTS {
        let n = SUBDIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let candidate = parent.join(format!("{prefix}{}-{n}", unix_millis()));
        match std::fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(Error::CreateDir {
                    path: candidate,
                    source: e,
                });
            }
        }
    }
    Err(Error::NameExhausted {
        parent: parent.to_path_buf(),
        attempts: MAX_NAME_ATTEMPTS,
    })
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn allocate_creates_named_directory() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::new(dir.path().join("root"));
        let staging = root.allocate().unwrap();

        assert!(staging.path().is_dir());
        assert!(staging.path().starts_with(root.path()));
        let name = staging.path().file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("extract-"));
    }

    #[test]
    fn allocations_never_collide() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::new(dir.path());
        let a = root.allocate().unwrap();
        let b = root.allocate().unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn cleanup_is_idempotent() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::new(dir.path());
        let mut staging = root.allocate().unwrap();
        std::fs::write(staging.path().join("a.bin"), b"data").unwrap();

        assert_eq!(staging.cleanup(), Removal::Removed);
        assert!(!staging.path().exists());
        assert!(staging.is_released());
        assert_eq!(staging.cleanup(), Removal::AlreadyAbsent);
    }

    #[test]
    fn cleanup_after_external_removal() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::new(dir.path());
        let mut staging = root.allocate().unwrap();
        std::fs::remove_dir_all(staging.path()).unwrap();

        assert_eq!(staging.cleanup(), Removal::AlreadyAbsent);
    }

    #[test]
    fn drop_removes_directory() {
        let dir = tempdir().unwrap();
        let root = StagingRoot::new(dir.path());
        let path = {
            let staging = root.allocate().unwrap();
            staging.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("never-created");
        assert_eq!(remove_staging_dir(&missing), Removal::AlreadyAbsent);
    }

    #[test]
    fn unique_subdirs_are_distinct() {
        let dir = tempdir().unwrap();
        let a = create_unique_dir(dir.path(), "native-").unwrap();
        let b = create_unique_dir(dir.path(), "native-").unwrap();
        assert_ne!(a, b);
        assert!(a.is_dir() && b.is_dir());
    }
}
