//! Scratch storage for intermediate artifacts
//!
//! Each export owns one scratch directory. Artifact names carry a counter so
//! no two jobs ever share a file, and the whole directory goes away when the
//! [`ScratchSpace`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::CutlistResult;

const SCRATCH_PREFIX: &str = "cutlist-";

/// Per-export scratch directory
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
    counter: AtomicUsize,
}

impl ScratchSpace {
    /// Create a fresh directory under `root`
    pub fn new(root: &Path) -> CutlistResult<Self> {
        fs::create_dir_all(root)?;
        let prefix = format!(
            "{}{}-",
            SCRATCH_PREFIX,
            chrono::Local::now().format("%Y%m%d-%H%M%S")
        );
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?;
        debug!("Scratch directory {}", dir.path().display());
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Unique path for a new artifact, e.g. `part-0007.mp4`
    pub fn artifact(&self, label: &str, extension: &str) -> PathBuf {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .path()
            .join(format!("{}-{:04}.{}", label, n, extension.trim_start_matches('.')))
    }
}

/// Best-effort removal of one artifact. Failures are logged only.
pub fn remove_artifact(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

/// Best-effort removal of several artifacts
pub fn remove_artifacts<'a>(paths: impl IntoIterator<Item = &'a PathBuf>) {
    for path in paths {
        remove_artifact(path);
    }
}

/// Delete scratch directories under `root` left behind by killed runs.
///
/// Returns how many were removed.
pub fn sweep_stale(root: &Path, max_age: Duration) -> usize {
    let now = SystemTime::now();
    let mut removed = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
    {
        let is_scratch = entry.file_type().is_dir()
            && entry
                .file_name()
                .to_str()
                .map_or(false, |name| name.starts_with(SCRATCH_PREFIX));
        if !is_scratch {
            continue;
        }

        let age = entry
            .metadata()
            .ok()
            .and_then(|meta| meta.modified().ok())
            .and_then(|modified| now.duration_since(modified).ok());
        if age.map_or(true, |age| age < max_age) {
            continue;
        }

        match fs::remove_dir_all(entry.path()) {
            Ok(()) => {
                debug!("Swept {}", entry.path().display());
                removed += 1;
            }
            Err(e) => warn!("Could not sweep {}: {}", entry.path().display(), e),
        }
    }

    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifacts_are_unique() {
        let root = tempfile::tempdir().unwrap();
        let scratch = ScratchSpace::new(root.path()).unwrap();
        let a = scratch.artifact("part", "mp4");
        let b = scratch.artifact("part", ".mp4");
        assert_ne!(a, b);
        assert!(a.starts_with(scratch.path()));
        assert_eq!(b.extension().unwrap(), "mp4");
    }

    #[test]
    fn test_scratch_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let scratch = ScratchSpace::new(root.path()).unwrap();
            fs::write(scratch.artifact("part", "mp4"), b"x").unwrap();
            scratch.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_missing_artifact_is_quiet() {
        remove_artifact(Path::new("/nonexistent/cutlist/part.mp4"));
    }

    #[test]
    fn test_sweep_stale_only_touches_scratch_dirs() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("cutlist-old")).unwrap();
        fs::create_dir(root.path().join("keep-me")).unwrap();

        assert_eq!(sweep_stale(root.path(), Duration::from_secs(3600)), 0);
        assert_eq!(sweep_stale(root.path(), Duration::ZERO), 1);
        assert!(!root.path().join("cutlist-old").exists());
        assert!(root.path().join("keep-me").exists());
    }
}
