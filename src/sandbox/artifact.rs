use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

/// Process-wide scratch directory shared by all requests
///
/// Every request works under its own uniquely named subdirectory, so the
/// store needs no locking.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates the scratch root if it does not exist yet
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create scratch directory {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocates a fresh directory for one request
    pub fn allocate(&self) -> Result<ArtifactHandle> {
        let id = new_artifact_id();
        let dir = self.root.join(&id);
        // create_dir (not create_dir_all) so an id collision fails loudly
        fs::create_dir(&dir)
            .with_context(|| format!("Failed to create artifact directory for {id}"))?;
        log::debug!("Allocated artifact {id}");

        Ok(ArtifactHandle {
            id,
            dir,
            released: false,
        })
    }
}

/// `<UTC timestamp>-<random suffix>`, unique across concurrent requests
fn new_artifact_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", Utc::now().format("%Y%m%d%H%M%S%3f"), &random[..12])
}

/// Files belonging to a single request
///
/// Owned by exactly one request. The directory is removed by [`cleanup`]
/// and, should the request unwind or be cancelled first, by `Drop`.
///
/// [`cleanup`]: ArtifactHandle::cleanup
#[derive(Debug)]
pub struct ArtifactHandle {
    id: String,
    dir: PathBuf,
    released: bool,
}

impl ArtifactHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Directory holding the source and every build output
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persists the source under `file_name` inside the artifact directory
    pub fn write_source(&self, file_name: &str, text: &str) -> Result<PathBuf> {
        let path = self.dir.join(file_name);
        fs::write(&path, text)
            .with_context(|| format!("Failed to write source for artifact {}", self.id))?;
        Ok(path)
    }

    /// Removes the source and all build outputs. Failures are logged only.
    pub fn cleanup(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => log::debug!("Removed artifact {}", self.id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove artifact {}: {e}", self.id),
        }
    }
}

impl Drop for ArtifactHandle {
    fn drop(&mut self) {
        self.release();
    }
}
