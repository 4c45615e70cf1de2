//! Whole-document persistence of [`DeploymentState`] with a git audit log.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::DeploymentState;
use crate::{git, Error, Result};

/// Commit message used when the first state document is written
pub const FRESH_STATE_MESSAGE: &str = "Added new state file";

/// Durable store for the state document.
///
/// Every mutation is a full read-modify-write followed by a commit in the
/// directory holding the document. There is a single writer per process;
/// concurrent invocations against the same directory surface as git errors.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory that is committed after each mutation
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read and parse the document. Anything unreadable is state corruption.
    pub fn load(&self) -> Result<DeploymentState> {
        let data = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::state_corruption(&self.path, format!("failed to read: {e}")))?;
        serde_yaml::from_str(&data)
            .map_err(|e| Error::state_corruption(&self.path, e.to_string()))
    }

    /// Replace the document on disk. Written to a sibling file first and
    /// renamed, so readers never see a half-written document.
    pub fn save(&self, state: &DeploymentState) -> Result<()> {
        let data = serde_yaml::to_string(state)?;
        std::fs::create_dir_all(self.dir())?;
        let tmp = self.path.with_extension("yml.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Commit the state directory. Returns false when nothing changed.
    pub fn commit(&self, message: &str) -> Result<bool> {
        Ok(git::add_all_and_commit(self.dir(), message)?.is_some())
    }

    /// Read-modify-write-commit. If `mutate` fails nothing is written.
    pub fn update<F>(&self, message: &str, mutate: F) -> Result<DeploymentState>
    where
        F: FnOnce(&mut DeploymentState) -> Result<()>,
    {
        let mut state = self.load()?;
        mutate(&mut state)?;
        self.save(&state)?;
        self.commit(message)?;
        debug!(path = %self.path.display(), message, "State updated");
        Ok(state)
    }

    /// Create the fresh document if absent. Returns true when it was created.
    pub fn init_fresh(&self) -> Result<bool> {
        if self.exists() {
            return Ok(false);
        }
        info!(path = %self.path.display(), "No state file present, creating empty state file");
        self.save(&DeploymentState::fresh())?;
        self.commit(FRESH_STATE_MESSAGE)?;
        Ok(true)
    }

    /// Delete the document and commit the removal
    pub fn remove(&self, message: &str) -> Result<()> {
        if self.exists() {
            std::fs::remove_file(&self.path)?;
            self.commit(message)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClusterRef, Extension};
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> StateStore {
        StateStore::new(dir.path().join("deployment-state").join("state.yml"))
    }

    #[test]
    fn init_creates_fresh_state_and_commits() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        assert!(store.init_fresh().unwrap());
        assert!(!store.init_fresh().unwrap());
        assert_eq!(store.load().unwrap(), DeploymentState::fresh());

        let repo = git2::Repository::open(store.dir()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(head.message(), Some(FRESH_STATE_MESSAGE));
    }

    #[test]
    fn update_is_read_modify_write_commit() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_fresh().unwrap();

        store
            .update("Successful Shared Cluster deployment [shared]", |s| {
                s.record_cluster_deployed(&ClusterRef::SharedServices, "shared", "1.4.0");
                Ok(())
            })
            .unwrap();

        let state = store.load().unwrap();
        assert!(state.shared_services.deployed);
        assert_eq!(state.shared_services.version, "1.4.0");

        let repo = git2::Repository::open(store.dir()).unwrap();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        assert_eq!(
            head.message(),
            Some("Successful Shared Cluster deployment [shared]")
        );
        assert_eq!(head.parent_count(), 1);
    }

    #[test]
    fn failed_mutation_leaves_document_untouched() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_fresh().unwrap();
        let before = std::fs::read(store.path()).unwrap();

        let result = store.update("never", |s| {
            s.record_extension_installed(&ClusterRef::SharedServices, Extension::Harbor);
            Err(Error::precondition("harbor", "boom"))
        });

        assert!(result.is_err());
        assert_eq!(std::fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn garbage_is_state_corruption() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.path(), "avi: [not, a, map").unwrap();

        assert!(matches!(store.load(), Err(Error::StateCorruption { .. })));
    }

    #[test]
    fn missing_file_is_state_corruption() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            store(&dir).load(),
            Err(Error::StateCorruption { .. })
        ));
    }

    #[test]
    fn remove_commits_deletion() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.init_fresh().unwrap();
        store.remove("Delete state file for testing").unwrap();
        assert!(!store.exists());
    }
}
