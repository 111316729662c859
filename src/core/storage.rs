//! Durable run artifacts, staged during a run and finalized only on success.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::core::error::WorkflowError;

struct StagedArtifact {
    stage: String,
    destination: PathBuf,
    file: NamedTempFile,
}

/// Owns the run directory `<root>/<run-id>/`.
///
/// Artifacts are written to hidden temporary files next to their destination.
/// [`commit`](Self::commit) renames them into place; dropping an uncommitted
/// store deletes the temporaries and the directory if nothing else is in it.
pub struct ArtifactStore {
    run_dir: PathBuf,
    staged: Vec<StagedArtifact>,
    committed: bool,
}

impl ArtifactStore {
    pub fn create(root: &Path, run_id: Uuid) -> Result<Self, WorkflowError> {
        let run_dir = root.join(run_id.to_string());
        fs::create_dir_all(&run_dir).map_err(|e| WorkflowError::storage(&run_dir, e))?;
        log::debug!("Created run directory {}", run_dir.display());
        Ok(Self {
            run_dir,
            staged: Vec::new(),
            committed: false,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Writes `contents` to a temporary file that becomes `file_name` on commit.
    pub fn stage(
        &mut self,
        stage: &str,
        file_name: &str,
        contents: &str,
    ) -> Result<PathBuf, WorkflowError> {
        let destination = self.run_dir.join(file_name);
        let mut file = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".part")
            .tempfile_in(&self.run_dir)
            .map_err(|e| WorkflowError::storage(&self.run_dir, e))?;

        file.write_all(contents.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|e| WorkflowError::storage(file.path(), e))?;

        log::debug!(
            "Staged output of '{}' at {} for {}",
            stage,
            file.path().display(),
            destination.display()
        );
        self.staged.push(StagedArtifact {
            stage: stage.to_string(),
            destination: destination.clone(),
            file,
        });
        Ok(destination)
    }

    /// Number of artifacts waiting for commit.
    pub fn pending(&self) -> usize {
        self.staged.len()
    }

    /// Atomically renames every staged artifact into place.
    ///
    /// If any rename fails, the artifacts already renamed are removed again
    /// so the run leaves either every file or none.
    pub fn commit(mut self) -> Result<Vec<(String, PathBuf)>, WorkflowError> {
        let staged = std::mem::take(&mut self.staged);
        let mut finalized: Vec<(String, PathBuf)> = Vec::with_capacity(staged.len());

        for artifact in staged {
            if let Err(e) = artifact.file.persist(&artifact.destination) {
                for (_, path) in &finalized {
                    if let Err(err) = fs::remove_file(path) {
                        log::warn!("Could not roll back {}: {}", path.display(), err);
                    }
                }
                return Err(WorkflowError::storage(&artifact.destination, e.error));
            }
            log::info!(
                "Wrote output of '{}' to {}",
                artifact.stage,
                artifact.destination.display()
            );
            finalized.push((artifact.stage, artifact.destination));
        }

        self.committed = true;
        Ok(finalized)
    }
}

impl Drop for ArtifactStore {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // Temporaries delete themselves when dropped.
        self.staged.clear();
        match fs::remove_dir(&self.run_dir) {
            Ok(()) => log::debug!("Removed abandoned run directory {}", self.run_dir.display()),
            Err(e) => log::warn!(
                "Could not remove run directory {}: {}",
                self.run_dir.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_commit_finalizes_staged_files() {
        let root = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let mut store = ArtifactStore::create(root.path(), run_id).unwrap();

        let dest = store.stage("tailor-resume", "tailored_resume.md", "# Resume").unwrap();
        assert!(!dest.exists());
        assert_eq!(store.pending(), 1);

        let finalized = store.commit().unwrap();
        assert_eq!(finalized, vec![("tailor-resume".to_string(), dest.clone())]);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "# Resume");
        assert_eq!(
            entries(&root.path().join(run_id.to_string())),
            vec!["tailored_resume.md".to_string()]
        );
    }

    #[test]
    fn test_failed_commit_rolls_back_finalized_files() {
        let root = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        let mut store = ArtifactStore::create(root.path(), run_id).unwrap();
        let run_dir = store.run_dir().to_path_buf();

        let first = store.stage("tailor-resume", "tailored_resume.md", "# Resume").unwrap();
        let second = store
            .stage("prepare-interview", "interview_materials.md", "# Questions")
            .unwrap();
        fs::create_dir(&second).unwrap();

        let err = store.commit().unwrap_err();
        assert!(matches!(err, WorkflowError::Storage { ref path, .. } if *path == second));
        assert!(!first.exists());
        assert_eq!(entries(&run_dir), vec!["interview_materials.md".to_string()]);
    }

    #[test]
    fn test_drop_without_commit_leaves_nothing() {
        let root = tempfile::tempdir().unwrap();
        let run_id = Uuid::new_v4();
        {
            let mut store = ArtifactStore::create(root.path(), run_id).unwrap();
            store.stage("tailor-resume", "tailored_resume.md", "draft").unwrap();
            assert_eq!(entries(store.run_dir()).len(), 1);
        }
        assert!(!root.path().join(run_id.to_string()).exists());
        assert!(entries(root.path()).is_empty());
    }
}
