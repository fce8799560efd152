use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::WrapperError;

/// Per-run scratch directory holding the config file and the job store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    path: PathBuf,
}

/// How [`WorkDir::prepare`] found the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkDirState {
    Created,
    Reused,
}

impl WorkDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config_path(&self) -> PathBuf {
        self.path.join("config")
    }

    pub fn job_store_path(&self) -> PathBuf {
        self.path.join("jobStore")
    }

    /// Creates the directory, or reuses an existing one when resuming.
    pub fn prepare(&self, resume: bool) -> Result<WorkDirState, WrapperError> {
        if self.path.exists() {
            if !resume {
                return Err(WrapperError::user(format!(
                    "Temporary directory {} already exists. Run with --resume option or remove directory.",
                    self.path.display()
                )));
            }
            info!("Reusing temporary directory: {}", self.path.display());
            return Ok(WorkDirState::Reused);
        }
        fs::create_dir_all(&self.path).map_err(|err| {
            WrapperError::io("Failed to create temporary directory", &self.path, err)
        })?;
        info!("Temporary directory created: {}", self.path.display());
        Ok(WorkDirState::Created)
    }

    pub fn write_config(&self, contents: &str) -> Result<PathBuf, WrapperError> {
        let path = self.config_path();
        fs::write(&path, contents)
            .map_err(|err| WrapperError::io("Failed to write config file", &path, err))?;
        Ok(path)
    }

    pub fn remove(&self) -> Result<(), WrapperError> {
        fs::remove_dir_all(&self.path).map_err(|err| {
            WrapperError::io("Failed to remove temporary directory", &self.path, err)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_creates_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let workdir = WorkDir::new(tmp.path().join("Toil-demo"));
        assert_eq!(workdir.prepare(false).unwrap(), WorkDirState::Created);
        assert!(workdir.path().is_dir());
    }

    #[test]
    fn existing_directory_requires_resume() {
        let tmp = tempfile::tempdir().unwrap();
        let workdir = WorkDir::new(tmp.path().join("Toil-demo"));
        fs::create_dir(workdir.path()).unwrap();

        let err = workdir.prepare(false).unwrap_err();
        assert!(matches!(err, WrapperError::User { .. }));
        assert!(err.to_string().contains("--resume"));

        assert_eq!(workdir.prepare(true).unwrap(), WorkDirState::Reused);
    }

    #[test]
    fn config_is_written_inside_workdir() {
        let tmp = tempfile::tempdir().unwrap();
        let workdir = WorkDir::new(tmp.path().join("Toil-demo"));
        workdir.prepare(false).unwrap();
        let path = workdir.write_config("a: 1\n").unwrap();
        assert_eq!(path, tmp.path().join("Toil-demo").join("config"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a: 1\n");

        workdir.remove().unwrap();
        assert!(!workdir.path().exists());
    }
}
