//! Scratch workspace for intermediate render artifacts

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use tempfile::TempDir;

use crate::error::BuildError;

/// Ephemeral directory owned by one build run.
///
/// Each figure gets its own subdirectory, so a half-written wrapper or a
/// stray `.aux` file from one figure never leaks into the next. The whole
/// tree is removed by [`ScratchWorkspace::close`], or on drop if the run
/// bails out early.
#[derive(Debug)]
pub struct ScratchWorkspace {
    dir: TempDir,
}

impl ScratchWorkspace {
    /// Create a workspace under the system temporary directory.
    pub fn create() -> Result<Self, BuildError> {
        Self::from_dir(Self::builder().tempdir())
    }

    /// Create a workspace under `parent`.
    pub fn create_in(parent: &Path) -> Result<Self, BuildError> {
        Self::from_dir(Self::builder().tempdir_in(parent))
    }

    fn builder() -> tempfile::Builder<'static, 'static> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("figbuild-");
        builder
    }

    fn from_dir(dir: std::io::Result<TempDir>) -> Result<Self, BuildError> {
        let dir = dir.map_err(BuildError::Workspace)?;
        debug!("scratch workspace at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Fresh per-figure directory named after the figure.
    pub fn figure_dir(&self, name: &str) -> Result<PathBuf, BuildError> {
        let dir = self.dir.path().join(name);
        if dir.exists() {
            fs::remove_dir_all(&dir).map_err(|err| BuildError::io("clearing", &dir, err))?;
        }
        fs::create_dir(&dir).map_err(|err| BuildError::io("creating", &dir, err))?;
        Ok(dir)
    }

    /// Remove the workspace and everything in it.
    pub fn close(self) -> Result<(), BuildError> {
        let path = self.dir.path().to_path_buf();
        self.dir
            .close()
            .map_err(|err| BuildError::io("removing scratch workspace", path, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn close_removes_nested_contents() {
        let parent = tempdir().expect("tempdir");
        let workspace = ScratchWorkspace::create_in(parent.path()).expect("workspace");
        let root = workspace.path().to_path_buf();

        let figure = workspace.figure_dir("diagram").expect("figure dir");
        fs::write(figure.join("diagram.aux"), "aux").expect("write");
        fs::create_dir(figure.join("sub")).expect("mkdir");

        workspace.close().expect("close");
        assert!(!root.exists());
    }

    #[test]
    fn drop_removes_workspace() {
        let parent = tempdir().expect("tempdir");
        let root = {
            let workspace = ScratchWorkspace::create_in(parent.path()).expect("workspace");
            workspace.path().to_path_buf()
        };
        assert!(!root.exists());
    }

    #[test]
    fn figure_dir_starts_empty() {
        let parent = tempdir().expect("tempdir");
        let workspace = ScratchWorkspace::create_in(parent.path()).expect("workspace");

        let first = workspace.figure_dir("a").expect("first");
        fs::write(first.join("leftover.log"), "x").expect("write");
        let again = workspace.figure_dir("a").expect("again");

        assert_eq!(first, again);
        assert_eq!(fs::read_dir(&again).expect("read").count(), 0);
    }

    #[test]
    fn create_places_workspace_under_parent() {
        let parent = tempdir().expect("tempdir");
        let workspace = ScratchWorkspace::create_in(parent.path()).expect("workspace");

        assert!(workspace.path().starts_with(parent.path()));
        let name = workspace.path().file_name().expect("name").to_string_lossy();
        assert!(name.starts_with("figbuild-"));
    }

    #[test]
    fn close_reports_vanished_workspace() {
        let parent = tempdir().expect("tempdir");
        let workspace = ScratchWorkspace::create_in(parent.path()).expect("workspace");
        fs::remove_dir_all(workspace.path()).expect("remove early");

        let err = workspace.close().expect_err("already gone");
        assert!(err.to_string().starts_with("removing scratch workspace"));
    }
}
