//! Workspace directory layout.

use reinforge_common::Result;
use std::path::{Path, PathBuf};
use tracing::info;

pub const TARGETS_DIR: &str = "targets";
pub const RESULTS_DIR: &str = "results";
pub const POSES_DIR: &str = "poses";

#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub targets: PathBuf,
    pub results: PathBuf,
    pub poses: PathBuf,
}

impl WorkspaceLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            targets: root.join(TARGETS_DIR),
            results: root.join(RESULTS_DIR),
            poses: root.join(POSES_DIR),
        }
    }

    /// Create the layout. Existing directories and their contents are left alone.
    pub fn ensure(root: &Path) -> Result<Self> {
        let layout = Self::new(root);
        for dir in [&layout.targets, &layout.results, &layout.poses] {
            std::fs::create_dir_all(dir)?;
        }
        info!("📁 Workspace ready at {}", root.display());
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_three_directories() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::ensure(dir.path()).unwrap();
        for d in [&layout.targets, &layout.results, &layout.poses] {
            assert!(d.is_dir());
            assert_eq!(std::fs::read_dir(d).unwrap().count(), 0);
        }
    }

    #[test]
    fn test_idempotent_and_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkspaceLayout::ensure(dir.path()).unwrap();
        std::fs::write(layout.targets.join("x.pdb"), "ATOM").unwrap();

        WorkspaceLayout::ensure(dir.path()).unwrap();
        assert_eq!(std::fs::read_to_string(layout.targets.join("x.pdb")).unwrap(), "ATOM");
    }
}
