//! Scratch directory management.
//!
//! A [`Workspace`] owns at most one uniquely named directory below the
//! scratch root. Archive extraction and transient signing files live there.
//! Allocation is idempotent while the directory exists; [`Workspace::release`]
//! removes it. Dropping a workspace that still tracks a directory removes it
//! too, so failure paths do not leak scratch space.

use crate::sideload::{
    error::{ErrorExt, Result},
    utils::fs,
};
use std::path::{Path, PathBuf};

/// A scratch directory allocator bound to one operation.
#[derive(Debug)]
pub struct Workspace {
    root: PathBuf,
    current: Option<PathBuf>,
}

impl Workspace {
    /// Creates a workspace that allocates below `root`. Nothing is created yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: None,
        }
    }

    /// Returns the scratch root this workspace allocates under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the tracked scratch directory, if any.
    pub fn path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    /// Returns the scratch directory, creating a fresh one if none is tracked
    /// or the tracked one has disappeared.
    pub async fn allocate(&mut self) -> Result<PathBuf> {
        if let Some(current) = &self.current
            && tokio::fs::try_exists(current).await.unwrap_or(false)
        {
            return Ok(current.clone());
        }

        let dir = self.root.join(uuid::Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir)
            .await
            .fs_context("creating scratch directory", &dir)?;

        log::debug!("Allocated scratch directory {}", dir.display());
        self.current = Some(dir.clone());
        Ok(dir)
    }

    /// Removes the tracked scratch directory and stops tracking it.
    ///
    /// No-op when nothing is tracked.
    pub async fn release(&mut self) -> Result<()> {
        let Some(dir) = self.current.take() else {
            return Ok(());
        };

        fs::remove_path(&dir).await?;
        log::debug!("Released scratch directory {}", dir.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.current.take() else {
            return;
        };

        // Best-effort; drop must never panic.
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => log::debug!("Removed scratch directory {} on drop", dir.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!(
                "Failed to remove scratch directory {}: {}",
                dir.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_allocate_is_idempotent_while_dir_exists() {
        let temp = TempDir::new().unwrap();
        let mut workspace = Workspace::new(temp.path());

        let first = workspace.allocate().await.unwrap();
        let second = workspace.allocate().await.unwrap();

        assert_eq!(first, second);
        assert!(first.is_dir());
        assert!(first.starts_with(temp.path()));
    }

    #[tokio::test]
    async fn test_allocate_replaces_vanished_dir() {
        let temp = TempDir::new().unwrap();
        let mut workspace = Workspace::new(temp.path());

        let first = workspace.allocate().await.unwrap();
        std::fs::remove_dir_all(&first).unwrap();
        let second = workspace.allocate().await.unwrap();

        assert_ne!(first, second);
        assert!(second.is_dir());
    }

    #[tokio::test]
    async fn test_release_removes_and_untracks() {
        let temp = TempDir::new().unwrap();
        let mut workspace = Workspace::new(temp.path());

        let dir = workspace.allocate().await.unwrap();
        std::fs::write(dir.join("payload"), b"x").unwrap();

        workspace.release().await.unwrap();
        assert!(!dir.exists());
        assert!(workspace.path().is_none());

        // Second release is a no-op.
        workspace.release().await.unwrap();
    }

    #[tokio::test]
    async fn test_distinct_workspaces_do_not_collide() {
        let temp = TempDir::new().unwrap();
        let mut a = Workspace::new(temp.path());
        let mut b = Workspace::new(temp.path());

        assert_ne!(a.allocate().await.unwrap(), b.allocate().await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_removes_tracked_dir() {
        let temp = TempDir::new().unwrap();
        let dir = {
            let mut workspace = Workspace::new(temp.path());
            workspace.allocate().await.unwrap()
        };
        assert!(!dir.exists());
    }
}
