//! Host-launchable wrapper layout.
//!
//! ```text
//! <destination>/
//! ├── Wrapper/
//! │   └── Foo.app/        full copy of the bundle
//! └── WrappedBundle -> Wrapper/Foo.app
//! ```

use crate::sideload::{
    error::{Error, Result},
    utils::fs,
};
use std::path::{Path, PathBuf};

/// Directory holding the copied bundle.
pub const WRAPPER_DIR: &str = "Wrapper";

/// Symlink pointing at the wrapped bundle.
pub const WRAPPED_BUNDLE_LINK: &str = "WrappedBundle";

/// Builds the wrapper directory for one bundle.
#[derive(Debug)]
pub struct WrapperBuilder<'a> {
    bundle: &'a Path,
}

impl<'a> WrapperBuilder<'a> {
    /// Wraps the bundle directory at `bundle`.
    pub fn new(bundle: &'a Path) -> Self {
        Self { bundle }
    }

    /// Replaces `destination` with a wrapper around the bundle.
    ///
    /// Anything already at `destination` is removed first. Returns the path
    /// of the copied bundle inside the wrapper.
    pub async fn build(&self, destination: &Path) -> Result<PathBuf> {
        let name = self.bundle.file_name().ok_or_else(|| {
            Error::GenericError(format!("Invalid bundle path: {}", self.bundle.display()))
        })?;

        fs::remove_path(destination).await?;

        let wrapper = destination.join(WRAPPER_DIR);
        fs::create_dir_all(destination, false).await?;
        fs::create_dir_all(&wrapper, false).await?;

        let copied = wrapper.join(name);
        log::debug!("Copying {} to {}", self.bundle.display(), copied.display());
        fs::copy_dir(self.bundle, &copied).await?;

        let link_target = Path::new(WRAPPER_DIR).join(name);
        fs::symlink(&link_target, &destination.join(WRAPPED_BUNDLE_LINK)).await?;

        log::info!("Wrapped {} at {}", self.bundle.display(), destination.display());
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_produces_wrapper_layout() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("Foo.app");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Foo"), b"binary").unwrap();

        let destination = temp.path().join("Foo Wrapper");
        let copied = WrapperBuilder::new(&bundle).build(&destination).await.unwrap();

        assert_eq!(copied, destination.join("Wrapper/Foo.app"));
        assert_eq!(std::fs::read(copied.join("Foo")).unwrap(), b"binary");

        let link = destination.join(WRAPPED_BUNDLE_LINK);
        assert_eq!(std::fs::read_link(&link).unwrap(), Path::new("Wrapper/Foo.app"));
        assert!(link.join("Foo").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_build_overwrites_instead_of_merging() {
        let temp = TempDir::new().unwrap();
        let bundle = temp.path().join("Foo.app");
        std::fs::create_dir_all(&bundle).unwrap();
        std::fs::write(bundle.join("Foo"), b"binary").unwrap();

        let destination = temp.path().join("out");
        std::fs::create_dir_all(destination.join("Wrapper/Stale.app")).unwrap();
        std::fs::write(destination.join("leftover"), b"x").unwrap();

        WrapperBuilder::new(&bundle).build(&destination).await.unwrap();

        assert!(!destination.join("leftover").exists());
        assert!(!destination.join("Wrapper/Stale.app").exists());
        assert!(destination.join("Wrapper/Foo.app/Foo").is_file());
    }
}
