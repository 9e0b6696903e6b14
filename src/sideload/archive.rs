//! `.ipa` archive extraction.

use crate::sideload::{
    bundle::Bundle,
    error::{Error, ErrorExt, Result},
    workspace::Workspace,
};
use std::path::{Path, PathBuf};

/// Extension identifying an app archive source.
pub const ARCHIVE_EXTENSION: &str = "ipa";

/// Top-level directory inside an archive holding the bundle.
pub const PAYLOAD_DIR: &str = "Payload";

/// A zip-compatible application archive.
#[derive(Debug, Clone)]
pub struct Archive {
    path: PathBuf,
}

impl Archive {
    /// Refers to the archive at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Whether `source` names an archive rather than a bundle directory.
    pub fn is_archive(source: &Path) -> bool {
        source
            .extension()
            .is_some_and(|ext| ext == ARCHIVE_EXTENSION)
    }

    /// The archive file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unpacks the archive into `workspace` and locates the bundle inside.
    ///
    /// The extracted tree belongs to the workspace; releasing it removes the
    /// returned bundle's directory.
    ///
    /// # Errors
    ///
    /// [`Error::Extraction`] when the archive cannot be read or unpacked,
    /// [`Error::BundleNotFound`] when `Payload/` holds no `*.app` directory.
    pub async fn extract(&self, workspace: &mut Workspace) -> Result<Bundle> {
        let destination = workspace.allocate().await?;
        log::info!(
            "Extracting {} to {}",
            self.path.display(),
            destination.display()
        );

        let archive = self.path.clone();
        let target = destination.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let file = std::fs::File::open(&archive).fs_context("opening archive", &archive)?;
            let mut zip = zip::ZipArchive::new(file).map_err(|source| Error::Extraction {
                archive: archive.clone(),
                source,
            })?;
            zip.extract(&target).map_err(|source| Error::Extraction {
                archive: archive.clone(),
                source,
            })
        })
        .await
        .map_err(|e| Error::GenericError(format!("Extraction task panicked: {e}")))??;

        Bundle::locate(&destination.join(PAYLOAD_DIR)).await
    }
}
