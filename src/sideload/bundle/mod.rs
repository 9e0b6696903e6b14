//! The on-disk application bundle.
//!
//! A [`Bundle`] is identified by its directory. Its manifest, entitlements
//! and image list are computed on first access and then kept for the life of
//! the instance, even if the files underneath change. The bundle never
//! deletes its own directory.
//!
//! Every operation that touches the host toolchain takes the collaborator it
//! needs as an argument, so the same bundle can be driven by production
//! adapters or test fakes.

mod scan;
mod wrap;

pub use scan::{
    FAT_MAGIC_BYTES, Image, MACHO_64_MAGIC_BYTES, classify, is_image_magic,
    listing_reports_encryption,
};
pub use wrap::{WRAPPED_BUNDLE_LINK, WRAPPER_DIR, WrapperBuilder};

use crate::sideload::{
    entitlements::EntitlementMap,
    error::{Error, ErrorExt, Result},
    manifest::{MANIFEST_FILE_NAME, Manifest},
    tools::{Inspector, PatchStrategy, PlatformPatcher, Signer},
    workspace::Workspace,
};
use std::path::{Path, PathBuf};

/// Directory name suffix of an application bundle.
pub const BUNDLE_SUFFIX: &str = ".app";

/// File name of the entitlements written for the deep re-sign.
const ENTITLEMENTS_FILE_NAME: &str = "entitlements.plist";

/// An application bundle on disk.
#[derive(Debug)]
pub struct Bundle {
    path: PathBuf,
    manifest: Option<Manifest>,
    entitlements: Option<EntitlementMap>,
    images: Option<Vec<Image>>,
}

impl Bundle {
    /// Refers to an existing bundle directory. Nothing is read yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            manifest: None,
            entitlements: None,
            images: None,
        }
    }

    /// Selects the first child of `directory` that is a directory named `*.app`.
    ///
    /// Children are visited in the file system's listing order.
    ///
    /// # Errors
    ///
    /// [`Error::BundleNotFound`] when `directory` is missing or has no match.
    pub async fn locate(directory: &Path) -> Result<Self> {
        let mut entries = match tokio::fs::read_dir(directory).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::BundleNotFound {
                    directory: directory.to_path_buf(),
                });
            }
            Err(e) => return Err(e).fs_context("listing directory", directory),
        };

        while let Some(entry) = entries
            .next_entry()
            .await
            .fs_context("listing directory", directory)?
        {
            let matches_suffix = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(BUNDLE_SUFFIX));
            if !matches_suffix {
                continue;
            }

            let path = entry.path();
            if tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
                log::debug!("Located bundle {}", path.display());
                return Ok(Self::new(path));
            }
        }

        Err(Error::BundleNotFound {
            directory: directory.to_path_buf(),
        })
    }

    /// The bundle directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The bundle directory's name, e.g. `Foo.app`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whether the bundle lives below `scratch_root`, i.e. was extracted.
    pub fn is_temporary(&self, scratch_root: &Path) -> bool {
        self.path.starts_with(scratch_root)
    }

    /// Entitlements of the bundle's live signature.
    ///
    /// Read once through `inspector`. An unreadable signature yields an
    /// empty set, since unsigned bundles are valid input.
    pub async fn entitlements<I: Inspector>(&mut self, inspector: &I) -> &EntitlementMap {
        let entitlements = match self.entitlements.take() {
            Some(cached) => cached,
            None => match EntitlementMap::read_from_signature(inspector, &self.path).await {
                Ok(read) => {
                    log::debug!("Read {} entitlements from {}", read.len(), self.path.display());
                    read
                }
                Err(e) => {
                    log::debug!("No entitlements for {}: {}", self.path.display(), e);
                    EntitlementMap::new()
                }
            },
        };
        self.entitlements.insert(entitlements)
    }

    /// The bundle's `Info.plist`, loaded once.
    ///
    /// # Errors
    ///
    /// [`Error::Manifest`] when the file is missing or malformed. Failures
    /// are not cached.
    pub async fn manifest(&mut self) -> Result<&Manifest> {
        self.manifest_mut().await.map(|manifest| &*manifest)
    }

    /// Mutable access to the cached manifest. Changes stay in memory until
    /// [`Manifest::persist`] is called.
    pub async fn manifest_mut(&mut self) -> Result<&mut Manifest> {
        let manifest = match self.manifest.take() {
            Some(cached) => cached,
            None => Manifest::load(self.path.join(MANIFEST_FILE_NAME)).await?,
        };
        Ok(self.manifest.insert(manifest))
    }

    /// Every executable image in the bundle, scanned once.
    pub async fn scan_images(&mut self) -> Result<&[Image]> {
        let images = match self.images.take() {
            Some(cached) => cached,
            None => {
                let found = scan::scan(&self.path).await?;
                log::debug!("Found {} images in {}", found.len(), self.path.display());
                found
            }
        };
        Ok(self.images.insert(images).as_slice())
    }

    /// Whether `image` carries an active encryption segment.
    pub async fn is_encrypted<I: Inspector>(&self, inspector: &I, image: &Image) -> Result<bool> {
        let listing = inspector.load_commands(image.path()).await?;
        Ok(listing_reports_encryption(&listing))
    }

    /// Rewrites `image`'s platform metadata with `strategy`.
    pub async fn patch_platform<P: PlatformPatcher>(
        &self,
        patcher: &P,
        image: &Image,
        strategy: PatchStrategy,
    ) -> Result<bool> {
        patcher.patch(image.path(), strategy).await
    }

    /// Ad-hoc re-seals a single image without entitlements.
    pub async fn resign<S: Signer>(&self, signer: &S, image: &Image) -> Result<()> {
        signer.sign(image.path()).await
    }

    /// Applies `mode` to the executable named by the manifest.
    pub async fn set_executable_permissions(&mut self, mode: u32) -> Result<()> {
        let name = self.manifest().await?.executable_name()?.to_owned();
        let executable = self.path.join(name);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&executable, std::fs::Permissions::from_mode(mode))
                .await
                .fs_context("setting executable permissions", &executable)?;
            log::debug!("Set mode {:o} on {}", mode, executable.display());
        }

        #[cfg(not(unix))]
        log::warn!(
            "Skipping mode {:o} on {}: permissions are unix-only",
            mode,
            executable.display()
        );

        Ok(())
    }

    /// Recursively re-seals the bundle with `entitlements` attached.
    ///
    /// The entitlements file lives in its own scratch directory below
    /// `scratch_root`, which is removed whether or not signing succeeds.
    pub async fn resign_deep<S: Signer>(
        &self,
        signer: &S,
        entitlements: &EntitlementMap,
        scratch_root: &Path,
    ) -> Result<()> {
        let mut workspace = Workspace::new(scratch_root);
        let signed = async {
            let dir = workspace.allocate().await?;
            let file = dir.join(ENTITLEMENTS_FILE_NAME);
            entitlements.write_xml(&file).await?;
            signer.sign_deep(&self.path, &file).await
        }
        .await;

        let released = workspace.release().await;
        signed?;
        released
    }

    /// Builds the wrapper layout at `destination`; see [`WrapperBuilder`].
    pub async fn wrap(&self, destination: &Path) -> Result<PathBuf> {
        WrapperBuilder::new(&self.path).build(destination).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_locate_single_match() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("Foo.app")).unwrap();
        std::fs::write(temp.path().join("README"), b"x").unwrap();

        let bundle = Bundle::locate(temp.path()).await.unwrap();
        assert_eq!(bundle.path(), temp.path().join("Foo.app"));
        assert_eq!(bundle.name(), "Foo.app");
    }

    #[tokio::test]
    async fn test_locate_ignores_files_with_suffix() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("Fake.app"), b"not a dir").unwrap();

        let result = Bundle::locate(temp.path()).await;
        assert!(matches!(result, Err(Error::BundleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_locate_missing_directory() {
        let temp = TempDir::new().unwrap();
        let result = Bundle::locate(&temp.path().join("Payload")).await;
        assert!(matches!(result, Err(Error::BundleNotFound { .. })));
    }

    #[tokio::test]
    async fn test_locate_multiple_matches_is_deterministic() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("A.app")).unwrap();
        std::fs::create_dir_all(temp.path().join("B.app")).unwrap();

        let first = Bundle::locate(temp.path()).await.unwrap();
        let second = Bundle::locate(temp.path()).await.unwrap();
        assert_eq!(first.path(), second.path());
        assert!(["A.app", "B.app"].contains(&first.name().as_str()));
    }

    #[test]
    fn test_is_temporary() {
        let bundle = Bundle::new("/scratch/1234/Payload/Foo.app");
        assert!(bundle.is_temporary(Path::new("/scratch")));
        assert!(!bundle.is_temporary(Path::new("/Applications")));
    }

    #[tokio::test]
    async fn test_manifest_failure_is_not_cached() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("Foo.app");
        std::fs::create_dir_all(&app).unwrap();
        let mut bundle = Bundle::new(&app);

        assert!(matches!(bundle.manifest().await, Err(Error::Manifest { .. })));

        let mut dict = plist::Dictionary::new();
        dict.insert("CFBundleExecutable".into(), "Foo".into());
        plist::Value::Dictionary(dict)
            .to_file_xml(app.join(MANIFEST_FILE_NAME))
            .unwrap();
        assert_eq!(bundle.manifest().await.unwrap().executable_name().unwrap(), "Foo");

        // Cached from here on.
        std::fs::remove_file(app.join(MANIFEST_FILE_NAME)).unwrap();
        assert!(bundle.manifest().await.is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_set_executable_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let app = temp.path().join("Foo.app");
        std::fs::create_dir_all(&app).unwrap();
        std::fs::write(app.join("Foo"), b"binary").unwrap();
        let mut dict = plist::Dictionary::new();
        dict.insert("CFBundleExecutable".into(), "Foo".into());
        plist::Value::Dictionary(dict)
            .to_file_xml(app.join(MANIFEST_FILE_NAME))
            .unwrap();

        let mut bundle = Bundle::new(&app);
        bundle.set_executable_permissions(0o755).await.unwrap();

        let mode = std::fs::metadata(app.join("Foo")).unwrap().permissions().mode();
        assert_eq!(mode & 0o7777, 0o755);
    }

    #[tokio::test]
    async fn test_set_executable_permissions_requires_executable_key() {
        let temp = TempDir::new().unwrap();
        let app = temp.path().join("Foo.app");
        std::fs::create_dir_all(&app).unwrap();
        plist::Value::Dictionary(plist::Dictionary::new())
            .to_file_xml(app.join(MANIFEST_FILE_NAME))
            .unwrap();

        let mut bundle = Bundle::new(&app);
        let result = bundle.set_executable_permissions(0o755).await;
        assert!(matches!(
            result,
            Err(Error::MissingManifestKey { key: "CFBundleExecutable" })
        ));
    }
}
