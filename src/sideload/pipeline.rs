//! One install run, from source to wrapped, re-signed bundle.
//!
//! The steps run strictly in order:
//!
//! 1. Open the source: extract an `.ipa` into a scratch workspace, or use a
//!    bundle directory in place.
//! 2. Capture the original entitlements before anything is re-signed.
//! 3. Scan for images and refuse to continue if any is encrypted.
//! 4. Patch and ad-hoc re-sign every image.
//! 5. Fix the executable's mode and raise the minimum OS version.
//! 6. Build the wrapper at the destination and deep re-sign it with the
//!    captured entitlements.
//!
//! The scratch workspace is released on every exit path.

use crate::sideload::{
    archive::Archive,
    bundle::Bundle,
    error::{Error, Result},
    settings::Settings,
    tools::{
        CodesignInspector, CodesignSigner, Inspector, MachOPatcher, PatchStrategy,
        PlatformPatcher, Signer,
    },
    workspace::Workspace,
};
use std::path::{Path, PathBuf};

/// Outcome of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The wrapper directory that was produced.
    pub destination: PathBuf,
    /// The bundle copy inside the wrapper.
    pub bundle_path: PathBuf,
    /// Bundle directory name, e.g. `Foo.app`.
    pub bundle_name: String,
    /// Images found in the bundle.
    pub images_found: usize,
    /// Images the patcher reported as changed.
    pub images_patched: usize,
    /// Images the patcher left unchanged.
    pub patch_failures: usize,
    /// Strategy used for every image.
    pub strategy: PatchStrategy,
    /// Whether the manifest's minimum OS version was raised.
    pub minimum_os_raised: bool,
    /// Whether the source was an archive.
    pub from_archive: bool,
}

/// Sequences one install over a set of collaborators.
#[derive(Debug)]
pub struct Pipeline<I, S, P> {
    settings: Settings,
    inspector: I,
    signer: S,
    patcher: P,
}

impl Pipeline<CodesignInspector, CodesignSigner, MachOPatcher> {
    /// A pipeline driving the host's `codesign`, `otool` and `vtool`.
    pub fn with_host_tools(settings: Settings) -> Self {
        Self::new(settings, CodesignInspector, CodesignSigner, MachOPatcher)
    }
}

impl<I, S, P> Pipeline<I, S, P>
where
    I: Inspector,
    S: Signer,
    P: PlatformPatcher,
{
    /// Creates a pipeline over explicit collaborators.
    pub fn new(settings: Settings, inspector: I, signer: S, patcher: P) -> Self {
        Self {
            settings,
            inspector,
            signer,
            patcher,
        }
    }

    /// The run configuration.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The inspector collaborator.
    pub fn inspector(&self) -> &I {
        &self.inspector
    }

    /// The signer collaborator.
    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// The patcher collaborator.
    pub fn patcher(&self) -> &P {
        &self.patcher
    }

    /// Repackages `source` (an `.ipa` or `.app` directory) into `destination`.
    ///
    /// # Errors
    ///
    /// [`Error::EncryptedImage`] if any image is encrypted; nothing has been
    /// modified and `destination` is untouched in that case. Any other step
    /// failure is returned as is.
    pub async fn install(&self, source: &Path, destination: &Path) -> Result<InstallReport> {
        let mut workspace = Workspace::new(self.settings.scratch_root());
        let outcome = self.run(source, destination, &mut workspace).await;

        match (outcome, workspace.release().await) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(release)) => Err(release),
            (Err(e), released) => {
                if let Err(release) = released {
                    log::warn!("Failed to release scratch directory: {}", release);
                }
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        source: &Path,
        destination: &Path,
        workspace: &mut Workspace,
    ) -> Result<InstallReport> {
        let from_archive = Archive::is_archive(source);
        let mut bundle = if from_archive {
            Archive::new(source).extract(workspace).await?
        } else if source.is_dir() {
            Bundle::new(source)
        } else {
            return Err(Error::BundleNotFound {
                directory: source.to_path_buf(),
            });
        };

        if bundle.is_temporary(self.settings.scratch_root()) {
            log::info!("Working on extracted copy {}", bundle.path().display());
        } else {
            log::info!("Modifying {} in place", bundle.path().display());
        }

        let entitlements = bundle.entitlements(&self.inspector).await.clone();
        log::info!("Captured {} entitlements", entitlements.len());

        let images = bundle.scan_images().await?.to_vec();
        log::info!("Found {} images", images.len());

        for image in &images {
            if bundle.is_encrypted(&self.inspector, image).await? {
                log::error!("{} is encrypted", image.path().display());
                return Err(Error::EncryptedImage {
                    path: image.path().to_path_buf(),
                });
            }
        }

        let strategy = self.settings.patch_strategy();
        let mut images_patched = 0;
        let mut patch_failures = 0;
        for image in &images {
            log::info!("Patching {} ({})", image.path().display(), strategy);
            if bundle.patch_platform(&self.patcher, image, strategy).await? {
                images_patched += 1;
            } else {
                patch_failures += 1;
                log::warn!("{} was left unpatched", image.path().display());
            }
            bundle.resign(&self.signer, image).await?;
        }

        bundle
            .set_executable_permissions(self.settings.executable_mode())
            .await?;

        let manifest = bundle.manifest_mut().await?;
        let minimum_os_raised =
            manifest.enforce_minimum_version(self.settings.minimum_os_floor())?;
        manifest.persist().await?;

        let bundle_path = bundle.wrap(destination).await?;

        Bundle::new(destination)
            .resign_deep(&self.signer, &entitlements, self.settings.scratch_root())
            .await?;

        log::info!("Installed {} to {}", bundle.name(), destination.display());

        Ok(InstallReport {
            destination: destination.to_path_buf(),
            bundle_path,
            bundle_name: bundle.name(),
            images_found: images.len(),
            images_patched,
            patch_failures,
            strategy,
            minimum_os_raised,
            from_archive,
        })
    }
}
