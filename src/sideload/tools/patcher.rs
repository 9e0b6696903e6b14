//! Production [`PlatformPatcher`].

use super::{PatchStrategy, PlatformPatcher, VTOOL, masquerade::masquerade_as_catalyst, run_tool};
use crate::sideload::error::{Error, Result};
use std::{ffi::OsStr, path::Path};

/// Patches images with `vtool` or the in-process load command rewrite.
#[derive(Debug, Default, Clone, Copy)]
pub struct MachOPatcher;

impl PlatformPatcher for MachOPatcher {
    async fn patch(&self, image: &Path, strategy: PatchStrategy) -> Result<bool> {
        match strategy {
            PatchStrategy::BuildVersion => {
                run_tool(
                    &VTOOL,
                    [
                        OsStr::new("-arch"),
                        OsStr::new("arm64"),
                        OsStr::new("-set-build-version"),
                        OsStr::new("maccatalyst"),
                        OsStr::new("10.0"),
                        OsStr::new("14.5"),
                        OsStr::new("-replace"),
                        OsStr::new("-output"),
                        image.as_os_str(),
                        image.as_os_str(),
                    ],
                )
                .await?;
                Ok(true)
            }
            PatchStrategy::Masquerade => {
                let image = image.to_path_buf();
                tokio::task::spawn_blocking(move || masquerade_as_catalyst(&image))
                    .await
                    .map_err(|e| Error::GenericError(format!("Patch task panicked: {e}")))?
            }
        }
    }
}
