//! `codesign`/`otool` backed collaborators.

use super::{CODESIGN, Inspector, OTOOL, Signer, run_tool};
use crate::sideload::error::{Error, Result};
use std::{ffi::OsStr, path::Path};

/// Ad-hoc signer driving the host `codesign`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodesignSigner;

impl Signer for CodesignSigner {
    async fn sign(&self, path: &Path) -> Result<()> {
        log::debug!("Ad-hoc signing {}", path.display());
        run_tool(&CODESIGN, [OsStr::new("-fs"), OsStr::new("-"), path.as_os_str()]).await?;
        Ok(())
    }

    async fn sign_deep(&self, path: &Path, entitlements: &Path) -> Result<()> {
        log::info!("Re-signing {} with entitlements", path.display());
        let output = run_tool(
            &CODESIGN,
            [
                OsStr::new("-fs"),
                OsStr::new("-"),
                path.as_os_str(),
                OsStr::new("--deep"),
                OsStr::new("--entitlements"),
                entitlements.as_os_str(),
            ],
        )
        .await?;

        if !output.trim().is_empty() {
            log::debug!("codesign: {}", output.trim());
        }
        Ok(())
    }
}

/// Inspector reading signatures with `codesign` and load commands with `otool`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CodesignInspector;

impl Inspector for CodesignInspector {
    async fn signature_entitlements(&self, path: &Path) -> Result<plist::Dictionary> {
        let output = run_tool(
            &CODESIGN,
            [
                OsStr::new("-d"),
                OsStr::new("--entitlements"),
                OsStr::new("-"),
                OsStr::new("--xml"),
                path.as_os_str(),
            ],
        )
        .await
        .map_err(|e| Error::SignatureRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        parse_entitlement_xml(path, &output)
    }

    async fn load_commands(&self, image: &Path) -> Result<String> {
        run_tool(&OTOOL, [OsStr::new("-l"), image.as_os_str()]).await
    }
}

/// Parses `codesign --xml` entitlement output. Empty output is an empty set.
fn parse_entitlement_xml(path: &Path, output: &str) -> Result<plist::Dictionary> {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return Ok(plist::Dictionary::new());
    }

    let value = plist::Value::from_reader_xml(trimmed.as_bytes()).map_err(|e| {
        Error::SignatureRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    value.into_dictionary().ok_or_else(|| Error::SignatureRead {
        path: path.to_path_buf(),
        reason: "entitlements are not a dictionary".to_string(),
    })
}
