//! External collaborators: signing, binary inspection, platform patching.
//!
//! The pipeline only talks to the host toolchain through the three traits in
//! this module. Production adapters shell out to `codesign`, `otool` and
//! `vtool` or rewrite load commands in-process; tests substitute fakes.

mod codesign;
mod masquerade;
mod patcher;

pub use codesign::{CodesignInspector, CodesignSigner};
pub use masquerade::masquerade_as_catalyst;
pub use patcher::MachOPatcher;

use crate::sideload::error::{Error, Result};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::LazyLock,
};

/// How an image's platform metadata is rewritten.
///
/// Chosen once per run and applied to every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatchStrategy {
    /// Replace the build-version load command through `vtool`.
    BuildVersion,
    /// Rewrite the arm64 slice's load commands in place.
    #[default]
    Masquerade,
}

impl std::fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchStrategy::BuildVersion => write!(f, "build-version"),
            PatchStrategy::Masquerade => write!(f, "masquerade"),
        }
    }
}

/// Reads data out of live code signatures and binaries.
#[allow(async_fn_in_trait)]
pub trait Inspector {
    /// Returns the raw entitlement dictionary embedded in `path`'s signature.
    async fn signature_entitlements(&self, path: &Path) -> Result<plist::Dictionary>;

    /// Returns a textual listing of `image`'s load commands.
    async fn load_commands(&self, image: &Path) -> Result<String>;
}

/// Re-seals code signatures without a signing identity.
#[allow(async_fn_in_trait)]
pub trait Signer {
    /// Ad-hoc signs a single file.
    async fn sign(&self, path: &Path) -> Result<()>;

    /// Ad-hoc signs `path` recursively, attaching the entitlements file.
    async fn sign_deep(&self, path: &Path, entitlements: &Path) -> Result<()>;
}

/// Rewrites an image's platform metadata in place.
#[allow(async_fn_in_trait)]
pub trait PlatformPatcher {
    /// Patches `image`. `Ok(false)` means the image was left unchanged.
    async fn patch(&self, image: &Path, strategy: PatchStrategy) -> Result<bool>;
}

fn locate_tool(name: &str) -> PathBuf {
    match which::which(name) {
        Ok(path) => {
            log::debug!("Found {} at: {}", name, path.display());
            path
        }
        Err(e) => {
            let fallback = Path::new("/usr/bin").join(name);
            log::debug!(
                "{} not found in PATH ({}), falling back to {}",
                name,
                e,
                fallback.display()
            );
            fallback
        }
    }
}

/// Path to `codesign`.
pub(crate) static CODESIGN: LazyLock<PathBuf> = LazyLock::new(|| locate_tool("codesign"));

/// Path to `otool`.
pub(crate) static OTOOL: LazyLock<PathBuf> = LazyLock::new(|| locate_tool("otool"));

/// Path to `vtool`.
pub(crate) static VTOOL: LazyLock<PathBuf> = LazyLock::new(|| locate_tool("vtool"));

/// Runs `program` to completion and returns its stdout.
///
/// A spawn failure maps to [`Error::CommandFailed`]; a nonzero exit maps to
/// [`Error::ToolFailed`] carrying stderr, or stdout when stderr is empty.
pub(crate) async fn run_tool<I, S>(program: &Path, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    let command = std::iter::once(program.as_os_str())
        .chain(args.iter().map(|a| a.as_os_str()))
        .map(|a| a.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ");

    log::debug!("Running: {}", command);

    let output = tokio::process::Command::new(program)
        .args(&args)
        .output()
        .await
        .map_err(|error| Error::CommandFailed {
            command: command.clone(),
            error,
        })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let output_text = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr.into_owned()
        };
        return Err(Error::ToolFailed {
            command,
            code: output.status.code(),
            output: output_text.trim().to_string(),
        });
    }

    Ok(stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_strategy_is_masquerade() {
        assert_eq!(PatchStrategy::default(), PatchStrategy::Masquerade);
        assert_eq!(PatchStrategy::BuildVersion.to_string(), "build-version");
    }

    #[test]
    fn test_locate_tool_falls_back_to_usr_bin() {
        let path = locate_tool("kodegen-definitely-not-a-tool");
        assert_eq!(path, Path::new("/usr/bin/kodegen-definitely-not-a-tool"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_reports_spawn_and_exit_failures() {
        let missing = run_tool(Path::new("/nonexistent/tool"), ["-x"]).await;
        assert!(matches!(missing, Err(Error::CommandFailed { .. })));

        let failed = run_tool(Path::new("/bin/sh"), ["-c", "echo boom >&2; exit 3"]).await;
        match failed {
            Err(Error::ToolFailed { code, output, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(output, "boom");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        let ok = run_tool(Path::new("/bin/sh"), ["-c", "echo hello"]).await.unwrap();
        assert_eq!(ok.trim(), "hello");
    }
}
