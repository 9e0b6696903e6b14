//! Configuration for an install run.
//!
//! [`Settings`] carries the policy values the pipeline needs: where scratch
//! directories live, which platform patch strategy to apply, the minimum OS
//! floor written into the manifest, and the permission bits for the main
//! executable. Build one with [`SettingsBuilder`].
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_sideload::sideload::{PatchStrategy, SettingsBuilder};
//!
//! let settings = SettingsBuilder::new()
//!     .scratch_root("/tmp/sideload-scratch")
//!     .patch_strategy(PatchStrategy::BuildVersion)
//!     .build()?;
//! assert_eq!(settings.minimum_os_floor(), 11.0);
//! # Ok::<(), kodegen_bundler_sideload::sideload::Error>(())
//! ```

use crate::bail;
use crate::sideload::{error::Result, tools::PatchStrategy};
use std::path::{Path, PathBuf};

/// Default minimum OS version written into patched manifests.
pub const DEFAULT_MINIMUM_OS_FLOOR: f64 = 11.0;

/// Default permission bits for the bundle's main executable (`-rwxr-xr-x`).
pub const DEFAULT_EXECUTABLE_MODE: u32 = 0o755;

/// Resolved configuration for one install run.
#[derive(Debug, Clone)]
pub struct Settings {
    scratch_root: PathBuf,
    patch_strategy: PatchStrategy,
    minimum_os_floor: f64,
    executable_mode: u32,
}

impl Settings {
    /// Returns the process-wide scratch root.
    ///
    /// Each workspace allocates a uniquely named subdirectory below it.
    pub fn scratch_root(&self) -> &Path {
        &self.scratch_root
    }

    /// Returns the platform patch strategy applied to every image.
    pub fn patch_strategy(&self) -> PatchStrategy {
        self.patch_strategy
    }

    /// Returns the minimum OS version floor.
    pub fn minimum_os_floor(&self) -> f64 {
        self.minimum_os_floor
    }

    /// Returns the permission bits applied to the main executable.
    pub fn executable_mode(&self) -> u32 {
        self.executable_mode
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scratch_root: default_scratch_root(),
            patch_strategy: PatchStrategy::default(),
            minimum_os_floor: DEFAULT_MINIMUM_OS_FLOOR,
            executable_mode: DEFAULT_EXECUTABLE_MODE,
        }
    }
}

/// Returns the default scratch root, `~/.kodegen/sideload/tmp`.
///
/// Falls back to the system temp directory when no home directory is known.
pub fn default_scratch_root() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".kodegen").join("sideload").join("tmp"),
        None => std::env::temp_dir().join("kodegen-sideload"),
    }
}

/// Builder for [`Settings`].
#[derive(Debug, Default)]
pub struct SettingsBuilder {
    scratch_root: Option<PathBuf>,
    patch_strategy: Option<PatchStrategy>,
    minimum_os_floor: Option<f64>,
    executable_mode: Option<u32>,
}

impl SettingsBuilder {
    /// Creates a new settings builder.
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the scratch root.
    ///
    /// Default: [`default_scratch_root()`]
    pub fn scratch_root<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.scratch_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the platform patch strategy.
    ///
    /// Default: [`PatchStrategy::Masquerade`]
    pub fn patch_strategy(mut self, strategy: PatchStrategy) -> Self {
        self.patch_strategy = Some(strategy);
        self
    }

    /// Sets the minimum OS version floor.
    ///
    /// Default: [`DEFAULT_MINIMUM_OS_FLOOR`]
    pub fn minimum_os_floor(mut self, floor: f64) -> Self {
        self.minimum_os_floor = Some(floor);
        self
    }

    /// Sets the permission bits for the main executable.
    ///
    /// Default: [`DEFAULT_EXECUTABLE_MODE`]
    pub fn executable_mode(mut self, mode: u32) -> Self {
        self.executable_mode = Some(mode);
        self
    }

    /// Builds the settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the floor is not a finite, non-negative number or
    /// the mode carries bits outside `0o7777`.
    pub fn build(self) -> Result<Settings> {
        let minimum_os_floor = self.minimum_os_floor.unwrap_or(DEFAULT_MINIMUM_OS_FLOOR);
        if !minimum_os_floor.is_finite() || minimum_os_floor < 0.0 {
            bail!("minimum OS floor must be a non-negative number, got {minimum_os_floor}");
        }

        let executable_mode = self.executable_mode.unwrap_or(DEFAULT_EXECUTABLE_MODE);
        if executable_mode & !0o7777 != 0 {
            bail!("executable mode {executable_mode:o} is not a permission mask");
        }

        Ok(Settings {
            scratch_root: self.scratch_root.unwrap_or_else(default_scratch_root),
            patch_strategy: self.patch_strategy.unwrap_or_default(),
            minimum_os_floor,
            executable_mode,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let settings = SettingsBuilder::new().build().unwrap();
        assert_eq!(settings.patch_strategy(), PatchStrategy::Masquerade);
        assert_eq!(settings.minimum_os_floor(), 11.0);
        assert_eq!(settings.executable_mode(), 0o755);
        assert_eq!(settings.scratch_root(), default_scratch_root());
    }

    #[test]
    fn test_builder_overrides() {
        let settings = SettingsBuilder::new()
            .scratch_root("/tmp/scratch")
            .patch_strategy(PatchStrategy::BuildVersion)
            .minimum_os_floor(12.0)
            .executable_mode(0o700)
            .build()
            .unwrap();
        assert_eq!(settings.scratch_root(), Path::new("/tmp/scratch"));
        assert_eq!(settings.patch_strategy(), PatchStrategy::BuildVersion);
        assert_eq!(settings.minimum_os_floor(), 12.0);
        assert_eq!(settings.executable_mode(), 0o700);
    }

    #[test]
    fn test_builder_rejects_bad_values() {
        assert!(SettingsBuilder::new().minimum_os_floor(f64::NAN).build().is_err());
        assert!(SettingsBuilder::new().minimum_os_floor(-1.0).build().is_err());
        assert!(SettingsBuilder::new().executable_mode(0o100755).build().is_err());
    }
}
