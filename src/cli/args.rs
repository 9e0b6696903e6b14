//! Command line argument parsing and validation.
//!
//! One command, two paths: point it at an `.ipa` or `.app` and a destination.

use crate::{
    error::{CliError, Result},
    sideload::{PatchStrategy, Settings, SettingsBuilder},
};
use clap::Parser;
use path_absolutize::Absolutize;
use std::path::{Path, PathBuf};

/// Repackage an iOS app so it launches natively on an Apple Silicon Mac
#[derive(Parser, Debug)]
#[command(
    name = "kodegen_bundler_sideload",
    version,
    about = "Repackage an iOS app so it launches natively on an Apple Silicon Mac",
    long_about = "Retargets every executable image of an iOS app to Mac Catalyst, re-signs it
ad-hoc with its original entitlements and wraps it in a launchable directory.

Usage:
  kodegen_bundler_sideload Foo.ipa /Applications/Foo.app
  kodegen_bundler_sideload --vtool Payload/Foo.app ~/Applications/Foo.app"
)]
pub struct Args {
    /// The .ipa archive or .app directory to repackage
    #[arg(index = 1, value_name = "SOURCE")]
    pub source: PathBuf,

    /// Where to create the wrapped app
    #[arg(index = 2, value_name = "DESTINATION")]
    pub destination: PathBuf,

    /// Patch build versions with vtool instead of rewriting load commands
    #[arg(short = 'v', long = "vtool")]
    pub vtool: bool,

    /// Scratch directory for extraction and signing files
    #[arg(long, value_name = "DIR", env = "KODEGEN_SIDELOAD_SCRATCH")]
    pub scratch_dir: Option<PathBuf>,

    /// Lowest MinimumOSVersion written into the app's Info.plist
    #[arg(long, value_name = "VERSION", default_value_t = 11.0)]
    pub minimum_os: f64,

    /// Show per-image progress
    #[arg(long)]
    pub verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate arguments for consistency
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| CliError::InvalidArguments { reason };
        if self.source.as_os_str().is_empty() {
            return Err(invalid("Source path is required".to_string()).into());
        }
        if self.destination.as_os_str().is_empty() {
            return Err(invalid("Destination path is required".to_string()).into());
        }
        if !self.minimum_os.is_finite() || self.minimum_os < 0.0 {
            return Err(invalid(format!("Invalid minimum OS version: {}", self.minimum_os)).into());
        }
        Ok(())
    }

    /// Selected platform patch strategy
    pub fn patch_strategy(&self) -> PatchStrategy {
        if self.vtool {
            PatchStrategy::BuildVersion
        } else {
            PatchStrategy::Masquerade
        }
    }

    /// Absolute source path
    pub fn source_path(&self) -> Result<PathBuf> {
        absolutize("source", &self.source)
    }

    /// Absolute destination path
    pub fn destination_path(&self) -> Result<PathBuf> {
        absolutize("destination", &self.destination)
    }

    /// Pipeline settings for this invocation
    pub fn settings(&self) -> Result<Settings> {
        let mut builder = SettingsBuilder::new()
            .patch_strategy(self.patch_strategy())
            .minimum_os_floor(self.minimum_os);
        if let Some(dir) = &self.scratch_dir {
            builder = builder.scratch_root(absolutize("scratch", dir)?);
        }
        Ok(builder.build()?)
    }
}

fn absolutize(argument: &str, path: &Path) -> Result<PathBuf> {
    path.absolutize()
        .map(|p| p.into_owned())
        .map_err(|e| {
            CliError::UnresolvablePath {
                argument: argument.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
}

/// Configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Output manager for colored terminal output
    output: super::OutputManager,
}

impl RuntimeConfig {
    /// Create runtime configuration
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self {
            output: super::OutputManager::new(verbose, quiet),
        }
    }

    /// Get a reference to the output manager
    pub fn output(&self) -> &super::OutputManager {
        &self.output
    }
}

impl From<&Args> for RuntimeConfig {
    fn from(args: &Args) -> Self {
        Self::new(args.verbose, args.quiet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_vtool_flag_selects_build_version() {
        let args = Args::try_parse_from(["sideload", "-v", "Foo.ipa", "out"]).unwrap();
        assert_eq!(args.patch_strategy(), PatchStrategy::BuildVersion);

        let args = Args::try_parse_from(["sideload", "Foo.ipa", "out"]).unwrap();
        assert_eq!(args.patch_strategy(), PatchStrategy::Masquerade);
        assert_eq!(args.minimum_os, 11.0);
    }

    #[test]
    fn test_settings_from_args() {
        let args = Args::try_parse_from([
            "sideload",
            "--scratch-dir",
            "/tmp/scratch",
            "--minimum-os",
            "12.5",
            "Foo.ipa",
            "out",
        ])
        .unwrap();
        let settings = args.settings().unwrap();
        assert_eq!(settings.scratch_root(), Path::new("/tmp/scratch"));
        assert_eq!(settings.minimum_os_floor(), 12.5);
    }

    #[test]
    fn test_paths_are_absolutized() {
        let args = Args::try_parse_from(["sideload", "Foo.ipa", "out/Foo.app"]).unwrap();
        assert!(args.source_path().unwrap().is_absolute());
        assert!(args.destination_path().unwrap().ends_with("out/Foo.app"));
    }

    #[test]
    fn test_validate_rejects_negative_floor() {
        let args =
            Args::try_parse_from(["sideload", "--minimum-os=-1", "Foo.ipa", "out"]).unwrap();
        let error = args.validate().unwrap_err();
        assert!(matches!(
            error,
            crate::SideloadError::Cli(CliError::InvalidArguments { .. })
        ));
        assert_eq!(error.exit_code(), crate::error::FAILURE_EXIT_CODE);
    }
}
