//! Install command implementation.

use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;
use crate::sideload::{Archive, Pipeline};

/// Run one install with the host toolchain
pub(super) async fn execute_install(args: &Args, config: &RuntimeConfig) -> Result<i32> {
    let output = config.output();
    let source = args.source_path()?;
    let destination = args.destination_path()?;
    let settings = args.settings()?;

    let kind = if Archive::is_archive(&source) {
        "archive"
    } else {
        "bundle"
    };
    output.progress(&format!("Repackaging {} {}", kind, source.display()))?;
    output.verbose(&format!(
        "Strategy: {}, minimum OS: {}, scratch: {}",
        settings.patch_strategy(),
        settings.minimum_os_floor(),
        settings.scratch_root().display()
    ))?;

    let report = Pipeline::with_host_tools(settings)
        .install(&source, &destination)
        .await?;

    output.report(&report)?;
    Ok(0)
}
