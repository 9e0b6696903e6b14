//! Command execution for the install workflow.
//!
//! Validates arguments, drives the pipeline and turns its outcome into user
//! feedback and an exit code.

mod install;

use crate::cli::{Args, RuntimeConfig};
use crate::error::Result;

use install::execute_install;

/// Execute the install described by the parsed arguments
///
/// Invalid arguments are returned as [`crate::CliError::InvalidArguments`].
pub async fn execute_command(args: Args) -> Result<i32> {
    args.validate()?;

    let config = RuntimeConfig::from(&args);

    match execute_install(&args, &config).await {
        Ok(exit_code) => Ok(exit_code),
        Err(e) => {
            let output = config.output();
            output.error(&format!("Install failed: {e}"));

            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() && !output.is_quiet() {
                let _ = output.indent("");
                let _ = output.indent("💡 Recovery suggestions:");
                for suggestion in suggestions {
                    let _ = output.indent(&format!("  • {suggestion}"));
                }
            }

            Ok(e.exit_code())
        }
    }
}
