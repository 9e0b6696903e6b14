//! Kodegen Sideload - repackage iOS apps to launch natively on Apple Silicon Macs.
//!
//! Takes an `.ipa` archive or `.app` directory, retargets its executables to
//! Mac Catalyst, re-signs it ad-hoc and wraps it for the macOS shell.

use kodegen_bundler_sideload::cli;
use kodegen_bundler_sideload::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            output.error(&format!("Fatal error: {e}"));

            for suggestion in e.recovery_suggestions() {
                let _ = output.indent(&suggestion);
            }

            process::exit(e.exit_code());
        }
    }
}
