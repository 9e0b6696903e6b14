//! Error types for the sideload command line tool.
//!
//! This module defines the top-level error with actionable messages and
//! recovery suggestions, and maps failures to process exit codes.

use crate::sideload::Error as PipelineError;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, SideloadError>;

/// Exit status for a run halted by an encrypted image.
pub const ENCRYPTED_IMAGE_EXIT_CODE: i32 = 255;

/// Exit status for every other failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Main error type for all sideload operations
#[derive(Error, Debug)]
pub enum SideloadError {
    /// Repackaging pipeline errors
    #[error("Sideload error: {0}")]
    Sideload(#[from] PipelineError),

    /// CLI argument errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },

    /// A path argument could not be resolved
    #[error("Cannot resolve {argument} path: {reason}")]
    UnresolvablePath {
        /// Argument name
        argument: String,
        /// Reason for the error
        reason: String,
    },
}

impl SideloadError {
    /// Get actionable recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<String> {
        let SideloadError::Sideload(error) = self else {
            return vec!["Check the error message above for specific details".to_string()];
        };

        match error.root() {
            PipelineError::EncryptedImage { .. } => vec![
                "Encrypted apps cannot be repackaged; use a decrypted .ipa".to_string(),
                "Check with: otool -l <binary> | grep -A5 LC_ENCRYPTION_INFO".to_string(),
            ],
            PipelineError::BundleNotFound { .. } => vec![
                "Pass an .ipa archive or an .app directory as the source".to_string(),
                "An .ipa must contain Payload/<Name>.app".to_string(),
            ],
            PipelineError::Manifest { .. } | PipelineError::MissingManifestKey { .. } => vec![
                "Ensure the bundle has a valid Info.plist at its root".to_string(),
                "Inspect it with: plutil -p <bundle>/Info.plist".to_string(),
            ],
            PipelineError::Extraction { .. } => {
                vec!["Verify the archive is intact: unzip -t <archive>.ipa".to_string()]
            }
            PipelineError::CommandFailed { .. } => vec![
                "Install the Xcode command line tools: xcode-select --install".to_string(),
            ],
            PipelineError::ToolFailed { .. } => vec![
                "Re-run with RUST_LOG=debug to see the exact tool invocation".to_string(),
            ],
            _ => vec!["Check the error message above for specific details".to_string()],
        }
    }

    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            SideloadError::Sideload(error) => !matches!(
                error.root(),
                PipelineError::EncryptedImage { .. }
                    | PipelineError::MissingManifestKey { .. }
                    | PipelineError::BundleNotFound { .. }
            ),
            SideloadError::Cli(_) => true,
            SideloadError::Io(_) => true,
        }
    }

    /// Process exit status for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            SideloadError::Sideload(error) if error.is_encrypted_image() => {
                ENCRYPTED_IMAGE_EXIT_CODE
            }
            _ => FAILURE_EXIT_CODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_encrypted_image_exit_code() {
        let error = SideloadError::from(PipelineError::EncryptedImage {
            path: PathBuf::from("Foo.app/Foo"),
        });
        assert_eq!(error.exit_code(), ENCRYPTED_IMAGE_EXIT_CODE);
        assert!(!error.is_recoverable());
        assert!(error.recovery_suggestions()[0].contains("decrypted"));
    }

    #[test]
    fn test_other_errors_exit_with_failure() {
        let error = SideloadError::from(CliError::InvalidArguments {
            reason: "nope".to_string(),
        });
        assert_eq!(error.exit_code(), FAILURE_EXIT_CODE);
        assert!(error.is_recoverable());
    }
}
