//! Error types for sideload operations.
//!
//! Provides contextual error chaining, filesystem-specific errors with path
//! context, and the domain failures of the repackaging pipeline.
//!
//! # Features
//!
//! - **Context trait**: Add context to errors similar to anyhow
//! - **ErrorExt trait**: Filesystem operations with automatic path context
//! - **bail! macro**: Early return with formatted error messages
//!
//! # Example
//!
//! ```no_run
//! use kodegen_bundler_sideload::sideload::{Context, ErrorExt, Result};
//! use std::path::Path;
//!
//! fn read_marker(path: &Path) -> Result<String> {
//!     let contents = std::fs::read_to_string(path)
//!         .fs_context("reading marker file", path)?;
//!
//!     contents
//!         .lines()
//!         .next()
//!         .map(str::to_owned)
//!         .context("marker file is empty")
//! }
//! ```

use std::{
    fmt::Display,
    io,
    path::{self, PathBuf},
};
use thiserror::Error as DeriveError;

/// Errors returned by the sideload pipeline and its components.
#[derive(Debug, DeriveError)]
#[non_exhaustive]
pub enum Error {
    /// Error with context. Created by the [`Context`] trait.
    #[error("{0}: {1}")]
    Context(String, Box<Self>),

    /// File system error with path context.
    ///
    /// Created by the [`ErrorExt`] trait's `fs_context` method.
    #[error("{context} {path}: {error}")]
    Fs {
        /// Context describing the operation (e.g., "reading manifest")
        context: &'static str,
        /// Path that was being accessed
        path: PathBuf,
        /// The underlying I/O error
        error: io::Error,
    },

    /// An external tool could not be started.
    #[error("failed to run command {command}: {error}")]
    CommandFailed {
        /// Command that failed to execute
        command: String,
        /// The underlying error
        error: io::Error,
    },

    /// An external tool ran but reported failure.
    #[error("command {command} exited with {}: {output}", code.map_or_else(|| "signal".to_string(), |c| format!("status {c}")))]
    ToolFailed {
        /// Command line that was executed
        command: String,
        /// Exit status, `None` when terminated by a signal
        code: Option<i32>,
        /// Captured stderr (or stdout when stderr is empty)
        output: String,
    },

    /// No application directory was found where one was expected.
    #[error("no .app bundle found in {}", directory.display())]
    BundleNotFound {
        /// Directory that was searched
        directory: PathBuf,
    },

    /// The bundle's Info.plist is missing or malformed.
    #[error("invalid manifest {}: {reason}", path.display())]
    Manifest {
        /// Path of the manifest file
        path: PathBuf,
        /// What went wrong
        reason: String,
    },

    /// A manifest key every app bundle must carry is absent.
    ///
    /// This is an input contract violation and is never recovered from.
    #[error("manifest is missing required key {key}")]
    MissingManifestKey {
        /// The absent key
        key: &'static str,
    },

    /// The manifest's minimum OS version is not a decimal number.
    #[error("minimum OS version {value:?} is not a number")]
    InvalidMinimumVersion {
        /// The offending value
        value: String,
    },

    /// Entitlements could not be read from a code signature.
    #[error("failed to read signature entitlements of {}: {reason}", path.display())]
    SignatureRead {
        /// Signed path that was inspected
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// The archive could not be unpacked.
    #[error("failed to extract {}: {source}", archive.display())]
    Extraction {
        /// Archive that was being extracted
        archive: PathBuf,
        /// The archive reader's error
        #[source]
        source: zip::result::ZipError,
    },

    /// An image carries an active encryption segment and cannot be patched.
    #[error("{} is encrypted; encrypted apps cannot be repackaged", path.display())]
    EncryptedImage {
        /// The encrypted image
        path: PathBuf,
    },

    /// Generic I/O error.
    #[error("{0}")]
    IoError(#[from] io::Error),

    /// Error walking a directory tree.
    #[error("{0}")]
    WalkdirError(#[from] walkdir::Error),

    /// Path prefix stripping error.
    #[error("{0}")]
    StripError(#[from] path::StripPrefixError),

    /// Property list (plist) parsing/writing error.
    #[error("{0}")]
    Plist(#[from] plist::Error),

    /// Binary parsing error (Mach-O slice discovery).
    #[error("binary parse error: {0}")]
    BinaryParseError(#[from] goblin::error::Error),

    /// Generic error with custom message.
    #[error("{0}")]
    GenericError(String),
}

/// Convenient type alias for Result.
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for adding context to errors.
///
/// Similar to `anyhow::Context` but integrated with this crate's [`Error`].
/// Works with both `Result<T, E>` and `Option<T>`.
pub trait Context<T> {
    /// Add context to an error.
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;

    /// Add context to an error using a closure (lazy evaluation).
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T> Context<T> for Result<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| Error::Context(context.to_string(), Box::new(e)))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.map_err(|e| Error::Context(f().to_string(), Box::new(e)))
    }
}

impl<T> Context<T> for Option<T> {
    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
    {
        self.ok_or_else(|| Error::GenericError(context.to_string()))
    }

    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        self.ok_or_else(|| Error::GenericError(f().to_string()))
    }
}

/// Extension trait for filesystem operations with automatic path context.
pub trait ErrorExt<T> {
    /// Add filesystem context to an I/O error.
    ///
    /// The `context` should be a present-tense verb phrase describing the operation,
    /// e.g., "reading file", "creating directory", "copying bundle".
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> ErrorExt<T> for std::result::Result<T, std::io::Error> {
    fn fs_context(self, context: &'static str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|error| Error::Fs {
            context,
            path: path.into(),
            error,
        })
    }
}

impl Error {
    /// Returns the innermost error, skipping any [`Error::Context`] wrappers.
    pub fn root(&self) -> &Error {
        match self {
            Error::Context(_, inner) => inner.root(),
            other => other,
        }
    }

    /// Whether this error (or the error it wraps) is an encrypted-image halt.
    pub fn is_encrypted_image(&self) -> bool {
        matches!(self.root(), Error::EncryptedImage { .. })
    }
}

/// Macro for early return with error.
///
/// Converts the message into a [`Error::GenericError`] and returns immediately.
///
/// ```ignore
/// bail!("operation failed");
/// bail!("invalid value: {}", value);
/// ```
#[macro_export]
macro_rules! bail {
    ($msg:literal $(,)?) => {
        return Err($crate::sideload::Error::GenericError(format!($msg)))
    };
    ($err:expr $(,)?) => {
        return Err($crate::sideload::Error::GenericError($err.to_string()))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::sideload::Error::GenericError(format!($fmt, $($arg)*)))
    };
}
