//! # Kodegen Sideload
//!
//! Repackages iOS application bundles so they launch natively on Apple
//! Silicon Macs.
//!
//! ## Features
//!
//! - **Archive or bundle input**: `.ipa` archives are unpacked into a scratch
//!   directory that is always cleaned up; `.app` directories are used in place
//! - **Platform retargeting**: every executable image is retagged as Mac
//!   Catalyst, either in-process or through `vtool`
//! - **Entitlement preservation**: the original signature's entitlements are
//!   captured up front and re-attached by the final ad-hoc signature
//! - **Encryption guard**: App Store encrypted binaries are refused before
//!   anything is modified
//!
//! ## Usage
//!
//! ```bash
//! kodegen_bundler_sideload Foo.ipa /Applications/Foo.app
//! kodegen_bundler_sideload --vtool Foo.ipa ~/Applications/Foo.app
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Core modules
pub mod cli;
pub mod error;
pub mod sideload;

// Re-export main types for public API
pub use cli::Args;
pub use error::{CliError, Result, SideloadError};
pub use sideload::{Bundle, InstallReport, Pipeline, Settings, SettingsBuilder};
