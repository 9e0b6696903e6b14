//! Repackaging of iOS application bundles for Apple Silicon Macs.
//!
//! An `.ipa` archive or `.app` directory goes in; a wrapper directory that
//! the macOS shell can launch comes out. Along the way every executable image
//! is retargeted to the Mac Catalyst platform and re-sealed with an ad-hoc
//! signature, and the bundle keeps the entitlements it was originally signed
//! with.
//!
//! # Pipeline
//!
//! | Step | Component |
//! |------|-----------|
//! | Unpack `.ipa` into scratch space | [`Archive`], [`Workspace`] |
//! | Read entitlements, manifest, images | [`Bundle`], [`EntitlementMap`], [`Manifest`] |
//! | Refuse encrypted images | [`Inspector`] |
//! | Retarget and re-seal images | [`PlatformPatcher`], [`Signer`] |
//! | Produce `Wrapper/` + `WrappedBundle` | [`WrapperBuilder`] |
//!
//! # Usage
//!
//! ```no_run
//! use kodegen_bundler_sideload::sideload::{Pipeline, SettingsBuilder};
//! use std::path::Path;
//!
//! # async fn example() -> kodegen_bundler_sideload::sideload::Result<()> {
//! let settings = SettingsBuilder::new().build()?;
//! let pipeline = Pipeline::with_host_tools(settings);
//!
//! let report = pipeline
//!     .install(Path::new("Foo.ipa"), Path::new("/Applications/Foo.app"))
//!     .await?;
//! println!("Patched {} of {} images", report.images_patched, report.images_found);
//! # Ok(())
//! # }
//! ```
//!
//! # Host tools
//!
//! The production collaborators need `codesign` and `otool` (and `vtool` for
//! [`PatchStrategy::BuildVersion`]), which ship with the Xcode command line
//! tools.

#![warn(missing_docs)]

mod archive;
mod bundle;
mod entitlements;
mod error;
mod manifest;
mod pipeline;
mod settings;
mod tools;
mod utils;
mod workspace;

// Public re-exports
pub use archive::{ARCHIVE_EXTENSION, Archive, PAYLOAD_DIR};
pub use bundle::{
    BUNDLE_SUFFIX, Bundle, FAT_MAGIC_BYTES, Image, MACHO_64_MAGIC_BYTES, WRAPPED_BUNDLE_LINK,
    WRAPPER_DIR, WrapperBuilder, classify, is_image_magic, listing_reports_encryption,
};
pub use entitlements::{Entitlement, EntitlementMap};
pub use error::{Context, Error, ErrorExt, Result};
pub use manifest::{MANIFEST_FILE_NAME, Manifest};
pub use pipeline::{InstallReport, Pipeline};
pub use settings::{
    DEFAULT_EXECUTABLE_MODE, DEFAULT_MINIMUM_OS_FLOOR, Settings, SettingsBuilder,
    default_scratch_root,
};
pub use tools::{
    CodesignInspector, CodesignSigner, Inspector, MachOPatcher, PatchStrategy, PlatformPatcher,
    Signer, masquerade_as_catalyst,
};
pub use workspace::Workspace;
