//! Typed view over a bundle's `Info.plist`.
//!
//! [`Manifest`] keeps the property list as an ordered dictionary and offers
//! typed projections over it. A projection that meets a missing key or a
//! value of another type yields `None`. The handful of keys every app bundle
//! carries have dedicated accessors that treat absence as an error.

use crate::sideload::error::{Error, ErrorExt, Result};
use plist::{Dictionary, Value};
use std::path::{Path, PathBuf};

/// File name of the manifest at the bundle root.
pub const MANIFEST_FILE_NAME: &str = "Info.plist";

const MINIMUM_OS_VERSION: &str = "MinimumOSVersion";
const BUNDLE_NAME: &str = "CFBundleName";
const DISPLAY_NAME: &str = "CFBundleDisplayName";
const BUNDLE_IDENTIFIER: &str = "CFBundleIdentifier";
const EXECUTABLE_NAME: &str = "CFBundleExecutable";

/// The structured metadata of an app bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    path: PathBuf,
    storage: Dictionary,
}

impl Manifest {
    /// Loads the manifest at `path` (XML or binary property list).
    ///
    /// # Errors
    ///
    /// [`Error::Manifest`] when the file is missing, unreadable, or its root
    /// is not a dictionary.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let malformed = |reason: String| Error::Manifest {
            path: path.to_path_buf(),
            reason,
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| malformed(e.to_string()))?;
        let value = Value::from_reader(std::io::Cursor::new(bytes))
            .map_err(|e| malformed(e.to_string()))?;

        let storage = value
            .into_dictionary()
            .ok_or_else(|| malformed("root is not a dictionary".to_string()))?;

        Ok(Self {
            path: path.to_path_buf(),
            storage,
        })
    }

    /// Wraps an in-memory dictionary that persists to `path`.
    pub fn from_dictionary(path: impl Into<PathBuf>, storage: Dictionary) -> Self {
        Self {
            path: path.into(),
            storage,
        }
    }

    /// Returns a copy of this manifest that persists to `path` instead.
    pub fn retargeted(&self, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            storage: self.storage.clone(),
        }
    }

    /// The path this manifest was loaded from and persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying dictionary.
    pub fn as_dictionary(&self) -> &Dictionary {
        &self.storage
    }

    // Typed projections

    /// Raw value for `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.storage.get(key)
    }

    /// String value for `key`.
    pub fn string(&self, key: &str) -> Option<&str> {
        self.storage.get(key).and_then(Value::as_string)
    }

    /// Boolean value for `key`.
    pub fn boolean(&self, key: &str) -> Option<bool> {
        self.storage.get(key).and_then(Value::as_boolean)
    }

    /// Array of strings for `key`; `None` if any element is not a string.
    pub fn strings(&self, key: &str) -> Option<Vec<String>> {
        self.array(key)?
            .iter()
            .map(|v| v.as_string().map(str::to_owned))
            .collect()
    }

    /// Array of numbers for `key`, as floating point.
    pub fn numbers(&self, key: &str) -> Option<Vec<f64>> {
        self.array(key)?
            .iter()
            .map(|v| match v {
                Value::Real(r) => Some(*r),
                Value::Integer(i) => i.as_signed().map(|i| i as f64),
                _ => None,
            })
            .collect()
    }

    /// Array of integers for `key`; reals are rejected.
    pub fn integers(&self, key: &str) -> Option<Vec<i64>> {
        self.array(key)?
            .iter()
            .map(|v| v.as_signed_integer())
            .collect()
    }

    /// Nested dictionary for `key`.
    pub fn dictionary(&self, key: &str) -> Option<&Dictionary> {
        self.storage.get(key).and_then(Value::as_dictionary)
    }

    /// Nested array for `key`.
    pub fn array(&self, key: &str) -> Option<&Vec<Value>> {
        self.storage.get(key).and_then(Value::as_array)
    }

    /// Inserts or replaces `key`, keeping its position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.storage.insert(key.into(), value.into());
    }

    /// Removes `key`, returning its previous value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.storage.remove(key)
    }

    // Keys every app bundle carries

    fn required(&self, key: &'static str) -> Result<&str> {
        self.string(key).ok_or(Error::MissingManifestKey { key })
    }

    /// `MinimumOSVersion`.
    pub fn minimum_os_version(&self) -> Result<&str> {
        self.required(MINIMUM_OS_VERSION)
    }

    /// Overwrites `MinimumOSVersion`.
    pub fn set_minimum_os_version(&mut self, version: impl Into<String>) {
        self.set(MINIMUM_OS_VERSION, version.into());
    }

    /// `CFBundleName`.
    pub fn bundle_name(&self) -> Result<&str> {
        self.required(BUNDLE_NAME)
    }

    /// `CFBundleDisplayName`.
    pub fn display_name(&self) -> Result<&str> {
        self.required(DISPLAY_NAME)
    }

    /// `CFBundleIdentifier`.
    pub fn bundle_identifier(&self) -> Result<&str> {
        self.required(BUNDLE_IDENTIFIER)
    }

    /// `CFBundleExecutable`.
    pub fn executable_name(&self) -> Result<&str> {
        self.required(EXECUTABLE_NAME)
    }

    /// Raises `MinimumOSVersion` to `floor` when it is currently lower.
    ///
    /// A whole-number floor is written without a fractional part (`11.0`
    /// becomes `"11"`). Values at or above the floor are left untouched, so
    /// the version never decreases. Returns whether the manifest changed.
    pub fn enforce_minimum_version(&mut self, floor: f64) -> Result<bool> {
        let current = self.minimum_os_version()?;
        let parsed = parse_version_number(current).ok_or_else(|| Error::InvalidMinimumVersion {
            value: current.to_string(),
        })?;

        if parsed >= floor {
            return Ok(false);
        }

        let raised = if floor.fract() == 0.0 {
            format!("{}", floor as i64)
        } else {
            floor.to_string()
        };
        log::info!("Raising MinimumOSVersion from {} to {}", current, raised);
        self.set_minimum_os_version(raised);
        Ok(true)
    }

    /// Writes the manifest back to the path it was loaded from, as XML.
    pub async fn persist(&self) -> Result<()> {
        self.persist_to(&self.path).await
    }

    /// Writes the manifest to `path` as XML.
    pub async fn persist_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut buffer = Vec::new();
        Value::Dictionary(self.storage.clone()).to_writer_xml(&mut buffer)?;
        tokio::fs::write(path, buffer)
            .await
            .fs_context("writing manifest", path)?;
        Ok(())
    }
}

/// Reads a version string as a decimal number.
///
/// `"9.0"` and `"14"` parse directly. Three-component versions such as
/// `"12.4.1"` are read by their `major.minor` prefix.
fn parse_version_number(version: &str) -> Option<f64> {
    let version = version.trim();
    if let Ok(number) = version.parse::<f64>() {
        return Some(number);
    }

    let mut parts = version.split('.');
    let major = parts.next()?;
    let minor = parts.next().unwrap_or("0");
    if major.is_empty() || !major.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if minor.is_empty() || !minor.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    format!("{major}.{minor}").parse().ok()
}
