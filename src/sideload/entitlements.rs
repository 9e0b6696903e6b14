//! Kind-tagged entitlement sets.
//!
//! Code signatures carry entitlements as an untyped property list. Only three
//! shapes are meaningful to this crate: booleans, strings and lists of
//! strings. [`EntitlementMap::parse`] classifies raw values into those kinds
//! and drops anything else.

use crate::sideload::{
    error::{Error, ErrorExt, Result},
    tools::Inspector,
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, path::Path};

/// A single entitlement value.
///
/// Variant order is the decode priority: a value readable as several kinds
/// resolves to the first that fits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Entitlement {
    /// `<true/>` or `<false/>`.
    Boolean(bool),
    /// An array whose elements are all strings.
    Strings(Vec<String>),
    /// A scalar string.
    String(String),
}

impl Entitlement {
    /// Classifies a raw property list value. `None` for any other shape.
    pub fn classify(value: &plist::Value) -> Option<Self> {
        if let Some(flag) = value.as_boolean() {
            return Some(Entitlement::Boolean(flag));
        }

        if let Some(items) = value.as_array() {
            return items
                .iter()
                .map(|item| item.as_string().map(str::to_owned))
                .collect::<Option<Vec<_>>>()
                .map(Entitlement::Strings);
        }

        value
            .as_string()
            .map(|s| Entitlement::String(s.to_owned()))
    }

    /// Converts back into a property list value.
    pub fn to_value(&self) -> plist::Value {
        match self {
            Entitlement::Boolean(flag) => plist::Value::Boolean(*flag),
            Entitlement::Strings(items) => {
                plist::Value::Array(items.iter().cloned().map(plist::Value::String).collect())
            }
            Entitlement::String(s) => plist::Value::String(s.clone()),
        }
    }
}

/// Entitlements keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntitlementMap {
    entries: BTreeMap<String, Entitlement>,
}

impl EntitlementMap {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifies every entry of `raw`, dropping values of unsupported kinds.
    pub fn parse(raw: &plist::Dictionary) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in raw {
            match Entitlement::classify(value) {
                Some(entitlement) => {
                    entries.insert(key.clone(), entitlement);
                }
                None => log::warn!("Dropping entitlement {key} with unsupported value {value:?}"),
            }
        }
        Self { entries }
    }

    /// Reads and classifies the entitlements of `path`'s live signature.
    ///
    /// # Errors
    ///
    /// [`Error::SignatureRead`] when the inspector cannot read the signature.
    pub async fn read_from_signature<I: Inspector>(inspector: &I, path: &Path) -> Result<Self> {
        let raw = inspector
            .signature_entitlements(path)
            .await
            .map_err(|e| match e {
                e @ Error::SignatureRead { .. } => e,
                other => Error::SignatureRead {
                    path: path.to_path_buf(),
                    reason: other.to_string(),
                },
            })?;
        Ok(Self::parse(&raw))
    }

    /// Looks up an entitlement.
    pub fn get(&self, key: &str) -> Option<&Entitlement> {
        self.entries.get(key)
    }

    /// Boolean entitlement, `None` if absent or of another kind.
    pub fn boolean(&self, key: &str) -> Option<bool> {
        match self.entries.get(key)? {
            Entitlement::Boolean(flag) => Some(*flag),
            _ => None,
        }
    }

    /// String entitlement, `None` if absent or of another kind.
    pub fn string(&self, key: &str) -> Option<&str> {
        match self.entries.get(key)? {
            Entitlement::String(s) => Some(s),
            _ => None,
        }
    }

    /// String-list entitlement, `None` if absent or of another kind.
    pub fn strings(&self, key: &str) -> Option<&[String]> {
        match self.entries.get(key)? {
            Entitlement::Strings(items) => Some(items),
            _ => None,
        }
    }

    /// Adds or replaces an entitlement.
    pub fn insert(&mut self, key: impl Into<String>, value: Entitlement) -> Option<Entitlement> {
        self.entries.insert(key.into(), value)
    }

    /// Number of entitlements.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entitlements in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Entitlement)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The set as a property list dictionary.
    pub fn to_dictionary(&self) -> plist::Dictionary {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_value()))
            .collect()
    }

    /// Serializes the set as an XML property list.
    pub fn to_xml(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        plist::to_writer_xml(&mut buffer, self)?;
        Ok(buffer)
    }

    /// Decodes an XML (or binary) property list produced by [`Self::to_xml`].
    pub fn from_xml(bytes: &[u8]) -> Result<Self> {
        Ok(plist::from_bytes(bytes)?)
    }

    /// Writes the set to `path` as an XML property list.
    pub async fn write_xml(&self, path: &Path) -> Result<()> {
        let bytes = self.to_xml()?;
        tokio::fs::write(path, bytes)
            .await
            .fs_context("writing entitlements", path)
    }
}

impl<'a> IntoIterator for &'a EntitlementMap {
    type Item = (&'a String, &'a Entitlement);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Entitlement>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
