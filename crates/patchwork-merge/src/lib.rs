//! Ordered attribute overlay.
//!
//! A [`Patch`] is a partial set of named attribute overrides. [`merge`] folds an
//! ordered sequence of patches left to right into a [`MergedRecord`]:
//! - later patches win on conflicting keys
//! - a key keeps the position of its first appearance
//! - keys absent from every patch are absent from the result
//!
//! Merging is total. Errors only exist when decoding patches from JSON or
//! `KEY=VALUE` text (see [`PatchError`]).

mod error;

pub use error::PatchError;
pub use serde_json::Value;

use indexmap::IndexMap;
use serde::Serialize;

/// A partial set of attribute overrides.
///
/// Patches are built once (via [`Patch::with`], [`FromIterator`], or one of the
/// decoding constructors) and then only read.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Patch {
    entries: IndexMap<String, Value>,
}

impl Patch {
    /// Create an empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an attribute.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.insert(key.into(), value.into());
        self
    }

    /// Decode a patch from JSON text. The top-level value must be an object.
    pub fn from_json_str(text: &str) -> Result<Self, PatchError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_json_value(value)
    }

    /// Convert a decoded JSON value into a patch, keeping the object's key order.
    pub fn from_json_value(value: Value) -> Result<Self, PatchError> {
        match value {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(PatchError::NotAnObject {
                found: error::json_kind(&other),
            }),
        }
    }

    /// Build a patch from `KEY=VALUE` strings.
    ///
    /// Each entry is split on its first `=`; the value is kept as a string
    /// (`a=b=c` sets `a` to `"b=c"`). A repeated key keeps its last value.
    pub fn from_assignments<I, S>(assignments: I) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries = IndexMap::new();
        for raw in assignments {
            let raw = raw.as_ref();
            let Some((key, value)) = raw.split_once('=') else {
                return Err(PatchError::InvalidAssignment(raw.to_string()));
            };
            if key.is_empty() {
                return Err(PatchError::EmptyKey(raw.to_string()));
            }
            entries.insert(key.to_string(), Value::String(value.to_string()));
        }
        Ok(Self { entries })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate attributes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<K, V> FromIterator<(K, V)> for Patch
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// The cumulative result of overlaying patches left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MergedRecord {
    entries: IndexMap<String, Value>,
}

impl MergedRecord {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys in order of first appearance across the merged patches.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Reuse this record as a single patch in a later merge.
    pub fn into_patch(self) -> Patch {
        Patch {
            entries: self.entries,
        }
    }
}

impl From<MergedRecord> for Patch {
    fn from(record: MergedRecord) -> Self {
        record.into_patch()
    }
}

/// Combining step of the merge fold: apply one patch onto an accumulator.
pub trait Overlay {
    fn overlay(&mut self, patch: &Patch);
}

impl Overlay for MergedRecord {
    fn overlay(&mut self, patch: &Patch) {
        for (key, value) in &patch.entries {
            // `insert` on an existing key keeps its slot and swaps the value.
            if let Some(previous) = self.entries.insert(key.clone(), value.clone()) {
                tracing::trace!(key = %key, from = %previous, to = %value, "attribute overridden");
            }
        }
    }
}

/// Fold `patches` left to right into one record. Later patches win.
pub fn merge<'a, I>(patches: I) -> MergedRecord
where
    I: IntoIterator<Item = &'a Patch>,
{
    let mut record = MergedRecord::default();
    let mut applied = 0usize;
    for patch in patches {
        record.overlay(patch);
        applied += 1;
    }
    tracing::debug!(patches = applied, keys = record.len(), "merged patches");
    record
}

/// A merged record annotated with where each value came from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TracedRecord {
    record: MergedRecord,
    sources: IndexMap<String, usize>,
    overridden: Vec<Vec<String>>,
}

impl TracedRecord {
    pub fn record(&self) -> &MergedRecord {
        &self.record
    }

    pub fn into_record(self) -> MergedRecord {
        self.record
    }

    /// Index (in merge order) of the patch that supplied the final value of `key`.
    pub fn source_of(&self, key: &str) -> Option<usize> {
        self.sources.get(key).copied()
    }

    /// Keys that patch `index` overwrote from earlier patches.
    pub fn overridden_by(&self, index: usize) -> &[String] {
        self.overridden
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `(key, source index)` pairs in record order.
    pub fn sources(&self) -> impl Iterator<Item = (&str, usize)> {
        self.sources.iter().map(|(k, i)| (k.as_str(), *i))
    }
}

/// Like [`merge`], but also records which patch won each key.
pub fn merge_traced<'a, I>(patches: I) -> TracedRecord
where
    I: IntoIterator<Item = &'a Patch>,
{
    let mut traced = TracedRecord::default();
    for (index, patch) in patches.into_iter().enumerate() {
        let mut overridden = Vec::new();
        for key in patch.entries.keys() {
            if traced.sources.insert(key.clone(), index).is_some() {
                overridden.push(key.clone());
            }
        }
        traced.record.overlay(patch);
        traced.overridden.push(overridden);
    }
    tracing::debug!(
        patches = traced.overridden.len(),
        keys = traced.record.len(),
        "merged patches with provenance"
    );
    traced
}
