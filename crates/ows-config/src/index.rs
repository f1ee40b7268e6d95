//! Indexed lookup of configuration entries
//!
//! Layers and styles can refer to one another: a style may inherit from a
//! style of another layer, a layer from another layer. Entries that can be
//! referred to are keyed by identifying attributes (e.g. `layer` + `style`)
//! and registered in an [`EntryIndex`] as soon as their first phase of
//! construction is complete.
//!
//! The index does not own entries. It records their key values and a shared
//! handle on their raw configuration, which is all inheritance needs; the
//! entries themselves stay with their parent collection.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::entry::ConfigEntry;
use crate::node::RawConfigNode;
use crate::{ConfigError, Result};

/// Identifying key values of an entry, by key attribute name.
pub type KeyValues = BTreeMap<String, String>;

/// A kind of indexed entry and the ordered key attributes identifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryKind {
    pub name: &'static str,
    pub index_keys: &'static [&'static str],
}

impl EntryKind {
    /// Extract this kind's composite key from `keyvals`.
    fn composite(&self, keyvals: &KeyValues) -> Option<Vec<String>> {
        self.index_keys
            .iter()
            .map(|k| keyvals.get(*k).cloned())
            .collect()
    }

    fn missing_keys(&self, keyvals: &KeyValues) -> Vec<&'static str> {
        self.index_keys
            .iter()
            .copied()
            .filter(|k| !keyvals.contains_key(*k))
            .collect()
    }
}

/// An entry that can be looked up by key.
pub trait IndexedEntry: ConfigEntry {
    const KIND: EntryKind;

    fn keyvals(&self) -> &KeyValues;
}

/// What the index knows about a registered entry.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub kind: EntryKind,
    pub keyvals: KeyValues,
    pub raw: Arc<RawConfigNode>,
}

/// Registry of indexed entries, populated during a configuration load.
#[derive(Debug, Clone, Default)]
pub struct EntryIndex {
    records: HashMap<(&'static str, Vec<String>), IndexRecord>,
}

impl EntryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entry's key values and raw configuration.
    ///
    /// Fails if a key attribute required by `kind` is missing, or if an
    /// entry with the same key is already registered.
    pub fn register(
        &mut self,
        kind: EntryKind,
        keyvals: KeyValues,
        raw: Arc<RawConfigNode>,
    ) -> Result<()> {
        let Some(key) = kind.composite(&keyvals) else {
            return Err(ConfigError::invalid(format!(
                "Key value {} missing from keyvals: {keyvals:?}",
                kind.missing_keys(&keyvals).join(", ")
            )));
        };
        if self.records.contains_key(&(kind.name, key.clone())) {
            return Err(ConfigError::invalid(format!(
                "Duplicate {} entry: {}",
                kind.name,
                describe(&keyvals)
            )));
        }
        tracing::debug!(kind = kind.name, key = %describe(&keyvals), "Registered config entry");
        self.records.insert(
            (kind.name, key),
            IndexRecord {
                kind,
                keyvals,
                raw,
            },
        );
        Ok(())
    }

    /// Register a constructed entry.
    pub fn register_entry<E: IndexedEntry>(&mut self, entry: &E) -> Result<()> {
        self.register(E::KIND, entry.keyvals().clone(), entry.core().shared_raw())
    }

    /// Find the entry of `kind` matching `keyvals`.
    ///
    /// `subs` reinterprets key values: when given, the substituted keys are
    /// tried first (e.g. "the same style name, but on a different layer"),
    /// then the keys as written.
    pub fn lookup(
        &self,
        kind: EntryKind,
        keyvals: &KeyValues,
        subs: Option<&KeyValues>,
    ) -> Result<&IndexRecord> {
        if let Some(subs) = subs.filter(|s| !s.is_empty()) {
            let mut substituted = keyvals.clone();
            substituted.extend(subs.iter().map(|(k, v)| (k.clone(), v.clone())));
            if let Some(record) = self.find(kind, &substituted) {
                return Ok(record);
            }
        }
        self.find(kind, keyvals).ok_or_else(|| {
            ConfigError::not_found(format!("No {} named {}", kind.name, describe(keyvals)))
        })
    }

    fn find(&self, kind: EntryKind, keyvals: &KeyValues) -> Option<&IndexRecord> {
        let key = kind.composite(keyvals)?;
        self.records.get(&(kind.name, key))
    }

    pub fn contains(&self, kind: EntryKind, keyvals: &KeyValues) -> bool {
        self.find(kind, keyvals).is_some()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Forget every entry, for a full configuration reload.
    pub fn reset(&mut self) {
        self.records.clear();
    }
}

fn describe(keyvals: &KeyValues) -> String {
    keyvals
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build [`KeyValues`] from string pairs.
pub fn keyvals<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> KeyValues {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
