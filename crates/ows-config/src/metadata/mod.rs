//! Metadata separation and translation
//!
//! Display text (titles, abstracts, keywords, legend labels, ...) is not read
//! straight from an entry's raw configuration. Instead each piece is
//! registered at parse time under a dotted `label.field` key, with the raw
//! configuration value as its default. Reads go through
//! [`MetadataRegistry::read`], which lets the text be overridden by an
//! external message catalog or translated, without editing the primary
//! configuration.
//!
//! Resolution order for a read:
//!
//! 1. the translator, if internationalisation is enabled and it returns
//!    something other than the key itself;
//! 2. the message catalog, if one is configured, falling back to the
//!    registered default when the catalog has no (non-empty) message;
//! 3. the registered default.

mod fields;

pub use fields::{
    Attribution, FLD_ABSTRACT, FLD_ACCESS_CONSTRAINTS, FLD_ATTRIBUTION, FLD_CONTACT_ORGANISATION,
    FLD_CONTACT_POSITION, FLD_FEES, FLD_KEYWORDS, FLD_TITLE, FLD_UNITS, InheritedMetadata,
    MetadataContext, MetadataFlags, MetadataOwner, ParsedMetadata, parse_metadata,
    register_tick_labels, register_value_rules,
};

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Gettext-style translation: returns the key itself when untranslated.
pub trait Translator: Send + Sync {
    fn translate(&self, key: &str) -> String;
}

impl<F> Translator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn translate(&self, key: &str) -> String {
        self(key)
    }
}

/// A message from an external catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub string: Option<String>,
}

/// An externally maintained message catalog (e.g. a parsed `.po` file).
pub trait MessageCatalog: Send + Sync {
    fn get(&self, key: &str) -> Option<Message>;
}

impl MessageCatalog for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<Message> {
        HashMap::get(self, key).map(|s| Message {
            id: key.to_string(),
            string: Some(s.clone()),
        })
    }
}

impl MessageCatalog for BTreeMap<String, String> {
    fn get(&self, key: &str) -> Option<Message> {
        BTreeMap::get(self, key).map(|s| Message {
            id: key.to_string(),
            string: Some(s.clone()),
        })
    }
}

/// A registered piece of metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    /// The default value from the raw configuration.
    pub value: String,
    /// True when copied from a parent entry rather than set locally.
    pub inherited: bool,
}

/// Keyed store of display metadata with translation overlays.
///
/// Populated while configuration loads (`&mut self`) and read-only after;
/// share it behind an `Arc` for request handling. [`reset`](Self::reset)
/// clears it for a full reload.
#[derive(Default, Clone)]
pub struct MetadataRegistry {
    records: HashMap<String, MetadataRecord>,
    internationalised: bool,
    translator: Option<Arc<dyn Translator>>,
    catalog: Option<Arc<dyn MessageCatalog>>,
}

impl fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("records", &self.records.len())
            .field("internationalised", &self.internationalised)
            .field("translator", &self.translator.is_some())
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

pub fn metadata_key(label: &str, field: &str) -> String {
    format!("{label}.{field}")
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a default value, replacing any earlier registration.
    pub fn register(
        &mut self,
        label: &str,
        field: &str,
        value: impl Into<String>,
        inherited: bool,
    ) {
        self.records.insert(
            metadata_key(label, field),
            MetadataRecord {
                value: value.into(),
                inherited,
            },
        );
    }

    /// Read display text for `label.field` through the overlays.
    pub fn read(&self, label: &str, field: &str) -> Option<String> {
        let key = metadata_key(label, field);
        if self.internationalised {
            if let Some(translator) = &self.translator {
                let translated = translator.translate(&key);
                if translated != key {
                    return Some(translated);
                }
            }
        }
        if let Some(catalog) = &self.catalog {
            return match catalog.get(&key).and_then(|m| m.string).filter(|s| !s.is_empty()) {
                Some(message) => Some(message),
                None => self.default_value(label, field).map(str::to_string),
            };
        }
        self.default_value(label, field).map(str::to_string)
    }

    /// The registered default, bypassing translation and catalog.
    pub fn default_value(&self, label: &str, field: &str) -> Option<&str> {
        self.records
            .get(&metadata_key(label, field))
            .map(|r| r.value.as_str())
    }

    /// Whether `label.field` was inherited from a parent entry.
    pub fn is_inherited(&self, label: &str, field: &str) -> bool {
        self.records
            .get(&metadata_key(label, field))
            .is_some_and(|r| r.inherited)
    }

    pub fn set_internationalised(&mut self, enabled: bool) {
        self.internationalised = enabled;
    }

    pub fn internationalised(&self) -> bool {
        self.internationalised
    }

    pub fn set_translator(&mut self, translator: Option<Arc<dyn Translator>>) {
        self.translator = translator;
    }

    /// Share a message catalog across all entries.
    pub fn set_catalog(&mut self, catalog: Option<Arc<dyn MessageCatalog>>) {
        self.catalog = catalog;
    }

    /// Every locally-defined record, sorted by key, for message extraction.
    pub fn export_messages(&self) -> Vec<(String, String)> {
        let mut messages: Vec<_> = self
            .records
            .iter()
            .filter(|(_, r)| !r.inherited)
            .map(|(k, r)| (k.clone(), r.value.clone()))
            .collect();
        messages.sort();
        messages
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop all records and overlays, for a full configuration reload.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
