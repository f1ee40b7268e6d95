//! Two-phase configuration entry lifecycle
//!
//! Entries are built in two phases. Construction parses and validates the
//! raw configuration without touching the database. Some fields can only be
//! computed once a datacube index is available; those are *declared unready*
//! during construction and filled in by [`ConfigEntry::make_ready`].
//!
//! Unready fields are held in [`Deferred`] cells. Reading one before it has
//! been set is a [`ConfigError::NotReady`] error rather than a silent default.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::datacube::DatacubeIndex;
use crate::node::RawConfigNode;
use crate::{ConfigError, Result};

/// Lifecycle state of a configuration entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryState {
    /// Second-phase initialisation outstanding; holds the unset field names.
    Unready(BTreeSet<String>),
    /// Terminal.
    Ready,
}

/// State shared by every configuration entry: its raw configuration and
/// readiness.
#[derive(Debug, Clone)]
pub struct EntryCore {
    raw: Arc<RawConfigNode>,
    state: EntryState,
}

impl EntryCore {
    pub fn new(raw: RawConfigNode) -> Self {
        Self {
            raw: Arc::new(raw),
            state: EntryState::Unready(BTreeSet::new()),
        }
    }

    /// The (inclusion- and inheritance-expanded) raw configuration.
    pub fn raw_cfg(&self) -> &RawConfigNode {
        &self.raw
    }

    /// Shared handle on the raw configuration, for registries and children.
    pub fn shared_raw(&self) -> Arc<RawConfigNode> {
        Arc::clone(&self.raw)
    }

    pub fn state(&self) -> &EntryState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, EntryState::Ready)
    }

    /// Field names declared unready and not yet set.
    pub fn pending(&self) -> Vec<&str> {
        match &self.state {
            EntryState::Unready(fields) => fields.iter().map(String::as_str).collect(),
            EntryState::Ready => Vec::new(),
        }
    }

    /// Declare a field that cannot be set until the second phase.
    pub fn declare_unready(&mut self, name: &str) -> Result<()> {
        match &mut self.state {
            EntryState::Unready(fields) => {
                fields.insert(name.to_string());
                Ok(())
            }
            EntryState::Ready => Err(ConfigError::invalid(format!(
                "Cannot declare {name} as unready on a ready object"
            ))),
        }
    }

    /// Declare an unready field and return the cell that will hold it.
    pub fn declare<T>(&mut self, name: &'static str) -> Result<Deferred<T>> {
        self.declare_unready(name)?;
        Ok(Deferred { name, value: None })
    }

    /// Record that `name` has been written.
    pub fn mark_set(&mut self, name: &str) {
        if let EntryState::Unready(fields) = &mut self.state {
            fields.remove(name);
        }
    }

    /// Write a deferred field, marking it set.
    pub fn fill<T>(&mut self, cell: &mut Deferred<T>, value: T) {
        cell.value = Some(value);
        self.mark_set(cell.name);
    }

    /// Fail if `name` is still awaiting second-phase initialisation.
    pub fn check_readable(&self, name: &str) -> Result<()> {
        match &self.state {
            EntryState::Unready(fields) if fields.contains(name) => {
                Err(ConfigError::not_ready(fields.iter().cloned()))
            }
            _ => Ok(()),
        }
    }

    /// Base second-phase behaviour: every declared field must be set.
    pub fn mark_ready(&mut self) -> Result<()> {
        if let EntryState::Unready(fields) = &self.state {
            if !fields.is_empty() {
                return Err(ConfigError::not_ready(fields.iter().cloned()));
            }
        }
        self.state = EntryState::Ready;
        Ok(())
    }
}

/// A field populated during second-phase initialisation.
#[derive(Debug, Clone)]
pub struct Deferred<T> {
    name: &'static str,
    value: Option<T>,
}

impl<T> Deferred<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Read the field, failing with [`ConfigError::NotReady`] if unset.
    pub fn get(&self) -> Result<&T> {
        self.value
            .as_ref()
            .ok_or_else(|| ConfigError::not_ready([self.name]))
    }
}

/// Contract implemented by every configuration entry.
pub trait ConfigEntry {
    fn core(&self) -> &EntryCore;

    fn core_mut(&mut self) -> &mut EntryCore;

    /// Second-phase initialisation against a datacube index.
    ///
    /// Implementations populate their deferred fields and then call
    /// [`EntryCore::mark_ready`].
    fn make_ready(&mut self, _dc: &dyn DatacubeIndex) -> Result<()> {
        self.core_mut().mark_ready()
    }

    fn is_ready(&self) -> bool {
        self.core().is_ready()
    }

    fn raw_cfg(&self) -> &RawConfigNode {
        self.core().raw_cfg()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn declare_after_ready_fails() {
        let mut core = EntryCore::new(json!({}));
        core.mark_ready().unwrap();
        assert!(core.is_ready());
        assert!(core.declare_unready("late").is_err());
    }

    #[test]
    fn mark_ready_enumerates_missing_fields() {
        let mut core = EntryCore::new(json!({}));
        core.declare_unready("products").unwrap();
        core.declare_unready("flags_def").unwrap();

        let err = core.mark_ready().unwrap_err();
        match err {
            ConfigError::NotReady { fields } => {
                assert_eq!(fields.into_iter().collect::<Vec<_>>(), ["flags_def", "products"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!core.is_ready());
    }

    #[test]
    fn only_pending_fields_are_guarded() {
        let mut core = EntryCore::new(json!({}));
        core.declare_unready("products").unwrap();
        assert!(core.check_readable("products").unwrap_err().is_not_ready());
        assert!(core.check_readable("name").is_ok());

        core.mark_set("products");
        assert!(core.check_readable("products").is_ok());
        assert!(core.pending().is_empty());
    }

    #[test]
    fn fill_marks_deferred_field_set() {
        let mut core = EntryCore::new(json!({}));
        let mut cell: Deferred<u32> = core.declare("info_mask").unwrap();
        assert!(cell.get().unwrap_err().is_not_ready());
        assert_eq!(core.pending(), vec!["info_mask"]);

        core.fill(&mut cell, 7);
        assert_eq!(*cell.get().unwrap(), 7);
        assert!(core.pending().is_empty());
        core.mark_ready().unwrap();
    }
}
