//! Expansion of `inherits` directives
//!
//! An extensible entry (a layer or style) may name a parent to inherit from:
//!
//! ```json
//! {"inherits": {"layer": "ls8_nbart", "style": "simple_rgb"}, "title": "Override"}
//! ```
//!
//! If the directive carries every key the entry kind is indexed by (after
//! filling gaps from caller-supplied defaults) the parent is looked up in the
//! [`EntryIndex`] and its raw configuration used. Otherwise the directive is
//! itself treated as a literal parent fragment. The child is then deep-merged
//! over the parent.

use serde_json::Value;

use crate::index::{EntryIndex, EntryKind, KeyValues};
use crate::merge::deep_merge;
use crate::node::{INHERITANCE_EXPANDED, RawConfigNode, key_text, kind};
use crate::{ConfigError, Result};

const INHERITS: &str = "inherits";

/// Whether `raw` has already had its inheritance applied.
pub fn is_expanded(raw: &RawConfigNode) -> bool {
    raw.get(INHERITANCE_EXPANDED)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Apply the `inherits` directive of `raw`, if any.
///
/// * `key_subs` — substitutions passed through to the index lookup.
/// * `key_defaults` — key values used when the directive omits them (e.g.
///   a style's `layer` defaults to the layer being parsed).
///
/// Fragments without a directive, and fragments already marked
/// `inheritance_expanded`, are returned unchanged. The parent's readiness is
/// irrelevant; only its raw configuration is used.
pub fn expand_inherit(
    raw: &RawConfigNode,
    entry_kind: EntryKind,
    index: &EntryIndex,
    key_subs: Option<&KeyValues>,
    key_defaults: Option<&KeyValues>,
) -> Result<RawConfigNode> {
    let Some(child) = raw.as_object() else {
        return Ok(raw.clone());
    };
    if is_expanded(raw) {
        return Ok(raw.clone());
    }
    let Some(inherits) = child.get(INHERITS) else {
        return Ok(raw.clone());
    };
    let Some(directive) = inherits.as_object() else {
        return Err(ConfigError::malformed(format!(
            "'inherits' must be a mapping, got {}",
            kind(inherits)
        )));
    };

    let parent = match lookup_keys(directive, entry_kind, key_defaults) {
        Some(keys) => {
            let record = index.lookup(entry_kind, &keys, key_subs)?;
            tracing::debug!(kind = entry_kind.name, ?keys, "Inheriting from indexed entry");
            record.raw.as_ref().clone()
        }
        None => {
            tracing::debug!(kind = entry_kind.name, "Inheriting from literal fragment");
            inherits.clone()
        }
    };

    let mut overlay = child.clone();
    overlay.remove(INHERITS);
    let mut merged = deep_merge(&parent, &Value::Object(overlay));
    if let Some(map) = merged.as_object_mut() {
        map.remove(INHERITS);
        map.insert(INHERITANCE_EXPANDED.to_string(), Value::Bool(true));
    }
    Ok(merged)
}

/// Resolve the full lookup key for a directive, or `None` if the directive
/// cannot be fully keyed and must be used as a literal fragment.
///
/// Each key comes from the directive, else from `key_defaults`. A directive
/// keyed entirely by defaults still looks up the entry those defaults name.
fn lookup_keys(
    directive: &serde_json::Map<String, Value>,
    entry_kind: EntryKind,
    key_defaults: Option<&KeyValues>,
) -> Option<KeyValues> {
    entry_kind
        .index_keys
        .iter()
        .map(|&k| {
            let value = directive
                .get(k)
                .and_then(key_text)
                .or_else(|| key_defaults.and_then(|d| d.get(k)).cloned())?;
            Some((k.to_string(), value))
        })
        .collect::<Option<KeyValues>>()
        .filter(|keys| !keys.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::keyvals;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    const LAYER: EntryKind = EntryKind {
        name: "layer",
        index_keys: &["layer"],
    };
    const STYLE: EntryKind = EntryKind {
        name: "style",
        index_keys: &["layer", "style"],
    };

    #[test]
    fn literal_parent_is_merged() {
        let child = json!({"inherits": {"a": 1, "b": 2}, "b": 20, "c": 3});
        let merged = expand_inherit(&child, LAYER, &EntryIndex::new(), None, None).unwrap();
        assert_eq!(
            merged,
            json!({"a": 1, "b": 20, "c": 3, "inheritance_expanded": true})
        );
    }

    #[test]
    fn no_directive_is_unchanged() {
        let child = json!({"name": "ls8", "title": "Landsat 8"});
        let merged = expand_inherit(&child, LAYER, &EntryIndex::new(), None, None).unwrap();
        assert_eq!(merged, child);
    }

    #[test]
    fn style_defaults_layer_key() {
        let mut index = EntryIndex::new();
        index
            .register(
                STYLE,
                keyvals([("layer", "ls8"), ("style", "rgb")]),
                Arc::new(json!({"name": "rgb", "title": "RGB", "needed_bands": ["red"]})),
            )
            .unwrap();
        let child = json!({"inherits": {"style": "rgb"}, "name": "rgb2", "title": "RGB 2"});
        let defaults = keyvals([("layer", "ls8")]);

        let merged = expand_inherit(&child, STYLE, &index, None, Some(&defaults)).unwrap();
        assert_eq!(merged["name"], "rgb2");
        assert_eq!(merged["title"], "RGB 2");
        assert_eq!(merged["needed_bands"], json!(["red"]));
        assert!(merged.get("inherits").is_none());
    }

    #[test]
    fn defaults_alone_key_the_lookup() {
        let mut index = EntryIndex::new();
        index
            .register(
                STYLE,
                keyvals([("layer", "ls8"), ("style", "rgb")]),
                Arc::new(json!({"name": "rgb", "needed_bands": ["red"]})),
            )
            .unwrap();
        let child = json!({"inherits": {"title": "ignored"}, "name": "rgb2"});
        let defaults = keyvals([("layer", "ls8"), ("style", "rgb")]);

        let merged = expand_inherit(&child, STYLE, &index, None, Some(&defaults)).unwrap();
        assert_eq!(merged["needed_bands"], json!(["red"]));
        assert!(merged.get("title").is_none());
    }

    #[test]
    fn keyed_lookup_miss_fails() {
        let child = json!({"inherits": {"layer": "nope"}});
        let err = expand_inherit(&child, LAYER, &EntryIndex::new(), None, None).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn non_mapping_directive_is_malformed() {
        let child = json!({"inherits": "ls8"});
        assert!(matches!(
            expand_inherit(&child, LAYER, &EntryIndex::new(), None, None),
            Err(ConfigError::MalformedReference { .. })
        ));
    }
}
