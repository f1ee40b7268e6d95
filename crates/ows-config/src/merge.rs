//! Deep merge of configuration fragments

use serde_json::Value;

use crate::node::RawConfigNode;

/// Merge `child` over `parent`, returning a new tree.
///
/// Keys only in the parent are inherited. Where both sides hold a mapping
/// the merge recurses; otherwise the child's value wins outright, so lists
/// are replaced rather than concatenated.
pub fn deep_merge(parent: &RawConfigNode, child: &RawConfigNode) -> RawConfigNode {
    let mut merged = parent.clone();
    deep_merge_value(&mut merged, child);
    merged
}

/// In-place form of [`deep_merge`]: `child` is merged into `parent`.
///
/// A key the child sets always overrides the parent's value, unless both
/// values are mappings, in which case the override applies key by key.
/// A child `null` is an override like any other value and clears the
/// parent's entry.
pub fn deep_merge_value(parent: &mut Value, child: &Value) {
    if let (Some(parent_map), Some(child_map)) = (parent.as_object_mut(), child.as_object()) {
        for (key, child_val) in child_map {
            match parent_map.get_mut(key) {
                Some(parent_val) => deep_merge_value(parent_val, child_val),
                None => {
                    parent_map.insert(key.clone(), child_val.clone());
                }
            }
        }
        return;
    }
    *parent = child.clone();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn nested_mappings_merge() {
        let parent = json!({"legend": {"units": "m", "decimal_places": 1}, "title": "P"});
        let child = json!({"legend": {"units": "km"}});
        assert_eq!(
            deep_merge(&parent, &child),
            json!({"legend": {"units": "km", "decimal_places": 1}, "title": "P"})
        );
    }

    #[test]
    fn lists_are_replaced() {
        let parent = json!({"needed_bands": ["red", "green", "blue"]});
        let child = json!({"needed_bands": ["nir"]});
        assert_eq!(deep_merge(&parent, &child), json!({"needed_bands": ["nir"]}));
    }

    #[test]
    fn scalar_replaces_mapping() {
        let parent = json!({"legend": {"show_legend": true}});
        let child = json!({"legend": null});
        assert_eq!(deep_merge(&parent, &child), json!({"legend": null}));
    }
}
