//! Raw configuration trees
//!
//! Configuration arrives as untyped JSON-like data. These helpers give the
//! entry parsers typed, error-reporting access to it.

use serde_json::{Map, Value};

use crate::{ConfigError, Result};

/// An untyped configuration tree: mappings, sequences and scalars.
pub type RawConfigNode = Value;

/// A configuration mapping.
pub type CfgMap = Map<String, Value>;

/// Marker key set on fragments whose `inherits` directive has been applied.
pub const INHERITANCE_EXPANDED: &str = "inheritance_expanded";

/// View `node` as a mapping, naming `context` in the error.
pub fn as_map<'a>(node: &'a RawConfigNode, context: &str) -> Result<&'a CfgMap> {
    node.as_object()
        .ok_or_else(|| ConfigError::invalid(format!("{context} must be a mapping, got {}", kind(node))))
}

/// Required string field.
pub fn req_str<'a>(cfg: &'a CfgMap, key: &str, context: &str) -> Result<&'a str> {
    match cfg.get(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(ConfigError::invalid(format!(
            "{context}: '{key}' must be a string, got {}",
            kind(other)
        ))),
        None => Err(ConfigError::missing(context, key)),
    }
}

/// Optional string field; `null` counts as absent.
pub fn opt_str<'a>(cfg: &'a CfgMap, key: &str, context: &str) -> Result<Option<&'a str>> {
    match cfg.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ConfigError::invalid(format!(
            "{context}: '{key}' must be a string, got {}",
            kind(other)
        ))),
    }
}

/// Optional boolean field with a default.
pub fn bool_or(cfg: &CfgMap, key: &str, default: bool) -> bool {
    cfg.get(key).and_then(Value::as_bool).unwrap_or(default)
}

/// Optional list of strings; absent or `null` gives an empty list.
pub fn str_list(cfg: &CfgMap, key: &str, context: &str) -> Result<Vec<String>> {
    match cfg.get(key) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| {
                    ConfigError::invalid(format!("{context}: '{key}' must be a list of strings"))
                })
            })
            .collect(),
        Some(other) => Err(ConfigError::invalid(format!(
            "{context}: '{key}' must be a list, got {}",
            kind(other)
        ))),
    }
}

/// Render a scalar as a lookup-key string.
///
/// Key values in `inherits` directives may be written as numbers; they are
/// compared as text.
pub fn key_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn kind(node: &Value) -> &'static str {
    match node {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn req_str_reports_missing_and_mistyped() {
        let cfg = json!({"name": "ls8", "count": 3});
        let map = as_map(&cfg, "layer").unwrap();

        assert_eq!(req_str(map, "name", "layer").unwrap(), "ls8");
        assert!(matches!(
            req_str(map, "title", "layer"),
            Err(ConfigError::MissingField { .. })
        ));
        assert!(matches!(
            req_str(map, "count", "layer"),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn str_list_defaults_to_empty() {
        let cfg = json!({"keywords": ["a", "b"], "empty": null});
        let map = as_map(&cfg, "layer").unwrap();

        assert_eq!(str_list(map, "keywords", "layer").unwrap(), vec!["a", "b"]);
        assert!(str_list(map, "empty", "layer").unwrap().is_empty());
        assert!(str_list(map, "absent", "layer").unwrap().is_empty());
    }

    #[test]
    fn key_text_accepts_scalars_only() {
        assert_eq!(key_text(&json!("ls8")).as_deref(), Some("ls8"));
        assert_eq!(key_text(&json!(7)).as_deref(), Some("7"));
        assert_eq!(key_text(&json!({"a": 1})), None);
    }
}
