//! Recursive expansion of `include` directives
//!
//! Any mapping in a raw configuration tree may be replaced by the contents
//! of another document:
//!
//! ```json
//! {"include": "layers/landsat.json"}
//! {"include": "ows_cfgs.landsat.layer_cfg", "type": "python"}
//! ```
//!
//! JSON includes are read from disk (or, when enabled, object storage).
//! "python" includes name a pre-registered configuration object by its fully
//! qualified `module.attribute` path; see [`ObjectRegistry`].

use std::collections::HashMap;

use ows_fs::{ConfigLocation, DocumentLoader, DocumentRef};
use serde_json::Value;

use crate::node::{RawConfigNode, kind};
use crate::{ConfigError, Result};

const INCLUDE: &str = "include";
const INCLUDE_TYPE: &str = "type";

/// Configuration objects addressable by fully qualified name.
///
/// Stands in for module import: `"ows_cfgs.landsat.layer_cfg"` resolves to
/// the object registered as attribute `layer_cfg` of module
/// `ows_cfgs.landsat`.
#[derive(Debug, Clone, Default)]
pub struct ObjectRegistry {
    modules: HashMap<String, HashMap<String, RawConfigNode>>,
}

impl ObjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under a fully qualified `module.attribute` name.
    ///
    /// Re-registering a name replaces the previous object.
    pub fn register(&mut self, qualified_name: &str, value: RawConfigNode) -> Result<()> {
        let (module, attr) = split_qualified(qualified_name)?;
        self.modules
            .entry(module.to_string())
            .or_default()
            .insert(attr.to_string(), value);
        Ok(())
    }

    /// Look up an object by fully qualified name.
    pub fn resolve(&self, qualified_name: &str) -> Result<&RawConfigNode> {
        let unresolvable = || ConfigError::UnresolvableCapability {
            name: qualified_name.to_string(),
        };
        let (module, attr) = split_qualified(qualified_name).map_err(|_| unresolvable())?;
        self.modules
            .get(module)
            .and_then(|attrs| attrs.get(attr))
            .ok_or_else(unresolvable)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

pub(crate) fn split_qualified(name: &str) -> Result<(&str, &str)> {
    match name.rsplit_once('.') {
        Some((module, attr)) if !module.is_empty() && !attr.is_empty() => Ok((module, attr)),
        _ => Err(ConfigError::UnresolvableCapability {
            name: name.to_string(),
        }),
    }
}

/// Expands `include` directives throughout a raw configuration tree.
#[derive(Debug, Clone, Copy)]
pub struct InclusionExpander<'a> {
    loader: &'a DocumentLoader,
    objects: &'a ObjectRegistry,
}

impl<'a> InclusionExpander<'a> {
    pub fn new(loader: &'a DocumentLoader, objects: &'a ObjectRegistry) -> Self {
        Self { loader, objects }
    }

    /// Expand `node` from the process working directory with no prior inclusions.
    pub fn expand_root(&self, node: &RawConfigNode) -> Result<RawConfigNode> {
        let cwd = ConfigLocation::current_dir()?;
        self.expand(node, &cwd, &[])
    }

    /// Recursively expand inclusions in `node`.
    ///
    /// `cwd` is the location relative JSON includes fall back to, and `seen`
    /// is the chain of includes currently being expanded above this node.
    /// The input is never modified; a new tree is returned.
    pub fn expand(
        &self,
        node: &RawConfigNode,
        cwd: &ConfigLocation,
        seen: &[String],
    ) -> Result<RawConfigNode> {
        match node {
            Value::Object(map) => match map.get(INCLUDE) {
                Some(include) => self.expand_include(map, include, cwd, seen),
                None => {
                    let mut expanded = serde_json::Map::with_capacity(map.len());
                    for (key, value) in map {
                        expanded.insert(key.clone(), self.expand(value, cwd, seen)?);
                    }
                    Ok(Value::Object(expanded))
                }
            },
            Value::Array(items) => items
                .iter()
                .map(|item| self.expand(item, cwd, seen))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    fn expand_include(
        &self,
        directive: &serde_json::Map<String, Value>,
        include: &Value,
        cwd: &ConfigLocation,
        seen: &[String],
    ) -> Result<RawConfigNode> {
        let Some(raw_path) = include.as_str() else {
            return Err(ConfigError::malformed(format!(
                "Inclusion target must be a string, got {}",
                kind(include)
            )));
        };
        if seen.iter().any(|s| s == raw_path) {
            return Err(ConfigError::CyclicInclusion {
                include: raw_path.to_string(),
            });
        }
        let mut chain = seen.to_vec();
        chain.push(raw_path.to_string());

        match directive.get(INCLUDE_TYPE) {
            None => self.expand_json(raw_path, cwd, &chain),
            Some(Value::String(t)) if t == "json" => self.expand_json(raw_path, cwd, &chain),
            Some(Value::String(t)) if t == "python" => {
                tracing::debug!(object = raw_path, "Expanding object inclusion");
                let obj = self.objects.resolve(raw_path)?;
                self.expand(obj, cwd, &chain)
            }
            Some(other) => Err(ConfigError::malformed(format!(
                "Unsupported inclusion type: {}",
                other.as_str().map_or_else(|| other.to_string(), str::to_string)
            ))),
        }
    }

    fn expand_json(
        &self,
        raw_path: &str,
        cwd: &ConfigLocation,
        chain: &[String],
    ) -> Result<RawConfigNode> {
        let allow_remote = self.loader.allow_remote();

        // As written: absolute, URL, or relative to the process cwd.
        let direct = DocumentRef::parse(raw_path, allow_remote)
            .map_err(|e| ConfigError::malformed(e.to_string()))?;
        let (doc, json) = match self.loader.load(&direct) {
            Ok(json) => (direct, json),
            Err(first) => {
                // Relative to the including document.
                let relative = cwd
                    .resolve(raw_path, allow_remote)
                    .map_err(|e| ConfigError::malformed(e.to_string()))?;
                match self.loader.load(&relative) {
                    Ok(json) => (relative, json),
                    Err(second) => {
                        tracing::debug!(%first, %second, "JSON inclusion not found");
                        return Err(ConfigError::malformed(format!(
                            "Could not find json file {raw_path}"
                        )));
                    }
                }
            }
        };
        tracing::debug!(document = %doc, depth = chain.len(), "Expanding JSON inclusion");
        let nested_cwd = doc.location()?;
        self.expand(&json, &nested_cwd, chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn objects() -> ObjectRegistry {
        let mut objects = ObjectRegistry::new();
        objects
            .register("cfgs.simple.simple", json!({"test": 123}))
            .unwrap();
        objects
            .register(
                "cfgs.nested.nested",
                json!({"include": "cfgs.simple.simple", "type": "python"}),
            )
            .unwrap();
        objects
            .register(
                "cfgs.nested.infinite_1",
                json!({"include": "cfgs.nested.infinite_1", "type": "python"}),
            )
            .unwrap();
        objects
    }

    fn expand(node: Value) -> Result<Value> {
        let loader = DocumentLoader::new();
        let objects = objects();
        InclusionExpander::new(&loader, &objects).expand_root(&node)
    }

    #[test]
    fn scalars_and_plain_maps_are_unchanged() {
        let node = json!({"a": [1, "two", null, {"b": true}]});
        assert_eq!(expand(node.clone()).unwrap(), node);
    }

    #[test]
    fn python_inclusion_resolves_nested_objects() {
        let node = json!({"things": [{"include": "cfgs.nested.nested", "type": "python"}]});
        assert_eq!(expand(node).unwrap(), json!({"things": [{"test": 123}]}));
    }

    #[test]
    fn self_inclusion_is_cyclic() {
        let err = expand(json!({"include": "cfgs.nested.infinite_1", "type": "python"}))
            .unwrap_err();
        assert!(err.to_string().starts_with("Cyclic inclusion"));
    }

    #[test]
    fn unknown_object_fails() {
        let err = expand(json!({"include": "cfgs.simple.missing", "type": "python"})).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvableCapability { .. }));
        let err = expand(json!({"include": "nodots", "type": "python"})).unwrap_err();
        assert!(matches!(err, ConfigError::UnresolvableCapability { .. }));
    }

    #[test]
    fn unsupported_type_fails() {
        let err = expand(json!({"include": "foo", "type": "yaml"})).unwrap_err();
        assert_eq!(err.to_string(), "Unsupported inclusion type: yaml");
    }

    #[test]
    fn missing_json_file_fails() {
        let err = expand(json!({"include": "definitely/not/here.json"})).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Could not find json file definitely/not/here.json"
        );
    }

    #[test]
    fn sibling_inclusions_do_not_share_history() {
        let node = json!([
            {"include": "cfgs.simple.simple", "type": "python"},
            {"include": "cfgs.simple.simple", "type": "python"}
        ]);
        assert_eq!(expand(node).unwrap(), json!([{"test": 123}, {"test": 123}]));
    }
}
