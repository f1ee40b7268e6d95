//! Configurable function references
//!
//! Several configuration options name a function by its fully qualified name,
//! optionally with fixed arguments:
//!
//! ```json
//! "fuse_func": "ows_funcs.fuse.pq_fuser"
//! "index_function": {
//!     "function": "ows_funcs.band_utils.norm_diff",
//!     "mapped_bands": true,
//!     "kwargs": {"band1": "nir", "band2": "red"}
//! }
//! ```
//!
//! Names resolve against a [`FunctionRegistry`] of capabilities supplied by
//! the host application. The result is an immutable [`FunctionReference`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::inclusion::split_qualified;
use crate::node::{CfgMap, RawConfigNode, bool_or, kind};
use crate::{ConfigError, Result};

/// A resolved, invocable function.
pub type Capability = Arc<dyn Fn(&FunctionCall) -> Result<Value> + Send + Sync>;

/// Maps a band name or alias, as written in configuration, to a canonical band.
pub type BandMapper = Arc<dyn Fn(&str) -> Result<String> + Send + Sync>;

/// Arguments delivered to a [`Capability`].
#[derive(Clone, Default)]
pub struct FunctionCall {
    pub args: Vec<Value>,
    pub kwargs: CfgMap,
    pub band_mapper: Option<BandMapper>,
    pub layer_cfg: Option<Arc<RawConfigNode>>,
}

impl FunctionCall {
    pub fn arg(&self, idx: usize) -> Option<&Value> {
        self.args.get(idx)
    }

    pub fn kwarg(&self, name: &str) -> Option<&Value> {
        self.kwargs.get(name)
    }

    /// Map `band` through the injected band mapper, or return it unchanged.
    pub fn map_band(&self, band: &str) -> Result<String> {
        match &self.band_mapper {
            Some(mapper) => mapper(band),
            None => Ok(band.to_string()),
        }
    }
}

impl fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCall")
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("band_mapper", &self.band_mapper.is_some())
            .field("layer_cfg", &self.layer_cfg.is_some())
            .finish()
    }
}

/// Functions addressable by fully qualified name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Capability>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function under a `module.name` qualified name.
    pub fn register<F>(&mut self, qualified_name: &str, func: F) -> Result<()>
    where
        F: Fn(&FunctionCall) -> Result<Value> + Send + Sync + 'static,
    {
        split_qualified(qualified_name)?;
        self.functions
            .insert(qualified_name.to_string(), Arc::new(func));
        Ok(())
    }

    pub fn resolve(&self, qualified_name: &str) -> Result<Capability> {
        self.functions
            .get(qualified_name)
            .cloned()
            .ok_or_else(|| ConfigError::UnresolvableCapability {
                name: qualified_name.to_string(),
            })
    }

    pub fn contains(&self, qualified_name: &str) -> bool {
        self.functions.contains_key(qualified_name)
    }
}

/// What a function specification points at.
#[derive(Clone)]
pub enum FunctionTarget {
    Named(String),
    /// An already-resolved function; only accepted in stand-alone use.
    Callable(Capability),
}

impl fmt::Debug for FunctionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// A parsed (but unresolved) function specification.
#[derive(Debug, Clone)]
pub struct FunctionSpec {
    pub target: FunctionTarget,
    pub args: Vec<Value>,
    pub kwargs: CfgMap,
    pub pass_layer_cfg: bool,
    pub mapped_bands: bool,
}

impl FunctionSpec {
    pub fn named(name: impl Into<String>) -> Self {
        Self::bare(FunctionTarget::Named(name.into()))
    }

    pub fn callable(func: Capability) -> Self {
        Self::bare(FunctionTarget::Callable(func))
    }

    fn bare(target: FunctionTarget) -> Self {
        Self {
            target,
            args: Vec::new(),
            kwargs: CfgMap::new(),
            pass_layer_cfg: false,
            mapped_bands: false,
        }
    }

    /// Parse a specification: a qualified name, or a mapping with `function`.
    pub fn from_node(node: &RawConfigNode) -> Result<Self> {
        let cfg = match node {
            Value::String(name) => return Ok(Self::named(name.as_str())),
            Value::Object(cfg) => cfg,
            other => {
                return Err(ConfigError::malformed(format!(
                    "Function must be a qualified name or a mapping, got {}",
                    kind(other)
                )));
            }
        };

        let name = match cfg.get("function") {
            Some(Value::String(name)) => name.clone(),
            Some(other) => {
                return Err(ConfigError::malformed(format!(
                    "'function' must be a qualified name, got {}",
                    kind(other)
                )));
            }
            None => return Err(ConfigError::missing("Function definition", "function")),
        };
        let args = match cfg.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(args)) => args.clone(),
            Some(other) => {
                return Err(ConfigError::invalid(format!(
                    "Function {name}: 'args' must be a list, got {}",
                    kind(other)
                )));
            }
        };
        let kwargs = match cfg.get("kwargs") {
            None | Some(Value::Null) => CfgMap::new(),
            Some(Value::Object(kwargs)) => kwargs.clone(),
            Some(other) => {
                return Err(ConfigError::invalid(format!(
                    "Function {name}: 'kwargs' must be a mapping, got {}",
                    kind(other)
                )));
            }
        };
        if cfg.contains_key("pass_product_cfg") {
            tracing::warn!(
                function = %name,
                "pass_product_cfg in function definitions has been renamed 'mapped_bands'; please update your config"
            );
        }
        let mapped_bands = match cfg.get("mapped_bands") {
            Some(v) => v.as_bool().unwrap_or(false),
            None => bool_or(cfg, "pass_product_cfg", false),
        };

        Ok(Self {
            target: FunctionTarget::Named(name),
            args,
            kwargs,
            pass_layer_cfg: bool_or(cfg, "pass_layer_cfg", false),
            mapped_bands,
        })
    }
}

/// The entry (layer or style) a function is defined in.
pub trait FunctionOwner {
    /// Band mapper for `mapped_bands` functions, if the owner has bands.
    fn band_mapper(&self) -> Option<BandMapper>;

    /// Configuration passed to `pass_layer_cfg` functions.
    fn owner_cfg(&self) -> Arc<RawConfigNode>;
}

/// A resolved function bound to its fixed arguments.
#[derive(Clone)]
pub struct FunctionReference {
    name: String,
    func: Capability,
    args: Vec<Value>,
    kwargs: CfgMap,
    band_mapper: Option<BandMapper>,
    layer_cfg: Option<Arc<RawConfigNode>>,
}

impl fmt::Debug for FunctionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionReference")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("kwargs", &self.kwargs)
            .field("band_mapper", &self.band_mapper.is_some())
            .field("pass_layer_cfg", &self.layer_cfg.is_some())
            .finish()
    }
}

const CALLABLE_REJECTED: &str = "Directly including callable objects in configuration is no longer supported. \
     Please reference callables by fully qualified name.";

impl FunctionReference {
    /// Resolve `spec` in the context of `owner`.
    ///
    /// Already-resolved callables are rejected unless `stand_alone` is set.
    pub fn wrap(
        owner: Option<&dyn FunctionOwner>,
        spec: FunctionSpec,
        stand_alone: bool,
        registry: &FunctionRegistry,
    ) -> Result<Self> {
        let (name, func) = match spec.target {
            FunctionTarget::Named(name) => {
                let func = registry.resolve(&name)?;
                (name, func)
            }
            FunctionTarget::Callable(_) if !stand_alone => {
                return Err(ConfigError::invalid(CALLABLE_REJECTED));
            }
            FunctionTarget::Callable(func) => ("<callable>".to_string(), func),
        };

        let band_mapper = if spec.mapped_bands {
            match owner.and_then(|o| o.band_mapper()) {
                Some(mapper) => Some(mapper),
                None => {
                    return Err(ConfigError::invalid(format!(
                        "Function {name} uses mapped_bands outside of a layer or style"
                    )));
                }
            }
        } else {
            None
        };
        let layer_cfg = if spec.pass_layer_cfg {
            owner.map(|o| o.owner_cfg())
        } else {
            None
        };

        tracing::debug!(function = %name, mapped_bands = spec.mapped_bands, "Resolved function reference");
        Ok(Self {
            name,
            func,
            args: spec.args,
            kwargs: spec.kwargs,
            band_mapper,
            layer_cfg,
        })
    }

    /// Parse and resolve a function specification from configuration.
    pub fn from_node(
        owner: Option<&dyn FunctionOwner>,
        node: &RawConfigNode,
        registry: &FunctionRegistry,
    ) -> Result<Self> {
        Self::wrap(owner, FunctionSpec::from_node(node)?, false, registry)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the function.
    ///
    /// Positional arguments are the call's followed by the configured ones;
    /// configured keyword arguments are overridden by the call's.
    pub fn call(&self, args: Vec<Value>, kwargs: CfgMap) -> Result<Value> {
        let mut call_args = args;
        call_args.extend(self.args.iter().cloned());
        let mut call_kwargs = self.kwargs.clone();
        call_kwargs.extend(kwargs);

        (self.func)(&FunctionCall {
            args: call_args,
            kwargs: call_kwargs,
            band_mapper: self.band_mapper.clone(),
            layer_cfg: self.layer_cfg.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn echo_registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry
            .register("funcs.echo", |call: &FunctionCall| {
                Ok(json!({"args": call.args, "kwargs": call.kwargs}))
            })
            .unwrap();
        registry
    }

    #[test]
    fn string_spec_has_no_bound_arguments() {
        let func = FunctionReference::from_node(None, &json!("funcs.echo"), &echo_registry()).unwrap();
        assert_eq!(func.name(), "funcs.echo");
        assert_eq!(
            func.call(vec![json!(1)], CfgMap::new()).unwrap(),
            json!({"args": [1], "kwargs": {}})
        );
    }

    #[test]
    fn call_arguments_precede_and_override() {
        let spec = json!({
            "function": "funcs.echo",
            "args": ["cfg"],
            "kwargs": {"a": 1, "b": 2}
        });
        let func = FunctionReference::from_node(None, &spec, &echo_registry()).unwrap();
        let mut kwargs = CfgMap::new();
        kwargs.insert("b".into(), json!(20));

        assert_eq!(
            func.call(vec![json!("call")], kwargs).unwrap(),
            json!({"args": ["call", "cfg"], "kwargs": {"a": 1, "b": 20}})
        );
    }

    #[test]
    fn unknown_function_is_unresolvable() {
        let err = FunctionReference::from_node(None, &json!("funcs.nope"), &echo_registry()).unwrap_err();
        assert_eq!(err.to_string(), "Could not import python object: funcs.nope");
    }

    #[test]
    fn callables_need_stand_alone() {
        let cap: Capability = Arc::new(|_: &FunctionCall| Ok(json!(42)));
        let registry = FunctionRegistry::new();

        assert!(FunctionReference::wrap(None, FunctionSpec::callable(cap.clone()), false, &registry).is_err());
        let func = FunctionReference::wrap(None, FunctionSpec::callable(cap), true, &registry).unwrap();
        assert_eq!(func.call(Vec::new(), CfgMap::new()).unwrap(), json!(42));
    }

    #[test]
    fn pass_product_cfg_is_mapped_bands() {
        let spec = FunctionSpec::from_node(&json!({"function": "funcs.echo", "pass_product_cfg": true})).unwrap();
        assert!(spec.mapped_bands);
        assert!(!spec.pass_layer_cfg);
    }

    #[test]
    fn mapped_bands_without_owner_fails() {
        let spec = json!({"function": "funcs.echo", "mapped_bands": true});
        assert!(FunctionReference::from_node(None, &spec, &echo_registry()).is_err());
    }
}
