//! Loader settings and the configuration entry point

use std::sync::Arc;

use ows_fs::location::{ALLOW_S3_ENV, ALLOW_S3_ENV_SHORT};
use ows_fs::{DocumentLoader, ObjectStore, is_truthy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::function::FunctionRegistry;
use crate::global::OwsConfig;
use crate::inclusion::{InclusionExpander, ObjectRegistry};
use crate::logging::{self, DEFAULT_FILTER};
use crate::node::RawConfigNode;
use crate::{ConfigError, Result};

/// Environment variable naming the configuration source.
pub const CFG_ENV: &str = "DATACUBE_OWS_CFG";
/// Short spelling of [`CFG_ENV`], read when that is unset.
pub const CFG_ENV_SHORT: &str = "OWS_CFG";

pub const DEFAULT_CFG_SOURCE: &str = "ows_cfg.json";

/// Where the configuration is read from, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Inline JSON, a JSON file path, or a qualified object name.
    pub cfg_source: String,
    /// Allow `s3://` documents.
    pub allow_s3: bool,
    /// `tracing` filter directives, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            cfg_source: DEFAULT_CFG_SOURCE.to_string(),
            allow_s3: false,
            log_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LoaderSettings {
    /// Read `DATACUBE_OWS_CFG` and `DATACUBE_OWS_CFG_ALLOW_S3`, or their
    /// short `OWS_CFG*` spellings.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Settings from an environment lookup; the `DATACUBE_` names win.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |names: [&str; 2]| names.into_iter().find_map(&lookup);
        Self::from_vars(
            read([CFG_ENV, CFG_ENV_SHORT]),
            read([ALLOW_S3_ENV, ALLOW_S3_ENV_SHORT]),
        )
    }

    /// Settings from raw variable values, as `from_env` would see them.
    pub fn from_vars(cfg_source: Option<String>, allow_s3: Option<String>) -> Self {
        Self {
            cfg_source: cfg_source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CFG_SOURCE.to_string()),
            allow_s3: allow_s3.is_some_and(|v| is_truthy(&v)),
            ..Self::default()
        }
    }

    /// Install the global log subscriber with these settings' filter.
    pub fn init_logging(&self) -> Result<()> {
        logging::init(&self.log_filter)
    }

    pub fn loader(&self, store: Option<Arc<dyn ObjectStore>>) -> DocumentLoader {
        let loader = DocumentLoader::new().with_remote(self.allow_s3);
        match store {
            Some(store) => loader.with_store(store),
            None => loader,
        }
    }
}

/// A configuration source, classified.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Inline(RawConfigNode),
    Json(String),
    Object(String),
}

impl ConfigSource {
    /// `{...}` or `[...]` is inline JSON; `*.json` a file; anything else an
    /// object name.
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            let node = serde_json::from_str(trimmed)
                .map_err(|e| ConfigError::invalid(format!("Invalid inline configuration: {e}")))?;
            Ok(Self::Inline(node))
        } else if trimmed.ends_with(".json") {
            Ok(Self::Json(trimmed.to_string()))
        } else {
            Ok(Self::Object(trimmed.to_string()))
        }
    }

    /// The tree to expand: inline configuration, or an inclusion directive.
    fn root(self) -> RawConfigNode {
        match self {
            Self::Inline(node) => node,
            Self::Json(path) => json!({"include": path, "type": "json"}),
            Self::Object(name) => json!({"include": name, "type": "python"}),
        }
    }
}

/// Read and fully expand the raw configuration.
///
/// `source` overrides the settings' configuration source.
pub fn read_config(
    source: Option<&str>,
    settings: &LoaderSettings,
    objects: &ObjectRegistry,
    store: Option<Arc<dyn ObjectStore>>,
) -> Result<RawConfigNode> {
    let source = source.unwrap_or(&settings.cfg_source);
    tracing::info!(source, allow_s3 = settings.allow_s3, "Reading configuration");
    let loader = settings.loader(store);
    let root = ConfigSource::parse(source)?.root();
    InclusionExpander::new(&loader, objects).expand_root(&root)
}

/// Read, expand and parse the configuration.
pub fn load_config(
    source: Option<&str>,
    settings: &LoaderSettings,
    objects: &ObjectRegistry,
    functions: &FunctionRegistry,
    store: Option<Arc<dyn ObjectStore>>,
) -> Result<OwsConfig> {
    let raw = read_config(source, settings, objects, store)?;
    OwsConfig::from_raw(raw, functions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    #[rstest]
    #[case(Some("YES"), true)]
    #[case(Some("y"), true)]
    #[case(Some("1"), true)]
    #[case(Some("True"), true)]
    #[case(Some("no"), false)]
    #[case(None, false)]
    fn allow_s3_values(#[case] value: Option<&str>, #[case] expected: bool) {
        let settings = LoaderSettings::from_vars(None, value.map(str::to_string));
        assert_eq!(settings.allow_s3, expected);
        assert_eq!(settings.cfg_source, DEFAULT_CFG_SOURCE);
    }

    #[rstest]
    #[case("{\"global\": {}}", "inline")]
    #[case("[1, 2]", "inline")]
    #[case("cfgs/ows_cfg.json", "json")]
    #[case("ows_cfgs.landsat.ows_cfg", "object")]
    fn source_classification(#[case] source: &str, #[case] expected: &str) {
        let kind = match ConfigSource::parse(source).unwrap() {
            ConfigSource::Inline(_) => "inline",
            ConfigSource::Json(_) => "json",
            ConfigSource::Object(_) => "object",
        };
        assert_eq!(kind, expected);
    }

    #[test]
    fn bad_inline_json_fails() {
        assert!(ConfigSource::parse("{not json").is_err());
    }

    #[test]
    fn datacube_names_win_over_short_names() {
        let env = HashMap::from([
            (CFG_ENV, "cfgs/main.json"),
            (CFG_ENV_SHORT, "cfgs/other.json"),
            (ALLOW_S3_ENV_SHORT, "yes"),
        ]);
        let settings = LoaderSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.cfg_source, "cfgs/main.json");
        assert!(settings.allow_s3);

        let env = HashMap::from([(CFG_ENV_SHORT, "cfgs/other.json"), (ALLOW_S3_ENV, "no")]);
        let settings = LoaderSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(settings.cfg_source, "cfgs/other.json");
        assert!(!settings.allow_s3);
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: LoaderSettings = serde_json::from_str(r#"{"allow_s3": true}"#).unwrap();
        assert_eq!(settings.cfg_source, DEFAULT_CFG_SOURCE);
        assert_eq!(settings.log_filter, DEFAULT_FILTER);
        assert!(settings.allow_s3);
    }

    #[test]
    fn bad_log_filter_fails_init() {
        let settings = LoaderSettings {
            log_filter: "ows_config=loud".to_string(),
            ..LoaderSettings::default()
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(settings.init_logging().is_err());
        }
    }

    #[test]
    fn object_source_expands_from_registry() {
        let mut objects = ObjectRegistry::new();
        objects
            .register("cfgs.main.ows_cfg", json!({"global": {"title": "Test"}}))
            .unwrap();
        let raw = read_config(
            Some("cfgs.main.ows_cfg"),
            &LoaderSettings::default(),
            &objects,
            None,
        )
        .unwrap();
        assert_eq!(raw, json!({"global": {"title": "Test"}}));
    }
}
