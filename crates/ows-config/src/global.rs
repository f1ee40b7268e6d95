//! The top-level configuration object
//!
//! ```json
//! {
//!     "global": {"title": "Open Web Services", "keywords": ["geoscience"], ...},
//!     "layers": [
//!         {"title": "Landsat", "abstract": "...", "layers": [{"name": "ls8_nbart", ...}]},
//!         {"name": "s2_l2a", ...}
//!     ]
//! }
//! ```
//!
//! Entries of `layers` that themselves carry `layers` are folders; named
//! layers are collected from them depth first, in declaration order.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::context::LoadContext;
use crate::datacube::DatacubeIndex;
use crate::entry::{ConfigEntry, EntryCore};
use crate::function::FunctionRegistry;
use crate::index::EntryIndex;
use crate::layer::NamedLayer;
use crate::metadata::{
    Attribution, MessageCatalog, MetadataContext, MetadataFlags,
    MetadataOwner, MetadataRegistry, ParsedMetadata, Translator, parse_metadata,
};
use crate::node::{CfgMap, RawConfigNode, as_map, opt_str, str_list};
use crate::{ConfigError, Result};

const GLOBAL_LABEL: &str = "global";

#[derive(Debug)]
pub struct OwsConfig {
    core: EntryCore,
    metadata: ParsedMetadata,
    supported_languages: Vec<String>,
    translations_directory: Option<String>,
    message_domain: String,
    layers: Vec<NamedLayer>,
    layer_index: BTreeMap<String, usize>,
    index: EntryIndex,
    registry: MetadataRegistry,
}

impl OwsConfig {
    /// Build the configuration from an inclusion-expanded raw tree.
    pub fn from_raw(raw: RawConfigNode, functions: &FunctionRegistry) -> Result<Self> {
        let mut index = EntryIndex::new();
        let mut registry = MetadataRegistry::new();

        let root = as_map(&raw, "Configuration")?;
        let global = match root.get("global") {
            Some(global) => as_map(global, "Global section")?,
            None => return Err(ConfigError::missing("Configuration", "global")),
        };

        let metadata = parse_metadata(
            &mut registry,
            MetadataFlags {
                keywords: true,
                contact_info: true,
                fees: true,
                access_constraints: true,
                attribution: true,
                ..Default::default()
            },
            global,
            &MetadataContext {
                label: GLOBAL_LABEL.to_string(),
                default_abstract: Some(String::new()),
                ..Default::default()
            },
        )?;

        let mut supported_languages = str_list(global, "supported_languages", "Global section")?;
        if supported_languages.is_empty() {
            supported_languages.push("en".to_string());
        }
        let translations_directory =
            opt_str(global, "translations_directory", "Global section")?.map(str::to_string);
        let message_domain = opt_str(global, "message_domain", "Global section")?
            .unwrap_or("ows_cfg")
            .to_string();
        registry.set_internationalised(
            translations_directory.is_some() && supported_languages.len() > 1,
        );

        let inherited = metadata.inheritable(GLOBAL_LABEL);
        let mut layer_cfgs = Vec::new();
        if let Some(layers) = root.get("layers") {
            collect_layers(layers, &mut layer_cfgs)?;
        }

        let mut layers = Vec::with_capacity(layer_cfgs.len());
        let mut layer_index = BTreeMap::new();
        {
            let mut ctx = LoadContext::new(&mut index, &mut registry, functions);
            for cfg in layer_cfgs {
                let layer = NamedLayer::new(cfg, &inherited, &mut ctx)?;
                layer_index.insert(layer.name().to_string(), layers.len());
                layers.push(layer);
            }
        }
        tracing::info!(
            layers = layers.len(),
            entries = index.len(),
            metadata = registry.len(),
            "Configuration parsed"
        );

        Ok(Self {
            core: EntryCore::new(raw),
            metadata,
            supported_languages,
            translations_directory,
            message_domain,
            layers,
            layer_index,
            index,
            registry,
        })
    }

    pub fn layers(&self) -> &[NamedLayer] {
        &self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&NamedLayer> {
        self.layer_index.get(name).map(|&i| &self.layers[i])
    }

    pub fn index(&self) -> &EntryIndex {
        &self.index
    }

    /// The metadata registry all entries read display text through.
    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.metadata.keywords.iter().map(String::as_str)
    }

    pub fn attribution(&self) -> Option<&Attribution> {
        self.metadata.attribution.as_ref()
    }

    pub fn internationalised(&self) -> bool {
        self.registry.internationalised()
    }

    pub fn supported_languages(&self) -> &[String] {
        &self.supported_languages
    }

    pub fn translations_directory(&self) -> Option<&str> {
        self.translations_directory.as_deref()
    }

    pub fn message_domain(&self) -> &str {
        &self.message_domain
    }

    /// Install the translator consulted when internationalised.
    pub fn set_translator(&mut self, translator: Option<Arc<dyn Translator>>) {
        self.registry.set_translator(translator);
    }

    /// Install an external message catalog overriding display text.
    pub fn set_message_source(&mut self, catalog: Option<Arc<dyn MessageCatalog>>) {
        self.registry.set_catalog(catalog);
    }

    /// Every locally defined message, for message-file extraction.
    pub fn export_messages(&self) -> Vec<(String, String)> {
        self.registry.export_messages()
    }
}

/// Flatten the `layers` tree into named layer configurations.
fn collect_layers<'a>(node: &'a Value, out: &mut Vec<&'a RawConfigNode>) -> Result<()> {
    let Some(items) = node.as_array() else {
        return Err(ConfigError::invalid("'layers' must be a list"));
    };
    for item in items {
        let map: &CfgMap = as_map(item, "Layer")?;
        match map.get("layers") {
            Some(children) if !map.contains_key("name") => collect_layers(children, out)?,
            Some(_) => {
                return Err(ConfigError::conflicting(
                    "A layer entry cannot have both 'name' and 'layers'",
                ));
            }
            None => out.push(item),
        }
    }
    Ok(())
}

impl MetadataOwner for OwsConfig {
    fn metadata_label(&self) -> String {
        GLOBAL_LABEL.to_string()
    }
}

impl ConfigEntry for OwsConfig {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }

    fn make_ready(&mut self, dc: &dyn DatacubeIndex) -> Result<()> {
        for layer in &mut self.layers {
            layer.make_ready(dc)?;
        }
        tracing::info!(layers = self.layers.len(), "Configuration ready");
        self.core.mark_ready()
    }
}
