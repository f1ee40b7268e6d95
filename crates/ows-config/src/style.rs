//! Style definitions
//!
//! Styles belong to a layer and are indexed by `(layer, style)`. A style may
//! inherit from another style, of the same layer by default:
//!
//! ```json
//! {"inherits": {"style": "simple_rgb"}, "name": "rgb_bright", "title": "Bright RGB"}
//! {"inherits": {"layer": "s2_l2a", "style": "ndvi"}, "name": "ndvi", "abstract": "..."}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;

use crate::context::LoadContext;
use crate::entry::{ConfigEntry, EntryCore};
use crate::function::{BandMapper, FunctionOwner, FunctionReference};
use crate::index::{EntryKind, IndexedEntry, KeyValues, keyvals};
use crate::inherit::expand_inherit;
use crate::layer::LayerScope;
use crate::legend::{Legend, RampStop, parse_ramp};
use crate::mask::MaskRule;
use crate::metadata::{
    FLD_UNITS, MetadataContext, MetadataFlags, MetadataOwner, MetadataRegistry, parse_metadata,
    register_tick_labels, register_value_rules,
};
use crate::node::{RawConfigNode, as_map, opt_str, req_str, str_list};
use crate::{ConfigError, Result};

pub const STYLE: EntryKind = EntryKind {
    name: "style",
    index_keys: &["layer", "style"],
};

/// A value-map rule: a mask rule with the colour and label it renders as.
#[derive(Debug, Clone)]
pub struct ValueMapRule {
    pub rule: MaskRule,
    pub title: String,
    pub color: String,
}

/// Function owner view of a style under construction.
#[derive(Clone)]
struct StyleScope {
    mapper: BandMapper,
    raw: Arc<RawConfigNode>,
}

impl FunctionOwner for StyleScope {
    fn band_mapper(&self) -> Option<BandMapper> {
        Some(Arc::clone(&self.mapper))
    }

    fn owner_cfg(&self) -> Arc<RawConfigNode> {
        Arc::clone(&self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct StyleDef {
    core: EntryCore,
    keyvals: KeyValues,
    name: String,
    layer: String,
    local_bands: BTreeMap<String, String>,
    needed_bands: BTreeSet<String>,
    index_function: Option<FunctionReference>,
    value_map: BTreeMap<String, Vec<ValueMapRule>>,
    color_ramp: Option<Vec<RampStop>>,
    legend: Option<Legend>,
}

impl StyleDef {
    /// Parse a style of `layer` and register it in the entry index.
    pub fn new(raw: &RawConfigNode, layer: &LayerScope, ctx: &mut LoadContext<'_>) -> Result<Self> {
        let defaults = keyvals([("layer", layer.name())]);
        let expanded = expand_inherit(raw, STYLE, ctx.index, None, Some(&defaults))?;
        let map = as_map(&expanded, &format!("Style of layer {}", layer.name()))?;
        let name = req_str(map, "name", &format!("Style of layer {}", layer.name()))?.to_string();
        let context = format!("Style {name} of layer {}", layer.name());
        let label = format!("{}.{name}", layer.name());

        parse_metadata(
            ctx.metadata,
            MetadataFlags::default(),
            map,
            &MetadataContext {
                label: label.clone(),
                ..Default::default()
            },
        )?;

        let local_bands = match map.get("band_map") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                ConfigError::invalid(format!("{context}: bad band_map: {e}"))
            })?,
        };
        let local = Arc::new(local_bands.clone());
        let layer_bands = layer.mapper();
        let mapper: BandMapper = Arc::new(move |band: &str| {
            let delocalised = local.get(band).map_or(band, String::as_str);
            layer_bands(delocalised)
        });
        let core = EntryCore::new(expanded.clone());
        let scope = StyleScope {
            mapper: Arc::clone(&mapper),
            raw: core.shared_raw(),
        };

        let mut needed_bands = BTreeSet::new();
        for band in str_list(map, "needed_bands", &context)? {
            needed_bands.insert(mapper(band.as_str())?);
        }

        let index_function = match map.get("index_function") {
            None | Some(Value::Null) => None,
            Some(spec) => Some(FunctionReference::from_node(Some(&scope), spec, ctx.functions)?),
        };

        let mut value_map = BTreeMap::new();
        let mut rule_titles = Vec::new();
        if let Some(vm) = map.get("value_map").filter(|v| !v.is_null()) {
            let vm = as_map(vm, &format!("{context}: value_map"))?;
            for (band, rules) in vm {
                let Some(rules) = rules.as_array() else {
                    return Err(ConfigError::invalid(format!(
                        "{context}: value_map rules for {band} must be a list"
                    )));
                };
                let mut parsed = Vec::with_capacity(rules.len());
                for rule_cfg in rules {
                    let rule = MaskRule::new(band, rule_cfg, &context, Some(&mapper))?;
                    let rule_map = as_map(rule_cfg, &context)?;
                    let title = opt_str(rule_map, "title", &context)?.unwrap_or("").to_string();
                    let color = req_str(rule_map, "color", &format!("Value map rule in {context}"))?
                        .to_string();
                    needed_bands.insert(rule.band().to_string());
                    rule_titles.push(title.clone());
                    parsed.push(ValueMapRule { rule, title, color });
                }
                value_map.insert(band.clone(), parsed);
            }
        }
        register_value_rules(
            ctx.metadata,
            &label,
            rule_titles
                .iter()
                .enumerate()
                .filter(|(_, title)| !title.is_empty())
                .map(|(idx, title)| (idx, title.as_str())),
        );

        let color_ramp = parse_ramp(map, &context)?;
        let legend = match map.get("legend") {
            None | Some(Value::Null) => None,
            Some(cfg) => {
                let legend = Legend::parse(as_map(cfg, &context)?, &name, color_ramp.as_deref())?;
                if let Some(units) = &legend.units {
                    ctx.metadata.register(&label, FLD_UNITS, units.as_str(), false);
                }
                register_tick_labels(
                    ctx.metadata,
                    &label,
                    legend
                        .ticks
                        .iter()
                        .zip(&legend.tick_labels)
                        .map(|(t, l)| (t.as_str(), l.as_str())),
                );
                Some(legend)
            }
        };

        let style = Self {
            core,
            keyvals: keyvals([("layer", layer.name()), ("style", name.as_str())]),
            layer: layer.name().to_string(),
            name,
            local_bands,
            needed_bands,
            index_function,
            value_map,
            color_ramp,
            legend,
        };
        ctx.index.register_entry(&style)?;
        tracing::debug!(layer = %style.layer, style = %style.name, "Parsed style");
        Ok(style)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    /// Map a style-local band name to the layer's band name.
    pub fn local_band<'a>(&'a self, band: &'a str) -> &'a str {
        self.local_bands.get(band).map_or(band, String::as_str)
    }

    /// Canonical bands this style reads.
    pub fn needed_bands(&self) -> &BTreeSet<String> {
        &self.needed_bands
    }

    pub fn index_function(&self) -> Option<&FunctionReference> {
        self.index_function.as_ref()
    }

    /// Value-map rules by band, as configured.
    pub fn value_map(&self) -> &BTreeMap<String, Vec<ValueMapRule>> {
        &self.value_map
    }

    /// Colour ramp from `color_ramp`, or the default ramp over `range`.
    pub fn color_ramp(&self) -> Option<&[RampStop]> {
        self.color_ramp.as_deref()
    }

    pub fn legend(&self) -> Option<&Legend> {
        self.legend.as_ref()
    }

    /// Display label of the `idx`-th value-map rule.
    pub fn rule_label(&self, metadata: &MetadataRegistry, idx: usize) -> Option<String> {
        self.read_local(metadata, &format!("rule_{idx}"))
    }

    /// Display label of a legend tick.
    pub fn tick_label(&self, metadata: &MetadataRegistry, tick: &str) -> Option<String> {
        let legend = self.legend.as_ref()?;
        let pos = legend.ticks.iter().position(|t| t == tick)?;
        self.read_local(metadata, &format!("lbl_{tick}"))
            .filter(|l| !l.is_empty())
            .or_else(|| legend.tick_labels.get(pos).cloned())
    }
}

impl MetadataOwner for StyleDef {
    fn metadata_label(&self) -> String {
        format!("{}.{}", self.layer, self.name)
    }
}

impl ConfigEntry for StyleDef {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }
}

impl IndexedEntry for StyleDef {
    const KIND: EntryKind = STYLE;

    fn keyvals(&self) -> &KeyValues {
        &self.keyvals
    }
}
