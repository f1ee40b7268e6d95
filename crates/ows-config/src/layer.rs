//! Named layers
//!
//! A named layer publishes one or more datacube products:
//!
//! ```json
//! {
//!     "name": "ls8_nbart",
//!     "title": "Landsat 8 surface reflectance",
//!     "abstract": "...",
//!     "product_names": ["ls8_ard"],
//!     "low_res_product_names": ["ls8_summary"],
//!     "bands": {"nbart_red": ["red"], "nbart_green": ["green"], "fmask": []},
//!     "flags": [{"band": "fmask"}],
//!     "styling": {"default_style": "rgb", "styles": [...]}
//! }
//! ```
//!
//! Low-resolution products, when given, pair up with `product_names` and
//! are read instead of them for zoomed-out requests.
//!
//! Layers are indexed by name and may inherit from one another
//! (`"inherits": {"layer": "ls8_nbart"}`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::bands::BandIndex;
use crate::context::LoadContext;
use crate::datacube::{DatacubeIndex, ProductInfo};
use crate::entry::{ConfigEntry, Deferred, EntryCore};
use crate::flags::{FlagBand, FlagProductGroup};
use crate::function::{BandMapper, FunctionOwner, FunctionReference};
use crate::index::{EntryKind, IndexedEntry, KeyValues, keyvals};
use crate::inherit::expand_inherit;
use crate::metadata::{
    Attribution, InheritedMetadata, MetadataContext, MetadataFlags, MetadataOwner, ParsedMetadata,
    parse_metadata,
};
use crate::node::{CfgMap, RawConfigNode, as_map, opt_str, req_str, str_list};
use crate::style::StyleDef;
use crate::{ConfigError, Result};

pub const LAYER: EntryKind = EntryKind {
    name: "layer",
    index_keys: &["layer"],
};

/// What a layer's children (styles, flag bands, functions) see of it.
#[derive(Clone)]
pub struct LayerScope {
    name: String,
    product_names: Vec<String>,
    low_res_product_names: Vec<String>,
    bands: BandMapper,
    raw: Arc<RawConfigNode>,
}

impl fmt::Debug for LayerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerScope")
            .field("name", &self.name)
            .field("product_names", &self.product_names)
            .field("low_res_product_names", &self.low_res_product_names)
            .finish_non_exhaustive()
    }
}

impl LayerScope {
    pub fn new(
        name: impl Into<String>,
        product_names: Vec<String>,
        bands: BandMapper,
        raw: Arc<RawConfigNode>,
    ) -> Self {
        Self {
            name: name.into(),
            product_names,
            low_res_product_names: Vec::new(),
            bands,
            raw,
        }
    }

    pub fn with_low_res_products(mut self, names: Vec<String>) -> Self {
        self.low_res_product_names = names;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product_names(&self) -> &[String] {
        &self.product_names
    }

    pub fn low_res_product_names(&self) -> &[String] {
        &self.low_res_product_names
    }

    /// Resolve a band name or alias through the layer's band index.
    pub fn band(&self, name_or_alias: &str) -> Result<String> {
        (self.bands)(name_or_alias)
    }

    pub fn mapper(&self) -> BandMapper {
        Arc::clone(&self.bands)
    }
}

impl FunctionOwner for LayerScope {
    fn band_mapper(&self) -> Option<BandMapper> {
        Some(self.mapper())
    }

    fn owner_cfg(&self) -> Arc<RawConfigNode> {
        Arc::clone(&self.raw)
    }
}

#[derive(Debug, Clone)]
pub struct NamedLayer {
    core: EntryCore,
    keyvals: KeyValues,
    name: String,
    scope: LayerScope,
    metadata: ParsedMetadata,
    band_idx: BandIndex,
    flag_bands: Vec<FlagBand>,
    flag_groups: Vec<FlagProductGroup>,
    fuse_func: Option<FunctionReference>,
    styles: Vec<StyleDef>,
    style_index: BTreeMap<String, usize>,
    default_style: usize,
    products: Deferred<Vec<ProductInfo>>,
    low_res_products: Deferred<Vec<ProductInfo>>,
}

impl NamedLayer {
    /// Parse a layer and its children, registering them in the entry index.
    ///
    /// `global` is the metadata the layer inherits from.
    pub fn new(
        raw: &RawConfigNode,
        global: &InheritedMetadata,
        ctx: &mut LoadContext<'_>,
    ) -> Result<Self> {
        let expanded = expand_inherit(raw, LAYER, ctx.index, None, None)?;
        let map = as_map(&expanded, "Layer")?;
        let name = req_str(map, "name", "Layer")?.to_string();
        let context = format!("Layer {name}");

        let parsed = parse_metadata(
            ctx.metadata,
            MetadataFlags {
                keywords: true,
                attribution: true,
                ..Default::default()
            },
            map,
            &MetadataContext {
                label: name.clone(),
                parent: Some(global),
                ..Default::default()
            },
        )?;

        let product_names = product_names(map, &context)?;
        let low_res_product_names =
            name_list(map, ("low_res_product_name", "low_res_product_names"), &context)?;
        if !low_res_product_names.is_empty() && low_res_product_names.len() != product_names.len() {
            return Err(ConfigError::invalid(format!(
                "Lengths of product_names and low_res_product_names do not match in {context}"
            )));
        }
        let bands_cfg = map
            .get("bands")
            .ok_or_else(|| ConfigError::missing(context.as_str(), "bands"))?;
        let band_idx = BandIndex::new(&name, &product_names[0], bands_cfg, ctx.metadata)?;

        let mut core = EntryCore::new(expanded.clone());
        let products = core.declare("products")?;
        let low_res_products = core.declare("low_res_products")?;
        let scope = LayerScope::new(
            name.as_str(),
            product_names,
            band_idx.mapper(),
            core.shared_raw(),
        )
        .with_low_res_products(low_res_product_names);

        let flag_bands = match map.get("flags") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|fb| FlagBand::new(fb, &scope, ctx.functions))
                .collect::<Result<Vec<_>>>()?,
            Some(single) => vec![FlagBand::new(single, &scope, ctx.functions)?],
        };
        let flag_groups = FlagProductGroup::build(&flag_bands)?;

        let fuse_func = match map.get("fuse_func") {
            None | Some(Value::Null) => None,
            Some(spec) => Some(FunctionReference::from_node(Some(&scope), spec, ctx.functions)?),
        };

        // The layer registers before its styles so they can inherit across it.
        let keyvals = keyvals([("layer", name.as_str())]);
        ctx.index.register(LAYER, keyvals.clone(), core.shared_raw())?;

        let (styles, style_index, default_style) = parse_styles(map, &scope, &context, ctx)?;

        tracing::debug!(layer = %name, styles = styles.len(), flag_bands = flag_bands.len(), "Parsed layer");
        Ok(Self {
            core,
            keyvals,
            name,
            scope,
            metadata: parsed,
            band_idx,
            flag_bands,
            flag_groups,
            fuse_func,
            styles,
            style_index,
            default_style,
            products,
            low_res_products,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn product_names(&self) -> &[String] {
        self.scope.product_names()
    }

    /// Products resolved from the datacube.
    pub fn products(&self) -> Result<&[ProductInfo]> {
        self.products.get().map(Vec::as_slice)
    }

    /// Empty when the layer has no low-resolution products.
    pub fn low_res_product_names(&self) -> &[String] {
        self.scope.low_res_product_names()
    }

    pub fn low_res_products(&self) -> Result<&[ProductInfo]> {
        self.low_res_products.get().map(Vec::as_slice)
    }

    pub fn band_idx(&self) -> &BandIndex {
        &self.band_idx
    }

    pub fn flag_bands(&self) -> &[FlagBand] {
        &self.flag_bands
    }

    pub fn flag_groups(&self) -> &[FlagProductGroup] {
        &self.flag_groups
    }

    pub fn fuse_func(&self) -> Option<&FunctionReference> {
        self.fuse_func.as_ref()
    }

    pub fn styles(&self) -> &[StyleDef] {
        &self.styles
    }

    pub fn style(&self, name: &str) -> Option<&StyleDef> {
        self.style_index.get(name).map(|&i| &self.styles[i])
    }

    pub fn default_style(&self) -> &StyleDef {
        &self.styles[self.default_style]
    }

    /// Effective keywords: the layer's own plus those inherited from global.
    pub fn keywords(&self) -> &BTreeSet<String> {
        &self.metadata.keywords
    }

    pub fn attribution(&self) -> Option<&Attribution> {
        self.metadata.attribution.as_ref()
    }
}

/// `product_name` or `product_names`; at least one product.
fn product_names(map: &CfgMap, context: &str) -> Result<Vec<String>> {
    let names = name_list(map, ("product_name", "product_names"), context)?;
    if names.is_empty() {
        return Err(ConfigError::missing(context, "product_names"));
    }
    Ok(names)
}

/// A single name or a list of names under the plural key.
fn name_list(map: &CfgMap, (single, plural): (&str, &str), context: &str) -> Result<Vec<String>> {
    match (opt_str(map, single, context)?, map.get(plural)) {
        (Some(_), Some(_)) => Err(ConfigError::conflicting(format!(
            "{context} has both '{single}' and '{plural}' - choose one."
        ))),
        (Some(name), None) => Ok(vec![name.to_string()]),
        (None, _) => str_list(map, plural, context),
    }
}

type ParsedStyles = (Vec<StyleDef>, BTreeMap<String, usize>, usize);

fn parse_styles(
    map: &CfgMap,
    scope: &LayerScope,
    context: &str,
    ctx: &mut LoadContext<'_>,
) -> Result<ParsedStyles> {
    let styling = map
        .get("styling")
        .ok_or_else(|| ConfigError::missing(context, "styling"))?;
    let styling = as_map(styling, &format!("{context}: styling"))?;
    let Some(style_cfgs) = styling.get("styles").and_then(Value::as_array) else {
        return Err(ConfigError::missing(format!("{context} styling"), "styles"));
    };
    if style_cfgs.is_empty() {
        return Err(ConfigError::invalid(format!("{context} has no styles")));
    }

    let mut styles = Vec::with_capacity(style_cfgs.len());
    let mut style_index = BTreeMap::new();
    for cfg in style_cfgs {
        let style = StyleDef::new(cfg, scope, ctx)?;
        style_index.insert(style.name().to_string(), styles.len());
        styles.push(style);
    }

    let default_style = match opt_str(styling, "default_style", context)? {
        Some(name) => *style_index.get(name).ok_or_else(|| {
            ConfigError::invalid(format!(
                "Default style {name} is not in the 'styles' for {context}"
            ))
        })?,
        None => 0,
    };
    Ok((styles, style_index, default_style))
}

impl MetadataOwner for NamedLayer {
    fn metadata_label(&self) -> String {
        self.name.clone()
    }
}

impl ConfigEntry for NamedLayer {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }

    /// Resolve products, then ready every child.
    fn make_ready(&mut self, dc: &dyn DatacubeIndex) -> Result<()> {
        let products = resolve_products(dc, self.scope.product_names(), "", &self.name)?;
        let low_res_products =
            resolve_products(dc, self.scope.low_res_product_names(), "low_res ", &self.name)?;
        self.core.fill(&mut self.products, products);
        self.core.fill(&mut self.low_res_products, low_res_products);

        self.band_idx.make_ready(dc)?;
        for fb in &mut self.flag_bands {
            fb.make_ready_in(dc, &self.scope)?;
        }
        // Canonical names are only known after the flag bands are ready.
        self.flag_groups = FlagProductGroup::build(&self.flag_bands)?;
        for style in &mut self.styles {
            style.make_ready(dc)?;
        }

        tracing::debug!(layer = %self.name, "Layer ready");
        self.core.mark_ready()
    }
}

fn resolve_products(
    dc: &dyn DatacubeIndex,
    names: &[String],
    qualifier: &str,
    layer: &str,
) -> Result<Vec<ProductInfo>> {
    names
        .iter()
        .map(|name| {
            dc.product_by_name(name).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Could not find {qualifier}product {name} in datacube for layer {layer}"
                ))
            })
        })
        .collect()
}

impl IndexedEntry for NamedLayer {
    const KIND: EntryKind = LAYER;

    fn keyvals(&self) -> &KeyValues {
        &self.keyvals
    }
}
