//! Flag (pixel quality) bands of a layer
//!
//! A flag band may come from the layer's own products or from a parallel
//! product set:
//!
//! ```json
//! "flags": [
//!     {"band": "fmask", "ignore_info_flags": ["nodata"]},
//!     {"band": "land", "product": "geodata_coast", "low_res_product": "geodata_coast_summary",
//!      "ignore_time": true}
//! ]
//! ```
//!
//! Low-resolution products (`low_res_product`/`low_res_products`) default to
//! the layer's own when the band comes from the layer's products. The
//! products and the band's flag definitions are looked up in the datacube
//! during second-phase initialisation.

use std::collections::BTreeSet;

use serde_json::Value;

use crate::datacube::{DatacubeIndex, ProductInfo};
use crate::entry::{ConfigEntry, Deferred, EntryCore};
use crate::function::{FunctionReference, FunctionRegistry};
use crate::layer::LayerScope;
use crate::mask::FlagsDefinition;
use crate::node::{CfgMap, RawConfigNode, as_map, bool_or, req_str, str_list};
use crate::{ConfigError, Result};

#[derive(Debug, Clone)]
pub struct FlagBand {
    core: EntryCore,
    layer: String,
    band: String,
    canonical_band: String,
    product_names: Vec<String>,
    low_res_product_names: Vec<String>,
    main_products: bool,
    fuse_func: Option<FunctionReference>,
    ignore_time: bool,
    ignore_info_flags: Vec<String>,
    manual_merge: bool,
    pq_products: Deferred<Vec<ProductInfo>>,
    pq_low_res_products: Deferred<Vec<ProductInfo>>,
    flags_def: Deferred<FlagsDefinition>,
    info_mask: Deferred<u64>,
}

impl FlagBand {
    pub fn new(
        cfg: &RawConfigNode,
        layer: &LayerScope,
        functions: &FunctionRegistry,
    ) -> Result<Self> {
        let context = format!("Flag band of layer {}", layer.name());
        let map = as_map(cfg, &context)?;
        let band = req_str(map, "band", &context)?.to_string();
        let product_names = flag_products(
            map,
            ("product", "products"),
            layer.product_names(),
            &context,
        )?;
        let main_products = product_names == layer.product_names();
        let low_res_default: &[String] = if main_products {
            layer.low_res_product_names()
        } else {
            &[]
        };
        let low_res_product_names = flag_products(
            map,
            ("low_res_product", "low_res_products"),
            low_res_default,
            &context,
        )?;

        let fuse_func = match map.get("fuse_func") {
            None | Some(Value::Null) => None,
            Some(spec) => Some(FunctionReference::from_node(Some(layer), spec, functions)?),
        };

        let mut core = EntryCore::new(cfg.clone());
        let pq_products = core.declare("pq_products")?;
        let pq_low_res_products = core.declare("pq_low_res_products")?;
        let flags_def = core.declare("flags_def")?;
        let info_mask = core.declare("info_mask")?;

        Ok(Self {
            core,
            layer: layer.name().to_string(),
            canonical_band: band.clone(),
            band,
            product_names,
            low_res_product_names,
            main_products,
            fuse_func,
            ignore_time: bool_or(map, "ignore_time", false),
            ignore_info_flags: str_list(map, "ignore_info_flags", &context)?,
            manual_merge: bool_or(map, "manual_merge", false),
            pq_products,
            pq_low_res_products,
            flags_def,
            info_mask,
        })
    }

    /// The band as configured.
    pub fn band(&self) -> &str {
        &self.band
    }

    /// The band after alias resolution (resolved on make-ready for bands of
    /// the layer's own products).
    pub fn canonical_band(&self) -> &str {
        &self.canonical_band
    }

    pub fn product_names(&self) -> &[String] {
        &self.product_names
    }

    pub fn low_res_product_names(&self) -> &[String] {
        &self.low_res_product_names
    }

    /// True when the band comes from the layer's own products.
    pub fn main_products(&self) -> bool {
        self.main_products
    }

    pub fn fuse_func(&self) -> Option<&FunctionReference> {
        self.fuse_func.as_ref()
    }

    pub fn ignore_time(&self) -> bool {
        self.ignore_time
    }

    pub fn manual_merge(&self) -> bool {
        self.manual_merge
    }

    pub fn pq_products(&self) -> Result<&[ProductInfo]> {
        self.pq_products.get().map(Vec::as_slice)
    }

    /// Products read at low resolution; empty when none are configured.
    pub fn pq_low_res_products(&self) -> Result<&[ProductInfo]> {
        self.pq_low_res_products.get().map(Vec::as_slice)
    }

    pub fn flags_def(&self) -> Result<&FlagsDefinition> {
        self.flags_def.get()
    }

    /// Bits that are informational only, cleared for `ignore_info_flags`.
    pub fn info_mask(&self) -> Result<u64> {
        self.info_mask.get().copied()
    }

    /// Second-phase initialisation, resolving aliases through `layer`.
    pub fn make_ready_in(&mut self, dc: &dyn DatacubeIndex, layer: &LayerScope) -> Result<()> {
        if self.main_products {
            if let Ok(canonical) = layer.band(&self.band) {
                self.canonical_band = canonical;
            }
        }
        self.make_ready(dc)
    }
}

impl ConfigEntry for FlagBand {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }

    fn make_ready(&mut self, dc: &dyn DatacubeIndex) -> Result<()> {
        let mut products = Vec::with_capacity(self.product_names.len());
        for name in &self.product_names {
            let product = dc.product_by_name(name).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Could not find flags product {name} for layer {} in datacube",
                    self.layer
                ))
            })?;
            products.push(product);
        }
        let mut low_res_products = Vec::with_capacity(self.low_res_product_names.len());
        for name in &self.low_res_product_names {
            let product = dc.product_by_name(name).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Could not find flags low_res product {name} for layer {} in datacube",
                    self.layer
                ))
            })?;
            low_res_products.push(product);
        }

        // The first product is taken as representative.
        let Some(product) = products.first() else {
            return Err(ConfigError::invalid(format!(
                "Flag band {} of layer {} has no products",
                self.band, self.layer
            )));
        };
        let Some((_, measurement)) = product.lookup_measurement(&self.canonical_band) else {
            return Err(ConfigError::invalid(format!(
                "Band {} does not exist in product {} - cannot be used as a flag band for layer {}.",
                self.band, product.name, self.layer
            )));
        };
        let Some(flags_def) = measurement.flags_definition.clone() else {
            return Err(ConfigError::invalid(format!(
                "Band {} in product {} has no flags_definition in ODC - cannot be used as a flag band for layer {}.",
                self.band, product.name, self.layer
            )));
        };

        let mut info_mask = !0u64;
        for bitname in &self.ignore_info_flags {
            let flag = flags_def.get(bitname).ok_or_else(|| {
                ConfigError::invalid(format!(
                    "Unknown flag {bitname} in ignore_info_flags of layer {}",
                    self.layer
                ))
            })?;
            // Multi-bit flags cannot be ignored.
            if let Some(bit) = flag.get("bits").and_then(Value::as_u64) {
                info_mask &= !(1u64.checked_shl(bit as u32).unwrap_or(0));
            }
        }

        self.core.fill(&mut self.pq_products, products);
        self.core.fill(&mut self.pq_low_res_products, low_res_products);
        self.core.fill(&mut self.flags_def, flags_def);
        self.core.fill(&mut self.info_mask, info_mask);
        self.core.mark_ready()
    }
}

/// A single-product key or its list form, e.g. `product` or `products`,
/// falling back to `default`.
fn flag_products(
    map: &CfgMap,
    (single, plural): (&str, &str),
    default: &[String],
    context: &str,
) -> Result<Vec<String>> {
    match (map.get(single), map.get(plural)) {
        (Some(_), Some(_)) => Err(ConfigError::conflicting(format!(
            "{context} has both '{single}' and '{plural}' - choose one."
        ))),
        (Some(Value::String(product)), None) => Ok(vec![product.clone()]),
        (Some(_), None) => Err(ConfigError::invalid(format!(
            "{context}: '{single}' must be a string"
        ))),
        (None, Some(_)) => {
            let products = str_list(map, plural, context)?;
            if products.is_empty() {
                Ok(default.to_vec())
            } else {
                Ok(products)
            }
        }
        (None, None) => Ok(default.to_vec()),
    }
}

/// Flag bands of a layer that are read from the same product set.
#[derive(Debug, Clone, PartialEq)]
pub struct FlagProductGroup {
    pub product_names: Vec<String>,
    /// Low-resolution products of the first band in the group.
    pub low_res_product_names: Vec<String>,
    pub bands: BTreeSet<String>,
    pub ignore_time: bool,
    pub manual_merge: bool,
    pub fuse_func: Option<String>,
    pub main_product: bool,
}

impl FlagProductGroup {
    /// Group flag bands by product set, in first-seen order.
    ///
    /// Bands sharing a product set must agree on `ignore_time` and, where
    /// both give one, on the fuse function.
    pub fn build<'a>(flag_bands: impl IntoIterator<Item = &'a FlagBand>) -> Result<Vec<Self>> {
        let mut groups: Vec<Self> = Vec::new();
        for fb in flag_bands {
            let fuse = fb.fuse_func().map(|f| f.name().to_string());
            match groups.iter_mut().find(|g| g.product_names == fb.product_names) {
                Some(group) => {
                    if let (Some(a), Some(b)) = (&group.fuse_func, &fuse) {
                        if a != b {
                            return Err(ConfigError::conflicting(format!(
                                "Fuse functions for flag bands in product set {:?} do not match",
                                group.product_names
                            )));
                        }
                    }
                    if group.ignore_time != fb.ignore_time {
                        return Err(ConfigError::conflicting(format!(
                            "ignore_time option for flag bands in product set {:?} do not match",
                            group.product_names
                        )));
                    }
                    if group.fuse_func.is_none() {
                        group.fuse_func = fuse;
                    }
                    group.manual_merge |= fb.manual_merge;
                    group.bands.insert(fb.canonical_band.clone());
                }
                None => groups.push(Self {
                    product_names: fb.product_names.clone(),
                    low_res_product_names: fb.low_res_product_names.clone(),
                    bands: BTreeSet::from([fb.canonical_band.clone()]),
                    ignore_time: fb.ignore_time,
                    manual_merge: fb.manual_merge,
                    fuse_func: fuse,
                    main_product: fb.main_products,
                }),
            }
        }
        Ok(groups)
    }
}
