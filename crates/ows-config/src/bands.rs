//! Per-layer band index
//!
//! A layer's `bands` section maps each canonical band name to a list of
//! aliases:
//!
//! ```json
//! "bands": {"nbart_red": ["red"], "nbart_nir": ["nir", "near_infrared"], "fmask": []}
//! ```
//!
//! Band references elsewhere in a layer (styles, flag bands, functions with
//! `mapped_bands`) may use any alias; the index resolves them to canonical
//! names. Native measurement names are resolved against the product during
//! second-phase initialisation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

use crate::datacube::DatacubeIndex;
use crate::entry::{ConfigEntry, Deferred, EntryCore};
use crate::function::BandMapper;
use crate::metadata::{MetadataOwner, MetadataRegistry};
use crate::node::{RawConfigNode, kind};
use crate::{ConfigError, Result};

#[derive(Debug, Clone)]
pub struct BandIndex {
    core: EntryCore,
    layer: String,
    product: String,
    /// Canonical band name to its aliases, in configuration order.
    band_cfg: BTreeMap<String, Vec<String>>,
    /// Every name and alias to its canonical band.
    lookup: Arc<HashMap<String, String>>,
    native_bands: Deferred<BTreeMap<String, String>>,
}

impl BandIndex {
    /// Parse a layer's `bands` section.
    ///
    /// `product` is the layer's first product, against which native names
    /// are resolved. A default label (the first alias, else the band name) is
    /// registered for every band.
    pub fn new(
        layer: &str,
        product: &str,
        cfg: &RawConfigNode,
        metadata: &mut MetadataRegistry,
    ) -> Result<Self> {
        let Some(bands) = cfg.as_object() else {
            return Err(ConfigError::invalid(format!(
                "Bands section of layer {layer} must be a mapping, got {}",
                kind(cfg)
            )));
        };
        if bands.is_empty() {
            return Err(ConfigError::invalid(format!("Layer {layer} has no bands")));
        }

        let mut band_cfg = BTreeMap::new();
        let mut lookup = HashMap::new();
        for (band, aliases) in bands {
            let aliases: Vec<String> = match aliases {
                Value::Null => Vec::new(),
                Value::Array(items) => items
                    .iter()
                    .map(|a| {
                        a.as_str().map(str::to_string).ok_or_else(|| {
                            ConfigError::invalid(format!(
                                "Aliases for band {band} in layer {layer} must be strings"
                            ))
                        })
                    })
                    .collect::<Result<_>>()?,
                other => {
                    return Err(ConfigError::invalid(format!(
                        "Aliases for band {band} in layer {layer} must be a list, got {}",
                        kind(other)
                    )));
                }
            };
            for name in std::iter::once(band).chain(aliases.iter()) {
                match lookup.get(name) {
                    Some(existing) if existing != band => {
                        return Err(ConfigError::conflicting(format!(
                            "Duplicate band name/alias: {name} in layer {layer}"
                        )));
                    }
                    _ => {
                        lookup.insert(name.clone(), band.clone());
                    }
                }
            }
            band_cfg.insert(band.clone(), aliases);
        }

        let mut core = EntryCore::new(cfg.clone());
        let native_bands = core.declare("native_bands")?;
        let index = Self {
            core,
            layer: layer.to_string(),
            product: product.to_string(),
            band_cfg,
            lookup: Arc::new(lookup),
            native_bands,
        };

        let label = index.metadata_label();
        for (band, aliases) in &index.band_cfg {
            let default = aliases.first().unwrap_or(band);
            metadata.register(&label, band, default.as_str(), false);
        }
        Ok(index)
    }

    /// Resolve a band name or alias to its canonical name.
    pub fn band(&self, name_or_alias: &str) -> Result<String> {
        resolve(&self.lookup, &self.layer, name_or_alias)
    }

    /// A shareable mapper with the same behaviour as [`band`](Self::band).
    pub fn mapper(&self) -> BandMapper {
        let lookup = Arc::clone(&self.lookup);
        let layer = self.layer.clone();
        Arc::new(move |name: &str| resolve(&lookup, &layer, name))
    }

    /// Canonical band names, sorted.
    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.band_cfg.keys().map(String::as_str)
    }

    pub fn aliases(&self, band: &str) -> Option<&[String]> {
        self.band_cfg.get(band).map(Vec::as_slice)
    }

    /// Display label of a band, through the metadata overlays.
    pub fn band_label(&self, metadata: &MetadataRegistry, band: &str) -> Result<String> {
        let canonical = self.band(band)?;
        Ok(self
            .read_local(metadata, &canonical)
            .unwrap_or(canonical))
    }

    /// The product measurement backing `band`.
    pub fn native_band(&self, band: &str) -> Result<&str> {
        let canonical = self.band(band)?;
        let native = self.native_bands.get()?;
        native
            .get(&canonical)
            .map(String::as_str)
            .ok_or_else(|| ConfigError::not_found(format!("No native band for {canonical}")))
    }
}

fn resolve(lookup: &HashMap<String, String>, layer: &str, name: &str) -> Result<String> {
    lookup.get(name).cloned().ok_or_else(|| {
        ConfigError::invalid(format!("Unknown band name/alias: {name} in layer {layer}"))
    })
}

impl MetadataOwner for BandIndex {
    fn metadata_label(&self) -> String {
        format!("{}.bands", self.layer)
    }
}

impl ConfigEntry for BandIndex {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }

    /// Check every band against the product's measurements.
    fn make_ready(&mut self, dc: &dyn DatacubeIndex) -> Result<()> {
        let product = dc.product_by_name(&self.product).ok_or_else(|| {
            ConfigError::invalid(format!(
                "Could not find product {} in datacube for layer {}",
                self.product, self.layer
            ))
        })?;

        let mut native = BTreeMap::new();
        for (band, aliases) in &self.band_cfg {
            let found = std::iter::once(band)
                .chain(aliases.iter())
                .find_map(|name| product.lookup_measurement(name));
            let Some((measurement, _)) = found else {
                return Err(ConfigError::invalid(format!(
                    "Band {band} does not exist in product {} for layer {}",
                    product.name, self.layer
                )));
            };
            native.insert(band.clone(), measurement.to_string());
        }
        tracing::debug!(layer = %self.layer, bands = native.len(), "Band index ready");

        self.core.fill(&mut self.native_bands, native);
        self.core.mark_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datacube::{MeasurementInfo, ProductInfo, StaticIndex};
    use serde_json::json;

    fn index(metadata: &mut MetadataRegistry) -> BandIndex {
        BandIndex::new(
            "ls8",
            "ls8_ard",
            &json!({"nbart_red": ["red"], "nbart_nir": ["nir", "near_infrared"], "fmask": []}),
            metadata,
        )
        .unwrap()
    }

    #[test]
    fn aliases_resolve_to_canonical() {
        let mut metadata = MetadataRegistry::new();
        let idx = index(&mut metadata);
        assert_eq!(idx.band("near_infrared").unwrap(), "nbart_nir");
        assert_eq!(idx.band("fmask").unwrap(), "fmask");
        assert_eq!(idx.mapper()("red").unwrap(), "nbart_red");
        assert!(idx.band("blue").is_err());
    }

    #[test]
    fn default_labels_use_first_alias() {
        let mut metadata = MetadataRegistry::new();
        let idx = index(&mut metadata);
        assert_eq!(idx.band_label(&metadata, "nir").unwrap(), "nir");
        assert_eq!(idx.band_label(&metadata, "fmask").unwrap(), "fmask");
        assert_eq!(metadata.default_value("ls8.bands", "nbart_red"), Some("red"));
    }

    #[test]
    fn duplicate_alias_conflicts() {
        let mut metadata = MetadataRegistry::new();
        let err = BandIndex::new(
            "ls8",
            "ls8_ard",
            &json!({"nbart_red": ["red"], "red_edge": ["red"]}),
            &mut metadata,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingFields { .. }));
    }

    #[test]
    fn native_bands_need_make_ready() {
        let mut metadata = MetadataRegistry::new();
        let mut idx = index(&mut metadata);
        assert!(idx.native_band("red").unwrap_err().is_not_ready());

        let dc = StaticIndex::new().with_product(
            ProductInfo::new("ls8_ard")
                .with_measurement("nbart_red", MeasurementInfo::default())
                .with_measurement(
                    "nbart_near_infrared",
                    MeasurementInfo {
                        aliases: vec!["nir".into()],
                        flags_definition: None,
                    },
                )
                .with_measurement("fmask", MeasurementInfo::default()),
        );
        idx.make_ready(&dc).unwrap();
        assert!(idx.is_ready());
        assert_eq!(idx.native_band("red").unwrap(), "nbart_red");
        assert_eq!(idx.native_band("nbart_nir").unwrap(), "nbart_near_infrared");
    }

    #[test]
    fn make_ready_rejects_unknown_band() {
        let mut metadata = MetadataRegistry::new();
        let mut idx = index(&mut metadata);
        let dc = StaticIndex::new().with_product(ProductInfo::new("ls8_ard"));
        assert!(idx.make_ready(&dc).is_err());
        assert!(!idx.is_ready());
    }
}
