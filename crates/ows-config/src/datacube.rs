//! Database handle used by second-phase initialisation
//!
//! Configuration entries only need to ask the datacube which products exist
//! and what measurements they carry. [`DatacubeIndex`] is that boundary;
//! [`StaticIndex`] is an in-memory implementation for the stand-alone API
//! and tests.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A measurement (band) of a product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementInfo {
    /// Alternative names the datacube accepts for this measurement.
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Bit-flag definitions, for flag (pixel quality) bands.
    #[serde(default)]
    pub flags_definition: Option<BTreeMap<String, Value>>,
}

/// A datacube product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    #[serde(default)]
    pub measurements: BTreeMap<String, MeasurementInfo>,
}

impl ProductInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measurements: BTreeMap::new(),
        }
    }

    pub fn with_measurement(mut self, name: impl Into<String>, info: MeasurementInfo) -> Self {
        self.measurements.insert(name.into(), info);
        self
    }

    /// Find a measurement by name or alias, returning its native name.
    pub fn lookup_measurement(&self, name: &str) -> Option<(&str, &MeasurementInfo)> {
        if let Some((native, info)) = self.measurements.get_key_value(name) {
            return Some((native.as_str(), info));
        }
        self.measurements
            .iter()
            .find(|(_, info)| info.aliases.iter().any(|a| a == name))
            .map(|(native, info)| (native.as_str(), info))
    }
}

/// Read access to a datacube's product catalogue.
pub trait DatacubeIndex {
    fn product_by_name(&self, name: &str) -> Option<ProductInfo>;
}

/// In-memory [`DatacubeIndex`].
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    products: HashMap<String, ProductInfo>,
}

impl StaticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_product(mut self, product: ProductInfo) -> Self {
        self.add_product(product);
        self
    }

    pub fn add_product(&mut self, product: ProductInfo) {
        self.products.insert(product.name.clone(), product);
    }
}

impl DatacubeIndex for StaticIndex {
    fn product_by_name(&self, name: &str) -> Option<ProductInfo> {
        self.products.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_alias() {
        let product = ProductInfo::new("ls8_ard").with_measurement(
            "nbart_red",
            MeasurementInfo {
                aliases: vec!["red".into()],
                flags_definition: None,
            },
        );
        assert_eq!(product.lookup_measurement("red").unwrap().0, "nbart_red");
        assert_eq!(product.lookup_measurement("nbart_red").unwrap().0, "nbart_red");
        assert!(product.lookup_measurement("blue").is_none());
    }

    #[test]
    fn static_index_returns_registered_products() {
        let index = StaticIndex::new().with_product(ProductInfo::new("ls8_ard"));
        assert!(index.product_by_name("ls8_ard").is_some());
        assert!(index.product_by_name("s2_ard").is_none());
    }
}
