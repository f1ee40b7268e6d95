//! Tests for metadata registration, catalogs and translation

use std::collections::HashMap;
use std::sync::Arc;

use ows_config::metadata::{FLD_TITLE, Message, MessageCatalog};
use ows_config::{MetadataOwner, MetadataRegistry};
use pretty_assertions::assert_eq;

struct Layer1;

impl MetadataOwner for Layer1 {
    fn metadata_label(&self) -> String {
        "layer1".to_string()
    }
}

/// A catalog that knows a key but carries no translation for it.
struct EmptyMessages;

impl MessageCatalog for EmptyMessages {
    fn get(&self, key: &str) -> Option<Message> {
        Some(Message {
            id: key.to_string(),
            string: Some(String::new()),
        })
    }
}

fn registry() -> MetadataRegistry {
    let mut registry = MetadataRegistry::new();
    registry.register("layer1", FLD_TITLE, "Default Title", false);
    registry
}

#[test]
fn test_catalog_overrides_default() {
    let mut registry = registry();
    assert_eq!(registry.read("layer1", "title").as_deref(), Some("Default Title"));

    let catalog: HashMap<String, String> =
        [("layer1.title".to_string(), "Catalog Title".to_string())].into();
    registry.set_catalog(Some(Arc::new(catalog)));
    assert_eq!(registry.read("layer1", "title").as_deref(), Some("Catalog Title"));
    assert_eq!(registry.default_value("layer1", "title"), Some("Default Title"));
}

#[test]
fn test_catalog_miss_falls_back_to_default() {
    let mut registry = registry();
    registry.set_catalog(Some(Arc::new(HashMap::<String, String>::new())));
    assert_eq!(registry.read("layer1", "title").as_deref(), Some("Default Title"));

    registry.set_catalog(Some(Arc::new(EmptyMessages)));
    assert_eq!(registry.read("layer1", "title").as_deref(), Some("Default Title"));
}

#[test]
fn test_translation_takes_precedence_over_catalog() {
    let mut registry = registry();
    let catalog: HashMap<String, String> =
        [("layer1.title".to_string(), "Catalog Title".to_string())].into();
    registry.set_catalog(Some(Arc::new(catalog)));
    registry.set_internationalised(true);
    registry.set_translator(Some(Arc::new(|key: &str| match key {
        "layer1.title" => "Titre".to_string(),
        other => other.to_string(),
    })));
    assert_eq!(registry.read("layer1", "title").as_deref(), Some("Titre"));

    // An untranslated key comes back unchanged and falls through.
    registry.register("layer1", "abstract", "Default Abstract", false);
    assert_eq!(
        registry.read("layer1", "abstract").as_deref(),
        Some("Default Abstract")
    );
}

#[test]
fn test_owner_accessors_read_through_registry() {
    let mut registry = registry();
    registry.register("layer1", "local_keywords", "landsat,surface", false);
    let catalog: HashMap<String, String> =
        [("layer1.title".to_string(), "Catalog Title".to_string())].into();
    registry.set_catalog(Some(Arc::new(catalog)));

    let owner = Layer1;
    assert_eq!(owner.title(&registry).as_deref(), Some("Catalog Title"));
    assert_eq!(
        owner.local_keywords(&registry).into_iter().collect::<Vec<_>>(),
        ["landsat", "surface"]
    );
    assert_eq!(owner.abstract_text(&registry), None);
    assert!(!owner.is_inherited(&registry, FLD_TITLE));
}
