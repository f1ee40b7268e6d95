//! Per-field metadata handling for configuration entries

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::MetadataRegistry;
use crate::node::{CfgMap, opt_str, str_list};
use crate::{ConfigError, Result};

pub const FLD_TITLE: &str = "title";
pub const FLD_UNITS: &str = "units";
pub const FLD_ABSTRACT: &str = "abstract";
pub const FLD_KEYWORDS: &str = "local_keywords";
pub const FLD_FEES: &str = "fees";
pub const FLD_ACCESS_CONSTRAINTS: &str = "access_constraints";
pub const FLD_ATTRIBUTION: &str = "attribution_title";
pub const FLD_CONTACT_ORGANISATION: &str = "contact_org";
pub const FLD_CONTACT_POSITION: &str = "contact_position";

/// Which metadata fields an entry type supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataFlags {
    pub title: bool,
    pub abstract_: bool,
    pub keywords: bool,
    pub contact_info: bool,
    pub fees: bool,
    pub access_constraints: bool,
    pub attribution: bool,
}

impl Default for MetadataFlags {
    fn default() -> Self {
        Self {
            title: true,
            abstract_: true,
            keywords: false,
            contact_info: false,
            fees: false,
            access_constraints: false,
            attribution: false,
        }
    }
}

/// Attribution block (`{"title": ..., "url": ..., "logo": {...}}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub logo: Option<Value>,
}

/// What a child entry may inherit from its parent.
#[derive(Debug, Clone, Default)]
pub struct InheritedMetadata {
    pub label: String,
    pub keywords: BTreeSet<String>,
    pub attribution: Option<Attribution>,
}

/// Parse-time context for an entry's metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataContext<'a> {
    /// The entry's metadata label (key prefix).
    pub label: String,
    pub parent: Option<&'a InheritedMetadata>,
    pub default_title: Option<String>,
    pub default_abstract: Option<String>,
}

/// Non-overlaid metadata state kept by the entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedMetadata {
    /// Local keywords unioned with the parent's.
    pub keywords: BTreeSet<String>,
    pub attribution: Option<Attribution>,
}

impl ParsedMetadata {
    /// The view of this entry a child inherits from.
    pub fn inheritable(&self, label: &str) -> InheritedMetadata {
        InheritedMetadata {
            label: label.to_string(),
            keywords: self.keywords.clone(),
            attribution: self.attribution.clone(),
        }
    }
}

/// Register the metadata of an entry's raw configuration.
pub fn parse_metadata(
    registry: &mut MetadataRegistry,
    flags: MetadataFlags,
    cfg: &CfgMap,
    ctx: &MetadataContext<'_>,
) -> Result<ParsedMetadata> {
    let label = ctx.label.as_str();
    let entity = format!("Entity {label}");
    let mut parsed = ParsedMetadata::default();

    if flags.title {
        let title = match (opt_str(cfg, FLD_TITLE, &entity)?, &ctx.default_title) {
            (Some(title), _) => title.to_string(),
            (None, Some(default)) => default.clone(),
            (None, None) => return Err(ConfigError::missing(entity, FLD_TITLE)),
        };
        registry.register(label, FLD_TITLE, title, false);
    }

    if flags.abstract_ {
        let inherited = ctx
            .parent
            .and_then(|p| registry.default_value(&p.label, FLD_ABSTRACT))
            .map(str::to_string);
        match opt_str(cfg, FLD_ABSTRACT, &entity)? {
            Some(local) => registry.register(label, FLD_ABSTRACT, local, false),
            None => match (inherited, &ctx.default_abstract) {
                (Some(parent_abstract), _) => {
                    registry.register(label, FLD_ABSTRACT, parent_abstract, true)
                }
                (None, Some(default)) => registry.register(label, FLD_ABSTRACT, default.clone(), false),
                (None, None) => return Err(ConfigError::missing(entity, FLD_ABSTRACT)),
            },
        }
    }

    if flags.keywords {
        let local: BTreeSet<String> = str_list(cfg, "keywords", &entity)?.into_iter().collect();
        let joined = local.iter().cloned().collect::<Vec<_>>().join(",");
        registry.register(label, FLD_KEYWORDS, joined, false);
        parsed.keywords = match ctx.parent {
            Some(parent) => parent.keywords.union(&local).cloned().collect(),
            None => local,
        };
    }

    if flags.attribution {
        let (attribution, inheriting) = match cfg.get("attribution") {
            Some(Value::Null) | None => (ctx.parent.and_then(|p| p.attribution.clone()), true),
            Some(value) => {
                let attribution: Attribution = serde_json::from_value(value.clone())
                    .map_err(|e| ConfigError::invalid(format!("{entity}: bad attribution: {e}")))?;
                (Some(attribution), false)
            }
        };
        if let Some(title) = attribution.as_ref().and_then(|a| a.title.as_deref()) {
            if !title.is_empty() {
                registry.register(label, FLD_ATTRIBUTION, title, inheriting);
            }
        }
        parsed.attribution = attribution;
    }

    if flags.fees {
        let fees = opt_str(cfg, FLD_FEES, &entity)?.filter(|s| !s.is_empty());
        registry.register(label, FLD_FEES, fees.unwrap_or("none"), false);
    }

    if flags.access_constraints {
        let acc = opt_str(cfg, FLD_ACCESS_CONSTRAINTS, &entity)?.filter(|s| !s.is_empty());
        registry.register(label, FLD_ACCESS_CONSTRAINTS, acc.unwrap_or("none"), false);
    }

    if flags.contact_info {
        if let Some(contact) = cfg.get("contact_info").and_then(Value::as_object) {
            if let Some(org) = opt_str(contact, "organisation", &entity)?.filter(|s| !s.is_empty()) {
                registry.register(label, FLD_CONTACT_ORGANISATION, org, false);
            }
            if let Some(pos) = opt_str(contact, "position", &entity)?.filter(|s| !s.is_empty()) {
                registry.register(label, FLD_CONTACT_POSITION, pos, false);
            }
        }
    }

    Ok(parsed)
}

/// Register value-map rule labels as `rule_<idx>`.
///
/// Must run after the owner has parsed its rules.
pub fn register_value_rules<'a>(
    registry: &mut MetadataRegistry,
    label: &str,
    rules: impl IntoIterator<Item = (usize, &'a str)>,
) {
    for (idx, rule_label) in rules {
        registry.register(label, &format!("rule_{idx}"), rule_label, false);
    }
}

/// Register legend tick labels as `lbl_<tick>`.
///
/// Purely numeric labels are not translatable text and are skipped.
pub fn register_tick_labels<'a>(
    registry: &mut MetadataRegistry,
    label: &str,
    ticks: impl IntoIterator<Item = (&'a str, &'a str)>,
) {
    for (tick, tick_label) in ticks {
        if tick_label.chars().any(char::is_alphabetic) {
            registry.register(label, &format!("lbl_{tick}"), tick_label, false);
        }
    }
}

/// Accessors for metadata fields routed through the registry.
///
/// An entry's title, abstract and similar text are never stored on the entry
/// itself; these methods read them via the overlays.
pub trait MetadataOwner {
    /// Key prefix for this entry's metadata.
    fn metadata_label(&self) -> String;

    fn read_local(&self, registry: &MetadataRegistry, field: &str) -> Option<String> {
        registry.read(&self.metadata_label(), field)
    }

    fn is_inherited(&self, registry: &MetadataRegistry, field: &str) -> bool {
        registry.is_inherited(&self.metadata_label(), field)
    }

    fn title(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_TITLE)
    }

    fn abstract_text(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_ABSTRACT)
    }

    /// Local keywords, after overlays.
    fn local_keywords(&self, registry: &MetadataRegistry) -> BTreeSet<String> {
        self.read_local(registry, FLD_KEYWORDS)
            .map(|kw| {
                kw.split(',')
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn fees(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_FEES)
    }

    fn access_constraints(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_ACCESS_CONSTRAINTS)
    }

    fn attribution_title(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_ATTRIBUTION)
    }

    fn contact_organisation(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_CONTACT_ORGANISATION)
    }

    fn contact_position(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_CONTACT_POSITION)
    }

    fn units(&self, registry: &MetadataRegistry) -> Option<String> {
        self.read_local(registry, FLD_UNITS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(v: Value) -> CfgMap {
        v.as_object().unwrap().clone()
    }

    fn ctx(label: &str) -> MetadataContext<'static> {
        MetadataContext {
            label: label.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn missing_title_fails() {
        let mut registry = MetadataRegistry::new();
        let err = parse_metadata(
            &mut registry,
            MetadataFlags::default(),
            &map(json!({"abstract": "A"})),
            &ctx("ls8"),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Entity ls8 has no title");
    }

    #[test]
    fn abstract_falls_back_to_parent_then_default() {
        let mut registry = MetadataRegistry::new();
        registry.register("global", FLD_ABSTRACT, "Global abstract", false);
        let parent = InheritedMetadata {
            label: "global".into(),
            ..Default::default()
        };
        let with_parent = MetadataContext {
            label: "ls8".into(),
            parent: Some(&parent),
            ..Default::default()
        };
        parse_metadata(
            &mut registry,
            MetadataFlags::default(),
            &map(json!({"title": "Landsat"})),
            &with_parent,
        )
        .unwrap();
        assert_eq!(registry.default_value("ls8", FLD_ABSTRACT), Some("Global abstract"));
        assert!(registry.is_inherited("ls8", FLD_ABSTRACT));

        let with_default = MetadataContext {
            label: "ls8.rgb".into(),
            default_abstract: Some(String::new()),
            ..Default::default()
        };
        parse_metadata(
            &mut registry,
            MetadataFlags::default(),
            &map(json!({"title": "RGB"})),
            &with_default,
        )
        .unwrap();
        assert_eq!(registry.default_value("ls8.rgb", FLD_ABSTRACT), Some(""));
        assert!(!registry.is_inherited("ls8.rgb", FLD_ABSTRACT));
    }

    #[test]
    fn keywords_union_with_parent() {
        let mut registry = MetadataRegistry::new();
        let parent = InheritedMetadata {
            label: "global".into(),
            keywords: ["landsat", "satellite"].into_iter().map(String::from).collect(),
            attribution: None,
        };
        let flags = MetadataFlags {
            keywords: true,
            ..Default::default()
        };
        let parsed = parse_metadata(
            &mut registry,
            flags,
            &map(json!({"title": "T", "abstract": "A", "keywords": ["surface", "landsat"]})),
            &MetadataContext {
                label: "ls8".into(),
                parent: Some(&parent),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(
            parsed.keywords.iter().map(String::as_str).collect::<Vec<_>>(),
            ["landsat", "satellite", "surface"]
        );
        assert_eq!(registry.default_value("ls8", FLD_KEYWORDS), Some("landsat,surface"));
    }

    #[test]
    fn fees_and_constraints_default_to_none() {
        let mut registry = MetadataRegistry::new();
        let flags = MetadataFlags {
            fees: true,
            access_constraints: true,
            ..Default::default()
        };
        parse_metadata(
            &mut registry,
            flags,
            &map(json!({"title": "T", "abstract": "A", "fees": ""})),
            &ctx("global"),
        )
        .unwrap();
        assert_eq!(registry.default_value("global", FLD_FEES), Some("none"));
        assert_eq!(registry.default_value("global", FLD_ACCESS_CONSTRAINTS), Some("none"));
    }

    #[test]
    fn attribution_inherited_from_parent() {
        let mut registry = MetadataRegistry::new();
        let parent = InheritedMetadata {
            label: "global".into(),
            keywords: BTreeSet::new(),
            attribution: Some(Attribution {
                title: Some("Open Data Cube".into()),
                ..Default::default()
            }),
        };
        let flags = MetadataFlags {
            attribution: true,
            ..Default::default()
        };
        let parsed = parse_metadata(
            &mut registry,
            flags,
            &map(json!({"title": "T", "abstract": "A"})),
            &MetadataContext {
                label: "ls8".into(),
                parent: Some(&parent),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(registry.default_value("ls8", FLD_ATTRIBUTION), Some("Open Data Cube"));
        assert!(registry.is_inherited("ls8", FLD_ATTRIBUTION));
        assert_eq!(parsed.attribution, parent.attribution);
    }

    #[test]
    fn numeric_tick_labels_are_not_registered() {
        let mut registry = MetadataRegistry::new();
        register_tick_labels(&mut registry, "ls8.ndvi", [("0.0", "0.0"), ("1.0", "High")]);
        assert_eq!(registry.default_value("ls8.ndvi", "lbl_0.0"), None);
        assert_eq!(registry.default_value("ls8.ndvi", "lbl_1.0"), Some("High"));
    }
}
