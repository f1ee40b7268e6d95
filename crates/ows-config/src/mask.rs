//! Flag-band mask rules
//!
//! A mask rule selects pixels of a flag band either by named flags
//! (`{"flags": {"cloud": false, "water": true}}`, optionally grouped under
//! `and` or `or`) or by raw values (`{"values": [3, 5]}`), and may be
//! inverted.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::entry::{ConfigEntry, EntryCore};
use crate::function::BandMapper;
use crate::node::{CfgMap, RawConfigNode, as_map, bool_or, kind};
use crate::{ConfigError, Result};

/// Flag definitions of a band, as reported by the datacube.
pub type FlagsDefinition = BTreeMap<String, Value>;

/// What a mask rule matches on.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCondition {
    /// Every flag must match, or any flag when `any` is set.
    Flags { flags: CfgMap, any: bool },
    Values(Vec<i64>),
}

#[derive(Debug, Clone)]
pub struct MaskRule {
    core: EntryCore,
    band: String,
    condition: RuleCondition,
    invert: bool,
}

impl MaskRule {
    /// Parse a rule on `band`, described in errors as `context`.
    ///
    /// When given, `mapper` resolves the band to its canonical name.
    pub fn new(
        band: &str,
        cfg: &RawConfigNode,
        context: &str,
        mapper: Option<&BandMapper>,
    ) -> Result<Self> {
        let map = as_map(cfg, &format!("Mask rule in {context}"))?;
        let band = match mapper {
            Some(mapper) => mapper(band)?,
            None => band.to_string(),
        };

        let flags = match map.get("flags") {
            None | Some(Value::Null) => None,
            Some(Value::Object(flags)) => parse_flags(flags, context)?,
            Some(other) => {
                return Err(ConfigError::invalid(format!(
                    "Mask rule in {context}: 'flags' must be a mapping, got {}",
                    kind(other)
                )));
            }
        };
        let values = match map.get("values") {
            None | Some(Value::Null) => None,
            Some(value) => parse_values(value, context)?,
        };

        let condition = match (flags, values) {
            (Some(_), Some(_)) => {
                return Err(ConfigError::conflicting(format!(
                    "Mask rule in {context} has both a 'flags' and a 'values' section - choose one."
                )));
            }
            (Some((flags, any)), None) => RuleCondition::Flags { flags, any },
            (None, Some(values)) => RuleCondition::Values(values),
            (None, None) => {
                return Err(ConfigError::missing(
                    format!("Mask rule in {context}"),
                    "non-empty 'flags' or 'values' section",
                ));
            }
        };

        Ok(Self {
            core: EntryCore::new(cfg.clone()),
            band,
            condition,
            invert: bool_or(map, "invert", false),
        })
    }

    pub fn band(&self) -> &str {
        &self.band
    }

    pub fn condition(&self) -> &RuleCondition {
        &self.condition
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    /// Whether a single flag-band pixel value is selected by this rule.
    ///
    /// `flags_def` is required for flag-based rules.
    pub fn matches(&self, pixel: u64, flags_def: Option<&FlagsDefinition>) -> Result<bool> {
        let selected = match &self.condition {
            RuleCondition::Values(values) => values.iter().any(|v| u64::try_from(*v) == Ok(pixel)),
            RuleCondition::Flags { flags, any } => {
                let Some(defs) = flags_def else {
                    return Err(ConfigError::invalid(format!(
                        "Band {} has no flags definition",
                        self.band
                    )));
                };
                let mut results = flags
                    .iter()
                    .map(|(name, expected)| flag_matches(defs, name, expected, pixel));
                if *any {
                    results.try_fold(false, |acc, r| r.map(|m| acc || m))?
                } else {
                    results.try_fold(true, |acc, r| r.map(|m| acc && m))?
                }
            }
        };
        Ok(selected != self.invert)
    }
}

impl ConfigEntry for MaskRule {
    fn core(&self) -> &EntryCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntryCore {
        &mut self.core
    }
}

/// Returns the flag set and whether it is an `or` group.
///
/// An empty mapping counts as no flags at all.
fn parse_flags(flags: &CfgMap, context: &str) -> Result<Option<(CfgMap, bool)>> {
    let group = match (flags.get("and"), flags.get("or")) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::conflicting(format!(
                "ValueMap rule in {context} combines 'and' and 'or' rules"
            )));
        }
        (None, Some(group)) => Some((group, true)),
        (Some(group), None) => Some((group, false)),
        (None, None) => None,
    };
    let (flags, any) = match group {
        Some((Value::Object(group), any)) => (group.clone(), any),
        Some((other, _)) => {
            return Err(ConfigError::invalid(format!(
                "ValueMap rule in {context}: flag group must be a mapping, got {}",
                kind(other)
            )));
        }
        None => (flags.clone(), false),
    };
    Ok((!flags.is_empty()).then_some((flags, any)))
}

/// An int or list of ints; an empty list counts as no values.
fn parse_values(value: &Value, context: &str) -> Result<Option<Vec<i64>>> {
    let bad = || ConfigError::invalid(format!("Mask rule in {context}: 'values' must be integers"));
    let values = match value {
        Value::Number(n) => vec![n.as_i64().ok_or_else(bad)?],
        Value::Array(items) => items
            .iter()
            .map(|v| v.as_i64().ok_or_else(bad))
            .collect::<Result<Vec<_>>>()?,
        _ => return Err(bad()),
    };
    Ok((!values.is_empty()).then_some(values))
}

fn flag_matches(defs: &FlagsDefinition, name: &str, expected: &Value, pixel: u64) -> Result<bool> {
    let def = defs
        .get(name)
        .ok_or_else(|| ConfigError::invalid(format!("Unknown flag: {name}")))?;
    let bits: Vec<u32> = match def.get("bits") {
        Some(Value::Number(n)) => n.as_u64().map(|b| vec![b as u32]).unwrap_or_default(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|b| b.as_u64().map(|b| b as u32))
            .collect(),
        _ => Vec::new(),
    };
    let Some(&shift) = bits.iter().min() else {
        return Err(ConfigError::invalid(format!("Flag {name} has no bits")));
    };
    let mask = bits
        .iter()
        .fold(0u64, |m, b| m | 1u64.checked_shl(*b).unwrap_or(0));
    let field = (pixel & mask).checked_shr(shift).unwrap_or(0);

    // `values` maps the field's integer value (as text) to a bool or a name.
    let target = def
        .get("values")
        .and_then(Value::as_object)
        .and_then(|values| {
            values
                .iter()
                .find(|(_, v)| *v == expected)
                .and_then(|(k, _)| k.parse::<u64>().ok())
        })
        .ok_or_else(|| {
            ConfigError::invalid(format!("Flag {name} has no value matching {expected}"))
        })?;
    Ok(field == target)
}
