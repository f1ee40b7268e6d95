//! Tests for mask rule parsing and pixel matching

use std::sync::Arc;

use ows_config::{BandMapper, ConfigError, FlagsDefinition, MaskRule, RuleCondition};
use ows_test_utils::fixtures::fmask_flags;
use rstest::rstest;
use serde_json::{Value, json};

fn fmask_def() -> FlagsDefinition {
    serde_json::from_value(fmask_flags()).expect("fixture is a mapping")
}

#[rstest]
#[case(json!({"color": "#FFFFFF"}))]
#[case(json!({"flags": {}, "values": []}))]
#[case(json!({"flags": null}))]
fn test_neither_section_is_missing_field(#[case] cfg: Value) {
    let err = MaskRule::new("fmask", &cfg, "test", None).expect_err("no condition");
    assert!(matches!(err, ConfigError::MissingField { .. }));
}

#[test]
fn test_band_resolved_through_mapper() {
    let mapper: BandMapper = Arc::new(|band: &str| match band {
        "pq" => Ok("fmask".to_string()),
        other => Err(ConfigError::invalid(format!("Unknown band {other}"))),
    });
    let rule = MaskRule::new("pq", &json!({"values": [1]}), "test", Some(&mapper))
        .expect("pq is an alias");
    assert_eq!(rule.band(), "fmask");
    assert_eq!(rule.condition(), &RuleCondition::Values(vec![1]));

    assert!(MaskRule::new("nope", &json!({"values": [1]}), "test", Some(&mapper)).is_err());
}

#[rstest]
#[case(json!({"flags": {"cloud": true}}), 0b010, true)]
#[case(json!({"flags": {"cloud": true}}), 0b100, false)]
#[case(json!({"flags": {"cloud": false, "water": true}}), 0b100, true)]
#[case(json!({"flags": {"and": {"cloud": true, "water": true}}}), 0b010, false)]
#[case(json!({"flags": {"or": {"cloud": true, "water": true}}}), 0b010, true)]
#[case(json!({"flags": {"cloud": true}, "invert": true}), 0b010, false)]
#[case(json!({"values": [2, 4]}), 4, true)]
#[case(json!({"values": [2, 4]}), 3, false)]
fn test_pixel_matching(#[case] cfg: Value, #[case] pixel: u64, #[case] expected: bool) {
    let rule = MaskRule::new("fmask", &cfg, "test", None).expect("valid rule");
    let def = fmask_def();
    assert_eq!(
        rule.matches(pixel, Some(&def)).expect("flags are defined"),
        expected,
        "rule {cfg} on pixel {pixel:#b}"
    );
}

#[test]
fn test_flag_rule_needs_definition() {
    let rule = MaskRule::new("fmask", &json!({"flags": {"cloud": true}}), "test", None)
        .expect("valid rule");
    assert!(rule.matches(2, None).is_err());
}

#[test]
fn test_unknown_flag_fails_matching() {
    let rule = MaskRule::new("fmask", &json!({"flags": {"snow": true}}), "test", None)
        .expect("flags are checked against the definition lazily");
    assert!(rule.matches(0, Some(&fmask_def())).is_err());
}
