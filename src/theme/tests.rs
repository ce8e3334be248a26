//! Theme model tests

use super::*;
use proptest::prelude::*;

#[test]
fn test_set_appends_new_property() {
    let mut rules = StyleRules::new();
    rules.set("color", "#333");
    rules.set("margin", "0");
    assert_eq!(rules.to_attr(), "color:#333;margin:0");
}

#[test]
fn test_set_overwrites_in_place() {
    let mut rules = StyleRules::from_pairs([("color", "#333"), ("margin", "0")]);
    rules.set("color", "#fff");
    // overwritten property keeps its position
    assert_eq!(rules.to_attr(), "color:#fff;margin:0");
}

#[test]
fn test_merge_override_wins() {
    let base = StyleRules::from_pairs([("color", "#333"), ("line-height", "1.5")]);
    let overrides = StyleRules::from_pairs([("color", "#fff")]);
    let merged = base.merge(&overrides);
    assert_eq!(merged.get("color"), Some("#fff"));
    assert_eq!(merged.get("line-height"), Some("1.5"));
}

#[test]
fn test_merge_appends_new_keys_in_order() {
    let base = StyleRules::from_pairs([("a", "1")]);
    let overrides = StyleRules::from_pairs([("b", "2"), ("c", "3")]);
    assert_eq!(base.merge(&overrides).to_attr(), "a:1;b:2;c:3");
}

#[test]
fn test_merge_does_not_touch_base() {
    let base = StyleRules::from_pairs([("color", "#333")]);
    let overrides = StyleRules::from_pairs([("color", "#fff")]);
    let _ = base.merge(&overrides);
    assert_eq!(base.get("color"), Some("#333"));
}

#[test]
fn test_to_attr_empty() {
    assert_eq!(StyleRules::new().to_attr(), "");
}

#[test]
fn test_yaml_round_trip_preserves_order() {
    let rules = StyleRules::from_pairs([
        ("font-size", "1.1em"),
        ("text-align", "center"),
        ("font-weight", "bold"),
    ]);
    let yaml = serde_yaml::to_string(&rules).unwrap();
    let parsed: StyleRules = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(parsed, rules);
    assert_eq!(parsed.to_attr(), "font-size:1.1em;text-align:center;font-weight:bold");
}

#[test]
fn test_yaml_scalar_values_are_stringified() {
    let parsed: StyleRules = serde_yaml::from_str("line-height: 1.5\nmargin: 0\n").unwrap();
    assert_eq!(parsed.get("line-height"), Some("1.5"));
    assert_eq!(parsed.get("margin"), Some("0"));
}

#[test]
fn test_yaml_non_scalar_value_rejected() {
    let result: Result<StyleRules, _> = serde_yaml::from_str("margin: [1, 2]\n");
    assert!(result.is_err());
}

#[test]
fn test_yaml_duplicate_keys_last_wins() {
    let parsed: StyleRules = serde_yaml::from_str("color: '#333'\nmargin: '0'\n").unwrap();
    assert_eq!(parsed.get("color"), Some("#333"));
    assert_eq!(parsed.get("margin"), Some("0"));
}

#[test]
fn test_builtin_theme_validates() {
    let theme = StyleTheme::builtin();
    assert!(theme.validate().is_ok());
    assert!(theme.block.contains_key("h1"));
    assert!(theme.inline.contains_key("wx_link"));
}

#[test]
fn test_validate_rejects_unknown_element() {
    let mut theme = StyleTheme::builtin();
    theme
        .block
        .insert("marquee".to_string(), StyleRules::from_pairs([("color", "red")]));
    match theme.validate() {
        Err(ThemeError::UnknownElement(kind)) => assert_eq!(kind, "marquee"),
        other => panic!("expected UnknownElement, got {other:?}"),
    }
}

#[test]
fn test_load_missing_file() {
    let result = StyleTheme::load(Path::new("no/such/theme.yml"));
    assert!(matches!(result, Err(ThemeError::NotFound(_))));
}

#[test]
fn test_load_theme_file() {
    use std::io::Write;

    let yaml = r##"
base:
  text-align: left
  line-height: "1.5"
block:
  h1:
    font-size: 1.2em
    color: "#123456"
inline:
  link:
    color: "#576b95"
"##;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{yaml}").unwrap();

    let theme = StyleTheme::load(file.path()).unwrap();
    assert_eq!(theme.base.get("line-height"), Some("1.5"));
    assert_eq!(theme.block["h1"].get("color"), Some("#123456"));
    assert_eq!(theme.inline["link"].get("color"), Some("#576b95"));
}

#[test]
fn test_load_rejects_unknown_element() {
    use std::io::Write;

    let yaml = "block:\n  blink:\n    color: red\n";
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{yaml}").unwrap();

    assert!(matches!(
        StyleTheme::load(file.path()),
        Err(ThemeError::UnknownElement(_))
    ));
}

#[test]
fn test_resolve_folds_fonts_into_base() {
    let theme = StyleTheme::builtin();
    let styles = theme.resolve("Helvetica, Arial, sans-serif", "16px");
    assert_eq!(styles.base().get("font-family"), Some("Helvetica, Arial, sans-serif"));
    assert_eq!(styles.base().get("font-size"), Some("16px"));

    // declared kinds inherit the base then override
    let h1 = styles.attr("h1");
    assert!(h1.contains("font-family:Helvetica, Arial, sans-serif"));
    assert!(h1.contains("border-bottom:2px solid rgba(0, 152, 116, 0.9)"));
}

#[test]
fn test_resolve_block_overrides_base_on_collision() {
    let theme = StyleTheme::builtin();
    let styles = theme.resolve("sans-serif", "16px");
    // base declares text-align:left, h1 overrides to center
    let h1 = styles.attr("h1");
    assert!(h1.contains("text-align:center"));
    assert!(!h1.contains("text-align:left"));
}

#[test]
fn test_resolve_missing_kind_falls_back_to_base() {
    let theme = StyleTheme {
        base: StyleRules::from_pairs([("line-height", "1.5")]),
        block: HashMap::new(),
        inline: HashMap::new(),
    };
    let styles = theme.resolve("serif", "14px");
    assert_eq!(styles.attr("p"), "line-height:1.5;font-family:serif;font-size:14px");
    assert!(styles.declared_attr("strong").is_none());
    assert!(!styles.declares("strong"));
}

#[test]
fn test_resolve_is_deterministic() {
    let theme = StyleTheme::builtin();
    let a = theme.resolve("sans-serif", "16px");
    let b = theme.resolve("sans-serif", "16px");
    for kind in ELEMENT_KINDS {
        assert_eq!(a.attr(kind), b.attr(kind));
    }
}

// Property-based coverage for the merge semantics.

fn prop_name() -> impl Strategy<Value = String> {
    "[a-z][a-z-]{0,10}".prop_map(|s| s)
}

fn rules_strategy() -> impl Strategy<Value = StyleRules> {
    proptest::collection::vec((prop_name(), "[a-z0-9#%. ]{1,12}"), 0..8).prop_map(|pairs| {
        let mut rules = StyleRules::new();
        for (p, v) in pairs {
            rules.set(&p, &v);
        }
        rules
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Keys in the override set always take precedence.
    #[test]
    fn property_merge_override_precedence(base in rules_strategy(), overrides in rules_strategy()) {
        let merged = base.merge(&overrides);
        for (prop, value) in overrides.iter() {
            prop_assert_eq!(merged.get(prop), Some(value));
        }
    }

    /// Keys absent from the override set fall back to base untouched.
    #[test]
    fn property_merge_base_fallback(base in rules_strategy(), overrides in rules_strategy()) {
        let merged = base.merge(&overrides);
        for (prop, value) in base.iter() {
            if overrides.get(prop).is_none() {
                prop_assert_eq!(merged.get(prop), Some(value));
            }
        }
    }

    /// Merging the same overrides twice changes nothing.
    #[test]
    fn property_merge_idempotent(base in rules_strategy(), overrides in rules_strategy()) {
        let once = base.merge(&overrides);
        let twice = once.merge(&overrides);
        prop_assert_eq!(once, twice);
    }
}
