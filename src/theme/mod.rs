//! Inline-style themes
//!
//! A theme declares, per document element kind, the CSS rules that get
//! injected as inline `style` attributes when an article is rendered. The
//! Official Account editor strips stylesheets, so every visual decision has
//! to travel inline with the element it styles.
//!
//! A theme has three sections:
//! - `base`: rules applied to every styled element
//! - `block`: per-kind rules for block elements (headings, paragraphs, ...)
//! - `inline`: per-kind rules for inline elements (code spans, links, ...)
//!
//! Rule order is preserved all the way into the emitted `style` attribute.
//! On a property-name collision the block/inline rule wins over `base`, and
//! the overridden property keeps its original position.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;

mod error;

pub use error::ThemeError;

#[cfg(test)]
mod tests;

/// Element kinds a theme is allowed to style.
///
/// Anything else in a theme file is a typo and gets rejected at load time.
pub const ELEMENT_KINDS: &[&str] = &[
    "h1",
    "h2",
    "h3",
    "h4",
    "p",
    "blockquote",
    "blockquote_p",
    "code_pre",
    "code",
    "image",
    "figure",
    "ol",
    "ul",
    "hr",
    "footnotes",
    "listitem",
    "codespan",
    "link",
    "wx_link",
    "strong",
    "table",
    "thead",
    "td",
    "footnote",
    "figcaption",
];

/// An ordered set of CSS property/value pairs.
///
/// Serialized as a YAML mapping; insertion order is significant and survives
/// a round-trip. Setting an existing property replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleRules(Vec<(String, String)>);

impl StyleRules {
    /// Creates an empty rule set.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builds a rule set from literal pairs, in order.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut rules = Self::new();
        for (prop, value) in pairs {
            rules.set(prop, value);
        }
        rules
    }

    /// Sets a property. An existing property is overwritten in place and
    /// keeps its position; a new property is appended.
    pub fn set(&mut self, prop: &str, value: &str) {
        match self.0.iter_mut().find(|(p, _)| p == prop) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((prop.to_string(), value.to_string())),
        }
    }

    /// Looks up a property value.
    pub fn get(&self, prop: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(p, _)| p == prop)
            .map(|(_, v)| v.as_str())
    }

    /// Merges `overrides` on top of `self`, returning a new rule set.
    ///
    /// Properties present in both keep the position they had in `self` but
    /// take the overriding value; properties only in `overrides` append in
    /// their own order.
    pub fn merge(&self, overrides: &StyleRules) -> StyleRules {
        let mut merged = self.clone();
        for (prop, value) in &overrides.0 {
            merged.set(prop, value);
        }
        merged
    }

    /// Renders the rules as a `style` attribute value: `"prop:val;prop:val"`,
    /// order-preserving, no trailing semicolon.
    pub fn to_attr(&self) -> String {
        self.0
            .iter()
            .map(|(p, v)| format!("{p}:{v}"))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, v)| (p.as_str(), v.as_str()))
    }
}

impl Serialize for StyleRules {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (prop, value) in &self.0 {
            map.serialize_entry(prop, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for StyleRules {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RulesVisitor;

        impl<'de> Visitor<'de> for RulesVisitor {
            type Value = StyleRules;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of CSS property names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut rules = StyleRules::new();
                // scalar values (`line-height: 1.5`, `margin: 0`) are
                // accepted and stringified; duplicate keys: last one wins
                while let Some((prop, value)) =
                    access.next_entry::<String, serde_yaml::Value>()?
                {
                    let value = match value {
                        serde_yaml::Value::String(s) => s,
                        serde_yaml::Value::Number(n) => n.to_string(),
                        serde_yaml::Value::Bool(b) => b.to_string(),
                        other => {
                            return Err(serde::de::Error::custom(format!(
                                "style value for '{prop}' must be a scalar, got {other:?}"
                            )))
                        }
                    };
                    rules.set(&prop, &value);
                }
                Ok(rules)
            }
        }

        deserializer.deserialize_map(RulesVisitor)
    }
}

/// A complete theme: base rules plus per-element block and inline rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StyleTheme {
    /// Rules applied to every styled element
    #[serde(default)]
    pub base: StyleRules,
    /// Per-kind rules for block elements
    #[serde(default)]
    pub block: HashMap<String, StyleRules>,
    /// Per-kind rules for inline elements
    #[serde(default)]
    pub inline: HashMap<String, StyleRules>,
}

impl StyleTheme {
    /// Loads and validates a theme from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ThemeError> {
        if !path.exists() {
            return Err(ThemeError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let theme: StyleTheme =
            serde_yaml::from_str(&content).map_err(|e| ThemeError::Invalid(e.to_string()))?;
        theme.validate()?;
        Ok(theme)
    }

    /// Checks that every styled element kind is one the renderer knows.
    pub fn validate(&self) -> Result<(), ThemeError> {
        for kind in self.block.keys().chain(self.inline.keys()) {
            if !ELEMENT_KINDS.contains(&kind.as_str()) {
                return Err(ThemeError::UnknownElement(kind.clone()));
            }
        }
        Ok(())
    }

    /// Resolves the theme into a per-element style table.
    ///
    /// `fonts` and `size` are folded into the base rules first, then each
    /// block/inline entry is merged on top of that base.
    pub fn resolve(&self, fonts: &str, size: &str) -> StyleMap {
        let mut base = self.base.clone();
        base.set("font-family", fonts);
        base.set("font-size", size);

        let mut map = HashMap::new();
        for (kind, rules) in self.inline.iter().chain(self.block.iter()) {
            map.insert(kind.clone(), base.merge(rules));
        }

        StyleMap { base, map }
    }

    /// The built-in look: muted gray text with green accents, tuned for the
    /// Official Account article body width.
    pub fn builtin() -> Self {
        const BASE_COLOR: &str = "#3f3f3f";

        let mut block = HashMap::new();
        block.insert(
            "h1".to_string(),
            StyleRules::from_pairs([
                ("font-size", "1.1em"),
                ("text-align", "center"),
                ("font-weight", "bold"),
                ("display", "table"),
                ("margin", "1.5em auto 0.75em"),
                ("padding", "0 0.8em"),
                ("border-bottom", "2px solid rgba(0, 152, 116, 0.9)"),
                ("color", BASE_COLOR),
            ]),
        );
        block.insert(
            "h2".to_string(),
            StyleRules::from_pairs([
                ("font-size", "1.1em"),
                ("text-align", "center"),
                ("font-weight", "bold"),
                ("display", "table"),
                ("margin", "3em auto 1.5em"),
                ("padding", "0 0.2em"),
                ("background", "rgba(0, 152, 116, 0.9)"),
                ("color", "#fff"),
            ]),
        );
        block.insert(
            "h3".to_string(),
            StyleRules::from_pairs([
                ("font-weight", "bold"),
                ("font-size", "1em"),
                ("margin", "1.5em 6px 0.5em 0"),
                ("line-height", "1.2"),
                ("padding-left", "6px"),
                ("border-left", "3px solid rgba(0, 152, 116, 0.9)"),
                ("color", BASE_COLOR),
            ]),
        );
        block.insert(
            "h4".to_string(),
            StyleRules::from_pairs([
                ("font-weight", "bold"),
                ("font-size", "0.9em"),
                ("margin", "1.5em 6px 0.5em"),
                ("color", "rgba(66, 185, 131, 0.9)"),
            ]),
        );
        block.insert(
            "p".to_string(),
            StyleRules::from_pairs([
                ("margin", "1em 6px"),
                ("letter-spacing", "0.05em"),
                ("color", BASE_COLOR),
                ("text-align", "justify"),
            ]),
        );
        block.insert(
            "blockquote".to_string(),
            StyleRules::from_pairs([
                ("font-style", "normal"),
                ("border-left", "none"),
                ("padding", "0.8em"),
                ("border-radius", "6px"),
                ("color", "rgba(0,0,0,0.5)"),
                ("background", "#f7f7f7"),
                ("margin", "1.5em 6px"),
            ]),
        );
        block.insert(
            "blockquote_p".to_string(),
            StyleRules::from_pairs([
                ("letter-spacing", "0.05em"),
                ("color", "rgb(80, 80, 80)"),
                ("font-size", "0.9em"),
                ("display", "block"),
            ]),
        );
        block.insert(
            "code_pre".to_string(),
            StyleRules::from_pairs([
                ("font-size", "13px"),
                ("overflow-x", "auto"),
                ("border-radius", "6px"),
                ("padding", "0.8em"),
                ("line-height", "1.4"),
                ("margin", "8px 6px"),
            ]),
        );
        block.insert(
            "code".to_string(),
            StyleRules::from_pairs([
                ("margin", "0"),
                ("white-space", "nowrap"),
                ("font-family", "Menlo, Operator Mono, Consolas, Monaco, monospace"),
            ]),
        );
        block.insert(
            "image".to_string(),
            StyleRules::from_pairs([
                ("border-radius", "4px"),
                ("display", "block"),
                ("margin", "0.1em auto 0.4em"),
                ("width", "100% !important"),
            ]),
        );
        block.insert(
            "ol".to_string(),
            StyleRules::from_pairs([
                ("margin-left", "0"),
                ("padding-left", "0.8em"),
                ("color", BASE_COLOR),
            ]),
        );
        block.insert(
            "ul".to_string(),
            StyleRules::from_pairs([
                ("margin-left", "0"),
                ("padding-left", "0.8em"),
                ("list-style", "circle"),
                ("color", BASE_COLOR),
            ]),
        );
        block.insert(
            "footnotes".to_string(),
            StyleRules::from_pairs([
                ("margin", "0.4em 6px"),
                ("font-size", "75%"),
                ("color", BASE_COLOR),
            ]),
        );
        block.insert(
            "figure".to_string(),
            StyleRules::from_pairs([("margin", "1.2em 6px"), ("color", BASE_COLOR)]),
        );
        block.insert(
            "hr".to_string(),
            StyleRules::from_pairs([
                ("border-style", "solid"),
                ("border-width", "1px 0 0"),
                ("border-color", "rgba(0,0,0,0.1)"),
                ("-webkit-transform-origin", "0 0"),
                ("-webkit-transform", "scale(1, 0.5)"),
                ("transform-origin", "0 0"),
                ("transform", "scale(1, 0.5)"),
            ]),
        );

        let mut inline = HashMap::new();
        inline.insert(
            "listitem".to_string(),
            StyleRules::from_pairs([
                ("text-indent", "-0.8em"),
                ("display", "block"),
                ("margin", "0.2em 6px"),
                ("color", BASE_COLOR),
            ]),
        );
        inline.insert(
            "codespan".to_string(),
            StyleRules::from_pairs([
                ("font-size", "85%"),
                ("color", "#d14"),
                ("background", "rgba(27,31,35,.05)"),
                ("padding", "2px 4px"),
                ("border-radius", "3px"),
            ]),
        );
        inline.insert(
            "link".to_string(),
            StyleRules::from_pairs([("color", "#576b95")]),
        );
        inline.insert(
            "wx_link".to_string(),
            StyleRules::from_pairs([("color", "#576b95"), ("text-decoration", "none")]),
        );
        inline.insert(
            "strong".to_string(),
            StyleRules::from_pairs([
                ("color", "rgba(15, 76, 129, 0.9)"),
                ("font-weight", "bold"),
            ]),
        );
        inline.insert(
            "table".to_string(),
            StyleRules::from_pairs([
                ("border-collapse", "collapse"),
                ("text-align", "center"),
                ("margin", "0.8em 6px"),
                ("color", BASE_COLOR),
            ]),
        );
        inline.insert(
            "thead".to_string(),
            StyleRules::from_pairs([
                ("background", "rgba(0, 0, 0, 0.05)"),
                ("font-weight", "bold"),
                ("color", BASE_COLOR),
            ]),
        );
        inline.insert(
            "td".to_string(),
            StyleRules::from_pairs([
                ("border", "1px solid #dfdfdf"),
                ("padding", "0.2em 0.4em"),
                ("color", BASE_COLOR),
            ]),
        );
        inline.insert(
            "footnote".to_string(),
            StyleRules::from_pairs([("font-size", "11px"), ("color", BASE_COLOR)]),
        );
        inline.insert(
            "figcaption".to_string(),
            StyleRules::from_pairs([
                ("text-align", "center"),
                ("color", "#888"),
                ("font-size", "0.75em"),
            ]),
        );

        Self {
            base: StyleRules::from_pairs([("text-align", "left"), ("line-height", "1.5")]),
            block,
            inline,
        }
    }
}

/// Per-element effective styles, precomputed from a theme.
#[derive(Debug, Clone)]
pub struct StyleMap {
    base: StyleRules,
    map: HashMap<String, StyleRules>,
}

impl StyleMap {
    /// Effective style attribute for a structural element kind. Kinds the
    /// theme does not declare fall back to the base rules.
    pub fn attr(&self, kind: &str) -> String {
        self.map
            .get(kind)
            .unwrap_or(&self.base)
            .to_attr()
    }

    /// Style attribute for a decorative kind, only when the theme declares
    /// it. Undeclared decorative elements are left to the platform default.
    pub fn declared_attr(&self, kind: &str) -> Option<String> {
        self.map.get(kind).map(StyleRules::to_attr)
    }

    /// Whether the theme declares rules for a kind.
    pub fn declares(&self, kind: &str) -> bool {
        self.map.contains_key(kind)
    }

    /// The resolved base rules (with fonts and size folded in).
    pub fn base(&self) -> &StyleRules {
        &self.base
    }
}
