use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STYLE: &str = "default";
pub const HIGHLIGHT_STYLE: &str = "highlight";

/// One drawing pass: a colour (CSS-style string) and a line width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleItem {
    pub color: Option<String>,
    #[serde(rename = "lineWidth")]
    pub line_width: f64,
}

impl StyleItem {
    pub fn new(color: &str, line_width: f64) -> Self {
        Self {
            color: Some(color.to_string()),
            line_width,
        }
    }

    /// A slot that is present but paints nothing.
    pub fn transparent(line_width: f64) -> Self {
        Self {
            color: None,
            line_width,
        }
    }
}

/// The three named slots a shape is painted with.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ShapeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<StyleItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<StyleItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<StyleItem>,
}

impl ShapeStyle {
    pub fn new(outline: StyleItem, stroke: StyleItem, fill: StyleItem) -> Self {
        Self {
            outline: Some(outline),
            stroke: Some(stroke),
            fill: Some(fill),
        }
    }

    pub fn with_outline(mut self, item: StyleItem) -> Self {
        self.outline = Some(item);
        self
    }

    pub fn with_stroke(mut self, item: StyleItem) -> Self {
        self.stroke = Some(item);
        self
    }

    pub fn with_fill(mut self, item: StyleItem) -> Self {
        self.fill = Some(item);
        self
    }
}

/// Named styles, always including `"default"`.
///
/// Serialized as a flat JSON object keyed by style name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, ShapeStyle>",
    into = "BTreeMap<String, ShapeStyle>"
)]
pub struct StyleSet {
    default: ShapeStyle,
    named: BTreeMap<String, ShapeStyle>,
}

impl StyleSet {
    pub fn new(default: ShapeStyle) -> Self {
        Self {
            default,
            named: BTreeMap::new(),
        }
    }

    /// Add or replace a named style. Naming it `"default"` replaces the default.
    pub fn add_style(&mut self, name: &str, style: ShapeStyle) {
        if name == DEFAULT_STYLE {
            self.default = style;
        } else {
            self.named.insert(name.to_string(), style);
        }
    }

    pub fn with_style(mut self, name: &str, style: ShapeStyle) -> Self {
        self.add_style(name, style);
        self
    }

    pub fn default_style(&self) -> &ShapeStyle {
        &self.default
    }

    pub fn get(&self, name: &str) -> Option<&ShapeStyle> {
        if name == DEFAULT_STYLE {
            Some(&self.default)
        } else {
            self.named.get(name)
        }
    }

    /// The style to paint with; a missing highlight entry falls back to default.
    pub fn resolve(&self, highlighted: bool) -> &ShapeStyle {
        if highlighted {
            self.named.get(HIGHLIGHT_STYLE).unwrap_or(&self.default)
        } else {
            &self.default
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(DEFAULT_STYLE).chain(self.named.keys().map(|k| k.as_str()))
    }
}

impl Default for StyleSet {
    /// Black outline with a white stroke; highlighted shapes get a yellow,
    /// slightly heavier stroke.
    fn default() -> Self {
        let fill = StyleItem::transparent(1.0);
        let default = ShapeStyle::new(
            StyleItem::new("#000000", 1.0),
            StyleItem::new("#ffffff", 1.0),
            fill.clone(),
        );
        let highlight = ShapeStyle::new(
            StyleItem::new("#000000", 1.2),
            StyleItem::new("#fff000", 1.2),
            fill,
        );
        StyleSet::new(default).with_style(HIGHLIGHT_STYLE, highlight)
    }
}

impl TryFrom<BTreeMap<String, ShapeStyle>> for StyleSet {
    type Error = String;

    fn try_from(mut map: BTreeMap<String, ShapeStyle>) -> Result<Self, Self::Error> {
        let default = map
            .remove(DEFAULT_STYLE)
            .ok_or_else(|| format!("style set is missing a '{DEFAULT_STYLE}' entry"))?;
        Ok(Self {
            default,
            named: map,
        })
    }
}

impl From<StyleSet> for BTreeMap<String, ShapeStyle> {
    fn from(set: StyleSet) -> Self {
        let mut map = set.named;
        map.insert(DEFAULT_STYLE.to_string(), set.default);
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set_has_highlight() {
        let styles = StyleSet::default();
        let hi = styles.resolve(true);
        assert_eq!(
            hi.stroke.as_ref().and_then(|s| s.color.as_deref()),
            Some("#fff000")
        );
        assert!((hi.outline.as_ref().unwrap().line_width - 1.2).abs() < 1e-10);
        assert_eq!(styles.names().collect::<Vec<_>>(), vec!["default", "highlight"]);
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let plain = ShapeStyle::default().with_stroke(StyleItem::new("#ff0000", 2.0));
        let styles = StyleSet::new(plain.clone());
        assert_eq!(styles.resolve(true), &plain);
    }

    #[test]
    fn test_json_requires_default() {
        let err = serde_json::from_str::<StyleSet>(r#"{"highlight": {}}"#).unwrap_err();
        assert!(err.to_string().contains("default"));

        let parsed: StyleSet = serde_json::from_str(
            r##"{"default": {"stroke": {"color": "#123456", "lineWidth": 3}}}"##,
        )
        .unwrap();
        let stroke = parsed.default_style().stroke.as_ref().unwrap();
        assert_eq!(stroke.color.as_deref(), Some("#123456"));
        assert!((stroke.line_width - 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_add_style_named_default_replaces() {
        let mut styles = StyleSet::default();
        let replacement = ShapeStyle::default().with_fill(StyleItem::new("#00ff00", 1.0));
        styles.add_style("default", replacement.clone());
        assert_eq!(styles.default_style(), &replacement);
        assert_eq!(styles.get("default"), Some(&replacement));
    }
}
