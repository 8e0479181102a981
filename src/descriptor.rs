//! Component descriptor model.
//!
//! A [`Descriptor`] describes one component instance: the component type to
//! render, an optional style map, optional children and a bag of extra
//! properties that sit at the root level next to the recognised keys.
//!
//! Persisted caches and endpoint responses use the derived serde shape.
//! Payloads coming from the text-generation backend go through
//! [`Descriptor::from_value`] instead, which validates and normalizes them.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DescriptorError;

/// Component type used by the fallback descriptor.
pub const FALLBACK_COMPONENT: &str = "div";

/// Prefix of the children text of every fallback descriptor.
pub const FALLBACK_MARKER: &str = "Error generating component";

/// Keys a model sometimes nests properties under. Their contents are hoisted
/// to the root.
const NESTED_PROPS_KEYS: [&str; 2] = ["props", "properties"];

/// Structured description of one renderable component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Primitive renderable kind, e.g. a tag name.
    #[serde(rename = "componentType", alias = "component")]
    pub component_type: String,
    /// Presentation attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Children>,
    /// Every other property, flattened at the root.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Children of a [`Descriptor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Children {
    Text(String),
    Many(Vec<Descriptor>),
    One(Box<Descriptor>),
}

impl Descriptor {
    /// Create a descriptor with only a component type.
    #[must_use]
    pub fn new(component_type: impl Into<String>) -> Self {
        Self {
            component_type: component_type.into(),
            style: None,
            children: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_style(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.style
            .get_or_insert_with(IndexMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_children(mut self, children: Children) -> Self {
        self.children = Some(children);
        self
    }

    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_children(Children::Text(text.into()))
    }

    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The degraded-but-valid descriptor cached when generation fails.
    #[must_use]
    pub fn fallback(reason: &str) -> Self {
        Self::new(FALLBACK_COMPONENT).with_text(format!("{FALLBACK_MARKER}: {reason}"))
    }

    /// Whether this descriptor was produced by [`Descriptor::fallback`].
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        self.component_type == FALLBACK_COMPONENT
            && matches!(&self.children, Some(Children::Text(text)) if text.starts_with(FALLBACK_MARKER))
    }

    /// Parse raw model output into a descriptor.
    ///
    /// Markdown code fences around the JSON are tolerated.
    pub fn parse_generated(text: &str) -> Result<Self, DescriptorError> {
        let body = strip_code_fences(text);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| DescriptorError::InvalidJson(e.to_string()))?;
        Self::from_value(value)
    }

    /// Validate and normalize an untrusted JSON value.
    ///
    /// - `componentType` (or the legacy `component`) must be a non-empty string.
    /// - Scalar style values are coerced to strings.
    /// - Contents of a nested `props`/`properties` object are hoisted to the
    ///   root without overriding root keys.
    pub fn from_value(value: Value) -> Result<Self, DescriptorError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => return Err(DescriptorError::NotAnObject(type_name(&other))),
        };

        for key in NESTED_PROPS_KEYS {
            if matches!(map.get(key), Some(Value::Object(_))) {
                if let Some(Value::Object(nested)) = map.shift_remove(key) {
                    for (k, v) in nested {
                        map.entry(k).or_insert(v);
                    }
                }
            }
        }

        let component_type = match map
            .shift_remove("componentType")
            .or_else(|| map.shift_remove("component"))
        {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(DescriptorError::MissingComponentType),
        };
        // Only one of the two keys is consumed above; drop the other.
        map.shift_remove("component");

        let style = match map.shift_remove("style") {
            None | Some(Value::Null) => None,
            Some(Value::Object(entries)) => {
                let mut style = IndexMap::with_capacity(entries.len());
                for (key, value) in entries {
                    let value = match value {
                        Value::String(s) => s,
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => return Err(DescriptorError::InvalidStyle(key)),
                    };
                    style.insert(key, value);
                }
                Some(style)
            }
            Some(_) => return Err(DescriptorError::InvalidStyle("style".to_string())),
        };

        let children = match map.shift_remove("children") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(Children::Text(s)),
            Some(Value::Number(n)) => Some(Children::Text(n.to_string())),
            Some(Value::Array(items)) => Some(Children::Many(
                items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(_) => Self::from_value(item),
                        _ => Err(DescriptorError::InvalidChildren),
                    })
                    .collect::<Result<_, _>>()?,
            )),
            Some(obj @ Value::Object(_)) => Some(Children::One(Box::new(Self::from_value(obj)?))),
            Some(Value::Bool(_)) => return Err(DescriptorError::InvalidChildren),
        };

        Ok(Self {
            component_type,
            style,
            children,
            extra: map,
        })
    }
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serializes_extra_at_root() {
        let d = Descriptor::new("input")
            .with_style("borderColor", "red")
            .with_extra("placeholder", json!("Enter your name"));

        let v = serde_json::to_value(&d).unwrap();
        assert_eq!(
            v,
            json!({
                "componentType": "input",
                "style": { "borderColor": "red" },
                "placeholder": "Enter your name"
            })
        );
    }

    #[test]
    fn test_deserializes_legacy_component_key() {
        let d: Descriptor = serde_json::from_value(json!({
            "component": "button",
            "children": "Click me!",
            "className": "rounded"
        }))
        .unwrap();

        assert_eq!(d.component_type, "button");
        assert_eq!(d.children, Some(Children::Text("Click me!".into())));
        assert_eq!(d.extra.get("className"), Some(&json!("rounded")));
    }

    #[test]
    fn test_nested_children_roundtrip_shape() {
        let d: Descriptor = serde_json::from_value(json!({
            "componentType": "div",
            "children": [
                { "componentType": "h2", "children": "Title" },
                { "componentType": "p", "children": { "componentType": "span" } }
            ]
        }))
        .unwrap();

        let Some(Children::Many(items)) = &d.children else {
            panic!("expected a list of children");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[1].children, Some(Children::One(inner)) if inner.component_type == "span"));
    }

    #[test]
    fn test_from_value_coerces_style_scalars() {
        let d = Descriptor::from_value(json!({
            "componentType": "div",
            "style": { "opacity": 0.5, "flexGrow": 1, "visible": true, "color": "green" }
        }))
        .unwrap();

        let style = d.style.unwrap();
        assert_eq!(style["opacity"], "0.5");
        assert_eq!(style["flexGrow"], "1");
        assert_eq!(style["visible"], "true");
        assert_eq!(style["color"], "green");
    }

    #[test]
    fn test_from_value_rejects_nested_style() {
        let err = Descriptor::from_value(json!({
            "componentType": "div",
            "style": { "hover": { "color": "red" } }
        }))
        .unwrap_err();
        assert_eq!(err, DescriptorError::InvalidStyle("hover".into()));
    }

    #[test]
    fn test_from_value_requires_component_type() {
        assert_eq!(
            Descriptor::from_value(json!({ "children": "hi" })).unwrap_err(),
            DescriptorError::MissingComponentType
        );
        assert_eq!(
            Descriptor::from_value(json!({ "componentType": "  " })).unwrap_err(),
            DescriptorError::MissingComponentType
        );
        assert_eq!(
            Descriptor::from_value(json!(["div"])).unwrap_err(),
            DescriptorError::NotAnObject("array")
        );
    }

    #[test]
    fn test_from_value_hoists_nested_props() {
        let d = Descriptor::from_value(json!({
            "componentType": "input",
            "placeholder": "root wins",
            "props": { "placeholder": "nested", "type": "text", "style": { "color": "red" } }
        }))
        .unwrap();

        assert_eq!(d.extra.get("placeholder"), Some(&json!("root wins")));
        assert_eq!(d.extra.get("type"), Some(&json!("text")));
        assert!(!d.extra.contains_key("props"));
        assert_eq!(d.style.unwrap()["color"], "red");
    }

    #[test]
    fn test_from_value_rejects_text_in_child_list() {
        let err = Descriptor::from_value(json!({
            "componentType": "div",
            "children": ["hello", { "componentType": "b" }]
        }))
        .unwrap_err();
        assert_eq!(err, DescriptorError::InvalidChildren);
    }

    #[test]
    fn test_parse_generated_strips_fences() {
        let text = "```json\n{\"componentType\": \"button\", \"children\": \"Go\"}\n```";
        let d = Descriptor::parse_generated(text).unwrap();
        assert_eq!(d.component_type, "button");

        let bare = Descriptor::parse_generated("  {\"componentType\": \"hr\"}  ").unwrap();
        assert_eq!(bare.component_type, "hr");
    }

    #[test]
    fn test_parse_generated_invalid_json() {
        assert!(matches!(
            Descriptor::parse_generated("Sure! Here is your button."),
            Err(DescriptorError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_fallback_detection() {
        let fb = Descriptor::fallback("connection refused");
        assert!(fb.is_fallback());
        assert_eq!(fb.component_type, FALLBACK_COMPONENT);

        let normal = Descriptor::new("div").with_text("Hello");
        assert!(!normal.is_fallback());
    }
}
