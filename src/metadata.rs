//! Embedded structured metadata: JSON-LD blocks and social-preview meta tags.

use serde_json::Value;
use tracing::debug;

use crate::document::Page;

/// schema.org types that describe an offering we can read a listing from.
pub const LISTING_TYPES: &[&str] = &[
    "Offer",
    "Residence",
    "Apartment",
    "House",
    "SingleFamilyResidence",
    "Product",
    "RealEstateListing",
    "RentAction",
    "BuyAction",
    "SellAction",
];

/// Flat, ordered `key -> content` pairs from one meta-tag namespace.
/// Repeated keys (several `og:image`) are all kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetaTags(Vec<(String, String)>);

impl MetaTags {
    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Everything the page declares about itself in machine-readable form.
#[derive(Debug, Clone, Default)]
pub struct StructuredMetadata {
    pub json_ld: Vec<Value>,
    /// The node a listing is read from, if any.
    pub candidate: Option<Value>,
    pub open_graph: MetaTags,
    pub twitter: MetaTags,
}

impl StructuredMetadata {
    pub fn extract(page: &Page) -> Self {
        let json_ld = extract_json_ld(page);
        let candidate = find_listing_node(&json_ld);
        Self {
            candidate,
            json_ld,
            open_graph: meta_namespace(page, "property", "og:"),
            twitter: meta_namespace(page, "name", "twitter:"),
        }
    }

    /// Field of the candidate node.
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.candidate.as_ref().and_then(|node| node.get(key))
    }

    /// Nested field of the candidate node, e.g. `["floorSize", "value"]`.
    pub fn path(&self, keys: &[&str]) -> Option<&Value> {
        let mut current = self.candidate.as_ref()?;
        for key in keys {
            current = current.get(key)?;
        }
        Some(current)
    }

    /// String field of the candidate node.
    pub fn text(&self, keys: &[&str]) -> Option<String> {
        self.path(keys).and_then(value_text)
    }
}

/// Non-blank string content of a JSON value. Numbers are rendered.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses every `application/ld+json` block. Top-level arrays and
/// `@graph` lists are flattened; blocks that fail to parse are skipped.
pub fn extract_json_ld(page: &Page) -> Vec<Value> {
    let mut nodes = Vec::new();
    for script in page.select(r#"script[type="application/ld+json"]"#) {
        let text = script.text().collect::<String>();
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => flatten_into(value, &mut nodes),
            Err(e) => debug!("Skipping malformed JSON-LD block: {}", e),
        }
    }
    nodes
}

fn flatten_into(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out);
            }
        }
        Value::Object(mut map) => match map.remove("@graph") {
            Some(Value::Array(items)) => {
                for item in items {
                    flatten_into(item, out);
                }
            }
            Some(other) => {
                map.insert("@graph".to_string(), other);
                out.push(Value::Object(map));
            }
            None => out.push(Value::Object(map)),
        },
        other => out.push(other),
    }
}

fn declared_types(node: &Value) -> Vec<&str> {
    match node.get("@type").or_else(|| node.get("type")) {
        Some(Value::String(t)) => vec![t.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

/// First node whose type is a listing type, or the `offers` of the first
/// node exposing one.
pub fn find_listing_node(nodes: &[Value]) -> Option<Value> {
    for node in nodes.iter().filter(|n| n.is_object()) {
        if declared_types(node)
            .iter()
            .any(|t| LISTING_TYPES.contains(t))
        {
            return Some(node.clone());
        }
        if let Some(offers) = node.get("offers") {
            let offer = match offers {
                Value::Array(items) => items.iter().find(|o| o.is_object()).cloned(),
                Value::Object(_) => Some(offers.clone()),
                _ => None,
            };
            if offer.is_some() {
                return offer;
            }
        }
    }
    None
}

/// The schema.org type of a node (first one when several are declared).
pub fn primary_type(node: &Value) -> Option<String> {
    declared_types(node).first().map(|t| t.to_string())
}

fn meta_namespace(page: &Page, attr: &str, prefix: &str) -> MetaTags {
    let pairs = page
        .elements()
        .filter(|el| el.value().name() == "meta")
        .filter_map(|el| {
            let key = el.value().attr(attr)?;
            let content = el.value().attr("content")?.trim();
            (key.starts_with(prefix) && !content.is_empty())
                .then(|| (key.to_string(), content.to_string()))
        })
        .collect();
    MetaTags(pairs)
}
