//! Coordinate resolution. Strategies run in order and the first valid pair wins.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::document::Page;
use crate::models::GeoCoordinates;

static TEXT_PAIR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(-?\d{1,3}\.\d{4,})\s*,\s*(-?\d{1,3}\.\d{4,})").unwrap());
static SCRIPT_LAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\blat(?:itude)?\b["']?\s*[:=]\s*["']?(-?\d{1,3}\.\d{4,})"#).unwrap()
});
static SCRIPT_LNG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:lng|lon|long|longitude)\b["']?\s*[:=]\s*["']?(-?\d{1,3}\.\d{4,})"#)
        .unwrap()
});

const ATTRIBUTE_PAIRS: &[(&str, &str)] = &[
    ("data-lat", "data-lng"),
    ("data-lat", "data-lon"),
    ("data-latitude", "data-longitude"),
];

/// Finds coordinates for a listing from the JSON-LD candidate and the page.
pub fn resolve(candidate: Option<&Value>, page: &Page) -> Option<GeoCoordinates> {
    let found = candidate
        .and_then(from_structured)
        .or_else(|| from_attributes(page))
        .or_else(|| from_meta(page))
        .or_else(|| from_text(&page.visible_text()))
        .or_else(|| from_scripts(&page.inline_scripts()));
    if let Some(geo) = found {
        debug!(
            latitude = geo.latitude,
            longitude = geo.longitude,
            "Resolved coordinates"
        );
    }
    found
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn pair(lat: Option<f64>, lng: Option<f64>) -> Option<GeoCoordinates> {
    GeoCoordinates::new(lat?, lng?)
}

fn from_geo_node(geo: &Value) -> Option<GeoCoordinates> {
    pair(
        geo.get("latitude").and_then(coordinate),
        geo.get("longitude").and_then(coordinate),
    )
}

/// `geo` on the node (or its `object`), then `address.geo`.
pub fn from_structured(node: &Value) -> Option<GeoCoordinates> {
    let object = node.get("object");
    let geo = node
        .get("geo")
        .or_else(|| object.and_then(|o| o.get("geo")));
    if let Some(found) = geo.and_then(from_geo_node) {
        return Some(found);
    }
    node.get("address")
        .or_else(|| object.and_then(|o| o.get("address")))
        .and_then(|address| address.get("geo"))
        .and_then(from_geo_node)
}

fn from_attributes(page: &Page) -> Option<GeoCoordinates> {
    let from_data = page.elements().find_map(|el| {
        ATTRIBUTE_PAIRS.iter().find_map(|(lat, lng)| {
            pair(
                el.value().attr(lat).and_then(|v| v.trim().parse().ok()),
                el.value().attr(lng).and_then(|v| v.trim().parse().ok()),
            )
        })
    });
    from_data.or_else(|| {
        let itemprop = |name: &str| {
            page.select_first(&format!(r#"[itemprop="{}"]"#, name))
                .and_then(|el| el.value().attr("content"))
                .and_then(|v| v.trim().parse().ok())
        };
        pair(itemprop("latitude"), itemprop("longitude"))
    })
}

fn from_meta(page: &Page) -> Option<GeoCoordinates> {
    let value = |key: &str| page.meta(key).and_then(|v| v.parse().ok());
    pair(
        value("place:location:latitude"),
        value("place:location:longitude"),
    )
}

/// Adjacent decimal pairs such as "43.601958, 39.717169".
pub fn from_text(text: &str) -> Option<GeoCoordinates> {
    TEXT_PAIR.captures_iter(text).find_map(|caps| {
        pair(
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        )
    })
}

/// `lat: .. / lng: ..` style values inside map initialisation scripts.
pub fn from_scripts(scripts: &[String]) -> Option<GeoCoordinates> {
    scripts.iter().find_map(|script| {
        let capture = |re: &Regex| {
            re.captures(script)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        };
        pair(capture(&SCRIPT_LAT), capture(&SCRIPT_LNG))
    })
}
