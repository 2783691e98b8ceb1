//! Per-site adapters. Only Zillow reads an embedded state blob; the other
//! portals publish usable JSON-LD and go straight to the generic extractor.

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::document::Page;
use crate::metadata::value_text;
use crate::models::{Address, GeoCoordinates, Listing, Money, RoomInfo, TransactionType};
use crate::normalize::{detect_currency, parse_number_value, pick_first, to_square_meters};
use crate::probe::ImageProbe;
use crate::scrapers::generic::parse_generic;
use crate::scrapers::ExtractOptions;

static ZILLOW_HOST: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(^|\.)zillow\.com$").unwrap());
static REALTOR_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\.)realtor\.(com|ca)$").unwrap());
static RIGHTMOVE_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\.)rightmove\.co\.uk$").unwrap());
static IDEALISTA_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\.)idealista\.(com|it|pt|es)$").unwrap());
static IMMOSCOUT24_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^|\.)(immobilienscout24|immoscout24)\.(de|ch)$").unwrap()
});

/// Site-specific extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteAdapter {
    Zillow,
    Realtor,
    Rightmove,
    Idealista,
    ImmoScout24,
}

impl SiteAdapter {
    /// Registry order.
    pub const ALL: [SiteAdapter; 5] = [
        SiteAdapter::Zillow,
        SiteAdapter::Realtor,
        SiteAdapter::Rightmove,
        SiteAdapter::Idealista,
        SiteAdapter::ImmoScout24,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SiteAdapter::Zillow => "zillow",
            SiteAdapter::Realtor => "realtor",
            SiteAdapter::Rightmove => "rightmove",
            SiteAdapter::Idealista => "idealista",
            SiteAdapter::ImmoScout24 => "immoscout24",
        }
    }

    fn host_pattern(&self) -> &'static Regex {
        match self {
            SiteAdapter::Zillow => &ZILLOW_HOST,
            SiteAdapter::Realtor => &REALTOR_HOST,
            SiteAdapter::Rightmove => &RIGHTMOVE_HOST,
            SiteAdapter::Idealista => &IDEALISTA_HOST,
            SiteAdapter::ImmoScout24 => &IMMOSCOUT24_HOST,
        }
    }

    /// Whether this adapter handles pages served from `hostname`.
    pub fn test(&self, hostname: &str) -> bool {
        self.host_pattern().is_match(hostname)
    }

    /// Whether the adapter maps fields itself instead of delegating.
    pub fn has_custom_parser(&self) -> bool {
        matches!(self, SiteAdapter::Zillow)
    }

    pub async fn parse(
        &self,
        page: &Page,
        probe: &dyn ImageProbe,
        options: &ExtractOptions,
    ) -> Result<Listing> {
        match self {
            SiteAdapter::Zillow => match zillow_property(page)? {
                Some(property) => Ok(map_zillow(&property, page)),
                None => {
                    debug!("No Zillow state on page, delegating to generic extraction");
                    Ok(parse_generic(page, probe, options).await)
                }
            },
            _ => Ok(parse_generic(page, probe, options).await),
        }
    }
}

/// The `property` of the first `gdpClientCache` entry in `__NEXT_DATA__`.
///
/// `Ok(None)` when the page carries no such state, `Err` when the state is
/// present but not readable.
pub fn zillow_property(page: &Page) -> Result<Option<Value>> {
    let Some(script) = page.select_first(r#"script[id="__NEXT_DATA__"]"#) else {
        return Ok(None);
    };
    let text = script.text().collect::<String>();
    if text.trim().is_empty() {
        return Ok(None);
    }
    let data: Value = serde_json::from_str(&text).context("Failed to parse __NEXT_DATA__")?;

    let cache = match data.pointer("/props/pageProps/componentData/gdpClientCache") {
        Some(Value::String(encoded)) => serde_json::from_str(encoded)
            .context("Failed to parse gdpClientCache")?,
        Some(other) => other.clone(),
        None => return Ok(None),
    };
    Ok(cache
        .as_object()
        .and_then(|entries| entries.values().next())
        .and_then(|entry| entry.get("property"))
        .filter(|property| property.is_object())
        .cloned())
}

fn map_zillow(property: &Value, page: &Page) -> Listing {
    let home_info = property.pointer("/hdpData/homeInfo");
    let field = |key: &str| {
        property
            .get(key)
            .and_then(value_text)
            .or_else(|| home_info.and_then(|info| info.get(key)).and_then(value_text))
    };

    let amount = pick_first([
        property.get("price").and_then(parse_number_value),
        property.get("unformattedPrice").and_then(parse_number_value),
    ]);
    let currency = field("currency").or_else(|| {
        detect_currency(&page.visible_text()).map(str::to_string)
    });

    let street = field("streetAddress");
    let city = field("city");
    let state = field("state");
    let zipcode = field("zipcode");
    let formatted = street.as_ref().map(|street| {
        let locality = [state.clone(), zipcode.clone()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        [Some(street.clone()), city.clone(), Some(locality)]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    });
    let coordinates = match (
        property.get("latitude").and_then(Value::as_f64),
        property.get("longitude").and_then(Value::as_f64),
    ) {
        (Some(lat), Some(lng)) => GeoCoordinates::new(lat, lng),
        _ => None,
    };

    let area = property
        .get("livingArea")
        .and_then(parse_number_value)
        .map(|value| {
            let unit = field("livingAreaUnits").unwrap_or_else(|| "sqft".to_string());
            to_square_meters(Some(value), Some(unit.as_str()))
        });

    let rooms = RoomInfo {
        rooms: None,
        bedrooms: property.get("bedrooms").and_then(parse_number_value),
        bathrooms: property.get("bathrooms").and_then(parse_number_value),
    };

    let images: Vec<String> = property
        .get("images")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(url) => Some(url.as_str()),
                    other => other.get("url").and_then(Value::as_str),
                })
                .filter_map(|url| page.absolutize(url))
                .collect()
        })
        .unwrap_or_default();

    Listing {
        title: street.clone().or_else(|| page.title()),
        description: field("description"),
        price: amount.map(|amount| Money::new(Some(amount), currency)),
        area,
        year_built: property
            .get("yearBuilt")
            .and_then(Value::as_i64)
            .and_then(|year| i32::try_from(year).ok()),
        property_type: field("homeType"),
        transaction_type: field("homeStatus").and_then(|status| home_status(&status)),
        rooms: (!rooms.is_empty()).then_some(rooms),
        address: Some(Address {
            city,
            region: state,
            postal_code: zipcode,
            street,
            formatted,
            latitude: coordinates.map(|c| c.latitude),
            longitude: coordinates.map(|c| c.longitude),
            ..Address::default()
        }),
        images: (!images.is_empty()).then_some(images),
        raw: Some(property.clone()),
        ..Listing::default()
    }
}

fn home_status(status: &str) -> Option<TransactionType> {
    match status.to_ascii_uppercase().as_str() {
        "FOR_SALE" | "PENDING" | "SOLD" | "RECENTLY_SOLD" => Some(TransactionType::Sale),
        "FOR_RENT" => Some(TransactionType::Rent),
        "FORECLOSURE" | "AUCTION" => Some(TransactionType::Auction),
        _ => None,
    }
}
