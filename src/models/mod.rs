use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod merge;

pub use merge::FillGaps;

/// How a listing was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionMethod {
    #[serde(alias = "jsonld")]
    StructuredMetadata,
    #[serde(alias = "opengraph")]
    SocialPreview,
    Meta,
    #[serde(alias = "dom")]
    DomHeuristic,
    Hybrid,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Sale,
    Rent,
    Lease,
    Auction,
}

/// Provenance stamped on every finished listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub domain: String,
    pub extracted_at: DateTime<Utc>,
    pub method: ExtractionMethod,
}

/// An amount and a currency, each independently unknown
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Money {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl Money {
    pub fn new(amount: Option<f64>, currency: Option<String>) -> Self {
        Self { amount, currency }
    }
}

/// A surface. `unit` is "m2" whenever the unit was recognised.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Area {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
}

/// Location information for a listing
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub street: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Address {
    /// Address carrying only a coordinate pair.
    pub fn from_geo(geo: GeoCoordinates) -> Self {
        Self {
            latitude: Some(geo.latitude),
            longitude: Some(geo.longitude),
            ..Self::default()
        }
    }

    /// Human readable line: `formatted` wins, otherwise the known parts joined.
    pub fn display_line(&self) -> Option<String> {
        if let Some(formatted) = &self.formatted {
            return Some(formatted.clone());
        }

        let street = match (&self.street, &self.house_number) {
            (Some(street), Some(number)) => Some(format!("{} {}", street, number)),
            (Some(street), None) => Some(street.clone()),
            (None, Some(number)) => Some(number.clone()),
            (None, None) => None,
        };

        let parts: Vec<String> = [
            street,
            self.district.clone(),
            self.city.clone(),
            self.postal_code.clone(),
            self.region.clone(),
            self.country.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Room counts as published. No cross-field consistency is enforced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RoomInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bedrooms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bathrooms: Option<f64>,
}

impl RoomInfo {
    pub fn is_empty(&self) -> bool {
        self.rooms.is_none() && self.bedrooms.is_none() && self.bathrooms.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Media {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Seller {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// A latitude/longitude pair that passed validation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoCoordinates {
    /// Accepts finite, in-range pairs. `(0, 0)` is a placeholder and rejected.
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude)
            && !(latitude == 0.0 && longitude == 0.0);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

/// Core listing data model. Every field is independently optional:
/// `None` means unknown, never empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Listing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_per_area: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Area>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lot_area: Option<Area>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub floor: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_floors: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_built: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_type: Option<TransactionType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub furnished: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rooms: Option<RoomInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amenities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<Media>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seller: Option<Seller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl Listing {
    /// Overwrites provenance and the canonical URL.
    pub fn stamped(mut self, url: &str, domain: &str, method: ExtractionMethod) -> Self {
        self.url = Some(url.to_string());
        self.source = Some(Source {
            domain: domain.to_string(),
            extracted_at: Utc::now(),
            method,
        });
        self
    }

    /// Whether the images list is missing or empty.
    pub fn lacks_images(&self) -> bool {
        self.images.as_ref().map_or(true, |images| images.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_geo_rejects_placeholder_and_out_of_range() {
        assert!(GeoCoordinates::new(0.0, 0.0).is_none());
        assert!(GeoCoordinates::new(91.0, 10.0).is_none());
        assert!(GeoCoordinates::new(10.0, -180.5).is_none());
        assert!(GeoCoordinates::new(f64::NAN, 10.0).is_none());
        assert!(GeoCoordinates::new(43.6, 39.7).is_some());
        assert!(GeoCoordinates::new(0.0, 12.5).is_some());
    }

    #[test]
    fn test_display_line_prefers_formatted() {
        let address = Address {
            street: Some("Main St".to_string()),
            formatted: Some("12 Main St, Springfield".to_string()),
            ..Address::default()
        };
        assert_eq!(address.display_line().as_deref(), Some("12 Main St, Springfield"));
    }

    #[test]
    fn test_display_line_joins_parts() {
        let address = Address {
            street: Some("Götgatan".to_string()),
            house_number: Some("120".to_string()),
            city: Some("Stockholm".to_string()),
            country: Some("SE".to_string()),
            ..Address::default()
        };
        assert_eq!(
            address.display_line().as_deref(),
            Some("Götgatan 120, Stockholm, SE")
        );
        assert_eq!(Address::default().display_line(), None);
    }

    #[test]
    fn test_listing_serializes_camel_case_and_skips_unknowns() {
        let listing = Listing {
            price_per_area: Some(Money::new(Some(3125.0), Some("USD".to_string()))),
            transaction_type: Some(TransactionType::Rent),
            ..Listing::default()
        };
        let value = serde_json::to_value(&listing).unwrap();
        assert_eq!(
            value,
            json!({
                "pricePerArea": {"amount": 3125.0, "currency": "USD"},
                "transactionType": "rent"
            })
        );
    }

    #[test]
    fn test_method_accepts_short_tags() {
        let method: ExtractionMethod = serde_json::from_value(json!("jsonld")).unwrap();
        assert_eq!(method, ExtractionMethod::StructuredMetadata);
        let method: ExtractionMethod = serde_json::from_value(json!("dom-heuristic")).unwrap();
        assert_eq!(method, ExtractionMethod::DomHeuristic);
    }
}
