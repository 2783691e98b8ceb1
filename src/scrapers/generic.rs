//! Adapter-free extraction: structured metadata first, then social-preview
//! tags, then DOM selectors, then the whole-page heuristics.

use scraper::ElementRef;
use serde_json::Value;
use tracing::debug;

use crate::document::{attr_contains, element_text, Page};
use crate::geo;
use crate::images;
use crate::metadata::{primary_type, value_text, StructuredMetadata};
use crate::models::{Address, ExtractionMethod, Listing, Money, RoomInfo};
use crate::normalize::{
    detect_currency, normalize_spaces, parse_number_in_text, parse_number_value, pick_first,
    to_square_meters,
};
use crate::probe::ImageProbe;
use crate::scrapers::heuristics::{enrich, infer_transaction};
use crate::scrapers::ExtractOptions;

const PREVIEW_IMAGE_KEYS: &[&str] = &["og:image", "og:image:url", "og:image:secure_url"];

/// Best-effort listing for a page no site adapter claims.
pub async fn parse_generic(
    page: &Page,
    probe: &dyn ImageProbe,
    options: &ExtractOptions,
) -> Listing {
    let meta = StructuredMetadata::extract(page);
    let mut listing = read_fields(page, &meta);

    let scored = images::extract_property_images(page, &meta.json_ld, probe, options).await;
    let images = with_preview_images(scored, page, &meta);
    if !images.is_empty() {
        listing.images = Some(images);
    }

    let method = method_for(page, &meta);
    debug!(method = ?method, "Generic extraction finished");
    enrich(listing, page, options).stamped(page.url().as_str(), page.hostname(), method)
}

/// Every field except images, in per-field priority order.
pub fn read_fields(page: &Page, meta: &StructuredMetadata) -> Listing {
    let og = |key: &str| meta.open_graph.get(key).and_then(normalize_spaces);
    let twitter = |key: &str| meta.twitter.get(key).and_then(normalize_spaces);

    let title = pick_first([
        meta.text(&["name"]),
        og("og:title"),
        page.meta("title"),
        page.first_heading(),
    ]);
    let description = pick_first([
        meta.text(&["description"]),
        og("og:description"),
        page.meta("description"),
        twitter("twitter:description"),
    ]);

    let offer = meta.field("offers").and_then(first_object);
    let offer_text = |key: &str| offer.and_then(|o| o.get(key)).and_then(value_text);

    let structured_currency = pick_first([
        meta.text(&["priceCurrency"]),
        meta.text(&["priceSpecification", "priceCurrency"]),
        offer_text("priceCurrency"),
    ])
    .map(|code| code.to_uppercase());
    let structured_price = pick_first([
        meta.text(&["price"]),
        meta.text(&["priceSpecification", "price"]),
        offer_text("price"),
    ]);
    let preview_currency = pick_first([
        og("og:price:currency"),
        page.meta("product:price:currency"),
    ]);
    let preview_amount = pick_first([og("og:price:amount"), page.meta("product:price:amount")]);

    let currency = pick_first([
        detect_currency(&format!(
            "{} {}",
            structured_currency.as_deref().unwrap_or_default(),
            structured_price.as_deref().unwrap_or_default()
        )),
        preview_currency.as_deref().and_then(detect_currency),
        preview_amount.as_deref().and_then(detect_currency),
        description.as_deref().and_then(detect_currency),
        title.as_deref().and_then(detect_currency),
    ])
    .map(str::to_string);

    let amount = pick_first([
        meta.field("price").and_then(parse_number_value),
        meta.path(&["priceSpecification", "price"])
            .and_then(parse_number_value),
        offer.and_then(|o| o.get("price")).and_then(parse_number_value),
        preview_amount.as_deref().and_then(parse_number_in_text),
        dom_price(page),
    ]);

    let area_value = pick_first([
        meta.path(&["floorSize", "value"]).and_then(parse_number_value),
        meta.field("floorSize")
            .and_then(Value::as_str)
            .and_then(parse_number_in_text),
        meta.field("area").and_then(quantity),
        dom_area(page),
    ]);
    let area_unit = pick_first([
        meta.text(&["floorSize", "unitText"]),
        meta.text(&["floorSize", "unitCode"]),
    ]);
    let area = area_value.map(|value| to_square_meters(Some(value), area_unit.as_deref()));

    let price_per_area = match (amount, area.as_ref().and_then(|a| a.value)) {
        (Some(price), Some(size)) if size > 0.0 => Some(Money::new(
            Some((price / size).round()),
            structured_currency.clone().or_else(|| currency.clone()),
        )),
        _ => None,
    };
    let price = amount.map(|amount| {
        Money::new(Some(amount), structured_currency.clone().or(currency))
    });

    let rooms = RoomInfo {
        rooms: pick_first([
            meta.field("numberOfRooms").and_then(quantity),
            dom_count(page, "numberOfRooms", &["rooms"]),
        ]),
        bedrooms: pick_first([
            meta.field("numberOfBedrooms").and_then(quantity),
            dom_count(page, "numberOfBedrooms", &["bedroom"]),
        ]),
        bathrooms: pick_first([
            meta.field("numberOfBathroomsTotal").and_then(quantity),
            meta.field("numberOfFullBathrooms").and_then(quantity),
            dom_count(page, "numberOfBathroomsTotal", &["bathroom"]),
        ]),
    };

    let property_type = pick_first([
        meta.candidate.as_ref().and_then(primary_type),
        meta.path(&["itemOffered"]).and_then(primary_type),
        og("og:type"),
    ]);

    let transaction_type = [&meta.text(&["name"]), &description, &title]
        .into_iter()
        .flatten()
        .find_map(|text| infer_transaction(text));

    Listing {
        title,
        description,
        price,
        price_per_area,
        area,
        rooms: (!rooms.is_empty()).then_some(rooms),
        address: read_address(page, meta),
        property_type,
        transaction_type,
        raw: meta
            .candidate
            .clone()
            .or_else(|| meta.json_ld.first().cloned()),
        ..Listing::default()
    }
}

/// `offers` nested in a typed node: an object or the first object of a list.
fn first_object(value: &Value) -> Option<&Value> {
    match value {
        Value::Array(items) => items.iter().find(|item| item.is_object()),
        Value::Object(_) => Some(value),
        _ => None,
    }
}

/// Scalar, string or `QuantitativeValue`.
fn quantity(value: &Value) -> Option<f64> {
    match value {
        Value::Object(map) => map.get("value").and_then(quantity),
        Value::String(s) => parse_number_in_text(s),
        other => parse_number_value(other),
    }
}

fn dom_price(page: &Page) -> Option<f64> {
    dom_number(page, |el| {
        el.value().attr("itemprop") == Some("price") || attr_contains(el, "data-testid", &["price"])
    })
}

fn dom_area(page: &Page) -> Option<f64> {
    dom_number(page, |el| {
        el.value().attr("itemprop") == Some("floorSize")
            || attr_contains(el, "data-testid", &["area"])
            || attr_contains(el, "class", &["area"])
    })
}

fn dom_count(page: &Page, itemprop: &str, testids: &[&str]) -> Option<f64> {
    dom_number(page, |el| {
        el.value().attr("itemprop") == Some(itemprop) || attr_contains(el, "data-testid", testids)
    })
}

/// Number in the `content` attribute or text of the first matching element.
fn dom_number<F>(page: &Page, predicate: F) -> Option<f64>
where
    F: Fn(&ElementRef<'_>) -> bool,
{
    let el = page.find(predicate)?;
    el.value()
        .attr("content")
        .and_then(parse_number_in_text)
        .or_else(|| element_text(&el).as_deref().and_then(parse_number_in_text))
}

fn read_address(page: &Page, meta: &StructuredMetadata) -> Option<Address> {
    let geo = geo::resolve(meta.candidate.as_ref(), page);
    let node = meta
        .field("address")
        .or_else(|| meta.path(&["object", "address"]));

    let mut address = match node {
        Some(Value::String(s)) => Address {
            formatted: normalize_spaces(s),
            ..Address::default()
        },
        Some(node) if node.is_object() => {
            let part = |key: &str| node.get(key).and_then(value_text);
            let street = part("streetAddress");
            Address {
                country: node.get("addressCountry").and_then(|country| {
                    value_text(country).or_else(|| country.get("name").and_then(value_text))
                }),
                region: part("addressRegion"),
                city: part("addressLocality"),
                postal_code: part("postalCode"),
                formatted: street.clone().or_else(|| {
                    page.select_first(r#"[itemprop="address"]"#)
                        .and_then(|el| element_text(&el))
                }),
                street,
                ..Address::default()
            }
        }
        _ => return geo.map(Address::from_geo),
    };
    if let Some(geo) = geo {
        address.latitude = Some(geo.latitude);
        address.longitude = Some(geo.longitude);
    }
    Some(address)
}

/// Scored images, then preview images that are not already present.
fn with_preview_images(scored: Vec<String>, page: &Page, meta: &StructuredMetadata) -> Vec<String> {
    let mut images = scored;
    let preview = meta
        .open_graph
        .iter()
        .filter(|(key, _)| PREVIEW_IMAGE_KEYS.contains(key))
        .filter_map(|(_, url)| page.absolutize(url));
    for url in preview {
        if !images.contains(&url) {
            images.push(url);
        }
    }
    images
}

fn method_for(page: &Page, meta: &StructuredMetadata) -> ExtractionMethod {
    if meta.candidate.is_some() || !meta.json_ld.is_empty() {
        ExtractionMethod::StructuredMetadata
    } else if !meta.open_graph.is_empty() || !meta.twitter.is_empty() {
        ExtractionMethod::SocialPreview
    } else if page.meta("description").is_some() || page.meta("title").is_some() {
        ExtractionMethod::Meta
    } else {
        ExtractionMethod::DomHeuristic
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Area, TransactionType};
    use crate::probe::NoProbe;
    use pretty_assertions::assert_eq;

    fn page(head: &str, body: &str) -> Page {
        let html = format!(
            "<html><head>{}</head><body>{}</body></html>",
            head, body
        );
        Page::parse(&html, "https://homes.example.com/listing/7").unwrap()
    }

    fn json_ld(value: &str) -> String {
        format!(r#"<script type="application/ld+json">{}</script>"#, value)
    }

    #[tokio::test]
    async fn test_offer_price_area_and_price_per_area() {
        let page = page(
            &json_ld(
                r#"{"@type":"Offer","price":250000,"priceCurrency":"USD",
                    "floorSize":{"value":80,"unitText":"m2"}}"#,
            ),
            "<p>Nice flat</p>",
        );
        let listing = parse_generic(&page, &NoProbe, &ExtractOptions::default()).await;

        assert_eq!(
            listing.price,
            Some(Money::new(Some(250000.0), Some("USD".to_string())))
        );
        assert_eq!(
            listing.area,
            Some(Area {
                value: Some(80.0),
                unit: Some("m2".to_string())
            })
        );
        assert_eq!(
            listing.price_per_area,
            Some(Money::new(Some(3125.0), Some("USD".to_string())))
        );
        assert_eq!(listing.property_type.as_deref(), Some("Offer"));
        assert_eq!(
            listing.source.unwrap().method,
            ExtractionMethod::StructuredMetadata
        );
        assert_eq!(
            listing.url.as_deref(),
            Some("https://homes.example.com/listing/7")
        );
    }

    #[tokio::test]
    async fn test_square_feet_are_converted() {
        let page = page(
            &json_ld(
                r#"{"@type":"SingleFamilyResidence","name":"Bungalow",
                    "floorSize":{"value":1000,"unitCode":"FTK"},"numberOfRooms":4}"#,
            ),
            "",
        );
        let listing = read_fields(&page, &StructuredMetadata::extract(&page));
        let area = listing.area.unwrap();
        assert!((area.value.unwrap() - 92.903).abs() < 0.001);
        assert_eq!(area.unit.as_deref(), Some("m2"));
        assert_eq!(listing.rooms.unwrap().rooms, Some(4.0));
        assert_eq!(listing.price_per_area, None);
    }

    #[tokio::test]
    async fn test_preview_tags_fill_missing_structured_fields() {
        let page = page(
            r#"<meta property="og:title" content="Sunny loft for rent">
               <meta property="og:description" content="Top floor, 2 bedrooms">
               <meta property="og:price:amount" content="1.450">
               <meta property="og:price:currency" content="EUR">
               <meta property="og:image" content="/media/cover.jpg">
               <meta property="og:type" content="apartment">"#,
            "<h1>Ignored heading</h1>",
        );
        let listing = parse_generic(&page, &NoProbe, &ExtractOptions::default()).await;

        assert_eq!(listing.title.as_deref(), Some("Sunny loft for rent"));
        assert_eq!(listing.description.as_deref(), Some("Top floor, 2 bedrooms"));
        assert_eq!(
            listing.price,
            Some(Money::new(Some(1450.0), Some("EUR".to_string())))
        );
        assert_eq!(listing.property_type.as_deref(), Some("apartment"));
        assert_eq!(listing.transaction_type, Some(TransactionType::Rent));
        assert_eq!(
            listing.images,
            Some(vec!["https://homes.example.com/media/cover.jpg".to_string()])
        );
        assert_eq!(
            listing.source.unwrap().method,
            ExtractionMethod::SocialPreview
        );
    }

    #[test]
    fn test_dom_fallbacks() {
        let page = page(
            "",
            r#"<h1>Two-room flat</h1>
               <span itemprop="price" content="199 000">199 000 kr</span>
               <div data-testid="listing-area">56 m2</div>
               <span data-testid="bedrooms-count">2 bedrooms</span>"#,
        );
        let listing = read_fields(&page, &StructuredMetadata::extract(&page));

        assert_eq!(listing.title.as_deref(), Some("Two-room flat"));
        assert_eq!(listing.price.unwrap().amount, Some(199000.0));
        assert_eq!(listing.area.unwrap().value, Some(56.0));
        assert_eq!(listing.rooms.unwrap().bedrooms, Some(2.0));
    }

    #[test]
    fn test_structured_address_with_geo() {
        let page = page(
            &json_ld(
                r#"{"@type":"Apartment","address":{"streetAddress":"Gran Via 12",
                    "addressLocality":"Madrid","addressRegion":"Madrid","postalCode":"28013",
                    "addressCountry":{"@type":"Country","name":"ES"}},
                    "geo":{"latitude":40.42,"longitude":-3.70}}"#,
            ),
            "",
        );
        let address = read_fields(&page, &StructuredMetadata::extract(&page))
            .address
            .unwrap();
        assert_eq!(address.street.as_deref(), Some("Gran Via 12"));
        assert_eq!(address.formatted.as_deref(), Some("Gran Via 12"));
        assert_eq!(address.city.as_deref(), Some("Madrid"));
        assert_eq!(address.country.as_deref(), Some("ES"));
        assert_eq!(address.postal_code.as_deref(), Some("28013"));
        assert_eq!(address.latitude, Some(40.42));
        assert_eq!(address.longitude, Some(-3.70));
    }

    #[test]
    fn test_geo_only_address() {
        let page = page("", r#"<div data-lat="52.3676" data-lng="4.9041"></div>"#);
        let address = read_fields(&page, &StructuredMetadata::extract(&page))
            .address
            .unwrap();
        assert_eq!(address.formatted, None);
        assert_eq!(address.latitude, Some(52.3676));
        assert_eq!(address.longitude, Some(4.9041));
    }

    #[test]
    fn test_nothing_found_stays_absent() {
        let page = page("", "<p>Hello</p>");
        let listing = read_fields(&page, &StructuredMetadata::extract(&page));
        assert_eq!(listing.price, None);
        assert_eq!(listing.area, None);
        assert_eq!(listing.price_per_area, None);
        assert_eq!(listing.address, None);
        assert_eq!(listing.rooms, None);
        assert_eq!(method_for(&page, &StructuredMetadata::extract(&page)), ExtractionMethod::DomHeuristic);
    }

    #[test]
    fn test_transaction_checks_name_before_description() {
        let page = page(
            &json_ld(
                r#"{"@type":"House","name":"House for sale","description":"Garden, garage, no rent control"}"#,
            ),
            "",
        );
        let listing = read_fields(&page, &StructuredMetadata::extract(&page));
        assert_eq!(listing.transaction_type, Some(TransactionType::Sale));
    }
}
