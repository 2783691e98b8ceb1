use httpmock::prelude::*;
use listing_scout::{
    Address, Area, ExtractionMethod, Extractor, HttpImageProbe, Listing, Money, NoProbe, Page,
    Registry, RoomInfo, TransactionType,
};
use pretty_assertions::assert_eq;
use std::io::Cursor;

const APARTMENT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <title>Bright 3-room apartment | Homes</title>
  <meta property="og:title" content="Bright 3-room apartment">
  <meta property="og:image" content="https://cdn.homes.example.com/og-cover.jpg">
  <script type="application/ld+json">
  {"@context": "https://schema.org", "@graph": [
    {"@type": "BreadcrumbList", "itemListElement": []},
    {"@type": "Apartment",
     "name": "Bright 3-room apartment for sale",
     "description": "Sunny apartment close to the park.",
     "numberOfRooms": 3,
     "floorSize": {"@type": "QuantitativeValue", "value": "72,5", "unitCode": "MTK"},
     "address": {"@type": "PostalAddress", "streetAddress": "Storgatan 5",
                 "addressLocality": "Stockholm", "postalCode": "114 51", "addressCountry": "SE"},
     "geo": {"@type": "GeoCoordinates", "latitude": 59.3366, "longitude": 18.0786},
     "offers": {"@type": "Offer", "price": 4950000, "priceCurrency": "SEK"},
     "image": ["/photos/structured.jpg"]}
  ]}
  </script>
</head>
<body>
  <header><img src="/static/logo.png" width="200" height="80"></header>
  <div class="listing-gallery">
    <img src="/photos/1.jpg" width="1200" height="800" alt="Living room">
    <img src="/photos/2.jpg" width="800" height="600" alt="Kitchen">
    <img src="/photos/3.jpg" width="640" height="480">
  </div>
  <img src="/photos/tiny.jpg" width="120" height="90">
  <p>Price: 4 950 000 SEK</p>
</body>
</html>"#;

const PAGE_URL: &str = "https://homes.example.com/listing/abc";

#[tokio::test]
async fn structured_listing_end_to_end() {
    let listing = Registry::new(NoProbe)
        .extract(APARTMENT_PAGE, PAGE_URL)
        .await
        .unwrap();

    assert_eq!(listing.url.as_deref(), Some(PAGE_URL));
    assert_eq!(
        listing.title.as_deref(),
        Some("Bright 3-room apartment for sale")
    );
    assert_eq!(
        listing.price,
        Some(Money::new(Some(4950000.0), Some("SEK".to_string())))
    );
    assert_eq!(
        listing.area,
        Some(Area {
            value: Some(72.5),
            unit: Some("m2".to_string())
        })
    );
    assert_eq!(
        listing.price_per_area,
        Some(Money::new(Some(68276.0), Some("SEK".to_string())))
    );
    assert_eq!(
        listing.rooms,
        Some(RoomInfo {
            rooms: Some(3.0),
            bedrooms: None,
            bathrooms: None
        })
    );
    assert_eq!(
        listing.address,
        Some(Address {
            country: Some("SE".to_string()),
            city: Some("Stockholm".to_string()),
            street: Some("Storgatan 5".to_string()),
            postal_code: Some("114 51".to_string()),
            formatted: Some("Storgatan 5".to_string()),
            latitude: Some(59.3366),
            longitude: Some(18.0786),
            ..Address::default()
        })
    );
    assert_eq!(listing.property_type.as_deref(), Some("Apartment"));
    assert_eq!(listing.transaction_type, Some(TransactionType::Sale));
    assert_eq!(
        listing.images,
        Some(vec![
            "https://homes.example.com/photos/2.jpg".to_string(),
            "https://homes.example.com/photos/1.jpg".to_string(),
            "https://homes.example.com/photos/3.jpg".to_string(),
            "https://homes.example.com/photos/structured.jpg".to_string(),
            "https://cdn.homes.example.com/og-cover.jpg".to_string(),
        ])
    );

    let source = listing.source.unwrap();
    assert_eq!(source.domain, "homes.example.com");
    assert_eq!(source.method, ExtractionMethod::StructuredMetadata);
}

#[tokio::test]
async fn serialized_listing_keeps_absence_absent() {
    let listing = Registry::new(NoProbe)
        .extract(APARTMENT_PAGE, PAGE_URL)
        .await
        .unwrap();
    let json = serde_json::to_value(&listing).unwrap();

    assert_eq!(json["pricePerArea"]["currency"], "SEK");
    assert_eq!(json["transactionType"], "sale");
    assert_eq!(json["source"]["method"], "structured-metadata");
    assert!(json.get("lotArea").is_none());
    assert!(json.get("seller").is_none());
    assert!(json["rooms"].get("bedrooms").is_none());

    let back: Listing = serde_json::from_value(json).unwrap();
    assert_eq!(back, listing);
}

#[tokio::test]
async fn extractors_are_interchangeable_behind_the_trait() {
    let extractors: Vec<Box<dyn Extractor>> = vec![Box::new(Registry::new(NoProbe))];
    for extractor in &extractors {
        let listing = extractor.extract(APARTMENT_PAGE, PAGE_URL).await.unwrap();
        assert!(listing.price.is_some(), "{}", extractor.extractor_name());
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height))
        .write_to(&mut Cursor::new(&mut buf), image::ImageOutputFormat::Png)
        .unwrap();
    buf
}

#[tokio::test]
async fn unsized_gallery_images_are_probed_over_http() {
    let server = MockServer::start();
    for (path, (w, h)) in [
        ("/img/a.png", (1000, 700)),
        ("/img/b.png", (800, 600)),
        ("/img/small.png", (100, 100)),
    ] {
        server.mock(|when, then| {
            when.method(GET).path(path);
            then.status(200)
                .header("content-type", "image/png")
                .body(png(w, h));
        });
    }
    server.mock(|when, then| {
        when.method(GET).path("/img/missing.png");
        then.status(404);
    });

    let html = r#"<html><body><div id="photos">
        <img src="/img/a.png"><img src="/img/b.png">
        <img src="/img/small.png"><img src="/img/missing.png">
        </div></body></html>"#;
    let page = Page::parse(html, &server.url("/listing/1")).unwrap();
    let registry = Registry::new(HttpImageProbe::new("listing-scout-test").unwrap());
    let listing = registry.extract_page(&page).await;

    assert_eq!(
        listing.images,
        Some(vec![server.url("/img/b.png"), server.url("/img/a.png")])
    );
}
