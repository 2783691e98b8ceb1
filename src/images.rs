//! Property photo detection.
//!
//! Candidates are gathered from gallery containers and from every `<img>`
//! on the page, sized (from markup, else by probing the file), filtered and
//! scored. Images referenced from JSON-LD join with a fixed medium score.
//! Only owned data crosses the probing await point.

use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::document::{attr_contains, Page};
use crate::probe::ImageProbe;
use crate::scrapers::ExtractOptions;

/// Upper bound on image downloads in flight for one page.
pub const PROBE_CONCURRENCY: usize = 8;

const GALLERY_KEYWORDS: &[&str] = &["gallery", "slider", "carousel", "photos", "images"];
const GALLERY_ATTRS: &[&str] = &["class", "id", "data-testid"];
const LAZY_ATTRS: &[&str] = &["data-src", "data-original", "data-lazy-src"];
const EXCLUDED_URL_PARTS: &[&str] = &[
    "logo",
    "icon",
    "avatar",
    "placeholder",
    "pixel",
    "tracking",
    "banner",
];
const SUSPICIOUS_PARTS: &[&str] = &[
    "logo", "icon", "banner", "pixel", "tracking", "avatar", "profile",
];
const GENERIC_URL_PARTS: &[&str] = &["logo", "icon", "avatar", "user", "profile", "banner"];

// "ad" only as a token: `ad.jpg`, `/ads/`, `ad_slot`, never `upload` or `road`.
static AD_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|[^a-z])ads?(?:[^a-z]|$)").unwrap());
static CLASS_HINTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)photo|image|picture|gallery|property|listing").unwrap());
static ALT_HINTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)photo|image|property|room|kitchen|bedroom|bathroom").unwrap());

/// A sized, scored image prior to final selection.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageCandidate {
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub score: f64,
}

/// What the markup tells us about one `<img>`.
#[derive(Debug, Clone)]
struct RawImage {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
    class: String,
    alt: String,
    in_gallery: bool,
}

/// Everything gathered synchronously from the document.
#[derive(Debug, Clone, Default)]
pub struct CollectedImages {
    raw: Vec<RawImage>,
    structured: Vec<String>,
}

impl CollectedImages {
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty() && self.structured.is_empty()
    }
}

/// Best property photos of the page, highest score first, deduplicated.
pub async fn extract_property_images(
    page: &Page,
    json_ld: &[Value],
    probe: &dyn ImageProbe,
    options: &ExtractOptions,
) -> Vec<String> {
    let collected = collect(page, json_ld, options);
    rank(collected, probe, options).await
}

/// Reads gallery, standalone and JSON-LD images out of the document.
pub fn collect(page: &Page, json_ld: &[Value], options: &ExtractOptions) -> CollectedImages {
    let mut raw = Vec::new();

    for gallery in find_galleries(page, options) {
        for img in gallery.descendants().filter_map(ElementRef::wrap) {
            if img.value().name() == "img" {
                raw.extend(read_image(page, &img, true));
            }
        }
    }
    for img in page.select("img") {
        raw.extend(read_image(page, &img, false));
    }

    let mut structured = Vec::new();
    for node in json_ld {
        collect_structured_images(node, &mut structured);
    }
    let structured = structured
        .iter()
        .filter_map(|url| page.absolutize(url))
        .collect();

    CollectedImages { raw, structured }
}

/// Sizes, scores and orders the collected images.
pub async fn rank(
    collected: CollectedImages,
    probe: &dyn ImageProbe,
    options: &ExtractOptions,
) -> Vec<String> {
    let to_probe: HashSet<&str> = collected
        .raw
        .iter()
        .filter(|img| img.width.is_none() || img.height.is_none())
        .map(|img| img.url.as_str())
        .collect();
    let measured = measure_all(to_probe, probe, options).await;

    let mut candidates: Vec<ImageCandidate> = collected
        .raw
        .iter()
        .filter_map(|img| {
            let (width, height) = match (img.width, img.height) {
                (Some(w), Some(h)) => (w, h),
                _ => measured.get(img.url.as_str()).copied().flatten()?,
            };
            let score = score_image(
                width,
                height,
                &img.class,
                &img.alt,
                &img.url,
                img.in_gallery,
                options,
            )?;
            Some(ImageCandidate {
                url: img.url.clone(),
                width,
                height,
                score,
            })
        })
        .collect();

    for url in collected.structured {
        if !candidates.iter().any(|c| c.url == url) {
            candidates.push(ImageCandidate {
                url,
                width: 0,
                height: 0,
                score: options.structured_image_score,
            });
        }
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut seen = HashSet::new();
    let urls: Vec<String> = candidates
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .take(options.max_images)
        .map(|c| c.url)
        .collect();
    debug!(count = urls.len(), "Ranked property images");
    urls
}

async fn measure_all<'a>(
    urls: HashSet<&'a str>,
    probe: &dyn ImageProbe,
    options: &ExtractOptions,
) -> HashMap<&'a str, Option<(u32, u32)>> {
    let jobs = stream::iter(urls).map(|url| async move {
        match tokio::time::timeout(options.image_timeout, probe.measure(url)).await {
            Ok(Ok(dims)) => (url, Some(dims)),
            Ok(Err(e)) => {
                debug!("Could not measure {}: {:#}", url, e);
                (url, None)
            }
            Err(_) => {
                warn!("Timed out measuring {}", url);
                (url, None)
            }
        }
    });
    jobs.buffer_unordered(PROBE_CONCURRENCY).collect().await
}

/// Relevance score of a sized image, or `None` when it must be dropped.
///
/// Size and suspicious keywords reject outright, whatever the other signals say.
pub fn score_image(
    width: u32,
    height: u32,
    class: &str,
    alt: &str,
    url: &str,
    in_gallery: bool,
    options: &ExtractOptions,
) -> Option<f64> {
    if width < options.min_image_size || height < options.min_image_size {
        return None;
    }
    let haystack = format!("{} {} {}", class, alt, url).to_lowercase();
    if SUSPICIOUS_PARTS.iter().any(|p| haystack.contains(p)) || AD_TOKEN.is_match(&haystack) {
        return None;
    }

    let ideal = options.ideal_image_size as f64;
    let (w, h) = (width as f64, height as f64);
    let mut score = (100.0 - ((w - ideal).abs() + (h - ideal).abs()) / 10.0).max(0.0);

    let ratio = w / h;
    if (1.2..=2.0).contains(&ratio) {
        score += 20.0;
    }
    if CLASS_HINTS.is_match(class) {
        score += 15.0;
    }
    if ALT_HINTS.is_match(alt) {
        score += 10.0;
    }
    let lower_url = url.to_lowercase();
    if !GENERIC_URL_PARTS.iter().any(|p| lower_url.contains(p)) && !AD_TOKEN.is_match(&lower_url)
    {
        score += 10.0;
    }
    if in_gallery {
        score += options.gallery_bonus;
    }
    Some(score)
}

/// Whether a URL names something that is never a property photo.
pub fn is_excluded_url(url: &str) -> bool {
    let lower = url.to_lowercase();
    let path = lower.split(['?', '#']).next().unwrap_or_default();
    EXCLUDED_URL_PARTS.iter().any(|p| lower.contains(p))
        || AD_TOKEN.is_match(&lower)
        || path.ends_with(".svg")
        || path.ends_with(".gif")
}

fn find_galleries<'a>(page: &'a Page, options: &ExtractOptions) -> Vec<ElementRef<'a>> {
    let galleries: Vec<ElementRef<'a>> = page
        .elements()
        .filter(|el| {
            GALLERY_ATTRS
                .iter()
                .any(|attr| attr_contains(el, attr, GALLERY_KEYWORDS))
        })
        .filter(|el| count_images(el) >= options.gallery_min_images)
        .collect();
    if !galleries.is_empty() {
        return galleries;
    }

    page.elements()
        .filter(|el| matches!(el.value().name(), "div" | "section" | "article"))
        .filter(|el| count_near_images(el) >= options.container_min_images)
        .collect()
}

fn count_images(container: &ElementRef<'_>) -> usize {
    container
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "img")
        .count()
}

/// Images that are children or grandchildren of `container`.
fn count_near_images(container: &ElementRef<'_>) -> usize {
    container
        .children()
        .filter_map(ElementRef::wrap)
        .map(|child| {
            let direct = usize::from(child.value().name() == "img");
            let nested = child
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|grandchild| grandchild.value().name() == "img")
                .count();
            direct + nested
        })
        .sum()
}

fn read_image(page: &Page, img: &ElementRef<'_>, in_gallery: bool) -> Option<RawImage> {
    let url = image_url(page, img)?;
    if is_excluded_url(&url) {
        return None;
    }
    let element = img.value();
    Some(RawImage {
        width: element.attr("width").and_then(pixels),
        height: element.attr("height").and_then(pixels),
        class: element.attr("class").unwrap_or_default().to_string(),
        alt: element.attr("alt").unwrap_or_default().to_string(),
        url,
        in_gallery,
    })
}

/// Lazy-load attribute, else the largest `srcset` entry, else `src`.
pub fn image_url(page: &Page, img: &ElementRef<'_>) -> Option<String> {
    let element = img.value();
    let raw = LAZY_ATTRS
        .iter()
        .find_map(|attr| element.attr(attr).filter(|v| !v.trim().is_empty()))
        .map(str::to_string)
        .or_else(|| element.attr("srcset").and_then(largest_srcset_entry))
        .or_else(|| element.attr("src").map(str::to_string))?;

    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with("data:") {
        return None;
    }
    page.absolutize(raw)
}

/// The entry with the biggest `w`/`x` descriptor; the last one when none is given.
pub fn largest_srcset_entry(srcset: &str) -> Option<String> {
    srcset
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split_whitespace();
            let url = parts.next()?;
            let size = parts
                .next()
                .and_then(|d| d.trim_end_matches(['w', 'x']).parse::<f64>().ok())
                .unwrap_or(0.0);
            Some((url, size))
        })
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(url, _)| url.to_string())
}

/// Pixel count from a `width`/`height` attribute: "800", "800px".
fn pixels(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok().filter(|n| *n > 0)
}

/// URLs under every `image` field of a JSON-LD value, recursively.
pub fn collect_structured_images(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            match map.get("image") {
                Some(Value::String(url)) => out.push(url.clone()),
                Some(Value::Array(items)) => {
                    for item in items {
                        match item {
                            Value::String(url) => out.push(url.clone()),
                            other => {
                                if let Some(url) = other.get("url").and_then(Value::as_str) {
                                    out.push(url.to_string());
                                }
                            }
                        }
                    }
                }
                Some(other) => {
                    if let Some(url) = other.get("url").and_then(Value::as_str) {
                        out.push(url.to_string());
                    }
                }
                None => {}
            }
            for child in map.values() {
                if child.is_object() || child.is_array() {
                    collect_structured_images(child, out);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_structured_images(item, out);
            }
        }
        _ => {}
    }
}
