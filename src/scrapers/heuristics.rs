//! Gap-filling pass over whole-page text.
//!
//! `enrich` never overwrites a known field: it computes candidates only for
//! the gaps of the incoming listing and merges them with [`FillGaps`], so
//! running it twice gives the same listing as running it once.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::document::{attr_contains, element_text, Page};
use crate::models::{Address, Area, FillGaps, Listing, Money, TransactionType};
use crate::normalize::{parse_number, to_square_meters};
use crate::scrapers::ExtractOptions;

/// A grouped amount ("250 000", "1.234.567,89") or a plain one ("1500", "56,5").
const NUMBER: &str = r"\d{1,3}(?:[ \u{a0}.,]\d{3})+(?:[.,]\d{1,2})?|\d+(?:[.,]\d{1,2})?";
const CURRENCY_TOKEN: &str =
    r"\$|€|£|₽|₴|¥|₹|₩|руб\.?|грн|\b(?:CHF|USD|EUR|GBP|RUB|UAH|JPY|INR|KRW)\b";

static CURRENCY_COUNTERS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\$", "USD"),
        (r"€", "EUR"),
        (r"£", "GBP"),
        (r"(?i)₽|\bруб\b|\bRUB\b", "RUB"),
        (r"(?i)₴|\bгрн\b|\bUAH\b", "UAH"),
        (r"(?i)¥|円|\bJPY\b", "JPY"),
        (r"(?i)₹|\bINR\b", "INR"),
        (r"(?i)₩|\bKRW\b", "KRW"),
        (r"(?i)\bCHF\b", "CHF"),
    ]
    .into_iter()
    .map(|(pattern, code)| (Regex::new(pattern).unwrap(), code))
    .collect()
});

static CURRENCY_THEN_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({})\s*({})", CURRENCY_TOKEN, NUMBER)).unwrap()
});
static AMOUNT_THEN_CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)({})\s*({})", NUMBER, CURRENCY_TOKEN)).unwrap()
});
static AREA_IN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)({})\s*(m2|m²|sqm|кв\.?\s*м|sq\.?\s*ft|sqft|ft²|ft2)",
        NUMBER
    ))
    .unwrap()
});
static FEET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)ft").unwrap());

// Leading boundary only: stems match inflections ("rented", "продаже") and
// German compounds ("Kaltmiete", "Verkaufspreis"), but "current" is not rent.
static RENT_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:rent|to let|aluguel|alquiler|аренд|сдам|сда[её]тся|nájem)|miet|임대|賃貸|租")
        .unwrap()
});
static SALE_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:sale|venta|venda|kaufen|продаж|продам|prodaj|sprzeda[żz])|verkauf").unwrap()
});

const ADDRESS_CLASS_HINTS: &[&str] = &["location", "address", "addr", "map", "place"];

/// Fills the gaps of `base` from whole-page heuristics.
pub fn enrich(base: Listing, page: &Page, options: &ExtractOptions) -> Listing {
    let candidates = gap_candidates(&base, page, options);
    base.fill_gaps(candidates)
}

fn gap_candidates(base: &Listing, page: &Page, options: &ExtractOptions) -> Listing {
    let text = page.visible_text();
    let mut found = Listing::default();

    let known_currency = base.price.as_ref().and_then(|p| p.currency.as_ref()).is_some();
    let known_amount = base.price.as_ref().and_then(|p| p.amount).is_some();

    let frequent = currency_by_frequency(&text, options.currency_min_occurrences);
    let mut price = Money::default();
    if !known_currency {
        price.currency = frequent.map(str::to_string);
    }
    if !known_amount {
        if let Some(near) = price_near_currency(&text) {
            price.amount = near.amount;
            price.currency = price.currency.or(near.currency);
        }
    }
    if price.amount.is_some() || price.currency.is_some() {
        found.price = Some(price);
    }

    if let (Some(per_area), Some(code)) = (&base.price_per_area, frequent) {
        if per_area.currency.is_none() {
            found.price_per_area = Some(Money::new(None, Some(code.to_string())));
        }
    }

    if base.area.as_ref().and_then(|a| a.value).is_none() {
        found.area = area_from_text(&text);
    }

    if base.address.as_ref().and_then(|a| a.formatted.as_ref()).is_none() {
        found.address = address_by_selectors(page, options.address_min_len).map(|formatted| Address {
            formatted: Some(formatted),
            ..Address::default()
        });
    }

    if base.lacks_images() {
        let images = images_from_dom(page, options.dom_image_limit);
        if !images.is_empty() {
            found.images = Some(images);
        }
    }

    if base.title.is_none() {
        found.title = page.first_heading().or_else(|| page.title());
    }

    if base.transaction_type.is_none() {
        found.transaction_type = infer_transaction(&text);
    }

    debug!(
        price = found.price.is_some(),
        area = found.area.is_some(),
        address = found.address.is_some(),
        images = found.images.is_some(),
        "Heuristic gap candidates"
    );
    found
}

/// The currency mentioned most often, if it appears at least `min` times.
/// Ties go to the earlier entry of the counter table.
pub fn currency_by_frequency(text: &str, min: usize) -> Option<&'static str> {
    let mut winner = None;
    let mut best = 0;
    for (pattern, code) in CURRENCY_COUNTERS.iter() {
        let count = pattern.find_iter(text).count();
        if count > best {
            best = count;
            winner = Some(*code);
        }
    }
    if best >= min && best > 0 {
        winner
    } else {
        None
    }
}

/// First amount written next to a currency sign or code, in either order.
pub fn price_near_currency(text: &str) -> Option<Money> {
    if let Some(caps) = CURRENCY_THEN_AMOUNT.captures(text) {
        return Some(Money::new(
            parse_number(&caps[2]),
            currency_code(&caps[1]).map(str::to_string),
        ));
    }
    AMOUNT_THEN_CURRENCY.captures(text).map(|caps| {
        Money::new(
            parse_number(&caps[1]),
            currency_code(&caps[2]).map(str::to_string),
        )
    })
}

fn currency_code(token: &str) -> Option<&'static str> {
    let token = token.trim().trim_end_matches('.').to_uppercase();
    let code = match token.as_str() {
        "$" | "USD" => "USD",
        "€" | "EUR" => "EUR",
        "£" | "GBP" => "GBP",
        "₽" | "РУБ" | "RUB" => "RUB",
        "₴" | "ГРН" | "UAH" => "UAH",
        "¥" | "JPY" => "JPY",
        "₹" | "INR" => "INR",
        "₩" | "KRW" => "KRW",
        "CHF" => "CHF",
        _ => return None,
    };
    Some(code)
}

/// First number followed by an area unit; square feet are converted.
pub fn area_from_text(text: &str) -> Option<Area> {
    let caps = AREA_IN_TEXT.captures(text)?;
    let value = parse_number(&caps[1])?;
    let unit = if FEET.is_match(&caps[2]) { "sqft" } else { "m2" };
    Some(to_square_meters(Some(value), Some(unit)))
}

/// Longest text among location-looking elements.
pub fn address_by_selectors(page: &Page, min_len: usize) -> Option<String> {
    let texts: Vec<String> = page
        .elements()
        .filter(|el| {
            attr_contains(el, "class", ADDRESS_CLASS_HINTS)
                || attr_contains(el, "data-testid", &["location"])
                || el.value().attr("itemprop") == Some("address")
        })
        .filter_map(|el| element_text(&el))
        .filter(|text| text.chars().count() >= min_len)
        .collect();
    // rev: the first of several equally long texts wins
    texts
        .into_iter()
        .rev()
        .max_by_key(|text| text.chars().count())
}

/// Raw `src`/`srcset` URLs of the page, unscored.
pub fn images_from_dom(page: &Page, limit: usize) -> Vec<String> {
    let mut urls: Vec<String> = Vec::new();
    for img in page.select("img") {
        let element = img.value();
        let srcset = element
            .attr("srcset")
            .map(|set| {
                set.split(',')
                    .filter_map(|entry| entry.split_whitespace().next())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        for raw in element.attr("src").into_iter().chain(srcset) {
            if urls.len() >= limit {
                return urls;
            }
            if raw.trim_start().starts_with("data:") {
                continue;
            }
            if let Some(url) = page.absolutize(raw) {
                if !urls.contains(&url) {
                    urls.push(url);
                }
            }
        }
    }
    urls
}

/// Rent or sale from multilingual keywords. Rent words are checked first.
pub fn infer_transaction(text: &str) -> Option<TransactionType> {
    if RENT_WORDS.is_match(text) {
        Some(TransactionType::Rent)
    } else if SALE_WORDS.is_match(text) {
        Some(TransactionType::Sale)
    } else {
        None
    }
}
