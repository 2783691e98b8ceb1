//! Locale-tolerant number, currency and unit normalization.
//!
//! Everything here is heuristic: `1.234` is read as one thousand two
//! hundred thirty-four because exactly three digits follow the dot, while
//! `1.23` stays a decimal. Callers get `None` when nothing sensible can be
//! recovered.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use url::Url;

use crate::models::Area;

pub const SQUARE_METERS: &str = "m2";
pub const SQFT_TO_SQM: f64 = 0.092903;

/// Symbol table, scanned in order. Prefixed dollar forms precede the bare `$`.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("US$", "USD"),
    ("CA$", "CAD"),
    ("C$", "CAD"),
    ("A$", "AUD"),
    ("R$", "BRL"),
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("₽", "RUB"),
    ("₴", "UAH"),
    ("₪", "ILS"),
    ("₺", "TRY"),
    ("₹", "INR"),
    ("¥", "JPY"),
    ("₩", "KRW"),
    ("zł", "PLN"),
];

static ISO_CURRENCY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(USD|CAD|AUD|EUR|GBP|RUB|UAH|ILS|TRY|INR|JPY|KRW|BRL|PLN|MXN|COP|ARS|CLP|PEN|UYU|CHF|SEK|NOK|DKK|CZK|HUF|RON|BGN|HRK|RSD|AED|SAR|QAR|KWD|BHD|OMR|EGP|CNY|HKD|TWD|SGD|MYR|THB|VND|IDR|PHP|PKR|BDT|ZAR)\b",
    )
    .unwrap()
});

static NUMERIC_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d[\d\s.,]*").unwrap());

const METER_UNITS: &[&str] = &["m2", "m²", "sqm", "sq m", "square met", "кв", "mtk"];
const FOOT_UNITS: &[&str] = &["sqft", "sq ft", "sq. ft", "ft2", "ft²", "square f", "ftk"];

/// Parses a number written with any mix of `.`/`,`/space grouping.
///
/// - both `.` and `,` present: the rightmost one is the decimal separator
/// - one separator repeated: all of them group thousands
/// - one single separator: thousands when exactly three digits follow, else decimal
///   (a lone `.` followed by other than three digits is kept as a decimal point)
/// - whitespace always groups thousands
pub fn parse_number(input: &str) -> Option<f64> {
    let cleaned: String = input
        .replace('\u{a0}', " ")
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(*c, '.' | ',' | '-') || c.is_whitespace())
        .collect();
    let mut s = cleaned.trim().to_string();

    let dots = s.matches('.').count();
    let commas = s.matches(',').count();

    if dots > 0 && commas > 0 {
        if s.rfind('.') > s.rfind(',') {
            s = s.replace(',', "");
        } else {
            s = s.replace('.', "").replacen(',', ".", 1);
        }
    } else if dots > 1 {
        s = s.replace('.', "");
    } else if commas > 1 {
        s = s.replace(',', "");
    } else if commas == 1 {
        if digits_after(&s, ',') == 3 {
            s = s.replace(',', "");
        } else {
            s = s.replace(',', ".");
        }
    } else if dots == 1 && digits_after(&s, '.') == 3 {
        s = s.replace('.', "");
    }

    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn digits_after(s: &str, separator: char) -> usize {
    s.split_once(separator)
        .map(|(_, tail)| tail.chars().filter(char::is_ascii_digit).count())
        .unwrap_or(0)
}

/// Numbers in JSON come either as numbers or as formatted strings.
pub fn parse_number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// First run of digits (with its grouping separators) inside free text,
/// so "Price: $250,000 / 3 beds" yields "250,000".
pub fn first_numeric_run(text: &str) -> Option<&str> {
    let found = NUMERIC_RUN.find(text)?;
    let run = found
        .as_str()
        .trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
    (!run.is_empty()).then_some(run)
}

/// Parses the first number found in a piece of page text.
pub fn parse_number_in_text(text: &str) -> Option<f64> {
    first_numeric_run(text).and_then(parse_number)
}

/// Detects an ISO-4217 code from a currency symbol or a code in any case.
pub fn detect_currency(text: &str) -> Option<&'static str> {
    if text.is_empty() {
        return None;
    }
    if let Some((_, code)) = CURRENCY_SYMBOLS
        .iter()
        .find(|(symbol, _)| text.contains(symbol))
    {
        return Some(*code);
    }
    ISO_CURRENCY
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| iso_code(m.as_str()))
}

fn iso_code(code: &str) -> Option<&'static str> {
    ISO_CODES
        .iter()
        .copied()
        .find(|known| known.eq_ignore_ascii_case(code))
}

const ISO_CODES: &[&str] = &[
    "USD", "CAD", "AUD", "EUR", "GBP", "RUB", "UAH", "ILS", "TRY", "INR", "JPY", "KRW", "BRL",
    "PLN", "MXN", "COP", "ARS", "CLP", "PEN", "UYU", "CHF", "SEK", "NOK", "DKK", "CZK", "HUF",
    "RON", "BGN", "HRK", "RSD", "AED", "SAR", "QAR", "KWD", "BHD", "OMR", "EGP", "CNY", "HKD",
    "TWD", "SGD", "MYR", "THB", "VND", "IDR", "PHP", "PKR", "BDT", "ZAR",
];

/// Canonicalizes an observed value/unit pair to square meters.
///
/// A missing unit means square meters. Units that are neither meters nor
/// feet are passed through untouched with their original label.
pub fn to_square_meters(value: Option<f64>, unit: Option<&str>) -> Area {
    let unit = unit.map(str::trim).filter(|u| !u.is_empty());
    let Some(value) = value else {
        return Area {
            value: None,
            unit: unit.map(str::to_string),
        };
    };

    let Some(label) = unit else {
        return Area {
            value: Some(value),
            unit: Some(SQUARE_METERS.to_string()),
        };
    };

    let lower = label.to_lowercase();
    if METER_UNITS.iter().any(|u| lower.contains(u)) {
        Area {
            value: Some(value),
            unit: Some(SQUARE_METERS.to_string()),
        }
    } else if FOOT_UNITS.iter().any(|u| lower.contains(u)) {
        Area {
            value: Some(value * SQFT_TO_SQM),
            unit: Some(SQUARE_METERS.to_string()),
        }
    } else {
        Area {
            value: Some(value),
            unit: Some(label.to_string()),
        }
    }
}

/// First present candidate in priority order.
pub fn pick_first<T, I>(candidates: I) -> Option<T>
where
    I: IntoIterator<Item = Option<T>>,
{
    candidates.into_iter().flatten().next()
}

/// Resolves `raw` against `base`. Returns `None` for blank or unresolvable input.
pub fn absolute_url(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    base.join(raw).ok().map(|url| url.to_string())
}

/// Collapses whitespace runs; blank input becomes `None`.
pub fn normalize_spaces(input: &str) -> Option<String> {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}
