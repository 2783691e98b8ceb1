//! Shrinks a document before it is sent to the remote extraction service:
//! only the body's content markup survives, with a small attribute allowlist.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};

const REMOVE_TAGS: &[&str] = &[
    "script", "style", "noscript", "iframe", "svg", "path", "canvas", "audio", "video", "embed",
    "object", "meta", "link",
];

const KEEP_ATTRIBUTES: &[&str] = &[
    "href",
    "src",
    "alt",
    "title",
    "content",
    "property",
    "name",
    "itemprop",
    "itemtype",
    "itemscope",
    "data-price",
    "data-area",
    "data-address",
];

const NAVIGATION_TAGS: &[&str] = &["nav", "footer"];
const NAVIGATION_ROLES: &[&str] = &["navigation", "banner", "contentinfo"];
const NAVIGATION_CLASSES: &[&str] = &[
    "navbar",
    "navigation",
    "menu",
    "header",
    "footer",
    "sidebar",
    "advertisement",
    "ad",
    "cookie",
    "popup",
    "modal",
];

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "hr", "img", "input", "param", "source", "track", "wbr",
];

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static BETWEEN_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r">\s+<").unwrap());

/// Inner HTML of the cleaned body.
pub fn clean_html(html: &Html) -> String {
    let root = html
        .select(&BODY)
        .next()
        .unwrap_or_else(|| html.root_element());

    let mut out = String::new();
    write_children(root, &mut out);
    BETWEEN_TAGS.replace_all(&out, "><").trim().to_string()
}

fn write_children(parent: ElementRef<'_>, out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(text) => {
                let collapsed = WHITESPACE.replace_all(text, " ");
                escape_into(&collapsed, false, out);
            }
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(child) {
                    write_element(element, out);
                }
            }
            _ => {}
        }
    }
}

fn write_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if REMOVE_TAGS.contains(&name) {
        return;
    }
    if is_navigation(&element) && !has_listing_schema(&element) {
        return;
    }
    if is_empty(&element) {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in element.value().attrs() {
        if !KEEP_ATTRIBUTES.contains(&attr) {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        if !value.is_empty() {
            out.push_str("=\"");
            escape_into(value, true, out);
            out.push('"');
        }
    }
    out.push('>');

    if VOID_TAGS.contains(&name) {
        return;
    }
    write_children(element, out);
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn is_navigation(element: &ElementRef<'_>) -> bool {
    let el = element.value();
    if NAVIGATION_TAGS.contains(&el.name()) {
        return true;
    }
    if el.name() == "header" && el.attr("itemscope").is_none() {
        return true;
    }
    if el
        .attr("role")
        .is_some_and(|role| NAVIGATION_ROLES.contains(&role))
    {
        return true;
    }
    el.classes().any(|class| NAVIGATION_CLASSES.contains(&class))
}

fn has_listing_schema(element: &ElementRef<'_>) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|el| {
            el.value().attr("itemscope").is_some()
                && el
                    .value()
                    .attr("itemtype")
                    .is_some_and(|t| t.to_lowercase().contains("realestate"))
        })
}

/// No text, no kept attribute and no child elements.
fn is_empty(element: &ElementRef<'_>) -> bool {
    let has_text = element.text().any(|t| !t.trim().is_empty());
    let has_attrs = element
        .value()
        .attrs()
        .any(|(attr, _)| KEEP_ATTRIBUTES.contains(&attr));
    let has_children = element.children().any(|child| child.value().is_element());
    !has_text && !has_attrs && !has_children
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
}

/// Human readable byte count: "512 B", "1.5 KB", "2.0 MB".
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let size = bytes as f64;
    if size < KB {
        format!("{} B", bytes)
    } else if size < KB * KB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{:.1} MB", size / (KB * KB))
    }
}
