use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::error::ExtractError;
use crate::normalize::{absolute_url, normalize_spaces};

const HIDDEN_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main",
    "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// A parsed page snapshot: the document tree plus the URLs needed to
/// interpret it. Built once per extraction call.
pub struct Page {
    html: Html,
    url: Url,
    base: Url,
}

impl Page {
    /// Parse raw HTML fetched from `url`.
    pub fn parse(html: &str, url: &str) -> Result<Self, ExtractError> {
        if html.trim().is_empty() {
            return Err(ExtractError::Document(format!("empty document for {}", url)));
        }
        let url = Url::parse(url)
            .map_err(|e| ExtractError::Document(format!("invalid page url {}: {}", url, e)))?;

        let html = Html::parse_document(html);
        let base = Selector::parse("base[href]")
            .ok()
            .and_then(|sel| {
                html.select(&sel)
                    .next()
                    .and_then(|el| el.value().attr("href"))
                    .and_then(|href| url.join(href.trim()).ok())
            })
            .unwrap_or_else(|| url.clone());

        Ok(Self { html, url, base })
    }

    /// Replace the base used for relative links.
    pub fn with_base(mut self, base: &str) -> Result<Self, ExtractError> {
        self.base = self
            .url
            .join(base)
            .map_err(|e| ExtractError::Document(format!("invalid base url {}: {}", base, e)))?;
        Ok(self)
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn hostname(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn absolutize(&self, raw: &str) -> Option<String> {
        absolute_url(raw, &self.base)
    }

    /// All elements matching `css`. An invalid selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(sel) => self.html.select(&sel).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn select_first(&self, css: &str) -> Option<ElementRef<'_>> {
        let sel = Selector::parse(css).ok()?;
        self.html.select(&sel).next()
    }

    /// Every element of the document in tree order.
    pub fn elements(&self) -> impl Iterator<Item = ElementRef<'_>> {
        self.html.root_element().descendants().filter_map(ElementRef::wrap)
    }

    pub fn find<F>(&self, predicate: F) -> Option<ElementRef<'_>>
    where
        F: Fn(&ElementRef<'_>) -> bool,
    {
        self.elements().find(|el| predicate(el))
    }

    /// `content` of `<meta name=key>`, falling back to `<meta property=key>`.
    pub fn meta(&self, key: &str) -> Option<String> {
        ["name", "property"].iter().find_map(|attr| {
            self.elements()
                .filter(|el| el.value().name() == "meta")
                .find(|el| el.value().attr(attr) == Some(key))
                .and_then(|el| el.value().attr("content"))
                .and_then(normalize_spaces)
        })
    }

    /// Text a reader would see: script/style content is skipped and block
    /// elements are separated by line breaks.
    pub fn visible_text(&self) -> String {
        let root = self
            .select_first("body")
            .unwrap_or_else(|| self.html.root_element());
        visible_text(root)
    }

    pub fn first_heading(&self) -> Option<String> {
        self.select_first("h1").and_then(|h1| element_text(&h1))
    }

    pub fn title(&self) -> Option<String> {
        self.select_first("title")
            .and_then(|title| normalize_spaces(&title.text().collect::<String>()))
    }

    /// Bodies of `<script>` tags without a `src`.
    pub fn inline_scripts(&self) -> Vec<String> {
        self.select("script:not([src])")
            .into_iter()
            .map(|script| script.text().collect::<String>())
            .filter(|text| !text.trim().is_empty())
            .collect()
    }
}

/// Visible text below `element`.
pub fn visible_text(element: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_visible(element, &mut out);
    out
}

fn collect_visible(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_TAGS.contains(&name) {
        return;
    }
    let block = BLOCK_TAGS.contains(&name);
    if block {
        out.push('\n');
    }
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    collect_visible(el, out);
                }
            }
            _ => {}
        }
    }
    if block {
        out.push('\n');
    }
}

/// Whitespace-normalized visible text of an element.
pub fn element_text(element: &ElementRef<'_>) -> Option<String> {
    normalize_spaces(&visible_text(*element))
}

/// Case-insensitive "attribute contains any of" test, the equivalent of
/// `[class*="gallery" i]`.
pub fn attr_contains(element: &ElementRef<'_>, attr: &str, needles: &[&str]) -> bool {
    element
        .value()
        .attr(attr)
        .map(|value| {
            let value = value.to_lowercase();
            needles.iter().any(|needle| value.contains(needle))
        })
        .unwrap_or(false)
}
