use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::document::Page;
use crate::error::ExtractError;
use crate::models::{ExtractionMethod, Listing};
use crate::probe::ImageProbe;
use crate::scrapers::generic::parse_generic;
use crate::scrapers::heuristics::enrich;
use crate::scrapers::sites::SiteAdapter;
use crate::scrapers::traits::Extractor;
use crate::scrapers::ExtractOptions;

/// Routes a page to the first matching site adapter, with the generic
/// extractor as the fallback for unclaimed pages and failed adapters.
pub struct Registry {
    adapters: Vec<SiteAdapter>,
    probe: Box<dyn ImageProbe>,
    options: ExtractOptions,
}

impl Registry {
    pub fn new(probe: impl ImageProbe + 'static) -> Self {
        Self::with_options(probe, ExtractOptions::default())
    }

    pub fn with_options(probe: impl ImageProbe + 'static, options: ExtractOptions) -> Self {
        Self {
            adapters: SiteAdapter::ALL.to_vec(),
            probe: Box::new(probe),
            options,
        }
    }

    /// Replaces the adapter list; order is the matching order.
    pub fn adapters(mut self, adapters: Vec<SiteAdapter>) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// First adapter claiming `hostname`.
    pub fn adapter_for(&self, hostname: &str) -> Option<SiteAdapter> {
        self.adapters
            .iter()
            .copied()
            .find(|adapter| adapter.test(hostname))
    }

    /// Runs the matching adapter (or the generic extractor), then the
    /// enrichment pass and the provenance stamp. Adapter failures are logged
    /// and replaced by the generic result; they never reach the caller.
    pub async fn extract_page(&self, page: &Page) -> Listing {
        let probe = self.probe.as_ref();
        let (listing, method) = match self.adapter_for(page.hostname()) {
            Some(adapter) => {
                info!("Using {} adapter for {}", adapter.name(), page.hostname());
                match adapter.parse(page, probe, &self.options).await {
                    Ok(listing) => {
                        let method = if adapter.has_custom_parser() {
                            ExtractionMethod::DomHeuristic
                        } else {
                            method_of(&listing)
                        };
                        (listing, method)
                    }
                    Err(e) => {
                        warn!(
                            "{} adapter failed, falling back to generic extraction: {:#}",
                            adapter.name(),
                            e
                        );
                        let listing = parse_generic(page, probe, &self.options).await;
                        let method = method_of(&listing);
                        (listing, method)
                    }
                }
            }
            None => {
                debug!("No adapter for {}, using generic extraction", page.hostname());
                let listing = parse_generic(page, probe, &self.options).await;
                let method = method_of(&listing);
                (listing, method)
            }
        };
        finish(listing, page, method, &self.options)
    }
}

fn method_of(listing: &Listing) -> ExtractionMethod {
    listing
        .source
        .as_ref()
        .map(|source| source.method)
        .unwrap_or(ExtractionMethod::DomHeuristic)
}

/// Final enrichment pass and provenance stamp shared by every extraction
/// path. Any `url`/`source` already on the listing is overwritten.
pub fn finish(
    listing: Listing,
    page: &Page,
    method: ExtractionMethod,
    options: &ExtractOptions,
) -> Listing {
    enrich(listing, page, options).stamped(page.url().as_str(), page.hostname(), method)
}

#[async_trait(?Send)]
impl Extractor for Registry {
    async fn extract(&self, html: &str, url: &str) -> Result<Listing, ExtractError> {
        let page = Page::parse(html, url)?;
        Ok(self.extract_page(&page).await)
    }

    fn extractor_name(&self) -> &'static str {
        "local"
    }
}
