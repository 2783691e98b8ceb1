//! Client for the remote AI extraction service.
//!
//! The document is cleaned, posted as `{html, url}` to
//! `<endpoint>/api/parse-ad` with a bearer token, and the Listing-shaped
//! answer goes through the same finishing step as local extraction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};
use url::Url;

use crate::document::Page;
use crate::error::{ExtractError, RemoteError};
use crate::models::{ExtractionMethod, Listing};
use crate::preprocess::{clean_html, format_size};
use crate::scrapers::registry::finish;
use crate::scrapers::{ExtractOptions, Extractor};

const PARSE_PATH: &str = "/api/parse-ad";

#[derive(Debug, Serialize)]
struct ParseRequest<'a> {
    html: &'a str,
    url: &'a str,
}

pub struct RemoteExtractor {
    client: Client,
    endpoint: Url,
    token: Option<String>,
    options: ExtractOptions,
}

impl RemoteExtractor {
    /// `base` is the service root, e.g. `https://api.example.com`.
    pub fn new(base: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;
        Self::with_client(client, base, token)
    }

    pub fn with_client(client: Client, base: &str, token: Option<String>) -> Result<Self> {
        let endpoint = Url::parse(base)
            .and_then(|base| base.join(PARSE_PATH))
            .with_context(|| format!("Invalid remote endpoint {}", base))?;
        Ok(Self {
            client,
            endpoint,
            token: token.map(|t| normalize_token(&t)).filter(|t| !t.is_empty()),
            options: ExtractOptions::default(),
        })
    }

    /// Options of the enrichment pass applied to remote results.
    pub fn options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts already-cleaned HTML and decodes the service answer.
    pub async fn request(&self, html: &str, url: &str) -> Result<Listing, RemoteError> {
        if html.trim().is_empty() || url.trim().is_empty() {
            return Err(RemoteError::BadRequest);
        }
        let token = self.token.as_deref().ok_or(RemoteError::NoCredential)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(token)
            .json(&ParseRequest { html, url })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body,
            });
        }

        match serde_json::from_str::<Listing>(&body) {
            Ok(listing) => Ok(listing),
            Err(e) => Err(RemoteError::MalformedResponse {
                reason: e.to_string(),
                body,
            }),
        }
    }

    /// Cleans the page, asks the service, then enriches and stamps the
    /// result as `hybrid`.
    pub async fn extract_page(&self, page: &Page) -> Result<Listing, RemoteError> {
        let original = page.html().html();
        let cleaned = clean_html(page.html());
        info!(
            "HTML preprocessed: {} -> {} ({}%)",
            format_size(original.len()),
            format_size(cleaned.len()),
            (cleaned.len() * 100) / original.len().max(1)
        );

        let listing = self
            .request(&cleaned, page.url().as_str())
            .await
            .map_err(|e| {
                error!("Remote extraction failed: {}", e);
                e
            })?;
        Ok(finish(
            listing,
            page,
            ExtractionMethod::Hybrid,
            &self.options,
        ))
    }
}

/// Strips an optional `Bearer ` prefix and surrounding whitespace.
pub fn normalize_token(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = match trimmed.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => &trimmed[7..],
        _ => trimmed,
    };
    without_scheme.trim().to_string()
}

#[async_trait(?Send)]
impl Extractor for RemoteExtractor {
    async fn extract(&self, html: &str, url: &str) -> Result<Listing, ExtractError> {
        let page = Page::parse(html, url)?;
        Ok(self.extract_page(&page).await?)
    }

    fn extractor_name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Bearer abc123"), "abc123");
        assert_eq!(normalize_token("  bearer   abc123 "), "abc123");
        assert_eq!(normalize_token("abc123"), "abc123");
        assert_eq!(normalize_token("Bearer "), "");
    }

    #[test]
    fn test_endpoint_join() {
        let remote = RemoteExtractor::new("https://api.example.com/v1/", None).unwrap();
        assert_eq!(
            remote.endpoint().as_str(),
            "https://api.example.com/api/parse-ad"
        );
        assert!(RemoteExtractor::new("not a url", None).is_err());
    }

    #[tokio::test]
    async fn test_request_sends_bearer_and_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/parse-ad")
                .header("authorization", "Bearer secret")
                .json_body(json!({"html": "<p>Flat</p>", "url": "https://example.com/1"}));
            then.status(200)
                .header("content-type", "application/json")
                .json_body(json!({"title": "Flat", "price": {"amount": 1200, "currency": "EUR"}}));
        });

        let remote =
            RemoteExtractor::new(&server.base_url(), Some("Bearer secret".to_string())).unwrap();
        let listing = remote
            .request("<p>Flat</p>", "https://example.com/1")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(listing.title.as_deref(), Some("Flat"));
        assert_eq!(listing.price.unwrap().amount, Some(1200.0));
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/parse-ad");
            then.status(401).body("token expired");
        });

        let remote = RemoteExtractor::new(&server.base_url(), Some("old".to_string())).unwrap();
        let err = remote.request("<p>x</p>", "https://example.com/").await.unwrap_err();

        assert!(err.needs_credential());
        match err {
            RemoteError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "token expired");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/parse-ad");
            then.status(200).body("[1, 2, 3]");
        });

        let remote = RemoteExtractor::new(&server.base_url(), Some("t".to_string())).unwrap();
        let err = remote.request("<p>x</p>", "https://example.com/").await.unwrap_err();
        assert!(matches!(err, RemoteError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_missing_credential_and_bad_request_skip_the_network() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/parse-ad");
            then.status(200).body("{}");
        });

        let remote = RemoteExtractor::new(&server.base_url(), Some("Bearer ".to_string())).unwrap();
        let err = remote.request("<p>x</p>", "https://example.com/").await.unwrap_err();
        assert!(matches!(err, RemoteError::NoCredential));

        let remote = RemoteExtractor::new(&server.base_url(), Some("t".to_string())).unwrap();
        let err = remote.request("   ", "https://example.com/").await.unwrap_err();
        assert!(matches!(err, RemoteError::BadRequest));

        mock.assert_hits(0);
    }

    #[tokio::test]
    async fn test_transport_error() {
        let remote = RemoteExtractor::new("http://127.0.0.1:1", Some("t".to_string())).unwrap();
        let err = remote.request("<p>x</p>", "https://example.com/").await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_extract_stamps_hybrid_provenance() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/api/parse-ad");
            then.status(200).json_body(json!({
                "title": "Penthouse",
                "url": "https://elsewhere.example/",
                "source": {"domain": "elsewhere.example", "extractedAt": "2020-01-01T00:00:00Z", "method": "jsonld"}
            }));
        });

        let remote = RemoteExtractor::new(&server.base_url(), Some("t".to_string())).unwrap();
        let listing = remote
            .extract(
                "<html><body><h1>Penthouse for sale</h1><p>Top floor, 140 m2</p></body></html>",
                "https://homes.example.com/p/3",
            )
            .await
            .unwrap();

        assert_eq!(listing.url.as_deref(), Some("https://homes.example.com/p/3"));
        let source = listing.source.unwrap();
        assert_eq!(source.method, ExtractionMethod::Hybrid);
        assert_eq!(source.domain, "homes.example.com");
        assert_eq!(listing.title.as_deref(), Some("Penthouse"));
        assert_eq!(listing.area.unwrap().value, Some(140.0));
    }
}
