use crate::error::ExtractError;
use crate::models::Listing;
use async_trait::async_trait;

/// Common trait for listing extractors.
/// The local pipeline and the remote extraction service both sit behind it,
/// so callers can swap one for the other.
#[async_trait(?Send)]
pub trait Extractor {
    /// Extract a listing from a captured document
    async fn extract(&self, html: &str, url: &str) -> Result<Listing, ExtractError>;

    /// Get the name of the extractor
    fn extractor_name(&self) -> &'static str;
}
