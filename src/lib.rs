//! Structured real-estate listings from arbitrary listing pages.
//!
//! A [`Registry`] routes a captured page to a site adapter or to the generic
//! extractor, fills remaining gaps from whole-page heuristics and stamps the
//! result with its provenance. [`RemoteExtractor`] offers the same contract
//! backed by a remote extraction service.

pub mod document;
pub mod error;
pub mod geo;
pub mod images;
pub mod metadata;
pub mod models;
pub mod normalize;
pub mod preprocess;
pub mod probe;
pub mod remote;
pub mod scrapers;

pub use document::Page;
pub use error::{ExtractError, RemoteError};
pub use models::{
    Address, Area, ExtractionMethod, FillGaps, GeoCoordinates, Listing, Money, RoomInfo, Source,
    TransactionType,
};
pub use probe::{HttpImageProbe, ImageProbe, NoProbe};
pub use remote::RemoteExtractor;
pub use scrapers::{ExtractOptions, Extractor, Registry, SiteAdapter};
