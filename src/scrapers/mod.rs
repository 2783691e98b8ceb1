pub mod fetch;
pub mod generic;
pub mod heuristics;
pub mod registry;
pub mod sites;
pub mod traits;
pub mod types;

pub use fetch::{BrowserRenderer, PageFetcher};
pub use generic::parse_generic;
pub use heuristics::enrich;
pub use registry::Registry;
pub use sites::SiteAdapter;
pub use traits::Extractor;
pub use types::ExtractOptions;
