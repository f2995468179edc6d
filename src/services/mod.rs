//! Service layer: page retrieval and site-specific extraction.
//!
//! - `PageFetcher` / `HttpSession`: fetch and parse pages
//! - `ElementExtractor`: per-site-family extraction strategy
//! - `ListingExtractor`, `JsonListingExtractor`: many entities per page
//! - `SnapshotExtractor`: whole page as one entity

mod extractor;
mod fetcher;
mod listing;
mod snapshot;

pub use extractor::{ElementExtractor, build_extractor};
pub use fetcher::{HttpSession, Page, PageBody, PageFetcher, PageKind};
pub use listing::{JsonListingExtractor, ListingExtractor};
pub use snapshot::SnapshotExtractor;
