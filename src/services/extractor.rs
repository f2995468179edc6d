//! Site-specific extraction strategies.

use crate::error::Result;
use crate::models::{EntityRecord, ExtractorKind, RawEntity, SearchSpec, SiteConfig};
use crate::services::fetcher::{Page, PageKind};
use crate::services::listing::{JsonListingExtractor, ListingExtractor};
use crate::services::snapshot::SnapshotExtractor;

/// Capabilities one site family provides to the walker and the composer.
pub trait ElementExtractor {
    /// How pages for this site must be parsed.
    fn page_kind(&self) -> PageKind {
        PageKind::Html
    }

    /// Candidate entities found on a page.
    fn extract_entities(&self, page: &Page) -> Result<Vec<RawEntity>>;

    /// Derive the map key and the full record for a raw entity.
    /// `None` drops an entity that cannot be identified.
    fn key_and_enrich(&self, raw: RawEntity, search: &SearchSpec) -> Option<(String, EntityRecord)>;

    /// URL of the page after `page`, if the results continue.
    fn next_page_url(&self, page: &Page) -> Option<String>;

    /// One notification entry for an entity.
    fn format_entry(&self, entity_link: &str, search_link: &str, entity: &EntityRecord) -> String;
}

/// Build the extractor for a site's configured kind.
pub fn build_extractor(site: &SiteConfig) -> Result<Box<dyn ElementExtractor>> {
    let extractor: Box<dyn ElementExtractor> = match site.kind {
        ExtractorKind::Listing => Box::new(ListingExtractor::new(&site.listing)?),
        ExtractorKind::JsonListing => Box::new(JsonListingExtractor::new(site.json_listing.clone())?),
        ExtractorKind::SiteSnapshot => Box::new(SnapshotExtractor::markup()),
        ExtractorKind::TextSnapshot => Box::new(SnapshotExtractor::text()),
    };
    Ok(extractor)
}
