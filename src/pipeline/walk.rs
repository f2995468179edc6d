// src/pipeline/walk.rs

//! Pagination walker.
//!
//! Drives one [`ElementExtractor`] across the pages of a search, strictly one
//! page at a time, and merges what it finds into an [`EntityMap`].

use crate::error::{AppError, Result};
use crate::models::{EntityMap, SearchSpec};
use crate::services::{ElementExtractor, PageFetcher};

/// Walks paginated searches, bounded by a page ceiling per search.
pub struct PaginationWalker<'a> {
    fetcher: &'a dyn PageFetcher,
    extractor: &'a dyn ElementExtractor,
    max_pages: usize,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(
        fetcher: &'a dyn PageFetcher,
        extractor: &'a dyn ElementExtractor,
        max_pages: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            max_pages,
        }
    }

    /// Walk one search into a fresh map.
    pub fn walk(&self, search: &SearchSpec) -> Result<EntityMap> {
        let mut entities = EntityMap::new();
        self.walk_into(search, &mut entities)?;
        Ok(entities)
    }

    /// Walk every search in order into one map. A key seen again, whether on
    /// a later page or in a later search, replaces the earlier record.
    pub fn walk_all(&self, searches: &[SearchSpec]) -> Result<EntityMap> {
        let mut entities = EntityMap::new();
        for search in searches {
            self.walk_into(search, &mut entities)?;
        }
        Ok(entities)
    }

    /// Walk one search, merging into `entities`. Returns the number of pages
    /// consumed.
    ///
    /// Fails with [`AppError::PaginationLimitExceeded`] when the
    /// `max_pages`-th page still links to a next page.
    pub fn walk_into(&self, search: &SearchSpec, entities: &mut EntityMap) -> Result<usize> {
        let kind = self.extractor.page_kind();
        let mut url = search.search_url.clone();
        let mut pages = 0;

        loop {
            let page = self.fetcher.fetch(&url, kind)?;
            pages += 1;

            let raw_entities = self.extractor.extract_entities(&page)?;
            let found = raw_entities.len();
            for raw in raw_entities {
                if let Some((key, record)) = self.extractor.key_and_enrich(raw, search) {
                    entities.insert(key, record);
                }
            }
            log::debug!("Page {pages} of '{}': {found} entities", search.title);

            let Some(next) = self.extractor.next_page_url(&page) else {
                break;
            };
            if pages >= self.max_pages {
                log::error!(
                    "Max page limit of {} reached without reaching end of search '{}'",
                    self.max_pages,
                    search.title
                );
                return Err(AppError::PaginationLimitExceeded {
                    search: search.title.clone(),
                    max_pages: self.max_pages,
                });
            }
            url = next;
        }

        log::info!(
            "Finished search '{}': {pages} page(s), {} entities so far",
            search.title,
            entities.len()
        );
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use url::Url;

    use super::*;
    use crate::models::ListingSelectors;
    use crate::services::{ListingExtractor, Page, PageKind};

    /// Serves canned HTML by URL and records the fetch order.
    struct FakeFetcher {
        pages: HashMap<String, String>,
        fetched: RefCell<Vec<String>>,
    }

    impl FakeFetcher {
        fn new(pages: &[(&str, String)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, html)| (u.to_string(), html.clone()))
                    .collect(),
                fetched: RefCell::new(Vec::new()),
            }
        }
    }

    impl PageFetcher for FakeFetcher {
        fn fetch(&self, url: &str, _kind: PageKind) -> Result<Page> {
            self.fetched.borrow_mut().push(url.to_string());
            let html = self
                .pages
                .get(url)
                .ok_or_else(|| AppError::config(format!("unexpected fetch {url}")))?;
            Ok(Page::html(Url::parse(url)?, html))
        }
    }

    fn listing_page(ads: &[(&str, &str)], next: Option<&str>) -> String {
        let mut html = String::from("<html><body>");
        for (href, title) in ads {
            html.push_str(&format!(r#"<article><a href="{href}">{title}</a></article>"#));
        }
        if let Some(next) = next {
            html.push_str(&format!(r#"<a class="next" href="{next}">next</a>"#));
        }
        html.push_str("</body></html>");
        html
    }

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(&ListingSelectors {
            item_selector: "article".into(),
            link_selector: "a".into(),
            next_page_selector: Some("a.next".into()),
            ..ListingSelectors::default()
        })
        .unwrap()
    }

    fn search(url: &str, title: &str) -> SearchSpec {
        SearchSpec {
            search_url: url.into(),
            display_url: url.into(),
            title: title.into(),
        }
    }

    #[test]
    fn follows_pages_and_unions_entities() {
        let fetcher = FakeFetcher::new(&[
            (
                "https://example.com/s?p=1",
                listing_page(&[("/ad/1", "One"), ("/ad/2", "Two")], Some("/s?p=2")),
            ),
            (
                "https://example.com/s?p=2",
                listing_page(&[("/ad/3", "Three")], None),
            ),
        ]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 15);

        let mut entities = EntityMap::new();
        let pages = walker
            .walk_into(&search("https://example.com/s?p=1", "bikes"), &mut entities)
            .unwrap();

        assert_eq!(pages, 2);
        let keys: Vec<_> = entities.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![
                "https://example.com/ad/1",
                "https://example.com/ad/2",
                "https://example.com/ad/3",
            ]
        );
        assert_eq!(
            *fetcher.fetched.borrow(),
            vec!["https://example.com/s?p=1", "https://example.com/s?p=2"]
        );
    }

    #[test]
    fn exceeding_max_pages_fails() {
        let fetcher = FakeFetcher::new(&[
            ("https://example.com/s?p=1", listing_page(&[("/ad/1", "One")], Some("/s?p=2"))),
            ("https://example.com/s?p=2", listing_page(&[("/ad/2", "Two")], Some("/s?p=3"))),
            ("https://example.com/s?p=3", listing_page(&[("/ad/3", "Three")], None)),
        ]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 2);

        let err = walker
            .walk(&search("https://example.com/s?p=1", "bikes"))
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::PaginationLimitExceeded { max_pages: 2, .. }
        ));
        assert_eq!(fetcher.fetched.borrow().len(), 2);
    }

    #[test]
    fn last_page_at_ceiling_is_fine() {
        let fetcher = FakeFetcher::new(&[
            ("https://example.com/s?p=1", listing_page(&[("/ad/1", "One")], Some("/s?p=2"))),
            ("https://example.com/s?p=2", listing_page(&[("/ad/2", "Two")], None)),
        ]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 2);

        let entities = walker
            .walk(&search("https://example.com/s?p=1", "bikes"))
            .unwrap();
        assert_eq!(entities.len(), 2);
    }

    #[test]
    fn cyclic_pagination_is_bounded() {
        let fetcher = FakeFetcher::new(&[(
            "https://example.com/s",
            listing_page(&[("/ad/1", "One")], Some("/s")),
        )]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 5);

        assert!(walker.walk(&search("https://example.com/s", "loop")).is_err());
        assert_eq!(fetcher.fetched.borrow().len(), 5);
    }

    #[test]
    fn later_search_wins_on_duplicate_key() {
        let fetcher = FakeFetcher::new(&[
            ("https://example.com/a", listing_page(&[("/ad/1", "From A")], None)),
            ("https://example.com/b", listing_page(&[("/ad/1", "From B")], None)),
        ]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 15);

        let entities = walker
            .walk_all(&[
                search("https://example.com/a", "first"),
                search("https://example.com/b", "second"),
            ])
            .unwrap();

        assert_eq!(entities.len(), 1);
        let record = &entities["https://example.com/ad/1"];
        assert_eq!(record.title, "From B");
        assert_eq!(record.search.name, "second");
    }

    #[test]
    fn transport_error_propagates() {
        let fetcher = FakeFetcher::new(&[]);
        let extractor = extractor();
        let walker = PaginationWalker::new(&fetcher, &extractor, 15);
        assert!(walker.walk(&search("https://example.com/gone", "x")).is_err());
    }
}
