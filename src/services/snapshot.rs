//! Whole-page extractors for "did anything change" monitoring.

use scraper::Html;

use crate::error::Result;
use crate::models::{EntityRecord, RawEntity, SearchRef, SearchSpec};
use crate::services::extractor::ElementExtractor;
use crate::services::fetcher::{Page, PageBody};
use crate::utils::normalize_whitespace;

const CONTENT: &str = "content";

/// Elements whose text is never rendered.
const HIDDEN: &[&str] = &["script", "style", "noscript", "template"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SnapshotMode {
    /// Full serialized markup
    Markup,
    /// Visible text only, so markup churn does not count as a change
    Text,
}

/// Treats each search page as a single entity keyed by its search URL.
#[derive(Debug, Clone)]
pub struct SnapshotExtractor {
    mode: SnapshotMode,
}

impl SnapshotExtractor {
    pub fn markup() -> Self {
        Self {
            mode: SnapshotMode::Markup,
        }
    }

    pub fn text() -> Self {
        Self {
            mode: SnapshotMode::Text,
        }
    }
}

fn visible_text(document: &Html) -> String {
    let parts: Vec<&str> = document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node.ancestors().any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| HIDDEN.contains(&e.name()))
            });
            (!hidden).then_some(&**text)
        })
        .collect();
    normalize_whitespace(&parts.join(" "))
}

impl ElementExtractor for SnapshotExtractor {
    fn extract_entities(&self, page: &Page) -> Result<Vec<RawEntity>> {
        let content = match (&page.body, self.mode) {
            (PageBody::Html(document), SnapshotMode::Markup) => document.html(),
            (PageBody::Html(document), SnapshotMode::Text) => visible_text(document),
            (PageBody::Json(value), _) => value.to_string(),
        };
        Ok(vec![RawEntity::from([(CONTENT.to_string(), content)])])
    }

    fn key_and_enrich(&self, raw: RawEntity, search: &SearchSpec) -> Option<(String, EntityRecord)> {
        let mut record = EntityRecord::new(search.title.clone(), SearchRef::from(search));
        record.attrs = raw;
        Some((search.search_url.clone(), record))
    }

    fn next_page_url(&self, _page: &Page) -> Option<String> {
        None
    }

    fn format_entry(&self, _entity_link: &str, search_link: &str, _entity: &EntityRecord) -> String {
        format!("Content on {search_link} has changed since last check.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn page(html: &str) -> Page {
        Page::html(Url::parse("https://school.example.com/news").unwrap(), html)
    }

    fn search() -> SearchSpec {
        SearchSpec {
            search_url: "https://school.example.com/news".into(),
            display_url: "https://school.example.com/".into(),
            title: "School news".into(),
        }
    }

    #[test]
    fn text_mode_ignores_markup_and_scripts() {
        let extractor = SnapshotExtractor::text();
        let a = extractor
            .extract_entities(&page(
                "<html><body><p class='x'>Open  day</p><script>var t=1;</script></body></html>",
            ))
            .unwrap();
        let b = extractor
            .extract_entities(&page(
                "<html><body><div><p class='y'>Open day</p></div><script>var t=2;</script></body></html>",
            ))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0]["content"], "Open day");
    }

    #[test]
    fn markup_mode_sees_markup_changes() {
        let extractor = SnapshotExtractor::markup();
        let a = extractor
            .extract_entities(&page("<p class='x'>Open day</p>"))
            .unwrap();
        let b = extractor
            .extract_entities(&page("<p class='y'>Open day</p>"))
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn keyed_by_search_url_without_pagination() {
        let extractor = SnapshotExtractor::markup();
        let p = page("<p>hi</p>");
        let raw = extractor.extract_entities(&p).unwrap().remove(0);
        let (key, record) = extractor.key_and_enrich(raw, &search()).unwrap();

        assert_eq!(key, "https://school.example.com/news");
        assert_eq!(record.title, "School news");
        assert_eq!(record.search.visit_url, "https://school.example.com/");
        assert!(record.attrs["content"].contains("<p>hi</p>"));
        assert!(extractor.next_page_url(&p).is_none());
    }

    #[test]
    fn json_page_is_stringified() {
        let extractor = SnapshotExtractor::text();
        let p = Page::json(
            Url::parse("https://api.example.com/status").unwrap(),
            serde_json::json!({"open": true}),
        );
        let raw = extractor.extract_entities(&p).unwrap();
        assert_eq!(raw[0]["content"], r#"{"open":true}"#);
    }
}
