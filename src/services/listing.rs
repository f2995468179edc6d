// src/services/listing.rs

//! Result-listing extractors: many entities per page, keyed by their link
//! (HTML) or by an id field (JSON).

use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{
    EntityRecord, FieldSelector, JsonListingFields, ListingSelectors, RawEntity, SearchRef,
    SearchSpec, check_attr_name,
};
use crate::services::extractor::ElementExtractor;
use crate::services::fetcher::{Page, PageBody, PageKind};
use crate::utils::{normalize_whitespace, resolve_url};

const KEY: &str = "key";
const TITLE: &str = "title";
const HREF: &str = "href";

/// Compiled field selector.
struct Field {
    name: String,
    selector: Selector,
    attr: Option<String>,
}

/// HTML listing driven by CSS selectors.
pub struct ListingExtractor {
    item: Selector,
    title: Option<Selector>,
    link: Selector,
    attr_name: String,
    next_page: Option<Selector>,
    fields: Vec<Field>,
}

impl ListingExtractor {
    /// Compile the configured selectors.
    pub fn new(selectors: &ListingSelectors) -> Result<Self> {
        Ok(Self {
            item: parse_selector(&selectors.item_selector)?,
            title: selectors
                .title_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            link: parse_selector(&selectors.link_selector)?,
            attr_name: selectors.attr_name.clone(),
            next_page: selectors
                .next_page_selector
                .as_deref()
                .map(parse_selector)
                .transpose()?,
            fields: selectors
                .fields
                .iter()
                .map(|f: &FieldSelector| -> Result<Field> {
                    check_attr_name(&f.name)?;
                    Ok(Field {
                        name: f.name.clone(),
                        selector: parse_selector(&f.selector)?,
                        attr: f.attr.clone(),
                    })
                })
                .collect::<Result<_>>()?,
        })
    }

    fn parse_item(&self, item: &ElementRef, page: &Page) -> Option<RawEntity> {
        let link_elem = item.select(&self.link).next()?;
        let raw_link = link_elem.value().attr(&self.attr_name)?;
        let title_elem = self
            .title
            .as_ref()
            .and_then(|sel| item.select(sel).next())
            .unwrap_or(link_elem);

        let mut raw = RawEntity::new();
        raw.insert(HREF.into(), resolve_url(&page.url, raw_link));
        raw.insert(TITLE.into(), element_text(&title_elem));

        for field in &self.fields {
            let Some(elem) = item.select(&field.selector).next() else {
                continue;
            };
            let value = match &field.attr {
                Some(attr) => elem.value().attr(attr).map(str::to_string),
                None => Some(element_text(&elem)),
            };
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                raw.insert(field.name.clone(), value);
            }
        }
        Some(raw)
    }
}

impl ElementExtractor for ListingExtractor {
    fn extract_entities(&self, page: &Page) -> Result<Vec<RawEntity>> {
        let document = expect_html(page)?;
        Ok(document
            .select(&self.item)
            .filter_map(|item| self.parse_item(&item, page))
            .collect())
    }

    fn key_and_enrich(&self, raw: RawEntity, search: &SearchSpec) -> Option<(String, EntityRecord)> {
        enrich(raw, search, HREF)
    }

    fn next_page_url(&self, page: &Page) -> Option<String> {
        let selector = self.next_page.as_ref()?;
        let PageBody::Html(document) = &page.body else {
            return None;
        };
        let href = document
            .select(selector)
            .next()?
            .value()
            .attr(&self.attr_name)?;
        Some(resolve_url(&page.url, href))
    }

    fn format_entry(&self, entity_link: &str, search_link: &str, entity: &EntityRecord) -> String {
        format_listing_entry(entity_link, search_link, entity)
    }
}

/// JSON search API listing driven by JSON pointers.
pub struct JsonListingExtractor {
    fields: JsonListingFields,
}

impl JsonListingExtractor {
    pub fn new(fields: JsonListingFields) -> Result<Self> {
        for name in &fields.fields {
            check_attr_name(name)?;
        }
        Ok(Self { fields })
    }

    fn parse_item(&self, item: &serde_json::Value, page: &Page) -> Option<RawEntity> {
        let mut raw = RawEntity::new();
        raw.insert(KEY.into(), scalar(item.get(&self.fields.key_field)?)?);
        raw.insert(
            TITLE.into(),
            item.get(&self.fields.title_field)
                .and_then(scalar)
                .unwrap_or_default(),
        );
        if let Some(link) = self
            .fields
            .link_field
            .as_ref()
            .and_then(|f| item.get(f))
            .and_then(scalar)
        {
            raw.insert(HREF.into(), resolve_url(&page.url, &link));
        }
        for name in &self.fields.fields {
            if let Some(value) = item.get(name).and_then(scalar) {
                raw.insert(name.clone(), value);
            }
        }
        Some(raw)
    }
}

impl ElementExtractor for JsonListingExtractor {
    fn page_kind(&self) -> PageKind {
        PageKind::Json
    }

    fn extract_entities(&self, page: &Page) -> Result<Vec<RawEntity>> {
        let PageBody::Json(value) = &page.body else {
            return Err(AppError::config(format!(
                "{} did not return JSON",
                page.url
            )));
        };
        let Some(items) = value.pointer(&self.fields.items_pointer) else {
            return Ok(Vec::new());
        };
        let items = items.as_array().ok_or_else(|| {
            AppError::config(format!(
                "'{}' in {} is not an array",
                self.fields.items_pointer, page.url
            ))
        })?;
        Ok(items
            .iter()
            .filter_map(|item| self.parse_item(item, page))
            .collect())
    }

    fn key_and_enrich(&self, raw: RawEntity, search: &SearchSpec) -> Option<(String, EntityRecord)> {
        enrich(raw, search, KEY)
    }

    fn next_page_url(&self, page: &Page) -> Option<String> {
        let pointer = self.fields.next_pointer.as_ref()?;
        let PageBody::Json(value) = &page.body else {
            return None;
        };
        let next = value.pointer(pointer)?.as_str()?;
        (!next.is_empty()).then(|| resolve_url(&page.url, next))
    }

    fn format_entry(&self, entity_link: &str, search_link: &str, entity: &EntityRecord) -> String {
        format_listing_entry(entity_link, search_link, entity)
    }
}

/// Split the key attribute off and wrap the rest into a record. `KEY` is a
/// transport-only attribute and is never stored; `HREF` is kept.
fn enrich(mut raw: RawEntity, search: &SearchSpec, key_attr: &str) -> Option<(String, EntityRecord)> {
    let key = if key_attr == KEY {
        raw.remove(KEY)?
    } else {
        raw.get(key_attr)?.clone()
    };
    let title = raw.remove(TITLE).unwrap_or_default();
    let mut record = EntityRecord::new(title, SearchRef::from(search));
    record.attrs = raw;
    Some((key, record))
}

fn format_listing_entry(entity_link: &str, search_link: &str, entity: &EntityRecord) -> String {
    let mut entry = format!("{entity_link} ({search_link})");
    for (name, value) in entity.attrs.iter().filter(|(k, _)| k.as_str() != HREF) {
        entry.push_str(&format!("\n  {name}: {value}"));
    }
    entry
}

fn expect_html(page: &Page) -> Result<&Html> {
    match &page.body {
        PageBody::Html(document) => Ok(document),
        PageBody::Json(_) => Err(AppError::config(format!(
            "{} returned JSON to an HTML extractor",
            page.url
        ))),
    }
}

fn element_text(elem: &ElementRef) -> String {
    normalize_whitespace(&elem.text().collect::<String>())
}

fn scalar(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}
