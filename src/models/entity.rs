//! Observed entity records.

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::SearchSpec;

/// Attributes pulled off a page before the extractor keys them.
pub type RawEntity = BTreeMap<String, String>;

/// Keyed entities in merge order. This is the snapshot format on disk.
pub type EntityMap = IndexMap<String, EntityRecord>;

/// Names taken by the record itself or by extractor bookkeeping. An extra
/// attribute with one of these names would collide when `attrs` is flattened.
pub const RESERVED_ATTRS: &[&str] = &["title", "search", "href", "key"];

/// Reject a configured attribute name that would collide with a record field.
pub fn check_attr_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::config("extra field name is empty"));
    }
    if RESERVED_ATTRS.contains(&name) {
        return Err(AppError::config(format!(
            "extra field name '{name}' is reserved (reserved: {})",
            RESERVED_ATTRS.join(", ")
        )));
    }
    Ok(())
}

/// The search an entity was found through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchRef {
    /// Search title as configured
    pub name: String,

    /// Link shown to the owner
    pub visit_url: String,

    /// Link that was actually fetched
    pub search_url: String,
}

impl From<&SearchSpec> for SearchRef {
    fn from(search: &SearchSpec) -> Self {
        Self {
            name: search.title.clone(),
            visit_url: search.display_url.clone(),
            search_url: search.search_url.clone(),
        }
    }
}

/// One observed item: an ad, a page snapshot, a block of text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityRecord {
    pub title: String,

    pub search: SearchRef,

    /// Variant-specific attributes (`href`, `content`, extra listing fields)
    #[serde(flatten)]
    pub attrs: BTreeMap<String, String>,
}

impl EntityRecord {
    pub fn new(title: impl Into<String>, search: SearchRef) -> Self {
        Self {
            title: title.into(),
            search,
            attrs: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn href(&self) -> Option<&str> {
        self.attrs.get("href").map(String::as_str)
    }

    /// Link that identifies this entity to a human: its own `href`, or the
    /// page it was seen on.
    pub fn link(&self) -> &str {
        self.href().unwrap_or(&self.search.visit_url)
    }
}
