// src/models/mod.rs

//! Domain models for the watcher.

mod config;
mod entity;
mod search;

// Re-export all public types
pub use config::{
    Config, EscalationConfig, ExtractorKind, FieldSelector, HttpConfig, JsonListingFields,
    ListingSelectors, NotifyConfig, PathsConfig, PushoverConfig, RetentionConfig, SiteConfig,
    SmtpConfig,
};
pub use entity::{EntityMap, EntityRecord, RESERVED_ATTRS, RawEntity, SearchRef, check_attr_name};
pub use search::SearchSpec;
