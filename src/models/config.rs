//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::check_attr_name;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Monitored site and how to read it
    #[serde(default)]
    pub site: SiteConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// HTTP session settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Owner notification settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Failure escalation backoff
    #[serde(default)]
    pub escalation: EscalationConfig,

    /// Old file removal
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.site.name.trim().is_empty() {
            return Err(AppError::config("site.name is empty"));
        }
        if self.site.effective_max_pages() == 0 {
            return Err(AppError::config("site.max_pages must be > 0"));
        }
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::config("http.user_agent is empty"));
        }
        if self.escalation.schedule.is_empty() {
            return Err(AppError::config("escalation.schedule is empty"));
        }
        if self
            .escalation
            .schedule
            .windows(2)
            .any(|pair| pair[0] > pair[1])
        {
            return Err(AppError::config(
                "escalation.schedule must be non-decreasing",
            ));
        }
        if self.notify.email_notifications && self.notify.email.trim().is_empty() {
            return Err(AppError::config(
                "notify.email is required when email notifications are on",
            ));
        }
        if self.site.kind == ExtractorKind::Listing {
            let listing = &self.site.listing;
            if listing.item_selector.trim().is_empty() || listing.link_selector.trim().is_empty() {
                return Err(AppError::config(
                    "site.listing needs item_selector and link_selector",
                ));
            }
        }
        if self.site.kind == ExtractorKind::JsonListing
            && self.site.json_listing.key_field.trim().is_empty()
        {
            return Err(AppError::config("site.json_listing.key_field is empty"));
        }
        for field in &self.site.listing.fields {
            check_attr_name(&field.name)?;
        }
        for name in &self.site.json_listing.fields {
            check_attr_name(name)?;
        }
        Ok(())
    }
}

/// Which extraction strategy a site uses.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Many entities per HTML page, selected with CSS
    #[default]
    Listing,
    /// Many entities per JSON document, selected with JSON pointers
    JsonListing,
    /// Whole page markup is one entity
    SiteSnapshot,
    /// Visible page text is one entity
    TextSnapshot,
}

impl ExtractorKind {
    pub fn is_snapshot(self) -> bool {
        matches!(self, Self::SiteSnapshot | Self::TextSnapshot)
    }
}

/// The monitored site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Site name used in subjects and sign-offs
    #[serde(default = "defaults::site_name")]
    pub name: String,

    #[serde(default)]
    pub kind: ExtractorKind,

    /// Report entities whose content changed, not only new keys. On unless
    /// set to false.
    #[serde(default)]
    pub include_changes: Option<bool>,

    /// Page ceiling per search. Unset means 1 for snapshot kinds.
    #[serde(default)]
    pub max_pages: Option<usize>,

    #[serde(default)]
    pub listing: ListingSelectors,

    #[serde(default)]
    pub json_listing: JsonListingFields,
}

impl SiteConfig {
    pub fn effective_max_pages(&self) -> usize {
        self.max_pages.unwrap_or(if self.kind.is_snapshot() {
            1
        } else {
            defaults::max_pages()
        })
    }

    pub fn effective_include_changes(&self) -> bool {
        self.include_changes.unwrap_or(true)
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: defaults::site_name(),
            kind: ExtractorKind::default(),
            include_changes: None,
            max_pages: None,
            listing: ListingSelectors::default(),
            json_listing: JsonListingFields::default(),
        }
    }
}

/// CSS selectors for an HTML result listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingSelectors {
    /// Selector for each result item
    #[serde(default = "defaults::item_selector")]
    pub item_selector: String,

    /// Selector for the title element within an item (defaults to the link)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_selector: Option<String>,

    /// Selector for the link element within an item
    #[serde(default = "defaults::link_selector")]
    pub link_selector: String,

    /// HTML attribute holding the link (usually "href")
    #[serde(default = "defaults::attr_name")]
    pub attr_name: String,

    /// Selector for the next-page link, searched in the whole document
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_selector: Option<String>,

    /// Extra named attributes recorded per item
    #[serde(default)]
    pub fields: Vec<FieldSelector>,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            item_selector: defaults::item_selector(),
            title_selector: None,
            link_selector: defaults::link_selector(),
            attr_name: defaults::attr_name(),
            next_page_selector: None,
            fields: Vec::new(),
        }
    }
}

/// A named value extracted from a listing item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSelector {
    pub name: String,

    pub selector: String,

    /// Attribute to read instead of the element text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr: Option<String>,
}

/// JSON pointers (RFC 6901) for a JSON search API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonListingFields {
    /// Pointer to the array of result items
    #[serde(default = "defaults::items_pointer")]
    pub items_pointer: String,

    /// Item field used as entity key
    #[serde(default = "defaults::key_field")]
    pub key_field: String,

    #[serde(default = "defaults::title_field")]
    pub title_field: String,

    /// Item field holding the entity link, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_field: Option<String>,

    /// Pointer to the next page URL in the document, if the API paginates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_pointer: Option<String>,

    /// Extra item fields recorded as attributes
    #[serde(default)]
    pub fields: Vec<String>,
}

impl Default for JsonListingFields {
    fn default() -> Self {
        Self {
            items_pointer: defaults::items_pointer(),
            key_field: defaults::key_field(),
            title_field: defaults::title_field(),
            link_field: None,
            next_pointer: None,
            fields: Vec::new(),
        }
    }
}

/// File locations, relative to the working directory unless absolute.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "defaults::searches_file")]
    pub searches_file: PathBuf,

    /// Last observed entity map
    #[serde(default = "defaults::snapshot_file")]
    pub snapshot_file: PathBuf,

    /// Append-only log of reported links
    #[serde(default = "defaults::history_file")]
    pub history_file: PathBuf,

    /// Failure/notification ledger
    #[serde(default = "defaults::ledger_file")]
    pub ledger_file: PathBuf,

    /// Log file, attached to error emails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            searches_file: defaults::searches_file(),
            snapshot_file: defaults::snapshot_file(),
            history_file: defaults::history_file(),
            ledger_file: defaults::ledger_file(),
            log_file: None,
        }
    }
}

/// HTTP session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    #[serde(default = "defaults::accept_language")]
    pub accept_language: String,

    /// Request timeout in seconds; 0 keeps the client default
    #[serde(default)]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            accept_language: defaults::accept_language(),
            timeout_secs: 0,
        }
    }
}

/// Owner notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Owner address for results and error escalations
    #[serde(default)]
    pub email: String,

    #[serde(default = "defaults::enabled")]
    pub email_notifications: bool,

    /// Send HTML mail bodies
    #[serde(default = "defaults::enabled")]
    pub email_html: bool,

    /// Entities spelled out per notification; the rest are counted
    #[serde(default = "defaults::max_notif_entries")]
    pub max_notif_entries: usize,

    #[serde(default)]
    pub push_notifications: bool,

    #[serde(default)]
    pub smtp: SmtpConfig,

    #[serde(default)]
    pub pushover: PushoverConfig,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            email_notifications: defaults::enabled(),
            email_html: defaults::enabled(),
            max_notif_entries: defaults::max_notif_entries(),
            push_notifications: false,
            smtp: SmtpConfig::default(),
            pushover: PushoverConfig::default(),
        }
    }
}

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    #[serde(default = "defaults::smtp_server")]
    pub server: String,

    /// Sender address, also the login user; defaults to the owner address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,

    /// File holding the SMTP password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_file: Option<PathBuf>,

    /// Environment variable holding the SMTP password
    #[serde(default = "defaults::password_env")]
    pub password_env: String,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            server: defaults::smtp_server(),
            sender: None,
            password_file: None,
            password_env: defaults::password_env(),
        }
    }
}

/// Pushover credentials, inline or in a secrets file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PushoverConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<String>,

    /// TOML file with `token` and `user_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secrets_file: Option<PathBuf>,
}

/// Failure escalation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscalationConfig {
    /// Day thresholds between consecutive error emails
    #[serde(default = "defaults::schedule")]
    pub schedule: Vec<u32>,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            schedule: defaults::schedule(),
        }
    }
}

/// Old file removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Directory to prune; unset disables pruning after a run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default = "defaults::max_age_days")]
    pub max_age_days: u64,

    /// Only delete files whose name matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            dir: None,
            max_age_days: defaults::max_age_days(),
            pattern: None,
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn site_name() -> String {
        "pagewatch".into()
    }
    pub fn max_pages() -> usize {
        15
    }
    pub fn enabled() -> bool {
        true
    }

    // Listing defaults
    pub fn item_selector() -> String {
        "article".into()
    }
    pub fn link_selector() -> String {
        "a".into()
    }
    pub fn attr_name() -> String {
        "href".into()
    }

    // JSON listing defaults
    pub fn items_pointer() -> String {
        "/docs".into()
    }
    pub fn key_field() -> String {
        "id".into()
    }
    pub fn title_field() -> String {
        "heading".into()
    }

    // Path defaults
    pub fn searches_file() -> PathBuf {
        "input/searches.toml".into()
    }
    pub fn snapshot_file() -> PathBuf {
        "data/elements.json".into()
    }
    pub fn history_file() -> PathBuf {
        "logs/history.txt".into()
    }
    pub fn ledger_file() -> PathBuf {
        "data/error_email.json".into()
    }

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36".into()
    }
    pub fn accept_language() -> String {
        "nb,no;q=0.9,en;q=0.8".into()
    }

    // Notify defaults
    pub fn max_notif_entries() -> usize {
        4
    }
    pub fn smtp_server() -> String {
        "smtp.gmail.com".into()
    }
    pub fn password_env() -> String {
        "PAGEWATCH_SMTP_PASSWORD".into()
    }

    pub fn schedule() -> Vec<u32> {
        vec![0, 1, 2, 4, 7, 15]
    }

    pub fn max_age_days() -> u64 {
        30
    }
}
