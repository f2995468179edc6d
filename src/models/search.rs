//! Search definitions loaded from the searches file.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::is_valid_url;

/// One configured search. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchSpec {
    /// URL that is fetched
    pub search_url: String,

    /// URL linked in notifications
    pub display_url: String,

    /// Human-readable name
    pub title: String,
}

/// On-disk form; `display_url` is optional there.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    search_url: String,
    #[serde(default)]
    display_url: Option<String>,
    title: String,
}

#[derive(Debug, Deserialize)]
struct SearchFile {
    #[serde(default)]
    searches: Vec<SearchEntry>,
}

impl SearchSpec {
    /// Load and validate the ordered search list.
    ///
    /// Fails with a configuration error when the file is missing, lists no
    /// searches, or contains a URL without scheme and host.
    pub fn load_all(path: impl AsRef<Path>) -> Result<Vec<Self>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AppError::config(format!(
                "Input file '{}' does not exist",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
            .map_err(|e| AppError::config(format!("{}: {e}", path.display())))
    }

    /// Parse searches from TOML text.
    pub fn parse(content: &str) -> Result<Vec<Self>> {
        let file: SearchFile = toml::from_str(content)?;
        if file.searches.is_empty() {
            return Err(AppError::config("Please add at least one search"));
        }

        file.searches
            .into_iter()
            .map(|entry| {
                let display_url = entry
                    .display_url
                    .unwrap_or_else(|| entry.search_url.clone());
                if !is_valid_url(&entry.search_url) || !is_valid_url(&display_url) {
                    return Err(AppError::config(format!(
                        "Invalid URL(s) found: {}, {}",
                        entry.search_url, display_url
                    )));
                }
                Ok(Self {
                    search_url: entry.search_url,
                    display_url,
                    title: entry.title,
                })
            })
            .collect()
    }
}
