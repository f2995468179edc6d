//! Page retrieval.
//!
//! A [`PageFetcher`] turns a URL into a [`Page`]; [`HttpSession`] is the
//! network implementation, built once per invocation and dropped with it.

use reqwest::blocking::Client;
use scraper::Html;
use url::Url;

use crate::error::Result;
use crate::models::HttpConfig;
use crate::utils::http::create_client;

/// What a fetcher should parse the response body as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Html,
    Json,
}

/// Parsed response body.
#[derive(Debug)]
pub enum PageBody {
    Html(Html),
    Json(serde_json::Value),
}

/// A fetched page together with the URL it was fetched from.
#[derive(Debug)]
pub struct Page {
    pub url: Url,
    pub body: PageBody,
}

impl Page {
    pub fn html(url: Url, html: &str) -> Self {
        Self {
            url,
            body: PageBody::Html(Html::parse_document(html)),
        }
    }

    pub fn json(url: Url, value: serde_json::Value) -> Self {
        Self {
            url,
            body: PageBody::Json(value),
        }
    }
}

/// Retrieves pages. Transport errors propagate; nothing is retried.
pub trait PageFetcher {
    fn fetch(&self, url: &str, kind: PageKind) -> Result<Page>;
}

/// HTTP session scoped to a single run. Cookies set by one page are sent
/// with the next.
pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Ok(Self {
            client: create_client(config)?,
        })
    }

    /// The underlying client, for other requests sharing this session.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl PageFetcher for HttpSession {
    fn fetch(&self, url: &str, kind: PageKind) -> Result<Page> {
        log::info!("Processing page: {url}");
        let response = self.client.get(url).send()?.error_for_status()?;
        let final_url = response.url().clone();
        let page = match kind {
            PageKind::Html => Page::html(final_url, &response.text()?),
            PageKind::Json => Page::json(final_url, response.json()?),
        };
        Ok(page)
    }
}
