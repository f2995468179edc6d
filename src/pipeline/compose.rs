// src/pipeline/compose.rs

//! Human-readable notification text for change reports and error escalations.

use std::path::Path;

use crate::models::{EntityRecord, SearchSpec};
use crate::notify::MailMessage;
use crate::pipeline::escalation::EscalationNotice;
use crate::services::ElementExtractor;

/// A composed change report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
    /// Identifying link of every changed entity, for the history archive
    pub links: Vec<String>,
}

/// Formats diff results for the owner.
#[derive(Debug, Clone)]
pub struct NotificationComposer {
    site: String,
    max_entries: usize,
    html: bool,
}

impl NotificationComposer {
    pub fn new(site: impl Into<String>, max_entries: usize, html: bool) -> Self {
        Self {
            site: site.into(),
            max_entries,
            html,
        }
    }

    pub fn is_html(&self) -> bool {
        self.html
    }

    fn link(&self, url: &str, text: &str) -> String {
        if self.html {
            format!("<a href=\"{}\">{}</a>", escape_html(url), escape_html(text))
        } else {
            format!("{text} ({url})")
        }
    }

    /// Compose the report for `changed` entities, listing every configured search.
    pub fn compose(
        &self,
        changed: &[EntityRecord],
        searches: &[SearchSpec],
        extractor: &dyn ElementExtractor,
    ) -> Notification {
        let mut body = format!(
            "{} new result(s) on your {} search.\n\n",
            changed.len(),
            self.site
        );

        for entity in changed.iter().take(self.max_entries) {
            let entity_link = self.link(entity.link(), &entity.title);
            let search_link = self.link(
                &entity.search.visit_url,
                &format!("search: '{}'", entity.search.name),
            );
            let escaped;
            let shown = if self.html {
                escaped = escape_attrs(entity);
                &escaped
            } else {
                entity
            };
            body.push_str(&format!(
                "\n{}\n",
                extractor.format_entry(&entity_link, &search_link, shown)
            ));
        }
        if changed.len() > self.max_entries {
            body.push_str(&format!(
                "\n... and {} more.\n",
                changed.len() - self.max_entries
            ));
        }

        body.push_str("\n\nSearch links:\n");
        for search in searches {
            body.push_str(&self.link(&search.display_url, &format!("'{}'", search.title)));
            body.push('\n');
        }
        body.push_str(&format!("\nBest regards,\nthe {} bot", self.site));

        Notification {
            subject: format!("New results for your {} search", self.site),
            body,
            links: changed.iter().map(|e| e.link().to_string()).collect(),
        }
    }

    /// Compose the error email for an escalation, attaching the log if present.
    pub fn escalation(
        &self,
        recipient: &str,
        notice: &EscalationNotice,
        log_file: Option<&Path>,
    ) -> MailMessage {
        MailMessage {
            recipient: recipient.to_string(),
            subject: format!("Error while running the {} scraper", self.site),
            body: notice.body(),
            html: false,
            attachments: log_file
                .filter(|path| path.is_file())
                .map(Path::to_path_buf)
                .into_iter()
                .collect(),
        }
    }
}

/// Escape text for use inside HTML element content or a quoted attribute.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Copy of `entity` with every attribute value escaped for HTML bodies.
fn escape_attrs(entity: &EntityRecord) -> EntityRecord {
    let mut shown = entity.clone();
    for value in shown.attrs.values_mut() {
        *value = escape_html(value);
    }
    shown
}
