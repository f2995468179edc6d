//! Owner notification channels.
//!
//! - `Notifier` / `SmtpMailer`: email, used for change reports and escalations
//! - `PushNotifier` / `PushoverNotifier`: push, change reports only

mod mail;
mod push;

use std::path::PathBuf;

use crate::error::Result;

pub use mail::SmtpMailer;
pub use push::{PushoverCredentials, PushoverNotifier};

/// One email to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    /// Send `body` as HTML instead of plain text
    pub html: bool,
    /// Files attached as-is
    pub attachments: Vec<PathBuf>,
}

/// Email delivery.
pub trait Notifier {
    fn send(&self, message: &MailMessage) -> Result<()>;
}

/// Push notification delivery.
pub trait PushNotifier {
    fn push(&self, text: &str) -> Result<()>;
}
