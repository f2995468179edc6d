//! SMTP delivery over implicit TLS.

use std::env;
use std::fs;
use std::path::Path;

use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::error::{AppError, Result};
use crate::models::SmtpConfig;
use crate::notify::{MailMessage, Notifier};

/// Sends mail through an authenticated SMTP relay.
pub struct SmtpMailer {
    transport: SmtpTransport,
    sender: Mailbox,
}

impl SmtpMailer {
    /// Build a mailer. The sender defaults to `owner`, and also logs in.
    pub fn new(smtp: &SmtpConfig, owner: &str) -> Result<Self> {
        let sender = smtp.sender.as_deref().unwrap_or(owner);
        let password = smtp_password(smtp)?;
        let transport = SmtpTransport::relay(&smtp.server)?
            .credentials(Credentials::new(sender.to_string(), password))
            .build();

        Ok(Self {
            transport,
            sender: sender.parse()?,
        })
    }

    fn build(&self, message: &MailMessage) -> Result<Message> {
        let body = if message.html {
            SinglePart::html(html_body(&message.body))
        } else {
            SinglePart::plain(message.body.clone())
        };

        let mut parts = MultiPart::mixed().singlepart(body);
        for path in &message.attachments {
            parts = parts.singlepart(attachment(path)?);
        }

        Ok(Message::builder()
            .from(self.sender.clone())
            .to(message.recipient.parse()?)
            .subject(message.subject.as_str())
            .multipart(parts)?)
    }
}

impl Notifier for SmtpMailer {
    fn send(&self, message: &MailMessage) -> Result<()> {
        let email = self.build(message)?;
        self.transport.send(&email)?;
        log::info!("Sent '{}' to {}", message.subject, message.recipient);
        Ok(())
    }
}

/// Password from the configured file, else from the environment.
fn smtp_password(smtp: &SmtpConfig) -> Result<String> {
    if let Some(path) = &smtp.password_file {
        return Ok(fs::read_to_string(path)?.trim().to_string());
    }
    env::var(&smtp.password_env).map_err(|_| {
        AppError::config(format!(
            "SMTP password not found: set notify.smtp.password_file or ${}",
            smtp.password_env
        ))
    })
}

/// Line breaks survive HTML rendering.
fn html_body(body: &str) -> String {
    body.replace('\n', "<br>\n")
}

fn attachment(path: &Path) -> Result<SinglePart> {
    let content = fs::read(path)?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());
    Ok(Attachment::new(filename).body(content, ContentType::TEXT_PLAIN))
}
