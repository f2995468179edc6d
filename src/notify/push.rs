//! Pushover push notifications.

use std::fs;

use reqwest::blocking::Client;
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::models::PushoverConfig;
use crate::notify::PushNotifier;

const PUSHOVER_API: &str = "https://api.pushover.net/1/messages.json";

/// Pushover message length limit.
const MAX_MESSAGE_CHARS: usize = 1024;

/// Application token and user key.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushoverCredentials {
    pub token: String,
    pub user_key: String,
}

impl PushoverCredentials {
    /// Inline credentials win; otherwise read the secrets file.
    pub fn resolve(config: &PushoverConfig) -> Result<Self> {
        if let (Some(token), Some(user_key)) = (&config.token, &config.user_key) {
            return Ok(Self {
                token: token.clone(),
                user_key: user_key.clone(),
            });
        }
        let Some(path) = &config.secrets_file else {
            return Err(AppError::config("Pushover api token and user key required"));
        };
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            AppError::config(format!(
                "Invalid Pushover secrets file {}: {e}",
                path.display()
            ))
        })
    }
}

/// Posts HTML-formatted messages to the Pushover API.
pub struct PushoverNotifier {
    client: Client,
    credentials: PushoverCredentials,
}

impl PushoverNotifier {
    pub fn new(client: Client, credentials: PushoverCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }
}

impl PushNotifier for PushoverNotifier {
    fn push(&self, text: &str) -> Result<()> {
        let message: String = text.chars().take(MAX_MESSAGE_CHARS).collect();
        let response = self
            .client
            .post(PUSHOVER_API)
            .form(&[
                ("token", self.credentials.token.as_str()),
                ("user", self.credentials.user_key.as_str()),
                ("message", message.as_str()),
                ("html", "1"),
            ])
            .send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(AppError::push(format!("{status}: {body}")));
        }
        log::info!("Push notification sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn inline_credentials() {
        let config = PushoverConfig {
            token: Some("tok".into()),
            user_key: Some("usr".into()),
            secrets_file: None,
        };
        let creds = PushoverCredentials::resolve(&config).unwrap();
        assert_eq!(creds.token, "tok");
        assert_eq!(creds.user_key, "usr");
    }

    #[test]
    fn secrets_file_credentials() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("pushover.toml");
        fs::write(&path, "token = \"tok\"\nuser_key = \"usr\"\n").unwrap();
        let config = PushoverConfig {
            token: Some("only half".into()),
            user_key: None,
            secrets_file: Some(path),
        };
        let creds = PushoverCredentials::resolve(&config).unwrap();
        assert_eq!(creds.token, "tok");
    }

    #[test]
    fn missing_credentials_is_config_error() {
        let err = PushoverCredentials::resolve(&PushoverConfig::default()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
