//! Chat bot configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::{require_http_url, ValidationError};

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token; also authorizes in-chat invoices
    pub token: SecretString,

    /// Public link to the bot, used as the return URL after paying
    pub bot_url: String,

    #[serde(default = "default_language")]
    pub default_language: String,

    /// Directory of `<language>.json|yaml` files; built-in text when unset
    pub translations_dir: Option<String>,
}

impl TelegramConfig {
    /// Validate chat bot configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("TELEGRAM__TOKEN"));
        }
        require_http_url(&self.bot_url, "TELEGRAM__BOT_URL")
    }
}

fn default_language() -> String {
    "en".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_url_is_required() {
        let config = TelegramConfig {
            token: SecretString::new("1:abc".to_string()),
            bot_url: String::new(),
            default_language: default_language(),
            translations_dir: None,
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MissingRequired("TELEGRAM__BOT_URL"))
        );
    }
}
