//! Loads `<language>.json` / `<language>.yaml` translation files from one
//! directory.
//!
//! Lookup falls back from the requested language to the default language,
//! then to built-in English text, and finally to the key itself, so a
//! missing translation never blocks a notification.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::application::messages;
use crate::ports::MessageCatalog;

type Messages = HashMap<String, String>;

static BUILT_IN: Lazy<Messages> = Lazy::new(|| {
    [
        (
            messages::SUBSCRIPTION_ACTIVATED,
            "Your VPN subscription is active. Tap the button below to connect.",
        ),
        (messages::CONNECT_BUTTON, "Connect"),
        (
            messages::SUBSCRIPTION_EXPIRING,
            "Your VPN subscription expires on {date}. Renew now to stay connected.",
        ),
        (messages::RENEW_SUBSCRIPTION_BUTTON, "Renew subscription"),
        (
            messages::REFERRAL_BONUS_GRANTED,
            "A friend you invited just subscribed. You got {days} extra days!",
        ),
        (messages::INVOICE_TITLE, "VPN subscription"),
        (messages::INVOICE_DESCRIPTION, "VPN subscription payment"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
});

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("cannot read translations from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid translation file {path}: {message}")]
    Parse { path: PathBuf, message: String },
}

/// Message catalog loaded once at startup.
#[derive(Debug, Clone)]
pub struct FileMessageCatalog {
    default_language: String,
    languages: HashMap<String, Messages>,
}

impl FileMessageCatalog {
    /// Catalog with only the built-in English text.
    pub fn built_in(default_language: impl Into<String>) -> Self {
        Self {
            default_language: default_language.into(),
            languages: HashMap::new(),
        }
    }

    /// Loads every translation file in `dir`.
    ///
    /// Files with other extensions are skipped. When a language has both a
    /// JSON and a YAML file, the later one in directory order wins per key.
    pub fn load(
        dir: impl AsRef<Path>,
        default_language: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut catalog = Self::built_in(default_language);
        for entry in entries {
            let path = entry
                .map_err(|source| CatalogError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?
                .path();

            let (Some(language), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };

            let parsed = match ext {
                "json" => parse_file(&path, |s| {
                    serde_json::from_str::<Messages>(s).map_err(|e| e.to_string())
                })?,
                "yaml" | "yml" => parse_file(&path, |s| {
                    serde_yaml::from_str::<Messages>(s).map_err(|e| e.to_string())
                })?,
                _ => continue,
            };

            tracing::debug!(language, keys = parsed.len(), "Loaded translations");
            catalog
                .languages
                .entry(language.to_string())
                .or_default()
                .extend(parsed);
        }

        tracing::info!(
            languages = catalog.languages.len(),
            default = %catalog.default_language,
            "Message catalog ready"
        );
        Ok(catalog)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.languages.contains_key(language)
    }

    fn lookup(&self, language: &str, key: &str) -> Option<&str> {
        self.languages
            .get(language)
            .and_then(|m| m.get(key))
            .map(String::as_str)
    }
}

fn parse_file(
    path: &Path,
    parse: impl Fn(&str) -> Result<Messages, String>,
) -> Result<Messages, CatalogError> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&content).map_err(|message| CatalogError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

impl MessageCatalog for FileMessageCatalog {
    fn text(&self, language: &str, key: &str) -> String {
        self.lookup(language, key)
            .or_else(|| self.lookup(&self.default_language, key))
            .or_else(|| BUILT_IN.get(key).map(String::as_str))
            .unwrap_or(key)
            .to_string()
    }
}
