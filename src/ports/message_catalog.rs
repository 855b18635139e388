//! Message catalog port - localized buyer-facing text.

/// Lookup of localized strings by language and key.
///
/// Missing translations fall back to the default language, then to the key
/// itself, so a lookup never fails.
pub trait MessageCatalog: Send + Sync {
    fn text(&self, language: &str, key: &str) -> String;
}
