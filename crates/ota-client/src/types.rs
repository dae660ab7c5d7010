//! Manifest and payload types for the OTA client

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata document describing a published distribution.
///
/// Fetched from `{base}/{hash}/manifest.json` and immutable once published;
/// the client caches it until the manifest cache is disabled or the client
/// is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Unix timestamp of the last publish
    pub timestamp: i64,
    /// Exported file paths, each starting with `/`, in export order
    pub files: Vec<String>,
    /// Language codes the distribution carries translations for
    pub languages: Vec<String>,
    /// Per-locale placeholder overrides (locale -> placeholder -> value)
    #[serde(default)]
    pub language_mapping: HashMap<String, HashMap<String, String>>,
    /// Custom language definitions keyed by language code
    #[serde(default)]
    pub custom_languages: HashMap<String, serde_json::Value>,
}

/// Content of one translation file in one language.
///
/// The variant is chosen by the response `Content-Type`: `application/json`
/// bodies are decoded, everything else is kept as raw text.
#[derive(Debug, Clone, PartialEq)]
pub enum TranslationContent {
    Json(serde_json::Value),
    Text(String),
}

impl TranslationContent {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Text(text) => Some(text),
        }
    }
}

/// A fetched translation paired with the file it belongs to.
///
/// `content` is `None` when the file has no translation for the requested
/// language (or the fetch failed); batch operations degrade to partial data
/// instead of failing wholesale.
#[derive(Debug, Clone, PartialEq)]
pub struct FileTranslation {
    pub file: String,
    pub content: Option<TranslationContent>,
}

/// Details of one distribution language.
///
/// Returned by [`OtaClient::languages`](crate::OtaClient::languages), which
/// is not implemented yet and always resolves to an empty list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Client configuration, supplied once at construction.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Refetch the manifest on every access instead of caching it
    pub disable_manifest_cache: bool,
    /// Refetch translations on every access, bypassing the per-file,
    /// per-language cache
    pub disable_strings_cache: bool,
    /// Merge multi-file JSON by overwriting top-level keys instead of
    /// combining nested objects recursively
    pub disable_json_deep_merge: bool,
    /// Default language code, overriding environment detection
    pub language_code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_default_to_caching_enabled() {
        let options = ClientOptions::default();
        assert!(!options.disable_manifest_cache);
        assert!(!options.disable_strings_cache);
        assert!(!options.disable_json_deep_merge);
        assert!(options.language_code.is_none());
    }

    #[test]
    fn test_manifest_optional_fields_default() {
        let manifest: Manifest = serde_json::from_str(
            r#"{"timestamp": 1700000000, "files": ["/main.json"], "languages": ["en"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.timestamp, 1700000000);
        assert!(manifest.language_mapping.is_empty());
        assert!(manifest.custom_languages.is_empty());
    }

    #[test]
    fn test_translation_content_accessors() {
        let json = TranslationContent::Json(serde_json::json!({"k": "v"}));
        assert!(json.as_json().is_some());
        assert!(json.as_text().is_none());

        let text = TranslationContent::Text("hello".to_string());
        assert_eq!(text.as_text(), Some("hello"));
        assert!(text.as_json().is_none());
    }
}
