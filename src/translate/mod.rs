//! Translation cache and batch service.
//!
//! [`TranslationService`] talks to the remote translation endpoints
//! directly (not through the dispatch interceptor) and keeps its own
//! bounded caches and single-flight registries:
//!
//! | Operation | Endpoint | Cache key | On failure |
//! |---|---|---|---|
//! | `translate` | `POST /translate` | `source\|target\|trimmed` | error to every attached caller |
//! | `translate_multiple` | `POST /translate-batch` | per text, as above | original text per slot |
//! | `translate_ui` | `POST /translate-ui` | target | source dictionary |
//! | `detect_language` | `POST /detect-language` | raw text | default language |

mod service;

pub use service::TranslationService;
pub(crate) use service::WeakTranslationService;

use std::collections::BTreeMap;

use crate::cache::CacheConfig;

/// Flat label → text map used for UI translation.
pub type Dictionary = BTreeMap<String, String>;

/// Translation service configuration.
#[derive(Debug, Clone)]
pub struct TranslationConfig {
    /// Source language when the caller gives none. Default: `ko`.
    pub default_source: String,
    /// Returned by language detection for short input or on failure.
    /// Default: `ko`.
    pub default_language: String,
    /// Accepted target languages.
    pub supported_languages: Vec<String>,
    /// Input shorter than this (in characters) is not sent for detection.
    /// Default: 3.
    pub min_detect_length: usize,
    /// Sent as `type` with text translation requests. Default: `general`.
    pub content_type: String,
    /// Shared by the text, UI and detection caches.
    pub cache: CacheConfig,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            default_source: "ko".to_string(),
            default_language: "ko".to_string(),
            supported_languages: ["ko", "en", "ja", "zh", "es", "fr", "de", "vi"]
                .into_iter()
                .map(String::from)
                .collect(),
            min_detect_length: 3,
            content_type: "general".to_string(),
            cache: CacheConfig::default(),
        }
    }
}

impl TranslationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn default_source(mut self, lang: impl Into<String>) -> Self {
        self.default_source = lang.into();
        self
    }

    pub fn default_language(mut self, lang: impl Into<String>) -> Self {
        self.default_language = lang.into();
        self
    }

    pub fn supported_languages<I, S>(mut self, langs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_languages = langs.into_iter().map(Into::into).collect();
        self
    }

    pub fn min_detect_length(mut self, n: usize) -> Self {
        self.min_detect_length = n;
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    pub fn is_supported(&self, lang: &str) -> bool {
        self.supported_languages.iter().any(|l| l == lang)
    }
}

/// Cache occupancy, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub texts: usize,
    pub dictionaries: usize,
    pub detections: usize,
    /// Capacity of each cache.
    pub capacity: usize,
    /// Requests currently in flight across all registries.
    pub pending: usize,
}
