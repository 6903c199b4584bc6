use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use super::{CacheStats, Dictionary, TranslationConfig};
use crate::cache::FifoCache;
use crate::flight::SingleFlight;
use crate::http::{HttpClient, HttpRequest};
use crate::{HermodError, Result};

fn cache_key(source: &str, target: &str, normalized: &str) -> String {
    format!("{source}|{target}|{normalized}")
}

fn string_field(data: &Value, field: &str) -> Result<String> {
    data.get(field)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| HermodError::Json(format!("response is missing `{field}`")))
}

struct ServiceInner {
    client: Arc<dyn HttpClient>,
    config: TranslationConfig,
    texts: FifoCache<String, String>,
    dictionaries: FifoCache<String, Dictionary>,
    detections: FifoCache<String, String>,
    text_flights: SingleFlight<String, String>,
    ui_flights: SingleFlight<String, Dictionary>,
    detect_flights: SingleFlight<String, String>,
    sweeper: Mutex<Option<AbortHandle>>,
}

impl ServiceInner {
    async fn post(&self, path: &str, body: Value) -> Result<Value> {
        let response = self.client.send(HttpRequest::post(path, body)).await?;
        Ok(response.data)
    }

    fn sweep(&self) -> usize {
        self.texts.sweep_expired()
            + self.dictionaries.sweep_expired()
            + self.detections.sweep_expired()
            + self.text_flights.sweep_expired()
            + self.ui_flights.sweep_expired()
            + self.detect_flights.sweep_expired()
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cached, coalescing client for the translation endpoints.
///
/// Cheap to clone; clones share caches and registries.
#[derive(Clone)]
pub struct TranslationService {
    inner: Arc<ServiceInner>,
}

impl TranslationService {
    pub fn new(client: Arc<dyn HttpClient>, config: TranslationConfig) -> Self {
        let cache = &config.cache;
        Self {
            inner: Arc::new(ServiceInner {
                client,
                texts: FifoCache::new("translation", cache),
                dictionaries: FifoCache::new("translation_ui", cache),
                detections: FifoCache::new("detection", cache),
                text_flights: SingleFlight::new("translate"),
                ui_flights: SingleFlight::new("translate_ui"),
                detect_flights: SingleFlight::new("detect_language"),
                sweeper: Mutex::new(None),
                config,
            }),
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.inner.config
    }

    pub fn supported_languages(&self) -> &[String] {
        &self.inner.config.supported_languages
    }

    /// Translate one text.
    ///
    /// Returns `text` unchanged, without a network call, when it is blank or
    /// when source and target are the same language. Concurrent calls for
    /// the same `(source, target, trimmed text)` share one request; failures
    /// reach every attached caller and are never cached.
    #[instrument(skip(self, text), fields(len = text.len()))]
    pub async fn translate(
        &self,
        text: &str,
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Result<String> {
        let inner = &self.inner;
        let source = source_lang.unwrap_or(inner.config.default_source.as_str());
        let normalized = text.trim();
        if normalized.is_empty() || source == target_lang {
            return Ok(text.to_owned());
        }
        if !inner.config.is_supported(target_lang) {
            return Err(HermodError::UnsupportedLanguage(target_lang.to_owned()));
        }

        let key = cache_key(source, target_lang, normalized);
        if let Some(hit) = inner.texts.get(&key) {
            return Ok(hit);
        }

        let body = json!({
            "text": normalized,
            "source": source,
            "target": target_lang,
            "type": inner.config.content_type,
        });
        let task_inner = Arc::clone(inner);
        let task_key = key.clone();
        inner
            .text_flights
            .run(key, move || async move {
                let data = task_inner.post("/translate", body).await?;
                let translated = string_field(&data, "translatedText")?;
                task_inner.texts.insert(task_key, translated.clone());
                Ok::<_, HermodError>(translated)
            })
            .await
    }

    /// Translate many texts with at most one batched request.
    ///
    /// Cached texts resolve locally; the rest are de-duplicated by trimmed
    /// text and sent together. Any slot the batch does not resolve (request
    /// failure, short response, non-string entry) keeps its original text.
    /// Never fails; an unsupported target degrades to the originals.
    pub async fn translate_multiple<S: AsRef<str>>(
        &self,
        texts: &[S],
        target_lang: &str,
        source_lang: Option<&str>,
    ) -> Vec<String> {
        let inner = &self.inner;
        let source = source_lang.unwrap_or(inner.config.default_source.as_str());
        let originals: Vec<String> = texts.iter().map(|t| t.as_ref().to_owned()).collect();
        if source == target_lang {
            return originals;
        }
        if !inner.config.is_supported(target_lang) {
            warn!(lang = target_lang, "unsupported target language, keeping originals");
            return originals;
        }

        let mut resolved: Vec<Option<String>> = vec![None; originals.len()];
        let mut pending: Vec<String> = Vec::new();
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, text) in originals.iter().enumerate() {
            let normalized = text.trim();
            if normalized.is_empty() {
                resolved[i] = Some(text.clone());
                continue;
            }
            if let Some(hit) = inner.texts.get(&cache_key(source, target_lang, normalized)) {
                resolved[i] = Some(hit);
                continue;
            }
            positions
                .entry(normalized.to_owned())
                .or_insert_with(|| {
                    pending.push(normalized.to_owned());
                    Vec::new()
                })
                .push(i);
        }

        if !pending.is_empty() {
            debug!(
                total = originals.len(),
                uncached = pending.len(),
                "translating batch"
            );
            let body = json!({
                "texts": &pending,
                "source": source,
                "target": target_lang,
                "type": inner.config.content_type,
            });
            match inner.post("/translate-batch", body).await {
                Ok(data) => {
                    let translated = data
                        .get("translatedTexts")
                        .and_then(Value::as_array)
                        .map(Vec::as_slice)
                        .unwrap_or_default();
                    if translated.len() < pending.len() {
                        warn!(
                            requested = pending.len(),
                            received = translated.len(),
                            "partial batch translation"
                        );
                    }
                    for (text, value) in pending.iter().zip(translated) {
                        let Some(result) = value.as_str() else {
                            continue;
                        };
                        inner
                            .texts
                            .insert(cache_key(source, target_lang, text), result.to_owned());
                        if let Some(indices) = positions.get(text) {
                            for &i in indices {
                                resolved[i] = Some(result.to_owned());
                            }
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, count = pending.len(), "batch translation failed, keeping originals");
                }
            }
        }

        resolved
            .into_iter()
            .zip(originals)
            .map(|(r, original)| r.unwrap_or(original))
            .collect()
    }

    /// Translate a whole UI label dictionary in one request.
    ///
    /// The translated dictionary is cached per target language. Labels the
    /// response leaves out keep their source text; a failed request returns
    /// the source dictionary.
    pub async fn translate_ui(&self, dictionary: &Dictionary, target_lang: &str) -> Dictionary {
        let inner = &self.inner;
        if target_lang == inner.config.default_source || dictionary.is_empty() {
            return dictionary.clone();
        }
        if !inner.config.is_supported(target_lang) {
            warn!(lang = target_lang, "unsupported UI language, keeping source labels");
            return dictionary.clone();
        }

        let key = target_lang.to_owned();
        if let Some(hit) = inner.dictionaries.get(&key) {
            return hit;
        }

        let body = json!({ "uiTexts": dictionary, "target": target_lang });
        let mut merged = dictionary.clone();
        let task_inner = Arc::clone(inner);
        let task_key = key.clone();
        let outcome = inner
            .ui_flights
            .run(key, move || async move {
                let data = task_inner.post("/translate-ui", body).await?;
                let translated = data
                    .get("translatedUI")
                    .and_then(Value::as_object)
                    .ok_or_else(|| HermodError::Json("response is missing `translatedUI`".into()))?;
                for (label, value) in translated {
                    if let Some(text) = value.as_str() {
                        merged.insert(label.clone(), text.to_owned());
                    }
                }
                task_inner.dictionaries.insert(task_key, merged.clone());
                Ok::<_, HermodError>(merged)
            })
            .await;

        match outcome {
            Ok(translated) => translated,
            Err(error) => {
                warn!(%error, lang = target_lang, "UI translation failed, keeping source labels");
                dictionary.clone()
            }
        }
    }

    /// Detect the language of `text`.
    ///
    /// Input shorter than the configured minimum returns the default
    /// language without a request, as does a failed request.
    pub async fn detect_language(&self, text: &str) -> String {
        let inner = &self.inner;
        let default = &inner.config.default_language;
        if text.trim().chars().count() < inner.config.min_detect_length {
            return default.clone();
        }

        let key = text.to_owned();
        if let Some(hit) = inner.detections.get(&key) {
            return hit;
        }

        let body = json!({ "text": text });
        let task_inner = Arc::clone(inner);
        let task_key = key.clone();
        let outcome = inner
            .detect_flights
            .run(key, move || async move {
                let data = task_inner.post("/detect-language", body).await?;
                let lang = string_field(&data, "detectedLanguage")?;
                task_inner.detections.insert(task_key, lang.clone());
                Ok::<_, HermodError>(lang)
            })
            .await;

        outcome.unwrap_or_else(|error| {
            warn!(%error, "language detection failed, using default");
            default.clone()
        })
    }

    pub fn cache_stats(&self) -> CacheStats {
        let inner = &self.inner;
        CacheStats {
            texts: inner.texts.len(),
            dictionaries: inner.dictionaries.len(),
            detections: inner.detections.len(),
            capacity: inner.texts.capacity(),
            pending: inner.text_flights.len()
                + inner.ui_flights.len()
                + inner.detect_flights.len(),
        }
    }

    /// Empty every cache and forget in-flight requests.
    pub fn clear_cache(&self) {
        let inner = &self.inner;
        inner.texts.clear();
        inner.dictionaries.clear();
        inner.detections.clear();
        inner.text_flights.clear();
        inner.ui_flights.clear();
        inner.detect_flights.clear();
    }

    /// Drop expired cache entries and stale in-flight entries. Returns how
    /// many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep()
    }

    /// Start the periodic sweep (every `cache.sweep_interval`).
    ///
    /// Replaces a previously spawned sweeper. The task stops by itself once
    /// every clone of the service is dropped. Must be called from within a
    /// tokio runtime.
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let period = self
            .inner
            .config
            .cache
            .sweep_interval
            .max(Duration::from_millis(1));
        let weak = Arc::downgrade(&self.inner);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let removed = inner.sweep();
                if removed > 0 {
                    debug!(removed, "swept expired translation entries");
                }
            }
        });

        if let Some(previous) = self.inner.lock_sweeper().replace(handle.abort_handle()) {
            previous.abort();
        }
        handle
    }

    /// Clear all state and stop the sweeper.
    pub fn dispose(&self) {
        self.clear_cache();
        if let Some(sweeper) = self.inner.lock_sweeper().take() {
            sweeper.abort();
        }
    }

    pub(crate) fn downgrade(&self) -> WeakTranslationService {
        WeakTranslationService(Arc::downgrade(&self.inner))
    }
}

/// Handle that does not keep the service alive.
pub(crate) struct WeakTranslationService(Weak<ServiceInner>);

impl WeakTranslationService {
    pub(crate) fn upgrade(&self) -> Option<TranslationService> {
        self.0.upgrade().map(|inner| TranslationService { inner })
    }
}
