//! Request coordinator: cache check → register → fetch → stale check →
//! normalize → write-through → persist.
//!
//! Cache check and registration happen before the first await, so a lookup
//! either returns from cache or is registered before any network activity.
//! Duplicate in-flight fetches for one key are tolerated; the generation
//! check keeps a cancelled one from overwriting a newer result.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::cancellation::CancelCoordinator;
use crate::config::Config;
use crate::error::{LookupError, StartupError, TransportError};
use crate::metrics::{metric_names, MetricsRegistry};
use crate::model::{
    CacheStats, DefinitionKey, DefinitionResult, LookupKind, Outcome, TranslationKey,
    TranslationResult, AUTO_LANGUAGE,
};
use crate::normalize;
use crate::persist::PersistenceAdapter;
use crate::transport::{FetchResponse, HttpTransport};

/// Provider base URLs, validated once at startup.
#[derive(Debug, Clone)]
pub struct Endpoints {
    dictionary: Url,
    translation: Url,
}

impl Endpoints {
    pub fn new(dictionary_url: &str, translation_url: &str) -> Result<Self, StartupError> {
        Ok(Self {
            dictionary: parse_base(dictionary_url)?,
            translation: parse_base(translation_url)?,
        })
    }

    /// `{base}/api/v2/entries/en/{word}`, word percent-encoded.
    pub fn definition_url(&self, word: &str) -> Url {
        let mut url = self.dictionary.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["api", "v2", "entries", "en", word]);
        }
        url
    }

    /// `{base}/translate?dl={target}&text={text}[&sl={source}]`.
    pub fn translation_url(&self, key: &TranslationKey) -> Url {
        let mut url = self.translation.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("translate");
        }
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("dl", key.target());
            query.append_pair("text", key.text());
            if key.source() != AUTO_LANGUAGE {
                query.append_pair("sl", key.source());
            }
        }
        url
    }
}

fn parse_base(raw: &str) -> Result<Url, StartupError> {
    let url = Url::parse(raw).map_err(|e| StartupError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })?;
    if url.cannot_be_a_base() {
        return Err(StartupError::InvalidUrl {
            url: raw.to_string(),
            reason: "cannot be a base url".into(),
        });
    }
    Ok(url)
}

/// Owns both caches and both request registries for the process.
pub struct RequestCoordinator {
    transport: Arc<dyn HttpTransport>,
    endpoints: Endpoints,
    /// Upper bound on one fetch: the direct attempt plus a relay retry.
    fetch_timeout: Duration,
    definitions: Mutex<BoundedCache<DefinitionResult>>,
    translations: Mutex<BoundedCache<TranslationResult>>,
    cancel: CancelCoordinator,
    persist: PersistenceAdapter,
    metrics: Arc<MetricsRegistry>,
}

impl RequestCoordinator {
    /// Build the coordinator and seed both caches from persisted storage.
    pub fn new(
        config: &Config,
        transport: Arc<dyn HttpTransport>,
        persist: PersistenceAdapter,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<Self, StartupError> {
        let endpoints = Endpoints::new(&config.dictionary_url, &config.translation_url)?;

        let seed = persist.load();
        let mut definitions = BoundedCache::new("definitions", config.cache_capacity);
        definitions.extend(seed.definitions);
        let mut translations = BoundedCache::new("translations", config.cache_capacity);
        translations.extend(seed.translations);

        Ok(Self {
            transport,
            endpoints,
            fetch_timeout: config.api_timeout + config.relay_timeout,
            definitions: Mutex::new(definitions),
            translations: Mutex::new(translations),
            cancel: CancelCoordinator::new(),
            persist,
            metrics,
        })
    }

    pub async fn lookup_definition(
        &self,
        key: &DefinitionKey,
    ) -> Result<Outcome<DefinitionResult>, LookupError> {
        if let Some(hit) = self.cached_definition(key) {
            return Ok(Outcome::Cached(hit));
        }

        let url = self.endpoints.definition_url(key.word());
        let resp = match self.fetch(LookupKind::Definition, url.as_str()).await? {
            Some(resp) => resp,
            None => return Ok(Outcome::Superseded),
        };
        let result = normalize::parse_definitions(resp.text())
            .map_err(|e| self.decode_error(LookupKind::Definition, e))?;

        self.definitions
            .lock()
            .put(key.as_str().to_string(), result.clone());
        self.persist_snapshot();
        info!(
            word = key.word(),
            definitions = result.definitions.len(),
            "definition cached"
        );
        Ok(Outcome::Fetched(result))
    }

    pub async fn lookup_translation(
        &self,
        key: &TranslationKey,
    ) -> Result<Outcome<TranslationResult>, LookupError> {
        if let Some(hit) = self.cached_translation(key) {
            return Ok(Outcome::Cached(hit));
        }

        let url = self.endpoints.translation_url(key);
        let resp = match self.fetch(LookupKind::Translation, url.as_str()).await? {
            Some(resp) => resp,
            None => return Ok(Outcome::Superseded),
        };
        let result = normalize::parse_translation(resp.text())
            .map_err(|e| self.decode_error(LookupKind::Translation, e))?;

        self.translations
            .lock()
            .put(key.as_str().to_string(), result.clone());
        self.persist_snapshot();
        info!(
            key = key.as_str(),
            translations = result.translations.len(),
            "translation cached"
        );
        Ok(Outcome::Fetched(result))
    }

    /// Synchronous cache probe; never touches the network or the registry.
    pub fn cached_definition(&self, key: &DefinitionKey) -> Option<DefinitionResult> {
        let hit = self.definitions.lock().get(key.as_str());
        self.count_probe(LookupKind::Definition, key.as_str(), hit.is_some());
        hit
    }

    pub fn cached_translation(&self, key: &TranslationKey) -> Option<TranslationResult> {
        let hit = self.translations.lock().get(key.as_str());
        self.count_probe(LookupKind::Translation, key.as_str(), hit.is_some());
        hit
    }

    /// Make every in-flight fetch of both kinds stale.
    pub fn cancel_all(&self) {
        self.cancel.cancel_all();
        debug!(
            definitions_in_flight = self.cancel.definitions.in_flight(),
            translations_in_flight = self.cancel.translations.in_flight(),
            "active requests cancelled"
        );
    }

    /// Drop both caches and persist the empty state. The user-facing clear
    /// also resets the learned-word counter; see `WordGlance::clear_history`.
    pub fn clear_caches(&self) {
        self.definitions.lock().clear();
        self.translations.lock().clear();
        self.persist_snapshot();
        info!("all caches cleared");
    }

    /// Drop the translations cache only (target language changed).
    pub fn clear_translations(&self) {
        self.translations.lock().clear();
        self.persist_snapshot();
        info!("translation cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            definitions: self.definitions.lock().len(),
            translations: self.translations.lock().len(),
        }
    }

    pub fn in_flight(&self, kind: LookupKind) -> usize {
        self.cancel.registry(kind).in_flight()
    }

    /// Wait for queued persistence writes to land.
    pub async fn flush(&self) {
        self.persist.flush().await;
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Register, fetch, and decide whether the response still counts.
    /// `Ok(None)` means the request was cancelled while in flight.
    async fn fetch(
        &self,
        kind: LookupKind,
        url: &str,
    ) -> Result<Option<FetchResponse>, LookupError> {
        let request = self.cancel.registry(kind).register();
        info!(
            kind = %request.kind(),
            request_id = request.request_id(),
            generation = request.my_generation(),
            "fetch start"
        );
        let span = self.metrics.span(match request.kind() {
            LookupKind::Definition => metric_names::FETCH_DEFINITION,
            LookupKind::Translation => metric_names::FETCH_TRANSLATION,
        });

        // The transport enforces its own timeout; this deadline also bounds
        // transports that never resolve.
        let deadline = self.fetch_timeout;
        let result = tokio::select! {
            biased;
            _ = request.token().cancelled() => None,
            res = tokio::time::timeout(deadline, self.transport.get(url)) => {
                Some(res.unwrap_or(Err(TransportError::Timeout(deadline))))
            }
        };

        // Cancelled mid-flight, or the generation moved on while we waited.
        let result = match result {
            Some(res) if request.should_accept() => res,
            _ => {
                self.metrics.incr(metric_names::SUPERSEDED);
                info!(
                    kind = %request.kind(),
                    request_id = request.request_id(),
                    "stale result discarded"
                );
                return Ok(None);
            }
        };
        drop(request);
        let elapsed_us = span.finish();

        let resp = result.map_err(|e| {
            self.metrics.incr(metric_names::NETWORK_ERROR);
            warn!(kind = %kind, error = %e, "fetch failed");
            LookupError::from(e)
        })?;
        if !resp.ok() {
            self.metrics.incr(metric_names::NETWORK_ERROR);
            warn!(kind = %kind, status = resp.status(), "provider returned error status");
            return Err(LookupError::Network(format!("HTTP {}", resp.status())));
        }
        info!(
            kind = %kind,
            status = resp.status(),
            route = ?resp.route(),
            elapsed_ms = elapsed_us / 1000.0,
            "fetch done"
        );
        Ok(Some(resp))
    }

    fn decode_error(&self, kind: LookupKind, e: serde_json::Error) -> LookupError {
        self.metrics.incr(metric_names::NETWORK_ERROR);
        warn!(kind = %kind, error = %e, "provider payload unreadable");
        LookupError::Network(format!("unreadable {kind} payload"))
    }

    fn count_probe(&self, kind: LookupKind, key: &str, hit: bool) {
        if hit {
            self.metrics.incr(metric_names::CACHE_HIT);
            debug!(kind = %kind, key, "cache hit");
        } else {
            self.metrics.incr(metric_names::CACHE_MISS);
        }
    }

    /// Queue a full snapshot of both caches. Lock order: definitions first.
    fn persist_snapshot(&self) {
        let definitions = self.definitions.lock();
        let translations = self.translations.lock();
        self.persist.save(&definitions, &translations);
    }
}
