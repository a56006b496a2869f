//! Cache persistence with async, coalescing writes.
//! `save` serializes both caches on the caller's thread and hands the two
//! records to a background writer, which only ever writes the newest pair.
//! This keeps the lookup return path free of store I/O.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cache::BoundedCache;
use crate::error::PersistenceError;
use crate::metrics::{metric_names, MetricsRegistry};
use crate::model::{DefinitionResult, TranslationResult};
use crate::store::{keys, KeyValueStore};

/// Cache contents in recency order, oldest first.
pub type CacheSeed<V> = Vec<(String, V)>;

#[derive(Debug, Default)]
pub struct PersistedCaches {
    pub definitions: CacheSeed<DefinitionResult>,
    pub translations: CacheSeed<TranslationResult>,
}

enum Command {
    Save {
        definitions: String,
        translations: String,
    },
    Flush(oneshot::Sender<()>),
}

pub struct PersistenceAdapter {
    tx: mpsc::UnboundedSender<Command>,
    store: Arc<dyn KeyValueStore>,
}

impl PersistenceAdapter {
    /// Start the background writer. Must be called inside a Tokio runtime.
    pub fn start(store: Arc<dyn KeyValueStore>, metrics: Arc<MetricsRegistry>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(rx, Arc::clone(&store), metrics));
        Self { tx, store }
    }

    /// Read both records. Missing or malformed records come back empty.
    pub fn load(&self) -> PersistedCaches {
        let caches = PersistedCaches {
            definitions: read_record(self.store.as_ref(), keys::CACHE_DEFINITIONS),
            translations: read_record(self.store.as_ref(), keys::CACHE_TRANSLATIONS),
        };
        info!(
            definitions = caches.definitions.len(),
            translations = caches.translations.len(),
            "persisted caches loaded"
        );
        caches
    }

    /// Queue a snapshot of both caches. Never fails; encode errors are logged.
    pub fn save(
        &self,
        definitions: &BoundedCache<DefinitionResult>,
        translations: &BoundedCache<TranslationResult>,
    ) {
        let encoded = encode(definitions).and_then(|d| Ok((d, encode(translations)?)));
        match encoded {
            Ok((definitions, translations)) => {
                if self
                    .tx
                    .send(Command::Save {
                        definitions,
                        translations,
                    })
                    .is_err()
                {
                    warn!("persistence writer gone, snapshot dropped");
                }
            }
            Err(e) => warn!(error = %e, "cache snapshot encode failed"),
        }
    }

    /// Wait until every snapshot queued so far has been written.
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Encode a cache as a JSON object whose key order is oldest → newest.
fn encode<V: Serialize + Clone>(cache: &BoundedCache<V>) -> Result<String, PersistenceError> {
    let mut map = Map::with_capacity(cache.len());
    for (key, value) in cache.iter_oldest_first() {
        map.insert(key.clone(), serde_json::to_value(value)?);
    }
    Ok(serde_json::to_string(&map)?)
}

fn read_record<V: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> CacheSeed<V> {
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(error = %e, key, "persisted cache read failed");
            return Vec::new();
        }
    };
    decode(&raw).unwrap_or_else(|e| {
        warn!(error = %e, key, "persisted cache malformed, starting empty");
        Vec::new()
    })
}

/// Entries that do not match the current result shape are skipped.
fn decode<V: DeserializeOwned>(raw: &str) -> Result<CacheSeed<V>, serde_json::Error> {
    let map: Map<String, Value> = serde_json::from_str(raw)?;
    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match serde_json::from_value(value) {
            Ok(v) => Some((key, v)),
            Err(e) => {
                debug!(error = %e, key = %key, "skipping persisted entry");
                None
            }
        })
        .collect())
}

fn write_snapshot(
    store: &dyn KeyValueStore,
    definitions: &str,
    translations: &str,
) -> Result<(), PersistenceError> {
    // Two independent records: a failure on one still attempts the other.
    let defs = store.set(keys::CACHE_DEFINITIONS, definitions);
    let trans = store.set(keys::CACHE_TRANSLATIONS, translations);
    defs?;
    trans?;
    Ok(())
}

/// Background writer: drains everything queued, keeps only the newest
/// snapshot, writes it, then acknowledges pending flushes.
async fn write_loop(
    mut rx: mpsc::UnboundedReceiver<Command>,
    store: Arc<dyn KeyValueStore>,
    metrics: Arc<MetricsRegistry>,
) {
    while let Some(first) = rx.recv().await {
        let mut latest = None;
        let mut acks = Vec::new();
        let mut coalesced = 0usize;

        let mut absorb = |cmd: Command| match cmd {
            Command::Save {
                definitions,
                translations,
            } => {
                coalesced += 1;
                latest = Some((definitions, translations));
            }
            Command::Flush(ack) => acks.push(ack),
        };
        absorb(first);
        while let Ok(cmd) = rx.try_recv() {
            absorb(cmd);
        }

        if let Some((definitions, translations)) = latest {
            let start = Instant::now();
            match write_snapshot(store.as_ref(), &definitions, &translations) {
                Ok(()) => {
                    let elapsed_us = start.elapsed().as_micros() as f64;
                    metrics.record(metric_names::PERSIST_WRITE, elapsed_us);
                    debug!(coalesced, elapsed_us, "cache snapshot persisted");
                }
                Err(e) => {
                    metrics.incr(metric_names::PERSIST_FAILURES);
                    warn!(error = %e, "cache snapshot write failed");
                }
            }
        }

        for ack in acks {
            let _ = ack.send(());
        }
    }
    info!("persistence writer exiting (channel closed)");
}
