//! User settings as an immutable snapshot, refreshed from the store's
//! change stream. Lookups take a `&Settings`; nothing in the core mutates it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::coordinator::RequestCoordinator;
use crate::error::StoreError;
use crate::model::{AUTO_LANGUAGE, ENGLISH};
use crate::store::{keys, KeyValueStore, StoreChange};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Settings {
    pub target_language: String,
    /// Language code or `"auto"`.
    pub source_language: String,
    pub dark_mode: bool,
    pub words_learned: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_language: ENGLISH.to_string(),
            source_language: AUTO_LANGUAGE.to_string(),
            dark_mode: false,
            words_learned: 0,
        }
    }
}

/// Which field a store change touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsChange {
    TargetLanguage,
    SourceLanguage,
    DarkMode,
    WordsLearned,
    /// Not a settings key, or the value did not change.
    Unchanged,
}

impl Settings {
    /// Read a snapshot. Missing or unreadable values fall back to defaults.
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let mut settings = Self::default();
        for key in [
            keys::TARGET_LANGUAGE,
            keys::SOURCE_LANGUAGE,
            keys::DARK_MODE,
            keys::TOTAL_WORDS_LEARNED,
        ] {
            match store.get(key) {
                Ok(Some(value)) => {
                    settings.apply_value(key, &value);
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, key, "settings read failed, using default"),
            }
        }
        settings
    }

    /// Dictionary lookups only work for English or auto-detected input.
    pub fn definitions_supported(&self) -> bool {
        self.source_language == ENGLISH || self.source_language == AUTO_LANGUAGE
    }

    /// Fold one store change into the snapshot.
    pub fn apply(&mut self, change: &StoreChange) -> SettingsChange {
        self.apply_value(&change.key, &change.new_value)
    }

    fn apply_value(&mut self, key: &str, value: &str) -> SettingsChange {
        let value = value.trim();
        match key {
            keys::TARGET_LANGUAGE if !value.is_empty() && value != self.target_language => {
                self.target_language = value.to_string();
                SettingsChange::TargetLanguage
            }
            keys::SOURCE_LANGUAGE if !value.is_empty() && value != self.source_language => {
                self.source_language = value.to_string();
                SettingsChange::SourceLanguage
            }
            keys::DARK_MODE => {
                let dark = value == "true" || value == "1";
                if dark == self.dark_mode {
                    return SettingsChange::Unchanged;
                }
                self.dark_mode = dark;
                SettingsChange::DarkMode
            }
            keys::TOTAL_WORDS_LEARNED => match value.parse::<u64>() {
                Ok(n) if n != self.words_learned => {
                    self.words_learned = n;
                    SettingsChange::WordsLearned
                }
                _ => SettingsChange::Unchanged,
            },
            _ => SettingsChange::Unchanged,
        }
    }
}

pub fn set_target_language(store: &dyn KeyValueStore, code: &str) -> Result<(), StoreError> {
    store.set(keys::TARGET_LANGUAGE, code)
}

pub fn set_source_language(store: &dyn KeyValueStore, code: &str) -> Result<(), StoreError> {
    store.set(keys::SOURCE_LANGUAGE, code)
}

pub fn set_dark_mode(store: &dyn KeyValueStore, dark: bool) -> Result<(), StoreError> {
    store.set(keys::DARK_MODE, if dark { "true" } else { "false" })
}

/// Bump the learned-word counter after a translation was shown.
pub fn record_word_learned(store: &dyn KeyValueStore) -> Result<u64, StoreError> {
    let current = store
        .get(keys::TOTAL_WORDS_LEARNED)?
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(0);
    let next = current.saturating_add(1);
    store.set(keys::TOTAL_WORDS_LEARNED, &next.to_string())?;
    Ok(next)
}

pub fn reset_words_learned(store: &dyn KeyValueStore) -> Result<(), StoreError> {
    store.set(keys::TOTAL_WORDS_LEARNED, "0")
}

/// Keeps a `Settings` snapshot in sync with the store and clears the
/// translations cache when the target language changes.
pub struct SettingsWatcher;

impl SettingsWatcher {
    /// Spawn the watcher task. It exits when every receiver is dropped.
    pub fn spawn(
        store: Arc<dyn KeyValueStore>,
        coordinator: Arc<RequestCoordinator>,
    ) -> (watch::Receiver<Settings>, JoinHandle<()>) {
        let changes = store.subscribe();
        let (tx, rx) = watch::channel(Settings::load(store.as_ref()));
        let handle = tokio::spawn(watch_loop(changes, tx, store, coordinator));
        (rx, handle)
    }
}

async fn watch_loop(
    mut changes: broadcast::Receiver<StoreChange>,
    tx: watch::Sender<Settings>,
    store: Arc<dyn KeyValueStore>,
    coordinator: Arc<RequestCoordinator>,
) {
    loop {
        let event = tokio::select! {
            _ = tx.closed() => break,
            event = changes.recv() => event,
        };

        let current = tx.borrow().clone();
        let next = match event {
            Ok(change) => {
                let mut next = current.clone();
                match next.apply(&change) {
                    SettingsChange::Unchanged => continue,
                    what => debug!(key = %change.key, change = ?what, "settings change received"),
                }
                next
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                warn!(missed, "settings watcher lagged, reloading from store");
                Settings::load(store.as_ref())
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };

        if next.target_language != current.target_language {
            info!(
                from = %current.target_language,
                to = %next.target_language,
                "target language changed"
            );
            coordinator.clear_translations();
        }
        if next != current {
            tx.send_replace(next);
        }
    }
    info!("settings watcher exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn defaults_when_store_is_empty() {
        let settings = Settings::load(&MemoryStore::new());
        assert_eq!(settings, Settings::default());
        assert!(settings.definitions_supported());
    }

    #[test]
    fn load_reads_stored_values() {
        let store = MemoryStore::new();
        set_target_language(&store, "bn").unwrap();
        set_source_language(&store, "fr").unwrap();
        set_dark_mode(&store, true).unwrap();
        store.set(keys::TOTAL_WORDS_LEARNED, "17").unwrap();

        let settings = Settings::load(&store);
        assert_eq!(settings.target_language, "bn");
        assert_eq!(settings.source_language, "fr");
        assert!(settings.dark_mode);
        assert_eq!(settings.words_learned, 17);
        assert!(!settings.definitions_supported());
    }

    #[test]
    fn apply_reports_what_changed() {
        let mut settings = Settings::default();
        let change = |key: &str, value: &str| StoreChange {
            key: key.to_string(),
            old_value: None,
            new_value: value.to_string(),
        };

        assert_eq!(settings.apply(&change(keys::TARGET_LANGUAGE, "de")), SettingsChange::TargetLanguage);
        assert_eq!(settings.apply(&change(keys::TARGET_LANGUAGE, "de")), SettingsChange::Unchanged);
        assert_eq!(settings.apply(&change(keys::SOURCE_LANGUAGE, "en")), SettingsChange::SourceLanguage);
        assert_eq!(settings.apply(&change(keys::CACHE_DEFINITIONS, "{}")), SettingsChange::Unchanged);
        assert_eq!(settings.apply(&change(keys::TOTAL_WORDS_LEARNED, "x")), SettingsChange::Unchanged);
        assert_eq!(settings.target_language, "de");
        assert!(settings.definitions_supported());
    }

    #[test]
    fn word_counter_increments_and_resets() {
        let store = MemoryStore::new();
        assert_eq!(record_word_learned(&store).unwrap(), 1);
        assert_eq!(record_word_learned(&store).unwrap(), 2);
        reset_words_learned(&store).unwrap();
        assert_eq!(Settings::load(&store).words_learned, 0);
    }
}
