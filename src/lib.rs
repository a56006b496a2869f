//! WordGlance: select-to-define + translate lookup core.
//! Main library: module wiring, tracing setup, and process-wide bootstrap
//! of the caches, registries, persistence writer and settings watcher.

pub mod cache;
pub mod cancellation;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod lookup;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod persist;
pub mod sanitize;
pub mod settings;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub use config::Config;
pub use error::{LookupError, StartupError, StoreError};
pub use lookup::{LookupFacade, SelectionLookup};
pub use model::{DefinitionResult, LookupKind, Outcome, TranslationResult};
pub use settings::Settings;

use coordinator::RequestCoordinator;
use metrics::MetricsRegistry;
use persist::PersistenceAdapter;
use settings::SettingsWatcher;
use store::{KeyValueStore, MemoryStore, SqliteStore};
use transport::HttpTransport;

/// Install the global tracing subscriber. `RUST_LOG` overrides the default
/// filter. Safe to call more than once.
pub fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wordglance=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true);
    let _ = if config.log_json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

/// Shared process state. Built once at startup; everything the UI needs
/// hangs off `lookup` and `settings`.
pub struct WordGlance {
    pub lookup: LookupFacade,
    pub store: Arc<dyn KeyValueStore>,
    pub settings: watch::Receiver<Settings>,
    pub metrics: Arc<MetricsRegistry>,
    watcher: JoinHandle<()>,
}

impl WordGlance {
    /// Open the configured store, build the transport stack, and wire the
    /// core together. Must be called inside a Tokio runtime.
    pub fn start(config: &Config) -> Result<Self, StartupError> {
        let transport = transport::from_config(config)?;
        Self::with_parts(config, open_store(config), transport)
    }

    /// Same as `start`, with the store and transport supplied by the caller.
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, StartupError> {
        let metrics = Arc::new(MetricsRegistry::new());
        let persist = PersistenceAdapter::start(Arc::clone(&store), Arc::clone(&metrics));
        let coordinator = Arc::new(RequestCoordinator::new(
            config,
            transport,
            persist,
            Arc::clone(&metrics),
        )?);
        let (settings, watcher) = SettingsWatcher::spawn(Arc::clone(&store), Arc::clone(&coordinator));

        let stats = coordinator.cache_stats();
        info!(
            definitions = stats.definitions,
            translations = stats.translations,
            capacity = config.cache_capacity,
            "wordglance started"
        );

        Ok(Self {
            lookup: LookupFacade::new(coordinator),
            store,
            settings,
            metrics,
            watcher,
        })
    }

    /// Current settings snapshot.
    pub fn settings(&self) -> Settings {
        self.settings.borrow().clone()
    }

    /// The user "clear" action: empty both caches and reset the learned-word
    /// counter.
    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.lookup.clear_caches();
        settings::reset_words_learned(self.store.as_ref())?;
        info!("history cleared");
        Ok(())
    }

    /// Flush pending cache writes and stop the settings watcher.
    pub async fn shutdown(self) {
        self.lookup.coordinator().flush().await;
        self.watcher.abort();
        info!("wordglance stopped");
    }
}

/// SQLite when a path is configured and opens cleanly, memory otherwise.
fn open_store(config: &Config) -> Arc<dyn KeyValueStore> {
    match &config.db_path {
        Some(path) => match SqliteStore::open(path) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(error = %e, path = %path.display(), "store open failed, using memory store");
                Arc::new(MemoryStore::new())
            }
        },
        None => Arc::new(MemoryStore::new()),
    }
}
