//! Runtime configuration, loaded from `WORDGLANCE_*` environment variables
//! with defaults for every field.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_CAPACITY;

/// Fetch timeouts are kept inside this window.
const MIN_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug, Clone)]
pub struct Config {
    /// Entries per lookup kind.
    pub cache_capacity: usize,
    /// Timeout for direct provider requests.
    pub api_timeout: Duration,
    /// Timeout for requests forwarded through the relay.
    pub relay_timeout: Duration,
    pub dictionary_url: String,
    pub translation_url: String,
    /// Relay endpoint; `None` disables the fallback route.
    pub relay_url: Option<String>,
    /// SQLite file for the durable store; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    /// Emit JSON log lines instead of the human-readable format.
    pub log_json: bool,
}

impl Config {
    /// # Environment Variables
    /// - `WORDGLANCE_CACHE_CAPACITY` (default: 500)
    /// - `WORDGLANCE_API_TIMEOUT_MS` (default: 5000)
    /// - `WORDGLANCE_RELAY_TIMEOUT_MS` (default: 30000)
    /// - `WORDGLANCE_DICTIONARY_URL`, `WORDGLANCE_TRANSLATION_URL`
    /// - `WORDGLANCE_RELAY_URL`, `WORDGLANCE_DB_PATH` (unset by default)
    /// - `WORDGLANCE_LOG_JSON` (`1` or `true`)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_capacity: parse_var("WORDGLANCE_CACHE_CAPACITY").unwrap_or(defaults.cache_capacity),
            api_timeout: parse_var("WORDGLANCE_API_TIMEOUT_MS")
                .map(|ms| clamp_timeout(Duration::from_millis(ms)))
                .unwrap_or(defaults.api_timeout),
            relay_timeout: parse_var("WORDGLANCE_RELAY_TIMEOUT_MS")
                .map(|ms| clamp_timeout(Duration::from_millis(ms)))
                .unwrap_or(defaults.relay_timeout),
            dictionary_url: non_empty_var("WORDGLANCE_DICTIONARY_URL").unwrap_or(defaults.dictionary_url),
            translation_url: non_empty_var("WORDGLANCE_TRANSLATION_URL")
                .unwrap_or(defaults.translation_url),
            relay_url: non_empty_var("WORDGLANCE_RELAY_URL"),
            db_path: non_empty_var("WORDGLANCE_DB_PATH").map(PathBuf::from),
            log_json: non_empty_var("WORDGLANCE_LOG_JSON")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            api_timeout: MIN_TIMEOUT,
            relay_timeout: Duration::from_secs(30),
            dictionary_url: "https://api.dictionaryapi.dev".into(),
            translation_url: "https://ftapi.pythonanywhere.com".into(),
            relay_url: None,
            db_path: None,
            log_json: false,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn clamp_timeout(d: Duration) -> Duration {
    d.clamp(MIN_TIMEOUT, MAX_TIMEOUT)
}
