//! End-to-end lookup flows through the facade with a scripted transport.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::Notify;

use wordglance::error::TransportError;
use wordglance::model::LookupKind;
use wordglance::settings::{self, Settings};
use wordglance::store::{keys, KeyValueStore, MemoryStore};
use wordglance::transport::{FetchResponse, HttpTransport, Route};
use wordglance::{Config, LookupError, Outcome, WordGlance};

enum Reply {
    Now(u16, String),
    Gated(Arc<Notify>, u16, String),
    Fail(TransportError),
}

#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, reply: Reply) {
        self.replies.lock().push_back(reply);
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl HttpTransport for ScriptedTransport {
    fn get<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<FetchResponse, TransportError>> {
        self.calls.lock().push(url.to_string());
        let reply = self.replies.lock().pop_front();
        Box::pin(async move {
            match reply {
                Some(Reply::Now(status, body)) => Ok(FetchResponse::new(status, body, Route::Direct)),
                Some(Reply::Gated(gate, status, body)) => {
                    gate.notified().await;
                    Ok(FetchResponse::new(status, body, Route::Direct))
                }
                Some(Reply::Fail(e)) => Err(e),
                None => Err(TransportError::Request("no scripted reply".into())),
            }
        })
    }
}

fn translation_body(primary: &str) -> String {
    json!({
        "destination-text": primary,
        "translations": {
            "all-translations": [[format!("{primary}-alt"), []]],
            "possible-translations": [],
        }
    })
    .to_string()
}

fn definition_body() -> String {
    let meaning = |pos: &str, syns: &[&str]| {
        json!({
            "partOfSpeech": pos,
            "synonyms": syns,
            "antonyms": ["stop"],
            "definitions": [
                { "definition": format!("{pos} one"), "synonyms": ["dash"] },
                { "definition": format!("{pos} two"), "antonyms": ["halt", "stop"] },
            ],
        })
    };
    json!([{
        "word": "run",
        "meanings": [
            meaning("verb", &["sprint", "jog"]),
            meaning("noun", &["jog", "trip", "race"]),
            meaning("adjective", &["liquid", "melted", "sprint"]),
        ],
    }])
    .to_string()
}

fn start(store: Arc<dyn KeyValueStore>, transport: Arc<ScriptedTransport>) -> WordGlance {
    WordGlance::with_parts(&Config::default(), store, transport).unwrap()
}

fn to_french() -> Settings {
    Settings {
        target_language: "fr".into(),
        ..Settings::default()
    }
}

async fn wait_in_flight(app: &WordGlance, kind: LookupKind, n: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while app.lookup.coordinator().in_flight(kind) < n {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("request never went in flight");
}

#[tokio::test]
async fn definition_fetch_then_cache_hit() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, definition_body()));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    let first = app.lookup.definition("Run", &to_french()).await.unwrap();
    let result = match first {
        Outcome::Fetched(r) => r,
        other => panic!("expected fetch, got {other:?}"),
    };
    assert_eq!(result.definitions.len(), 6);
    assert_eq!(result.definitions[0].definition, "verb one");
    assert_eq!(result.synonyms, ["sprint", "jog", "dash", "trip", "race", "liquid"]);
    assert_eq!(result.antonyms, ["stop", "halt"]);
    assert!(transport.calls()[0].ends_with("/api/v2/entries/en/run"));

    let second = app.lookup.definition("run", &to_french()).await.unwrap();
    assert_eq!(second, Outcome::Cached(result));
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn invalid_selection_never_reaches_network() {
    let transport = ScriptedTransport::new();
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    for raw in ["", "12345", "...", "one two three four five six"] {
        assert_eq!(app.lookup.definition(raw, &to_french()).await, Err(LookupError::InvalidInput));
        assert_eq!(app.lookup.translation(raw, &to_french()).await, Err(LookupError::InvalidInput));
    }
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn non_english_source_refuses_definitions() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, translation_body("hello")));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());
    let french = Settings {
        source_language: "fr".into(),
        target_language: "en".into(),
        ..Settings::default()
    };

    let both = app.lookup.lookup_selection("bonjour", &french).await;
    assert_eq!(both.definition, Err(LookupError::UnsupportedLanguage("fr".into())));
    let translation = both.translation.unwrap().into_value().unwrap();
    assert_eq!(translation.translations, ["hello", "hello-alt"]);

    assert_eq!(transport.calls().len(), 1);
    assert!(transport.calls()[0].contains("sl=fr"));
    assert_eq!(app.lookup.cache_stats().definitions, 0);
}

#[tokio::test]
async fn cancelled_translation_never_overwrites_newer_result() {
    let transport = ScriptedTransport::new();
    let gate = Arc::new(Notify::new());
    transport.push(Reply::Gated(Arc::clone(&gate), 200, translation_body("first")));
    transport.push(Reply::Now(200, translation_body("second")));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    let lookup = app.lookup.clone();
    let stale = tokio::spawn(async move { lookup.translation("hello", &to_french()).await });
    wait_in_flight(&app, LookupKind::Translation, 1).await;

    app.lookup.cancel_all();
    let fresh = app.lookup.translation("hello", &to_french()).await.unwrap();
    assert_eq!(fresh.value().unwrap().primary(), Some("second"));

    gate.notify_one();
    assert_eq!(stale.await.unwrap(), Ok(Outcome::Superseded));

    let cached = app.lookup.translation("hello", &to_french()).await.unwrap();
    assert_eq!(cached.value().unwrap().primary(), Some("second"));
    assert!(matches!(cached, Outcome::Cached(_)));
    assert_eq!(app.lookup.coordinator().in_flight(LookupKind::Translation), 0);
}

#[tokio::test]
async fn overlapping_lookups_without_cancel_are_both_accepted() {
    let transport = ScriptedTransport::new();
    let gate = Arc::new(Notify::new());
    transport.push(Reply::Gated(Arc::clone(&gate), 200, translation_body("slow")));
    transport.push(Reply::Now(200, translation_body("quick")));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    let lookup = app.lookup.clone();
    let slow = tokio::spawn(async move { lookup.translation("cat", &to_french()).await });
    wait_in_flight(&app, LookupKind::Translation, 1).await;

    let quick = app.lookup.translation("dog", &to_french()).await.unwrap();
    assert!(matches!(quick, Outcome::Fetched(_)));
    gate.notify_one();
    assert!(matches!(slow.await.unwrap(), Ok(Outcome::Fetched(_))));
    assert_eq!(app.lookup.cache_stats().translations, 2);
}

#[tokio::test]
async fn cancelling_translations_leaves_definition_cache_alone() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, definition_body()));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    app.lookup.definition("run", &to_french()).await.unwrap();
    app.lookup.cancel_all();
    assert!(matches!(
        app.lookup.definition("run", &to_french()).await,
        Ok(Outcome::Cached(_))
    ));
}

#[tokio::test]
async fn network_failures_surface_and_do_not_leak_requests() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Fail(TransportError::Timeout(Duration::from_secs(5))));
    transport.push(Reply::Now(503, String::new()));
    transport.push(Reply::Now(200, "<html>".into()));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    for _ in 0..3 {
        let err = app.lookup.definition("run", &to_french()).await.unwrap_err();
        assert!(err.is_retryable(), "{err:?}");
    }
    assert_eq!(app.lookup.coordinator().in_flight(LookupKind::Definition), 0);
    assert_eq!(app.lookup.cache_stats().definitions, 0);
}

#[tokio::test]
async fn empty_provider_results_are_cached_not_errors() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, "[]".into()));
    transport.push(Reply::Now(200, "{}".into()));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    let def = app.lookup.definition("zzyzx", &to_french()).await.unwrap();
    assert!(def.value().unwrap().is_empty());
    let tr = app.lookup.translation("zzyzx", &to_french()).await.unwrap();
    assert!(tr.value().unwrap().translations.is_empty());
    assert_eq!(app.lookup.cache_stats().definitions, 1);
    assert_eq!(app.lookup.cache_stats().translations, 1);
}

#[tokio::test]
async fn language_pairs_get_independent_entries() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, translation_body("bonjour")));
    transport.push(Reply::Now(200, translation_body("hallo")));
    let app = start(Arc::new(MemoryStore::new()), transport.clone());

    let fr = to_french();
    let de = Settings {
        target_language: "de".into(),
        ..to_french()
    };
    app.lookup.translation("hello", &fr).await.unwrap();
    app.lookup.translation("hello", &de).await.unwrap();

    assert_eq!(transport.calls().len(), 2);
    assert_eq!(app.lookup.cache_stats().translations, 2);
    let again = app.lookup.translation("hello", &fr).await.unwrap();
    assert_eq!(again.value().unwrap().primary(), Some("bonjour"));
}

#[tokio::test]
async fn caches_survive_restart_through_the_store() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, definition_body()));
    transport.push(Reply::Now(200, translation_body("courir")));

    let app = start(Arc::clone(&store), transport.clone());
    app.lookup.definition("run", &to_french()).await.unwrap();
    app.lookup.translation("run", &to_french()).await.unwrap();
    app.shutdown().await;
    assert!(store.get(keys::CACHE_DEFINITIONS).unwrap().unwrap().contains("\"run\""));

    let idle = ScriptedTransport::new();
    let restarted = start(Arc::clone(&store), idle.clone());
    assert!(matches!(
        restarted.lookup.definition("RUN", &to_french()).await,
        Ok(Outcome::Cached(_))
    ));
    assert!(matches!(
        restarted.lookup.translation("run", &to_french()).await,
        Ok(Outcome::Cached(_))
    ));
    assert!(idle.calls().is_empty());
}

#[tokio::test]
async fn clear_caches_persists_empty_state() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, definition_body()));
    let app = start(Arc::clone(&store), transport);

    app.lookup.definition("run", &to_french()).await.unwrap();
    app.lookup.clear_caches();
    app.lookup.coordinator().flush().await;

    assert_eq!(app.lookup.cache_stats().definitions, 0);
    assert_eq!(store.get(keys::CACHE_DEFINITIONS).unwrap().as_deref(), Some("{}"));
}

#[tokio::test]
async fn target_language_change_clears_translations() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, translation_body("bonjour")));
    transport.push(Reply::Now(200, definition_body()));
    let mut app = start(Arc::clone(&store), transport);

    app.lookup.translation("hello", &to_french()).await.unwrap();
    app.lookup.definition("run", &to_french()).await.unwrap();
    assert_eq!(app.lookup.cache_stats().translations, 1);

    settings::set_target_language(store.as_ref(), "de").unwrap();
    tokio::time::timeout(Duration::from_secs(5), app.settings.changed())
        .await
        .expect("settings watcher did not publish")
        .unwrap();

    assert_eq!(app.settings().target_language, "de");
    assert_eq!(app.lookup.cache_stats().translations, 0);
    assert_eq!(app.lookup.cache_stats().definitions, 1);
}

#[tokio::test]
async fn clear_history_resets_word_counter() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(200, translation_body("bonjour")));
    let app = start(Arc::clone(&store), transport);

    app.lookup.translation("hello", &to_french()).await.unwrap();
    settings::record_word_learned(store.as_ref()).unwrap();
    settings::record_word_learned(store.as_ref()).unwrap();

    app.clear_history().unwrap();
    app.lookup.coordinator().flush().await;

    assert_eq!(app.lookup.cache_stats().translations, 0);
    assert_eq!(Settings::load(store.as_ref()).words_learned, 0);
    assert_eq!(store.get(keys::CACHE_TRANSLATIONS).unwrap().as_deref(), Some("{}"));
}

#[tokio::test(start_paused = true)]
async fn unresponsive_transport_is_bounded_by_fetch_deadline() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Gated(Arc::new(Notify::new()), 200, translation_body("never")));
    let config = Config {
        api_timeout: Duration::from_millis(50),
        relay_timeout: Duration::from_millis(50),
        ..Config::default()
    };
    let app = WordGlance::with_parts(&config, Arc::new(MemoryStore::new()), transport).unwrap();

    let err = app.lookup.translation("hello", &to_french()).await.unwrap_err();
    assert!(matches!(err, LookupError::Network(_)), "{err:?}");
    assert_eq!(app.lookup.coordinator().in_flight(LookupKind::Translation), 0);
    assert_eq!(app.lookup.cache_stats().translations, 0);
}

#[tokio::test]
async fn phrase_translation_with_null_groups_returns_primary() {
    let transport = ScriptedTransport::new();
    transport.push(Reply::Now(
        200,
        r#"{"destination-text":"bonjour le monde","translations":{"all-translations":null,"possible-translations":null}}"#.into(),
    ));
    let app = start(Arc::new(MemoryStore::new()), transport);

    let outcome = app.lookup.translation("hello world", &to_french()).await.unwrap();
    assert!(matches!(outcome, Outcome::Fetched(_)));
    assert_eq!(outcome.value().unwrap().translations, ["bonjour le monde"]);
}
