//! Command-line lookup: `wordglance <selected text>`.
//! Runs one selection lookup with the stored settings and prints the
//! outcome as JSON.

use std::process::ExitCode;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, warn};

use wordglance::{settings, Config, LookupError, Outcome, WordGlance};

fn describe<T: Serialize>(lookup: &Result<Outcome<T>, LookupError>) -> Value {
    match lookup {
        Ok(Outcome::Cached(v)) => json!({ "source": "cache", "result": v }),
        Ok(Outcome::Fetched(v)) => json!({ "source": "network", "result": v }),
        Ok(Outcome::Superseded) => json!({ "superseded": true }),
        Err(LookupError::InvalidInput) => json!({ "empty": true }),
        Err(e @ LookupError::UnsupportedLanguage(_)) => json!({ "info": e.to_string() }),
        Err(e) => json!({ "error": e.to_string(), "retryable": e.is_retryable() }),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::from_env();
    wordglance::init_tracing(&config);

    let text = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        eprintln!("usage: wordglance <selected text>");
        return ExitCode::from(2);
    }

    let app = match WordGlance::start(&config) {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let current = app.settings();
    let result = app.lookup.lookup_selection(&text, &current).await;

    if matches!(result.translation, Ok(ref o) if o.value().is_some()) {
        if let Err(e) = settings::record_word_learned(app.store.as_ref()) {
            warn!(error = %e, "word counter update failed");
        }
    }

    let out = json!({
        "text": text,
        "source_language": current.source_language,
        "target_language": current.target_language,
        "definition": describe(&result.definition),
        "translation": describe(&result.translation),
        "cache": app.lookup.cache_stats(),
    });
    match serde_json::to_string_pretty(&out) {
        Ok(s) => println!("{s}"),
        Err(e) => error!(error = %e, "output encode failed"),
    }

    let failed = result.definition.as_ref().err().map_or(false, LookupError::is_retryable)
        && result.translation.as_ref().err().map_or(false, LookupError::is_retryable);
    app.shutdown().await;
    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
