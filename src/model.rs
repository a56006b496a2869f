//! Domain types shared by the cache, coordinator and facade.

use serde::{Deserialize, Serialize};

use crate::sanitize;

/// Source-language value meaning "let the provider detect it".
pub const AUTO_LANGUAGE: &str = "auto";
/// The only source language the dictionary provider understands.
pub const ENGLISH: &str = "en";

/// Which cache, registry and key scheme a lookup uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    Definition,
    Translation,
}

impl std::fmt::Display for LookupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LookupKind::Definition => write!(f, "definition"),
            LookupKind::Translation => write!(f, "translation"),
        }
    }
}

/// One flattened dictionary sense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionEntry {
    pub definition: String,
    #[serde(default)]
    pub part_of_speech: String,
    #[serde(default)]
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionResult {
    /// At most 9, in provider order. Empty means "not found".
    #[serde(alias = "defs")]
    pub definitions: Vec<DefinitionEntry>,
    #[serde(default)]
    pub synonyms: Vec<String>,
    #[serde(default)]
    pub antonyms: Vec<String>,
}

impl DefinitionResult {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Primary translation first, then alternatives; at most 8, no repeats.
    pub translations: Vec<String>,
}

impl TranslationResult {
    pub fn primary(&self) -> Option<&str> {
        self.translations.first().map(String::as_str)
    }
}

/// Result of a lookup that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Served from the in-memory cache; no network access happened.
    Cached(T),
    /// Fetched from the provider and written through to the cache.
    Fetched(T),
    /// Cancelled before its response was accepted. Leave the UI untouched.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Cached(v) | Outcome::Fetched(v) => Some(v),
            Outcome::Superseded => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Cached(v) | Outcome::Fetched(v) => Some(v),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

/// Cache key for definitions: the lowercased sanitized word.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DefinitionKey(String);

impl DefinitionKey {
    /// `None` when the selection fails sanitization.
    pub fn from_selection(raw: &str) -> Option<Self> {
        sanitize::sanitized(raw).map(|s| Self(s.to_lowercase()))
    }

    pub fn word(&self) -> &str {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Cache key for translations: sanitized text plus both language codes, so
/// a language change lands in a different slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationKey {
    text: String,
    source: String,
    target: String,
    composite: String,
}

impl TranslationKey {
    pub fn from_selection(raw: &str, source: &str, target: &str) -> Option<Self> {
        let text = sanitize::sanitized(raw)?;
        let composite = format!("{text}::{source}::{target}");
        Some(Self {
            text,
            source: source.to_string(),
            target: target.to_string(),
            composite,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn as_str(&self) -> &str {
        &self.composite
    }
}

/// Entry counts per cache, for the settings panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CacheStats {
    pub definitions: usize,
    pub translations: usize,
}
