//! Provider payload shapes and their normalization into capped,
//! deduplicated domain results.
//!
//! Both providers are loose about optional fields: keys go missing, lists
//! come back as `null` or hold `null` entries. Every nested list decodes
//! through `lenient_list`, so a badly shaped field reads as empty instead of
//! failing the whole decode.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::model::{DefinitionEntry, DefinitionResult, TranslationResult};

pub const MAX_DEFINITIONS: usize = 9;
pub const MAX_SYNONYMS: usize = 6;
pub const MAX_ANTONYMS: usize = 6;
pub const MAX_TRANSLATIONS: usize = 8;

/// Decode a list field of any JSON shape. Non-arrays read as empty;
/// elements that do not decode as `T` are dropped.
fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    })
}

// --- Dictionary provider ---

#[derive(Debug, Default, Deserialize)]
pub struct DictionaryEntry {
    #[serde(default, deserialize_with = "lenient_list")]
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meaning {
    #[serde(default)]
    pub part_of_speech: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub definitions: Vec<Sense>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub synonyms: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub antonyms: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Sense {
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub example: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub synonyms: Vec<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub antonyms: Vec<String>,
}

/// Insertion-ordered string set.
#[derive(Default)]
struct OrderedSet {
    seen: HashSet<String>,
    items: Vec<String>,
}

impl OrderedSet {
    fn insert(&mut self, s: &str) -> bool {
        if s.is_empty() || self.seen.contains(s) {
            return false;
        }
        self.seen.insert(s.to_string());
        self.items.push(s.to_string());
        true
    }

    fn contains(&self, s: &str) -> bool {
        self.seen.contains(s)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn into_capped(mut self, cap: usize) -> Vec<String> {
        self.items.truncate(cap);
        self.items
    }
}

/// Flatten entries → meanings → definitions. Synonyms and antonyms are
/// gathered from both the meaning and the definition level.
pub fn normalize_definitions(entries: &[DictionaryEntry]) -> DefinitionResult {
    let mut definitions = Vec::new();
    let mut synonyms = OrderedSet::default();
    let mut antonyms = OrderedSet::default();

    for meaning in entries.iter().flat_map(|e| e.meanings.iter()) {
        meaning.synonyms.iter().for_each(|s| {
            synonyms.insert(s);
        });
        meaning.antonyms.iter().for_each(|a| {
            antonyms.insert(a);
        });

        for sense in &meaning.definitions {
            if let Some(text) = sense.definition.as_deref().filter(|t| !t.is_empty()) {
                definitions.push(DefinitionEntry {
                    definition: text.to_string(),
                    part_of_speech: meaning.part_of_speech.clone().unwrap_or_default(),
                    example: sense.example.clone().unwrap_or_default(),
                });
            }
            sense.synonyms.iter().for_each(|s| {
                synonyms.insert(s);
            });
            sense.antonyms.iter().for_each(|a| {
                antonyms.insert(a);
            });
        }
    }

    definitions.truncate(MAX_DEFINITIONS);
    DefinitionResult {
        definitions,
        synonyms: synonyms.into_capped(MAX_SYNONYMS),
        antonyms: antonyms.into_capped(MAX_ANTONYMS),
    }
}

/// Decode a dictionary response body. A JSON `null` counts as no entries.
pub fn parse_definitions(body: &str) -> Result<DefinitionResult, serde_json::Error> {
    let entries: Option<Vec<Option<DictionaryEntry>>> = serde_json::from_str(body)?;
    let entries: Vec<DictionaryEntry> = entries.into_iter().flatten().flatten().collect();
    Ok(normalize_definitions(&entries))
}

// --- Translation provider ---

#[derive(Debug, Default, Deserialize)]
pub struct TranslationPayload {
    #[serde(rename = "destination-text", default)]
    pub destination_text: Option<String>,
    #[serde(default)]
    pub translations: Option<TranslationGroups>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TranslationGroups {
    /// Each group is an array whose first element is the alternative.
    #[serde(rename = "all-translations", default, deserialize_with = "lenient_list")]
    pub all_translations: Vec<Value>,
    #[serde(rename = "possible-translations", default, deserialize_with = "lenient_list")]
    pub possible_translations: Vec<Value>,
}

/// Primary translation, then the first alternative of each group, then
/// possible translations, until the cap. No primary means no result.
pub fn normalize_translation(payload: &TranslationPayload) -> TranslationResult {
    let primary = match payload.destination_text.as_deref().filter(|t| !t.is_empty()) {
        Some(p) => p,
        None => return TranslationResult::default(),
    };

    let mut out = OrderedSet::default();
    out.insert(primary);

    if let Some(groups) = &payload.translations {
        for group in &groups.all_translations {
            if out.len() >= MAX_TRANSLATIONS {
                break;
            }
            let first = group
                .as_array()
                .and_then(|g| g.first())
                .and_then(Value::as_str);
            if let Some(alt) = first {
                out.insert(alt);
            }
        }

        for possible in groups.possible_translations.iter().filter_map(Value::as_str) {
            if out.len() >= MAX_TRANSLATIONS {
                break;
            }
            if !out.contains(possible) {
                out.insert(possible);
            }
        }
    }

    TranslationResult {
        translations: out.into_capped(MAX_TRANSLATIONS),
    }
}

pub fn parse_translation(body: &str) -> Result<TranslationResult, serde_json::Error> {
    let payload: Option<TranslationPayload> = serde_json::from_str(body)?;
    Ok(payload
        .map(|p| normalize_translation(&p))
        .unwrap_or_default())
}
