//! Lookup facade: the only surface the UI depends on.
//! Gate → sanitize → coordinator. Definitions and translations run on
//! independent caches and registries, so calls of different kinds never
//! interfere.

use std::sync::Arc;

use futures_util::future::join;
use tracing::debug;

use crate::coordinator::RequestCoordinator;
use crate::error::LookupError;
use crate::model::{
    CacheStats, DefinitionKey, DefinitionResult, Outcome, TranslationKey, TranslationResult,
};
use crate::settings::Settings;

pub type DefinitionLookup = Result<Outcome<DefinitionResult>, LookupError>;
pub type TranslationLookup = Result<Outcome<TranslationResult>, LookupError>;

/// Both halves of one user-visible lookup gesture.
#[derive(Debug)]
pub struct SelectionLookup {
    pub definition: DefinitionLookup,
    pub translation: TranslationLookup,
}

#[derive(Clone)]
pub struct LookupFacade {
    coordinator: Arc<RequestCoordinator>,
}

impl LookupFacade {
    pub fn new(coordinator: Arc<RequestCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Dictionary lookup. Refused without touching cache or network when
    /// the source language is neither English nor auto.
    pub async fn definition(&self, raw: &str, settings: &Settings) -> DefinitionLookup {
        if !settings.definitions_supported() {
            return Err(LookupError::UnsupportedLanguage(
                settings.source_language.clone(),
            ));
        }
        let key = DefinitionKey::from_selection(raw).ok_or(LookupError::InvalidInput)?;
        self.coordinator.lookup_definition(&key).await
    }

    pub async fn translation(&self, raw: &str, settings: &Settings) -> TranslationLookup {
        let key = TranslationKey::from_selection(
            raw,
            &settings.source_language,
            &settings.target_language,
        )
        .ok_or(LookupError::InvalidInput)?;
        self.coordinator.lookup_translation(&key).await
    }

    /// A fresh interactive lookup: supersede whatever is in flight, then
    /// run both kinds concurrently.
    pub async fn lookup_selection(&self, raw: &str, settings: &Settings) -> SelectionLookup {
        self.cancel_all();
        let (definition, translation) =
            join(self.definition(raw, settings), self.translation(raw, settings)).await;
        debug!(
            definition_ok = definition.is_ok(),
            translation_ok = translation.is_ok(),
            "selection lookup finished"
        );
        SelectionLookup {
            definition,
            translation,
        }
    }

    pub fn cancel_all(&self) {
        self.coordinator.cancel_all();
    }

    pub fn clear_caches(&self) {
        self.coordinator.clear_caches();
    }

    pub fn clear_translations(&self) {
        self.coordinator.clear_translations();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.coordinator.cache_stats()
    }

    pub fn coordinator(&self) -> &Arc<RequestCoordinator> {
        &self.coordinator
    }
}
