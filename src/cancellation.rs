//! Cancellation framework: per-kind generation counter + CancellationToken.
//! Ensures a superseded fetch can never write its result into the cache.
//!
//! Starting a lookup does not cancel earlier ones of the same kind; only
//! `cancel_all` advances the generation. A request's result is accepted
//! only if its captured generation still matches.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::model::LookupKind;

/// Active-request registry for one lookup kind.
pub struct RequestRegistry {
    kind: LookupKind,
    current_token: RwLock<CancellationToken>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
}

impl RequestRegistry {
    pub fn new(kind: LookupKind) -> Self {
        Self {
            kind,
            current_token: RwLock::new(CancellationToken::new()),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a fetch under the current generation.
    pub fn register(&self) -> ActiveRequest {
        let token_guard = self.current_token.read();
        let my_generation = self.generation.load(Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        ActiveRequest {
            request_id: uuid::Uuid::new_v4().to_string(),
            kind: self.kind,
            generation: Arc::clone(&self.generation),
            my_generation,
            token: token_guard.child_token(),
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Cancel every registered request, advance generation, return it.
    pub fn cancel_all(&self) -> u64 {
        let mut token_guard = self.current_token.write();
        token_guard.cancel();
        *token_guard = CancellationToken::new();
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Requests registered and not yet dropped.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

}

/// Handle held by one in-flight fetch. Dropping it (on success, failure,
/// timeout or cancellation) removes it from the registry.
pub struct ActiveRequest {
    request_id: String,
    kind: LookupKind,
    generation: Arc<AtomicU64>,
    my_generation: u64,
    token: CancellationToken,
    in_flight: Arc<AtomicUsize>,
}

impl ActiveRequest {
    /// Returns true if no `cancel_all` happened since registration.
    #[inline]
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.my_generation
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether this request's result may still be applied.
    #[inline]
    pub fn should_accept(&self) -> bool {
        !self.is_cancelled() && self.is_current()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    pub fn my_generation(&self) -> u64 {
        self.my_generation
    }
}

impl Drop for ActiveRequest {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// One registry per lookup kind; definitions and translations never
/// cancel each other except through `cancel_all`.
pub struct CancelCoordinator {
    pub definitions: RequestRegistry,
    pub translations: RequestRegistry,
}

impl CancelCoordinator {
    pub fn new() -> Self {
        Self {
            definitions: RequestRegistry::new(LookupKind::Definition),
            translations: RequestRegistry::new(LookupKind::Translation),
        }
    }

    pub fn registry(&self, kind: LookupKind) -> &RequestRegistry {
        match kind {
            LookupKind::Definition => &self.definitions,
            LookupKind::Translation => &self.translations,
        }
    }

    /// Cancel everything of both kinds. Used when a new selection is looked up.
    pub fn cancel_all(&self) {
        self.definitions.cancel_all();
        self.translations.cancel_all();
    }
}

impl Default for CancelCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
