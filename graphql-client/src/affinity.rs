use crate::endpoint::Endpoint;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

/// Remembers which non-default endpoint last resolved a repository.
///
/// Entries never expire; the cache lives as long as whoever owns it. Share
/// one instance across clients with an `Arc`. The lock is never held across
/// an `.await`.
#[derive(Debug, Default)]
pub struct EndpointAffinityCache {
    entries: Mutex<HashMap<String, Endpoint>>,
}

impl EndpointAffinityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, repository_key: &str) -> Option<Endpoint> {
        self.lock().get(repository_key).cloned()
    }

    pub fn set(&self, repository_key: impl Into<String>, endpoint: Endpoint) {
        self.lock().insert(repository_key.into(), endpoint);
    }

    pub fn evict(&self, repository_key: &str) -> Option<Endpoint> {
        self.lock().remove(repository_key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    // No operation leaves the map half-written, so poisoning is recoverable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Endpoint>> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
