//! Typed registry of live cache keys per resource kind.
//!
//! Fan-out never scans every stored entry. It asks the registry for the keys
//! of one kind, in the order they were first registered, and filters them by
//! the mutation target.

use crate::key::CacheKey;
use crate::mutation::MutationTarget;
use lectern_core::ResourceKind;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct KindRegistry {
    by_kind: HashMap<ResourceKind, Vec<CacheKey>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key. Returns false if it was already known.
    pub fn insert(&mut self, key: CacheKey) -> bool {
        let keys = self.by_kind.entry(key.kind()).or_default();
        if keys.contains(&key) {
            return false;
        }
        keys.push(key);
        true
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        let Some(keys) = self.by_kind.get_mut(&key.kind()) else {
            return false;
        };
        let before = keys.len();
        keys.retain(|k| k != key);
        let removed = keys.len() != before;
        if keys.is_empty() {
            self.by_kind.remove(&key.kind());
        }
        removed
    }

    /// Keys matched by `target`, oldest registration first.
    pub fn keys_for(&self, target: &MutationTarget) -> Vec<CacheKey> {
        self.by_kind
            .get(&target.kind())
            .map(|keys| keys.iter().filter(|k| target.matches(k)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_kind.is_empty()
    }

    pub fn clear(&mut self) {
        self.by_kind.clear();
    }
}
