// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-worker local spaces

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// A mutable mapping owned by one (worker, automa) pair.
///
/// Reset at the start of each fresh `arun` unless the owning automa opts
/// out; never reset when resuming from a pause. Captured into snapshots.
#[derive(Clone, Default)]
pub struct LocalSpace {
    inner: Arc<Mutex<IndexMap<String, Value>>>,
}

impl LocalSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.lock().get(key).cloned()
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) {
        self.inner.lock().insert(key.into(), value);
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.inner.lock().shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Copy the contents out, for snapshot capture.
    pub fn to_map(&self) -> IndexMap<String, Value> {
        self.inner.lock().clone()
    }

    /// Replace the contents wholesale, for snapshot restore.
    pub fn replace(&self, map: IndexMap<String, Value>) {
        *self.inner.lock() = map;
    }
}

impl std::fmt::Debug for LocalSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.inner.lock().iter()).finish()
    }
}

#[cfg(test)]
#[path = "space_tests.rs"]
mod tests;
