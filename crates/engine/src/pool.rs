// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared blocking pool for `run`-style workers
//!
//! The pool is owned by the top-level automa and shared down through nested
//! automas, so the whole tree competes for the same bounded capacity.

use automa_core::AutomaError;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Capacity used when the top-level automa is not given a pool explicitly.
pub const DEFAULT_POOL_CAPACITY: usize = 4;

/// A bounded pool of blocking slots backed by the runtime's blocking
/// threads. Submissions past the capacity wait for a slot.
#[derive(Clone)]
pub struct BlockingPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl BlockingPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Run `f` on a blocking thread, waiting for pool capacity first.
    pub async fn run<T, F>(&self, f: F) -> Result<T, AutomaError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| AutomaError::WorkerInfra("the blocking pool is closed".to_string()))?;

        let handle = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            f()
        });
        handle
            .await
            .map_err(|err| AutomaError::WorkerInfra(format!("blocking task failed: {err}")))
    }
}

impl Default for BlockingPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

impl std::fmt::Debug for BlockingPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingPool")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
