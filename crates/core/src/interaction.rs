// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop interaction records

use crate::event::Event;
use crate::id::{AutomaId, InteractionId};
use crate::snapshot::Snapshot;
use serde::{Deserialize, Serialize};

/// A pending human-interaction request.
///
/// Created when a worker reaches an `interact_with_human` site with no
/// recorded feedback. `site_index` is the call order of the site within one
/// worker activation; on resume, earlier sites replay their recorded
/// feedback and the worker parks again at the first unanswered site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub interaction_id: InteractionId,
    pub event: Event,
    /// Key of the worker awaiting the feedback.
    pub worker_key: String,
    /// Identity of the automa owning that worker.
    pub automa_id: AutomaId,
    /// Zero-based order of the interaction site within the worker body.
    pub site_index: usize,
}

/// The recoverable pause signal surfaced out of `arun`.
///
/// Carries every interaction pending at the moment the run loop found no
/// runnable progress, plus a snapshot the caller persists to resume later.
#[derive(Debug, Clone)]
pub struct InteractionException {
    pub interactions: Vec<Interaction>,
    pub snapshot: Snapshot,
}

impl InteractionException {
    pub fn new(interactions: Vec<Interaction>, snapshot: Snapshot) -> Self {
        Self {
            interactions,
            snapshot,
        }
    }
}

#[cfg(test)]
#[path = "interaction_tests.rs"]
mod tests;
