// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The interaction hub: pending HITL requests and replayable feedback
//!
//! Every automa keeps its own hub. A worker reaching an interaction site
//! either replays the recorded feedback for that site (answered on a
//! previous resume) or registers a pending interaction and parks. Feedback
//! delivery moves a pending entry into the worker's replay queue; since a
//! worker parks at its first unanswered site, replay queues stay in site
//! order.

use automa_core::{
    AutomaError, AutomaId, Event, IdGen, Interaction, InteractionFeedback, InteractionId,
};
use indexmap::IndexMap;
use parking_lot::Mutex;
use std::sync::Arc;

pub(crate) struct InteractionHub {
    id_gen: Arc<dyn IdGen>,
    pending: Mutex<Vec<Interaction>>,
    answered: Mutex<IndexMap<String, Vec<InteractionFeedback>>>,
}

impl InteractionHub {
    pub fn new(id_gen: Arc<dyn IdGen>) -> Self {
        Self {
            id_gen,
            pending: Mutex::new(Vec::new()),
            answered: Mutex::new(IndexMap::new()),
        }
    }

    /// Replay the recorded feedback for this site, or register a pending
    /// interaction and return the pause sentinel.
    pub fn record_or_replay(
        &self,
        automa_id: &AutomaId,
        worker_key: &str,
        site_index: usize,
        event: Event,
    ) -> Result<InteractionFeedback, AutomaError> {
        if let Some(feedback) = self
            .answered
            .lock()
            .get(worker_key)
            .and_then(|replies| replies.get(site_index))
        {
            return Ok(feedback.clone());
        }

        let mut pending = self.pending.lock();
        if let Some(existing) = pending
            .iter()
            .find(|i| i.worker_key == worker_key && i.site_index == site_index)
        {
            return Err(AutomaError::InteractionPending(Box::new(existing.clone())));
        }

        let interaction = Interaction {
            interaction_id: InteractionId::new(self.id_gen.next_id()),
            event,
            worker_key: worker_key.to_string(),
            automa_id: automa_id.clone(),
            site_index,
        };
        pending.push(interaction.clone());
        Err(AutomaError::InteractionPending(Box::new(interaction)))
    }

    /// Deliver one feedback by interaction ID. Returns `false` when no
    /// pending interaction matches.
    pub fn deliver(&self, feedback: &InteractionFeedback) -> bool {
        let mut pending = self.pending.lock();
        let Some(position) = pending
            .iter()
            .position(|i| i.interaction_id == feedback.interaction_id)
        else {
            return false;
        };
        let interaction = pending.remove(position);
        self.answered
            .lock()
            .entry(interaction.worker_key)
            .or_default()
            .push(feedback.clone());
        true
    }

    /// Pending interactions raised by one worker.
    pub fn pending_for(&self, worker_key: &str) -> Vec<Interaction> {
        self.pending
            .lock()
            .iter()
            .filter(|i| i.worker_key == worker_key)
            .cloned()
            .collect()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// Drop every record for a removed worker.
    pub fn remove_worker(&self, worker_key: &str) {
        self.pending.lock().retain(|i| i.worker_key != worker_key);
        self.answered.lock().shift_remove(worker_key);
    }

    /// Reset for a fresh `arun`.
    pub fn reset(&self) {
        self.pending.lock().clear();
        self.answered.lock().clear();
    }

    /// Capture hub state for a snapshot.
    pub fn dump(&self) -> (Vec<Interaction>, IndexMap<String, Vec<InteractionFeedback>>) {
        (self.pending.lock().clone(), self.answered.lock().clone())
    }

    /// Restore hub state from a snapshot.
    pub fn restore(
        &self,
        pending: Vec<Interaction>,
        answered: IndexMap<String, Vec<InteractionFeedback>>,
    ) {
        *self.pending.lock() = pending;
        *self.answered.lock() = answered;
    }
}

#[cfg(test)]
#[path = "interaction_tests.rs"]
mod tests;
