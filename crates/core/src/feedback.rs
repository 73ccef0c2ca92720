// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Feedback values returned from the application layer

use crate::id::InteractionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reply to a `request_feedback` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub data: Value,
}

impl Feedback {
    pub fn new(data: Value) -> Self {
        Self { data }
    }
}

/// A reply to a human-interaction request, matched by interaction ID on the
/// next `arun`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionFeedback {
    pub interaction_id: InteractionId,
    pub data: Value,
}

impl InteractionFeedback {
    pub fn new(interaction_id: impl Into<InteractionId>, data: Value) -> Self {
        Self {
            interaction_id: interaction_id.into(),
            data,
        }
    }
}

impl From<InteractionFeedback> for Feedback {
    fn from(feedback: InteractionFeedback) -> Self {
        Self {
            data: feedback.data,
        }
    }
}

#[cfg(test)]
#[path = "feedback_tests.rs"]
mod tests;
