// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resumable run snapshots
//!
//! A snapshot encodes the full automa tree state at a pause point: topology
//! records, output buffers, local spaces, pending interactions and deferred
//! topology edits. The byte payload is opaque to callers; the version tag
//! is compared for exact equality on load.

use crate::error::AutomaError;
use serde::{Deserialize, Serialize};

/// Version tag written into every snapshot. Loading a snapshot with a
/// different tag is an error.
pub const SERIALIZATION_VERSION: &str = "1";

/// An opaque, persistable capture of a paused (or idle) automa tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub serialized_bytes: Vec<u8>,
    pub serialization_version: String,
}

impl Snapshot {
    /// Wrap freshly serialized state under the current version tag.
    pub fn new(serialized_bytes: Vec<u8>) -> Self {
        Self {
            serialized_bytes,
            serialization_version: SERIALIZATION_VERSION.to_string(),
        }
    }

    /// Rebuild a snapshot from persisted parts.
    pub fn from_parts(serialized_bytes: Vec<u8>, serialization_version: impl Into<String>) -> Self {
        Self {
            serialized_bytes,
            serialization_version: serialization_version.into(),
        }
    }

    /// Verify the version tag matches the running serialization version.
    pub fn check_version(&self) -> Result<(), AutomaError> {
        if self.serialization_version != SERIALIZATION_VERSION {
            return Err(AutomaError::Serialization(format!(
                "snapshot version '{}' does not match supported version '{}'",
                self.serialization_version, SERIALIZATION_VERSION
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
