//! Trigger event describing the object that arrived.

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{EmptyEventFieldSnafu, EventError, ParseEventSnafu, ReadEventSnafu};

/// A finalized-object notification: which container and which key.
///
/// Cloud storage notifications carry many more fields; only these two are read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageEvent {
    pub bucket: String,
    pub name: String,
}

impl StorageEvent {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Result<Self, EventError> {
        let event = Self {
            bucket: bucket.into(),
            name: name.into(),
        };
        event.validate()?;
        Ok(event)
    }

    /// Parse an event from its JSON payload.
    pub fn from_json(payload: &str) -> Result<Self, EventError> {
        let event: StorageEvent = serde_json::from_str(payload).context(ParseEventSnafu)?;
        event.validate()?;
        Ok(event)
    }

    /// Read and parse an event file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EventError> {
        let payload = std::fs::read_to_string(path.as_ref()).context(ReadEventSnafu)?;
        Self::from_json(&payload)
    }

    fn validate(&self) -> Result<(), EventError> {
        ensure!(
            !self.bucket.is_empty(),
            EmptyEventFieldSnafu { field: "bucket" }
        );
        ensure!(!self.name.is_empty(), EmptyEventFieldSnafu { field: "name" });
        Ok(())
    }
}

impl std::fmt::Display for StorageEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.bucket, self.name)
    }
}
