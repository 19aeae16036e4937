//! Error types for Sofiya store operations
//!
//! Author: Sofiya Bot Team
//! Version: 0.1.0
//! Date: 2026-09-29

use std::{io, path::PathBuf};

use sofiya_core::{EntityType, SofiyaError};
use thiserror::Error;

/// Main error type for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Directory structure could not be created at startup
    #[error("Failed to prepare storage at {path}: {source}")]
    Startup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// I/O error while reading or writing a collection or backup
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Collection could not be encoded or decoded
    #[error("Serialization of {entity} failed: {source}")]
    Serialization {
        entity: EntityType,
        #[source]
        source: serde_json::Error,
    },

    /// Collection file parsed but does not hold a key/record mapping
    #[error("Malformed {entity} collection: {reason}")]
    Malformed { entity: EntityType, reason: String },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn serialization(entity: EntityType, source: serde_json::Error) -> Self {
        Self::Serialization { entity, source }
    }
}

impl From<StoreError> for SofiyaError {
    fn from(err: StoreError) -> Self {
        SofiyaError::Storage(err.to_string())
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
