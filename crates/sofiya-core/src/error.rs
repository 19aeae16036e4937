//! Error types for Sofiya
//!
//! This module defines the error type used at the service level. Storage and
//! rental crates keep their own narrower errors and convert into this one.

use std::io;
use thiserror::Error;

/// Sofiya error types
#[derive(Debug, Error)]
pub enum SofiyaError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Durable store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Chat transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type for Sofiya operations
pub type Result<T> = std::result::Result<T, SofiyaError>;

impl From<serde_json::Error> for SofiyaError {
    fn from(err: serde_json::Error) -> Self {
        SofiyaError::Serialization(err.to_string())
    }
}

impl SofiyaError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}
