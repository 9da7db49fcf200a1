//! Error types for the adaptive quality controller.
//!
//! This module defines custom error enums for each component of the crate,
//! providing descriptive error messages with context information.

use thiserror::Error;

/// Errors related to configuration management.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Failed to write configuration: {0}")]
    WriteError(#[from] std::io::Error),
}

/// Errors related to the persisted quality level store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to read level store '{path}': {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Level store '{path}' is corrupt: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("Failed to write level store: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize level store: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors raised when a controller tries to become the active instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActivationError {
    #[error("There may be only one active quality controller (instance {active} holds the slot)")]
    AlreadyActive { active: u64 },

    #[error("Controller instance {0} is inert after a failed activation")]
    Inert(u64),
}

/// Top-level controller errors.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Level store error: {0}")]
    Store(#[from] StoreError),

    #[error("Activation error: {0}")]
    Activation(#[from] ActivationError),
}
