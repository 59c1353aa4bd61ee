//! Error types for engagement-bot

use thiserror::Error;

use crate::ledger::UserId;

/// Failures raised by the ledger store.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The identity has never completed registration.
    #[error("Participant not found: {0}")]
    NotFound(UserId),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures raised while talking to the chat transport.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The transport answered but refused the call
    #[error("API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Decode error: {0}")]
    Decode(String),

    /// Failure injected by a test transport
    #[error("Delivery failed: {0}")]
    Injected(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Errors that abort handling of a single inbound event.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}
