//! Error types for the edge support agent
//!
//! The reasoning pipeline itself is total: classifier, tax engine,
//! compositor and evaluator never fail. These errors belong to the
//! collaborator layer: HTTP clients, the order datastore, server startup.

use thiserror::Error;

/// Result type alias for support-agent operations
pub type Result<T> = std::result::Result<T, SupportAgentError>;

#[derive(Error, Debug)]
pub enum SupportAgentError {

    // =============================
    // Collaborator Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Order store error: {0}")]
    StoreError(String),

    #[error("Telemetry error: {0}")]
    TelemetryError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
