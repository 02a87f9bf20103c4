//! Frostty error types

use thiserror::Error;

/// Frostty error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Channel error
    #[error("Channel error: {0}")]
    Channel(String),

    /// Agent API error (non-success response or unexpected payload)
    #[error("Agent error: {0}")]
    Agent(String),

    /// Session error
    #[error("Session error: {0}")]
    Session(String),

    /// Session id not present in the agent's listing
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Workspace path rejected
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// Agent process spawn/kill error
    #[error("Process error: {0}")]
    Process(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Frostty operations
pub type Result<T> = std::result::Result<T, Error>;
