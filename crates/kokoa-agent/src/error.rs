//! Edge agent error types.

/// Errors that can occur while polling and applying configuration.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Control plane rejected credentials: {0}")]
    Unauthorized(String),

    #[error("Control plane error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Config integrity check failed: expected {expected}, computed {actual}")]
    Integrity { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
