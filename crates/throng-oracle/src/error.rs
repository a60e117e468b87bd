//! Error types for the oracle boundary.
//!
//! Every variant means "no effect": callers log at `debug` and drop the
//! call. Nothing here is retried.

/// Errors that can occur while preparing, sending, or parsing an oracle call.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    Backend(String),

    /// The response did not match the expected schema.
    #[error("response parse error: {0}")]
    Parse(String),

    /// The response parsed but carried out-of-range values.
    #[error("invalid response: {0}")]
    Invalid(String),

    /// The per-call deadline was exceeded.
    #[error("timeout: oracle call exceeded {0} ms")]
    Timeout(u128),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}
