//! Error types for the engine binary.
//!
//! Only startup can fail. Once the frame loop runs, every subsystem
//! degrades to a fallback instead of returning an error.

/// Top-level startup error.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: throng_core::ConfigError,
    },

    /// Oracle configuration or prompt templates are invalid.
    #[error("oracle error: {source}")]
    Oracle {
        /// The underlying oracle error.
        #[from]
        source: throng_oracle::OracleError,
    },

    /// The observer could not bind or stopped serving.
    #[error("observer error: {source}")]
    Observer {
        /// The underlying server error.
        #[from]
        source: throng_observer::ServerError,
    },
}
