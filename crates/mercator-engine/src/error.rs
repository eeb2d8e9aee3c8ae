//! Error types for the simulation binary.
//!
//! [`AppError`] wraps every failure mode during startup and the run so
//! `main` can propagate with `?`.

/// Top-level error for the simulation binary.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: mercator_core::ConfigError,
    },

    /// An engine operation failed.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: mercator_core::EngineError,
    },

    /// The generation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: mercator_core::RunnerError,
    },

    /// The market section of the config file could not be read.
    #[error("market config error: {message}")]
    Market {
        /// Description of the failure.
        message: String,
    },

    /// The runner task panicked or was cancelled.
    #[error("runner task failed: {message}")]
    Join {
        /// Description of the failure.
        message: String,
    },
}
