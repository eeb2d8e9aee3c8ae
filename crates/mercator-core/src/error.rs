//! Error types for the mercator-core crate.

use mercator_agents::AgentError;
use mercator_population::PopulationError;
use mercator_types::AgentId;

use crate::config::ConfigError;

/// Errors returned by [`MercatorEngine`](crate::engine::MercatorEngine).
///
/// Every variant except [`Population`](Self::Population) with an
/// invariant violation is a caller error; in all cases the engine state is
/// unchanged.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An agent operation failed.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// A population operation failed.
    #[error("population error: {source}")]
    Population {
        /// The underlying population error.
        #[from]
        source: PopulationError,
    },

    /// The configuration is invalid.
    #[error("configuration error: {source}")]
    Config {
        /// The underlying configuration error.
        #[from]
        source: ConfigError,
    },

    /// No agent with this id exists.
    #[error("invalid agent id: {0}")]
    InvalidAgentId(AgentId),

    /// An agent with this id already exists.
    #[error("agent already exists: {0}")]
    DuplicateAgent(AgentId),

    /// An export blob has a schema version this build cannot read.
    #[error("unsupported schema version {found}, expected {expected}")]
    UnsupportedSchema {
        /// Version found in the blob.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// An export blob could not be encoded or decoded.
    #[error("serialization error: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The simulated clock cannot advance any further.
    #[error("simulated clock overflow")]
    ClockOverflow,
}

/// Errors that end the generation runner.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A generation tick failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying engine error.
        #[from]
        source: EngineError,
    },
}
