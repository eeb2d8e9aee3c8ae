//! Error types for the `mercator-population` crate.
//!
//! Every fallible population operation returns [`PopulationError`]. A tick
//! that fails leaves the population exactly as it was at the last barrier.

use mercator_types::AgentId;

/// Errors that can occur during population operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PopulationError {
    /// The agent is not registered with the population.
    #[error("agent not registered: {0}")]
    UnknownAgent(AgentId),

    /// The agent is already registered.
    #[error("agent already registered: {0}")]
    DuplicateAgent(AgentId),

    /// A gene value or locus name was rejected.
    #[error("invalid gene {locus}: {reason}")]
    InvalidGene {
        /// Locus name.
        locus: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The evolution configuration is inconsistent.
    #[error("invalid evolution config: {reason}")]
    InvalidConfig {
        /// What is wrong.
        reason: String,
    },

    /// A population-level invariant failed; the tick was aborted.
    #[error("internal invariant violated in generation {generation}: {detail}")]
    InvariantViolation {
        /// Generation being processed.
        generation: u64,
        /// Which invariant failed.
        detail: String,
    },
}
