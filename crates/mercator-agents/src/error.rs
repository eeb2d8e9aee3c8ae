//! Error types for the mercator-agents crate.
//!
//! Agent-scope errors are caller errors: an operation that returns one has
//! not mutated the agent.

use mercator_types::{ExperienceId, StrategyId};

/// Errors that can occur during agent operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentError {
    /// A trait name is not part of the fixed schema.
    #[error("invalid trait: {name}")]
    InvalidTrait {
        /// The offending name.
        name: String,
    },

    /// A serialized trait vector lacks a declared trait.
    #[error("trait vector is missing trait: {name}")]
    MissingTrait {
        /// The missing trait name.
        name: String,
    },

    /// No pending experience exists for the session.
    #[error("unknown session: {0}")]
    UnknownSession(ExperienceId),

    /// Memory is still at its cap after consolidation.
    #[error("memory full: {len} experiences with a cap of {cap}")]
    MemoryFull {
        /// The configured cap.
        cap: usize,
        /// The number of experiences held.
        len: usize,
    },

    /// A skill name is not part of the catalogue.
    #[error("unknown skill: {name}")]
    UnknownSkill {
        /// The offending name.
        name: String,
    },

    /// A strategy id was pruned earlier and may not be reinserted.
    #[error("strategy {0} was pruned and cannot be reinserted")]
    StrategyTombstoned(StrategyId),

    /// A parameter lies outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}
