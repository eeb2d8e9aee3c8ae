//! Versioned JSON export blobs.
//!
//! Two layouts exist: a single agent with its evolutionary profile, and the
//! whole engine. Both carry `schema_version`; readers reject any version
//! other than [`SCHEMA_VERSION`] before decoding the rest.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_agents::TraderAgent;
use mercator_population::{EvolutionaryProfile, PopulationState};
use mercator_types::{AgentId, EmergentBehavior, IdSource};

use crate::clock::SimClock;
use crate::error::EngineError;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct VersionHeader {
    schema_version: u32,
}

fn check_version(blob: &str) -> Result<(), EngineError> {
    let header: VersionHeader = serde_json::from_str(blob)?;
    if header.schema_version == SCHEMA_VERSION {
        Ok(())
    } else {
        Err(EngineError::UnsupportedSchema {
            found: header.schema_version,
            expected: SCHEMA_VERSION,
        })
    }
}

/// One agent and its evolutionary profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentExport {
    /// Layout version.
    pub schema_version: u32,
    /// Trait vector, memory log, relationships, skills and strategies.
    pub agent: TraderAgent,
    /// Profile held by the population, if the agent was registered.
    pub evolutionary_profile: Option<EvolutionaryProfile>,
}

impl AgentExport {
    /// Wrap an agent for export.
    pub const fn new(agent: TraderAgent, evolutionary_profile: Option<EvolutionaryProfile>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            agent,
            evolutionary_profile,
        }
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, checking the schema version first.
    pub fn from_json(blob: &str) -> Result<Self, EngineError> {
        check_version(blob)?;
        Ok(serde_json::from_str(blob)?)
    }
}

/// The whole engine at a point in simulated time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationExport {
    /// Layout version.
    pub schema_version: u32,
    /// Last completed generation.
    pub generation: u64,
    /// Simulated clock.
    pub clock: SimClock,
    /// Engine id source.
    pub ids: IdSource,
    /// Every live agent.
    pub agents: BTreeMap<AgentId, TraderAgent>,
    /// Population state (profiles, pressures, emergence log).
    pub population: PopulationState,
    /// Population-wide cultural norms at export time.
    pub cultural_norms: BTreeMap<String, f64>,
    /// Emergent behaviours recorded so far.
    pub emergent_behaviors: Vec<EmergentBehavior>,
    /// Time of the last emergence pass.
    pub last_emergence: DateTime<Utc>,
    /// Time of the last culture pass.
    pub last_culture: DateTime<Utc>,
}

impl PopulationExport {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON, checking the schema version first.
    pub fn from_json(blob: &str) -> Result<Self, EngineError> {
        check_version(blob)?;
        Ok(serde_json::from_str(blob)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn future_schema_is_rejected_before_decoding() {
        let blob = r#"{"schema_version": 2, "agent": "not an agent"}"#;
        assert!(matches!(
            AgentExport::from_json(blob),
            Err(EngineError::UnsupportedSchema { found: 2, expected: 1 })
        ));
    }

    #[test]
    fn missing_version_is_a_serialization_error() {
        assert!(matches!(
            AgentExport::from_json("{}"),
            Err(EngineError::Serialization { .. })
        ));
    }
}
