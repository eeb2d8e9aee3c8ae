//! Events emitted by the engine to its subscribers.
//!
//! Events are serialized with an internal `event` tag so that a JSON stream
//! of them can be filtered on a single key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{OutcomeClass, TradeAction, TriggerKind};
use crate::ids::{AgentId, ExperienceId};
use crate::structs::{EmergentBehavior, MilestoneRecord};

/// An event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(tag = "event", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EngineEvent {
    /// An agent produced a decision.
    DecisionMade {
        /// The deciding agent.
        agent_id: AgentId,
        /// Session id of the decision.
        session_id: ExperienceId,
        /// The chosen action.
        action: TradeAction,
        /// Confidence in the action.
        confidence: f64,
    },
    /// An outcome was reported and learned from.
    OutcomeReported {
        /// The learning agent.
        agent_id: AgentId,
        /// The resolved session.
        session_id: ExperienceId,
        /// Outcome class applied.
        outcome_class: OutcomeClass,
        /// Significance assigned to the experience.
        significance: f64,
    },
    /// A trait changed through learning.
    TraitEvolved {
        /// The agent whose trait changed.
        agent_id: AgentId,
        /// Trait name.
        trait_name: String,
        /// Trigger that caused the change.
        trigger: TriggerKind,
        /// Value before the change.
        before: f64,
        /// Value after the change.
        after: f64,
    },
    /// A skill milestone fired.
    MilestoneReached {
        /// The agent reaching the milestone.
        agent_id: AgentId,
        /// The milestone.
        milestone: MilestoneRecord,
    },
    /// A generation tick completed.
    GenerationProcessed {
        /// Generation number.
        generation: u64,
        /// Population size after the tick.
        population: usize,
        /// Mean overall fitness.
        mean_fitness: f64,
        /// Shannon diversity index.
        diversity_index: f64,
    },
    /// A new behavioural cluster was detected.
    EmergentBehavior {
        /// The detected behaviour.
        behavior: EmergentBehavior,
    },
    /// Offspring were discarded by the hard population cap.
    PopulationOverflow {
        /// Generation of the overflow.
        generation: u64,
        /// Number of offspring discarded.
        discarded: usize,
        /// Hard cap in effect.
        hard_cap: usize,
    },
    /// An agent was not scored before the generation deadline.
    ScheduleMissed {
        /// Generation of the miss.
        generation: u64,
        /// The agent that kept its previous fitness.
        agent_id: AgentId,
        /// Fitness carried over.
        carried_fitness: f64,
    },
}

impl EngineEvent {
    /// Stable event name, equal to the serialized tag.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::DecisionMade { .. } => "decision_made",
            Self::OutcomeReported { .. } => "outcome_reported",
            Self::TraitEvolved { .. } => "trait_evolved",
            Self::MilestoneReached { .. } => "milestone_reached",
            Self::GenerationProcessed { .. } => "generation_processed",
            Self::EmergentBehavior { .. } => "emergent_behavior",
            Self::PopulationOverflow { .. } => "population_overflow",
            Self::ScheduleMissed { .. } => "schedule_missed",
        }
    }
}

/// An event with its position in the engine's event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EventEnvelope {
    /// Monotonic sequence number, starting at 1.
    pub sequence: u64,
    /// Simulated emission time.
    pub emitted_at: DateTime<Utc>,
    /// The event.
    pub event: EngineEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_matches_name() {
        let event = EngineEvent::PopulationOverflow {
            generation: 3,
            discarded: 2,
            hard_cap: 10,
        };
        let json = serde_json::to_value(&event).ok();
        let tag = json
            .as_ref()
            .and_then(|v| v.get("event"))
            .and_then(|v| v.as_str())
            .map(str::to_owned);
        assert_eq!(tag.as_deref(), Some(event.name()));
    }
}
