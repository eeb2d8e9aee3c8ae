//! Shared type definitions for the Mercator trader-behaviour simulation.
//!
//! This crate is the single source of truth for the records exchanged
//! between the engine and its collaborators. Types flow downstream to
//! `TypeScript` via `ts-rs` for external dashboards.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers and the deterministic [`IdSource`]
//! - [`enums`] -- Closed sets (situations, actions, emotions, selection kinds)
//! - [`structs`] -- Inputs, decision and learning records, population reports
//! - [`events`] -- Events emitted to subscribers

pub mod enums;
pub mod events;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    DecisionStyle, DecisionTiming, Emotion, ExperienceKind, FitnessComponent, GenerationPhase,
    MilestoneReward, OutcomeClass, RelationshipClass, RiskLevel, SelectionKind, SituationType,
    TradeAction, TriggerKind,
};
pub use events::{EngineEvent, EventEnvelope};
pub use ids::{AgentId, EmergentBehaviorId, ExperienceId, IdSource, StrategyId, splitmix64};
pub use structs::{
    Context, DecisionFlags, DecisionRecord, EmergentBehavior, EnvironmentalChange,
    EvolutionaryPressure, FactorContribution, GenerationReport, LearningRecord, MarketState,
    MilestoneRecord, Outcome, PopulationStatus, RiskAssessment, SkillGain, Situation,
    SocialContext, StrategyFitnessUpdate, TraitChange,
};
