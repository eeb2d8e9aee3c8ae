//! Trader agents for the Mercator simulation.
//!
//! This crate holds everything that operates on a single trader without
//! touching I/O or the population: personality, memory, relationships,
//! emotion, habits, strategies, skills, decision synthesis and learning.
//! The engine in `mercator-core` owns a map of [`TraderAgent`]s and drives
//! them through [`TraderAgent::decide`] and [`TraderAgent::report_outcome`].
//!
//! # Modules
//!
//! - [`agent`] -- The [`TraderAgent`] aggregate, creation and snapshots
//! - [`behavior`] -- Habits, impulse control and social adaptation
//! - [`config`] -- Tunable parameters ([`AgentConfig`])
//! - [`decision`] -- Candidate scoring and decision synthesis
//! - [`emotion`] -- Emotional state, residues and regulation
//! - [`error`] -- Error types for agent operations ([`AgentError`])
//! - [`learning`] -- Outcome reporting and its effects on every subsystem
//! - [`memory`] -- Experience store, recall and consolidation
//! - [`relationships`] -- Per-counterparty trust and classification
//! - [`skills`] -- Skill levels, milestones and specialization paths
//! - [`strategy`] -- Learned strategies and their fitness
//! - [`traits`] -- The fixed-schema trait vector and derived profiles

pub mod agent;
pub mod behavior;
pub mod config;
pub mod decision;
pub mod emotion;
pub mod error;
pub mod learning;
pub mod memory;
pub mod relationships;
pub mod skills;
pub mod strategy;
pub mod traits;

// Re-export primary types at crate root for convenience.
pub use agent::{AgentSnapshot, AgentSpec, AgentStats, GenerationMaintenance, TraderAgent};
pub use config::AgentConfig;
pub use emotion::{EmotionalReading, EmotionalState};
pub use error::AgentError;
pub use memory::{Experience, ExperienceStatus, MemoryStore};
pub use relationships::{Relationship, RelationshipGraph};
pub use skills::{Skill, SkillSet, SpecializationPath};
pub use strategy::{Strategy, StrategyLibrary};
pub use traits::{Trait, TraitCategory, TraitVector};
