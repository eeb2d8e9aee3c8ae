//! Engine facade, simulated clock and generation runner for Mercator.
//!
//! [`MercatorEngine`] owns the live trader agents and the population engine
//! and keeps the two consistent: decisions and learning go to the agents,
//! the generation tick goes to the population, and the engine applies the
//! tick's evictions and offspring back onto the agent set.
//!
//! # Modules
//!
//! - [`clock`] -- Simulated clock.
//! - [`config`] -- Configuration loading from `mercator-config.yaml` into
//!   strongly-typed structs.
//! - [`engine`] -- The [`MercatorEngine`] facade.
//! - [`error`] -- [`EngineError`] and [`RunnerError`].
//! - [`events`] -- Retained, broadcast engine event log.
//! - [`persistence`] -- Versioned JSON export of agents and whole engines.
//! - [`runner`] -- Async generation loop with pause, resume and stop.

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod persistence;
pub mod runner;

pub use clock::SimClock;
pub use config::{ConfigError, SimulationConfig};
pub use engine::MercatorEngine;
pub use error::{EngineError, RunnerError};
pub use events::EventBus;
pub use persistence::{AgentExport, PopulationExport, SCHEMA_VERSION};
pub use runner::{
    GenerationHook, NoOpHook, RunEndReason, RunResult, RunnerControl, run_generations,
};
