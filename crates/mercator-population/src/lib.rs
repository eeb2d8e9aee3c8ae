//! Generational evolution of the Mercator trader population.
//!
//! The population is modelled through one [`EvolutionaryProfile`] per
//! agent: a genotype, fitness scores and ancestry. [`PopulationEngine`]
//! runs the generation tick over those profiles (fitness evaluation,
//! environmental adaptation, selection, reproduction, eviction and
//! diversity maintenance) and leaves the live agents to the caller.
//!
//! # Modules
//!
//! - [`config`] -- Evolution and fitness parameters ([`EvolutionConfig`])
//! - [`culture`] -- Cultural norms and their diffusion
//! - [`emergence`] -- Behavioural signatures, diversity and emergent clusters
//! - [`environment`] -- Environmental changes and evolutionary pressures
//! - [`error`] -- Error types ([`PopulationError`])
//! - [`fitness`] -- Multi-component fitness evaluation
//! - [`genotype`] -- Genes, crossover and mutation
//! - [`population`] -- The engine and its generation tick
//! - [`profile`] -- Per-agent evolutionary profile
//! - [`reproduction`] -- Pairing and offspring creation
//! - [`selection`] -- Elite preservation and mixed-strategy parent selection

pub mod config;
pub mod culture;
pub mod emergence;
pub mod environment;
pub mod error;
pub mod fitness;
pub mod genotype;
pub mod population;
pub mod profile;
pub mod reproduction;
pub mod selection;

pub use config::{EvolutionConfig, FitnessConfig};
pub use culture::CultureReport;
pub use emergence::EmergenceDetector;
pub use environment::{Environment, PressureRule};
pub use error::PopulationError;
pub use fitness::{FitnessContext, FitnessEvaluator, FitnessInputs, WeightedFitness};
pub use genotype::{Gene, Genotype, GenotypeSection, LearningProfile, Phenotype};
pub use population::{PopulationEngine, PopulationState, TickOutcome};
pub use profile::EvolutionaryProfile;
pub use reproduction::Offspring;

/// Lossless-enough conversion of a count to `f64`.
pub(crate) fn count_f64(n: usize) -> f64 {
    f64::from(u32::try_from(n).unwrap_or(u32::MAX))
}
