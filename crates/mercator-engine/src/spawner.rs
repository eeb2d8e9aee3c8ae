//! Seeding the simulation with an initial trader population.
//!
//! Every founding trader gets uniformly random trait values inside a
//! configurable band, plus a random skill ceiling and learning rate. The
//! draws come from a seeded RNG so a run is reproducible from its seed.

use std::collections::BTreeMap;

use mercator_agents::{AgentSpec, Trait};
use mercator_core::{EngineError, MercatorEngine};
use mercator_types::AgentId;
use rand::Rng;
use tracing::info;

/// Bands the founding traits are drawn from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FounderBands {
    /// Lowest trait value.
    pub trait_low: f64,
    /// Highest trait value.
    pub trait_high: f64,
    /// Lowest skill ceiling.
    pub potential_low: f64,
    /// Highest skill ceiling.
    pub potential_high: f64,
    /// Lowest learning rate.
    pub rate_low: f64,
    /// Highest learning rate.
    pub rate_high: f64,
}

impl Default for FounderBands {
    fn default() -> Self {
        Self {
            trait_low: 20.0,
            trait_high: 80.0,
            potential_low: 60.0,
            potential_high: 95.0,
            rate_low: 0.5,
            rate_high: 1.5,
        }
    }
}

/// A random founder spec.
pub fn random_spec(rng: &mut impl Rng, bands: &FounderBands) -> AgentSpec {
    let traits: BTreeMap<String, f64> = Trait::ALL
        .iter()
        .map(|t| {
            (
                t.as_str().to_owned(),
                rng.random_range(bands.trait_low..=bands.trait_high),
            )
        })
        .collect();
    AgentSpec {
        traits,
        max_potential: rng.random_range(bands.potential_low..=bands.potential_high),
        learning_rate: rng.random_range(bands.rate_low..=bands.rate_high),
        path: None,
    }
}

/// Create `count` random traders in the engine.
pub fn spawn_traders(
    engine: &mut MercatorEngine,
    count: usize,
    bands: &FounderBands,
    rng: &mut impl Rng,
) -> Result<Vec<AgentId>, EngineError> {
    let mut ids = Vec::with_capacity(count);
    for _ in 0..count {
        ids.push(engine.create_agent(&random_spec(rng, bands))?);
    }
    info!(
        traders = ids.len(),
        population = engine.len(),
        "founding traders spawned"
    );
    Ok(ids)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mercator_core::SimulationConfig;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn spawns_requested_count_with_unique_ids() {
        let mut engine = MercatorEngine::new(SimulationConfig::default()).unwrap();
        let mut rng = SmallRng::seed_from_u64(1);
        let ids = spawn_traders(&mut engine, 25, &FounderBands::default(), &mut rng).unwrap();
        assert_eq!(ids.len(), 25);
        assert_eq!(engine.len(), 25);
        assert_eq!(engine.population().len(), 25);
    }

    #[test]
    fn traits_stay_inside_the_band() {
        let bands = FounderBands::default();
        let spec = random_spec(&mut SmallRng::seed_from_u64(3), &bands);
        assert_eq!(spec.traits.len(), Trait::ALL.len());
        assert!(
            spec.traits
                .values()
                .all(|v| (bands.trait_low..=bands.trait_high).contains(v))
        );
        assert!((bands.rate_low..=bands.rate_high).contains(&spec.learning_rate));
    }

    #[test]
    fn same_seed_same_founders() {
        let bands = FounderBands::default();
        let a = random_spec(&mut SmallRng::seed_from_u64(9), &bands);
        let b = random_spec(&mut SmallRng::seed_from_u64(9), &bands);
        assert_eq!(a, b);
    }
}
