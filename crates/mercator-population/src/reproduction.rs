//! Pairing, crossover and mutation of the parent pool.
//!
//! The pool is shuffled and split into consecutive pairs. Each pair
//! reproduces with probability `crossover_rate`, yielding one
//! primary-dominant child (the fitter parent is primary) and one
//! balanced-blend child. Offspring beyond `capacity` are discarded.

use std::collections::BTreeMap;

use rand::Rng;
use rand::seq::SliceRandom;

use mercator_types::{AgentId, GenerationPhase, IdSource};

use crate::config::EvolutionConfig;
use crate::genotype::{self, Genotype};
use crate::profile::EvolutionaryProfile;

/// A newly created individual, not yet part of the population.
#[derive(Debug, Clone, PartialEq)]
pub struct Offspring {
    /// Profile of the new agent.
    pub profile: EvolutionaryProfile,
    /// Primary and secondary parent.
    pub parents: (AgentId, AgentId),
}

/// Result of one reproduction round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReproductionOutcome {
    /// Offspring kept, in creation order.
    pub offspring: Vec<Offspring>,
    /// Offspring discarded by the capacity limit.
    pub discarded: usize,
    /// Pairs that reproduced.
    pub reproducing_pairs: usize,
    /// Gene mutations applied to kept offspring.
    pub mutations: usize,
}

fn child(
    genotype: Genotype,
    primary: &EvolutionaryProfile,
    secondary: &EvolutionaryProfile,
    generation: u64,
    ids: &mut IdSource,
    config: &EvolutionConfig,
    rng: &mut impl Rng,
) -> Offspring {
    let mut genotype = genotype;
    let mutations = genotype::mutate(
        &mut genotype,
        config.mutation_rate,
        config.mutation_sigma,
        generation,
        rng,
    );
    let mut profile = EvolutionaryProfile::founder(
        AgentId::next_from(ids),
        genotype,
        generation,
        f64::midpoint(primary.overall_fitness, secondary.overall_fitness),
    );
    profile.ancestry = primary.child_ancestry(secondary);
    profile.mutations = mutations;
    profile.mutations.truncate(crate::profile::MUTATION_LOG_CAP);
    Offspring {
        profile,
        parents: (primary.agent_id, secondary.agent_id),
    }
}

/// Produce offspring from the parent pool.
///
/// Parents that reproduce are moved to [`GenerationPhase::Parent`].
pub fn reproduce<R: Rng>(
    pool: &[AgentId],
    profiles: &mut BTreeMap<AgentId, EvolutionaryProfile>,
    capacity: usize,
    generation: u64,
    ids: &mut IdSource,
    config: &EvolutionConfig,
    rng: &mut R,
) -> ReproductionOutcome {
    let mut order = pool.to_vec();
    order.shuffle(rng);

    let rate = if config.crossover_rate.is_finite() {
        config.crossover_rate.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut outcome = ReproductionOutcome::default();
    for pair in order.chunks_exact(2) {
        let [a, b] = pair else { continue };
        if !rng.random_bool(rate) {
            continue;
        }
        let (Some(pa), Some(pb)) = (profiles.get(a), profiles.get(b)) else {
            continue;
        };
        let (primary, secondary) = if pb.overall_fitness > pa.overall_fitness { (pb, pa) } else { (pa, pb) };
        outcome.reproducing_pairs = outcome.reproducing_pairs.saturating_add(1);

        let genotypes = [
            genotype::primary_dominant(&primary.genotype, &secondary.genotype),
            genotype::balanced_blend(&primary.genotype, &secondary.genotype),
        ];
        for g in genotypes {
            if outcome.offspring.len() >= capacity {
                outcome.discarded = outcome.discarded.saturating_add(1);
                continue;
            }
            let offspring = child(g, primary, secondary, generation, ids, config, rng);
            outcome.mutations = outcome.mutations.saturating_add(offspring.profile.mutations.len());
            outcome.offspring.push(offspring);
        }

        for id in [*a, *b] {
            if let Some(p) = profiles.get_mut(&id) {
                p.phase = GenerationPhase::Parent;
            }
        }
    }

    tracing::debug!(
        generation,
        pairs = outcome.reproducing_pairs,
        offspring = outcome.offspring.len(),
        discarded = outcome.discarded,
        mutations = outcome.mutations,
        "reproduction complete"
    );
    outcome
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::genotype::LearningProfile;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn population(n: usize, ids: &mut IdSource) -> BTreeMap<AgentId, EvolutionaryProfile> {
        (0..n)
            .map(|i| {
                let id = AgentId::next_from(ids);
                let value = f64::from(u32::try_from(i).unwrap()) * 3.0;
                let genotype = Genotype::encode(
                    &BTreeMap::from([("cooperation".to_owned(), value)]),
                    &BTreeMap::new(),
                    LearningProfile::default(),
                )
                .unwrap();
                (id, EvolutionaryProfile::founder(id, genotype, 0, 0.5))
            })
            .collect()
    }

    #[test]
    fn certain_crossover_gives_two_children_per_pair() {
        let mut ids = IdSource::new(2);
        let mut profiles = population(10, &mut ids);
        let pool: Vec<AgentId> = profiles.keys().copied().collect();
        let config = EvolutionConfig {
            crossover_rate: 1.0,
            mutation_rate: 0.0,
            ..EvolutionConfig::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = reproduce(&pool, &mut profiles, 100, 1, &mut ids, &config, &mut rng);
        assert_eq!(outcome.reproducing_pairs, 5);
        assert_eq!(outcome.offspring.len(), 10);
        assert_eq!(outcome.mutations, 0);
        assert!(profiles.values().all(|p| p.phase == GenerationPhase::Parent));
        for o in &outcome.offspring {
            assert_eq!(o.profile.generation, 1);
            assert_eq!(&o.profile.ancestry[..2], &[o.parents.0, o.parents.1]);
            assert!(!profiles.contains_key(&o.profile.agent_id));
        }
    }

    #[test]
    fn capacity_discards_extras() {
        let mut ids = IdSource::new(3);
        let mut profiles = population(8, &mut ids);
        let pool: Vec<AgentId> = profiles.keys().copied().collect();
        let config = EvolutionConfig {
            crossover_rate: 1.0,
            ..EvolutionConfig::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = reproduce(&pool, &mut profiles, 3, 1, &mut ids, &config, &mut rng);
        assert_eq!(outcome.offspring.len(), 3);
        assert_eq!(outcome.discarded, 5);
    }

    #[test]
    fn zero_crossover_produces_nothing() {
        let mut ids = IdSource::new(5);
        let mut profiles = population(6, &mut ids);
        let pool: Vec<AgentId> = profiles.keys().copied().collect();
        let config = EvolutionConfig {
            crossover_rate: 0.0,
            ..EvolutionConfig::default()
        };
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = reproduce(&pool, &mut profiles, 100, 1, &mut ids, &config, &mut rng);
        assert!(outcome.offspring.is_empty());
        assert!(profiles.values().all(|p| p.phase == GenerationPhase::Alive));
    }
}
