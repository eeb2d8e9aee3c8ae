//! Parent selection.
//!
//! The parent pool is filled to the target size by an elite slice followed
//! by weighted slices of the remaining selection kinds. Picks that repeat
//! an agent already in the pool are dropped, so the pool may end smaller
//! than the target.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;

use mercator_types::{AgentId, SelectionKind};

use crate::config::EvolutionConfig;
use crate::count_f64;

/// An agent eligible for selection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// The agent.
    pub id: AgentId,
    /// Overall fitness after modifiers.
    pub fitness: f64,
    /// Share of the population holding the agent's signature.
    pub signature_share: f64,
}

/// Result of one selection round.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionOutcome {
    /// Elites, fittest first.
    pub elites: Vec<AgentId>,
    /// Deduplicated parent pool, elites first.
    pub pool: Vec<AgentId>,
    /// Picks attempted per kind, before deduplication.
    pub slices: BTreeMap<SelectionKind, usize>,
}

/// Order by fitness descending, then id ascending.
pub fn by_fitness(a: &Candidate, b: &Candidate) -> Ordering {
    b.fitness.total_cmp(&a.fitness).then_with(|| a.id.cmp(&b.id))
}

/// Split `total` across kinds in proportion to their weights (largest
/// remainder, ties to declaration order).
pub fn slice_sizes(weights: &BTreeMap<SelectionKind, f64>, total: usize) -> BTreeMap<SelectionKind, usize> {
    let positive: Vec<(SelectionKind, f64)> = weights
        .iter()
        .filter(|(kind, w)| **kind != SelectionKind::Elite && w.is_finite() && **w > 0.0)
        .map(|(k, w)| (*k, *w))
        .collect();
    let sum: f64 = positive.iter().map(|(_, w)| w).sum();
    let mut sizes = BTreeMap::new();
    if sum <= 0.0 || total == 0 {
        return sizes;
    }
    let total_f = count_f64(total);
    let mut assigned = 0usize;
    let mut remainders = Vec::with_capacity(positive.len());
    for (kind, w) in &positive {
        let exact = total_f * w / sum;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let floor = exact.floor() as usize;
        sizes.insert(*kind, floor);
        assigned = assigned.saturating_add(floor);
        remainders.push((*kind, exact - exact.floor()));
    }
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    for (kind, _) in remainders.iter().cycle().take(total.saturating_sub(assigned)) {
        if let Some(size) = sizes.get_mut(kind) {
            *size = size.saturating_add(1);
        }
    }
    sizes
}

/// Roulette-wheel pick over non-negative weights.
fn roulette<R: Rng>(weights: &[f64], rng: &mut R) -> Option<usize> {
    let total: f64 = weights.iter().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    let mut point = rng.random_range(0.0..total);
    let mut last = None;
    for (i, w) in weights.iter().enumerate() {
        if !(w.is_finite() && *w > 0.0) {
            continue;
        }
        if point < *w {
            return Some(i);
        }
        point -= w;
        last = Some(i);
    }
    last
}

fn pick<R: Rng>(
    kind: SelectionKind,
    ranked: &[Candidate],
    tournament_size: usize,
    rng: &mut R,
) -> Option<AgentId> {
    let n = ranked.len();
    if n == 0 {
        return None;
    }
    let index = match kind {
        SelectionKind::Elite => Some(0),
        SelectionKind::Tournament => (0..tournament_size)
            .map(|_| rng.random_range(0..n))
            .min(),
        SelectionKind::FitnessProportionate => {
            let weights: Vec<f64> = ranked.iter().map(|c| c.fitness).collect();
            roulette(&weights, rng)
        }
        SelectionKind::FrequencyDependent => {
            let weights: Vec<f64> = ranked
                .iter()
                .map(|c| (1.0 - c.signature_share).max(0.01))
                .collect();
            roulette(&weights, rng)
        }
        SelectionKind::UniformRandom => Some(rng.random_range(0..n)),
        SelectionKind::Rank => {
            let weights: Vec<f64> = (0..n).map(|i| count_f64(n.saturating_sub(i))).collect();
            roulette(&weights, rng)
        }
    };
    index.and_then(|i| ranked.get(i)).map(|c| c.id)
}

/// Fill a parent pool of up to `target` agents.
///
/// When `diversity_boost` is set the frequency-dependent weight is raised
/// by `config.diversity_boost` for this round.
pub fn select_parents<R: Rng>(
    candidates: &[Candidate],
    target: usize,
    diversity_boost: bool,
    config: &EvolutionConfig,
    rng: &mut R,
) -> SelectionOutcome {
    let mut ranked = candidates.to_vec();
    ranked.sort_by(by_fitness);

    let elite_count = config.elite_count(ranked.len()).min(target);
    let elites: Vec<AgentId> = ranked.iter().take(elite_count).map(|c| c.id).collect();

    let mut weights = config.selection_weights.clone();
    if diversity_boost {
        let w = weights.entry(SelectionKind::FrequencyDependent).or_insert(0.0);
        *w += config.diversity_boost;
    }
    let mut slices = slice_sizes(&weights, target.saturating_sub(elite_count));
    slices.insert(SelectionKind::Elite, elite_count);

    let mut seen: BTreeSet<AgentId> = elites.iter().copied().collect();
    let mut pool = elites.clone();
    let tournament_size = config.tournament_size();
    for (kind, count) in &slices {
        if *kind == SelectionKind::Elite {
            continue;
        }
        for _ in 0..*count {
            if let Some(id) = pick(*kind, &ranked, tournament_size, rng)
                && seen.insert(id)
            {
                pool.push(id);
            }
        }
    }

    tracing::debug!(
        candidates = ranked.len(),
        elites = elites.len(),
        pool = pool.len(),
        diversity_boost,
        "parents selected"
    );

    SelectionOutcome {
        elites,
        pool,
        slices,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercator_types::IdSource;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn candidates(n: usize) -> Vec<Candidate> {
        let mut ids = IdSource::new(4);
        (0..n)
            .map(|i| Candidate {
                id: AgentId::next_from(&mut ids),
                fitness: count_f64(i + 1) / count_f64(n),
                signature_share: 0.1,
            })
            .collect()
    }

    #[test]
    fn default_slices_fill_the_remainder() {
        let config = EvolutionConfig::default();
        let sizes = slice_sizes(&config.selection_weights, 900);
        assert_eq!(sizes.values().sum::<usize>(), 900);
        assert_eq!(sizes[&SelectionKind::Tournament], 360);
        assert_eq!(sizes[&SelectionKind::FitnessProportionate], 270);
        assert_eq!(sizes[&SelectionKind::FrequencyDependent], 180);
        assert_eq!(sizes[&SelectionKind::UniformRandom], 90);
        assert!(!sizes.contains_key(&SelectionKind::Rank));
    }

    #[test]
    fn elites_are_the_fittest_and_lead_the_pool() {
        let config = EvolutionConfig::default();
        let all = candidates(50);
        let mut rng = SmallRng::seed_from_u64(1);
        let outcome = select_parents(&all, 50, false, &config, &mut rng);
        assert_eq!(outcome.elites.len(), 5);
        let mut ranked = all.clone();
        ranked.sort_by(by_fitness);
        let top: Vec<AgentId> = ranked.iter().take(5).map(|c| c.id).collect();
        assert_eq!(outcome.elites, top);
        assert_eq!(&outcome.pool[..5], &top[..]);
    }

    #[test]
    fn pool_has_no_duplicates_and_respects_target() {
        let config = EvolutionConfig::default();
        let all = candidates(40);
        let mut rng = SmallRng::seed_from_u64(9);
        let outcome = select_parents(&all, 40, true, &config, &mut rng);
        let unique: BTreeSet<AgentId> = outcome.pool.iter().copied().collect();
        assert_eq!(unique.len(), outcome.pool.len());
        assert!(outcome.pool.len() <= 40);
    }

    #[test]
    fn same_seed_same_pool() {
        let config = EvolutionConfig::default();
        let all = candidates(30);
        let a = select_parents(&all, 30, false, &config, &mut SmallRng::seed_from_u64(3));
        let b = select_parents(&all, 30, false, &config, &mut SmallRng::seed_from_u64(3));
        assert_eq!(a, b);
    }

    #[test]
    fn diversity_boost_grows_the_frequency_slice() {
        let config = EvolutionConfig::default();
        let all = candidates(100);
        let plain = select_parents(&all, 100, false, &config, &mut SmallRng::seed_from_u64(5));
        let boosted = select_parents(&all, 100, true, &config, &mut SmallRng::seed_from_u64(5));
        assert!(
            boosted.slices[&SelectionKind::FrequencyDependent]
                > plain.slices[&SelectionKind::FrequencyDependent]
        );
    }
}
