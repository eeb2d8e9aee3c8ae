//! Per-agent evolutionary profile held by the population.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::{AgentId, FitnessComponent, GenerationPhase};

use crate::genotype::{Genotype, MutationRecord};

/// Maximum ancestry entries kept per profile.
pub const ANCESTRY_DEPTH: usize = 16;

/// Maximum mutation records kept per profile.
pub const MUTATION_LOG_CAP: usize = 64;

/// Everything the population knows about one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionaryProfile {
    /// The agent.
    pub agent_id: AgentId,
    /// Generation in which the agent entered the population.
    pub generation: u64,
    /// Inherited or registered genotype.
    pub genotype: Genotype,
    /// Overall fitness in `[min_fitness, 1]`.
    pub overall_fitness: f64,
    /// Last component scores.
    pub component_fitness: BTreeMap<FitnessComponent, f64>,
    /// Overall fitness per scored generation, oldest first.
    pub fitness_history: Vec<f64>,
    /// Parents first, then earlier ancestors.
    pub ancestry: Vec<AgentId>,
    /// Mutations applied when the agent was created.
    pub mutations: Vec<MutationRecord>,
    /// Lifecycle phase in the current generation.
    pub phase: GenerationPhase,
    /// Currently expressed trait values (behavioural and cultural), synced
    /// from the live agent.
    pub expressed: BTreeMap<String, f64>,
    /// Environmental penalty applied at the next scoring.
    #[serde(default)]
    pub pending_penalty: f64,
}

impl EvolutionaryProfile {
    /// Profile for a founding agent.
    pub fn founder(agent_id: AgentId, genotype: Genotype, generation: u64, fitness: f64) -> Self {
        let expressed = genotype.phenotype().expressed();
        Self {
            agent_id,
            generation,
            genotype,
            overall_fitness: fitness,
            component_fitness: BTreeMap::new(),
            fitness_history: Vec::new(),
            ancestry: Vec::new(),
            mutations: Vec::new(),
            phase: GenerationPhase::Alive,
            expressed,
            pending_penalty: 0.0,
        }
    }

    /// Ancestry for a child of `self` and `other`.
    pub fn child_ancestry(&self, other: &Self) -> Vec<AgentId> {
        let mut ancestry = vec![self.agent_id, other.agent_id];
        for id in self.ancestry.iter().chain(&other.ancestry) {
            if ancestry.len() >= ANCESTRY_DEPTH {
                break;
            }
            if !ancestry.contains(id) {
                ancestry.push(*id);
            }
        }
        ancestry
    }

    /// Append a fitness value, keeping at most `cap` entries.
    pub fn push_history(&mut self, fitness: f64, cap: usize) {
        self.fitness_history.push(fitness);
        let excess = self.fitness_history.len().saturating_sub(cap.max(1));
        if excess > 0 {
            self.fitness_history.drain(..excess);
        }
    }

    /// Expressed value of a trait, if known.
    pub fn expressed_value(&self, name: &str) -> Option<f64> {
        self.expressed.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercator_types::IdSource;

    #[test]
    fn ancestry_lists_parents_first_without_duplicates() {
        let mut ids = IdSource::new(1);
        let mut a = EvolutionaryProfile::founder(AgentId::next_from(&mut ids), Genotype::default(), 0, 0.5);
        let b = EvolutionaryProfile::founder(AgentId::next_from(&mut ids), Genotype::default(), 0, 0.5);
        let shared = AgentId::next_from(&mut ids);
        a.ancestry = vec![shared];
        let mut b = b;
        b.ancestry = vec![shared];
        let ancestry = a.child_ancestry(&b);
        assert_eq!(ancestry, vec![a.agent_id, b.agent_id, shared]);
    }

    #[test]
    fn history_is_capped() {
        let mut p = EvolutionaryProfile::founder(AgentId::new(), Genotype::default(), 0, 0.5);
        for i in 0..10 {
            p.push_history(f64::from(i) / 10.0, 4);
        }
        assert_eq!(p.fitness_history.len(), 4);
        assert!((p.fitness_history[0] - 0.6).abs() < 1e-9);
    }
}
