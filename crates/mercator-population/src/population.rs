//! The population engine and its generation tick.
//!
//! The engine owns every agent's [`EvolutionaryProfile`] and nothing else;
//! the live agents belong to the caller, which feeds per-agent
//! [`FitnessInputs`] into [`PopulationEngine::tick`] and applies the
//! returned offspring and evictions.
//!
//! A tick works on a staged copy of the state and commits it only after
//! every invariant holds, so a failed tick leaves the population at the
//! last barrier.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};

use mercator_types::{
    AgentId, EmergentBehavior, EngineEvent, EnvironmentalChange, EvolutionaryPressure,
    FitnessComponent, GenerationPhase, GenerationReport, IdSource, PopulationStatus,
};

use crate::config::EvolutionConfig;
use crate::count_f64;
use crate::culture::{self, CultureReport};
use crate::emergence::{self, EmergenceDetector};
use crate::environment::Environment;
use crate::error::PopulationError;
use crate::fitness::{self, FitnessContext, FitnessEvaluator, FitnessInputs, WeightedFitness};
use crate::genotype::{Genotype, LearningProfile};
use crate::profile::EvolutionaryProfile;
use crate::reproduction::{self, Offspring};
use crate::selection::{self, Candidate};

/// Serializable population state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationState {
    /// Last completed generation.
    pub generation: u64,
    /// Profiles by agent.
    pub profiles: BTreeMap<AgentId, EvolutionaryProfile>,
    /// Active environmental pressures.
    pub environment: Environment,
    /// Emergent behaviours seen so far.
    pub emergence: EmergenceDetector,
    /// Whether the next selection boosts the frequency-dependent slice.
    pub diversity_boost: bool,
    /// Shannon diversity after the last tick.
    pub diversity_index: f64,
    /// Source of offspring ids and tick RNG seeds.
    pub ids: IdSource,
}

impl PopulationState {
    fn new(ids: IdSource) -> Self {
        Self {
            generation: 0,
            profiles: BTreeMap::new(),
            environment: Environment::new(),
            emergence: EmergenceDetector::new(),
            diversity_boost: false,
            diversity_index: 0.0,
            ids,
        }
    }
}

/// What a successful tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    /// Generation summary.
    pub report: GenerationReport,
    /// Offspring that survived eviction; the caller creates their agents.
    pub offspring: Vec<Offspring>,
    /// Agents removed from the population; the caller drops them.
    pub evicted: Vec<AgentId>,
    /// Events to publish, in order.
    pub events: Vec<EngineEvent>,
}

/// Generational engine over the registered agents.
pub struct PopulationEngine {
    state: PopulationState,
    config: EvolutionConfig,
    evaluator: Box<dyn FitnessEvaluator>,
}

impl fmt::Debug for PopulationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PopulationEngine")
            .field("generation", &self.state.generation)
            .field("size", &self.state.profiles.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PopulationEngine {
    /// Create an empty population with the default evaluator.
    pub fn new(config: EvolutionConfig, ids: IdSource) -> Result<Self, PopulationError> {
        Self::from_state(PopulationState::new(ids), config)
    }

    /// Restore a population from saved state.
    pub fn from_state(state: PopulationState, config: EvolutionConfig) -> Result<Self, PopulationError> {
        config.validate()?;
        Ok(Self {
            state,
            config,
            evaluator: Box::new(WeightedFitness),
        })
    }

    /// Replace the fitness evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Box<dyn FitnessEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    // --- Accessors ---

    /// Saved state.
    pub const fn state(&self) -> &PopulationState {
        &self.state
    }

    /// Configuration.
    pub const fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// Last completed generation.
    pub const fn generation(&self) -> u64 {
        self.state.generation
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.state.profiles.len()
    }

    /// Whether no agent is registered.
    pub fn is_empty(&self) -> bool {
        self.state.profiles.is_empty()
    }

    /// Whether an agent is registered.
    pub fn contains(&self, id: AgentId) -> bool {
        self.state.profiles.contains_key(&id)
    }

    /// Profile of one agent.
    pub fn profile(&self, id: AgentId) -> Option<&EvolutionaryProfile> {
        self.state.profiles.get(&id)
    }

    /// Every profile.
    pub const fn profiles(&self) -> &BTreeMap<AgentId, EvolutionaryProfile> {
        &self.state.profiles
    }

    /// Emergent behaviours recorded so far.
    pub fn emergent_behaviors(&self) -> &[EmergentBehavior] {
        self.state.emergence.log()
    }

    // --- Membership ---

    /// Register an agent from its current dispositions.
    pub fn register(
        &mut self,
        id: AgentId,
        personality: &BTreeMap<String, f64>,
        culture: &BTreeMap<String, f64>,
        learning: LearningProfile,
    ) -> Result<(), PopulationError> {
        if self.contains(id) {
            return Err(PopulationError::DuplicateAgent(id));
        }
        let genotype = Genotype::encode(personality, culture, learning)?;
        let profile = EvolutionaryProfile::founder(
            id,
            genotype,
            self.state.generation,
            self.config.fitness.neutral_score,
        );
        self.state.profiles.insert(id, profile);
        tracing::debug!(agent_id = %id, generation = self.state.generation, "agent registered");
        Ok(())
    }

    /// Insert a previously exported profile.
    pub fn import_profile(&mut self, profile: EvolutionaryProfile) -> Result<(), PopulationError> {
        let id = profile.agent_id;
        if self.contains(id) {
            return Err(PopulationError::DuplicateAgent(id));
        }
        self.state.profiles.insert(id, profile);
        Ok(())
    }

    /// Remove an agent.
    pub fn deregister(&mut self, id: AgentId) -> Result<EvolutionaryProfile, PopulationError> {
        self.state
            .profiles
            .remove(&id)
            .ok_or(PopulationError::UnknownAgent(id))
    }

    /// Update the trait values an agent currently expresses.
    pub fn sync_expressed(
        &mut self,
        id: AgentId,
        expressed: &BTreeMap<String, f64>,
    ) -> Result<(), PopulationError> {
        let profile = self
            .state
            .profiles
            .get_mut(&id)
            .ok_or(PopulationError::UnknownAgent(id))?;
        for (name, value) in expressed {
            profile.expressed.insert(name.clone(), value.clamp(0.0, 100.0));
        }
        Ok(())
    }

    /// Behavioural signature of every agent.
    pub fn signatures(&self) -> BTreeMap<AgentId, String> {
        self.state
            .profiles
            .iter()
            .map(|(id, p)| (*id, emergence::signature(&p.expressed, &self.config)))
            .collect()
    }

    // --- Environment, emergence, culture ---

    /// Activate the pressures an environmental change triggers.
    pub fn apply_environmental_change(
        &mut self,
        change: &EnvironmentalChange,
    ) -> Vec<EvolutionaryPressure> {
        self.state
            .environment
            .apply_change(change, &self.config.pressure_rules)
    }

    /// Activate a pressure directly.
    pub fn add_pressure(&mut self, pressure: EvolutionaryPressure) {
        self.state.environment.add_pressure(pressure);
    }

    /// Detect new behavioural clusters.
    pub fn detect_emergence(&mut self, now: DateTime<Utc>) -> Vec<EmergentBehavior> {
        let signatures = self.signatures();
        self.state.emergence.detect(
            &signatures,
            self.state.generation,
            now,
            self.config.emergence_detection_threshold,
            &mut self.state.ids,
        )
    }

    /// Diffuse cultural norms along the given links.
    pub fn evolve_culture(&mut self, links: &BTreeMap<AgentId, Vec<AgentId>>) -> CultureReport {
        culture::diffuse(
            &mut self.state.profiles,
            links,
            self.config.cultural_transmission_rate,
        )
    }

    /// Population-wide cultural norms.
    pub fn cultural_norms(&self) -> BTreeMap<String, f64> {
        culture::cultural_norms(&self.state.profiles)
    }

    /// Point-in-time status.
    pub fn status(&self) -> PopulationStatus {
        PopulationStatus {
            generation: self.state.generation,
            size: self.len(),
            target_size: self.config.population_size,
            mean_fitness: mean(self.state.profiles.values().map(|p| p.overall_fitness)),
            diversity_index: self.state.diversity_index,
            emergent_behaviors: self.state.emergence.log().len(),
            cultural_norms: self.cultural_norms(),
            active_pressures: self.state.environment.active().len(),
        }
    }

    // --- Generation tick ---

    /// Run one generation.
    ///
    /// Agents without an entry in `inputs` missed the scoring deadline:
    /// they keep their previous fitness and a `ScheduleMissed` event is
    /// emitted for each.
    pub fn tick(
        &mut self,
        inputs: &BTreeMap<AgentId, FitnessInputs>,
        now: DateTime<Utc>,
    ) -> Result<TickOutcome, PopulationError> {
        let config = &self.config;
        let mut next = self.state.clone();
        let generation = next.generation.checked_add(1).ok_or_else(|| {
            PopulationError::InvariantViolation {
                generation: next.generation,
                detail: "generation counter overflow".to_owned(),
            }
        })?;
        let population_before = next.profiles.len();
        let mut rng = SmallRng::seed_from_u64(next.ids.next_u64());
        let mut events = Vec::new();

        // 1. Fitness evaluation.
        let signatures: BTreeMap<AgentId, String> = next
            .profiles
            .iter()
            .map(|(id, p)| (*id, emergence::signature(&p.expressed, config)))
            .collect();
        let counts = emergence::signature_counts(signatures.values());
        let population = count_f64(population_before.max(1));
        let share_of = |id: &AgentId| {
            signatures
                .get(id)
                .and_then(|s| counts.get(s))
                .map_or(0.0, |c| count_f64(*c) / population)
        };
        let norms = culture::cultural_norms(&next.profiles);

        let mut scored: BTreeMap<AgentId, f64> = BTreeMap::new();
        let mut schedule_missed = Vec::new();
        let mut pressure_penalized = 0usize;
        for (id, profile) in &mut next.profiles {
            let share = share_of(id);
            if let Some(input) = inputs.get(id) {
                let context = FitnessContext {
                    signature_share: share,
                    cultural_norms: &norms,
                    config: &config.fitness,
                };
                let components = self.evaluator.components(input, profile, &context);
                let mut overall = fitness::aggregate(&components, &config.fitness);
                if profile.pending_penalty > 0.0 {
                    overall -= profile.pending_penalty;
                    pressure_penalized = pressure_penalized.saturating_add(1);
                }
                overall *= fitness::frequency_multiplier(share, config);
                profile.component_fitness = components;
                scored.insert(*id, overall);
            } else {
                tracing::warn!(
                    agent_id = %id,
                    generation,
                    carried_fitness = profile.overall_fitness,
                    "agent missed the scoring deadline"
                );
                schedule_missed.push(*id);
                events.push(EngineEvent::ScheduleMissed {
                    generation,
                    agent_id: *id,
                    carried_fitness: profile.overall_fitness,
                });
            }
            profile.pending_penalty = 0.0;
        }

        // Group modifier: cooperation of the agent's signature group.
        let mut groups: BTreeMap<&str, (f64, u32)> = BTreeMap::new();
        for id in scored.keys() {
            if let (Some(sig), Some(p)) = (signatures.get(id), next.profiles.get(id)) {
                let coop = p
                    .component_fitness
                    .get(&FitnessComponent::SocialCooperation)
                    .copied()
                    .unwrap_or(0.0);
                let entry = groups.entry(sig.as_str()).or_insert((0.0, 0));
                entry.0 += coop;
                entry.1 = entry.1.saturating_add(1);
            }
        }
        for (id, overall) in &scored {
            let group_coop = signatures
                .get(id)
                .and_then(|s| groups.get(s.as_str()))
                .map_or(0.0, |(sum, n)| if *n > 0 { sum / f64::from(*n) } else { 0.0 });
            if let Some(p) = next.profiles.get_mut(id) {
                let contribution = p
                    .component_fitness
                    .get(&FitnessComponent::CollectiveBenefit)
                    .copied()
                    .unwrap_or(0.0);
                let value = overall * fitness::group_multiplier(group_coop, contribution, config);
                p.overall_fitness = if value.is_finite() {
                    value.clamp(config.min_fitness, 1.0)
                } else {
                    config.min_fitness
                };
            }
        }
        for p in next.profiles.values_mut() {
            p.push_history(p.overall_fitness, config.fitness_history_cap);
            p.phase = GenerationPhase::Scored;
        }

        let fitness_values: Vec<f64> = next.profiles.values().map(|p| p.overall_fitness).collect();
        let mean_fitness = mean(fitness_values.iter().copied());
        let max_fitness = fitness_values.iter().copied().fold(0.0, f64::max);
        let min_fitness = if fitness_values.is_empty() {
            0.0
        } else {
            fitness_values.iter().copied().fold(1.0, f64::min)
        };
        let component_means: BTreeMap<FitnessComponent, f64> = FitnessComponent::ALL
            .iter()
            .map(|c| {
                let values = scored
                    .keys()
                    .filter_map(|id| next.profiles.get(id))
                    .filter_map(|p| p.component_fitness.get(c).copied());
                (*c, mean(values))
            })
            .collect();

        // 2. Environmental adaptation: penalties for the next generation.
        for p in next.profiles.values_mut() {
            p.pending_penalty = next.environment.penalty_for(&p.expressed);
        }
        next.environment.advance();

        // 3. Selection.
        let candidates: Vec<Candidate> = next
            .profiles
            .values()
            .map(|p| Candidate {
                id: p.agent_id,
                fitness: p.overall_fitness,
                signature_share: share_of(&p.agent_id),
            })
            .collect();
        let selection = selection::select_parents(
            &candidates,
            config.population_size,
            next.diversity_boost,
            config,
            &mut rng,
        );
        let in_pool: BTreeSet<AgentId> = selection.pool.iter().copied().collect();
        for p in next.profiles.values_mut() {
            p.phase = if in_pool.contains(&p.agent_id) {
                GenerationPhase::Selected
            } else {
                GenerationPhase::NotSelected
            };
        }

        // 4. Reproduction and mutation.
        let hard_cap = config.hard_cap();
        let capacity = hard_cap.saturating_sub(next.profiles.len());
        let reproduction = reproduction::reproduce(
            &selection.pool,
            &mut next.profiles,
            capacity,
            generation,
            &mut next.ids,
            config,
            &mut rng,
        );
        if reproduction.discarded > 0 {
            tracing::warn!(
                generation,
                discarded = reproduction.discarded,
                hard_cap,
                "population overflow, offspring discarded"
            );
            events.push(EngineEvent::PopulationOverflow {
                generation,
                discarded: reproduction.discarded,
                hard_cap,
            });
        }
        for o in &reproduction.offspring {
            next.profiles.insert(o.profile.agent_id, o.profile.clone());
        }

        // 5. Eviction of the weakest non-elites.
        let elites: BTreeSet<AgentId> = selection.elites.iter().copied().collect();
        let excess = next.profiles.len().saturating_sub(config.population_size);
        let mut evicted = Vec::new();
        if excess > 0 {
            let mut victims: Vec<(f64, AgentId)> = next
                .profiles
                .values()
                .filter(|p| !elites.contains(&p.agent_id))
                .map(|p| (p.overall_fitness, p.agent_id))
                .collect();
            victims.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            for (_, id) in victims.into_iter().take(excess) {
                next.profiles.remove(&id);
                evicted.push(id);
            }
        }
        let offspring: Vec<Offspring> = reproduction
            .offspring
            .into_iter()
            .filter(|o| next.profiles.contains_key(&o.profile.agent_id))
            .collect();
        let evicted_parents: Vec<AgentId> = evicted
            .iter()
            .copied()
            .filter(|id| self.state.profiles.contains_key(id))
            .collect();

        // 6. Diversity maintenance.
        let final_signatures: Vec<String> = next
            .profiles
            .values()
            .map(|p| emergence::signature(&p.expressed, config))
            .collect();
        let diversity_index = emergence::shannon_index(&emergence::signature_counts(&final_signatures));
        next.diversity_index = diversity_index;
        next.diversity_boost = diversity_index < config.diversity_threshold;

        // Invariants.
        let violation = |detail: String| PopulationError::InvariantViolation { generation, detail };
        if let Some(missing) = selection.elites.iter().find(|id| !next.profiles.contains_key(id)) {
            return Err(violation(format!("elite {missing} was evicted")));
        }
        if next.profiles.len() > config.population_size.max(elites.len()) {
            return Err(violation(format!(
                "population {} exceeds target {}",
                next.profiles.len(),
                config.population_size
            )));
        }
        if next
            .profiles
            .values()
            .any(|p| !(0.0..=1.0).contains(&p.overall_fitness))
        {
            return Err(violation("fitness outside [0, 1]".to_owned()));
        }

        next.generation = generation;
        let report = GenerationReport {
            generation,
            population_before,
            population_after: next.profiles.len(),
            elite_ids: selection.elites,
            parent_pool_size: selection.pool.len(),
            offspring_created: offspring.len(),
            offspring_discarded: reproduction.discarded,
            mutations: reproduction.mutations,
            evicted: evicted_parents,
            schedule_missed,
            pressure_penalized,
            mean_fitness,
            max_fitness,
            min_fitness,
            component_means,
            diversity_index,
            diversity_boost_next: next.diversity_boost,
            completed_at: now,
        };
        events.push(EngineEvent::GenerationProcessed {
            generation,
            population: report.population_after,
            mean_fitness,
            diversity_index,
        });

        tracing::info!(
            generation,
            population_before,
            population_after = report.population_after,
            offspring = report.offspring_created,
            evicted = report.evicted.len(),
            mean_fitness,
            diversity_index,
            "generation processed"
        );

        self.state = next;
        Ok(TickOutcome {
            report,
            offspring,
            evicted,
            events,
        })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0u32), |(s, n), v| (s + v, n.saturating_add(1)));
    if n == 0 { 0.0 } else { sum / f64::from(n) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn personality(cooperation: f64, risk: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("cooperation".to_owned(), cooperation),
            ("risk_tolerance".to_owned(), risk),
            ("analytical_thinking".to_owned(), 50.0),
        ])
    }

    fn engine(size: usize, target: usize) -> (PopulationEngine, Vec<AgentId>) {
        let config = EvolutionConfig {
            population_size: target,
            ..EvolutionConfig::default()
        };
        let mut engine = PopulationEngine::new(config, IdSource::new(17)).unwrap();
        let mut ids = IdSource::new(23);
        let mut agents = Vec::new();
        for i in 0..size {
            let id = AgentId::next_from(&mut ids);
            let v = count_f64(i % 100);
            engine
                .register(
                    id,
                    &personality(v, 100.0 - v),
                    &BTreeMap::from([("individualism".to_owned(), v)]),
                    LearningProfile::default(),
                )
                .unwrap();
            agents.push(id);
        }
        (engine, agents)
    }

    fn inputs(agents: &[AgentId]) -> BTreeMap<AgentId, FitnessInputs> {
        agents
            .iter()
            .enumerate()
            .map(|(i, id)| {
                let successes = u32::try_from(i % 10).unwrap();
                (
                    *id,
                    FitnessInputs {
                        outcomes: 10,
                        successes,
                        profit_loss: f64::from(successes) * 100.0 - 500.0,
                        stability: 80.0,
                        emotional_coherence: 70.0,
                        adaptability: 50.0,
                        learning_speed: 50.0,
                        ..FitnessInputs::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let (mut engine, agents) = engine(3, 10);
        let again = engine.register(
            agents[0],
            &personality(50.0, 50.0),
            &BTreeMap::new(),
            LearningProfile::default(),
        );
        assert_eq!(again, Err(PopulationError::DuplicateAgent(agents[0])));
    }

    #[test]
    fn tick_keeps_size_and_elites() {
        let (mut engine, agents) = engine(200, 200);
        let outcome = engine.tick(&inputs(&agents), t0()).unwrap();
        let report = &outcome.report;
        assert_eq!(report.generation, 1);
        assert!(report.population_after <= 200);
        assert!(report.population_after >= 20);
        assert_eq!(report.elite_ids.len(), 20);
        for id in &report.elite_ids {
            let p = engine.profile(*id).unwrap();
            assert_eq!(p.fitness_history.len(), 1);
        }
        for o in &outcome.offspring {
            assert!(engine.contains(o.profile.agent_id));
        }
        for id in &outcome.evicted {
            assert!(!engine.contains(*id));
        }
        assert_eq!(engine.generation(), 1);
    }

    #[test]
    fn generations_strictly_increase() {
        let (mut engine, _) = engine(30, 30);
        let mut last = engine.generation();
        for _ in 0..3 {
            let live: Vec<AgentId> = engine.profiles().keys().copied().collect();
            let report = engine.tick(&inputs(&live), t0()).unwrap().report;
            assert!(report.generation > last);
            last = report.generation;
        }
    }

    #[test]
    fn missing_inputs_carry_fitness_over() {
        let (mut engine, agents) = engine(10, 10);
        let mut partial = inputs(&agents);
        partial.remove(&agents[0]);
        let before = engine.profile(agents[0]).unwrap().overall_fitness;
        let outcome = engine.tick(&partial, t0()).unwrap();
        assert_eq!(outcome.report.schedule_missed, vec![agents[0]]);
        assert!(outcome.events.iter().any(|e| matches!(
            e,
            EngineEvent::ScheduleMissed { agent_id, .. } if *agent_id == agents[0]
        )));
        if let Some(p) = engine.profile(agents[0]) {
            assert!((p.fitness_history[0] - before).abs() < 1e-12);
        }
    }

    #[test]
    fn identical_runs_produce_identical_reports() {
        let (mut a, agents_a) = engine(50, 50);
        let (mut b, agents_b) = engine(50, 50);
        let ra = a.tick(&inputs(&agents_a), t0()).unwrap().report;
        let rb = b.tick(&inputs(&agents_b), t0()).unwrap().report;
        assert_eq!(ra, rb);
    }

    #[test]
    fn pressure_penalises_next_generation() {
        let (mut engine, agents) = engine(20, 20);
        engine.apply_environmental_change(&EnvironmentalChange {
            change_type: "market_crash".to_owned(),
            magnitude: 100.0,
            timestamp: t0(),
        });
        let first = engine.tick(&inputs(&agents), t0()).unwrap().report;
        assert_eq!(first.pressure_penalized, 0);
        let live: Vec<AgentId> = engine.profiles().keys().copied().collect();
        let second = engine.tick(&inputs(&live), t0()).unwrap().report;
        assert!(second.pressure_penalized > 0);
    }

    #[test]
    fn thousand_agents_keep_elites_across_a_tick() {
        let (mut engine, agents) = engine(1000, 1000);
        let outcome = engine.tick(&inputs(&agents), t0()).unwrap();
        assert_eq!(outcome.report.elite_ids.len(), 100);
        assert!(engine.len() <= 1000);
        for id in &outcome.report.elite_ids {
            assert!(engine.contains(*id));
        }
        let mut ranked: Vec<&EvolutionaryProfile> = engine
            .profiles()
            .values()
            .filter(|p| p.generation == 0)
            .collect();
        ranked.sort_by(|a, b| b.overall_fitness.total_cmp(&a.overall_fitness));
        let weakest_elite = outcome
            .report
            .elite_ids
            .iter()
            .map(|id| engine.profile(*id).unwrap().overall_fitness)
            .fold(1.0, f64::min);
        assert!(ranked.iter().take(100).all(|p| p.overall_fitness >= weakest_elite));
    }

    #[test]
    fn dominant_signature_emerges_once() {
        let config = EvolutionConfig {
            population_size: 1000,
            ..EvolutionConfig::default()
        };
        let mut engine = PopulationEngine::new(config, IdSource::new(4)).unwrap();
        let mut ids = IdSource::new(5);
        for i in 0..1000 {
            let (coop, risk) = if i < 800 { (90.0, 10.0) } else { (count_f64(i % 100), 50.0) };
            engine
                .register(
                    AgentId::next_from(&mut ids),
                    &personality(coop, risk),
                    &BTreeMap::new(),
                    LearningProfile::default(),
                )
                .unwrap();
        }
        let found = engine.detect_emergence(t0());
        assert_eq!(found.len(), 1);
        assert!(found[0].participant_count >= 700);
        assert!(engine.detect_emergence(t0()).is_empty());
        assert_eq!(engine.status().emergent_behaviors, 1);
    }

    #[test]
    fn status_reports_norms_and_size() {
        let (engine, _) = engine(10, 10);
        let status = engine.status();
        assert_eq!(status.size, 10);
        assert_eq!(status.target_size, 10);
        assert!(status.cultural_norms.contains_key("individualism"));
    }
}
