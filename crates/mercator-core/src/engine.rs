//! The engine facade: agents, population, clock and events in one place.
//!
//! [`MercatorEngine`] owns a flat map of [`TraderAgent`]s keyed by id and
//! the [`PopulationEngine`] that holds their evolutionary profiles. Agent
//! operations (`decide`, `report_outcome`, ...) touch one agent; the
//! generation [`tick`](MercatorEngine::tick) reads every agent at the
//! barrier and writes back offspring and evictions only after the
//! population has committed.
//!
//! Every timestamp comes from the simulated clock. Emergence detection and
//! cultural diffusion run when [`advance`](MercatorEngine::advance) moves
//! the clock past their configured intervals.

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration as StdDuration, Instant};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::broadcast;

use mercator_agents::{
    AgentConfig, AgentSnapshot, AgentSpec, TraderAgent, Trait, TraitCategory, TraitVector,
};
use mercator_population::{
    CultureReport, FitnessEvaluator, FitnessInputs, LearningProfile, Offspring, PopulationEngine,
};
use mercator_types::{
    AgentId, Context, DecisionRecord, EmergentBehavior, EngineEvent, EnvironmentalChange,
    EventEnvelope, EvolutionaryPressure, ExperienceId, GenerationReport, IdSource,
    LearningRecord, MilestoneReward, Outcome, PopulationStatus, Situation,
};

use crate::clock::{self, SimClock};
use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::persistence::{AgentExport, PopulationExport, SCHEMA_VERSION};

/// Trait values split into the behavioural and cultural genotype sections.
fn split_traits(traits: &TraitVector) -> (BTreeMap<String, f64>, BTreeMap<String, f64>) {
    let mut personality = BTreeMap::new();
    let mut culture = BTreeMap::new();
    for (t, value) in traits.iter() {
        let target = if t.category() == TraitCategory::Cultural {
            &mut culture
        } else {
            &mut personality
        };
        target.insert(t.as_str().to_owned(), value);
    }
    (personality, culture)
}

fn trait_map(traits: &TraitVector) -> BTreeMap<String, f64> {
    traits.iter().map(|(t, v)| (t.as_str().to_owned(), v)).collect()
}

/// Fitness-relevant state of one agent at the tick boundary.
pub fn fitness_inputs(agent: &TraderAgent, now: DateTime<Utc>, config: &AgentConfig) -> FitnessInputs {
    let stats = agent.stats();
    let traits = agent.traits();
    FitnessInputs {
        decisions: stats.decisions,
        outcomes: stats.outcomes,
        successes: stats.successes,
        profit_loss: stats.profit_loss.to_f64().unwrap_or(0.0),
        mean_trust: agent.relationships().mean_trust(),
        cooperative_outcomes: stats.cooperative_outcomes,
        betrayals_suffered: stats.betrayals_suffered,
        mutual_benefit_total: stats.mutual_benefit_total,
        strategies_created: stats.strategies_created,
        mean_strategy_fitness: agent.strategies().mean_fitness(),
        trait_changes: stats.trait_changes,
        adaptability: traits.value(Trait::Adaptability),
        learning_speed: traits.value(Trait::LearningSpeed),
        specialization_depth: agent.skills().depth(),
        stability: traits.stability(now, config),
        emotional_coherence: agent.emotion().reading().coherence,
    }
}

/// Build the live agent for an offspring profile.
fn offspring_agent(offspring: &Offspring, ids: IdSource, config: &AgentConfig) -> TraderAgent {
    let phenotype = offspring.profile.genotype.phenotype();
    let mut traits = TraitVector::neutral();
    for (name, value) in phenotype.expressed() {
        if traits.set(&name, value).is_err() {
            tracing::debug!(locus = %name, "offspring locus has no matching trait");
        }
    }
    TraderAgent::from_traits(
        offspring.profile.agent_id,
        traits,
        None,
        phenotype.learning.max_potential,
        phenotype.learning.learning_rate,
        ids,
        config,
    )
}

// ---------------------------------------------------------------------------
// MercatorEngine
// ---------------------------------------------------------------------------

/// The simulation engine.
#[derive(Debug)]
pub struct MercatorEngine {
    config: SimulationConfig,
    agents: BTreeMap<AgentId, TraderAgent>,
    population: PopulationEngine,
    clock: SimClock,
    ids: IdSource,
    events: EventBus,
    last_emergence: DateTime<Utc>,
    last_culture: DateTime<Utc>,
}

impl MercatorEngine {
    /// Create an empty engine.
    pub fn new(config: SimulationConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let mut ids = IdSource::new(config.engine.seed);
        let population = PopulationEngine::new(config.evolution_config(), ids.derive())?;
        let clock = SimClock::new(config.engine.start_time);
        let events = EventBus::new(config.engine.event_retention, config.engine.broadcast_capacity);
        tracing::info!(
            seed = config.engine.seed,
            population_size = config.population.size,
            start = %clock.now(),
            "engine created"
        );
        Ok(Self {
            agents: BTreeMap::new(),
            population,
            last_emergence: clock.now(),
            last_culture: clock.now(),
            clock,
            ids,
            events,
            config,
        })
    }

    /// Replace the population's fitness evaluator.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Box<dyn FitnessEvaluator>) -> Self {
        self.population = self.population.with_evaluator(evaluator);
        self
    }

    // --- Accessors ---

    /// Configuration in effect.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulated time.
    pub const fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Last completed generation.
    pub const fn generation(&self) -> u64 {
        self.population.generation()
    }

    /// One agent.
    pub fn agent(&self, id: AgentId) -> Option<&TraderAgent> {
        self.agents.get(&id)
    }

    /// Ids of every live agent, ascending.
    pub fn agent_ids(&self) -> Vec<AgentId> {
        self.agents.keys().copied().collect()
    }

    /// Number of live agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether no agent is live.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// The population engine.
    pub const fn population(&self) -> &PopulationEngine {
        &self.population
    }

    /// The event log.
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }

    fn agent_mut(&mut self, id: AgentId) -> Result<&mut TraderAgent, EngineError> {
        self.agents.get_mut(&id).ok_or(EngineError::InvalidAgentId(id))
    }

    // --- Agent lifecycle ---

    /// Create an agent from a spec and register it with the population.
    pub fn create_agent(&mut self, spec: &AgentSpec) -> Result<AgentId, EngineError> {
        let mut ids = self.ids;
        let id = AgentId::next_from(&mut ids);
        let agent = TraderAgent::create(id, spec, ids.derive(), &self.config.agents)?;
        let learning = LearningProfile {
            learning_rate: spec.learning_rate,
            max_potential: spec.max_potential,
            ..LearningProfile::default()
        };
        self.admit(agent, learning)?;
        self.ids = ids;
        Ok(id)
    }

    /// Register an agent under a caller-chosen id.
    ///
    /// The agent is built from `personality` and `culture` (unnamed traits
    /// start neutral) and registered with the population.
    pub fn register(
        &mut self,
        agent_id: AgentId,
        personality: &BTreeMap<String, f64>,
        culture: &BTreeMap<String, f64>,
        learning: LearningProfile,
    ) -> Result<(), EngineError> {
        if self.agents.contains_key(&agent_id) {
            return Err(EngineError::DuplicateAgent(agent_id));
        }
        let mut overrides = personality.clone();
        overrides.extend(culture.iter().map(|(k, v)| (k.clone(), *v)));
        let traits = TraitVector::from_overrides(&overrides)?;
        let mut ids = self.ids;
        let agent = TraderAgent::from_traits(
            agent_id,
            traits,
            None,
            learning.max_potential,
            learning.learning_rate,
            ids.derive(),
            &self.config.agents,
        );
        self.admit(agent, learning)?;
        self.ids = ids;
        Ok(())
    }

    fn admit(&mut self, agent: TraderAgent, learning: LearningProfile) -> Result<(), EngineError> {
        let id = agent.id();
        if self.agents.contains_key(&id) {
            return Err(EngineError::DuplicateAgent(id));
        }
        let (personality, culture) = split_traits(agent.traits());
        self.population.register(id, &personality, &culture, learning)?;
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Seed a relationship for scenario setup.
    pub fn seed_relationship(
        &mut self,
        agent_id: AgentId,
        counterparty: AgentId,
        trust: f64,
    ) -> Result<(), EngineError> {
        self.agent_mut(agent_id)?
            .relationships_mut()
            .seed_relationship(counterparty, trust);
        Ok(())
    }

    // --- Decisions and learning ---

    /// Let an agent decide on a situation.
    pub fn decide(
        &mut self,
        agent_id: AgentId,
        situation: &Situation,
        context: &Context,
    ) -> Result<DecisionRecord, EngineError> {
        let now = self.clock.now();
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(EngineError::InvalidAgentId(agent_id))?;
        let record = agent.decide(situation, context, now, &self.config.agents)?;
        self.events.publish(
            EngineEvent::DecisionMade {
                agent_id,
                session_id: record.session_id,
                action: record.action,
                confidence: record.confidence,
            },
            now,
        );
        Ok(record)
    }

    /// Report the outcome of an earlier decision.
    pub fn report_outcome(
        &mut self,
        agent_id: AgentId,
        session_id: ExperienceId,
        outcome: &Outcome,
    ) -> Result<LearningRecord, EngineError> {
        let now = self.clock.now();
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(EngineError::InvalidAgentId(agent_id))?;
        let record = agent.report_outcome(session_id, outcome, now, &self.config.agents)?;
        self.after_learning(agent_id, &record, now)?;
        Ok(record)
    }

    /// Cancel a recorded decision; it resolves as `no_outcome`.
    pub fn cancel_decision(
        &mut self,
        agent_id: AgentId,
        session_id: ExperienceId,
    ) -> Result<LearningRecord, EngineError> {
        let now = self.clock.now();
        let agent = self
            .agents
            .get_mut(&agent_id)
            .ok_or(EngineError::InvalidAgentId(agent_id))?;
        let record = agent.cancel_decision(session_id, now, &self.config.agents)?;
        self.after_learning(agent_id, &record, now)?;
        Ok(record)
    }

    /// Cross-agent effects and events of a learning record.
    fn after_learning(
        &mut self,
        agent_id: AgentId,
        record: &LearningRecord,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        let reputation_milestones = record
            .milestones
            .iter()
            .filter(|m| m.reward == MilestoneReward::ReputationGain)
            .count();
        if reputation_milestones > 0 {
            let counterparties: Vec<AgentId> = self
                .agents
                .get(&agent_id)
                .map(|a| a.relationships().iter().map(|(c, _)| *c).collect())
                .unwrap_or_default();
            let gain = self.config.engine.reputation_gain
                * f64::from(u32::try_from(reputation_milestones).unwrap_or(u32::MAX));
            for c in counterparties {
                if let Some(other) = self.agents.get_mut(&c) {
                    other.relationships_mut().adjust_trust(agent_id, gain);
                }
            }
        }

        if (!record.trait_changes.is_empty() || !record.milestones.is_empty())
            && let Some(agent) = self.agents.get(&agent_id)
        {
            self.population
                .sync_expressed(agent_id, &trait_map(agent.traits()))?;
        }

        self.events.publish(
            EngineEvent::OutcomeReported {
                agent_id,
                session_id: record.session_id,
                outcome_class: record.outcome_class,
                significance: record.significance,
            },
            now,
        );
        for change in &record.trait_changes {
            self.events.publish(
                EngineEvent::TraitEvolved {
                    agent_id,
                    trait_name: change.trait_name.clone(),
                    trigger: change.trigger,
                    before: change.before,
                    after: change.after,
                },
                now,
            );
        }
        for milestone in &record.milestones {
            tracing::info!(
                agent_id = %agent_id,
                skill = %milestone.skill,
                level = milestone.level,
                "milestone reached"
            );
            self.events.publish(
                EngineEvent::MilestoneReached {
                    agent_id,
                    milestone: milestone.clone(),
                },
                now,
            );
        }
        Ok(())
    }

    /// Read-only summary of an agent.
    pub fn snapshot(&self, agent_id: AgentId) -> Result<AgentSnapshot, EngineError> {
        self.agents
            .get(&agent_id)
            .map(|a| a.snapshot(self.clock.now(), &self.config.agents))
            .ok_or(EngineError::InvalidAgentId(agent_id))
    }

    // --- Export / import ---

    /// Serialize one agent with its evolutionary profile.
    pub fn export_agent(&self, agent_id: AgentId) -> Result<String, EngineError> {
        let agent = self
            .agents
            .get(&agent_id)
            .ok_or(EngineError::InvalidAgentId(agent_id))?;
        AgentExport::new(agent.clone(), self.population.profile(agent_id).cloned()).to_json()
    }

    /// Restore an agent exported by [`export_agent`](Self::export_agent).
    ///
    /// Fails with [`EngineError::DuplicateAgent`] if the id is taken.
    pub fn import_agent(&mut self, blob: &str) -> Result<AgentId, EngineError> {
        let export = AgentExport::from_json(blob)?;
        let id = export.agent.id();
        if self.agents.contains_key(&id) || self.population.contains(id) {
            return Err(EngineError::DuplicateAgent(id));
        }
        match export.evolutionary_profile {
            Some(profile) if profile.agent_id == id => self.population.import_profile(profile)?,
            Some(profile) => return Err(EngineError::InvalidAgentId(profile.agent_id)),
            None => {
                let (personality, culture) = split_traits(export.agent.traits());
                self.population.register(
                    id,
                    &personality,
                    &culture,
                    LearningProfile::default(),
                )?;
            }
        }
        self.agents.insert(id, export.agent);
        tracing::info!(agent_id = %id, "agent imported");
        Ok(id)
    }

    /// Serialize the whole engine.
    pub fn export_population(&self) -> Result<String, EngineError> {
        PopulationExport {
            schema_version: SCHEMA_VERSION,
            generation: self.population.generation(),
            clock: self.clock,
            ids: self.ids,
            agents: self.agents.clone(),
            population: self.population.state().clone(),
            cultural_norms: self.population.cultural_norms(),
            emergent_behaviors: self.population.emergent_behaviors().to_vec(),
            last_emergence: self.last_emergence,
            last_culture: self.last_culture,
        }
        .to_json()
    }

    /// Rebuild an engine from [`export_population`](Self::export_population)
    /// output.
    pub fn restore(config: SimulationConfig, blob: &str) -> Result<Self, EngineError> {
        config.validate()?;
        let export = PopulationExport::from_json(blob)?;
        let population = PopulationEngine::from_state(export.population, config.evolution_config())?;
        let events = EventBus::new(config.engine.event_retention, config.engine.broadcast_capacity);
        Ok(Self {
            agents: export.agents,
            population,
            clock: export.clock,
            ids: export.ids,
            events,
            last_emergence: export.last_emergence,
            last_culture: export.last_culture,
            config,
        })
    }

    // --- Environment, emergence, culture ---

    /// Feed an environmental change into the population.
    pub fn apply_environmental_change(
        &mut self,
        change: &EnvironmentalChange,
    ) -> Vec<EvolutionaryPressure> {
        let pressures = self.population.apply_environmental_change(change);
        tracing::info!(
            change_type = %change.change_type,
            magnitude = change.magnitude,
            pressures = pressures.len(),
            "environmental change applied"
        );
        pressures
    }

    /// Activate an evolutionary pressure directly.
    pub fn add_pressure(&mut self, pressure: EvolutionaryPressure) {
        self.population.add_pressure(pressure);
    }

    /// Detect emergent behaviours now and publish them.
    pub fn detect_emergence(&mut self) -> Vec<EmergentBehavior> {
        let now = self.clock.now();
        self.last_emergence = now;
        let found = self.population.detect_emergence(now);
        self.events.publish_all(
            found
                .iter()
                .cloned()
                .map(|behavior| EngineEvent::EmergentBehavior { behavior }),
            now,
        );
        found
    }

    /// Diffuse cultural norms along trusted relationships now.
    ///
    /// Updated norms are written back to the agents' cultural traits.
    pub fn evolve_culture(&mut self) -> CultureReport {
        self.last_culture = self.clock.now();
        let threshold = self.config.culture.trust_link_threshold;
        let links: BTreeMap<AgentId, Vec<AgentId>> = self
            .agents
            .iter()
            .map(|(id, agent)| {
                let trusted: Vec<AgentId> = agent
                    .relationships()
                    .trusted(threshold)
                    .filter(|c| self.agents.contains_key(c))
                    .collect();
                (*id, trusted)
            })
            .filter(|(_, trusted)| !trusted.is_empty())
            .collect();
        let report = self.population.evolve_culture(&links);

        for id in links.keys() {
            let (Some(agent), Some(profile)) = (self.agents.get_mut(id), self.population.profile(*id))
            else {
                continue;
            };
            for locus in profile.genotype.cultural.keys() {
                if let Some(value) = profile.expressed.get(locus)
                    && agent.traits_mut().set(locus, *value).is_err()
                {
                    tracing::debug!(locus = %locus, "cultural locus has no matching trait");
                }
            }
        }
        report
    }

    /// Move the simulated clock and run the periodic passes that fall due.
    pub fn advance(&mut self, by: Duration) -> Result<(), EngineError> {
        let now = self.clock.advance(by)?;
        let emergence_every = clock::seconds(self.config.emergence.interval_secs);
        let culture_every = clock::seconds(self.config.culture.interval_secs);
        if now.signed_duration_since(self.last_emergence) >= emergence_every {
            self.detect_emergence();
        }
        if now.signed_duration_since(self.last_culture) >= culture_every {
            self.evolve_culture();
        }
        Ok(())
    }

    // --- Population ---

    /// Point-in-time population status.
    pub fn population_status(&self) -> PopulationStatus {
        self.population.status()
    }

    /// Run one generation.
    ///
    /// Fitness inputs are read from every agent; with a scoring deadline
    /// configured, agents not read before it expires keep their previous
    /// fitness. If the population tick fails nothing is changed.
    pub fn tick(&mut self) -> Result<GenerationReport, EngineError> {
        let now = self.clock.now();
        for (id, agent) in &self.agents {
            self.population.sync_expressed(*id, &trait_map(agent.traits()))?;
        }

        let deadline_ms = self.config.population.scoring_deadline_ms;
        let deadline = (deadline_ms > 0)
            .then(|| Instant::now().checked_add(StdDuration::from_millis(deadline_ms)))
            .flatten();
        let mut inputs = BTreeMap::new();
        for (id, agent) in &self.agents {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            inputs.insert(*id, fitness_inputs(agent, now, &self.config.agents));
        }

        let outcome = self.population.tick(&inputs, now)?;
        let generation = outcome.report.generation;

        let evicted: BTreeSet<AgentId> = outcome.evicted.iter().copied().collect();
        for id in &evicted {
            self.agents.remove(id);
        }
        if !evicted.is_empty() {
            for agent in self.agents.values_mut() {
                agent.relationships_mut().retain(|c| !evicted.contains(&c));
            }
        }
        for offspring in &outcome.offspring {
            let agent = offspring_agent(offspring, self.ids.derive(), &self.config.agents);
            self.agents.insert(agent.id(), agent);
        }
        for agent in self.agents.values_mut() {
            let maintenance = agent.begin_generation(generation, now, &self.config.agents);
            if !maintenance.pruned_strategies.is_empty() {
                tracing::debug!(
                    agent_id = %agent.id(),
                    pruned = maintenance.pruned_strategies.len(),
                    "strategies pruned"
                );
            }
        }

        self.events.publish_all(outcome.events, now);
        Ok(outcome.report)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercator_types::{OutcomeClass, SituationType};
    use rust_decimal::Decimal;

    fn engine() -> MercatorEngine {
        let mut config = SimulationConfig::default();
        config.population.size = 20;
        MercatorEngine::new(config).unwrap()
    }

    fn spec(cooperation: f64) -> AgentSpec {
        AgentSpec {
            traits: BTreeMap::from([("cooperation".to_owned(), cooperation)]),
            ..AgentSpec::default()
        }
    }

    fn cooperation_outcome() -> Outcome {
        Outcome {
            class: OutcomeClass::Cooperation,
            success: true,
            profit_loss: Decimal::new(300, 0),
            satisfaction: 80.0,
            emotional_impact: 40.0,
            unexpected: false,
            mutual_benefit: Some(70.0),
            growth_opportunity: true,
        }
    }

    #[test]
    fn created_agents_are_registered() {
        let mut engine = engine();
        let id = engine.create_agent(&spec(70.0)).unwrap();
        assert!(engine.population().contains(id));
        assert_eq!(engine.population_status().size, 1);
    }

    #[test]
    fn invalid_trait_leaves_engine_unchanged() {
        let mut engine = engine();
        let bad = AgentSpec {
            traits: BTreeMap::from([("charisma".to_owned(), 70.0)]),
            ..AgentSpec::default()
        };
        assert!(matches!(
            engine.create_agent(&bad),
            Err(EngineError::Agent { .. })
        ));
        assert!(engine.is_empty());
        // The failed call did not consume an id.
        let a = engine.create_agent(&spec(50.0)).unwrap();
        let mut fresh = self::engine();
        assert_eq!(fresh.create_agent(&spec(50.0)).unwrap(), a);
    }

    #[test]
    fn decide_and_learn_publish_events() {
        let mut engine = engine();
        let id = engine.create_agent(&spec(70.0)).unwrap();
        let other = engine.create_agent(&spec(60.0)).unwrap();
        let situation = Situation::new(SituationType::Negotiation, 60.0).with_counterparty(other);
        let decision = engine.decide(id, &situation, &Context::default()).unwrap();
        engine
            .report_outcome(id, decision.session_id, &cooperation_outcome())
            .unwrap();
        let names: Vec<&str> = engine.events().recent().map(|e| e.event.name()).collect();
        assert_eq!(&names[..2], &["decision_made", "outcome_reported"]);
    }

    #[test]
    fn unknown_agent_is_rejected() {
        let mut engine = engine();
        let ghost = AgentId::new();
        let situation = Situation::new(SituationType::Negotiation, 50.0);
        assert!(matches!(
            engine.decide(ghost, &situation, &Context::default()),
            Err(EngineError::InvalidAgentId(id)) if id == ghost
        ));
    }

    #[test]
    fn export_import_round_trip_and_collision() {
        let mut engine = engine();
        let id = engine.create_agent(&spec(80.0)).unwrap();
        let blob = engine.export_agent(id).unwrap();
        assert!(matches!(
            engine.import_agent(&blob),
            Err(EngineError::DuplicateAgent(dup)) if dup == id
        ));

        let mut other = self::engine();
        let imported = other.import_agent(&blob).unwrap();
        assert_eq!(imported, id);
        assert_eq!(other.agent(id), engine.agent(id));
        assert_eq!(other.population().profile(id), engine.population().profile(id));
    }

    #[test]
    fn tick_replaces_evicted_agents_with_offspring() {
        let mut engine = engine();
        for i in 0..20 {
            engine.create_agent(&spec(f64::from(i) * 5.0)).unwrap();
        }
        let report = engine.tick().unwrap();
        assert_eq!(report.generation, 1);
        assert_eq!(engine.len(), engine.population().len());
        for id in engine.agent_ids() {
            assert!(engine.population().contains(id));
            assert_eq!(engine.agent(id).unwrap().generation(), 1);
        }
        assert!(
            engine
                .events()
                .recent()
                .any(|e| e.event.name() == "generation_processed")
        );
    }

    #[test]
    fn advance_runs_periodic_passes() {
        let mut engine = engine();
        for _ in 0..10 {
            engine.create_agent(&spec(90.0)).unwrap();
        }
        engine.advance(Duration::minutes(31)).unwrap();
        assert_eq!(engine.population_status().emergent_behaviors, 1);
        engine.advance(Duration::minutes(31)).unwrap();
        assert_eq!(engine.population_status().emergent_behaviors, 1);
    }

    #[test]
    fn culture_flows_along_trusted_links() {
        let mut engine = engine();
        let a = engine
            .create_agent(&AgentSpec {
                traits: BTreeMap::from([("individualism".to_owned(), 20.0)]),
                ..AgentSpec::default()
            })
            .unwrap();
        let b = engine
            .create_agent(&AgentSpec {
                traits: BTreeMap::from([("individualism".to_owned(), 80.0)]),
                ..AgentSpec::default()
            })
            .unwrap();
        engine.seed_relationship(a, b, 90.0).unwrap();
        let report = engine.evolve_culture();
        assert_eq!(report.connected, 1);
        let value = engine.agent(a).unwrap().traits().value(Trait::Individualism);
        assert!(value > 20.0);
        let untouched = engine.agent(b).unwrap().traits().value(Trait::Individualism);
        assert!((untouched - 80.0).abs() < 1e-9);
    }
}
