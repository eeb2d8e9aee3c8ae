//! Trader agent: owns every per-agent subsystem and runs decisions.
//!
//! A [`TraderAgent`] exclusively owns its trait vector, memory,
//! relationships, emotional state, habits, strategies and skills. The
//! population layer refers to agents by [`AgentId`] only.
//!
//! [`TraderAgent::decide`] is all-or-nothing: the emotional state and the
//! id source only advance once the pending experience is recorded, so a
//! failed decision leaves the agent as it was.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mercator_types::{
    AgentId, Context, DecisionRecord, IdSource, Situation, StrategyId,
};

use crate::behavior::HabitTracker;
use crate::config::AgentConfig;
use crate::decision::{self, DecisionInput};
use crate::emotion::{EmotionalReading, EmotionalState};
use crate::error::AgentError;
use crate::memory::{
    ConsolidationRecord, ExperienceDraft, ExperiencePayload, MemoryQuery, MemoryStore,
    decay_rate_for, pattern_signature, pattern_tag,
};
use crate::relationships::RelationshipGraph;
use crate::skills::{SkillSet, SpecializationPath};
use crate::strategy::{StrategyCriteria, StrategyLibrary};
use crate::traits::{
    BigFiveProfile, CognitiveBiasProfile, CulturalProfile, DarkTriadProfile, TraitVector,
};

/// Significance given to a decision's experience until its outcome is known.
const PENDING_SIGNIFICANCE: f64 = 50.0;

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Parameters for creating an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSpec {
    /// Trait overrides by name; every other trait starts neutral.
    pub traits: BTreeMap<String, f64>,
    /// Skill ceiling (clamped to `[60, 95]`).
    pub max_potential: f64,
    /// Skill learning rate (clamped to `[0.3, 2.0]`).
    pub learning_rate: f64,
    /// Specialization path; derived from the traits when absent.
    pub path: Option<SpecializationPath>,
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            traits: BTreeMap::new(),
            max_potential: 80.0,
            learning_rate: 1.0,
            path: None,
        }
    }
}

/// Activity counters for the current generation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentStats {
    /// Decisions made.
    pub decisions: u32,
    /// Outcomes learned (including cancellations).
    pub outcomes: u32,
    /// Successful outcomes.
    pub successes: u32,
    /// Cooperation outcomes.
    pub cooperative_outcomes: u32,
    /// Betrayals suffered.
    pub betrayals_suffered: u32,
    /// Sum of reported mutual benefit.
    pub mutual_benefit_total: f64,
    /// Net profit or loss.
    pub profit_loss: Decimal,
    /// Strategies learned.
    pub strategies_created: u32,
    /// Trait evolutions applied.
    pub trait_changes: u32,
    /// Milestones reached.
    pub milestones: u32,
}

/// What [`TraderAgent::begin_generation`] cleaned up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationMaintenance {
    /// Memory consolidation summary.
    pub consolidation: ConsolidationRecord,
    /// Strategies pruned.
    pub pruned_strategies: Vec<StrategyId>,
}

/// Read-only summary of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// The agent.
    pub agent_id: AgentId,
    /// Generation the agent last entered.
    pub generation: u64,
    /// Trait values by name.
    pub traits: BTreeMap<String, f64>,
    /// Big-five profile.
    pub big_five: BigFiveProfile,
    /// Dark-triad profile.
    pub dark_triad: DarkTriadProfile,
    /// Cultural profile.
    pub cultural: CulturalProfile,
    /// Cognitive-bias profile.
    pub cognitive_biases: CognitiveBiasProfile,
    /// Emotional meta outputs.
    pub emotion: EmotionalReading,
    /// Accumulated resilience.
    pub resilience: f64,
    /// Trait stability at snapshot time.
    pub stability: f64,
    /// Experiences held.
    pub memory_size: usize,
    /// Decisions awaiting an outcome.
    pub pending_decisions: usize,
    /// Known counterparties.
    pub relationships: usize,
    /// Mean trust over known counterparties.
    pub mean_trust: Option<f64>,
    /// Live strategies.
    pub strategies: usize,
    /// Skill levels by name.
    pub skills: BTreeMap<String, f64>,
    /// Specialization path.
    pub specialization: SpecializationPath,
    /// Mean level of the path's core skills.
    pub specialization_depth: f64,
    /// Activity in the current generation.
    pub stats: AgentStats,
}

// ---------------------------------------------------------------------------
// TraderAgent
// ---------------------------------------------------------------------------

/// A simulated trader and all of its owned state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderAgent {
    pub(crate) id: AgentId,
    pub(crate) generation: u64,
    pub(crate) traits: TraitVector,
    pub(crate) memory: MemoryStore,
    pub(crate) relationships: RelationshipGraph,
    pub(crate) emotion: EmotionalState,
    pub(crate) habits: HabitTracker,
    pub(crate) strategies: StrategyLibrary,
    pub(crate) skills: SkillSet,
    pub(crate) ids: IdSource,
    #[serde(default)]
    pub(crate) stats: AgentStats,
}

impl TraderAgent {
    /// Create an agent from a spec.
    ///
    /// Fails with [`AgentError::InvalidTrait`] for unknown trait names.
    pub fn create(
        id: AgentId,
        spec: &AgentSpec,
        ids: IdSource,
        config: &AgentConfig,
    ) -> Result<Self, AgentError> {
        let traits = TraitVector::from_overrides(&spec.traits)?;
        Ok(Self::from_traits(
            id,
            traits,
            spec.path,
            spec.max_potential,
            spec.learning_rate,
            ids,
            config,
        ))
    }

    /// Create an agent around an existing trait vector (offspring).
    pub fn from_traits(
        id: AgentId,
        traits: TraitVector,
        path: Option<SpecializationPath>,
        max_potential: f64,
        learning_rate: f64,
        ids: IdSource,
        config: &AgentConfig,
    ) -> Self {
        let path = path.unwrap_or_else(|| SpecializationPath::from_traits(&traits));
        let emotion = EmotionalState::from_traits(&traits);
        tracing::debug!(
            agent_id = %id,
            path = path.as_str(),
            memory_cap = config.memory_cap,
            "agent created"
        );
        Self {
            id,
            generation: 0,
            traits,
            memory: MemoryStore::new(),
            relationships: RelationshipGraph::new(),
            emotion,
            habits: HabitTracker::new(),
            strategies: StrategyLibrary::new(),
            skills: SkillSet::new(path, max_potential, learning_rate),
            ids,
            stats: AgentStats::default(),
        }
    }

    /// Decide on a situation.
    ///
    /// Advances the emotional state, consults memory, relationships,
    /// habits and strategies, scores the candidate actions and records a
    /// pending experience whose id is the returned session id.
    pub fn decide(
        &mut self,
        situation: &Situation,
        context: &Context,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Result<DecisionRecord, AgentError> {
        let mut ids = self.ids;
        let mut rng = SmallRng::seed_from_u64(ids.next_u64());

        let mut emotion = self.emotion.clone();
        emotion.advance(
            situation.situation_type,
            situation.intensity,
            &context.emotional_impact,
            &self.traits,
            config,
        );
        let reading = emotion.reading();
        let market = decision::merge_market(&situation.market_state, &context.market);
        let tags: BTreeSet<String> = situation.tags.iter().cloned().collect();
        let counterparty = situation.counterparty;
        let (trust, threat, relationship_class) = match counterparty {
            Some(c) => (
                Some(self.relationships.trust(c, config.default_trust)),
                self.relationships.threat(c, config.default_trust),
                Some(self.relationships.class(c)),
            ),
            None => (None, 0.0, None),
        };

        let synthesis = {
            let query = MemoryQuery {
                situation_type: Some(situation.situation_type),
                counterparty,
                market,
                now,
            };
            let memories = self.memory.query(&query, config.memory_query_limit, config);
            let criteria = StrategyCriteria {
                situation_type: situation.situation_type,
                candidates: situation.situation_type.candidate_actions(),
                tags: &tags,
                min_fitness: 0.0,
            };
            let input = DecisionInput {
                situation,
                market,
                social: context.social_context.as_ref(),
                traits: &self.traits,
                emotion: reading,
                regulation_capacity: emotion.regulation_capacity(&self.traits),
                stability: self.traits.stability(now, config),
                memories: &memories,
                trust,
                threat,
                habit: self.habits.propose(situation.situation_type, &tags, now, config),
                strategy: self.strategies.find(&criteria),
                config,
            };
            decision::synthesize(&input, &mut rng).ok_or_else(|| AgentError::InvalidParameter {
                name: "situation_type".to_owned(),
                reason: format!("{} has no candidate actions", situation.situation_type.as_str()),
            })?
        };

        let signature = pattern_signature(situation.situation_type, synthesis.action, &market);
        let mut experience_tags = tags;
        experience_tags.insert(pattern_tag(&signature));
        let draft = ExperienceDraft {
            kind: situation.situation_type.experience_kind(),
            payload: ExperiencePayload::decision(
                situation.situation_type,
                synthesis.action,
                counterparty,
                market,
                situation.intensity.clamp(0.0, 100.0),
                synthesis.strategy_id,
            ),
            emotional_impact: reading.intensity,
            significance: PENDING_SIGNIFICANCE,
            tags: experience_tags,
            decay_rate: decay_rate_for(PENDING_SIGNIFICANCE),
            pending: true,
        };
        let session_id = self.memory.record(draft, &mut ids, now, config)?;

        self.ids = ids;
        self.emotion = emotion;
        self.stats.decisions = self.stats.decisions.saturating_add(1);

        tracing::debug!(
            agent_id = %self.id,
            %session_id,
            situation = situation.situation_type.as_str(),
            action = synthesis.action.as_str(),
            confidence = synthesis.confidence,
            "decision made"
        );

        Ok(DecisionRecord {
            session_id,
            agent_id: self.id,
            situation_type: situation.situation_type,
            action: synthesis.action,
            confidence: synthesis.confidence,
            style: synthesis.style,
            factors: synthesis.factors,
            risk_assessment: synthesis.risk_assessment,
            timing: synthesis.timing,
            strategy_id: synthesis.strategy_id,
            counterparty,
            relationship_class,
            trust,
            dominant_emotion: reading.dominant_emotion,
            flags: synthesis.flags,
            timestamp: now,
        })
    }

    /// Enter a new generation: reset evolution budgets and counters,
    /// consolidate memory and prune unfit strategies.
    pub fn begin_generation(
        &mut self,
        generation: u64,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> GenerationMaintenance {
        self.generation = generation;
        self.traits.begin_generation(generation);
        self.stats = AgentStats::default();
        GenerationMaintenance {
            consolidation: self.memory.consolidate(now, config),
            pruned_strategies: self.strategies.prune(now, config),
        }
    }

    /// Read-only summary.
    pub fn snapshot(&self, now: DateTime<Utc>, config: &AgentConfig) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.id,
            generation: self.generation,
            traits: self
                .traits
                .iter()
                .map(|(t, v)| (t.as_str().to_owned(), v))
                .collect(),
            big_five: self.traits.big_five(),
            dark_triad: self.traits.dark_triad(),
            cultural: self.traits.cultural(),
            cognitive_biases: self.traits.cognitive_biases(),
            emotion: self.emotion.reading(),
            resilience: self.emotion.resilience(),
            stability: self.traits.stability(now, config),
            memory_size: self.memory.len(),
            pending_decisions: self.memory.pending_count(),
            relationships: self.relationships.len(),
            mean_trust: self.relationships.mean_trust(),
            strategies: self.strategies.len(),
            skills: self
                .skills
                .iter()
                .map(|(name, skill)| (name.to_owned(), skill.level))
                .collect(),
            specialization: self.skills.path(),
            specialization_depth: self.skills.depth(),
            stats: self.stats.clone(),
        }
    }

    // --- Accessors ---

    /// Agent id.
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Generation the agent last entered.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Trait vector.
    pub const fn traits(&self) -> &TraitVector {
        &self.traits
    }

    /// Mutable trait vector.
    pub const fn traits_mut(&mut self) -> &mut TraitVector {
        &mut self.traits
    }

    /// Memory.
    pub const fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Relationships.
    pub const fn relationships(&self) -> &RelationshipGraph {
        &self.relationships
    }

    /// Mutable relationships (seeding, reputation effects).
    pub const fn relationships_mut(&mut self) -> &mut RelationshipGraph {
        &mut self.relationships
    }

    /// Emotional state.
    pub const fn emotion(&self) -> &EmotionalState {
        &self.emotion
    }

    /// Habits.
    pub const fn habits(&self) -> &HabitTracker {
        &self.habits
    }

    /// Strategies.
    pub const fn strategies(&self) -> &StrategyLibrary {
        &self.strategies
    }

    /// Skills.
    pub const fn skills(&self) -> &SkillSet {
        &self.skills
    }

    /// Mutable skills (scenario setup and imports).
    pub const fn skills_mut(&mut self) -> &mut SkillSet {
        &mut self.skills
    }

    /// Activity in the current generation.
    pub const fn stats(&self) -> &AgentStats {
        &self.stats
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mercator_types::{SituationType, TradeAction};

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(20_000)
    }

    fn spec(cooperation: f64, risk_tolerance: f64) -> AgentSpec {
        AgentSpec {
            traits: BTreeMap::from([
                ("cooperation".to_owned(), cooperation),
                ("risk_tolerance".to_owned(), risk_tolerance),
            ]),
            ..AgentSpec::default()
        }
    }

    fn agent(spec: &AgentSpec, seed: u64, config: &AgentConfig) -> TraderAgent {
        TraderAgent::create(
            AgentId::next_from(&mut IdSource::new(seed)),
            spec,
            IdSource::new(seed),
            config,
        )
        .unwrap()
    }

    #[test]
    fn decision_records_one_pending_experience() {
        let config = AgentConfig::default();
        let mut trader = agent(&spec(80.0, 20.0), 42, &config);
        let c1 = AgentId::next_from(&mut IdSource::new(7));
        let situation = Situation::new(SituationType::CooperationOffer, 50.0).with_counterparty(c1);

        let decision = trader
            .decide(&situation, &Context::default(), t0(), &config)
            .unwrap();
        assert_eq!(decision.action, TradeAction::Accept);
        assert!((60.0..=80.0).contains(&decision.confidence));
        assert_eq!(trader.memory().len(), 1);
        assert!(trader.memory().is_pending(decision.session_id));
        assert_eq!(decision.trust, Some(config.default_trust));
    }

    #[test]
    fn identical_agents_decide_identically() {
        let config = AgentConfig::default();
        let situation = Situation::new(SituationType::TradeOpportunity, 60.0);
        let mut a = agent(&spec(50.0, 70.0), 5, &config);
        let mut b = agent(&spec(50.0, 70.0), 5, &config);
        let da = a.decide(&situation, &Context::default(), t0(), &config).unwrap();
        let db = b.decide(&situation, &Context::default(), t0(), &config).unwrap();
        assert_eq!(
            serde_json::to_string(&da).unwrap(),
            serde_json::to_string(&db).unwrap()
        );
    }

    #[test]
    fn unknown_trait_is_rejected() {
        let config = AgentConfig::default();
        let bad = AgentSpec {
            traits: BTreeMap::from([("charisma".to_owned(), 90.0)]),
            ..AgentSpec::default()
        };
        let result = TraderAgent::create(AgentId::new(), &bad, IdSource::new(1), &config);
        assert_eq!(
            result.err(),
            Some(AgentError::InvalidTrait {
                name: "charisma".to_owned()
            })
        );
    }

    #[test]
    fn failed_decision_leaves_agent_untouched() {
        let config = AgentConfig {
            memory_cap: 1,
            ..AgentConfig::default()
        };
        let mut trader = agent(&AgentSpec::default(), 3, &config);
        let situation = Situation::new(SituationType::Negotiation, 40.0);
        trader
            .decide(&situation, &Context::default(), t0(), &config)
            .unwrap();
        let before = trader.clone();
        let result = trader.decide(&situation, &Context::default(), t0(), &config);
        assert!(matches!(result, Err(AgentError::MemoryFull { .. })));
        assert_eq!(trader, before);
    }

    #[test]
    fn begin_generation_resets_counters() {
        let config = AgentConfig::default();
        let mut trader = agent(&AgentSpec::default(), 11, &config);
        let situation = Situation::new(SituationType::Competition, 40.0);
        trader
            .decide(&situation, &Context::default(), t0(), &config)
            .unwrap();
        assert_eq!(trader.stats().decisions, 1);
        trader.begin_generation(1, t0(), &config);
        assert_eq!(trader.generation(), 1);
        assert_eq!(trader.stats().decisions, 0);
        let snapshot = trader.snapshot(t0(), &config);
        assert_eq!(snapshot.pending_decisions, 1);
        assert_eq!(snapshot.traits.len(), crate::traits::Trait::ALL.len());
    }
}
