//! Wire structs exchanged between the engine and its collaborators.
//!
//! Inputs ([`Situation`], [`Context`], [`Outcome`]), per-agent outputs
//! ([`DecisionRecord`], [`LearningRecord`]) and population-level outputs
//! ([`GenerationReport`], [`PopulationStatus`], [`EmergentBehavior`]).
//! Maps use [`BTreeMap`] so serialized output is ordered and reproducible.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    DecisionStyle, DecisionTiming, Emotion, FitnessComponent, MilestoneReward, OutcomeClass,
    RelationshipClass, RiskLevel, SituationType, TradeAction, TriggerKind,
};
use crate::ids::{AgentId, EmergentBehaviorId, ExperienceId, StrategyId};

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Numeric market indicators, each on a 0--100 scale when present.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MarketState {
    /// Price volatility.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volatility: Option<f64>,
    /// Trend strength (50 is flat, above is bullish).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trend: Option<f64>,
    /// Market liquidity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liquidity: Option<f64>,
}

impl MarketState {
    /// Market state with all three indicators set.
    pub const fn new(volatility: f64, trend: f64, liquidity: f64) -> Self {
        Self {
            volatility: Some(volatility),
            trend: Some(trend),
            liquidity: Some(liquidity),
        }
    }

    /// Mean of `1 - |a - b| / 100` over the indicators both states carry.
    ///
    /// Returns 0.0 when the states share no indicator.
    pub fn similarity(&self, other: &Self) -> f64 {
        let pairs = [
            (self.volatility, other.volatility),
            (self.trend, other.trend),
            (self.liquidity, other.liquidity),
        ];
        let mut total = 0.0;
        let mut shared = 0_u32;
        for (a, b) in pairs {
            if let (Some(a), Some(b)) = (a, b) {
                total += 1.0 - ((a - b).abs() / 100.0).min(1.0);
                shared = shared.saturating_add(1);
            }
        }
        if shared == 0 {
            0.0
        } else {
            (total / f64::from(shared)).clamp(0.0, 1.0)
        }
    }

    /// Coarse three-way bucket of the volatility indicator (low/mid/high).
    pub fn volatility_bucket(&self) -> &'static str {
        match self.volatility {
            None => "na",
            Some(v) if v < 33.3 => "low",
            Some(v) if v < 66.6 => "mid",
            Some(_) => "high",
        }
    }
}

/// A situation an agent must decide on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Situation {
    /// What kind of situation this is.
    pub situation_type: SituationType,
    /// How pressing the situation is (0--100).
    pub intensity: f64,
    /// The counterparty involved, if any.
    #[serde(default)]
    pub counterparty: Option<AgentId>,
    /// How hard the situation is to analyse (0--100).
    #[serde(default = "default_complexity")]
    pub complexity: f64,
    /// Market indicators observed with the situation.
    #[serde(default)]
    pub market_state: MarketState,
    /// Free-form tags used for habit and memory matching.
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Default complexity for situations that do not specify one.
const fn default_complexity() -> f64 {
    50.0
}

impl Situation {
    /// Situation with default complexity, no counterparty and no tags.
    pub fn new(situation_type: SituationType, intensity: f64) -> Self {
        Self {
            situation_type,
            intensity,
            counterparty: None,
            complexity: default_complexity(),
            market_state: MarketState::default(),
            tags: Vec::new(),
        }
    }

    /// Builder-style setter for the counterparty.
    #[must_use]
    pub fn with_counterparty(mut self, counterparty: AgentId) -> Self {
        self.counterparty = Some(counterparty);
        self
    }

    /// Builder-style setter for the market state.
    #[must_use]
    pub fn with_market(mut self, market_state: MarketState) -> Self {
        self.market_state = market_state;
        self
    }

    /// Builder-style setter for the tags.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Observers and group dynamics around a decision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SocialContext {
    /// Number of other traders watching.
    pub observers: u32,
    /// Cooperation level of the surrounding group (0.0--1.0).
    pub group_cooperation: f64,
    /// Whether the agent's reputation is at stake.
    pub reputation_at_stake: bool,
}

/// Ambient context supplied alongside a situation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Context {
    /// Market data from the caller's feed; merged over the situation's own
    /// market state when both carry an indicator.
    #[serde(default)]
    pub market: MarketState,
    /// Social setting, if the decision happens in front of others.
    #[serde(default)]
    pub social_context: Option<SocialContext>,
    /// Emotional impact hint per emotion (0--100), added to the agent's
    /// emotional state before regulation.
    #[serde(default)]
    pub emotional_impact: BTreeMap<Emotion, f64>,
}

/// What happened after the agent acted on a decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Outcome {
    /// Classification driving trust updates.
    pub class: OutcomeClass,
    /// Whether the agent considers the result a success.
    pub success: bool,
    /// Monetary profit (positive) or loss (negative).
    #[ts(as = "String")]
    pub profit_loss: Decimal,
    /// Subjective satisfaction (0--100).
    pub satisfaction: f64,
    /// Emotional impact of the outcome (0--100).
    pub emotional_impact: f64,
    /// Whether the result surprised the agent.
    pub unexpected: bool,
    /// Benefit to both sides (0--100), meaningful for cooperation.
    #[serde(default)]
    pub mutual_benefit: Option<f64>,
    /// Whether the agent can grow from the experience.
    #[serde(default)]
    pub growth_opportunity: bool,
}

impl Outcome {
    /// Neutral outcome used when a recorded decision is cancelled.
    pub const fn no_outcome() -> Self {
        Self {
            class: OutcomeClass::NoOutcome,
            success: false,
            profit_loss: Decimal::ZERO,
            satisfaction: 50.0,
            emotional_impact: 0.0,
            unexpected: false,
            mutual_benefit: None,
            growth_opportunity: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Contribution of one named factor to the chosen action's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct FactorContribution {
    /// Factor name (e.g. `trait:cooperation`, `strategy`, `memory`).
    pub factor: String,
    /// Signed contribution to the score.
    pub contribution: f64,
}

/// Risk summary attached to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RiskAssessment {
    /// Combined risk score (0--100).
    pub score: f64,
    /// Bucketed level of the score.
    pub level: RiskLevel,
    /// Intrinsic risk of the chosen action.
    pub action_risk: f64,
    /// Threat posed by the counterparty, capped at 100.
    pub counterparty_threat: f64,
    /// Market volatility used in the assessment.
    pub market_volatility: f64,
}

/// Behavioural flags raised while synthesizing a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionFlags {
    /// Impulse control replaced a high-risk action.
    pub regulation_applied: bool,
    /// An unregulated impulse kept the raw top action.
    pub impulse_override: bool,
    /// The chosen action matches a learned habit.
    pub habit_followed: bool,
    /// Social adaptation changed the scores.
    pub social_adapted: bool,
}

/// The full record of one decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DecisionRecord {
    /// Session id; equal to the id of the pending experience.
    pub session_id: ExperienceId,
    /// The deciding agent.
    pub agent_id: AgentId,
    /// The situation decided on.
    pub situation_type: SituationType,
    /// The chosen action.
    pub action: TradeAction,
    /// Confidence in the action (0--100).
    pub confidence: f64,
    /// Qualitative style of the decision.
    pub style: DecisionStyle,
    /// Top contributing factors, largest magnitude first.
    pub factors: Vec<FactorContribution>,
    /// Risk summary.
    pub risk_assessment: RiskAssessment,
    /// When the agent intends to act.
    pub timing: DecisionTiming,
    /// Strategy consulted, if any.
    pub strategy_id: Option<StrategyId>,
    /// Counterparty, if any.
    pub counterparty: Option<AgentId>,
    /// Relationship class with the counterparty at decision time.
    pub relationship_class: Option<RelationshipClass>,
    /// Trust in the counterparty at decision time.
    pub trust: Option<f64>,
    /// Dominant emotion after regulation.
    pub dominant_emotion: Emotion,
    /// Behavioural flags.
    pub flags: DecisionFlags,
    /// Simulated time of the decision.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

/// One trait evolution applied by the learning loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TraitChange {
    /// Trait name.
    pub trait_name: String,
    /// Trigger that caused the change.
    pub trigger: TriggerKind,
    /// Value before the change.
    pub before: f64,
    /// Value after the change.
    pub after: f64,
}

/// A skill milestone reached for the first time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct MilestoneRecord {
    /// Skill name.
    pub skill: String,
    /// Milestone level (25, 50, 75 or 90).
    pub level: u8,
    /// Reward attached to the milestone.
    pub reward: MilestoneReward,
}

/// Experience granted to one skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SkillGain {
    /// Skill name.
    pub skill: String,
    /// Experience points added.
    pub xp_gained: f64,
    /// Level before the gain.
    pub level_before: f64,
    /// Level after the gain.
    pub level_after: f64,
}

/// Fitness change of the strategy a decision used.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StrategyFitnessUpdate {
    /// The strategy.
    pub strategy_id: StrategyId,
    /// Fitness before the update.
    pub fitness_before: f64,
    /// Fitness after the update.
    pub fitness_after: f64,
}

/// Everything the learning loop changed for one reported outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LearningRecord {
    /// The resolved session.
    pub session_id: ExperienceId,
    /// The learning agent.
    pub agent_id: AgentId,
    /// Outcome class applied.
    pub outcome_class: OutcomeClass,
    /// Significance assigned to the resolved experience.
    pub significance: f64,
    /// Decay rate assigned to the resolved experience.
    pub decay_rate: f64,
    /// Trust before the update, when a counterparty was involved.
    pub trust_before: Option<f64>,
    /// Trust after the update, when a counterparty was involved.
    pub trust_after: Option<f64>,
    /// Relationship class after the update.
    pub relationship_class: Option<RelationshipClass>,
    /// Fitness update of the strategy used.
    pub strategy_update: Option<StrategyFitnessUpdate>,
    /// Strategy created from a newly confirmed pattern.
    pub new_strategy: Option<StrategyId>,
    /// Experience granted to skills.
    pub skill_gains: Vec<SkillGain>,
    /// Milestones reached for the first time.
    pub milestones: Vec<MilestoneRecord>,
    /// Triggers that fired.
    pub triggers: Vec<TriggerKind>,
    /// Trait changes applied.
    pub trait_changes: Vec<TraitChange>,
    /// The experience was classified as trauma.
    pub trauma: bool,
    /// Resilience factors grew (never together with trauma).
    pub resilience_gained: bool,
    /// Simulated time of the update.
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// A behavioural cluster detected across the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EmergentBehavior {
    /// Unique identifier.
    pub id: EmergentBehaviorId,
    /// Generation in which the cluster was detected.
    pub generation: u64,
    /// Discretised behavioural signature shared by the cluster.
    pub signature: String,
    /// Number of agents in the cluster.
    pub participant_count: usize,
    /// Share of the population in the cluster (0.0--1.0).
    pub share: f64,
    /// Agents in the cluster.
    pub participants: Vec<AgentId>,
    /// Simulated detection time.
    pub detected_at: DateTime<Utc>,
}

/// Summary of one generation tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GenerationReport {
    /// The generation number just completed.
    pub generation: u64,
    /// Population size when the tick started.
    pub population_before: usize,
    /// Population size after the tick.
    pub population_after: usize,
    /// Elite agents preserved unconditionally.
    pub elite_ids: Vec<AgentId>,
    /// Number of agents in the deduplicated parent pool.
    pub parent_pool_size: usize,
    /// Offspring added to the population.
    pub offspring_created: usize,
    /// Offspring discarded by the hard population cap.
    pub offspring_discarded: usize,
    /// Gene mutations applied to offspring.
    pub mutations: usize,
    /// Agents evicted to restore the target size.
    pub evicted: Vec<AgentId>,
    /// Agents that missed the scoring deadline.
    pub schedule_missed: Vec<AgentId>,
    /// Agents penalised by environmental pressure.
    pub pressure_penalized: usize,
    /// Mean overall fitness after scoring.
    pub mean_fitness: f64,
    /// Highest overall fitness after scoring.
    pub max_fitness: f64,
    /// Lowest overall fitness after scoring.
    pub min_fitness: f64,
    /// Mean fitness per component after scoring.
    pub component_means: BTreeMap<FitnessComponent, f64>,
    /// Shannon diversity over behavioural signatures.
    pub diversity_index: f64,
    /// Whether the next selection boosts the frequency-dependent slice.
    pub diversity_boost_next: bool,
    /// Simulated completion time.
    pub completed_at: DateTime<Utc>,
}

/// Point-in-time status of the population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PopulationStatus {
    /// Last completed generation.
    pub generation: u64,
    /// Current number of agents.
    pub size: usize,
    /// Target number of agents after each tick.
    pub target_size: usize,
    /// Mean overall fitness.
    pub mean_fitness: f64,
    /// Shannon diversity over behavioural signatures.
    pub diversity_index: f64,
    /// Number of emergent behaviours recorded so far.
    pub emergent_behaviors: usize,
    /// Population-wide mean of each cultural norm.
    pub cultural_norms: BTreeMap<String, f64>,
    /// Number of environmental pressures in effect.
    pub active_pressures: usize,
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// A change in the external environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EnvironmentalChange {
    /// Change type, matched against the configured pressure rules.
    #[serde(rename = "type")]
    pub change_type: String,
    /// Magnitude (0--100); scales the rule's penalty.
    pub magnitude: f64,
    /// When the change happened.
    pub timestamp: DateTime<Utc>,
}

/// A pressure favouring a region of one trait.
///
/// Agents whose trait falls outside `[min, max]` lose `penalty` fitness in
/// each of the next `generations` generations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EvolutionaryPressure {
    /// Trait the pressure acts on.
    pub trait_name: String,
    /// Lower bound of the adapted region.
    pub min: f64,
    /// Upper bound of the adapted region.
    pub max: f64,
    /// Fitness penalty for agents outside the region.
    pub penalty: f64,
    /// Number of generations the pressure lasts.
    pub generations: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_similarity_over_shared_keys() {
        let a = MarketState::new(50.0, 50.0, 50.0);
        let b = MarketState {
            volatility: Some(70.0),
            trend: None,
            liquidity: Some(50.0),
        };
        let sim = a.similarity(&b);
        assert!((sim - 0.9).abs() < 1e-9);
    }

    #[test]
    fn market_similarity_without_shared_keys_is_zero() {
        let a = MarketState::default();
        let b = MarketState::new(10.0, 20.0, 30.0);
        assert!(a.similarity(&b).abs() < f64::EPSILON);
    }

    #[test]
    fn environmental_change_uses_type_key() {
        let change = EnvironmentalChange {
            change_type: "volatility_spike".to_owned(),
            magnitude: 40.0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&change).ok();
        assert_eq!(
            json.as_ref().and_then(|v| v.get("type")).and_then(|v| v.as_str()),
            Some("volatility_spike")
        );
    }

    #[test]
    fn situation_defaults_fill_in() {
        let json = r#"{"situation_type":"negotiation","intensity":30.0}"#;
        let situation: Result<Situation, _> = serde_json::from_str(json);
        let situation = situation.ok();
        assert_eq!(
            situation.as_ref().map(|s| s.situation_type),
            Some(SituationType::Negotiation)
        );
        assert!(situation.is_some_and(|s| (s.complexity - 50.0).abs() < f64::EPSILON));
    }
}
