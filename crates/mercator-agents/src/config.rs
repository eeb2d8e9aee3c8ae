//! Tunable parameters for the per-agent decision and learning loop.
//!
//! Every constant the decision synthesizer, memory store and learning loop
//! use lives here with its default. The engine deserializes this struct
//! from the `agents` section of `mercator-config.yaml` and hands a shared
//! reference to every agent operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::Emotion;

/// Configuration for trader agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // --- Memory ---
    /// Maximum number of experiences held in memory (default: 500).
    pub memory_cap: usize,

    /// Age in days after which low-significance experiences may be dropped
    /// (default: 90).
    pub memory_retention_days: u32,

    /// Number of experiences consulted per decision (default: 5).
    pub memory_query_limit: usize,

    /// Time constant in days of the relevance decay `exp(-age/τ)`
    /// (default: 30).
    pub memory_decay_days: f64,

    /// Minimum number of similar experiences folded into a lesson
    /// (default: 4).
    pub consolidation_min_group: usize,

    /// Experiences at or above this significance are never dropped
    /// (default: 70).
    pub retention_significance: f64,

    /// Experiences at or above this emotional impact are never dropped
    /// (default: 80).
    pub retention_impact: f64,

    // --- Traits ---
    /// Largest absolute change a single evolution may apply (default: 8).
    pub max_evolution_step: f64,

    /// Evolutions allowed per trait per generation (default: 20).
    pub max_evolutions_per_gen: u32,

    /// Window in hours over which evolution events lower stability
    /// (default: 24).
    pub stability_window_hours: i64,

    /// Stability lost per evolution event inside the window (default: 5).
    pub stability_penalty_per_event: f64,

    // --- Relationships ---
    /// Trust assumed for counterparties with no relationship (default: 50).
    pub default_trust: f64,

    /// Interactions kept per relationship history (default: 50).
    pub relationship_history_cap: usize,

    // --- Emotions ---
    /// Mixing weight per emotion for incoming impulses (default: 0.6 each).
    pub emotion_mixing: BTreeMap<Emotion, f64>,

    /// Fraction of the distance to baseline recovered per decision
    /// (default: 0.2).
    pub emotion_relaxation: f64,

    /// Regulation ceiling at zero regulation capacity (default: 60).
    pub regulation_ceiling_base: f64,

    /// Ceiling gained per point of regulation capacity (default: 0.4).
    pub regulation_ceiling_slope: f64,

    /// Multiplier applied to a trauma residue after each decision
    /// (default: 0.85).
    pub residue_decay: f64,

    /// Residue weights below this are discarded (default: 1.0).
    pub residue_floor: f64,

    /// Resilience gained from a growth opportunity (default: 5).
    pub resilience_gain: f64,

    // --- Behaviour ---
    /// Successful repetitions before an action becomes a habit (default: 3).
    pub habit_min_repetitions: u32,

    /// Time constant in days of habit recency (default: 14).
    pub habit_recency_days: f64,

    /// Score bonus of a full-strength habit, as a fraction (default: 0.25).
    pub habit_weight: f64,

    /// Impulse pressure above which impulse control engages (default: 40).
    pub impulse_threshold: f64,

    /// Actions at or above this risk are replaced under regulation
    /// (default: 60).
    pub high_risk_threshold: f64,

    /// Confidence bonus when regulation is applied (default: 10).
    pub regulation_bonus: f64,

    /// Confidence penalty on an impulse override (default: 20).
    pub impulse_penalty: f64,

    /// Maximum score shift from social adaptation, as a fraction
    /// (default: 0.3).
    pub social_adaptation_strength: f64,

    // --- Decision ---
    /// Confidence used when no strategy applies (default: 60).
    pub default_confidence: f64,

    /// Half-width of the uniform exploration noise added to scores
    /// (default: 0.5).
    pub exploration_noise: f64,

    /// Factor contributions reported per decision (default: 5).
    pub factor_count: usize,

    /// Score weight of a recommending strategy's fitness (default: 20).
    pub strategy_weight: f64,

    /// Maximum absolute memory prior per action (default: 10).
    pub memory_prior_weight: f64,

    // --- Strategies ---
    /// Fitness learning rate `α` (default: 0.1, valid 0.05--0.2).
    pub strategy_learning_rate: f64,

    /// Similar resolved experiences needed to learn a strategy (default: 5).
    pub strategy_min_pattern: usize,

    /// Success rate needed to learn a strategy (default: 0.75).
    pub strategy_min_success: f64,

    /// Strategies below this fitness are pruned once they have stayed
    /// below it long enough (default: 0.2).
    pub strategy_prune_fitness: f64,

    /// Days a strategy must stay below the prune fitness before it is
    /// pruned (default: 30).
    pub strategy_prune_age_days: i64,

    // --- Learning ---
    /// Profit or loss magnitude that fires a major trigger (default: 1000).
    pub major_pnl_threshold: f64,

    /// Mutual benefit above which cooperation is deep (default: 80).
    pub deep_cooperation_threshold: f64,

    /// Situation intensity at or above which an outcome can traumatize
    /// (default: 85).
    pub trauma_threshold: f64,

    /// Emotional impact at or above which an outcome can traumatize
    /// (default: 80).
    pub trauma_impact_threshold: f64,

    // --- Skills ---
    /// Base experience granted per resolved outcome (default: 20).
    pub skill_base_xp: f64,

    /// Multiplier for the specialization path's core skills (default: 1.2).
    pub path_bonus: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            memory_cap: 500,
            memory_retention_days: 90,
            memory_query_limit: 5,
            memory_decay_days: 30.0,
            consolidation_min_group: 4,
            retention_significance: 70.0,
            retention_impact: 80.0,
            max_evolution_step: 8.0,
            max_evolutions_per_gen: 20,
            stability_window_hours: 24,
            stability_penalty_per_event: 5.0,
            default_trust: 50.0,
            relationship_history_cap: 50,
            emotion_mixing: Emotion::ALL.iter().map(|e| (*e, 0.6)).collect(),
            emotion_relaxation: 0.2,
            regulation_ceiling_base: 60.0,
            regulation_ceiling_slope: 0.4,
            residue_decay: 0.85,
            residue_floor: 1.0,
            resilience_gain: 5.0,
            habit_min_repetitions: 3,
            habit_recency_days: 14.0,
            habit_weight: 0.25,
            impulse_threshold: 40.0,
            high_risk_threshold: 60.0,
            regulation_bonus: 10.0,
            impulse_penalty: 20.0,
            social_adaptation_strength: 0.3,
            default_confidence: 60.0,
            exploration_noise: 0.5,
            factor_count: 5,
            strategy_weight: 20.0,
            memory_prior_weight: 10.0,
            strategy_learning_rate: 0.1,
            strategy_min_pattern: 5,
            strategy_min_success: 0.75,
            strategy_prune_fitness: 0.2,
            strategy_prune_age_days: 30,
            major_pnl_threshold: 1000.0,
            deep_cooperation_threshold: 80.0,
            trauma_threshold: 85.0,
            trauma_impact_threshold: 80.0,
            skill_base_xp: 20.0,
            path_bonus: 1.2,
        }
    }
}

impl AgentConfig {
    /// Mixing weight for an emotion, falling back to 0.6.
    pub fn mixing_weight(&self, emotion: Emotion) -> f64 {
        self.emotion_mixing.get(&emotion).copied().unwrap_or(0.6)
    }

    /// Check that every rate lies in its valid range.
    ///
    /// Returns the name of the first offending field.
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(0.05..=0.2).contains(&self.strategy_learning_rate) {
            return Err("strategy_learning_rate");
        }
        if !(0.0..=1.0).contains(&self.strategy_min_success) {
            return Err("strategy_min_success");
        }
        if !(0.0..=100.0).contains(&self.trauma_threshold) {
            return Err("trauma_threshold");
        }
        if self.max_evolution_step <= 0.0 {
            return Err("max_evolution_step");
        }
        if self.memory_cap == 0 {
            return Err("memory_cap");
        }
        if self.memory_decay_days <= 0.0 {
            return Err("memory_decay_days");
        }
        if !(0.0..=1.0).contains(&self.emotion_relaxation) {
            return Err("emotion_relaxation");
        }
        if !(0.0..1.0).contains(&self.residue_decay) {
            return Err("residue_decay");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(AgentConfig::default().validate(), Ok(()));
    }

    #[test]
    fn learning_rate_out_of_range_is_rejected() {
        let config = AgentConfig {
            strategy_learning_rate: 0.5,
            ..AgentConfig::default()
        };
        assert_eq!(config.validate(), Err("strategy_learning_rate"));
    }

    #[test]
    fn partial_yaml_like_json_keeps_defaults() {
        let parsed: Result<AgentConfig, _> = serde_json::from_str(r#"{"memory_cap": 42}"#);
        let parsed = parsed.ok();
        assert_eq!(parsed.as_ref().map(|c| c.memory_cap), Some(42));
        assert_eq!(parsed.map(|c| c.memory_retention_days), Some(90));
    }
}
