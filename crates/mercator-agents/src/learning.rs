//! Learning loop: turns a reported outcome into updates of every part of
//! the agent that owns the decision.
//!
//! Order of work for one outcome:
//!
//! 1. resolve the pending experience with its significance and decay rate;
//! 2. move trust in the counterparty;
//! 3. blend the outcome into the fitness of the strategy that was followed,
//!    and learn a new strategy once the pattern is confirmed;
//! 4. grant skill XP and collect milestones;
//! 5. fire trait-evolution triggers;
//! 6. classify trauma or grow resilience (never both);
//! 7. update emotions and habits.
//!
//! A `no_outcome` report (cancellation after recording) only resolves the
//! experience; it counts neither as success nor as failure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use mercator_types::{
    ExperienceId, LearningRecord, MilestoneReward, Outcome, OutcomeClass, StrategyId, TriggerKind,
};

use crate::agent::TraderAgent;
use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::memory::{Resolution, TAG_FAILED, TAG_SUCCESSFUL, decay_rate_for, pattern_signature};
use crate::skills;
use crate::strategy::Strategy;
use crate::traits::Trait;

/// Trait raise applied by a trait-boost milestone.
const MILESTONE_TRAIT_BOOST: f64 = 2.0;

/// Traits a trigger evolves, with the direction of the change.
pub const fn trigger_traits(kind: TriggerKind) -> &'static [(Trait, f64)] {
    match kind {
        TriggerKind::MajorSuccess => &[
            (Trait::RiskTolerance, 1.0),
            (Trait::Overconfidence, 1.0),
            (Trait::Adaptability, 0.5),
        ],
        TriggerKind::MajorLoss => &[
            (Trait::LossAversion, 1.0),
            (Trait::RiskTolerance, -1.0),
            (Trait::AnxietyTendency, 0.5),
        ],
        TriggerKind::Betrayal => &[
            (Trait::TrustPropensity, -1.0),
            (Trait::ParanoidTendency, 1.0),
            (Trait::Cooperation, -0.5),
        ],
        TriggerKind::DeepCooperation => &[
            (Trait::Cooperation, 1.0),
            (Trait::TrustPropensity, 1.0),
            (Trait::Empathy, 0.5),
        ],
        TriggerKind::PatternReinforcement => &[
            (Trait::LearningSpeed, 0.5),
            (Trait::Anchoring, 0.5),
            (Trait::ConfirmationBias, 0.5),
        ],
        TriggerKind::Trauma => &[
            (Trait::EmotionalStability, -1.0),
            (Trait::AnxietyTendency, 1.0),
            (Trait::TrustPropensity, -0.5),
        ],
    }
}

/// Significance of a resolved experience:
/// `50 + min(30, |pnl|/100) + 20·surprise + 15·first_time_counterparty`.
pub fn significance(profit_loss: Decimal, unexpected: bool, first_time: bool) -> f64 {
    let pnl = profit_loss.abs().to_f64().unwrap_or(0.0);
    let mut score = 50.0 + (pnl / 100.0).min(30.0);
    if unexpected {
        score += 20.0;
    }
    if first_time {
        score += 15.0;
    }
    score.clamp(0.0, 100.0)
}

/// How much an outcome teaches the skills involved (0--1).
pub const fn effectiveness(class: OutcomeClass) -> f64 {
    match class {
        OutcomeClass::Successful | OutcomeClass::Cooperation => 1.0,
        OutcomeClass::Betrayal => 0.6,
        OutcomeClass::Failed => 0.5,
        OutcomeClass::NoOutcome => 0.0,
    }
}

/// Triggers an outcome fires, with their intensity (0--100).
fn triggers_for(
    outcome: &Outcome,
    pattern_occurrences: u32,
    trauma: bool,
    config: &AgentConfig,
) -> Vec<(TriggerKind, f64)> {
    let mut triggers = Vec::new();
    let impact = outcome.emotional_impact.clamp(0.0, 100.0);
    let pnl = outcome.profit_loss.to_f64().unwrap_or(0.0);
    let major = config.major_pnl_threshold;
    let magnitude = (50.0 + (pnl.abs() - major) / 100.0).clamp(0.0, 100.0);
    if pnl > major {
        triggers.push((TriggerKind::MajorSuccess, magnitude));
    } else if pnl < -major {
        triggers.push((TriggerKind::MajorLoss, magnitude));
    }
    if outcome.class == OutcomeClass::Betrayal {
        triggers.push((TriggerKind::Betrayal, 50.0 + 0.5 * impact));
    }
    if outcome.class == OutcomeClass::Cooperation
        && outcome
            .mutual_benefit
            .is_some_and(|b| b > config.deep_cooperation_threshold)
    {
        triggers.push((TriggerKind::DeepCooperation, 50.0 + 0.5 * impact));
    }
    let min_pattern = u32::try_from(config.strategy_min_pattern).unwrap_or(u32::MAX);
    if pattern_occurrences >= min_pattern {
        triggers.push((TriggerKind::PatternReinforcement, 30.0));
    }
    if trauma {
        triggers.push((TriggerKind::Trauma, impact));
    }
    triggers
}

impl TraderAgent {
    /// Apply a reported outcome to the pending experience `session_id`.
    ///
    /// Fails with [`AgentError::UnknownSession`] if the session is unknown
    /// or already resolved; the agent is unchanged in that case.
    pub fn report_outcome(
        &mut self,
        session_id: ExperienceId,
        outcome: &Outcome,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Result<LearningRecord, AgentError> {
        let pending = self
            .memory
            .get(session_id)
            .filter(|e| e.is_pending())
            .ok_or(AgentError::UnknownSession(session_id))?;
        let payload = pending.payload.clone();
        let habit_tags: BTreeSet<String> = pending
            .tags
            .iter()
            .filter(|t| !t.starts_with("pattern:"))
            .cloned()
            .collect();

        let neutral = outcome.class == OutcomeClass::NoOutcome;
        let first_time = payload
            .counterparty
            .is_some_and(|c| self.relationships.is_first_interaction(c));
        let significance = significance(outcome.profit_loss, outcome.unexpected, first_time);
        let decay_rate = decay_rate_for(significance);
        let impact = outcome.emotional_impact.clamp(0.0, 100.0);
        let trauma = !neutral
            && payload.intensity >= config.trauma_threshold
            && impact >= config.trauma_impact_threshold;
        let resilience_gained = !neutral && !trauma && outcome.growth_opportunity;

        // 1. Memory.
        let mut tags = Vec::new();
        if !neutral {
            tags.push(if outcome.success { TAG_SUCCESSFUL } else { TAG_FAILED }.to_owned());
        }
        self.memory.resolve(
            session_id,
            Resolution {
                outcome: outcome.class,
                success: outcome.success,
                profit_loss: outcome.profit_loss,
                significance,
                decay_rate,
                emotional_impact: impact,
                trauma,
                tags,
            },
        )?;

        let mut record = LearningRecord {
            session_id,
            agent_id: self.id,
            outcome_class: outcome.class,
            significance,
            decay_rate,
            trust_before: None,
            trust_after: None,
            relationship_class: None,
            strategy_update: None,
            new_strategy: None,
            skill_gains: Vec::new(),
            milestones: Vec::new(),
            triggers: Vec::new(),
            trait_changes: Vec::new(),
            trauma,
            resilience_gained,
            timestamp: now,
        };

        if neutral {
            self.stats.outcomes = self.stats.outcomes.saturating_add(1);
            tracing::debug!(agent_id = %self.id, %session_id, "decision resolved without outcome");
            return Ok(record);
        }

        // 2. Relationship.
        if let Some(counterparty) = payload.counterparty {
            let update = self.relationships.apply(
                counterparty,
                outcome.class,
                now,
                config.default_trust,
                config.relationship_history_cap,
            );
            record.trust_before = Some(update.before);
            record.trust_after = Some(update.after);
            record.relationship_class = Some(update.class);
        }

        // 3. Strategies.
        let observed = if outcome.success { 1.0 } else { 0.0 };
        if let Some(strategy_id) = payload.strategy_id {
            record.strategy_update = self
                .strategies
                .record_outcome(strategy_id, observed, now, config);
        }
        let mut pattern_occurrences = 0;
        if let (Some(situation_type), Some(action)) = (payload.situation_type, payload.action) {
            let signature = pattern_signature(situation_type, action, &payload.market);
            let (occurrences, successes) = self.memory.pattern_stats(&signature);
            pattern_occurrences = occurrences;
            record.new_strategy =
                self.learn_strategy(&signature, occurrences, successes, &habit_tags, now, config);
        }

        // 4. Skills.
        if let Some(situation_type) = payload.situation_type {
            let grants = self.skills.grant_for_situation(
                situation_type,
                effectiveness(outcome.class),
                now,
                config,
            );
            for grant in grants {
                record.skill_gains.push(grant.gain);
                record.milestones.extend(grant.milestones);
            }
            for milestone in &record.milestones {
                if milestone.reward == MilestoneReward::TraitBoost
                    && let Some(t) = skills::related_trait(&milestone.skill)
                {
                    let value = self.traits.value(t);
                    self.traits.set_trait(t, value + MILESTONE_TRAIT_BOOST);
                }
            }
        }

        // 5 and 6. Triggers, trauma and resilience.
        for (kind, intensity) in triggers_for(outcome, pattern_occurrences, trauma, config) {
            record.triggers.push(kind);
            for &(t, direction) in trigger_traits(kind) {
                if let Some(change) =
                    self.traits
                        .evolve_trait(t, kind, intensity, direction, now, config)
                {
                    record.trait_changes.push(change);
                }
            }
        }

        // 7. Emotions and habits.
        self.emotion.apply_outcome(outcome, &self.traits, config);
        if trauma {
            self.emotion.add_trauma_residue(impact);
        } else if resilience_gained {
            self.emotion.grow_resilience(config.resilience_gain);
        }
        if let (Some(situation_type), Some(action)) = (payload.situation_type, payload.action) {
            self.habits
                .reinforce(situation_type, action, &habit_tags, outcome.success, now);
        }

        self.record_stats(outcome, &record);
        tracing::debug!(
            agent_id = %self.id,
            %session_id,
            outcome = outcome.class.as_str(),
            significance,
            triggers = record.triggers.len(),
            trait_changes = record.trait_changes.len(),
            trauma,
            "outcome learned"
        );
        Ok(record)
    }

    /// Cancel a recorded decision: resolves it as `no_outcome`.
    pub fn cancel_decision(
        &mut self,
        session_id: ExperienceId,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Result<LearningRecord, AgentError> {
        self.report_outcome(session_id, &Outcome::no_outcome(), now, config)
    }

    /// Insert a strategy for a confirmed pattern that has none yet.
    fn learn_strategy(
        &mut self,
        signature: &str,
        occurrences: u32,
        successes: u32,
        tags: &BTreeSet<String>,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Option<StrategyId> {
        let min_pattern = u32::try_from(config.strategy_min_pattern).unwrap_or(u32::MAX);
        if occurrences < min_pattern || occurrences == 0 {
            return None;
        }
        let success_rate = f64::from(successes) / f64::from(occurrences);
        if success_rate < config.strategy_min_success
            || self.strategies.by_signature(signature).is_some()
        {
            return None;
        }
        let mut parts = signature.split(':');
        let situation_type = parts.next().and_then(|s| {
            mercator_types::SituationType::ALL
                .iter()
                .copied()
                .find(|t| t.as_str() == s)
        })?;
        let action = parts.next().and_then(|s| {
            situation_type
                .candidate_actions()
                .iter()
                .copied()
                .find(|a| a.as_str() == s)
        })?;

        let id = StrategyId::next_from(&mut self.ids);
        let parameters = BTreeMap::from([
            ("occurrences".to_owned(), f64::from(occurrences)),
            ("success_rate".to_owned(), success_rate),
        ]);
        let strategy = Strategy {
            id,
            name: signature.to_owned(),
            situation_type,
            action,
            signature: signature.to_owned(),
            parameters,
            fitness: success_rate,
            applicability_tags: tags.clone(),
            created_at: now,
            updated_at: now,
            update_count: 0,
            below_threshold_since: None,
        };
        match self.strategies.upsert(strategy) {
            Ok(_) => {
                self.stats.strategies_created = self.stats.strategies_created.saturating_add(1);
                tracing::debug!(
                    agent_id = %self.id,
                    strategy_id = %id,
                    signature,
                    success_rate,
                    "strategy learned"
                );
                Some(id)
            }
            Err(e) => {
                tracing::warn!(agent_id = %self.id, error = %e, "strategy rejected");
                None
            }
        }
    }

    fn record_stats(&mut self, outcome: &Outcome, record: &LearningRecord) {
        let stats = &mut self.stats;
        stats.outcomes = stats.outcomes.saturating_add(1);
        if outcome.success {
            stats.successes = stats.successes.saturating_add(1);
        }
        match outcome.class {
            OutcomeClass::Cooperation => {
                stats.cooperative_outcomes = stats.cooperative_outcomes.saturating_add(1);
            }
            OutcomeClass::Betrayal => {
                stats.betrayals_suffered = stats.betrayals_suffered.saturating_add(1);
            }
            _ => {}
        }
        if let Some(benefit) = outcome.mutual_benefit {
            stats.mutual_benefit_total += benefit.clamp(0.0, 100.0);
        }
        stats.profit_loss += outcome.profit_loss;
        let changes = u32::try_from(record.trait_changes.len()).unwrap_or(u32::MAX);
        stats.trait_changes = stats.trait_changes.saturating_add(changes);
        let milestones = u32::try_from(record.milestones.len()).unwrap_or(u32::MAX);
        stats.milestones = stats.milestones.saturating_add(milestones);
    }
}
