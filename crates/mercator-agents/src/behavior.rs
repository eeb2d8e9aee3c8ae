//! Behavioural modulators applied on top of raw action scores.
//!
//! - [`HabitTracker`] learns actions that keep working in a situation and
//!   proposes them with a strength in `[0, 1]`.
//! - [`assess_impulse`] weighs impulse pressure against regulation capacity
//!   and decides between regulating a risky action and letting the impulse
//!   through.
//! - [`social_adaptation`] nudges scores toward cooperation and away from
//!   aggression when the decision happens in a social setting.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_types::{SituationType, SocialContext, TradeAction};

use crate::config::AgentConfig;
use crate::traits::{Trait, TraitVector};

// ---------------------------------------------------------------------------
// Habits
// ---------------------------------------------------------------------------

/// A learned habit for one situation type and action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    /// Situation the habit applies to.
    pub situation_type: SituationType,
    /// Habitual action.
    pub action: TradeAction,
    /// Net successful repetitions.
    pub repetitions: u32,
    /// Tags seen when the habit was last reinforced.
    pub tags: BTreeSet<String>,
    /// Last reinforcement time.
    pub last_reinforced: DateTime<Utc>,
}

/// A habit proposal for the current situation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HabitProposal {
    /// Proposed action.
    pub action: TradeAction,
    /// Strength in `[0, 1]`.
    pub strength: f64,
}

/// Per-agent habit memory.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HabitTracker {
    habits: BTreeMap<(SituationType, TradeAction), Habit>,
}

/// Jaccard similarity of two tag sets; two empty sets match fully.
fn tag_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    let shared = a.intersection(b).count();
    let shared = f64::from(u32::try_from(shared).unwrap_or(u32::MAX));
    let union = f64::from(u32::try_from(union).unwrap_or(u32::MAX));
    shared / union
}

impl HabitTracker {
    /// Create an empty tracker.
    pub const fn new() -> Self {
        Self {
            habits: BTreeMap::new(),
        }
    }

    /// Record the result of acting on a situation.
    ///
    /// Success adds a repetition; failure removes one and forgets the habit
    /// at zero.
    pub fn reinforce(
        &mut self,
        situation_type: SituationType,
        action: TradeAction,
        tags: &BTreeSet<String>,
        success: bool,
        now: DateTime<Utc>,
    ) {
        let key = (situation_type, action);
        if success {
            let habit = self.habits.entry(key).or_insert_with(|| Habit {
                situation_type,
                action,
                repetitions: 0,
                tags: BTreeSet::new(),
                last_reinforced: now,
            });
            habit.repetitions = habit.repetitions.saturating_add(1);
            habit.tags.clone_from(tags);
            habit.last_reinforced = now;
        } else if let Some(habit) = self.habits.get_mut(&key) {
            habit.repetitions = habit.repetitions.saturating_sub(1);
            if habit.repetitions == 0 {
                self.habits.remove(&key);
            }
        }
    }

    /// Strongest established habit for the situation, if any.
    ///
    /// `strength = min(1, reps/10) · exp(-days/τ) · (0.5 + 0.5·tag_overlap)`;
    /// ties go to the lower action id.
    pub fn propose(
        &self,
        situation_type: SituationType,
        tags: &BTreeSet<String>,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Option<HabitProposal> {
        let mut best: Option<HabitProposal> = None;
        for habit in self.habits.values() {
            if habit.situation_type != situation_type
                || habit.repetitions < config.habit_min_repetitions
            {
                continue;
            }
            let days = seconds_to_days((now - habit.last_reinforced).num_seconds().max(0));
            let recency = (-days / config.habit_recency_days).exp();
            let maturity = (f64::from(habit.repetitions) / 10.0).min(1.0);
            let strength =
                (maturity * recency * (0.5 + 0.5 * tag_overlap(&habit.tags, tags))).clamp(0.0, 1.0);
            if best.is_none_or(|b| strength > b.strength) {
                best = Some(HabitProposal {
                    action: habit.action,
                    strength,
                });
            }
        }
        best
    }

    /// Number of tracked habits.
    pub fn len(&self) -> usize {
        self.habits.len()
    }

    /// Whether no habit is tracked.
    pub fn is_empty(&self) -> bool {
        self.habits.is_empty()
    }
}

#[allow(clippy::cast_precision_loss)]
fn seconds_to_days(seconds: i64) -> f64 {
    seconds as f64 / 86_400.0
}

// ---------------------------------------------------------------------------
// Impulse control
// ---------------------------------------------------------------------------

/// Result of weighing impulse pressure against regulation capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImpulseVerdict {
    /// Pressure below the threshold; nothing to do.
    Calm,
    /// Capacity holds the impulse; risky top actions get replaced.
    Regulated,
    /// The impulse wins; the raw top action is kept.
    Override,
}

/// Impulse pressure and the resulting verdict.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpulseAssessment {
    /// `impulsiveness · intensity/100 · (0.5 + arousal/100)`.
    pub pressure: f64,
    /// Regulation capacity used for the comparison.
    pub capacity: f64,
    /// Verdict.
    pub verdict: ImpulseVerdict,
}

/// Weigh impulse pressure against regulation capacity.
///
/// `arousal` is the emotional intensity after regulation. Disorder
/// tendencies only enter through the regulation capacity.
pub fn assess_impulse(
    traits: &TraitVector,
    situation_intensity: f64,
    arousal: f64,
    capacity: f64,
    config: &AgentConfig,
) -> ImpulseAssessment {
    let pressure = traits.value(Trait::Impulsiveness)
        * (situation_intensity.clamp(0.0, 100.0) / 100.0)
        * (0.5 + arousal.clamp(0.0, 100.0) / 100.0);
    let verdict = if pressure <= config.impulse_threshold {
        ImpulseVerdict::Calm
    } else if capacity >= pressure {
        ImpulseVerdict::Regulated
    } else {
        ImpulseVerdict::Override
    };
    ImpulseAssessment {
        pressure,
        capacity,
        verdict,
    }
}

/// Pick the conservative replacement for a risky action: the candidate
/// with the lowest intrinsic risk, lower action id on ties.
pub fn conservative_default(candidates: &[TradeAction]) -> Option<TradeAction> {
    candidates
        .iter()
        .copied()
        .min_by(|a, b| a.risk_level().total_cmp(&b.risk_level()).then(a.cmp(b)))
}

// ---------------------------------------------------------------------------
// Social adaptation
// ---------------------------------------------------------------------------

/// Multiplier social adaptation applies to an action's score, or `None`
/// without a social context.
///
/// Cooperative actions gain and aggressive actions lose up to
/// `social_adaptation_strength`, scaled by `social_skills` and the group's
/// cooperation level.
pub fn social_adaptation(
    action: TradeAction,
    social: Option<&SocialContext>,
    traits: &TraitVector,
    config: &AgentConfig,
) -> Option<f64> {
    let social = social?;
    let skill = traits.value(Trait::SocialSkills) / 100.0;
    let pull = skill * (0.5 + 0.5 * social.group_cooperation.clamp(0.0, 1.0));
    let shift = config.social_adaptation_strength * pull;
    let factor = if action.is_cooperative() {
        1.0 + shift
    } else if action.is_aggressive() {
        1.0 - shift
    } else {
        1.0
    };
    Some(factor)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(100)
    }

    #[test]
    fn habit_needs_repetitions() {
        let mut tracker = HabitTracker::new();
        let config = AgentConfig::default();
        let tags = BTreeSet::new();
        for _ in 0..2 {
            tracker.reinforce(SituationType::Negotiation, TradeAction::Negotiate, &tags, true, now());
        }
        assert!(tracker.propose(SituationType::Negotiation, &tags, now(), &config).is_none());
        tracker.reinforce(SituationType::Negotiation, TradeAction::Negotiate, &tags, true, now());
        let proposal = tracker.propose(SituationType::Negotiation, &tags, now(), &config).unwrap();
        assert_eq!(proposal.action, TradeAction::Negotiate);
        assert!((proposal.strength - 0.3).abs() < 1e-9);
    }

    #[test]
    fn habit_strength_fades_with_time() {
        let mut tracker = HabitTracker::new();
        let config = AgentConfig::default();
        let tags = BTreeSet::new();
        for _ in 0..10 {
            tracker.reinforce(SituationType::TradeOpportunity, TradeAction::Hold, &tags, true, now());
        }
        let fresh = tracker.propose(SituationType::TradeOpportunity, &tags, now(), &config).unwrap();
        let stale = tracker
            .propose(SituationType::TradeOpportunity, &tags, now() + Duration::days(14), &config)
            .unwrap();
        assert!((stale.strength / fresh.strength - (-1.0_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn failures_erode_habits() {
        let mut tracker = HabitTracker::new();
        let tags = BTreeSet::new();
        tracker.reinforce(SituationType::Competition, TradeAction::Buy, &tags, true, now());
        tracker.reinforce(SituationType::Competition, TradeAction::Buy, &tags, false, now());
        assert!(tracker.is_empty());
    }

    #[test]
    fn impulse_verdicts() {
        let config = AgentConfig::default();
        let mut traits = TraitVector::neutral();
        traits.set("impulsiveness", 90.0).unwrap();
        let calm = assess_impulse(&traits, 20.0, 30.0, 50.0, &config);
        assert_eq!(calm.verdict, ImpulseVerdict::Calm);
        let regulated = assess_impulse(&traits, 90.0, 60.0, 95.0, &config);
        assert_eq!(regulated.verdict, ImpulseVerdict::Regulated);
        let overridden = assess_impulse(&traits, 90.0, 60.0, 30.0, &config);
        assert_eq!(overridden.verdict, ImpulseVerdict::Override);
    }

    #[test]
    fn conservative_default_is_lowest_risk() {
        let candidates = SituationType::MarketCrash.candidate_actions();
        assert_eq!(conservative_default(candidates), Some(TradeAction::Wait));
    }

    #[test]
    fn social_adaptation_favours_cooperation() {
        let config = AgentConfig::default();
        let mut traits = TraitVector::neutral();
        traits.set("social_skills", 100.0).unwrap();
        let social = SocialContext {
            observers: 3,
            group_cooperation: 1.0,
            reputation_at_stake: true,
        };
        let up = social_adaptation(TradeAction::Cooperate, Some(&social), &traits, &config).unwrap();
        let down = social_adaptation(TradeAction::Defect, Some(&social), &traits, &config).unwrap();
        assert!((up - 1.3).abs() < 1e-9);
        assert!((down - 0.7).abs() < 1e-9);
        assert!(social_adaptation(TradeAction::Cooperate, None, &traits, &config).is_none());
    }
}
