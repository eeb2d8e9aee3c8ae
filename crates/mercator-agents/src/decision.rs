//! Decision synthesis: scores every candidate action of a situation and
//! turns the winner into a decision.
//!
//! The score of a candidate is additive:
//!
//! ```text
//! score = 50 + situation prior + Σ w·(trait − 50)/5 + risk attitude
//!       + emotional readiness + trust + memory prior + strategy + exploration
//! ```
//!
//! after which habit and social adaptation scale it multiplicatively. The
//! winner is the highest score; ties go to the action the consulted
//! strategy recommends, then to the lower action id. Impulse control may
//! swap a high-risk winner for the most conservative candidate.
//!
//! [`synthesize`] is a pure function of its input and the RNG, so the same
//! agent state, situation and seed always produce the same decision.

use std::cmp::Ordering;

use rand::Rng;

use mercator_types::{
    DecisionFlags, DecisionStyle, DecisionTiming, FactorContribution, MarketState,
    RiskAssessment, RiskLevel, Situation, SituationType, SocialContext, StrategyId, TradeAction,
};

use crate::behavior::{self, HabitProposal, ImpulseVerdict};
use crate::config::AgentConfig;
use crate::emotion::EmotionalReading;
use crate::memory::ScoredExperience;
use crate::strategy::Strategy;
use crate::traits::{Trait, TraitVector};

// ---------------------------------------------------------------------------
// Weight tables
// ---------------------------------------------------------------------------

/// Trait weights per action. A weight `w` contributes `w·(t − 50)/5`.
/// Disorder tendencies appear here as plain weights.
pub const fn trait_weights(action: TradeAction) -> &'static [(Trait, f64)] {
    match action {
        TradeAction::Accept => &[
            (Trait::Cooperation, 1.0),
            (Trait::TrustPropensity, 0.6),
            (Trait::Agreeableness, 0.4),
            (Trait::ParanoidTendency, -0.5),
            (Trait::Machiavellianism, -0.3),
        ],
        TradeAction::Reject => &[
            (Trait::Cooperation, -0.6),
            (Trait::ParanoidTendency, 0.6),
            (Trait::LossAversion, 0.4),
            (Trait::TrustPropensity, -0.5),
        ],
        TradeAction::Negotiate => &[
            (Trait::AnalyticalThinking, 0.5),
            (Trait::Patience, 0.4),
            (Trait::Competitiveness, 0.3),
            (Trait::SocialSkills, 0.3),
            (Trait::Cooperation, 0.2),
        ],
        TradeAction::Buy => &[
            (Trait::RiskTolerance, 0.8),
            (Trait::Overconfidence, 0.4),
            (Trait::Competitiveness, 0.3),
            (Trait::Impulsiveness, 0.3),
            (Trait::LossAversion, -0.3),
        ],
        TradeAction::Sell => &[
            (Trait::LossAversion, 0.5),
            (Trait::Herding, 0.4),
            (Trait::AnxietyTendency, 0.3),
            (Trait::Impulsiveness, 0.2),
        ],
        TradeAction::Hold => &[
            (Trait::Patience, 0.7),
            (Trait::LongTermOrientation, 0.4),
            (Trait::Anchoring, 0.3),
            (Trait::UncertaintyAvoidance, 0.2),
        ],
        TradeAction::Cooperate => &[
            (Trait::Cooperation, 0.8),
            (Trait::Empathy, 0.4),
            (Trait::Loyalty, 0.4),
            (Trait::Honesty, 0.3),
            (Trait::Psychopathy, -0.4),
        ],
        TradeAction::Defect => &[
            (Trait::Machiavellianism, 0.7),
            (Trait::Psychopathy, 0.5),
            (Trait::AntisocialTendency, 0.4),
            (Trait::Competitiveness, 0.3),
            (Trait::Honesty, -0.6),
            (Trait::Loyalty, -0.4),
        ],
        TradeAction::Investigate => &[
            (Trait::AnalyticalThinking, 0.6),
            (Trait::Curiosity, 0.5),
            (Trait::ParanoidTendency, 0.3),
            (Trait::ObsessiveTendency, 0.2),
        ],
        TradeAction::Wait => &[
            (Trait::Patience, 0.5),
            (Trait::UncertaintyAvoidance, 0.4),
            (Trait::AnxietyTendency, 0.3),
            (Trait::Impulsiveness, -0.5),
        ],
    }
}

/// Small per-situation preference before any personality enters.
pub const fn situation_prior(situation_type: SituationType, action: TradeAction) -> f64 {
    match (situation_type, action) {
        (SituationType::CooperationOffer, TradeAction::Accept)
        | (SituationType::Negotiation, TradeAction::Negotiate)
        | (SituationType::PartnershipProposal, TradeAction::Negotiate)
        | (SituationType::MarketCrash, TradeAction::Sell)
        | (SituationType::BetrayalRisk, TradeAction::Investigate) => 2.0,
        (SituationType::CooperationOffer, TradeAction::Negotiate)
        | (SituationType::PartnershipProposal, TradeAction::Accept)
        | (SituationType::MarketCrash, TradeAction::Hold)
        | (SituationType::TradeOpportunity, TradeAction::Buy | TradeAction::Investigate)
        | (SituationType::Competition, TradeAction::Buy | TradeAction::Cooperate)
        | (SituationType::InformationRequest, TradeAction::Accept | TradeAction::Investigate) => 1.0,
        _ => 0.0,
    }
}

/// Market state with the caller's indicators taking precedence over the
/// situation's own.
pub fn merge_market(situation: &MarketState, context: &MarketState) -> MarketState {
    MarketState {
        volatility: context.volatility.or(situation.volatility),
        trend: context.trend.or(situation.trend),
        liquidity: context.liquidity.or(situation.liquidity),
    }
}

// ---------------------------------------------------------------------------
// Input and output
// ---------------------------------------------------------------------------

/// Everything the synthesizer reads.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    /// The situation.
    pub situation: &'a Situation,
    /// Merged market indicators.
    pub market: MarketState,
    /// Social setting, if any.
    pub social: Option<&'a SocialContext>,
    /// Trait vector.
    pub traits: &'a TraitVector,
    /// Emotional state after advancing and regulation.
    pub emotion: EmotionalReading,
    /// Regulation capacity (0--100).
    pub regulation_capacity: f64,
    /// Trait stability (0--100).
    pub stability: f64,
    /// Top-K relevant experiences.
    pub memories: &'a [ScoredExperience<'a>],
    /// Trust in the counterparty, if there is one.
    pub trust: Option<f64>,
    /// Threat posed by the counterparty.
    pub threat: f64,
    /// Habit proposal, if any.
    pub habit: Option<HabitProposal>,
    /// Best applicable strategy, if any.
    pub strategy: Option<&'a Strategy>,
    /// Configuration.
    pub config: &'a AgentConfig,
}

/// Scores of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionScore {
    /// The candidate.
    pub action: TradeAction,
    /// Final score.
    pub score: f64,
    /// Named contributions, in evaluation order.
    pub factors: Vec<FactorContribution>,
}

/// Result of [`synthesize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    /// Chosen action.
    pub action: TradeAction,
    /// Confidence (0--100).
    pub confidence: f64,
    /// Style.
    pub style: DecisionStyle,
    /// Top factors of the chosen action, largest magnitude first.
    pub factors: Vec<FactorContribution>,
    /// Risk summary.
    pub risk_assessment: RiskAssessment,
    /// Timing.
    pub timing: DecisionTiming,
    /// Behavioural flags.
    pub flags: DecisionFlags,
    /// Strategy the decision followed.
    pub strategy_id: Option<StrategyId>,
    /// Scores of every candidate, best first.
    pub ranking: Vec<ActionScore>,
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Memory prior per action in `[-1, 1]`: score-weighted balance of
/// successes over failures among the recalled experiences.
fn memory_prior(memories: &[ScoredExperience<'_>], action: TradeAction) -> f64 {
    let total: f64 = memories.iter().map(|m| m.score).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let signed: f64 = memories
        .iter()
        .filter(|m| m.experience.payload.action == Some(action))
        .map(|m| {
            let (n, s) = m.experience.pattern_counts();
            if n == 0 {
                return 0.0;
            }
            let balance = (2.0 * f64::from(s) - f64::from(n)) / f64::from(n);
            m.score * balance
        })
        .sum();
    (signed / total).clamp(-1.0, 1.0)
}

/// How well recalled experiences back the chosen action (0--100, 50 when
/// memory is silent).
fn consistency(memories: &[ScoredExperience<'_>], action: TradeAction) -> f64 {
    let mut agree = 0.0;
    let mut total = 0.0;
    for m in memories {
        let (n, s) = m.experience.pattern_counts();
        if n == 0 || m.score <= 0.0 {
            continue;
        }
        let success_share = f64::from(s) / f64::from(n);
        let agreement = if m.experience.payload.action == Some(action) {
            success_share
        } else {
            1.0 - success_share
        };
        agree += m.score * agreement;
        total += m.score;
    }
    if total <= 0.0 {
        50.0
    } else {
        (100.0 * agree / total).clamp(0.0, 100.0)
    }
}

fn push(factors: &mut Vec<FactorContribution>, name: &str, contribution: f64) {
    if contribution.abs() > f64::EPSILON {
        factors.push(FactorContribution {
            factor: name.to_owned(),
            contribution,
        });
    }
}

fn score_action<R: Rng>(input: &DecisionInput<'_>, action: TradeAction, rng: &mut R) -> ActionScore {
    let config = input.config;
    let traits = input.traits;
    let mut factors = Vec::new();

    let prior = situation_prior(input.situation.situation_type, action);
    push(&mut factors, "situation", prior);

    for &(t, w) in trait_weights(action) {
        let contribution = w * (traits.value(t) - 50.0) / 5.0;
        push(&mut factors, &format!("trait:{}", t.as_str()), contribution);
    }

    let risk_attitude =
        -(action.risk_level() - 50.0) * (50.0 - traits.value(Trait::RiskTolerance)) / 250.0;
    push(&mut factors, "risk_attitude", risk_attitude);

    let readiness_delta = 0.1 * (input.emotion.decision_readiness - 50.0);
    let readiness = if action.is_active() {
        readiness_delta
    } else {
        -readiness_delta
    };
    push(&mut factors, "readiness", readiness);

    if let Some(trust) = input.trust {
        let delta = 0.15 * (trust - 50.0);
        let term = if action.is_cooperative() {
            delta
        } else if action.is_aggressive() {
            -delta
        } else {
            0.0
        };
        push(&mut factors, "trust", term);
    }

    push(
        &mut factors,
        "memory",
        config.memory_prior_weight * memory_prior(input.memories, action),
    );

    if let Some(strategy) = input.strategy.filter(|s| s.action == action) {
        push(&mut factors, "strategy", config.strategy_weight * strategy.fitness);
    }

    if config.exploration_noise > 0.0 {
        let noise = rng.random_range(-config.exploration_noise..=config.exploration_noise);
        push(&mut factors, "exploration", noise);
    }

    let mut score = 50.0 + factors.iter().map(|f| f.contribution).sum::<f64>();

    if let Some(habit) = input.habit.filter(|h| h.action == action) {
        let scaled = score * (1.0 + config.habit_weight * habit.strength);
        push(&mut factors, "habit", scaled - score);
        score = scaled;
    }

    if let Some(factor) = behavior::social_adaptation(action, input.social, traits, config) {
        let scaled = score * factor;
        push(&mut factors, "social", scaled - score);
        score = scaled;
    }

    ActionScore {
        action,
        score,
        factors,
    }
}

fn rank(a: &ActionScore, b: &ActionScore, strategy: Option<&Strategy>) -> Ordering {
    let fitness_for = |action: TradeAction| {
        strategy
            .filter(|s| s.action == action)
            .map_or(0.0, |s| s.fitness)
    };
    b.score
        .total_cmp(&a.score)
        .then_with(|| fitness_for(b.action).total_cmp(&fitness_for(a.action)))
        .then_with(|| a.action.cmp(&b.action))
}

fn style_of(input: &DecisionInput<'_>, flags: DecisionFlags) -> DecisionStyle {
    let traits = input.traits;
    if flags.impulse_override {
        DecisionStyle::Impulsive
    } else if flags.habit_followed {
        DecisionStyle::Habitual
    } else if flags.social_adapted && traits.value(Trait::SocialSkills) > 60.0 {
        DecisionStyle::Social
    } else if traits.value(Trait::AnalyticalThinking) >= 60.0 {
        DecisionStyle::Analytical
    } else if traits.value(Trait::RiskTolerance) < 35.0 {
        DecisionStyle::Cautious
    } else {
        DecisionStyle::Intuitive
    }
}

fn timing_of(input: &DecisionInput<'_>, action: TradeAction, flags: DecisionFlags) -> DecisionTiming {
    let situation = input.situation;
    if flags.impulse_override || situation.intensity >= 80.0 {
        DecisionTiming::Immediate
    } else if matches!(action, TradeAction::Wait | TradeAction::Investigate)
        || (situation.complexity >= 70.0 && input.traits.value(Trait::Patience) >= 60.0)
    {
        DecisionTiming::Delayed
    } else {
        DecisionTiming::Deliberate
    }
}

/// Risk of acting: half the action's intrinsic risk, 30 % of the
/// counterparty threat and 20 % of market volatility (50 when unknown).
pub fn assess_risk(action: TradeAction, threat: f64, market: &MarketState) -> RiskAssessment {
    let action_risk = action.risk_level();
    let counterparty_threat = threat.clamp(0.0, 100.0);
    let market_volatility = market.volatility.unwrap_or(50.0).clamp(0.0, 100.0);
    let score = (0.5 * action_risk + 0.3 * counterparty_threat + 0.2 * market_volatility)
        .clamp(0.0, 100.0);
    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        action_risk,
        counterparty_threat,
        market_volatility,
    }
}

/// Score every candidate and build the decision.
///
/// Returns `None` only if the situation has no candidate actions.
pub fn synthesize<R: Rng>(input: &DecisionInput<'_>, rng: &mut R) -> Option<Synthesis> {
    let config = input.config;
    let candidates = input.situation.situation_type.candidate_actions();

    let mut ranking: Vec<ActionScore> = candidates
        .iter()
        .map(|a| score_action(input, *a, rng))
        .collect();
    ranking.sort_by(|a, b| rank(a, b, input.strategy));
    let top = ranking.first()?;

    let mut flags = DecisionFlags {
        social_adapted: input.social.is_some()
            && ranking
                .iter()
                .any(|s| s.factors.iter().any(|f| f.factor == "social")),
        ..DecisionFlags::default()
    };

    let impulse = behavior::assess_impulse(
        input.traits,
        input.situation.intensity,
        input.emotion.intensity,
        input.regulation_capacity,
        config,
    );
    let mut chosen = top.action;
    match impulse.verdict {
        ImpulseVerdict::Calm => {}
        ImpulseVerdict::Regulated => {
            if top.action.risk_level() >= config.high_risk_threshold
                && let Some(safe) = behavior::conservative_default(candidates)
                && safe != top.action
            {
                tracing::debug!(
                    from = top.action.as_str(),
                    to = safe.as_str(),
                    pressure = impulse.pressure,
                    capacity = impulse.capacity,
                    "impulse regulated"
                );
                chosen = safe;
                flags.regulation_applied = true;
            }
        }
        ImpulseVerdict::Override => {
            flags.impulse_override = true;
        }
    }
    flags.habit_followed = input.habit.is_some_and(|h| h.action == chosen);

    let strategy = input.strategy.filter(|s| s.action == chosen);
    let base = strategy.map_or(config.default_confidence, Strategy::confidence);
    let mut confidence = base
        + 0.3 * (input.emotion.decision_readiness - 50.0)
        + 0.2 * (consistency(input.memories, chosen) - 50.0)
        + 0.1 * (input.stability - 50.0);
    if flags.regulation_applied {
        confidence += config.regulation_bonus;
    }
    if flags.impulse_override {
        confidence -= config.impulse_penalty;
    }
    let confidence = confidence.clamp(0.0, 100.0);

    let mut factors = ranking
        .iter()
        .find(|s| s.action == chosen)
        .map(|s| s.factors.clone())
        .unwrap_or_default();
    factors.sort_by(|a, b| {
        b.contribution
            .abs()
            .total_cmp(&a.contribution.abs())
            .then_with(|| a.factor.cmp(&b.factor))
    });
    factors.truncate(config.factor_count);

    Some(Synthesis {
        action: chosen,
        confidence,
        style: style_of(input, flags),
        factors,
        risk_assessment: assess_risk(chosen, input.threat, &input.market),
        timing: timing_of(input, chosen, flags),
        flags,
        strategy_id: strategy.map(|s| s.id),
        ranking,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn reading(readiness: f64, intensity: f64) -> EmotionalReading {
        EmotionalReading {
            dominant_emotion: mercator_types::Emotion::Joy,
            intensity,
            coherence: 100.0,
            decision_readiness: readiness,
        }
    }

    fn input<'a>(
        situation: &'a Situation,
        traits: &'a TraitVector,
        config: &'a AgentConfig,
    ) -> DecisionInput<'a> {
        DecisionInput {
            situation,
            market: situation.market_state,
            social: None,
            traits,
            emotion: reading(50.0, 30.0),
            regulation_capacity: 50.0,
            stability: 100.0,
            memories: &[],
            trust: Some(50.0),
            threat: 25.0,
            habit: None,
            strategy: None,
            config,
        }
    }

    #[test]
    fn cooperative_trader_accepts() {
        let mut traits = TraitVector::neutral();
        traits.set("cooperation", 80.0).unwrap();
        traits.set("risk_tolerance", 20.0).unwrap();
        let config = AgentConfig::default();
        let situation = Situation::new(SituationType::CooperationOffer, 50.0);
        let mut rng = SmallRng::seed_from_u64(42);

        let synthesis = synthesize(&input(&situation, &traits, &config), &mut rng).unwrap();
        assert_eq!(synthesis.action, TradeAction::Accept);
        assert!((60.0..=80.0).contains(&synthesis.confidence));
        assert!(synthesis.factors.len() <= config.factor_count);
        assert_eq!(synthesis.factors[0].factor, "trait:cooperation");
        assert_eq!(synthesis.style, DecisionStyle::Cautious);
        assert_eq!(synthesis.timing, DecisionTiming::Deliberate);
    }

    #[test]
    fn same_seed_same_decision() {
        let traits = TraitVector::neutral();
        let config = AgentConfig::default();
        let situation = Situation::new(SituationType::TradeOpportunity, 40.0);
        let a = synthesize(
            &input(&situation, &traits, &config),
            &mut SmallRng::seed_from_u64(9),
        );
        let b = synthesize(
            &input(&situation, &traits, &config),
            &mut SmallRng::seed_from_u64(9),
        );
        assert_eq!(a, b);
    }

    #[test]
    fn ties_break_on_strategy_then_action_id() {
        let score = |action| ActionScore {
            action,
            score: 50.0,
            factors: Vec::new(),
        };
        let reject = score(TradeAction::Reject);
        let accept = score(TradeAction::Accept);
        assert_eq!(rank(&reject, &accept, None), Ordering::Greater);

        let mut ids = mercator_types::IdSource::new(1);
        let now = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        let strategy = Strategy {
            id: StrategyId::next_from(&mut ids),
            name: "offer:reject".to_owned(),
            situation_type: SituationType::CooperationOffer,
            action: TradeAction::Reject,
            signature: "cooperation_offer:reject:na".to_owned(),
            parameters: std::collections::BTreeMap::new(),
            fitness: 0.4,
            applicability_tags: std::collections::BTreeSet::new(),
            created_at: now,
            updated_at: now,
            update_count: 0,
            below_threshold_since: None,
        };
        assert_eq!(rank(&reject, &accept, Some(&strategy)), Ordering::Less);
    }

    #[test]
    fn regulation_replaces_risky_winner() {
        let mut traits = TraitVector::neutral();
        traits.set("impulsiveness", 100.0).unwrap();
        traits.set("risk_tolerance", 100.0).unwrap();
        let config = AgentConfig {
            exploration_noise: 0.0,
            ..AgentConfig::default()
        };
        let situation = Situation::new(SituationType::MarketCrash, 90.0);
        let mut risky = input(&situation, &traits, &config);
        risky.emotion = reading(50.0, 60.0);
        risky.regulation_capacity = 100.0;
        let synthesis = synthesize(&risky, &mut SmallRng::seed_from_u64(3)).unwrap();
        assert!(synthesis.flags.regulation_applied);
        assert_eq!(synthesis.action, TradeAction::Wait);

        risky.regulation_capacity = 10.0;
        let synthesis = synthesize(&risky, &mut SmallRng::seed_from_u64(3)).unwrap();
        assert!(synthesis.flags.impulse_override);
        assert_eq!(synthesis.style, DecisionStyle::Impulsive);
        assert_eq!(synthesis.timing, DecisionTiming::Immediate);
        assert!(synthesis.action.risk_level() >= 60.0);
    }

    #[test]
    fn regulated_low_risk_winner_gets_no_bonus() {
        let mut traits = TraitVector::neutral();
        traits.set("impulsiveness", 100.0).unwrap();
        traits.set("cooperation", 80.0).unwrap();
        let regulated = AgentConfig {
            exploration_noise: 0.0,
            ..AgentConfig::default()
        };
        let calm = AgentConfig {
            impulse_threshold: 100.0,
            ..regulated.clone()
        };
        let situation = Situation::new(SituationType::CooperationOffer, 90.0);

        let mut tense = input(&situation, &traits, &regulated);
        tense.emotion = reading(50.0, 60.0);
        tense.regulation_capacity = 100.0;
        let mut relaxed = input(&situation, &traits, &calm);
        relaxed.emotion = reading(50.0, 60.0);
        relaxed.regulation_capacity = 100.0;

        let a = synthesize(&tense, &mut SmallRng::seed_from_u64(5)).unwrap();
        let b = synthesize(&relaxed, &mut SmallRng::seed_from_u64(5)).unwrap();
        assert_eq!(a.action, b.action);
        assert!(!a.flags.regulation_applied);
        assert!(!a.flags.impulse_override);
        assert!((a.confidence - b.confidence).abs() < 1e-9);
    }

    #[test]
    fn risk_assessment_formula() {
        let market = MarketState::new(40.0, 50.0, 50.0);
        let risk = assess_risk(TradeAction::Defect, 200.0, &market);
        assert!((risk.counterparty_threat - 100.0).abs() < f64::EPSILON);
        assert!((risk.score - (42.5 + 30.0 + 8.0)).abs() < 1e-9);
        assert_eq!(risk.level, RiskLevel::Extreme);
    }

    #[test]
    fn merged_market_prefers_context() {
        let situation = MarketState {
            volatility: Some(10.0),
            trend: Some(20.0),
            liquidity: None,
        };
        let context = MarketState {
            volatility: Some(70.0),
            trend: None,
            liquidity: Some(30.0),
        };
        let merged = merge_market(&situation, &context);
        assert_eq!(merged, MarketState::new(70.0, 20.0, 30.0));
    }
}
