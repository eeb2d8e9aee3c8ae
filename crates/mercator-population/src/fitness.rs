//! Fitness evaluation over eight components.
//!
//! The engine gathers a [`FitnessInputs`] per agent at the tick boundary.
//! A [`FitnessEvaluator`] turns it into component scores in `[0, 1]`; the
//! population then aggregates them by weight and applies the frequency,
//! group and environmental modifiers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::FitnessComponent;

use crate::config::{EvolutionConfig, FitnessConfig};
use crate::profile::EvolutionaryProfile;

/// Per-generation activity of one agent, read at the tick boundary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessInputs {
    /// Decisions made.
    pub decisions: u32,
    /// Outcomes learned.
    pub outcomes: u32,
    /// Successful outcomes.
    pub successes: u32,
    /// Net profit or loss.
    pub profit_loss: f64,
    /// Mean trust over known counterparties.
    pub mean_trust: Option<f64>,
    /// Cooperation outcomes.
    pub cooperative_outcomes: u32,
    /// Betrayals suffered.
    pub betrayals_suffered: u32,
    /// Sum of mutual benefit over outcomes reporting it.
    pub mutual_benefit_total: f64,
    /// Strategies learned this generation.
    pub strategies_created: u32,
    /// Mean fitness of live strategies.
    pub mean_strategy_fitness: Option<f64>,
    /// Trait evolutions this generation.
    pub trait_changes: u32,
    /// Adaptability trait (0--100).
    pub adaptability: f64,
    /// Learning speed trait (0--100).
    pub learning_speed: f64,
    /// Mean level of the specialization path's core skills (0--100).
    pub specialization_depth: f64,
    /// Trait stability (0--100).
    pub stability: f64,
    /// Emotional coherence (0--100).
    pub emotional_coherence: f64,
}

/// Population-level context shared by every evaluation in one tick.
#[derive(Debug, Clone, Copy)]
pub struct FitnessContext<'a> {
    /// Share of the population holding the agent's signature.
    pub signature_share: f64,
    /// Population-wide cultural norms.
    pub cultural_norms: &'a BTreeMap<String, f64>,
    /// Normalisation constants.
    pub config: &'a FitnessConfig,
}

/// Computes component scores for one agent.
///
/// Implementations must be pure functions of their arguments so that two
/// runs with the same inputs produce identical reports.
pub trait FitnessEvaluator: Send + Sync {
    /// Score every component in `[0, 1]`.
    fn components(
        &self,
        inputs: &FitnessInputs,
        profile: &EvolutionaryProfile,
        context: &FitnessContext<'_>,
    ) -> BTreeMap<FitnessComponent, f64>;
}

/// Default data-configured evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedFitness;

fn ratio(part: u32, whole: u32) -> Option<f64> {
    (whole > 0).then(|| f64::from(part) / f64::from(whole))
}

fn unit(value: f64) -> f64 {
    if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 }
}

impl FitnessEvaluator for WeightedFitness {
    fn components(
        &self,
        inputs: &FitnessInputs,
        profile: &EvolutionaryProfile,
        context: &FitnessContext<'_>,
    ) -> BTreeMap<FitnessComponent, f64> {
        let config = context.config;
        let neutral = config.neutral_score;

        let win_rate = ratio(inputs.successes, inputs.outcomes).unwrap_or(neutral);
        let scale = if config.pnl_scale > 0.0 { config.pnl_scale } else { 1.0 };
        let profit = 1.0 / (1.0 + (-inputs.profit_loss / scale).exp());
        let trading = 0.5f64.mul_add(win_rate, 0.5 * profit);

        let trust = inputs.mean_trust.map_or(neutral, |t| t / 100.0);
        let cooperative = ratio(inputs.cooperative_outcomes, inputs.outcomes).unwrap_or(neutral);
        let betrayed = ratio(inputs.betrayals_suffered, inputs.outcomes).unwrap_or(0.0);
        let social = 0.6f64.mul_add(trust, 0.4 * cooperative) - 0.2 * betrayed;

        let target = if config.innovation_target > 0.0 { config.innovation_target } else { 1.0 };
        let created = (f64::from(inputs.strategies_created) / target).min(1.0);
        let innovation =
            0.6f64.mul_add(created, 0.4 * inputs.mean_strategy_fitness.unwrap_or(neutral));

        let adaptation = 0.4f64.mul_add(
            inputs.adaptability / 100.0,
            0.3f64.mul_add(inputs.learning_speed / 100.0, 0.3 * inputs.specialization_depth / 100.0),
        );

        let deviations: Vec<f64> = context
            .cultural_norms
            .iter()
            .filter_map(|(name, norm)| profile.expressed_value(name).map(|v| (v - norm).abs()))
            .collect();
        let cultural = if deviations.is_empty() {
            neutral
        } else {
            let n = f64::from(u32::try_from(deviations.len()).unwrap_or(u32::MAX));
            1.0 - deviations.iter().sum::<f64>() / n / 100.0
        };

        let benefit_count = inputs.cooperative_outcomes.max(inputs.outcomes);
        let collective = if benefit_count > 0 && inputs.mutual_benefit_total > 0.0 {
            inputs.mutual_benefit_total / f64::from(benefit_count) / 100.0
        } else {
            neutral
        };

        let diversity = 1.0 - context.signature_share;
        let stability = 0.6f64.mul_add(
            inputs.stability / 100.0,
            0.4 * inputs.emotional_coherence / 100.0,
        );

        BTreeMap::from([
            (FitnessComponent::TradingPerformance, unit(trading)),
            (FitnessComponent::SocialCooperation, unit(social)),
            (FitnessComponent::InnovationCapacity, unit(innovation)),
            (FitnessComponent::AdaptationSpeed, unit(adaptation)),
            (FitnessComponent::CulturalContribution, unit(cultural)),
            (FitnessComponent::CollectiveBenefit, unit(collective)),
            (FitnessComponent::DiversityMaintenance, unit(diversity)),
            (FitnessComponent::StabilityPreservation, unit(stability)),
        ])
    }
}

/// Weighted sum of component scores, normalised by the total weight.
pub fn aggregate(components: &BTreeMap<FitnessComponent, f64>, config: &FitnessConfig) -> f64 {
    let mut total = 0.0;
    let mut weight = 0.0;
    for component in FitnessComponent::ALL {
        let w = config.weight(component).max(0.0);
        total += w * components.get(&component).copied().unwrap_or(0.0);
        weight += w;
    }
    if weight > 0.0 { total / weight } else { 0.0 }
}

/// Multiplier for rare (below `rare_share`) and common (above
/// `common_share`) signatures.
pub fn frequency_multiplier(signature_share: f64, config: &EvolutionConfig) -> f64 {
    if signature_share < config.rare_share {
        config.rare_multiplier
    } else if signature_share > config.common_share {
        config.common_multiplier
    } else {
        1.0
    }
}

/// Multiplier for agents contributing to a cooperative group.
pub fn group_multiplier(group_cooperation: f64, contribution: f64, config: &EvolutionConfig) -> f64 {
    if group_cooperation > config.group_cooperation_threshold
        && contribution > config.group_contribution_threshold
    {
        config.group_multiplier
    } else {
        1.0
    }
}
