//! Tunable parameters for the generational loop.
//!
//! Loaded from the `evolution`, `fitness`, `emergence` and `culture`
//! sections of `mercator-config.yaml` by the engine and merged into one
//! [`EvolutionConfig`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::{FitnessComponent, SelectionKind};

use crate::count_f64;
use crate::environment::PressureRule;
use crate::error::PopulationError;

/// Configuration for the population engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    // --- Size ---
    /// Target number of agents after each tick (default: 100).
    pub population_size: usize,

    /// Hard cap as a multiple of `population_size`; offspring beyond it are
    /// discarded (default: 2.0).
    pub hard_cap_factor: f64,

    // --- Variation ---
    /// Per-gene mutation probability (default: 0.05).
    pub mutation_rate: f64,

    /// Standard deviation of the Gaussian mutation step (default: 5).
    pub mutation_sigma: f64,

    /// Probability that a parent pair produces offspring (default: 0.7).
    pub crossover_rate: f64,

    // --- Selection ---
    /// Selection pressure in `(0, 1]`; sets the tournament size
    /// `max(2, ceil(10 * pressure))` (default: 0.5).
    pub selection_pressure: f64,

    /// Share of the population preserved as elites (default: 0.1).
    pub elite_preservation_rate: f64,

    /// Relative weights of the non-elite selection slices (default:
    /// tournament 0.4, fitness-proportionate 0.3, frequency-dependent 0.2,
    /// uniform 0.1, rank 0).
    pub selection_weights: BTreeMap<SelectionKind, f64>,

    /// Shannon diversity below which the next cycle boosts the
    /// frequency-dependent slice (default: 0.5).
    pub diversity_threshold: f64,

    /// Weight added to the frequency-dependent slice when diversity is low
    /// (default: 0.1).
    pub diversity_boost: f64,

    // --- Fitness modifiers ---
    /// Signatures held by less than this share are rare (default: 0.1).
    pub rare_share: f64,

    /// Multiplier for rare signatures (default: 1.1).
    pub rare_multiplier: f64,

    /// Signatures held by more than this share are common (default: 0.8).
    pub common_share: f64,

    /// Multiplier for common signatures (default: 0.95).
    pub common_multiplier: f64,

    /// Group cooperation above which the group bonus applies (default: 0.7).
    pub group_cooperation_threshold: f64,

    /// Individual contribution above which the group bonus applies
    /// (default: 0.6).
    pub group_contribution_threshold: f64,

    /// Group bonus multiplier (default: 1.15).
    pub group_multiplier: f64,

    /// Lower clamp of overall fitness (default: 0.01).
    pub min_fitness: f64,

    /// Fitness history entries kept per agent (default: 100).
    pub fitness_history_cap: usize,

    /// Component weights and normalisation constants.
    pub fitness: FitnessConfig,

    // --- Signatures, emergence, culture ---
    /// Traits whose discretised values form the behavioural signature
    /// (default: cooperation, risk_tolerance, analytical_thinking).
    pub signature_traits: Vec<String>,

    /// Number of buckets each signature trait is discretised into
    /// (default: 3).
    pub signature_levels: u8,

    /// Population share a cluster must exceed to count as emergent
    /// (default: 0.3).
    pub emergence_detection_threshold: f64,

    /// Rate at which cultural norms move toward connected agents' norms
    /// (default: 0.1).
    pub cultural_transmission_rate: f64,

    /// Environmental change types and the trait regions they favour.
    pub pressure_rules: Vec<PressureRule>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            hard_cap_factor: 2.0,
            mutation_rate: 0.05,
            mutation_sigma: 5.0,
            crossover_rate: 0.7,
            selection_pressure: 0.5,
            elite_preservation_rate: 0.1,
            selection_weights: default_selection_weights(),
            diversity_threshold: 0.5,
            diversity_boost: 0.1,
            rare_share: 0.1,
            rare_multiplier: 1.1,
            common_share: 0.8,
            common_multiplier: 0.95,
            group_cooperation_threshold: 0.7,
            group_contribution_threshold: 0.6,
            group_multiplier: 1.15,
            min_fitness: 0.01,
            fitness_history_cap: 100,
            fitness: FitnessConfig::default(),
            signature_traits: vec![
                "cooperation".to_owned(),
                "risk_tolerance".to_owned(),
                "analytical_thinking".to_owned(),
            ],
            signature_levels: 3,
            emergence_detection_threshold: 0.3,
            cultural_transmission_rate: 0.1,
            pressure_rules: PressureRule::defaults(),
        }
    }
}

fn default_selection_weights() -> BTreeMap<SelectionKind, f64> {
    BTreeMap::from([
        (SelectionKind::Tournament, 0.4),
        (SelectionKind::FitnessProportionate, 0.3),
        (SelectionKind::FrequencyDependent, 0.2),
        (SelectionKind::UniformRandom, 0.1),
        (SelectionKind::Rank, 0.0),
    ])
}

impl EvolutionConfig {
    /// Hard population cap.
    pub fn hard_cap(&self) -> usize {
        let cap = ceil_tolerant(count_f64(self.population_size) * self.hard_cap_factor);
        if cap.is_finite() && cap > 0.0 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cap = cap as usize;
            cap.max(self.population_size)
        } else {
            self.population_size
        }
    }

    /// Tournament size `max(2, ceil(10 * selection_pressure))`.
    pub fn tournament_size(&self) -> usize {
        let size = ceil_tolerant(10.0 * self.selection_pressure);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = if size.is_finite() && size > 0.0 { size as usize } else { 0 };
        size.max(2)
    }

    /// Number of elites for a population of `size`.
    pub fn elite_count(&self, size: usize) -> usize {
        let count = ceil_tolerant(count_f64(size) * self.elite_preservation_rate);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let count = if count.is_finite() && count > 0.0 { count as usize } else { 0 };
        count.min(size)
    }

    /// Check every rate against its valid range.
    pub fn validate(&self) -> Result<(), PopulationError> {
        let unit = [
            ("mutation_rate", self.mutation_rate),
            ("crossover_rate", self.crossover_rate),
            ("elite_preservation_rate", self.elite_preservation_rate),
            ("cultural_transmission_rate", self.cultural_transmission_rate),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(format!("{name} must lie in [0, 1], got {value}")));
            }
        }
        if !(self.selection_pressure > 0.0 && self.selection_pressure <= 1.0) {
            return Err(invalid(format!(
                "selection_pressure must lie in (0, 1], got {}",
                self.selection_pressure
            )));
        }
        if !(self.emergence_detection_threshold > 0.0 && self.emergence_detection_threshold <= 1.0)
        {
            return Err(invalid(format!(
                "emergence_detection_threshold must lie in (0, 1], got {}",
                self.emergence_detection_threshold
            )));
        }
        if self.population_size == 0 {
            return Err(invalid("population_size must be positive".to_owned()));
        }
        if self.hard_cap_factor < 1.0 {
            return Err(invalid("hard_cap_factor must be at least 1".to_owned()));
        }
        if self.signature_levels == 0 {
            return Err(invalid("signature_levels must be positive".to_owned()));
        }
        if self.selection_weights.values().any(|w| *w < 0.0) {
            return Err(invalid("selection weights must be non-negative".to_owned()));
        }
        if self.mutation_sigma < 0.0 {
            return Err(invalid("mutation_sigma must be non-negative".to_owned()));
        }
        Ok(())
    }
}

/// Ceiling that ignores floating-point noise just above an integer.
fn ceil_tolerant(value: f64) -> f64 {
    (value - 1e-9).ceil()
}

fn invalid(reason: String) -> PopulationError {
    PopulationError::InvalidConfig { reason }
}

// ---------------------------------------------------------------------------
// Fitness
// ---------------------------------------------------------------------------

/// Weights and normalisation constants of the default fitness evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitnessConfig {
    /// Aggregation weight per component (default: 0.25, 0.15, 0.15, 0.15,
    /// 0.10, 0.10, 0.05, 0.05 in declaration order).
    pub weights: BTreeMap<FitnessComponent, f64>,

    /// Profit at which the profit term reaches ~0.73 (default: 1000).
    pub pnl_scale: f64,

    /// Strategies created per generation that saturate innovation
    /// (default: 3).
    pub innovation_target: f64,

    /// Score used when a component has no evidence yet (default: 0.5).
    pub neutral_score: f64,
}

impl Default for FitnessConfig {
    fn default() -> Self {
        Self {
            weights: FitnessComponent::ALL
                .iter()
                .map(|c| (*c, c.default_weight()))
                .collect(),
            pnl_scale: 1000.0,
            innovation_target: 3.0,
            neutral_score: 0.5,
        }
    }
}

impl FitnessConfig {
    /// Weight of one component, falling back to its default.
    pub fn weight(&self, component: FitnessComponent) -> f64 {
        self.weights
            .get(&component)
            .copied()
            .unwrap_or_else(|| component.default_weight())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EvolutionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn tournament_size_follows_pressure() {
        let mut config = EvolutionConfig::default();
        assert_eq!(config.tournament_size(), 5);
        config.selection_pressure = 0.05;
        assert_eq!(config.tournament_size(), 2);
        config.selection_pressure = 1.0;
        assert_eq!(config.tournament_size(), 10);
    }

    #[test]
    fn zero_pressure_is_rejected() {
        let config = EvolutionConfig {
            selection_pressure: 0.0,
            ..EvolutionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PopulationError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn elite_count_rounds_up() {
        let config = EvolutionConfig::default();
        assert_eq!(config.elite_count(1000), 100);
        assert_eq!(config.elite_count(15), 2);
        assert_eq!(config.hard_cap(), 200);
    }
}
