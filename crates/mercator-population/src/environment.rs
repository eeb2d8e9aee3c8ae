//! Environmental pressures.
//!
//! An [`EnvironmentalChange`] is matched against the configured
//! [`PressureRule`]s; each match becomes an active [`EvolutionaryPressure`]
//! whose penalty is scaled by the change's magnitude. At every tick agents
//! outside a pressure's adapted region are marked for a fitness penalty at
//! the next scoring.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::{EnvironmentalChange, EvolutionaryPressure};

/// Maps an environmental change type to a favoured trait region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureRule {
    /// Change type this rule reacts to.
    pub change_type: String,
    /// Trait the pressure acts on.
    pub trait_name: String,
    /// Lower bound of the adapted region.
    pub min: f64,
    /// Upper bound of the adapted region.
    pub max: f64,
    /// Penalty at magnitude 100.
    pub penalty: f64,
    /// Generations the pressure lasts.
    pub generations: u32,
}

impl PressureRule {
    fn new(change_type: &str, trait_name: &str, min: f64, max: f64) -> Self {
        Self {
            change_type: change_type.to_owned(),
            trait_name: trait_name.to_owned(),
            min,
            max,
            penalty: 0.1,
            generations: 3,
        }
    }

    /// Built-in rules.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("market_crash", "risk_tolerance", 0.0, 60.0),
            Self::new("volatility_spike", "emotional_stability", 40.0, 100.0),
            Self::new("liquidity_crisis", "patience", 50.0, 100.0),
            Self::new("regulatory_change", "honesty", 40.0, 100.0),
            Self::new("trust_collapse", "trust_propensity", 0.0, 70.0),
        ]
    }

    /// Pressure for a change of the given magnitude (0--100).
    pub fn pressure_for(&self, magnitude: f64) -> EvolutionaryPressure {
        let scale = if magnitude.is_finite() { magnitude.clamp(0.0, 100.0) / 100.0 } else { 0.0 };
        EvolutionaryPressure {
            trait_name: self.trait_name.clone(),
            min: self.min,
            max: self.max,
            penalty: (self.penalty * scale).clamp(0.0, 1.0),
            generations: self.generations,
        }
    }
}

/// A pressure and the generations it has left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivePressure {
    /// The pressure.
    pub pressure: EvolutionaryPressure,
    /// Generations remaining.
    pub remaining: u32,
}

/// Pressures currently in effect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Environment {
    active: Vec<ActivePressure>,
}

impl Environment {
    /// Create an environment without pressures.
    pub const fn new() -> Self {
        Self { active: Vec::new() }
    }

    /// Activate the pressures a change triggers; returns them.
    pub fn apply_change(
        &mut self,
        change: &EnvironmentalChange,
        rules: &[PressureRule],
    ) -> Vec<EvolutionaryPressure> {
        let pressures: Vec<EvolutionaryPressure> = rules
            .iter()
            .filter(|r| r.change_type == change.change_type)
            .map(|r| r.pressure_for(change.magnitude))
            .collect();
        if pressures.is_empty() {
            tracing::debug!(change_type = %change.change_type, "environmental change matched no rule");
        }
        for p in &pressures {
            self.add_pressure(p.clone());
        }
        pressures
    }

    /// Activate a pressure directly.
    pub fn add_pressure(&mut self, pressure: EvolutionaryPressure) {
        if pressure.generations == 0 {
            return;
        }
        tracing::info!(
            trait_name = %pressure.trait_name,
            min = pressure.min,
            max = pressure.max,
            penalty = pressure.penalty,
            generations = pressure.generations,
            "evolutionary pressure active"
        );
        self.active.push(ActivePressure {
            remaining: pressure.generations,
            pressure,
        });
    }

    /// Total penalty for an agent with the given expressed traits.
    ///
    /// Traits the agent does not express are not penalised.
    pub fn penalty_for(&self, expressed: &BTreeMap<String, f64>) -> f64 {
        self.active
            .iter()
            .filter_map(|a| {
                let value = expressed.get(&a.pressure.trait_name)?;
                (*value < a.pressure.min || *value > a.pressure.max).then_some(a.pressure.penalty)
            })
            .sum()
    }

    /// Count down one generation and drop expired pressures.
    pub fn advance(&mut self) {
        for a in &mut self.active {
            a.remaining = a.remaining.saturating_sub(1);
        }
        self.active.retain(|a| a.remaining > 0);
    }

    /// Pressures in effect.
    pub fn active(&self) -> &[ActivePressure] {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn crash(magnitude: f64) -> EnvironmentalChange {
        EnvironmentalChange {
            change_type: "market_crash".to_owned(),
            magnitude,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    #[test]
    fn change_activates_matching_rule_scaled_by_magnitude() {
        let mut env = Environment::new();
        let pressures = env.apply_change(&crash(50.0), &PressureRule::defaults());
        assert_eq!(pressures.len(), 1);
        assert!((pressures[0].penalty - 0.05).abs() < 1e-9);
        assert_eq!(env.active().len(), 1);
    }

    #[test]
    fn only_agents_outside_the_region_are_penalised() {
        let mut env = Environment::new();
        env.apply_change(&crash(100.0), &PressureRule::defaults());
        let risky = BTreeMap::from([("risk_tolerance".to_owned(), 90.0)]);
        let careful = BTreeMap::from([("risk_tolerance".to_owned(), 30.0)]);
        assert!((env.penalty_for(&risky) - 0.1).abs() < 1e-9);
        assert!(env.penalty_for(&careful).abs() < f64::EPSILON);
        assert!(env.penalty_for(&BTreeMap::new()).abs() < f64::EPSILON);
    }

    #[test]
    fn pressures_expire() {
        let mut env = Environment::new();
        env.apply_change(&crash(100.0), &PressureRule::defaults());
        for _ in 0..3 {
            assert_eq!(env.active().len(), 1);
            env.advance();
        }
        assert!(env.active().is_empty());
    }

    #[test]
    fn unknown_change_type_is_ignored() {
        let mut env = Environment::new();
        let change = EnvironmentalChange {
            change_type: "solar_flare".to_owned(),
            magnitude: 80.0,
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
        };
        assert!(env.apply_change(&change, &PressureRule::defaults()).is_empty());
    }
}
