//! Synthetic market sessions run between generations.
//!
//! Before each tick the [`MarketSession`] hook lets every live trader make a
//! few decisions against a drifting market, resolves each decision with a
//! random outcome and reports it back, so that traits, relationships and
//! skills evolve and fitness has something to score. Occasional market
//! shocks are sent on the environment channel and reach the population at
//! the start of the following generation.

use mercator_agents::Trait;
use mercator_core::{EngineError, GenerationHook, MercatorEngine};
use mercator_types::{
    AgentId, Context, DecisionRecord, EnvironmentalChange, GenerationReport, MarketState,
    Outcome, OutcomeClass, Situation, SituationType, TradeAction,
};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// -----------------------------------------------------------------------
// Configuration
// -----------------------------------------------------------------------

/// Market session settings, read from the `market` section of
/// `mercator-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarketConfig {
    /// Decisions each trader makes per generation (default: 3).
    #[serde(default = "default_decisions_per_agent")]
    pub decisions_per_agent: u32,

    /// Probability that a situation involves a counterparty (default: 0.7).
    #[serde(default = "default_counterparty_probability")]
    pub counterparty_probability: f64,

    /// Largest move of a market indicator per generation (default: 10).
    #[serde(default = "default_drift")]
    pub drift: f64,

    /// Probability of a market shock per generation (default: 0.05).
    #[serde(default = "default_shock_probability")]
    pub shock_probability: f64,

    /// Magnitude of a market shock (default: 60).
    #[serde(default = "default_shock_magnitude")]
    pub shock_magnitude: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            decisions_per_agent: default_decisions_per_agent(),
            counterparty_probability: default_counterparty_probability(),
            drift: default_drift(),
            shock_probability: default_shock_probability(),
            shock_magnitude: default_shock_magnitude(),
        }
    }
}

impl MarketConfig {
    /// Name of the first out-of-range field, if any.
    pub fn validate(&self) -> Result<(), &'static str> {
        let unit = |p: f64| (0.0..=1.0).contains(&p);
        if !unit(self.counterparty_probability) {
            return Err("counterparty_probability");
        }
        if !unit(self.shock_probability) {
            return Err("shock_probability");
        }
        if !self.drift.is_finite() {
            return Err("drift");
        }
        if !(0.0..=100.0).contains(&self.shock_magnitude) {
            return Err("shock_magnitude");
        }
        Ok(())
    }
}

const fn default_decisions_per_agent() -> u32 {
    3
}

const fn default_counterparty_probability() -> f64 {
    0.7
}

const fn default_drift() -> f64 {
    10.0
}

const fn default_shock_probability() -> f64 {
    0.05
}

const fn default_shock_magnitude() -> f64 {
    60.0
}

/// Shock types drawn by the session; each matches a default pressure rule.
const SHOCKS: &[&str] = &[
    "market_crash",
    "volatility_spike",
    "liquidity_crisis",
    "regulatory_change",
    "trust_collapse",
];

// -----------------------------------------------------------------------
// Session
// -----------------------------------------------------------------------

/// Per-generation market activity.
pub struct MarketSession {
    config: MarketConfig,
    rng: SmallRng,
    market: MarketState,
    shocks: mpsc::Sender<EnvironmentalChange>,
    decisions: u64,
    rejected: u64,
}

impl MarketSession {
    /// A session seeded with `seed`, sending shocks on `shocks`.
    pub fn new(config: MarketConfig, seed: u64, shocks: mpsc::Sender<EnvironmentalChange>) -> Self {
        Self {
            config,
            rng: SmallRng::seed_from_u64(seed),
            market: MarketState::new(50.0, 50.0, 50.0),
            shocks,
            decisions: 0,
            rejected: 0,
        }
    }

    /// Decisions made so far.
    pub const fn decisions(&self) -> u64 {
        self.decisions
    }

    fn drift(&mut self) {
        let step = self.config.drift.abs();
        for indicator in [
            &mut self.market.volatility,
            &mut self.market.trend,
            &mut self.market.liquidity,
        ] {
            let current = indicator.unwrap_or(50.0);
            let delta = if step > 0.0 { self.rng.random_range(-step..=step) } else { 0.0 };
            *indicator = Some((current + delta).clamp(0.0, 100.0));
        }
    }

    fn maybe_shock(&mut self, engine: &MercatorEngine) {
        if !self.rng.random_bool(self.config.shock_probability.clamp(0.0, 1.0)) {
            return;
        }
        let index = self.rng.random_range(0..SHOCKS.len());
        let Some(change_type) = SHOCKS.get(index) else {
            return;
        };
        let change = EnvironmentalChange {
            change_type: (*change_type).to_owned(),
            magnitude: self.config.shock_magnitude,
            timestamp: engine.now(),
        };
        info!(change_type = %change.change_type, magnitude = change.magnitude, "market shock");
        if let Err(e) = self.shocks.try_send(change) {
            warn!(error = %e, "environment channel full, shock dropped");
        }
    }

    fn situation(&mut self, agent: AgentId, others: &[AgentId]) -> Situation {
        let kinds = SituationType::ALL;
        let kind = kinds
            .get(self.rng.random_range(0..kinds.len()))
            .copied()
            .unwrap_or(SituationType::TradeOpportunity);
        let situation = Situation::new(kind, self.rng.random_range(10.0..=90.0));
        if others.len() < 2 || !self.rng.random_bool(self.config.counterparty_probability.clamp(0.0, 1.0)) {
            return situation;
        }
        let pick = others.get(self.rng.random_range(0..others.len())).copied();
        match pick {
            Some(c) if c != agent => situation.with_counterparty(c),
            _ => situation,
        }
    }

    /// Draw an outcome for a decision.
    fn outcome(&mut self, record: &DecisionRecord, engine: &MercatorEngine) -> Outcome {
        let trusting = matches!(
            record.action,
            TradeAction::Accept | TradeAction::Cooperate | TradeAction::Negotiate
        );
        let honesty = record
            .counterparty
            .and_then(|c| engine.agent(c))
            .map(|a| a.traits().value(Trait::Honesty));
        if trusting
            && let Some(honesty) = honesty
            && self.rng.random_bool(((100.0 - honesty) / 100.0 * 0.3).clamp(0.0, 1.0))
        {
            return self.loss(OutcomeClass::Betrayal, record.action, true);
        }

        let trend = self.market.trend.unwrap_or(50.0);
        let bias = match record.action {
            TradeAction::Buy => (trend - 50.0) / 200.0,
            TradeAction::Sell => (50.0 - trend) / 200.0,
            _ => 0.0,
        };
        let p = (0.65 - record.action.risk_level() / 250.0 + bias).clamp(0.05, 0.95);
        if self.rng.random_bool(p) {
            let class = if record.action == TradeAction::Cooperate && record.counterparty.is_some() {
                OutcomeClass::Cooperation
            } else {
                OutcomeClass::Successful
            };
            let magnitude = self.magnitude(record.action);
            Outcome {
                class,
                success: true,
                profit_loss: Decimal::from(magnitude),
                satisfaction: self.rng.random_range(60.0..=95.0),
                emotional_impact: self.rng.random_range(20.0..=70.0),
                unexpected: self.rng.random_bool(0.1),
                mutual_benefit: (class == OutcomeClass::Cooperation)
                    .then(|| self.rng.random_range(60.0..=90.0)),
                growth_opportunity: false,
            }
        } else {
            self.loss(OutcomeClass::Failed, record.action, false)
        }
    }

    fn loss(&mut self, class: OutcomeClass, action: TradeAction, unexpected: bool) -> Outcome {
        let magnitude = self.magnitude(action);
        Outcome {
            class,
            success: false,
            profit_loss: Decimal::from(magnitude.saturating_neg()),
            satisfaction: self.rng.random_range(5.0..=40.0),
            emotional_impact: self.rng.random_range(40.0..=90.0),
            unexpected: unexpected || self.rng.random_bool(0.1),
            mutual_benefit: None,
            growth_opportunity: self.rng.random_bool(0.5),
        }
    }

    fn magnitude(&mut self, action: TradeAction) -> i64 {
        let base = self.rng.random_range(10_i64..=500);
        if action.risk_level() > 50.0 { base.saturating_mul(3) } else { base }
    }

    /// One decision and its outcome; agent-level failures are logged and
    /// skipped.
    fn trade(
        &mut self,
        engine: &mut MercatorEngine,
        agent: AgentId,
        others: &[AgentId],
    ) -> Result<(), EngineError> {
        let situation = self.situation(agent, others);
        let context = Context {
            market: self.market,
            ..Context::default()
        };
        let record = match engine.decide(agent, &situation, &context) {
            Ok(record) => record,
            Err(EngineError::Agent { source }) => {
                self.rejected = self.rejected.saturating_add(1);
                debug!(agent_id = %agent, error = %source, "decision rejected");
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.decisions = self.decisions.saturating_add(1);
        let outcome = self.outcome(&record, engine);
        match engine.report_outcome(agent, record.session_id, &outcome) {
            Ok(_) => Ok(()),
            Err(EngineError::Agent { source }) => {
                warn!(agent_id = %agent, error = %source, "outcome rejected");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl GenerationHook for MarketSession {
    fn before_tick(&mut self, engine: &mut MercatorEngine) -> Result<(), EngineError> {
        self.drift();
        self.maybe_shock(engine);
        let traders = engine.agent_ids();
        for _ in 0..self.config.decisions_per_agent {
            for agent in &traders {
                self.trade(engine, *agent, &traders)?;
            }
        }
        debug!(
            traders = traders.len(),
            decisions = self.decisions,
            rejected = self.rejected,
            "market session finished"
        );
        Ok(())
    }

    fn after_tick(&mut self, report: &GenerationReport, engine: &MercatorEngine) {
        info!(
            generation = report.generation,
            population = report.population_after,
            mean_fitness = report.mean_fitness,
            diversity = report.diversity_index,
            offspring = report.offspring_created,
            evicted = report.evicted.len(),
            emergent_behaviors = engine.population().emergent_behaviors().len(),
            "generation complete"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use mercator_core::SimulationConfig;

    use super::*;
    use crate::spawner::{FounderBands, spawn_traders};

    fn engine(traders: usize) -> MercatorEngine {
        let mut config = SimulationConfig::default();
        config.population.size = traders;
        let mut engine = MercatorEngine::new(config).unwrap();
        spawn_traders(
            &mut engine,
            traders,
            &FounderBands::default(),
            &mut SmallRng::seed_from_u64(7),
        )
        .unwrap();
        engine
    }

    #[test]
    fn every_trader_decides_each_round() {
        let mut engine = engine(10);
        let (tx, _rx) = mpsc::channel(4);
        let mut session = MarketSession::new(MarketConfig::default(), 1, tx);
        session.before_tick(&mut engine).unwrap();
        assert_eq!(session.decisions() + session.rejected, 30);
        for id in engine.agent_ids() {
            assert_eq!(engine.snapshot(id).unwrap().pending_decisions, 0);
        }
    }

    #[test]
    fn certain_shock_reaches_the_channel() {
        let engine = engine(2);
        let (tx, mut rx) = mpsc::channel(4);
        let config = MarketConfig {
            shock_probability: 1.0,
            ..MarketConfig::default()
        };
        let mut session = MarketSession::new(config, 2, tx);
        session.maybe_shock(&engine);
        let change = rx.try_recv().unwrap();
        assert!(SHOCKS.contains(&change.change_type.as_str()));
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let config = MarketConfig {
            shock_probability: 1.5,
            ..MarketConfig::default()
        };
        assert_eq!(config.validate(), Err("shock_probability"));
        assert_eq!(MarketConfig::default().validate(), Ok(()));
    }

    #[test]
    fn market_stays_in_bounds() {
        let (tx, _rx) = mpsc::channel(1);
        let config = MarketConfig {
            drift: 80.0,
            ..MarketConfig::default()
        };
        let mut session = MarketSession::new(config, 3, tx);
        for _ in 0..50 {
            session.drift();
        }
        for value in [session.market.volatility, session.market.trend, session.market.liquidity] {
            assert!((0.0..=100.0).contains(&value.unwrap()));
        }
    }

    #[test]
    fn sessions_with_the_same_seed_match() {
        let run = || {
            let mut engine = engine(8);
            let (tx, _rx) = mpsc::channel(4);
            let mut session = MarketSession::new(MarketConfig::default(), 11, tx);
            session.before_tick(&mut engine).unwrap();
            engine.export_population().unwrap()
        };
        assert_eq!(run(), run());
    }
}
