//! Strategy library: learned decision templates with a fitness scalar.
//!
//! A strategy recommends one action for one situation type. It is created
//! by the learning loop once a pattern has been seen often enough with a
//! high enough success rate, and its fitness is an exponential moving
//! average of observed success. Strategies that stay unfit past the prune
//! age are removed and their ids tombstoned so they never reappear.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mercator_types::{SituationType, StrategyFitnessUpdate, StrategyId, TradeAction};

use crate::config::AgentConfig;
use crate::error::AgentError;

/// A parameterised decision template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Unique id.
    pub id: StrategyId,
    /// Human-readable name.
    pub name: String,
    /// Situation the strategy applies to.
    pub situation_type: SituationType,
    /// Recommended action.
    pub action: TradeAction,
    /// Pattern signature the strategy was learned from.
    pub signature: String,
    /// Named parameters.
    pub parameters: BTreeMap<String, f64>,
    /// Fitness in `[0, 1]`.
    pub fitness: f64,
    /// Tags that make the strategy more applicable.
    pub applicability_tags: BTreeSet<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Number of fitness updates applied.
    pub update_count: u32,
    /// Start of the current run of updates below the prune threshold.
    #[serde(default)]
    pub below_threshold_since: Option<DateTime<Utc>>,
}

impl Strategy {
    /// Confidence a decision starts from when following this strategy.
    pub fn confidence(&self) -> f64 {
        (30.0 + 60.0 * self.fitness).clamp(0.0, 100.0)
    }
}

/// What a decision is looking for in the library.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyCriteria<'a> {
    /// Situation type to match.
    pub situation_type: SituationType,
    /// Actions the situation allows.
    pub candidates: &'a [TradeAction],
    /// Tags of the current situation.
    pub tags: &'a BTreeSet<String>,
    /// Minimum fitness for a strategy to be considered.
    pub min_fitness: f64,
}

/// Per-agent strategy registry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StrategyLibrary {
    strategies: BTreeMap<StrategyId, Strategy>,
    #[serde(default)]
    tombstones: BTreeSet<StrategyId>,
}

impl StrategyLibrary {
    /// Create an empty library.
    pub const fn new() -> Self {
        Self {
            strategies: BTreeMap::new(),
            tombstones: BTreeSet::new(),
        }
    }

    /// Look up a strategy.
    pub fn get(&self, id: StrategyId) -> Option<&Strategy> {
        self.strategies.get(&id)
    }

    /// Strategy learned from a pattern signature, if any.
    pub fn by_signature(&self, signature: &str) -> Option<&Strategy> {
        self.strategies.values().find(|s| s.signature == signature)
    }

    /// Best applicable strategy: highest fitness, then most matching tags,
    /// then lowest id.
    pub fn find(&self, criteria: &StrategyCriteria<'_>) -> Option<&Strategy> {
        self.strategies
            .values()
            .filter(|s| {
                s.situation_type == criteria.situation_type
                    && criteria.candidates.contains(&s.action)
                    && s.fitness >= criteria.min_fitness
            })
            .min_by(|a, b| {
                b.fitness
                    .total_cmp(&a.fitness)
                    .then_with(|| {
                        let a_tags = a.applicability_tags.intersection(criteria.tags).count();
                        let b_tags = b.applicability_tags.intersection(criteria.tags).count();
                        b_tags.cmp(&a_tags)
                    })
                    .then_with(|| a.id.cmp(&b.id))
            })
    }

    /// Insert or replace a strategy. Returns `true` if it was new.
    ///
    /// Fitness is clamped to `[0, 1]`. Fails with
    /// [`AgentError::StrategyTombstoned`] for a pruned id.
    pub fn upsert(&mut self, mut strategy: Strategy) -> Result<bool, AgentError> {
        if self.tombstones.contains(&strategy.id) {
            return Err(AgentError::StrategyTombstoned(strategy.id));
        }
        strategy.fitness = strategy.fitness.clamp(0.0, 1.0);
        Ok(self.strategies.insert(strategy.id, strategy).is_none())
    }

    /// Blend an observed success in `[0, 1]` into a strategy's fitness:
    /// `fitness ← (1−α)·fitness + α·observed`, with `α` the configured
    /// strategy learning rate.
    ///
    /// Tracks when fitness dropped below the prune threshold and clears the
    /// mark once it recovers. Returns `None` for unknown ids.
    pub fn record_outcome(
        &mut self,
        id: StrategyId,
        observed: f64,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Option<StrategyFitnessUpdate> {
        let strategy = self.strategies.get_mut(&id)?;
        let alpha = config.strategy_learning_rate.clamp(0.05, 0.2);
        let threshold = config.strategy_prune_fitness;
        let before = strategy.fitness;
        strategy.fitness =
            ((1.0 - alpha) * before + alpha * observed.clamp(0.0, 1.0)).clamp(0.0, 1.0);
        strategy.below_threshold_since = if strategy.fitness < threshold {
            let since = if before < threshold { strategy.updated_at } else { now };
            Some(strategy.below_threshold_since.unwrap_or(since))
        } else {
            None
        };
        strategy.updated_at = now;
        strategy.update_count = strategy.update_count.saturating_add(1);
        Some(StrategyFitnessUpdate {
            strategy_id: id,
            fitness_before: before,
            fitness_after: strategy.fitness,
        })
    }

    /// Remove strategies whose fitness stayed below the prune threshold for
    /// at least the prune age, tombstoning their ids.
    ///
    /// A strategy stored below the threshold and never updated since counts
    /// from its last update.
    pub fn prune(&mut self, now: DateTime<Utc>, config: &AgentConfig) -> Vec<StrategyId> {
        let min_age = Duration::days(config.strategy_prune_age_days);
        let doomed: Vec<StrategyId> = self
            .strategies
            .values()
            .filter(|s| {
                s.fitness < config.strategy_prune_fitness
                    && now - s.below_threshold_since.unwrap_or(s.updated_at) >= min_age
            })
            .map(|s| s.id)
            .collect();
        for id in &doomed {
            self.strategies.remove(id);
            self.tombstones.insert(*id);
            tracing::debug!(strategy_id = %id, "strategy pruned");
        }
        doomed
    }

    /// Whether an id was pruned.
    pub fn is_tombstoned(&self, id: StrategyId) -> bool {
        self.tombstones.contains(&id)
    }

    /// Iterate over live strategies in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.values()
    }

    /// Number of live strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the library holds no live strategy.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Mean fitness of live strategies, or `None` when empty.
    pub fn mean_fitness(&self) -> Option<f64> {
        if self.strategies.is_empty() {
            return None;
        }
        let n = f64::from(u32::try_from(self.strategies.len()).unwrap_or(u32::MAX));
        Some(self.strategies.values().map(|s| s.fitness).sum::<f64>() / n)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercator_types::IdSource;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(1_000)
    }

    fn strategy(ids: &mut IdSource, action: TradeAction, fitness: f64) -> Strategy {
        Strategy {
            id: StrategyId::next_from(ids),
            name: format!("negotiation:{}", action.as_str()),
            situation_type: SituationType::Negotiation,
            action,
            signature: format!("negotiation:{}:low", action.as_str()),
            parameters: BTreeMap::new(),
            fitness,
            applicability_tags: BTreeSet::new(),
            created_at: t0(),
            updated_at: t0(),
            update_count: 0,
            below_threshold_since: None,
        }
    }

    #[test]
    fn find_prefers_fitness() {
        let mut ids = IdSource::new(7);
        let mut library = StrategyLibrary::new();
        library.upsert(strategy(&mut ids, TradeAction::Accept, 0.6)).unwrap();
        library.upsert(strategy(&mut ids, TradeAction::Negotiate, 0.8)).unwrap();
        let tags = BTreeSet::new();
        let criteria = StrategyCriteria {
            situation_type: SituationType::Negotiation,
            candidates: SituationType::Negotiation.candidate_actions(),
            tags: &tags,
            min_fitness: 0.0,
        };
        assert_eq!(library.find(&criteria).unwrap().action, TradeAction::Negotiate);

        let other = StrategyCriteria {
            situation_type: SituationType::MarketCrash,
            ..criteria
        };
        assert!(library.find(&other).is_none());
    }

    #[test]
    fn fitness_is_a_moving_average() {
        let mut ids = IdSource::new(7);
        let mut library = StrategyLibrary::new();
        let s = strategy(&mut ids, TradeAction::Accept, 0.5);
        let id = s.id;
        library.upsert(s).unwrap();
        let update = library
            .record_outcome(id, 1.0, t0(), &AgentConfig::default())
            .unwrap();
        assert!((update.fitness_after - 0.55).abs() < 1e-12);
        let fast = AgentConfig {
            strategy_learning_rate: 0.2,
            ..AgentConfig::default()
        };
        for _ in 0..200 {
            library.record_outcome(id, 1.0, t0(), &fast);
        }
        let fitness = library.get(id).unwrap().fitness;
        assert!(fitness <= 1.0);
        assert!(fitness > 0.99);
    }

    #[test]
    fn pruned_ids_never_return() {
        let mut ids = IdSource::new(7);
        let mut library = StrategyLibrary::new();
        let weak = strategy(&mut ids, TradeAction::Reject, 0.1);
        let weak_copy = weak.clone();
        library.upsert(weak).unwrap();
        let config = AgentConfig::default();

        assert!(library.prune(t0() + Duration::days(10), &config).is_empty());
        let pruned = library.prune(t0() + Duration::days(30), &config);
        assert_eq!(pruned, vec![weak_copy.id]);
        assert!(library.is_tombstoned(weak_copy.id));
        assert_eq!(
            library.upsert(weak_copy.clone()),
            Err(AgentError::StrategyTombstoned(weak_copy.id))
        );
        assert!(library.is_empty());
    }

    #[test]
    fn prune_age_counts_from_the_drop_below_threshold() {
        let mut ids = IdSource::new(7);
        let mut library = StrategyLibrary::new();
        let s = strategy(&mut ids, TradeAction::Accept, 0.21);
        let id = s.id;
        library.upsert(s).unwrap();
        let config = AgentConfig {
            strategy_learning_rate: 0.2,
            ..AgentConfig::default()
        };

        let dip = t0() + Duration::days(60);
        let update = library.record_outcome(id, 0.0, dip, &config).unwrap();
        assert!(update.fitness_after < config.strategy_prune_fitness);
        assert_eq!(library.get(id).unwrap().below_threshold_since, Some(dip));
        assert!(library.prune(dip, &config).is_empty());
        assert!(library.prune(dip + Duration::days(29), &config).is_empty());

        let later = dip + Duration::days(20);
        library.record_outcome(id, 0.0, later, &config);
        assert_eq!(library.get(id).unwrap().below_threshold_since, Some(dip));
        assert_eq!(library.prune(dip + Duration::days(30), &config), vec![id]);
    }

    #[test]
    fn recovery_resets_the_prune_clock() {
        let mut ids = IdSource::new(7);
        let mut library = StrategyLibrary::new();
        let s = strategy(&mut ids, TradeAction::Accept, 0.21);
        let id = s.id;
        library.upsert(s).unwrap();
        let config = AgentConfig {
            strategy_learning_rate: 0.2,
            ..AgentConfig::default()
        };

        let dip = t0() + Duration::days(1);
        library.record_outcome(id, 0.0, dip, &config);
        let recovered = dip + Duration::days(10);
        library.record_outcome(id, 1.0, recovered, &config);
        assert!(library.get(id).unwrap().below_threshold_since.is_none());
        assert!(library.prune(dip + Duration::days(45), &config).is_empty());

        let again = dip + Duration::days(40);
        for _ in 0..5 {
            library.record_outcome(id, 0.0, again, &config);
        }
        assert_eq!(library.get(id).unwrap().below_threshold_since, Some(again));
        assert!(library.prune(again + Duration::days(29), &config).is_empty());
        assert_eq!(library.prune(again + Duration::days(30), &config), vec![id]);
    }
}
