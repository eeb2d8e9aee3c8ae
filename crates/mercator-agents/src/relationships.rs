//! Per-agent relationship graph: trust, outcome counters and class.
//!
//! Relationships are keyed by counterparty id and never hold references to
//! other agents. Trust lives in `[0, 100]` and moves by a fixed delta per
//! outcome class:
//!
//! | outcome     | Δtrust |
//! |-------------|--------|
//! | successful  | +5     |
//! | failed      | −3     |
//! | betrayal    | −25    |
//! | cooperation | +8     |
//! | no outcome  | 0      |
//!
//! The class is recomputed after every update, first matching rule wins:
//! enemy (betrayals > 2), trusted partner (trust ≥ 80 and successes > 5),
//! reliable contact (trust > 60 and successes > 2·failures), unreliable
//! (trust < 30 or failures > 2·successes), unknown (fewer than three
//! interactions), otherwise neutral.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_types::{AgentId, OutcomeClass, RelationshipClass};

/// Lowest trust value.
pub const TRUST_MIN: f64 = 0.0;

/// Highest trust value.
pub const TRUST_MAX: f64 = 100.0;

// ---------------------------------------------------------------------------
// Relationship
// ---------------------------------------------------------------------------

/// One entry in a relationship's interaction history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    /// Outcome class of the interaction.
    pub outcome: OutcomeClass,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Trust right after the update.
    pub trust_after: f64,
}

/// What an agent knows about one counterparty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    /// Trust in `[0, 100]`.
    pub trust: f64,
    /// Betrayals suffered.
    pub betrayals: u32,
    /// Successful or cooperative interactions.
    pub successes: u32,
    /// Failed interactions.
    pub failures: u32,
    /// Total interactions, including those trimmed from `interactions`.
    pub interaction_count: u32,
    /// Most recent interactions, oldest first.
    pub interactions: Vec<Interaction>,
    /// Derived class.
    pub class: RelationshipClass,
    /// When the last interaction happened.
    pub last_interaction_time: Option<DateTime<Utc>>,
}

impl Relationship {
    /// Fresh relationship with the given starting trust.
    pub fn with_trust(trust: f64) -> Self {
        let mut relationship = Self {
            trust: clamp_trust(trust),
            betrayals: 0,
            successes: 0,
            failures: 0,
            interaction_count: 0,
            interactions: Vec::new(),
            class: RelationshipClass::Unknown,
            last_interaction_time: None,
        };
        relationship.class = relationship.classify();
        relationship
    }

    /// Class implied by the current counters and trust.
    pub fn classify(&self) -> RelationshipClass {
        if self.betrayals > 2 {
            RelationshipClass::Enemy
        } else if self.trust >= 80.0 && self.successes > 5 {
            RelationshipClass::TrustedPartner
        } else if self.trust > 60.0 && self.successes > self.failures.saturating_mul(2) {
            RelationshipClass::ReliableContact
        } else if self.trust < 30.0 || self.failures > self.successes.saturating_mul(2) {
            RelationshipClass::Unreliable
        } else if self.interaction_count < 3 {
            RelationshipClass::Unknown
        } else {
            RelationshipClass::Neutral
        }
    }

    /// Threat score: `25·betrayals + 0.5·(100 − trust) + 5·failures`.
    pub fn threat(&self) -> f64 {
        25.0 * f64::from(self.betrayals)
            + 0.5 * (TRUST_MAX - self.trust)
            + 5.0 * f64::from(self.failures)
    }

    /// Share of successful interactions, or `None` with no decided ones.
    pub fn success_rate(&self) -> Option<f64> {
        let decided = self
            .successes
            .saturating_add(self.failures)
            .saturating_add(self.betrayals);
        (decided > 0).then(|| f64::from(self.successes) / f64::from(decided))
    }
}

fn clamp_trust(trust: f64) -> f64 {
    if trust.is_nan() {
        return 50.0;
    }
    let clamped = trust.clamp(TRUST_MIN, TRUST_MAX);
    if (clamped - trust).abs() > f64::EPSILON {
        tracing::debug!(requested = trust, clamped, "trust clamped");
    }
    clamped
}

// ---------------------------------------------------------------------------
// RelationshipGraph
// ---------------------------------------------------------------------------

/// Result of applying one outcome to a relationship.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustUpdate {
    /// Trust before the update.
    pub before: f64,
    /// Trust after the update.
    pub after: f64,
    /// Whether this was the first interaction with the counterparty.
    pub first_interaction: bool,
    /// Class after the update.
    pub class: RelationshipClass,
}

/// Per-agent map from counterparty to relationship.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationshipGraph {
    relationships: BTreeMap<AgentId, Relationship>,
}

impl RelationshipGraph {
    /// Create an empty graph.
    pub const fn new() -> Self {
        Self {
            relationships: BTreeMap::new(),
        }
    }

    /// Relationship with a counterparty, if any.
    pub fn get(&self, counterparty: AgentId) -> Option<&Relationship> {
        self.relationships.get(&counterparty)
    }

    /// Trust in a counterparty, or `default_trust` if unknown.
    pub fn trust(&self, counterparty: AgentId, default_trust: f64) -> f64 {
        self.relationships
            .get(&counterparty)
            .map_or(default_trust, |r| r.trust)
    }

    /// Class of a counterparty, `Unknown` if never met.
    pub fn class(&self, counterparty: AgentId) -> RelationshipClass {
        self.relationships
            .get(&counterparty)
            .map_or(RelationshipClass::Unknown, |r| r.class)
    }

    /// Threat posed by a counterparty; unknown counterparties are scored at
    /// `default_trust` with clean counters.
    pub fn threat(&self, counterparty: AgentId, default_trust: f64) -> f64 {
        self.relationships.get(&counterparty).map_or_else(
            || 0.5 * (TRUST_MAX - default_trust),
            Relationship::threat,
        )
    }

    /// Whether the agent has never interacted with `counterparty`.
    pub fn is_first_interaction(&self, counterparty: AgentId) -> bool {
        self.relationships
            .get(&counterparty)
            .is_none_or(|r| r.interaction_count == 0)
    }

    /// Create or overwrite a relationship with the given trust and no
    /// history. Used for scenario setup and imports.
    pub fn seed_relationship(&mut self, counterparty: AgentId, trust: f64) {
        self.relationships
            .insert(counterparty, Relationship::with_trust(trust));
    }

    /// Shift trust in an existing relationship without counting an
    /// interaction. Returns the new trust, or `None` for strangers.
    pub fn adjust_trust(&mut self, counterparty: AgentId, delta: f64) -> Option<f64> {
        let relationship = self.relationships.get_mut(&counterparty)?;
        relationship.trust = clamp_trust(relationship.trust + delta);
        relationship.class = relationship.classify();
        Some(relationship.trust)
    }

    /// Apply an outcome to the relationship with `counterparty`, creating
    /// it on first contact.
    pub fn apply(
        &mut self,
        counterparty: AgentId,
        outcome: OutcomeClass,
        now: DateTime<Utc>,
        default_trust: f64,
        history_cap: usize,
    ) -> TrustUpdate {
        let relationship = self
            .relationships
            .entry(counterparty)
            .or_insert_with(|| Relationship::with_trust(default_trust));

        let first_interaction = relationship.interaction_count == 0;
        let before = relationship.trust;
        relationship.trust = clamp_trust(before + outcome.trust_delta());

        match outcome {
            OutcomeClass::Successful | OutcomeClass::Cooperation => {
                relationship.successes = relationship.successes.saturating_add(1);
            }
            OutcomeClass::Failed => {
                relationship.failures = relationship.failures.saturating_add(1);
            }
            OutcomeClass::Betrayal => {
                relationship.betrayals = relationship.betrayals.saturating_add(1);
            }
            OutcomeClass::NoOutcome => {}
        }
        relationship.interaction_count = relationship.interaction_count.saturating_add(1);
        relationship.interactions.push(Interaction {
            outcome,
            timestamp: now,
            trust_after: relationship.trust,
        });
        let excess = relationship.interactions.len().saturating_sub(history_cap);
        if excess > 0 {
            relationship.interactions.drain(..excess);
        }
        relationship.last_interaction_time = Some(now);

        let previous_class = relationship.class;
        relationship.class = relationship.classify();
        if relationship.class != previous_class {
            tracing::debug!(
                %counterparty,
                from = ?previous_class,
                to = ?relationship.class,
                trust = relationship.trust,
                "relationship class changed"
            );
        }

        TrustUpdate {
            before,
            after: relationship.trust,
            first_interaction,
            class: relationship.class,
        }
    }

    /// Iterate over `(counterparty, relationship)` in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&AgentId, &Relationship)> {
        self.relationships.iter()
    }

    /// Number of known counterparties.
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    /// Whether no counterparty is known.
    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// Mean trust over known counterparties.
    pub fn mean_trust(&self) -> Option<f64> {
        if self.relationships.is_empty() {
            return None;
        }
        let total: f64 = self.relationships.values().map(|r| r.trust).sum();
        let n = u32::try_from(self.relationships.len()).unwrap_or(u32::MAX);
        Some(total / f64::from(n))
    }

    /// Counterparties trusted at or above `threshold`.
    pub fn trusted(&self, threshold: f64) -> impl Iterator<Item = AgentId> + '_ {
        self.relationships
            .iter()
            .filter(move |(_, r)| r.trust >= threshold)
            .map(|(id, _)| *id)
    }

    /// Drop relationships with counterparties for which `keep` is false.
    pub fn retain(&mut self, mut keep: impl FnMut(AgentId) -> bool) {
        self.relationships.retain(|id, _| keep(*id));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mercator_types::IdSource;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH
    }

    fn counterparty() -> AgentId {
        AgentId::next_from(&mut IdSource::new(11))
    }

    #[test]
    fn unknown_counterparty_uses_default_trust() {
        let graph = RelationshipGraph::new();
        let c = counterparty();
        assert!((graph.trust(c, 50.0) - 50.0).abs() < f64::EPSILON);
        assert_eq!(graph.class(c), RelationshipClass::Unknown);
        assert!((graph.threat(c, 50.0) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn betrayal_drops_trust_by_25() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        graph.seed_relationship(c, 75.0);
        let update = graph.apply(c, OutcomeClass::Betrayal, now(), 50.0, 50);
        assert!((update.after - 50.0).abs() < f64::EPSILON);
        assert_eq!(graph.get(c).unwrap().betrayals, 1);
        assert_eq!(update.class, RelationshipClass::Unknown);
    }

    #[test]
    fn trust_never_leaves_bounds() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        for _ in 0..10 {
            graph.apply(c, OutcomeClass::Betrayal, now(), 50.0, 50);
        }
        assert!(graph.trust(c, 50.0).abs() < f64::EPSILON);
        for _ in 0..30 {
            graph.apply(c, OutcomeClass::Cooperation, now(), 50.0, 50);
        }
        assert!((graph.trust(c, 50.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn class_rules_in_order() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        for _ in 0..6 {
            graph.apply(c, OutcomeClass::Successful, now(), 50.0, 50);
        }
        assert_eq!(graph.class(c), RelationshipClass::TrustedPartner);

        for _ in 0..3 {
            graph.apply(c, OutcomeClass::Betrayal, now(), 50.0, 50);
        }
        assert_eq!(graph.class(c), RelationshipClass::Enemy);
    }

    #[test]
    fn reliable_then_unreliable() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        for _ in 0..3 {
            graph.apply(c, OutcomeClass::Successful, now(), 50.0, 50);
        }
        assert_eq!(graph.class(c), RelationshipClass::ReliableContact);

        let d = AgentId::next_from(&mut IdSource::new(12));
        for _ in 0..3 {
            graph.apply(d, OutcomeClass::Failed, now(), 50.0, 50);
        }
        assert_eq!(graph.class(d), RelationshipClass::Unreliable);
    }

    #[test]
    fn threat_formula() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        graph.seed_relationship(c, 60.0);
        graph.apply(c, OutcomeClass::Failed, now(), 50.0, 50);
        graph.apply(c, OutcomeClass::Betrayal, now(), 50.0, 50);
        // trust 60 - 3 - 25 = 32
        let expected = 25.0 + 0.5 * 68.0 + 5.0;
        assert!((graph.threat(c, 50.0) - expected).abs() < 1e-9);
    }

    #[test]
    fn history_is_bounded() {
        let mut graph = RelationshipGraph::new();
        let c = counterparty();
        for _ in 0..10 {
            graph.apply(c, OutcomeClass::NoOutcome, now(), 50.0, 4);
        }
        let relationship = graph.get(c).unwrap();
        assert_eq!(relationship.interactions.len(), 4);
        assert_eq!(relationship.interaction_count, 10);
        assert!((relationship.trust - 50.0).abs() < f64::EPSILON);
    }
}
