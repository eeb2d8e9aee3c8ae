//! Agent memory: an append-only experience log with decay, a tag index,
//! similarity queries and consolidation.
//!
//! ## Recording
//!
//! [`MemoryStore::record`] appends an experience with a fresh id and the
//! caller's timestamp. A decision records a *pending* experience; the
//! learning loop resolves it exactly once through [`MemoryStore::resolve`].
//! Apart from that single resolution experiences are never modified.
//!
//! ## Querying
//!
//! [`MemoryStore::query`] ranks resolved experiences by `relevance * weight`:
//!
//! - `relevance = (40·type_match + 30·counterparty_match + 20·market_similarity) · exp(-age_days/τ)`
//! - `weight = (significance/50) · (1 + impact/200) · tag_weight`, where
//!   trauma counts ×2.0, success ×1.1 and emotional experiences
//!   (impact above 70) ×1.3.
//!
//! ## Consolidation
//!
//! [`MemoryStore::consolidate`] folds groups of at least four resolved
//! experiences sharing a coarse signature into one lesson, then drops old
//! experiences that are neither significant nor emotionally heavy. Running
//! it twice without new records leaves the store unchanged.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use mercator_types::{
    AgentId, ExperienceId, ExperienceKind, IdSource, MarketState, OutcomeClass, SituationType,
    StrategyId, TradeAction, splitmix64,
};

use crate::config::AgentConfig;
use crate::error::AgentError;

/// Tag carried by trauma experiences.
pub const TAG_TRAUMA: &str = "trauma";
/// Tag carried by successful experiences.
pub const TAG_SUCCESSFUL: &str = "successful";
/// Tag carried by failed experiences.
pub const TAG_FAILED: &str = "failed";
/// Tag carried by emotionally heavy experiences.
pub const TAG_EMOTIONAL: &str = "emotional";
/// Tag carried by consolidated lessons.
pub const TAG_LESSON: &str = "lesson";

/// Impact above which an experience counts as emotional.
const EMOTIONAL_IMPACT: f64 = 70.0;

// ---------------------------------------------------------------------------
// Experience
// ---------------------------------------------------------------------------

/// Whether the experience still awaits its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceStatus {
    /// Recorded by a decision, outcome unknown.
    Pending,
    /// Outcome known.
    Resolved,
}

/// Summary stored in a consolidated lesson.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSummary {
    /// Number of experiences folded into the lesson.
    pub members: u32,
    /// How many of them were successful.
    pub successes: u32,
}

/// Structured content of an experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperiencePayload {
    /// Situation the experience arose from.
    pub situation_type: Option<SituationType>,
    /// Action taken.
    pub action: Option<TradeAction>,
    /// Counterparty involved.
    pub counterparty: Option<AgentId>,
    /// Market indicators at the time.
    pub market: MarketState,
    /// Situation intensity (0--100).
    pub intensity: f64,
    /// Strategy consulted by the decision.
    pub strategy_id: Option<StrategyId>,
    /// Outcome class, once resolved.
    pub outcome: Option<OutcomeClass>,
    /// Whether the outcome was a success, once resolved.
    pub success: Option<bool>,
    /// Profit or loss, once resolved.
    pub profit_loss: Decimal,
    /// Present on consolidated lessons.
    pub lesson: Option<LessonSummary>,
}

impl ExperiencePayload {
    /// Payload for a decision whose outcome is not yet known.
    pub fn decision(
        situation_type: SituationType,
        action: TradeAction,
        counterparty: Option<AgentId>,
        market: MarketState,
        intensity: f64,
        strategy_id: Option<StrategyId>,
    ) -> Self {
        Self {
            situation_type: Some(situation_type),
            action: Some(action),
            counterparty,
            market,
            intensity,
            strategy_id,
            outcome: None,
            success: None,
            profit_loss: Decimal::ZERO,
            lesson: None,
        }
    }
}

/// A stored experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experience {
    /// Unique id within the agent.
    pub id: ExperienceId,
    /// When the experience was recorded.
    pub timestamp: DateTime<Utc>,
    /// Category.
    pub kind: ExperienceKind,
    /// Structured content.
    pub payload: ExperiencePayload,
    /// Emotional impact (0--100).
    pub emotional_impact: f64,
    /// Significance (0--100).
    pub significance: f64,
    /// Tags.
    pub tags: BTreeSet<String>,
    /// Decay rate in `(0, 1]`.
    pub decay_rate: f64,
    /// Pending or resolved.
    pub status: ExperienceStatus,
    /// Classified as trauma.
    #[serde(default)]
    pub trauma: bool,
}

impl Experience {
    /// Age in fractional days at `now` (never negative).
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let seconds = (now - self.timestamp).num_seconds().max(0);
        seconds_to_days(seconds)
    }

    /// Whether the outcome is still unknown.
    pub fn is_pending(&self) -> bool {
        self.status == ExperienceStatus::Pending
    }

    /// Whether the experience is a consolidated lesson.
    pub const fn is_lesson(&self) -> bool {
        self.payload.lesson.is_some()
    }

    /// Recall weight independent of the query.
    pub fn weight(&self) -> f64 {
        let mut tag_weight = 1.0;
        if self.trauma || self.tags.contains(TAG_TRAUMA) {
            tag_weight *= 2.0;
        }
        if self.tags.contains(TAG_SUCCESSFUL) {
            tag_weight *= 1.1;
        }
        if self.emotional_impact > EMOTIONAL_IMPACT {
            tag_weight *= 1.3;
        }
        (self.significance / 50.0) * (1.0 + self.emotional_impact / 200.0) * tag_weight
    }

    /// `(occurrences, successes)` this experience contributes to pattern
    /// statistics; lessons count every folded member.
    pub fn pattern_counts(&self) -> (u32, u32) {
        if let Some(lesson) = self.payload.lesson {
            return (lesson.members, lesson.successes);
        }
        match self.payload.success {
            Some(true) => (1, 1),
            Some(false) => (1, 0),
            None => (0, 0),
        }
    }

    /// Coarse signature used to group experiences for consolidation.
    fn consolidation_signature(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}",
            self.kind.as_str(),
            self.payload.situation_type.map_or("-", SituationType::as_str),
            self.payload.action.map_or("-", TradeAction::as_str),
            self.payload
                .counterparty
                .map_or_else(|| "-".to_owned(), |c| c.to_string()),
            self.payload.market.volatility_bucket(),
        )
    }
}

/// Convert whole seconds to fractional days.
#[allow(clippy::cast_precision_loss)]
fn seconds_to_days(seconds: i64) -> f64 {
    seconds as f64 / 86_400.0
}

/// Signature of a repeatable pattern: situation, action and volatility
/// bucket. Experiences sharing it feed strategy creation.
pub fn pattern_signature(
    situation_type: SituationType,
    action: TradeAction,
    market: &MarketState,
) -> String {
    format!(
        "{}:{}:{}",
        situation_type.as_str(),
        action.as_str(),
        market.volatility_bucket()
    )
}

/// Tag under which an experience is indexed for its pattern.
pub fn pattern_tag(signature: &str) -> String {
    format!("pattern:{signature}")
}

/// Input to [`MemoryStore::record`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExperienceDraft {
    /// Category.
    pub kind: ExperienceKind,
    /// Structured content.
    pub payload: ExperiencePayload,
    /// Emotional impact (0--100).
    pub emotional_impact: f64,
    /// Significance (0--100).
    pub significance: f64,
    /// Tags.
    pub tags: BTreeSet<String>,
    /// Decay rate in `(0, 1]`.
    pub decay_rate: f64,
    /// Record as pending (awaiting an outcome).
    pub pending: bool,
}

/// Outcome data written when a pending experience is resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Outcome class.
    pub outcome: OutcomeClass,
    /// Whether the outcome was a success.
    pub success: bool,
    /// Profit or loss.
    pub profit_loss: Decimal,
    /// Significance assigned.
    pub significance: f64,
    /// Decay rate assigned.
    pub decay_rate: f64,
    /// Emotional impact of the outcome.
    pub emotional_impact: f64,
    /// Classified as trauma.
    pub trauma: bool,
    /// Extra tags to add.
    pub tags: Vec<String>,
}

/// What a query matches against.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryQuery {
    /// Situation type to match.
    pub situation_type: Option<SituationType>,
    /// Counterparty to match.
    pub counterparty: Option<AgentId>,
    /// Current market indicators.
    pub market: MarketState,
    /// Query time.
    pub now: DateTime<Utc>,
}

/// A query hit with its scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredExperience<'a> {
    /// The experience.
    pub experience: &'a Experience,
    /// Context relevance after time decay.
    pub relevance: f64,
    /// Query-independent weight.
    pub weight: f64,
    /// `relevance * weight`.
    pub score: f64,
}

/// What a consolidation pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsolidationRecord {
    /// Experiences before the pass.
    pub original_count: usize,
    /// Experiences after the pass.
    pub consolidated_count: usize,
    /// Experiences dropped by the retention rule.
    pub dropped: usize,
    /// Lessons created.
    pub lessons_created: usize,
    /// Experiences folded into lessons.
    pub folded: usize,
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// Per-agent experience store.
///
/// Serializes as the plain experience list; the tag index is rebuilt on
/// load.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Experience>", into = "Vec<Experience>")]
pub struct MemoryStore {
    /// Experiences in insertion order.
    experiences: Vec<Experience>,
    /// Tag to ids carrying it.
    tag_index: BTreeMap<String, BTreeSet<ExperienceId>>,
}

impl From<Vec<Experience>> for MemoryStore {
    fn from(experiences: Vec<Experience>) -> Self {
        let mut store = Self {
            experiences,
            tag_index: BTreeMap::new(),
        };
        store.rebuild_index();
        store
    }
}

impl From<MemoryStore> for Vec<Experience> {
    fn from(store: MemoryStore) -> Self {
        store.experiences
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub const fn new() -> Self {
        Self {
            experiences: Vec::new(),
            tag_index: BTreeMap::new(),
        }
    }

    /// Number of stored experiences.
    pub fn len(&self) -> usize {
        self.experiences.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.experiences.is_empty()
    }

    /// All experiences in insertion order.
    pub fn experiences(&self) -> &[Experience] {
        &self.experiences
    }

    /// Look up an experience by id.
    pub fn get(&self, id: ExperienceId) -> Option<&Experience> {
        self.experiences.iter().find(|e| e.id == id)
    }

    /// Whether a pending experience exists for `id`.
    pub fn is_pending(&self, id: ExperienceId) -> bool {
        self.get(id).is_some_and(Experience::is_pending)
    }

    /// Number of pending experiences.
    pub fn pending_count(&self) -> usize {
        self.experiences.iter().filter(|e| e.is_pending()).count()
    }

    /// Experiences carrying a tag, in insertion order.
    pub fn with_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = &'a Experience> + use<'a> {
        let ids = self.tag_index.get(tag);
        self.experiences
            .iter()
            .filter(move |e| ids.is_some_and(|set| set.contains(&e.id)))
    }

    /// `(occurrences, successes)` of a pattern across raw experiences and
    /// lessons.
    pub fn pattern_stats(&self, signature: &str) -> (u32, u32) {
        self.with_tag(&pattern_tag(signature))
            .filter(|e| !e.is_pending())
            .map(Experience::pattern_counts)
            .fold((0_u32, 0_u32), |(n, s), (dn, ds)| {
                (n.saturating_add(dn), s.saturating_add(ds))
            })
    }

    /// Append an experience, assigning it an id from `ids` and the time
    /// `now`.
    ///
    /// When the store is at its cap a consolidation pass runs first; if the
    /// store is still full the call fails with [`AgentError::MemoryFull`]
    /// and nothing is recorded.
    pub fn record(
        &mut self,
        draft: ExperienceDraft,
        ids: &mut IdSource,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Result<ExperienceId, AgentError> {
        if self.experiences.len() >= config.memory_cap {
            self.consolidate(now, config);
            if self.experiences.len() >= config.memory_cap {
                return Err(AgentError::MemoryFull {
                    cap: config.memory_cap,
                    len: self.experiences.len(),
                });
            }
        }

        let id = ExperienceId::next_from(ids);
        let experience = Experience {
            id,
            timestamp: now,
            kind: draft.kind,
            payload: draft.payload,
            emotional_impact: draft.emotional_impact.clamp(0.0, 100.0),
            significance: draft.significance.clamp(0.0, 100.0),
            tags: draft.tags,
            decay_rate: draft.decay_rate.clamp(0.01, 1.0),
            status: if draft.pending {
                ExperienceStatus::Pending
            } else {
                ExperienceStatus::Resolved
            },
            trauma: false,
        };
        self.index(&experience);
        self.experiences.push(experience);
        Ok(id)
    }

    /// Resolve a pending experience exactly once.
    ///
    /// Fails with [`AgentError::UnknownSession`] if `id` is unknown or
    /// already resolved; the store is unchanged in that case.
    pub fn resolve(
        &mut self,
        id: ExperienceId,
        resolution: Resolution,
    ) -> Result<&Experience, AgentError> {
        let position = self
            .experiences
            .iter()
            .position(|e| e.id == id && e.is_pending())
            .ok_or(AgentError::UnknownSession(id))?;

        let mut added_tags = resolution.tags;
        let Some(experience) = self.experiences.get_mut(position) else {
            return Err(AgentError::UnknownSession(id));
        };
        experience.status = ExperienceStatus::Resolved;
        experience.payload.outcome = Some(resolution.outcome);
        experience.payload.success =
            (resolution.outcome != OutcomeClass::NoOutcome).then_some(resolution.success);
        experience.payload.profit_loss = resolution.profit_loss;
        experience.significance = resolution.significance.clamp(0.0, 100.0);
        experience.decay_rate = resolution.decay_rate.clamp(0.01, 1.0);
        experience.emotional_impact = resolution.emotional_impact.clamp(0.0, 100.0);
        experience.trauma = resolution.trauma;
        if resolution.trauma {
            added_tags.push(TAG_TRAUMA.to_owned());
        }
        if experience.emotional_impact > EMOTIONAL_IMPACT {
            added_tags.push(TAG_EMOTIONAL.to_owned());
        }
        for tag in &added_tags {
            experience.tags.insert(tag.clone());
            self.tag_index.entry(tag.clone()).or_default().insert(id);
        }

        self.experiences
            .get(position)
            .ok_or(AgentError::UnknownSession(id))
    }

    /// Top `limit` resolved experiences for the query, best first.
    ///
    /// Ties keep insertion order, so results are deterministic.
    pub fn query(
        &self,
        query: &MemoryQuery,
        limit: usize,
        config: &AgentConfig,
    ) -> Vec<ScoredExperience<'_>> {
        let mut hits: Vec<ScoredExperience<'_>> = self
            .experiences
            .iter()
            .filter(|e| !e.is_pending())
            .map(|e| {
                let relevance = relevance(e, query, config.memory_decay_days);
                let weight = e.weight();
                ScoredExperience {
                    experience: e,
                    relevance,
                    weight,
                    score: relevance * weight,
                }
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(limit);
        hits
    }

    /// Fold similar experiences into lessons, then apply the retention rule.
    ///
    /// Grouping only considers resolved, non-trauma, non-lesson experiences.
    /// A lesson's id is derived from its members' ids, so the pass is a pure
    /// function of the store and `now`.
    pub fn consolidate(&mut self, now: DateTime<Utc>, config: &AgentConfig) -> ConsolidationRecord {
        let original_count = self.experiences.len();

        // Group candidate experiences by signature.
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, e) in self.experiences.iter().enumerate() {
            if e.is_pending() || e.trauma || e.is_lesson() {
                continue;
            }
            groups.entry(e.consolidation_signature()).or_default().push(i);
        }

        let mut folded: BTreeSet<usize> = BTreeSet::new();
        let mut lessons: Vec<(usize, Experience)> = Vec::new();
        for members in groups.values() {
            if members.len() < config.consolidation_min_group {
                continue;
            }
            let member_refs: Vec<&Experience> = members
                .iter()
                .filter_map(|&i| self.experiences.get(i))
                .collect();
            if let (Some(lesson), Some(&last)) = (build_lesson(&member_refs), members.last()) {
                lessons.push((last, lesson));
                folded.extend(members.iter().copied());
            }
        }

        // Rebuild in insertion order, placing each lesson at its latest member.
        let lessons_created = lessons.len();
        let mut lesson_at: BTreeMap<usize, Experience> = lessons.into_iter().collect();
        let previous = std::mem::take(&mut self.experiences);
        let mut rebuilt = Vec::with_capacity(previous.len());
        for (i, e) in previous.into_iter().enumerate() {
            if let Some(lesson) = lesson_at.remove(&i) {
                rebuilt.push(lesson);
            }
            if !folded.contains(&i) {
                rebuilt.push(e);
            }
        }

        // Retention: drop old experiences that are neither significant nor heavy.
        let retention_days = f64::from(config.memory_retention_days);
        let before_drop = rebuilt.len();
        rebuilt.retain(|e| {
            e.is_pending()
                || e.age_days(now) <= retention_days
                || e.significance >= config.retention_significance
                || e.emotional_impact >= config.retention_impact
        });
        let dropped = before_drop.saturating_sub(rebuilt.len());

        self.experiences = rebuilt;
        self.rebuild_index();

        let record = ConsolidationRecord {
            original_count,
            consolidated_count: self.experiences.len(),
            dropped,
            lessons_created,
            folded: folded.len(),
        };
        if dropped > 0 || lessons_created > 0 {
            tracing::debug!(
                original_count,
                consolidated_count = record.consolidated_count,
                dropped,
                lessons_created,
                folded = record.folded,
                "memory consolidation"
            );
        }
        record
    }

    /// The newest `limit` experiences, oldest first.
    pub fn newest(&self, limit: usize) -> Vec<Experience> {
        let skip = self.experiences.len().saturating_sub(limit);
        self.experiences.iter().skip(skip).cloned().collect()
    }

    fn index(&mut self, experience: &Experience) {
        for tag in &experience.tags {
            self.tag_index
                .entry(tag.clone())
                .or_default()
                .insert(experience.id);
        }
    }

    fn rebuild_index(&mut self) {
        let mut index: BTreeMap<String, BTreeSet<ExperienceId>> = BTreeMap::new();
        for e in &self.experiences {
            for tag in &e.tags {
                index.entry(tag.clone()).or_default().insert(e.id);
            }
        }
        self.tag_index = index;
    }
}

/// Context relevance of an experience, decayed by age.
fn relevance(experience: &Experience, query: &MemoryQuery, decay_days: f64) -> f64 {
    let type_match = match (experience.payload.situation_type, query.situation_type) {
        (Some(a), Some(b)) if a == b => 40.0,
        _ => 0.0,
    };
    let counterparty_match = match (experience.payload.counterparty, query.counterparty) {
        (Some(a), Some(b)) if a == b => 30.0,
        _ => 0.0,
    };
    let market = 20.0 * experience.payload.market.similarity(&query.market);
    let age = experience.age_days(query.now);
    (type_match + counterparty_match + market) * (-age / decay_days).exp()
}

/// Build a lesson from a group of similar experiences.
fn build_lesson(members: &[&Experience]) -> Option<Experience> {
    let latest = members.iter().max_by_key(|e| e.timestamp)?;
    let count = u32::try_from(members.len()).unwrap_or(u32::MAX);
    let n = f64::from(count);

    let (occurrences, successes) = members
        .iter()
        .map(|e| e.pattern_counts())
        .fold((0_u32, 0_u32), |(a, b), (x, y)| {
            (a.saturating_add(x), b.saturating_add(y))
        });

    let mut tags: BTreeSet<String> = members
        .first()
        .map(|e| e.tags.clone())
        .unwrap_or_default();
    for e in members.iter().skip(1) {
        tags.retain(|t| e.tags.contains(t));
    }
    tags.remove(TAG_EMOTIONAL);
    tags.insert(TAG_LESSON.to_owned());
    if successes.saturating_mul(2) > occurrences {
        tags.insert(TAG_SUCCESSFUL.to_owned());
    } else {
        tags.remove(TAG_SUCCESSFUL);
    }

    let total_pnl: Decimal = members.iter().map(|e| e.payload.profit_loss).sum();
    let mut seed = 0_u64;
    for e in members {
        let (hi, lo) = e.id.into_inner().as_u64_pair();
        seed = splitmix64(seed ^ hi ^ lo.rotate_left(29));
    }

    Some(Experience {
        id: ExperienceId::next_from(&mut IdSource::new(seed)),
        timestamp: latest.timestamp,
        kind: latest.kind,
        payload: ExperiencePayload {
            situation_type: latest.payload.situation_type,
            action: latest.payload.action,
            counterparty: latest.payload.counterparty,
            market: latest.payload.market,
            intensity: members.iter().map(|e| e.payload.intensity).sum::<f64>() / n,
            strategy_id: None,
            outcome: latest.payload.outcome,
            success: Some(successes.saturating_mul(2) > occurrences),
            profit_loss: total_pnl,
            lesson: Some(LessonSummary {
                members: occurrences,
                successes,
            }),
        },
        emotional_impact: members.iter().map(|e| e.emotional_impact).sum::<f64>() / n,
        significance: members.iter().map(|e| e.significance).sum::<f64>() / n,
        tags,
        decay_rate: members.iter().map(|e| e.decay_rate).sum::<f64>() / n,
        status: ExperienceStatus::Resolved,
        trauma: false,
    })
}

/// Default decay rate for a freshly recorded experience of the given
/// significance: significant experiences fade more slowly.
pub fn decay_rate_for(significance: f64) -> f64 {
    (1.0 - 0.9 * significance.clamp(0.0, 100.0) / 100.0).clamp(0.05, 1.0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(10_000)
    }

    fn resolved_draft(
        situation: SituationType,
        counterparty: Option<AgentId>,
        significance: f64,
        impact: f64,
        success: bool,
    ) -> ExperienceDraft {
        let market = MarketState::new(40.0, 50.0, 60.0);
        let mut payload = ExperiencePayload::decision(
            situation,
            TradeAction::Accept,
            counterparty,
            market,
            50.0,
            None,
        );
        payload.success = Some(success);
        payload.outcome = Some(if success {
            OutcomeClass::Successful
        } else {
            OutcomeClass::Failed
        });
        let mut tags = BTreeSet::new();
        tags.insert(pattern_tag(&pattern_signature(
            situation,
            TradeAction::Accept,
            &market,
        )));
        if success {
            tags.insert(TAG_SUCCESSFUL.to_owned());
        }
        ExperienceDraft {
            kind: ExperienceKind::Trade,
            payload,
            emotional_impact: impact,
            significance,
            tags,
            decay_rate: 0.5,
            pending: false,
        }
    }

    fn query_at(now: DateTime<Utc>, counterparty: Option<AgentId>) -> MemoryQuery {
        MemoryQuery {
            situation_type: Some(SituationType::TradeOpportunity),
            counterparty,
            market: MarketState::new(40.0, 50.0, 60.0),
            now,
        }
    }

    #[test]
    fn record_assigns_unique_ids() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(1);
        let config = AgentConfig::default();
        let a = store
            .record(resolved_draft(SituationType::Negotiation, None, 60.0, 60.0, true), &mut ids, t0(), &config)
            .unwrap();
        let b = store
            .record(resolved_draft(SituationType::Negotiation, None, 60.0, 60.0, true), &mut ids, t0(), &config)
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(a).map(|e| e.timestamp), Some(t0()));
    }

    #[test]
    fn relevance_decays_with_age() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(2);
        let config = AgentConfig::default();
        let c = AgentId::next_from(&mut ids);
        store
            .record(
                resolved_draft(SituationType::TradeOpportunity, Some(c), 60.0, 60.0, true),
                &mut ids,
                t0(),
                &config,
            )
            .unwrap();

        let fresh = store.query(&query_at(t0(), Some(c)), 5, &config);
        let later = store.query(&query_at(t0() + Duration::days(31), Some(c)), 5, &config);
        let ratio = later[0].relevance / fresh[0].relevance;
        assert!((ratio - (-31.0_f64 / 30.0).exp()).abs() < 1e-9);
        assert!((fresh[0].relevance - 90.0).abs() < 1e-9);
    }

    #[test]
    fn weight_applies_tag_boosts() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(3);
        let config = AgentConfig::default();
        let id = store
            .record(resolved_draft(SituationType::Competition, None, 50.0, 80.0, true), &mut ids, t0(), &config)
            .unwrap();
        let weight = store.get(id).unwrap().weight();
        // (50/50) * (1 + 80/200) * 1.1 * 1.3
        assert!((weight - 1.4 * 1.1 * 1.3).abs() < 1e-9);
    }

    #[test]
    fn pending_is_resolved_once() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(4);
        let config = AgentConfig::default();
        let mut draft = resolved_draft(SituationType::Negotiation, None, 50.0, 20.0, true);
        draft.pending = true;
        let id = store.record(draft, &mut ids, t0(), &config).unwrap();
        assert!(store.is_pending(id));

        let resolution = Resolution {
            outcome: OutcomeClass::Successful,
            success: true,
            profit_loss: Decimal::new(250, 0),
            significance: 65.0,
            decay_rate: 0.4,
            emotional_impact: 30.0,
            trauma: false,
            tags: vec![TAG_SUCCESSFUL.to_owned()],
        };
        assert!(store.resolve(id, resolution.clone()).is_ok());
        assert_eq!(
            store.resolve(id, resolution).unwrap_err(),
            AgentError::UnknownSession(id)
        );
    }

    #[test]
    fn pending_experiences_are_not_queried() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(5);
        let config = AgentConfig::default();
        let mut draft = resolved_draft(SituationType::TradeOpportunity, None, 50.0, 20.0, true);
        draft.pending = true;
        store.record(draft, &mut ids, t0(), &config).unwrap();
        assert!(store.query(&query_at(t0(), None), 5, &config).is_empty());
    }

    #[test]
    fn consolidation_folds_groups_and_is_idempotent() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(6);
        let config = AgentConfig::default();
        for i in 0..5 {
            store
                .record(
                    resolved_draft(SituationType::TradeOpportunity, None, 40.0, 20.0, i % 5 != 0),
                    &mut ids,
                    t0(),
                    &config,
                )
                .unwrap();
        }
        store
            .record(resolved_draft(SituationType::Negotiation, None, 40.0, 20.0, true), &mut ids, t0(), &config)
            .unwrap();

        let first = store.consolidate(t0(), &config);
        assert_eq!(first.lessons_created, 1);
        assert_eq!(first.folded, 5);
        assert_eq!(store.len(), 2);
        let signature = pattern_signature(
            SituationType::TradeOpportunity,
            TradeAction::Accept,
            &MarketState::new(40.0, 50.0, 60.0),
        );
        assert_eq!(store.pattern_stats(&signature), (5, 4));

        let snapshot = store.clone();
        let second = store.consolidate(t0(), &config);
        assert_eq!(second.lessons_created, 0);
        assert_eq!(second.dropped, 0);
        assert_eq!(store, snapshot);
    }

    #[test]
    fn retention_drops_only_old_light_experiences() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(7);
        let config = AgentConfig::default();
        let light = store
            .record(resolved_draft(SituationType::Competition, None, 30.0, 20.0, true), &mut ids, t0(), &config)
            .unwrap();
        let significant = store
            .record(resolved_draft(SituationType::Negotiation, None, 75.0, 20.0, true), &mut ids, t0(), &config)
            .unwrap();
        let heavy = store
            .record(resolved_draft(SituationType::MarketCrash, None, 30.0, 85.0, false), &mut ids, t0(), &config)
            .unwrap();

        let record = store.consolidate(t0() + Duration::days(91), &config);
        assert_eq!(record.dropped, 1);
        assert!(store.get(light).is_none());
        assert!(store.get(significant).is_some());
        assert!(store.get(heavy).is_some());
    }

    #[test]
    fn full_store_rejects_after_consolidation() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(8);
        let config = AgentConfig {
            memory_cap: 2,
            ..AgentConfig::default()
        };
        for situation in [SituationType::Negotiation, SituationType::Competition] {
            store
                .record(resolved_draft(situation, None, 90.0, 20.0, true), &mut ids, t0(), &config)
                .unwrap();
        }
        let err = store
            .record(resolved_draft(SituationType::MarketCrash, None, 90.0, 20.0, true), &mut ids, t0(), &config)
            .unwrap_err();
        assert_eq!(err, AgentError::MemoryFull { cap: 2, len: 2 });
    }

    #[test]
    fn serde_roundtrip_rebuilds_index() {
        let mut store = MemoryStore::new();
        let mut ids = IdSource::new(9);
        let config = AgentConfig::default();
        store
            .record(resolved_draft(SituationType::Negotiation, None, 60.0, 20.0, true), &mut ids, t0(), &config)
            .unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let back: MemoryStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
        assert_eq!(back.with_tag(TAG_SUCCESSFUL).count(), 1);
    }
}
