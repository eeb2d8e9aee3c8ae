//! Enumeration types for the Mercator simulation.
//!
//! Closed sets used across the agent, population and engine layers. Every
//! enum serializes as `snake_case` so external collaborators see the same
//! names the configuration file uses.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Experiences
// ---------------------------------------------------------------------------

/// Category of a stored experience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ExperienceKind {
    /// A trade decision and (eventually) its outcome.
    Trade,
    /// A counterparty broke an agreement.
    Betrayal,
    /// A cooperative arrangement with a counterparty.
    Partnership,
    /// A recognised recurring market or social pattern.
    Pattern,
    /// A consolidated lesson summarising several experiences.
    Meta,
}

impl ExperienceKind {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trade => "trade",
            Self::Betrayal => "betrayal",
            Self::Partnership => "partnership",
            Self::Pattern => "pattern",
            Self::Meta => "meta",
        }
    }
}

// ---------------------------------------------------------------------------
// Situations and actions
// ---------------------------------------------------------------------------

/// The kind of situation an agent is asked to decide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SituationType {
    /// A chance to open or close a position.
    TradeOpportunity,
    /// A counterparty proposes to cooperate on a deal.
    CooperationOffer,
    /// Terms are being negotiated with a counterparty.
    Negotiation,
    /// Prices are collapsing.
    MarketCrash,
    /// There are signs a counterparty may defect.
    BetrayalRisk,
    /// Another trader competes for the same opportunity.
    Competition,
    /// A long-term partnership is proposed.
    PartnershipProposal,
    /// Someone asks for (or offers) market information.
    InformationRequest,
}

impl SituationType {
    /// All situation types in declaration order.
    pub const ALL: [Self; 8] = [
        Self::TradeOpportunity,
        Self::CooperationOffer,
        Self::Negotiation,
        Self::MarketCrash,
        Self::BetrayalRisk,
        Self::Competition,
        Self::PartnershipProposal,
        Self::InformationRequest,
    ];

    /// Stable lowercase name, also used as the memory tag for the type.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TradeOpportunity => "trade_opportunity",
            Self::CooperationOffer => "cooperation_offer",
            Self::Negotiation => "negotiation",
            Self::MarketCrash => "market_crash",
            Self::BetrayalRisk => "betrayal_risk",
            Self::Competition => "competition",
            Self::PartnershipProposal => "partnership_proposal",
            Self::InformationRequest => "information_request",
        }
    }

    /// Candidate actions for this situation, in action-id order.
    pub const fn candidate_actions(self) -> &'static [TradeAction] {
        match self {
            Self::TradeOpportunity => &[
                TradeAction::Buy,
                TradeAction::Sell,
                TradeAction::Hold,
                TradeAction::Investigate,
            ],
            Self::CooperationOffer | Self::PartnershipProposal => &[
                TradeAction::Accept,
                TradeAction::Reject,
                TradeAction::Negotiate,
            ],
            Self::Negotiation => &[
                TradeAction::Accept,
                TradeAction::Reject,
                TradeAction::Negotiate,
                TradeAction::Wait,
            ],
            Self::MarketCrash => &[
                TradeAction::Buy,
                TradeAction::Sell,
                TradeAction::Hold,
                TradeAction::Wait,
            ],
            Self::BetrayalRisk => &[
                TradeAction::Cooperate,
                TradeAction::Defect,
                TradeAction::Investigate,
                TradeAction::Wait,
            ],
            Self::Competition => &[
                TradeAction::Buy,
                TradeAction::Cooperate,
                TradeAction::Defect,
                TradeAction::Wait,
            ],
            Self::InformationRequest => &[
                TradeAction::Accept,
                TradeAction::Reject,
                TradeAction::Investigate,
            ],
        }
    }

    /// The experience kind a decision in this situation is filed under.
    pub const fn experience_kind(self) -> ExperienceKind {
        match self {
            Self::CooperationOffer | Self::PartnershipProposal => ExperienceKind::Partnership,
            Self::BetrayalRisk => ExperienceKind::Betrayal,
            _ => ExperienceKind::Trade,
        }
    }
}

/// An action a trader can take. Declaration order is the action id used
/// for deterministic tie-breaking (lower id wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TradeAction {
    /// Accept an offer.
    Accept,
    /// Reject an offer.
    Reject,
    /// Counter-propose.
    Negotiate,
    /// Open or increase a long position.
    Buy,
    /// Close or short a position.
    Sell,
    /// Keep the current position.
    Hold,
    /// Work with the counterparty.
    Cooperate,
    /// Act against the counterparty.
    Defect,
    /// Gather more information before committing.
    Investigate,
    /// Do nothing for now.
    Wait,
}

impl TradeAction {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Negotiate => "negotiate",
            Self::Buy => "buy",
            Self::Sell => "sell",
            Self::Hold => "hold",
            Self::Cooperate => "cooperate",
            Self::Defect => "defect",
            Self::Investigate => "investigate",
            Self::Wait => "wait",
        }
    }

    /// Intrinsic risk of the action on a 0--100 scale.
    pub const fn risk_level(self) -> f64 {
        match self {
            Self::Wait => 5.0,
            Self::Hold => 15.0,
            Self::Reject => 20.0,
            Self::Investigate => 20.0,
            Self::Negotiate => 35.0,
            Self::Accept => 45.0,
            Self::Cooperate => 50.0,
            Self::Sell => 60.0,
            Self::Buy => 65.0,
            Self::Defect => 85.0,
        }
    }

    /// Whether the action builds on trust in the counterparty.
    pub const fn is_cooperative(self) -> bool {
        matches!(self, Self::Accept | Self::Cooperate | Self::Negotiate)
    }

    /// Whether the action works against the counterparty or competitors.
    pub const fn is_aggressive(self) -> bool {
        matches!(self, Self::Defect | Self::Reject)
    }

    /// Whether the action commits the agent to something now.
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Wait | Self::Hold | Self::Investigate)
    }
}

// ---------------------------------------------------------------------------
// Outcomes and relationships
// ---------------------------------------------------------------------------

/// Classification of a reported outcome, driving the trust table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum OutcomeClass {
    /// The deal worked out.
    Successful,
    /// The deal did not work out.
    Failed,
    /// The counterparty betrayed the agent.
    Betrayal,
    /// Both sides cooperated.
    Cooperation,
    /// The decision was cancelled after it was recorded; neutral.
    NoOutcome,
}

impl OutcomeClass {
    /// Trust change applied to the counterparty relationship.
    pub const fn trust_delta(self) -> f64 {
        match self {
            Self::Successful => 5.0,
            Self::Failed => -3.0,
            Self::Betrayal => -25.0,
            Self::Cooperation => 8.0,
            Self::NoOutcome => 0.0,
        }
    }

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Betrayal => "betrayal",
            Self::Cooperation => "cooperation",
            Self::NoOutcome => "no_outcome",
        }
    }
}

/// Derived class of a relationship, recomputed on every update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RelationshipClass {
    /// Too few interactions to judge.
    Unknown,
    /// Nothing notable either way.
    Neutral,
    /// Mostly successful dealings.
    ReliableContact,
    /// High trust and a track record.
    TrustedPartner,
    /// Low trust or mostly failures.
    Unreliable,
    /// Repeated betrayals.
    Enemy,
}

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Qualitative style of a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionStyle {
    /// Driven by careful analysis.
    Analytical,
    /// Driven by gut feel.
    Intuitive,
    /// Driven by an unregulated impulse.
    Impulsive,
    /// Risk-averse.
    Cautious,
    /// Shaped by the social setting.
    Social,
    /// Repeating a learned habit.
    Habitual,
}

/// When the agent intends to act on the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DecisionTiming {
    /// Act right away.
    Immediate,
    /// Act after normal deliberation.
    Deliberate,
    /// Wait for more information first.
    Delayed,
}

/// Coarse bucket for a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum RiskLevel {
    /// Score below 25.
    Low,
    /// Score in 25..50.
    Moderate,
    /// Score in 50..75.
    High,
    /// Score of 75 or more.
    Extreme,
}

impl RiskLevel {
    /// Bucket a 0--100 risk score.
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Self::Extreme
        } else if score >= 50.0 {
            Self::High
        } else if score >= 25.0 {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Emotions
// ---------------------------------------------------------------------------

/// A named emotion dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Emotion {
    /// Pleasure from gains or good relations.
    Joy,
    /// Fear of loss.
    Fear,
    /// Anger at a counterparty or the market.
    Anger,
    /// Desire for more gain.
    Greed,
    /// Felt trust (distinct from the relationship trust score).
    Trust,
    /// Diffuse worry.
    Anxiety,
    /// Self-assurance.
    Confidence,
    /// Regret over past choices.
    Regret,
}

impl Emotion {
    /// All emotions in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Joy,
        Self::Fear,
        Self::Anger,
        Self::Greed,
        Self::Trust,
        Self::Anxiety,
        Self::Confidence,
        Self::Regret,
    ];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Fear => "fear",
            Self::Anger => "anger",
            Self::Greed => "greed",
            Self::Trust => "trust",
            Self::Anxiety => "anxiety",
            Self::Confidence => "confidence",
            Self::Regret => "regret",
        }
    }

    /// Whether the emotion is negatively valenced.
    pub const fn is_negative(self) -> bool {
        matches!(self, Self::Fear | Self::Anger | Self::Anxiety | Self::Regret)
    }
}

// ---------------------------------------------------------------------------
// Learning
// ---------------------------------------------------------------------------

/// Event that can evolve a subset of traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TriggerKind {
    /// Profit above the major threshold.
    MajorSuccess,
    /// Loss above the major threshold.
    MajorLoss,
    /// The counterparty betrayed the agent.
    Betrayal,
    /// Cooperation with high mutual benefit.
    DeepCooperation,
    /// A pattern was confirmed often enough.
    PatternReinforcement,
    /// An overwhelming negative experience.
    Trauma,
}

impl TriggerKind {
    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MajorSuccess => "major_success",
            Self::MajorLoss => "major_loss",
            Self::Betrayal => "betrayal",
            Self::DeepCooperation => "deep_cooperation",
            Self::PatternReinforcement => "pattern_reinforcement",
            Self::Trauma => "trauma",
        }
    }
}

/// Reward attached to a skill milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum MilestoneReward {
    /// Small permanent boost to a related trait (level 25).
    TraitBoost,
    /// Unlocks strategy creation from the skill (level 50).
    StrategyUnlock,
    /// Reputation gain with known counterparties (level 75).
    ReputationGain,
    /// Mastery of the skill (level 90).
    Mastery,
}

// ---------------------------------------------------------------------------
// Population
// ---------------------------------------------------------------------------

/// One of the eight fitness dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum FitnessComponent {
    /// Profitability and win rate.
    TradingPerformance,
    /// Quality of relationships.
    SocialCooperation,
    /// Ability to produce new strategies.
    InnovationCapacity,
    /// How quickly the agent adapts.
    AdaptationSpeed,
    /// Contribution to shared cultural norms.
    CulturalContribution,
    /// Benefit brought to counterparties.
    CollectiveBenefit,
    /// Rarity of the agent's behavioural signature.
    DiversityMaintenance,
    /// Trait and emotional stability.
    StabilityPreservation,
}

impl FitnessComponent {
    /// All components in declaration order.
    pub const ALL: [Self; 8] = [
        Self::TradingPerformance,
        Self::SocialCooperation,
        Self::InnovationCapacity,
        Self::AdaptationSpeed,
        Self::CulturalContribution,
        Self::CollectiveBenefit,
        Self::DiversityMaintenance,
        Self::StabilityPreservation,
    ];

    /// Default aggregation weight.
    pub const fn default_weight(self) -> f64 {
        match self {
            Self::TradingPerformance => 0.25,
            Self::SocialCooperation | Self::InnovationCapacity | Self::AdaptationSpeed => 0.15,
            Self::CulturalContribution | Self::CollectiveBenefit => 0.10,
            Self::DiversityMaintenance | Self::StabilityPreservation => 0.05,
        }
    }
}

/// One of the parent-selection mechanisms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SelectionKind {
    /// Top agents by fitness are kept unconditionally.
    Elite,
    /// Best of a random tournament.
    Tournament,
    /// Roulette wheel proportional to fitness.
    FitnessProportionate,
    /// Favors agents with rare behavioural signatures.
    FrequencyDependent,
    /// Uniformly random.
    UniformRandom,
    /// Linear rank-based roulette.
    Rank,
}

impl SelectionKind {
    /// All selection kinds in declaration order.
    pub const ALL: [Self; 6] = [
        Self::Elite,
        Self::Tournament,
        Self::FitnessProportionate,
        Self::FrequencyDependent,
        Self::UniformRandom,
        Self::Rank,
    ];
}

/// Per-agent lifecycle within one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum GenerationPhase {
    /// Registered and not yet scored this generation.
    Alive,
    /// Fitness evaluated.
    Scored,
    /// Entered the parent pool.
    Selected,
    /// Did not enter the parent pool.
    NotSelected,
    /// Produced offspring.
    Parent,
    /// Evicted from the population.
    Eliminated,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_table_matches_design() {
        assert!((OutcomeClass::Successful.trust_delta() - 5.0).abs() < f64::EPSILON);
        assert!((OutcomeClass::Failed.trust_delta() + 3.0).abs() < f64::EPSILON);
        assert!((OutcomeClass::Betrayal.trust_delta() + 25.0).abs() < f64::EPSILON);
        assert!((OutcomeClass::Cooperation.trust_delta() - 8.0).abs() < f64::EPSILON);
        assert!(OutcomeClass::NoOutcome.trust_delta().abs() < f64::EPSILON);
    }

    #[test]
    fn fitness_weights_sum_to_one() {
        let total: f64 = FitnessComponent::ALL.iter().map(|c| c.default_weight()).sum();
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn every_situation_has_candidates_in_id_order() {
        for situation in SituationType::ALL {
            let actions = situation.candidate_actions();
            assert!(!actions.is_empty());
            assert!(actions.windows(2).all(|w| w[0] < w[1]), "{situation:?}");
        }
    }

    #[test]
    fn risk_level_buckets() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(30.0), RiskLevel::Moderate);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(90.0), RiskLevel::Extreme);
    }

    #[test]
    fn situation_serializes_snake_case() {
        let json = serde_json::to_string(&SituationType::CooperationOffer).ok();
        assert_eq!(json.as_deref(), Some("\"cooperation_offer\""));
    }
}
