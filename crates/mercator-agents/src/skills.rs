//! Skill system: bounded proficiency levels, XP tracking and milestones.
//!
//! Agents hold every skill of a fixed catalogue. Each resolved outcome
//! grants XP to the skills relevant to its situation, and the level follows
//! the XP on a logarithmic curve:
//!
//! ```text
//! level = min(max_potential, 25 · ln(xp/100 + 1))
//! ```
//!
//! Levels 25, 50, 75 and 90 are milestones; each fires at most once per
//! skill and carries a [`MilestoneReward`].
//!
//! # Specialization
//!
//! An agent follows one [`SpecializationPath`]. The path's core skills gain
//! XP faster (`path_bonus`), and the mean level of the core skills is the
//! specialization `depth` the population layer scores.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_types::{MilestoneRecord, MilestoneReward, SituationType, SkillGain};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::traits::{Trait, TraitVector};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Lowest allowed `max_potential`.
pub const MIN_POTENTIAL: f64 = 60.0;

/// Highest allowed `max_potential`.
pub const MAX_POTENTIAL: f64 = 95.0;

/// Lowest allowed learning rate.
pub const MIN_LEARNING_RATE: f64 = 0.3;

/// Highest allowed learning rate.
pub const MAX_LEARNING_RATE: f64 = 2.0;

/// Milestone levels and their rewards, ascending.
pub const MILESTONES: [(u8, MilestoneReward); 4] = [
    (25, MilestoneReward::TraitBoost),
    (50, MilestoneReward::StrategyUnlock),
    (75, MilestoneReward::ReputationGain),
    (90, MilestoneReward::Mastery),
];

/// All canonical skill names with the trait a trait-boost milestone raises.
pub const SKILL_CATALOGUE: &[(&str, Trait)] = &[
    ("technical_analysis", Trait::AnalyticalThinking),
    ("negotiation", Trait::SocialSkills),
    ("risk_management", Trait::SelfControl),
    ("market_timing", Trait::Patience),
    ("relationship_building", Trait::Empathy),
    ("information_gathering", Trait::Curiosity),
    ("crisis_management", Trait::EmotionalStability),
    ("portfolio_diversification", Trait::Conscientiousness),
    ("deception_detection", Trait::AnalyticalThinking),
    ("strategic_planning", Trait::LongTermOrientation),
];

/// Trait raised by the trait-boost milestone of a skill.
pub fn related_trait(skill: &str) -> Option<Trait> {
    SKILL_CATALOGUE
        .iter()
        .find(|(name, _)| *name == skill)
        .map(|(_, t)| *t)
}

/// Skills exercised by a situation type.
pub const fn situation_skills(situation_type: SituationType) -> &'static [&'static str] {
    match situation_type {
        SituationType::TradeOpportunity => &[
            "technical_analysis",
            "market_timing",
            "portfolio_diversification",
        ],
        SituationType::CooperationOffer => &["relationship_building", "negotiation"],
        SituationType::Negotiation => &["negotiation", "information_gathering"],
        SituationType::MarketCrash => &["crisis_management", "risk_management"],
        SituationType::BetrayalRisk => &["deception_detection", "risk_management"],
        SituationType::Competition => &["strategic_planning", "market_timing"],
        SituationType::PartnershipProposal => &["relationship_building", "strategic_planning"],
        SituationType::InformationRequest => &["information_gathering", "deception_detection"],
    }
}

/// Level reached with the given XP, before the potential cap.
fn raw_level(xp: f64) -> f64 {
    25.0 * (xp.max(0.0) / 100.0 + 1.0).ln()
}

/// XP needed to reach `level`.
fn xp_for_level(level: f64) -> f64 {
    100.0 * ((level.max(0.0) / 25.0).exp() - 1.0)
}

// ---------------------------------------------------------------------------
// Specialization paths
// ---------------------------------------------------------------------------

/// Career path an agent specializes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecializationPath {
    /// Reads charts and times the market.
    MarketAnalyst,
    /// Closes deals and reads people.
    Negotiator,
    /// Limits downside and handles crises.
    RiskManager,
    /// Plans long campaigns from good information.
    Strategist,
    /// Builds and exploits a wide network.
    Networker,
}

impl SpecializationPath {
    /// Every path, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::MarketAnalyst,
        Self::Negotiator,
        Self::RiskManager,
        Self::Strategist,
        Self::Networker,
    ];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarketAnalyst => "market_analyst",
            Self::Negotiator => "negotiator",
            Self::RiskManager => "risk_manager",
            Self::Strategist => "strategist",
            Self::Networker => "networker",
        }
    }

    /// Core skills of the path.
    pub const fn core_skills(self) -> &'static [&'static str] {
        match self {
            Self::MarketAnalyst => &["technical_analysis", "market_timing", "risk_management"],
            Self::Negotiator => &["negotiation", "relationship_building", "deception_detection"],
            Self::RiskManager => &[
                "risk_management",
                "crisis_management",
                "portfolio_diversification",
            ],
            Self::Strategist => &[
                "strategic_planning",
                "information_gathering",
                "technical_analysis",
            ],
            Self::Networker => &[
                "relationship_building",
                "information_gathering",
                "negotiation",
            ],
        }
    }

    /// Path that best fits a personality; earlier paths win ties.
    pub fn from_traits(traits: &TraitVector) -> Self {
        let fit = |path: Self| -> f64 {
            match path {
                Self::MarketAnalyst => {
                    traits.value(Trait::AnalyticalThinking) + traits.value(Trait::RiskTolerance)
                }
                Self::Negotiator => {
                    traits.value(Trait::SocialSkills) + traits.value(Trait::Competitiveness)
                }
                Self::RiskManager => {
                    traits.value(Trait::SelfControl) + traits.value(Trait::UncertaintyAvoidance)
                }
                Self::Strategist => {
                    traits.value(Trait::Patience) + traits.value(Trait::LongTermOrientation)
                }
                Self::Networker => {
                    traits.value(Trait::Cooperation) + traits.value(Trait::Extraversion)
                }
            }
        };
        let mut best = Self::MarketAnalyst;
        let mut best_fit = fit(best);
        for path in Self::ALL.into_iter().skip(1) {
            let f = fit(path);
            if f > best_fit {
                best = path;
                best_fit = f;
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// Skill
// ---------------------------------------------------------------------------

/// One skill's progression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skill {
    /// Current level in `[0, max_potential]`.
    pub level: f64,
    /// Ceiling for the level, in `[60, 95]`.
    pub max_potential: f64,
    /// XP multiplier, in `[0.3, 2.0]`.
    pub learning_rate: f64,
    /// Accumulated XP.
    pub xp: f64,
    /// Milestone levels already reached, sorted and unique.
    pub milestones: Vec<u8>,
    /// Last time the skill gained XP.
    pub last_used: Option<DateTime<Utc>>,
}

impl Skill {
    /// A fresh skill at level 0.
    pub fn new(max_potential: f64, learning_rate: f64) -> Self {
        Self {
            level: 0.0,
            max_potential: max_potential.clamp(MIN_POTENTIAL, MAX_POTENTIAL),
            learning_rate: learning_rate.clamp(MIN_LEARNING_RATE, MAX_LEARNING_RATE),
            xp: 0.0,
            milestones: Vec::new(),
            last_used: None,
        }
    }

    /// A skill already at `level`, with the XP that level implies and the
    /// lower milestones marked as reached.
    pub fn at_level(level: f64, max_potential: f64, learning_rate: f64) -> Self {
        let mut skill = Self::new(max_potential, learning_rate);
        skill.level = level.clamp(0.0, skill.max_potential);
        skill.xp = xp_for_level(skill.level);
        skill.milestones = MILESTONES
            .iter()
            .map(|(m, _)| *m)
            .filter(|m| f64::from(*m) <= skill.level)
            .collect();
        skill
    }

    /// Add XP, recompute the level and return milestones reached for the
    /// first time, in ascending order.
    pub fn add_xp(&mut self, amount: f64, now: DateTime<Utc>) -> Vec<(u8, MilestoneReward)> {
        if amount <= 0.0 {
            return Vec::new();
        }
        self.xp += amount;
        self.level = raw_level(self.xp).min(self.max_potential);
        self.last_used = Some(now);

        let mut fired = Vec::new();
        for (milestone, reward) in MILESTONES {
            if f64::from(milestone) <= self.level && !self.milestones.contains(&milestone) {
                self.milestones.push(milestone);
                fired.push((milestone, reward));
            }
        }
        self.milestones.sort_unstable();
        fired
    }
}

// ---------------------------------------------------------------------------
// SkillSet
// ---------------------------------------------------------------------------

/// XP granted to one skill and the milestones it reached.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillGrant {
    /// Progression summary.
    pub gain: SkillGain,
    /// Milestones reached for the first time.
    pub milestones: Vec<MilestoneRecord>,
}

/// Per-agent skills plus the specialization path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSet {
    /// Followed path.
    path: SpecializationPath,
    /// Skill name to progression.
    skills: BTreeMap<String, Skill>,
}

impl SkillSet {
    /// Every catalogue skill at level 0.
    pub fn new(path: SpecializationPath, max_potential: f64, learning_rate: f64) -> Self {
        let skills = SKILL_CATALOGUE
            .iter()
            .map(|(name, _)| ((*name).to_owned(), Skill::new(max_potential, learning_rate)))
            .collect();
        Self { path, skills }
    }

    /// Followed path.
    pub const fn path(&self) -> SpecializationPath {
        self.path
    }

    /// Look up a skill.
    pub fn get(&self, name: &str) -> Result<&Skill, AgentError> {
        self.skills.get(name).ok_or_else(|| AgentError::UnknownSkill {
            name: name.to_owned(),
        })
    }

    /// Replace a skill's progression (scenario setup and imports).
    pub fn set(&mut self, name: &str, skill: Skill) -> Result<(), AgentError> {
        let slot = self
            .skills
            .get_mut(name)
            .ok_or_else(|| AgentError::UnknownSkill {
                name: name.to_owned(),
            })?;
        *slot = skill;
        Ok(())
    }

    /// Grant raw XP to a skill; the skill's own learning rate is not applied.
    pub fn grant(
        &mut self,
        name: &str,
        xp: f64,
        now: DateTime<Utc>,
    ) -> Result<SkillGrant, AgentError> {
        let skill = self
            .skills
            .get_mut(name)
            .ok_or_else(|| AgentError::UnknownSkill {
                name: name.to_owned(),
            })?;
        let level_before = skill.level;
        let fired = skill.add_xp(xp, now);
        let milestones = fired
            .into_iter()
            .map(|(level, reward)| {
                tracing::debug!(skill = name, level, reward = ?reward, "skill milestone reached");
                MilestoneRecord {
                    skill: name.to_owned(),
                    level,
                    reward,
                }
            })
            .collect();
        Ok(SkillGrant {
            gain: SkillGain {
                skill: name.to_owned(),
                xp_gained: xp.max(0.0),
                level_before,
                level_after: skill.level,
            },
            milestones,
        })
    }

    /// Grant `base · learning_rate · effectiveness` XP to every skill the
    /// situation exercises; core skills of the path get `path_bonus` on top.
    pub fn grant_for_situation(
        &mut self,
        situation_type: SituationType,
        effectiveness: f64,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Vec<SkillGrant> {
        let effectiveness = effectiveness.clamp(0.0, 1.0);
        if effectiveness <= 0.0 {
            return Vec::new();
        }
        let core = self.path.core_skills();
        let mut grants = Vec::new();
        for name in situation_skills(situation_type) {
            let Some(skill) = self.skills.get(*name) else {
                continue;
            };
            let bonus = if core.contains(name) {
                config.path_bonus
            } else {
                1.0
            };
            let xp = config.skill_base_xp * skill.learning_rate * effectiveness * bonus;
            if let Ok(grant) = self.grant(name, xp, now) {
                grants.push(grant);
            }
        }
        grants
    }

    /// Mean level of the path's core skills.
    pub fn depth(&self) -> f64 {
        let core = self.path.core_skills();
        let total: f64 = core
            .iter()
            .filter_map(|name| self.skills.get(*name))
            .map(|s| s.level)
            .sum();
        let n = f64::from(u32::try_from(core.len()).unwrap_or(u32::MAX));
        if n > 0.0 { total / n } else { 0.0 }
    }

    /// Mean level over every skill.
    pub fn mean_level(&self) -> f64 {
        if self.skills.is_empty() {
            return 0.0;
        }
        let n = f64::from(u32::try_from(self.skills.len()).unwrap_or(u32::MAX));
        self.skills.values().map(|s| s.level).sum::<f64>() / n
    }

    /// Iterate over `(name, skill)` in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Skill)> {
        self.skills.iter().map(|(name, skill)| (name.as_str(), skill))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        DateTime::<Utc>::UNIX_EPOCH + Duration::days(100)
    }

    #[test]
    fn level_follows_log_curve() {
        let mut skill = Skill::new(90.0, 1.0);
        skill.add_xp(100.0, now());
        assert!((skill.level - 25.0 * 2.0_f64.ln()).abs() < 1e-9);
    }

    #[test]
    fn level_never_exceeds_potential() {
        let mut skill = Skill::new(60.0, 1.0);
        skill.add_xp(1.0e9, now());
        assert!((skill.level - 60.0).abs() < 1e-9);
        // 75 and 90 lie above the potential and never fire.
        assert_eq!(skill.milestones, vec![25, 50]);
    }

    #[test]
    fn potential_and_rate_are_clamped() {
        let skill = Skill::new(120.0, 5.0);
        assert!((skill.max_potential - MAX_POTENTIAL).abs() < f64::EPSILON);
        assert!((skill.learning_rate - MAX_LEARNING_RATE).abs() < f64::EPSILON);
    }

    #[test]
    fn milestone_fires_once() {
        let mut set = SkillSet::new(SpecializationPath::MarketAnalyst, 90.0, 1.0);
        set.set("technical_analysis", Skill::at_level(49.0, 90.0, 1.0))
            .unwrap();

        let first = set.grant("technical_analysis", 40.0, now()).unwrap();
        assert!(first.gain.level_after >= 50.0);
        assert_eq!(
            first.milestones,
            vec![MilestoneRecord {
                skill: "technical_analysis".to_owned(),
                level: 50,
                reward: MilestoneReward::StrategyUnlock,
            }]
        );

        let second = set.grant("technical_analysis", 5.0, now()).unwrap();
        assert!(second.milestones.is_empty());
        assert_eq!(
            set.get("technical_analysis").unwrap().milestones,
            vec![25, 50]
        );
    }

    #[test]
    fn unknown_skill_is_rejected() {
        let mut set = SkillSet::new(SpecializationPath::Networker, 80.0, 1.0);
        assert_eq!(
            set.grant("juggling", 10.0, now()),
            Err(AgentError::UnknownSkill {
                name: "juggling".to_owned()
            })
        );
    }

    #[test]
    fn core_skills_get_the_path_bonus() {
        let config = AgentConfig::default();
        let mut set = SkillSet::new(SpecializationPath::MarketAnalyst, 90.0, 1.0);
        let grants = set.grant_for_situation(SituationType::TradeOpportunity, 1.0, now(), &config);
        assert_eq!(grants.len(), 3);
        let xp_of = |name: &str| {
            grants
                .iter()
                .find(|g| g.gain.skill == name)
                .unwrap()
                .gain
                .xp_gained
        };
        assert!((xp_of("technical_analysis") - 24.0).abs() < 1e-9);
        assert!((xp_of("portfolio_diversification") - 20.0).abs() < 1e-9);
        assert!(set.depth() > 0.0);
    }

    #[test]
    fn zero_effectiveness_grants_nothing() {
        let config = AgentConfig::default();
        let mut set = SkillSet::new(SpecializationPath::Negotiator, 90.0, 1.0);
        assert!(
            set.grant_for_situation(SituationType::Negotiation, 0.0, now(), &config)
                .is_empty()
        );
    }

    #[test]
    fn path_from_traits() {
        let mut traits = TraitVector::neutral();
        traits.set("social_skills", 90.0).unwrap();
        assert_eq!(
            SpecializationPath::from_traits(&traits),
            SpecializationPath::Negotiator
        );
        assert_eq!(
            SpecializationPath::from_traits(&TraitVector::neutral()),
            SpecializationPath::MarketAnalyst
        );
    }
}
