//! Emotional state: an emotion vector with trait-driven baselines,
//! additive blending, trauma residues and a regulation ceiling.
//!
//! Each decision advances the state: situation and context impulses are
//! blended in with per-emotion mixing weights, active residues add their
//! decaying weight, every emotion relaxes toward its baseline, and finally
//! everything is clamped to `[0, ceiling]` where
//! `ceiling = base + slope · regulation_capacity`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mercator_types::{Emotion, Outcome, OutcomeClass, SituationType};

use crate::config::AgentConfig;
use crate::traits::{Trait, TraitVector};

/// A decaying emotional weight left behind by trauma.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Residue {
    /// Emotion the residue feeds.
    pub emotion: Emotion,
    /// Amount added per decision; shrinks by `residue_decay` each time.
    pub weight: f64,
}

/// Per-agent emotional state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionalState {
    /// Current level of each emotion (0--100).
    levels: BTreeMap<Emotion, f64>,
    /// Active trauma residues.
    residues: Vec<Residue>,
    /// Accumulated resilience (0--100).
    resilience: f64,
    /// Strongest emotion.
    dominant: Emotion,
    /// Level of the dominant emotion.
    intensity: f64,
    /// Agreement between positive and negative emotions (0--100).
    coherence: f64,
    /// Readiness to commit to an action (0--100).
    readiness: f64,
}

/// Read-only view of the meta outputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmotionalReading {
    /// Strongest emotion.
    pub dominant_emotion: Emotion,
    /// Level of the dominant emotion.
    pub intensity: f64,
    /// Agreement between positive and negative emotions.
    pub coherence: f64,
    /// Readiness to commit to an action.
    pub decision_readiness: f64,
}

/// Resting level of an emotion for a personality.
pub fn baseline(emotion: Emotion, traits: &TraitVector) -> f64 {
    let v = |t: Trait| traits.value(t);
    let level = match emotion {
        Emotion::Joy => 0.3 * v(Trait::Extraversion) + 0.2 * v(Trait::EmotionalStability),
        Emotion::Fear => 0.3 * v(Trait::AnxietyTendency) + 0.2 * v(Trait::LossAversion),
        Emotion::Anger => {
            0.2 * v(Trait::AntisocialTendency)
                + 0.15 * v(Trait::BorderlineTendency)
                + 0.1 * v(Trait::Competitiveness)
        }
        Emotion::Greed => {
            0.25 * v(Trait::RiskTolerance)
                + 0.15 * v(Trait::Narcissism)
                + 0.1 * v(Trait::Competitiveness)
        }
        Emotion::Trust => 0.4 * v(Trait::TrustPropensity),
        Emotion::Anxiety => 0.35 * v(Trait::AnxietyTendency) + 0.1 * v(Trait::ParanoidTendency),
        Emotion::Confidence => 0.3 * v(Trait::Overconfidence) + 0.2 * v(Trait::EmotionalStability),
        Emotion::Regret => 0.15 * v(Trait::LossAversion) + 0.1 * v(Trait::ObsessiveTendency),
    };
    level.clamp(0.0, 100.0)
}

/// Impulse a situation type sends into each emotion, per point of
/// intensity.
fn situation_impulse(situation: SituationType) -> &'static [(Emotion, f64)] {
    match situation {
        SituationType::TradeOpportunity => &[(Emotion::Greed, 0.3), (Emotion::Joy, 0.1)],
        SituationType::CooperationOffer => &[(Emotion::Trust, 0.3), (Emotion::Joy, 0.1)],
        SituationType::Negotiation => &[(Emotion::Anxiety, 0.15), (Emotion::Confidence, 0.1)],
        SituationType::MarketCrash => &[(Emotion::Fear, 0.5), (Emotion::Anxiety, 0.4)],
        SituationType::BetrayalRisk => &[
            (Emotion::Fear, 0.3),
            (Emotion::Anger, 0.2),
            (Emotion::Anxiety, 0.3),
        ],
        SituationType::Competition => &[
            (Emotion::Anger, 0.2),
            (Emotion::Greed, 0.2),
            (Emotion::Confidence, 0.1),
        ],
        SituationType::PartnershipProposal => &[(Emotion::Trust, 0.3), (Emotion::Joy, 0.15)],
        SituationType::InformationRequest => &[(Emotion::Confidence, 0.05)],
    }
}

impl EmotionalState {
    /// State resting at the personality's baselines.
    pub fn from_traits(traits: &TraitVector) -> Self {
        let levels = Emotion::ALL
            .iter()
            .map(|e| (*e, baseline(*e, traits)))
            .collect();
        let mut state = Self {
            levels,
            residues: Vec::new(),
            resilience: 0.0,
            dominant: Emotion::Joy,
            intensity: 0.0,
            coherence: 100.0,
            readiness: 50.0,
        };
        state.refresh(traits);
        state
    }

    /// Level of an emotion.
    pub fn level(&self, emotion: Emotion) -> f64 {
        self.levels.get(&emotion).copied().unwrap_or(0.0)
    }

    /// All levels.
    pub const fn levels(&self) -> &BTreeMap<Emotion, f64> {
        &self.levels
    }

    /// Active residues.
    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    /// Accumulated resilience.
    pub const fn resilience(&self) -> f64 {
        self.resilience
    }

    /// Meta outputs.
    pub const fn reading(&self) -> EmotionalReading {
        EmotionalReading {
            dominant_emotion: self.dominant,
            intensity: self.intensity,
            coherence: self.coherence,
            decision_readiness: self.readiness,
        }
    }

    /// Regulation capacity: trait capacity plus a tenth of resilience.
    pub fn regulation_capacity(&self, traits: &TraitVector) -> f64 {
        (traits.regulation_capacity() + 0.1 * self.resilience).clamp(0.0, 100.0)
    }

    /// Highest level any emotion may reach after regulation.
    pub fn regulation_ceiling(&self, traits: &TraitVector, config: &AgentConfig) -> f64 {
        (config.regulation_ceiling_base
            + config.regulation_ceiling_slope * self.regulation_capacity(traits))
        .clamp(0.0, 100.0)
    }

    /// Advance the state for a decision.
    ///
    /// Returns the number of emotions the regulation pass had to cap.
    pub fn advance(
        &mut self,
        situation: SituationType,
        intensity: f64,
        hints: &BTreeMap<Emotion, f64>,
        traits: &TraitVector,
        config: &AgentConfig,
    ) -> usize {
        let intensity = intensity.clamp(0.0, 100.0);
        let mut impulses: BTreeMap<Emotion, f64> = BTreeMap::new();
        for &(emotion, per_point) in situation_impulse(situation) {
            *impulses.entry(emotion).or_insert(0.0) += per_point * intensity;
        }
        for (emotion, hint) in hints {
            *impulses.entry(*emotion).or_insert(0.0) += hint.clamp(0.0, 100.0);
        }

        // Additive blend.
        for (emotion, impulse) in impulses {
            let weight = config.mixing_weight(emotion);
            let level = self.levels.entry(emotion).or_insert(0.0);
            *level += weight * impulse;
        }

        // Residues add their weight and decay.
        for residue in &mut self.residues {
            *self.levels.entry(residue.emotion).or_insert(0.0) += residue.weight;
            residue.weight *= config.residue_decay;
        }
        self.residues.retain(|r| r.weight >= config.residue_floor);

        // Relax toward baseline.
        for emotion in Emotion::ALL {
            let target = baseline(emotion, traits);
            let level = self.levels.entry(emotion).or_insert(target);
            *level += config.emotion_relaxation * (target - *level);
        }

        let capped = self.regulate(traits, config);
        self.refresh(traits);
        capped
    }

    /// Apply the emotional consequences of an outcome.
    pub fn apply_outcome(&mut self, outcome: &Outcome, traits: &TraitVector, config: &AgentConfig) {
        let impact = outcome.emotional_impact.clamp(0.0, 100.0);
        let shifts: &[(Emotion, f64)] = match outcome.class {
            OutcomeClass::Successful => &[(Emotion::Joy, 0.3), (Emotion::Confidence, 0.2)],
            OutcomeClass::Cooperation => &[(Emotion::Trust, 0.3), (Emotion::Joy, 0.2)],
            OutcomeClass::Failed => &[(Emotion::Regret, 0.3), (Emotion::Fear, 0.15)],
            OutcomeClass::Betrayal => &[
                (Emotion::Anger, 0.35),
                (Emotion::Trust, -0.3),
                (Emotion::Regret, 0.15),
            ],
            OutcomeClass::NoOutcome => &[],
        };
        for &(emotion, per_point) in shifts {
            let weight = config.mixing_weight(emotion);
            let level = self.levels.entry(emotion).or_insert(0.0);
            *level += weight * per_point * impact;
        }
        self.regulate(traits, config);
        self.refresh(traits);
    }

    /// Leave a trauma residue of the given impact on fear and anxiety.
    ///
    /// Resilience shrinks the residue.
    pub fn add_trauma_residue(&mut self, impact: f64) {
        let weight = 0.3 * impact.clamp(0.0, 100.0) * (1.0 - self.resilience / 200.0);
        for emotion in [Emotion::Fear, Emotion::Anxiety] {
            self.residues.push(Residue { emotion, weight });
        }
    }

    /// Grow resilience by `amount`, capped at 100.
    pub fn grow_resilience(&mut self, amount: f64) {
        self.resilience = (self.resilience + amount).clamp(0.0, 100.0);
    }

    /// Clamp every emotion to `[0, ceiling]`.
    fn regulate(&mut self, traits: &TraitVector, config: &AgentConfig) -> usize {
        let ceiling = self.regulation_ceiling(traits, config);
        let mut capped = 0_usize;
        for (emotion, level) in &mut self.levels {
            if *level > ceiling {
                tracing::debug!(
                    emotion = emotion.as_str(),
                    level = *level,
                    ceiling,
                    "emotion capped by regulation"
                );
                *level = ceiling;
                capped = capped.saturating_add(1);
            } else if *level < 0.0 || level.is_nan() {
                *level = 0.0;
            }
        }
        capped
    }

    /// Recompute dominant emotion, intensity, coherence and readiness.
    fn refresh(&mut self, traits: &TraitVector) {
        let mut dominant = Emotion::Joy;
        let mut top = f64::MIN;
        for emotion in Emotion::ALL {
            let level = self.level(emotion);
            if level > top {
                top = level;
                dominant = emotion;
            }
        }
        self.dominant = dominant;
        self.intensity = top.max(0.0);

        let (positive, negative) = Emotion::ALL.iter().fold((0.0, 0.0), |(p, n), e| {
            if e.is_negative() {
                (p, n + self.level(*e))
            } else {
                (p + self.level(*e), n)
            }
        });
        let total = positive + negative;
        self.coherence = if total <= f64::EPSILON {
            100.0
        } else {
            (100.0 * (positive - negative).abs() / total).clamp(0.0, 100.0)
        };

        let capacity = self.regulation_capacity(traits);
        let readiness = 50.0 + 0.5 * (self.level(Emotion::Confidence) - self.level(Emotion::Fear))
            + 0.1 * (self.level(Emotion::Trust) - self.level(Emotion::Anxiety))
            - 0.3 * (self.intensity - 60.0).max(0.0)
            + 0.2 * (capacity - 50.0);
        self.readiness = readiness.clamp(0.0, 100.0);
    }
}

impl Default for EmotionalState {
    fn default() -> Self {
        Self::from_traits(&TraitVector::neutral())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn starts_at_baseline() {
        let traits = TraitVector::neutral();
        let state = EmotionalState::from_traits(&traits);
        for emotion in Emotion::ALL {
            assert!((state.level(emotion) - baseline(emotion, &traits)).abs() < 1e-9);
        }
    }

    #[test]
    fn regulation_caps_at_ceiling() {
        let mut traits = TraitVector::neutral();
        traits.set("emotional_stability", 0.0).unwrap();
        traits.set("self_control", 0.0).unwrap();
        traits.set("borderline_tendency", 100.0).unwrap();
        let config = AgentConfig::default();
        let mut state = EmotionalState::from_traits(&traits);
        let ceiling = state.regulation_ceiling(&traits, &config);
        assert!((ceiling - 60.0).abs() < 1e-9);

        let mut hints = BTreeMap::new();
        hints.insert(Emotion::Fear, 100.0);
        for _ in 0..5 {
            state.advance(SituationType::MarketCrash, 100.0, &hints, &traits, &config);
        }
        for emotion in Emotion::ALL {
            assert!(state.level(emotion) <= ceiling + 1e-9);
            assert!(state.level(emotion) >= 0.0);
        }
        assert_eq!(state.reading().dominant_emotion, Emotion::Fear);
    }

    #[test]
    fn calm_cooperation_offer_keeps_readiness_near_middle() {
        let mut traits = TraitVector::neutral();
        traits.set("cooperation", 80.0).unwrap();
        traits.set("risk_tolerance", 20.0).unwrap();
        let config = AgentConfig::default();
        let mut state = EmotionalState::from_traits(&traits);
        state.advance(SituationType::CooperationOffer, 50.0, &BTreeMap::new(), &traits, &config);
        let readiness = state.reading().decision_readiness;
        assert!((40.0..=60.0).contains(&readiness), "readiness {readiness}");
    }

    #[test]
    fn residues_decay_away() {
        let traits = TraitVector::neutral();
        let config = AgentConfig::default();
        let mut state = EmotionalState::from_traits(&traits);
        state.add_trauma_residue(90.0);
        assert_eq!(state.residues().len(), 2);
        for _ in 0..40 {
            state.advance(SituationType::InformationRequest, 0.0, &BTreeMap::new(), &traits, &config);
        }
        assert!(state.residues().is_empty());
    }

    #[test]
    fn resilience_shrinks_residues() {
        let traits = TraitVector::neutral();
        let mut fragile = EmotionalState::from_traits(&traits);
        let mut resilient = EmotionalState::from_traits(&traits);
        resilient.grow_resilience(100.0);
        fragile.add_trauma_residue(90.0);
        resilient.add_trauma_residue(90.0);
        assert!(resilient.residues()[0].weight < fragile.residues()[0].weight);
    }

    #[test]
    fn betrayal_lowers_felt_trust() {
        let traits = TraitVector::neutral();
        let config = AgentConfig::default();
        let mut state = EmotionalState::from_traits(&traits);
        let before = state.level(Emotion::Trust);
        let outcome = Outcome {
            class: OutcomeClass::Betrayal,
            success: false,
            profit_loss: Decimal::new(-500, 0),
            satisfaction: 10.0,
            emotional_impact: 70.0,
            unexpected: true,
            mutual_benefit: None,
            growth_opportunity: false,
        };
        state.apply_outcome(&outcome, &traits, &config);
        assert!(state.level(Emotion::Trust) < before);
        assert!(state.level(Emotion::Anger) > 0.0);
    }
}
