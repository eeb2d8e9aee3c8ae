//! The fixed-schema trait vector and its derived profiles.
//!
//! Every agent carries exactly one value per [`Trait`], each in `[0, 100]`.
//! Writes clamp (logging the clamp at `debug`); evolution applies a bounded
//! delta and counts against a per-generation budget. Derived profiles are
//! pure weighted averages over designated trait subsets.
//!
//! The vector serializes as a `trait name -> value` map. Deserialization
//! rejects unknown names and missing traits, so an imported vector always
//! has the exact schema.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use mercator_types::{TraitChange, TriggerKind};

use crate::config::AgentConfig;
use crate::error::AgentError;

/// Lower bound of every trait.
pub const TRAIT_MIN: f64 = 0.0;

/// Upper bound of every trait.
pub const TRAIT_MAX: f64 = 100.0;

/// Value of a trait nobody has set.
pub const TRAIT_NEUTRAL: f64 = 50.0;

// ---------------------------------------------------------------------------
// Trait schema
// ---------------------------------------------------------------------------

/// Family a trait belongs to; sets its evolution sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraitCategory {
    /// Core personality.
    Personality,
    /// Narcissism, machiavellianism, psychopathy.
    DarkTriad,
    /// Scalar disorder tendencies.
    Disorder,
    /// Cultural dimensions.
    Cultural,
    /// Cognitive biases.
    CognitiveBias,
}

impl TraitCategory {
    /// Multiplier applied to evolution deltas for traits in this family.
    pub const fn sensitivity(self) -> f64 {
        match self {
            Self::Personality => 1.0,
            Self::DarkTriad => 0.6,
            Self::Disorder => 0.4,
            Self::Cultural => 0.5,
            Self::CognitiveBias => 0.8,
        }
    }
}

/// Generates the [`Trait`] enum with its name table and category.
macro_rules! define_traits {
    ( $( $variant:ident => $name:literal, $category:ident; )* ) => {
        /// A named trait in the fixed schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum Trait {
            $(
                #[doc = concat!("The `", $name, "` trait.")]
                $variant,
            )*
        }

        impl Trait {
            /// Every trait in declaration order.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Stable snake-case name.
            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )*
                }
            }

            /// Family of the trait.
            pub const fn category(self) -> TraitCategory {
                match self {
                    $( Self::$variant => TraitCategory::$category, )*
                }
            }
        }
    };
}

define_traits! {
    Cooperation => "cooperation", Personality;
    RiskTolerance => "risk_tolerance", Personality;
    Patience => "patience", Personality;
    Impulsiveness => "impulsiveness", Personality;
    AnalyticalThinking => "analytical_thinking", Personality;
    LearningSpeed => "learning_speed", Personality;
    Adaptability => "adaptability", Personality;
    TrustPropensity => "trust_propensity", Personality;
    EmotionalStability => "emotional_stability", Personality;
    SelfControl => "self_control", Personality;
    SocialSkills => "social_skills", Personality;
    Openness => "openness", Personality;
    Conscientiousness => "conscientiousness", Personality;
    Extraversion => "extraversion", Personality;
    Agreeableness => "agreeableness", Personality;
    Competitiveness => "competitiveness", Personality;
    Empathy => "empathy", Personality;
    Curiosity => "curiosity", Personality;
    Loyalty => "loyalty", Personality;
    Honesty => "honesty", Personality;
    Narcissism => "narcissism", DarkTriad;
    Machiavellianism => "machiavellianism", DarkTriad;
    Psychopathy => "psychopathy", DarkTriad;
    BorderlineTendency => "borderline_tendency", Disorder;
    NarcissisticTendency => "narcissistic_tendency", Disorder;
    AntisocialTendency => "antisocial_tendency", Disorder;
    AnxietyTendency => "anxiety_tendency", Disorder;
    ObsessiveTendency => "obsessive_tendency", Disorder;
    ParanoidTendency => "paranoid_tendency", Disorder;
    Individualism => "individualism", Cultural;
    PowerDistance => "power_distance", Cultural;
    UncertaintyAvoidance => "uncertainty_avoidance", Cultural;
    LongTermOrientation => "long_term_orientation", Cultural;
    Overconfidence => "overconfidence", CognitiveBias;
    LossAversion => "loss_aversion", CognitiveBias;
    Herding => "herding", CognitiveBias;
    Anchoring => "anchoring", CognitiveBias;
    ConfirmationBias => "confirmation_bias", CognitiveBias;
}

impl Trait {
    /// Evolution sensitivity of the trait.
    pub const fn sensitivity(self) -> f64 {
        self.category().sensitivity()
    }
}

impl FromStr for Trait {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| AgentError::InvalidTrait { name: s.to_owned() })
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// Weighted average of `(trait, weight)` pairs; negative weights invert
/// the trait (`100 - value`).
fn projection(vector: &TraitVector, weights: &[(Trait, f64)]) -> f64 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for &(t, w) in weights {
        let value = vector.value(t);
        let oriented = if w < 0.0 { TRAIT_MAX - value } else { value };
        total += oriented * w.abs();
        weight_sum += w.abs();
    }
    if weight_sum <= 0.0 {
        TRAIT_NEUTRAL
    } else {
        (total / weight_sum).clamp(TRAIT_MIN, TRAIT_MAX)
    }
}

/// Big-five projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BigFiveProfile {
    /// Openness to experience.
    pub openness: f64,
    /// Conscientiousness.
    pub conscientiousness: f64,
    /// Extraversion.
    pub extraversion: f64,
    /// Agreeableness.
    pub agreeableness: f64,
    /// Neuroticism.
    pub neuroticism: f64,
}

/// Dark-triad projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DarkTriadProfile {
    /// Narcissism blended with its disorder tendency.
    pub narcissism: f64,
    /// Machiavellianism.
    pub machiavellianism: f64,
    /// Psychopathy blended with antisocial tendency.
    pub psychopathy: f64,
    /// Mean of the three.
    pub composite: f64,
}

/// Cultural-dimension projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CulturalProfile {
    /// Individualism versus collectivism.
    pub individualism: f64,
    /// Acceptance of hierarchy.
    pub power_distance: f64,
    /// Discomfort with ambiguity.
    pub uncertainty_avoidance: f64,
    /// Preference for long-term payoffs.
    pub long_term_orientation: f64,
}

/// Cognitive-bias projection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CognitiveBiasProfile {
    /// Biases that inflate risk-taking (overconfidence, herding).
    pub risk_distortion: f64,
    /// Biases that freeze judgement (anchoring, confirmation bias).
    pub judgement_rigidity: f64,
    /// Loss aversion.
    pub loss_aversion: f64,
    /// Mean of all five biases.
    pub composite: f64,
}

// ---------------------------------------------------------------------------
// TraitVector
// ---------------------------------------------------------------------------

/// Per-agent trait vector with evolution bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitVector {
    /// One value per declared trait.
    #[serde(deserialize_with = "deserialize_values")]
    values: BTreeMap<Trait, f64>,
    /// Generation the per-generation counters belong to.
    #[serde(default)]
    generation: u64,
    /// Evolutions applied to each trait in the current generation.
    #[serde(default)]
    evolutions_this_gen: BTreeMap<Trait, u32>,
    /// Times of recent evolution events, oldest first.
    #[serde(default)]
    recent_events: Vec<DateTime<Utc>>,
}

/// Deserialize the value map, insisting on the exact schema.
fn deserialize_values<'de, D>(deserializer: D) -> Result<BTreeMap<Trait, f64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values = BTreeMap::<Trait, f64>::deserialize(deserializer)?;
    if let Some(missing) = Trait::ALL.iter().find(|t| !values.contains_key(*t)) {
        return Err(serde::de::Error::custom(AgentError::MissingTrait {
            name: missing.as_str().to_owned(),
        }));
    }
    Ok(values
        .into_iter()
        .map(|(t, v)| (t, v.clamp(TRAIT_MIN, TRAIT_MAX)))
        .collect())
}

impl TraitVector {
    /// Vector with every trait at the neutral value.
    pub fn neutral() -> Self {
        Self {
            values: Trait::ALL.iter().map(|t| (*t, TRAIT_NEUTRAL)).collect(),
            generation: 0,
            evolutions_this_gen: BTreeMap::new(),
            recent_events: Vec::new(),
        }
    }

    /// Neutral vector with named overrides applied (clamped).
    pub fn from_overrides(overrides: &BTreeMap<String, f64>) -> Result<Self, AgentError> {
        let mut vector = Self::neutral();
        for (name, value) in overrides {
            vector.set(name, *value)?;
        }
        Ok(vector)
    }

    /// Vector with every trait drawn uniformly from `[low, high]`.
    pub fn random<R: Rng>(rng: &mut R, low: f64, high: f64) -> Self {
        let mut vector = Self::neutral();
        for t in Trait::ALL {
            vector.set_trait(*t, rng.random_range(low..=high));
        }
        vector
    }

    /// Value of a trait.
    pub fn value(&self, t: Trait) -> f64 {
        self.values.get(&t).copied().unwrap_or(TRAIT_NEUTRAL)
    }

    /// Value of a trait by name.
    pub fn get(&self, name: &str) -> Result<f64, AgentError> {
        Ok(self.value(name.parse()?))
    }

    /// Set a trait by name, clamping to `[0, 100]`.
    pub fn set(&mut self, name: &str, value: f64) -> Result<f64, AgentError> {
        let t: Trait = name.parse()?;
        Ok(self.set_trait(t, value))
    }

    /// Set a trait, clamping to `[0, 100]`. Returns the stored value.
    pub fn set_trait(&mut self, t: Trait, value: f64) -> f64 {
        let clamped = clamp_trait(t, value);
        self.values.insert(t, clamped);
        clamped
    }

    /// Iterate over `(trait, value)` in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Trait, f64)> + '_ {
        self.values.iter().map(|(t, v)| (*t, *v))
    }

    /// Evolve a trait by name. See [`evolve_trait`](Self::evolve_trait).
    pub fn evolve(
        &mut self,
        name: &str,
        trigger: TriggerKind,
        intensity: f64,
        direction: f64,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Result<Option<TraitChange>, AgentError> {
        let t: Trait = name.parse()?;
        Ok(self.evolve_trait(t, trigger, intensity, direction, now, config))
    }

    /// Apply `Δ = intensity/10 · sensitivity · direction`, bounded by
    /// `max_evolution_step`, then clamp.
    ///
    /// `intensity` is on a 0--100 scale and `direction` is usually ±1.
    /// Returns `None` when the per-generation budget for the trait is spent
    /// or the delta rounds to nothing.
    pub fn evolve_trait(
        &mut self,
        t: Trait,
        trigger: TriggerKind,
        intensity: f64,
        direction: f64,
        now: DateTime<Utc>,
        config: &AgentConfig,
    ) -> Option<TraitChange> {
        let used = self.evolutions_this_gen.get(&t).copied().unwrap_or(0);
        if used >= config.max_evolutions_per_gen {
            tracing::debug!(
                trait_name = t.as_str(),
                used,
                "evolution budget spent for this generation, skipping"
            );
            return None;
        }

        let step = config.max_evolution_step;
        let delta =
            (intensity.clamp(0.0, 100.0) / 10.0 * t.sensitivity() * direction).clamp(-step, step);
        if delta.abs() < f64::EPSILON {
            return None;
        }

        let before = self.value(t);
        let after = self.set_trait(t, before + delta);
        self.evolutions_this_gen.insert(t, used.saturating_add(1));
        self.recent_events.push(now);
        self.trim_events(now, config);

        Some(TraitChange {
            trait_name: t.as_str().to_owned(),
            trigger,
            before,
            after,
        })
    }

    /// Stability in `[0, 100]`: 100 minus a penalty per evolution event in
    /// the stability window ending at `now`.
    pub fn stability(&self, now: DateTime<Utc>, config: &AgentConfig) -> f64 {
        let window_start = now - Duration::hours(config.stability_window_hours);
        let recent = self
            .recent_events
            .iter()
            .filter(|at| **at > window_start && **at <= now)
            .count();
        let recent = f64::from(u32::try_from(recent).unwrap_or(u32::MAX));
        (100.0 - config.stability_penalty_per_event * recent).clamp(0.0, 100.0)
    }

    /// Reset the per-generation evolution counters.
    pub fn begin_generation(&mut self, generation: u64) {
        if generation != self.generation {
            self.generation = generation;
            self.evolutions_this_gen.clear();
        }
    }

    /// Evolutions applied to a trait in the current generation.
    pub fn evolutions_this_generation(&self, t: Trait) -> u32 {
        self.evolutions_this_gen.get(&t).copied().unwrap_or(0)
    }

    /// Total evolutions applied in the current generation.
    pub fn total_evolutions_this_generation(&self) -> u32 {
        self.evolutions_this_gen.values().copied().sum()
    }

    fn trim_events(&mut self, now: DateTime<Utc>, config: &AgentConfig) {
        let window_start = now - Duration::hours(config.stability_window_hours);
        self.recent_events.retain(|at| *at > window_start);
    }

    // --- Profiles ---

    /// Big-five profile.
    pub fn big_five(&self) -> BigFiveProfile {
        BigFiveProfile {
            openness: projection(
                self,
                &[(Trait::Openness, 0.6), (Trait::Curiosity, 0.25), (Trait::Adaptability, 0.15)],
            ),
            conscientiousness: projection(
                self,
                &[
                    (Trait::Conscientiousness, 0.6),
                    (Trait::SelfControl, 0.2),
                    (Trait::Patience, 0.2),
                ],
            ),
            extraversion: projection(
                self,
                &[(Trait::Extraversion, 0.7), (Trait::SocialSkills, 0.3)],
            ),
            agreeableness: projection(
                self,
                &[
                    (Trait::Agreeableness, 0.5),
                    (Trait::Cooperation, 0.2),
                    (Trait::Empathy, 0.2),
                    (Trait::Competitiveness, -0.1),
                ],
            ),
            neuroticism: projection(
                self,
                &[
                    (Trait::EmotionalStability, -0.6),
                    (Trait::AnxietyTendency, 0.25),
                    (Trait::BorderlineTendency, 0.15),
                ],
            ),
        }
    }

    /// Dark-triad profile.
    pub fn dark_triad(&self) -> DarkTriadProfile {
        let narcissism = projection(
            self,
            &[(Trait::Narcissism, 0.7), (Trait::NarcissisticTendency, 0.3)],
        );
        let machiavellianism = projection(
            self,
            &[(Trait::Machiavellianism, 0.8), (Trait::Honesty, -0.2)],
        );
        let psychopathy = projection(
            self,
            &[
                (Trait::Psychopathy, 0.6),
                (Trait::AntisocialTendency, 0.25),
                (Trait::Empathy, -0.15),
            ],
        );
        DarkTriadProfile {
            narcissism,
            machiavellianism,
            psychopathy,
            composite: (narcissism + machiavellianism + psychopathy) / 3.0,
        }
    }

    /// Cultural profile.
    pub fn cultural(&self) -> CulturalProfile {
        CulturalProfile {
            individualism: self.value(Trait::Individualism),
            power_distance: self.value(Trait::PowerDistance),
            uncertainty_avoidance: self.value(Trait::UncertaintyAvoidance),
            long_term_orientation: self.value(Trait::LongTermOrientation),
        }
    }

    /// Cognitive-bias profile.
    pub fn cognitive_biases(&self) -> CognitiveBiasProfile {
        CognitiveBiasProfile {
            risk_distortion: projection(
                self,
                &[(Trait::Overconfidence, 0.6), (Trait::Herding, 0.4)],
            ),
            judgement_rigidity: projection(
                self,
                &[(Trait::Anchoring, 0.5), (Trait::ConfirmationBias, 0.5)],
            ),
            loss_aversion: self.value(Trait::LossAversion),
            composite: projection(
                self,
                &[
                    (Trait::Overconfidence, 1.0),
                    (Trait::LossAversion, 1.0),
                    (Trait::Herding, 1.0),
                    (Trait::Anchoring, 1.0),
                    (Trait::ConfirmationBias, 1.0),
                ],
            ),
        }
    }

    /// Capacity to regulate emotions and impulses, in `[0, 100]`.
    pub fn regulation_capacity(&self) -> f64 {
        projection(
            self,
            &[
                (Trait::EmotionalStability, 0.4),
                (Trait::SelfControl, 0.4),
                (Trait::BorderlineTendency, -0.2),
            ],
        )
    }
}

impl Default for TraitVector {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Clamp a trait value, logging when the input was out of range.
fn clamp_trait(t: Trait, value: f64) -> f64 {
    if value.is_nan() {
        tracing::debug!(trait_name = t.as_str(), "NaN trait value replaced with neutral");
        return TRAIT_NEUTRAL;
    }
    let clamped = value.clamp(TRAIT_MIN, TRAIT_MAX);
    if (clamped - value).abs() > f64::EPSILON {
        tracing::debug!(
            trait_name = t.as_str(),
            requested = value,
            clamped,
            "trait value clamped"
        );
    }
    clamped
}
