//! Integer-encoded genotypes, their phenotype projection and variation
//! operators.
//!
//! A genotype has three sections (behavioural, strategy, cultural), each a
//! map from locus name to [`Gene`]. Projection to a [`Phenotype`] is a
//! deterministic total function. Crossover works locus by locus over the
//! union of both parents' loci.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::PopulationError;

/// Loci of the strategy section.
pub const STRATEGY_LOCI: [&str; 3] = ["learning_rate", "max_potential", "plasticity"];

// ---------------------------------------------------------------------------
// Gene
// ---------------------------------------------------------------------------

/// One locus: an integer value with dominance and expression metadata.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gene {
    /// Allele value in `[0, 100]`.
    pub value: u8,
    /// Dominance in `[0, 1]`; the more dominant allele wins primary-dominant
    /// crossover.
    pub dominance: f64,
    /// Expression strength in `[0, 1]`; scales the distance of the
    /// phenotype from the neutral value 50.
    pub expression: f64,
}

impl Gene {
    /// Gene with neutral metadata encoding a scalar in `[0, 100]`.
    pub fn encode(value: f64) -> Self {
        Self {
            value: to_allele(value),
            dominance: 0.5,
            expression: 1.0,
        }
    }

    /// Projected phenotype value.
    pub fn express(&self) -> f64 {
        (f64::from(self.value) - 50.0).mul_add(self.expression.clamp(0.0, 1.0), 50.0)
    }
}

/// Round and clamp a scalar to an allele.
pub(crate) fn to_allele(value: f64) -> u8 {
    let clamped = if value.is_finite() { value.clamp(0.0, 100.0) } else { 50.0 };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let allele = clamped.round() as u8;
    allele
}

// ---------------------------------------------------------------------------
// Learning profile
// ---------------------------------------------------------------------------

/// Learning dispositions carried in the strategy section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningProfile {
    /// Skill learning rate in `[0.3, 2.0]`.
    pub learning_rate: f64,
    /// Skill ceiling in `[60, 95]`.
    pub max_potential: f64,
    /// Plasticity in `[0, 1]`.
    pub plasticity: f64,
}

impl Default for LearningProfile {
    fn default() -> Self {
        Self {
            learning_rate: 1.0,
            max_potential: 80.0,
            plasticity: 0.5,
        }
    }
}

impl LearningProfile {
    fn to_genes(self) -> BTreeMap<String, Gene> {
        let scaled = [
            (self.learning_rate.clamp(0.3, 2.0) - 0.3) / 1.7 * 100.0,
            (self.max_potential.clamp(60.0, 95.0) - 60.0) / 35.0 * 100.0,
            self.plasticity.clamp(0.0, 1.0) * 100.0,
        ];
        STRATEGY_LOCI
            .iter()
            .zip(scaled)
            .map(|(locus, v)| ((*locus).to_owned(), Gene::encode(v)))
            .collect()
    }

    fn from_genes(genes: &BTreeMap<String, Gene>) -> Self {
        let unit = |locus: &str| genes.get(locus).map_or(0.5, |g| g.express() / 100.0);
        Self {
            learning_rate: unit("learning_rate").mul_add(1.7, 0.3),
            max_potential: unit("max_potential").mul_add(35.0, 60.0),
            plasticity: unit("plasticity"),
        }
    }
}

/// Deterministic projection of a genotype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phenotype {
    /// Behavioural trait values.
    pub traits: BTreeMap<String, f64>,
    /// Cultural dimension values.
    pub culture: BTreeMap<String, f64>,
    /// Learning dispositions.
    pub learning: LearningProfile,
}

impl Phenotype {
    /// Behavioural and cultural values in one map.
    pub fn expressed(&self) -> BTreeMap<String, f64> {
        self.traits
            .iter()
            .chain(&self.culture)
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Genotype
// ---------------------------------------------------------------------------

/// Section of a genotype.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenotypeSection {
    /// Personality traits.
    Behavioral,
    /// Learning dispositions.
    Strategy,
    /// Cultural dimensions.
    Cultural,
}

impl GenotypeSection {
    /// All sections in declaration order.
    pub const ALL: [Self; 3] = [Self::Behavioral, Self::Strategy, Self::Cultural];

    /// Stable name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Behavioral => "behavioral",
            Self::Strategy => "strategy",
            Self::Cultural => "cultural",
        }
    }
}

/// An agent's genotype.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Genotype {
    /// Behavioural genotype.
    pub behavioral: BTreeMap<String, Gene>,
    /// Strategy genotype.
    pub strategy: BTreeMap<String, Gene>,
    /// Cultural genotype.
    pub cultural: BTreeMap<String, Gene>,
}

impl Genotype {
    /// Encode an agent's current dispositions.
    ///
    /// Fails with [`PopulationError::InvalidGene`] for non-finite values.
    pub fn encode(
        personality: &BTreeMap<String, f64>,
        culture: &BTreeMap<String, f64>,
        learning: LearningProfile,
    ) -> Result<Self, PopulationError> {
        let section = |values: &BTreeMap<String, f64>| {
            values
                .iter()
                .map(|(locus, v)| {
                    if v.is_finite() {
                        Ok((locus.clone(), Gene::encode(*v)))
                    } else {
                        Err(PopulationError::InvalidGene {
                            locus: locus.clone(),
                            reason: format!("value {v} is not finite"),
                        })
                    }
                })
                .collect::<Result<BTreeMap<_, _>, _>>()
        };
        Ok(Self {
            behavioral: section(personality)?,
            strategy: learning.to_genes(),
            cultural: section(culture)?,
        })
    }

    /// One section.
    pub const fn section(&self, section: GenotypeSection) -> &BTreeMap<String, Gene> {
        match section {
            GenotypeSection::Behavioral => &self.behavioral,
            GenotypeSection::Strategy => &self.strategy,
            GenotypeSection::Cultural => &self.cultural,
        }
    }

    /// One section, mutably.
    pub const fn section_mut(&mut self, section: GenotypeSection) -> &mut BTreeMap<String, Gene> {
        match section {
            GenotypeSection::Behavioral => &mut self.behavioral,
            GenotypeSection::Strategy => &mut self.strategy,
            GenotypeSection::Cultural => &mut self.cultural,
        }
    }

    /// Total number of loci.
    pub fn gene_count(&self) -> usize {
        self.behavioral
            .len()
            .saturating_add(self.strategy.len())
            .saturating_add(self.cultural.len())
    }

    /// Project to a phenotype.
    pub fn phenotype(&self) -> Phenotype {
        let express = |genes: &BTreeMap<String, Gene>| {
            genes
                .iter()
                .map(|(locus, g)| (locus.clone(), g.express()))
                .collect()
        };
        Phenotype {
            traits: express(&self.behavioral),
            culture: express(&self.cultural),
            learning: LearningProfile::from_genes(&self.strategy),
        }
    }
}

// ---------------------------------------------------------------------------
// Crossover
// ---------------------------------------------------------------------------

fn combine(
    primary: &Genotype,
    secondary: &Genotype,
    pick: impl Fn(&Gene, &Gene) -> Gene,
) -> Genotype {
    let mut child = Genotype::default();
    for section in GenotypeSection::ALL {
        let a = primary.section(section);
        let b = secondary.section(section);
        let out = child.section_mut(section);
        for (locus, gene) in a {
            let g = b.get(locus).map_or(*gene, |other| pick(gene, other));
            out.insert(locus.clone(), g);
        }
        for (locus, gene) in b {
            out.entry(locus.clone()).or_insert(*gene);
        }
    }
    child
}

/// Primary-dominant inheritance: at each locus the primary parent's gene
/// is kept unless the secondary's is strictly more dominant.
pub fn primary_dominant(primary: &Genotype, secondary: &Genotype) -> Genotype {
    combine(primary, secondary, |a, b| {
        if b.dominance > a.dominance { *b } else { *a }
    })
}

/// Balanced blend: expression-weighted mean of both alleles, mean metadata.
pub fn balanced_blend(a: &Genotype, b: &Genotype) -> Genotype {
    combine(a, b, |x, y| {
        let wx = x.expression.clamp(0.0, 1.0);
        let wy = y.expression.clamp(0.0, 1.0);
        let total = wx + wy;
        let value = if total > 0.0 {
            f64::from(x.value).mul_add(wx, f64::from(y.value) * wy) / total
        } else {
            (f64::from(x.value) + f64::from(y.value)) / 2.0
        };
        Gene {
            value: to_allele(value),
            dominance: f64::midpoint(x.dominance, y.dominance),
            expression: f64::midpoint(x.expression, y.expression),
        }
    })
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// A gene mutation applied to an offspring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Generation in which the mutation happened.
    pub generation: u64,
    /// Section of the mutated locus.
    pub section: GenotypeSection,
    /// Locus name.
    pub locus: String,
    /// Allele before.
    pub before: u8,
    /// Allele after.
    pub after: u8,
}

/// Standard normal sample scaled by `sigma` (Box–Muller).
pub fn gaussian<R: Rng>(rng: &mut R, sigma: f64) -> f64 {
    // u1 in (0, 1] keeps ln finite.
    let u1: f64 = 1.0 - rng.random::<f64>();
    let u2: f64 = rng.random::<f64>();
    let radius = (-2.0 * u1.ln()).sqrt();
    radius * (std::f64::consts::TAU * u2).cos() * sigma
}

/// Mutate every gene with probability `rate` by a Gaussian step.
pub fn mutate<R: Rng>(
    genotype: &mut Genotype,
    rate: f64,
    sigma: f64,
    generation: u64,
    rng: &mut R,
) -> Vec<MutationRecord> {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    let mut records = Vec::new();
    for section in GenotypeSection::ALL {
        for (locus, gene) in genotype.section_mut(section).iter_mut() {
            if !rng.random_bool(rate) {
                continue;
            }
            let before = gene.value;
            gene.value = to_allele(f64::from(before) + gaussian(rng, sigma));
            records.push(MutationRecord {
                generation,
                section,
                locus: locus.clone(),
                before,
                after: gene.value,
            });
        }
    }
    records
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn genotype(cooperation: f64, risk: f64) -> Genotype {
        Genotype::encode(
            &BTreeMap::from([
                ("cooperation".to_owned(), cooperation),
                ("risk_tolerance".to_owned(), risk),
            ]),
            &BTreeMap::from([("individualism".to_owned(), 40.0)]),
            LearningProfile::default(),
        )
        .unwrap()
    }

    #[test]
    fn phenotype_round_trips_encoded_values() {
        let phenotype = genotype(80.0, 20.0).phenotype();
        assert!((phenotype.traits["cooperation"] - 80.0).abs() < 1e-9);
        assert!((phenotype.culture["individualism"] - 40.0).abs() < 1e-9);
        assert!((phenotype.learning.learning_rate - 1.0).abs() < 0.02);
        assert!((phenotype.learning.max_potential - 80.0).abs() < 0.5);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let result = Genotype::encode(
            &BTreeMap::from([("cooperation".to_owned(), f64::NAN)]),
            &BTreeMap::new(),
            LearningProfile::default(),
        );
        assert!(matches!(result, Err(PopulationError::InvalidGene { .. })));
    }

    #[test]
    fn primary_dominant_keeps_primary_on_ties() {
        let a = genotype(80.0, 20.0);
        let mut b = genotype(20.0, 90.0);
        b.behavioral.get_mut("risk_tolerance").unwrap().dominance = 0.9;
        let child = primary_dominant(&a, &b);
        assert_eq!(child.behavioral["cooperation"].value, 80);
        assert_eq!(child.behavioral["risk_tolerance"].value, 90);
    }

    #[test]
    fn balanced_blend_averages() {
        let child = balanced_blend(&genotype(80.0, 20.0), &genotype(20.0, 90.0));
        assert_eq!(child.behavioral["cooperation"].value, 50);
        assert_eq!(child.behavioral["risk_tolerance"].value, 55);
    }

    #[test]
    fn mutation_stays_in_range_and_is_recorded() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut g = genotype(99.0, 1.0);
        let records = mutate(&mut g, 1.0, 50.0, 3, &mut rng);
        assert_eq!(records.len(), g.gene_count());
        assert!(records.iter().all(|r| r.generation == 3 && r.after <= 100));
    }

    #[test]
    fn zero_rate_never_mutates() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut g = genotype(50.0, 50.0);
        let before = g.clone();
        assert!(mutate(&mut g, 0.0, 5.0, 1, &mut rng).is_empty());
        assert_eq!(g, before);
    }

    #[test]
    fn gaussian_has_roughly_the_requested_spread() {
        let mut rng = SmallRng::seed_from_u64(11);
        let samples: Vec<f64> = (0..4000).map(|_| gaussian(&mut rng, 5.0)).collect();
        let mean = samples.iter().sum::<f64>() / 4000.0;
        let var = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 4000.0;
        assert!(mean.abs() < 0.5, "mean {mean}");
        assert!((var.sqrt() - 5.0).abs() < 0.5, "sd {}", var.sqrt());
    }
}
