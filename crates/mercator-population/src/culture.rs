//! Cultural norms and their diffusion along social links.
//!
//! Norms are the cultural-genotype loci. Diffusion is synchronous: every
//! agent moves toward the mean of its linked agents' values as they stood
//! before the pass.

use std::collections::BTreeMap;

use mercator_types::AgentId;

use crate::count_f64;
use crate::genotype::to_allele;
use crate::profile::EvolutionaryProfile;

/// Summary of one diffusion pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CultureReport {
    /// Agents with at least one registered neighbour.
    pub connected: usize,
    /// Loci whose allele changed.
    pub changed_loci: usize,
    /// Mean absolute change over changed loci.
    pub mean_shift: f64,
}

/// Population-wide mean of each cultural norm (expressed values).
pub fn cultural_norms(profiles: &BTreeMap<AgentId, EvolutionaryProfile>) -> BTreeMap<String, f64> {
    let mut sums: BTreeMap<String, (f64, u32)> = BTreeMap::new();
    for profile in profiles.values() {
        for (locus, gene) in &profile.genotype.cultural {
            let entry = sums.entry(locus.clone()).or_insert((0.0, 0));
            entry.0 += gene.express();
            entry.1 = entry.1.saturating_add(1);
        }
    }
    sums.into_iter()
        .filter(|(_, (_, n))| *n > 0)
        .map(|(locus, (sum, n))| (locus, sum / f64::from(n)))
        .collect()
}

/// Move every agent's cultural alleles toward its neighbours' mean at
/// `rate`. Links to unregistered agents are ignored.
pub fn diffuse(
    profiles: &mut BTreeMap<AgentId, EvolutionaryProfile>,
    links: &BTreeMap<AgentId, Vec<AgentId>>,
    rate: f64,
) -> CultureReport {
    let rate = if rate.is_finite() { rate.clamp(0.0, 1.0) } else { 0.0 };
    let before: BTreeMap<AgentId, BTreeMap<String, u8>> = profiles
        .iter()
        .map(|(id, p)| {
            let alleles = p.genotype.cultural.iter().map(|(l, g)| (l.clone(), g.value)).collect();
            (*id, alleles)
        })
        .collect();

    let mut report = CultureReport::default();
    let mut total_shift = 0.0;
    for (id, neighbours) in links {
        let Some(profile) = profiles.get_mut(id) else {
            continue;
        };
        let known: Vec<&BTreeMap<String, u8>> =
            neighbours.iter().filter(|n| *n != id).filter_map(|n| before.get(n)).collect();
        if known.is_empty() {
            continue;
        }
        report.connected = report.connected.saturating_add(1);
        for (locus, gene) in &mut profile.genotype.cultural {
            let values: Vec<f64> = known
                .iter()
                .filter_map(|m| m.get(locus))
                .map(|v| f64::from(*v))
                .collect();
            if values.is_empty() {
                continue;
            }
            let mean = values.iter().sum::<f64>() / count_f64(values.len());
            let current = f64::from(gene.value);
            let next = to_allele(rate.mul_add(mean - current, current));
            if next != gene.value {
                total_shift += (f64::from(next) - current).abs();
                report.changed_loci = report.changed_loci.saturating_add(1);
                gene.value = next;
            }
        }
        for (locus, gene) in &profile.genotype.cultural {
            profile.expressed.insert(locus.clone(), gene.express());
        }
    }
    if report.changed_loci > 0 {
        report.mean_shift = total_shift / count_f64(report.changed_loci);
    }
    tracing::debug!(
        connected = report.connected,
        changed_loci = report.changed_loci,
        mean_shift = report.mean_shift,
        "cultural diffusion"
    );
    report
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::genotype::{Genotype, LearningProfile};
    use mercator_types::IdSource;

    fn profile(id: AgentId, individualism: f64) -> EvolutionaryProfile {
        let genotype = Genotype::encode(
            &BTreeMap::new(),
            &BTreeMap::from([("individualism".to_owned(), individualism)]),
            LearningProfile::default(),
        )
        .unwrap();
        EvolutionaryProfile::founder(id, genotype, 0, 0.5)
    }

    #[test]
    fn linked_agents_converge() {
        let mut ids = IdSource::new(1);
        let a = AgentId::next_from(&mut ids);
        let b = AgentId::next_from(&mut ids);
        let mut profiles = BTreeMap::from([(a, profile(a, 20.0)), (b, profile(b, 80.0))]);
        let links = BTreeMap::from([(a, vec![b]), (b, vec![a])]);
        let report = diffuse(&mut profiles, &links, 0.5);
        assert_eq!(report.connected, 2);
        assert_eq!(profiles[&a].genotype.cultural["individualism"].value, 50);
        assert_eq!(profiles[&b].genotype.cultural["individualism"].value, 50);
        assert!((profiles[&a].expressed["individualism"] - 50.0).abs() < 1e-9);
    }

    #[test]
    fn isolated_agents_are_untouched() {
        let mut ids = IdSource::new(1);
        let a = AgentId::next_from(&mut ids);
        let ghost = AgentId::next_from(&mut ids);
        let mut profiles = BTreeMap::from([(a, profile(a, 20.0))]);
        let links = BTreeMap::from([(a, vec![ghost])]);
        let report = diffuse(&mut profiles, &links, 1.0);
        assert_eq!(report, CultureReport::default());
        assert_eq!(profiles[&a].genotype.cultural["individualism"].value, 20);
    }

    #[test]
    fn norms_are_population_means() {
        let mut ids = IdSource::new(1);
        let a = AgentId::next_from(&mut ids);
        let b = AgentId::next_from(&mut ids);
        let profiles = BTreeMap::from([(a, profile(a, 20.0)), (b, profile(b, 60.0))]);
        let norms = cultural_norms(&profiles);
        assert!((norms["individualism"] - 40.0).abs() < 1e-9);
    }
}
