//! Behavioural signatures, diversity and emergent-cluster detection.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercator_types::{AgentId, EmergentBehavior, EmergentBehaviorId, IdSource};

use crate::config::EvolutionConfig;
use crate::count_f64;

/// Bucket label for a value in `[0, 100]`.
fn bucket(value: f64, levels: u8) -> String {
    let levels = levels.max(1);
    let width = 100.0 / f64::from(levels);
    let raw = (value.clamp(0.0, 100.0) / width).floor();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (raw as u8).min(levels.saturating_sub(1));
    if levels == 3 {
        ["low", "mid", "high"]
            .get(usize::from(index))
            .map_or_else(|| index.to_string(), |s| (*s).to_owned())
    } else {
        format!("b{index}")
    }
}

/// Discretised behavioural signature, e.g.
/// `cooperation:high|risk_tolerance:low|analytical_thinking:mid`.
///
/// Missing traits are treated as neutral (50).
pub fn signature(expressed: &BTreeMap<String, f64>, config: &EvolutionConfig) -> String {
    config
        .signature_traits
        .iter()
        .map(|name| {
            let value = expressed.get(name).copied().unwrap_or(50.0);
            format!("{name}:{}", bucket(value, config.signature_levels))
        })
        .collect::<Vec<_>>()
        .join("|")
}

/// Number of agents per signature.
pub fn signature_counts<'a>(signatures: impl IntoIterator<Item = &'a String>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for s in signatures {
        let count: &mut usize = counts.entry(s.clone()).or_default();
        *count = count.saturating_add(1);
    }
    counts
}

/// Shannon diversity index (natural log) of a count distribution.
pub fn shannon_index(counts: &BTreeMap<String, usize>) -> f64 {
    let total: usize = counts.values().sum();
    if total == 0 {
        return 0.0;
    }
    let total = count_f64(total);
    counts
        .values()
        .filter(|c| **c > 0)
        .map(|c| {
            let p = count_f64(*c) / total;
            -p * p.ln()
        })
        .sum()
}

/// Records emergent behaviours and remembers which signatures were seen.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmergenceDetector {
    /// Signatures already reported.
    seen: BTreeSet<String>,
    /// Every behaviour reported, oldest first.
    log: Vec<EmergentBehavior>,
}

impl EmergenceDetector {
    /// Create an empty detector.
    pub const fn new() -> Self {
        Self {
            seen: BTreeSet::new(),
            log: Vec::new(),
        }
    }

    /// Cluster agents by signature and record every cluster larger than
    /// `threshold` of the population that was not reported before.
    pub fn detect(
        &mut self,
        signatures: &BTreeMap<AgentId, String>,
        generation: u64,
        now: DateTime<Utc>,
        threshold: f64,
        ids: &mut IdSource,
    ) -> Vec<EmergentBehavior> {
        if signatures.is_empty() {
            return Vec::new();
        }
        let mut clusters: BTreeMap<&str, Vec<AgentId>> = BTreeMap::new();
        for (id, s) in signatures {
            clusters.entry(s.as_str()).or_default().push(*id);
        }
        let population = count_f64(signatures.len());

        let mut detected = Vec::new();
        for (sig, participants) in clusters {
            let share = count_f64(participants.len()) / population;
            if share <= threshold || self.seen.contains(sig) {
                continue;
            }
            self.seen.insert(sig.to_owned());
            let behavior = EmergentBehavior {
                id: EmergentBehaviorId::next_from(ids),
                generation,
                signature: sig.to_owned(),
                participant_count: participants.len(),
                share,
                participants,
                detected_at: now,
            };
            tracing::info!(
                generation,
                signature = %behavior.signature,
                participants = behavior.participant_count,
                share,
                "emergent behavior detected"
            );
            self.log.push(behavior.clone());
            detected.push(behavior);
        }
        detected
    }

    /// Every behaviour reported so far.
    pub fn log(&self) -> &[EmergentBehavior] {
        &self.log
    }

    /// Whether a signature was reported before.
    pub fn has_seen(&self, signature: &str) -> bool {
        self.seen.contains(signature)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn traits(cooperation: f64, risk: f64, analytical: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("cooperation".to_owned(), cooperation),
            ("risk_tolerance".to_owned(), risk),
            ("analytical_thinking".to_owned(), analytical),
        ])
    }

    #[test]
    fn signature_discretises_into_three_levels() {
        let config = EvolutionConfig::default();
        assert_eq!(
            signature(&traits(80.0, 10.0, 50.0), &config),
            "cooperation:high|risk_tolerance:low|analytical_thinking:mid"
        );
        assert_eq!(
            signature(&traits(100.0, 0.0, 66.0), &config),
            "cooperation:high|risk_tolerance:low|analytical_thinking:mid"
        );
    }

    #[test]
    fn shannon_of_uniform_and_single() {
        let single = BTreeMap::from([("a".to_owned(), 10)]);
        assert!(shannon_index(&single).abs() < 1e-12);
        let uniform = BTreeMap::from([("a".to_owned(), 5), ("b".to_owned(), 5)]);
        assert!((shannon_index(&uniform) - std::f64::consts::LN_2).abs() < 1e-12);
    }

    #[test]
    fn dominant_cluster_is_reported_once() {
        let mut ids = IdSource::new(8);
        let signatures: BTreeMap<AgentId, String> = (0..100)
            .map(|i| {
                let s = if i < 80 { "dominant".to_owned() } else { format!("other-{i}") };
                (AgentId::next_from(&mut ids), s)
            })
            .collect();
        let mut detector = EmergenceDetector::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        let first = detector.detect(&signatures, 1, now, 0.3, &mut ids);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].participant_count, 80);
        assert!((first[0].share - 0.8).abs() < 1e-9);
        let second = detector.detect(&signatures, 2, now, 0.3, &mut ids);
        assert!(second.is_empty());
        assert_eq!(detector.log().len(), 1);
    }
}
