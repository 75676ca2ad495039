//! Coarse pre-ranking of large candidate pools.
//!
//! The genetic search is the expensive step. For pools above the activation
//! threshold, each track is ranked by its own weighted distance to the
//! target and only the `top_k` nearest reach the optimizer. Per-track
//! scoring runs on the rayon pool; results keep pool order, so the output
//! does not depend on scheduling.

use crate::config::CoarseFilterConfig;
use crate::fitness::FitnessEvaluator;
use crate::track::{CandidatePool, TargetVibe};
use log::debug;
use rayon::prelude::*;

#[derive(Debug, Clone, Copy)]
pub struct CoarseFilter {
    config: CoarseFilterConfig,
}

impl CoarseFilter {
    #[must_use]
    pub const fn new(config: CoarseFilterConfig) -> Self {
        Self { config }
    }

    /// Whether a pool of `pool_size` tracks gets pre-ranked.
    #[must_use]
    pub const fn applies_to(&self, pool_size: usize) -> bool {
        pool_size > self.config.activation_threshold
    }

    /// Pool indices sorted by ascending distance to `target`.
    ///
    /// Ties keep pool order; non-finite distances sort last.
    #[must_use]
    pub fn rank(
        &self,
        pool: &CandidatePool,
        target: &TargetVibe,
        evaluator: &FitnessEvaluator,
    ) -> Vec<(usize, f64)> {
        let mut ranked: Vec<(usize, f64)> = pool
            .entries()
            .par_iter()
            .enumerate()
            .map(|(index, entry)| {
                let distance = evaluator.track_distance(&entry.chromosome, target);
                let distance = if distance.is_finite() { distance } else { f64::INFINITY };
                (index, distance)
            })
            .collect();

        ranked.sort_by(|(ia, a), (ib, b)| a.total_cmp(b).then(ia.cmp(ib)));
        ranked
    }

    /// Reduce `pool` to its `top_k` nearest tracks when the filter applies;
    /// otherwise return a copy of the pool.
    #[must_use]
    pub fn apply(
        &self,
        pool: &CandidatePool,
        target: &TargetVibe,
        evaluator: &FitnessEvaluator,
    ) -> CandidatePool {
        if !self.applies_to(pool.len()) {
            return pool.clone();
        }

        let ranked = self.rank(pool, target, evaluator);
        let entries = ranked
            .into_iter()
            .take(self.config.top_k)
            .filter_map(|(index, _)| pool.get(index).cloned())
            .collect::<Vec<_>>();

        debug!(
            "Coarse filter reduced pool from {} to {} tracks",
            pool.len(),
            entries.len()
        );
        CandidatePool::from_entries(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::{ChromosomeVector, TIMBRE_COEFFICIENTS};
    use crate::config::OptimizerConfig;
    use crate::track::Track;

    fn pool_with_tempos(tempos: &[f64]) -> CandidatePool {
        let tracks = tempos.iter().enumerate().map(|(i, &tempo)| {
            Track::new(i.to_string(), "DEEZER", format!("T{i}"), format!("A{i}")).with_chromosome(
                ChromosomeVector::from_parts(tempo, 2000.0, 0.1, [10.0; TIMBRE_COEFFICIENTS]),
            )
        });
        CandidatePool::from_tracks(tracks).0
    }

    fn target(tempo: f64) -> TargetVibe {
        TargetVibe::from_seed(ChromosomeVector::from_parts(
            tempo,
            2000.0,
            0.1,
            [10.0; TIMBRE_COEFFICIENTS],
        ))
    }

    #[test]
    fn test_keeps_nearest_tracks() {
        let pool = pool_with_tempos(&[200.0, 122.0, 60.0, 119.0, 150.0, 120.0]);
        let evaluator = FitnessEvaluator::from_config(&OptimizerConfig::default()).unwrap();
        let filter = CoarseFilter::new(CoarseFilterConfig { activation_threshold: 3, top_k: 3 });

        let reduced = filter.apply(&pool, &target(120.0), &evaluator);
        let ids: Vec<&str> = reduced.iter().map(|e| e.track.external_id.as_str()).collect();
        assert_eq!(ids, vec!["5", "3", "1"]);
    }

    #[test]
    fn test_small_pool_passes_through() {
        let pool = pool_with_tempos(&[100.0, 110.0]);
        let evaluator = FitnessEvaluator::from_config(&OptimizerConfig::default()).unwrap();
        let filter = CoarseFilter::new(CoarseFilterConfig::default());

        assert!(!filter.applies_to(pool.len()));
        assert_eq!(filter.apply(&pool, &target(100.0), &evaluator), pool);
    }

    #[test]
    fn test_non_finite_distance_sorts_last() {
        let mut pool_tracks: Vec<Track> = (0..4)
            .map(|i| {
                Track::new(i.to_string(), "DEEZER", "T", "A").with_chromosome(
                    ChromosomeVector::from_parts(120.0, 2000.0, 0.1, [10.0; TIMBRE_COEFFICIENTS]),
                )
            })
            .collect();
        pool_tracks[0].chromosome = Some(ChromosomeVector::new([f64::NAN; 16]));
        let pool = CandidatePool::from_tracks(pool_tracks).0;

        let evaluator = FitnessEvaluator::from_config(&OptimizerConfig::default()).unwrap();
        let filter = CoarseFilter::new(CoarseFilterConfig { activation_threshold: 0, top_k: 4 });
        let ranked = filter.rank(&pool, &target(120.0), &evaluator);

        assert_eq!(ranked.last().map(|(i, _)| *i), Some(0));
        assert_eq!(ranked[0].0, 1);
    }
}
