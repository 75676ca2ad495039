//! Playlist fitness scoring.
//!
//! A playlist is scored by how close its *vibe* (the elementwise mean of its
//! members' chromosomes) is to the target, minus a penalty for artists that
//! appear too often.
//!
//! ```text
//! fitness(playlist) = max(similarity(vibe, target) - diversity_penalty, 0)
//! ```
//!
//! Two similarity strategies are available, selected by
//! [`FitnessKind`](crate::config::FitnessKind):
//!
//! - [`CosineSimilarity`]: direction only, range [-1, 1]
//! - [`WeightedDistance`]: `1 / (1 + d)` over a weighted Euclidean distance,
//!   range (0, 1]

use crate::chromosome::{ChromosomeVector, Normalizer, CHROMOSOME_LEN};
use crate::config::{FitnessKind, OptimizerConfig};
use crate::error::Result;
use crate::track::{CandidatePool, PoolEntry, TargetVibe};
use log::trace;
use std::collections::HashMap;

/// Similarity between a playlist vibe and the target. Higher is better.
pub trait FitnessStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn similarity(&self, playlist_vibe: &ChromosomeVector, target: &ChromosomeVector) -> f64;
}

/// Cosine of the angle between the normalized vectors.
#[derive(Debug, Clone)]
pub struct CosineSimilarity {
    normalizer: Normalizer,
}

impl CosineSimilarity {
    #[must_use]
    pub const fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }
}

impl FitnessStrategy for CosineSimilarity {
    fn name(&self) -> &'static str {
        "cosine"
    }

    fn similarity(&self, playlist_vibe: &ChromosomeVector, target: &ChromosomeVector) -> f64 {
        let a = self.normalizer.normalize(playlist_vibe);
        let b = self.normalizer.normalize(target);

        let norm_a = a.norm();
        let norm_b = b.norm();
        // A zero vector has no direction.
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        (a.dot(&b) / (norm_a * norm_b)).clamp(-1.0, 1.0)
    }
}

/// Weighted Euclidean distance mapped through `1 / (1 + d)`.
#[derive(Debug, Clone)]
pub struct WeightedDistance {
    normalizer: Normalizer,
    weights: [f64; CHROMOSOME_LEN],
}

impl WeightedDistance {
    #[must_use]
    pub const fn new(normalizer: Normalizer, weights: [f64; CHROMOSOME_LEN]) -> Self {
        Self { normalizer, weights }
    }

    /// Norm of the weighted difference of the normalized vectors.
    #[must_use]
    pub fn distance(&self, a: &ChromosomeVector, b: &ChromosomeVector) -> f64 {
        let diff = self
            .normalizer
            .normalize(a)
            .zip_with(&self.normalizer.normalize(b), |x, y| x - y);

        diff.as_array()
            .iter()
            .zip(&self.weights)
            .map(|(d, w)| (d * w).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl FitnessStrategy for WeightedDistance {
    fn name(&self) -> &'static str {
        "weighted-distance"
    }

    fn similarity(&self, playlist_vibe: &ChromosomeVector, target: &ChromosomeVector) -> f64 {
        1.0 / (1.0 + self.distance(playlist_vibe, target))
    }
}

/// Penalty for artists exceeding the per-playlist cap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiversityPenalty {
    pub cap: usize,
    pub per_excess: f64,
}

impl DiversityPenalty {
    /// Sum of `(count - cap) * per_excess` over every artist above the cap.
    pub fn penalty<'a>(&self, artists: impl IntoIterator<Item = &'a str>) -> f64 {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for artist in artists {
            *counts.entry(artist).or_insert(0) += 1;
        }

        let excess: usize = counts
            .values()
            .map(|&count| count.saturating_sub(self.cap))
            .sum();

        #[allow(clippy::cast_precision_loss)]
        let penalty = excess as f64 * self.per_excess;
        penalty
    }
}

impl Default for DiversityPenalty {
    fn default() -> Self {
        Self {
            cap: 2,
            per_excess: 0.3,
        }
    }
}

/// Scores playlists drawn from a candidate pool.
pub struct FitnessEvaluator {
    strategy: Box<dyn FitnessStrategy>,
    diversity: DiversityPenalty,
    distance: WeightedDistance,
}

impl FitnessEvaluator {
    /// Build an evaluator from explicit parts.
    ///
    /// `distance` is the single-track metric used for coarse filtering.
    #[must_use]
    pub fn new(
        strategy: Box<dyn FitnessStrategy>,
        diversity: DiversityPenalty,
        distance: WeightedDistance,
    ) -> Self {
        Self {
            strategy,
            diversity,
            distance,
        }
    }

    /// Build the evaluator described by `config`.
    ///
    /// # Errors
    ///
    /// Fails if the normalization references are invalid.
    pub fn from_config(config: &OptimizerConfig) -> Result<Self> {
        let normalizer = config.normalizer()?;
        let distance = WeightedDistance::new(normalizer, config.weight_vector);
        let strategy: Box<dyn FitnessStrategy> = match config.fitness {
            FitnessKind::Cosine => Box::new(CosineSimilarity::new(normalizer)),
            FitnessKind::WeightedDistance => Box::new(distance.clone()),
        };

        Ok(Self::new(
            strategy,
            DiversityPenalty {
                cap: config.diversity_cap,
                per_excess: config.diversity_penalty,
            },
            distance,
        ))
    }

    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Score an individual given as pool indices.
    #[must_use]
    pub fn score(&self, pool: &CandidatePool, genes: &[usize], target: &TargetVibe) -> f64 {
        let entries: Vec<&PoolEntry> = genes.iter().filter_map(|&i| pool.get(i)).collect();
        self.score_entries(&entries, target)
    }

    /// Score a playlist of pool entries.
    ///
    /// Empty playlists and playlists containing a non-finite chromosome
    /// score 0.
    #[must_use]
    pub fn score_entries(&self, entries: &[&PoolEntry], target: &TargetVibe) -> f64 {
        if entries.is_empty() {
            return 0.0;
        }
        if let Some(bad) = entries.iter().find(|e| !e.chromosome.is_finite()) {
            trace!("Non-finite chromosome in `{}', scoring playlist as 0", bad.track);
            return 0.0;
        }

        let Some(vibe) = ChromosomeVector::mean_of(entries.iter().map(|e| &e.chromosome)) else {
            return 0.0;
        };

        let similarity = self.strategy.similarity(&vibe, target.vector());
        if !similarity.is_finite() {
            return 0.0;
        }

        let penalty = self
            .diversity
            .penalty(entries.iter().map(|e| e.track.artist.as_str()));

        (similarity - penalty).max(0.0)
    }

    /// Single-track weighted distance to the target. Lower is closer.
    #[must_use]
    pub fn track_distance(&self, chromosome: &ChromosomeVector, target: &TargetVibe) -> f64 {
        self.distance.distance(chromosome, target.vector())
    }
}

impl std::fmt::Debug for FitnessEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FitnessEvaluator")
            .field("strategy", &self.strategy.name())
            .field("diversity", &self.diversity)
            .finish_non_exhaustive()
    }
}
