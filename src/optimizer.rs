//! Evolutionary playlist optimizer.
//!
//! Searches for the `playlist_size` tracks whose combined vibe best matches
//! a target, using a generational genetic algorithm:
//!
//! ```text
//! INIT ─► EVALUATING ─► SELECTING ─► BREEDING ─┐
//!              ▲                               │
//!              └───────────────────────────────┘
//!                      │ budget spent / early stop
//!                      ▼
//!                  TERMINATED
//! ```
//!
//! Individuals are ordered lists of pool indices. Each generation is scored
//! by the [`FitnessEvaluator`], sorted, and the top `elitism_count`
//! individuals are copied forward unchanged. The rest of the next generation
//! is bred from parents drawn with replacement from the top
//! `breeding_fraction` of the population, via single-point crossover and an
//! optional single-position mutation.
//!
//! The optimizer holds no shared state: every run owns its population and
//! random source, so concurrent runs never interfere. Randomness is
//! injected, which makes runs reproducible under a fixed seed.
//!
//! # Examples
//!
//! ```
//! use beatmatch::chromosome::ChromosomeVector;
//! use beatmatch::config::OptimizerConfig;
//! use beatmatch::optimizer::PlaylistOptimizer;
//! use beatmatch::track::{CandidatePool, TargetVibe, Track};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let tracks = (0..12).map(|i| {
//!     let mut values = [100.0; 16];
//!     values[0] = 90.0 + f64::from(i);
//!     Track::new(i.to_string(), "DEEZER", format!("Song {i}"), format!("Artist {i}"))
//!         .with_chromosome(ChromosomeVector::new(values))
//! });
//! let (pool, _) = CandidatePool::from_tracks(tracks);
//! let target = TargetVibe::from_seed(ChromosomeVector::new([100.0; 16]));
//!
//! let config = OptimizerConfig { playlist_size: 4, ..OptimizerConfig::default() };
//! let optimizer = PlaylistOptimizer::new(config)?;
//! let playlist = optimizer.optimize(&pool, &target, &mut StdRng::seed_from_u64(7))?;
//!
//! assert_eq!(playlist.tracks.len(), 4);
//! # Ok::<(), beatmatch::error::OptimizerError>(())
//! ```

use crate::coarse_filter::CoarseFilter;
use crate::config::{DuplicatePolicy, OptimizerConfig};
use crate::error::{OptimizerError, Result};
use crate::fitness::FitnessEvaluator;
use crate::track::{CandidatePool, TargetVibe, Track};
use log::{debug, info, trace};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::borrow::Cow;
use std::collections::HashSet;

/// One candidate playlist: an ordered list of pool indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Individual {
    genes: Vec<usize>,
}

impl Individual {
    #[must_use]
    pub const fn new(genes: Vec<usize>) -> Self {
        Self { genes }
    }

    /// Uniform sample of `size` distinct indices from `0..pool_len`.
    pub fn random<R: Rng + ?Sized>(pool_len: usize, size: usize, rng: &mut R) -> Self {
        Self {
            genes: index::sample(rng, pool_len, size.min(pool_len)).into_vec(),
        }
    }

    #[must_use]
    pub fn genes(&self) -> &[usize] {
        &self.genes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.genes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// True when no pool index appears twice.
    #[must_use]
    pub fn is_distinct(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.genes.len());
        self.genes.iter().all(|g| seen.insert(*g))
    }
}

/// An individual together with its fitness.
#[derive(Debug, Clone)]
struct Scored {
    individual: Individual,
    fitness: f64,
}

/// Summary of one evaluated generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationStats {
    pub generation: usize,
    /// Best fitness within this generation.
    pub best: f64,
    pub mean: f64,
    /// Best fitness seen so far, this generation included.
    pub best_ever: f64,
    /// Single-position substitutions applied while breeding the next
    /// generation.
    pub mutations: usize,
}

/// Result of an optimization run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub tracks: Vec<Track>,
    pub fitness: f64,
    pub generations_run: usize,
    pub stopped_early: bool,
    /// Size of the pool the genetic search worked on, after coarse filtering.
    pub pool_size: usize,
    pub history: Vec<GenerationStats>,
}

/// Single-point crossover: `parent1[..cut] ++ parent2[cut..]`.
///
/// `cut` is clamped to the parents' length.
#[must_use]
pub fn crossover<T: Clone>(parent1: &[T], parent2: &[T], cut: usize) -> Vec<T> {
    let cut = cut.min(parent1.len()).min(parent2.len());
    parent1[..cut]
        .iter()
        .chain(&parent2[cut..])
        .cloned()
        .collect()
}

/// Replace repeated genes with unused genes of `parent1`, then `parent2`.
///
/// Positions keep their first occurrence; later repeats are refilled in
/// order. If both parents are exhausted the repeat is left in place.
pub fn repair_duplicates(child: &mut [usize], parent1: &[usize], parent2: &[usize]) {
    let mut present: HashSet<usize> = child.iter().copied().collect();
    if present.len() == child.len() {
        return;
    }

    let mut spares = parent1.iter().chain(parent2).copied();
    let mut seen = HashSet::with_capacity(child.len());
    for slot in child.iter_mut() {
        if seen.insert(*slot) {
            continue;
        }
        if let Some(spare) = spares.by_ref().find(|g| !present.contains(g)) {
            present.insert(spare);
            seen.insert(spare);
            *slot = spare;
        }
    }
}

/// Genetic playlist optimizer parameterized by a fitness evaluator and a
/// configuration.
#[derive(Debug)]
pub struct PlaylistOptimizer {
    config: OptimizerConfig,
    evaluator: FitnessEvaluator,
}

impl PlaylistOptimizer {
    /// Build an optimizer whose evaluator follows `config`.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InvalidConfig`] for an invalid configuration.
    pub fn new(config: OptimizerConfig) -> Result<Self> {
        config.validate()?;
        let evaluator = FitnessEvaluator::from_config(&config)?;
        Ok(Self { config, evaluator })
    }

    /// Build an optimizer with a custom evaluator.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InvalidConfig`] for an invalid configuration.
    pub fn with_evaluator(config: OptimizerConfig, evaluator: FitnessEvaluator) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, evaluator })
    }

    #[must_use]
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    #[must_use]
    pub const fn evaluator(&self) -> &FitnessEvaluator {
        &self.evaluator
    }

    /// Run with a random source seeded from `config.seed`, or from entropy
    /// when no seed is configured.
    ///
    /// # Errors
    ///
    /// See [`PlaylistOptimizer::optimize`].
    pub fn run(&self, pool: &CandidatePool, target: &TargetVibe) -> Result<Recommendation> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.optimize(pool, target, &mut rng)
    }

    /// Search `pool` for the playlist that best matches `target`.
    ///
    /// A pool no larger than `playlist_size` is returned whole, without
    /// running the search.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InsufficientCandidates`] for an empty pool.
    pub fn optimize<R: Rng + ?Sized>(
        &self,
        pool: &CandidatePool,
        target: &TargetVibe,
        rng: &mut R,
    ) -> Result<Recommendation> {
        if pool.is_empty() {
            return Err(OptimizerError::InsufficientCandidates);
        }

        let size = self.config.playlist_size;
        if pool.len() <= size {
            info!(
                "Pool has {} tracks for a playlist of {size}; returning the whole pool",
                pool.len()
            );
            return Ok(self.whole_pool(pool, target));
        }

        let working = self.working_pool(pool, target);
        info!(
            "Optimizing a {size}-track playlist from {} candidates ({} strategy)",
            working.len(),
            self.evaluator.strategy_name()
        );

        let mut population: Vec<Individual> = (0..self.config.population_size)
            .map(|_| Individual::random(working.len(), size, rng))
            .collect();

        let mut best: Option<Scored> = None;
        let mut history = Vec::new();
        let mut stopped_early = false;

        for generation in 0..self.config.generations {
            let scored = self.evaluate(&working, std::mem::take(&mut population), target);

            let leader = &scored[0];
            if best.as_ref().map_or(true, |b| leader.fitness > b.fitness) {
                trace!("Generation {generation}: new best {:.4}", leader.fitness);
                best = Some(leader.clone());
            }
            let best_ever = best.as_ref().map_or(leader.fitness, |b| b.fitness);

            #[allow(clippy::cast_precision_loss)]
            let mean = scored.iter().map(|s| s.fitness).sum::<f64>() / scored.len() as f64;
            history.push(GenerationStats {
                generation,
                best: leader.fitness,
                mean,
                best_ever,
                mutations: 0,
            });
            debug!(
                "Generation {generation}: best {:.4}, mean {mean:.4}, best ever {best_ever:.4}",
                leader.fitness
            );

            if self
                .config
                .early_stop_threshold
                .is_some_and(|threshold| best_ever > threshold)
            {
                debug!("Best score {best_ever:.4} passed the early-stop threshold");
                stopped_early = true;
                break;
            }
            if generation + 1 == self.config.generations {
                break;
            }

            let (next, mutations) = self.next_generation(&scored, working.len(), rng);
            if let Some(stats) = history.last_mut() {
                stats.mutations = mutations;
            }
            population = next;
        }

        let winner = match best {
            Some(best) => best,
            // Only reachable with a zero generation budget.
            None => self
                .evaluate(&working, population, target)
                .into_iter()
                .next()
                .ok_or(OptimizerError::InsufficientCandidates)?,
        };

        info!(
            "Finished after {} generations with fitness {:.4}",
            history.len(),
            winner.fitness
        );

        Ok(Recommendation {
            tracks: tracks_for(&working, winner.individual.genes()),
            fitness: winner.fitness,
            generations_run: history.len(),
            stopped_early,
            pool_size: working.len(),
            history,
        })
    }

    fn whole_pool(&self, pool: &CandidatePool, target: &TargetVibe) -> Recommendation {
        let genes: Vec<usize> = (0..pool.len()).collect();
        Recommendation {
            tracks: tracks_for(pool, &genes),
            fitness: self.evaluator.score(pool, &genes, target),
            generations_run: 0,
            stopped_early: false,
            pool_size: pool.len(),
            history: Vec::new(),
        }
    }

    fn working_pool<'a>(&self, pool: &'a CandidatePool, target: &TargetVibe) -> Cow<'a, CandidatePool> {
        match self.config.coarse_filter.map(CoarseFilter::new) {
            Some(filter) if filter.applies_to(pool.len()) => {
                Cow::Owned(filter.apply(pool, target, &self.evaluator))
            }
            _ => Cow::Borrowed(pool),
        }
    }

    /// Score every individual and sort best first. Ties keep their order.
    fn evaluate(
        &self,
        pool: &CandidatePool,
        population: Vec<Individual>,
        target: &TargetVibe,
    ) -> Vec<Scored> {
        let mut scored: Vec<Scored> = population
            .into_iter()
            .map(|individual| {
                let fitness = self.evaluator.score(pool, individual.genes(), target);
                Scored { individual, fitness }
            })
            .collect();
        scored.sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
        scored
    }

    /// Elites plus offspring bred from the top of `scored`. Returns the new
    /// population and the number of mutations applied.
    fn next_generation<R: Rng + ?Sized>(
        &self,
        scored: &[Scored],
        pool_len: usize,
        rng: &mut R,
    ) -> (Vec<Individual>, usize) {
        let target_size = self.config.population_size;
        let mut next: Vec<Individual> = scored
            .iter()
            .take(self.config.elitism_count)
            .map(|s| s.individual.clone())
            .collect();

        let breeding_pool = &scored[..self.config.breeding_pool_size().min(scored.len())];
        let mut mutations = 0;

        while next.len() < target_size {
            let parent1 = &breeding_pool[rng.gen_range(0..breeding_pool.len())].individual;
            let parent2 = &breeding_pool[rng.gen_range(0..breeding_pool.len())].individual;

            let mut child = self.breed(parent1, parent2, rng);
            if self.mutate(&mut child, pool_len, rng) {
                mutations += 1;
            }
            next.push(child);
        }

        (next, mutations)
    }

    fn breed<R: Rng + ?Sized>(
        &self,
        parent1: &Individual,
        parent2: &Individual,
        rng: &mut R,
    ) -> Individual {
        let len = parent1.len();
        if len < 2 {
            return parent1.clone();
        }

        let cut = rng.gen_range(1..len);
        let mut genes = crossover(parent1.genes(), parent2.genes(), cut);
        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            repair_duplicates(&mut genes, parent1.genes(), parent2.genes());
        }
        Individual::new(genes)
    }

    /// With probability `mutation_rate`, swap one position for a random pool
    /// track. Returns whether the child changed.
    fn mutate<R: Rng + ?Sized>(&self, child: &mut Individual, pool_len: usize, rng: &mut R) -> bool {
        if child.is_empty() || !rng.gen_bool(self.config.mutation_rate) {
            return false;
        }

        let position = rng.gen_range(0..child.len());
        let replacement = rng.gen_range(0..pool_len);
        if self.config.duplicate_policy == DuplicatePolicy::Reject && child.genes.contains(&replacement) {
            trace!("Skipping mutation: track {replacement} already in playlist");
            return false;
        }

        child.genes[position] = replacement;
        true
    }
}

fn tracks_for(pool: &CandidatePool, genes: &[usize]) -> Vec<Track> {
    genes
        .iter()
        .filter_map(|&i| pool.get(i).map(|entry| entry.track.clone()))
        .collect()
}
