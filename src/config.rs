//! # Configuration Module
//!
//! Optimizer tuning, named presets and data directory management.
//!
//! ## Optimizer Configuration
//!
//! Every constant of the genetic search (population size, generation budget,
//! mutation rate, weights, normalization references, ...) lives in
//! [`OptimizerConfig`]. Historical tunings are exposed as named presets:
//!
//! - `classic`: cosine similarity, small population, early stop at 0.98
//! - `timbre`: weighted distance favouring timbre, larger search
//! - `genre-contrast`: weighted distance with a 250 timbre reference
//! - `light`: short cosine run that tolerates repeated tracks
//!
//! Configs can also be loaded from JSON files; missing fields fall back to
//! [`OptimizerConfig::default`].
//!
//! ## Data Storage
//!
//! The track catalog lives in the platform-standard data directory:
//! - Linux: `~/.local/share/beatmatch/`
//! - macOS: `~/Library/Application Support/beatmatch/`
//! - Windows: `%APPDATA%\beatmatch\`

use crate::chromosome::{Normalizer, CHROMOSOME_LEN, SPECTRAL_CENTROID, TEMPO, TIMBRE_START, ZERO_CROSSING_RATE};
use crate::error::{OptimizerError, Result as CoreResult};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Similarity strategy used by the fitness evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FitnessKind {
    /// Cosine of the normalized playlist vibe and target.
    #[default]
    Cosine,
    /// `1 / (1 + d)` where `d` is the weighted normalized distance.
    WeightedDistance,
}

impl fmt::Display for FitnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cosine => write!(f, "cosine"),
            Self::WeightedDistance => write!(f, "weighted-distance"),
        }
    }
}

impl FromStr for FitnessKind {
    type Err = OptimizerError;

    fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "cosine" => Ok(Self::Cosine),
            "weighted-distance" | "distance" => Ok(Self::WeightedDistance),
            other => Err(OptimizerError::InvalidConfig(format!(
                "unknown fitness strategy `{other}' (expected `cosine' or `weighted-distance')"
            ))),
        }
    }
}

/// Whether breeding may place the same track twice in one playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Operators run untouched; repeats are possible.
    Allow,
    /// Mutations introducing a repeat are skipped and crossover repeats are
    /// refilled from the parents.
    #[default]
    Reject,
}

/// Two-stage search settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoarseFilterConfig {
    /// Pools larger than this are pre-ranked.
    pub activation_threshold: usize,
    /// Size of the neighborhood kept for the genetic search.
    pub top_k: usize,
}

impl Default for CoarseFilterConfig {
    fn default() -> Self {
        Self {
            activation_threshold: 300,
            top_k: 100,
        }
    }
}

/// Complete tuning for one optimizer run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub population_size: usize,
    pub generations: usize,
    pub mutation_rate: f64,
    pub elitism_count: usize,
    pub playlist_size: usize,
    /// Allowed tracks per artist before the penalty applies.
    pub diversity_cap: usize,
    /// Penalty per excess track of one artist.
    pub diversity_penalty: f64,
    pub fitness: FitnessKind,
    pub weight_vector: [f64; CHROMOSOME_LEN],
    pub normalization_vector: [f64; CHROMOSOME_LEN],
    /// Stop as soon as the best-ever score exceeds this value.
    pub early_stop_threshold: Option<f64>,
    /// Share of the sorted population that parents are drawn from.
    pub breeding_fraction: f64,
    pub duplicate_policy: DuplicatePolicy,
    pub coarse_filter: Option<CoarseFilterConfig>,
    /// Seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            population_size: 20,
            generations: 50,
            mutation_rate: 0.2,
            elitism_count: 2,
            playlist_size: 10,
            diversity_cap: 2,
            diversity_penalty: 0.3,
            fitness: FitnessKind::Cosine,
            weight_vector: default_weights(2.5),
            normalization_vector: Normalizer::references_with_timbre(200.0),
            early_stop_threshold: Some(0.98),
            breeding_fraction: 0.5,
            duplicate_policy: DuplicatePolicy::Reject,
            coarse_filter: None,
            seed: None,
        }
    }
}

/// Weights privileging timbre over tempo.
#[must_use]
pub fn default_weights(timbre_weight: f64) -> [f64; CHROMOSOME_LEN] {
    let mut weights = [timbre_weight; CHROMOSOME_LEN];
    weights[TEMPO] = 1.0;
    weights[SPECTRAL_CENTROID] = 1.5;
    weights[ZERO_CROSSING_RATE] = 1.0;
    debug_assert_eq!(weights[TIMBRE_START], timbre_weight);
    weights
}

impl OptimizerConfig {
    /// Check every parameter, returning the first violation.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::InvalidConfig`] describing the bad field.
    pub fn validate(&self) -> CoreResult<()> {
        let invalid = |msg: String| Err(OptimizerError::InvalidConfig(msg));

        if self.population_size < 2 {
            return invalid(format!(
                "population_size must be at least 2, got {}",
                self.population_size
            ));
        }
        if self.playlist_size == 0 {
            return invalid("playlist_size must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.mutation_rate) {
            return invalid(format!(
                "mutation_rate must be within [0, 1], got {}",
                self.mutation_rate
            ));
        }
        if self.elitism_count > self.population_size {
            return invalid(format!(
                "elitism_count ({}) exceeds population_size ({})",
                self.elitism_count, self.population_size
            ));
        }
        if !(self.breeding_fraction > 0.0 && self.breeding_fraction <= 1.0) {
            return invalid(format!(
                "breeding_fraction must be within (0, 1], got {}",
                self.breeding_fraction
            ));
        }
        if !self.diversity_penalty.is_finite() || self.diversity_penalty < 0.0 {
            return invalid(format!(
                "diversity_penalty must be a non-negative number, got {}",
                self.diversity_penalty
            ));
        }
        if let Some((index, weight)) = self
            .weight_vector
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return invalid(format!(
                "weight {index} must be a non-negative number, got {weight}"
            ));
        }
        if let Some(threshold) = self.early_stop_threshold {
            if !threshold.is_finite() {
                return invalid("early_stop_threshold must be finite".to_string());
            }
        }
        if let Some(filter) = &self.coarse_filter {
            if filter.top_k < self.playlist_size {
                return invalid(format!(
                    "coarse filter top_k ({}) is smaller than playlist_size ({})",
                    filter.top_k, self.playlist_size
                ));
            }
        }

        self.normalizer().map(|_| ())
    }

    /// Normalizer built from `normalization_vector`.
    ///
    /// # Errors
    ///
    /// Fails when a reference magnitude is not strictly positive.
    pub fn normalizer(&self) -> CoreResult<Normalizer> {
        Normalizer::new(self.normalization_vector)
    }

    /// Number of top-ranked individuals parents are drawn from.
    #[must_use]
    pub fn breeding_pool_size(&self) -> usize {
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let size = (self.population_size as f64 * self.breeding_fraction).ceil() as usize;
        size.clamp(1, self.population_size)
    }
}

/// A named tuning.
#[derive(Debug, Clone)]
pub struct Preset {
    pub name: &'static str,
    pub description: &'static str,
    pub config: OptimizerConfig,
}

lazy_static::lazy_static! {
    /// Built-in tunings, immutable for the lifetime of the process.
    static ref PRESETS: Vec<Preset> = vec![
        Preset {
            name: "classic",
            description: "Cosine similarity, 20 x 50, stops early above 0.98",
            config: OptimizerConfig::default(),
        },
        Preset {
            name: "timbre",
            description: "Weighted distance favouring timbre, 50 x 100, coarse filter on",
            config: OptimizerConfig {
                population_size: 50,
                generations: 100,
                mutation_rate: 0.15,
                elitism_count: 5,
                fitness: FitnessKind::WeightedDistance,
                weight_vector: default_weights(3.0),
                early_stop_threshold: None,
                breeding_fraction: 0.4,
                coarse_filter: Some(CoarseFilterConfig::default()),
                ..OptimizerConfig::default()
            },
        },
        Preset {
            name: "genre-contrast",
            description: "Weighted distance with 250 timbre references for sharper genres",
            config: OptimizerConfig {
                population_size: 30,
                generations: 80,
                mutation_rate: 0.1,
                elitism_count: 3,
                diversity_penalty: 0.5,
                fitness: FitnessKind::WeightedDistance,
                normalization_vector: Normalizer::references_with_timbre(250.0),
                early_stop_threshold: None,
                coarse_filter: Some(CoarseFilterConfig::default()),
                ..OptimizerConfig::default()
            },
        },
        Preset {
            name: "light",
            description: "Short cosine run, repeated tracks tolerated",
            config: OptimizerConfig {
                generations: 30,
                mutation_rate: 0.1,
                duplicate_policy: DuplicatePolicy::Allow,
                ..OptimizerConfig::default()
            },
        },
    ];
}

/// All built-in presets in listing order.
#[must_use]
pub fn presets() -> &'static [Preset] {
    &PRESETS
}

/// Copy of the named preset's configuration.
#[must_use]
pub fn preset(name: &str) -> Option<OptimizerConfig> {
    PRESETS
        .iter()
        .find(|preset| preset.name == name)
        .map(|preset| preset.config.clone())
}

/// Load and validate an optimizer configuration from a JSON file.
///
/// Fields missing from the file take their default values.
///
/// # Errors
///
/// Fails if the file cannot be read, is not valid JSON, or describes an
/// invalid configuration.
pub fn load_config(path: &Path) -> Result<OptimizerConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read optimizer config at {}", path.display()))?;

    let config: OptimizerConfig = serde_json::from_str(&text)
        .with_context(|| format!("Invalid optimizer config JSON in {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Rejected optimizer config from {}", path.display()))?;

    Ok(config)
}

/// Returns the platform-appropriate catalog database path.
///
/// Creates the `beatmatch` data directory if needed.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The beatmatch subdirectory cannot be created due to permissions
///
/// # Examples
///
/// ```no_run
/// use beatmatch::config::get_db_path;
///
/// let db_path = get_db_path()?;
/// println!("Catalog location: {}", db_path.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_db_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join("catalog.db"))
}

/// Returns the platform-appropriate data directory for BeatMatch.
///
/// # Errors
///
/// Fails if the data directory cannot be determined or created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!(
            "Could not determine system data directory. Please ensure your platform supports standard data directories."
        ))?;

    let app_dir = data_dir.join("beatmatch");
    fs::create_dir_all(&app_dir)
        .with_context(|| format!(
            "Failed to create BeatMatch data directory at {}. Please check file permissions.",
            app_dir.display()
        ))?;

    Ok(app_dir)
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the catalog database file
    pub db_path: PathBuf,
}

impl RuntimeConfig {
    /// Runtime configuration pointing at the default catalog.
    ///
    /// # Errors
    ///
    /// Fails if the data directory cannot be resolved.
    pub fn new() -> Result<Self> {
        Ok(Self {
            db_path: get_db_path()?,
        })
    }

    /// Create configuration with explicit database path
    #[must_use]
    pub fn with_db_path(db_path: PathBuf) -> Self {
        Self { db_path }
    }
}
