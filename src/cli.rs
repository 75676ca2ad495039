//! # Command-Line Interface Module
//!
//! This module defines the command-line interface for BeatMatch using Clap derive macros.
//! It provides a type-safe way to parse command-line arguments and route them to
//! appropriate functionality.
//!
//! ## Commands
//!
//! - `import`: Add tracks (and any known chromosomes) from a JSON file to the catalog
//! - `list`: Display all catalogued tracks
//! - `presets`: Show the built-in optimizer tunings
//! - `recommend`: Build a playlist matching one or more seed tracks
//! - `completion`: Generate shell completion scripts
//!
//! ## Examples
//!
//! ```bash
//! beatmatch import tracks.json
//! beatmatch recommend --seed 3135556 --size 12 --preset timbre
//! beatmatch completion zsh > ~/.config/zsh/completions/_beatmatch
//! ```

use crate::config::{FitnessKind, OptimizerConfig};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

/// Similarity strategy as spelled on the command line.
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum Strategy {
    /// Cosine similarity of the playlist vibe and the target
    Cosine,
    /// Weighted Euclidean distance, scored as 1 / (1 + d)
    WeightedDistance,
}

impl Strategy {
    /// Switch `config` to this strategy.
    ///
    /// The early-stop threshold is a cosine score, so switching to weighted
    /// distance clears it and the run uses its full generation budget.
    pub fn apply_to(self, config: &mut OptimizerConfig) {
        let kind = FitnessKind::from(self);
        if kind == FitnessKind::WeightedDistance && config.fitness != kind {
            config.early_stop_threshold = None;
        }
        config.fitness = kind;
    }
}

impl From<Strategy> for FitnessKind {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Cosine => Self::Cosine,
            Strategy::WeightedDistance => Self::WeightedDistance,
        }
    }
}

/// Main application arguments structure.
///
/// The catalog location can be overridden globally; everything else is
/// accessed through a subcommand.
#[derive(Parser)]
#[command(name = "beatmatch")]
#[command(about = "BeatMatch: evolutionary playlists that match the vibe of your seed tracks")]
#[command(version)]
pub struct Args {
    /// Path to the catalog database
    ///
    /// Defaults to `catalog.db` in the platform data directory.
    #[arg(long, global = true, env = "BEATMATCH_DB")]
    pub db: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Import tracks from a JSON file into the catalog
    ///
    /// The file holds an array of track objects with `external_id`,
    /// `platform`, `title` and `artist`, plus optional `album`, `image_url`,
    /// `preview_url` and a 16-number `chromosome`. Existing tracks are
    /// updated; a stored chromosome is never erased by an import without one.
    Import {
        /// Path to the JSON file
        file: PathBuf,
    },

    /// List all tracks in the catalog
    ///
    /// Tracks still waiting for an analysis are marked as pending.
    List,

    /// List the built-in optimizer presets
    Presets,

    /// Recommend a playlist matching the given seed tracks
    ///
    /// The target vibe is the mean chromosome of all seeds. Every analyzed
    /// track of the catalog is a candidate; seeds themselves are excluded.
    Recommend {
        /// External id of a seed track (repeat for several seeds)
        #[arg(short, long = "seed", required = true)]
        seeds: Vec<String>,

        /// Platform the seed ids belong to
        #[arg(short, long, default_value = "DEEZER")]
        platform: String,

        /// Number of tracks in the playlist
        #[arg(short = 'n', long)]
        size: Option<usize>,

        /// Named preset to start from (see `beatmatch presets`)
        #[arg(long, default_value = "classic", conflicts_with = "config")]
        preset: String,

        /// JSON optimizer configuration file, instead of a preset
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the preset's similarity strategy
        ///
        /// Switching a cosine preset to weighted distance disables its
        /// early stop.
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,

        /// Override the number of generations
        #[arg(short, long)]
        generations: Option<usize>,

        /// Seed the random source for a reproducible playlist
        #[arg(long)]
        rng_seed: Option<u64>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completions
    ///
    /// Outputs shell completion script for the specified shell.
    /// Save the output to your shell's completion directory.
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_recommend_arguments() {
        let args = Args::try_parse_from([
            "beatmatch", "recommend", "--seed", "1", "-s", "2", "-n", "5", "--strategy",
            "weighted-distance", "--rng-seed", "9",
        ])
        .unwrap();

        match args.command {
            Command::Recommend { seeds, size, strategy, rng_seed, preset, platform, .. } => {
                assert_eq!(seeds, vec!["1", "2"]);
                assert_eq!(size, Some(5));
                assert_eq!(strategy, Some(Strategy::WeightedDistance));
                assert_eq!(rng_seed, Some(9));
                assert_eq!(preset, "classic");
                assert_eq!(platform, "DEEZER");
            }
            _ => panic!("expected recommend"),
        }
    }

    #[test]
    fn test_weighted_distance_override_clears_early_stop() {
        let mut config = OptimizerConfig::default();
        assert_eq!(config.early_stop_threshold, Some(0.98));

        Strategy::WeightedDistance.apply_to(&mut config);
        assert_eq!(config.fitness, FitnessKind::WeightedDistance);
        assert_eq!(config.early_stop_threshold, None);

        Strategy::Cosine.apply_to(&mut config);
        assert_eq!(config.fitness, FitnessKind::Cosine);
    }

    #[test]
    fn test_cosine_override_keeps_early_stop() {
        let mut config = OptimizerConfig::default();
        Strategy::Cosine.apply_to(&mut config);
        assert_eq!(config.early_stop_threshold, Some(0.98));
    }

    #[test]
    fn test_recommend_requires_seed() {
        assert!(Args::try_parse_from(["beatmatch", "recommend"]).is_err());
    }

    #[test]
    fn test_global_db_flag() {
        let args = Args::try_parse_from(["beatmatch", "list", "--db", "/tmp/x.db"]).unwrap();
        assert_eq!(args.db, Some(PathBuf::from("/tmp/x.db")));
    }
}
