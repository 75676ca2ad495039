//! # BeatMatch - Evolutionary Playlist Recommendations
//!
//! BeatMatch builds playlists whose overall sound matches a set of seed
//! tracks. Tracks live in a local SQLite catalog together with their audio
//! feature vectors; a genetic search picks the playlist.
//!
//! ## Architecture
//!
//! - `cli`: Command-line interface definitions
//! - `db`: SQLite catalog of tracks and chromosomes
//! - `optimizer`: The generational search
//! - `fitness`: Playlist scoring
//! - `config`: Presets, config files and data directory management
//!
//! ## Usage
//!
//! ```bash
//! # Import tracks with their analyses
//! beatmatch import tracks.json
//!
//! # List tracks
//! beatmatch list
//!
//! # Recommend a playlist around two seeds
//! beatmatch recommend --seed 3135556 --seed 916424 --size 15
//! ```

use anyhow::{anyhow, Context, Result};
use beatmatch::config::{self, OptimizerConfig, RuntimeConfig};
use beatmatch::db::{self, CatalogExtractor};
use beatmatch::optimizer::{PlaylistOptimizer, Recommendation};
use beatmatch::track::{resolve_tracks, CandidatePool, TargetVibe, Track};
use beatmatch::{cli, completion};
use clap::{CommandFactory, Parser};
use log::{debug, info, warn};
use path_absolutize::Absolutize;
use std::fs;
use std::path::{Path, PathBuf};

/// Main entry point for BeatMatch.
///
/// Initializes logging, parses command-line arguments, and routes commands
/// to the appropriate module functions.
///
/// # Logging
///
/// Initializes environment logger which can be controlled via `RUST_LOG`:
/// - `RUST_LOG=debug beatmatch recommend --seed 1` - Enable debug logging
/// - `RUST_LOG=beatmatch::optimizer=trace beatmatch recommend --seed 1` - Per-generation details
fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    let runtime = match &args.db {
        Some(path) => RuntimeConfig::with_db_path(absolute(path)?),
        None => RuntimeConfig::new()?,
    };
    debug!("Using catalog at {}", runtime.db_path.display());

    match args.command {
        cli::Command::Import { file } => {
            let file = absolute(&file)?;
            info!("Importing tracks from: {}", file.display());
            import_tracks(&runtime, &file)?;
        }
        cli::Command::List => {
            list_tracks(&runtime)?;
        }
        cli::Command::Presets => {
            list_presets();
        }
        cli::Command::Recommend {
            seeds,
            platform,
            size,
            preset,
            config,
            strategy,
            generations,
            rng_seed,
            json,
        } => {
            let mut settings = match config {
                Some(path) => config::load_config(&absolute(&path)?)?,
                None => config::preset(&preset).ok_or_else(|| {
                    anyhow!("Unknown preset: {preset}. Run `beatmatch presets` to list them")
                })?,
            };

            if let Some(size) = size {
                settings.playlist_size = size;
            }
            if let Some(strategy) = strategy {
                strategy.apply_to(&mut settings);
            }
            if let Some(generations) = generations {
                settings.generations = generations;
            }
            if rng_seed.is_some() {
                settings.seed = rng_seed;
            }

            let recommendation = recommend(&runtime, &seeds, &platform, settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&recommendation)?);
            } else {
                print_recommendation(&recommendation);
            }
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(shell), &mut cmd);
        }
    }

    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .absolutize()
        .with_context(|| format!("Cannot resolve path {}", path.display()))?
        .to_path_buf())
}

fn import_tracks(runtime: &RuntimeConfig, file: &Path) -> Result<()> {
    let text = fs::read_to_string(file)
        .with_context(|| format!("Failed to read track file {}", file.display()))?;
    let tracks: Vec<Track> = serde_json::from_str(&text)
        .with_context(|| format!("Invalid track JSON in {}", file.display()))?;

    let mut conn = db::open_catalog(&runtime.db_path)?;
    let written = db::upsert_tracks(&mut conn, &tracks)?;
    let (total, resolved) = db::count_tracks(&conn)?;

    println!("Imported {written} tracks ({total} in catalog, {resolved} analyzed)");
    Ok(())
}

fn list_tracks(runtime: &RuntimeConfig) -> Result<()> {
    let conn = db::open_catalog(&runtime.db_path)?;
    let tracks = db::retrieve_tracks(&conn)?;

    for track in &tracks {
        let status = if track.is_resolved() { "" } else { "  [pending]" };
        println!("{}:{}\t{track}{status}", track.platform, track.external_id);
    }

    let (total, resolved) = db::count_tracks(&conn)?;
    println!("{total} tracks, {resolved} analyzed");
    Ok(())
}

fn list_presets() {
    for preset in config::presets() {
        let c = &preset.config;
        println!("{}: {}", preset.name, preset.description);
        println!(
            "    fitness={} population={} generations={} mutation={} elitism={} playlist={}",
            c.fitness, c.population_size, c.generations, c.mutation_rate, c.elitism_count, c.playlist_size
        );
    }
}

/// Resolve the seeds and candidates from the catalog and run the optimizer.
fn recommend(
    runtime: &RuntimeConfig,
    seed_ids: &[String],
    platform: &str,
    settings: OptimizerConfig,
) -> Result<Recommendation> {
    let optimizer = PlaylistOptimizer::new(settings).context("Invalid optimizer settings")?;
    let conn = db::open_catalog(&runtime.db_path)?;
    let extractor = CatalogExtractor::new(&conn);

    let mut seeds = Vec::with_capacity(seed_ids.len());
    for id in seed_ids {
        let track = db::retrieve_track(&conn, id, platform)?
            .ok_or_else(|| anyhow!("Seed track {platform}:{id} is not in the catalog"))?;
        seeds.push(track);
    }

    let (resolved_seeds, rejected_seeds) = resolve_tracks(seeds, &extractor);
    if let Some((track, reason)) = rejected_seeds.first() {
        return Err(anyhow!("Seed track `{track}' cannot be used: {reason}"));
    }
    let seed_vectors: Vec<_> = resolved_seeds.iter().filter_map(|t| t.chromosome).collect();
    let target = TargetVibe::from_seeds(&seed_vectors)?;

    let candidates: Vec<Track> = db::retrieve_tracks(&conn)?
        .into_iter()
        .filter(|track| {
            !(track.platform == platform && seed_ids.iter().any(|id| *id == track.external_id))
        })
        .collect();
    let (resolved, rejected) = resolve_tracks(candidates, &extractor);
    if !rejected.is_empty() {
        warn!("{} catalog tracks have no usable analysis", rejected.len());
    }

    let (pool, _) = CandidatePool::from_tracks(resolved);
    info!(
        "Optimizing over {} candidates with {} fitness",
        pool.len(),
        optimizer.evaluator().strategy_name()
    );

    optimizer
        .run(&pool, &target)
        .context("No playlist could be built from the catalog")
}

fn print_recommendation(recommendation: &Recommendation) {
    let stop = if recommendation.stopped_early { ", stopped early" } else { "" };
    println!(
        "Playlist of {} tracks (fitness {:.3}, {} generations over {} candidates{stop})",
        recommendation.tracks.len(),
        recommendation.fitness,
        recommendation.generations_run,
        recommendation.pool_size,
    );

    for (i, track) in recommendation.tracks.iter().enumerate() {
        println!("{:>3}. {track}", i + 1);
    }
}
