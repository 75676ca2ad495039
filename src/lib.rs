//! Evolutionary playlist recommendations from audio feature vectors.
//!
//! Core modules:
//! - [`chromosome`] - The 16-dimension feature vector and its normalizer
//! - [`fitness`] - Playlist scoring strategies and the artist diversity penalty
//! - [`coarse_filter`] - Pre-ranking that shrinks large pools before the search
//! - [`optimizer`] - The generational genetic search
//!
//! ### Supporting Modules
//!
//! - [`track`] - Tracks, candidate pools and the feature-extractor seam
//! - [`config`] - Optimizer tuning, presets and data directory management
//! - [`error`] - Typed errors of the core
//! - [`db`] - SQLite track catalog
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use beatmatch::{config, db, optimizer::PlaylistOptimizer, track::{CandidatePool, TargetVibe}};
//!
//! let conn = db::open_catalog(&config::get_db_path()?)?;
//! let (pool, _unresolved) = CandidatePool::from_tracks(db::retrieve_tracks(&conn)?);
//!
//! let seed = db::retrieve_track(&conn, "3135556", "DEEZER")?
//!     .and_then(|track| track.chromosome)
//!     .ok_or_else(|| anyhow::anyhow!("seed track has no analysis"))?;
//!
//! let optimizer = PlaylistOptimizer::new(config::preset("classic").unwrap_or_default())?;
//! let playlist = optimizer.run(&pool, &TargetVibe::from_seed(seed))?;
//!
//! for track in &playlist.tracks {
//!     println!("{track}");
//! }
//! println!("fitness {:.3}", playlist.fitness);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Algorithm Details
//!
//! ### Chromosome
//! - Tempo in BPM, spectral centroid in Hz, zero-crossing rate, 13 MFCC means
//! - Each dimension is divided by a reference magnitude before comparison
//!
//! ### Fitness
//! - Cosine similarity between the playlist's mean vibe and the target, or
//! - Weighted Euclidean distance mapped to `1 / (1 + d)`
//! - Minus a penalty for every track beyond the per-artist cap, floored at 0
//!
//! ### Search
//! - Random initial population of distinct-track playlists
//! - Elites survive unchanged; the rest come from single-point crossover of
//!   parents drawn from the top of the population, then optional mutation
//! - Stops when the generation budget is spent or the best score passes the
//!   early-stop threshold
//!
//! ## Error Handling
//!
//! The core returns [`error::OptimizerError`]. Catalog, file and CLI code
//! returns `anyhow::Result` with context on every fallible step.

pub mod chromosome;
pub mod cli;
pub mod coarse_filter;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod fitness;
pub mod optimizer;
pub mod track;
