//! Tracks, candidate pools and the feature-extractor seam.
//!
//! The optimizer never analyzes audio itself. Upstream code resolves each
//! track's chromosome through a [`FeatureExtractor`], and only tracks that
//! came back [`Analysis::Resolved`] are allowed into a [`CandidatePool`].

use crate::chromosome::ChromosomeVector;
use crate::error::{OptimizerError, Result};
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a track is stored in the catalog and handed to the optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Identifier on the source platform (Deezer/Spotify track id).
    pub external_id: String,
    /// Source platform, e.g. `DEEZER`.
    pub platform: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub album: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Playable preview locator, used as the feature-extractor key.
    #[serde(default)]
    pub preview_url: Option<String>,
    /// `None` until resolved by the feature extractor.
    #[serde(default)]
    pub chromosome: Option<ChromosomeVector>,
}

impl Track {
    #[must_use]
    pub fn new(
        external_id: impl Into<String>,
        platform: impl Into<String>,
        title: impl Into<String>,
        artist: impl Into<String>,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            platform: platform.into(),
            title: title.into(),
            artist: artist.into(),
            album: None,
            image_url: None,
            preview_url: None,
            chromosome: None,
        }
    }

    #[must_use]
    pub fn with_chromosome(mut self, chromosome: ChromosomeVector) -> Self {
        self.chromosome = Some(chromosome);
        self
    }

    #[must_use]
    pub fn with_preview(mut self, preview_url: impl Into<String>) -> Self {
        self.preview_url = Some(preview_url.into());
        self
    }

    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        self.chromosome.is_some()
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// A track whose chromosome is known.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolEntry {
    pub track: Track,
    pub chromosome: ChromosomeVector,
}

/// Immutable snapshot of resolved tracks for one optimization run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidatePool {
    entries: Vec<PoolEntry>,
}

impl CandidatePool {
    /// Build a pool from arbitrary tracks, dropping every track without a
    /// chromosome. Returns the pool and the number of dropped tracks.
    #[must_use]
    pub fn from_tracks(tracks: impl IntoIterator<Item = Track>) -> (Self, usize) {
        let mut dropped = 0;
        let entries = tracks
            .into_iter()
            .filter_map(|track| match track.chromosome {
                Some(chromosome) => Some(PoolEntry { track, chromosome }),
                None => {
                    trace!("Excluding unresolved track `{track}' from candidate pool");
                    dropped += 1;
                    None
                }
            })
            .collect::<Vec<_>>();

        if dropped > 0 {
            debug!("Excluded {dropped} unresolved tracks from candidate pool");
        }
        (Self { entries }, dropped)
    }

    pub(crate) fn from_entries(entries: Vec<PoolEntry>) -> Self {
        Self { entries }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&PoolEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn entries(&self) -> &[PoolEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PoolEntry> {
        self.entries.iter()
    }

    /// Position of a track in the pool by identity.
    #[must_use]
    pub fn position(&self, external_id: &str, platform: &str) -> Option<usize> {
        self.entries.iter().position(|entry| {
            entry.track.external_id == external_id && entry.track.platform == platform
        })
    }
}

/// The profile a playlist should match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetVibe(ChromosomeVector);

impl TargetVibe {
    /// Target taken from a single seed track.
    #[must_use]
    pub const fn from_seed(seed: ChromosomeVector) -> Self {
        Self(seed)
    }

    /// Target as the elementwise mean of several seeds.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::NoSeeds`] when `seeds` is empty.
    pub fn from_seeds(seeds: &[ChromosomeVector]) -> Result<Self> {
        ChromosomeVector::mean(seeds)
            .map(Self)
            .ok_or(OptimizerError::NoSeeds)
    }

    /// Build a target from raw values, checking the dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::DimensionMismatch`] for anything but 16 values.
    pub fn from_values(values: &[f64]) -> Result<Self> {
        ChromosomeVector::try_from(values).map(Self)
    }

    #[must_use]
    pub const fn vector(&self) -> &ChromosomeVector {
        &self.0
    }
}

/// Why a track could not be analyzed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unanalyzable {
    /// The track has no playable preview locator.
    NoPreview,
    /// The preview could not be fetched.
    Unreachable(String),
    /// The audio could not be decoded.
    DecodeFailed(String),
    /// Decoding worked but feature extraction did not.
    ExtractionFailed(String),
}

impl fmt::Display for Unanalyzable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPreview => write!(f, "no preview locator"),
            Self::Unreachable(why) => write!(f, "unreachable: {why}"),
            Self::DecodeFailed(why) => write!(f, "decode failed: {why}"),
            Self::ExtractionFailed(why) => write!(f, "feature extraction failed: {why}"),
        }
    }
}

/// Outcome of analyzing one preview.
#[derive(Debug, Clone, PartialEq)]
pub enum Analysis {
    Resolved(ChromosomeVector),
    Unanalyzable(Unanalyzable),
}

/// Audio feature extractor collaborator.
///
/// Implementations map a playable locator to a chromosome, or to an
/// explicit [`Unanalyzable`] outcome. They never panic on bad audio.
pub trait FeatureExtractor {
    fn analyze(&self, locator: &str) -> Analysis;
}

/// Resolve chromosomes for every track that lacks one.
///
/// Tracks that already carry a chromosome pass through untouched. Returns
/// the resolved tracks and the rejected ones with their reasons.
pub fn resolve_tracks<E: FeatureExtractor + ?Sized>(
    tracks: Vec<Track>,
    extractor: &E,
) -> (Vec<Track>, Vec<(Track, Unanalyzable)>) {
    let mut resolved = Vec::with_capacity(tracks.len());
    let mut rejected = Vec::new();

    for mut track in tracks {
        if track.is_resolved() {
            resolved.push(track);
            continue;
        }

        let outcome = match track.preview_url.as_deref() {
            Some(locator) => extractor.analyze(locator),
            None => Analysis::Unanalyzable(Unanalyzable::NoPreview),
        };

        match outcome {
            Analysis::Resolved(chromosome) => {
                track.chromosome = Some(chromosome);
                resolved.push(track);
            }
            Analysis::Unanalyzable(reason) => {
                warn!("Skipping `{track}': {reason}");
                rejected.push((track, reason));
            }
        }
    }

    (resolved, rejected)
}
