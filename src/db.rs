//! # Track Catalog
//!
//! SQLite storage for tracks and their analyzed chromosomes.
//!
//! Chromosomes are stored as JSON arrays of 16 numbers. A track imported
//! without a chromosome keeps `NULL` until an analysis is stored for it, and
//! re-importing a track without a chromosome never erases an existing one.
//!
//! The optimizer never touches the catalog: callers load a
//! [`CandidatePool`](crate::track::CandidatePool) from it and hand plain data
//! to the optimizer.

use crate::chromosome::ChromosomeVector;
use crate::track::{Analysis, FeatureExtractor, Track, Unanalyzable};
use anyhow::{bail, Context, Result};
use log::{debug, trace, warn};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::fs;
use std::path::Path;

const TRACK_COLUMNS: &str =
    "external_id, platform, title, artist, album, image_url, preview_url, chromosome";

/// Open the catalog at `db_path`, creating the file and its parent
/// directory if needed.
pub fn connect(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create catalog directory {}", parent.display())
        })?;
    }

    Connection::open(db_path)
        .with_context(|| format!("Failed to open catalog database at {}", db_path.display()))
}

/// Create the `tracks` table and its indexes. Safe to call repeatedly.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS tracks (
            id          INTEGER PRIMARY KEY,
            external_id TEXT    NOT NULL,
            platform    TEXT    NOT NULL,
            title       TEXT    NOT NULL,
            artist      TEXT    NOT NULL,
            album       TEXT,
            image_url   TEXT,
            preview_url TEXT,
            chromosome  TEXT,
            UNIQUE(external_id, platform)
        );
        CREATE INDEX IF NOT EXISTS idx_tracks_preview ON tracks(preview_url);
        CREATE INDEX IF NOT EXISTS idx_tracks_artist ON tracks(artist);",
    )
    .context("Failed to create catalog schema")?;

    Ok(())
}

/// Connect and make sure the schema exists.
pub fn open_catalog(db_path: &Path) -> Result<Connection> {
    let conn = connect(db_path)?;
    init(&conn)?;
    Ok(conn)
}

/// Insert or update `tracks` in a single transaction. Returns the number of
/// rows written.
pub fn upsert_tracks(conn: &mut Connection, tracks: &[Track]) -> Result<usize> {
    let tx = conn.transaction()?;

    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO tracks ({TRACK_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(external_id, platform) DO UPDATE SET
                title       = excluded.title,
                artist      = excluded.artist,
                album       = COALESCE(excluded.album, tracks.album),
                image_url   = COALESCE(excluded.image_url, tracks.image_url),
                preview_url = COALESCE(excluded.preview_url, tracks.preview_url),
                chromosome  = COALESCE(excluded.chromosome, tracks.chromosome)"
        ))?;

        for track in tracks {
            let chromosome = match &track.chromosome {
                Some(chromosome) if !chromosome.is_finite() => {
                    warn!("Not storing non-finite chromosome for `{track}'; it stays pending");
                    None
                }
                Some(chromosome) => Some(
                    serde_json::to_string(chromosome)
                        .with_context(|| format!("Failed to encode chromosome for `{track}'"))?,
                ),
                None => None,
            };

            stmt.execute(params![
                track.external_id,
                track.platform,
                track.title,
                track.artist,
                track.album,
                track.image_url,
                track.preview_url,
                chromosome,
            ])
            .with_context(|| format!("Failed to upsert track `{track}'"))?;
            trace!("Stored `{track}'");
        }
    }

    tx.commit().context("Committing catalog transaction failed")?;
    debug!("Upserted {} tracks", tracks.len());
    Ok(tracks.len())
}

/// Store an analysis result for the track with the given preview locator.
/// Returns the number of tracks updated.
///
/// # Errors
///
/// Refuses chromosomes containing NaN or infinite values, which JSON cannot
/// represent.
pub fn store_chromosome(conn: &Connection, locator: &str, chromosome: &ChromosomeVector) -> Result<usize> {
    if !chromosome.is_finite() {
        bail!("Refusing to store non-finite chromosome for {locator}");
    }
    let encoded = serde_json::to_string(chromosome)?;
    conn.execute(
        "UPDATE tracks SET chromosome = ?1 WHERE preview_url = ?2",
        params![encoded, locator],
    )
    .with_context(|| format!("Failed to store chromosome for {locator}"))
}

/// All tracks, ordered by insertion.
pub fn retrieve_tracks(conn: &Connection) -> Result<Vec<Track>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {TRACK_COLUMNS} FROM tracks ORDER BY id"))
        .context("Invalid SQL statement when SELECTing tracks")?;

    let rows = stmt
        .query_map([], raw_track)
        .context("Cannot query tracks")?;

    let mut tracks = Vec::new();
    // Could use collect, but then no per-row context.
    for row in rows {
        let raw = row.context("Queried track unwrap failed")?;
        tracks.push(raw.into_track());
    }

    Ok(tracks)
}

/// Find one track by identity.
pub fn retrieve_track(conn: &Connection, external_id: &str, platform: &str) -> Result<Option<Track>> {
    conn.query_row(
        &format!("SELECT {TRACK_COLUMNS} FROM tracks WHERE external_id = ?1 AND platform = ?2"),
        params![external_id, platform],
        raw_track,
    )
    .optional()
    .map(|raw| raw.map(RawTrack::into_track))
    .with_context(|| format!("Failed to query track {platform}:{external_id}"))
}

/// Total number of tracks and how many of them have a chromosome.
pub fn count_tracks(conn: &Connection) -> Result<(usize, usize)> {
    let (total, resolved): (i64, i64) = conn
        .query_row(
            "SELECT COUNT(*), COUNT(chromosome) FROM tracks",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .context("Could not count catalog entries")?;

    Ok((
        usize::try_from(total).unwrap_or_default(),
        usize::try_from(resolved).unwrap_or_default(),
    ))
}

/// Stored chromosome for a preview locator, if any.
pub fn chromosome_for_locator(conn: &Connection, locator: &str) -> Result<Option<ChromosomeVector>> {
    let stored: Option<Option<String>> = conn
        .query_row(
            "SELECT chromosome FROM tracks WHERE preview_url = ?1 AND chromosome IS NOT NULL LIMIT 1",
            [locator],
            |row| row.get(0),
        )
        .optional()
        .with_context(|| format!("Failed to look up analysis for {locator}"))?;

    stored
        .flatten()
        .map(|text| decode_chromosome(&text, locator))
        .transpose()
}

/// Feature extractor backed by analyses already stored in the catalog.
pub struct CatalogExtractor<'a> {
    conn: &'a Connection,
}

impl<'a> CatalogExtractor<'a> {
    #[must_use]
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl FeatureExtractor for CatalogExtractor<'_> {
    fn analyze(&self, locator: &str) -> Analysis {
        match chromosome_for_locator(self.conn, locator) {
            Ok(Some(chromosome)) => Analysis::Resolved(chromosome),
            Ok(None) => Analysis::Unanalyzable(Unanalyzable::ExtractionFailed(
                "no stored analysis".to_string(),
            )),
            Err(err) => Analysis::Unanalyzable(Unanalyzable::Unreachable(format!("{err:#}"))),
        }
    }
}

/// Row as stored, before the chromosome is decoded.
struct RawTrack {
    external_id: String,
    platform: String,
    title: String,
    artist: String,
    album: Option<String>,
    image_url: Option<String>,
    preview_url: Option<String>,
    chromosome: Option<String>,
}

fn raw_track(row: &Row<'_>) -> rusqlite::Result<RawTrack> {
    Ok(RawTrack {
        external_id: row.get(0)?,
        platform: row.get(1)?,
        title: row.get(2)?,
        artist: row.get(3)?,
        album: row.get(4)?,
        image_url: row.get(5)?,
        preview_url: row.get(6)?,
        chromosome: row.get(7)?,
    })
}

impl RawTrack {
    /// An undecodable chromosome leaves the track pending instead of
    /// failing the whole load.
    fn into_track(self) -> Track {
        let label = format!("{}:{}", self.platform, self.external_id);
        let chromosome = self.chromosome.as_deref().and_then(|text| {
            decode_chromosome(text, &label)
                .map_err(|err| warn!("{err:#}; treating track as unanalyzed"))
                .ok()
        });

        Track {
            external_id: self.external_id,
            platform: self.platform,
            title: self.title,
            artist: self.artist,
            album: self.album,
            image_url: self.image_url,
            preview_url: self.preview_url,
            chromosome,
        }
    }
}

fn decode_chromosome(text: &str, label: &str) -> Result<ChromosomeVector> {
    serde_json::from_str(text).with_context(|| format!("Corrupt chromosome stored for {label}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromosome::CHROMOSOME_LEN;
    use tempfile::TempDir;

    fn temp_catalog() -> (TempDir, Connection) {
        let dir = TempDir::new().unwrap();
        let conn = open_catalog(&dir.path().join("nested/catalog.db")).unwrap();
        (dir, conn)
    }

    fn analyzed(id: &str, value: f64) -> Track {
        Track::new(id, "DEEZER", format!("Title {id}"), "Artist")
            .with_preview(format!("https://cdn/{id}.mp3"))
            .with_chromosome(ChromosomeVector::new([value; CHROMOSOME_LEN]))
    }

    #[test]
    fn test_round_trip_tracks() {
        let (_dir, mut conn) = temp_catalog();
        let tracks = vec![analyzed("1", 1.0), Track::new("2", "DEEZER", "Bare", "Other")];

        assert_eq!(upsert_tracks(&mut conn, &tracks).unwrap(), 2);
        assert_eq!(retrieve_tracks(&conn).unwrap(), tracks);
        assert_eq!(count_tracks(&conn).unwrap(), (2, 1));
    }

    #[test]
    fn test_upsert_keeps_existing_chromosome() {
        let (_dir, mut conn) = temp_catalog();
        upsert_tracks(&mut conn, &[analyzed("1", 2.0)]).unwrap();

        let mut renamed = Track::new("1", "DEEZER", "Renamed", "Artist");
        renamed.chromosome = None;
        upsert_tracks(&mut conn, &[renamed]).unwrap();

        let stored = retrieve_track(&conn, "1", "DEEZER").unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.chromosome, Some(ChromosomeVector::new([2.0; CHROMOSOME_LEN])));
        assert_eq!(stored.preview_url.as_deref(), Some("https://cdn/1.mp3"));
        assert_eq!(count_tracks(&conn).unwrap(), (1, 1));
    }

    #[test]
    fn test_missing_track_is_none() {
        let (_dir, conn) = temp_catalog();
        assert!(retrieve_track(&conn, "404", "DEEZER").unwrap().is_none());
    }

    #[test]
    fn test_catalog_extractor() {
        let (_dir, mut conn) = temp_catalog();
        let pending = Track::new("2", "DEEZER", "Pending", "Artist").with_preview("https://cdn/2.mp3");
        upsert_tracks(&mut conn, &[analyzed("1", 3.0), pending]).unwrap();

        let extractor = CatalogExtractor::new(&conn);
        assert_eq!(
            extractor.analyze("https://cdn/1.mp3"),
            Analysis::Resolved(ChromosomeVector::new([3.0; CHROMOSOME_LEN]))
        );
        assert!(matches!(
            extractor.analyze("https://cdn/2.mp3"),
            Analysis::Unanalyzable(Unanalyzable::ExtractionFailed(_))
        ));

        let stored = store_chromosome(&conn, "https://cdn/2.mp3", &ChromosomeVector::new([4.0; CHROMOSOME_LEN])).unwrap();
        assert_eq!(stored, 1);
        assert!(matches!(extractor.analyze("https://cdn/2.mp3"), Analysis::Resolved(_)));
    }

    #[test]
    fn test_corrupt_chromosome_leaves_track_pending() {
        let (_dir, mut conn) = temp_catalog();
        upsert_tracks(&mut conn, &[analyzed("1", 1.0)]).unwrap();
        conn.execute(
            "INSERT INTO tracks (external_id, platform, title, artist, chromosome)
             VALUES ('x', 'DEEZER', 'Broken', 'Artist', '[1, 2, 3]')",
            [],
        )
        .unwrap();

        let tracks = retrieve_tracks(&conn).unwrap();
        assert_eq!(tracks.len(), 2, "a corrupt row must not hide the rest of the catalog");
        assert!(tracks[0].is_resolved());
        assert!(!tracks[1].is_resolved());
        assert!(!retrieve_track(&conn, "x", "DEEZER").unwrap().unwrap().is_resolved());
    }

    #[test]
    fn test_non_finite_chromosome_is_not_stored() {
        let (_dir, mut conn) = temp_catalog();
        let mut values = [1.0; CHROMOSOME_LEN];
        values[5] = f64::NAN;
        let broken = ChromosomeVector::new(values);

        let pending = Track::new("2", "DEEZER", "Pending", "Artist").with_preview("https://cdn/2.mp3");
        upsert_tracks(&mut conn, &[analyzed("1", 1.0), pending]).unwrap();
        assert!(store_chromosome(&conn, "https://cdn/2.mp3", &broken).is_err());

        let nan_import = Track::new("3", "DEEZER", "Imported", "Artist")
            .with_preview("https://cdn/3.mp3")
            .with_chromosome(broken);
        upsert_tracks(&mut conn, &[nan_import]).unwrap();

        let tracks = retrieve_tracks(&conn).unwrap();
        assert_eq!(tracks.len(), 3);
        assert_eq!(tracks.iter().filter(|t| t.is_resolved()).count(), 1);
        assert_eq!(count_tracks(&conn).unwrap(), (3, 1));
        assert!(matches!(
            CatalogExtractor::new(&conn).analyze("https://cdn/2.mp3"),
            Analysis::Unanalyzable(Unanalyzable::ExtractionFailed(_))
        ));
    }
}
