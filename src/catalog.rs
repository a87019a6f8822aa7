//! Songbook catalog
//!
//! The catalog is read once at startup from a CSV file and is immutable
//! afterwards. Rows that fail to parse are skipped, so a broken row behaves
//! exactly like an unknown song id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Artist shown when the songbook row has none.
pub const UNKNOWN_ARTIST: &str = "неизвестен";

/// Errors that can occur while loading the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The songbook file could not be opened
    #[error("Cannot open songbook {path}: {source}")]
    Open {
        /// Path that failed to open
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
    /// The CSV header row is missing or unreadable
    #[error("Invalid songbook header: {0}")]
    Header(#[from] csv::Error),
}

/// A single songbook entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Identifier used in deep links (`/start <id>`)
    #[serde(alias = "ID", alias = "Id")]
    pub id: String,
    /// Song title
    #[serde(alias = "песня")]
    pub title: String,
    /// Performer
    #[serde(default, deserialize_with = "empty_as_none")]
    pub artist: Option<String>,
    /// Extra performer name, printed in front of the artist
    #[serde(default, deserialize_with = "empty_as_none")]
    pub artist_name: Option<String>,
    /// Songbook section
    #[serde(default, deserialize_with = "empty_as_none")]
    pub category: Option<String>,
    /// Lyrics / chords link
    #[serde(default)]
    pub link: String,
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

impl Song {
    /// Display name in the form `"<artist name> <artist> - <title>"`.
    ///
    /// ```
    /// use karaoke_queue_bot::catalog::Song;
    ///
    /// let song = Song {
    ///     id: "42".into(),
    ///     title: "Группа крови".into(),
    ///     artist: Some("Кино".into()),
    ///     artist_name: None,
    ///     category: None,
    ///     link: String::new(),
    /// };
    /// assert_eq!(song.display_name(), "Кино - Группа крови");
    /// ```
    #[must_use]
    pub fn display_name(&self) -> String {
        let artist_name = self.artist_name.as_deref().unwrap_or("");
        let artist = self.artist.as_deref().unwrap_or(UNKNOWN_ARTIST);
        format!("{artist_name} {artist} - {}", self.title)
            .trim()
            .to_string()
    }
}

/// Read-only song lookup by id
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    songs: HashMap<String, Song>,
}

impl Catalog {
    /// Load the catalog from a CSV file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or has no readable header.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| CatalogError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_reader(file)?;
        info!(
            "Songbook loaded from {} ({} songs).",
            path.display(),
            catalog.len()
        );
        Ok(catalog)
    }

    /// Parse a catalog from any CSV source with a header row.
    ///
    /// # Errors
    ///
    /// Returns an error if the header row cannot be read.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let mut songs = HashMap::new();

        for (index, record) in csv_reader.records().enumerate() {
            // Header is line 1
            let line = index + 2;
            let song: Song = match record.and_then(|r| r.deserialize(Some(&headers))) {
                Ok(song) => song,
                Err(e) => {
                    warn!("Skipping songbook line {line}: {e}");
                    continue;
                }
            };
            if song.id.is_empty() {
                warn!("Skipping songbook line {line}: empty id");
                continue;
            }
            if let Some(previous) = songs.insert(song.id.clone(), song) {
                warn!("Duplicate song id '{}' on line {line}, last row wins", previous.id);
            }
        }

        Ok(Self { songs })
    }

    /// Build a catalog from already parsed songs.
    #[must_use]
    pub fn from_songs(songs: impl IntoIterator<Item = Song>) -> Self {
        Self {
            songs: songs.into_iter().map(|s| (s.id.clone(), s)).collect(),
        }
    }

    /// Look up a song by id.
    #[must_use]
    pub fn find(&self, id: &str) -> Option<&Song> {
        self.songs.get(id.trim())
    }

    /// Number of songs in the catalog
    #[must_use]
    pub fn len(&self) -> usize {
        self.songs.len()
    }

    /// Whether the catalog has no songs
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }
}
