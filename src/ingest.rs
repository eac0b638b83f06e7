//! Library intake: provider export records → validated [`Song`]s.
//!
//! Records missing an artist, album or title, or whose release date cannot
//! be resolved, are dropped here so the engine only ever sees well-formed
//! songs. Nothing in this module touches the network.

use std::path::Path;

use serde::{Deserialize, Deserializer};
use url::{form_urlencoded, Url};

use crate::error::{Error, Result};
use crate::models::Song;
use crate::release_date::{
    determine_release_date, parse_release_date, timestamp_from_unix, CandidateZones, DatePrecision,
};

/// Host serving artwork for scrobble exports.
pub const DEFAULT_ARTWORK_BASE_URL: &str = "https://selective-scrobble.appspot.com/api/v1";

// ============================================================================
// Scrobble Records
// ============================================================================

/// Song as exported by the scrobble service. Release date is unix seconds.
///
/// Every field tolerates `null` as well as absence; such records are
/// dropped by [`transform_scrobble_song`] rather than failing the library.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrobbleSong {
    #[serde(default, deserialize_with = "null_as_default")]
    pub album_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artist_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date: i64, // 0 = unknown
    #[serde(default, deserialize_with = "null_as_default")]
    pub play_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artwork_hash: String,
    #[serde(rename = "trackViewURL", default, deserialize_with = "null_as_default")]
    pub track_view_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub loved: bool,
}

/// Provider exports write `null` for unknown values; treat it like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn transform_scrobble_song(
    record: &ScrobbleSong,
    zones: &CandidateZones,
    artwork_base_url: &str,
) -> Option<Song> {
    if record.artist_name.is_empty()
        || record.album_title.is_empty()
        || record.title.is_empty()
        || record.release_date == 0
    {
        tracing::debug!(title = %record.title, "dropping scrobble song with missing fields");
        return None;
    }

    let timestamp = match timestamp_from_unix(record.release_date) {
        Ok(ts) => ts,
        Err(err) => {
            tracing::debug!(title = %record.title, %err, "dropping scrobble song");
            return None;
        }
    };

    Some(Song {
        artist: record.artist_name.clone(),
        album: record.album_title.clone(),
        title: record.title.clone(),
        release: determine_release_date(timestamp, zones),
        link: non_empty(&record.track_view_url),
        album_link: track_to_album_link(&record.track_view_url),
        artwork_url: artwork_url(artwork_base_url, &record.artwork_hash),
        play_count: record.play_count,
        loved: Some(record.loved),
        track_number: None,
    })
}

/// Album link for a track link: the same URL without its query string.
pub fn track_to_album_link(track_view_url: &str) -> Option<String> {
    if track_view_url.is_empty() {
        return None;
    }
    let mut url = Url::parse(track_view_url).ok()?;
    url.set_query(None);
    Some(url.to_string())
}

pub fn artwork_url(base_url: &str, artwork_hash: &str) -> Option<String> {
    if artwork_hash.is_empty() {
        return None;
    }
    Some(format!(
        "{}/artwork?hash={}",
        base_url.trim_end_matches('/'),
        form_urlencoded::byte_serialize(artwork_hash.as_bytes()).collect::<String>()
    ))
}

// ============================================================================
// Spotify Records
// ============================================================================

#[derive(Clone, Debug, Deserialize)]
pub struct SpotifySavedTrack {
    #[serde(default, deserialize_with = "null_as_default")]
    pub added_at: String,
    #[serde(default)]
    pub track: Option<SpotifyTrack>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpotifyTrack {
    #[serde(default, deserialize_with = "null_as_default")]
    pub album: SpotifyAlbum,
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_urls: SpotifyExternalUrls,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub track_number: i64,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpotifyExternalUrls {
    #[serde(default, deserialize_with = "null_as_default")]
    pub spotify: String,
}

/// Local-file tracks come back with `null` release date and precision.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpotifyAlbum {
    #[serde(default, deserialize_with = "null_as_default")]
    pub external_urls: SpotifyExternalUrls,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artists: Vec<SpotifyArtist>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<SpotifyImage>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_date_precision: String, // "year" | "month" | "day"
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpotifyImage {
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SpotifyArtist {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Only the first credited album artist is used. Year-precision releases
/// have no birthday and are dropped.
pub fn transform_spotify_track(track: &SpotifyTrack) -> Option<Song> {
    let artist = track.album.artists.first()?;
    if track.name.is_empty() || artist.name.is_empty() || track.album.name.is_empty() {
        tracing::debug!(title = %track.name, "dropping spotify track with missing fields");
        return None;
    }
    if track.album.release_date.is_empty() {
        tracing::debug!(title = %track.name, "dropping spotify track without release date");
        return None;
    }

    let release = DatePrecision::try_from(track.album.release_date_precision.as_str())
        .and_then(|precision| parse_release_date(&track.album.release_date, precision));
    let release = match release {
        Ok(release) => release,
        Err(err) => {
            tracing::debug!(title = %track.name, %err, "dropping spotify track");
            return None;
        }
    };

    Some(Song {
        artist: artist.name.clone(),
        album: track.album.name.clone(),
        title: track.name.clone(),
        release,
        link: non_empty(&track.external_urls.spotify),
        album_link: non_empty(&track.album.external_urls.spotify),
        artwork_url: widest_image(&track.album.images).and_then(|img| non_empty(&img.url)),
        play_count: 0,
        loved: None,
        track_number: u32::try_from(track.track_number).ok().filter(|&n| n > 0),
    })
}

/// Widest image; the first one listed wins ties.
fn widest_image(images: &[SpotifyImage]) -> Option<&SpotifyImage> {
    images.iter().fold(None, |best, img| match best {
        Some(b) if b.width.unwrap_or(0) >= img.width.unwrap_or(0) => Some(b),
        _ => Some(img),
    })
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

// ============================================================================
// Library Files
// ============================================================================

/// A library export file, tagged by the service it came from.
#[derive(Debug, Deserialize)]
#[serde(tag = "service", rename_all = "lowercase")]
pub enum LibraryExport {
    Scrobble {
        songs: Vec<ScrobbleSong>,
    },
    Spotify {
        items: Vec<SpotifySavedTrack>,
    },
    /// Already-normalized songs; validated one by one.
    Songs {
        songs: Vec<serde_json::Value>,
    },
}

/// Songs accepted from one library, plus how many records were rejected.
#[derive(Debug, Clone, Default)]
pub struct LoadedLibrary {
    pub songs: Vec<Song>,
    pub dropped: usize,
}

impl LibraryExport {
    pub fn into_library(self, zones: &CandidateZones, artwork_base_url: &str) -> LoadedLibrary {
        let (total, songs): (usize, Vec<Song>) = match self {
            LibraryExport::Scrobble { songs } => (
                songs.len(),
                songs
                    .iter()
                    .filter_map(|s| transform_scrobble_song(s, zones, artwork_base_url))
                    .collect(),
            ),
            LibraryExport::Spotify { items } => (
                items.len(),
                items
                    .iter()
                    .filter_map(|item| item.track.as_ref().and_then(transform_spotify_track))
                    .collect(),
            ),
            LibraryExport::Songs { songs } => (
                songs.len(),
                songs.into_iter().filter_map(validate_song).collect(),
            ),
        };
        LoadedLibrary {
            dropped: total - songs.len(),
            songs,
        }
    }
}

fn validate_song(value: serde_json::Value) -> Option<Song> {
    match serde_json::from_value::<Song>(value) {
        Ok(song) if song.has_identity() => Some(song),
        Ok(song) => {
            tracing::debug!(title = %song.title, "dropping song with missing artist/album/title");
            None
        }
        Err(err) => {
            tracing::debug!(%err, "dropping malformed song");
            None
        }
    }
}

pub fn parse_library(
    json: &str,
    zones: &CandidateZones,
    artwork_base_url: &str,
) -> Result<LoadedLibrary> {
    let export: LibraryExport = serde_json::from_str(json)?;
    Ok(export.into_library(zones, artwork_base_url))
}

/// Read and convert a library export file.
pub fn load_library(
    path: &Path,
    zones: &CandidateZones,
    artwork_base_url: &str,
) -> Result<LoadedLibrary> {
    let json = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let library = parse_library(&json, zones, artwork_base_url)?;
    tracing::info!(
        path = %path.display(),
        songs = library.songs.len(),
        dropped = library.dropped,
        "loaded library"
    );
    Ok(library)
}
