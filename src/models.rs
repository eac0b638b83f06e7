//! Core data models for the birthday engine.
//!
//! This module contains the input song model, the precision-aware release
//! date, and the album/digest types produced by the pipeline.

use std::fmt;

use jiff::civil::Date;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

// ============================================================================
// Release Dates
// ============================================================================

/// A release date with either day or month precision.
///
/// Fields are private: every constructor validates, so a `ReleaseDate` held
/// by the engine is always a real calendar date (or a real year/month).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawReleaseDate", into = "RawReleaseDate")]
pub struct ReleaseDate {
    year: i16,
    month: u8,
    day: Option<u8>, // None = month precision only
}

impl ReleaseDate {
    pub fn new(year: i16, month: u8, day: Option<u8>) -> Result<Self> {
        let input = match day {
            Some(d) => format!("{year}-{month}-{d}"),
            None => format!("{year}-{month}"),
        };
        if !(1..=12).contains(&month) {
            return Err(Error::invalid_release_date(input, "month out of range"));
        }
        // Validate against the real calendar; month precision still needs a valid year.
        let probe_day = day.unwrap_or(1);
        if probe_day > 31 {
            return Err(Error::invalid_release_date(input, "day out of range"));
        }
        Date::new(year, month as i8, probe_day as i8)
            .map_err(|e| Error::invalid_release_date(input, e.to_string()))?;
        Ok(Self { year, month, day })
    }

    /// Day-precision release date from a civil date.
    pub fn from_date(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month() as u8,
            day: Some(date.day() as u8),
        }
    }

    pub fn year(&self) -> i16 {
        self.year
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> Option<u8> {
        self.day
    }

    pub fn has_day(&self) -> bool {
        self.day.is_some()
    }

    /// Normalized form used inside album identity hashes: `2020-8-1` or `2020-8-`.
    pub fn hash_key(&self) -> String {
        match self.day {
            Some(d) => format!("{}-{}-{}", self.year, self.month, d),
            None => format!("{}-{}-", self.year, self.month),
        }
    }
}

impl fmt::Display for ReleaseDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.day {
            Some(d) => write!(f, "{:04}-{:02}-{:02}", self.year, self.month, d),
            None => write!(f, "{:04}-{:02}", self.year, self.month),
        }
    }
}

/// Wire form of [`ReleaseDate`]; `day` omitted for month precision.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct RawReleaseDate {
    year: i16,
    month: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day: Option<u8>,
}

impl TryFrom<RawReleaseDate> for ReleaseDate {
    type Error = Error;

    fn try_from(raw: RawReleaseDate) -> Result<Self> {
        ReleaseDate::new(raw.year, raw.month, raw.day)
    }
}

impl From<ReleaseDate> for RawReleaseDate {
    fn from(d: ReleaseDate) -> Self {
        Self {
            year: d.year,
            month: d.month,
            day: d.day,
        }
    }
}

// ============================================================================
// Songs
// ============================================================================

/// One listened-to track from a user's library.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub artist: String,
    pub album: String,
    pub title: String,
    pub release: ReleaseDate,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album_link: Option<String>,
    #[serde(rename = "artworkURL", default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,

    #[serde(default)]
    pub play_count: u32,
    #[serde(default)]
    pub loved: Option<bool>, // None = provider has no loved flag
    /// Unknown is `None`; legacy exports use `-1`, accepted on input.
    #[serde(default, deserialize_with = "track_number_or_unknown")]
    pub track_number: Option<u32>,
}

impl Song {
    /// Only an explicit `true` counts; absent and `false` are equivalent.
    pub fn is_loved(&self) -> bool {
        self.loved == Some(true)
    }

    /// Artist, album and title are all present.
    pub fn has_identity(&self) -> bool {
        !self.artist.is_empty() && !self.album.is_empty() && !self.title.is_empty()
    }
}

fn track_number_or_unknown<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let n: Option<i64> = Option::deserialize(deserializer)?;
    Ok(n.and_then(|n| u32::try_from(n).ok()))
}

// ============================================================================
// Matching & Albums
// ============================================================================

/// How a release date matched the target day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseMatch {
    /// Exact month/day anniversary
    Day,
    /// Month-precision release on the first of its month
    Month,
}

impl ReleaseMatch {
    /// Rank for sorting: lower is better (day < month)
    pub fn rank(self) -> u8 {
        match self {
            ReleaseMatch::Day => 0,
            ReleaseMatch::Month => 1,
        }
    }
}

/// An album assembled from matched songs, with aggregate listening signals.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub artist: String,
    pub album: String,
    pub release: ReleaseDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(rename = "artworkURL", default, skip_serializing_if = "Option::is_none")]
    pub artwork_url: Option<String>,
    pub release_match: ReleaseMatch,
    pub play_count: u64,
    pub loved_count: u32,
}

/// Song as presented in a digest: title and link only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdaySong {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// One album celebrating a birthday, with its songs in presentation order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BirthdayItem {
    #[serde(flatten)]
    pub album: Album,
    pub songs: Vec<BirthdaySong>,
}

// ============================================================================
// Digest Output
// ============================================================================

/// Birthday items per requested day, keyed by unix seconds.
///
/// Keys keep the order in which they were inserted (the caller's order, then
/// any fallback day). Serializes as a JSON object.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BirthdayResponse {
    entries: Vec<(i64, Vec<BirthdayItem>)>,
}

impl BirthdayResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the items for `key`, keeping its original position.
    pub fn insert(&mut self, key: i64, items: Vec<BirthdayItem>) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = items,
            None => self.entries.push((key, items)),
        }
    }

    pub fn get(&self, key: i64) -> Option<&[BirthdayItem]> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, items)| items.as_slice())
    }

    pub fn keys(&self) -> impl Iterator<Item = i64> + '_ {
        self.entries.iter().map(|(k, _)| *k)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &[BirthdayItem])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when at least one day has at least one item.
    pub fn has_items(&self) -> bool {
        self.entries.iter().any(|(_, items)| !items.is_empty())
    }

    pub fn item_count(&self) -> usize {
        self.entries.iter().map(|(_, items)| items.len()).sum()
    }
}

impl Serialize for BirthdayResponse {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, items) in &self.entries {
            map.serialize_entry(key, items)?;
        }
        map.end()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Counters accumulated while building digests, for `--stats` output.
#[derive(Default, Debug, Clone, Serialize)]
pub struct DigestStats {
    pub libraries: usize,
    pub failed_libraries: usize,
    pub songs_loaded: usize,
    pub songs_dropped: usize,
    pub days_requested: usize,
    pub albums_matched: usize,
    pub fallbacks_used: usize,
    pub empty_digests: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl DigestStats {
    /// Fold another library's counters into this one.
    pub fn merge(&mut self, other: &DigestStats) {
        self.libraries += other.libraries;
        self.failed_libraries += other.failed_libraries;
        self.songs_loaded += other.songs_loaded;
        self.songs_dropped += other.songs_dropped;
        self.days_requested += other.days_requested;
        self.albums_matched += other.albums_matched;
        self.fallbacks_used += other.fallbacks_used;
        self.empty_digests += other.empty_digests;
    }

    /// Log stats in JSON format
    pub fn log_summary(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            tracing::info!(phase, "digest stats\n{}", json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
