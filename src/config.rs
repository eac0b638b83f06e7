//! Configuration loaded from a TOML file.
//!
//! Every section is optional; a missing file or a missing key falls back to
//! the built-in defaults. Command-line flags override file values.
//!
//! ```toml
//! [resolver]
//! candidate_time_zones = ["America/Chicago", "Etc/UTC"]
//! default_time_zone = "UTC"
//!
//! [digest]
//! time_zone = "Europe/Berlin"
//! fallback_days = 359
//! merge_cross_artist = false
//! ```

use std::borrow::Cow;
use std::path::Path;

use jiff::tz::TimeZone;
use serde::{Deserialize, Serialize};

use crate::birthdays::{DigestOptions, DEFAULT_FALLBACK_DAYS};
use crate::error::{Error, Result};
use crate::ingest::DEFAULT_ARTWORK_BASE_URL;
use crate::release_date::{load_time_zone, CandidateZones, DEFAULT_TIME_ZONE_NAMES, DEFAULT_ZONES};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Release-date resolution for timestamp-only providers
    pub resolver: ResolverConfig,

    /// Digest computation
    pub digest: DigestConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// IANA zones probed in order
    pub candidate_time_zones: Vec<String>,

    /// Used when no candidate lands on midnight or noon
    pub default_time_zone: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidate_time_zones: DEFAULT_TIME_ZONE_NAMES.iter().map(|s| s.to_string()).collect(),
            default_time_zone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Zone in which requested moments become calendar days
    pub time_zone: String,

    /// Days searched ahead when no requested day has a birthday (0 = off)
    pub fallback_days: u16,

    /// Fold "Artist" and "Artist, Guest" credits of one album together
    pub merge_cross_artist: bool,

    /// Host serving scrobble artwork
    pub artwork_base_url: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            time_zone: "UTC".to_string(),
            fallback_days: DEFAULT_FALLBACK_DAYS,
            merge_cross_artist: false,
            artwork_base_url: DEFAULT_ARTWORK_BASE_URL.to_string(),
        }
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

impl Config {
    /// Load configuration from `path`. A file that does not exist yields the
    /// defaults; a file that exists but does not parse is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", path);
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config = Self::from_toml(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Zones for release-date resolution. The default list shares the
    /// process-wide instance instead of loading the zones again.
    pub fn candidate_zones(&self) -> Result<Cow<'static, CandidateZones>> {
        if self.resolver == ResolverConfig::default() {
            return Ok(Cow::Borrowed(&*DEFAULT_ZONES));
        }
        if self.resolver.candidate_time_zones.is_empty() {
            tracing::warn!("No candidate time zones configured; every release date uses the default zone");
        }
        let fallback = load_time_zone(&self.resolver.default_time_zone)?;
        let zones = CandidateZones::from_names(&self.resolver.candidate_time_zones, fallback)?;
        Ok(Cow::Owned(zones))
    }

    pub fn digest_time_zone(&self) -> Result<TimeZone> {
        load_time_zone(&self.digest.time_zone)
    }

    pub fn digest_options(&self) -> DigestOptions {
        DigestOptions {
            fallback_days: self.digest.fallback_days,
            merge_cross_artist: self.digest.merge_cross_artist,
        }
    }
}
