//! Error types for the birthday engine and its intake boundary.
//!
//! The matching pipeline itself is total over valid input; errors only
//! arise where raw data enters (release-date strings, timestamps, time-zone
//! names, library and config files). The binary wraps these in `anyhow`.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Release date that is not a valid calendar date or does not fit its precision
    #[error("invalid release date '{input}': {reason}")]
    InvalidReleaseDate { input: String, reason: String },

    /// Provider precision other than "month" or "day"
    #[error("unsupported release date precision '{0}'")]
    UnsupportedPrecision(String),

    #[error("unknown time zone '{name}': {source}")]
    UnknownTimeZone {
        name: String,
        #[source]
        source: jiff::Error,
    },

    #[error("timestamp {0} is out of range")]
    TimestampOutOfRange(i64),

    #[error("invalid date: {0}")]
    InvalidDate(#[from] jiff::Error),

    #[error("IO error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_release_date(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidReleaseDate {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_release_date_display() {
        let err = Error::invalid_release_date("2020-13", "month out of range");
        let msg = err.to_string();
        assert!(msg.contains("2020-13"));
        assert!(msg.contains("month out of range"));
    }

    #[test]
    fn test_io_error_mentions_path() {
        let err = Error::io(
            "/data/library.json",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.to_string().contains("/data/library.json"));
    }
}
