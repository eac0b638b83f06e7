//! The birthday pipeline: match → consolidate → (merge) → rank, per day,
//! plus the forward fallback scan used when nothing matches.
//!
//! Everything here is a pure function of the song slice and the requested
//! days; callers own fetching and caching.

use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::{Span, Zoned};

use crate::consolidate::{consolidate, merge_cross_artist};
use crate::error::Result;
use crate::models::{BirthdayItem, BirthdayResponse, Song};
use crate::ranking::rank;
use crate::release_date::timestamp_from_unix;

/// How far ahead the fallback scan looks: just short of a full year.
pub const DEFAULT_FALLBACK_DAYS: u16 = 359;

/// Knobs for one digest computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestOptions {
    /// Days after the latest requested day searched when nothing matches
    pub fallback_days: u16,
    /// Run the cross-artist merge pass after consolidation
    pub merge_cross_artist: bool,
}

impl Default for DigestOptions {
    fn default() -> Self {
        Self {
            fallback_days: DEFAULT_FALLBACK_DAYS,
            merge_cross_artist: false,
        }
    }
}

/// Ordered birthday items for one calendar day.
pub fn compute_birthdays(target: Date, songs: &[Song], options: &DigestOptions) -> Vec<BirthdayItem> {
    let mut groups = consolidate(target, songs);
    if options.merge_cross_artist {
        groups = merge_cross_artist(groups);
    }
    rank(groups)
}

/// Birthday items for each requested moment, keyed by the moment's unix
/// seconds in the caller's order. The day of each moment is taken in `tz`.
pub fn compute_birthdays_for_timestamps(
    timestamps: &[i64],
    tz: &TimeZone,
    songs: &[Song],
    options: &DigestOptions,
) -> Result<BirthdayResponse> {
    let mut response = BirthdayResponse::new();
    for &secs in timestamps {
        let day = timestamp_from_unix(secs)?.to_zoned(tz.clone()).date();
        response.insert(secs, compute_birthdays(day, songs, options));
    }
    Ok(response)
}

/// Search forward from `latest` for the first day with any birthday.
///
/// Days are calendar days in `latest`'s zone, so the wall-clock time of
/// `latest` is kept across DST changes. Looks at most
/// `options.fallback_days` days ahead.
pub fn fallback_scan(
    latest: &Zoned,
    songs: &[Song],
    options: &DigestOptions,
) -> Option<(Zoned, Vec<BirthdayItem>)> {
    for add_day in 1..=i64::from(options.fallback_days) {
        let candidate = match latest.checked_add(Span::new().days(add_day)) {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::debug!(add_day, %err, "fallback scan ran past the supported range");
                return None;
            }
        };
        let items = compute_birthdays(candidate.date(), songs, options);
        if !items.is_empty() {
            tracing::info!(
                day = %candidate.date(),
                days_ahead = add_day,
                albums = items.len(),
                "fallback scan found birthdays"
            );
            return Some((candidate, items));
        }
    }
    tracing::debug!(days = options.fallback_days, "fallback scan found nothing");
    None
}

/// Full digest for the requested moments.
///
/// When none of the requested days has a birthday, the fallback scan runs
/// from the latest requested moment and, if it finds a day, that day is
/// appended keyed by its own unix seconds.
pub fn compute_digest(
    timestamps: &[i64],
    tz: &TimeZone,
    songs: &[Song],
    options: &DigestOptions,
) -> Result<BirthdayResponse> {
    let mut response = compute_birthdays_for_timestamps(timestamps, tz, songs, options)?;
    if response.has_items() {
        return Ok(response);
    }

    let Some(&latest) = timestamps.iter().max() else {
        return Ok(response);
    };
    let latest = timestamp_from_unix(latest)?.to_zoned(tz.clone());
    if let Some((day, items)) = fallback_scan(&latest, songs, options) {
        response.insert(day.timestamp().as_second(), items);
    }
    Ok(response)
}

/// Unix seconds of the start of `date` in `tz`.
pub fn start_of_day(date: Date, tz: &TimeZone) -> Result<i64> {
    Ok(date.to_zoned(tz.clone())?.timestamp().as_second())
}
