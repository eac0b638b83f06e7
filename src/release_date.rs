//! Release-date intake.
//!
//! Two paths produce a [`ReleaseDate`]:
//! - Providers that only report a moment in time: the local calendar date is
//!   recovered by probing candidate time zones (see [`determine_release_date`]).
//! - Providers that report an explicit `YYYY-MM` / `YYYY-MM-DD` string with a
//!   stated precision: parsed directly, no guessing ([`parse_release_date`]).

use jiff::tz::TimeZone;
use jiff::Timestamp;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::models::ReleaseDate;

// ============================================================================
// Candidate Time Zones
// ============================================================================

/// Probe order for timestamp-only release dates. US zones first, then one
/// Asian reference zone, then UTC.
pub const DEFAULT_TIME_ZONE_NAMES: [&str; 7] = [
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/New_York",
    "America/Phoenix",
    "Asia/Kolkata",
    "Etc/UTC",
];

/// Built once on first use; read-only afterwards.
pub static DEFAULT_ZONES: Lazy<CandidateZones> = Lazy::new(|| {
    CandidateZones::from_names(DEFAULT_TIME_ZONE_NAMES, TimeZone::UTC)
        .expect("bundled tzdb contains the default candidate zones")
});

/// Ordered, immutable list of zones probed by [`determine_release_date`],
/// plus the zone used when none of them is plausible.
#[derive(Clone, Debug)]
pub struct CandidateZones {
    zones: Vec<TimeZone>,
    fallback: TimeZone,
}

impl CandidateZones {
    pub fn new(zones: Vec<TimeZone>, fallback: TimeZone) -> Self {
        Self { zones, fallback }
    }

    /// Load zones by IANA name, in the given priority order.
    pub fn from_names<I, S>(names: I, fallback: TimeZone) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let zones = names
            .into_iter()
            .map(|name| load_time_zone(name.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(zones, fallback))
    }

    pub fn zones(&self) -> &[TimeZone] {
        &self.zones
    }

    pub fn fallback(&self) -> &TimeZone {
        &self.fallback
    }
}

/// Look up an IANA time zone name.
pub fn load_time_zone(name: &str) -> Result<TimeZone> {
    TimeZone::get(name).map_err(|source| Error::UnknownTimeZone {
        name: name.to_string(),
        source,
    })
}

// ============================================================================
// Timestamp Resolution
// ============================================================================

/// Recover the most plausible local release date for a provider timestamp.
///
/// Providers record release dates at a fixed time of day (midnight or noon)
/// in their own, unknown zone. The first candidate in which the timestamp
/// lands exactly on 00:00 or 12:00 wins; otherwise the fallback zone is used
/// regardless of time of day.
///
/// This is a heuristic: when the source zone is not among the candidates the
/// calendar day can be off by one. Never fails.
pub fn determine_release_date(timestamp: Timestamp, zones: &CandidateZones) -> ReleaseDate {
    for tz in zones.zones() {
        let local = timestamp.to_zoned(tz.clone());
        if is_plausible_release_time(local.hour(), local.minute()) {
            return ReleaseDate::from_date(local.date());
        }
    }
    let local = timestamp.to_zoned(zones.fallback().clone());
    ReleaseDate::from_date(local.date())
}

fn is_plausible_release_time(hour: i8, minute: i8) -> bool {
    minute == 0 && (hour == 0 || hour == 12)
}

/// Convert provider unix seconds, rejecting values outside the supported range.
pub fn timestamp_from_unix(secs: i64) -> Result<Timestamp> {
    Timestamp::from_second(secs).map_err(|_| Error::TimestampOutOfRange(secs))
}

// ============================================================================
// Explicit Date Strings
// ============================================================================

/// Declared granularity of a provider release-date string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePrecision {
    Month,
    Day,
}

impl TryFrom<&str> for DatePrecision {
    type Error = Error;

    /// "year" precision is rejected: an album with only a year has no birthday.
    fn try_from(s: &str) -> Result<Self> {
        match s {
            "month" => Ok(DatePrecision::Month),
            "day" => Ok(DatePrecision::Day),
            other => Err(Error::UnsupportedPrecision(other.to_string())),
        }
    }
}

static MONTH_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})$").unwrap());

static DAY_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").unwrap());

/// Parse an explicit release-date string of the declared precision.
///
/// The string must have exactly the shape of its precision; `2020-05` with
/// day precision (or `2020-05-01` with month precision) is rejected.
pub fn parse_release_date(input: &str, precision: DatePrecision) -> Result<ReleaseDate> {
    let pattern = match precision {
        DatePrecision::Month => &*MONTH_DATE,
        DatePrecision::Day => &*DAY_DATE,
    };
    let caps = pattern.captures(input).ok_or_else(|| {
        Error::invalid_release_date(input, format!("does not match {:?} precision", precision))
    })?;

    let year: i16 = parse_component(input, &caps[1])?;
    let month: u8 = parse_component(input, &caps[2])?;
    let day = match caps.get(3) {
        Some(d) => Some(parse_component::<u8>(input, d.as_str())?),
        None => None,
    };
    ReleaseDate::new(year, month, day)
}

fn parse_component<T: std::str::FromStr>(input: &str, digits: &str) -> Result<T> {
    digits
        .parse()
        .map_err(|_| Error::invalid_release_date(input, format!("bad component '{}'", digits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn ts(s: &str) -> Timestamp {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_zones_load() {
        assert_eq!(DEFAULT_ZONES.zones().len(), DEFAULT_TIME_ZONE_NAMES.len());
    }

    #[test]
    fn test_midnight_chicago() {
        // CDT (UTC-5) is already in effect on March 14, 2019.
        let d = determine_release_date(ts("2019-03-14T05:00:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2019, 3, 14)));
    }

    #[test]
    fn test_midnight_new_york_after_earlier_candidates_miss() {
        // 23:00 in Chicago, 22:00 in Denver, 21:00 in Los Angeles, 00:00 in New York.
        let d = determine_release_date(ts("2020-01-31T05:00:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2020, 1, 31)));
    }

    #[test]
    fn test_noon_denver() {
        let d = determine_release_date(ts("2021-02-10T19:00:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2021, 2, 10)));
    }

    #[test]
    fn test_midnight_los_angeles() {
        let d = determine_release_date(ts("2018-06-01T07:00:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2018, 6, 1)));
    }

    #[test]
    fn test_kolkata_midnight_beats_utc_day() {
        // UTC would say November 30; midnight IST is December 1.
        let d = determine_release_date(ts("2017-11-30T18:30:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2017, 12, 1)));
    }

    #[test]
    fn test_no_plausible_zone_falls_back_to_utc() {
        let d = determine_release_date(ts("2016-05-20T03:17:00Z"), &DEFAULT_ZONES);
        assert_eq!(d, ReleaseDate::from_date(date(2016, 5, 20)));
    }

    #[test]
    fn test_first_plausible_zone_wins() {
        // Midnight UTC on the 9th is noon on the 8th at UTC-12.
        let instant = ts("2015-01-09T00:00:00Z");
        let utc_first = CandidateZones::from_names(["Etc/UTC", "Etc/GMT+12"], TimeZone::UTC).unwrap();
        let utc_last = CandidateZones::from_names(["Etc/GMT+12", "Etc/UTC"], TimeZone::UTC).unwrap();
        assert_eq!(
            determine_release_date(instant, &utc_first),
            ReleaseDate::from_date(date(2015, 1, 9))
        );
        assert_eq!(
            determine_release_date(instant, &utc_last),
            ReleaseDate::from_date(date(2015, 1, 8))
        );
    }

    #[test]
    fn test_custom_fallback_zone() {
        let zones = CandidateZones::new(Vec::new(), TimeZone::get("Asia/Kolkata").unwrap());
        let d = determine_release_date(ts("2016-05-20T20:17:00Z"), &zones);
        assert_eq!(d, ReleaseDate::from_date(date(2016, 5, 21)));
    }

    #[test]
    fn test_unknown_zone_name() {
        let err = CandidateZones::from_names(["Mars/Olympus_Mons"], TimeZone::UTC).unwrap_err();
        assert!(err.to_string().contains("Mars/Olympus_Mons"));
    }

    #[test]
    fn test_timestamp_out_of_range() {
        assert!(timestamp_from_unix(i64::MAX).is_err());
        assert!(timestamp_from_unix(1_600_000_000).is_ok());
    }

    #[test]
    fn test_parse_day_precision() {
        let d = parse_release_date("2019-03-14", DatePrecision::Day).unwrap();
        assert_eq!(d, ReleaseDate::new(2019, 3, Some(14)).unwrap());
    }

    #[test]
    fn test_parse_month_precision() {
        let d = parse_release_date("2019-06", DatePrecision::Month).unwrap();
        assert_eq!(d.day(), None);
        assert_eq!(d.month(), 6);
    }

    #[test]
    fn test_parse_rejects_precision_mismatch() {
        assert!(parse_release_date("2019-06", DatePrecision::Day).is_err());
        assert!(parse_release_date("2019-06-01", DatePrecision::Month).is_err());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse_release_date("", DatePrecision::Day).is_err());
        assert!(parse_release_date("2019", DatePrecision::Month).is_err());
        assert!(parse_release_date("2019-13", DatePrecision::Month).is_err());
        assert!(parse_release_date("2019-02-30", DatePrecision::Day).is_err());
        assert!(parse_release_date("19-02-03", DatePrecision::Day).is_err());
        assert!(parse_release_date("2019-ab-03", DatePrecision::Day).is_err());
    }

    #[test]
    fn test_precision_from_str() {
        assert_eq!(DatePrecision::try_from("day").unwrap(), DatePrecision::Day);
        assert_eq!(DatePrecision::try_from("month").unwrap(), DatePrecision::Month);
        assert!(DatePrecision::try_from("year").is_err());
    }
}
