//! Birthday classification of a single release date against a target day.

use jiff::civil::Date;

use crate::models::{ReleaseDate, ReleaseMatch};

/// Classify `release` against the target calendar day.
///
/// The target's year is ignored: an album has a birthday on its release
/// month/day in every year. Releases known only to the month celebrate on
/// the first of that month.
pub fn match_release(target: Date, release: &ReleaseDate) -> Option<ReleaseMatch> {
    let month = target.month() as u8;
    let day = target.day() as u8;

    match release.day() {
        Some(release_day) => {
            (release_day == day && release.month() == month).then_some(ReleaseMatch::Day)
        }
        None => (release.month() == month && day == 1).then_some(ReleaseMatch::Month),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;

    fn day_release(y: i16, m: u8, d: u8) -> ReleaseDate {
        ReleaseDate::new(y, m, Some(d)).unwrap()
    }

    fn month_release(y: i16, m: u8) -> ReleaseDate {
        ReleaseDate::new(y, m, None).unwrap()
    }

    #[test]
    fn test_day_match() {
        let release = day_release(2019, 3, 14);
        assert_eq!(match_release(date(2024, 3, 14), &release), Some(ReleaseMatch::Day));
        assert_eq!(match_release(date(1990, 3, 14), &release), Some(ReleaseMatch::Day));
        assert_eq!(match_release(date(2024, 3, 15), &release), None);
        assert_eq!(match_release(date(2024, 4, 14), &release), None);
    }

    #[test]
    fn test_month_match() {
        let release = month_release(2019, 6);
        assert_eq!(match_release(date(2023, 6, 1), &release), Some(ReleaseMatch::Month));
        assert_eq!(match_release(date(2023, 6, 2), &release), None);
        assert_eq!(match_release(date(2023, 7, 1), &release), None);
    }

    #[test]
    fn test_day_release_on_first_is_day_match() {
        let release = day_release(2001, 9, 1);
        assert_eq!(match_release(date(2020, 9, 1), &release), Some(ReleaseMatch::Day));
    }

    #[test]
    fn test_leap_day_release() {
        let release = day_release(2020, 2, 29);
        assert_eq!(match_release(date(2024, 2, 29), &release), Some(ReleaseMatch::Day));
        assert_eq!(match_release(date(2023, 2, 28), &release), None);
        assert_eq!(match_release(date(2023, 3, 1), &release), None);
    }
}
