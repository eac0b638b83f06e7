//! Deterministic ordering of birthday albums and of songs within an album.
//!
//! Both comparisons are total orders: nothing depends on the order in which
//! songs arrived, so the same library always yields the same digest.

use std::cmp::Ordering;

use crate::consolidate::AlbumGroup;
use crate::models::{BirthdayItem, BirthdaySong, Song};

/// Song order within an album, best first.
///
/// 1. loved before not loved (absent counts as not loved)
/// 2. higher play count
/// 3. lower track number; unknown (`None`) sorts before every known number
/// 4. title
///
/// Track link, then album link, settle songs tied on every rule above.
pub fn compare_songs(a: &Song, b: &Song) -> Ordering {
    b.is_loved()
        .cmp(&a.is_loved())
        .then_with(|| b.play_count.cmp(&a.play_count))
        .then_with(|| a.track_number.cmp(&b.track_number))
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.link.cmp(&b.link))
        .then_with(|| a.album_link.cmp(&b.album_link))
}

/// Album order, best first. Songs of both groups must already be ranked.
///
/// 1. higher total play count
/// 2. more loved songs
/// 3. more recent release year
/// 4. day match before month match
/// 5. artist
/// 6. title of the top-ranked song
/// 7. album title
///
/// Groups tied on all seven differ in artwork URL (the only remaining
/// identity field), which settles them; the album link is a last resort.
pub fn compare_albums(a: &AlbumGroup<'_>, b: &AlbumGroup<'_>) -> Ordering {
    let (x, y) = (&a.album, &b.album);
    y.play_count
        .cmp(&x.play_count)
        .then_with(|| y.loved_count.cmp(&x.loved_count))
        .then_with(|| y.release.year().cmp(&x.release.year()))
        .then_with(|| x.release_match.rank().cmp(&y.release_match.rank()))
        .then_with(|| x.artist.cmp(&y.artist))
        .then_with(|| first_title(a).cmp(&first_title(b)))
        .then_with(|| x.album.cmp(&y.album))
        .then_with(|| x.artwork_url.cmp(&y.artwork_url))
        .then_with(|| x.link.cmp(&y.link))
}

fn first_title<'s>(group: &'s AlbumGroup<'_>) -> Option<&'s str> {
    group.songs.first().map(|s| s.title.as_str())
}

/// Order songs inside each group, then the groups, and project the result
/// into digest items.
///
/// The album link shown for a group is the album link of its top-ranked song.
pub fn rank(mut groups: Vec<AlbumGroup<'_>>) -> Vec<BirthdayItem> {
    for group in &mut groups {
        group.songs.sort_by(|a, b| compare_songs(a, b));
        group.album.link = group.songs.first().and_then(|s| s.album_link.clone());
    }
    groups.sort_by(|a, b| compare_albums(a, b));

    groups
        .into_iter()
        .map(|group| BirthdayItem {
            songs: group
                .songs
                .iter()
                .map(|s| BirthdaySong {
                    title: s.title.clone(),
                    link: s.link.clone(),
                })
                .collect(),
            album: group.album,
        })
        .collect()
}
