//! Album consolidation: group matched songs into albums.
//!
//! Songs that match the target day are grouped by album identity
//! (artist, album title, release date, artwork URL). Track links are not
//! part of the identity: providers embed per-track query parameters in
//! otherwise identical album links.

use jiff::civil::Date;
use rustc_hash::FxHashMap;

use crate::matching::match_release;
use crate::models::{Album, ReleaseDate, Song};

/// Index mapping album identity hash to group index in Vec<AlbumGroup>
pub type AlbumIndex = FxHashMap<String, usize>;

/// Songs sharing one album identity, with the album's aggregate signals.
#[derive(Clone, Debug)]
pub struct AlbumGroup<'a> {
    pub hash: String,
    pub album: Album,
    pub songs: Vec<&'a Song>, // encounter order until ranked
}

impl AlbumGroup<'_> {
    /// Recompute `play_count` and `loved_count` from the constituent songs.
    pub fn recount(&mut self) {
        self.album.play_count = self.songs.iter().map(|s| u64::from(s.play_count)).sum();
        self.album.loved_count = self.songs.iter().filter(|s| s.is_loved()).count() as u32;
    }
}

/// Stable album identity string.
pub fn album_hash(
    artist: &str,
    album: &str,
    release: &ReleaseDate,
    artwork_url: Option<&str>,
) -> String {
    format!(
        "{} | {} | {} | {}",
        artist,
        album,
        release.hash_key(),
        artwork_url.unwrap_or("")
    )
}

/// Group the songs matching `target` into albums, in encounter order.
///
/// Non-matching songs are discarded. No two returned groups share a hash.
pub fn consolidate(target: Date, songs: &[Song]) -> Vec<AlbumGroup<'_>> {
    let mut index = AlbumIndex::default();
    let mut groups: Vec<AlbumGroup<'_>> = Vec::new();

    for song in songs {
        let Some(release_match) = match_release(target, &song.release) else {
            continue;
        };

        let hash = album_hash(
            &song.artist,
            &song.album,
            &song.release,
            song.artwork_url.as_deref(),
        );

        match index.get(&hash) {
            Some(&idx) => groups[idx].songs.push(song),
            None => {
                index.insert(hash.clone(), groups.len());
                groups.push(AlbumGroup {
                    hash,
                    album: Album {
                        artist: song.artist.clone(),
                        album: song.album.clone(),
                        release: song.release,
                        link: song.album_link.clone(),
                        artwork_url: song.artwork_url.clone(),
                        release_match,
                        play_count: 0,
                        loved_count: 0,
                    },
                    songs: vec![song],
                });
            }
        }
    }

    for group in &mut groups {
        group.recount();
    }
    groups
}

// ============================================================================
// Cross-Artist Merge (optional pass)
// ============================================================================

/// Same album credited to overlapping artist strings, e.g. "Max Richter"
/// and "Max Richter, KiKi Layne & Robert Ziegler" for one record.
///
/// True when one artist string is a prefix of the other and every other
/// identity field (album, release date, artwork, match kind) is equal.
pub fn equal_except_multiple_artists(a: &Album, b: &Album) -> bool {
    let prefixed = a.artist.starts_with(&b.artist) || b.artist.starts_with(&a.artist);
    prefixed
        && a.album == b.album
        && a.release == b.release
        && a.artwork_url == b.artwork_url
        && a.release_match == b.release_match
}

/// Merge groups whose albums differ only by an extended artist credit.
///
/// The shortest artist string survives. Groups are visited shortest artist
/// first, so the result does not depend on input order.
pub fn merge_cross_artist(mut groups: Vec<AlbumGroup<'_>>) -> Vec<AlbumGroup<'_>> {
    groups.sort_by(|a, b| {
        a.album
            .artist
            .len()
            .cmp(&b.album.artist.len())
            .then_with(|| a.album.artist.cmp(&b.album.artist))
            .then_with(|| a.hash.cmp(&b.hash))
    });

    let mut merged: Vec<AlbumGroup<'_>> = Vec::with_capacity(groups.len());
    for group in groups {
        let target = merged.iter_mut().find(|m| {
            group.album.artist.starts_with(&m.album.artist)
                && equal_except_multiple_artists(&m.album, &group.album)
        });
        match target {
            Some(existing) => {
                tracing::debug!(
                    kept = %existing.album.artist,
                    merged = %group.album.artist,
                    album = %group.album.album,
                    "merged cross-artist album"
                );
                existing.songs.extend(group.songs);
            }
            None => merged.push(group),
        }
    }

    for group in &mut merged {
        group.recount();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReleaseMatch;
    use jiff::civil::date;
    use pretty_assertions::assert_eq;
    use rustc_hash::FxHashSet;

    fn song(artist: &str, album: &str, title: &str, play_count: u32) -> Song {
        Song {
            artist: artist.to_string(),
            album: album.to_string(),
            title: title.to_string(),
            release: ReleaseDate::new(2020, 8, Some(1)).unwrap(),
            link: Some(format!("https://music.example/album/1?i={}", title)),
            album_link: Some("https://music.example/album/1".to_string()),
            artwork_url: Some("https://art.example/1.jpg".to_string()),
            play_count,
            loved: Some(false),
            track_number: None,
        }
    }

    #[test]
    fn test_copies_collapse_into_one_album() {
        let songs: Vec<Song> = (0..5).map(|i| song("A", "X", "t", i)).collect();
        let groups = consolidate(date(2024, 8, 1), &songs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].songs.len(), 5);
        assert_eq!(groups[0].album.play_count, 10);
    }

    #[test]
    fn test_non_matching_songs_are_dropped() {
        let mut other = song("B", "Y", "u", 1);
        other.release = ReleaseDate::new(2020, 9, Some(1)).unwrap();
        let songs = vec![song("A", "X", "t", 1), other];
        let groups = consolidate(date(2024, 8, 1), &songs);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].album.artist, "A");
        assert_eq!(groups[0].album.release_match, ReleaseMatch::Day);
    }

    #[test]
    fn test_track_link_is_not_identity() {
        let a = song("A", "X", "one", 1);
        let mut b = song("A", "X", "two", 1);
        b.link = Some("https://music.example/album/1?i=999&uo=4".to_string());
        let songs = vec![a, b];
        assert_eq!(consolidate(date(2024, 8, 1), &songs).len(), 1);
    }

    #[test]
    fn test_artwork_is_identity() {
        let a = song("A", "X", "one", 1);
        let mut b = song("A", "X", "two", 1);
        b.artwork_url = Some("https://art.example/2.jpg".to_string());
        let songs = vec![a, b];
        assert_eq!(consolidate(date(2024, 8, 1), &songs).len(), 2);
    }

    #[test]
    fn test_hashes_are_unique() {
        let songs = vec![
            song("A", "X", "1", 1),
            song("B", "X", "2", 1),
            song("A", "Y", "3", 1),
            song("A", "X", "4", 1),
            song("B", "X", "5", 1),
        ];
        let groups = consolidate(date(2024, 8, 1), &songs);
        let hashes: FxHashSet<&str> = groups.iter().map(|g| g.hash.as_str()).collect();
        assert_eq!(hashes.len(), groups.len());
        assert_eq!(groups.len(), 3);
    }

    #[test]
    fn test_loved_count_only_counts_true() {
        let mut a = song("A", "X", "1", 1);
        a.loved = Some(true);
        let mut b = song("A", "X", "2", 1);
        b.loved = None;
        let c = song("A", "X", "3", 1);
        let songs = vec![a, b, c];
        let groups = consolidate(date(2024, 8, 1), &songs);
        assert_eq!(groups[0].album.loved_count, 1);
    }

    #[test]
    fn test_month_precision_groups_separately_from_day() {
        let a = song("A", "X", "1", 1);
        let mut b = song("A", "X", "2", 1);
        b.release = ReleaseDate::new(2020, 8, None).unwrap();
        let songs = vec![a, b];
        let groups = consolidate(date(2024, 8, 1), &songs);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].album.release_match, ReleaseMatch::Month);
    }

    #[test]
    fn test_differing_artists_stay_distinct_without_merge() {
        let songs = vec![
            song("Max Richter", "Voices", "Prelude 6: Pt. 2", 1),
            song("Max Richter, KiKi Layne & Robert Ziegler", "Voices", "Hypocognition: Pt. 1", 1),
        ];
        assert_eq!(consolidate(date(2024, 8, 1), &songs).len(), 2);
    }

    #[test]
    fn test_merge_cross_artist_keeps_shortest_credit() {
        let songs = vec![
            song("Max Richter, KiKi Layne, Mari Samuelsen & Robert Ziegler", "Voices", "Murmuration: Pt. 1", 1),
            song("Max Richter", "Voices", "Prelude 6: Pt. 2", 2),
            song("Max Richter, KiKi Layne & Robert Ziegler", "Voices", "Hypocognition: Pt. 1", 3),
            song("Max Richter, Grace Davidson, Mari Samuelsen & Robert Ziegler", "Voices", "Chorale: Pt. 2", 4),
            song("Maxine", "Voices", "Other", 5),
        ];
        let groups = merge_cross_artist(consolidate(date(2024, 8, 1), &songs));
        assert_eq!(groups.len(), 2);
        let richter = groups.iter().find(|g| g.album.artist == "Max Richter").unwrap();
        assert_eq!(richter.songs.len(), 4);
        assert_eq!(richter.album.play_count, 10);
    }

    #[test]
    fn test_merge_requires_equal_album_fields() {
        let a = song("Max Richter", "Voices", "1", 1);
        let mut b = song("Max Richter, KiKi Layne", "Voices", "2", 1);
        b.artwork_url = Some("https://art.example/other.jpg".to_string());
        let songs = vec![a, b];
        let groups = merge_cross_artist(consolidate(date(2024, 8, 1), &songs));
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let forward = vec![
            song("Max Richter, KiKi Layne & Robert Ziegler", "Voices", "1", 1),
            song("Max Richter", "Voices", "2", 1),
        ];
        let backward: Vec<Song> = forward.iter().rev().cloned().collect();
        let f = merge_cross_artist(consolidate(date(2024, 8, 1), &forward));
        let b = merge_cross_artist(consolidate(date(2024, 8, 1), &backward));
        assert_eq!(f.len(), 1);
        assert_eq!(b.len(), 1);
        assert_eq!(f[0].album.artist, b[0].album.artist);
    }
}
