use album_birthdays::birthdays::{compute_digest, start_of_day, DigestOptions};
use album_birthdays::config::Config;
use album_birthdays::ingest::load_library;
use album_birthdays::models::{BirthdayResponse, DigestStats};
use album_birthdays::progress::{create_progress_bar, format_duration, log_progress, set_log_only};
use album_birthdays::release_date::CandidateZones;
use album_birthdays::safety::validate_output_path;
use anyhow::{bail, Context, Result};
use clap::{ArgMatches, CommandFactory, FromArgMatches, Parser};
use jiff::civil::Date;
use jiff::tz::TimeZone;
use jiff::Timestamp;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "album-birthdays")]
#[command(about = "Find albums in music libraries whose release anniversary falls on given days")]
struct Args {
    /// Library export files (JSON), one per user
    #[arg(required = true)]
    libraries: Vec<PathBuf>,

    /// Day to check (YYYY-MM-DD), taken as the start of that day in --tz
    #[arg(long = "date")]
    dates: Vec<String>,

    /// Moment to check, unix seconds
    #[arg(long = "timestamp", allow_hyphen_values = true)]
    timestamps: Vec<i64>,

    /// Time zone for turning moments into calendar days (overrides config)
    #[arg(long, env = "ALBUM_BIRTHDAYS_TZ")]
    tz: Option<String>,

    #[arg(long, env = "ALBUM_BIRTHDAYS_CONFIG", default_value = "album-birthdays.toml")]
    config: PathBuf,

    /// Do not search ahead when no requested day has a birthday
    #[arg(long)]
    no_fallback: bool,

    /// Fold albums credited to "Artist" and "Artist, Guest" together
    #[arg(long)]
    merge_artists: bool,

    /// Write the digest here instead of stdout (.json)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write run statistics (JSON) to this path
    #[arg(long)]
    stats: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars; log progress lines instead (for tail -f / CI)
    #[arg(long)]
    log_only: bool,
}

/// One library's digest, plus its counters.
struct LibraryDigest {
    path: PathBuf,
    response: BirthdayResponse,
    stats: DigestStats,
}

fn main() -> Result<()> {
    let matches = Args::command().get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("album_birthdays=info".parse()?))
        .init();

    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    if let Some(output) = &args.output {
        let sources: Vec<&Path> = args.libraries.iter().map(PathBuf::as_path).collect();
        validate_output_path(output, &sources)?;
    }

    let start = Instant::now();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config {:?}", args.config))?;
    if let Some(tz) = &args.tz {
        config.digest.time_zone = tz.clone();
    }
    if args.no_fallback {
        config.digest.fallback_days = 0;
    }
    if args.merge_artists {
        config.digest.merge_cross_artist = true;
    }

    let zones = config.candidate_zones().context("Invalid resolver time zones")?;
    let tz = config
        .digest_time_zone()
        .with_context(|| format!("Invalid time zone '{}'", config.digest.time_zone))?;
    let options = config.digest_options();
    let timestamps = requested_timestamps(&matches, &tz)?;

    tracing::info!(
        libraries = args.libraries.len(),
        days = timestamps.len(),
        time_zone = %config.digest.time_zone,
        fallback_days = options.fallback_days,
        merge_cross_artist = options.merge_cross_artist,
        "computing album birthdays"
    );

    let total = args.libraries.len() as u64;
    let pb = create_progress_bar(total, "Libraries");
    let done = AtomicU64::new(0);

    let results: Vec<(&Path, Result<LibraryDigest>)> = args
        .libraries
        .par_iter()
        .map(|path| {
            let digest = digest_library(
                path,
                &zones,
                &config.digest.artwork_base_url,
                &timestamps,
                &tz,
                &options,
            );
            pb.inc(1);
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            log_progress("libraries", current, total, 10);
            (path.as_path(), digest)
        })
        .collect();
    pb.finish_and_clear();

    let (out, mut stats) = assemble(results)?;
    if stats.libraries == 0 {
        bail!("No library could be processed ({} failed)", stats.failed_libraries);
    }
    stats.elapsed_seconds = start.elapsed().as_secs_f64();

    let json = serde_json::to_string_pretty(&out)?;
    match &args.output {
        Some(output) => {
            std::fs::write(output, json)
                .with_context(|| format!("Failed to write output {:?}", output))?;
            tracing::info!("Wrote digest to {:?}", output);
        }
        None => println!("{}", json),
    }

    stats.log_summary("complete");
    if let Some(path) = &args.stats {
        stats.write_to_file(path)?;
        tracing::info!("Stats written to {:?}", path);
    }
    tracing::info!("Done in {}", format_duration(start.elapsed()));

    Ok(())
}

/// Requested moments in command-line order, `--date` and `--timestamp`
/// interleaved as given. Defaults to now.
fn requested_timestamps(matches: &ArgMatches, tz: &TimeZone) -> Result<Vec<i64>> {
    let mut ordered: Vec<(usize, i64)> = Vec::new();

    if let (Some(values), Some(indices)) = (
        matches.get_many::<String>("dates"),
        matches.indices_of("dates"),
    ) {
        for (raw, idx) in values.zip(indices) {
            let date: Date = raw
                .parse()
                .with_context(|| format!("Invalid --date '{}', expected YYYY-MM-DD", raw))?;
            ordered.push((idx, start_of_day(date, tz)?));
        }
    }
    if let (Some(values), Some(indices)) = (
        matches.get_many::<i64>("timestamps"),
        matches.indices_of("timestamps"),
    ) {
        ordered.extend(indices.zip(values.copied()));
    }

    ordered.sort_by_key(|&(idx, _)| idx);
    let mut timestamps: Vec<i64> = ordered.into_iter().map(|(_, ts)| ts).collect();
    if timestamps.is_empty() {
        timestamps.push(Timestamp::now().as_second());
    }
    Ok(timestamps)
}

/// Collect per-library results into the output map. A library that failed
/// is logged and counted, and the others are still reported.
fn assemble(
    results: Vec<(&Path, Result<LibraryDigest>)>,
) -> Result<(serde_json::Map<String, serde_json::Value>, DigestStats)> {
    let mut stats = DigestStats::default();
    let mut out = serde_json::Map::new();
    for (path, result) in results {
        match result {
            Ok(digest) => {
                stats.merge(&digest.stats);
                out.insert(
                    digest.path.display().to_string(),
                    serde_json::to_value(&digest.response)?,
                );
            }
            Err(err) => {
                tracing::warn!("Skipping library {:?}: {:#}", path, err);
                stats.failed_libraries += 1;
            }
        }
    }
    Ok((out, stats))
}

fn digest_library(
    path: &Path,
    zones: &CandidateZones,
    artwork_base_url: &str,
    timestamps: &[i64],
    tz: &TimeZone,
    options: &DigestOptions,
) -> Result<LibraryDigest> {
    let library = load_library(path, zones, artwork_base_url)
        .with_context(|| format!("Failed to load library {:?}", path))?;
    let response = compute_digest(timestamps, tz, &library.songs, options)
        .with_context(|| format!("Failed to compute digest for {:?}", path))?;

    let requested_empty = timestamps
        .iter()
        .all(|&t| response.get(t).map_or(true, |items| items.is_empty()));
    let fallback_used = requested_empty && response.has_items();

    let stats = DigestStats {
        libraries: 1,
        failed_libraries: 0,
        songs_loaded: library.songs.len(),
        songs_dropped: library.dropped,
        days_requested: timestamps.len(),
        albums_matched: response.item_count(),
        fallbacks_used: usize::from(fallback_used),
        empty_digests: usize::from(!response.has_items()),
        elapsed_seconds: 0.0,
    };
    if !response.has_items() {
        tracing::info!("No album birthdays for {:?}", path);
    }

    Ok(LibraryDigest {
        path: path.to_path_buf(),
        response,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use album_birthdays::ingest::DEFAULT_ARTWORK_BASE_URL;
    use album_birthdays::release_date::DEFAULT_ZONES;
    use pretty_assertions::assert_eq;

    fn matches(argv: &[&str]) -> ArgMatches {
        Args::command().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn test_requested_timestamps_keep_command_line_order() {
        let m = matches(&[
            "album-birthdays",
            "lib.json",
            "--timestamp",
            "100",
            "--date",
            "2024-01-02",
            "--timestamp",
            "50",
        ]);
        let timestamps = requested_timestamps(&m, &TimeZone::UTC).unwrap();
        assert_eq!(timestamps, vec![100, 1_704_153_600, 50]);
    }

    #[test]
    fn test_requested_timestamps_default_to_now() {
        let before = Timestamp::now().as_second();
        let timestamps = requested_timestamps(&matches(&["album-birthdays", "lib.json"]), &TimeZone::UTC).unwrap();
        assert_eq!(timestamps.len(), 1);
        assert!(timestamps[0] >= before);
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let m = matches(&["album-birthdays", "lib.json", "--date", "2024-02-30"]);
        assert!(requested_timestamps(&m, &TimeZone::UTC).is_err());
    }

    #[test]
    fn test_failed_library_does_not_abort_others() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        std::fs::write(
            &good,
            r#"{"service": "songs", "songs": [
                {"artist": "A", "album": "X", "title": "t", "release": {"year": 2001, "month": 5, "day": 5}}
            ]}"#,
        )
        .unwrap();
        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        let missing = dir.path().join("missing.json");

        let timestamps = [start_of_day(jiff::civil::date(2024, 5, 5), &TimeZone::UTC).unwrap()];
        let options = DigestOptions::default();
        let results: Vec<(&Path, Result<LibraryDigest>)> = [&good, &broken, &missing]
            .into_iter()
            .map(|path| {
                let digest = digest_library(
                    path,
                    &DEFAULT_ZONES,
                    DEFAULT_ARTWORK_BASE_URL,
                    &timestamps,
                    &TimeZone::UTC,
                    &options,
                );
                (path.as_path(), digest)
            })
            .collect();

        let (out, stats) = assemble(results).unwrap();
        assert_eq!(out.len(), 1);
        assert!(out.contains_key(&good.display().to_string()));
        assert_eq!(stats.libraries, 1);
        assert_eq!(stats.failed_libraries, 2);
        assert_eq!(stats.albums_matched, 1);
    }
}
