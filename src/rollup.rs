use crate::archive::ArchiveLayout;
use crate::average::summarize_file;
use crate::store::{KeyOrder, PeriodStore};
use anyhow::Result;
use chrono::{Datelike, Days, NaiveDate};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};

/// Whether a rollup fills in missing keys only (the normal, idempotent path)
/// or regenerates every key from source (forced rebuild).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    FillMissing,
    Overwrite,
}

/// Bring the daily summary for `date` up to date with the hour files on
/// disk. Returns true if the summary file was (re)written.
pub fn ensure_day(layout: &ArchiveLayout, date: NaiveDate) -> Result<bool> {
    roll_up(
        &layout.day_dir(date),
        &layout.day_summary(date),
        KeyOrder::Lexicographic,
        MergeMode::FillMissing,
        None,
    )
}

/// Like [`ensure_day`], but ignores the file for `in_progress_hour`. Used for
/// the current day: the running hour's file is still being appended to, and a
/// key committed from partial rows could never be corrected later.
pub fn ensure_day_except(
    layout: &ArchiveLayout,
    date: NaiveDate,
    in_progress_hour: u32,
) -> Result<bool> {
    let skip = format!("{:02}", in_progress_hour);
    roll_up(
        &layout.day_dir(date),
        &layout.day_summary(date),
        KeyOrder::Lexicographic,
        MergeMode::FillMissing,
        Some(&skip),
    )
}

/// Bring the monthly summary up to date with the daily summaries on disk.
pub fn ensure_month(layout: &ArchiveLayout, year: i32, month: u32) -> Result<bool> {
    roll_up(
        &layout.month_dir(year, month),
        &layout.month_summary(year, month),
        KeyOrder::Numeric,
        MergeMode::FillMissing,
        None,
    )
}

/// Bring the yearly summary up to date with the monthly summaries on disk.
pub fn ensure_year(layout: &ArchiveLayout, year: i32) -> Result<bool> {
    roll_up(
        &layout.year_dir(year),
        &layout.year_summary(year),
        KeyOrder::Numeric,
        MergeMode::FillMissing,
        None,
    )
}

/// Forced rebuild: regenerate all twelve monthly summaries and the yearly
/// summary for `year` from their sources, replacing keys that already exist.
pub fn rebuild_year(layout: &ArchiveLayout, year: i32) -> Result<usize> {
    info!("forced rebuild of {} summaries", year);
    let mut written = 0;

    for month in 1..=12 {
        match roll_up(
            &layout.month_dir(year, month),
            &layout.month_summary(year, month),
            KeyOrder::Numeric,
            MergeMode::Overwrite,
            None,
        ) {
            Ok(true) => written += 1,
            Ok(false) => {}
            Err(e) => warn!("rebuild of {}-{:02} failed: {:#}", year, month, e),
        }
    }

    match roll_up(
        &layout.year_dir(year),
        &layout.year_summary(year),
        KeyOrder::Numeric,
        MergeMode::Overwrite,
        None,
    ) {
        Ok(true) => written += 1,
        Ok(false) => {}
        Err(e) => warn!("rebuild of {} failed: {:#}", year, e),
    }

    Ok(written)
}

/// Startup catch-up sweep: walk every date from `epoch` through today and
/// fill in whatever summaries the raw data on disk supports, finest
/// granularity first. Only ever adds missing keys, so re-running it on a
/// settled archive writes nothing. Returns the number of files written.
pub fn catch_up(layout: &ArchiveLayout, epoch: NaiveDate, today: NaiveDate) -> Result<usize> {
    info!("catch-up sweep from {} to {}", epoch, today);
    let mut written = 0;

    let mut date = epoch;
    while date <= today {
        if dir_has_csv(&layout.day_dir(date)) {
            match ensure_day(layout, date) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!("daily summary for {} failed: {:#}", date, e),
            }
        }
        date = match date.checked_add_days(Days::new(1)) {
            Some(d) => d,
            None => break,
        };
    }

    for year in epoch.year()..=today.year() {
        let year_dir = layout.year_dir(year);
        if !year_dir.is_dir() {
            continue;
        }
        for month in month_dirs(&year_dir) {
            if dir_has_csv(&layout.month_dir(year, month)) {
                match ensure_month(layout, year, month) {
                    Ok(true) => written += 1,
                    Ok(false) => {}
                    Err(e) => warn!("monthly summary for {}-{:02} failed: {:#}", year, month, e),
                }
            }
        }
        if dir_has_csv(&year_dir) {
            match ensure_year(layout, year) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => warn!("yearly summary for {} failed: {:#}", year, e),
            }
        }
    }

    info!("catch-up sweep done ({} summaries written)", written);
    Ok(written)
}

/// The shared merge step: summarize each source file in `source_dir` whose
/// key the summary is missing (or every file, under `Overwrite`) and write
/// the summary back if anything changed.
fn roll_up(
    source_dir: &Path,
    summary_path: &Path,
    order: KeyOrder,
    mode: MergeMode,
    skip_key: Option<&str>,
) -> Result<bool> {
    if !source_dir.is_dir() {
        warn!("no source data at {}, skipping", source_dir.display());
        return Ok(false);
    }

    let mut store = PeriodStore::load(summary_path, order)?;

    for (key, path) in source_files(source_dir, order) {
        if skip_key == Some(key.as_str()) {
            continue;
        }
        if mode == MergeMode::FillMissing && store.contains(&key) {
            continue;
        }
        match summarize_file(&path, &key) {
            Ok(Some(row)) => {
                let fields = row.fields();
                match mode {
                    MergeMode::FillMissing => {
                        store.merge(&key, fields);
                    }
                    MergeMode::Overwrite => store.force_insert(&key, fields),
                }
            }
            Ok(None) => {} // empty source, already logged
            Err(e) => warn!("summarizing {} failed: {:#}", path.display(), e),
        }
    }

    store.persist()
}

/// CSV files directly inside `dir`, as (stem, path), in the store's key
/// order. Numeric stores only accept integer stems so stray files never
/// become keys.
fn source_files(dir: &Path, order: KeyOrder) -> Vec<(String, PathBuf)> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    let mut files: Vec<(String, PathBuf)> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == "csv"))
        .filter_map(|p| p.file_stem().map(|s| (s.to_string_lossy().into_owned(), p.clone())))
        .collect();

    match order {
        KeyOrder::Numeric => {
            files.retain(|(stem, _)| stem.parse::<u32>().is_ok());
            files.sort_by_key(|(stem, _)| stem.parse::<u32>().unwrap_or(u32::MAX));
        }
        KeyOrder::Lexicographic => files.sort_by(|a, b| a.0.cmp(&b.0)),
    }
    files
}

fn month_dirs(year_dir: &Path) -> Vec<u32> {
    let entries = match fs::read_dir(year_dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };
    let mut months: Vec<u32> = entries
        .flatten()
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().to_string_lossy().parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
        .collect();
    months.sort_unstable();
    months
}

fn dir_has_csv(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries.flatten().any(|e| {
                let p = e.path();
                p.is_file() && p.extension().is_some_and(|x| x == "csv")
            })
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn raw_line(minute: u32, used_g: u32) -> String {
        format!(
            "{:02},100.00G,{}.00G,{}.00G,{}.00%,/srv/ftp\n",
            minute,
            used_g,
            100 - used_g,
            used_g
        )
    }

    /// Write an hour file with two raw rows averaging to `used_g` used.
    fn write_hour(layout: &ArchiveLayout, date: NaiveDate, hour: u32, used_g: u32) {
        let path = layout.hour_file(date, hour);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut text = raw_line(0, used_g - 1);
        text.push_str(&raw_line(5, used_g + 1));
        fs::write(path, text).unwrap();
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_summary_keys_every_hour_present() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        let d = date(2024, 3, 7);
        write_hour(&layout, d, 0, 40);
        write_hour(&layout, d, 13, 50);

        assert!(ensure_day(&layout, d).unwrap());

        let text = fs::read_to_string(layout.day_summary(d)).unwrap();
        assert_eq!(
            text,
            "00,100.00G,40.00G,60.00G,40.00%,/srv/ftp\n\
             13,100.00G,50.00G,50.00G,50.00%,/srv/ftp\n"
        );
    }

    #[test]
    fn monthly_rollup_contains_exactly_the_days_with_data() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        for day in 1..=3 {
            let d = date(2024, 5, day);
            write_hour(&layout, d, 12, 40);
            ensure_day(&layout, d).unwrap();
        }

        assert!(ensure_month(&layout, 2024, 5).unwrap());

        let store = PeriodStore::load(layout.month_summary(2024, 5), KeyOrder::Numeric).unwrap();
        let mut keys: Vec<&String> = store.keys().collect();
        keys.sort();
        assert_eq!(keys, ["01", "02", "03"]);
        assert!(!store.contains("04"));
    }

    #[test]
    fn existing_key_survives_new_raw_data() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        let d = date(2024, 5, 1);
        write_hour(&layout, d, 12, 40);
        ensure_day(&layout, d).unwrap();
        ensure_month(&layout, 2024, 5).unwrap();

        let before = fs::read_to_string(layout.month_summary(2024, 5)).unwrap();

        // Different raw data for the same day must not change key "01"
        write_hour(&layout, d, 13, 90);
        fs::remove_file(layout.day_summary(d)).unwrap();
        ensure_day(&layout, d).unwrap();
        ensure_month(&layout, 2024, 5).unwrap();

        let after = fs::read_to_string(layout.month_summary(2024, 5)).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn missing_source_dir_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        assert!(!ensure_day(&layout, date(2024, 1, 1)).unwrap());
        assert!(!layout.day_summary(date(2024, 1, 1)).exists());
    }

    #[test]
    fn catch_up_builds_all_levels() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        write_hour(&layout, date(2024, 2, 10), 4, 40);
        write_hour(&layout, date(2024, 3, 1), 8, 50);

        let written = catch_up(&layout, date(2024, 1, 1), date(2024, 3, 15)).unwrap();
        // Two daily, two monthly, one yearly
        assert_eq!(written, 5);
        assert!(layout.day_summary(date(2024, 2, 10)).exists());
        assert!(layout.month_summary(2024, 2).exists());
        assert!(layout.month_summary(2024, 3).exists());
        assert!(layout.year_summary(2024).exists());

        let year = fs::read_to_string(layout.year_summary(2024)).unwrap();
        let keys: Vec<&str> = year.lines().map(|l| l.split(',').next().unwrap()).collect();
        assert_eq!(keys, ["02", "03"]);
    }

    #[test]
    fn second_catch_up_on_settled_archive_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        write_hour(&layout, date(2024, 2, 10), 4, 40);

        let first = catch_up(&layout, date(2024, 1, 1), date(2024, 3, 15)).unwrap();
        assert!(first > 0);
        let second = catch_up(&layout, date(2024, 1, 1), date(2024, 3, 15)).unwrap();
        assert_eq!(second, 0);
    }

    #[test]
    fn forced_rebuild_replaces_existing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        let d = date(2024, 5, 1);
        write_hour(&layout, d, 12, 40);
        ensure_day(&layout, d).unwrap();
        ensure_month(&layout, 2024, 5).unwrap();

        // Regenerate the daily summary from changed raw data, then rebuild
        fs::remove_file(layout.day_summary(d)).unwrap();
        fs::remove_file(layout.hour_file(d, 12)).unwrap();
        write_hour(&layout, d, 12, 80);
        ensure_day(&layout, d).unwrap();
        rebuild_year(&layout, 2024).unwrap();

        let store = PeriodStore::load(layout.month_summary(2024, 5), KeyOrder::Numeric).unwrap();
        assert_eq!(store.get("01").unwrap()[1], "80.00G");
    }

    #[test]
    fn in_progress_hour_is_left_out() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        let d = date(2024, 6, 15);
        write_hour(&layout, d, 9, 40);
        write_hour(&layout, d, 10, 50);

        ensure_day_except(&layout, d, 10).unwrap();

        let store = PeriodStore::load(layout.day_summary(d), KeyOrder::Lexicographic).unwrap();
        assert!(store.contains("09"));
        assert!(!store.contains("10"));

        // Next cycle, hour 10 is complete and gets picked up
        ensure_day_except(&layout, d, 11).unwrap();
        let store = PeriodStore::load(layout.day_summary(d), KeyOrder::Lexicographic).unwrap();
        assert!(store.contains("10"));
    }

    #[test]
    fn year_summary_ignores_stray_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = ArchiveLayout::new(dir.path());
        let d = date(2024, 5, 1);
        write_hour(&layout, d, 12, 40);
        ensure_day(&layout, d).unwrap();
        ensure_month(&layout, 2024, 5).unwrap();
        fs::write(layout.year_dir(2024).join("notes.csv"), "junk\n").unwrap();

        ensure_year(&layout, 2024).unwrap();
        let store = PeriodStore::load(layout.year_summary(2024), KeyOrder::Numeric).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains("05"));
    }
}
