use chrono::{Datelike, NaiveDate};
use std::path::{Path, PathBuf};

/// Path construction for the four-level archive tree.
///
/// ```text
/// <root>/<YYYY>/<MM>/<DD>/<HH>.csv   raw per-minute rows
/// <root>/<YYYY>/<MM>/<DD>.csv        hourly summaries for one day
/// <root>/<YYYY>/<MM>.csv             daily summaries for one month
/// <root>/<YYYY>.csv                  monthly summaries for one year
/// ```
#[derive(Debug, Clone)]
pub struct ArchiveLayout {
    root: PathBuf,
}

impl ArchiveLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn hour_file(&self, date: NaiveDate, hour: u32) -> PathBuf {
        self.day_dir(date).join(format!("{:02}.csv", hour))
    }

    pub fn day_dir(&self, date: NaiveDate) -> PathBuf {
        self.month_dir(date.year(), date.month())
            .join(format!("{:02}", date.day()))
    }

    pub fn day_summary(&self, date: NaiveDate) -> PathBuf {
        self.month_dir(date.year(), date.month())
            .join(format!("{:02}.csv", date.day()))
    }

    pub fn month_dir(&self, year: i32, month: u32) -> PathBuf {
        self.year_dir(year).join(format!("{:02}", month))
    }

    pub fn month_summary(&self, year: i32, month: u32) -> PathBuf {
        self.year_dir(year).join(format!("{:02}.csv", month))
    }

    pub fn year_dir(&self, year: i32) -> PathBuf {
        self.root.join(format!("{:04}", year))
    }

    pub fn year_summary(&self, year: i32) -> PathBuf {
        self.root.join(format!("{:04}.csv", year))
    }
}
