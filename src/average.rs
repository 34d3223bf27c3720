use crate::models::sample::SummaryRow;
use crate::util::units::{bytes_to_size, size_to_bytes};
use anyhow::{Context, Result};
use log::{error, warn};
use std::fs;
use std::path::Path;

/// What a tracked column holds, declared by the caller instead of sniffed
/// from the first value's formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Size,
    Percent,
}

/// The four tracked columns of every archive row, in source order:
/// total, used, avail, used-percent.
const COLUMN_KINDS: [ColumnKind; 4] =
    [ColumnKind::Size, ColumnKind::Size, ColumnKind::Size, ColumnKind::Percent];

/// Average one column of raw values into its printed summary form.
pub fn average_column(values: &[String], kind: ColumnKind) -> String {
    match kind {
        ColumnKind::Percent => average_percent(values),
        ColumnKind::Size => average_size(values),
    }
}

fn average_percent(values: &[String]) -> String {
    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        match value.trim_end_matches('%').parse::<f64>() {
            Ok(v) => parsed.push(v),
            Err(_) => warn!("invalid percentage value: {:?}, skipped", value),
        }
    }
    if parsed.is_empty() {
        return "0%".to_string();
    }
    format!("{:.2}%", parsed.iter().sum::<f64>() / parsed.len() as f64)
}

fn average_size(values: &[String]) -> String {
    // Values like "500.00" are collapsed to "500" before unit parsing. The
    // original archive format produced such rows; keep accepting them.
    let total: u64 = values
        .iter()
        .map(|v| v.strip_suffix(".00").unwrap_or(v))
        .map(size_to_bytes)
        .sum();
    let avg = (total as f64 / values.len() as f64).round() as u64;
    bytes_to_size(avg)
}

/// Compute one summary row from the CSV file for a finer-grained period.
///
/// `key` becomes the row's period key (the source file's stem: hour, day, or
/// month). Columns 1..=4 of every source row are averaged independently; the
/// mount label is taken verbatim from the last row. A file with no usable
/// rows produces no summary row; the caller skips that period.
pub fn summarize_file(path: &Path, key: &str) -> Result<Option<SummaryRow>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading source {}", path.display()))?;

    let rows: Vec<Vec<&str>> = text
        .lines()
        .filter(|l| !l.is_empty())
        .map(|l| l.split(',').collect())
        .collect();

    if rows.is_empty() {
        error!("no data rows in {}", path.display());
        return Ok(None);
    }

    let mut columns = Vec::with_capacity(COLUMN_KINDS.len());
    for (i, kind) in COLUMN_KINDS.iter().enumerate() {
        let column: Vec<String> = rows
            .iter()
            .filter_map(|row| row.get(i + 1))
            .map(|v| v.to_string())
            .collect();
        if column.is_empty() {
            error!("column {} missing from every row of {}", i + 1, path.display());
            return Ok(None);
        }
        columns.push(average_column(&column, *kind));
    }

    let mount = rows
        .last()
        .and_then(|row| row.last())
        .map(|m| m.to_string())
        .unwrap_or_default();

    Ok(Some(SummaryRow { key: key.to_string(), columns, mount }))
}
