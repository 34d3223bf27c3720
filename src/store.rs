use anyhow::{Context, Result};
use log::info;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// How a store's keys are ordered on disk.
///
/// Day-of-month and month-of-year keys sort by integer value so "2" lands
/// before "10"; hour keys are zero-padded strings and sort lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrder {
    Numeric,
    Lexicographic,
}

/// One keyed summary table (a day, month, or year file).
///
/// Keys already present are immutable on the normal merge path: repeated
/// rollups of the same period never alter a committed value. Writes happen
/// only when a merge actually added something, and go through a temp file
/// plus rename so a reader never sees a half-written summary.
#[derive(Debug)]
pub struct PeriodStore {
    path: PathBuf,
    order: KeyOrder,
    entries: HashMap<String, Vec<String>>,
    dirty: bool,
}

impl PeriodStore {
    /// Load the summary file at `path`. A missing or empty file yields an
    /// empty store.
    pub fn load(path: impl Into<PathBuf>, order: KeyOrder) -> Result<Self> {
        let path = path.into();
        let mut entries = HashMap::new();

        if path.exists() {
            let text = fs::read_to_string(&path)
                .with_context(|| format!("reading summary {}", path.display()))?;
            for line in text.lines() {
                if line.is_empty() {
                    continue;
                }
                let mut fields = line.split(',').map(str::to_string);
                if let Some(key) = fields.next() {
                    entries.insert(key, fields.collect());
                }
            }
        }

        Ok(Self { path, order, entries, dirty: false })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Vec<String>> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Insert `fields` under `key` only if the key is absent. Returns true if
    /// the row was added.
    pub fn merge(&mut self, key: &str, fields: Vec<String>) -> bool {
        if self.entries.contains_key(key) {
            return false;
        }
        self.entries.insert(key.to_string(), fields);
        self.dirty = true;
        true
    }

    /// Insert unconditionally, replacing any existing row. Only the forced
    /// rebuild path uses this.
    pub fn force_insert(&mut self, key: &str, fields: Vec<String>) {
        self.entries.insert(key.to_string(), fields);
        self.dirty = true;
    }

    /// Write the store back to disk, sorted by key. Skipped entirely when no
    /// merge added anything, so file mtimes stay meaningful. Returns true if
    /// a write happened.
    pub fn persist(&mut self) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }

        let mut rows: Vec<(&String, &Vec<String>)> = self.entries.iter().collect();
        match self.order {
            KeyOrder::Numeric => rows.sort_by_key(|(k, _)| k.parse::<u64>().unwrap_or(u64::MAX)),
            KeyOrder::Lexicographic => rows.sort_by(|a, b| a.0.cmp(b.0)),
        }

        let mut text = String::new();
        for (key, fields) in rows {
            text.push_str(key);
            for f in fields {
                text.push(',');
                text.push_str(f);
            }
            text.push('\n');
        }

        write_atomic(&self.path, &text)?;
        info!("wrote summary {} ({} rows)", self.path.display(), self.entries.len());
        self.dirty = false;
        Ok(true)
    }
}

/// Rewrite `path` with its contents replaced by `text`, via a temp file in
/// the same directory and a rename.
fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = path.parent().context("summary path has no parent")?;
    fs::create_dir_all(dir)?;

    let tmp = dir.join(format!(
        ".{}.tmp",
        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    ));
    {
        let mut file = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Re-sort an existing summary file by its first column parsed as a float.
/// Ad hoc repair utility; not part of the merge path.
pub fn sort_file_numeric(path: &Path) -> Result<()> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;

    let mut rows: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    rows.sort_by(|a, b| {
        let fa = a.split(',').next().and_then(|f| f.parse::<f64>().ok()).unwrap_or(f64::MAX);
        let fb = b.split(',').next().and_then(|f| f.parse::<f64>().ok()).unwrap_or(f64::MAX);
        fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut out = String::new();
    for row in rows {
        out.push_str(row);
        out.push('\n');
    }
    write_atomic(path, &out)
}
