use crate::models::sample::SampleRow;
use crate::util::units::bytes_to_size;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Timelike};

/// Live usage numbers for the monitored mount point.
#[derive(Debug, Clone)]
pub struct UsageSample {
    pub total_bytes: u64,
    pub used_bytes:  u64,
    pub avail_bytes: u64,
}

impl UsageSample {
    pub fn use_pct(&self) -> f64 {
        if self.total_bytes == 0 { return 0.0; }
        (self.total_bytes - self.avail_bytes) as f64 / self.total_bytes as f64 * 100.0
    }
}

/// Query the filesystem backing `mount` via statvfs.
pub fn sample_mount(mount: &str) -> Result<UsageSample> {
    use nix::sys::statvfs::statvfs;
    let stat = statvfs(mount).with_context(|| format!("statvfs on {}", mount))?;

    let frsize = stat.fragment_size() as u64;
    let total_bytes = stat.blocks()           * frsize;
    let avail_bytes = stat.blocks_available() * frsize;
    let free_bytes  = stat.blocks_free()      * frsize;
    let used_bytes  = total_bytes.saturating_sub(free_bytes);

    Ok(UsageSample { total_bytes, used_bytes, avail_bytes })
}

/// Format a sample as the raw row appended to the current hour's file.
pub fn to_row(sample: &UsageSample, mount: &str, now: DateTime<Local>) -> SampleRow {
    SampleRow {
        minute:   format!("{:02}", now.minute()),
        total:    bytes_to_size(sample.total_bytes),
        used:     bytes_to_size(sample.used_bytes),
        avail:    bytes_to_size(sample.avail_bytes),
        used_pct: format!("{:.2}%", sample.use_pct()),
        mount:    mount.to_string(),
    }
}
