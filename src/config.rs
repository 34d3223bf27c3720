use anyhow::Result;
use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,

    #[serde(default)]
    pub collector: CollectorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Root directory of the CSV archive tree.
    pub root: PathBuf,
    /// Mount point whose usage is sampled.
    pub mount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Sampling interval in minutes; ticks align to multiples of this.
    pub interval_minutes: u32,
    /// Earliest date the catch-up sweep looks at ("YYYY-MM-DD").
    pub epoch: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            archive:   ArchiveConfig::default(),
            collector: CollectorConfig::default(),
        }
    }
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            root: dirs::data_local_dir()
                .map(|p| p.join("darc").join("data"))
                .unwrap_or_else(|| PathBuf::from("data")),
            mount: "/".to_string(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { interval_minutes: 5, epoch: "2024-01-01".to_string() }
    }
}

impl CollectorConfig {
    /// The configured epoch as a date, falling back to the default when the
    /// string does not parse.
    pub fn epoch_date(&self) -> NaiveDate {
        NaiveDate::parse_from_str(&self.epoch, "%Y-%m-%d").unwrap_or_else(|_| {
            warn!("invalid epoch {:?} in config, using 2024-01-01", self.epoch);
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        })
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match try_load() {
            Ok(c)  => c,
            Err(_) => {
                // Write defaults on first run (best-effort)
                let _ = try_write_defaults();
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("darc").join("darc.toml"))
    }
}

fn try_load() -> Result<Config> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults() -> Result<()> {
    let path = Config::config_path().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# darc configuration\n# Generated on first run — edit freely\n\n{}", text))?;
    Ok(())
}
