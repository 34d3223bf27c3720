mod archive;
mod average;
mod collectors;
mod config;
mod models;
mod rollup;
mod store;
mod util;

use anyhow::Result;
use archive::ArchiveLayout;
use chrono::{DateTime, Datelike, Duration, Local, Timelike};
use clap::Parser;
use config::Config;
use log::{error, info};
use models::sample::SampleRow;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Environment flag checked once per cycle; "true" or "1" forces a full
/// rebuild of the current year's monthly and yearly summaries.
const FORCE_REBUILD_ENV: &str = "DARC_FORCE_REBUILD";

#[derive(Parser, Debug)]
#[command(name = "darc", about = "disk usage time-series archiver", version = "0.1")]
struct Cli {
    /// Sampling interval in minutes (overrides config)
    #[arg(short, long)]
    interval: Option<u32>,

    /// Archive root directory (overrides config)
    #[arg(long)]
    archive: Option<PathBuf>,

    /// Mount point to monitor (overrides config)
    #[arg(short, long)]
    mount: Option<String>,

    /// Run the catch-up sweep and exit
    #[arg(long)]
    catchup: bool,

    /// Force-rebuild the current year's monthly and yearly summaries and exit
    #[arg(long)]
    rebuild: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// Re-sort a summary file by its first column (ad hoc repair) and exit
    #[arg(long, value_name = "FILE")]
    sort_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut cfg = Config::load();
    if let Some(interval) = cli.interval {
        cfg.collector.interval_minutes = interval;
    }
    if let Some(archive) = cli.archive {
        cfg.archive.root = archive;
    }
    if let Some(mount) = cli.mount {
        cfg.archive.mount = mount;
    }

    if let Some(path) = &cli.sort_file {
        return run_sort_file(path);
    }
    if cli.config {
        return run_print_config(&cfg);
    }
    if cli.catchup {
        return run_catchup(&cfg);
    }
    if cli.rebuild {
        return run_rebuild(&cfg);
    }
    run_daemon(&cfg)
}

fn run_sort_file(path: &Path) -> Result<()> {
    store::sort_file_numeric(path)?;
    println!("sorted {}", path.display());
    Ok(())
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[archive]");
    println!("  root  = {}", cfg.archive.root.display());
    println!("  mount = {}", cfg.archive.mount);
    println!();
    println!("[collector]");
    println!("  interval_minutes = {}", cfg.collector.interval_minutes);
    println!("  epoch            = {}", cfg.collector.epoch);
    Ok(())
}

fn run_catchup(cfg: &Config) -> Result<()> {
    let layout = ArchiveLayout::new(&cfg.archive.root);
    let written = rollup::catch_up(&layout, cfg.collector.epoch_date(), Local::now().date_naive())?;
    println!("catch-up complete: {} summaries written", written);
    Ok(())
}

fn run_rebuild(cfg: &Config) -> Result<()> {
    let layout = ArchiveLayout::new(&cfg.archive.root);
    let written = rollup::rebuild_year(&layout, Local::now().year())?;
    println!("rebuild complete: {} summaries written", written);
    Ok(())
}

fn run_daemon(cfg: &Config) -> Result<()> {
    let layout = ArchiveLayout::new(&cfg.archive.root);
    let interval = i64::from(cfg.collector.interval_minutes.max(1));
    info!(
        "darc starting (mount {}, archive {}, every {} min)",
        cfg.archive.mount,
        cfg.archive.root.display(),
        interval
    );

    fs::create_dir_all(layout.root())?;
    if let Err(e) = rollup::catch_up(&layout, cfg.collector.epoch_date(), Local::now().date_naive()) {
        error!("catch-up sweep failed: {:#}", e);
    }

    loop {
        let now = Local::now();
        let force = force_rebuild_requested();
        if let Err(e) = run_cycle(&layout, cfg, now, force) {
            error!("cycle at {} failed: {:#}", now.format("%Y-%m-%d %H:%M"), e);
        }

        let next = next_tick(Local::now(), interval);
        let wait = (next - Local::now()).to_std().unwrap_or_default();
        info!("next cycle at {}", next.format("%H:%M"));
        std::thread::sleep(wait);
    }
}

/// One steady-state cycle: sample and append, then bring the summaries the
/// current moment depends on up to date. The raw row is flushed before any
/// rollup looks at its hour.
fn run_cycle(
    layout: &ArchiveLayout,
    cfg: &Config,
    now: DateTime<Local>,
    force_rebuild: bool,
) -> Result<()> {
    let today = now.date_naive();

    let sample = collectors::usage::sample_mount(&cfg.archive.mount)?;
    let row = collectors::usage::to_row(&sample, &cfg.archive.mount, now);
    append_row(&layout.hour_file(today, now.hour()), &row)?;
    info!("sampled {}: {}", cfg.archive.mount, row.to_line());

    if force_rebuild {
        info!("{} set, rebuilding {} summaries", FORCE_REBUILD_ENV, today.year());
        rollup::rebuild_year(layout, today.year())?;
    }

    rollup::ensure_day_except(layout, today, now.hour())?;

    if now.hour() == 0 {
        if let Some(yesterday) = today.pred_opt() {
            // The last hour of yesterday only completed at midnight
            rollup::ensure_day(layout, yesterday)?;
            rollup::ensure_month(layout, yesterday.year(), yesterday.month())?;
            if today.day() == 1 {
                rollup::ensure_year(layout, yesterday.year())?;
            }
        }
    }

    Ok(())
}

fn append_row(path: &Path, row: &SampleRow) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{}", row.to_line())?;
    Ok(())
}

fn force_rebuild_requested() -> bool {
    std::env::var(FORCE_REBUILD_ENV)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(false)
}

/// The next interval-aligned wall-clock minute strictly after `now`.
fn next_tick(now: DateTime<Local>, interval_minutes: i64) -> DateTime<Local> {
    let past = i64::from(now.minute()) % interval_minutes;
    let next = now + Duration::minutes(interval_minutes - past);
    next.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(next)
}
