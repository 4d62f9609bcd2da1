use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveDateTime;
use clap::Parser;
use radarsync_config::Config;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "radarsync",
    about = "Acquire new radar scans, render them, and update the catalog"
)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "RADARSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// `.env` file loaded before reading the environment.
    #[arg(long, env = "RADARSYNC_ENV_FILE")]
    pub env_file: Option<PathBuf>,

    /// Render only the staged scan taken at this minute (YYYYMMDDHHMM).
    #[arg(long, value_parser = parse_scan_time)]
    pub scan_time: Option<NaiveDateTime>,

    /// Render only static products; georeferenced ones are left alone.
    #[arg(long)]
    pub skip_georeferenced: bool,

    /// Abort the pass after this long, e.g. `10m`.
    #[arg(long, value_parser = parse_timeout)]
    pub pass_timeout: Option<Duration>,

    #[arg(long)]
    pub max_parallel_scans: Option<usize>,
}

impl Cli {
    /// Overlay flags on top of the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(timeout) = self.pass_timeout {
            config.pipeline.pass_timeout = Some(timeout);
        }
        if let Some(parallel) = self.max_parallel_scans {
            config.pipeline.max_parallel_scans = parallel.max(1);
        }
    }
}

fn parse_scan_time(raw: &str) -> Result<NaiveDateTime, String> {
    radarsync_model::stamp::parse_stamp(raw).map_err(|err| err.to_string())
}

fn parse_timeout(raw: &str) -> Result<Duration, String> {
    radarsync_config::util::parse_duration(raw).map_err(|err| err.to_string())
}
