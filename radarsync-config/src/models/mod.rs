pub mod sources;

use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

pub const DEFAULT_SOURCE_TAG: &str = "TAMU";
pub const DEFAULT_ANNOTATED_MARKER: &str = "_annotated";
pub const DEFAULT_READY_MARKER: &str = "dir.list";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(60);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub source: SourceConfig,
    pub paths: PathsConfig,
    pub renderer: RendererConfig,
    pub pipeline: PipelineConfig,
    pub status: StatusConfig,
    pub metadata: ConfigMetadata,
}

impl Config {
    /// Create the staging and output roots if they do not exist.
    pub fn ensure_directories(&self) -> anyhow::Result<()> {
        self.paths.ensure_directories()
    }

    pub fn staging_dir(&self) -> &Path {
        &self.paths.staging_dir
    }

    pub fn output_root(&self) -> &Path {
        &self.paths.output_root
    }
}

/// Where scans come from and how to recognize them.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Token every acquirable scan name starts with, e.g. `TAMU`.
    pub tag: String,
    /// Names containing this marker were already annotated upstream and are
    /// never acquired.
    pub annotated_marker: String,
    /// Locally mounted mirror of the upstream directory.
    pub mirror_root: Option<PathBuf>,
    /// File whose presence means the mirror listing is complete.
    pub ready_marker: String,
    pub poll_interval: Duration,
    /// Longest wait for `ready_marker` before listing whatever is there.
    pub max_wait: Duration,
    /// Directory URL of the upstream HTTP index.
    pub remote_base_url: Option<Url>,
    pub http_timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            tag: DEFAULT_SOURCE_TAG.to_string(),
            annotated_marker: DEFAULT_ANNOTATED_MARKER.to_string(),
            mirror_root: None,
            ready_marker: DEFAULT_READY_MARKER.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_MAX_WAIT,
            remote_base_url: None,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Transient scans awaiting rendering.
    pub staging_dir: PathBuf,
    /// Root of rendered images and the `metadata/` catalog.
    pub output_root: PathBuf,
}

impl PathsConfig {
    fn ensure_directories(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.staging_dir)?;
        std::fs::create_dir_all(&self.output_root)?;
        Ok(())
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("./radarData"),
            output_root: PathBuf::from("./output"),
        }
    }
}

/// External renderer process. Without a program the pass only acquires.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub program: Option<PathBuf>,
    /// Arguments placed before the staged path and scan time.
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: Vec::new(),
            timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Staged scans rendered concurrently. `1` keeps the pass sequential.
    pub max_parallel_scans: usize,
    /// Upper bound on a whole pass.
    pub pass_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_parallel_scans: 1,
            pass_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusConfig {
    /// Append-only human readable status record.
    pub status_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
