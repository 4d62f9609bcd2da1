use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{parse_csv_var, path_var, string_var};

/// Raw configuration as defined in a TOML file.
///
/// Durations are kept as strings (`"10ms"`, `"60s"`) and parsed while the
/// final [`crate::Config`] is composed.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub source: FileSourceConfig,
    #[serde(default)]
    pub paths: FilePathsConfig,
    #[serde(default)]
    pub renderer: FileRendererConfig,
    #[serde(default)]
    pub pipeline: FilePipelineConfig,
    #[serde(default)]
    pub status: FileStatusConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileSourceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_root: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ready_marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poll_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wait: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilePathsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staging_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_root: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileRendererConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FilePipelineConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel_scans: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pass_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileStatusConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_file: Option<PathBuf>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub source_tag: Option<String>,
    pub annotated_marker: Option<String>,
    pub mirror_root: Option<PathBuf>,
    pub ready_marker: Option<String>,
    pub poll_interval: Option<String>,
    pub max_wait: Option<String>,
    pub remote_base_url: Option<String>,
    pub http_timeout: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub output_root: Option<PathBuf>,
    pub renderer_program: Option<PathBuf>,
    pub renderer_args: Option<Vec<String>>,
    pub renderer_timeout: Option<String>,
    pub max_parallel_scans: Option<String>,
    pub pass_timeout: Option<String>,
    pub status_file: Option<PathBuf>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: path_var("RADARSYNC_CONFIG"),
            source_tag: string_var("RADARSYNC_SOURCE_TAG"),
            annotated_marker: string_var("RADARSYNC_ANNOTATED_MARKER"),
            mirror_root: path_var("RADARSYNC_MIRROR_ROOT"),
            ready_marker: string_var("RADARSYNC_READY_MARKER"),
            poll_interval: string_var("RADARSYNC_POLL_INTERVAL"),
            max_wait: string_var("RADARSYNC_MAX_WAIT"),
            remote_base_url: string_var("RADARSYNC_REMOTE_URL"),
            http_timeout: string_var("RADARSYNC_HTTP_TIMEOUT"),
            staging_dir: path_var("RADARSYNC_STAGING_DIR"),
            output_root: path_var("RADARSYNC_OUTPUT_ROOT"),
            renderer_program: path_var("RADARSYNC_RENDERER"),
            renderer_args: parse_csv_var("RADARSYNC_RENDERER_ARGS"),
            renderer_timeout: string_var("RADARSYNC_RENDER_TIMEOUT"),
            max_parallel_scans: string_var("RADARSYNC_MAX_PARALLEL_SCANS"),
            pass_timeout: string_var("RADARSYNC_PASS_TIMEOUT"),
            status_file: path_var("RADARSYNC_STATUS_FILE"),
        }
    }
}
