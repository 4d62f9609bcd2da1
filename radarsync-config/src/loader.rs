use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use crate::models::{
    Config, ConfigMetadata, PathsConfig, PipelineConfig, RendererConfig,
    SourceConfig, StatusConfig,
    sources::{EnvConfig, FileConfig},
};
use crate::util::parse_duration;
use crate::validation::{self, ConfigGuardRailError, ConfigWarnings};

const DEFAULT_CONFIG_LOCATIONS: &[&str] =
    &["radarsync.toml", "config/radarsync.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment. Also
    /// skips `.env` loading.
    pub env_override: Option<EnvConfig>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env_override = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (env_config, env_file_loaded) = match &self.options.env_override
        {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file_config, config_path) =
            self.load_file_config(&env_config)?;

        let (config, warnings) = compose_config(
            file_config,
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };
        Ok(loaded)
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = match (
            &self.options.config_path,
            &env_config.config_path,
        ) {
            (Some(path), _) => (Some(path.clone()), true),
            (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .map(PathBuf::from)
                    .find(|candidate| candidate.exists()),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok((None, None));
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let contents =
            fs::read_to_string(&path).map_err(|err| ConfigLoadError::Io {
                path: path.clone(),
                source: err,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
                path: path.clone(),
                source: err,
            })?;

        Ok((Some(file_config), Some(path)))
    }
}

fn compose_config(
    file_config: Option<FileConfig>,
    env: EnvConfig,
    metadata: ConfigMetadata,
) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
    let mut warnings = ConfigWarnings::default();

    if metadata.config_path.is_none() {
        warnings.push_with_hint(
            "No radarsync.toml detected; falling back to environment variables",
            "Pass --config or set RADARSYNC_CONFIG",
        );
    }

    let FileConfig {
        source: file_source,
        paths: file_paths,
        renderer: file_renderer,
        pipeline: file_pipeline,
        status: file_status,
    } = file_config.unwrap_or_default();

    let defaults = SourceConfig::default();
    let remote_base_url = env
        .remote_base_url
        .or(file_source.remote_base_url)
        .map(|raw| parse_base_url(&raw))
        .transpose()?;

    let source = SourceConfig {
        tag: env
            .source_tag
            .or(file_source.tag)
            .unwrap_or(defaults.tag),
        annotated_marker: env
            .annotated_marker
            .or(file_source.annotated_marker)
            .unwrap_or(defaults.annotated_marker),
        mirror_root: env.mirror_root.or(file_source.mirror_root),
        ready_marker: env
            .ready_marker
            .or(file_source.ready_marker)
            .unwrap_or(defaults.ready_marker),
        poll_interval: duration_value(
            "source.poll_interval",
            env.poll_interval.or(file_source.poll_interval),
        )?
        .unwrap_or(defaults.poll_interval),
        max_wait: duration_value(
            "source.max_wait",
            env.max_wait.or(file_source.max_wait),
        )?
        .unwrap_or(defaults.max_wait),
        remote_base_url,
        http_timeout: duration_value(
            "source.http_timeout",
            env.http_timeout.or(file_source.http_timeout),
        )?
        .unwrap_or(defaults.http_timeout),
    };

    let default_paths = PathsConfig::default();
    let paths = PathsConfig {
        staging_dir: env
            .staging_dir
            .or(file_paths.staging_dir)
            .unwrap_or(default_paths.staging_dir),
        output_root: env
            .output_root
            .or(file_paths.output_root)
            .unwrap_or(default_paths.output_root),
    };

    let renderer = RendererConfig {
        program: env.renderer_program.or(file_renderer.program),
        args: env
            .renderer_args
            .or(file_renderer.args)
            .unwrap_or_default(),
        timeout: duration_value(
            "renderer.timeout",
            env.renderer_timeout.or(file_renderer.timeout),
        )?
        .unwrap_or(RendererConfig::default().timeout),
    };

    let max_parallel_scans = match env.max_parallel_scans {
        Some(raw) => raw.trim().parse::<usize>().map_err(|err| {
            ConfigLoadError::InvalidValue {
                key: "pipeline.max_parallel_scans",
                reason: err.to_string(),
            }
        })?,
        None => file_pipeline
            .max_parallel_scans
            .unwrap_or(PipelineConfig::default().max_parallel_scans),
    };
    let pipeline = PipelineConfig {
        max_parallel_scans,
        pass_timeout: duration_value(
            "pipeline.pass_timeout",
            env.pass_timeout.or(file_pipeline.pass_timeout),
        )?,
    };

    let status = StatusConfig {
        status_file: env.status_file.or(file_status.status_file),
    };

    let config = Config {
        source,
        paths,
        renderer,
        pipeline,
        status,
        metadata,
    };

    let guard_warnings = validation::apply_guard_rails(&config)?;
    warnings.extend(guard_warnings);

    Ok((config, warnings))
}

fn duration_value(
    key: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        parse_duration(&value).map_err(|err| ConfigLoadError::InvalidValue {
            key,
            reason: format!("{value:?}: {err}"),
        })
    })
    .transpose()
}

/// Parse a directory URL, forcing a trailing slash so `join` appends file
/// names instead of replacing the last segment.
fn parse_base_url(raw: &str) -> Result<Url, ConfigLoadError> {
    let trimmed = raw.trim();
    let normalized = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    Url::parse(&normalized).map_err(|err| ConfigLoadError::InvalidValue {
        key: "source.remote_base_url",
        reason: format!("{raw:?}: {err}"),
    })
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file {path:?} does not exist")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoad {
    pub fn config_path(&self) -> Option<&Path> {
        self.config.metadata.config_path.as_deref()
    }
}
