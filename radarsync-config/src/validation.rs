use thiserror::Error;

use super::models::Config;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error(
        "no scan source configured; set source.mirror_root or source.remote_base_url"
    )]
    NoScanSource,
    #[error("source tag must not be empty")]
    EmptySourceTag,
    #[error("remote base url must use http or https, got {scheme}")]
    UnsupportedScheme { scheme: String },
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let source = &config.source;

    if source.tag.trim().is_empty() {
        return Err(ConfigGuardRailError::EmptySourceTag);
    }

    if source.mirror_root.is_none() && source.remote_base_url.is_none() {
        return Err(ConfigGuardRailError::NoScanSource);
    }

    if let Some(url) = &source.remote_base_url
        && !matches!(url.scheme(), "http" | "https")
    {
        return Err(ConfigGuardRailError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }

    if source.poll_interval.is_zero() {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "source.poll_interval",
        });
    }
    if source.http_timeout.is_zero() {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "source.http_timeout",
        });
    }
    if config.pipeline.max_parallel_scans == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "pipeline.max_parallel_scans",
        });
    }

    if let Some(mirror) = &source.mirror_root
        && !mirror.exists()
    {
        let fallback = if source.remote_base_url.is_some() {
            "the remote index will be used instead"
        } else {
            "passes will fail with SourceUnavailable until it is mounted"
        };
        warnings.push(format!(
            "mirror root {} does not exist; {fallback}",
            mirror.display()
        ));
    }

    if source.annotated_marker.trim().is_empty() {
        warnings.push_with_hint(
            "annotated marker is empty; source-annotated files will not be filtered",
            "Set source.annotated_marker to the suffix upstream appends to annotated files",
        );
    }

    if config.renderer.program.is_none() {
        warnings.push_with_hint(
            "No renderer configured; scans will be staged but not rendered",
            "Set renderer.program or RADARSYNC_RENDERER",
        );
    }

    Ok(warnings)
}
