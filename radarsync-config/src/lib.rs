//! Configuration library for radarsync.
//!
//! Loads an optional TOML file, an optional `.env` file, and process
//! environment overrides into a single [`Config`] that is handed to each
//! pipeline component at construction. Environment values win over file
//! values, which win over built-in defaults.
#![allow(missing_docs)]

pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions};
pub use models::sources::{EnvConfig, FileConfig};
pub use models::{
    Config, ConfigMetadata, PathsConfig, PipelineConfig, RendererConfig,
    SourceConfig, StatusConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
