use std::path::{Path, PathBuf};

use radarsync_model::ModelError;
use thiserror::Error;

use crate::scan_name::Rejection;

#[derive(Error, Debug)]
pub enum SyncError {
    /// Neither the mirror nor the network index could be listed.
    #[error("scan source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("scan name {name:?} rejected: {reason}")]
    ScanNameRejected { name: String, reason: Rejection },

    /// A single scan could not be downloaded. Retried on the next pass.
    #[error("fetch of {name} failed: {reason}")]
    FetchFailed { name: String, reason: String },

    /// The renderer could not process a staged scan. Never retried.
    #[error("render of {scan} failed: {reason}")]
    RenderFailed { scan: String, reason: String },

    /// An existing catalog document does not parse. Needs an operator; the
    /// document is left untouched.
    #[error("catalog document {path:?} is corrupt: {source}")]
    CatalogCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO error at {path:?}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    pub fn io_at(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SyncError::IoAt {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Errors that abort the whole pass instead of a single scan.
    pub fn is_pass_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::SourceUnavailable(_) | SyncError::CatalogCorrupt { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
