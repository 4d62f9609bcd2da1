//! Enumerates candidate scan names.
//!
//! A locally mounted mirror is preferred. Its listing is complete once the
//! ready marker appears; the lister waits for it up to `max_wait` and then
//! lists whatever is there. Without a usable mirror the remote manifest is
//! used instead.

mod http;

pub use http::HttpRemoteSource;

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use radarsync_config::SourceConfig;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Result, SyncError};

/// Network side of the scan source.
#[async_trait]
pub trait RemoteSource: Send + Sync + Debug {
    /// Raw manifest text, scan names separated by whitespace.
    async fn manifest(&self) -> Result<String>;

    /// Download one scan. Failures are `FetchFailed`.
    async fn fetch(&self, name: &str) -> Result<Vec<u8>>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub root: PathBuf,
    pub ready_marker: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOrigin {
    /// `ready` is false when the marker never appeared within `max_wait`.
    Mirror { ready: bool },
    Remote,
}

#[derive(Debug, Clone)]
pub struct SourceListing {
    /// Sorted, unique names.
    pub names: Vec<String>,
    pub origin: ListingOrigin,
}

#[derive(Debug, Clone)]
pub struct SourceLister {
    mirror: Option<MirrorSettings>,
    remote: Option<Arc<dyn RemoteSource>>,
}

impl SourceLister {
    pub fn new(
        mirror: Option<MirrorSettings>,
        remote: Option<Arc<dyn RemoteSource>>,
    ) -> Self {
        Self { mirror, remote }
    }

    pub fn from_config(
        source: &SourceConfig,
        remote: Option<Arc<dyn RemoteSource>>,
    ) -> Self {
        let mirror = source.mirror_root.clone().map(|root| MirrorSettings {
            root,
            ready_marker: source.ready_marker.clone(),
            poll_interval: source.poll_interval,
            max_wait: source.max_wait,
        });
        Self::new(mirror, remote)
    }

    pub fn mirror_root(&self) -> Option<&Path> {
        self.mirror.as_ref().map(|mirror| mirror.root.as_path())
    }

    pub fn remote(&self) -> Option<&Arc<dyn RemoteSource>> {
        self.remote.as_ref()
    }

    /// Mirror path of `name` when the mirror is mounted and holds the file.
    pub async fn mirrored_file(&self, name: &str) -> Option<PathBuf> {
        let path = self.mirror_root()?.join(name);
        tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file())
            .then_some(path)
    }

    pub async fn list(&self) -> Result<SourceListing> {
        let mut failures = Vec::new();

        if let Some(mirror) = &self.mirror {
            match self.list_mirror(mirror).await {
                Ok(listing) => return Ok(listing),
                Err(err) => {
                    warn!(
                        root = %mirror.root.display(),
                        error = %err,
                        "mirror unavailable"
                    );
                    failures.push(format!("mirror {}: {err}", mirror.root.display()));
                }
            }
        }

        if let Some(remote) = &self.remote {
            match remote.manifest().await {
                Ok(manifest) => {
                    let names = normalize_names(
                        manifest.split_whitespace().map(str::to_string),
                    );
                    info!(
                        remote = %remote.describe(),
                        count = names.len(),
                        "listed remote manifest"
                    );
                    return Ok(SourceListing {
                        names,
                        origin: ListingOrigin::Remote,
                    });
                }
                Err(err) => {
                    failures.push(format!("remote {}: {err}", remote.describe()))
                }
            }
        }

        if failures.is_empty() {
            failures.push("no mirror or remote configured".to_string());
        }
        Err(SyncError::SourceUnavailable(failures.join("; ")))
    }

    async fn list_mirror(&self, mirror: &MirrorSettings) -> Result<SourceListing> {
        let is_dir = tokio::fs::metadata(&mirror.root)
            .await
            .map_err(|err| SyncError::io_at(&mirror.root, err))?
            .is_dir();
        if !is_dir {
            return Err(SyncError::SourceUnavailable(format!(
                "{} is not a directory",
                mirror.root.display()
            )));
        }

        let ready = wait_for_marker(mirror).await;
        if !ready {
            warn!(
                root = %mirror.root.display(),
                marker = %mirror.ready_marker,
                waited = ?mirror.max_wait,
                "ready marker did not appear; listing partial mirror"
            );
        }

        let mut entries = tokio::fs::read_dir(&mirror.root)
            .await
            .map_err(|err| SyncError::io_at(&mirror.root, err))?;
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| SyncError::io_at(&mirror.root, err))?
        {
            if !entry.file_type().await.is_ok_and(|ft| ft.is_file()) {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string)
            else {
                continue;
            };
            if name == mirror.ready_marker || name.starts_with('.') {
                continue;
            }
            names.push(name);
        }

        let names = normalize_names(names);
        debug!(
            root = %mirror.root.display(),
            count = names.len(),
            ready,
            "listed mirror"
        );
        Ok(SourceListing {
            names,
            origin: ListingOrigin::Mirror { ready },
        })
    }
}

async fn wait_for_marker(mirror: &MirrorSettings) -> bool {
    let marker = mirror.root.join(&mirror.ready_marker);
    let deadline = Instant::now() + mirror.max_wait;
    loop {
        if tokio::fs::try_exists(&marker).await.unwrap_or(false) {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(mirror.poll_interval).await;
    }
}

fn normalize_names(names: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut names: Vec<String> = names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}
