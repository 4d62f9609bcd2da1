use std::time::Duration;

use async_trait::async_trait;
use radarsync_config::SourceConfig;
use reqwest::Client;
use tracing::debug;
use url::Url;

use super::RemoteSource;
use crate::error::{Result, SyncError};

/// Upper bound on how much of a failure body ends up in an error message.
const BODY_EXCERPT_LEN: usize = 200;

/// Upstream HTTP directory: `<base>/<manifest>` lists scan names one per
/// line, `<base>/<name>` serves a scan.
#[derive(Debug, Clone)]
pub struct HttpRemoteSource {
    client: Client,
    base_url: Url,
    manifest_name: String,
}

impl HttpRemoteSource {
    /// `base_url` is treated as a directory: a missing trailing slash is
    /// added so scan names are appended rather than replacing the last
    /// segment.
    pub fn new(
        base_url: Url,
        manifest_name: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: as_directory(base_url),
            manifest_name: manifest_name.into(),
        })
    }

    /// `None` when no remote index is configured.
    pub fn from_config(source: &SourceConfig) -> Result<Option<Self>> {
        source
            .remote_base_url
            .clone()
            .map(|base| {
                Self::new(base, source.ready_marker.clone(), source.http_timeout)
            })
            .transpose()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, name: &str) -> Result<Url> {
        self.base_url.join(name).map_err(|err| {
            SyncError::Internal(format!(
                "cannot join {name:?} onto {}: {err}",
                self.base_url
            ))
        })
    }
}

fn as_directory(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

#[async_trait]
impl RemoteSource for HttpRemoteSource {
    async fn manifest(&self) -> Result<String> {
        let url = self.url_for(&self.manifest_name)?;
        let response =
            self.client.get(url.clone()).send().await.map_err(|err| {
                SyncError::SourceUnavailable(format!("GET {url}: {err}"))
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::SourceUnavailable(format!(
                "GET {url}: HTTP {status}"
            )));
        }
        let body = response.text().await.map_err(|err| {
            SyncError::SourceUnavailable(format!("GET {url}: {err}"))
        })?;
        debug!(url = %url, bytes = body.len(), "fetched remote manifest");
        Ok(body)
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.url_for(name)?;
        let failed = |reason: String| SyncError::FetchFailed {
            name: name.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| failed(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String =
                body.trim().chars().take(BODY_EXCERPT_LEN).collect();
            return Err(failed(if excerpt.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {excerpt}")
            }));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| failed(err.to_string()))?;
        debug!(url = %url, bytes = bytes.len(), "downloaded scan");
        Ok(bytes.to_vec())
    }

    fn describe(&self) -> String {
        self.base_url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base: &str) -> HttpRemoteSource {
        HttpRemoteSource::new(
            Url::parse(base).unwrap(),
            "dir.list",
            Duration::from_secs(1),
        )
        .unwrap()
    }

    #[test]
    fn base_without_trailing_slash_keeps_its_last_segment() {
        let source = source("http://localhost/data/ADRAD/TAMU");
        assert_eq!(source.base_url().as_str(), "http://localhost/data/ADRAD/TAMU/");
        assert_eq!(
            source.url_for("TAMU_20240101_0000").unwrap().as_str(),
            "http://localhost/data/ADRAD/TAMU/TAMU_20240101_0000"
        );
    }

    #[test]
    fn directory_base_is_left_alone() {
        let source = source("http://localhost/data/ADRAD/TAMU/");
        assert_eq!(
            source.url_for("dir.list").unwrap().as_str(),
            "http://localhost/data/ADRAD/TAMU/dir.list"
        );
    }
}
