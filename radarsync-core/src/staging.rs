//! Transient holding area for fetched scans.
//!
//! A staged file is named after its scan (`TAMU_20240101_0000`). Files only
//! appear under that name once fully written. A [`StagedScan`] owns one file
//! while it is being rendered and deletes it when done, whatever the outcome.

use std::path::{Path, PathBuf};

use radarsync_model::ScanKey;
use tracing::{debug, warn};

use crate::atomic;
use crate::error::{Result, SyncError};
use crate::scan_name::ScanNameParser;

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &ScanKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    pub async fn ensure_root(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|err| SyncError::io_at(&self.root, err))
    }

    pub async fn contains(&self, key: &ScanKey) -> bool {
        tokio::fs::try_exists(self.path_for(key))
            .await
            .unwrap_or(false)
    }

    /// Copy a mirrored scan into the staging area.
    pub async fn stage_copy(&self, key: &ScanKey, from: &Path) -> Result<PathBuf> {
        let target = self.path_for(key);
        let tmp = atomic::temp_path_for(&target)?;
        if let Err(err) = tokio::fs::copy(from, &tmp).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SyncError::io_at(from, err));
        }
        if let Err(err) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(SyncError::io_at(&target, err));
        }
        Ok(target)
    }

    /// Store downloaded bytes under the scan's name.
    pub async fn stage_bytes(&self, key: &ScanKey, bytes: &[u8]) -> Result<PathBuf> {
        let target = self.path_for(key);
        atomic::stage_bytes(&target, bytes).await?.commit().await?;
        Ok(target)
    }

    /// Remove temporary files left by an interrupted copy or download.
    pub async fn sweep_partials(&self) -> Result<usize> {
        let mut removed = 0;
        for name in self.file_names().await? {
            if atomic::is_temp_name(&name) {
                let path = self.root.join(&name);
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "failed to remove partial staging file")
                    }
                }
            }
        }
        if removed > 0 {
            debug!(removed, "swept partial staging files");
        }
        Ok(removed)
    }

    /// Keys of every staged scan, oldest first. Unrecognized files are
    /// ignored.
    pub async fn pending_keys(&self, parser: &ScanNameParser) -> Result<Vec<ScanKey>> {
        let mut keys: Vec<ScanKey> = self
            .file_names()
            .await?
            .iter()
            .filter(|name| !atomic::is_temp_name(name))
            .filter_map(|name| {
                parser
                    .parse(name)
                    .ok()
                    .filter(|key| key.file_name() == *name)
            })
            .collect();
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Take ownership of the staged file for `key`.
    pub fn claim(&self, key: ScanKey) -> StagedScan {
        StagedScan {
            path: self.path_for(&key),
            key,
            released: false,
        }
    }

    async fn file_names(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(SyncError::io_at(&self.root, err)),
        };
        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| SyncError::io_at(&self.root, err))?
        {
            if !entry.file_type().await.is_ok_and(|ft| ft.is_file()) {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Exclusive handle on one staged scan file.
///
/// Dropping the handle deletes the file. Use [`StagedScan::discard`] to
/// delete it and observe errors.
#[derive(Debug)]
pub struct StagedScan {
    key: ScanKey,
    path: PathBuf,
    released: bool,
}

impl StagedScan {
    pub fn key(&self) -> &ScanKey {
        &self.key
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the handle without deleting the file; the scan stays staged
    /// for the next pass.
    pub fn keep(mut self) -> PathBuf {
        self.released = true;
        std::mem::take(&mut self.path)
    }

    pub async fn discard(mut self) -> Result<()> {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SyncError::io_at(&self.path, err)),
        }
    }
}

impl Drop for StagedScan {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = std::fs::remove_file(&self.path)
            && err.kind() != std::io::ErrorKind::NotFound
        {
            warn!(
                path = %self.path.display(),
                error = %err,
                "failed to remove staged scan"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::tempdir;

    fn key(minute: u32) -> ScanKey {
        ScanKey::new(
            "TAMU",
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, minute, 0)
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn pending_claims_recognized_scans_in_order() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        staging.stage_bytes(&key(10), b"b").await.unwrap();
        staging.stage_bytes(&key(0), b"a").await.unwrap();
        std::fs::write(dir.path().join("README"), b"x").unwrap();

        let parser = ScanNameParser::new("TAMU", "_annotated");
        let pending: Vec<StagedScan> = staging
            .pending_keys(&parser)
            .await
            .unwrap()
            .into_iter()
            .map(|key| staging.claim(key))
            .collect();
        let names: Vec<String> =
            pending.iter().map(|s| s.key().file_name()).collect();
        assert_eq!(names, vec!["TAMU_20240101_0000", "TAMU_20240101_0010"]);

        drop(pending);
        assert!(!staging.contains(&key(0)).await);
        assert!(dir.path().join("README").exists());
    }

    #[tokio::test]
    async fn discard_removes_the_file() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let source = dir.path().join("mirror-copy");
        std::fs::write(&source, b"volume").unwrap();

        let path = staging.stage_copy(&key(5), &source).await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"volume");

        staging.claim(key(5)).discard().await.unwrap();
        assert!(!path.exists());
        assert!(source.exists());
    }

    #[tokio::test]
    async fn sweep_removes_only_partials() {
        let dir = tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        staging.stage_bytes(&key(0), b"a").await.unwrap();
        std::fs::write(
            dir.path().join(".TAMU_20240101_0005.tmp-0000"),
            b"half",
        )
        .unwrap();

        assert_eq!(staging.sweep_partials().await.unwrap(), 1);
        assert!(staging.contains(&key(0)).await);
    }
}
