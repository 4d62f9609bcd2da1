//! Write-then-rename file replacement.
//!
//! Content goes to a hidden sibling (`.<name>.tmp-<uuid>`) on the same
//! filesystem, is synced, and only then renamed over the target. Readers
//! see either the previous file or the complete new one.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::{Result, SyncError};

/// Prefix of every in-flight temporary file.
pub const TEMP_PREFIX: &str = ".";
const TEMP_MARKER: &str = ".tmp-";

/// Content fully written next to its target but not yet visible there.
#[derive(Debug)]
#[must_use = "a staged write is invisible until committed"]
pub struct StagedWrite {
    tmp: PathBuf,
    target: PathBuf,
    mode: Option<u32>,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.tmp
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Apply these unix permission bits after the rename.
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub async fn commit(self) -> Result<()> {
        if let Err(err) = tokio::fs::rename(&self.tmp, &self.target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&self.tmp).await {
                warn!(
                    path = %self.tmp.display(),
                    error = %cleanup,
                    "failed to remove temporary file after rename error"
                );
            }
            return Err(SyncError::io_at(&self.target, err));
        }
        if let Some(mode) = self.mode {
            set_mode(&self.target, mode).await?;
        }
        Ok(())
    }

    /// Drop the temporary file without touching the target.
    pub async fn abort(self) -> Result<()> {
        match tokio::fs::remove_file(&self.tmp).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SyncError::io_at(&self.tmp, err)),
        }
    }
}

pub fn temp_path_for(target: &Path) -> Result<PathBuf> {
    let parent = target.parent().ok_or_else(|| {
        SyncError::Internal(format!("{} has no parent", target.display()))
    })?;
    let name = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            SyncError::Internal(format!(
                "{} has no usable file name",
                target.display()
            ))
        })?;
    Ok(parent.join(format!(
        "{TEMP_PREFIX}{name}{TEMP_MARKER}{}",
        uuid::Uuid::new_v4()
    )))
}

/// Whether `name` looks like one of our in-flight temporary files.
pub fn is_temp_name(name: &str) -> bool {
    name.starts_with(TEMP_PREFIX) && name.contains(TEMP_MARKER)
}

pub async fn stage_bytes(target: &Path, bytes: &[u8]) -> Result<StagedWrite> {
    let tmp = temp_path_for(target)?;
    if let Some(parent) = tmp.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| SyncError::io_at(parent, err))?;
    }

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|err| SyncError::io_at(&tmp, err))?;
    let written = async {
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await
    }
    .await;
    if let Err(err) = written {
        drop(file);
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(SyncError::io_at(&tmp, err));
    }

    Ok(StagedWrite {
        tmp,
        target: target.to_path_buf(),
        mode: None,
    })
}

/// Pretty JSON with a trailing newline, staged for [`StagedWrite::commit`].
pub async fn stage_json<T: Serialize>(
    target: &Path,
    value: &T,
) -> Result<StagedWrite> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    stage_bytes(target, &bytes).await
}

pub async fn write_json<T: Serialize>(
    target: &Path,
    value: &T,
    mode: u32,
) -> Result<()> {
    stage_json(target, value).await?.with_mode(mode).commit().await
}

#[cfg(unix)]
async fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|err| SyncError::io_at(path, err))
}

#[cfg(not(unix))]
async fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn uncommitted_write_leaves_target_untouched() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("120.json");
        std::fs::write(&target, b"{\"old\":true}\n").unwrap();

        let staged = stage_json(&target, &serde_json::json!({"old": false}))
            .await
            .unwrap();
        assert!(staged.temp_path().exists());
        assert_eq!(std::fs::read(&target).unwrap(), b"{\"old\":true}\n");

        staged.abort().await.unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("120.json")]);
    }

    #[tokio::test]
    async fn commit_replaces_target_and_sets_mode() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("nested/3.json");

        write_json(&target, &serde_json::json!({"productTypeID": 3}), 0o644)
            .await
            .unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&target).unwrap()).unwrap();
        assert_eq!(value["productTypeID"], 3);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o644);
        }
    }

    #[test]
    fn temp_names_are_hidden_siblings() {
        let tmp = temp_path_for(Path::new("/out/metadata/120.json")).unwrap();
        assert_eq!(tmp.parent(), Some(Path::new("/out/metadata")));
        let name = tmp.file_name().unwrap().to_str().unwrap();
        assert!(is_temp_name(name));
        assert!(!is_temp_name("120.json"));
    }
}
