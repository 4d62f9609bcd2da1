use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use radarsync_config::RendererConfig;
use radarsync_model::{FRAME_EXTENSION, Frame, Georeference};
use tokio::process::Command;
use tracing::{debug, warn};

use super::{RenderOutput, RenderRequest, RenderedProduct, Renderer};
use crate::error::{Result, SyncError};

const STDERR_EXCERPT_LEN: usize = 400;

/// Runs an external program once per scan:
///
/// `<program> <args..> <staged path> <YYYYMMDDHHMM>`
///
/// The output root, the skip-georeferenced toggle, and the expected targets
/// (as JSON) are passed in `RADARSYNC_OUTPUT_ROOT`,
/// `RADARSYNC_SKIP_GEOREFERENCED`, and `RADARSYNC_PRODUCTS`. The program
/// prints a [`RenderOutput`] on stdout. Empty stdout means "check the
/// expected paths": every target file that exists counts as rendered with
/// no georeference.
#[derive(Debug, Clone)]
pub struct CommandRenderer {
    program: PathBuf,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandRenderer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// `None` when no renderer program is configured.
    pub fn from_config(renderer: &RendererConfig) -> Option<Self> {
        renderer
            .program
            .as_ref()
            .map(|program| Self::new(program, renderer.args.clone(), renderer.timeout))
    }

    fn failed(request: &RenderRequest, reason: impl Into<String>) -> SyncError {
        SyncError::RenderFailed {
            scan: request.scan.file_name(),
            reason: reason.into(),
        }
    }

    /// Targets whose image exists, under either the unpadded or the
    /// zero-padded minute.
    async fn infer_from_files(request: &RenderRequest) -> RenderOutput {
        let names =
            Frame::file_name_candidates(request.scan.minute(), FRAME_EXTENSION);
        let mut products = Vec::new();
        for target in &request.targets {
            let mut written = false;
            for name in &names {
                let path = target.output_path.with_file_name(name);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    written = true;
                    break;
                }
            }
            if written {
                products.push(RenderedProduct {
                    product_id: target.product_id,
                    georeference: Georeference::sentinel(),
                });
            }
        }
        RenderOutput { products }
    }
}

#[async_trait]
impl Renderer for CommandRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput> {
        let targets = serde_json::to_string(&request.targets)?;
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(&request.staged_path)
            .arg(request.scan.stamp().to_string())
            .env("RADARSYNC_OUTPUT_ROOT", &request.output_root)
            .env(
                "RADARSYNC_SKIP_GEOREFERENCED",
                if request.skip_georeferenced { "1" } else { "0" },
            )
            .env("RADARSYNC_PRODUCTS", targets)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(
            program = %self.program.display(),
            scan = %request.scan,
            "starting renderer"
        );
        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| {
                Self::failed(request, format!("timed out after {:?}", self.timeout))
            })?
            .map_err(|err| {
                Self::failed(
                    request,
                    format!("cannot start {}: {err}", self.program.display()),
                )
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !output.status.success() {
            let excerpt: String = stderr
                .trim()
                .chars()
                .rev()
                .take(STDERR_EXCERPT_LEN)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            return Err(Self::failed(
                request,
                format!("{}: {excerpt}", output.status),
            ));
        }
        if !stderr.trim().is_empty() {
            warn!(scan = %request.scan, stderr = %stderr.trim(), "renderer wrote to stderr");
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(Self::infer_from_files(request).await);
        }
        serde_json::from_str(stdout.trim())
            .map_err(|err| Self::failed(request, format!("unreadable output: {err}")))
    }
}
