//! One synchronization pass: list, classify, acquire, render, catalog.
//!
//! Each candidate scan moves through
//! `Discovered -> SkippedCatalogued | SkippedStaged | Staged | FetchFailed`.
//! Catalogued scans cost one catalog read and nothing else. Everything left
//! in staging afterwards is handed to the renderer.

use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDateTime;
use futures::{StreamExt, stream};
use radarsync_config::{Config, PipelineConfig};
use radarsync_model::{
    PRIMARY_PRODUCT, PRODUCT_TYPE, ProductId, ScanKey, family_of,
};
use tracing::{debug, info, warn};

use crate::catalog::CatalogStore;
use crate::error::{Result, SyncError};
use crate::render::{RenderRequest, Renderer};
use crate::scan_name::{Rejection, ScanNameParser};
use crate::source::{RemoteSource, SourceLister};
use crate::staging::{StagedScan, StagingArea};
use crate::status::StatusLog;
use crate::updater::PostRenderCatalogUpdater;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOptions {
    /// Render only the staged scan at this minute.
    pub scan_time: Option<NaiveDateTime>,
    pub skip_georeferenced: bool,
    pub max_parallel_scans: usize,
}

impl Default for PassOptions {
    fn default() -> Self {
        Self {
            scan_time: None,
            skip_georeferenced: false,
            max_parallel_scans: 1,
        }
    }
}

impl PassOptions {
    pub fn from_config(pipeline: &PipelineConfig) -> Self {
        Self {
            max_parallel_scans: pipeline.max_parallel_scans.max(1),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireVia {
    Mirror,
    Network,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDisposition {
    SkippedCatalogued,
    SkippedStaged,
    Staged(AcquireVia),
    FetchFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Rendered { products: usize },
    /// Catalogued by an earlier pass; the staged copy was dropped.
    AlreadyCatalogued,
    RenderFailed,
    /// Rendered, but recording the frames failed.
    CatalogFailed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassSummary {
    pub listed: usize,
    pub ignored: usize,
    pub malformed: usize,
    pub catalogued: usize,
    pub already_staged: usize,
    pub staged: usize,
    pub fetch_failed: usize,
    /// Scans handed to the renderer.
    pub dispatched: usize,
    pub rendered: usize,
    pub render_failed: usize,
    pub catalog_failed: usize,
    /// Staged scans dropped because they were already catalogued.
    pub discarded: usize,
}

#[derive(Debug)]
pub struct AcquisitionController {
    lister: SourceLister,
    parser: ScanNameParser,
    catalog: Arc<CatalogStore>,
    staging: StagingArea,
    renderer: Option<Arc<dyn Renderer>>,
    updater: PostRenderCatalogUpdater,
    status: Arc<StatusLog>,
    primary: ProductId,
    options: PassOptions,
}

impl AcquisitionController {
    pub fn new(
        lister: SourceLister,
        parser: ScanNameParser,
        catalog: Arc<CatalogStore>,
        staging: StagingArea,
        status: Arc<StatusLog>,
    ) -> Self {
        Self {
            lister,
            parser,
            updater: PostRenderCatalogUpdater::new(catalog.clone()),
            catalog,
            staging,
            renderer: None,
            status,
            primary: PRIMARY_PRODUCT,
            options: PassOptions::default(),
        }
    }

    /// Wire every component from the loaded configuration.
    pub fn from_config(
        config: &Config,
        remote: Option<Arc<dyn RemoteSource>>,
        renderer: Option<Arc<dyn Renderer>>,
        status: Arc<StatusLog>,
    ) -> Self {
        let catalog =
            Arc::new(CatalogStore::new(config.output_root(), PRODUCT_TYPE));
        let mut controller = Self::new(
            SourceLister::from_config(&config.source, remote),
            ScanNameParser::from_config(&config.source),
            catalog,
            StagingArea::new(config.staging_dir()),
            status,
        )
        .with_options(PassOptions::from_config(&config.pipeline));
        controller.renderer = renderer;
        controller
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_options(mut self, options: PassOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut PassOptions {
        &mut self.options
    }

    pub fn catalog(&self) -> &Arc<CatalogStore> {
        &self.catalog
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    pub async fn run_once(&self) -> Result<PassSummary> {
        let started = Instant::now();
        let mut summary = PassSummary::default();

        self.staging.ensure_root().await?;
        self.staging.sweep_partials().await?;

        let listing = self.lister.list().await?;
        let names = self
            .parser
            .partition(listing.names.iter().map(String::as_str));
        summary.listed = listing.names.len();
        summary.ignored = names.ignored;
        summary.malformed = names.malformed.len();
        for name in names.malformed {
            let rejected = SyncError::ScanNameRejected {
                name,
                reason: Rejection::MalformedTimestamp,
            };
            self.status.warn(rejected.to_string());
        }

        for key in &names.keys {
            match self.acquire(key).await? {
                ScanDisposition::SkippedCatalogued => summary.catalogued += 1,
                ScanDisposition::SkippedStaged => summary.already_staged += 1,
                ScanDisposition::Staged(_) => summary.staged += 1,
                ScanDisposition::FetchFailed(reason) => {
                    summary.fetch_failed += 1;
                    self.status.warn(reason);
                }
            }
        }

        if self.renderer.is_some() {
            self.dispatch_staged(&mut summary).await?;
        } else if summary.staged > 0 {
            info!(
                staged = summary.staged,
                "no renderer configured; scans left in staging"
            );
        }

        info!(
            target: "radarsync::pass",
            origin = ?listing.origin,
            listed = summary.listed,
            catalogued = summary.catalogued,
            staged = summary.staged,
            fetch_failed = summary.fetch_failed,
            dispatched = summary.dispatched,
            rendered = summary.rendered,
            render_failed = summary.render_failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "pass complete"
        );
        if summary.staged > 0 || summary.rendered > 0 {
            self.status.info(format!(
                "staged {} and rendered {} scan(s)",
                summary.staged, summary.rendered
            ));
        }
        Ok(summary)
    }

    /// Whether any selected product of the primary family already lists a
    /// frame for `key`.
    pub async fn is_catalogued(&self, key: &ScanKey) -> Result<bool> {
        for id in self.dedup_products() {
            if self.catalog.has_frame(id, key.timestamp()).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Primary family products this pass renders, georeferenced first.
    fn dedup_products(&self) -> Vec<ProductId> {
        match family_of(self.primary) {
            Some(family) => family
                .selected(self.options.skip_georeferenced)
                .map(|spec| spec.id)
                .collect(),
            None => vec![self.primary],
        }
    }

    /// Classify one key and, when new, bring it into staging.
    ///
    /// Per-scan failures come back as [`ScanDisposition::FetchFailed`];
    /// only pass-fatal errors are returned as `Err`.
    pub async fn acquire(&self, key: &ScanKey) -> Result<ScanDisposition> {
        if self.is_catalogued(key).await? {
            debug!(scan = %key, "already catalogued");
            return Ok(ScanDisposition::SkippedCatalogued);
        }
        if self.staging.contains(key).await {
            debug!(scan = %key, "already staged");
            return Ok(ScanDisposition::SkippedStaged);
        }

        let name = key.file_name();
        if let Some(source) = self.lister.mirrored_file(&name).await {
            match self.staging.stage_copy(key, &source).await {
                Ok(_) => {
                    info!(scan = %key, "staged from mirror");
                    return Ok(ScanDisposition::Staged(AcquireVia::Mirror));
                }
                Err(err) => {
                    warn!(scan = %key, error = %err, "mirror copy failed")
                }
            }
        }

        let Some(remote) = self.lister.remote() else {
            return Ok(ScanDisposition::FetchFailed(format!(
                "fetch of {name} failed: not in mirror and no remote source"
            )));
        };
        let bytes = match remote.fetch(&name).await {
            Ok(bytes) => bytes,
            Err(err) if err.is_pass_fatal() => return Err(err),
            Err(err) => {
                warn!(scan = %key, error = %err, "fetch failed");
                return Ok(ScanDisposition::FetchFailed(err.to_string()));
            }
        };
        match self.staging.stage_bytes(key, &bytes).await {
            Ok(_) => {
                info!(scan = %key, bytes = bytes.len(), "staged from network");
                Ok(ScanDisposition::Staged(AcquireVia::Network))
            }
            Err(err) => Ok(ScanDisposition::FetchFailed(format!(
                "staging {name} failed: {err}"
            ))),
        }
    }

    /// Render one staged scan and record the result. The staged file is
    /// gone afterwards whatever the outcome.
    pub async fn dispatch(&self, staged: StagedScan) -> Result<DispatchOutcome> {
        let key = staged.key().clone();
        let catalogued = match self.is_catalogued(&key).await {
            Ok(catalogued) => catalogued,
            Err(err) => {
                staged.keep();
                return Err(err);
            }
        };
        if catalogued {
            if let Err(err) = staged.discard().await {
                warn!(scan = %key, error = %err, "failed to remove staged scan");
            }
            return Ok(DispatchOutcome::AlreadyCatalogued);
        }

        let Some(renderer) = &self.renderer else {
            return Err(SyncError::Internal(format!(
                "no renderer configured to dispatch {key}"
            )));
        };
        let request = RenderRequest::for_scan(
            key.clone(),
            staged.path(),
            self.catalog.output_root(),
            self.options.skip_georeferenced,
        );

        let output = match renderer.render(&request).await {
            Ok(output) => output,
            Err(err) if err.is_pass_fatal() => return Err(err),
            Err(err) => {
                warn!(scan = %key, error = %err, "render failed");
                self.status.error(err.to_string());
                if let Err(err) = staged.discard().await {
                    warn!(scan = %key, error = %err, "failed to remove staged scan");
                }
                return Ok(DispatchOutcome::RenderFailed);
            }
        };

        match self.updater.complete(staged, &output).await {
            Ok(update) => Ok(DispatchOutcome::Rendered {
                products: update.merged.len(),
            }),
            Err(err) if err.is_pass_fatal() => Err(err),
            Err(err) => {
                self.status
                    .error(format!("cataloguing {key} failed: {err}"));
                Ok(DispatchOutcome::CatalogFailed)
            }
        }
    }

    async fn dispatch_staged(&self, summary: &mut PassSummary) -> Result<()> {
        let mut keys = self.staging.pending_keys(&self.parser).await?;
        if let Some(scan_time) = self.options.scan_time {
            keys.retain(|key| key.timestamp() == scan_time);
            if keys.is_empty() {
                self.status.warn(format!(
                    "no staged scan for {}",
                    scan_time.format("%Y-%m-%d %H:%M")
                ));
            }
        }

        let parallelism = self.options.max_parallel_scans.max(1);
        let outcomes: Vec<(ScanKey, Result<DispatchOutcome>)> =
            stream::iter(keys.into_iter().map(|key| {
                let staged = self.staging.claim(key.clone());
                async move { (key, self.dispatch(staged).await) }
            }))
            .buffered(parallelism)
            .collect()
            .await;

        let mut fatal = None;
        for (key, outcome) in outcomes {
            match outcome {
                Ok(DispatchOutcome::AlreadyCatalogued) => summary.discarded += 1,
                Ok(DispatchOutcome::Rendered { .. }) => {
                    summary.dispatched += 1;
                    summary.rendered += 1;
                }
                Ok(DispatchOutcome::RenderFailed) => {
                    summary.dispatched += 1;
                    summary.render_failed += 1;
                }
                Ok(DispatchOutcome::CatalogFailed) => {
                    summary.dispatched += 1;
                    summary.catalog_failed += 1;
                }
                Err(err) if err.is_pass_fatal() => {
                    warn!(scan = %key, error = %err, "pass-fatal error while dispatching");
                    fatal.get_or_insert(err);
                }
                Err(err) => {
                    summary.catalog_failed += 1;
                    self.status.error(format!("{key}: {err}"));
                }
            }
        }

        match fatal {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
