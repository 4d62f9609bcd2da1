//! Records freshly rendered frames in the catalog.

use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike};
use radarsync_model::{
    FRAME_EXTENSION, Frame, Georeference, ProductId, ProductSpec, RunKey,
    family, product,
};
use tracing::{info, warn};

use crate::catalog::{CatalogStore, RunMerge};
use crate::error::{Result, SyncError};
use crate::render::RenderOutput;
use crate::staging::StagedScan;

/// What one staged scan contributed to the catalog.
#[derive(Debug, Default, Clone)]
pub struct CatalogUpdate {
    pub merged: Vec<ProductId>,
    /// Reported product ids missing from the product table.
    pub unknown: Vec<ProductId>,
}

#[derive(Debug, Clone)]
pub struct PostRenderCatalogUpdater {
    catalog: Arc<CatalogStore>,
}

impl PostRenderCatalogUpdater {
    pub fn new(catalog: Arc<CatalogStore>) -> Self {
        Self { catalog }
    }

    /// Merge the frame at `scan_time` into `spec`'s run. Static products
    /// always get the sentinel georeference.
    pub async fn merge_product(
        &self,
        spec: &ProductSpec,
        scan_time: NaiveDateTime,
        georeference: &Georeference,
    ) -> Result<RunMerge> {
        let run = RunKey::containing(scan_time);
        let minute = scan_time.minute();
        let georeference = if spec.kind.is_georeferenced() {
            georeference.clone()
        } else {
            Georeference::sentinel()
        };
        let frame = Frame::observed(run, minute, FRAME_EXTENSION, georeference)?;
        self.catalog
            .merge_run(&spec.descriptor(scan_time), run, frame)
            .await
    }

    /// Merge every product in the family based at `base`.
    pub async fn after_render(
        &self,
        base: ProductId,
        scan_time: NaiveDateTime,
        georeference: &Georeference,
    ) -> Result<Vec<RunMerge>> {
        let family = family(base).ok_or_else(|| {
            SyncError::Internal(format!("{base} is not a product family base"))
        })?;
        let mut merges = Vec::with_capacity(family.products.len());
        for spec in family.products {
            merges.push(self.merge_product(spec, scan_time, georeference).await?);
        }
        Ok(merges)
    }

    /// Merge everything the renderer reported, then delete the staged scan.
    ///
    /// The staged file is deleted whether or not the merge succeeds.
    pub async fn complete(
        &self,
        staged: StagedScan,
        output: &RenderOutput,
    ) -> Result<CatalogUpdate> {
        let result = self.merge_reported(staged.key().timestamp(), output).await;
        let scan = staged.key().clone();
        if let Err(err) = staged.discard().await {
            warn!(scan = %scan, error = %err, "failed to remove staged scan");
        }
        let update = result?;
        info!(
            scan = %scan,
            products = update.merged.len(),
            "catalogued rendered scan"
        );
        Ok(update)
    }

    async fn merge_reported(
        &self,
        scan_time: NaiveDateTime,
        output: &RenderOutput,
    ) -> Result<CatalogUpdate> {
        let mut update = CatalogUpdate::default();
        for rendered in &output.products {
            let Some(spec) = product(rendered.product_id) else {
                warn!(product = %rendered.product_id, "renderer reported an unknown product");
                update.unknown.push(rendered.product_id);
                continue;
            };
            self.merge_product(spec, scan_time, &rendered.georeference)
                .await?;
            update.merged.push(spec.id);
        }
        Ok(update)
    }
}
