//! Boundary between the pipeline and whatever turns a raw scan into images.

mod command;

pub use command::CommandRenderer;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use radarsync_model::{
    Georeference, PRODUCT_FAMILIES, ProductFamily, ProductId, ProductSpec,
    RunKey, ScanKey,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One image the renderer is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderTarget {
    pub product_id: ProductId,
    /// Base product of the family this image belongs to.
    pub family: ProductId,
    pub field: &'static str,
    pub units: &'static str,
    pub georeferenced: bool,
    pub output_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub scan: ScanKey,
    pub staged_path: PathBuf,
    pub output_root: PathBuf,
    pub skip_georeferenced: bool,
    pub targets: Vec<RenderTarget>,
}

impl RenderRequest {
    /// Request covering every product family, minus georeferenced outputs
    /// when `skip_georeferenced` is set.
    pub fn for_scan(
        scan: ScanKey,
        staged_path: impl Into<PathBuf>,
        output_root: impl Into<PathBuf>,
        skip_georeferenced: bool,
    ) -> Self {
        let output_root = output_root.into();
        let run = scan.run_key();
        let minute = scan.minute();
        let targets = PRODUCT_FAMILIES
            .iter()
            .flat_map(|family| {
                let root = output_root.clone();
                family.selected(skip_georeferenced).map(move |spec| {
                    target(family, spec, &root, run, minute)
                })
            })
            .collect();

        Self {
            scan,
            staged_path: staged_path.into(),
            output_root,
            skip_georeferenced,
            targets,
        }
    }

    pub fn target(&self, id: ProductId) -> Option<&RenderTarget> {
        self.targets.iter().find(|target| target.product_id == id)
    }
}

fn target(
    family: &ProductFamily,
    spec: &ProductSpec,
    output_root: &Path,
    run: RunKey,
    minute: u32,
) -> RenderTarget {
    RenderTarget {
        product_id: spec.id,
        family: family.base,
        field: family.field,
        units: family.units,
        georeferenced: spec.kind.is_georeferenced(),
        output_path: spec.frame_path(output_root, run, minute),
    }
}

/// A product the renderer wrote for the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedProduct {
    pub product_id: ProductId,
    /// Map bounds of a georeferenced image. Ignored for static products.
    #[serde(default)]
    pub georeference: Georeference,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOutput {
    #[serde(default)]
    pub products: Vec<RenderedProduct>,
}

#[async_trait]
pub trait Renderer: Send + Sync + std::fmt::Debug {
    /// Render one staged scan. Errors other than pass-fatal ones are
    /// reported as `RenderFailed` and never retried.
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn scan() -> ScanKey {
        ScanKey::new(
            "TAMU",
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 5, 0)
                .unwrap(),
        )
    }

    #[test]
    fn request_lists_every_family_output() {
        let request =
            RenderRequest::for_scan(scan(), "/stage/TAMU_20240101_0005", "/out", false);
        let ids: Vec<u32> =
            request.targets.iter().map(|t| t.product_id.get()).collect();
        assert_eq!(ids, vec![120, 121, 122, 123, 125, 126]);
        assert_eq!(
            request.target(ProductId(121)).unwrap().output_path,
            PathBuf::from("/out/products/radar/ADRAD/121/2024/01/01/0000/5.png")
        );
        assert_eq!(request.target(ProductId(123)).unwrap().family, ProductId(122));
    }

    #[test]
    fn skip_georeferenced_drops_gis_targets() {
        let request =
            RenderRequest::for_scan(scan(), "/stage/x", "/out", true);
        assert!(request.targets.iter().all(|t| !t.georeferenced));
        assert_eq!(request.targets.len(), 3);
    }

    #[test]
    fn output_georeference_defaults_to_sentinel() {
        let output: RenderOutput =
            serde_json::from_str(r#"{"products":[{"product_id":121}]}"#).unwrap();
        assert!(output.products[0].georeference.is_sentinel());
    }
}
