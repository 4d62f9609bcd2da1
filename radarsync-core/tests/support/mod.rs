//! Fakes shared by the core integration suites.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use radarsync_core::{
    AcquisitionController, CatalogStore, MirrorSettings, RemoteSource,
    RenderOutput, RenderRequest, RenderedProduct, Renderer, Result,
    ScanNameParser, SourceLister, StagingArea, StatusLog, SyncError,
};
use radarsync_model::{Georeference, PRODUCT_TYPE, ProductId};
use tempfile::TempDir;

pub const GIS_BOUNDS: ((f64, f64), (f64, f64)) = ((29.1, -97.8), (31.7, -94.9));

/// Writes every requested image and reports georeferenced ones with
/// [`GIS_BOUNDS`].
#[derive(Debug, Default)]
pub struct FakeRenderer {
    pub calls: AtomicUsize,
    pub fail_scans: Mutex<Vec<String>>,
    /// Products written and catalogued but never reported.
    pub unreported: Vec<ProductId>,
    pub seen: Mutex<Vec<String>>,
}

impl FakeRenderer {
    pub fn failing_on(names: &[&str]) -> Self {
        Self {
            fail_scans: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            ..Self::default()
        }
    }

    pub fn not_reporting(ids: &[u32]) -> Self {
        Self {
            unreported: ids.iter().copied().map(ProductId).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<RenderOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = request.scan.file_name();
        self.seen.lock().unwrap().push(name.clone());
        assert!(
            request.staged_path.exists(),
            "staged file must exist while rendering"
        );
        if self.fail_scans.lock().unwrap().contains(&name) {
            return Err(SyncError::RenderFailed {
                scan: name,
                reason: "volume has no reflectivity field".to_string(),
            });
        }

        let mut products = Vec::new();
        for target in &request.targets {
            std::fs::create_dir_all(target.output_path.parent().unwrap()).unwrap();
            std::fs::write(&target.output_path, b"png").unwrap();
            if self.unreported.contains(&target.product_id) {
                continue;
            }
            products.push(RenderedProduct {
                product_id: target.product_id,
                georeference: if target.georeferenced {
                    Georeference::from_corners(GIS_BOUNDS.0, GIS_BOUNDS.1)
                } else {
                    Georeference::sentinel()
                },
            });
        }
        Ok(RenderOutput { products })
    }
}

/// In-memory remote that counts every request.
#[derive(Debug, Default)]
pub struct FakeRemote {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub manifest_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn with_files(names: &[&str]) -> Self {
        let remote = Self::default();
        {
            let mut files = remote.files.lock().unwrap();
            for name in names {
                files.insert(name.to_string(), name.as_bytes().to_vec());
            }
        }
        remote
    }

    pub fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn manifest(&self) -> Result<String> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        let files = self.files.lock().unwrap();
        Ok(files.keys().cloned().collect::<Vec<_>>().join("\n"))
    }

    async fn fetch(&self, name: &str) -> Result<Vec<u8>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::FetchFailed {
                name: name.to_string(),
                reason: "HTTP 404 Not Found".to_string(),
            })
    }

    fn describe(&self) -> String {
        "fake".to_string()
    }
}

/// Temporary mirror, staging, and output directories.
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["mirror", "staging", "output"] {
            std::fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        Self { dir }
    }

    pub fn mirror(&self) -> PathBuf {
        self.dir.path().join("mirror")
    }

    pub fn staging(&self) -> PathBuf {
        self.dir.path().join("staging")
    }

    pub fn output(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Publish files in the mirror and mark the listing complete.
    pub fn publish(&self, names: &[&str]) {
        for name in names {
            std::fs::write(self.mirror().join(name), name.as_bytes()).unwrap();
        }
        std::fs::write(self.mirror().join("dir.list"), names.join("\n")).unwrap();
    }

    pub fn staged_names(&self) -> Vec<String> {
        list_names(&self.staging())
    }

    pub fn catalog(&self) -> CatalogStore {
        CatalogStore::new(self.output(), PRODUCT_TYPE)
    }

    pub fn controller(
        &self,
        mirror: bool,
        remote: Option<Arc<dyn RemoteSource>>,
        status: Arc<StatusLog>,
    ) -> AcquisitionController {
        let mirror = mirror.then(|| MirrorSettings {
            root: self.mirror(),
            ready_marker: "dir.list".to_string(),
            poll_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(50),
        });
        AcquisitionController::new(
            SourceLister::new(mirror, remote),
            ScanNameParser::new("TAMU", "_annotated"),
            Arc::new(self.catalog()),
            StagingArea::new(self.staging()),
            status,
        )
    }
}

pub fn list_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}
