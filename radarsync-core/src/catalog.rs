//! File-backed catalog under `<output_root>/metadata/`.
//!
//! Layout:
//! - `metadata/<productTypeID>.json`: product type record
//! - `metadata/<productID>.json`: product descriptor
//! - `metadata/products/<productID>/<YYYYMMDDHH00>.json`: run frame list
//!
//! Every document is rewritten whole through [`crate::atomic`]. Writers that
//! read-modify-write the same document are serialized by a per-document lock
//! held for the whole cycle.

use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{NaiveDateTime, Timelike, Utc};
use dashmap::DashMap;
use radarsync_model::{
    Frame, FrameMerge, Georeference, ProductDescriptor, ProductId,
    ProductRunRecord, ProductTypeId, ProductTypeRecord, ProductTypeSpec,
    RunKey,
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::atomic;
use crate::error::{Result, SyncError};

/// Permission bits applied to every catalog document.
pub const DOCUMENT_MODE: u32 = 0o644;

const METADATA_DIR: &str = "metadata";
const RUNS_DIR: &str = "products";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum DocumentKey {
    ProductType(ProductTypeId),
    Descriptor(ProductId),
    Run(ProductId, RunKey),
}

/// Result of [`CatalogStore::merge_run`].
#[derive(Debug, Clone)]
pub struct RunMerge {
    pub record: ProductRunRecord,
    pub frame: FrameMerge,
    /// Frames recovered from image files the document did not list.
    pub recovered: usize,
    /// Whether the run document was rewritten.
    pub written: bool,
}

pub struct CatalogStore {
    output_root: PathBuf,
    product_type: ProductTypeSpec,
    locks: DashMap<DocumentKey, Arc<Mutex<()>>>,
    now: fn() -> NaiveDateTime,
}

impl std::fmt::Debug for CatalogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogStore")
            .field("output_root", &self.output_root)
            .field("product_type", &self.product_type.id)
            .field("locks", &self.locks.len())
            .finish()
    }
}

fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl CatalogStore {
    pub fn new(
        output_root: impl Into<PathBuf>,
        product_type: ProductTypeSpec,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            product_type,
            locks: DashMap::new(),
            now: utc_now,
        }
    }

    /// Replace the wall clock used for `publishTime` and `lastReloadTime`.
    pub fn with_clock(mut self, now: fn() -> NaiveDateTime) -> Self {
        self.now = now;
        self
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.output_root.join(METADATA_DIR)
    }

    pub fn product_type_path(&self, id: ProductTypeId) -> PathBuf {
        self.metadata_dir().join(format!("{id}.json"))
    }

    pub fn descriptor_path(&self, id: ProductId) -> PathBuf {
        self.metadata_dir().join(format!("{id}.json"))
    }

    pub fn run_path(&self, id: ProductId, run: RunKey) -> PathBuf {
        self.metadata_dir()
            .join(RUNS_DIR)
            .join(id.to_string())
            .join(format!("{}.json", run.document_stem()))
    }

    fn lock_for(&self, key: DocumentKey) -> Arc<Mutex<()>> {
        self.locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn read_run(
        &self,
        id: ProductId,
        run: RunKey,
    ) -> Result<Option<ProductRunRecord>> {
        read_document(&self.run_path(id, run)).await
    }

    pub async fn read_descriptor(
        &self,
        id: ProductId,
    ) -> Result<Option<ProductDescriptor>> {
        read_document(&self.descriptor_path(id)).await
    }

    pub async fn read_product_type(
        &self,
        id: ProductTypeId,
    ) -> Result<Option<ProductTypeRecord>> {
        read_document(&self.product_type_path(id)).await
    }

    /// Whether the run containing `valid` already lists a frame at `valid`.
    pub async fn has_frame(
        &self,
        id: ProductId,
        valid: NaiveDateTime,
    ) -> Result<bool> {
        Ok(self
            .read_run(id, RunKey::containing(valid))
            .await?
            .is_some_and(|record| record.contains_valid(valid)))
    }

    /// Upsert `frame` into the run document of `descriptor`'s product.
    ///
    /// Image files already present in the run's output directory but missing
    /// from the document are recovered first. A merge that changes nothing
    /// rewrites nothing. When the run changes, the descriptor and the product
    /// type record are refreshed too.
    pub async fn merge_run(
        &self,
        descriptor: &ProductDescriptor,
        run: RunKey,
        frame: Frame,
    ) -> Result<RunMerge> {
        let id = descriptor.product_id;
        let (merge, descriptor_missing) = {
            let lock = self.lock_for(DocumentKey::Run(id, run));
            let _guard = lock.lock().await;

            let path = self.run_path(id, run);
            let existing: Option<ProductRunRecord> = read_document(&path).await?;
            let mut record = existing
                .clone()
                .unwrap_or_else(|| ProductRunRecord::empty(run, (self.now)()));

            let recovered = self
                .recover_frames(&mut record, descriptor, run)
                .await?;
            let mut frame = frame;
            if let Some(name) = self
                .image_on_disk(&record, descriptor, run, &frame)
                .await
            {
                frame.filename = name;
            }
            let outcome = record.upsert_frame(frame);
            record.normalize();

            let written = existing.as_ref() != Some(&record);
            if written {
                record.publish_time = (self.now)();
                atomic::write_json(&path, &record, DOCUMENT_MODE).await?;
                debug!(
                    product = %id,
                    run = %run,
                    frames = record.frames().len(),
                    recovered,
                    ?outcome,
                    "run document written"
                );
            }

            let descriptor_missing =
                !tokio::fs::try_exists(self.descriptor_path(id))
                    .await
                    .unwrap_or(false);
            (
                RunMerge {
                    record,
                    frame: outcome,
                    recovered,
                    written,
                },
                descriptor_missing,
            )
        };

        if merge.written || descriptor_missing {
            let mut refreshed = descriptor.clone();
            refreshed.last_reload_time = (self.now)();
            self.upsert_descriptor(&refreshed).await?;
        }

        Ok(merge)
    }

    /// Recover frames for image files in the run directory that the run
    /// document does not list yet. Returns the refreshed record.
    pub async fn reconcile_run(
        &self,
        descriptor: &ProductDescriptor,
        run: RunKey,
    ) -> Result<ProductRunRecord> {
        let id = descriptor.product_id;
        let lock = self.lock_for(DocumentKey::Run(id, run));
        let _guard = lock.lock().await;

        let path = self.run_path(id, run);
        let existing: Option<ProductRunRecord> = read_document(&path).await?;
        let mut record = existing
            .clone()
            .unwrap_or_else(|| ProductRunRecord::empty(run, (self.now)()));
        let recovered = self.recover_frames(&mut record, descriptor, run).await?;
        record.normalize();

        // An empty run with no document stays absent.
        if existing.is_none() && record.frames().is_empty() {
            return Ok(record);
        }
        if existing.as_ref() != Some(&record) {
            record.publish_time = (self.now)();
            atomic::write_json(&path, &record, DOCUMENT_MODE).await?;
            info!(product = %id, run = %run, recovered, "run document reconciled");
        }
        Ok(record)
    }

    /// Write the descriptor and replace its entry in the product type record.
    pub async fn upsert_descriptor(
        &self,
        descriptor: &ProductDescriptor,
    ) -> Result<()> {
        {
            let lock =
                self.lock_for(DocumentKey::Descriptor(descriptor.product_id));
            let _guard = lock.lock().await;
            atomic::write_json(
                &self.descriptor_path(descriptor.product_id),
                descriptor,
                DOCUMENT_MODE,
            )
            .await?;
        }

        let type_id = self.product_type.id;
        let lock = self.lock_for(DocumentKey::ProductType(type_id));
        let _guard = lock.lock().await;
        let path = self.product_type_path(type_id);
        let mut record: ProductTypeRecord = read_document(&path)
            .await?
            .unwrap_or_else(|| self.product_type.empty_record());
        record.upsert(descriptor.clone());
        atomic::write_json(&path, &record, DOCUMENT_MODE).await
    }

    fn run_dir(&self, descriptor: &ProductDescriptor, run: RunKey) -> PathBuf {
        self.output_root
            .join(&descriptor.product_path)
            .join(run.path_extension())
    }

    /// File name to record for `frame` when its own name is not on disk but
    /// the image exists under another name: the one an existing frame at the
    /// same `valid` lists, or the zero-padded minute.
    async fn image_on_disk(
        &self,
        record: &ProductRunRecord,
        descriptor: &ProductDescriptor,
        run: RunKey,
        frame: &Frame,
    ) -> Option<String> {
        let dir = self.run_dir(descriptor, run);
        if file_exists(&dir.join(&frame.filename)).await {
            return None;
        }
        let listed = record
            .frames()
            .iter()
            .filter(|existing| existing.valid == frame.valid)
            .map(|existing| existing.filename.clone());
        let candidates = Frame::file_name_candidates(
            frame.valid.minute(),
            &descriptor.file_extension,
        );
        for name in listed.chain(candidates) {
            if name != frame.filename && file_exists(&dir.join(&name)).await {
                return Some(name);
            }
        }
        None
    }

    async fn recover_frames(
        &self,
        record: &mut ProductRunRecord,
        descriptor: &ProductDescriptor,
        run: RunKey,
    ) -> Result<usize> {
        let dir = self.run_dir(descriptor, run);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(0);
            }
            Err(err) => return Err(SyncError::io_at(&dir, err)),
        };

        let mut recovered = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|err| SyncError::io_at(&dir, err))?
        {
            let Ok(file_type) = entry.file_type().await else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string)
            else {
                continue;
            };
            let Some(minute) = frame_minute(&name, &descriptor.file_extension)
            else {
                continue;
            };
            let frame = Frame {
                forecast_hour: 0,
                filename: name,
                georeference: Georeference::sentinel(),
                valid: run.frame_time(minute)?,
            };
            if record.insert_if_absent(frame) {
                recovered += 1;
            }
        }
        Ok(recovered)
    }
}

/// Minute offset encoded in an image file name such as `5.png` or `05.png`.
fn frame_minute(name: &str, extension: &str) -> Option<u32> {
    let (stem, ext) = name.rsplit_once('.')?;
    if ext != extension || stem.is_empty() || stem.len() > 2 {
        return None;
    }
    if !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse::<u32>().ok().filter(|minute| *minute < 60)
}

async fn file_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file())
}

async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(None);
        }
        Err(err) => return Err(SyncError::io_at(path, err)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| SyncError::CatalogCorrupt {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use radarsync_model::{PRODUCT_TYPE, product};
    use tempfile::tempdir;

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 7, 0)
            .unwrap()
    }

    fn run() -> RunKey {
        RunKey::containing(fixed_now())
    }

    fn store(root: &Path) -> CatalogStore {
        CatalogStore::new(root, PRODUCT_TYPE).with_clock(fixed_now)
    }

    fn descriptor(id: u32) -> ProductDescriptor {
        product(ProductId(id)).unwrap().descriptor(fixed_now())
    }

    #[test]
    fn frame_minute_accepts_padded_and_unpadded_names() {
        assert_eq!(frame_minute("5.png", "png"), Some(5));
        assert_eq!(frame_minute("05.png", "png"), Some(5));
        assert_eq!(frame_minute("59.png", "png"), Some(59));
        assert_eq!(frame_minute("60.png", "png"), None);
        assert_eq!(frame_minute("5.jpg", "png"), None);
        assert_eq!(frame_minute("a5.png", "png"), None);
        assert_eq!(frame_minute(".5.png.tmp", "png"), None);
    }

    #[test]
    fn layout_matches_catalog_paths() {
        let store = store(Path::new("/out"));
        assert_eq!(
            store.run_path(ProductId(120), run()),
            PathBuf::from("/out/metadata/products/120/202401010000.json")
        );
        assert_eq!(
            store.descriptor_path(ProductId(121)),
            PathBuf::from("/out/metadata/121.json")
        );
        assert_eq!(
            store.product_type_path(ProductTypeId(3)),
            PathBuf::from("/out/metadata/3.json")
        );
    }

    #[tokio::test]
    async fn merge_twice_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let frame =
            Frame::observed(run(), 0, "png", Georeference::sentinel()).unwrap();

        let first = store
            .merge_run(&descriptor(121), run(), frame.clone())
            .await
            .unwrap();
        assert!(first.written);
        let bytes = std::fs::read(store.run_path(ProductId(121), run())).unwrap();

        let second = store
            .merge_run(&descriptor(121), run(), frame)
            .await
            .unwrap();
        assert!(!second.written);
        assert_eq!(second.frame, FrameMerge::Unchanged);
        assert_eq!(
            std::fs::read(store.run_path(ProductId(121), run())).unwrap(),
            bytes
        );
    }

    #[tokio::test]
    async fn merge_refreshes_descriptor_and_type_record() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        for id in [121, 120] {
            let frame =
                Frame::observed(run(), 0, "png", Georeference::sentinel())
                    .unwrap();
            store.merge_run(&descriptor(id), run(), frame).await.unwrap();
        }

        let record = store
            .read_product_type(PRODUCT_TYPE.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.product_type_description, "ADRAD Radar");
        let ids: Vec<u32> =
            record.products.iter().map(|p| p.product_id.get()).collect();
        assert_eq!(ids, vec![120, 121]);

        let stored = store.read_descriptor(ProductId(120)).await.unwrap().unwrap();
        assert_eq!(stored.product_path, "gisproducts/radar/ADRAD/120/");
        assert!(stored.is_georeferenced);
    }

    #[tokio::test]
    async fn corrupt_run_document_is_left_alone() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.run_path(ProductId(120), run());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{\"publishTime\": ").unwrap();

        let frame =
            Frame::observed(run(), 0, "png", Georeference::sentinel()).unwrap();
        let err = store
            .merge_run(&descriptor(120), run(), frame)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::CatalogCorrupt { .. }));
        assert!(err.is_pass_fatal());
        assert_eq!(std::fs::read(&path).unwrap(), b"{\"publishTime\": ");
    }

    #[tokio::test]
    async fn reconcile_recovers_frames_from_image_files() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let spec = product(ProductId(121)).unwrap();
        let run_dir = spec.run_dir(dir.path(), run());
        std::fs::create_dir_all(&run_dir).unwrap();
        std::fs::write(run_dir.join("0.png"), b"png").unwrap();
        std::fs::write(run_dir.join("05.png"), b"png").unwrap();
        std::fs::write(run_dir.join("notes.txt"), b"x").unwrap();

        let record = store.reconcile_run(&descriptor(121), run()).await.unwrap();
        let names: Vec<&str> =
            record.frames().iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, vec!["0.png", "05.png"]);
        assert!(record.frames().iter().all(|f| f.georeference.is_sentinel()));
        assert_eq!(record.available_frame_count, 2);
        assert!(store.run_path(ProductId(121), run()).exists());
    }

    #[tokio::test]
    async fn reconcile_without_images_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let record = store.reconcile_run(&descriptor(120), run()).await.unwrap();
        assert!(record.frames().is_empty());
        assert!(!store.run_path(ProductId(120), run()).exists());
    }
}
