//! The three catalog tiers: product type, product descriptor, and per-run
//! frame list.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ids::{ProductId, ProductTypeId};
use crate::scan::RunKey;
use crate::stamp;

/// Map extent of an image as two `"lat,lon"` corners.
///
/// Non-georeferenced images carry the sentinel `["0,0","0,0"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Georeference([String; 2]);

impl Georeference {
    pub const SENTINEL_CORNER: &'static str = "0,0";

    pub fn sentinel() -> Self {
        Self([
            Self::SENTINEL_CORNER.to_string(),
            Self::SENTINEL_CORNER.to_string(),
        ])
    }

    /// Build from two `(lat, lon)` corners.
    pub fn from_corners(first: (f64, f64), second: (f64, f64)) -> Self {
        Self([
            format!("{},{}", first.0, first.1),
            format!("{},{}", second.0, second.1),
        ])
    }

    pub fn from_strings(first: String, second: String) -> Self {
        Self([first, second])
    }

    pub fn corners(&self) -> (&str, &str) {
        (&self.0[0], &self.0[1])
    }

    pub fn is_sentinel(&self) -> bool {
        self.0.iter().all(|corner| corner == Self::SENTINEL_CORNER)
    }
}

impl Default for Georeference {
    fn default() -> Self {
        Self::sentinel()
    }
}

/// One rendered image inside a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "fhour")]
    pub forecast_hour: i32,
    pub filename: String,
    #[serde(rename = "gisInfo")]
    pub georeference: Georeference,
    #[serde(with = "crate::stamp")]
    pub valid: NaiveDateTime,
}

impl Frame {
    /// Frame for an observed (non-forecast) image at `minute` past the run
    /// start. The file name is the unpadded minute plus `extension`.
    pub fn observed(
        run: RunKey,
        minute: u32,
        extension: &str,
        georeference: Georeference,
    ) -> Result<Self> {
        Ok(Self {
            forecast_hour: 0,
            filename: Self::file_name_for(minute, extension),
            georeference,
            valid: run.frame_time(minute)?,
        })
    }

    pub fn file_name_for(minute: u32, extension: &str) -> String {
        format!("{minute}.{extension}")
    }

    /// Names a renderer may have used for `minute`: unpadded (`5.png`)
    /// then zero-padded (`05.png`).
    pub fn file_name_candidates(minute: u32, extension: &str) -> Vec<String> {
        let mut names = vec![Self::file_name_for(minute, extension)];
        let padded = format!("{minute:02}.{extension}");
        if padded != names[0] {
            names.push(padded);
        }
        names
    }

    pub fn valid_stamp(&self) -> u64 {
        stamp::to_stamp(self.valid)
    }
}

/// Outcome of inserting a frame into a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMerge {
    Inserted,
    /// An identical frame was already present.
    Unchanged,
    /// A frame with the same `valid` but different content was replaced.
    Replaced,
}

/// Per-run frame list for one product (`metadata/products/<id>/<run>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRunRecord {
    #[serde(with = "crate::stamp")]
    pub publish_time: NaiveDateTime,
    pub path_extension: String,
    pub run_name: RunKey,
    #[serde(default)]
    pub available_frame_count: usize,
    #[serde(default)]
    pub total_frame_count: usize,
    #[serde(default)]
    pub product_frames: Vec<Frame>,
}

impl ProductRunRecord {
    pub fn empty(run: RunKey, publish_time: NaiveDateTime) -> Self {
        Self {
            publish_time,
            path_extension: run.path_extension(),
            run_name: run,
            available_frame_count: 0,
            total_frame_count: 0,
            product_frames: Vec::new(),
        }
    }

    pub fn run(&self) -> RunKey {
        self.run_name
    }

    pub fn frames(&self) -> &[Frame] {
        &self.product_frames
    }

    pub fn contains_valid(&self, valid: NaiveDateTime) -> bool {
        self.product_frames.iter().any(|frame| frame.valid == valid)
    }

    /// Insert keyed by `valid`: identical frames are a no-op, conflicting
    /// ones are replaced. Call [`Self::normalize`] afterwards.
    pub fn upsert_frame(&mut self, frame: Frame) -> FrameMerge {
        match self
            .product_frames
            .iter_mut()
            .find(|existing| existing.valid == frame.valid)
        {
            Some(existing) if *existing == frame => FrameMerge::Unchanged,
            Some(existing) => {
                *existing = frame;
                FrameMerge::Replaced
            }
            None => {
                self.product_frames.push(frame);
                FrameMerge::Inserted
            }
        }
    }

    /// Insert only when no frame with the same `valid` exists yet.
    pub fn insert_if_absent(&mut self, frame: Frame) -> bool {
        if self.contains_valid(frame.valid) {
            return false;
        }
        self.product_frames.push(frame);
        true
    }

    /// Sort by `valid`, collapse duplicate `valid` entries (the most recently
    /// appended wins) and refresh the frame counts.
    pub fn normalize(&mut self) {
        self.product_frames.reverse();
        self.product_frames.sort_by_key(|frame| frame.valid);
        self.product_frames.dedup_by_key(|frame| frame.valid);
        self.available_frame_count = self.product_frames.len();
        self.total_frame_count = self.product_frames.len();
    }
}

/// Current snapshot of one product (`metadata/<productID>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDescriptor {
    #[serde(rename = "productID")]
    pub product_id: ProductId,
    pub product_description: String,
    /// Output directory template relative to the output root.
    pub product_path: String,
    /// Suggested client reload interval in seconds.
    pub product_reload_time: u32,
    #[serde(with = "crate::stamp")]
    pub last_reload_time: NaiveDateTime,
    #[serde(rename = "isGIS")]
    pub is_georeferenced: bool,
    #[serde(default)]
    pub is_forecast: bool,
    pub file_extension: String,
}

/// Product type record (`metadata/<productTypeID>.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductTypeRecord {
    #[serde(rename = "productTypeID")]
    pub product_type_id: ProductTypeId,
    pub product_type_description: String,
    #[serde(default)]
    pub products: Vec<ProductDescriptor>,
}

impl ProductTypeRecord {
    pub fn new(
        product_type_id: ProductTypeId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            product_type_id,
            product_type_description: description.into(),
            products: Vec::new(),
        }
    }

    /// Replace-by-productID, then resort by productID.
    pub fn upsert(&mut self, descriptor: ProductDescriptor) {
        self.products
            .retain(|existing| existing.product_id != descriptor.product_id);
        self.products.push(descriptor);
        self.products.sort_by_key(|product| product.product_id);
    }

    pub fn descriptor(&self, id: ProductId) -> Option<&ProductDescriptor> {
        self.products.iter().find(|product| product.product_id == id)
    }
}
