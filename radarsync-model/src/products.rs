//! Static product table.
//!
//! Each rendered field forms a family: a base product plus its companions
//! (georeferenced and static renderings). Companion ids are listed
//! explicitly here instead of being derived from the base id.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::catalog::{Frame, ProductDescriptor, ProductTypeRecord};
use crate::ids::{ProductId, ProductTypeId};
use crate::scan::RunKey;

/// Image extension of every product in the table.
pub const FRAME_EXTENSION: &str = "png";

/// Base of the family used to decide whether a scan is already catalogued.
pub const PRIMARY_PRODUCT: ProductId = ProductId::new(120);

/// Where a product's images live and whether they carry map bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Transparent, map-aligned image for GIS-aware clients.
    Georeferenced,
    /// Fully decorated static image (title, colorbar, counties).
    Static,
}

impl OutputKind {
    pub fn root_dir(self) -> &'static str {
        match self {
            OutputKind::Georeferenced => "gisproducts",
            OutputKind::Static => "products",
        }
    }

    pub fn is_georeferenced(self) -> bool {
        matches!(self, OutputKind::Georeferenced)
    }
}

/// Transform applied to the radar field before rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    Raw,
    /// Reflectivity gated on signal quality, then despeckled. Only available
    /// when the scan carries normalized coherent power.
    SqiFiltered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductTypeSpec {
    pub id: ProductTypeId,
    pub description: &'static str,
}

impl ProductTypeSpec {
    pub fn empty_record(&self) -> ProductTypeRecord {
        ProductTypeRecord::new(self.id, self.description)
    }
}

/// Product type every table entry belongs to.
pub const PRODUCT_TYPE: ProductTypeSpec = ProductTypeSpec {
    id: ProductTypeId::new(3),
    description: "ADRAD Radar",
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductSpec {
    pub id: ProductId,
    pub description: &'static str,
    pub kind: OutputKind,
    pub reload_interval_secs: u32,
}

impl ProductSpec {
    /// Output directory template relative to the output root, e.g.
    /// `gisproducts/radar/ADRAD/120/`.
    pub fn output_path(&self) -> String {
        format!("{}/radar/ADRAD/{}/", self.kind.root_dir(), self.id)
    }

    /// Directory holding one run's images.
    pub fn run_dir(&self, output_root: &Path, run: RunKey) -> PathBuf {
        output_root
            .join(self.output_path())
            .join(run.path_extension())
    }

    /// Expected image path for `minute` past the run start.
    pub fn frame_path(
        &self,
        output_root: &Path,
        run: RunKey,
        minute: u32,
    ) -> PathBuf {
        self.run_dir(output_root, run)
            .join(Frame::file_name_for(minute, FRAME_EXTENSION))
    }

    pub fn descriptor(&self, last_reload: NaiveDateTime) -> ProductDescriptor {
        ProductDescriptor {
            product_id: self.id,
            product_description: self.description.to_string(),
            product_path: self.output_path(),
            product_reload_time: self.reload_interval_secs,
            last_reload_time: last_reload,
            is_georeferenced: self.kind.is_georeferenced(),
            is_forecast: false,
            file_extension: FRAME_EXTENSION.to_string(),
        }
    }
}

/// One rendered radar field and every product derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductFamily {
    pub base: ProductId,
    /// Field name handed to the renderer.
    pub field: &'static str,
    pub units: &'static str,
    pub transform: FieldTransform,
    pub products: &'static [ProductSpec],
}

impl ProductFamily {
    pub fn product(&self, id: ProductId) -> Option<&'static ProductSpec> {
        self.products.iter().find(|spec| spec.id == id)
    }

    /// Products to render, honoring the skip-georeferenced toggle.
    pub fn selected(
        &self,
        skip_georeferenced: bool,
    ) -> impl Iterator<Item = &'static ProductSpec> + use<> {
        let products: &'static [ProductSpec] = self.products;
        products
            .iter()
            .filter(move |spec| !(skip_georeferenced && spec.kind.is_georeferenced()))
    }
}

pub static PRODUCT_FAMILIES: &[ProductFamily] = &[
    ProductFamily {
        base: ProductId::new(120),
        field: "Reflectivity",
        units: "dBZ",
        transform: FieldTransform::Raw,
        products: &[
            ProductSpec {
                id: ProductId::new(120),
                description: "ADRAD Reflectivity",
                kind: OutputKind::Georeferenced,
                reload_interval_secs: 60,
            },
            ProductSpec {
                id: ProductId::new(121),
                description: "ADRAD Reflectivity",
                kind: OutputKind::Static,
                reload_interval_secs: 60,
            },
        ],
    },
    ProductFamily {
        base: ProductId::new(122),
        field: "Reflectivity_Filtered",
        units: "dBZ",
        transform: FieldTransform::SqiFiltered,
        products: &[
            ProductSpec {
                id: ProductId::new(122),
                description: "ADRAD Reflectivity (SQI filtered)",
                kind: OutputKind::Georeferenced,
                reload_interval_secs: 60,
            },
            ProductSpec {
                id: ProductId::new(123),
                description: "ADRAD Reflectivity (SQI filtered)",
                kind: OutputKind::Static,
                reload_interval_secs: 60,
            },
        ],
    },
    ProductFamily {
        base: ProductId::new(125),
        field: "Velocity",
        units: "m/s",
        transform: FieldTransform::Raw,
        products: &[
            ProductSpec {
                id: ProductId::new(125),
                description: "ADRAD Velocity",
                kind: OutputKind::Georeferenced,
                reload_interval_secs: 60,
            },
            ProductSpec {
                id: ProductId::new(126),
                description: "ADRAD Velocity",
                kind: OutputKind::Static,
                reload_interval_secs: 60,
            },
        ],
    },
];

pub fn family(base: ProductId) -> Option<&'static ProductFamily> {
    PRODUCT_FAMILIES.iter().find(|family| family.base == base)
}

/// Look up any product, base or companion.
pub fn product(id: ProductId) -> Option<&'static ProductSpec> {
    PRODUCT_FAMILIES
        .iter()
        .find_map(|family| family.product(id))
}

/// Family a product belongs to.
pub fn family_of(id: ProductId) -> Option<&'static ProductFamily> {
    PRODUCT_FAMILIES
        .iter()
        .find(|family| family.product(id).is_some())
}
