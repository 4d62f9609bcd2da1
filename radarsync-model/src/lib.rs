//! Core data model definitions shared across radarsync crates.
//!
//! The catalog types in [`catalog`] serialize to the exact JSON layout that
//! downstream consumers read (`productFrames`, `gisInfo`, integer
//! `YYYYMMDDHHMM` timestamps), so field renames here are wire changes.
#![allow(missing_docs)]

pub use ::chrono;

pub mod catalog;
pub mod error;
pub mod ids;
pub mod products;
pub mod scan;
pub mod stamp;

pub use catalog::{
    Frame, FrameMerge, Georeference, ProductDescriptor, ProductRunRecord,
    ProductTypeRecord,
};
pub use error::{ModelError, Result as ModelResult};
pub use ids::{ProductId, ProductTypeId};
pub use products::{
    FRAME_EXTENSION, FieldTransform, OutputKind, PRIMARY_PRODUCT, PRODUCT_FAMILIES,
    PRODUCT_TYPE, ProductFamily, ProductSpec, ProductTypeSpec, family,
    family_of, product,
};
pub use scan::{RunKey, ScanKey};
