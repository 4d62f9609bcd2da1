//! # radarsync core
//!
//! Acquisition and catalog synchronization for radar scan imagery.
//!
//! A pass ([`AcquisitionController::run_once`]) lists candidate scans from a
//! mounted mirror or an HTTP index, skips scans the catalog already has,
//! stages new ones, hands them to a [`Renderer`], and records the resulting
//! frames in the JSON catalog maintained by [`CatalogStore`].
//!
//! The catalog is the only record of what has been processed. Every pass is
//! safe to rerun: catalogued scans cost a single document read.
#![allow(missing_docs)]

pub mod acquisition;
pub mod atomic;
pub mod catalog;
pub mod error;
pub mod render;
pub mod scan_name;
pub mod source;
pub mod staging;
pub mod status;
pub mod updater;

pub use acquisition::{
    AcquireVia, AcquisitionController, DispatchOutcome, PassOptions,
    PassSummary, ScanDisposition,
};
pub use catalog::{CatalogStore, RunMerge};
pub use error::{Result, SyncError};
pub use render::{
    CommandRenderer, RenderOutput, RenderRequest, RenderTarget,
    RenderedProduct, Renderer,
};
pub use scan_name::{PartitionedNames, Rejection, ScanNameParser};
pub use source::{
    HttpRemoteSource, ListingOrigin, MirrorSettings, RemoteSource,
    SourceLister, SourceListing,
};
pub use staging::{StagedScan, StagingArea};
pub use status::{
    FileStatusSink, StatusEvent, StatusLevel, StatusLog, StatusSink,
    TracingStatusSink,
};
pub use updater::{CatalogUpdate, PostRenderCatalogUpdater};
