//! Single-pass radar scan synchronization.
//!
//! The binary in `main.rs` is a thin shell around [`app::run`] so the CLI
//! surface and the wiring can be exercised from tests.

pub mod app;
pub mod cli;
