//! symbolicate-core
//!
//! Core library for symbolicating crash and lag reports captured on Apple
//! devices by an in-app monitoring framework.
//!
//! This crate defines the report model, binary location, address-to-image
//! mapping, symbol resolution through external tools, frame classification,
//! and the walker that ties them together. The external tools sit behind the
//! traits in [`tools`] so the whole pipeline is testable without them.
//!
//! Frontends (the CLI) only load configuration, pick concrete tools, and
//! render the resulting [`walker::SymbolicationReport`].

pub mod model;
pub mod config;
pub mod tools;
pub mod locate;
pub mod images;
pub mod resolve;
pub mod classify;
pub mod walker;
pub mod render;

pub use config::SymbolicateConfig;
pub use model::Report;
pub use walker::{ReportWalker, SymbolicationReport, WalkError};

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
