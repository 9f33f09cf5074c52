//! canon-core library.
//!
//! Timeline model, knowledge projector and cross-file consistency checks for
//! a serialized-fiction records dataset.

pub mod config;
pub mod error;
pub mod io;
pub mod maintenance;
pub mod model;
pub mod projection;
pub mod records;
pub mod report;
pub mod timeline;
pub mod verify;
pub mod walk;

/// # Conventions
///
/// - **Errors**: `thiserror` enums for loader failures (`TimelineError`,
///   `ProjectionError`, `JsonFileError`); `anyhow::Result` for config and
///   maintenance entry points.
/// - **Findings**: referential problems are never errors. They are
///   `report::Violation` values accumulated in a `report::Report`.
/// - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).
pub use error::{ProjectionError, TimelineError};
pub use report::{Check, Report, Severity, Violation};
