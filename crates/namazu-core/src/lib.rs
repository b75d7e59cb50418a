//! # Namazu Core
//!
//! Foundational types for the namazu earthquake-forecast evaluation toolkit.
//!
//! This crate defines the data model the whole workspace is built on:
//!
//! - [`Region`]: ordered spatial cells plus magnitude bins; the shared
//!   discretization that makes forecasts and catalogs jointly testable
//! - [`MagnitudeBins`]: lower-inclusive magnitude edges, open-ended at the top
//! - [`SeismicEvent`] and [`Catalog`]: observed events with pure, composable
//!   filters over time, magnitude, and space
//! - [`ExperimentConfig`]: validated, immutable experiment parameters
//! - [`CoreError`]: shared error vocabulary (format, region mismatch,
//!   magnitude range)
//!
//! Evaluation logic, file formats, and reporting live in `namazu-eval`; the
//! batch driver lives in `namazu-cli`.

pub mod catalog;
pub mod config;
pub mod error;
pub mod event;
pub mod magnitude;
pub mod region;

pub use catalog::{Catalog, CatalogSummary};
pub use config::ExperimentConfig;
pub use error::{CoreError, CoreResult};
pub use event::SeismicEvent;
pub use magnitude::MagnitudeBins;
pub use region::{Bounds, Cell, Region};
