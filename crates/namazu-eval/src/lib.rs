//! # Namazu Eval
//!
//! Evaluation engine for the namazu earthquake-forecast toolkit.
//!
//! Forecasts come in two shapes: [`GriddedForecast`] holds expected rates
//! per space-magnitude cell, [`CatalogForecast`] streams an ensemble of
//! simulated catalogs from disk. Both bind a [`namazu_core::Region`] and go
//! through the same alignment checks before any test runs.
//!
//! The pieces:
//!
//! - [`pipeline::EvaluationPipeline`]: named consistency tests (number,
//!   spatial, magnitude, likelihood) plus paired forecast comparison
//! - [`results`]: serializable [`TestResult`] and [`ComparisonResult`],
//!   persisted as JSON that round-trips exactly
//! - [`readers`]: line-oriented forecast, catalog, and ensemble formats
//! - [`client`]: blocking FDSN-style event-service access
//! - [`plot`] and [`report`]: SVG figures, then PDF assembly through
//!   external converters
//! - [`simulate`]: synthetic ensembles drawn from a gridded forecast

pub mod client;
pub mod error;
pub mod forecast;
pub mod pipeline;
pub mod plot;
pub mod readers;
pub mod report;
pub mod results;
pub mod simulate;

mod comparison;
mod consistency;
mod stats;

pub use error::{EvalError, EvalResult};
pub use forecast::{CatalogForecast, ForecastSource, GriddedForecast, SimulatedCatalog};
pub use pipeline::{check_alignment, EvaluationConfig, EvaluationPipeline};
pub use plot::{ComparisonFigure, ConsistencyFigure, FigureOptions};
pub use results::{
    ComparisonOutcome, ComparisonResult, Quantile, ReferenceDistribution, TestResult,
};
