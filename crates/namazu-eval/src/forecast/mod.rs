//! Forecast sources
//!
//! Two kinds of forecast are supported: gridded rate maps and catalog-based
//! forecasts backed by files of simulated synthetic catalogs. Both are bound
//! to a [`Region`] at load time; the evaluation pipeline refuses to test a
//! forecast against a catalog filtered to any other region.

mod catalog;
mod gridded;

pub use catalog::{CatalogForecast, SimulatedCatalog};
pub use gridded::GriddedForecast;

use std::sync::Arc;

use namazu_core::Region;

/// Common surface of the two forecast kinds, used by the pipeline's
/// precondition checks.
pub trait ForecastSource {
    fn name(&self) -> &str;

    fn region(&self) -> &Arc<Region>;

    /// Lowest magnitude the forecast models (its first bin edge). Catalogs
    /// reaching below this cannot be scored.
    fn min_magnitude(&self) -> f64 {
        self.region().bins().lowest()
    }
}
