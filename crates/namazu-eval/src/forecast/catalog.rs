//! Catalog-based forecasts
//!
//! A catalog-based forecast is a file of simulated synthetic catalogs, often
//! far too large to hold in memory. Opening one validates the header only;
//! the simulations are streamed on demand, and every pass re-applies the
//! filters configured at that moment, so a window or magnitude change between
//! passes takes effect on the next iteration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use namazu_core::config::years_between;
use namazu_core::{CoreError, Region, SeismicEvent};

use crate::error::{EvalError, EvalResult};
use crate::forecast::ForecastSource;
use crate::readers::{self, SimulationReader};

/// One simulated synthetic catalog out of a forecast's ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedCatalog {
    pub index: usize,
    pub events: Vec<SeismicEvent>,
}

/// Forecast expressed as an ensemble of simulated catalogs on disk.
#[derive(Debug, Clone)]
pub struct CatalogForecast {
    name: String,
    region: Arc<Region>,
    path: PathBuf,
    n_catalogs: usize,
    horizon_years: f64,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    min_magnitude: Option<f64>,
}

impl CatalogForecast {
    /// Open a simulated-catalog file. Only the header is read; event rows are
    /// streamed later by [`simulations`](Self::simulations).
    pub fn open(path: &Path, region: Arc<Region>, horizon_years: f64) -> EvalResult<Self> {
        if !horizon_years.is_finite() || horizon_years <= 0.0 {
            return Err(EvalError::InvalidForecast(format!(
                "invalid horizon {horizon_years} years"
            )));
        }
        let n_catalogs = readers::read_simulation_header(path)?;
        if n_catalogs == 0 {
            return Err(EvalError::InvalidForecast(format!(
                "{}: ensemble declares zero catalogs",
                path.display()
            )));
        }
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("catalog-forecast")
            .to_string();
        debug!(forecast = %name, catalogs = n_catalogs, "opened simulated-catalog ensemble");
        Ok(Self {
            name,
            region,
            path: path.to_path_buf(),
            n_catalogs,
            horizon_years,
            window: None,
            min_magnitude: None,
        })
    }

    /// Set the active evaluation window. Applies to the next
    /// [`simulations`](Self::simulations) pass.
    pub fn set_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> EvalResult<()> {
        if years_between(start, end) <= 0.0 {
            return Err(CoreError::InvalidWindow(format!(
                "window end {end} is not after start {start}"
            ))
            .into());
        }
        self.window = Some((start, end));
        Ok(())
    }

    /// Drop simulated events below `min_magnitude` on future passes.
    pub fn set_min_magnitude(&mut self, min_magnitude: f64) {
        self.min_magnitude = Some(min_magnitude);
    }

    /// Number of catalogs the ensemble declares, counting empty ones.
    pub fn n_catalogs(&self) -> usize {
        self.n_catalogs
    }

    pub fn horizon_years(&self) -> f64 {
        self.horizon_years
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the ensemble from disk, one filtered catalog per step, in
    /// ascending index order with empty catalogs included. Each call starts a
    /// fresh pass under the filters configured right now.
    pub fn simulations(&self) -> EvalResult<SimulationReader> {
        SimulationReader::open(
            &self.path,
            self.region.clone(),
            self.window,
            self.min_magnitude,
        )
    }

    /// Mean event counts per (cell, bin) across the ensemble, materialized by
    /// streaming the file once.
    pub fn expected_counts(&self) -> EvalResult<Vec<f64>> {
        let mut sums = vec![0u64; self.region.cell_count() * self.region.bin_count()];
        let bin_count = self.region.bin_count();
        for sim in self.simulations()? {
            let sim = sim?;
            for event in &sim.events {
                let cell = self.region.cell_index_of(event.longitude, event.latitude);
                let bin = self.region.bins().index_of(event.magnitude);
                if let (Some(ci), Some(bi)) = (cell, bin) {
                    sums[ci * bin_count + bi] += 1;
                }
            }
        }
        let n = self.n_catalogs as f64;
        Ok(sums.into_iter().map(|s| s as f64 / n).collect())
    }

    /// Mean event count across the ensemble.
    pub fn expected_total(&self) -> EvalResult<f64> {
        let mut total = 0u64;
        for sim in self.simulations()? {
            total += sim?.events.len() as u64;
        }
        Ok(total as f64 / self.n_catalogs as f64)
    }
}

impl ForecastSource for CatalogForecast {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &Arc<Region> {
        &self.region
    }
}
