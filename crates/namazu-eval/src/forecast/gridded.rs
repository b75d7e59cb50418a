//! Gridded rate forecasts

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use namazu_core::config::years_between;
use namazu_core::{CoreError, Region};

use crate::error::{EvalError, EvalResult};
use crate::forecast::ForecastSource;
use crate::readers;

/// Expected earthquake rates over (cell, magnitude bin), row-major.
///
/// Rates are stored as loaded, normalized to the forecast's native horizon.
/// The active evaluation window is the one adjustable part: setting it
/// rescales every expected count by `window / horizon` without touching the
/// stored rates.
#[derive(Debug, Clone)]
pub struct GriddedForecast {
    name: String,
    region: Arc<Region>,
    rates: Vec<f64>,
    horizon_years: f64,
    window_years: Option<f64>,
}

impl GriddedForecast {
    pub fn new(
        name: impl Into<String>,
        region: Arc<Region>,
        rates: Vec<f64>,
        horizon_years: f64,
    ) -> EvalResult<Self> {
        let name = name.into();
        let expected_len = region.cell_count() * region.bin_count();
        if rates.len() != expected_len {
            return Err(EvalError::InvalidForecast(format!(
                "'{name}': {} rates for {} (cell, bin) pairs",
                rates.len(),
                expected_len
            )));
        }
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(EvalError::InvalidForecast(format!(
                "'{name}': rates must be finite and non-negative"
            )));
        }
        if !horizon_years.is_finite() || horizon_years <= 0.0 {
            return Err(EvalError::InvalidForecast(format!(
                "'{name}': invalid horizon {horizon_years} years"
            )));
        }
        if rates.iter().sum::<f64>() <= 0.0 {
            return Err(EvalError::EmptyForecast(name));
        }
        Ok(Self {
            name,
            region,
            rates,
            horizon_years,
            window_years: None,
        })
    }

    /// Load from a gridded-rate file, taking the spatial geometry from the
    /// file itself. See [`readers`] for the format.
    pub fn load(
        path: &Path,
        bins: namazu_core::MagnitudeBins,
        horizon_years: f64,
    ) -> EvalResult<Self> {
        readers::load_gridded_forecast(path, bins, horizon_years)
    }

    /// Load and require the file's geometry to match `region` exactly.
    pub fn load_with_region(
        path: &Path,
        region: Arc<Region>,
        horizon_years: f64,
    ) -> EvalResult<Self> {
        readers::load_gridded_forecast_with_region(path, region, horizon_years)
    }

    /// Set the active evaluation window. Expected counts are scaled by the
    /// ratio of this window to the native horizon.
    pub fn set_window(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> EvalResult<()> {
        let years = years_between(start, end);
        if years <= 0.0 {
            return Err(CoreError::InvalidWindow(format!(
                "window end {end} is not after start {start}"
            ))
            .into());
        }
        self.window_years = Some(years);
        Ok(())
    }

    /// Ratio applied to stored rates: active window over native horizon,
    /// 1.0 when no window is set.
    pub fn scaling(&self) -> f64 {
        match self.window_years {
            Some(w) => w / self.horizon_years,
            None => 1.0,
        }
    }

    /// Expected counts per (cell, bin) for the active window.
    pub fn expected_counts(&self) -> Vec<f64> {
        let s = self.scaling();
        self.rates.iter().map(|r| r * s).collect()
    }

    pub fn expected_total(&self) -> f64 {
        self.rates.iter().sum::<f64>() * self.scaling()
    }

    /// Expected counts per cell, summed over magnitude bins.
    pub fn spatial_expected(&self) -> Vec<f64> {
        let bin_count = self.region.bin_count();
        let s = self.scaling();
        let mut out = vec![0.0; self.region.cell_count()];
        for (i, r) in self.rates.iter().enumerate() {
            out[i / bin_count] += r * s;
        }
        out
    }

    /// Expected counts per magnitude bin, summed over cells.
    pub fn magnitude_expected(&self) -> Vec<f64> {
        let bin_count = self.region.bin_count();
        let s = self.scaling();
        let mut out = vec![0.0; bin_count];
        for (i, r) in self.rates.iter().enumerate() {
            out[i % bin_count] += r * s;
        }
        out
    }

    /// Expected rate for the (cell, bin) containing a point, `None` outside
    /// the region or below the first bin edge.
    pub fn rate_at(&self, lon: f64, lat: f64, magnitude: f64) -> Option<f64> {
        let cell = self.region.cell_index_of(lon, lat)?;
        let bin = self.region.bins().index_of(magnitude)?;
        Some(self.rates[cell * self.region.bin_count() + bin] * self.scaling())
    }

    pub fn rates(&self) -> &[f64] {
        &self.rates
    }

    pub fn horizon_years(&self) -> f64 {
        self.horizon_years
    }

    pub fn window_years(&self) -> Option<f64> {
        self.window_years
    }
}

impl ForecastSource for GriddedForecast {
    fn name(&self) -> &str {
        &self.name
    }

    fn region(&self) -> &Arc<Region> {
        &self.region
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use namazu_core::MagnitudeBins;

    fn region() -> Arc<Region> {
        let bins = MagnitudeBins::regular(5.0, 6.0, 0.5).unwrap();
        Arc::new(Region::rect((10.0, 11.0), (40.0, 41.0), 0.5, bins).unwrap())
    }

    fn rates() -> Vec<f64> {
        // 4 cells x 3 bins
        vec![
            0.4, 0.2, 0.1, //
            0.3, 0.1, 0.0, //
            0.2, 0.1, 0.1, //
            0.1, 0.0, 0.0, //
        ]
    }

    #[test]
    fn test_new_validates_rate_length() {
        let err = GriddedForecast::new("f", region(), vec![1.0; 5], 1.0);
        assert!(matches!(err, Err(EvalError::InvalidForecast(_))));
    }

    #[test]
    fn test_new_rejects_negative_rates() {
        let mut r = rates();
        r[3] = -0.1;
        assert!(GriddedForecast::new("f", region(), r, 1.0).is_err());
    }

    #[test]
    fn test_new_rejects_all_zero() {
        let err = GriddedForecast::new("f", region(), vec![0.0; 12], 1.0);
        assert!(matches!(err, Err(EvalError::EmptyForecast(_))));
    }

    #[test]
    fn test_expected_total_unscaled() {
        let f = GriddedForecast::new("f", region(), rates(), 1.0).unwrap();
        assert!((f.expected_total() - 1.6).abs() < 1e-12);
        assert_eq!(f.scaling(), 1.0);
    }

    #[test]
    fn test_window_rescales_expectations() {
        let mut f = GriddedForecast::new("f", region(), rates(), 1.0).unwrap();
        let start = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        f.set_window(start, end).unwrap();

        let s = f.scaling();
        assert!((s - 5.0).abs() < 0.01, "five-year window, got {s}");
        assert!((f.expected_total() - 1.6 * s).abs() < 1e-9);
    }

    #[test]
    fn test_set_window_rejects_inverted() {
        let mut f = GriddedForecast::new("f", region(), rates(), 1.0).unwrap();
        let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert!(f.set_window(start, end).is_err());
    }

    #[test]
    fn test_marginals_sum_to_total() {
        let f = GriddedForecast::new("f", region(), rates(), 1.0).unwrap();
        let spatial: f64 = f.spatial_expected().iter().sum();
        let magnitude: f64 = f.magnitude_expected().iter().sum();
        assert!((spatial - f.expected_total()).abs() < 1e-12);
        assert!((magnitude - f.expected_total()).abs() < 1e-12);
    }

    #[test]
    fn test_rate_at() {
        let f = GriddedForecast::new("f", region(), rates(), 1.0).unwrap();
        assert_eq!(f.rate_at(10.1, 40.1, 5.0), Some(0.4));
        assert_eq!(f.rate_at(10.6, 40.1, 5.7), Some(0.1));
        assert_eq!(f.rate_at(10.1, 40.1, 4.5), None, "below first bin edge");
        assert_eq!(f.rate_at(20.0, 40.1, 5.0), None, "outside region");
    }
}
