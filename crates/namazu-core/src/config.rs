//! Experiment configuration
//!
//! One immutable object fixes the evaluation window, the discretization, and
//! the simulation parameters for a whole experiment run. Built once, then
//! passed by reference; nothing downstream mutates it.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{CoreError, CoreResult};
use crate::region::Region;

/// Seconds in a Julian year (365.25 days), the unit forecast rates are
/// normalized to.
const SECONDS_PER_YEAR: f64 = 365.25 * 86_400.0;

/// Fractional years between two instants.
pub fn years_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let millis = (end - start).num_milliseconds() as f64;
    millis / (SECONDS_PER_YEAR * 1000.0)
}

/// Validated, immutable experiment parameters.
#[derive(Debug, Clone)]
pub struct ExperimentConfig {
    name: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    region: Arc<Region>,
    n_simulations: usize,
    seed: Option<u64>,
}

impl ExperimentConfig {
    pub fn new(
        name: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        region: Arc<Region>,
        n_simulations: usize,
        seed: Option<u64>,
    ) -> CoreResult<Self> {
        if end <= start {
            return Err(CoreError::InvalidWindow(format!(
                "window end {end} is not after start {start}"
            )));
        }
        if n_simulations == 0 {
            return Err(CoreError::InvalidConfig(
                "simulation count must be at least 1".into(),
            ));
        }
        Ok(Self {
            name: name.into(),
            start,
            end,
            region,
            n_simulations,
            seed,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start, self.end)
    }

    /// Window length in fractional years.
    pub fn window_years(&self) -> f64 {
        years_between(self.start, self.end)
    }

    pub fn region(&self) -> &Arc<Region> {
        &self.region
    }

    pub fn n_simulations(&self) -> usize {
        self.n_simulations
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::magnitude::MagnitudeBins;
    use chrono::TimeZone;

    fn region() -> Arc<Region> {
        let bins = MagnitudeBins::regular(5.0, 7.0, 0.5).unwrap();
        Arc::new(Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins).unwrap())
    }

    #[test]
    fn test_rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        assert!(ExperimentConfig::new("x", start, end, region(), 100, None).is_err());
    }

    #[test]
    fn test_rejects_zero_simulations() {
        let start = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        assert!(ExperimentConfig::new("x", start, end, region(), 0, None).is_err());
    }

    #[test]
    fn test_window_years() {
        let start = Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2015, 1, 1, 0, 0, 0).unwrap();
        let config = ExperimentConfig::new("x", start, end, region(), 100, Some(7)).unwrap();
        let years = config.window_years();
        assert!(
            (years - 5.0).abs() < 0.01,
            "2010..2015 should be close to five years, got {years}"
        );
        assert_eq!(config.seed(), Some(7));
    }
}
