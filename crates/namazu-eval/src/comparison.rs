//! Paired comparison of two gridded forecasts
//!
//! Scores each observed event under both forecasts and tests whether the
//! mean per-event information gain of the candidate over the baseline is
//! distinguishable from zero. The gain is corrected for the difference in
//! total expected counts, so a model cannot buy likelihood by inflating its
//! overall rate. The confidence interval comes from the Student-t
//! distribution over the per-event log-rate differences; the verdict is
//! read off the interval's position relative to zero.

use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::{info, warn};

use namazu_core::{Catalog, CoreError};

use crate::error::{EvalError, EvalResult};
use crate::forecast::{ForecastSource, GriddedForecast};
use crate::results::{ComparisonOutcome, ComparisonResult};
use crate::stats::{self, RATE_FLOOR};

pub(crate) const PAIRED_T_NAME: &str = "paired-t-test";

pub(crate) fn paired_t(
    baseline: &GriddedForecast,
    candidate: &GriddedForecast,
    catalog: &Catalog,
    significance: f64,
) -> EvalResult<ComparisonResult> {
    if !(significance > 0.0 && significance < 1.0) {
        return Err(EvalError::Stats(format!(
            "significance {significance} outside (0, 1)"
        )));
    }
    let n_obs = catalog.event_count();
    if n_obs < 2 {
        warn!(
            catalog = catalog.name(),
            events = n_obs,
            "too few events for a paired comparison"
        );
        return Ok(degenerate(baseline, candidate, catalog, n_obs, significance));
    }

    let mut diffs = Vec::with_capacity(n_obs);
    for event in catalog.events() {
        let base_rate = event_rate(baseline, event.longitude, event.latitude, event.magnitude)?;
        let cand_rate = event_rate(candidate, event.longitude, event.latitude, event.magnitude)?;
        diffs.push(cand_rate.max(RATE_FLOOR).ln() - base_rate.max(RATE_FLOOR).ln());
    }

    let n = n_obs as f64;
    let rate_correction = candidate.expected_total() - baseline.expected_total();
    let information_gain = (diffs.iter().sum::<f64>() - rate_correction) / n;

    let std_dev = stats::sample_variance(&diffs).sqrt();
    let t_critical = StudentsT::new(0.0, 1.0, n - 1.0)
        .map_err(|e| EvalError::Stats(e.to_string()))?
        .inverse_cdf(1.0 - significance / 2.0);
    let half_width = t_critical * std_dev / n.sqrt();
    // zero spread collapses the interval to a point; leave t at zero there
    let t_statistic = if std_dev > 0.0 {
        information_gain / (std_dev / n.sqrt())
    } else {
        0.0
    };

    let gain_lower = information_gain - half_width;
    let gain_upper = information_gain + half_width;
    let outcome = if gain_lower > 0.0 {
        ComparisonOutcome::CandidateFavored
    } else if gain_upper < 0.0 {
        ComparisonOutcome::BaselineFavored
    } else {
        ComparisonOutcome::Indistinguishable
    };
    info!(
        baseline = baseline.name(),
        candidate = candidate.name(),
        information_gain,
        %outcome,
        "paired comparison complete"
    );

    Ok(ComparisonResult {
        test_name: PAIRED_T_NAME.to_string(),
        baseline: baseline.name().to_string(),
        candidate: candidate.name().to_string(),
        catalog: catalog.name().to_string(),
        observed_events: n_obs,
        information_gain,
        gain_lower,
        gain_upper,
        t_statistic,
        t_critical,
        significance,
        outcome,
    })
}

fn event_rate(forecast: &GriddedForecast, lon: f64, lat: f64, magnitude: f64) -> EvalResult<f64> {
    forecast.rate_at(lon, lat, magnitude).ok_or_else(|| {
        CoreError::RegionMismatch(format!(
            "event at ({lon}, {lat}, Mw {magnitude}) falls outside forecast '{}'",
            forecast.name()
        ))
        .into()
    })
}

fn degenerate(
    baseline: &GriddedForecast,
    candidate: &GriddedForecast,
    catalog: &Catalog,
    n_obs: usize,
    significance: f64,
) -> ComparisonResult {
    ComparisonResult {
        test_name: PAIRED_T_NAME.to_string(),
        baseline: baseline.name().to_string(),
        candidate: candidate.name().to_string(),
        catalog: catalog.name().to_string(),
        observed_events: n_obs,
        information_gain: 0.0,
        gain_lower: 0.0,
        gain_upper: 0.0,
        t_statistic: 0.0,
        t_critical: 0.0,
        significance,
        outcome: ComparisonOutcome::Indistinguishable,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use namazu_core::{MagnitudeBins, Region, SeismicEvent};
    use std::sync::Arc;

    fn two_cell_region() -> Arc<Region> {
        // two cells, one open-ended magnitude bin each
        let bins = MagnitudeBins::new(vec![4.95]).unwrap();
        Arc::new(Region::rect((0.0, 2.0), (0.0, 1.0), 1.0, bins).unwrap())
    }

    fn forecast(name: &str, region: &Arc<Region>, rates: Vec<f64>) -> GriddedForecast {
        GriddedForecast::new(name, region.clone(), rates, 1.0).unwrap()
    }

    fn events_in_cell(n: usize, lon: f64) -> Catalog {
        let events = (0..n)
            .map(|i| {
                SeismicEvent::new(
                    format!("e{i}"),
                    Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap(),
                    lon,
                    0.5,
                    10.0,
                    5.2,
                )
            })
            .collect();
        Catalog::new("obs", events)
    }

    #[test]
    fn identical_forecasts_are_indistinguishable() {
        let region = two_cell_region();
        let a = forecast("a", &region, vec![1.0, 1.0]);
        let b = forecast("b", &region, vec![1.0, 1.0]);
        let result = paired_t(&a, &b, &events_in_cell(10, 0.5), 0.05).unwrap();
        assert_eq!(result.information_gain, 0.0);
        assert_eq!(result.outcome, ComparisonOutcome::Indistinguishable);
    }

    #[test]
    fn uniformly_doubled_rates_win_when_events_outpace_the_correction() {
        // gain per event is ln 2, correction is 2/10 of a unit
        let region = two_cell_region();
        let base = forecast("base", &region, vec![1.0, 1.0]);
        let cand = forecast("cand", &region, vec![2.0, 2.0]);
        let result = paired_t(&base, &cand, &events_in_cell(10, 0.5), 0.05).unwrap();
        let expected_gain = 2.0_f64.ln() - 0.2;
        assert!((result.information_gain - expected_gain).abs() < 1e-12);
        assert_eq!(result.outcome, ComparisonOutcome::CandidateFavored);
    }

    #[test]
    fn misplaced_mass_loses_to_the_baseline() {
        let region = two_cell_region();
        let base = forecast("base", &region, vec![5.0, 0.001]);
        let cand = forecast("cand", &region, vec![0.001, 5.0]);
        let result = paired_t(&base, &cand, &events_in_cell(5, 0.5), 0.05).unwrap();
        assert!(result.information_gain < 0.0);
        assert_eq!(result.outcome, ComparisonOutcome::BaselineFavored);
    }

    #[test]
    fn repeated_runs_return_equal_results() {
        let region = two_cell_region();
        let base = forecast("base", &region, vec![1.5, 0.5]);
        let cand = forecast("cand", &region, vec![0.5, 1.5]);
        let catalog = events_in_cell(7, 1.5);
        let first = paired_t(&base, &cand, &catalog, 0.05).unwrap();
        let second = paired_t(&base, &cand, &catalog, 0.05).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn single_event_catalog_degenerates_without_error() {
        let region = two_cell_region();
        let base = forecast("base", &region, vec![1.0, 1.0]);
        let cand = forecast("cand", &region, vec![2.0, 2.0]);
        let result = paired_t(&base, &cand, &events_in_cell(1, 0.5), 0.05).unwrap();
        assert_eq!(result.observed_events, 1);
        assert_eq!(result.outcome, ComparisonOutcome::Indistinguishable);
        assert_eq!(result.information_gain, 0.0);
    }

    #[test]
    fn event_outside_the_grid_is_a_region_mismatch() {
        let region = two_cell_region();
        let base = forecast("base", &region, vec![1.0, 1.0]);
        let cand = forecast("cand", &region, vec![2.0, 2.0]);
        let err = paired_t(&base, &cand, &events_in_cell(3, 99.0), 0.05).unwrap_err();
        assert!(matches!(
            err,
            EvalError::Core(CoreError::RegionMismatch(_))
        ));
    }
}
