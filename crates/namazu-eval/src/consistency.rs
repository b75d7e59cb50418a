//! Consistency tests for gridded forecasts
//!
//! The number test is analytic: the observed event count is scored against
//! the Poisson distribution whose rate is the forecast's expected total.
//! The likelihood, spatial, and magnitude tests condition on the observed
//! count instead: `n_obs` synthetic events are dropped onto the grid in
//! proportion to the forecast rates, each synthetic catalog is scored with
//! the joint Poisson log-likelihood, and the observed score's rank in that
//! empirical distribution is the test quantile. A low one-sided `gamma`
//! means the data look unlike the forecast.

use rand::Rng;
use statrs::distribution::{DiscreteCDF, Poisson};
use tracing::debug;

use namazu_core::Catalog;

use crate::error::{EvalError, EvalResult};
use crate::forecast::{ForecastSource, GriddedForecast};
use crate::results::{Quantile, ReferenceDistribution};
use crate::stats::{self, CumulativeWeights};

/// Raw outcome of one test, before the pipeline packages it.
#[derive(Debug)]
pub(crate) struct TestOutcome {
    pub observed_statistic: f64,
    pub quantile: Quantile,
    pub distribution: ReferenceDistribution,
}

/// N-test. Two-sided Poisson quantiles of the observed count.
pub(crate) fn number(forecast: &GriddedForecast, catalog: &Catalog) -> EvalResult<TestOutcome> {
    let expected = forecast.expected_total();
    let n_obs = catalog.event_count() as u64;
    let poisson =
        Poisson::new(expected.max(stats::RATE_FLOOR)).map_err(|e| EvalError::Stats(e.to_string()))?;
    let delta2 = poisson.cdf(n_obs);
    let delta1 = if n_obs == 0 {
        1.0
    } else {
        1.0 - poisson.cdf(n_obs - 1)
    };
    debug!(expected, n_obs, delta1, delta2, "number test");
    Ok(TestOutcome {
        observed_statistic: n_obs as f64,
        quantile: Quantile::TwoSided { delta1, delta2 },
        distribution: ReferenceDistribution::Poisson { rate: expected },
    })
}

/// L-test over the full space-magnitude grid.
pub(crate) fn likelihood<R: Rng>(
    forecast: &GriddedForecast,
    catalog: &Catalog,
    n_simulations: usize,
    rng: &mut R,
) -> EvalResult<TestOutcome> {
    conditional(
        forecast.expected_counts(),
        catalog.gridded_counts(forecast.region()),
        n_simulations,
        rng,
    )
}

/// S-test over rates summed across magnitude bins.
pub(crate) fn spatial<R: Rng>(
    forecast: &GriddedForecast,
    catalog: &Catalog,
    n_simulations: usize,
    rng: &mut R,
) -> EvalResult<TestOutcome> {
    conditional(
        forecast.spatial_expected(),
        catalog.spatial_counts(forecast.region()),
        n_simulations,
        rng,
    )
}

/// M-test over rates summed across cells.
pub(crate) fn magnitude<R: Rng>(
    forecast: &GriddedForecast,
    catalog: &Catalog,
    n_simulations: usize,
    rng: &mut R,
) -> EvalResult<TestOutcome> {
    conditional(
        forecast.magnitude_expected(),
        catalog.magnitude_counts(forecast.region()),
        n_simulations,
        rng,
    )
}

/// Shared core of the simulation-based tests.
///
/// Rates are rescaled so their total matches the observed count, which
/// isolates the shape of the forecast from its overall rate.
fn conditional<R: Rng>(
    expected: Vec<f64>,
    observed: Vec<u64>,
    n_simulations: usize,
    rng: &mut R,
) -> EvalResult<TestOutcome> {
    debug_assert_eq!(expected.len(), observed.len());
    let n_obs: u64 = observed.iter().sum();

    let scaled = stats::scale_to_total(&expected, n_obs as f64);
    let observed_score = stats::poisson_log_likelihood(&observed, &scaled);

    let weights = CumulativeWeights::new(&expected)
        .ok_or_else(|| EvalError::EmptyForecast("no forecast mass to sample from".to_string()))?;

    let mut samples = Vec::with_capacity(n_simulations);
    let mut counts = vec![0u64; expected.len()];
    for _ in 0..n_simulations {
        counts.fill(0);
        for _ in 0..n_obs {
            counts[weights.sample_index(rng)] += 1;
        }
        samples.push(stats::poisson_log_likelihood(&counts, &scaled));
    }

    let gamma = stats::empirical_fraction_leq(&samples, observed_score);
    debug!(n_obs, observed_score, gamma, "conditional simulation test");
    Ok(TestOutcome {
        observed_statistic: observed_score,
        quantile: Quantile::OneSided { gamma },
        distribution: ReferenceDistribution::Empirical { samples },
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use namazu_core::{MagnitudeBins, Region, SeismicEvent};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn one_cell_forecast(rate: f64) -> GriddedForecast {
        // single open-ended magnitude bin from Mw 4.95
        let bins = MagnitudeBins::new(vec![4.95]).unwrap();
        let region =
            Arc::new(Region::rect((0.0, 1.0), (0.0, 1.0), 1.0, bins).unwrap());
        GriddedForecast::new("one-cell", region, vec![rate], 1.0).unwrap()
    }

    fn catalog_of(n: usize) -> Catalog {
        let events = (0..n)
            .map(|i| {
                SeismicEvent::new(
                    format!("e{i}"),
                    Utc.with_ymd_and_hms(2012, 1, 1, 0, 0, 0).unwrap(),
                    0.5,
                    0.5,
                    10.0,
                    5.2,
                )
            })
            .collect();
        Catalog::new("synthetic", events)
    }

    #[test]
    fn number_test_reports_the_raw_count() {
        let outcome = number(&one_cell_forecast(5.0), &catalog_of(13)).unwrap();
        assert_eq!(outcome.observed_statistic, 13.0);
    }

    #[test]
    fn number_test_flags_a_surplus_of_events() {
        // 13 observed against an expectation of 5 is a clear excess
        let outcome = number(&one_cell_forecast(5.0), &catalog_of(13)).unwrap();
        match outcome.quantile {
            Quantile::TwoSided { delta1, delta2 } => {
                assert!(delta1 < 0.01, "P(N >= 13 | 5) should be small, got {delta1}");
                assert!(delta2 > 0.99, "P(N <= 13 | 5) should be large, got {delta2}");
            }
            other => panic!("unexpected quantile {other:?}"),
        }
    }

    #[test]
    fn number_test_with_no_events() {
        let outcome = number(&one_cell_forecast(2.0), &catalog_of(0)).unwrap();
        assert_eq!(outcome.observed_statistic, 0.0);
        match outcome.quantile {
            Quantile::TwoSided { delta1, .. } => assert_eq!(delta1, 1.0),
            other => panic!("unexpected quantile {other:?}"),
        }
    }

    #[test]
    fn conditional_is_deterministic_under_a_fixed_seed() {
        let expected = vec![2.0, 1.0, 0.5, 0.1];
        let observed = vec![3, 1, 0, 0];
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let first = conditional(expected.clone(), observed.clone(), 100, &mut a).unwrap();
        let second = conditional(expected, observed, 100, &mut b).unwrap();
        assert_eq!(first.observed_statistic, second.observed_statistic);
        assert_eq!(first.quantile, second.quantile);
        assert_eq!(first.distribution, second.distribution);
    }

    #[test]
    fn concentrated_mass_pins_every_sample_to_the_observation() {
        // all forecast mass in one bin forces simulations to reproduce it
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = conditional(vec![0.0, 4.0, 0.0], vec![0, 3, 0], 50, &mut rng).unwrap();
        match outcome.quantile {
            Quantile::OneSided { gamma } => assert_eq!(gamma, 1.0),
            other => panic!("unexpected quantile {other:?}"),
        }
    }

    #[test]
    fn events_far_from_the_mass_score_poorly() {
        let mut rng = StdRng::seed_from_u64(7);
        let outcome = conditional(vec![10.0, 0.001], vec![0, 5], 200, &mut rng).unwrap();
        match outcome.quantile {
            Quantile::OneSided { gamma } => {
                assert!(gamma < 0.05, "expected a failing quantile, got {gamma}")
            }
            other => panic!("unexpected quantile {other:?}"),
        }
    }

    #[test]
    fn all_zero_rates_are_rejected() {
        let mut rng = StdRng::seed_from_u64(7);
        let err = conditional(vec![0.0, 0.0], vec![1, 0], 10, &mut rng).unwrap_err();
        assert!(matches!(err, EvalError::EmptyForecast(_)));
    }
}
