//! Test registry and evaluation pipeline
//!
//! The pipeline owns the registry of named consistency tests and the run
//! policy (simulation count, significance, seeding). Before any test runs,
//! the forecast and catalog are checked for alignment: a catalog filtered
//! to a different grid, or reaching below the forecast's magnitude floor,
//! is rejected rather than silently truncated. An empty catalog is fine;
//! the tests are defined for zero observed events.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

use namazu_core::{Catalog, CoreError};

use crate::comparison;
use crate::consistency::{self, TestOutcome};
use crate::error::{EvalError, EvalResult};
use crate::forecast::{CatalogForecast, ForecastSource, GriddedForecast};
use crate::results::{ComparisonResult, Quantile, ReferenceDistribution, TestResult};
use crate::stats;

pub const DEFAULT_N_SIMULATIONS: usize = 1000;
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

const MAG_TOLERANCE: f64 = 1e-9;

/// Run policy shared by every test the pipeline executes.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Synthetic catalogs per simulation-based test, clamped to at least one.
    pub n_simulations: usize,
    pub significance: f64,
    /// Fixed seed for reproducible runs. `None` draws a fresh one per test,
    /// recorded on the result.
    pub seed: Option<u64>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            n_simulations: DEFAULT_N_SIMULATIONS,
            significance: DEFAULT_SIGNIFICANCE,
            seed: None,
        }
    }
}

enum TestKind {
    Analytic(fn(&GriddedForecast, &Catalog) -> EvalResult<TestOutcome>),
    Simulated(fn(&GriddedForecast, &Catalog, usize, &mut StdRng) -> EvalResult<TestOutcome>),
}

pub struct EvaluationPipeline {
    config: EvaluationConfig,
    tests: IndexMap<&'static str, TestKind>,
}

impl EvaluationPipeline {
    pub fn new(config: EvaluationConfig) -> Self {
        let mut tests: IndexMap<&'static str, TestKind> = IndexMap::new();
        tests.insert("number", TestKind::Analytic(consistency::number));
        tests.insert("spatial", TestKind::Simulated(consistency::spatial));
        tests.insert("magnitude", TestKind::Simulated(consistency::magnitude));
        tests.insert("likelihood", TestKind::Simulated(consistency::likelihood));
        Self { config, tests }
    }

    pub fn with_defaults() -> Self {
        Self::new(EvaluationConfig::default())
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Registered test names, in registration order.
    pub fn test_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tests.keys().copied()
    }

    /// Map a user-facing name to its registry entry. Case-insensitive;
    /// `n`, `N-test`, and `number_test` all land on `number`.
    fn lookup(&self, name: &str) -> EvalResult<(&'static str, &TestKind)> {
        let mut key = name.trim().to_ascii_lowercase().replace('_', "-");
        if let Some(stripped) = key.strip_suffix("-test") {
            key = stripped.to_string();
        }
        let key = match key.as_str() {
            "n" => "number",
            "s" => "spatial",
            "m" => "magnitude",
            "l" => "likelihood",
            other => other,
        };
        self.tests
            .get_full(key)
            .map(|(_, canonical, kind)| (*canonical, kind))
            .ok_or_else(|| EvalError::UnknownTest(name.to_string()))
    }

    /// Run one consistency test of a gridded forecast against a catalog.
    pub fn run_test(
        &self,
        name: &str,
        forecast: &GriddedForecast,
        catalog: &Catalog,
    ) -> EvalResult<TestResult> {
        let (canonical, kind) = self.lookup(name)?;
        check_alignment(forecast, catalog)?;
        if catalog.is_empty() {
            warn!(
                test = canonical,
                catalog = catalog.name(),
                "catalog has no events; the test still runs"
            );
        }

        let (outcome, n_simulations, seed) = match kind {
            TestKind::Analytic(test) => (test(forecast, catalog)?, 0, None),
            TestKind::Simulated(test) => {
                let n_simulations = self.config.n_simulations.max(1);
                let seed = self.seed_for_run();
                let mut rng = StdRng::seed_from_u64(seed);
                (
                    test(forecast, catalog, n_simulations, &mut rng)?,
                    n_simulations,
                    Some(seed),
                )
            }
        };
        info!(
            test = canonical,
            forecast = forecast.name(),
            catalog = catalog.name(),
            statistic = outcome.observed_statistic,
            "test complete"
        );
        Ok(TestResult {
            test_name: canonical.to_string(),
            forecast: forecast.name().to_string(),
            catalog: catalog.name().to_string(),
            observed_statistic: outcome.observed_statistic,
            quantile: outcome.quantile,
            distribution: outcome.distribution,
            n_simulations,
            seed,
        })
    }

    /// Run a test of a catalog-based forecast. Only the number test is
    /// defined there; the ensemble itself is the reference distribution.
    pub fn run_catalog_test(
        &self,
        name: &str,
        forecast: &CatalogForecast,
        catalog: &Catalog,
    ) -> EvalResult<TestResult> {
        let (canonical, _) = self.lookup(name)?;
        if canonical != "number" {
            return Err(EvalError::Unsupported {
                test: canonical.to_string(),
                kind: "catalog-based",
            });
        }
        check_alignment(forecast, catalog)?;
        if catalog.is_empty() {
            warn!(
                catalog = catalog.name(),
                "catalog has no events; the test still runs"
            );
        }

        let mut samples = Vec::with_capacity(forecast.n_catalogs());
        for simulated in forecast.simulations()? {
            samples.push(simulated?.events.len() as f64);
        }
        let n_obs = catalog.event_count() as f64;
        let n = samples.len() as f64;
        let delta1 = samples.iter().filter(|&&s| s >= n_obs).count() as f64 / n;
        let delta2 = stats::empirical_fraction_leq(&samples, n_obs);
        info!(
            forecast = forecast.name(),
            catalog = catalog.name(),
            observed = n_obs,
            delta1,
            delta2,
            "catalog number test complete"
        );
        Ok(TestResult {
            test_name: canonical.to_string(),
            forecast: forecast.name().to_string(),
            catalog: catalog.name().to_string(),
            observed_statistic: n_obs,
            quantile: Quantile::TwoSided { delta1, delta2 },
            distribution: ReferenceDistribution::Empirical { samples },
            n_simulations: forecast.n_catalogs(),
            seed: None,
        })
    }

    /// Paired comparison of two gridded forecasts over the same catalog.
    pub fn compare(
        &self,
        baseline: &GriddedForecast,
        candidate: &GriddedForecast,
        catalog: &Catalog,
    ) -> EvalResult<ComparisonResult> {
        if baseline.region().as_ref() != candidate.region().as_ref() {
            return Err(CoreError::RegionMismatch(format!(
                "forecasts '{}' and '{}' use different grids",
                baseline.name(),
                candidate.name()
            ))
            .into());
        }
        check_alignment(baseline, catalog)?;
        check_alignment(candidate, catalog)?;
        comparison::paired_t(baseline, candidate, catalog, self.config.significance)
    }

    fn seed_for_run(&self) -> u64 {
        self.config.seed.unwrap_or_else(rand::random)
    }
}

/// Reject forecast-catalog pairs that do not share a grid and magnitude
/// floor.
///
/// A catalog that was filtered to a region must match the forecast's region
/// structurally; an unfiltered catalog is checked event by event. Same for
/// the magnitude floor: a recorded threshold must not reach below the
/// forecast's lowest bin edge.
pub fn check_alignment(forecast: &dyn ForecastSource, catalog: &Catalog) -> EvalResult<()> {
    let fregion = forecast.region();
    match catalog.region() {
        Some(cregion) => {
            if cregion.as_ref() != fregion.as_ref() {
                return Err(CoreError::RegionMismatch(format!(
                    "catalog '{}' grid ({} cells) differs from forecast '{}' grid ({} cells)",
                    catalog.name(),
                    cregion.cell_count(),
                    forecast.name(),
                    fregion.cell_count()
                ))
                .into());
            }
        }
        None => {
            for event in catalog.events() {
                if !fregion.contains(event.longitude, event.latitude) {
                    return Err(CoreError::RegionMismatch(format!(
                        "event '{}' at ({}, {}) falls outside forecast '{}'",
                        event.id, event.longitude, event.latitude,
                        forecast.name()
                    ))
                    .into());
                }
            }
        }
    }

    let floor = forecast.min_magnitude();
    match catalog.min_magnitude() {
        Some(threshold) => {
            if threshold < floor - MAG_TOLERANCE {
                return Err(CoreError::MagnitudeRange(format!(
                    "catalog '{}' threshold Mw {threshold} reaches below forecast minimum Mw {floor}",
                    catalog.name()
                ))
                .into());
            }
        }
        None => {
            for event in catalog.events() {
                if event.magnitude < floor - MAG_TOLERANCE {
                    return Err(CoreError::MagnitudeRange(format!(
                        "event '{}' Mw {} is below forecast minimum Mw {floor}",
                        event.id, event.magnitude
                    ))
                    .into());
                }
            }
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
