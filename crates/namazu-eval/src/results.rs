//! Evaluation results and their JSON persistence
//!
//! Results hold plain finite numbers only, so a serialized result
//! deserializes back to a value equal to the original. Scores are floored
//! away from negative infinity before they get here.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Where the observed statistic sits in the reference distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Quantile {
    /// Both tails, as for the number test.
    TwoSided { delta1: f64, delta2: f64 },
    /// Lower tail only, as for the simulation-based tests.
    OneSided { gamma: f64 },
}

/// The distribution the observation was ranked against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceDistribution {
    Poisson { rate: f64 },
    Empirical { samples: Vec<f64> },
}

/// Outcome of one consistency test run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_name: String,
    pub forecast: String,
    pub catalog: String,
    pub observed_statistic: f64,
    pub quantile: Quantile,
    pub distribution: ReferenceDistribution,
    /// Simulations drawn for the reference distribution, 0 when analytic.
    pub n_simulations: usize,
    /// Seed the simulations ran under, `None` when analytic.
    pub seed: Option<u64>,
}

impl TestResult {
    /// Whether the forecast passes at significance `alpha`.
    ///
    /// Two-sided quantiles split `alpha` across the tails; one-sided
    /// quantiles fail only in the lower tail.
    pub fn is_consistent(&self, alpha: f64) -> bool {
        match self.quantile {
            Quantile::TwoSided { delta1, delta2 } => {
                delta1 >= alpha / 2.0 && delta2 >= alpha / 2.0
            }
            Quantile::OneSided { gamma } => gamma >= alpha,
        }
    }

    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> EvalResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_json(&self, path: &Path) -> EvalResult<()> {
        write_json_file(path, self)
    }

    pub fn read_json(path: &Path) -> EvalResult<Self> {
        read_json_file(path)
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} vs {} | statistic {}",
            self.test_name, self.forecast, self.catalog, self.observed_statistic
        )?;
        match self.quantile {
            Quantile::TwoSided { delta1, delta2 } => {
                write!(f, " | delta1 {delta1:.4} delta2 {delta2:.4}")
            }
            Quantile::OneSided { gamma } => write!(f, " | gamma {gamma:.4}"),
        }
    }
}

/// Verdict of a paired comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOutcome {
    CandidateFavored,
    BaselineFavored,
    Indistinguishable,
}

impl fmt::Display for ComparisonOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ComparisonOutcome::CandidateFavored => "candidate favored",
            ComparisonOutcome::BaselineFavored => "baseline favored",
            ComparisonOutcome::Indistinguishable => "indistinguishable",
        };
        f.write_str(text)
    }
}

/// Outcome of a paired baseline-vs-candidate comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub test_name: String,
    pub baseline: String,
    pub candidate: String,
    pub catalog: String,
    pub observed_events: usize,
    /// Mean per-event information gain of the candidate over the baseline.
    pub information_gain: f64,
    pub gain_lower: f64,
    pub gain_upper: f64,
    pub t_statistic: f64,
    pub t_critical: f64,
    pub significance: f64,
    pub outcome: ComparisonOutcome,
}

impl ComparisonResult {
    pub fn to_json(&self) -> EvalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> EvalResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn write_json(&self, path: &Path) -> EvalResult<()> {
        write_json_file(path, self)
    }

    pub fn read_json(path: &Path) -> EvalResult<Self> {
        read_json_file(path)
    }
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | {} vs {} on {} | gain {:.4} [{:.4}, {:.4}] | {}",
            self.test_name,
            self.candidate,
            self.baseline,
            self.catalog,
            self.information_gain,
            self.gain_lower,
            self.gain_upper,
            self.outcome
        )
    }
}

fn write_json_file<T: Serialize>(path: &Path, value: &T) -> EvalResult<()> {
    let text = serde_json::to_string_pretty(value)?;
    fs::write(path, text).map_err(|e| EvalError::io(path, e))
}

fn read_json_file<T: DeserializeOwned>(path: &Path) -> EvalResult<T> {
    let text = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    Ok(serde_json::from_str(&text)?)
}

// ============================================================================
// Tests
// ============================================================================
