//! Experiment file support for namazu
//!
//! Supports both YAML and TOML experiment files.
//!
//! # Example YAML experiment:
//! ```yaml
//! # namazu experiment file
//!
//! experiment:
//!   name: italy-five-year
//!   start: "2010-01-01"
//!   end: "2015-01-01"
//!
//! # Testing region: grid extent and magnitude discretization
//! region:
//!   lon_min: 5.0
//!   lon_max: 20.0
//!   lat_min: 36.0
//!   lat_max: 48.0
//!   cell_size: 0.1
//!   mag_min: 4.95
//!   mag_max: 8.95
//!   mag_step: 0.1
//!
//! # Test execution settings
//! evaluation:
//!   n_simulations: 1000
//!   significance: 0.05
//!   seed: 42
//!
//! # Event-service settings for `namazu fetch`
//! catalog:
//!   service_url: "https://webservices.ingv.it/fdsnws/event/1/query"
//!   min_magnitude: 4.95
//!
//! output:
//!   directory: results
//!
//! logging:
//!   level: info
//! ```
//!
//! Dates are ISO strings, quoted so both YAML and TOML read them the same
//! way. `YYYY-MM-DD` means midnight UTC.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use namazu_core::{ExperimentConfig, MagnitudeBins, Region};

/// Main experiment file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ExperimentFile {
    /// Name and evaluation window
    pub experiment: ExperimentSection,

    /// Grid extent and magnitude discretization
    pub region: RegionSection,

    /// Test execution settings
    pub evaluation: EvaluationSection,

    /// Event-service settings
    pub catalog: CatalogSection,

    /// Output locations
    pub output: OutputSection,

    /// Logging settings
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentSection {
    /// Experiment name, used in result files
    pub name: String,

    /// Window start, ISO date or datetime
    pub start: String,

    /// Window end (exclusive), ISO date or datetime
    pub end: String,
}

impl Default for ExperimentSection {
    fn default() -> Self {
        Self {
            name: "experiment".to_string(),
            start: "2010-01-01".to_string(),
            end: "2015-01-01".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionSection {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,

    /// Cell size in degrees; the extent must be a whole multiple
    pub cell_size: f64,

    /// Lowest magnitude bin edge
    pub mag_min: f64,

    /// Highest magnitude bin edge (the bin above it is open-ended)
    pub mag_max: f64,

    pub mag_step: f64,
}

impl Default for RegionSection {
    fn default() -> Self {
        Self {
            lon_min: 5.0,
            lon_max: 20.0,
            lat_min: 36.0,
            lat_max: 48.0,
            cell_size: 0.1,
            mag_min: 4.95,
            mag_max: 8.95,
            mag_step: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationSection {
    /// Synthetic catalogs per simulation-based test
    pub n_simulations: usize,

    /// Significance level for consistency bands and comparisons
    pub significance: f64,

    /// Fixed RNG seed; omit for a fresh seed per test
    pub seed: Option<u64>,
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            n_simulations: 1000,
            significance: 0.05,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// FDSN-style event service endpoint
    pub service_url: String,

    /// Magnitude floor applied when fetching
    pub min_magnitude: f64,
}

impl Default for CatalogSection {
    fn default() -> Self {
        Self {
            service_url: namazu_eval::client::DEFAULT_SERVICE_URL.to_string(),
            min_magnitude: 4.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Directory results, figures, and reports land in
    pub directory: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("results"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Include timestamps
    pub timestamps: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            timestamps: true,
        }
    }
}

impl ExperimentFile {
    /// Load an experiment file (YAML or TOML, auto-detected by extension)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e.to_string()))?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match extension.as_str() {
            "yaml" | "yml" => Self::from_yaml(&content),
            "toml" => Self::from_toml(&content),
            _ => Self::from_yaml(&content).or_else(|_| Self::from_toml(&content)),
        }
    }

    /// Parse from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Merge another file into this one; sections that differ from the
    /// defaults take precedence.
    pub fn merge(&mut self, other: ExperimentFile) {
        let defaults = ExperimentFile::default();
        if other.experiment != defaults.experiment {
            self.experiment = other.experiment;
        }
        if other.region != defaults.region {
            self.region = other.region;
        }
        if other.evaluation != defaults.evaluation {
            self.evaluation = other.evaluation;
        }
        if other.catalog != defaults.catalog {
            self.catalog = other.catalog;
        }
        if other.output != defaults.output {
            self.output = other.output;
        }
        if other.logging != defaults.logging {
            self.logging = other.logging;
        }
    }

    /// Validate and turn the file into runtime objects.
    pub fn build(&self) -> Result<Experiment, ConfigError> {
        let start = parse_date(&self.experiment.start)?;
        let end = parse_date(&self.experiment.end)?;

        let bins = MagnitudeBins::regular(
            self.region.mag_min,
            self.region.mag_max,
            self.region.mag_step,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        let region = Region::rect(
            (self.region.lon_min, self.region.lon_max),
            (self.region.lat_min, self.region.lat_max),
            self.region.cell_size,
            bins,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if !(self.evaluation.significance > 0.0 && self.evaluation.significance < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "significance {} outside (0, 1)",
                self.evaluation.significance
            )));
        }

        let config = ExperimentConfig::new(
            self.experiment.name.clone(),
            start,
            end,
            Arc::new(region),
            self.evaluation.n_simulations,
            self.evaluation.seed,
        )
        .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        Ok(Experiment {
            config,
            significance: self.evaluation.significance,
            service_url: self.catalog.service_url.clone(),
            fetch_min_magnitude: self.catalog.min_magnitude,
            output_dir: self.output.directory.clone(),
        })
    }

    /// Create an example experiment
    pub fn example() -> Self {
        Self {
            experiment: ExperimentSection {
                name: "italy-five-year".to_string(),
                start: "2010-01-01".to_string(),
                end: "2015-01-01".to_string(),
            },
            evaluation: EvaluationSection {
                n_simulations: 1000,
                significance: 0.05,
                seed: Some(42),
            },
            ..Default::default()
        }
    }

    /// Generate example YAML experiment file
    pub fn example_yaml() -> String {
        serde_yaml::to_string(&Self::example()).unwrap_or_default()
    }

    /// Generate example TOML experiment file
    pub fn example_toml() -> String {
        toml::to_string_pretty(&Self::example()).unwrap_or_default()
    }
}

/// Validated runtime view of an experiment file.
#[derive(Debug, Clone)]
pub struct Experiment {
    pub config: ExperimentConfig,
    pub significance: f64,
    pub service_url: String,
    pub fetch_min_magnitude: f64,
    pub output_dir: PathBuf,
}

fn parse_date(text: &str) -> Result<DateTime<Utc>, ConfigError> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Ok(t.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| ConfigError::Invalid(format!("invalid date '{text}': {e}")))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(t) => Ok(t.and_utc()),
        None => Err(ConfigError::Invalid(format!("invalid date '{text}'"))),
    }
}

/// Experiment file error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read experiment file {0}: {1}")]
    IoError(PathBuf, String),

    #[error("Failed to parse experiment file: {0}")]
    ParseError(String),

    #[error("Invalid experiment: {0}")]
    Invalid(String),
}
