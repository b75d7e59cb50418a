//! namazu - grid-based earthquake forecast evaluation from the command line

use anyhow::Result;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use namazu_core::Catalog;
use namazu_eval::client::{CatalogServiceClient, EventQuery};
use namazu_eval::simulate::simulate_catalogs;
use namazu_eval::{readers, report};
use namazu_eval::{
    CatalogForecast, ComparisonFigure, ComparisonResult, ConsistencyFigure, EvaluationConfig,
    EvaluationPipeline, FigureOptions, GriddedForecast, TestResult,
};

use namazu_cli::config::{Experiment, ExperimentFile, LoggingSection};

#[derive(Parser)]
#[command(name = "namazu")]
#[command(version = "0.1.0")]
#[command(about = "Grid-based earthquake forecast evaluation", long_about = None)]
struct Cli {
    /// Path to experiment file (YAML or TOML)
    #[arg(short, long, global = true, env = "NAMAZU_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch observed events from the configured catalog service
    Fetch {
        /// Catalog name used in result files (default: the experiment name)
        #[arg(short, long)]
        name: Option<String>,

        /// Output CSV path (default: <output dir>/<name>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Filter a catalog CSV to the experiment window, magnitude floor, and region
    Filter {
        /// Input catalog CSV
        input: PathBuf,

        /// Filtered output CSV
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run a consistency test of a forecast against a catalog
    Test {
        /// Test name: number, spatial, magnitude, or likelihood
        test: String,

        /// Forecast file (gridded rates, or an ensemble with --catalog-based)
        #[arg(short, long)]
        forecast: PathBuf,

        /// Observed catalog CSV
        #[arg(short, long)]
        catalog: PathBuf,

        /// Treat the forecast file as a simulated-catalog ensemble
        #[arg(long)]
        catalog_based: bool,

        /// Forecast horizon in years (default: the experiment window length)
        #[arg(long)]
        horizon: Option<f64>,

        /// Result JSON path (default: <output dir>/<forecast>-<test>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare two gridded forecasts on the same grid with the paired t-test
    Compare {
        /// Baseline forecast file
        #[arg(long)]
        baseline: PathBuf,

        /// Candidate forecast file
        #[arg(long)]
        candidate: PathBuf,

        /// Observed catalog CSV
        #[arg(long)]
        catalog: PathBuf,

        /// Forecast horizon in years (default: the experiment window length)
        #[arg(long)]
        horizon: Option<f64>,

        /// Result JSON path (default: <output dir>/<candidate>-vs-<baseline>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Draw synthetic catalogs from a gridded forecast
    Simulate {
        /// Forecast file (gridded rates)
        #[arg(short, long)]
        forecast: PathBuf,

        /// Number of catalogs to draw
        #[arg(short = 'n', long, default_value = "100")]
        count: usize,

        /// Forecast horizon in years (default: the experiment window length)
        #[arg(long)]
        horizon: Option<f64>,

        /// RNG seed (default: the experiment seed, or a fresh one)
        #[arg(long)]
        seed: Option<u64>,

        /// Output ensemble path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Render stored results as figures and assemble a PDF report
    Report {
        /// Result JSON files; test results and comparisons may be mixed
        results: Vec<PathBuf>,

        /// Report PDF path (default: <output dir>/report.pdf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Figure title
        #[arg(long)]
        title: Option<String>,

        /// Drop the upper whisker and shade one-sided lower bands
        #[arg(long)]
        one_sided_lower: bool,

        /// Figure width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Figure height in pixels
        #[arg(long, default_value = "400")]
        height: u32,

        /// Stop after writing the SVG figures
        #[arg(long)]
        svg_only: bool,
    },

    /// Print the resolved experiment settings
    Info,

    /// Generate an example experiment file
    ConfigGen {
        /// Output format (yaml, toml)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file = match cli.config.as_ref() {
        Some(path) => ExperimentFile::load(path)?,
        None => ExperimentFile::default(),
    };
    init_logging(&file.logging)?;

    match cli.command {
        Commands::Fetch { name, output } => {
            let experiment = file.build()?;
            fetch_catalog(&experiment, name, output)?;
        }

        Commands::Filter { input, output } => {
            let experiment = file.build()?;
            filter_catalog(&experiment, &input, &output)?;
        }

        Commands::Test {
            test,
            forecast,
            catalog,
            catalog_based,
            horizon,
            output,
        } => {
            let experiment = file.build()?;
            run_consistency_test(
                &experiment,
                &test,
                &forecast,
                &catalog,
                catalog_based,
                horizon,
                output,
            )?;
        }

        Commands::Compare {
            baseline,
            candidate,
            catalog,
            horizon,
            output,
        } => {
            let experiment = file.build()?;
            run_comparison(&experiment, &baseline, &candidate, &catalog, horizon, output)?;
        }

        Commands::Simulate {
            forecast,
            count,
            horizon,
            seed,
            output,
        } => {
            let experiment = file.build()?;
            run_simulation(&experiment, &forecast, count, horizon, seed, &output)?;
        }

        Commands::Report {
            results,
            output,
            title,
            one_sided_lower,
            width,
            height,
            svg_only,
        } => {
            let experiment = file.build()?;
            let options = FigureOptions {
                title,
                one_sided_lower,
                figure_size: (width, height),
            };
            build_report(&experiment, &results, output, &options, svg_only)?;
        }

        Commands::Info => {
            let experiment = file.build()?;
            print_info(&experiment);
        }

        Commands::ConfigGen { format, output } => {
            let content = match format.to_lowercase().as_str() {
                "yaml" | "yml" => ExperimentFile::example_yaml(),
                "toml" => ExperimentFile::example_toml(),
                _ => anyhow::bail!("Unsupported format: {}. Use 'yaml' or 'toml'", format),
            };

            if let Some(path) = output {
                std::fs::write(&path, &content)?;
                println!("Experiment file written to: {}", path.display());
            } else {
                println!("{}", content);
            }
        }
    }

    Ok(())
}

fn init_logging(settings: &LoggingSection) -> Result<()> {
    let level: Level = settings
        .level
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown log level: {}", settings.level))?;
    if settings.timestamps {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .without_time()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}

fn fetch_catalog(
    experiment: &Experiment,
    name: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = &experiment.config;
    let name = name.unwrap_or_else(|| config.name().to_string());
    let output = match output {
        Some(path) => path,
        None => experiment.output_dir.join(format!("{name}.csv")),
    };

    let client = CatalogServiceClient::new(experiment.service_url.as_str())?;
    let query = EventQuery {
        start: config.start(),
        end: config.end(),
        min_magnitude: Some(experiment.fetch_min_magnitude),
        bounds: Some(config.region().bounds()),
    };
    info!(url = client.base_url(), catalog = %name, "fetching events");
    let catalog = client.fetch(&name, &query)?;

    ensure_parent(&output)?;
    readers::write_catalog_csv(&output, &catalog)?;
    println!(
        "Fetched {} events into {}",
        catalog.event_count(),
        output.display()
    );
    Ok(())
}

fn filter_catalog(experiment: &Experiment, input: &Path, output: &Path) -> Result<()> {
    let raw = readers::read_catalog_csv(input)?;
    let total = raw.event_count();
    let filtered = apply_experiment_filters(experiment, &raw);

    ensure_parent(output)?;
    readers::write_catalog_csv(output, &filtered)?;
    println!(
        "Kept {} of {} events in {}",
        filtered.event_count(),
        total,
        output.display()
    );
    Ok(())
}

fn run_consistency_test(
    experiment: &Experiment,
    test: &str,
    forecast_path: &Path,
    catalog_path: &Path,
    catalog_based: bool,
    horizon: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = &experiment.config;
    let catalog = load_filtered_catalog(experiment, catalog_path)?;
    let pipeline = pipeline_for(experiment);

    let result = if catalog_based {
        let horizon = horizon.unwrap_or_else(|| config.window_years());
        let mut forecast =
            CatalogForecast::open(forecast_path, Arc::clone(config.region()), horizon)?;
        forecast.set_window(config.start(), config.end())?;
        forecast.set_min_magnitude(config.region().bins().lowest());
        pipeline.run_catalog_test(test, &forecast, &catalog)?
    } else {
        let forecast = load_scaled_forecast(experiment, forecast_path, horizon)?;
        pipeline.run_test(test, &forecast, &catalog)?
    };

    let output = match output {
        Some(path) => path,
        None => {
            let label = file_label(forecast_path);
            experiment
                .output_dir
                .join(format!("{label}-{}.json", result.test_name))
        }
    };
    ensure_parent(&output)?;
    result.write_json(&output)?;
    println!("{result}");
    println!("Result written to {}", output.display());
    Ok(())
}

fn run_comparison(
    experiment: &Experiment,
    baseline_path: &Path,
    candidate_path: &Path,
    catalog_path: &Path,
    horizon: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let catalog = load_filtered_catalog(experiment, catalog_path)?;
    let baseline = load_scaled_forecast(experiment, baseline_path, horizon)?;
    let candidate = load_scaled_forecast(experiment, candidate_path, horizon)?;
    let pipeline = pipeline_for(experiment);

    let result = pipeline.compare(&baseline, &candidate, &catalog)?;

    let output = match output {
        Some(path) => path,
        None => {
            let baseline_label = file_label(baseline_path);
            let candidate_label = file_label(candidate_path);
            experiment
                .output_dir
                .join(format!("{candidate_label}-vs-{baseline_label}.json"))
        }
    };
    ensure_parent(&output)?;
    result.write_json(&output)?;
    println!("{result}");
    println!("Result written to {}", output.display());
    Ok(())
}

fn run_simulation(
    experiment: &Experiment,
    forecast_path: &Path,
    count: usize,
    horizon: Option<f64>,
    seed: Option<u64>,
    output: &Path,
) -> Result<()> {
    if count == 0 {
        anyhow::bail!("--count must be at least 1");
    }
    let config = &experiment.config;
    let forecast = load_scaled_forecast(experiment, forecast_path, horizon)?;

    let seed = seed.or(config.seed()).unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let catalogs = simulate_catalogs(&forecast, config.window(), count, &mut rng)?;

    ensure_parent(output)?;
    readers::write_simulated_catalogs(output, count, &catalogs)?;
    let events: usize = catalogs.iter().map(|c| c.events.len()).sum();
    println!(
        "Wrote {} catalogs ({} events, seed {}) to {}",
        count,
        events,
        seed,
        output.display()
    );
    Ok(())
}

fn build_report(
    experiment: &Experiment,
    results: &[PathBuf],
    output: Option<PathBuf>,
    options: &FigureOptions,
    svg_only: bool,
) -> Result<()> {
    if results.is_empty() {
        anyhow::bail!("no result files given");
    }

    let mut tests = Vec::new();
    let mut comparisons = Vec::new();
    for path in results {
        match TestResult::read_json(path) {
            Ok(result) => tests.push(result),
            Err(_) => {
                let result = ComparisonResult::read_json(path).map_err(|e| {
                    anyhow::anyhow!(
                        "{} is neither a test result nor a comparison: {e}",
                        path.display()
                    )
                })?;
                comparisons.push(result);
            }
        }
    }

    let output = output.unwrap_or_else(|| experiment.output_dir.join("report.pdf"));
    ensure_parent(&output)?;
    let stem = output
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report")
        .to_string();
    let dir = output.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut figures = Vec::new();
    if !tests.is_empty() {
        let figure = ConsistencyFigure::new(tests, experiment.significance)?;
        let path = dir.join(format!("{stem}-consistency.svg"));
        figure.write_svg(&path, options)?;
        println!("Figure written to {}", path.display());
        figures.push(path);
    }
    if !comparisons.is_empty() {
        let figure = ComparisonFigure::new(comparisons)?;
        let path = dir.join(format!("{stem}-comparison.svg"));
        figure.write_svg(&path, options)?;
        println!("Figure written to {}", path.display());
        figures.push(path);
    }

    if svg_only {
        return Ok(());
    }
    report::assemble_report(&figures, &output)?;
    println!("Report written to {}", output.display());
    Ok(())
}

fn print_info(experiment: &Experiment) {
    let config = &experiment.config;
    let region = config.region();
    let bounds = region.bounds();

    println!("Experiment: {}", config.name());
    println!(
        "  Window:       {} to {} ({:.2} years)",
        config.start().date_naive(),
        config.end().date_naive(),
        config.window_years()
    );
    println!(
        "  Region:       lon {}..{}, lat {}..{}, {} deg cells",
        bounds.min_lon,
        bounds.max_lon,
        bounds.min_lat,
        bounds.max_lat,
        region.cell_size()
    );
    println!(
        "  Grid:         {} cells x {} magnitude bins",
        region.cell_count(),
        region.bin_count()
    );
    println!("  Magnitudes:   {} and above", region.bins().lowest());
    println!("  Simulations:  {}", config.n_simulations());
    println!("  Significance: {}", experiment.significance);
    match config.seed() {
        Some(seed) => println!("  Seed:         {seed}"),
        None => println!("  Seed:         (fresh per run)"),
    }
    println!("  Service:      {}", experiment.service_url);
    println!("  Output dir:   {}", experiment.output_dir.display());
}

fn pipeline_for(experiment: &Experiment) -> EvaluationPipeline {
    EvaluationPipeline::new(EvaluationConfig {
        n_simulations: experiment.config.n_simulations(),
        significance: experiment.significance,
        seed: experiment.config.seed(),
    })
}

/// Restrict a catalog to the experiment window, magnitude floor, and grid.
/// The result records all three, which is what the alignment checks expect.
fn apply_experiment_filters(experiment: &Experiment, catalog: &Catalog) -> Catalog {
    let config = &experiment.config;
    catalog
        .filter_time(config.start(), config.end())
        .filter_magnitude(config.region().bins().lowest())
        .filter_region(Arc::clone(config.region()))
}

fn load_filtered_catalog(experiment: &Experiment, path: &Path) -> Result<Catalog> {
    let raw = readers::read_catalog_csv(path)?;
    let filtered = apply_experiment_filters(experiment, &raw);
    if filtered.is_empty() {
        warn!(
            catalog = filtered.name(),
            "no events in the evaluation window"
        );
    }
    Ok(filtered)
}

fn load_scaled_forecast(
    experiment: &Experiment,
    path: &Path,
    horizon: Option<f64>,
) -> Result<GriddedForecast> {
    let config = &experiment.config;
    let horizon = horizon.unwrap_or_else(|| config.window_years());
    let mut forecast =
        GriddedForecast::load_with_region(path, Arc::clone(config.region()), horizon)?;
    forecast.set_window(config.start(), config.end())?;
    Ok(forecast)
}

fn file_label(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("forecast")
        .to_string()
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            std::fs::create_dir_all(dir)?;
        }
    }
    Ok(())
}
