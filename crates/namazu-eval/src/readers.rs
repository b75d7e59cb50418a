//! Line-oriented file formats for forecasts and catalogs
//!
//! Three text formats, all tolerant of blank lines and `#` comments, all
//! failing on the first malformed line with its 1-based number:
//!
//! **Gridded rate files**, one whitespace-delimited line per cell:
//!
//! ```text
//! # lon_min lon_max lat_min lat_max depth_min depth_max rate-per-bin...
//! 10.0 10.1 40.0 40.1 0.0 30.0 0.0214 0.0097 0.0041
//! ```
//!
//! The magnitude bins are supplied by the caller; every line must carry one
//! rate column per bin. Depth columns are carried by the format but the grid
//! is two-dimensional.
//!
//! **Catalog CSV**, one event per line:
//!
//! ```text
//! id,time,lon,lat,depth_km,magnitude
//! 2012abc,2012-05-20T02:03:52.000Z,11.23,44.89,6.3,5.86
//! ```
//!
//! **Simulated-catalog ensembles**, declared up front by a
//! `# catalogs: N` header so that empty catalogs count, then one event per
//! line grouped by ascending catalog index:
//!
//! ```text
//! # catalogs: 10000
//! # lon, lat, magnitude, time, depth_km, catalog
//! 11.23, 44.89, 5.86, 2012-05-20T02:03:52.000Z, 6.3, 0
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Lines, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use namazu_core::{Catalog, Cell, CoreError, MagnitudeBins, Region, SeismicEvent};

use crate::error::EvalResult;
use crate::forecast::{ForecastSource, GriddedForecast, SimulatedCatalog};

const READ_BUFFER: usize = 64 * 1024;

// ---------------------------------------------------------------------------
// Gridded rate files
// ---------------------------------------------------------------------------

pub fn load_gridded_forecast(
    path: &Path,
    bins: MagnitudeBins,
    horizon_years: f64,
) -> EvalResult<GriddedForecast> {
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let reader = BufReader::with_capacity(READ_BUFFER, file);

    let expected_cols = 6 + bins.len();
    let mut cells: Vec<Cell> = Vec::new();
    let mut rates: Vec<f64> = Vec::new();
    let mut cell_size: Option<f64> = None;

    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| CoreError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let cols: Vec<&str> = trimmed.split_whitespace().collect();
        if cols.len() != expected_cols {
            return Err(CoreError::format(
                line_no,
                format!("expected {expected_cols} columns, found {}", cols.len()),
            )
            .into());
        }

        let lon_min = parse_float(cols[0], "lon_min", line_no)?;
        let lon_max = parse_float(cols[1], "lon_max", line_no)?;
        let lat_min = parse_float(cols[2], "lat_min", line_no)?;
        let lat_max = parse_float(cols[3], "lat_max", line_no)?;
        parse_float(cols[4], "depth_min", line_no)?;
        parse_float(cols[5], "depth_max", line_no)?;

        let width = lon_max - lon_min;
        let height = lat_max - lat_min;
        if width <= 0.0 || (width - height).abs() > 1e-9 {
            return Err(CoreError::format(
                line_no,
                format!("cell {lon_min}..{lon_max} x {lat_min}..{lat_max} is not square"),
            )
            .into());
        }
        match cell_size {
            None => cell_size = Some(width),
            Some(s) if (s - width).abs() > 1e-9 => {
                return Err(CoreError::format(
                    line_no,
                    format!("cell size {width} differs from {s} seen earlier"),
                )
                .into());
            }
            Some(_) => {}
        }

        for col in &cols[6..] {
            let rate = parse_float(col, "rate", line_no)?;
            if rate < 0.0 {
                return Err(CoreError::format(line_no, format!("negative rate {rate}")).into());
            }
            rates.push(rate);
        }
        cells.push(Cell {
            lon: lon_min,
            lat: lat_min,
        });
    }

    let cell_size = cell_size.ok_or_else(|| {
        CoreError::InvalidRegion(format!("{}: no cell lines found", path.display()))
    })?;
    let region = Region::from_cells(cells, cell_size, bins)?;
    debug!(
        path = %path.display(),
        cells = region.cell_count(),
        bins = region.bin_count(),
        "loaded gridded forecast"
    );
    GriddedForecast::new(file_stem(path), Arc::new(region), rates, horizon_years)
}

/// Load a gridded forecast and require its geometry to match `region`.
pub fn load_gridded_forecast_with_region(
    path: &Path,
    region: Arc<Region>,
    horizon_years: f64,
) -> EvalResult<GriddedForecast> {
    let loaded = load_gridded_forecast(path, region.bins().clone(), horizon_years)?;
    if loaded.region().as_ref() != region.as_ref() {
        return Err(CoreError::RegionMismatch(format!(
            "{}: file geometry ({} cells) differs from the expected region ({} cells)",
            path.display(),
            loaded.region().cell_count(),
            region.cell_count()
        ))
        .into());
    }
    GriddedForecast::new(
        loaded.name().to_string(),
        region,
        loaded.rates().to_vec(),
        horizon_years,
    )
}

// ---------------------------------------------------------------------------
// Catalog CSV
// ---------------------------------------------------------------------------

pub fn read_catalog_csv(path: &Path) -> EvalResult<Catalog> {
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let reader = BufReader::with_capacity(READ_BUFFER, file);

    let mut events = Vec::new();
    let mut seen_data = false;
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| CoreError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        if !seen_data {
            seen_data = true;
            if trimmed.to_ascii_lowercase().starts_with("id,") {
                continue;
            }
        }
        events.push(parse_catalog_row(trimmed, line_no)?);
    }
    Ok(Catalog::new(file_stem(path), events))
}

pub fn write_catalog_csv(path: &Path, catalog: &Catalog) -> EvalResult<()> {
    let file = File::create(path).map_err(|e| CoreError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let write_err = |e| CoreError::io(path, e);

    writeln!(out, "# namazu catalog: {}", catalog.name()).map_err(write_err)?;
    writeln!(out, "id,time,lon,lat,depth_km,magnitude").map_err(write_err)?;
    for event in catalog.events() {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            event.id,
            event.origin_time.to_rfc3339_opts(SecondsFormat::Millis, true),
            event.longitude,
            event.latitude,
            event.depth_km,
            event.magnitude,
        )
        .map_err(write_err)?;
    }
    out.flush().map_err(write_err)?;
    Ok(())
}

fn parse_catalog_row(line: &str, line_no: usize) -> Result<SeismicEvent, CoreError> {
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    if cols.len() != 6 {
        return Err(CoreError::format(
            line_no,
            format!("expected 6 comma-separated fields, found {}", cols.len()),
        ));
    }
    if cols[0].is_empty() {
        return Err(CoreError::format(line_no, "empty event id"));
    }
    Ok(SeismicEvent {
        id: cols[0].to_string(),
        origin_time: parse_time(cols[1], line_no)?,
        longitude: parse_float(cols[2], "lon", line_no)?,
        latitude: parse_float(cols[3], "lat", line_no)?,
        depth_km: parse_float(cols[4], "depth_km", line_no)?,
        magnitude: parse_float(cols[5], "magnitude", line_no)?,
    })
}

// ---------------------------------------------------------------------------
// Simulated-catalog ensembles
// ---------------------------------------------------------------------------

/// Read the `# catalogs: N` header without touching the event rows.
pub fn read_simulation_header(path: &Path) -> EvalResult<usize> {
    let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
    let mut lines = BufReader::with_capacity(READ_BUFFER, file).lines();
    let mut line_no = 0;
    Ok(scan_header(&mut lines, path, &mut line_no)?)
}

fn scan_header(
    lines: &mut Lines<BufReader<File>>,
    path: &Path,
    line_no: &mut usize,
) -> Result<usize, CoreError> {
    for line in lines.by_ref() {
        *line_no += 1;
        let line = line.map_err(|e| CoreError::io(path, e))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix('#') {
            if let Some(count) = rest.trim().strip_prefix("catalogs:") {
                return count.trim().parse().map_err(|_| {
                    CoreError::format(*line_no, format!("invalid catalog count '{}'", count.trim()))
                });
            }
            continue;
        }
        return Err(CoreError::format(
            *line_no,
            "event row before the '# catalogs: N' header",
        ));
    }
    Err(CoreError::format(
        *line_no,
        "missing '# catalogs: N' header",
    ))
}

/// Streaming pass over a simulated-catalog ensemble.
///
/// Yields every declared catalog in ascending index order, including ones
/// with no surviving events, applying the region, window, and magnitude
/// filters it was opened with. The underlying file is read once, line at a
/// time.
pub struct SimulationReader {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    n_catalogs: usize,
    next_index: usize,
    pending: Option<(usize, SeismicEvent)>,
    failed: bool,
    region: Arc<Region>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    min_magnitude: Option<f64>,
}

impl SimulationReader {
    pub(crate) fn open(
        path: &Path,
        region: Arc<Region>,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
        min_magnitude: Option<f64>,
    ) -> EvalResult<Self> {
        let file = File::open(path).map_err(|e| CoreError::io(path, e))?;
        let mut lines = BufReader::with_capacity(READ_BUFFER, file).lines();
        let mut line_no = 0;
        let n_catalogs = scan_header(&mut lines, path, &mut line_no)?;
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            line_no,
            n_catalogs,
            next_index: 0,
            pending: None,
            failed: false,
            region,
            window,
            min_magnitude,
        })
    }

    pub fn n_catalogs(&self) -> usize {
        self.n_catalogs
    }

    fn keep(&self, event: &SeismicEvent) -> bool {
        if !self.region.contains(event.longitude, event.latitude) {
            return false;
        }
        if let Some((start, end)) = self.window {
            if event.origin_time < start || event.origin_time >= end {
                return false;
            }
        }
        if let Some(min) = self.min_magnitude {
            if event.magnitude < min {
                return false;
            }
        }
        true
    }

    /// Next parsed event row, or `None` at end of file.
    fn read_row(&mut self) -> EvalResult<Option<(usize, SeismicEvent)>> {
        for line in self.lines.by_ref() {
            self.line_no += 1;
            let line = line.map_err(|e| CoreError::io(&self.path, e))?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let (index, event) = parse_simulation_row(trimmed, self.line_no)?;
            if index >= self.n_catalogs {
                return Err(CoreError::format(
                    self.line_no,
                    format!(
                        "catalog index {index} out of range (ensemble declares {})",
                        self.n_catalogs
                    ),
                )
                .into());
            }
            if index < self.next_index.saturating_sub(1) {
                return Err(CoreError::format(
                    self.line_no,
                    format!("catalog index {index} decreases; rows must be grouped in order"),
                )
                .into());
            }
            return Ok(Some((index, event)));
        }
        Ok(None)
    }
}

impl Iterator for SimulationReader {
    type Item = EvalResult<SimulatedCatalog>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_index >= self.n_catalogs {
            return None;
        }
        if self.pending.is_none() {
            match self.read_row() {
                Ok(row) => self.pending = row,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }

        let index = self.next_index;
        self.next_index += 1;

        let mut events = Vec::new();
        while matches!(self.pending, Some((row_index, _)) if row_index == index) {
            if let Some((_, event)) = self.pending.take() {
                if self.keep(&event) {
                    events.push(event);
                }
            }
            match self.read_row() {
                Ok(row) => self.pending = row,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        Some(Ok(SimulatedCatalog { index, events }))
    }
}

fn parse_simulation_row(line: &str, line_no: usize) -> Result<(usize, SeismicEvent), CoreError> {
    let cols: Vec<&str> = line.split(',').map(str::trim).collect();
    if cols.len() != 6 {
        return Err(CoreError::format(
            line_no,
            format!("expected 6 comma-separated fields, found {}", cols.len()),
        ));
    }
    let index: usize = cols[5].parse().map_err(|_| {
        CoreError::format(line_no, format!("invalid catalog index '{}'", cols[5]))
    })?;
    let event = SeismicEvent {
        id: format!("s{line_no}"),
        origin_time: parse_time(cols[3], line_no)?,
        longitude: parse_float(cols[0], "lon", line_no)?,
        latitude: parse_float(cols[1], "lat", line_no)?,
        depth_km: parse_float(cols[4], "depth_km", line_no)?,
        magnitude: parse_float(cols[2], "magnitude", line_no)?,
    };
    Ok((index, event))
}

/// Write an ensemble in the format [`crate::forecast::CatalogForecast`] reads.
pub fn write_simulated_catalogs(
    path: &Path,
    n_catalogs: usize,
    catalogs: &[SimulatedCatalog],
) -> EvalResult<()> {
    let file = File::create(path).map_err(|e| CoreError::io(path, e))?;
    let mut out = BufWriter::new(file);
    let write_err = |e| CoreError::io(path, e);

    writeln!(out, "# namazu simulated catalogs").map_err(write_err)?;
    writeln!(out, "# catalogs: {n_catalogs}").map_err(write_err)?;
    writeln!(out, "# lon, lat, magnitude, time, depth_km, catalog").map_err(write_err)?;
    for catalog in catalogs {
        for event in &catalog.events {
            writeln!(
                out,
                "{}, {}, {}, {}, {}, {}",
                event.longitude,
                event.latitude,
                event.magnitude,
                event.origin_time.to_rfc3339_opts(SecondsFormat::Millis, true),
                event.depth_km,
                catalog.index,
            )
            .map_err(write_err)?;
        }
    }
    out.flush().map_err(write_err)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Shared field parsers
// ---------------------------------------------------------------------------

fn parse_float(field: &str, name: &str, line_no: usize) -> Result<f64, CoreError> {
    let value: f64 = field
        .parse()
        .map_err(|_| CoreError::format(line_no, format!("invalid {name} '{field}'")))?;
    if !value.is_finite() {
        return Err(CoreError::format(
            line_no,
            format!("non-finite {name} '{field}'"),
        ));
    }
    Ok(value)
}

fn parse_time(field: &str, line_no: usize) -> Result<DateTime<Utc>, CoreError> {
    DateTime::parse_from_rfc3339(field)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| CoreError::format(line_no, format!("invalid time '{field}': {e}")))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unnamed")
        .to_string()
}
