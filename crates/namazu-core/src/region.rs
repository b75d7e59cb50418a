//! Spatial discretization for gridded forecasts and catalogs
//!
//! A [`Region`] is an ordered set of equal-sized rectangular lon/lat cells
//! plus one magnitude discretization. Forecast rate vectors and catalog count
//! vectors are laid out row-major over (cell, magnitude bin), so two objects
//! are jointly testable only when their regions compare equal: same cells in
//! the same order, same bin edges.

use rustc_hash::FxHashMap;

use crate::error::{CoreError, CoreResult};
use crate::magnitude::MagnitudeBins;

/// Nudge applied before flooring a coordinate into a cell so that points
/// sitting exactly on a shared cell edge land in the upper cell.
const EDGE_NUDGE: f64 = 1e-9;

/// One rectangular cell, identified by its lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub lon: f64,
    pub lat: f64,
}

/// Geographic bounding box of a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Ordered cell set plus magnitude bins.
#[derive(Debug, Clone)]
pub struct Region {
    cells: Vec<Cell>,
    cell_size: f64,
    bins: MagnitudeBins,
    origin: (f64, f64),
    index: FxHashMap<(i64, i64), usize>,
}

impl Region {
    /// Region from an explicit cell list, e.g. the geometry embedded in a
    /// forecast file. Cell order is preserved.
    pub fn from_cells(cells: Vec<Cell>, cell_size: f64, bins: MagnitudeBins) -> CoreResult<Self> {
        if cells.is_empty() {
            return Err(CoreError::InvalidRegion("no cells given".into()));
        }
        if !cell_size.is_finite() || cell_size <= 0.0 {
            return Err(CoreError::InvalidRegion(format!(
                "invalid cell size {cell_size}"
            )));
        }
        if cells
            .iter()
            .any(|c| !c.lon.is_finite() || !c.lat.is_finite())
        {
            return Err(CoreError::InvalidRegion(
                "cell origins must be finite".into(),
            ));
        }

        let origin = cells.iter().fold(
            (f64::INFINITY, f64::INFINITY),
            |(lon, lat), c| (lon.min(c.lon), lat.min(c.lat)),
        );

        let mut index = FxHashMap::default();
        for (i, cell) in cells.iter().enumerate() {
            let key = grid_key(cell.lon, cell.lat, origin, cell_size);
            if index.insert(key, i).is_some() {
                return Err(CoreError::InvalidRegion(format!(
                    "duplicate cell at ({}, {})",
                    cell.lon, cell.lat
                )));
            }
        }

        Ok(Self {
            cells,
            cell_size,
            bins,
            origin,
            index,
        })
    }

    /// Full rectangular grid over a bounding box. Cells are generated in
    /// latitude rows with longitude varying fastest.
    pub fn rect(
        lon_range: (f64, f64),
        lat_range: (f64, f64),
        cell_size: f64,
        bins: MagnitudeBins,
    ) -> CoreResult<Self> {
        let (min_lon, max_lon) = lon_range;
        let (min_lat, max_lat) = lat_range;
        let n_lon = span_cells(min_lon, max_lon, cell_size, "longitude")?;
        let n_lat = span_cells(min_lat, max_lat, cell_size, "latitude")?;

        let mut cells = Vec::with_capacity(n_lon * n_lat);
        for j in 0..n_lat {
            for i in 0..n_lon {
                cells.push(Cell {
                    lon: min_lon + i as f64 * cell_size,
                    lat: min_lat + j as f64 * cell_size,
                });
            }
        }
        Self::from_cells(cells, cell_size, bins)
    }

    /// Index of the cell containing the point, or `None` outside the region.
    ///
    /// Cells are lower-edge inclusive in both coordinates.
    pub fn cell_index_of(&self, lon: f64, lat: f64) -> Option<usize> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        let i = ((lon - self.origin.0 + EDGE_NUDGE) / self.cell_size).floor();
        let j = ((lat - self.origin.1 + EDGE_NUDGE) / self.cell_size).floor();
        if i < i64::MIN as f64 || i > i64::MAX as f64 || j < i64::MIN as f64 || j > i64::MAX as f64
        {
            return None;
        }
        self.index.get(&(i as i64, j as i64)).copied()
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.cell_index_of(lon, lat).is_some()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn bins(&self) -> &MagnitudeBins {
        &self.bins
    }

    /// Bounding box covering every cell.
    pub fn bounds(&self) -> Bounds {
        let mut b = Bounds {
            min_lon: f64::INFINITY,
            max_lon: f64::NEG_INFINITY,
            min_lat: f64::INFINITY,
            max_lat: f64::NEG_INFINITY,
        };
        for c in &self.cells {
            b.min_lon = b.min_lon.min(c.lon);
            b.max_lon = b.max_lon.max(c.lon + self.cell_size);
            b.min_lat = b.min_lat.min(c.lat);
            b.max_lat = b.max_lat.max(c.lat + self.cell_size);
        }
        b
    }
}

impl PartialEq for Region {
    /// Structural equality: same cell size, same bin edges, same cells in the
    /// same order. Cell origins are compared on a microdegree lattice so that
    /// regions rebuilt from text files compare equal to constructed ones.
    fn eq(&self, other: &Self) -> bool {
        if (self.cell_size - other.cell_size).abs() > 1e-9 {
            return false;
        }
        if self.bins != other.bins || self.cells.len() != other.cells.len() {
            return false;
        }
        self.cells
            .iter()
            .zip(&other.cells)
            .all(|(a, b)| micro(a.lon) == micro(b.lon) && micro(a.lat) == micro(b.lat))
    }
}

fn micro(x: f64) -> i64 {
    (x * 1e6).round() as i64
}

fn grid_key(lon: f64, lat: f64, origin: (f64, f64), cell_size: f64) -> (i64, i64) {
    (
        ((lon - origin.0) / cell_size).round() as i64,
        ((lat - origin.1) / cell_size).round() as i64,
    )
}

fn span_cells(min: f64, max: f64, cell_size: f64, axis: &str) -> CoreResult<usize> {
    if !min.is_finite() || !max.is_finite() || max <= min {
        return Err(CoreError::InvalidRegion(format!(
            "invalid {axis} range {min}..{max}"
        )));
    }
    if !cell_size.is_finite() || cell_size <= 0.0 {
        return Err(CoreError::InvalidRegion(format!(
            "invalid cell size {cell_size}"
        )));
    }
    let n = ((max - min) / cell_size).round();
    if n < 1.0 || ((min + n * cell_size) - max).abs() > 1e-6 {
        return Err(CoreError::InvalidRegion(format!(
            "{axis} range {min}..{max} is not a whole multiple of cell size {cell_size}"
        )));
    }
    Ok(n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bins() -> MagnitudeBins {
        MagnitudeBins::regular(5.0, 7.0, 0.5).unwrap()
    }

    #[test]
    fn test_rect_cell_count() {
        let region = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        assert_eq!(region.cell_count(), 4 * 2);
        assert_eq!(region.bin_count(), 5);
    }

    #[test]
    fn test_rect_rejects_ragged_span() {
        assert!(Region::rect((10.0, 12.3), (40.0, 41.0), 0.5, bins()).is_err());
        assert!(Region::rect((12.0, 10.0), (40.0, 41.0), 0.5, bins()).is_err());
    }

    #[test]
    fn test_cell_lookup_interior() {
        let region = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        // first row runs along longitude
        assert_eq!(region.cell_index_of(10.1, 40.1), Some(0));
        assert_eq!(region.cell_index_of(11.9, 40.1), Some(3));
        assert_eq!(region.cell_index_of(10.1, 40.6), Some(4));
    }

    #[test]
    fn test_cell_lookup_shared_edge_goes_up() {
        let region = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        assert_eq!(
            region.cell_index_of(10.5, 40.0),
            Some(1),
            "point on a shared edge belongs to the upper cell"
        );
        assert_eq!(region.cell_index_of(10.0, 40.5), Some(4));
    }

    #[test]
    fn test_cell_lookup_outside() {
        let region = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        assert_eq!(region.cell_index_of(9.9, 40.5), None);
        assert_eq!(region.cell_index_of(12.0, 40.5), None, "max edge is outside");
        assert_eq!(region.cell_index_of(10.5, 41.0), None);
        assert!(!region.contains(0.0, 0.0));
    }

    #[test]
    fn test_from_cells_rejects_duplicates() {
        let cells = vec![
            Cell { lon: 10.0, lat: 40.0 },
            Cell { lon: 10.0, lat: 40.0 },
        ];
        assert!(Region::from_cells(cells, 0.5, bins()).is_err());
    }

    #[test]
    fn test_structural_equality() {
        let a = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        let b = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        assert_eq!(a, b);

        let shifted = Region::rect((10.5, 12.5), (40.0, 41.0), 0.5, bins()).unwrap();
        assert_ne!(a, shifted);

        let other_bins = MagnitudeBins::regular(4.0, 7.0, 0.5).unwrap();
        let rebinned = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, other_bins).unwrap();
        assert_ne!(a, rebinned);
    }

    #[test]
    fn test_bounds() {
        let region = Region::rect((10.0, 12.0), (40.0, 41.0), 0.5, bins()).unwrap();
        let b = region.bounds();
        assert_eq!(b.min_lon, 10.0);
        assert_eq!(b.max_lon, 12.0);
        assert_eq!(b.min_lat, 40.0);
        assert_eq!(b.max_lat, 41.0);
    }
}
