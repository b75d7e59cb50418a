//! Magnitude discretization shared by forecasts and catalogs

use crate::error::{CoreError, CoreResult};

/// Ordered magnitude bin edges.
///
/// Each edge is the inclusive lower bound of one bin; the final bin is
/// open-ended toward larger magnitudes. Edges are validated on construction:
/// non-empty, finite, strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeBins {
    edges: Vec<f64>,
}

impl MagnitudeBins {
    pub fn new(edges: Vec<f64>) -> CoreResult<Self> {
        if edges.is_empty() {
            return Err(CoreError::InvalidBins("no edges given".into()));
        }
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(CoreError::InvalidBins("edges must be finite".into()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(CoreError::InvalidBins(
                "edges must be strictly increasing".into(),
            ));
        }
        Ok(Self { edges })
    }

    /// Evenly spaced edges from `start` to `stop` inclusive.
    ///
    /// The span must be a whole multiple of `step`; `regular(4.95, 8.95, 0.1)`
    /// yields 41 edges.
    pub fn regular(start: f64, stop: f64, step: f64) -> CoreResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(CoreError::InvalidBins(format!("invalid step {step}")));
        }
        if !start.is_finite() || !stop.is_finite() || stop < start {
            return Err(CoreError::InvalidBins(format!(
                "invalid range {start}..{stop}"
            )));
        }
        let n = ((stop - start) / step).round() as usize;
        if ((start + n as f64 * step) - stop).abs() > 1e-9 {
            return Err(CoreError::InvalidBins(format!(
                "range {start}..{stop} is not a whole multiple of step {step}"
            )));
        }
        let edges = (0..=n).map(|i| start + i as f64 * step).collect();
        Self::new(edges)
    }

    /// Index of the bin containing `magnitude`, or `None` below the first edge.
    pub fn index_of(&self, magnitude: f64) -> Option<usize> {
        if !magnitude.is_finite() || magnitude < self.edges[0] {
            return None;
        }
        let mut idx = self.edges.len() - 1;
        for (i, pair) in self.edges.windows(2).enumerate() {
            if magnitude < pair[1] {
                idx = i;
                break;
            }
        }
        Some(idx)
    }

    /// Lowest magnitude covered by any bin.
    pub fn lowest(&self) -> f64 {
        self.edges[0]
    }

    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_edge_count() {
        let bins = MagnitudeBins::regular(4.95, 8.95, 0.1).unwrap();
        assert_eq!(bins.len(), 41);
        assert_eq!(bins.lowest(), 4.95);
    }

    #[test]
    fn test_regular_rejects_ragged_span() {
        assert!(MagnitudeBins::regular(4.95, 8.99, 0.1).is_err());
    }

    #[test]
    fn test_regular_rejects_bad_step() {
        assert!(MagnitudeBins::regular(4.95, 8.95, 0.0).is_err());
        assert!(MagnitudeBins::regular(4.95, 8.95, -0.1).is_err());
    }

    #[test]
    fn test_new_rejects_unsorted_edges() {
        assert!(MagnitudeBins::new(vec![5.0, 4.9, 6.0]).is_err());
        assert!(MagnitudeBins::new(vec![5.0, 5.0]).is_err());
        assert!(MagnitudeBins::new(vec![]).is_err());
    }

    #[test]
    fn test_index_of_interior() {
        let bins = MagnitudeBins::regular(5.0, 7.0, 0.5).unwrap();
        assert_eq!(bins.index_of(5.0), Some(0), "first edge is inclusive");
        assert_eq!(bins.index_of(5.4), Some(0));
        assert_eq!(bins.index_of(5.5), Some(1), "bin edges are lower-inclusive");
        assert_eq!(bins.index_of(6.9), Some(3));
    }

    #[test]
    fn test_index_of_open_top_bin() {
        let bins = MagnitudeBins::regular(5.0, 7.0, 0.5).unwrap();
        assert_eq!(bins.index_of(7.0), Some(4));
        assert_eq!(bins.index_of(9.8), Some(4), "last bin is open-ended");
    }

    #[test]
    fn test_index_of_below_range() {
        let bins = MagnitudeBins::regular(5.0, 7.0, 0.5).unwrap();
        assert_eq!(bins.index_of(4.99), None);
        assert_eq!(bins.index_of(f64::NAN), None);
    }

    #[test]
    fn test_single_edge_is_one_open_bin() {
        let bins = MagnitudeBins::new(vec![4.95]).unwrap();
        assert_eq!(bins.len(), 1);
        assert_eq!(bins.index_of(4.95), Some(0));
        assert_eq!(bins.index_of(8.0), Some(0));
        assert_eq!(bins.index_of(4.0), None);
    }
}
