//! Synthetic catalog ensembles drawn from a gridded forecast
//!
//! Each cell-bin draws an independent Poisson count from its expected rate,
//! then events are placed uniformly within the cell, the magnitude bin, and
//! the time window. The output feeds the same ensemble format the
//! catalog-based tests consume, which makes it handy for exercising the
//! whole pipeline without real model output.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand_distr::{Distribution, Poisson};
use tracing::debug;

use namazu_core::{CoreError, SeismicEvent};

use crate::error::{EvalError, EvalResult};
use crate::forecast::{ForecastSource, GriddedForecast, SimulatedCatalog};

const MAX_DEPTH_KM: f64 = 30.0;

pub fn simulate_catalogs<R: Rng>(
    forecast: &GriddedForecast,
    window: (DateTime<Utc>, DateTime<Utc>),
    n_catalogs: usize,
    rng: &mut R,
) -> EvalResult<Vec<SimulatedCatalog>> {
    let (start, end) = window;
    let span_ms = (end - start).num_milliseconds();
    if span_ms <= 0 {
        return Err(CoreError::InvalidWindow(format!("{start} is not before {end}")).into());
    }

    let expected = forecast.expected_counts();
    let region = forecast.region();
    let bin_count = region.bin_count();
    let edges = region.bins().edges();
    let size = region.cell_size();

    // one sampler per cell-bin, hoisted out of the catalog loop
    let mut samplers: Vec<Option<Poisson<f64>>> = Vec::with_capacity(expected.len());
    for &rate in &expected {
        if rate > 0.0 {
            let dist = Poisson::new(rate).map_err(|e| EvalError::Stats(e.to_string()))?;
            samplers.push(Some(dist));
        } else {
            samplers.push(None);
        }
    }

    let mut catalogs = Vec::with_capacity(n_catalogs);
    for index in 0..n_catalogs {
        let mut events = Vec::new();
        for (i, sampler) in samplers.iter().enumerate() {
            let Some(sampler) = sampler else { continue };
            let count = sampler.sample(rng) as usize;
            let cell = region.cells()[i / bin_count];
            let (mag_low, mag_width) = bin_span(edges, i % bin_count);
            for _ in 0..count {
                let origin_time = start + Duration::milliseconds(rng.gen_range(0..span_ms));
                events.push(SeismicEvent::new(
                    format!("sim{index}-{}", events.len()),
                    origin_time,
                    cell.lon + rng.gen::<f64>() * size,
                    cell.lat + rng.gen::<f64>() * size,
                    rng.gen::<f64>() * MAX_DEPTH_KM,
                    mag_low + rng.gen::<f64>() * mag_width,
                ));
            }
        }
        events.sort_by_key(|e| e.origin_time);
        catalogs.push(SimulatedCatalog { index, events });
    }
    let total: usize = catalogs.iter().map(|c| c.events.len()).sum();
    debug!(
        forecast = forecast.name(),
        n_catalogs, total, "simulated catalog ensemble"
    );
    Ok(catalogs)
}

// The final bin is open-ended; reuse the previous bin's width for sampling.
fn bin_span(edges: &[f64], bin: usize) -> (f64, f64) {
    let low = edges[bin];
    if bin + 1 < edges.len() {
        (low, edges[bin + 1] - low)
    } else if edges.len() >= 2 {
        (low, low - edges[edges.len() - 2])
    } else {
        (low, 0.5)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use namazu_core::{MagnitudeBins, Region};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn forecast() -> GriddedForecast {
        let bins = MagnitudeBins::regular(5.0, 6.0, 0.5).unwrap();
        let region =
            Arc::new(Region::rect((10.0, 11.0), (40.0, 41.0), 0.5, bins).unwrap());
        let rates = vec![
            0.4, 0.2, 0.1, //
            0.3, 0.1, 0.0, //
            0.2, 0.1, 0.1, //
            0.1, 0.0, 0.0, //
        ];
        GriddedForecast::new("sim-source", region, rates, 1.0).unwrap()
    }

    fn window() -> (DateTime<Utc>, DateTime<Utc>) {
        (
            Utc.with_ymd_and_hms(2010, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2011, 1, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn same_seed_reproduces_the_ensemble() {
        let f = forecast();
        let mut a = StdRng::seed_from_u64(99);
        let mut b = StdRng::seed_from_u64(99);
        let first = simulate_catalogs(&f, window(), 20, &mut a).unwrap();
        let second = simulate_catalogs(&f, window(), 20, &mut b).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mean_event_count_tracks_the_expected_total() {
        let f = forecast();
        let mut rng = StdRng::seed_from_u64(5);
        let catalogs = simulate_catalogs(&f, window(), 500, &mut rng).unwrap();
        let total: usize = catalogs.iter().map(|c| c.events.len()).sum();
        let mean = total as f64 / 500.0;
        assert!(
            (mean - f.expected_total()).abs() < 0.25,
            "mean {mean} far from expectation {}",
            f.expected_total()
        );
    }

    #[test]
    fn events_land_inside_region_window_and_bins() {
        let f = forecast();
        let (start, end) = window();
        let mut rng = StdRng::seed_from_u64(11);
        let catalogs = simulate_catalogs(&f, window(), 50, &mut rng).unwrap();
        for catalog in &catalogs {
            for event in &catalog.events {
                assert!(f.region().contains(event.longitude, event.latitude));
                assert!(event.origin_time >= start && event.origin_time < end);
                assert!(event.magnitude >= f.region().bins().lowest());
            }
        }
    }

    #[test]
    fn catalogs_are_indexed_in_order() {
        let f = forecast();
        let mut rng = StdRng::seed_from_u64(3);
        let catalogs = simulate_catalogs(&f, window(), 10, &mut rng).unwrap();
        assert_eq!(catalogs.len(), 10);
        for (i, catalog) in catalogs.iter().enumerate() {
            assert_eq!(catalog.index, i);
        }
    }

    #[test]
    fn inverted_window_is_rejected() {
        let f = forecast();
        let (start, end) = window();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(simulate_catalogs(&f, (end, start), 5, &mut rng).is_err());
    }
}
