//! Observed event catalogs and their filters
//!
//! Filters are pure: each returns a new [`Catalog`] narrowed to the requested
//! slice and records what was applied, leaving the source untouched. They
//! compose in any order, applying the same filter twice is a no-op, and an
//! empty result is an ordinary catalog, not an error.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::event::SeismicEvent;
use crate::region::Region;

/// Named, time-ordered set of observed events plus the filters applied so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    name: String,
    events: Vec<SeismicEvent>,
    region: Option<Arc<Region>>,
    min_magnitude: Option<f64>,
    window: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl Catalog {
    /// New catalog. Events are sorted by origin time on construction.
    pub fn new(name: impl Into<String>, mut events: Vec<SeismicEvent>) -> Self {
        events.sort_by(|a, b| a.origin_time.cmp(&b.origin_time));
        Self {
            name: name.into(),
            events,
            region: None,
            min_magnitude: None,
            window: None,
        }
    }

    /// Keep events inside `[start, end)`.
    pub fn filter_time(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Catalog {
        let events: Vec<SeismicEvent> = self
            .events
            .iter()
            .filter(|e| e.origin_time >= start && e.origin_time < end)
            .cloned()
            .collect();
        self.narrowed("time", events, |c| c.window = Some((start, end)))
    }

    /// Keep events with magnitude at or above `min_magnitude`.
    pub fn filter_magnitude(&self, min_magnitude: f64) -> Catalog {
        let events: Vec<SeismicEvent> = self
            .events
            .iter()
            .filter(|e| e.magnitude >= min_magnitude)
            .cloned()
            .collect();
        self.narrowed("magnitude", events, |c| {
            c.min_magnitude = Some(min_magnitude)
        })
    }

    /// Keep events whose epicenter falls in one of the region's cells.
    ///
    /// This is purely spatial; magnitudes below the region's bins are kept
    /// until [`filter_magnitude`](Self::filter_magnitude) drops them.
    pub fn filter_region(&self, region: Arc<Region>) -> Catalog {
        let events: Vec<SeismicEvent> = self
            .events
            .iter()
            .filter(|e| region.contains(e.longitude, e.latitude))
            .cloned()
            .collect();
        self.narrowed("region", events, |c| c.region = Some(region))
    }

    fn narrowed(
        &self,
        filter: &str,
        events: Vec<SeismicEvent>,
        record: impl FnOnce(&mut Catalog),
    ) -> Catalog {
        if events.is_empty() && !self.events.is_empty() {
            warn!(
                catalog = %self.name,
                filter,
                "filter produced an empty catalog"
            );
        }
        let mut out = Catalog {
            name: self.name.clone(),
            events,
            region: self.region.clone(),
            min_magnitude: self.min_magnitude,
            window: self.window,
        };
        record(&mut out);
        out
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn events(&self) -> &[SeismicEvent] {
        &self.events
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Region recorded by the last [`filter_region`](Self::filter_region) call.
    pub fn region(&self) -> Option<&Arc<Region>> {
        self.region.as_ref()
    }

    /// Threshold recorded by the last magnitude filter.
    pub fn min_magnitude(&self) -> Option<f64> {
        self.min_magnitude
    }

    /// Window recorded by the last time filter.
    pub fn window(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.window
    }

    /// Origin times of the first and last event.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match (self.events.first(), self.events.last()) {
            (Some(a), Some(b)) => Some((a.origin_time, b.origin_time)),
            _ => None,
        }
    }

    /// Event counts over (cell, bin), row-major, matching the layout of a
    /// gridded forecast on the same region. Events outside the region or
    /// below the first bin edge are not counted.
    pub fn gridded_counts(&self, region: &Region) -> Vec<u64> {
        let bin_count = region.bin_count();
        let mut counts = vec![0u64; region.cell_count() * bin_count];
        for event in &self.events {
            let cell = region.cell_index_of(event.longitude, event.latitude);
            let bin = region.bins().index_of(event.magnitude);
            if let (Some(ci), Some(bi)) = (cell, bin) {
                counts[ci * bin_count + bi] += 1;
            }
        }
        counts
    }

    /// Event counts per cell.
    pub fn spatial_counts(&self, region: &Region) -> Vec<u64> {
        let mut counts = vec![0u64; region.cell_count()];
        for event in &self.events {
            if let Some(ci) = region.cell_index_of(event.longitude, event.latitude) {
                counts[ci] += 1;
            }
        }
        counts
    }

    /// Event counts per magnitude bin.
    pub fn magnitude_counts(&self, region: &Region) -> Vec<u64> {
        let mut counts = vec![0u64; region.bin_count()];
        for event in &self.events {
            if let Some(bi) = region.bins().index_of(event.magnitude) {
                counts[bi] += 1;
            }
        }
        counts
    }

    pub fn summary(&self) -> CatalogSummary {
        let (min_mag, max_mag) = self.events.iter().fold((None, None), |(lo, hi), e| {
            let lo = Some(lo.map_or(e.magnitude, |m: f64| m.min(e.magnitude)));
            let hi = Some(hi.map_or(e.magnitude, |m: f64| m.max(e.magnitude)));
            (lo, hi)
        });
        CatalogSummary {
            name: self.name.clone(),
            event_count: self.events.len(),
            span: self.time_span(),
            min_magnitude: min_mag,
            max_magnitude: max_mag,
        }
    }
}

/// Human-readable catalog digest.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogSummary {
    pub name: String,
    pub event_count: usize,
    pub span: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub min_magnitude: Option<f64>,
    pub max_magnitude: Option<f64>,
}

impl fmt::Display for CatalogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} events", self.name, self.event_count)?;
        if let Some((start, end)) = self.span {
            write!(
                f,
                ", {} to {}",
                start.format("%Y-%m-%d"),
                end.format("%Y-%m-%d")
            )?;
        }
        if let (Some(lo), Some(hi)) = (self.min_magnitude, self.max_magnitude) {
            write!(f, ", Mw {lo:.2}-{hi:.2}")?;
        }
        Ok(())
    }
}
