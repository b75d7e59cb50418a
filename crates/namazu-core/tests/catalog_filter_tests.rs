//! Catalog filter laws: purity, idempotence, composition order

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use namazu_core::{Catalog, MagnitudeBins, Region, SeismicEvent};

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

fn italy_region() -> Arc<Region> {
    let bins = MagnitudeBins::regular(4.95, 8.95, 0.1).unwrap();
    Arc::new(Region::rect((6.0, 19.0), (36.0, 47.0), 0.5, bins).unwrap())
}

fn test_catalog() -> Catalog {
    Catalog::new(
        "rcmt",
        vec![
            SeismicEvent::new("e1", at(2009, 4, 6), 13.33, 42.33, 8.3, 6.1),
            SeismicEvent::new("e2", at(2010, 8, 16), 12.72, 43.03, 6.5, 4.6),
            SeismicEvent::new("e3", at(2012, 5, 20), 11.23, 44.89, 6.3, 5.86),
            SeismicEvent::new("e4", at(2012, 5, 29), 11.09, 44.85, 10.2, 5.66),
            SeismicEvent::new("e5", at(2013, 6, 21), 10.14, 44.18, 5.0, 5.19),
            SeismicEvent::new("e6", at(2016, 8, 24), 13.23, 42.70, 8.0, 6.18),
            SeismicEvent::new("far", at(2012, 1, 1), 139.7, 35.7, 30.0, 6.5),
        ],
    )
}

// ==========================================================================
// Idempotence
// ==========================================================================

#[test]
fn test_filter_region_is_idempotent() {
    let region = italy_region();
    let catalog = test_catalog();
    let once = catalog.filter_region(region.clone());
    let twice = once.filter_region(region);
    assert_eq!(once, twice);
}

#[test]
fn test_filter_magnitude_is_idempotent() {
    let catalog = test_catalog();
    let once = catalog.filter_magnitude(4.95);
    let twice = once.filter_magnitude(4.95);
    assert_eq!(once, twice);
}

#[test]
fn test_filter_time_is_idempotent() {
    let catalog = test_catalog();
    let once = catalog.filter_time(at(2010, 1, 1), at(2015, 1, 1));
    let twice = once.filter_time(at(2010, 1, 1), at(2015, 1, 1));
    assert_eq!(once, twice);
}

// ==========================================================================
// Composition
// ==========================================================================

#[test]
fn test_filter_order_does_not_matter() {
    let region = italy_region();
    let catalog = test_catalog();

    let a = catalog
        .filter_region(region.clone())
        .filter_magnitude(4.95)
        .filter_time(at(2010, 1, 1), at(2015, 1, 1));
    let b = catalog
        .filter_time(at(2010, 1, 1), at(2015, 1, 1))
        .filter_magnitude(4.95)
        .filter_region(region);

    assert_eq!(a, b);
}

#[test]
fn test_composed_filters_narrow_as_expected() {
    let catalog = test_catalog()
        .filter_region(italy_region())
        .filter_magnitude(4.95)
        .filter_time(at(2010, 1, 1), at(2015, 1, 1));

    // e1 predates the window, e2 is below threshold, e6 postdates the
    // window, "far" is outside the region
    let ids: Vec<&str> = catalog.events().iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["e3", "e4", "e5"]);
}

#[test]
fn test_filters_record_what_was_applied() {
    let region = italy_region();
    let catalog = test_catalog()
        .filter_region(region.clone())
        .filter_magnitude(4.95)
        .filter_time(at(2010, 1, 1), at(2015, 1, 1));

    assert!(catalog.region().is_some());
    assert_eq!(catalog.min_magnitude(), Some(4.95));
    assert_eq!(catalog.window(), Some((at(2010, 1, 1), at(2015, 1, 1))));
    assert_eq!(*catalog.region().unwrap().as_ref(), *region.as_ref());
}

// ==========================================================================
// Empty results
// ==========================================================================

#[test]
fn test_disjoint_region_yields_empty_without_error() {
    let bins = MagnitudeBins::regular(4.95, 8.95, 0.1).unwrap();
    let pacific = Arc::new(Region::rect((150.0, 160.0), (-10.0, 0.0), 0.5, bins).unwrap());

    let filtered = test_catalog().filter_region(pacific);
    assert!(filtered.is_empty());
    assert_eq!(filtered.event_count(), 0);
}

#[test]
fn test_empty_catalog_filters_stay_empty() {
    let empty = Catalog::new("empty", vec![]);
    let filtered = empty
        .filter_magnitude(5.0)
        .filter_time(at(2010, 1, 1), at(2015, 1, 1));
    assert!(filtered.is_empty());
    assert_eq!(filtered.summary().span, None);
}

#[test]
fn test_empty_catalog_counts_are_zero() {
    let region = italy_region();
    let empty = Catalog::new("empty", vec![]).filter_region(region.clone());
    assert_eq!(
        empty.gridded_counts(&region).iter().sum::<u64>(),
        0,
        "empty catalog grids to all-zero counts"
    );
}
