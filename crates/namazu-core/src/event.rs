//! Observed seismic events

use chrono::{DateTime, Utc};

/// One observed earthquake.
#[derive(Debug, Clone, PartialEq)]
pub struct SeismicEvent {
    /// Source-catalog identifier
    pub id: String,
    pub origin_time: DateTime<Utc>,
    pub longitude: f64,
    pub latitude: f64,
    pub depth_km: f64,
    pub magnitude: f64,
}

impl SeismicEvent {
    pub fn new(
        id: impl Into<String>,
        origin_time: DateTime<Utc>,
        longitude: f64,
        latitude: f64,
        depth_km: f64,
        magnitude: f64,
    ) -> Self {
        Self {
            id: id.into(),
            origin_time,
            longitude,
            latitude,
            depth_km,
            magnitude,
        }
    }
}
