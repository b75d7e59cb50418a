//! Client for FDSN-style event web services
//!
//! Talks to the `event/1/query` endpoint in `format=text` mode, where the
//! response is pipe-delimited with one event per line:
//!
//! ```text
//! #EventID|Time|Latitude|Longitude|Depth/Km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName
//! 2012xyz|2012-05-20T02:03:52.900000|44.89|11.23|6.3|INGV|...|...|...|Mw|5.86|INGV|Emilia
//! ```
//!
//! Errors here stay local to the module. The evaluation pipeline never
//! performs network access; only the fetch front end does.

use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use namazu_core::{Bounds, Catalog, SeismicEvent};

pub const DEFAULT_SERVICE_URL: &str = "https://webservices.ingv.it/fdsnws/event/1/query";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    #[error("service returned {status}: {message}")]
    Service { status: u16, message: String },

    #[error("response line {line}: {message}")]
    Body { line: usize, message: String },
}

pub type ClientResult<T> = Result<T, ClientError>;

/// Parameters for one event search.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub min_magnitude: Option<f64>,
    pub bounds: Option<Bounds>,
}

/// Blocking client for one service base URL.
pub struct CatalogServiceClient {
    base_url: String,
    http: Client,
}

impl CatalogServiceClient {
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("namazu/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch matching events as a catalog named `name`.
    ///
    /// A `204 No Content` reply is a valid empty catalog, not an error.
    pub fn fetch(&self, name: &str, query: &EventQuery) -> ClientResult<Catalog> {
        let mut params: Vec<(&str, String)> = vec![
            ("format", "text".to_string()),
            (
                "starttime",
                query.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            (
                "endtime",
                query.end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
        ];
        if let Some(min) = query.min_magnitude {
            params.push(("minmagnitude", format!("{min}")));
        }
        if let Some(b) = query.bounds {
            params.push(("minlongitude", format!("{}", b.min_lon)));
            params.push(("maxlongitude", format!("{}", b.max_lon)));
            params.push(("minlatitude", format!("{}", b.min_lat)));
            params.push(("maxlatitude", format!("{}", b.max_lat)));
        }

        debug!(url = %self.base_url, catalog = name, "querying event service");
        let response = self.http.get(&self.base_url).query(&params).send()?;
        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            info!(catalog = name, "service matched no events");
            return Ok(Catalog::new(name, Vec::new()));
        }
        if !status.is_success() {
            let mut message = response.text().unwrap_or_else(|_| String::new());
            message.truncate(MAX_ERROR_BODY);
            return Err(ClientError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text()?;
        let events = parse_event_text(&body)?;
        info!(catalog = name, events = events.len(), "fetched events");
        Ok(Catalog::new(name, events))
    }
}

fn parse_event_text(body: &str) -> ClientResult<Vec<SeismicEvent>> {
    let mut events = Vec::new();
    for (i, line) in body.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        events.push(parse_event_line(trimmed, line_no)?);
    }
    Ok(events)
}

fn parse_event_line(line: &str, line_no: usize) -> ClientResult<SeismicEvent> {
    let cols: Vec<&str> = line.split('|').map(str::trim).collect();
    if cols.len() < 11 {
        return Err(ClientError::Body {
            line: line_no,
            message: format!(
                "expected at least 11 pipe-delimited fields, found {}",
                cols.len()
            ),
        });
    }
    Ok(SeismicEvent {
        id: cols[0].to_string(),
        origin_time: parse_service_time(cols[1], line_no)?,
        longitude: field_f64(cols[3], "longitude", line_no)?,
        latitude: field_f64(cols[2], "latitude", line_no)?,
        depth_km: field_f64(cols[4], "depth", line_no)?,
        magnitude: field_f64(cols[10], "magnitude", line_no)?,
    })
}

// Services emit naive UTC timestamps like 2012-05-20T02:03:52.900000,
// occasionally with an explicit offset.
fn parse_service_time(field: &str, line_no: usize) -> ClientResult<DateTime<Utc>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(field) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(field, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|t| t.and_utc())
        .map_err(|e| ClientError::Body {
            line: line_no,
            message: format!("invalid time '{field}': {e}"),
        })
}

fn field_f64(field: &str, name: &str, line_no: usize) -> ClientResult<f64> {
    field.parse().map_err(|_| ClientError::Body {
        line: line_no,
        message: format!("invalid {name} '{field}'"),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SAMPLE: &str = "\
#EventID|Time|Latitude|Longitude|Depth/Km|Author|Catalog|Contributor|ContributorID|MagType|Magnitude|MagAuthor|EventLocationName
2012xyz|2012-05-20T02:03:52.900000|44.89|11.23|6.3|INGV|ISIDE|INGV|2012xyz|Mw|5.86|INGV|Emilia
2012abc|2012-05-29T07:00:03.000000|44.85|11.09|10.2|INGV|ISIDE|INGV|2012abc|Mw|5.66|INGV|Emilia
";

    #[test]
    fn parses_pipe_delimited_events() {
        let events = parse_event_text(SAMPLE).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "2012xyz");
        assert!((events[0].longitude - 11.23).abs() < 1e-12);
        assert!((events[0].latitude - 44.89).abs() < 1e-12);
        assert!((events[0].magnitude - 5.86).abs() < 1e-12);
    }

    #[test]
    fn parses_naive_service_timestamps_as_utc() {
        let t = parse_service_time("2012-05-20T02:03:52.900000", 1).unwrap();
        let expected = Utc.with_ymd_and_hms(2012, 5, 20, 2, 3, 52).unwrap()
            + chrono::Duration::milliseconds(900);
        assert_eq!(t, expected);
    }

    #[test]
    fn short_line_reports_its_number() {
        let body = "#header\na|b|c\n";
        let err = parse_event_text(body).unwrap_err();
        match err {
            ClientError::Body { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bad_magnitude_field_is_an_error() {
        let line = "id|2012-05-20T02:03:52|44.0|11.0|6.3|a|b|c|d|Mw|not-a-number|x|y";
        assert!(parse_event_line(line, 7).is_err());
    }
}
