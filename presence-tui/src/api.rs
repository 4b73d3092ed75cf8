//! API client for the presence backend.
//!
//! One request per (community, user, date). No cache and no retry: callers
//! re-issue a fetch when the route changes or the user asks for a refresh.
//! All methods are non-blocking and run on worker tasks spawned by `main`.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;

use crate::error::FetchError;
use crate::models::{DisplayZone, RawStatusRecord, Route, TIMESTAMP_FORMAT};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// Path of the per-day status-changes endpoint
const STATUS_CHANGES_PATH: &str = "/api/status-changes";

/// Path answered by a live backend
const HEALTH_PATH: &str = "/api/hello";

/// Client for the status-changes backend
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client with the specified base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Endpoint for a route, without the date query
    pub fn status_changes_url(&self, route: &Route) -> String {
        format!(
            "{}{}/{}/{}",
            self.base_url, STATUS_CHANGES_PATH, route.guild_id, route.user_id
        )
    }

    /// Fetch the status records for one user on one day.
    ///
    /// `Ok(vec![])` means the backend answered and has nothing for that day.
    pub async fn fetch_status_changes(
        &self,
        route: &Route,
    ) -> Result<Vec<RawStatusRecord>, FetchError> {
        let url = self.status_changes_url(route);
        tracing::debug!(%url, date = %route.date_text(), "fetching status changes");

        let response = self
            .client
            .get(&url)
            .query(&[("date", route.date_text())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), %route, "status-changes request failed");
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let records: Vec<RawStatusRecord> = serde_json::from_str(&body)?;
        tracing::info!(count = records.len(), %route, "status changes loaded");
        Ok(records)
    }

    /// Health check against the backend's hello endpoint
    pub async fn health_check(&self) -> bool {
        let url = format!("{}{}", self.base_url, HEALTH_PATH);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(err) => {
                tracing::debug!(error = %err, "health check failed");
                false
            }
        }
    }
}

/// Where day records come from
#[derive(Debug, Clone)]
pub enum DaySource {
    Http(ApiClient),
    /// Built-in sample day, laid out in the given zone's wall-clock time
    Demo(DisplayZone),
}

impl DaySource {
    pub async fn fetch_day(&self, route: &Route) -> Result<Vec<RawStatusRecord>, FetchError> {
        match self {
            DaySource::Http(client) => client.fetch_status_changes(route).await,
            DaySource::Demo(zone) => Ok(demo_records(route.date, *zone)),
        }
    }

    pub async fn health_check(&self) -> bool {
        match self {
            DaySource::Http(client) => client.health_check().await,
            DaySource::Demo(_) => true,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            DaySource::Http(client) => client.base_url().to_string(),
            DaySource::Demo(_) => "demo data".to_string(),
        }
    }
}

/// Sample day as (start, end, status), times relative to the requested date
const DEMO_DAY: &[(&str, &str, &str)] = &[
    ("00:00:00", "06:00:00", "offline"),
    ("06:00:00", "08:00:00", "idle"),
    ("08:00:00", "10:30:00", "online"),
    ("10:30:00", "11:00:00", "idle"),
    ("11:00:00", "12:30:00", "online"),
    ("12:30:00", "13:00:00", "dnd"),
    ("13:00:00", "15:30:00", "online"),
    ("15:30:00", "16:00:00", "dnd"),
    ("16:00:00", "16:30:00", "idle"),
    ("16:30:00", "17:30:00", "online"),
    ("17:30:00", "24:00:00", "offline"),
];

/// The sample day shifted onto `date`, as the backend would serve it.
///
/// Timestamps are emitted in RFC 3339 UTC so that, once normalized into
/// `zone`, the bars land on the sample's wall-clock hours.
pub fn demo_records(date: NaiveDate, zone: DisplayZone) -> Vec<RawStatusRecord> {
    DEMO_DAY
        .iter()
        .filter_map(|(start, end, status)| {
            let start = to_rfc3339(wall_clock_on(date, start)?, zone)?;
            let end = to_rfc3339(wall_clock_on(date, end)?, zone)?;
            Some(RawStatusRecord::new(start, end, *status))
        })
        .collect()
}

fn wall_clock_on(date: NaiveDate, time: &str) -> Option<NaiveDateTime> {
    if time == "24:00:00" {
        return date.succ_opt()?.and_hms_opt(0, 0, 0);
    }
    let raw = format!("{} {}", date.format("%Y-%m-%d"), time);
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).ok()
}

fn to_rfc3339(wall_clock: NaiveDateTime, zone: DisplayZone) -> Option<String> {
    let instant = match zone {
        DisplayZone::Utc => wall_clock.and_utc(),
        DisplayZone::Local => Local
            .from_local_datetime(&wall_clock)
            .earliest()?
            .with_timezone(&Utc),
    };
    Some(instant.to_rfc3339())
}

/// Messages sent from API workers to the main TUI thread
#[derive(Debug, Clone)]
pub enum ApiMessage {
    /// Records for a route arrived
    DayLoaded {
        generation: u64,
        route: Route,
        records: Vec<RawStatusRecord>,
    },
    /// The fetch for a route failed
    DayFailed {
        generation: u64,
        route: Route,
        error: FetchError,
    },
    /// API connection status changed
    ConnectionStatus(bool),
}

/// Commands sent from TUI to the API worker
#[derive(Debug, Clone)]
pub enum ApiCommand {
    /// Fetch one day; the generation tags the eventual reply
    FetchDay { generation: u64, route: Route },
    /// Check API connection status
    CheckConnection,
    /// Shutdown the API worker
    Shutdown,
}
