//! Domain models for the presence timeline.
//!
//! `RawStatusRecord` mirrors the JSON served by the status-changes endpoint.
//! Everything downstream works on the typed `Segment` / `AxisWindow` pair,
//! with instants expressed as wall-clock time in the display zone.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Canonical timestamp format used by the time axis and segment bounds
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Date format used in routes and the fetch query string
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================
// Wire records
// ============================================

/// One status period as returned by the backend (read)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawStatusRecord {
    pub start_time: String,
    pub end_time: String,
    pub status: String,
}

impl RawStatusRecord {
    pub fn new(
        start_time: impl Into<String>,
        end_time: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            start_time: start_time.into(),
            end_time: end_time.into(),
            status: status.into(),
        }
    }
}

// ============================================
// Status labels
// ============================================

/// Display vocabulary for presence statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusLabel {
    Online,
    Idle,
    DoNotDisturb,
    Offline,
}

impl StatusLabel {
    /// All canonical labels, in legend order
    pub fn all() -> &'static [StatusLabel] {
        &[
            StatusLabel::Online,
            StatusLabel::Idle,
            StatusLabel::DoNotDisturb,
            StatusLabel::Offline,
        ]
    }

    /// Translate a backend status. Case-insensitive; `None` for anything
    /// outside the table.
    pub fn from_raw(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "online" => Some(StatusLabel::Online),
            "idle" => Some(StatusLabel::Idle),
            "dnd" => Some(StatusLabel::DoNotDisturb),
            "offline" => Some(StatusLabel::Offline),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatusLabel::Online => "Online",
            StatusLabel::Idle => "Idle",
            StatusLabel::DoNotDisturb => "Do Not Disturb",
            StatusLabel::Offline => "Offline",
        }
    }
}

impl std::fmt::Display for StatusLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Label carried by a segment: a canonical status, or the backend's string
/// when it is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SegmentLabel {
    Canonical(StatusLabel),
    Unmapped(String),
}

impl SegmentLabel {
    pub fn from_raw(raw: &str) -> Self {
        match StatusLabel::from_raw(raw) {
            Some(label) => SegmentLabel::Canonical(label),
            None => SegmentLabel::Unmapped(raw.to_string()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SegmentLabel::Canonical(label) => label.name(),
            SegmentLabel::Unmapped(raw) => raw,
        }
    }
}

impl From<StatusLabel> for SegmentLabel {
    fn from(label: StatusLabel) -> Self {
        SegmentLabel::Canonical(label)
    }
}

impl std::fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

// ============================================
// Segments and axis window
// ============================================

/// One contiguous interval with a single status, on a given lane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub row: u16,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub label: SegmentLabel,
}

impl Segment {
    pub fn new(
        row: u16,
        start: NaiveDateTime,
        end: NaiveDateTime,
        label: impl Into<SegmentLabel>,
    ) -> Self {
        Self {
            row,
            start,
            end,
            label: label.into(),
        }
    }

    /// Zero or negative duration
    pub fn is_degenerate(&self) -> bool {
        self.start >= self.end
    }

    /// Start as `YYYY-MM-DD HH:MM:SS`
    pub fn start_text(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_text(&self) -> String {
        self.end.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// Visible time bounds of the chart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisWindow {
    pub min: NaiveDateTime,
    pub max: NaiveDateTime,
}

impl AxisWindow {
    /// Whole calendar day: `00:00:00 ..= 23:59:59`
    pub fn for_date(date: NaiveDate) -> Self {
        let min = date.and_time(NaiveTime::MIN);
        let max = date
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| min + chrono::Duration::seconds(86_399));
        Self { min, max }
    }

    /// Parse the host-supplied `axisMin` / `axisMax` strings
    pub fn parse(min: &str, max: &str) -> Result<Self, ValidationError> {
        let parse = |raw: &str| {
            NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
                .map_err(|_| ValidationError::InvalidAxisBound(raw.to_string()))
        };
        let window = Self {
            min: parse(min)?,
            max: parse(max)?,
        };
        if window.min >= window.max {
            return Err(ValidationError::EmptyAxisWindow);
        }
        Ok(window)
    }

    pub fn span_secs(&self) -> i64 {
        (self.max - self.min).num_seconds()
    }
}

// ============================================
// Routing
// ============================================

/// The (community, user, date) triple addressing one timeline view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub guild_id: String,
    pub user_id: String,
    pub date: NaiveDate,
}

impl Route {
    /// Validate identifiers and build a route
    pub fn new(
        guild_id: &str,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Self, ValidationError> {
        let guild_id = guild_id.trim();
        let user_id = user_id.trim();

        if guild_id.is_empty() || user_id.is_empty() {
            return Err(ValidationError::MissingId);
        }
        if !is_numeric_id(guild_id) || !is_numeric_id(user_id) {
            return Err(ValidationError::NonNumericId);
        }

        Ok(Self {
            guild_id: guild_id.to_string(),
            user_id: user_id.to_string(),
            date,
        })
    }

    /// Same target on a different day
    pub fn with_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    pub fn date_text(&self) -> String {
        self.date.format(DATE_FORMAT).to_string()
    }

    /// Chart axis bounds for the routed day, as `YYYY-MM-DD HH:MM:SS` strings
    pub fn axis_bounds(&self) -> (String, String) {
        let window = AxisWindow::for_date(self.date);
        (
            window.min.format(TIMESTAMP_FORMAT).to_string(),
            window.max.format(TIMESTAMP_FORMAT).to_string(),
        )
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{} @ {}", self.guild_id, self.user_id, self.date_text())
    }
}

fn is_numeric_id(id: &str) -> bool {
    id.chars().all(|c| c.is_ascii_digit())
}

/// Parse a `YYYY-MM-DD` date
pub fn parse_date(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::InvalidDate(raw.to_string()))
}

// ============================================
// Display zone
// ============================================

/// Timezone that segment bounds, ticks and tooltips are expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayZone {
    #[default]
    Local,
    Utc,
}

impl DisplayZone {
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        match self {
            DisplayZone::Local => instant.with_timezone(&Local).naive_local(),
            DisplayZone::Utc => instant.naive_utc(),
        }
    }

    /// Current calendar date in this zone
    pub fn today(&self) -> NaiveDate {
        self.wall_clock(Utc::now()).date()
    }
}

impl std::str::FromStr for DisplayZone {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(DisplayZone::Local),
            "utc" => Ok(DisplayZone::Utc),
            other => Err(format!("unknown display zone '{other}' (expected local or utc)")),
        }
    }
}

impl std::fmt::Display for DisplayZone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisplayZone::Local => write!(f, "local"),
            DisplayZone::Utc => write!(f, "utc"),
        }
    }
}
