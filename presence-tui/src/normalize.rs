//! Raw status records to timeline segments.
//!
//! Records are translated one-to-one and in order. Nothing is sorted,
//! merged or deduplicated; the backend is trusted to return a sensible day.
//! Records whose bounds cannot be parsed, or whose duration is not positive,
//! are dropped here so the renderer only ever sees `start < end`.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

use crate::models::{DisplayZone, RawStatusRecord, Segment, SegmentLabel};

/// Lane every segment lands on for a single-user view
pub const DEFAULT_ROW: u16 = 0;

/// Fallback layouts for timestamps without an offset (read as UTC)
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Output of a normalization pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub segments: Vec<Segment>,
    /// Records dropped for unparseable or non-positive bounds
    pub rejected: usize,
}

impl Normalized {
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Normalize a day's records into segments in `zone` wall-clock time
pub fn normalize(records: &[RawStatusRecord], zone: DisplayZone) -> Normalized {
    let mut out = Normalized {
        segments: Vec::with_capacity(records.len()),
        rejected: 0,
    };

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record, zone) {
            Some(segment) => out.segments.push(segment),
            None => {
                out.rejected += 1;
                tracing::warn!(
                    index,
                    start = %record.start_time,
                    end = %record.end_time,
                    status = %record.status,
                    "dropping status record with invalid bounds"
                );
            }
        }
    }

    tracing::debug!(
        kept = out.segments.len(),
        rejected = out.rejected,
        "normalized status records"
    );
    out
}

/// Normalize one record. `None` when the bounds are unusable.
pub fn normalize_record(record: &RawStatusRecord, zone: DisplayZone) -> Option<Segment> {
    let start = wall_clock(&record.start_time, zone)?;
    let end = wall_clock(&record.end_time, zone)?;

    let segment = Segment::new(
        DEFAULT_ROW,
        start,
        end,
        SegmentLabel::from_raw(&record.status),
    );
    (!segment.is_degenerate()).then_some(segment)
}

/// Parse a backend timestamp into an instant
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

fn wall_clock(raw: &str, zone: DisplayZone) -> Option<NaiveDateTime> {
    parse_instant(raw).map(|instant| zone.wall_clock(instant).trunc_subsecs(0))
}
