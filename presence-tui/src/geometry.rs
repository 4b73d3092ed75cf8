//! Pure chart geometry.
//!
//! Everything here works in pixel units on an `f64` plane so the rules
//! (bar height ratio, clipping, the label legibility threshold) read the same
//! as they would on a canvas. The terminal widget converts to cells with
//! [`CellMetrics`] only at the very end.

use chrono::{Duration, NaiveDateTime, Timelike};

use crate::models::{AxisWindow, Segment, SegmentLabel};

/// Bar height as a fraction of one category band
pub const BAR_HEIGHT_RATIO: f64 = 0.6;

/// Bars narrower than this (after clipping) hide their text
pub const LABEL_MIN_WIDTH_PX: f64 = 50.0;

/// Spacing of ticks and gridlines on the time axis
pub const TICK_INTERVAL_SECS: i64 = 3600;

/// Marker drawn before tooltip text
pub const SWATCH: char = '●';

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointPx {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectPx {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RectPx {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Portion of `self` inside `bounds`; `None` when nothing remains
    pub fn clip(&self, bounds: &RectPx) -> Option<RectPx> {
        let x0 = self.x.max(bounds.x);
        let x1 = self.right().min(bounds.right());
        let y0 = self.y.max(bounds.y);
        let y1 = self.bottom().min(bounds.bottom());

        if x1 > x0 && y1 > y0 {
            Some(RectPx::new(x0, y0, x1 - x0, y1 - y0))
        } else {
            None
        }
    }
}

/// Fractional insets of the plotting grid inside the chart area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridMargins {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

impl Default for GridMargins {
    fn default() -> Self {
        Self {
            left: 0.05,
            right: 0.05,
            top: 0.10,
            bottom: 0.15,
        }
    }
}

impl GridMargins {
    pub fn apply(&self, area: RectPx) -> RectPx {
        let left = area.width * self.left;
        let right = area.width * self.right;
        let top = area.height * self.top;
        let bottom = area.height * self.bottom;
        RectPx::new(
            area.x + left,
            area.y + top,
            (area.width - left - right).max(0.0),
            (area.height - top - bottom).max(0.0),
        )
    }
}

/// Maps (time, band) onto the plotting area
#[derive(Debug, Clone, PartialEq)]
pub struct TimeScale {
    window: AxisWindow,
    plot: RectPx,
    bands: u16,
}

impl TimeScale {
    pub fn new(window: AxisWindow, plot: RectPx, bands: u16) -> Self {
        Self {
            window,
            plot,
            bands: bands.max(1),
        }
    }

    pub fn plot(&self) -> RectPx {
        self.plot
    }

    pub fn band_height(&self) -> f64 {
        self.plot.height / self.bands as f64
    }

    /// Horizontal position of an instant. Instants outside the window map
    /// outside the plot.
    pub fn x_for(&self, at: NaiveDateTime) -> f64 {
        let span = self.window.span_secs();
        if span <= 0 {
            return self.plot.x;
        }
        let offset_secs = (at - self.window.min).num_milliseconds() as f64 / 1000.0;
        self.plot.x + offset_secs * self.plot.width / span as f64
    }

    /// Center of `band` at instant `at`
    pub fn coord(&self, at: NaiveDateTime, band: u16) -> PointPx {
        PointPx {
            x: self.x_for(at),
            y: self.plot.y + self.band_height() * (band as f64 + 0.5),
        }
    }

    /// Hour ticks inside the window, labelled `HH:00`
    pub fn ticks(&self) -> Vec<Tick> {
        let mut ticks = Vec::new();
        let Some(mut at) = first_tick(self.window.min) else {
            return ticks;
        };
        while at <= self.window.max {
            ticks.push(Tick {
                x: self.x_for(at),
                label: at.format("%H:00").to_string(),
            });
            match at.checked_add_signed(Duration::seconds(TICK_INTERVAL_SECS)) {
                Some(next) => at = next,
                None => break,
            }
        }
        ticks
    }
}

fn first_tick(min: NaiveDateTime) -> Option<NaiveDateTime> {
    let floor = min.with_nanosecond(0)?.with_second(0)?.with_minute(0)?;
    if floor < min {
        floor.checked_add_signed(Duration::seconds(TICK_INTERVAL_SECS))
    } else {
        Some(floor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub x: f64,
    pub label: String,
}

/// Drawable outcome for one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentShape {
    /// Index into the segment list the shape was built from
    pub index: usize,
    /// Bar rectangle, already clipped to the plot
    pub rect: RectPx,
    pub label_visible: bool,
}

/// Build the clipped bar for `segment` in `band`.
///
/// Returns `None` for degenerate segments and for segments entirely outside
/// the plotting area.
pub fn segment_shape(
    scale: &TimeScale,
    index: usize,
    band: u16,
    segment: &Segment,
) -> Option<SegmentShape> {
    if segment.is_degenerate() {
        return None;
    }

    let start = scale.coord(segment.start, band);
    let end = scale.coord(segment.end, band);
    let height = scale.band_height() * BAR_HEIGHT_RATIO;

    let rect = RectPx::new(start.x, start.y - height / 2.0, end.x - start.x, height);
    let rect = rect.clip(&scale.plot())?;

    Some(SegmentShape {
        index,
        rect,
        label_visible: rect.width >= LABEL_MIN_WIDTH_PX,
    })
}

/// Hover/focus text for a segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tooltip {
    pub label: SegmentLabel,
    pub start: String,
    pub end: String,
}

impl Tooltip {
    pub fn for_segment(segment: &Segment) -> Self {
        Self {
            label: segment.label.clone(),
            start: segment.start.format("%H:%M").to_string(),
            end: segment.end.format("%H:%M").to_string(),
        }
    }

    /// Text without the swatch
    pub fn text(&self) -> String {
        format!("{}: {} - {}", self.label, self.start, self.end)
    }
}

impl std::fmt::Display for Tooltip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", SWATCH, self.text())
    }
}

/// Terminal cell size in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellMetrics {
    pub width: f64,
    pub height: f64,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            width: 8.0,
            height: 16.0,
        }
    }
}

impl CellMetrics {
    /// Half-open column range `[start, end)` nearest to `[x0, x1)`.
    ///
    /// Bars sharing an edge get disjoint, gap-free column ranges. A bar
    /// narrower than half a cell may get an empty range.
    pub fn columns(&self, x0: f64, x1: f64) -> (u16, u16) {
        let start = snap(x0, self.width);
        (start, snap(x1, self.width).max(start))
    }

    /// Half-open row range covered by `[y0, y1)`
    pub fn rows(&self, y0: f64, y1: f64) -> (u16, u16) {
        span_cells(y0, y1, self.height)
    }
}

fn snap(p: f64, cell: f64) -> u16 {
    (p / cell).round().max(0.0) as u16
}

fn span_cells(p0: f64, p1: f64, cell: f64) -> (u16, u16) {
    let start = snap(p0, cell);
    let end = snap(p1, cell);
    if p1 > p0 && end <= start {
        (start, start + 1)
    } else {
        (start, end.max(start))
    }
}
