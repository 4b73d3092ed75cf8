//! The owned chart surface.
//!
//! A `TimelineChart` moves through `Uninitialized → Mounted → Updated* →
//! Disposed`. While mounted it holds a subscription to viewport changes
//! (a `watch::Receiver`), which is released by `dispose`. Dropping the chart
//! disposes it, so every unmount path releases the subscription.
//!
//! Layout is recomputed in place on `update` (new data or window) and on
//! `resize` (new viewport, same segments).

use ratatui::layout::Rect;
use tokio::sync::watch;

use crate::error::ChartError;
use crate::geometry::{segment_shape, CellMetrics, GridMargins, RectPx, SegmentShape, TimeScale, Tooltip};
use crate::models::{AxisWindow, Segment};

/// Smallest viewport the chart will lay out into
const MIN_VIEWPORT_WIDTH: u16 = 20;
const MIN_VIEWPORT_HEIGHT: u16 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartState {
    #[default]
    Uninitialized,
    Mounted,
    Updated,
    Disposed,
}

/// A bar positioned in terminal cells
#[derive(Debug, Clone, PartialEq)]
pub struct BarCells {
    pub shape: SegmentShape,
    pub area: Rect,
}

/// An hour tick positioned in terminal cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickCell {
    pub column: u16,
    pub label: String,
}

/// Everything the widget needs to draw one frame
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLayout {
    pub viewport: Rect,
    /// Plotting grid, in absolute cells
    pub plot: Rect,
    pub axis_row: u16,
    pub legend_row: u16,
    pub bars: Vec<BarCells>,
    pub ticks: Vec<TickCell>,
}

impl ChartLayout {
    /// Lay out `segments` against `window` inside `viewport`.
    ///
    /// `None` when the viewport is too small to hold a plot.
    pub fn compute(
        viewport: Rect,
        window: AxisWindow,
        segments: &[Segment],
        cells: CellMetrics,
        margins: GridMargins,
    ) -> Option<Self> {
        if viewport.width < MIN_VIEWPORT_WIDTH || viewport.height < MIN_VIEWPORT_HEIGHT {
            return None;
        }

        let area_px = RectPx::new(
            0.0,
            0.0,
            viewport.width as f64 * cells.width,
            viewport.height as f64 * cells.height,
        );
        let grid = margins.apply(area_px);

        // Snap the grid inward to whole cells; keep one row for tick labels
        // and one for the legend.
        let col0 = (grid.x / cells.width).ceil() as u16;
        let col1 = ((grid.right() / cells.width).floor() as u16).min(viewport.width);
        let row0 = (grid.y / cells.height).ceil() as u16;
        let row1 = ((grid.bottom() / cells.height).floor() as u16).min(viewport.height - 2);
        if col1 <= col0 || row1 <= row0 {
            return None;
        }

        let plot_px = RectPx::new(
            col0 as f64 * cells.width,
            row0 as f64 * cells.height,
            (col1 - col0) as f64 * cells.width,
            (row1 - row0) as f64 * cells.height,
        );

        let rows = distinct_rows(segments);
        let scale = TimeScale::new(window, plot_px, rows.len() as u16);

        // Bars wider than half a cell own the columns nearest their edges.
        // Thinner ones get a single column, but only where nothing else in
        // their band is drawn.
        let mut solid: Vec<(u16, BarCells)> = Vec::new();
        let mut thin: Vec<(u16, SegmentShape, u16, u16)> = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            let Ok(band) = rows.binary_search(&segment.row) else {
                continue;
            };
            let band = band as u16;
            let Some(shape) = segment_shape(&scale, index, band, segment) else {
                continue;
            };

            let (r0, r1) = cells.rows(shape.rect.y, shape.rect.bottom());
            let r0 = r0.clamp(row0, row1 - 1);
            let r1 = r1.clamp(r0 + 1, row1);

            let (c0, c1) = cells.columns(shape.rect.x, shape.rect.right());
            let c0 = c0.max(col0);
            let c1 = c1.min(col1);
            if c1 > c0 {
                let area = Rect::new(viewport.x + c0, viewport.y + r0, c1 - c0, r1 - r0);
                solid.push((band, BarCells { shape, area }));
            } else {
                thin.push((band, shape, r0, r1));
            }
        }

        let mut bars: Vec<BarCells> = Vec::with_capacity(solid.len() + thin.len());
        let mut taken: Vec<(u16, Rect)> = solid
            .iter()
            .map(|(band, bar)| (*band, bar.area))
            .collect();
        bars.extend(solid.into_iter().map(|(_, bar)| bar));

        for (band, shape, r0, r1) in thin {
            let (c0, _) = cells.columns(shape.rect.x, shape.rect.right());
            let column = viewport.x + c0.clamp(col0, col1 - 1);
            let occupied = taken
                .iter()
                .any(|(b, area)| *b == band && (area.x..area.right()).contains(&column));
            if occupied {
                continue;
            }
            let area = Rect::new(column, viewport.y + r0, 1, r1 - r0);
            taken.push((band, area));
            bars.push(BarCells { shape, area });
        }
        bars.sort_by_key(|bar| bar.shape.index);

        let ticks = scale
            .ticks()
            .into_iter()
            .filter_map(|tick| {
                let column = (tick.x / cells.width).round() as u16;
                (col0..col1)
                    .contains(&column)
                    .then(|| TickCell {
                        column: viewport.x + column,
                        label: tick.label,
                    })
            })
            .collect();

        Some(Self {
            viewport,
            plot: Rect::new(viewport.x + col0, viewport.y + row0, col1 - col0, row1 - row0),
            axis_row: viewport.y + row1,
            legend_row: viewport.y + viewport.height - 1,
            bars,
            ticks,
        })
    }
}

fn distinct_rows(segments: &[Segment]) -> Vec<u16> {
    let mut rows: Vec<u16> = segments.iter().map(|s| s.row).collect();
    rows.sort_unstable();
    rows.dedup();
    rows
}

/// Chart surface owned by one mounted view
#[derive(Debug, Default)]
pub struct TimelineChart {
    state: ChartState,
    segments: Vec<Segment>,
    window: Option<AxisWindow>,
    viewport: Rect,
    layout: Option<ChartLayout>,
    resize_rx: Option<watch::Receiver<Rect>>,
    /// Index into `segments` of the bar showing its tooltip
    focused: Option<usize>,
    cells: CellMetrics,
    margins: GridMargins,
}

impl TimelineChart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ChartState {
        self.state
    }

    pub fn is_mounted(&self) -> bool {
        matches!(self.state, ChartState::Mounted | ChartState::Updated)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[cfg(test)]
    pub fn window(&self) -> Option<AxisWindow> {
        self.window
    }

    pub fn layout(&self) -> Option<&ChartLayout> {
        self.layout.as_ref()
    }

    /// Attach to a viewport and subscribe to its changes
    pub fn mount(&mut self, mut resize_rx: watch::Receiver<Rect>) -> Result<(), ChartError> {
        match self.state {
            ChartState::Disposed => return Err(ChartError::Disposed),
            ChartState::Mounted | ChartState::Updated => return Err(ChartError::AlreadyMounted),
            ChartState::Uninitialized => {}
        }

        self.viewport = *resize_rx.borrow_and_update();
        self.resize_rx = Some(resize_rx);
        self.state = ChartState::Mounted;
        self.relayout();

        tracing::debug!(viewport = ?self.viewport, "timeline chart mounted");
        Ok(())
    }

    /// Replace the data and axis window. Before mounting, the data is staged
    /// and laid out on `mount`.
    pub fn update(&mut self, segments: Vec<Segment>, window: AxisWindow) -> Result<(), ChartError> {
        if self.state == ChartState::Disposed {
            return Err(ChartError::Disposed);
        }

        self.segments = segments;
        self.window = Some(window);
        self.focused = None;

        if self.is_mounted() {
            self.state = ChartState::Updated;
            self.relayout();
        }

        tracing::debug!(
            segments = self.segments.len(),
            first = ?self.segments.first().map(Segment::start_text),
            last = ?self.segments.last().map(Segment::end_text),
            "timeline chart updated"
        );
        Ok(())
    }

    /// Drop the data while staying mounted
    pub fn clear(&mut self) {
        self.segments.clear();
        self.focused = None;
        self.layout = None;
    }

    /// Apply a pending viewport change from the subscription, if any
    pub fn poll_resize(&mut self) -> bool {
        let Some(rx) = self.resize_rx.as_mut() else {
            return false;
        };
        match rx.has_changed() {
            Ok(true) => {
                let viewport = *rx.borrow_and_update();
                self.resize(viewport)
            }
            _ => false,
        }
    }

    /// Re-layout for a new viewport. Segments are not touched.
    pub fn resize(&mut self, viewport: Rect) -> bool {
        if !self.is_mounted() || viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.relayout();
        tracing::trace!(?viewport, "timeline chart resized");
        true
    }

    /// Release the viewport subscription and all data
    pub fn dispose(&mut self) {
        if self.state == ChartState::Disposed {
            return;
        }
        self.resize_rx = None;
        self.segments = Vec::new();
        self.window = None;
        self.layout = None;
        self.focused = None;
        self.state = ChartState::Disposed;
        tracing::debug!("timeline chart disposed");
    }

    fn relayout(&mut self) {
        self.layout = match self.window {
            Some(window) if self.is_mounted() => ChartLayout::compute(
                self.viewport,
                window,
                &self.segments,
                self.cells,
                self.margins,
            ),
            _ => None,
        };
    }

    // ============================================
    // Focus and tooltip
    // ============================================

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn focused_segment(&self) -> Option<&Segment> {
        self.focused.and_then(|i| self.segments.get(i))
    }

    pub fn tooltip(&self) -> Option<Tooltip> {
        self.focused_segment().map(Tooltip::for_segment)
    }

    /// Move focus to the next visible bar
    pub fn focus_next(&mut self) {
        let visible = self.visible_indices();
        if visible.is_empty() {
            self.focused = None;
            return;
        }
        self.focused = Some(match self.focused.and_then(|f| visible.iter().position(|&i| i == f)) {
            Some(pos) if pos + 1 < visible.len() => visible[pos + 1],
            Some(_) => visible[0],
            None => visible[0],
        });
    }

    /// Move focus to the previous visible bar
    pub fn focus_previous(&mut self) {
        let visible = self.visible_indices();
        if visible.is_empty() {
            self.focused = None;
            return;
        }
        self.focused = Some(match self.focused.and_then(|f| visible.iter().position(|&i| i == f)) {
            Some(pos) if pos > 0 => visible[pos - 1],
            Some(_) => visible[visible.len() - 1],
            None => visible[visible.len() - 1],
        });
    }

    fn visible_indices(&self) -> Vec<usize> {
        self.layout
            .as_ref()
            .map(|layout| layout.bars.iter().map(|bar| bar.shape.index).collect())
            .unwrap_or_default()
    }
}

impl Drop for TimelineChart {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SegmentLabel, StatusLabel, TIMESTAMP_FORMAT};
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap()
    }

    fn day() -> AxisWindow {
        AxisWindow::for_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
    }

    fn seg(start: &str, end: &str, label: impl Into<SegmentLabel>) -> Segment {
        Segment::new(0, ts(start), ts(end), label)
    }

    fn sample() -> Vec<Segment> {
        vec![
            seg("2024-01-01 06:00:00", "2024-01-01 08:00:00", StatusLabel::Idle),
            seg("2024-01-01 08:00:00", "2024-01-01 10:30:00", StatusLabel::Online),
            seg("2024-01-01 10:30:00", "2024-01-01 11:00:00", StatusLabel::DoNotDisturb),
        ]
    }

    fn mounted(viewport: Rect) -> (TimelineChart, watch::Sender<Rect>) {
        let (tx, rx) = watch::channel(viewport);
        let mut chart = TimelineChart::new();
        chart.mount(rx).unwrap();
        (chart, tx)
    }

    #[test]
    fn test_lifecycle_transitions() {
        let (tx, rx) = watch::channel(Rect::new(0, 0, 120, 12));
        let mut chart = TimelineChart::new();
        assert_eq!(chart.state(), ChartState::Uninitialized);

        chart.mount(rx).unwrap();
        assert_eq!(chart.state(), ChartState::Mounted);

        chart.update(sample(), day()).unwrap();
        chart.update(sample(), day()).unwrap();
        assert_eq!(chart.state(), ChartState::Updated);

        chart.dispose();
        assert_eq!(chart.state(), ChartState::Disposed);
        assert_eq!(chart.update(sample(), day()), Err(ChartError::Disposed));
        assert!(chart.layout().is_none());
        drop(tx);
    }

    #[test]
    fn test_dispose_releases_resize_subscription() {
        let (chart, tx) = mounted(Rect::new(0, 0, 120, 12));
        assert_eq!(tx.receiver_count(), 1);

        let mut chart = chart;
        chart.dispose();
        assert_eq!(tx.receiver_count(), 0);
    }

    #[test]
    fn test_drop_releases_resize_subscription() {
        let (chart, tx) = mounted(Rect::new(0, 0, 120, 12));
        drop(chart);
        assert_eq!(tx.receiver_count(), 0);
    }

    #[test]
    fn test_mount_twice_is_rejected() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 12));
        let (_tx2, rx2) = watch::channel(Rect::new(0, 0, 80, 10));
        assert_eq!(chart.mount(rx2), Err(ChartError::AlreadyMounted));
    }

    #[test]
    fn test_data_staged_before_mount_is_laid_out_on_mount() {
        let mut chart = TimelineChart::new();
        chart.update(sample(), day()).unwrap();
        assert!(chart.layout().is_none());

        let (_tx, rx) = watch::channel(Rect::new(0, 0, 120, 12));
        chart.mount(rx).unwrap();
        assert_eq!(chart.layout().unwrap().bars.len(), 3);
    }

    #[test]
    fn test_resize_relayouts_without_touching_segments() {
        let (mut chart, tx) = mounted(Rect::new(0, 0, 120, 12));
        chart.update(sample(), day()).unwrap();
        let before = chart.layout().unwrap().clone();

        tx.send(Rect::new(0, 0, 200, 20)).unwrap();
        assert!(chart.poll_resize());
        assert!(!chart.poll_resize());

        let after = chart.layout().unwrap();
        assert_eq!(chart.segments(), sample().as_slice());
        assert_eq!(after.viewport, Rect::new(0, 0, 200, 20));
        assert!(after.plot.width > before.plot.width);
        assert_eq!(after.bars.len(), before.bars.len());
    }

    #[test]
    fn test_layout_stays_inside_viewport() {
        let viewport = Rect::new(3, 2, 100, 12);
        let (mut chart, _tx) = mounted(viewport);
        chart
            .update(
                vec![
                    seg("2023-12-31 20:00:00", "2024-01-01 02:00:00", StatusLabel::Offline),
                    seg("2024-01-01 23:59:58", "2024-01-02 06:00:00", StatusLabel::Online),
                ],
                day(),
            )
            .unwrap();

        let layout = chart.layout().unwrap();
        assert_eq!(layout.bars.len(), 2);
        for bar in &layout.bars {
            assert!(bar.area.x >= layout.plot.x);
            assert!(bar.area.right() <= layout.plot.right());
            assert!(bar.area.y >= layout.plot.y);
            assert!(bar.area.bottom() <= layout.plot.bottom());
            assert!(bar.area.width >= 1);
        }
        assert!(layout.axis_row < layout.legend_row);
        assert_eq!(layout.legend_row, viewport.bottom() - 1);
    }

    #[test]
    fn test_adjacent_bars_do_not_overlap_in_cells() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 160, 12));
        chart.update(sample(), day()).unwrap();
        let bars = &chart.layout().unwrap().bars;
        assert_eq!(bars[0].area.right(), bars[1].area.x);
        assert_eq!(bars[1].area.right(), bars[2].area.x);
    }

    #[test]
    fn test_sliver_at_plot_edge_does_not_cover_its_neighbour() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 12));
        chart
            .update(
                vec![
                    seg("2024-01-01 20:00:00", "2024-01-01 23:59:50", StatusLabel::Online),
                    seg("2024-01-01 23:59:50", "2024-01-02 00:30:00", StatusLabel::Idle),
                ],
                day(),
            )
            .unwrap();

        let layout = chart.layout().unwrap();
        assert_eq!(layout.bars.len(), 1);
        assert_eq!(layout.bars[0].shape.index, 0);
        assert_eq!(layout.bars[0].area.right(), layout.plot.right());
    }

    #[test]
    fn test_sliver_with_free_column_keeps_one_cell() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 12));
        chart
            .update(
                vec![
                    seg("2024-01-01 08:00:00", "2024-01-01 09:00:00", StatusLabel::Online),
                    seg("2024-01-01 15:00:00", "2024-01-01 15:00:20", StatusLabel::DoNotDisturb),
                ],
                day(),
            )
            .unwrap();

        let bars = &chart.layout().unwrap().bars;
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].shape.index, 1);
        assert_eq!(bars[1].area.width, 1);
        assert!(bars[0].area.right() <= bars[1].area.x);
    }

    #[test]
    fn test_segment_outside_window_draws_nothing() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 12));
        chart
            .update(
                vec![seg("2024-01-02 01:00:00", "2024-01-02 02:00:00", StatusLabel::Idle)],
                day(),
            )
            .unwrap();
        assert!(chart.layout().unwrap().bars.is_empty());
    }

    #[test]
    fn test_too_small_viewport_has_no_layout() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 10, 3));
        chart.update(sample(), day()).unwrap();
        assert!(chart.layout().is_none());
    }

    #[test]
    fn test_rows_get_their_own_bands() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 20));
        let mut second_lane = seg("2024-01-01 08:00:00", "2024-01-01 09:00:00", StatusLabel::Idle);
        second_lane.row = 3;
        chart
            .update(
                vec![
                    seg("2024-01-01 08:00:00", "2024-01-01 09:00:00", StatusLabel::Online),
                    second_lane,
                ],
                day(),
            )
            .unwrap();

        let bars = &chart.layout().unwrap().bars;
        assert!(bars[0].area.bottom() <= bars[1].area.y);
    }

    #[test]
    fn test_focus_cycles_visible_bars_and_builds_tooltip() {
        let (mut chart, _tx) = mounted(Rect::new(0, 0, 120, 12));
        chart.update(sample(), day()).unwrap();
        assert!(chart.tooltip().is_none());

        chart.focus_next();
        assert_eq!(chart.focused(), Some(0));
        chart.focus_next();
        assert_eq!(chart.tooltip().unwrap().text(), "Online: 08:00 - 10:30");
        chart.focus_previous();
        chart.focus_previous();
        assert_eq!(chart.focused(), Some(2));

        chart.update(sample(), day()).unwrap();
        assert_eq!(chart.focused(), None);
    }
}
