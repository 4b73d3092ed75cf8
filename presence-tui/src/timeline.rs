//! Timeline widget for the presence chart.
//!
//! Draws a laid-out [`TimelineChart`] into a ratatui buffer: hour gridlines,
//! one filled bar per visible segment with its label centered on it, the
//! `HH:00` axis and the status legend along the bottom.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::chart::{ChartLayout, TimelineChart};
use crate::geometry::SWATCH;
use crate::models::StatusLabel;
use crate::theme::{bar_color, blend_colors, colors, segment_fill, status_color, styles};

const GRIDLINE: char = '│';
const ELLIPSIS: char = '…';

/// How far a focused bar is lightened toward white
const FOCUS_LIGHTEN: f32 = 0.3;

/// Space between legend entries
const LEGEND_GAP: u16 = 3;

/// Fit `text` into `width` terminal columns, ending in an ellipsis when cut
pub fn fit_label(text: &str, width: usize) -> Option<String> {
    if width == 0 {
        return None;
    }
    if text.width() <= width {
        return Some(text.to_string());
    }

    let budget = width - 1;
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if used + ch_width > budget {
            break;
        }
        used += ch_width;
        out.push(ch);
    }
    out.push(ELLIPSIS);
    Some(out)
}

/// Display width of `text` in cells
fn cell_width(text: &str) -> u16 {
    u16::try_from(text.width()).unwrap_or(u16::MAX)
}

/// Write `text` starting at (x, y), clipped to `area`. Wide glyphs take two
/// cells and are dropped when either cell falls outside `area`.
fn put_str(buf: &mut Buffer, area: Rect, x: u16, y: u16, text: &str, style: Style) {
    if y < area.y || y >= area.bottom() {
        return;
    }
    let mut col = x as usize;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if ch_width == 0 {
            continue;
        }
        if col + ch_width > area.right() as usize {
            break;
        }
        if col >= area.x as usize {
            if let Some(cell) = buf.cell_mut((col as u16, y)) {
                cell.set_char(ch).set_style(style);
            }
            for trailing in col + 1..col + ch_width {
                if let Some(cell) = buf.cell_mut((trailing as u16, y)) {
                    cell.set_char(' ').set_style(style);
                }
            }
        }
        col += ch_width;
    }
}

/// Presence timeline widget
pub struct TimelineWidget<'a> {
    chart: &'a TimelineChart,
}

impl<'a> TimelineWidget<'a> {
    pub fn new(chart: &'a TimelineChart) -> Self {
        Self { chart }
    }

    fn render_gridlines(&self, layout: &ChartLayout, area: Rect, buf: &mut Buffer) {
        let style = Style::default().fg(colors::GRIDLINE);
        for tick in &layout.ticks {
            for y in layout.plot.y..layout.plot.bottom() {
                put_str(buf, area, tick.column, y, &GRIDLINE.to_string(), style);
            }
        }
    }

    fn render_bars(&self, layout: &ChartLayout, area: Rect, buf: &mut Buffer) {
        let segments = self.chart.segments();
        let focused = self.chart.focused();

        for bar in &layout.bars {
            let Some(segment) = segments.get(bar.shape.index) else {
                continue;
            };
            let is_focused = focused == Some(bar.shape.index);

            let mut fill = bar_color(&segment.label);
            if is_focused {
                fill = blend_colors(fill, colors::BAR_TEXT, FOCUS_LIGHTEN);
            }

            let blank = " ".repeat(bar.area.width as usize);
            for y in bar.area.y..bar.area.bottom() {
                put_str(buf, area, bar.area.x, y, &blank, Style::default().bg(fill));
            }

            if !bar.shape.label_visible {
                continue;
            }
            let Some(text) = fit_label(segment.label.text(), bar.area.width as usize) else {
                continue;
            };

            let text_width = cell_width(&text);
            let x = bar.area.x + (bar.area.width - text_width) / 2;
            let y = bar.area.y + bar.area.height / 2;
            let mut style = Style::default()
                .fg(colors::BAR_TEXT)
                .bg(fill)
                .add_modifier(Modifier::BOLD);
            if is_focused {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            put_str(buf, area, x, y, &text, style);
        }
    }

    fn render_axis(&self, layout: &ChartLayout, area: Rect, buf: &mut Buffer) {
        // Labels are centered on their tick; ones that would collide with the
        // previous label are skipped.
        let mut next_free = area.x;
        for tick in &layout.ticks {
            let width = cell_width(&tick.label);
            let x = tick
                .column
                .saturating_sub(width / 2)
                .max(area.x)
                .min(area.right().saturating_sub(width));
            if x < next_free {
                continue;
            }
            put_str(buf, area, x, layout.axis_row, &tick.label, styles::text_dim());
            next_free = x + width + 1;
        }
    }

    fn render_legend(&self, layout: &ChartLayout, area: Rect, buf: &mut Buffer) {
        let entries: Vec<(String, Style)> = StatusLabel::all()
            .iter()
            .map(|label| {
                (
                    label.name().to_string(),
                    Style::default().fg(status_color(*label)),
                )
            })
            .collect();

        let total: u16 = entries
            .iter()
            .map(|(name, _)| cell_width(name) + 2)
            .sum::<u16>()
            + LEGEND_GAP * (entries.len() as u16).saturating_sub(1);

        let mut x = area.x + area.width.saturating_sub(total) / 2;
        for (name, swatch_style) in entries {
            put_str(buf, area, x, layout.legend_row, &SWATCH.to_string(), swatch_style);
            put_str(buf, area, x + 2, layout.legend_row, &name, styles::text_dim());
            x += cell_width(&name) + 2 + LEGEND_GAP;
        }
    }
}

impl Widget for TimelineWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(layout) = self.chart.layout() else {
            if area.height > 0 {
                let y = area.y + area.height / 2;
                Paragraph::new("Window too small for the timeline")
                    .style(styles::text_hint())
                    .centered()
                    .render(Rect::new(area.x, y, area.width, 1), buf);
            }
            return;
        };

        let area = area.intersection(layout.viewport);
        self.render_gridlines(layout, area, buf);
        self.render_bars(layout, area, buf);
        self.render_axis(layout, area, buf);
        self.render_legend(layout, area, buf);
    }
}

/// One-line readout under the chart: the focused segment's tooltip, or a hint
pub struct TimelineStatusWidget<'a> {
    chart: &'a TimelineChart,
}

impl<'a> TimelineStatusWidget<'a> {
    pub fn new(chart: &'a TimelineChart) -> Self {
        Self { chart }
    }
}

impl Widget for TimelineStatusWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let count = self.chart.segments().len();

        let mut spans = match self.chart.tooltip() {
            Some(tooltip) => vec![
                Span::styled(
                    format!("{SWATCH} "),
                    Style::default().fg(segment_fill(&tooltip.label)),
                ),
                Span::styled(tooltip.text(), styles::text()),
            ],
            None => vec![Span::styled("←/→ inspect segments", styles::text_hint())],
        };

        let position = self
            .chart
            .focused()
            .map(|i| format!("  {} of {}", i + 1, count))
            .unwrap_or_else(|| {
                let plural = if count == 1 { "" } else { "s" };
                format!("  {count} segment{plural}")
            });
        spans.push(Span::styled(position, styles::text_dim()));

        Paragraph::new(Line::from(spans)).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AxisWindow, Segment, SegmentLabel, TIMESTAMP_FORMAT};
    use crate::theme::presence;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;
    use tokio::sync::watch;

    fn ts(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap()
    }

    fn seg(start: &str, end: &str, label: impl Into<SegmentLabel>) -> Segment {
        Segment::new(0, ts(start), ts(end), label)
    }

    fn chart_with(viewport: Rect, segments: Vec<Segment>) -> (TimelineChart, watch::Sender<Rect>) {
        let (tx, rx) = watch::channel(viewport);
        let mut chart = TimelineChart::new();
        chart.mount(rx).unwrap();
        chart
            .update(
                segments,
                AxisWindow::for_date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()),
            )
            .unwrap();
        (chart, tx)
    }

    fn render(chart: &TimelineChart, area: Rect) -> Buffer {
        let mut buf = Buffer::empty(area);
        TimelineWidget::new(chart).render(area, &mut buf);
        buf
    }

    fn row_text(buf: &Buffer, y: u16) -> String {
        (buf.area.x..buf.area.right())
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect()
    }

    #[test]
    fn test_fit_label() {
        assert_eq!(fit_label("Online", 10), Some("Online".to_string()));
        assert_eq!(fit_label("Do Not Disturb", 6), Some("Do No…".to_string()));
        assert_eq!(fit_label("Idle", 1), Some("…".to_string()));
        assert_eq!(fit_label("Idle", 0), None);
    }

    #[test]
    fn test_fit_label_counts_wide_glyphs_as_two_cells() {
        assert_eq!(fit_label("在线", 4), Some("在线".to_string()));
        assert_eq!(fit_label("在线状态", 5), Some("在线…".to_string()));
        assert_eq!(fit_label("在线状态", 4), Some("在…".to_string()));
        assert_eq!(fit_label("在线", 2), Some("…".to_string()));
    }

    #[test]
    fn test_wide_unmapped_label_stays_inside_its_bar() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(
            area,
            vec![seg(
                "2024-01-01 08:00:00",
                "2024-01-01 10:30:00",
                SegmentLabel::from_raw("在线状态在线状态"),
            )],
        );
        let buf = render(&chart, area);

        let bar = chart.layout().unwrap().bars[0].area;
        let fill = bar_color(&SegmentLabel::from_raw("在线状态在线状态"));
        let y = bar.y + bar.height / 2;
        assert!(row_text(&buf, y).contains('…'));
        assert_ne!(buf[(bar.x - 1, y)].bg, fill);
        assert_ne!(buf[(bar.right(), y)].bg, fill);
    }

    #[test]
    fn test_online_bar_draws_fill_and_label() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(
            area,
            vec![seg("2024-01-01 08:00:00", "2024-01-01 10:30:00", StatusLabel::Online)],
        );
        let buf = render(&chart, area);

        let bar = chart.layout().unwrap().bars[0].area;
        let fill = bar_color(&SegmentLabel::Canonical(StatusLabel::Online));
        assert_eq!(buf[(bar.x, bar.y)].bg, fill);
        assert_eq!(buf[(bar.right() - 1, bar.bottom() - 1)].bg, fill);

        let label_row = row_text(&buf, bar.y + bar.height / 2);
        assert!(label_row.contains("Online"));
    }

    #[test]
    fn test_narrow_bar_is_drawn_without_label() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(
            area,
            vec![seg("2024-01-01 12:00:00", "2024-01-01 12:15:00", StatusLabel::DoNotDisturb)],
        );
        let buf = render(&chart, area);

        let bar = &chart.layout().unwrap().bars[0];
        assert!(!bar.shape.label_visible);
        let fill = bar_color(&SegmentLabel::Canonical(StatusLabel::DoNotDisturb));
        assert_eq!(buf[(bar.area.x, bar.area.y)].bg, fill);
        for y in bar.area.y..bar.area.bottom() {
            assert!(!row_text(&buf, y).contains("Do"));
        }
    }

    #[test]
    fn test_unmapped_status_uses_fallback_fill() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(
            area,
            vec![seg(
                "2024-01-01 08:00:00",
                "2024-01-01 12:00:00",
                SegmentLabel::from_raw("banned"),
            )],
        );
        let buf = render(&chart, area);

        let bar = chart.layout().unwrap().bars[0].area;
        assert_eq!(
            buf[(bar.x, bar.y)].bg,
            blend_colors(colors::BG_DARK, presence::UNMAPPED, crate::theme::BAR_OPACITY)
        );
        assert!(row_text(&buf, bar.y + bar.height / 2).contains("banned"));
    }

    #[test]
    fn test_legend_lists_every_status() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(area, Vec::new());
        let buf = render(&chart, area);

        let legend = row_text(&buf, chart.layout().unwrap().legend_row);
        for label in StatusLabel::all() {
            assert!(legend.contains(label.name()), "missing {label} in {legend:?}");
        }
    }

    #[test]
    fn test_axis_labels_do_not_overlap() {
        let area = Rect::new(0, 0, 120, 12);
        let (chart, _tx) = chart_with(area, Vec::new());
        let buf = render(&chart, area);

        let axis = row_text(&buf, chart.layout().unwrap().axis_row);
        assert!(axis.contains("00:00"));
        for word in axis.split_whitespace() {
            assert_eq!(word.len(), 5, "garbled axis label {word:?}");
            assert!(word.ends_with(":00"));
        }
    }

    #[test]
    fn test_too_small_area_shows_hint() {
        let area = Rect::new(0, 0, 40, 3);
        let (chart, _tx) = chart_with(area, Vec::new());
        let buf = render(&chart, area);
        assert!(row_text(&buf, 1).contains("too small"));
    }

    #[test]
    fn test_status_line_shows_focused_tooltip() {
        let area = Rect::new(0, 0, 120, 12);
        let (mut chart, _tx) = chart_with(
            area,
            vec![seg("2024-01-01 08:00:00", "2024-01-01 10:30:00", StatusLabel::Online)],
        );
        chart.focus_next();

        let line = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(line);
        TimelineStatusWidget::new(&chart).render(line, &mut buf);

        let text = row_text(&buf, 0);
        assert!(text.starts_with("● Online: 08:00 - 10:30"));
        assert!(text.contains("1 of 1"));
        assert_eq!(buf[(0, 0)].fg, presence::ONLINE);
    }
}
