//! UI rendering module.
//!
//! Lays out the header, the timeline area, the segment readout and the log
//! panel, then draws the form and help overlays on top.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, FormField, LogLevel, TargetForm, ViewState, EMPTY_HINT, EMPTY_MESSAGE, FAILED_HINT};
use crate::theme::{colors, styles};
use crate::timeline::{TimelineStatusWidget, TimelineWidget};

const CHART_TITLE: &str = " User Status Timeline ";
const LOG_HEIGHT: u16 = 6;

/// Header, timeline, readout, logs
fn main_layout(area: Rect) -> [Rect; 4] {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),          // Header
            Constraint::Min(8),             // Timeline
            Constraint::Length(1),          // Segment readout
            Constraint::Length(LOG_HEIGHT), // Log area
        ])
        .split(area);
    [chunks[0], chunks[1], chunks[2], chunks[3]]
}

fn chart_block() -> Block<'static> {
    Block::default()
        .title(CHART_TITLE)
        .title_style(styles::title_accent())
        .borders(Borders::ALL)
        .border_style(styles::border())
        .style(Style::default().bg(colors::BG_DARK))
}

/// Area the chart lays itself out in, for a terminal of `area`
pub fn chart_viewport(area: Rect) -> Rect {
    chart_block().inner(main_layout(area)[1])
}

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let bg_block = Block::default().style(Style::default().bg(colors::BG_DARK));
    frame.render_widget(bg_block, area);

    let [header, chart, readout, logs] = main_layout(area);

    render_header(frame, app, header);
    render_timeline_area(frame, app, chart);
    render_readout(frame, app, readout);
    render_logs(frame, app, logs);

    if let Some(form) = &app.form {
        render_form_modal(frame, form, area);
    }

    if app.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.route {
        Some(route) => format!(
            " Guild {} · User {} · {} ",
            route.guild_id,
            route.user_id,
            route.date_text()
        ),
        None => " No target selected ".to_string(),
    };

    let dot_color = if app.api_connected {
        colors::STATUS_CONNECTED
    } else {
        colors::STATUS_DISCONNECTED
    };

    let line = Line::from(vec![
        Span::styled("● ", Style::default().fg(dot_color)),
        Span::styled(app.status_text(), styles::text_dim()),
        Span::styled(
            format!("  [{} · {}]", app.source, app.zone),
            styles::text_hint(),
        ),
    ]);

    let header = Paragraph::new(line).block(
        Block::default()
            .title(title)
            .title_style(styles::title())
            .borders(Borders::ALL)
            .border_style(styles::border())
            .style(Style::default().bg(colors::BG_MEDIUM)),
    );
    frame.render_widget(header, area);
}

fn render_timeline_area(frame: &mut Frame, app: &App, area: Rect) {
    let block = chart_block();
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if app.route.is_none() {
        render_message(
            frame,
            inner,
            vec![Line::from(Span::styled(
                "Press g to choose a guild and user",
                styles::text_dim(),
            ))],
        );
        return;
    }

    match &app.view {
        ViewState::Loading => render_message(
            frame,
            inner,
            vec![Line::from(Span::styled("Loading...", styles::text_dim()))],
        ),
        ViewState::Failed { detail } => render_message(
            frame,
            inner,
            vec![
                Line::from(Span::styled(format!("Error: {detail}"), styles::error())),
                Line::from(Span::styled(FAILED_HINT, styles::text_hint())),
            ],
        ),
        ViewState::Empty => render_message(
            frame,
            inner,
            vec![
                Line::from(Span::styled(EMPTY_MESSAGE, styles::info())),
                Line::from(Span::styled(EMPTY_HINT, styles::text_hint())),
            ],
        ),
        ViewState::Ready => frame.render_widget(TimelineWidget::new(&app.chart), inner),
    }
}

/// Vertically centered block of lines
fn render_message(frame: &mut Frame, area: Rect, lines: Vec<Line>) {
    let height = (lines.len() as u16).min(area.height);
    let y = area.y + area.height.saturating_sub(height) / 2;
    let paragraph = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, Rect::new(area.x, y, area.width, height));
}

fn render_readout(frame: &mut Frame, app: &App, area: Rect) {
    let area = Rect::new(area.x + 1, area.y, area.width.saturating_sub(2), area.height);
    if app.view == ViewState::Ready {
        frame.render_widget(TimelineStatusWidget::new(&app.chart), area);
    } else if app.rejected > 0 {
        let text = format!("{} record(s) skipped", app.rejected);
        frame.render_widget(Paragraph::new(text).style(styles::text_hint()), area);
    }
}

/// Render the log area
fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| {
            let (prefix, color) = match entry.level {
                LogLevel::Info => ("i", colors::BLUE),
                LogLevel::Success => ("+", colors::GREEN),
                LogLevel::Warning => ("!", colors::YELLOW),
                LogLevel::Error => ("x", colors::RED),
            };

            ListItem::new(Line::from(vec![
                Span::styled(entry.at.format("%H:%M:%S ").to_string(), styles::text_hint()),
                Span::styled(format!("[{prefix}] "), Style::default().fg(color)),
                Span::styled(entry.message.as_str(), styles::text_dim()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Log ")
            .title_style(styles::text_dim())
            .borders(Borders::ALL)
            .border_style(styles::border_dim())
            .style(Style::default().bg(colors::BG_DARK)),
    );

    frame.render_widget(list, area);
}

/// Render the target form modal
fn render_form_modal(frame: &mut Frame, form: &TargetForm, area: Rect) {
    let popup_area = centered_rect(52, 16, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(" Choose Timeline ")
        .title_style(styles::title())
        .borders(Borders::ALL)
        .border_style(styles::border_focused())
        .style(Style::default().bg(colors::BG_MEDIUM));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Guild ID
            Constraint::Length(3), // User ID
            Constraint::Length(3), // Date
            Constraint::Length(1), // Error
            Constraint::Length(1), // Buttons
        ])
        .split(inner);

    let focused = form.current_field();
    for (field, chunk) in [FormField::GuildId, FormField::UserId, FormField::Date]
        .into_iter()
        .zip(chunks.iter())
    {
        render_text_field(
            frame,
            field.label(),
            form.text(field).unwrap_or_default(),
            focused == field,
            *chunk,
        );
    }

    if let Some(error) = &form.error {
        let error_text = Paragraph::new(error.as_str())
            .style(styles::error())
            .alignment(Alignment::Center);
        frame.render_widget(error_text, chunks[3]);
    }

    render_form_buttons(
        frame,
        focused == FormField::SubmitButton,
        focused == FormField::CancelButton,
        chunks[4],
    );
}

fn render_text_field(frame: &mut Frame, label: &str, value: &str, is_focused: bool, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(11), Constraint::Min(10)])
        .split(area);

    let label_text = Paragraph::new(format!("{label}:"))
        .style(styles::form_label())
        .alignment(Alignment::Right);
    frame.render_widget(label_text, Rect::new(chunks[0].x, chunks[0].y + 1, chunks[0].width, 1));

    let input_style = if is_focused {
        styles::form_input_focused()
    } else {
        styles::form_input()
    };

    let cursor = if is_focused { "█" } else { "" };
    let input = Paragraph::new(format!(" {value}{cursor}"))
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if is_focused {
                    styles::border_focused()
                } else {
                    styles::border_dim()
                }),
        );
    frame.render_widget(input, chunks[1]);
}

fn render_form_buttons(frame: &mut Frame, submit_focused: bool, cancel_focused: bool, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Length(17),
            Constraint::Length(2),
            Constraint::Length(12),
            Constraint::Percentage(20),
        ])
        .split(area);

    let submit_style = if submit_focused {
        styles::button_focused()
    } else {
        styles::button()
    };
    let submit = Paragraph::new(format!("[ {} ]", FormField::SubmitButton.label()))
        .style(submit_style)
        .alignment(Alignment::Center);
    frame.render_widget(submit, chunks[1]);

    let cancel_style = if cancel_focused {
        styles::button_cancel_focused()
    } else {
        styles::button()
    };
    let cancel = Paragraph::new(format!("[ {} ]", FormField::CancelButton.label()))
        .style(cancel_style)
        .alignment(Alignment::Center);
    frame.render_widget(cancel, chunks[3]);
}

fn help_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {keys:<16}"), styles::key_hint()),
        Span::raw(action),
    ])
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(56, 21, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled("Keyboard Shortcuts", styles::title())),
        Line::from(""),
        Line::from(Span::styled("Timeline", styles::section())),
        help_line("h/l or [/]", "Previous / next day"),
        help_line("t", "Jump to today"),
        help_line("Left/Right", "Inspect previous / next segment"),
        help_line("Tab/Shift+Tab", "Same as Left/Right"),
        help_line("r", "Refresh the current day"),
        Line::from(""),
        Line::from(Span::styled("Target Form", styles::section())),
        help_line("g", "Choose guild, user and date"),
        help_line("Tab/Up/Down", "Move between fields"),
        help_line("+/-", "Date field: next / previous day"),
        help_line("Enter", "Next field / submit"),
        help_line("Esc", "Close the form"),
        Line::from(""),
        Line::from(Span::styled("General", styles::section())),
        help_line("?", "Toggle this help"),
        help_line("q/Ctrl+C", "Quit"),
    ];

    let paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .title_style(styles::title())
                .borders(Borders::ALL)
                .border_style(styles::border())
                .style(Style::default().bg(colors::BG_MEDIUM)),
        )
        .style(styles::text());

    frame.render_widget(paragraph, popup_area);
}

/// Helper to create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
