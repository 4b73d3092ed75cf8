//! Kanagawa Dragon theme module.
//!
//! Low-contrast, warm, dark palette for the chrome, plus the fixed presence
//! colors every status label is bound to.

use ratatui::style::Color;

use crate::models::{SegmentLabel, StatusLabel};

/// Kanagawa Dragon color palette
pub mod colors {
    use super::Color;

    // === Background Colors ===
    /// Dragon Black - Primary background
    pub const BG_DARK: Color = Color::Rgb(0x18, 0x16, 0x16);
    /// Slightly lighter background for medium contrast areas
    pub const BG_MEDIUM: Color = Color::Rgb(0x1D, 0x1C, 0x19);
    /// Background for highlighted/selected areas
    pub const BG_HIGHLIGHT: Color = Color::Rgb(0x28, 0x27, 0x27);

    // === Foreground Colors ===
    /// Old White - Primary text color
    pub const FG_PRIMARY: Color = Color::Rgb(0xC5, 0xC9, 0xC5);
    /// Dimmed text for secondary information
    pub const FG_DIM: Color = Color::Rgb(0x72, 0x71, 0x69);
    /// Very dim text for hints and placeholders
    pub const FG_HINT: Color = Color::Rgb(0x54, 0x54, 0x54);

    // === Accent Colors ===
    /// Dragon Red - errors
    pub const RED: Color = Color::Rgb(0xC4, 0x74, 0x6E);
    /// Dragon Green - success
    pub const GREEN: Color = Color::Rgb(0x8A, 0x9A, 0x7B);
    /// Carp Yellow - warnings, pending
    pub const YELLOW: Color = Color::Rgb(0xC4, 0xB2, 0x8A);
    /// Dragon Blue - info, focus
    pub const BLUE: Color = Color::Rgb(0x8B, 0xA4, 0xB0);
    /// Purple - titles
    pub const PURPLE: Color = Color::Rgb(0x95, 0x7F, 0xB8);

    // === UI Element Colors ===
    /// Wall Gray - For borders and separators
    pub const BORDER: Color = Color::Rgb(0x72, 0x71, 0x69);
    /// Dim border for less important separators
    pub const BORDER_DIM: Color = Color::Rgb(0x3A, 0x3A, 0x3A);
    /// Accent border for focused elements
    pub const BORDER_ACCENT: Color = Color::Rgb(0x8B, 0xA4, 0xB0);

    // === Status Colors ===
    pub const STATUS_CONNECTED: Color = GREEN;
    pub const STATUS_DISCONNECTED: Color = RED;

    // === Timeline Colors ===
    /// Hour gridlines
    pub const GRIDLINE: Color = BORDER_DIM;
    /// Text drawn on top of bars
    pub const BAR_TEXT: Color = Color::Rgb(0xFF, 0xFF, 0xFF);
}

/// Presence colors
pub mod presence {
    use super::Color;

    pub const ONLINE: Color = Color::Rgb(0x3B, 0xA5, 0x5C);
    pub const IDLE: Color = Color::Rgb(0xFA, 0xA6, 0x1A);
    pub const DO_NOT_DISTURB: Color = Color::Rgb(0xED, 0x42, 0x45);
    pub const OFFLINE: Color = Color::Rgb(0x74, 0x7F, 0x8D);
    /// Neutral fill for statuses outside the label table
    pub const UNMAPPED: Color = Color::Rgb(0x5C, 0x5F, 0x66);
}

/// Fill opacity applied to timeline bars
pub const BAR_OPACITY: f32 = 0.9;

/// Fixed color bound to a canonical label
pub fn status_color(label: StatusLabel) -> Color {
    match label {
        StatusLabel::Online => presence::ONLINE,
        StatusLabel::Idle => presence::IDLE,
        StatusLabel::DoNotDisturb => presence::DO_NOT_DISTURB,
        StatusLabel::Offline => presence::OFFLINE,
    }
}

/// Fill for any segment label, falling back to a neutral color
pub fn segment_fill(label: &SegmentLabel) -> Color {
    match label {
        SegmentLabel::Canonical(label) => status_color(*label),
        SegmentLabel::Unmapped(_) => presence::UNMAPPED,
    }
}

/// Blend two colors together; non-RGB inputs return `c1`
pub fn blend_colors(c1: Color, c2: Color, ratio: f32) -> Color {
    match (c1, c2) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            let ratio = ratio.clamp(0.0, 1.0);
            let mix = |a: u8, b: u8| (a as f32 * (1.0 - ratio) + b as f32 * ratio).round() as u8;
            Color::Rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2))
        }
        _ => c1,
    }
}

/// Bar color as painted over the chart background
pub fn bar_color(label: &SegmentLabel) -> Color {
    blend_colors(colors::BG_DARK, segment_fill(label), BAR_OPACITY)
}

/// Semantic styling helpers
pub mod styles {
    use super::colors;
    use ratatui::style::{Modifier, Style};

    /// Style for primary text
    pub fn text() -> Style {
        Style::default().fg(colors::FG_PRIMARY)
    }

    /// Style for dimmed/secondary text
    pub fn text_dim() -> Style {
        Style::default().fg(colors::FG_DIM)
    }

    /// Style for hint text
    pub fn text_hint() -> Style {
        Style::default().fg(colors::FG_HINT)
    }

    pub fn error() -> Style {
        Style::default().fg(colors::RED)
    }

    pub fn info() -> Style {
        Style::default().fg(colors::BLUE)
    }

    /// Style for focused borders
    pub fn border_focused() -> Style {
        Style::default().fg(colors::BORDER_ACCENT)
    }

    /// Style for unfocused borders
    pub fn border() -> Style {
        Style::default().fg(colors::BORDER)
    }

    /// Style for dim borders
    pub fn border_dim() -> Style {
        Style::default().fg(colors::BORDER_DIM)
    }

    /// Style for block titles
    pub fn title() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for accent titles
    pub fn title_accent() -> Style {
        Style::default()
            .fg(colors::PURPLE)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for form labels
    pub fn form_label() -> Style {
        Style::default().fg(colors::FG_DIM)
    }

    /// Style for form input (focused)
    pub fn form_input_focused() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .bg(colors::BG_HIGHLIGHT)
    }

    /// Style for form input (unfocused)
    pub fn form_input() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .bg(colors::BG_MEDIUM)
    }

    pub fn button() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .bg(colors::BG_HIGHLIGHT)
    }

    pub fn button_focused() -> Style {
        Style::default()
            .fg(colors::BG_DARK)
            .bg(colors::BLUE)
            .add_modifier(Modifier::BOLD)
    }

    /// Focused cancel button
    pub fn button_cancel_focused() -> Style {
        Style::default()
            .fg(colors::BG_DARK)
            .bg(colors::RED)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for help key column
    pub fn key_hint() -> Style {
        Style::default().fg(colors::BLUE)
    }

    /// Style for help section headings
    pub fn section() -> Style {
        Style::default()
            .fg(colors::PURPLE)
            .add_modifier(Modifier::BOLD)
    }
}
