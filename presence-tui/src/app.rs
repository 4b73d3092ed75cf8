//! Application state and event handling.
//!
//! Elm-style: a single `App` owns all state, `handle_key` and
//! `handle_api_message` mutate it and hand back commands for the API worker.
//! The timeline chart is owned here for the lifetime of the view.

use std::time::Instant;

use chrono::{DateTime, Duration, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;
use tokio::sync::watch;

use crate::api::{ApiCommand, ApiMessage};
use crate::chart::TimelineChart;
use crate::error::{ChartError, ValidationError};
use crate::models::{parse_date, AxisWindow, DisplayZone, RawStatusRecord, Route, DATE_FORMAT};
use crate::normalize::normalize;

pub const FAILED_HINT: &str = "Make sure the API service is running.";
pub const EMPTY_MESSAGE: &str = "No status data available for this user on the selected date.";
pub const EMPTY_HINT: &str = "Try selecting a different date or check that the user ID is correct.";

/// What the timeline area is showing. Exactly one at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    /// A fetch is in flight
    #[default]
    Loading,
    /// The last fetch failed; `detail` is shown verbatim
    Failed { detail: String },
    /// The backend answered with no usable records
    Empty,
    /// Segments are loaded into the chart
    Ready,
}

impl ViewState {
    pub fn name(&self) -> &'static str {
        match self {
            ViewState::Loading => "Loading",
            ViewState::Failed { .. } => "Failed",
            ViewState::Empty => "Empty",
            ViewState::Ready => "Ready",
        }
    }
}

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Normal navigation mode
    #[default]
    Normal,
    /// Editing the target form
    Editing,
}

/// Fields of the target form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    GuildId,
    UserId,
    Date,
    SubmitButton,
    CancelButton,
}

impl FormField {
    pub fn all() -> &'static [FormField] {
        &[
            FormField::GuildId,
            FormField::UserId,
            FormField::Date,
            FormField::SubmitButton,
            FormField::CancelButton,
        ]
    }

    pub fn label(&self) -> &'static str {
        match self {
            FormField::GuildId => "Guild ID",
            FormField::UserId => "User ID",
            FormField::Date => "Date",
            FormField::SubmitButton => "Show timeline",
            FormField::CancelButton => "Cancel",
        }
    }
}

/// State for the (guild, user, date) form modal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetForm {
    pub focused_field: usize,
    /// Validation error from the last submit
    pub error: Option<String>,
    pub guild_id: String,
    pub user_id: String,
    pub date: String,
    fallback_date: NaiveDate,
}

impl TargetForm {
    /// Prefill from the current route, if any
    pub fn new(route: Option<&Route>, today: NaiveDate) -> Self {
        let date = route.map(|r| r.date).unwrap_or(today);
        Self {
            focused_field: 0,
            error: None,
            guild_id: route.map(|r| r.guild_id.clone()).unwrap_or_default(),
            user_id: route.map(|r| r.user_id.clone()).unwrap_or_default(),
            date: date.format(DATE_FORMAT).to_string(),
            fallback_date: today,
        }
    }

    pub fn current_field(&self) -> FormField {
        FormField::all()[self.focused_field]
    }

    pub fn next_field(&mut self) {
        self.focused_field = (self.focused_field + 1) % FormField::all().len();
    }

    pub fn prev_field(&mut self) {
        self.focused_field = self
            .focused_field
            .checked_sub(1)
            .unwrap_or(FormField::all().len() - 1);
    }

    pub fn text(&self, field: FormField) -> Option<&str> {
        match field {
            FormField::GuildId => Some(&self.guild_id),
            FormField::UserId => Some(&self.user_id),
            FormField::Date => Some(&self.date),
            FormField::SubmitButton | FormField::CancelButton => None,
        }
    }

    fn current_text_mut(&mut self) -> Option<&mut String> {
        match self.current_field() {
            FormField::GuildId => Some(&mut self.guild_id),
            FormField::UserId => Some(&mut self.user_id),
            FormField::Date => Some(&mut self.date),
            FormField::SubmitButton | FormField::CancelButton => None,
        }
    }

    pub fn handle_char(&mut self, c: char) {
        if let Some(text) = self.current_text_mut() {
            text.push(c);
        }
    }

    pub fn handle_backspace(&mut self) {
        if let Some(text) = self.current_text_mut() {
            text.pop();
        }
    }

    /// Step the date field; an unparseable date restarts from today
    pub fn shift_date(&mut self, days: i64) {
        if self.current_field() != FormField::Date {
            return;
        }
        let base = parse_date(&self.date).unwrap_or(self.fallback_date);
        if let Some(date) = base.checked_add_signed(Duration::days(days)) {
            self.date = date.format(DATE_FORMAT).to_string();
        }
    }

    pub fn build_route(&self) -> Result<Route, ValidationError> {
        let date = parse_date(&self.date)?;
        Route::new(&self.guild_id, &self.user_id, date)
    }
}

/// Log entry for the message area
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub at: DateTime<Local>,
    pub message: String,
    pub level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogEntry {
    fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            at: Local::now(),
            message: message.into(),
            level,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Main application state
#[derive(Debug)]
pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    /// Zone the day window and segments are expressed in
    pub zone: DisplayZone,

    /// Target currently shown; `None` until the user picks one
    pub route: Option<Route>,
    pub view: ViewState,
    pub chart: TimelineChart,
    /// Generation of the most recent fetch
    generation: u64,
    /// Records dropped by the normalizer on the last load
    pub rejected: usize,

    pub form: Option<TargetForm>,

    pub logs: Vec<LogEntry>,
    max_logs: usize,

    pub api_connected: bool,
    /// Where records come from, for the header
    pub source: String,
    pub last_refresh: Option<Instant>,
    pub show_help: bool,
}

impl App {
    pub fn new(zone: DisplayZone, source: impl Into<String>) -> Self {
        let source = source.into();
        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            zone,
            route: None,
            view: ViewState::default(),
            chart: TimelineChart::new(),
            generation: 0,
            rejected: 0,
            form: None,
            logs: Vec::new(),
            max_logs: 100,
            api_connected: false,
            source: source.clone(),
            last_refresh: None,
            show_help: false,
        };

        app.log(LogEntry::info(format!("Presence timeline ready ({source})")));
        app
    }

    /// Attach the chart to the viewport subscription
    pub fn mount_chart(&mut self, resize_rx: watch::Receiver<Rect>) -> Result<(), ChartError> {
        self.chart.mount(resize_rx)
    }

    /// Show `route`, or open the form when there is none yet
    pub fn start(&mut self, route: Option<Route>) -> Option<ApiCommand> {
        match route {
            Some(route) => Some(self.request_day(route)),
            None => {
                self.open_form();
                None
            }
        }
    }

    pub fn log(&mut self, entry: LogEntry) {
        self.logs.push(entry);
        if self.logs.len() > self.max_logs {
            self.logs.remove(0);
        }
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn today(&self) -> NaiveDate {
        self.zone.today()
    }

    /// Switch to `route` and issue exactly one fetch for it
    pub fn request_day(&mut self, route: Route) -> ApiCommand {
        self.generation += 1;
        self.view = ViewState::Loading;
        self.rejected = 0;
        self.chart.clear();
        self.log(LogEntry::info(format!("Loading {route}")));
        tracing::info!(generation = self.generation, %route, "requesting day");

        self.route = Some(route.clone());
        ApiCommand::FetchDay {
            generation: self.generation,
            route,
        }
    }

    /// Re-request the current day
    pub fn refresh(&mut self) -> Option<ApiCommand> {
        let route = self.route.clone()?;
        Some(self.request_day(route))
    }

    /// Move the current route by `days`. Nothing happens past the last
    /// representable date.
    pub fn shift_day(&mut self, days: i64) -> Option<ApiCommand> {
        let route = self.route.as_ref()?;
        let date = route.date.checked_add_signed(Duration::days(days))?;
        let route = route.with_date(date);
        Some(self.request_day(route))
    }

    pub fn jump_to_today(&mut self) -> Option<ApiCommand> {
        let route = self.route.as_ref()?.with_date(self.today());
        Some(self.request_day(route))
    }

    pub fn handle_api_message(&mut self, message: ApiMessage) {
        match message {
            ApiMessage::DayLoaded {
                generation,
                route,
                records,
            } => {
                if self.is_stale(generation) {
                    tracing::debug!(generation, current = self.generation, %route, "discarding stale day");
                    return;
                }
                self.apply_records(&route, &records);
            }
            ApiMessage::DayFailed {
                generation,
                route,
                error,
            } => {
                if self.is_stale(generation) {
                    tracing::debug!(generation, current = self.generation, %route, "discarding stale failure");
                    return;
                }
                self.chart.clear();
                self.view = ViewState::Failed {
                    detail: error.to_string(),
                };
                self.log(LogEntry::error(format!("{route}: {error}")));
            }
            ApiMessage::ConnectionStatus(connected) => {
                let was_connected = self.api_connected;
                self.api_connected = connected;

                if connected && !was_connected {
                    self.log(LogEntry::success("Connected to API"));
                } else if !connected && was_connected {
                    self.log(LogEntry::warning("Disconnected from API"));
                }
            }
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation != self.generation
    }

    fn apply_records(&mut self, route: &Route, records: &[RawStatusRecord]) {
        let normalized = normalize(records, self.zone);
        self.rejected = normalized.rejected;
        self.last_refresh = Some(Instant::now());

        if normalized.rejected > 0 {
            self.log(LogEntry::warning(format!(
                "Skipped {} malformed record(s)",
                normalized.rejected
            )));
        }

        if normalized.is_empty() {
            self.chart.clear();
            self.view = ViewState::Empty;
            self.log(LogEntry::info(format!("{route}: no status data")));
            return;
        }

        let count = normalized.segments.len();
        let (axis_min, axis_max) = route.axis_bounds();
        let segments = normalized.segments;
        let result = AxisWindow::parse(&axis_min, &axis_max)
            .map_err(|err| err.to_string())
            .and_then(|window| {
                self.chart
                    .update(segments, window)
                    .map_err(|err| err.to_string())
            });
        match result {
            Ok(()) => {
                self.view = ViewState::Ready;
                self.log(LogEntry::success(format!("{route}: {count} segments")));
            }
            Err(detail) => {
                tracing::error!(error = %detail, "chart rejected update");
                self.view = ViewState::Failed { detail };
            }
        }
    }

    // ============================================
    // Form
    // ============================================

    pub fn open_form(&mut self) {
        self.form = Some(TargetForm::new(self.route.as_ref(), self.today()));
        self.input_mode = InputMode::Editing;
    }

    pub fn close_form(&mut self) {
        self.form = None;
        self.input_mode = InputMode::Normal;
    }

    fn submit_form(&mut self) -> Option<ApiCommand> {
        let result = self.form.as_ref()?.build_route();
        match result {
            Ok(route) => {
                self.close_form();
                Some(self.request_day(route))
            }
            Err(err) => {
                self.log(LogEntry::warning(err.to_string()));
                if let Some(form) = &mut self.form {
                    form.error = Some(err.to_string());
                }
                None
            }
        }
    }

    // ============================================
    // Keys
    // ============================================

    pub fn handle_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return Some(ApiCommand::Shutdown);
        }

        if self.show_help {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Enter) {
                self.show_help = false;
            }
            return None;
        }

        match self.input_mode {
            InputMode::Normal => self.handle_normal_key(key),
            InputMode::Editing => self.handle_editing_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Char('Q') => {
                self.should_quit = true;
                Some(ApiCommand::Shutdown)
            }
            KeyCode::Char('?') => {
                self.show_help = true;
                None
            }
            KeyCode::Char('g') => {
                self.open_form();
                None
            }
            KeyCode::Char('r') => {
                self.log(LogEntry::info("Refreshing..."));
                self.refresh()
            }
            KeyCode::Char('h') | KeyCode::Char('[') => self.shift_day(-1),
            KeyCode::Char('l') | KeyCode::Char(']') => self.shift_day(1),
            KeyCode::Char('t') => self.jump_to_today(),
            KeyCode::Right | KeyCode::Tab => {
                self.chart.focus_next();
                None
            }
            KeyCode::Left | KeyCode::BackTab => {
                self.chart.focus_previous();
                None
            }
            _ => None,
        }
    }

    fn handle_editing_key(&mut self, key: KeyEvent) -> Option<ApiCommand> {
        let Some(form) = self.form.as_mut() else {
            self.input_mode = InputMode::Normal;
            return None;
        };

        match key.code {
            KeyCode::Esc => {
                self.close_form();
                None
            }
            KeyCode::Tab | KeyCode::Down => {
                form.next_field();
                None
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.prev_field();
                None
            }
            KeyCode::Enter => match form.current_field() {
                FormField::CancelButton => {
                    self.close_form();
                    None
                }
                FormField::GuildId | FormField::UserId => {
                    form.next_field();
                    None
                }
                FormField::Date | FormField::SubmitButton => self.submit_form(),
            },
            KeyCode::Backspace => {
                form.handle_backspace();
                None
            }
            KeyCode::Char('+') if form.current_field() == FormField::Date => {
                form.shift_date(1);
                None
            }
            KeyCode::Char('-') if form.current_field() == FormField::Date => {
                form.shift_date(-1);
                None
            }
            KeyCode::Char(c) => {
                form.handle_char(c);
                None
            }
            _ => None,
        }
    }

    /// Get the status bar text
    pub fn status_text(&self) -> String {
        let connection = if self.api_connected {
            "Connected"
        } else {
            "Disconnected"
        };

        let last_refresh = self
            .last_refresh
            .map(|t| {
                let secs = t.elapsed().as_secs();
                if secs < 60 {
                    format!(" ({secs}s ago)")
                } else {
                    format!(" ({}m ago)", secs / 60)
                }
            })
            .unwrap_or_default();

        format!(
            "{connection} | {}{last_refresh} | h/l: Day | g: Target | ?: Help | q: Quit",
            self.view.name()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use pretty_assertions::assert_eq;

    fn app() -> App {
        App::new(DisplayZone::Utc, "test")
    }

    fn route(date: (i32, u32, u32)) -> Route {
        Route::new(
            "123",
            "456",
            NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
        )
        .unwrap()
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn fetch_parts(cmd: Option<ApiCommand>) -> (u64, Route) {
        match cmd {
            Some(ApiCommand::FetchDay { generation, route }) => (generation, route),
            other => panic!("expected FetchDay, got {other:?}"),
        }
    }

    fn loaded(generation: u64, route: Route, records: Vec<RawStatusRecord>) -> ApiMessage {
        ApiMessage::DayLoaded {
            generation,
            route,
            records,
        }
    }

    fn online_record() -> RawStatusRecord {
        RawStatusRecord::new("2024-01-01T08:00:00Z", "2024-01-01T10:30:00Z", "online")
    }

    #[test]
    fn test_start_with_route_fetches_once() {
        let mut app = app();
        let (generation, fetched) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        assert_eq!(generation, 1);
        assert_eq!(fetched, route((2024, 1, 1)));
        assert_eq!(app.view, ViewState::Loading);
    }

    #[test]
    fn test_start_without_route_opens_form() {
        let mut app = app();
        assert!(app.start(None).is_none());
        assert_eq!(app.input_mode, InputMode::Editing);
        assert!(app.form.is_some());
    }

    #[test]
    fn test_records_make_ready_view() {
        let mut app = app();
        let (generation, route) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        app.handle_api_message(loaded(generation, route, vec![online_record()]));

        assert_eq!(app.view, ViewState::Ready);
        assert_eq!(app.chart.segments().len(), 1);
        assert_eq!(app.chart.segments()[0].start_text(), "2024-01-01 08:00:00");
        assert_eq!(
            app.chart.window(),
            Some(crate::models::AxisWindow::parse("2024-01-01 00:00:00", "2024-01-01 23:59:59").unwrap())
        );
    }

    #[test]
    fn test_empty_result_is_not_an_error() {
        let mut app = app();
        let (generation, route) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        app.handle_api_message(loaded(generation, route, Vec::new()));
        assert_eq!(app.view, ViewState::Empty);
    }

    #[test]
    fn test_failure_shows_detail() {
        let mut app = app();
        let (generation, route) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        app.handle_api_message(ApiMessage::DayFailed {
            generation,
            route,
            error: FetchError::Status {
                status: 500,
                body: String::new(),
            },
        });
        assert_eq!(
            app.view,
            ViewState::Failed {
                detail: "API responded with status: 500".to_string()
            }
        );
        assert!(app.chart.segments().is_empty());
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut app = app();
        let (first_gen, first_route) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        let (second_gen, second_route) = fetch_parts(app.handle_key(key(KeyCode::Char('l'))));
        assert_eq!(second_route.date_text(), "2024-01-02");

        app.handle_api_message(loaded(first_gen, first_route, vec![online_record()]));
        assert_eq!(app.view, ViewState::Loading);
        assert!(app.chart.segments().is_empty());

        app.handle_api_message(loaded(second_gen, second_route, Vec::new()));
        assert_eq!(app.view, ViewState::Empty);
    }

    #[test]
    fn test_all_records_rejected_is_empty() {
        let mut app = app();
        let (generation, route) = fetch_parts(app.start(Some(route((2024, 1, 1)))));
        app.handle_api_message(loaded(
            generation,
            route,
            vec![RawStatusRecord::new("bad", "worse", "online")],
        ));
        assert_eq!(app.view, ViewState::Empty);
        assert_eq!(app.rejected, 1);
    }

    #[test]
    fn test_day_navigation_keys() {
        let mut app = app();
        app.start(Some(route((2024, 3, 1))));

        let (_, prev) = fetch_parts(app.handle_key(key(KeyCode::Char('h'))));
        assert_eq!(prev.date_text(), "2024-02-29");
        let (_, back) = fetch_parts(app.handle_key(key(KeyCode::Char(']'))));
        assert_eq!(back.date_text(), "2024-03-01");

        let (generation, today) = fetch_parts(app.handle_key(key(KeyCode::Char('t'))));
        assert_eq!(today.date, DisplayZone::Utc.today());
        assert_eq!(generation, 4);
    }

    #[test]
    fn test_day_navigation_stops_at_calendar_limits() {
        let mut app = app();
        let last = Route::new("123", "456", NaiveDate::MAX).unwrap();
        app.start(Some(last.clone()));

        assert!(app.handle_key(key(KeyCode::Char('l'))).is_none());
        assert_eq!(app.generation(), 1);
        assert_eq!(app.route, Some(last));

        let (_, prev) = fetch_parts(app.handle_key(key(KeyCode::Char('h'))));
        assert_eq!(prev.date, NaiveDate::MAX.pred_opt().unwrap());

        let first = Route::new("123", "456", NaiveDate::MIN).unwrap();
        app.start(Some(first));
        assert!(app.handle_key(key(KeyCode::Char('['))).is_none());
    }

    #[test]
    fn test_navigation_without_route_does_nothing() {
        let mut app = app();
        assert!(app.handle_key(key(KeyCode::Char('l'))).is_none());
        assert!(app.handle_key(key(KeyCode::Char('r'))).is_none());
        assert_eq!(app.generation(), 0);
    }

    #[test]
    fn test_form_reports_validation_errors() {
        let mut app = app();
        app.open_form();
        if let Some(form) = app.form.as_mut() {
            form.focused_field = 3;
        }
        assert!(app.handle_key(key(KeyCode::Enter)).is_none());
        assert_eq!(
            app.form.as_ref().unwrap().error.as_deref(),
            Some("Please enter both Guild ID and User ID")
        );

        let form = app.form.as_mut().unwrap();
        form.guild_id = "12ab".to_string();
        form.user_id = "7".to_string();
        app.handle_key(key(KeyCode::Enter));
        assert_eq!(
            app.form.as_ref().unwrap().error.as_deref(),
            Some("Guild ID and User ID must be numeric")
        );
        assert_eq!(app.generation(), 0);
    }

    #[test]
    fn test_form_submit_issues_fetch() {
        let mut app = app();
        app.open_form();
        for c in "123".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));
        for c in "456".chars() {
            app.handle_key(key(KeyCode::Char(c)));
        }
        app.handle_key(key(KeyCode::Enter));

        let form = app.form.as_mut().unwrap();
        assert_eq!(form.current_field(), FormField::Date);
        form.date = "2024-01-01".to_string();

        let (_, fetched) = fetch_parts(app.handle_key(key(KeyCode::Enter)));
        assert_eq!(fetched, route((2024, 1, 1)));
        assert!(app.form.is_none());
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_form_date_stepping() {
        let today = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let mut form = TargetForm::new(Some(&route((2024, 1, 1))), today);
        form.focused_field = 2;
        form.shift_date(-1);
        assert_eq!(form.date, "2023-12-31");

        form.date = "garbage".to_string();
        form.shift_date(1);
        assert_eq!(form.date, "2030-01-02");

        let mut form = TargetForm::new(None, NaiveDate::MAX);
        form.focused_field = 2;
        form.date = "garbage".to_string();
        form.shift_date(1);
        assert_eq!(form.date, "garbage");
    }

    #[test]
    fn test_quit_sends_shutdown() {
        let mut app = app();
        let cmd = app.handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(matches!(cmd, Some(ApiCommand::Shutdown)));
        assert!(app.should_quit);
    }

    #[test]
    fn test_log_is_capped() {
        let mut app = app();
        for i in 0..250 {
            app.log(LogEntry::info(format!("entry {i}")));
        }
        assert_eq!(app.logs.len(), 100);
        assert_eq!(app.logs.last().unwrap().message, "entry 249");
    }
}
