//! presence-tui - per-day presence timeline for one user of one community.
//!
//! Fetches a day of status changes from the backend, normalizes them into
//! segments and draws them as a banded timeline in the terminal.

mod api;
mod app;
mod chart;
mod config;
mod error;
mod geometry;
mod logging;
mod models;
mod normalize;
mod theme;
mod timeline;
mod ui;

use std::io::{self, stdout};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use tokio::sync::{mpsc, watch};

use api::{ApiClient, ApiCommand, ApiMessage, DaySource};
use app::App;
use config::{Config, API_URL_ENV};
use error::{FetchError, ValidationError};
use models::{parse_date, DisplayZone, Route};

/// Input poll interval
const FRAME_DURATION: Duration = Duration::from_millis(50);

/// IDs shown when demo mode is started without a target
const DEMO_ID: &str = "1";

#[derive(Debug, Parser)]
#[command(name = "presence-tui", version, about = "Per-day presence timeline in the terminal")]
struct Cli {
    /// Community (guild) ID
    guild_id: Option<String>,

    /// User ID
    user_id: Option<String>,

    /// Day to show, YYYY-MM-DD (defaults to today)
    #[arg(long, value_parser = parse_date)]
    date: Option<NaiveDate>,

    /// Backend base URL (overrides config and PRESENCE_TUI_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Display zone: local or utc
    #[arg(long)]
    zone: Option<DisplayZone>,

    /// Show the built-in sample day without contacting the backend
    #[arg(long)]
    demo: bool,
}

/// Resolved runtime settings
#[derive(Debug, Clone, PartialEq)]
struct Settings {
    api_url: String,
    zone: DisplayZone,
    timeout: Duration,
    log_dir: PathBuf,
}

impl Settings {
    fn resolve(cli: &Cli, config: Config) -> Self {
        Self {
            api_url: cli.api_url.clone().unwrap_or_else(|| config.api_url.clone()),
            zone: cli.zone.unwrap_or(config.display_zone),
            timeout: config.request_timeout(),
            log_dir: config.log_dir(),
        }
    }
}

/// Route from the positional arguments, if both IDs were given
fn initial_route(cli: &Cli, zone: DisplayZone) -> Result<Option<Route>, ValidationError> {
    let demo_date = || NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_else(|| zone.today());

    match (cli.guild_id.as_deref(), cli.user_id.as_deref()) {
        (Some(guild), Some(user)) => {
            let date = cli.date.unwrap_or_else(|| zone.today());
            Route::new(guild, user, date).map(Some)
        }
        (None, None) if cli.demo => {
            Route::new(DEMO_ID, DEMO_ID, cli.date.unwrap_or_else(demo_date)).map(Some)
        }
        (None, None) => Ok(None),
        _ => Err(ValidationError::MissingId),
    }
}

/// Main entry point
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install().ok();

    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_env_api_url(std::env::var(API_URL_ENV).ok());
    let settings = Settings::resolve(&cli, config);

    let _log_guard = logging::init(&settings.log_dir)?;

    let route = initial_route(&cli, settings.zone)?;

    let source = if cli.demo {
        DaySource::Demo(settings.zone)
    } else {
        DaySource::Http(ApiClient::new(settings.api_url.clone(), settings.timeout)?)
    };

    tracing::info!(
        source = %source.describe(),
        zone = %settings.zone,
        route = ?route,
        "starting presence-tui"
    );

    run_tui(source, settings.zone, route).await
}

/// Run the TUI application
async fn run_tui(source: DaySource, zone: DisplayZone, route: Option<Route>) -> Result<()> {
    // Setup terminal
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("Failed to create terminal")?;

    let (api_tx, mut api_rx) = mpsc::channel::<ApiMessage>(32);
    let (cmd_tx, cmd_rx) = mpsc::channel::<ApiCommand>(32);

    let mut app = App::new(zone, source.describe());
    let api_task = tokio::spawn(run_api_worker(source, api_tx, cmd_rx));

    let result = run_event_loop(&mut terminal, &mut app, route, &mut api_rx, &cmd_tx).await;

    // Release the chart before tearing the terminal down
    app.chart.dispose();
    tracing::debug!(state = ?app.chart.state(), "chart released");

    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;

    cmd_tx.send(ApiCommand::Shutdown).await.ok();
    api_task.abort();

    if let Err(err) = &result {
        tracing::error!(error = %err, "event loop failed");
    }
    result
}

/// Run the API worker task. Every request runs in its own task, so a slow
/// day or health check never holds up a newer command.
async fn run_api_worker(
    source: DaySource,
    tx: mpsc::Sender<ApiMessage>,
    mut rx: mpsc::Receiver<ApiCommand>,
) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            ApiCommand::FetchDay { generation, route } => {
                let source = source.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let message = match source.fetch_day(&route).await {
                        Ok(records) => ApiMessage::DayLoaded {
                            generation,
                            route,
                            records,
                        },
                        Err(error) => ApiMessage::DayFailed {
                            generation,
                            route,
                            error,
                        },
                    };
                    let reachable = !matches!(
                        message,
                        ApiMessage::DayFailed {
                            error: FetchError::Transport(_),
                            ..
                        }
                    );
                    tx.send(message).await.ok();
                    tx.send(ApiMessage::ConnectionStatus(reachable)).await.ok();
                });
            }
            ApiCommand::CheckConnection => {
                let source = source.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let connected = source.health_check().await;
                    tx.send(ApiMessage::ConnectionStatus(connected)).await.ok();
                });
            }
            ApiCommand::Shutdown => break,
        }
    }
    tracing::debug!("api worker stopped");
}

/// Run the main event loop
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    route: Option<Route>,
    api_rx: &mut mpsc::Receiver<ApiMessage>,
    cmd_tx: &mpsc::Sender<ApiCommand>,
) -> Result<()> {
    let size = terminal.size()?;
    let (resize_tx, resize_rx) =
        watch::channel(ui::chart_viewport(Rect::new(0, 0, size.width, size.height)));
    app.mount_chart(resize_rx)?;

    cmd_tx.send(ApiCommand::CheckConnection).await.ok();
    if let Some(cmd) = app.start(route) {
        cmd_tx.send(cmd).await.ok();
    }

    loop {
        let size = terminal.size()?;
        let viewport = ui::chart_viewport(Rect::new(0, 0, size.width, size.height));
        resize_tx.send_if_modified(|current| {
            if *current == viewport {
                false
            } else {
                *current = viewport;
                true
            }
        });
        app.chart.poll_resize();

        terminal.draw(|frame| ui::render(frame, app))?;

        while let Ok(msg) = api_rx.try_recv() {
            app.handle_api_message(msg);
        }

        if event::poll(FRAME_DURATION)? {
            if let Event::Key(key) = event::read()? {
                // Only handle key press events (not release)
                if key.kind == KeyEventKind::Press {
                    if let Some(cmd) = app.handle_key(key) {
                        cmd_tx.send(cmd).await.ok();
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["presence-tui"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_route_from_arguments() {
        let args = cli(&["123", "456", "--date", "2024-01-01"]);
        let route = initial_route(&args, DisplayZone::Utc).unwrap().unwrap();
        assert_eq!(route.to_string(), "123/456 @ 2024-01-01");
    }

    #[test]
    fn test_bad_arguments_are_rejected() {
        let non_numeric = cli(&["123", "abc"]);
        assert_eq!(
            initial_route(&non_numeric, DisplayZone::Utc),
            Err(ValidationError::NonNumericId)
        );

        let single = cli(&["123"]);
        assert_eq!(
            initial_route(&single, DisplayZone::Utc),
            Err(ValidationError::MissingId)
        );

        assert!(Cli::try_parse_from(["presence-tui", "1", "2", "--date", "01/02/2024"]).is_err());
    }

    #[test]
    fn test_no_arguments_opens_without_route() {
        assert_eq!(initial_route(&cli(&[]), DisplayZone::Utc), Ok(None));

        let demo = initial_route(&cli(&["--demo"]), DisplayZone::Utc).unwrap().unwrap();
        assert_eq!(demo.date_text(), "2024-01-01");
    }

    #[test]
    fn test_cli_overrides_config() {
        let overridden = cli(&["--api-url", "http://cli:1", "--zone", "utc"]);
        let settings = Settings::resolve(&overridden, Config::default());
        assert_eq!(settings.api_url, "http://cli:1");
        assert_eq!(settings.zone, DisplayZone::Utc);

        let settings = Settings::resolve(&cli(&[]), Config::default());
        assert_eq!(settings.api_url, api::DEFAULT_BASE_URL);
        assert_eq!(settings.zone, DisplayZone::Local);
    }

    #[tokio::test]
    async fn test_worker_tags_replies_with_generation() {
        let (api_tx, mut api_rx) = mpsc::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_api_worker(
            DaySource::Demo(DisplayZone::Utc),
            api_tx,
            cmd_rx,
        ));

        let route = Route::new("1", "2", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        cmd_tx
            .send(ApiCommand::FetchDay {
                generation: 7,
                route: route.clone(),
            })
            .await
            .unwrap();

        match api_rx.recv().await {
            Some(ApiMessage::DayLoaded {
                generation,
                route: loaded,
                records,
            }) => {
                assert_eq!(generation, 7);
                assert_eq!(loaded, route);
                assert_eq!(records.len(), 11);
            }
            other => panic!("unexpected message {other:?}"),
        }
        assert!(matches!(api_rx.recv().await, Some(ApiMessage::ConnectionStatus(true))));

        cmd_tx.send(ApiCommand::Shutdown).await.unwrap();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_health_check_does_not_hold_up_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/hello"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/status-changes/1/2"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .mount(&server)
            .await;

        let client = ApiClient::new(server.uri(), Duration::from_secs(10)).unwrap();
        let (api_tx, mut api_rx) = mpsc::channel(8);
        let (cmd_tx, cmd_rx) = mpsc::channel(8);
        let worker = tokio::spawn(run_api_worker(DaySource::Http(client), api_tx, cmd_rx));

        let route = Route::new("1", "2", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()).unwrap();
        cmd_tx.send(ApiCommand::CheckConnection).await.unwrap();
        cmd_tx
            .send(ApiCommand::FetchDay {
                generation: 1,
                route,
            })
            .await
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), api_rx.recv())
            .await
            .expect("day reply waited for the health check");
        match first {
            Some(ApiMessage::DayLoaded {
                generation,
                records,
                ..
            }) => {
                assert_eq!(generation, 1);
                assert!(records.is_empty());
            }
            other => panic!("unexpected message {other:?}"),
        }

        cmd_tx.send(ApiCommand::Shutdown).await.unwrap();
        worker.await.unwrap();
    }
}
