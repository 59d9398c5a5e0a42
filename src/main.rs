use std::fs::{self, OpenOptions};
use std::io::Stdout;
use std::sync::Mutex;

use anyhow::{Context, Result};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
    LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing_subscriber::EnvFilter;

mod app;
mod client;
mod config;

use app::ThemePreset;
use config::{Deployment, Session};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const BIN_NAME: &str = env!("CARGO_BIN_NAME");

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--version" | "-v" => {
                println!("{} {}", BIN_NAME, APP_VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                println!("{}", usage());
                return Ok(());
            }
            unknown => {
                eprintln!("unknown argument: {}\n\n{}", unknown, usage());
                std::process::exit(2);
            }
        }
    }

    init_logging();
    let deployment = Deployment::from_env();
    let session = Session::from_env();
    let theme = config::theme_name_from_env()
        .and_then(|name| ThemePreset::parse(&name))
        .unwrap_or_else(app::default_theme);
    tracing::info!(
        version = APP_VERSION,
        url = %deployment.deployment_url,
        has_token = session.token().is_some(),
        "starting"
    );

    let mut terminal = setup_terminal()?;
    let result = app::run_app(&mut terminal, deployment, session, theme);
    restore_terminal(&mut terminal)?;
    if let Err(err) = &result {
        let message = format!("{err:#}");
        tracing::error!(error = %message, "exited with error");
    }
    result
}

fn usage() -> String {
    let head = format!("usage: {BIN_NAME} [--version | --help]");
    [
        head.as_str(),
        "",
        "environment:",
        "  DEEPAGENT_DEPLOYMENT_URL  agent server (default http://127.0.0.1:2024)",
        "  DEEPAGENT_AGENT_ID        preferred assistant id or name",
        "  DEEPAGENT_ACCESS_TOKEN    access token (falls back to LANGSMITH_API_KEY)",
        "  DEEPAGENT_THEME           fjord | graphite | ember",
        "  DEEPAGENT_LOG             log filter (default info)",
        "  DEEPAGENT_LOG_FILE        log path (default ~/.deepagent/tui.log)",
    ]
    .join("\n")
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging() {
    let filter = EnvFilter::try_from_env("DEEPAGENT_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let path = config::log_file_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::sink)
                .try_init();
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("enable raw mode")?;
    crossterm::execute!(std::io::stdout(), EnterAlternateScreen, EnableMouseCapture)
        .context("enter alternate screen")?;

    let mut terminal =
        Terminal::new(CrosstermBackend::new(std::io::stdout())).context("create terminal")?;

    if matches!(supports_keyboard_enhancement(), Ok(true)) {
        crossterm::execute!(
            std::io::stdout(),
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES)
        )
        .ok();
    }
    crossterm::execute!(std::io::stdout(), EnableBracketedPaste).ok();

    terminal.clear().context("clear terminal")?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    crossterm::execute!(std::io::stdout(), DisableBracketedPaste).ok();
    crossterm::execute!(std::io::stdout(), PopKeyboardEnhancementFlags).ok();
    disable_raw_mode().context("disable raw mode")?;
    crossterm::execute!(std::io::stdout(), DisableMouseCapture, LeaveAlternateScreen)
        .context("leave alternate screen")?;
    terminal.show_cursor().context("show cursor")?;
    Ok(())
}

fn truncate(s: &str, n: usize) -> String {
    match s.char_indices().nth(n) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}
