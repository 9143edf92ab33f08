use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod app;
mod config;
mod error;
mod modules;
mod ui;

use app::App;
use config::{Config, default_data_path};
use modules::router::BrowserRouter;

#[derive(Parser, Debug)]
#[command(name = "solvefeed", version, about = "Live feed of solved challenges and server notifications")]
struct Cli {
    /// Config file (defaults to <config dir>/solvefeed/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON-lines event feed to follow, overrides `events_path` from the config
    #[arg(long)]
    events: Option<PathBuf>,

    /// Log coding challenge routes instead of opening a browser
    #[arg(long)]
    no_browser: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = Config::load(cli.config)?;
    info!(path = ?config.path, "Config loaded");
    let router = if cli.no_browser {
        BrowserRouter::headless(config.server.base_url.clone())
    } else {
        BrowserRouter::new(config.server.base_url.clone())
    };
    let mut app = App::with_router(config, cli.events, Arc::new(router)).await?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;
    app.shutdown();

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

/// The terminal belongs to the UI, so logs go to a file.
fn init_logging(verbose: bool) -> Result<()> {
    let path = default_data_path("solvefeed.log");
    if let Some(parent) = path.parent() { fs::create_dir_all(parent)?; }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Opening log file {:?}", path))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("solvefeed=debug")
        } else {
            EnvFilter::new("solvefeed=info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(filter)
        .init();
    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    loop {
        if app.take_redraw() {
            terminal.draw(|f| ui::draw(f, app))?;
        }

        if event::poll(Duration::from_millis(100))? {
            match event::read()? {
                Event::Key(KeyEvent { code, modifiers, kind, .. }) => {
                    if kind != KeyEventKind::Press { continue; }
                    match code {
                        KeyCode::Char('q') => return Ok(()),
                        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        KeyCode::Char('?') => app.toggle_help(),
                        KeyCode::Esc if app.show_help => app.toggle_help(),
                        KeyCode::Up | KeyCode::Char('k') => app.previous_item(),
                        KeyCode::Down | KeyCode::Char('j') => app.next_item(),
                        KeyCode::Home => app.go_home(),
                        KeyCode::End => app.go_end(),
                        KeyCode::Char('d') => app.dismiss(false),
                        KeyCode::Char('D') => app.dismiss(true),
                        KeyCode::Char('y') => app.copy_selected(),
                        KeyCode::Enter => app.open_selected(),
                        KeyCode::Char('f') => app.toggle_flags(),
                        KeyCode::Char('c') => app.toggle_countries(),
                        _ => {}
                    }
                    app.request_redraw();
                }
                Event::Resize(..) => app.request_redraw(),
                _ => {}
            }
        }
    }
}
