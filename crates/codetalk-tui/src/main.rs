use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod app;
mod handler;
mod tui;
mod ui;

use app::App;
use codetalk_core::FileStorage;
use tui::EventHandler;

/// Send tracing output to a log file; ratatui owns the terminal
fn init_logging() -> Result<()> {
    let log_dir = FileStorage::default_dir()?;
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("codetalk.log"))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Arc::new(log_file)),
        )
        .with(filter)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let mut app = App::new()?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(&mut app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(&mut app, event)?;
        }

        // Collect a finished completion request, if any; the tick event
        // wakes this loop even when the user is idle
        app.poll_reply().await;
    }

    tui::restore()?;
    Ok(())
}
