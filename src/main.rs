mod app;
mod config;
mod input;
mod ui;

use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use skyrchitect_core::ShortcutRegistry;
use skyrchitect_session::FileStore;
use tracing::{error, info};

use app::{App, AppOptions, WriterMode};
use config::Args;

/// Longest time the loop blocks on input before ticking autosave
const MAX_POLL: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_shortcuts {
        for binding in ShortcutRegistry::defaults().bindings() {
            println!("{:<16} {}", binding.chord.to_string(), binding.description);
        }
        return Ok(());
    }

    let data_dir = args.data_dir();
    let log_path = config::init_logging(&data_dir)?;
    info!(data_dir = %data_dir.display(), log = %log_path.display(), "starting");

    let mut app = App::open(AppOptions {
        store: Arc::new(FileStore::new(data_dir.join("snapshots"))),
        user: args.user_id(),
        document: args.document,
        autosave: args.autosave_config(),
        writer: WriterMode::Background,
    })?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let size = terminal.size()?;
    resize(&mut app, size.width, size.height);

    let result = run_app(&mut terminal, &mut app);

    app.shutdown();

    // Cleanup terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    // Joins the snapshot writer thread
    drop(app);

    if let Err(e) = result {
        error!("event loop failed: {e:?}");
        eprintln!("Error: {e:?}");
    }

    Ok(())
}

fn resize(app: &mut App, width: u16, height: u16) {
    // Status and help rows plus the canvas border
    let canvas = Rect::new(0, 0, width.saturating_sub(2), height.saturating_sub(4));
    app.editor.view_mut().viewport = ui::viewport_for(canvas);
}

fn run_app(terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>, app: &mut App) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::render(frame, app))?;

        let now = Instant::now();
        let timeout = app
            .editor
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now).min(MAX_POLL))
            .unwrap_or(MAX_POLL);

        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
                    app.clear_status();
                    app.handle_key(key, Instant::now())?;
                }
                Event::Resize(width, height) => resize(app, width, height),
                _ => {}
            }
        }

        app.tick(Instant::now());
    }
    Ok(())
}
