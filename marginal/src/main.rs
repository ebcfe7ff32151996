//! marginal — terminal UI for reviewing code comments shared with an agent.
//!
//! Entry point for the `marginal` binary. Wires together the terminal lifecycle
//! (`tui`), unified event bus (`event`), panel rendering (`ui`), theme system
//! (`theme`), and the store worker thread (`store`) that owns all reads and
//! writes of `.marginal/comments.json`.
//!
//! # Startup sequence
//!
//! 1. Load theme from XDG config and resolve the project root; open the log
//!    file. All of this happens before the terminal is touched.
//! 2. `install_panic_hook()`, installed first so it is the innermost hook.
//! 3. `register_shutdown_signals()`, polled in the event loop heartbeat.
//! 4. `init_tui()` enters the alternate screen and raw mode.
//! 5. Spawn the event task and the store worker, then request the first load.
//!
//! # Safety
//!
//! `restore_tui()` is called after the event loop exits (quit key, SIGTERM, or
//! channel close). Inside the loop `?` appears only in the Render arm; errors
//! there leave the loop through the same single exit point.

mod app;
mod event;
mod store;
mod theme;
mod tui;
mod ui;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use marginal_core::project::{find_project_root, Project};
use marginal_core::store::STORE_DIR;
use tracing_subscriber::EnvFilter;

use crate::store::types::StoreRequest;
use crate::ui::keybindings::{handle_key, handle_mouse, KeyAction};

const DEFAULT_THEME: &str = "catppuccin-mocha";

/// Returns the path to the user config file.
///
/// Prefers `$XDG_CONFIG_HOME/marginal/config.toml`; falls back to
/// `~/.config/marginal/config.toml` when the env var is absent.
fn user_config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("marginal").join("config.toml")
}

/// Loads the theme name from the user config.
///
/// Falls back to the default theme if the file does not exist, cannot be
/// parsed, or has no `theme` key. Parse errors are logged, never fatal.
fn load_theme_name() -> String {
    let path = user_config_path();
    let raw = match std::fs::read_to_string(&path) {
        Ok(s) => s,
        Err(_) => return DEFAULT_THEME.to_owned(),
    };
    let table: toml::Table = match toml::from_str(&raw) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "user config parse error");
            return DEFAULT_THEME.to_owned();
        }
    };
    table
        .get("theme")
        .and_then(|v| v.as_str())
        .unwrap_or(DEFAULT_THEME)
        .to_owned()
}

/// Sends tracing output to `.marginal/marginal.log`, since stderr belongs to the
/// terminal UI. Logging is skipped if the file cannot be opened.
fn init_logging(project_root: &Path) {
    let path = project_root.join(STORE_DIR).join("marginal.log");
    let file = match std::fs::OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(_) => return,
    };
    let filter =
        EnvFilter::try_from_env("MARGINAL_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Step 0: project root and log file, before anything can log.
    let cwd = std::env::current_dir()?;
    let root = find_project_root(&cwd).unwrap_or(cwd);
    std::fs::create_dir_all(root.join(STORE_DIR))?;
    init_logging(&root);
    tracing::info!(root = %root.display(), "starting marginal");

    let theme = theme::Theme::from_name(&load_theme_name());
    let mut state = app::AppState::default();

    // Step 1: panic hook installed first, innermost hook restores terminal.
    tui::install_panic_hook();

    // Step 2: SIGTERM/SIGHUP flag, polled in the 50ms heartbeat arm below.
    let term_flag = tui::register_shutdown_signals();

    // Step 3: enter alternate screen and raw mode.
    let mut terminal = tui::init_tui()?;

    // Step 4: event channel plus the background event task.
    let handler = event::EventHandler::new();
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;

    // Step 5: store worker thread; the first snapshot arrives as a StoreResult.
    let (store_tx, store_rx) = crossbeam_channel::unbounded::<StoreRequest>();
    let worker_events = handler.tx.clone();
    let project = Project::open(root);
    std::thread::spawn(move || store::worker::store_worker_loop(project, store_rx, worker_events));
    state.store_tx = Some(store_tx);
    state.request(StoreRequest::Load);

    // Event loop, exits only via `break` so `restore_tui()` is always reached.
    'event_loop: loop {
        tokio::select! {
            // Heartbeat: checks SIGTERM even when no other events arrive.
            _ = tokio::time::sleep(std::time::Duration::from_millis(50)) => {
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
            maybe_event = rx.recv() => {
                match maybe_event {
                    Some(event::AppEvent::Render) => {
                        // Exactly one draw() call per Render event.
                        terminal.draw(|frame| ui::render(frame, &mut state, &theme))?;
                    }
                    Some(event::AppEvent::Key(key)) => {
                        if handle_key(key, &mut state) == KeyAction::Quit {
                            break 'event_loop;
                        }
                    }
                    Some(event::AppEvent::Mouse(mouse)) => {
                        if handle_mouse(mouse, &mut state) == KeyAction::Quit {
                            break 'event_loop;
                        }
                    }
                    Some(event::AppEvent::Paste(text)) => state.paste_into_reply(&text),
                    Some(event::AppEvent::Tick) | Some(event::AppEvent::FocusGained) => {
                        state.request(StoreRequest::Poll);
                    }
                    Some(event::AppEvent::StoreResult(result)) => {
                        state.apply_store_result(*result);
                    }
                    // ratatui picks up the new size on the next draw.
                    Some(event::AppEvent::Resize(_, _)) => {}
                    None => break 'event_loop,
                }
                if term_flag.load(Ordering::Relaxed) {
                    break 'event_loop;
                }
            }
        }
    }

    // Dropping the request sender ends the worker's receive loop.
    state.store_tx = None;
    tui::restore_tui()?;
    tracing::info!("marginal exited");
    Ok(())
}
