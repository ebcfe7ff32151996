//! Event bus for the marginal TUI.
//!
//! Terminal input, timer ticks, and store-worker results are normalised into a
//! single `AppEvent` enum and sent over a tokio unbounded MPSC channel. The main
//! loop receives from this channel and dispatches accordingly.
//!
//! Two independent intervals drive the render and logic cycles:
//! - **Render interval** (33 ms, about 30 FPS): triggers a `terminal.draw()` call.
//! - **Tick interval** (250 ms): drives the store revision poll.

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

use crate::store::types::StoreResult;

const TICK_INTERVAL: Duration = Duration::from_millis(250);
const RENDER_INTERVAL: Duration = Duration::from_millis(33);

/// All events the application can receive from any source.
#[derive(Debug)]
pub enum AppEvent {
    /// A key press from the terminal (`KeyEventKind::Press` only).
    Key(KeyEvent),
    /// A mouse event from the terminal (click, scroll, move).
    Mouse(MouseEvent),
    /// Bracketed paste; appended to the reply draft in Insert mode.
    Paste(String),
    /// The terminal regained focus, usually after the user ran the agent.
    FocusGained,
    /// Terminal was resized to (columns, rows).
    Resize(u16, u16),
    /// Logic tick; each one asks the store worker to poll.
    Tick,
    /// Render tick, triggers a `terminal.draw()` call.
    Render,
    /// A finished snapshot or failure from the store worker thread.
    StoreResult(Box<StoreResult>),
}

/// Holds the sender and receiver ends of the unified event channel.
///
/// The sender (`tx`) is cloned into the event task and the store worker;
/// the receiver (`rx`) is owned by the main event loop.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    /// Producers (terminal, timers, one store worker) emit at a bounded rate
    /// the main loop always keeps up with, so the channel is unbounded.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Maps a crossterm event onto an `AppEvent`. Key releases and repeats are
/// dropped (Windows reports both), as are focus-lost events.
fn translate(event: Event) -> Option<AppEvent> {
    match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => Some(AppEvent::Key(key)),
        Event::Mouse(mouse) => Some(AppEvent::Mouse(mouse)),
        Event::Paste(text) => Some(AppEvent::Paste(text)),
        Event::FocusGained => Some(AppEvent::FocusGained),
        Event::Resize(w, h) => Some(AppEvent::Resize(w, h)),
        _ => None,
    }
}

/// Spawns the background tokio task that feeds the event channel.
///
/// `reader.next().fuse()` keeps `tokio::select!` from polling a finished
/// stream. The task stops once the receiving end has been dropped or the
/// terminal input stream ends.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut ticks = interval(TICK_INTERVAL);
        let mut renders = interval(RENDER_INTERVAL);
        let mut reader = EventStream::new();

        loop {
            let event = tokio::select! {
                _ = ticks.tick() => AppEvent::Tick,
                _ = renders.tick() => AppEvent::Render,
                maybe_event = reader.next().fuse() => match maybe_event {
                    Some(Ok(event)) => match translate(event) {
                        Some(app_event) => app_event,
                        None => continue,
                    },
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "terminal input error");
                        continue;
                    }
                    None => break,
                },
            };
            if tx.send(event).is_err() {
                break;
            }
        }
        tracing::debug!("event task exiting");
    });
}
