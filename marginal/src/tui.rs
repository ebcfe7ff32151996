//! Terminal lifecycle management for the marginal TUI.
//!
//! The TUI renders to stderr and leaves stdout untouched, so it can run in a
//! pane next to agent tooling that reads `marginal-cli --json` output from
//! stdout. Diagnostics go to `.marginal/marginal.log`, never the terminal.
//!
//! Besides raw mode and the alternate screen, the session turns on mouse
//! capture, bracketed paste (pasted text lands in the reply draft as one event),
//! and focus reporting (regaining focus triggers an immediate store poll).

use crossterm::event::{
    DisableBracketedPaste, DisableFocusChange, DisableMouseCapture, EnableBracketedPaste,
    EnableFocusChange, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use signal_hook::consts::{SIGHUP, SIGTERM};
use signal_hook::flag::register;
use std::io::{stderr, BufWriter, Stderr, Write};
use std::sync::{atomic::AtomicBool, Arc};

/// CrosstermBackend over buffered stderr; escape sequences for one frame go
/// out in a single write.
pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

fn enter_session(out: &mut impl Write) -> std::io::Result<()> {
    execute!(
        out,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste,
        EnableFocusChange
    )
}

fn leave_session(out: &mut impl Write) -> std::io::Result<()> {
    execute!(
        out,
        DisableFocusChange,
        DisableBracketedPaste,
        DisableMouseCapture,
        LeaveAlternateScreen
    )
}

/// Enables raw mode and enters the alternate screen on stderr. Pair with
/// [`restore_tui`] on every exit path.
pub fn init_tui() -> std::io::Result<Tui> {
    let mut out = BufWriter::new(stderr());
    enable_raw_mode()?;
    enter_session(&mut out)?;
    Terminal::new(CrosstermBackend::new(out))
}

/// Returns the terminal to its pre-TUI state. Idempotent, and safe to call
/// from the panic hook since ratatui does not restore anything on `Drop`.
pub fn restore_tui() -> std::io::Result<()> {
    disable_raw_mode()?;
    leave_session(&mut stderr())
}

/// Installs a panic hook that restores the terminal and records the panic in
/// the log file, then chains to the previous hook so the message still prints.
///
/// Must be called before [`init_tui`].
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_tui();
        tracing::error!(panic = %info, "marginal panicked");
        previous(info);
    }));
}

/// Registers SIGTERM and SIGHUP (the hosting pane closed) against one shared
/// flag. The event loop polls it on a 50 ms heartbeat and exits cleanly.
///
/// # Panics
///
/// Panics if the OS refuses to register a handler; that is treated as a fatal
/// initialisation error.
pub fn register_shutdown_signals() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    for signal in [SIGTERM, SIGHUP] {
        // The handler only performs an atomic store, which is async-signal-safe.
        register(signal, Arc::clone(&flag)).expect("failed to register signal handler");
    }
    flag
}
