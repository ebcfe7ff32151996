//! UI rendering for the marginal TUI.
//!
//! `render()` is the single entry point called by the event loop's
//! `terminal.draw()` closure. Layout arithmetic lives in `layout.rs`; each panel
//! has its own renderer module.

mod layout;
pub mod anchor_view;
pub mod comment_list;
pub mod help;
pub mod keybindings;
pub mod thread_view;

use ratatui::Frame;

use crate::app::{AppState, Mode};
use crate::theme::Theme;
use layout::{compute_layout, inner_rect, render_status_bar};

/// Renders one complete frame: comment list, anchor view, thread, status bar,
/// and any modal on top.
///
/// Called exactly once per `AppEvent::Render`. Viewport heights and panel rects
/// are written back into `state` so the next keypress or click can use them;
/// the one-frame lag is imperceptible.
pub fn render(frame: &mut Frame, state: &mut AppState, theme: &Theme) {
    let [comments, anchor, thread, status_bar] = compute_layout(frame, state);

    state.list_viewport_height = inner_rect(comments).height;
    state.anchor_viewport_height = inner_rect(anchor).height;
    state.thread_viewport_height = inner_rect(thread).height;
    state.panel_rects = [comments, anchor, thread];

    let focus = state.focus;
    comment_list::render_comment_list(frame, comments, focus, state, theme);
    anchor_view::render_anchor(frame, anchor, focus, state, theme);
    thread_view::render_thread(frame, thread, focus, state, theme);
    render_status_bar(frame, status_bar, state, theme);

    match state.mode {
        Mode::HelpOverlay => help::render_help_overlay(frame, theme, state.help_scroll),
        Mode::ConfirmQuit => help::render_confirm_quit(frame, theme),
        Mode::Normal | Mode::Insert => {}
    }
}
