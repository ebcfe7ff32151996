//! Keybinding dispatcher for the marginal TUI.
//!
//! Translates raw crossterm `KeyEvent`s into `AppState` mutations (and store
//! requests) and returns a `KeyAction` telling the event loop whether to
//! continue or quit. The dispatcher branches first on `state.mode` so that
//! HelpOverlay, ConfirmQuit, Insert, and Normal have isolated handlers.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Position;

use crate::app::{AppState, Mode, PanelFocus};

/// Control-flow signal returned from the key dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// Keep running; the next Render tick redraws.
    Continue,
    /// Exit cleanly.
    Quit,
}

/// Dispatches a key event to the handler for the current mode.
///
/// # Arguments
///
/// * `key`   — the raw crossterm key event (code + modifiers)
/// * `state` — mutable reference to all UI state
pub fn handle_key(key: KeyEvent, state: &mut AppState) -> KeyAction {
    // Ctrl-c always quits, even mid-reply.
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return KeyAction::Quit;
    }
    match state.mode {
        Mode::HelpOverlay => handle_help(key, state),
        Mode::ConfirmQuit => handle_confirm_quit(key, state),
        Mode::Normal => handle_normal(key, state),
        Mode::Insert => handle_insert(key, state),
    }
}

// ---------------------------------------------------------------------------
// Normal mode
// ---------------------------------------------------------------------------

fn handle_normal(key: KeyEvent, state: &mut AppState) -> KeyAction {
    if let Some(action) = handle_scroll_key(key, state) {
        return action;
    }

    match key.code {
        KeyCode::Char('H') => state.focus = state.focus.prev(),
        KeyCode::Char('L') => state.focus = state.focus.next(),

        KeyCode::Tab => state.cycle_filter(),
        KeyCode::Char('r') => state.toggle_selected_resolved(),
        KeyCode::Char('R') => state.force_reconcile(),
        KeyCode::Char('c') | KeyCode::Enter => state.begin_reply(),

        KeyCode::Char('<') => state.shrink_center_panel(),
        KeyCode::Char('>') => state.grow_center_panel(),

        KeyCode::Char('?') => {
            state.help_scroll = 0;
            state.mode = Mode::HelpOverlay;
        }

        KeyCode::Char('q') | KeyCode::Esc => {
            if state.has_unsent_reply() {
                state.mode = Mode::ConfirmQuit;
            } else {
                return KeyAction::Quit;
            }
        }

        _ => {}
    }
    KeyAction::Continue
}

/// Handles j / k / g / G and Ctrl-d / Ctrl-u. Returns `None` when the key is
/// not a scroll key.
fn handle_scroll_key(key: KeyEvent, state: &mut AppState) -> Option<KeyAction> {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => state.scroll_down(1),
        KeyCode::Char('k') | KeyCode::Up => state.scroll_up(1),
        KeyCode::Char('g') | KeyCode::Home => state.scroll_top(),
        KeyCode::Char('G') | KeyCode::End => state.scroll_bottom(),
        KeyCode::Char('d') if ctrl => state.half_page_down(),
        KeyCode::Char('u') if ctrl => state.half_page_up(),
        _ => return None,
    }
    Some(KeyAction::Continue)
}

// ---------------------------------------------------------------------------
// HelpOverlay mode
// ---------------------------------------------------------------------------

/// `?`, `Esc`, or `q` dismiss the overlay; j / k / g / G scroll it.
fn handle_help(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            state.help_scroll = state.help_scroll.saturating_add(1);
        }
        KeyCode::Char('k') | KeyCode::Up => {
            state.help_scroll = state.help_scroll.saturating_sub(1);
        }
        KeyCode::Char('g') => state.help_scroll = 0,
        KeyCode::Char('G') => state.help_scroll = u16::MAX,
        KeyCode::Char('?') | KeyCode::Esc | KeyCode::Char('q') => state.mode = Mode::Normal,
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// ConfirmQuit mode
// ---------------------------------------------------------------------------

/// `y` quits and drops the draft; `n` or `Esc` goes back to Normal mode.
fn handle_confirm_quit(key: KeyEvent, state: &mut AppState) -> KeyAction {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') => KeyAction::Quit,
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            state.mode = Mode::Normal;
            KeyAction::Continue
        }
        _ => KeyAction::Continue,
    }
}

// ---------------------------------------------------------------------------
// Insert mode
// ---------------------------------------------------------------------------

/// Edits the reply draft. `Enter` sends, `Esc` returns to Normal mode with the
/// draft kept (a blank draft is dropped), `Ctrl-u` clears it.
fn handle_insert(key: KeyEvent, state: &mut AppState) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => {
            if !state.has_unsent_reply() {
                state.discard_reply();
            }
            state.mode = Mode::Normal;
        }
        KeyCode::Enter => state.submit_reply(),
        KeyCode::Backspace => {
            state.reply_draft.pop();
        }
        KeyCode::Char('u') if ctrl => state.reply_draft.clear(),
        KeyCode::Char(ch) if !ctrl => state.reply_draft.push(ch),
        _ => {}
    }
    KeyAction::Continue
}

// ---------------------------------------------------------------------------
// Mouse events
// ---------------------------------------------------------------------------

/// Left click focuses the panel under the cursor; the wheel scrolls the focused
/// panel (or the help overlay) by 3 rows.
pub fn handle_mouse(mouse: MouseEvent, state: &mut AppState) -> KeyAction {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            let pos = Position { x: mouse.column, y: mouse.row };
            let [comments, anchor, thread] = state.panel_rects;
            if comments.contains(pos) {
                state.focus = PanelFocus::Comments;
            } else if anchor.contains(pos) {
                state.focus = PanelFocus::Anchor;
            } else if thread.contains(pos) {
                state.focus = PanelFocus::Thread;
            }
        }
        MouseEventKind::ScrollUp if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_sub(3);
        }
        MouseEventKind::ScrollDown if state.mode == Mode::HelpOverlay => {
            state.help_scroll = state.help_scroll.saturating_add(3);
        }
        MouseEventKind::ScrollUp => state.scroll_up(3),
        MouseEventKind::ScrollDown => state.scroll_down(3),
        _ => {}
    }
    KeyAction::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::{entry, loaded};
    use crate::app::Filter;
    use crossbeam_channel::unbounded;
    use marginal_core::WorkflowState;

    use crate::store::types::StoreRequest;

    fn press(state: &mut AppState, code: KeyCode) -> KeyAction {
        handle_key(KeyEvent::new(code, KeyModifiers::NONE), state)
    }

    fn type_text(state: &mut AppState, text: &str) {
        for ch in text.chars() {
            press(state, KeyCode::Char(ch));
        }
    }

    #[test]
    fn normal_keys_drive_store_requests() {
        let (tx, rx) = unbounded();
        let mut state = loaded(vec![
            entry("a", WorkflowState::Open),
            entry("b", WorkflowState::Open),
        ]);
        state.store_tx = Some(tx);

        press(&mut state, KeyCode::Char('j'));
        press(&mut state, KeyCode::Char('r'));
        press(&mut state, KeyCode::Char('R'));
        assert_eq!(rx.try_recv().unwrap(), StoreRequest::ToggleResolved { id: "b".into() });
        assert_eq!(rx.try_recv().unwrap(), StoreRequest::Reconcile { force: true });

        press(&mut state, KeyCode::Tab);
        assert_eq!(state.filter, Filter::Resolved);
    }

    #[test]
    fn reply_round_trip_through_insert_mode() {
        let (tx, rx) = unbounded();
        let mut state = loaded(vec![entry("a", WorkflowState::Open)]);
        state.store_tx = Some(tx);

        press(&mut state, KeyCode::Char('c'));
        assert_eq!(state.mode, Mode::Insert);
        // `q` is text while composing.
        type_text(&mut state, "quite rightx");
        press(&mut state, KeyCode::Backspace);
        assert_eq!(state.reply_draft, "quite right");

        press(&mut state, KeyCode::Enter);
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(
            rx.try_recv().unwrap(),
            StoreRequest::Reply { id: "a".into(), body: "quite right".into() }
        );
        assert!(state.reply_draft.is_empty());
    }

    #[test]
    fn unsent_reply_needs_quit_confirmation() {
        let mut state = loaded(vec![entry("a", WorkflowState::Open)]);
        press(&mut state, KeyCode::Char('c'));
        type_text(&mut state, "half a thought");
        press(&mut state, KeyCode::Esc);
        assert_eq!(state.mode, Mode::Normal);

        assert_eq!(press(&mut state, KeyCode::Char('q')), KeyAction::Continue);
        assert_eq!(state.mode, Mode::ConfirmQuit);
        press(&mut state, KeyCode::Char('n'));
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(state.reply_draft, "half a thought");

        press(&mut state, KeyCode::Char('q'));
        assert_eq!(press(&mut state, KeyCode::Char('y')), KeyAction::Quit);
    }

    #[test]
    fn help_overlay_swallows_normal_keys() {
        let mut state = loaded(vec![entry("a", WorkflowState::Open)]);
        press(&mut state, KeyCode::Char('?'));
        assert_eq!(state.mode, Mode::HelpOverlay);
        press(&mut state, KeyCode::Char('j'));
        assert_eq!(state.help_scroll, 1);
        assert_eq!(press(&mut state, KeyCode::Char('q')), KeyAction::Continue);
        assert_eq!(state.mode, Mode::Normal);
        assert_eq!(press(&mut state, KeyCode::Char('q')), KeyAction::Quit);
    }
}
