//! Responsive 3-panel layout engine for the marginal TUI.
//!
//! This module is pure layout arithmetic plus the status bar. It is called
//! inside `terminal.draw()` on every render, so each frame reflects the current
//! terminal size.
//!
//! # Panel geometry
//!
//! At `>= 110` columns the comment list, anchor view, and thread sit side by
//! side with widths from `AppState.left_pct / center_pct / right_pct`. Narrower
//! terminals stack the same three panels vertically (list 30%, anchor 40%,
//! thread 30%) so every panel stays reachable.
//!
//! `Spacing::Overlap(1)` combined with `Block::merge_borders(MergeStrategy::Fuzzy)`
//! makes adjacent panel borders share a single cell and merge their junctions.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Margin, Rect, Spacing},
    style::{Modifier, Style},
    symbols::merge::MergeStrategy,
    text::{Line, Span},
    widgets::{Block, BorderType, Paragraph},
};

use crate::app::{AppState, Mode};
use crate::theme::Theme;

/// Minimum width for the side-by-side layout.
const WIDE_LAYOUT_MIN_COLS: u16 = 110;

/// Returns `[comments, anchor, thread, status_bar]` `Rect`s for the current frame.
///
/// The returned rects are valid only for the current draw closure.
pub fn compute_layout(frame: &Frame, state: &AppState) -> [Rect; 4] {
    let [main_area, status_bar] =
        frame.area().layout(&Layout::vertical([Constraint::Fill(1), Constraint::Length(1)]));

    let panels = if frame.area().width >= WIDE_LAYOUT_MIN_COLS {
        Layout::horizontal([
            Constraint::Percentage(state.left_pct),
            Constraint::Percentage(state.center_pct),
            Constraint::Percentage(state.right_pct),
        ])
    } else {
        Layout::vertical([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
    }
    .spacing(Spacing::Overlap(1));

    let [comments, anchor, thread] = main_area.layout(&panels);
    [comments, anchor, thread, status_bar]
}

/// Returns the inner `Rect` of a panel after removing the 1-cell border.
pub fn inner_rect(area: Rect) -> Rect {
    area.inner(Margin { vertical: 1, horizontal: 1 })
}

/// Builds a bordered `Block` for a panel.
///
/// Focused panels get `BorderType::Thick` in `border_active`; the rest are
/// `Plain`. `MergeStrategy::Fuzzy` is required because `Exact` draws wrong
/// junctions where thick and plain borders meet.
///
/// # Arguments
///
/// * `title` — panel title shown in the top border
/// * `is_focused` — `true` when this panel has keyboard focus
/// * `theme` — active color theme
pub fn panel_block<'a>(title: impl Into<Line<'a>>, is_focused: bool, theme: &Theme) -> Block<'a> {
    let border_style = if is_focused {
        Style::default().fg(theme.border_active)
    } else {
        Style::default().fg(theme.border_inactive)
    };
    let border_type = if is_focused { BorderType::Thick } else { BorderType::Plain };

    Block::bordered()
        .title(title)
        .border_type(border_type)
        .border_style(border_style)
        .merge_borders(MergeStrategy::Fuzzy)
}

/// Renders the 1-row status bar: mode, filter and counts, then the latest
/// store notice (errors in `status_error`).
pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &AppState, theme: &Theme) {
    let (mode_text, mode_fg) = match state.mode {
        Mode::Insert => (" INSERT ", theme.status_mode_insert),
        Mode::Normal | Mode::ConfirmQuit | Mode::HelpOverlay => {
            (" NORMAL ", theme.status_mode_normal)
        }
    };

    let mut spans = vec![
        Span::styled(mode_text, Style::default().fg(mode_fg).add_modifier(Modifier::BOLD)),
        Span::raw(format!(
            " {} {}/{} ",
            state.filter.label(),
            state.visible.len(),
            state.entries.len()
        )),
    ];
    if state.loading {
        spans.push(Span::raw(" loading…"));
    }
    if let Some(notice) = &state.notice {
        let style = if notice.is_error {
            Style::default().fg(theme.status_error).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        spans.push(Span::raw(" │ "));
        spans.push(Span::styled(notice.text.clone(), style));
    }
    spans.push(Span::raw("  ? help"));

    frame.render_widget(
        Paragraph::new(Line::from(spans))
            .style(Style::default().bg(theme.status_bar_bg).fg(theme.status_bar_fg)),
        area,
    );
}
