//! Help overlay and quit-confirmation renderers.
//!
//! Both draw centred modals inside the same `terminal.draw()` closure as the
//! panels: `frame.render_widget(Clear, area)` erases the background before the
//! bordered `Paragraph`, so no second draw call is needed.

use ratatui::{
    Frame,
    layout::Constraint,
    text::{Line, Text},
    widgets::{Block, Clear, Paragraph, Wrap},
};

use crate::theme::Theme;

/// Renders the help overlay as a centred modal on top of the 3-panel layout.
///
/// The paragraph scrolls vertically by `help_scroll` rows so long help text
/// stays readable on short terminals.
///
/// Skipped on terminals narrower than 60 columns, where the centred rect
/// could collapse to zero height.
///
/// # Arguments
///
/// * `frame` — current render frame provided by `terminal.draw()`
/// * `theme` — active color theme (supplies `border_active` for the modal border)
/// * `help_scroll` — vertical scroll offset; j/k in HelpOverlay mode mutate this field
pub fn render_help_overlay(frame: &mut Frame, theme: &Theme, help_scroll: u16) {
    if frame.area().width < 60 {
        return;
    }

    let overlay_area = frame
        .area()
        .centered(Constraint::Percentage(80), Constraint::Percentage(80));

    // Erase the background behind the modal before drawing content.
    frame.render_widget(Clear, overlay_area);

    let block = Block::bordered()
        .title(" Help: j/k scroll, ? or Esc to dismiss ")
        .border_style(ratatui::style::Style::default().fg(theme.border_active));

    let help_text = build_help_text();
    let max_scroll = u16::try_from(help_text.lines.len().saturating_sub(1)).unwrap_or(u16::MAX);

    frame.render_widget(
        Paragraph::new(help_text)
            .block(block)
            .wrap(Wrap { trim: false })
            .scroll((help_scroll.min(max_scroll), 0)),
        overlay_area,
    );
}

/// Renders the "discard unsent reply?" prompt shown in `Mode::ConfirmQuit`.
pub fn render_confirm_quit(frame: &mut Frame, theme: &Theme) {
    let area = frame
        .area()
        .centered(Constraint::Length(44), Constraint::Length(5));
    frame.render_widget(Clear, area);
    frame.render_widget(
        Paragraph::new(Text::from(vec![
            Line::from("An unsent reply will be lost."),
            Line::from("Quit anyway?  y / n"),
        ]))
        .block(
            Block::bordered()
                .title(" Quit ")
                .border_style(ratatui::style::Style::default().fg(theme.status_error)),
        ),
        area,
    );
}

/// Keybinding descriptions grouped by section.
fn build_help_text() -> Text<'static> {
    Text::from(vec![
        Line::from("Navigation"),
        Line::from("  j / k         Next / previous comment, or scroll the focused panel"),
        Line::from("  g / G         Jump to top / bottom"),
        Line::from("  Ctrl-d / u    Half page down / up"),
        Line::from("  H / L         Move panel focus left / right"),
        Line::from("  < / >         Shrink / grow the anchor panel by 5%"),
        Line::from(""),
        Line::from("Comments"),
        Line::from("  Tab           Cycle filter: open -> resolved -> all"),
        Line::from("  r             Toggle resolved on the selected comment"),
        Line::from("  c             Reply to the selected comment"),
        Line::from("  R             Re-anchor every comment now"),
        Line::from(""),
        Line::from("Badges"),
        Line::from("  [A] anchored  [S] stale (anchor lost)  [O] orphaned (file gone)"),
        Line::from("  ●             Human activity the agent has not seen yet"),
        Line::from("  ✓             Resolved"),
        Line::from(""),
        Line::from("Reply box"),
        Line::from("  Enter         Send"),
        Line::from("  Esc           Back to normal mode, keeping the draft"),
        Line::from("  Ctrl-u        Clear the draft"),
        Line::from("  paste         Pasted text is appended to the draft"),
        Line::from(""),
        Line::from("General"),
        Line::from("  ?             Open / close this help overlay"),
        Line::from("  q / Esc       Quit (confirms if a reply is unsent)"),
    ])
}
