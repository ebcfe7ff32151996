//! Anchor panel renderer.
//!
//! Shows the selected comment's pre-rendered anchor lines (built by the store
//! worker) with manual virtual scrolling: only the visible window is turned
//! into `ListItem`s each frame.

use ratatui::{
    Frame,
    layout::Rect,
    text::Line,
    widgets::{List, ListItem},
};

use crate::app::{AppState, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

pub fn render_anchor(
    frame: &mut Frame,
    area: Rect,
    focus: PanelFocus,
    state: &AppState,
    theme: &Theme,
) {
    let entry = state.selected_entry();
    let title = match entry {
        Some(e) if e.comment.line_count() > 1 => format!(
            "{}:{}-{}",
            e.comment.file, e.comment.anchor.start_line, e.comment.anchor.end_line
        ),
        Some(e) => format!("{}:{}", e.comment.file, e.comment.anchor.start_line),
        None => "Anchor".to_owned(),
    };
    let inner = inner_rect(area);
    frame.render_widget(panel_block(title, focus == PanelFocus::Anchor, theme), area);

    let Some(entry) = entry else {
        let msg = if state.loading { "Loading..." } else { "No comment selected" };
        frame.render_widget(List::new(vec![ListItem::new(Line::raw(msg))]), inner);
        return;
    };

    let lines = &entry.anchor_view;
    if lines.is_empty() {
        return;
    }
    let start = state.anchor_scroll.min(lines.len() - 1);
    let end = (start + inner.height as usize).min(lines.len());
    let items: Vec<ListItem> = lines[start..end].iter().map(|l| ListItem::new(l.clone())).collect();
    frame.render_widget(List::new(items), inner);
}
