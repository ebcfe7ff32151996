//! Comment list panel renderer.
//!
//! Renders the left panel from `AppState.visible`. Each row shows the anchor
//! state badge, an unseen-activity marker, `file:line`, and the first line of
//! the comment body. Resolved comments are dimmed.

use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem},
};

use marginal_core::{AnchorState, Comment, WorkflowState};

use crate::app::{AppState, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::panel_block;

/// Longest `file` shown before the path is shortened from the left.
const MAX_PATH_CHARS: usize = 32;

/// Renders the comment list with the selection highlight from `state.list_state`.
pub fn render_comment_list(
    frame: &mut Frame,
    area: Rect,
    focus: PanelFocus,
    state: &mut AppState,
    theme: &Theme,
) {
    let title = format!("Comments ({}: {})", state.filter.label(), state.visible.len());
    let block = panel_block(title, focus == PanelFocus::Comments, theme);

    let items: Vec<ListItem> = if state.visible.is_empty() {
        let msg = if state.loading { "Loading..." } else { "No comments" };
        vec![ListItem::new(Line::raw(msg))]
    } else {
        state
            .visible
            .iter()
            .filter_map(|&i| state.entries.get(i))
            .map(|e| comment_item(&e.comment, theme))
            .collect()
    };

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().fg(theme.border_active).add_modifier(Modifier::REVERSED));

    frame.render_stateful_widget(list, area, &mut state.list_state);
}

fn comment_item(comment: &Comment, theme: &Theme) -> ListItem<'static> {
    let (badge, badge_color) = match comment.anchor_state {
        AnchorState::Anchored => ("[A]", theme.badge_anchored),
        AnchorState::Stale => ("[S]", theme.badge_stale),
        AnchorState::Orphaned => ("[O]", theme.badge_orphaned),
    };
    let resolved = comment.workflow_state == WorkflowState::Resolved;
    let text_style = if resolved {
        Style::default().fg(theme.badge_resolved)
    } else {
        Style::default()
    };

    let unseen = if comment.has_unseen_activity() {
        Span::styled("● ", Style::default().fg(theme.unseen_marker))
    } else {
        Span::raw("  ")
    };
    let location = format!(
        "{}:{} ",
        shorten_path(&comment.file),
        comment.anchor.start_line
    );
    let summary = comment.body.lines().next().unwrap_or("").to_owned();

    let mut spans = vec![
        Span::styled(format!("{badge} "), Style::default().fg(badge_color)),
        unseen,
        Span::styled(location, Style::default().fg(theme.muted)),
        Span::styled(summary, text_style),
    ];
    if resolved {
        spans.insert(1, Span::styled("✓ ", text_style));
    }
    ListItem::new(Line::from(spans))
}

/// Keeps the tail of long paths, which holds the file name.
fn shorten_path(path: &str) -> String {
    let count = path.chars().count();
    if count <= MAX_PATH_CHARS {
        return path.to_owned();
    }
    let tail: String = path.chars().skip(count - (MAX_PATH_CHARS - 1)).collect();
    format!("…{tail}")
}
