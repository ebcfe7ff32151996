//! Thread panel renderer: the comment body, its replies, and the reply box.

use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Paragraph, Wrap},
};

use marginal_core::{Author, Comment};

use crate::app::{AppState, Mode, PanelFocus};
use crate::theme::Theme;
use crate::ui::layout::{inner_rect, panel_block};

/// Rows given to the reply box (including its border) while composing.
const REPLY_BOX_HEIGHT: u16 = 5;

pub fn render_thread(
    frame: &mut Frame,
    area: Rect,
    focus: PanelFocus,
    state: &AppState,
    theme: &Theme,
) {
    let entry = state.selected_entry();
    let title = match entry {
        Some(e) => format!("Thread ({} replies)", e.comment.thread.len()),
        None => "Thread".to_owned(),
    };
    frame.render_widget(panel_block(title, focus == PanelFocus::Thread, theme), area);
    let inner = inner_rect(area);

    let composing = state.mode == Mode::Insert
        || (state.has_unsent_reply()
            && entry.is_some_and(|e| state.reply_target.as_deref() == Some(e.comment.id.as_str())));
    let (body_area, reply_area) = if composing && inner.height > REPLY_BOX_HEIGHT {
        let [body, reply] = inner.layout(&Layout::vertical([
            Constraint::Fill(1),
            Constraint::Length(REPLY_BOX_HEIGHT),
        ]));
        (body, Some(reply))
    } else {
        (inner, None)
    };

    let text = match entry {
        Some(e) => thread_text(&e.comment, theme),
        None => Text::raw(""),
    };
    // Clamped by unwrapped line count, so `G` lands near the end.
    let max_scroll = u16::try_from(text.lines.len().saturating_sub(1)).unwrap_or(u16::MAX);
    frame.render_widget(
        Paragraph::new(text)
            .wrap(Wrap { trim: false })
            .scroll((state.thread_scroll.min(max_scroll), 0)),
        body_area,
    );

    if let Some(reply_area) = reply_area {
        let block_title = if state.mode == Mode::Insert {
            " Reply (Enter send, Esc keep draft) "
        } else {
            " Draft (c to continue) "
        };
        let mut draft = state.reply_draft.clone();
        if state.mode == Mode::Insert {
            draft.push('▏');
        }
        frame.render_widget(
            Paragraph::new(draft)
                .wrap(Wrap { trim: false })
                .block(Block::bordered().title(block_title).border_style(
                    Style::default().fg(theme.status_mode_insert),
                )),
            reply_area,
        );
    }
}

fn author_span(author: Author, theme: &Theme) -> Span<'static> {
    let (label, color) = match author {
        Author::Human => ("human", theme.author_human),
        Author::Agent => ("agent", theme.author_agent),
    };
    Span::styled(label, Style::default().fg(color).add_modifier(Modifier::BOLD))
}

fn header(author: Author, at: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        author_span(author, theme),
        Span::styled(format!("  {at}"), Style::default().fg(theme.muted)),
    ])
}

/// The root comment followed by every reply, oldest first.
fn thread_text(comment: &Comment, theme: &Theme) -> Text<'static> {
    let mut lines = vec![header(comment.author, &comment.created_at, theme)];
    lines.extend(comment.body.lines().map(|l| Line::raw(l.to_owned())));
    for reply in &comment.thread {
        lines.push(Line::raw(""));
        lines.push(header(reply.author, &reply.created_at, theme));
        lines.extend(reply.body.lines().map(|l| Line::raw(l.to_owned())));
    }
    if comment.has_unseen_activity() {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "● not yet seen by the agent",
            Style::default().fg(theme.unseen_marker),
        )));
    }
    Text::from(lines)
}
