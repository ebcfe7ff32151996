use std::io::{self, Write};

use anyhow::Result;
use marginal_core::{AnchorState, Author, Comment, WorkflowState};
use serde::Serialize;

/// Characters of the id shown in listings; any unique prefix is accepted back.
pub const SHORT_ID: usize = 8;

pub fn print_stdout(text: &str) -> Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

/// Renders command results as text or JSON.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

/// A comment as listed to the agent: the stored record plus derived flags.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommentView<'a> {
    #[serde(flatten)]
    comment: &'a Comment,
    unseen: bool,
}

impl<'a> From<&'a Comment> for CommentView<'a> {
    fn from(comment: &'a Comment) -> Self {
        Self {
            comment,
            unseen: comment.has_unseen_activity(),
        }
    }
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Emits `value` as JSON, or `text()` otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> Result<()> {
        if self.json {
            print_stdout(&serde_json::to_string_pretty(value)?)
        } else {
            print_stdout(&text())
        }
    }

    pub fn comments(&self, comments: &[&Comment]) -> Result<()> {
        let views: Vec<CommentView<'_>> = comments.iter().map(|c| CommentView::from(*c)).collect();
        self.emit(&views, || {
            if comments.is_empty() {
                return "no comments".to_owned();
            }
            comments
                .iter()
                .map(|c| summary_line(c))
                .collect::<Vec<_>>()
                .join("\n")
        })
    }

    pub fn comment(&self, comment: &Comment) -> Result<()> {
        self.emit(&CommentView::from(comment), || detail(comment))
    }
}

fn short_id(id: &str) -> &str {
    id.get(..SHORT_ID).unwrap_or(id)
}

fn workflow_label(state: WorkflowState) -> &'static str {
    match state {
        WorkflowState::Open => "open",
        WorkflowState::Resolved => "resolved",
    }
}

fn anchor_label(state: AnchorState) -> &'static str {
    match state {
        AnchorState::Anchored => "anchored",
        AnchorState::Stale => "stale",
        AnchorState::Orphaned => "orphaned",
    }
}

fn author_label(author: Author) -> &'static str {
    match author {
        Author::Human => "human",
        Author::Agent => "agent",
    }
}

fn line_range(comment: &Comment) -> String {
    let a = &comment.anchor;
    if a.start_line == a.end_line {
        format!("{}", a.start_line)
    } else {
        format!("{}-{}", a.start_line, a.end_line)
    }
}

fn summary_line(comment: &Comment) -> String {
    let first = comment.body.lines().next().unwrap_or("");
    format!(
        "{}  {}:{}  [{}/{}]{}  {}",
        short_id(&comment.id),
        comment.file,
        line_range(comment),
        workflow_label(comment.workflow_state),
        anchor_label(comment.anchor_state),
        if comment.has_unseen_activity() { " *" } else { "" },
        first,
    )
}

fn detail(comment: &Comment) -> String {
    let mut out = String::new();
    out.push_str(&format!("id:     {}\n", comment.id));
    out.push_str(&format!("file:   {}:{}\n", comment.file, line_range(comment)));
    out.push_str(&format!(
        "state:  {} / {}\n",
        workflow_label(comment.workflow_state),
        anchor_label(comment.anchor_state)
    ));
    out.push_str(&format!("author: {} at {}\n", author_label(comment.author), comment.created_at));
    out.push('\n');
    for line in comment.anchor.target_content.split('\n') {
        out.push_str(&format!("  > {line}\n"));
    }
    out.push('\n');
    out.push_str(&comment.body);
    for reply in &comment.thread {
        out.push_str(&format!(
            "\n\n-- {} at {}\n{}",
            author_label(reply.author),
            reply.created_at,
            reply.body
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginal_core::{Anchor, Reply};

    fn sample() -> Comment {
        Comment {
            id: "0123456789abcdef".into(),
            file: "src/lib.rs".into(),
            anchor: Anchor {
                start_line: 4,
                end_line: 5,
                target_content: "a\nb".into(),
                context_before: Vec::new(),
                context_after: Vec::new(),
                content_hash: String::new(),
                last_anchor_check: None,
            },
            workflow_state: WorkflowState::Open,
            anchor_state: AnchorState::Stale,
            author: Author::Human,
            body: "first line\nsecond".into(),
            thread: vec![Reply {
                id: "r".into(),
                author: Author::Agent,
                body: "done".into(),
                created_at: "2026-01-01T00:00:00.000Z".into(),
            }],
            agent_last_seen_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn summary_line_is_compact() {
        assert_eq!(
            summary_line(&sample()),
            "01234567  src/lib.rs:4-5  [open/stale] *  first line"
        );
    }

    #[test]
    fn json_view_carries_unseen_flag() {
        let comment = sample();
        let value = serde_json::to_value(CommentView::from(&comment)).unwrap();
        assert_eq!(value["unseen"], true);
        assert_eq!(value["anchorState"], "stale");
        assert_eq!(value["anchor"]["startLine"], 4);
    }

    #[test]
    fn detail_lists_thread_in_order() {
        let text = detail(&sample());
        assert!(text.contains("  > a\n  > b\n"));
        assert!(text.ends_with("-- agent at 2026-01-01T00:00:00.000Z\ndone"));
    }
}
