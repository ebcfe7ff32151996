//! Pre-rendering of the anchor panel, run on the store worker thread.
//!
//! Anchored comments get a syntect-highlighted snippet with a gutter marking the
//! anchored lines. Stale comments get a line diff (with word-level emphasis on
//! replaced lines) between the stored target text and whatever now sits at the
//! stored position. Orphaned comments show the last known text.

use std::path::Path;
use std::sync::LazyLock;

use marginal_core::anchor::split_lines;
use marginal_core::{AnchorState, Comment};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use similar::{ChangeTag, TextDiff};
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};

static PS: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_nonewlines);
static TS: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

/// Lines shown above and below an anchored range.
const SNIPPET_CONTEXT: usize = 3;

/// Forces the syntax and theme sets to load so the first snapshot is not slow.
pub fn warm_up() {
    let _ = &*PS;
    let _ = &*TS;
}

/// Builds the anchor panel for `comment`. `current` is the file's content, or
/// `None` when it could not be read.
pub fn anchor_view(comment: &Comment, current: Option<&str>) -> Vec<Line<'static>> {
    let Some(text) = current else {
        return missing_file_view(comment);
    };
    let lines = split_lines(text);
    match comment.anchor_state {
        AnchorState::Orphaned => missing_file_view(comment),
        AnchorState::Stale => stale_view(comment, &lines),
        AnchorState::Anchored => snippet_view(
            &comment.file,
            &lines,
            comment.anchor.start_line,
            comment.anchor.end_line,
        ),
    }
}

fn syntax_for(file: &str) -> &'static SyntaxReference {
    Path::new(file)
        .extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| PS.find_syntax_by_extension(ext))
        .unwrap_or_else(|| PS.find_syntax_plain_text())
}

fn snippet_view(file: &str, lines: &[String], start: usize, end: usize) -> Vec<Line<'static>> {
    let from = start.saturating_sub(SNIPPET_CONTEXT + 1);
    let to = end.saturating_add(SNIPPET_CONTEXT).min(lines.len());
    if from >= to {
        return vec![Line::from(Span::styled(
            format!(
                "lines {start}-{end} are past the end of {file} ({} lines); press R to reconcile",
                lines.len()
            ),
            Style::default().fg(Color::Yellow),
        ))];
    }

    let mut highlighter = TS
        .themes
        .get("base16-ocean.dark")
        .or_else(|| TS.themes.values().next())
        .map(|theme| HighlightLines::new(syntax_for(file), theme));

    let mut out = Vec::with_capacity(to - from);
    for (offset, code) in lines[from..to].iter().enumerate() {
        let line_no = from + offset + 1;
        let inside = (start..=end).contains(&line_no);
        let (marker, gutter_color) = if inside {
            ("▌", Color::Yellow)
        } else {
            (" ", Color::DarkGray)
        };
        let mut spans = vec![Span::styled(
            format!("{line_no:>5} {marker}"),
            Style::default().fg(gutter_color),
        )];
        match highlighter.as_mut() {
            Some(h) => spans.extend(syntect_spans(code, h)),
            None => spans.push(Span::raw(code.clone())),
        }
        out.push(Line::from(spans));
    }
    out
}

fn stale_view(comment: &Comment, lines: &[String]) -> Vec<Line<'static>> {
    let anchor = &comment.anchor;
    let from = anchor.start_line.saturating_sub(1).min(lines.len());
    let to = anchor.end_line.min(lines.len()).max(from);
    let current = lines[from..to].join("\n");

    let mut out = vec![
        Line::from(Span::styled(
            format!(
                "anchor lost: stored text vs. lines {}-{} now",
                anchor.start_line, anchor.end_line
            ),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
    ];

    let diff = TextDiff::from_lines(anchor.target_content.as_str(), current.as_str());
    let mut pending_removed: Option<String> = None;
    for change in diff.iter_all_changes() {
        let value = change.value().trim_end_matches('\n');
        match change.tag() {
            ChangeTag::Delete => {
                if let Some(old) = pending_removed.replace(value.to_owned()) {
                    out.push(removed_line(&old));
                }
            }
            ChangeTag::Insert => match pending_removed.take() {
                Some(old) => {
                    let (old_spans, new_spans) = word_diff_spans(&old, value);
                    out.push(prefixed("- ", Color::Red, old_spans));
                    out.push(prefixed("+ ", Color::Green, new_spans));
                }
                None => out.push(prefixed(
                    "+ ",
                    Color::Green,
                    vec![Span::styled(value.to_owned(), Style::default().fg(Color::Green))],
                )),
            },
            ChangeTag::Equal => {
                if let Some(old) = pending_removed.take() {
                    out.push(removed_line(&old));
                }
                out.push(prefixed(
                    "  ",
                    Color::DarkGray,
                    vec![Span::styled(value.to_owned(), Style::default().fg(Color::DarkGray))],
                ));
            }
        }
    }
    if let Some(old) = pending_removed.take() {
        out.push(removed_line(&old));
    }
    out
}

fn missing_file_view(comment: &Comment) -> Vec<Line<'static>> {
    let mut out = vec![
        Line::from(Span::styled(
            format!("file missing: {}", comment.file),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
        Line::from(Span::styled(
            format!(
                "last known text (lines {}-{}):",
                comment.anchor.start_line, comment.anchor.end_line
            ),
            Style::default().fg(Color::DarkGray),
        )),
    ];
    out.extend(
        comment
            .anchor
            .target_content
            .split('\n')
            .map(|l| Line::raw(format!("  {l}"))),
    );
    out
}

fn prefixed(prefix: &'static str, color: Color, body: Vec<Span<'static>>) -> Line<'static> {
    let mut spans = vec![Span::styled(prefix, Style::default().fg(color))];
    spans.extend(body);
    Line::from(spans)
}

fn removed_line(text: &str) -> Line<'static> {
    prefixed(
        "- ",
        Color::Red,
        vec![Span::styled(text.to_owned(), Style::default().fg(Color::Red))],
    )
}

/// Maps a syntect style onto ratatui, dropping fully transparent colours.
fn syntect_to_span(style: syntect::highlighting::Style, content: &str) -> Span<'static> {
    let rgb = |c: syntect::highlighting::Color| (c.a > 0).then_some(Color::Rgb(c.r, c.g, c.b));
    let mut out = Style::default();
    if let Some(fg) = rgb(style.foreground) {
        out = out.fg(fg);
    }
    for (font, modifier) in [
        (FontStyle::BOLD, Modifier::BOLD),
        (FontStyle::ITALIC, Modifier::ITALIC),
        (FontStyle::UNDERLINE, Modifier::UNDERLINED),
    ] {
        if style.font_style.contains(font) {
            out = out.add_modifier(modifier);
        }
    }
    Span::styled(content.to_owned(), out)
}

fn syntect_spans(code: &str, h: &mut HighlightLines) -> Vec<Span<'static>> {
    match h.highlight_line(code, &PS) {
        Ok(ranges) if !ranges.is_empty() => ranges
            .into_iter()
            .map(|(style, text)| syntect_to_span(style, text))
            .collect(),
        _ => vec![Span::raw(code.to_owned())],
    }
}

/// Word-level diff of a replaced line: changed words are bold, shared words dim.
fn word_diff_spans(old_line: &str, new_line: &str) -> (Vec<Span<'static>>, Vec<Span<'static>>) {
    let diff = TextDiff::from_words(old_line, new_line);
    let mut old_spans = Vec::new();
    let mut new_spans = Vec::new();

    let emphasis = |color: Color, emphasized: bool| {
        let style = Style::default().fg(color);
        if emphasized {
            style.add_modifier(Modifier::BOLD)
        } else {
            style
        }
    };

    for op in diff.ops() {
        for change in diff.iter_inline_changes(op) {
            for (emphasized, value) in change.iter_strings_lossy() {
                let text = value.into_owned();
                match change.tag() {
                    ChangeTag::Delete => {
                        old_spans.push(Span::styled(text, emphasis(Color::Red, emphasized)))
                    }
                    ChangeTag::Insert => {
                        new_spans.push(Span::styled(text, emphasis(Color::Green, emphasized)))
                    }
                    ChangeTag::Equal => {
                        let span = Span::styled(text, Style::default().fg(Color::DarkGray));
                        old_spans.push(span.clone());
                        new_spans.push(span);
                    }
                }
            }
        }
    }
    (old_spans, new_spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use marginal_core::{Anchor, Author, WorkflowState};

    fn text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    fn comment(state: AnchorState, start: usize, end: usize, target: &str) -> Comment {
        Comment {
            id: "c".into(),
            file: "src/lib.rs".into(),
            anchor: Anchor {
                start_line: start,
                end_line: end,
                target_content: target.into(),
                context_before: Vec::new(),
                context_after: Vec::new(),
                content_hash: String::new(),
                last_anchor_check: None,
            },
            workflow_state: WorkflowState::Open,
            anchor_state: state,
            author: Author::Human,
            body: String::new(),
            thread: Vec::new(),
            agent_last_seen_at: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[test]
    fn snippet_marks_anchored_lines() {
        let source = (1..=10).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let view = anchor_view(&comment(AnchorState::Anchored, 5, 6, "line 5\nline 6"), Some(&source));
        let rendered: Vec<String> = view.iter().map(text).collect();
        assert_eq!(rendered.len(), 8, "lines 2..=9");
        assert_eq!(rendered[0], "    2  line 2");
        assert_eq!(rendered[3], "    5 ▌line 5");
        assert_eq!(rendered[4], "    6 ▌line 6");
        assert_eq!(rendered[7], "    9  line 9");
    }

    #[test]
    fn snippet_past_end_asks_for_reconcile() {
        let view = anchor_view(&comment(AnchorState::Anchored, 40, 41, "x"), Some("a\nb"));
        assert_eq!(view.len(), 1);
        assert!(text(&view[0]).contains("past the end"));
    }

    #[test]
    fn stale_view_diffs_stored_against_current() {
        let c = comment(AnchorState::Stale, 2, 2, "let total = compute();");
        let view = anchor_view(&c, Some("fn main() {\n    let sum = other();\n}"));
        let rendered: Vec<String> = view.iter().map(text).collect();
        assert!(rendered[0].starts_with("anchor lost"));
        assert!(rendered.iter().any(|l| l.starts_with("- ") && l.contains("total")));
        assert!(rendered.iter().any(|l| l.starts_with("+ ") && l.contains("sum")));
    }

    #[test]
    fn orphaned_and_unreadable_show_last_known_text() {
        let c = comment(AnchorState::Orphaned, 1, 2, "alpha\nbeta");
        for view in [anchor_view(&c, None), anchor_view(&c, Some("whatever"))] {
            let rendered: Vec<String> = view.iter().map(text).collect();
            assert_eq!(rendered[0], "file missing: src/lib.rs");
            assert_eq!(&rendered[3..], ["  alpha", "  beta"]);
        }
    }
}
