//! On-disk schema version and the load-time migration of legacy records.
//!
//! Older writers stored a single `status` field instead of the
//! `workflowState` / `anchorState` pair, and some records predate `thread`,
//! context lines, or `contentHash`. [`migrate`] runs once per load and hands
//! the rest of the crate only the current shape; legacy field names never
//! escape this module.

use std::collections::HashSet;

use serde::Deserialize;

use crate::anchor::content_hash;
use crate::error::{Error, Result};
use crate::types::{Anchor, AnchorState, Author, Comment, Document, Reply, WorkflowState};

/// Schema version written by this build. Any other value is a hard load failure.
pub const CURRENT_VERSION: u64 = 1;

/// Creation timestamp assigned to records that never carried one.
const UNKNOWN_CREATED_AT: &str = "1970-01-01T00:00:00.000Z";

#[derive(Debug, Deserialize)]
struct RawDocument {
    version: Option<u64>,
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    id: String,
    file: String,
    anchor: RawAnchor,
    workflow_state: Option<WorkflowState>,
    anchor_state: Option<AnchorState>,
    status: Option<String>,
    author: Option<String>,
    #[serde(default)]
    body: String,
    thread: Option<Vec<RawReply>>,
    agent_last_seen_at: Option<String>,
    created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnchor {
    start_line: usize,
    end_line: Option<usize>,
    #[serde(default)]
    target_content: String,
    #[serde(default)]
    context_before: Vec<String>,
    #[serde(default)]
    context_after: Vec<String>,
    content_hash: Option<String>,
    last_anchor_check: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReply {
    #[serde(default)]
    id: String,
    author: Option<String>,
    #[serde(default)]
    body: String,
    created_at: Option<String>,
}

/// Parses raw store bytes and migrates every record to the current shape.
///
/// # Errors
///
/// Returns `Error::Json` for malformed JSON and `Error::VersionMismatch` when
/// the top-level `version` is absent or differs from [`CURRENT_VERSION`].
pub fn migrate(raw: &[u8]) -> Result<Document> {
    let doc: RawDocument = serde_json::from_slice(raw)?;
    if doc.version != Some(CURRENT_VERSION) {
        return Err(Error::VersionMismatch {
            found: doc.version,
            expected: CURRENT_VERSION,
        });
    }

    let mut seen = HashSet::new();
    let mut comments = Vec::with_capacity(doc.comments.len());
    for raw in doc.comments {
        if !seen.insert(raw.id.clone()) {
            tracing::warn!(id = %raw.id, "dropping comment with duplicate id");
            continue;
        }
        comments.push(migrate_comment(raw));
    }

    Ok(Document {
        version: CURRENT_VERSION,
        comments,
        ..Document::default()
    })
}

/// Maps a legacy single-field status to the `(workflow, anchor)` pair.
fn legacy_status(status: &str) -> (WorkflowState, AnchorState) {
    match status {
        "resolved" => (WorkflowState::Resolved, AnchorState::Anchored),
        "stale" => (WorkflowState::Open, AnchorState::Stale),
        "orphaned" => (WorkflowState::Open, AnchorState::Orphaned),
        _ => (WorkflowState::Open, AnchorState::Anchored),
    }
}

fn parse_author(raw: Option<&str>) -> Author {
    match raw {
        Some("agent") => Author::Agent,
        _ => Author::Human,
    }
}

fn migrate_comment(raw: RawComment) -> Comment {
    let (legacy_workflow, legacy_anchor) = raw
        .status
        .as_deref()
        .map(legacy_status)
        .unwrap_or_default();

    let start_line = raw.anchor.start_line.max(1);
    let end_line = raw.anchor.end_line.unwrap_or(start_line).max(start_line);
    let content_hash = raw
        .anchor
        .content_hash
        .unwrap_or_else(|| content_hash(&raw.anchor.target_content));

    Comment {
        id: raw.id,
        file: raw.file.replace('\\', "/"),
        anchor: Anchor {
            start_line,
            end_line,
            target_content: raw.anchor.target_content,
            context_before: raw.anchor.context_before,
            context_after: raw.anchor.context_after,
            content_hash,
            last_anchor_check: raw.anchor.last_anchor_check,
        },
        workflow_state: raw.workflow_state.unwrap_or(legacy_workflow),
        anchor_state: raw.anchor_state.unwrap_or(legacy_anchor),
        author: parse_author(raw.author.as_deref()),
        body: raw.body,
        thread: raw
            .thread
            .unwrap_or_default()
            .into_iter()
            .map(|r| Reply {
                id: r.id,
                author: parse_author(r.author.as_deref()),
                body: r.body,
                created_at: r.created_at.unwrap_or_else(|| UNKNOWN_CREATED_AT.to_owned()),
            })
            .collect(),
        agent_last_seen_at: raw.agent_last_seen_at,
        created_at: raw
            .created_at
            .unwrap_or_else(|| UNKNOWN_CREATED_AT.to_owned()),
    }
}
