//! Front-end operations shared by the CLI and the TUI.
//!
//! Each action is one [`Store::mutate`] call, so concurrent callers in other
//! processes never lose each other's updates.

use crate::anchor::split_lines;
use crate::config::ReconcileConfig;
use crate::error::{Error, Result};
use crate::reconcile::{reconcile, FileSource, ReconcileOptions, ReconcileSummary};
use crate::store::{Mutated, Mutation, Store};
use crate::types::{Anchor, AnchorState, Author, Comment, Reply, WorkflowState};

/// Input for [`add_comment`].
#[derive(Debug, Clone)]
pub struct NewComment {
    /// Project-relative path; backslashes are normalized.
    pub file: String,
    pub start_line: usize,
    pub end_line: usize,
    pub author: Author,
    pub body: String,
}

/// Creates a comment anchored to `new.start_line..=new.end_line` of
/// `file_content`, capturing `context_window` lines of context.
///
/// # Errors
///
/// Returns `Error::InvalidAnchor` if the range is outside the file, plus the
/// usual store errors.
pub fn add_comment(
    store: &Store,
    new: NewComment,
    file_content: &str,
    context_window: usize,
) -> Result<Mutated<Comment>> {
    let now = crate::now_iso();
    let lines = split_lines(file_content);
    let anchor = Anchor::capture(
        &lines,
        new.start_line,
        new.end_line,
        context_window,
        Some(now.clone()),
    )?;
    let comment = Comment {
        id: uuid::Uuid::new_v4().to_string(),
        file: new.file.replace('\\', "/"),
        anchor,
        workflow_state: WorkflowState::Open,
        anchor_state: AnchorState::Anchored,
        author: new.author,
        body: new.body,
        thread: Vec::new(),
        agent_last_seen_at: None,
        created_at: now,
    };

    store.mutate(move |doc| {
        doc.comments.push(comment.clone());
        Ok(Mutation::Changed(comment))
    })
}

/// Appends a reply to the thread of comment `id`.
///
/// # Errors
///
/// Returns `Error::NotFound` if no comment has that id.
pub fn add_reply(store: &Store, id: &str, author: Author, body: &str) -> Result<Mutated<Reply>> {
    let reply = Reply {
        id: uuid::Uuid::new_v4().to_string(),
        author,
        body: body.to_owned(),
        created_at: crate::now_iso(),
    };
    store.mutate(|doc| {
        let comment = doc.get_mut(id).ok_or_else(|| Error::NotFound(id.to_owned()))?;
        comment.thread.push(reply.clone());
        Ok(Mutation::Changed(reply))
    })
}

/// Moves comment `id` to `state`. Returns whether anything changed; no write
/// happens when the comment is already in `state`.
///
/// # Errors
///
/// Returns `Error::NotFound` if no comment has that id.
pub fn set_workflow_state(store: &Store, id: &str, state: WorkflowState) -> Result<Mutated<bool>> {
    store.mutate(|doc| {
        let comment = doc.get_mut(id).ok_or_else(|| Error::NotFound(id.to_owned()))?;
        if comment.workflow_state == state {
            return Ok(Mutation::Unchanged(false));
        }
        comment.workflow_state = state;
        Ok(Mutation::Changed(true))
    })
}

/// Flips comment `id` between open and resolved and returns the new state.
///
/// # Errors
///
/// Returns `Error::NotFound` if no comment has that id.
pub fn toggle_workflow_state(store: &Store, id: &str) -> Result<Mutated<WorkflowState>> {
    store.mutate(|doc| {
        let comment = doc.get_mut(id).ok_or_else(|| Error::NotFound(id.to_owned()))?;
        comment.workflow_state = match comment.workflow_state {
            WorkflowState::Open => WorkflowState::Resolved,
            WorkflowState::Resolved => WorkflowState::Open,
        };
        Ok(Mutation::Changed(comment.workflow_state))
    })
}

/// Removes comment `id` and returns it.
///
/// # Errors
///
/// Returns `Error::NotFound` if no comment has that id.
pub fn delete_comment(store: &Store, id: &str) -> Result<Mutated<Comment>> {
    store.mutate(|doc| {
        let index = doc
            .comments
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))?;
        Ok(Mutation::Changed(doc.comments.remove(index)))
    })
}

/// Advances `agentLastSeenAt` to now on the given comments, or on every
/// comment with unseen activity when `ids` is empty. Returns how many moved.
///
/// # Errors
///
/// Returns `Error::NotFound` if any listed id is unknown; nothing is written then.
pub fn mark_agent_seen(store: &Store, ids: &[String]) -> Result<Mutated<usize>> {
    let now = crate::now_iso();
    store.mutate(|doc| {
        if let Some(missing) = ids.iter().find(|id| doc.get(id).is_none()) {
            return Err(Error::NotFound(missing.clone()));
        }
        let mut marked = 0;
        for comment in doc.comments.iter_mut() {
            let selected = if ids.is_empty() {
                comment.has_unseen_activity()
            } else {
                ids.contains(&comment.id)
            };
            if selected {
                comment.agent_last_seen_at = Some(now.clone());
                marked += 1;
            }
        }
        if marked == 0 {
            Ok(Mutation::Unchanged(0))
        } else {
            Ok(Mutation::Changed(marked))
        }
    })
}

/// Reconciles the freshest on-disk document under the lock and writes it back
/// only when some comment changed.
///
/// # Errors
///
/// Returns store errors and `Error::Io` for unreadable target files.
pub fn reconcile_store(
    store: &Store,
    files: &impl FileSource,
    options: &ReconcileOptions,
    config: &ReconcileConfig,
) -> Result<Mutated<ReconcileSummary>> {
    store.mutate(|doc| {
        let summary = reconcile(doc, files, options, config)?;
        if summary.changed {
            Ok(Mutation::Changed(summary))
        } else {
            Ok(Mutation::Unchanged(summary))
        }
    })
}
