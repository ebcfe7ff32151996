//! Owned data types exchanged with the store worker thread.
//!
//! Everything here is `Send` and free of borrowed lifetimes so snapshots can be
//! moved from the worker into `AppState` without copying.

use marginal_core::Comment;

/// Commands sent from the main thread to the store worker.
///
/// Sent over a `crossbeam_channel::Sender<StoreRequest>` owned by `AppState`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreRequest {
    /// Reconcile changed files, then load the document.
    Load,
    /// Reload only if the on-disk revision moved since the worker last read or wrote.
    Poll,
    /// Re-anchor comments; `force` re-checks everything, resolved comments included.
    Reconcile { force: bool },
    /// Flip the comment between open and resolved.
    ToggleResolved { id: String },
    /// Append a human reply to the comment's thread.
    Reply { id: String, body: String },
}

/// One comment plus its pre-rendered anchor panel.
#[derive(Debug, Clone)]
pub struct CommentEntry {
    pub comment: Comment,
    /// Highlighted snippet, stale diff, or missing-file notice, built off-thread.
    pub anchor_view: Vec<ratatui::text::Line<'static>>,
}

/// Result sent from the store worker back to the main thread.
///
/// Carried inside `AppEvent::StoreResult(Box<StoreResult>)` because a snapshot
/// can hold many pre-rendered lines.
#[derive(Debug)]
pub enum StoreResult {
    /// The full current document.
    Snapshot {
        entries: Vec<CommentEntry>,
        /// Short confirmation for the status bar, if the request produced one.
        notice: Option<String>,
    },
    /// The request failed; whatever is on screen stays.
    Failed {
        error: String,
        /// A reply that could not be saved, returned so the draft is not lost.
        unsent_reply: Option<(String, String)>,
    },
}
