use serde::{Deserialize, Serialize};

use crate::store::Revision;

/// Who wrote a comment or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    Human,
    Agent,
}

/// Review workflow position. Only human or agent actions move it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowState {
    #[default]
    Open,
    Resolved,
}

/// How confidently a comment's anchor maps onto the current file.
///
/// Written only by the reconciler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorState {
    /// The anchor points at the right lines.
    #[default]
    Anchored,
    /// The file exists but no confident relocation was found.
    Stale,
    /// The file did not exist at the last check.
    Orphaned,
}

/// Positional and content snapshot of the lines a comment is attached to.
///
/// Line numbers are 1-based and inclusive. `context_before` / `context_after`
/// keep the window size chosen when the comment was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anchor {
    pub start_line: usize,
    pub end_line: usize,
    pub target_content: String,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
    pub content_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_anchor_check: Option<String>, // RFC 3339
}

/// A single reply in a comment thread. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    pub id: String,
    pub author: Author,
    pub body: String,
    pub created_at: String, // RFC 3339
}

/// A review comment bound to a region of a project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,           // UUID v4 text
    pub file: String,         // project-relative, forward slashes
    pub anchor: Anchor,
    pub workflow_state: WorkflowState,
    pub anchor_state: AnchorState,
    pub author: Author,
    pub body: String,
    pub thread: Vec<Reply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_last_seen_at: Option<String>,
    pub created_at: String,
}

impl Comment {
    /// Returns true when a human comment or reply is newer than the agent's
    /// last-seen marker, or the agent has never looked at a human-authored thread.
    pub fn has_unseen_activity(&self) -> bool {
        let latest_human = std::iter::once((self.author, self.created_at.as_str()))
            .chain(self.thread.iter().map(|r| (r.author, r.created_at.as_str())))
            .filter(|(author, _)| *author == Author::Human)
            .filter_map(|(_, at)| crate::parse_timestamp(at))
            .max();

        let Some(latest_human) = latest_human else {
            return false;
        };
        match self.agent_last_seen_at.as_deref().and_then(crate::parse_timestamp) {
            Some(seen) => latest_human > seen,
            None => true,
        }
    }

    /// Number of lines the anchor currently spans.
    pub fn line_count(&self) -> usize {
        self.anchor.end_line.saturating_sub(self.anchor.start_line) + 1
    }
}

/// The whole persisted comment collection.
///
/// `revision` is a digest of the raw bytes this document was read from. It is
/// never serialized; it only backs the optimistic-concurrency check in
/// [`Store::write`](crate::store::Store::write).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub version: u64,
    pub comments: Vec<Comment>,
    #[serde(skip)]
    pub revision: Revision,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            version: crate::schema::CURRENT_VERSION,
            comments: Vec::new(),
            revision: Revision::Missing,
        }
    }
}

impl Document {
    pub fn get(&self, id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == id)
    }
}
