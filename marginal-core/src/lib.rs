//! Shared core for marginal: the locked JSON comment store and the
//! re-anchoring reconciler, plus the actions both front-ends build on.
//!
//! The store never calls the reconciler and the reconciler never touches the
//! lock. Callers that want fresh positions run [`reconcile::reconcile`] on a
//! document they obtained inside [`store::Store::mutate`] (see
//! [`actions::reconcile_store`]).

pub mod actions;
pub mod anchor;
pub mod config;
pub mod error;
pub mod lock;
pub mod project;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod types;

pub use error::{Error, Result};
pub use store::{Mutation, Revision, Store};
pub use types::{Anchor, AnchorState, Author, Comment, Document, Reply, WorkflowState};

use chrono::{DateTime, SecondsFormat, Utc};

/// Current time as an RFC 3339 string with millisecond precision and a `Z` suffix.
pub fn now_iso() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses an RFC 3339 timestamp. Returns `None` for anything unparseable.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
