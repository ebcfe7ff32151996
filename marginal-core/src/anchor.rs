//! Anchor snapshots: line splitting, capture, and content hashing.

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::types::Anchor;

/// Hex characters kept from the SHA-256 of the target content.
const CONTENT_HASH_LEN: usize = 16;

/// Splits file content into lines, treating `\r\n`, `\r`, and `\n` as breaks.
///
/// A trailing newline yields a final empty line, so line numbers stay stable
/// whether or not the file ends with a newline.
pub fn split_lines(content: &str) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    normalized.split('\n').map(str::to_owned).collect()
}

/// Short digest of `target` used by consumers to spot content drift cheaply.
pub fn content_hash(target: &str) -> String {
    let digest = Sha256::digest(target.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(CONTENT_HASH_LEN);
    hex
}

/// Number of lines in a stored target, falling back to the anchor's range when empty.
pub fn target_line_count(anchor: &Anchor) -> usize {
    if anchor.target_content.is_empty() {
        anchor.end_line.saturating_sub(anchor.start_line) + 1
    } else {
        anchor.target_content.split('\n').count()
    }
}

/// Context window the anchor was created with.
///
/// Either side may have been clipped by a file boundary, so the larger side
/// is the window that was asked for.
pub fn context_window(anchor: &Anchor) -> usize {
    anchor.context_before.len().max(anchor.context_after.len())
}

impl Anchor {
    /// Captures a fresh snapshot of `lines[start_line..=end_line]` (1-based)
    /// with `window` lines of context on each side, clipped to the file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidAnchor` if the range is empty, inverted, or
    /// extends past the end of the file.
    pub fn capture(
        lines: &[String],
        start_line: usize,
        end_line: usize,
        window: usize,
        checked_at: Option<String>,
    ) -> Result<Self> {
        if start_line == 0 || end_line < start_line || end_line > lines.len() {
            return Err(Error::InvalidAnchor(format!(
                "lines {start_line}-{end_line} outside 1-{}",
                lines.len()
            )));
        }
        Ok(snapshot_at(lines, start_line, end_line, window, checked_at))
    }
}

/// Builds the snapshot for a range already known to lie inside `lines`.
pub(crate) fn snapshot_at(
    lines: &[String],
    start_line: usize,
    end_line: usize,
    window: usize,
    checked_at: Option<String>,
) -> Anchor {
    let start = start_line.saturating_sub(1).min(lines.len());
    let end = end_line.min(lines.len()).max(start);
    let target_content = lines[start..end].join("\n");
    let context_before = lines[start.saturating_sub(window)..start].to_vec();
    let context_after = lines[end..(end + window).min(lines.len())].to_vec();
    Anchor {
        start_line,
        end_line,
        content_hash: content_hash(&target_content),
        target_content,
        context_before,
        context_after,
        last_anchor_check: checked_at,
    }
}
