//! Re-anchoring: relocates each comment's line range in the current file.
//!
//! Per comment, first success wins:
//!
//! 1. file missing → `orphaned`
//! 2. fast path: stored target still sits at the stored start line
//! 3. the stored target occurs exactly once anywhere in the file
//! 4. fuzzy scoring of every candidate start line (context, target
//!    similarity, proximity) with a threshold and an ambiguity gap
//! 5. otherwise → `stale`
//!
//! The reconciler reads file contents through a [`FileSource`] and edits the
//! document in memory. It never writes to disk and never takes the store lock.

use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::anchor::{context_window, snapshot_at, split_lines, target_line_count};
use crate::config::ReconcileConfig;
use crate::error::Result;
use crate::types::{Anchor, AnchorState, Comment, Document, WorkflowState};

/// Metadata of a target file, read before deciding whether to load it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub modified: Option<DateTime<Utc>>,
}

/// Where the reconciler gets file metadata and contents from.
///
/// `stat` runs for every file with an eligible comment; `read` only for files
/// that pass the mtime gate (or every file on a forced run).
pub trait FileSource {
    /// Returns `Ok(None)` when `file` (project-relative) does not exist.
    fn stat(&self, file: &str) -> std::io::Result<Option<FileStat>>;

    /// Returns `Ok(None)` when `file` does not exist.
    fn read(&self, file: &str) -> std::io::Result<Option<String>>;
}

/// Reads target files from the project directory.
#[derive(Debug, Clone)]
pub struct DiskFiles {
    root: PathBuf,
}

impl DiskFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn missing_as_none<T>(result: std::io::Result<T>) -> std::io::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl FileSource for DiskFiles {
    fn stat(&self, file: &str) -> std::io::Result<Option<FileStat>> {
        let metadata = missing_as_none(std::fs::metadata(self.root.join(file)))?;
        Ok(metadata.map(|m| FileStat {
            modified: m.modified().ok().map(DateTime::<Utc>::from),
        }))
    }

    fn read(&self, file: &str) -> std::io::Result<Option<String>> {
        let bytes = missing_as_none(std::fs::read(self.root.join(file)))?;
        Ok(bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Process every comment regardless of mtime, resolved ones included.
    pub force: bool,
    /// Only reconcile comments on these project-relative paths.
    pub files: Option<Vec<String>>,
    /// Timestamp written to `lastAnchorCheck`; defaults to the current time.
    pub now: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// True when any comment changed and the document should be persisted.
    pub changed: bool,
    pub checked_comments: usize,
    pub updated_comments: usize,
    pub anchor_state_transition_count: usize,
}

/// How a position was found. Only used for logging and the idempotent fast path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    FastPath,
    UniqueExact,
    Fuzzy,
}

#[derive(Debug, Clone, Copy)]
struct Located {
    start_line: usize,
    method: Method,
}

/// A target file split once per run and shared by all its comments.
struct LoadedFile {
    lines: Vec<String>,
    text: String,
}

/// Reconciles every eligible comment in `doc` in place.
///
/// # Errors
///
/// Returns `Error::Io` when a target file exists but cannot be read. Missing
/// files and failed relocations are not errors; they become `orphaned` and
/// `stale` respectively.
pub fn reconcile(
    doc: &mut Document,
    files: &impl FileSource,
    options: &ReconcileOptions,
    config: &ReconcileConfig,
) -> Result<ReconcileSummary> {
    let now = options.now.clone().unwrap_or_else(crate::now_iso);
    let only: Option<HashSet<String>> = options
        .files
        .as_ref()
        .map(|fs| fs.iter().map(|f| f.replace('\\', "/")).collect());

    let mut stats: HashMap<String, Option<FileStat>> = HashMap::new();
    let mut contents: HashMap<String, Option<Rc<LoadedFile>>> = HashMap::new();
    let mut summary = ReconcileSummary::default();

    for comment in doc.comments.iter_mut() {
        if only.as_ref().is_some_and(|set| !set.contains(&comment.file)) {
            continue;
        }
        if comment.workflow_state == WorkflowState::Resolved && !options.force {
            continue;
        }

        let stat = match stats.get(&comment.file) {
            Some(hit) => *hit,
            None => {
                let stat = files.stat(&comment.file)?;
                stats.insert(comment.file.clone(), stat);
                stat
            }
        };
        if !options.force && !needs_check(comment, stat) {
            continue;
        }
        summary.checked_comments += 1;

        let loaded = match contents.get(&comment.file) {
            Some(hit) => hit.clone(),
            None => {
                let loaded = match stat {
                    Some(_) => files.read(&comment.file)?.map(|content| {
                        let lines = split_lines(&content);
                        let text = lines.join("\n");
                        Rc::new(LoadedFile { lines, text })
                    }),
                    None => None,
                };
                contents.insert(comment.file.clone(), loaded.clone());
                loaded
            }
        };

        let before_state = comment.anchor_state;
        let updated = reconcile_comment(comment, loaded.as_deref(), &now, config);
        if updated {
            summary.updated_comments += 1;
        }
        if comment.anchor_state != before_state {
            summary.anchor_state_transition_count += 1;
        }
    }

    summary.changed = summary.updated_comments > 0;
    Ok(summary)
}

/// [`reconcile`] against the files under `project_root`.
///
/// # Errors
///
/// See [`reconcile`].
pub fn reconcile_project(
    project_root: impl Into<PathBuf>,
    doc: &mut Document,
    options: &ReconcileOptions,
    config: &ReconcileConfig,
) -> Result<ReconcileSummary> {
    reconcile(doc, &DiskFiles::new(project_root), options, config)
}

/// Skip-by-mtime gate for non-forced runs. Missing files always pass so the
/// comment can be orphaned.
fn needs_check(comment: &Comment, stat: Option<FileStat>) -> bool {
    let Some(file) = stat else {
        return true;
    };
    let last_check = comment
        .anchor
        .last_anchor_check
        .as_deref()
        .and_then(crate::parse_timestamp);
    match (last_check, file.modified) {
        (Some(checked), Some(modified)) => modified > checked,
        _ => true,
    }
}

/// Applies one reconciliation step to `comment`. Returns true if it changed.
fn reconcile_comment(
    comment: &mut Comment,
    file: Option<&LoadedFile>,
    now: &str,
    config: &ReconcileConfig,
) -> bool {
    let Some(file) = file else {
        tracing::debug!(id = %comment.id, file = %comment.file, "target file missing");
        return set_unanchored(comment, AnchorState::Orphaned, now);
    };

    match locate(&comment.anchor, file, config) {
        Some(found) if found.method == Method::FastPath
            && comment.anchor_state == AnchorState::Anchored =>
        {
            false
        }
        Some(found) => {
            tracing::debug!(
                id = %comment.id,
                from = comment.anchor.start_line,
                to = found.start_line,
                method = ?found.method,
                "re-anchored"
            );
            let count = target_line_count(&comment.anchor);
            let end_line = (found.start_line + count - 1).min(file.lines.len());
            let anchor = snapshot_at(
                &file.lines,
                found.start_line,
                end_line,
                context_window(&comment.anchor),
                Some(now.to_owned()),
            );
            let changed =
                anchor != comment.anchor || comment.anchor_state != AnchorState::Anchored;
            comment.anchor = anchor;
            comment.anchor_state = AnchorState::Anchored;
            changed
        }
        None => {
            tracing::debug!(id = %comment.id, file = %comment.file, "no confident match");
            set_unanchored(comment, AnchorState::Stale, now)
        }
    }
}

fn set_unanchored(comment: &mut Comment, state: AnchorState, now: &str) -> bool {
    let changed = comment.anchor_state != state
        || comment.anchor.last_anchor_check.as_deref() != Some(now);
    comment.anchor_state = state;
    comment.anchor.last_anchor_check = Some(now.to_owned());
    changed
}

/// Runs the fallback chain for one anchor.
fn locate(anchor: &Anchor, file: &LoadedFile, config: &ReconcileConfig) -> Option<Located> {
    let count = target_line_count(anchor);
    let target = anchor.target_content.as_str();

    if !target.is_empty() {
        let start = anchor.start_line.max(1) - 1;
        if start + count <= file.lines.len() && file.lines[start..start + count].join("\n") == target {
            return Some(Located {
                start_line: anchor.start_line.max(1),
                method: Method::FastPath,
            });
        }

        if let Some(offset) = unique_offset(&file.text, target) {
            let start_line = file.text[..offset].matches('\n').count() + 1;
            return Some(Located {
                start_line,
                method: Method::UniqueExact,
            });
        }
    }

    fuzzy_locate(anchor, count, file, config).map(|start_line| Located {
        start_line,
        method: Method::Fuzzy,
    })
}

/// Byte offset of `needle` in `haystack` if it occurs exactly once,
/// counting overlapping occurrences.
fn unique_offset(haystack: &str, needle: &str) -> Option<usize> {
    let first = haystack.find(needle)?;
    let step = haystack[first..].chars().next().map_or(1, char::len_utf8);
    if haystack[first + step..].contains(needle) {
        None
    } else {
        Some(first)
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start_line: usize,
    score: f64,
    context_matches: usize,
}

fn fuzzy_locate(
    anchor: &Anchor,
    count: usize,
    file: &LoadedFile,
    config: &ReconcileConfig,
) -> Option<usize> {
    let lines = &file.lines;
    let stored_tokens = tokens(&anchor.target_content);
    let context_total = anchor.context_before.len() + anchor.context_after.len();
    let has_context = context_total > 0;
    let last_start = lines.len().saturating_sub(count) + 1;

    let mut best: Option<Candidate> = None;
    let mut second: Option<Candidate> = None;

    for start_line in 1..=last_start.max(1) {
        let start = start_line - 1;
        let end = (start + count).min(lines.len());
        let candidate = lines[start..end].join("\n");

        let target_score = text_similarity(&anchor.target_content, &stored_tokens, &candidate, config);
        let context_matches = count_context_matches(anchor, lines, start, end);
        let proximity = 1.0
            - (start_line.abs_diff(anchor.start_line) as f64 / config.proximity_span.max(1) as f64)
                .min(1.0);

        let score = if has_context {
            let context_score = context_matches as f64 / context_total as f64;
            config.context_weight * context_score
                + config.target_weight * target_score
                + config.proximity_weight * proximity
        } else {
            config.target_weight_without_context * target_score
                + config.proximity_weight_without_context * proximity
        };

        let current = Candidate {
            start_line,
            score,
            context_matches,
        };
        match best {
            Some(b) if score <= b.score => {
                if second.map_or(true, |s| score > s.score) {
                    second = Some(current);
                }
            }
            _ => {
                second = best;
                best = Some(current);
            }
        }
    }

    let best = best?;
    let threshold = if has_context {
        config.threshold_with_context
    } else {
        config.threshold_without_context
    };
    let gap_ok = second.map_or(true, |s| best.score - s.score >= config.min_gap);
    let context_ok = !has_context || best.context_matches > 0;

    tracing::debug!(
        best_line = best.start_line,
        best_score = best.score,
        second_score = second.map(|s| s.score),
        threshold,
        "fuzzy candidates scored"
    );

    (best.score >= threshold && gap_ok && context_ok).then_some(best.start_line)
}

/// Counts stored context lines that equal the lines around `lines[start..end]`.
fn count_context_matches(anchor: &Anchor, lines: &[String], start: usize, end: usize) -> usize {
    let before = &anchor.context_before;
    let before_matches = before
        .iter()
        .enumerate()
        .filter(|(k, stored)| {
            (start + k)
                .checked_sub(before.len())
                .and_then(|idx| lines.get(idx))
                .is_some_and(|line| line == *stored)
        })
        .count();
    let after_matches = anchor
        .context_after
        .iter()
        .enumerate()
        .filter(|(k, stored)| lines.get(end + k).is_some_and(|line| line == *stored))
        .count();
    before_matches + after_matches
}

/// Lowercased runs of ASCII letters, digits, and underscores.
fn tokens(text: &str) -> HashSet<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// `jaccard_weight * jaccard(tokens) + length_weight * (1 - |lenDiff| / maxLen)`.
fn text_similarity(
    stored: &str,
    stored_tokens: &HashSet<String>,
    candidate: &str,
    config: &ReconcileConfig,
) -> f64 {
    let stored_len = stored.chars().count();
    let candidate_len = candidate.chars().count();
    let max_len = stored_len.max(candidate_len);
    let length_score = if max_len == 0 {
        1.0
    } else {
        1.0 - stored_len.abs_diff(candidate_len) as f64 / max_len as f64
    };
    config.jaccard_weight * jaccard(stored_tokens, &tokens(candidate))
        + config.length_weight * length_score
}
