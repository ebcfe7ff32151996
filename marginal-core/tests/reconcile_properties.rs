//! Integration tests for re-anchoring behaviour.
//!
//! Uses an in-memory `FileSource` so mtimes are explicit; the last test runs
//! against real files through `reconcile_project`. The scoring
//! constants under test are the default `ReconcileConfig` values; they are
//! characterization constants, so a retune is expected to move these cases.

use std::cell::RefCell;
use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use marginal_core::config::ReconcileConfig;
use marginal_core::reconcile::{
    reconcile, reconcile_project, FileSource, FileStat, ReconcileOptions,
};
use marginal_core::{Anchor, AnchorState, Author, Comment, Document, WorkflowState};

const NOW: &str = "2026-03-01T12:00:00.000Z";

#[derive(Default)]
struct MemFiles {
    files: HashMap<String, (DateTime<Utc>, String)>,
    /// Paths whose content was read, in order.
    reads: RefCell<Vec<String>>,
}

impl MemFiles {
    fn with(mut self, path: &str, lines: &[&str], modified: DateTime<Utc>) -> Self {
        self.files
            .insert(path.to_owned(), (modified, lines.join("\n")));
        self
    }
}

impl FileSource for MemFiles {
    fn stat(&self, file: &str) -> std::io::Result<Option<FileStat>> {
        Ok(self.files.get(file).map(|(modified, _)| FileStat {
            modified: Some(*modified),
        }))
    }

    fn read(&self, file: &str) -> std::io::Result<Option<String>> {
        self.reads.borrow_mut().push(file.to_owned());
        Ok(self.files.get(file).map(|(_, content)| content.clone()))
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap()
}

fn owned(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

/// A comment anchored on `start..=end` of `lines`, last checked at 09:00.
fn anchored(id: &str, file: &str, lines: &[&str], start: usize, end: usize, window: usize) -> Comment {
    Comment {
        id: id.to_owned(),
        file: file.to_owned(),
        anchor: Anchor::capture(
            &owned(lines),
            start,
            end,
            window,
            Some("2026-03-01T09:00:00.000Z".to_owned()),
        )
        .unwrap(),
        workflow_state: WorkflowState::Open,
        anchor_state: AnchorState::Anchored,
        author: Author::Human,
        body: "check this".to_owned(),
        thread: Vec::new(),
        agent_last_seen_at: None,
        created_at: "2026-03-01T09:00:00.000Z".to_owned(),
    }
}

fn doc_of(comments: Vec<Comment>) -> Document {
    Document {
        comments,
        ..Document::default()
    }
}

fn forced() -> ReconcileOptions {
    ReconcileOptions {
        force: true,
        files: None,
        now: Some(NOW.to_owned()),
    }
}

const RUN: [&str; 4] = ["function run() {", "  const x = 1;", "  return x;", "}"];

#[test]
fn unchanged_file_is_idempotent() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let before = doc.comments[0].clone();
    let files = MemFiles::default().with("run.js", &RUN, at(10));

    let summary = reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    assert_eq!(summary.checked_comments, 1);
    assert_eq!(summary.updated_comments, 0);
    assert!(!summary.changed);
    assert_eq!(doc.comments[0], before, "anchor and lastAnchorCheck untouched");
}

#[test]
fn insertion_above_shifts_the_anchor() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let edited = ["// header", "function run() {", "  const x = 1;", "  return x;", "}"];
    let files = MemFiles::default().with("run.js", &edited, at(10));

    let summary = reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    let c = &doc.comments[0];
    assert!(summary.changed);
    assert_eq!(c.anchor.start_line, 4);
    assert_eq!(c.anchor.end_line, 4);
    assert_eq!(c.anchor.target_content, "  return x;");
    assert_eq!(c.anchor.context_before, vec!["function run() {", "  const x = 1;"]);
    assert_eq!(c.anchor.context_after, vec!["}"]);
    assert_eq!(c.anchor_state, AnchorState::Anchored);
    assert_eq!(c.anchor.last_anchor_check.as_deref(), Some(NOW));
    assert_eq!(summary.anchor_state_transition_count, 0);
}

#[test]
fn small_edit_is_accepted_by_fuzzy_match() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let old_hash = doc.comments[0].anchor.content_hash.clone();
    let edited = ["function run() {", "  const x = 1;", "  return x ?? 0;", "}"];
    let files = MemFiles::default().with("run.js", &edited, at(10));

    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    let c = &doc.comments[0];
    assert_eq!(c.anchor_state, AnchorState::Anchored);
    assert_eq!(c.anchor.start_line, 3);
    assert_eq!(c.anchor.target_content, "  return x ?? 0;");
    assert_ne!(c.anchor.content_hash, old_hash);
}

#[test]
fn unrelated_content_goes_stale() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let replaced = ["# Notes", "", "nothing to see here", "the end"];
    let files = MemFiles::default().with("run.js", &replaced, at(10));

    let summary = reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    let c = &doc.comments[0];
    assert_eq!(c.anchor_state, AnchorState::Stale);
    assert_eq!(c.anchor.start_line, 3, "stale anchors keep their last position");
    assert_eq!(c.anchor.target_content, "  return x;");
    assert_eq!(c.anchor.last_anchor_check.as_deref(), Some(NOW));
    assert_eq!(summary.anchor_state_transition_count, 1);
}

#[test]
fn deleted_file_orphans_regardless_of_state() {
    let mut stale = anchored("s", "gone.js", &RUN, 3, 3, 2);
    stale.anchor_state = AnchorState::Stale;
    let mut doc = doc_of(vec![anchored("a", "gone.js", &RUN, 2, 2, 2), stale]);

    let summary = reconcile(&mut doc, &MemFiles::default(), &forced(), &ReconcileConfig::default()).unwrap();

    assert!(doc.comments.iter().all(|c| c.anchor_state == AnchorState::Orphaned));
    assert_eq!(summary.checked_comments, 2);
    assert_eq!(summary.anchor_state_transition_count, 2);
}

#[test]
fn orphan_reanchors_when_file_returns() {
    let mut c = anchored("c", "run.js", &RUN, 3, 3, 2);
    c.anchor_state = AnchorState::Orphaned;
    let mut doc = doc_of(vec![c]);
    let files = MemFiles::default().with("run.js", &RUN, at(10));

    let summary = reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    assert_eq!(doc.comments[0].anchor_state, AnchorState::Anchored);
    assert_eq!(doc.comments[0].anchor.last_anchor_check.as_deref(), Some(NOW));
    assert_eq!(summary.anchor_state_transition_count, 1);
}

const TWO_BLOCKS_DISTINCT: [&str; 11] = [
    "fn alpha() {",
    "    setup();",
    "    let value = compute(1);",
    "    finish();",
    "}",
    "",
    "fn beta() {",
    "    prepare();",
    "    let value = compute(1);",
    "    finish();",
    "}",
];

#[test]
fn duplicate_blocks_resolve_to_the_context_match() {
    let mut doc = doc_of(vec![anchored("c", "lib.rs", &TWO_BLOCKS_DISTINCT, 3, 3, 1)]);
    let mut shifted = vec!["// moved"];
    shifted.extend_from_slice(&TWO_BLOCKS_DISTINCT);
    let files = MemFiles::default().with("lib.rs", &shifted, at(10));

    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    let c = &doc.comments[0];
    assert_eq!(c.anchor_state, AnchorState::Anchored);
    assert_eq!(c.anchor.start_line, 4);
    assert_eq!(c.anchor.context_before, vec!["    setup();"]);
}

#[test]
fn equally_matching_duplicates_go_stale() {
    let identical = [
        "fn alpha() {",
        "    setup();",
        "    let value = compute(1);",
        "    finish();",
        "}",
        "fn beta() {",
        "    setup();",
        "    let value = compute(1);",
        "    finish();",
        "}",
    ];
    let mut doc = doc_of(vec![anchored("c", "lib.rs", &identical, 3, 3, 1)]);
    let mut shifted = vec!["// moved"];
    shifted.extend_from_slice(&identical);
    let files = MemFiles::default().with("lib.rs", &shifted, at(10));

    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    assert_eq!(doc.comments[0].anchor_state, AnchorState::Stale);
}

#[test]
fn multi_line_anchor_moves_with_its_block() {
    let original = ["a", "b", "start()", "middle()", "end()", "z"];
    let mut doc = doc_of(vec![anchored("c", "m.rs", &original, 3, 5, 2)]);
    let edited = ["new 1", "new 2", "a", "b", "start()", "middle()", "end()", "z"];
    let files = MemFiles::default().with("m.rs", &edited, at(10));

    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    let c = &doc.comments[0];
    assert_eq!((c.anchor.start_line, c.anchor.end_line), (5, 7));
    assert_eq!(c.anchor.target_content, "start()\nmiddle()\nend()");
}

#[test]
fn unmodified_files_are_skipped_without_force() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let edited = ["// header", "function run() {", "  const x = 1;", "  return x;", "}"];
    // Checked at 09:00, file last modified at 08:00.
    let files = MemFiles::default().with("run.js", &edited, at(8));
    let options = ReconcileOptions {
        now: Some(NOW.to_owned()),
        ..ReconcileOptions::default()
    };

    let summary = reconcile(&mut doc, &files, &options, &ReconcileConfig::default()).unwrap();
    assert_eq!(summary.checked_comments, 0);
    assert_eq!(doc.comments[0].anchor.start_line, 3);
    assert!(files.reads.borrow().is_empty(), "skipped files are never read");

    // Once the file is newer than the last check it is processed.
    let files = MemFiles::default().with("run.js", &edited, at(10));
    let summary = reconcile(&mut doc, &files, &options, &ReconcileConfig::default()).unwrap();
    assert_eq!(summary.checked_comments, 1);
    assert_eq!(doc.comments[0].anchor.start_line, 4);
}

#[test]
fn missing_or_garbled_last_check_forces_processing() {
    let mut c = anchored("c", "run.js", &RUN, 3, 3, 2);
    c.anchor.last_anchor_check = Some("not a timestamp".into());
    let mut doc = doc_of(vec![c]);
    let files = MemFiles::default().with("run.js", &RUN, at(8));
    let options = ReconcileOptions {
        now: Some(NOW.to_owned()),
        ..ReconcileOptions::default()
    };

    let summary = reconcile(&mut doc, &files, &options, &ReconcileConfig::default()).unwrap();
    assert_eq!(summary.checked_comments, 1);
}

#[test]
fn resolved_comments_only_move_in_forced_runs() {
    let mut c = anchored("c", "run.js", &RUN, 3, 3, 2);
    c.workflow_state = WorkflowState::Resolved;
    let mut doc = doc_of(vec![c]);
    let files = MemFiles::default();
    let options = ReconcileOptions {
        now: Some(NOW.to_owned()),
        ..ReconcileOptions::default()
    };

    let summary = reconcile(&mut doc, &files, &options, &ReconcileConfig::default()).unwrap();
    assert_eq!(summary.checked_comments, 0);
    assert_eq!(doc.comments[0].anchor_state, AnchorState::Anchored);

    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();
    assert_eq!(doc.comments[0].anchor_state, AnchorState::Orphaned);
    assert_eq!(doc.comments[0].workflow_state, WorkflowState::Resolved);
}

#[test]
fn file_filter_limits_the_run() {
    let mut doc = doc_of(vec![
        anchored("a", "a.js", &RUN, 3, 3, 2),
        anchored("b", "b.js", &RUN, 3, 3, 2),
    ]);
    let options = ReconcileOptions {
        force: true,
        files: Some(vec!["b.js".to_owned()]),
        now: Some(NOW.to_owned()),
    };

    let summary = reconcile(&mut doc, &MemFiles::default(), &options, &ReconcileConfig::default()).unwrap();

    assert_eq!(summary.checked_comments, 1);
    assert_eq!(doc.get("a").unwrap().anchor_state, AnchorState::Anchored);
    assert_eq!(doc.get("b").unwrap().anchor_state, AnchorState::Orphaned);
}

#[test]
fn anchors_without_context_need_higher_confidence() {
    let original = ["let total = price * quantity;"];
    let mut doc = doc_of(vec![anchored("c", "t.rs", &original, 1, 1, 0)]);
    assert!(doc.comments[0].anchor.context_before.is_empty());

    // Near-identical line: high similarity, accepted without context.
    let edited = ["let total = price * quantity + tax;"];
    let files = MemFiles::default().with("t.rs", &edited, at(10));
    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();
    assert_eq!(doc.comments[0].anchor_state, AnchorState::Anchored);

    // Loosely related line: below the no-context threshold.
    let edited = ["print(total)"];
    let files = MemFiles::default().with("t.rs", &edited, at(11));
    reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();
    assert_eq!(doc.comments[0].anchor_state, AnchorState::Stale);
}

#[test]
fn shared_file_is_read_once_per_run() {
    let mut doc = doc_of(vec![
        anchored("a", "run.js", &RUN, 2, 2, 1),
        anchored("b", "run.js", &RUN, 3, 3, 1),
    ]);
    let files = MemFiles::default().with("run.js", &RUN, at(10));

    let summary = reconcile(&mut doc, &files, &forced(), &ReconcileConfig::default()).unwrap();

    assert_eq!(summary.checked_comments, 2);
    assert_eq!(*files.reads.borrow(), vec!["run.js".to_owned()]);
}

/// Context weighted low enough that a near-identical target alone clears the
/// threshold, so only the context-match requirement decides.
fn target_heavy() -> ReconcileConfig {
    ReconcileConfig {
        context_weight: 0.2,
        target_weight: 0.7,
        ..ReconcileConfig::default()
    }
}

#[test]
fn fuzzy_match_needs_one_matching_context_line() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let edited = ["zzz", "yyy", "  return x + 1;", "qqq"];
    let files = MemFiles::default().with("run.js", &edited, at(10));

    reconcile(&mut doc, &files, &forced(), &target_heavy()).unwrap();

    let c = &doc.comments[0];
    assert_eq!(c.anchor_state, AnchorState::Stale);
    assert_eq!(c.anchor.target_content, "  return x;");
}

#[test]
fn one_surviving_context_line_is_enough() {
    let mut doc = doc_of(vec![anchored("c", "run.js", &RUN, 3, 3, 2)]);
    let edited = ["zzz", "  const x = 1;", "  return x + 1;", "qqq"];
    let files = MemFiles::default().with("run.js", &edited, at(10));

    reconcile(&mut doc, &files, &forced(), &target_heavy()).unwrap();

    let c = &doc.comments[0];
    assert_eq!(c.anchor_state, AnchorState::Anchored);
    assert_eq!(c.anchor.start_line, 3);
    assert_eq!(c.anchor.target_content, "  return x + 1;");
}

#[test]
fn project_files_on_disk_are_reconciled_by_mtime() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    let path = dir.path().join("src/run.js");
    std::fs::write(&path, RUN.join("\n")).unwrap();

    let mut c = anchored("c", "src/run.js", &RUN, 3, 3, 2);
    c.anchor.last_anchor_check = None;
    let mut doc = doc_of(vec![c, anchored("gone", "src/gone.js", &RUN, 1, 1, 1)]);

    let mut edited = vec!["// header"];
    edited.extend_from_slice(&RUN);
    std::fs::write(&path, edited.join("\n")).unwrap();

    // Checked "in the future", so the next plain run sees nothing newer.
    let later = ReconcileOptions {
        now: Some("2100-01-01T00:00:00.000Z".to_owned()),
        ..ReconcileOptions::default()
    };
    let summary =
        reconcile_project(dir.path(), &mut doc, &later, &ReconcileConfig::default()).unwrap();
    assert_eq!(summary.checked_comments, 2);
    assert_eq!(doc.get("c").unwrap().anchor.start_line, 4);
    assert_eq!(doc.get("gone").unwrap().anchor_state, AnchorState::Orphaned);

    let summary = reconcile_project(
        dir.path(),
        &mut doc,
        &ReconcileOptions::default(),
        &ReconcileConfig::default(),
    )
    .unwrap();
    // The existing file is skipped by mtime; the missing one is always re-checked.
    assert_eq!(summary.checked_comments, 1);
    assert_eq!(
        doc.get("c").unwrap().anchor.last_anchor_check.as_deref(),
        Some("2100-01-01T00:00:00.000Z")
    );
}
