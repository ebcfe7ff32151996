//! End-to-end tests driving the `marginal-cli` binary in a scratch project.
//!
//! Exercises: init, add, list (with filters), show, reply, resolve/unresolve,
//! seen, reconcile after an edit, delete, and exit codes for failures.

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

const SOURCE: &str = "fn main() {\n    let total = compute();\n    println!(\"{total}\");\n}\n";

#[allow(deprecated)]
fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("marginal-cli").expect("binary built");
    cmd.current_dir(workdir).env_remove("MARGINAL_LOG");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = cli(workdir).arg("--json").args(args).output().expect("run marginal-cli");
    assert!(
        output.status.success(),
        "marginal-cli {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/main.rs"), SOURCE).unwrap();
    cli(dir.path()).arg("init").assert().success().stdout(predicate::str::contains("initialized"));
    dir
}

#[test]
fn init_is_idempotent() {
    let dir = project();
    let again = run_json(dir.path(), &["init"]);
    assert_eq!(again["created"], false);
    let raw = std::fs::read_to_string(dir.path().join(".marginal/comments.json")).unwrap();
    assert!(raw.contains("\"version\": 1"));
}

#[test]
fn comment_lifecycle_through_the_cli() {
    let dir = project();
    let root = dir.path();

    let added = run_json(root, &["add", "src/main.rs", "3", "--body", "print less", "--author", "human"]);
    let id = added["id"].as_str().unwrap().to_owned();
    assert_eq!(added["anchor"]["targetContent"], "    println!(\"{total}\");");
    assert_eq!(added["unseen"], true);

    // Paths are taken relative to the working directory.
    let listed = run_json(&root.join("src"), &["list", "--file", "main.rs"]);
    assert_eq!(listed.as_array().unwrap().len(), 1);
    assert_eq!(run_json(root, &["list", "--unseen"]).as_array().unwrap().len(), 1);

    let prefix = &id[..8];
    let replied = run_json(root, &["reply", prefix, "--body", "done"]);
    assert_eq!(replied["commentId"], id.as_str());
    assert_eq!(replied["reply"]["author"], "agent");

    let seen = run_json(root, &["seen"]);
    assert_eq!(seen["marked"], 1);
    assert!(run_json(root, &["list", "--unseen"]).as_array().unwrap().is_empty());

    let resolved = run_json(root, &["resolve", prefix]);
    assert_eq!(resolved["changed"], true);
    assert!(run_json(root, &["list"]).as_array().unwrap().is_empty());
    assert_eq!(run_json(root, &["list", "--status", "resolved"]).as_array().unwrap().len(), 1);
    assert_eq!(run_json(root, &["resolve", prefix])["changed"], false);
    assert_eq!(run_json(root, &["unresolve", prefix])["workflowState"], "open");

    let shown = run_json(root, &["show", &id]);
    assert_eq!(shown["thread"].as_array().unwrap().len(), 1);

    cli(root)
        .args(["show", prefix])
        .assert()
        .success()
        .stdout(predicate::str::contains("print less").and(predicate::str::contains("-- agent")));

    assert_eq!(run_json(root, &["delete", prefix])["deleted"], id.as_str());
    assert!(run_json(root, &["list", "--status", "all"]).as_array().unwrap().is_empty());
}

#[test]
fn edits_are_followed_by_reconcile() {
    let dir = project();
    let root = dir.path();
    let id = run_json(root, &["add", "src/main.rs", "2", "3", "--body", "check"])["id"]
        .as_str()
        .unwrap()
        .to_owned();

    std::fs::write(root.join("src/main.rs"), format!("use std::io;\n\n{SOURCE}")).unwrap();
    let summary = run_json(root, &["reconcile", "--force"]);
    assert_eq!(summary["updatedComments"], 1);
    assert_eq!(summary["anchorStateTransitionCount"], 0);

    let shown = run_json(root, &["show", &id]);
    assert_eq!(shown["anchor"]["startLine"], 4);
    assert_eq!(shown["anchor"]["endLine"], 5);
    assert_eq!(shown["anchorState"], "anchored");

    std::fs::remove_file(root.join("src/main.rs")).unwrap();
    let summary = run_json(root, &["reconcile", "--force", "--file", "src/main.rs"]);
    assert_eq!(summary["anchorStateTransitionCount"], 1);
    assert_eq!(run_json(root, &["show", &id])["anchorState"], "orphaned");
}

#[test]
fn failures_exit_nonzero_with_a_message() {
    let dir = project();
    let root = dir.path();

    cli(root)
        .args(["show", "does-not-exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does-not-exist"));

    cli(root)
        .args(["add", "src/main.rs", "40", "--body", "x"])
        .assert()
        .code(1);

    // The underlying io error is printed after the context.
    cli(root)
        .args(["add", "src/missing.rs", "1", "--body", "x"])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("Failed to read")
                .and(predicate::str::contains("missing.rs: "))
                .and(predicate::str::contains("os error")),
        );

    let outside = tempfile::TempDir::new().unwrap();
    cli(outside.path())
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("marginal-cli init"));
}

#[test]
fn busy_store_is_a_retryable_failure() {
    let dir = project();
    let root = dir.path();
    std::fs::write(
        root.join(".marginal/config.toml"),
        "[lock]\ntimeout_ms = 50\nretry_interval_ms = 10\nstale_after_ms = 600000\n",
    )
    .unwrap();
    std::fs::write(root.join(".marginal/comments.json.lock"), "held").unwrap();

    cli(root)
        .args(["add", "src/main.rs", "1", "--body", "blocked"])
        .assert()
        .code(75);

    // Reads still succeed, showing the last saved state.
    cli(root).args(["list"]).assert().success();
}
