use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use marginal_core::actions::{self, NewComment};
use marginal_core::project::{find_project_root, Project};
use marginal_core::reconcile::{DiskFiles, ReconcileOptions, ReconcileSummary};
use marginal_core::store::{Revision, STORE_DIR};
use marginal_core::{Comment, Document, Error, WorkflowState};
use serde_json::json;

use crate::output::Output;
use crate::{AddArgs, Cli, Commands, ListArgs, ReconcileArgs, ReplyArgs, StatusFilter};

pub fn run(cli: Cli) -> Result<()> {
    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let out = Output::new(cli.json);
    let root = cli.root;

    match cli.command {
        Commands::Init => init(&root.unwrap_or_else(|| cwd.clone()), out),
        Commands::List(args) => list(&open_project(root, &cwd)?, &cwd, args, out),
        Commands::Show { id } => show(&open_project(root, &cwd)?, &id, out),
        Commands::Add(args) => add(&open_project(root, &cwd)?, &cwd, args, out),
        Commands::Reply(args) => reply(&open_project(root, &cwd)?, args, out),
        Commands::Resolve { id } => {
            set_state(&open_project(root, &cwd)?, &id, WorkflowState::Resolved, out)
        }
        Commands::Unresolve { id } => {
            set_state(&open_project(root, &cwd)?, &id, WorkflowState::Open, out)
        }
        Commands::Delete { id } => delete(&open_project(root, &cwd)?, &id, out),
        Commands::Reconcile(args) => reconcile(&open_project(root, &cwd)?, &cwd, args, out),
        Commands::Seen { ids } => seen(&open_project(root, &cwd)?, &ids, out),
    }
}

fn open_project(root: Option<PathBuf>, cwd: &Path) -> Result<Project> {
    let root = match root {
        Some(root) => root,
        None => find_project_root(cwd).ok_or_else(|| {
            anyhow!(
                "no {STORE_DIR}/ directory found above {}; run `marginal-cli init`",
                cwd.display()
            )
        })?,
    };
    let project = Project::open(root);
    tracing::debug!(root = %project.root.display(), "project opened");
    Ok(project)
}

fn init(root: &Path, out: Output) -> Result<()> {
    let dir = root.join(STORE_DIR);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let project = Project::open(root);
    let created = match project.store.write(&Document::default(), Some(&Revision::Missing)) {
        Ok(_) => true,
        Err(Error::Conflict { .. }) => false,
        Err(e) => return Err(e.into()),
    };
    out.emit(
        &json!({ "root": root.display().to_string(), "created": created }),
        || {
            if created {
                format!("initialized {}", dir.display())
            } else {
                format!("already initialized: {}", dir.display())
            }
        },
    )
}

/// Runs a non-forced reconcile before a read. A busy store is not fatal for
/// reads: the last persisted state is shown instead.
fn refresh(project: &Project, files: Option<Vec<String>>) -> Result<Option<ReconcileSummary>> {
    let options = ReconcileOptions {
        files,
        ..ReconcileOptions::default()
    };
    let disk = DiskFiles::new(&project.root);
    match actions::reconcile_store(&project.store, &disk, &options, &project.config.reconcile) {
        Ok(done) => Ok(Some(done.value)),
        Err(e) if e.is_retryable() => {
            tracing::warn!(error = %e, "skipping re-anchor; showing last saved state");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

fn project_path(project: &Project, cwd: &Path, path: &Path) -> Result<String> {
    project
        .relative_path(cwd, path)
        .ok_or_else(|| anyhow!("{} is outside the project at {}", path.display(), project.root.display()))
}

/// Resolves a full id or a unique id prefix against `doc`.
fn resolve_id(doc: &Document, id: &str) -> Result<String> {
    if doc.get(id).is_some() {
        return Ok(id.to_owned());
    }
    let mut matches = doc.comments.iter().filter(|c| c.id.starts_with(id));
    match (matches.next(), matches.next()) {
        (Some(only), None) if !id.is_empty() => Ok(only.id.clone()),
        (Some(_), Some(_)) => bail!("id prefix {id:?} is ambiguous"),
        _ => Err(Error::NotFound(id.to_owned()).into()),
    }
}

fn list(project: &Project, cwd: &Path, args: ListArgs, out: Output) -> Result<()> {
    let file = args
        .file
        .as_deref()
        .map(|f| project_path(project, cwd, f))
        .transpose()?;
    refresh(project, file.clone().map(|f| vec![f]))?;

    let doc = project.store.read()?;
    let comments: Vec<&Comment> = doc
        .comments
        .iter()
        .filter(|c| file.as_deref().is_none_or(|f| c.file == f))
        .filter(|c| match args.status {
            StatusFilter::Open => c.workflow_state == WorkflowState::Open,
            StatusFilter::Resolved => c.workflow_state == WorkflowState::Resolved,
            StatusFilter::All => true,
        })
        .filter(|c| !args.unseen || c.has_unseen_activity())
        .collect();
    out.comments(&comments)
}

fn show(project: &Project, id: &str, out: Output) -> Result<()> {
    let before = project.store.read()?;
    let id = resolve_id(&before, id)?;
    let file = before.get(&id).map(|c| c.file.clone());
    refresh(project, file.map(|f| vec![f]))?;

    let doc = project.store.read()?;
    let comment = doc.get(&id).ok_or_else(|| Error::NotFound(id.clone()))?;
    out.comment(comment)
}

fn add(project: &Project, cwd: &Path, args: AddArgs, out: Output) -> Result<()> {
    let file = project_path(project, cwd, &args.file)?;
    let absolute: PathBuf = project.root.join(&file);
    let content = std::fs::read_to_string(&absolute)
        .with_context(|| format!("Failed to read {}", absolute.display()))?;
    let new = NewComment {
        file,
        start_line: args.start,
        end_line: args.end.unwrap_or(args.start),
        author: args.author.into(),
        body: args.body,
    };
    let added = actions::add_comment(
        &project.store,
        new,
        &content,
        project.config.reconcile.context_window,
    )?;
    out.comment(&added.value)
}

fn reply(project: &Project, args: ReplyArgs, out: Output) -> Result<()> {
    let id = resolve_id(&project.store.read()?, &args.id)?;
    let reply = actions::add_reply(&project.store, &id, args.author.into(), &args.body)?.value;
    out.emit(&json!({ "commentId": id, "reply": reply }), || {
        format!("replied to {id}")
    })
}

fn set_state(project: &Project, id: &str, state: WorkflowState, out: Output) -> Result<()> {
    let id = resolve_id(&project.store.read()?, id)?;
    let changed = actions::set_workflow_state(&project.store, &id, state)?.value;
    out.emit(
        &json!({ "id": id, "workflowState": state, "changed": changed }),
        || match (state, changed) {
            (WorkflowState::Resolved, true) => format!("resolved {id}"),
            (WorkflowState::Open, true) => format!("reopened {id}"),
            (_, false) => format!("{id} unchanged"),
        },
    )
}

fn delete(project: &Project, id: &str, out: Output) -> Result<()> {
    let id = resolve_id(&project.store.read()?, id)?;
    let removed = actions::delete_comment(&project.store, &id)?.value;
    out.emit(&json!({ "deleted": removed.id }), || format!("deleted {}", removed.id))
}

fn reconcile(project: &Project, cwd: &Path, args: ReconcileArgs, out: Output) -> Result<()> {
    let files = if args.files.is_empty() {
        None
    } else {
        Some(
            args.files
                .iter()
                .map(|f| project_path(project, cwd, f))
                .collect::<Result<Vec<_>>>()?,
        )
    };
    let options = ReconcileOptions {
        force: args.force,
        files,
        now: None,
    };
    let disk = DiskFiles::new(&project.root);
    let done = actions::reconcile_store(&project.store, &disk, &options, &project.config.reconcile)?;
    let summary = done.value;
    out.emit(&summary, || {
        format!(
            "checked {}, updated {}, anchor state changes {}",
            summary.checked_comments, summary.updated_comments, summary.anchor_state_transition_count
        )
    })
}

fn seen(project: &Project, ids: &[String], out: Output) -> Result<()> {
    let doc = project.store.read()?;
    let ids = ids
        .iter()
        .map(|id| resolve_id(&doc, id))
        .collect::<Result<Vec<_>>>()?;
    let marked = actions::mark_agent_seen(&project.store, &ids)?.value;
    out.emit(&json!({ "marked": marked }), || format!("marked {marked} seen"))
}
