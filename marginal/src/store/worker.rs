//! Background thread that owns the project store for the TUI's lifetime.
//!
//! All communication is via channels: `StoreRequest` in, `AppEvent::StoreResult`
//! out. External writes (the agent CLI) are noticed by comparing the on-disk
//! revision with the last revision this thread read or wrote, so the TUI's own
//! writes never trigger a redundant reload.

use crossbeam_channel::Receiver;
use marginal_core::actions;
use marginal_core::project::Project;
use marginal_core::reconcile::{DiskFiles, ReconcileOptions};
use marginal_core::{Author, Revision, WorkflowState};
use tokio::sync::mpsc::UnboundedSender;

use crate::event::AppEvent;
use crate::store::highlight;
use crate::store::types::{CommentEntry, StoreRequest, StoreResult};

/// Entry point for the store worker thread.
///
/// Loops over incoming requests until the channel closes (sender dropped) or the
/// event loop has gone away.
pub fn store_worker_loop(
    project: Project,
    rx: Receiver<StoreRequest>,
    event_tx: UnboundedSender<AppEvent>,
) {
    highlight::warm_up();
    let mut worker = StoreWorker::new(project);

    for request in rx {
        if let Some(result) = worker.handle(request) {
            if event_tx.send(AppEvent::StoreResult(Box::new(result))).is_err() {
                break;
            }
        }
    }
    tracing::debug!("store worker exiting");
}

struct StoreWorker {
    project: Project,
    files: DiskFiles,
    /// Revision of the last document this thread read or wrote.
    seen: Option<Revision>,
}

impl StoreWorker {
    fn new(project: Project) -> Self {
        let files = DiskFiles::new(project.root.clone());
        Self {
            project,
            files,
            seen: None,
        }
    }

    /// Runs one request. Returns `None` when there is nothing to report (an
    /// idle poll).
    fn handle(&mut self, request: StoreRequest) -> Option<StoreResult> {
        match request {
            StoreRequest::Poll => self.poll(),
            StoreRequest::Load => {
                let notice = match self.reconcile(false) {
                    Ok(_) => None,
                    Err(e) if e.is_retryable() => Some(format!("store busy, not re-anchored: {e}")),
                    Err(e) => return Some(failed(e, None)),
                };
                Some(self.snapshot(notice))
            }
            StoreRequest::Reconcile { force } => match self.reconcile(force) {
                Ok(summary) => Some(self.snapshot(Some(format!(
                    "re-anchored: {} checked, {} updated, {} state changes",
                    summary.checked_comments,
                    summary.updated_comments,
                    summary.anchor_state_transition_count
                )))),
                Err(e) => Some(failed(e, None)),
            },
            StoreRequest::ToggleResolved { id } => {
                match actions::toggle_workflow_state(&self.project.store, &id) {
                    Ok(done) => {
                        self.seen = Some(done.revision);
                        let notice = match done.value {
                            WorkflowState::Resolved => "resolved",
                            WorkflowState::Open => "reopened",
                        };
                        Some(self.snapshot(Some(notice.to_owned())))
                    }
                    Err(e) => Some(failed(e, None)),
                }
            }
            StoreRequest::Reply { id, body } => {
                match actions::add_reply(&self.project.store, &id, Author::Human, &body) {
                    Ok(done) => {
                        self.seen = Some(done.revision);
                        Some(self.snapshot(Some("reply saved".to_owned())))
                    }
                    Err(e) => Some(failed(e, Some((id, body)))),
                }
            }
        }
    }

    fn poll(&mut self) -> Option<StoreResult> {
        match self.project.store.current_revision() {
            Ok(current) if self.seen.as_ref() == Some(&current) => None,
            Ok(current) => {
                tracing::debug!(revision = %current, "store changed on disk, reloading");
                Some(self.snapshot(None))
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot read store revision");
                None
            }
        }
    }

    fn reconcile(
        &mut self,
        force: bool,
    ) -> marginal_core::Result<marginal_core::reconcile::ReconcileSummary> {
        let options = ReconcileOptions {
            force,
            ..ReconcileOptions::default()
        };
        let done = actions::reconcile_store(
            &self.project.store,
            &self.files,
            &options,
            &self.project.config.reconcile,
        )?;
        self.seen = Some(done.revision);
        Ok(done.value)
    }

    /// Reads the document and pre-renders every comment's anchor panel.
    fn snapshot(&mut self, notice: Option<String>) -> StoreResult {
        let doc = match self.project.store.read() {
            Ok(doc) => doc,
            Err(e) => return failed(e, None),
        };
        self.seen = Some(doc.revision.clone());

        let entries = doc
            .comments
            .into_iter()
            .map(|comment| {
                let current = std::fs::read_to_string(self.project.root.join(&comment.file)).ok();
                let anchor_view = highlight::anchor_view(&comment, current.as_deref());
                CommentEntry {
                    comment,
                    anchor_view,
                }
            })
            .collect();
        StoreResult::Snapshot { entries, notice }
    }
}

fn failed(error: marginal_core::Error, unsent_reply: Option<(String, String)>) -> StoreResult {
    tracing::warn!(error = %error, "store request failed");
    StoreResult::Failed {
        error: error.to_string(),
        unsent_reply,
    }
}
