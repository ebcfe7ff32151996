//! Central application state for the marginal TUI.
//!
//! This module owns all mutable UI state: the current mode, which panel has
//! focus, the latest store snapshot and the filtered view over it, per-panel
//! scroll offsets and viewport heights, panel widths, and the reply draft. No
//! ratatui rendering logic lives here; `app.rs` is read by the render module and
//! mutated by the keybinding dispatcher and by store results.

use crossbeam_channel::Sender;
use marginal_core::{Comment, WorkflowState};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;

use crate::store::types::{CommentEntry, StoreRequest, StoreResult};

/// Editor mode controlling which keybinding set is active.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Normal vim-style navigation mode (default).
    #[default]
    Normal,
    /// Composing a reply to the selected comment.
    Insert,
    /// Full-screen help overlay is shown above all panels.
    HelpOverlay,
    /// Quit-confirmation dialog shown while a reply draft is unsent.
    ConfirmQuit,
}

/// Which panel currently has keyboard focus.
///
/// Cycle order: `Comments` → `Anchor` → `Thread` → `Comments`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanelFocus {
    /// Left panel listing comments.
    #[default]
    Comments,
    /// Centre panel showing the anchored code, stale diff, or missing file.
    Anchor,
    /// Right panel showing the comment body and its replies.
    Thread,
}

impl PanelFocus {
    pub fn prev(self) -> Self {
        match self {
            PanelFocus::Comments => PanelFocus::Thread,
            PanelFocus::Anchor => PanelFocus::Comments,
            PanelFocus::Thread => PanelFocus::Anchor,
        }
    }

    pub fn next(self) -> Self {
        match self {
            PanelFocus::Comments => PanelFocus::Anchor,
            PanelFocus::Anchor => PanelFocus::Thread,
            PanelFocus::Thread => PanelFocus::Comments,
        }
    }
}

/// Workflow filter applied to the comment list. `Tab` cycles it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    #[default]
    Open,
    Resolved,
    All,
}

impl Filter {
    pub fn next(self) -> Self {
        match self {
            Filter::Open => Filter::Resolved,
            Filter::Resolved => Filter::All,
            Filter::All => Filter::Open,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::Open => "open",
            Filter::Resolved => "resolved",
            Filter::All => "all",
        }
    }

    pub fn matches(self, comment: &Comment) -> bool {
        match self {
            Filter::Open => comment.workflow_state == WorkflowState::Open,
            Filter::Resolved => comment.workflow_state == WorkflowState::Resolved,
            Filter::All => true,
        }
    }
}

/// A status-bar message from the last store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub is_error: bool,
}

/// All mutable UI state passed through every render cycle.
pub struct AppState {
    pub mode: Mode,
    pub focus: PanelFocus,

    /// Every comment from the latest snapshot, in store order.
    pub entries: Vec<CommentEntry>,
    /// Indices into `entries` that pass `filter`, in display order.
    pub visible: Vec<usize>,
    pub filter: Filter,
    /// Selection within `visible`, backing the comment-list widget.
    pub list_state: ListState,
    /// True until the first snapshot arrives.
    pub loading: bool,

    /// Vertical scroll offset of the anchor panel.
    pub anchor_scroll: usize,
    /// Vertical scroll offset of the thread `Paragraph`.
    pub thread_scroll: u16,
    /// Vertical scroll offset of the help overlay.
    pub help_scroll: u16,

    /// Inner heights cached after each render for page-wise scrolling.
    pub list_viewport_height: u16,
    pub anchor_viewport_height: u16,
    pub thread_viewport_height: u16,
    /// Outer rects of [comments, anchor, thread] from the last render, for mouse focus.
    pub panel_rects: [Rect; 3],

    /// Width percentages of the three panels. Defaults: 30 / 45 / 25.
    pub left_pct: u16,
    pub center_pct: u16,
    pub right_pct: u16,

    /// Reply being composed in Insert mode.
    pub reply_draft: String,
    /// Id of the comment the draft answers.
    pub reply_target: Option<String>,

    pub notice: Option<Notice>,
    /// Request channel to the store worker; `None` in tests.
    pub store_tx: Option<Sender<StoreRequest>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            focus: PanelFocus::default(),
            entries: Vec::new(),
            visible: Vec::new(),
            filter: Filter::default(),
            list_state: ListState::default(),
            loading: true,
            anchor_scroll: 0,
            thread_scroll: 0,
            help_scroll: 0,
            list_viewport_height: 0,
            anchor_viewport_height: 0,
            thread_viewport_height: 0,
            panel_rects: [Rect::default(); 3],
            left_pct: 30,
            center_pct: 45,
            right_pct: 25,
            reply_draft: String::new(),
            reply_target: None,
            notice: None,
            store_tx: None,
        }
    }
}

impl AppState {
    /// Sends `request` to the store worker. A closed channel means the worker
    /// died; that is surfaced in the status bar rather than panicking.
    pub fn request(&mut self, request: StoreRequest) {
        let Some(tx) = &self.store_tx else {
            return;
        };
        if tx.send(request).is_err() {
            self.set_error("store worker stopped; restart marginal".to_owned());
        }
    }

    pub fn set_notice(&mut self, text: String) {
        self.notice = Some(Notice { text, is_error: false });
    }

    pub fn set_error(&mut self, text: String) {
        self.notice = Some(Notice { text, is_error: true });
    }

    /// The comment entry under the list cursor, if any.
    pub fn selected_entry(&self) -> Option<&CommentEntry> {
        let idx = *self.visible.get(self.list_state.selected()?)?;
        self.entries.get(idx)
    }

    fn selected_id(&self) -> Option<String> {
        self.selected_entry().map(|e| e.comment.id.clone())
    }

    /// True when a reply has been typed but not sent.
    pub fn has_unsent_reply(&self) -> bool {
        !self.reply_draft.trim().is_empty()
    }

    /// Applies a store worker result. Selection follows the previously selected
    /// comment id when it is still visible.
    pub fn apply_store_result(&mut self, result: StoreResult) {
        match result {
            StoreResult::Snapshot { entries, notice } => {
                let keep = self.selected_id();
                self.entries = entries;
                self.loading = false;
                self.refilter(keep);
                if let Some(text) = notice {
                    self.set_notice(text);
                }
            }
            StoreResult::Failed {
                error,
                unsent_reply,
            } => {
                if let Some((id, body)) = unsent_reply {
                    if !self.has_unsent_reply() {
                        self.reply_target = Some(id);
                        self.reply_draft = body;
                    }
                    self.set_error(format!("reply not saved: {error}"));
                } else {
                    self.set_error(error);
                }
            }
        }
    }

    /// Rebuilds `visible` for the current filter and re-selects `keep` (or
    /// clamps the cursor when it disappeared).
    fn refilter(&mut self, keep: Option<String>) {
        let previous = self.list_state.selected();
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| self.filter.matches(&e.comment))
            .map(|(i, _)| i)
            .collect();

        let kept = keep.and_then(|id| {
            self.visible
                .iter()
                .position(|&i| self.entries[i].comment.id == id)
        });
        let selection = match (kept, self.visible.len()) {
            (_, 0) => None,
            (Some(pos), _) => Some(pos),
            (None, len) => Some(previous.unwrap_or(0).min(len - 1)),
        };
        if selection != previous {
            self.anchor_scroll = 0;
            self.thread_scroll = 0;
        }
        self.list_state.select(selection);
    }

    /// Advances the workflow filter (open → resolved → all).
    pub fn cycle_filter(&mut self) {
        let keep = self.selected_id();
        self.filter = self.filter.next();
        self.refilter(keep);
    }

    pub fn toggle_selected_resolved(&mut self) {
        if let Some(id) = self.selected_id() {
            self.request(StoreRequest::ToggleResolved { id });
        }
    }

    pub fn force_reconcile(&mut self) {
        self.set_notice("re-anchoring…".to_owned());
        self.request(StoreRequest::Reconcile { force: true });
    }

    /// Enters Insert mode for the selected comment, keeping an existing draft
    /// when it answers the same comment.
    pub fn begin_reply(&mut self) {
        let Some(id) = self.selected_id() else {
            return;
        };
        if self.reply_target.as_deref() != Some(id.as_str()) {
            self.reply_draft.clear();
            self.reply_target = Some(id);
        }
        self.mode = Mode::Insert;
    }

    /// Sends the draft and leaves Insert mode. Blank drafts are discarded.
    pub fn submit_reply(&mut self) {
        self.mode = Mode::Normal;
        let body = std::mem::take(&mut self.reply_draft);
        let Some(id) = self.reply_target.take() else {
            return;
        };
        let body = body.trim_end().to_owned();
        if body.trim().is_empty() {
            return;
        }
        self.request(StoreRequest::Reply { id, body });
    }

    /// Appends pasted text to the draft. Ignored outside Insert mode.
    pub fn paste_into_reply(&mut self, text: &str) {
        if self.mode == Mode::Insert {
            self.reply_draft.push_str(text);
        }
    }

    pub fn discard_reply(&mut self) {
        self.reply_draft.clear();
        self.reply_target = None;
    }

    fn select_offset(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        let current = self.list_state.selected().unwrap_or(0);
        let next = current.saturating_add_signed(delta).min(last);
        if Some(next) != self.list_state.selected() {
            self.anchor_scroll = 0;
            self.thread_scroll = 0;
        }
        self.list_state.select(Some(next));
    }

    /// Scrolls the focused panel down by `lines` rows.
    pub fn scroll_down(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Comments => self.select_offset(lines as isize),
            PanelFocus::Anchor => {
                self.anchor_scroll = self.anchor_scroll.saturating_add(lines as usize);
            }
            PanelFocus::Thread => {
                self.thread_scroll = self.thread_scroll.saturating_add(lines);
            }
        }
    }

    /// Scrolls the focused panel up by `lines` rows.
    pub fn scroll_up(&mut self, lines: u16) {
        match self.focus {
            PanelFocus::Comments => self.select_offset(-(lines as isize)),
            PanelFocus::Anchor => {
                self.anchor_scroll = self.anchor_scroll.saturating_sub(lines as usize);
            }
            PanelFocus::Thread => {
                self.thread_scroll = self.thread_scroll.saturating_sub(lines);
            }
        }
    }

    pub fn scroll_top(&mut self) {
        match self.focus {
            PanelFocus::Comments => self.select_offset(isize::MIN),
            PanelFocus::Anchor => self.anchor_scroll = 0,
            PanelFocus::Thread => self.thread_scroll = 0,
        }
    }

    /// Scrolls the focused panel to the bottom. The thread offset is clamped by
    /// the renderer.
    pub fn scroll_bottom(&mut self) {
        match self.focus {
            PanelFocus::Comments => self.select_offset(isize::MAX),
            PanelFocus::Anchor => {
                let len = self.selected_entry().map_or(0, |e| e.anchor_view.len());
                self.anchor_scroll = len.saturating_sub(1);
            }
            PanelFocus::Thread => self.thread_scroll = u16::MAX,
        }
    }

    fn focused_viewport_height(&self) -> u16 {
        match self.focus {
            PanelFocus::Comments => self.list_viewport_height,
            PanelFocus::Anchor => self.anchor_viewport_height,
            PanelFocus::Thread => self.thread_viewport_height,
        }
    }

    /// Scrolls by half the focused panel's height (at least one row).
    pub fn half_page_down(&mut self) {
        self.scroll_down((self.focused_viewport_height() / 2).max(1));
    }

    pub fn half_page_up(&mut self) {
        self.scroll_up((self.focused_viewport_height() / 2).max(1));
    }

    /// Shrinks the anchor (centre) panel by 5%, giving it to the side panels.
    /// The centre never drops below 20%.
    pub fn shrink_center_panel(&mut self) {
        const MIN_CENTER: u16 = 20;
        const STEP: u16 = 5;
        if self.center_pct <= MIN_CENTER {
            return;
        }
        let transfer = STEP.min(self.center_pct - MIN_CENTER);
        self.center_pct -= transfer;
        let left_gain = transfer / 2;
        self.left_pct += left_gain;
        self.right_pct += transfer - left_gain;
    }

    /// Grows the anchor panel by up to 5% taken from the side panels, evenly
    /// while both have room. The centre never exceeds 80% and neither side
    /// drops below 5%.
    pub fn grow_center_panel(&mut self) {
        const MAX_CENTER: u16 = 80;
        const MIN_SIDE: u16 = 5;
        const STEP: u16 = 5;
        if self.center_pct >= MAX_CENTER {
            return;
        }
        let transfer = STEP.min(MAX_CENTER - self.center_pct);
        let left_room = self.left_pct.saturating_sub(MIN_SIDE);
        let right_room = self.right_pct.saturating_sub(MIN_SIDE);
        let right_give = (transfer - (transfer / 2).min(left_room)).min(right_room);
        let left_give = (transfer - right_give).min(left_room);
        self.left_pct -= left_give;
        self.right_pct -= right_give;
        self.center_pct += left_give + right_give;
    }
}
