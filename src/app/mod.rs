use std::collections::HashMap;
use std::io::Stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyEventKind, MouseEventKind};
use ratatui::backend::CrosstermBackend;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};
use ratatui::Terminal;
use unicode_width::UnicodeWidthStr;

use crate::client::{AgentClient, ClientFactory};
use crate::config::{Deployment, Session};
use crate::truncate;

const MAX_NOTICES: usize = 200;

mod assistants;
mod commands;
mod input;
mod messages;
mod render;
mod runtime;
#[cfg(test)]
mod tests;
mod text;
mod thread_state;
mod tool_call;
mod tool_meta;
mod types;
mod ui;
mod worker;

use assistants::{AssistantDirectory, ThreadIdStore};
use messages::SubAgent;
pub(crate) use runtime::run_app;
use text::sanitize_runtime_text;
use thread_state::{SyncAction, SyncOutcome, ThreadStateSync};
use tool_call::ToolCallBox;
pub(crate) use types::{default_theme, ThemePreset};
use types::{EntryKind, Focus, LogEntry, ThemePalette, WorkerEvent};
use worker::Job;

#[derive(Clone, Debug)]
struct RunState {
    assistant_id: String,
    prompt: String,
    started_at: Instant,
}

/// Cached rendering state to avoid recomputing transcript lines every frame.
struct RenderCache {
    generation: u64,
    width: u16,
    height: u16,
    lines: Vec<Line<'static>>,
    scroll_max: u16,
}

impl RenderCache {
    fn new() -> Self {
        Self {
            generation: u64::MAX, // force first rebuild
            width: 0,
            height: 0,
            lines: Vec::new(),
            scroll_max: 0,
        }
    }
}

struct App {
    deployment: Deployment,
    session: Session,
    connect: ClientFactory,
    client: Option<Arc<dyn AgentClient>>,

    directory: AssistantDirectory,
    thread_ids: ThreadIdStore,
    sync: ThreadStateSync,
    tool_boxes: HashMap<String, ToolCallBox>,
    selected_tool: usize,
    selected_sub_agent: Option<SubAgent>,
    open_file: Option<String>,
    file_idx: usize,
    sidebar_collapsed: bool,
    focus: Focus,
    theme: ThemePreset,

    input: String,
    cursor: usize,
    history: Vec<String>,
    history_pos: Option<usize>,
    slash_hint_idx: usize,

    notices: Vec<LogEntry>,
    run: Option<RunState>,
    spinner_idx: usize,
    last_status: String,
    should_quit: bool,

    tx: Sender<WorkerEvent>,
    rx: Receiver<WorkerEvent>,
    /// When set, jobs are queued here instead of spawning worker threads.
    held_jobs: Option<Vec<Job>>,

    scroll: u16,
    autoscroll: bool,
    viewport_width: u16,
    viewport_height: u16,
    render_generation: u64,
    render_cache: RenderCache,
}

impl App {
    fn new(deployment: Deployment, session: Session, theme: ThemePreset, connect: ClientFactory) -> Self {
        let mut app = Self::build(deployment, session, theme, connect);
        app.on_session_changed();
        app
    }

    fn build(deployment: Deployment, session: Session, theme: ThemePreset, connect: ClientFactory) -> Self {
        let (tx, rx) = unbounded();
        Self {
            deployment,
            session,
            connect,
            client: None,
            directory: AssistantDirectory::default(),
            thread_ids: ThreadIdStore::default(),
            sync: ThreadStateSync::default(),
            tool_boxes: HashMap::new(),
            selected_tool: 0,
            selected_sub_agent: None,
            open_file: None,
            file_idx: 0,
            sidebar_collapsed: false,
            focus: Focus::Composer,
            theme,
            input: String::new(),
            cursor: 0,
            history: Vec::new(),
            history_pos: None,
            slash_hint_idx: 0,
            notices: Vec::new(),
            run: None,
            spinner_idx: 0,
            last_status: "ready".to_string(),
            should_quit: false,
            tx,
            rx,
            held_jobs: None,
            scroll: 0,
            autoscroll: true,
            viewport_width: 80,
            viewport_height: 24,
            render_generation: 0,
            render_cache: RenderCache::new(),
        }
    }

    pub(super) fn theme_palette(&self) -> ThemePalette {
        self.theme.palette()
    }

    pub(super) fn active_assistant_id(&self) -> Option<&str> {
        self.directory.selected.as_deref()
    }

    pub(super) fn active_thread_id(&self) -> Option<&str> {
        self.active_assistant_id()
            .and_then(|assistant_id| self.thread_ids.get(assistant_id))
    }

    pub(super) fn is_running(&self) -> bool {
        self.run.is_some()
    }

    pub(super) fn running_elapsed_secs(&self) -> u64 {
        self.run
            .as_ref()
            .map(|run| run.started_at.elapsed().as_secs())
            .unwrap_or(0)
    }

    /// Rebuilds the client and re-runs the assistant bootstrap and thread sync.
    fn on_session_changed(&mut self) {
        self.client = match self.session.token() {
            Some(_) => match (self.connect)(&self.deployment, &self.session) {
                Ok(client) => Some(client),
                Err(err) => {
                    let message = format!("{err:#}");
                    tracing::error!(error = %message, "failed to build agent client");
                    self.push_notice(
                        EntryKind::Error,
                        format!("client setup failed: {}", truncate(&message, 80)),
                    );
                    None
                }
            },
            None => None,
        };

        match self.directory.begin(self.session.token()) {
            Some(generation) => {
                tracing::info!(url = %self.deployment.deployment_url, "fetching assistants");
                self.last_status = "loading assistants".to_string();
                self.dispatch(Job::FetchAssistants { generation });
            }
            None => {
                self.last_status = "no access token; /login <token> to connect".to_string();
            }
        }
        self.sync_thread_state();
    }

    pub(super) fn set_session(&mut self, session: Session) {
        if session == self.session {
            return;
        }
        self.session = session;
        self.on_session_changed();
    }

    /// Starts a thread-state fetch (or clears) when the active thread or token changed.
    pub(super) fn sync_thread_state(&mut self) {
        let thread_id = self.active_thread_id().map(str::to_string);
        let action = self.sync.observe(thread_id.as_deref(), self.session.token());
        self.handle_sync_action(action);
    }

    pub(super) fn refresh_thread_state(&mut self) {
        let action = self.sync.refresh();
        self.handle_sync_action(action);
    }

    fn handle_sync_action(&mut self, action: SyncAction) {
        match action {
            SyncAction::Unchanged => {}
            SyncAction::Cleared => {
                self.refresh_tool_boxes();
            }
            SyncAction::Fetch(ticket) => {
                tracing::debug!(thread_id = %ticket.thread_id, generation = ticket.generation, "fetching thread state");
                self.dispatch(Job::FetchThreadState { ticket });
            }
        }
    }

    pub(super) fn select_assistant(&mut self, assistant_id: &str) {
        if self.active_assistant_id() == Some(assistant_id) {
            return;
        }
        self.directory.select(assistant_id);
        self.selected_sub_agent = None;
        self.last_status = format!(
            "assistant: {}",
            self.directory.selected_label().unwrap_or(assistant_id)
        );
        self.sync_thread_state();
    }

    pub(super) fn new_thread(&mut self) {
        if let Some(assistant_id) = self.active_assistant_id().map(str::to_string) {
            self.thread_ids.set(&assistant_id, None);
        }
        self.selected_sub_agent = None;
        self.sync.reset();
        self.refresh_tool_boxes();
        self.sync_thread_state();
        self.last_status = "new thread".to_string();
    }

    fn apply_thread_state(
        &mut self,
        ticket: thread_state::FetchTicket,
        result: Result<crate::client::ThreadState, String>,
    ) {
        let error = result.as_ref().err().cloned();
        match self.sync.apply(&ticket, result) {
            SyncOutcome::Stale => {
                tracing::debug!(thread_id = %ticket.thread_id, generation = ticket.generation, "discarding stale thread state");
            }
            SyncOutcome::Failed => {
                let err = error.unwrap_or_default();
                tracing::warn!(thread_id = %ticket.thread_id, error = %err, "failed to fetch thread state");
                self.last_status = format!("thread state unavailable: {}", truncate(&err, 60));
                self.refresh_tool_boxes();
            }
            SyncOutcome::Applied => {
                self.last_status = format!(
                    "{} todos | {} files",
                    self.sync.todos.len(),
                    self.sync.files.len()
                );
                self.file_idx = self.file_idx.min(self.sync.files.len().saturating_sub(1));
                self.refresh_tool_boxes();
            }
        }
    }

    /// Keys of every tool call in transcript order.
    pub(super) fn tool_keys(&self) -> Vec<String> {
        self.sync
            .messages
            .iter()
            .flat_map(|message| {
                message
                    .tool_calls
                    .iter()
                    .enumerate()
                    .map(move |(idx, call)| tool_key(&message.id, idx, call.id.as_deref()))
            })
            .collect()
    }

    /// Re-syncs tool rows against the current messages, keeping expand state.
    fn refresh_tool_boxes(&mut self) {
        let mut previous = std::mem::take(&mut self.tool_boxes);
        for message in &self.sync.messages {
            for (idx, call) in message.tool_calls.iter().enumerate() {
                let key = tool_key(&message.id, idx, call.id.as_deref());
                let row = match previous.remove(&key) {
                    Some(mut row) => {
                        row.sync(call);
                        row
                    }
                    None => ToolCallBox::new(Arc::clone(call)),
                };
                self.tool_boxes.insert(key, row);
            }
        }
        self.selected_tool = self
            .selected_tool
            .min(self.tool_boxes.len().saturating_sub(1));
        self.follow_scroll();
    }

    pub(super) fn selected_tool_key(&self) -> Option<String> {
        self.tool_keys().into_iter().nth(self.selected_tool)
    }

    pub(super) fn toggle_selected_tool(&mut self) -> bool {
        let Some(key) = self.selected_tool_key() else {
            return false;
        };
        let toggled = self
            .tool_boxes
            .get_mut(&key)
            .is_some_and(|row| row.toggle());
        if toggled {
            self.invalidate_render_cache();
        }
        toggled
    }

    pub(super) fn open_selected_sub_agent(&mut self) -> bool {
        let Some(key) = self.selected_tool_key() else {
            return false;
        };
        let call = self
            .sync
            .messages
            .iter()
            .flat_map(|message| {
                message
                    .tool_calls
                    .iter()
                    .enumerate()
                    .map(move |(idx, call)| (tool_key(&message.id, idx, call.id.as_deref()), call))
            })
            .find(|(candidate, _)| *candidate == key)
            .map(|(_, call)| Arc::clone(call));
        let Some(call) = call.filter(|call| call.name.as_deref() == Some("task")) else {
            return false;
        };
        self.selected_sub_agent = Some(messages::sub_agent_from_call(key, &call));
        true
    }

    pub(super) fn selected_file_path(&self) -> Option<&String> {
        self.sync.files.keys().nth(self.file_idx)
    }

    pub(super) fn open_selected_file(&mut self) -> bool {
        let Some(path) = self.selected_file_path().cloned() else {
            return false;
        };
        self.open_file = Some(path);
        true
    }

    pub(super) fn toggle_sidebar(&mut self) {
        self.sidebar_collapsed = !self.sidebar_collapsed;
        if self.sidebar_collapsed && self.focus == Focus::Files {
            self.focus = Focus::Composer;
        }
        self.invalidate_render_cache();
    }

    pub(super) fn push_notice(&mut self, kind: EntryKind, text: impl Into<String>) {
        self.notices.push(LogEntry {
            kind,
            text: sanitize_runtime_text(&text.into()),
        });
        if self.notices.len() > MAX_NOTICES {
            let excess = self.notices.len() - MAX_NOTICES;
            self.notices.drain(..excess);
        }
        self.follow_scroll();
    }

    fn last_notice_is(&self, text: &str) -> bool {
        self.notices.last().is_some_and(|entry| entry.text == text)
    }

    /// Bump the render generation to invalidate the render cache.
    fn invalidate_render_cache(&mut self) {
        self.render_generation = self.render_generation.wrapping_add(1);
    }

    /// Invalidate render cache and update scroll to follow content.
    fn follow_scroll(&mut self) {
        self.invalidate_render_cache();
        if self.autoscroll {
            self.scroll = self.scroll_max();
        } else {
            self.scroll = self.scroll.min(self.scroll_max());
        }
    }

    /// Ensure the render cache is up-to-date for the current state.
    fn ensure_render_cache(&mut self) -> bool {
        let need_rebuild = self.render_cache.generation != self.render_generation
            || self.render_cache.width != self.viewport_width
            || self.render_cache.height != self.viewport_height;
        if !need_rebuild {
            return false;
        }

        let w = self.viewport_width.max(1);
        let lines = self.render_transcript_lines(w);
        let paragraph = Paragraph::new(Text::from(lines.clone())).wrap(Wrap { trim: false });
        let rendered_line_count = paragraph.line_count(w).min(u16::MAX as usize) as u16;
        let scroll_max = rendered_line_count.saturating_sub(self.viewport_height);

        self.render_cache = RenderCache {
            generation: self.render_generation,
            width: self.viewport_width,
            height: self.viewport_height,
            lines,
            scroll_max,
        };
        true
    }

    fn scroll_max(&mut self) -> u16 {
        self.ensure_render_cache();
        self.render_cache.scroll_max
    }

    pub(super) fn cached_transcript_lines(&self) -> &[Line<'static>] {
        &self.render_cache.lines
    }

    fn update_viewport(&mut self, width: u16, height: u16) {
        self.viewport_width = width.max(1);
        self.viewport_height = height.max(1);
        let max_scroll = self.scroll_max();
        if self.autoscroll {
            self.scroll = max_scroll;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn scroll_up(&mut self, n: u16) {
        let from = if self.autoscroll {
            self.scroll_max()
        } else {
            self.scroll
        };
        self.autoscroll = false;
        self.scroll = from.saturating_sub(n);
    }

    fn scroll_down(&mut self, n: u16) {
        let max_scroll = self.scroll_max();
        self.scroll = self.scroll.saturating_add(n).min(max_scroll);
        if self.scroll >= max_scroll {
            self.autoscroll = true;
        }
    }
}

pub(super) fn tool_key(message_id: &str, idx: usize, call_id: Option<&str>) -> String {
    match call_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => format!("{message_id}:{idx}"),
    }
}
