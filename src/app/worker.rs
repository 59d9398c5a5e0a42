use super::*;
use super::assistants::{parse_assistant_list, ASSISTANT_SEARCH_LIMIT};
use super::thread_state::FetchTicket;

const NO_CLIENT: &str = "not connected to an agent server";

/// Remote work executed off the UI thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Job {
    FetchAssistants {
        generation: u64,
    },
    FetchThreadState {
        ticket: FetchTicket,
    },
    SendMessage {
        assistant_id: String,
        thread_id: Option<String>,
        text: String,
    },
}

/// Runs one job to completion and reports the outcome on `tx`.
pub(super) fn execute_job(client: Option<&dyn AgentClient>, job: Job, tx: &Sender<WorkerEvent>) {
    match job {
        Job::FetchAssistants { generation } => {
            let result = match client {
                Some(client) => client
                    .search_assistants(ASSISTANT_SEARCH_LIMIT)
                    .map(|raw| parse_assistant_list(&raw))
                    .map_err(|err| format!("{err:#}")),
                None => Err(NO_CLIENT.to_string()),
            };
            let _ = tx.send(WorkerEvent::Assistants { generation, result });
        }
        Job::FetchThreadState { ticket } => {
            let result = match client {
                Some(client) => client
                    .get_thread_state(&ticket.thread_id)
                    .map_err(|err| format!("{err:#}")),
                None => Err(NO_CLIENT.to_string()),
            };
            let _ = tx.send(WorkerEvent::ThreadState { ticket, result });
        }
        Job::SendMessage {
            assistant_id,
            thread_id,
            text,
        } => {
            let Some(client) = client else {
                let _ = tx.send(WorkerEvent::RunFinished {
                    assistant_id,
                    thread_id,
                    result: Err(NO_CLIENT.to_string()),
                });
                return;
            };
            let thread_id = match thread_id {
                Some(thread_id) => thread_id,
                None => match client.create_thread() {
                    Ok(thread_id) => {
                        let _ = tx.send(WorkerEvent::ThreadCreated {
                            assistant_id: assistant_id.clone(),
                            thread_id: thread_id.clone(),
                        });
                        thread_id
                    }
                    Err(err) => {
                        let _ = tx.send(WorkerEvent::RunFinished {
                            assistant_id,
                            thread_id: None,
                            result: Err(format!("{err:#}")),
                        });
                        return;
                    }
                },
            };
            let result = client
                .run_wait(&thread_id, &assistant_id, &text)
                .map_err(|err| format!("{err:#}"));
            let _ = tx.send(WorkerEvent::RunFinished {
                assistant_id,
                thread_id: Some(thread_id),
                result,
            });
        }
    }
}

impl App {
    pub(super) fn dispatch(&mut self, job: Job) {
        if let Some(held) = self.held_jobs.as_mut() {
            held.push(job);
            return;
        }
        let client = self.client.clone();
        let tx = self.tx.clone();
        std::thread::spawn(move || execute_job(client.as_deref(), job, &tx));
    }

    pub(super) fn poll_worker(&mut self) -> bool {
        let mut processed_any = false;
        while let Ok(event) = self.rx.try_recv() {
            processed_any = true;
            self.handle_worker_event(event);
        }
        processed_any
    }

    pub(super) fn handle_worker_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Assistants { generation, result } => {
                self.apply_assistants(generation, result);
            }
            WorkerEvent::ThreadState { ticket, result } => {
                self.apply_thread_state(ticket, result);
            }
            WorkerEvent::ThreadCreated {
                assistant_id,
                thread_id,
            } => {
                tracing::info!(assistant_id = %assistant_id, thread_id = %thread_id, "thread created");
                self.thread_ids.set(&assistant_id, Some(thread_id));
                if self.active_assistant_id() == Some(assistant_id.as_str()) {
                    self.sync_thread_state();
                }
            }
            WorkerEvent::RunFinished {
                assistant_id,
                thread_id,
                result,
            } => {
                let run = self.run.take();
                match result {
                    Ok(()) => {
                        tracing::info!(assistant_id = %assistant_id, thread_id = ?thread_id, "run finished");
                        self.last_status = format!("done ({}s)", run.as_ref().map(|r| r.started_at.elapsed().as_secs()).unwrap_or(0));
                    }
                    Err(err) => {
                        tracing::warn!(assistant_id = %assistant_id, thread_id = ?thread_id, error = %err, "run failed");
                        if let Some(run) = run {
                            self.push_notice(EntryKind::User, run.prompt);
                        }
                        self.push_notice(
                            EntryKind::Error,
                            format!("run failed: {}", truncate(&err, 120)),
                        );
                        self.last_status = "run failed".to_string();
                    }
                }
                if thread_id.is_some() && self.active_thread_id() == thread_id.as_deref() {
                    self.refresh_thread_state();
                }
                self.follow_scroll();
            }
        }
    }

    fn apply_assistants(&mut self, generation: u64, result: Result<Vec<assistants::Assistant>, String>) {
        if !self.directory.is_current(generation) {
            tracing::debug!(generation, "discarding stale assistant list");
            return;
        }
        match result {
            Ok(list) => {
                let count = list.len();
                let previous = self.active_assistant_id().map(str::to_string);
                let desired = self.deployment.default_agent_id.clone();
                self.directory.apply(generation, list, desired.as_deref());
                tracing::info!(count, selected = ?self.directory.selected, "assistants loaded");
                self.last_status = if count == 0 {
                    "no assistants available".to_string()
                } else {
                    format!(
                        "assistant: {}",
                        self.directory.selected_label().unwrap_or("none")
                    )
                };
                if previous != self.directory.selected {
                    self.selected_sub_agent = None;
                }
                self.sync_thread_state();
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to fetch assistants");
                self.last_status = format!("assistants unavailable: {}", truncate(&err, 60));
            }
        }
    }

    /// Sends `text` to the active assistant, creating a thread on first use.
    pub(super) fn send_message(&mut self, text: String) {
        if self.session.token().is_none() {
            self.push_notice(EntryKind::Error, "not connected; use /login <token>");
            return;
        }
        let Some(assistant_id) = self.active_assistant_id().map(str::to_string) else {
            self.push_notice(EntryKind::Error, "no assistant selected");
            return;
        };
        if self.run.is_some() {
            let msg = "run in progress, wait...";
            if !self.last_notice_is(msg) {
                self.push_notice(EntryKind::System, msg);
            }
            return;
        }

        let thread_id = self.active_thread_id().map(str::to_string);
        tracing::info!(assistant_id = %assistant_id, thread_id = ?thread_id, "sending message");
        self.run = Some(RunState {
            assistant_id: assistant_id.clone(),
            prompt: text.clone(),
            started_at: Instant::now(),
        });
        self.autoscroll = true;
        self.last_status = format!(
            "running {}",
            self.directory.selected_label().unwrap_or(assistant_id.as_str())
        );
        self.dispatch(Job::SendMessage {
            assistant_id,
            thread_id,
            text,
        });
        self.follow_scroll();
    }
}
