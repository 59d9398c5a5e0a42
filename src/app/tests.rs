use super::*;
use super::worker::execute_job;
use crate::client::ThreadState;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Default)]
struct FakeServer {
    assistants: Vec<Value>,
    threads: HashMap<String, Value>,
    failing: HashSet<String>,
    next_thread: u32,
    runs: Vec<(String, String, String)>,
    fail_runs: bool,
}

struct FakeClient {
    server: Arc<Mutex<FakeServer>>,
}

impl AgentClient for FakeClient {
    fn search_assistants(&self, _limit: usize) -> Result<Value> {
        let server = self.server.lock().expect("lock server");
        Ok(Value::Array(server.assistants.clone()))
    }

    fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        let server = self.server.lock().expect("lock server");
        if server.failing.contains(thread_id) {
            anyhow::bail!("thread {thread_id} unavailable");
        }
        Ok(ThreadState {
            values: server.threads.get(thread_id).cloned(),
        })
    }

    fn create_thread(&self) -> Result<String> {
        let mut server = self.server.lock().expect("lock server");
        server.next_thread += 1;
        let thread_id = format!("thread-{}", server.next_thread);
        server
            .threads
            .insert(thread_id.clone(), json!({ "messages": [] }));
        Ok(thread_id)
    }

    fn run_wait(&self, thread_id: &str, assistant_id: &str, message: &str) -> Result<()> {
        let mut server = self.server.lock().expect("lock server");
        server.runs.push((
            thread_id.to_string(),
            assistant_id.to_string(),
            message.to_string(),
        ));
        if server.fail_runs {
            anyhow::bail!("graph raised an exception");
        }
        let values = server
            .threads
            .entry(thread_id.to_string())
            .or_insert_with(|| json!({ "messages": [] }));
        if let Some(messages) = values.get_mut("messages").and_then(Value::as_array_mut) {
            messages.push(json!({ "type": "human", "content": message }));
            messages.push(json!({ "type": "ai", "content": format!("reply from {assistant_id}") }));
        }
        Ok(())
    }
}

fn fake_factory(server: &Arc<Mutex<FakeServer>>) -> ClientFactory {
    let server = Arc::clone(server);
    Box::new(move |_deployment, _session| {
        Ok(Arc::new(FakeClient {
            server: Arc::clone(&server),
        }) as Arc<dyn AgentClient>)
    })
}

fn server_with_assistants(assistants: Value) -> Arc<Mutex<FakeServer>> {
    let server = FakeServer {
        assistants: assistants.as_array().cloned().unwrap_or_default(),
        ..FakeServer::default()
    };
    Arc::new(Mutex::new(server))
}

fn two_assistants() -> Arc<Mutex<FakeServer>> {
    server_with_assistants(json!([
        { "assistant_id": "A", "name": "Alpha" },
        { "assistant_id": "B", "name": "Beta" }
    ]))
}

fn test_app_with(
    server: &Arc<Mutex<FakeServer>>,
    default_agent: Option<&str>,
    token: Option<&str>,
) -> App {
    let deployment = Deployment {
        name: "Deep Agent".to_string(),
        deployment_url: "http://agents.test".to_string(),
        default_agent_id: default_agent.map(str::to_string),
    };
    let session = Session {
        access_token: token.map(str::to_string),
    };
    let mut app = App::build(deployment, session, default_theme(), fake_factory(server));
    app.held_jobs = Some(Vec::new());
    app.on_session_changed();
    app
}

/// App with a token whose assistant bootstrap has completed.
fn test_app(server: &Arc<Mutex<FakeServer>>) -> App {
    let mut app = test_app_with(server, None, Some("tok"));
    drain(&mut app);
    app
}

fn take_jobs(app: &mut App) -> Vec<Job> {
    std::mem::take(app.held_jobs.as_mut().expect("held jobs enabled"))
}

fn execute(app: &App, job: Job) {
    let client = app.client.clone();
    execute_job(client.as_deref(), job, &app.tx);
}

/// Runs queued jobs in order until nothing new is dispatched.
fn drain(app: &mut App) {
    loop {
        let jobs = take_jobs(app);
        if jobs.is_empty() {
            break;
        }
        for job in jobs {
            execute(app, job);
        }
        app.poll_worker();
    }
}

fn open_thread(app: &mut App, thread_id: &str) {
    let assistant = app
        .active_assistant_id()
        .expect("assistant selected")
        .to_string();
    app.thread_ids.set(&assistant, Some(thread_id.to_string()));
    app.sync_thread_state();
    drain(app);
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
}

fn type_line(app: &mut App, text: &str) {
    app.insert_str(text);
    app.handle_key(key(KeyCode::Enter));
}

fn plain_lines(lines: &[Line<'static>]) -> Vec<String> {
    lines
        .iter()
        .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
        .collect()
}

fn tool_thread() -> Value {
    json!({
        "todos": [{ "content": "read the notes", "status": "in_progress" }],
        "files": { "b.md": "B", "a.md": "A" },
        "messages": [
            { "type": "human", "id": "h1", "content": "summarize a.txt" },
            {
                "type": "ai",
                "id": "m1",
                "content": "",
                "tool_calls": [
                    { "id": "c1", "name": "read_file", "args": { "path": "/a.txt" } },
                    { "id": "c2", "name": "task", "args": { "description": "dig deeper", "subagent_type": "researcher" } }
                ]
            },
            { "type": "tool", "tool_call_id": "c1", "content": "hello" }
        ]
    })
}

#[test]
fn bootstrap_selects_assistant_by_case_insensitive_name() {
    let server = server_with_assistants(json!([
        { "assistant_id": "x0", "name": "Other" },
        { "assistant_id": "x1", "name": "Helper" }
    ]));
    let mut app = test_app_with(&server, Some("HELPER"), Some("tok"));
    assert_eq!(app.active_assistant_id(), None);

    drain(&mut app);

    assert_eq!(app.active_assistant_id(), Some("x1"));
    assert_eq!(app.directory.selected_label(), Some("Helper"));
}

#[test]
fn bootstrap_falls_back_to_first_listed_assistant() {
    let server = two_assistants();
    let mut app = test_app_with(&server, Some("missing"), Some("tok"));
    drain(&mut app);
    assert_eq!(app.active_assistant_id(), Some("A"));
}

#[test]
fn missing_token_skips_every_fetch() {
    let server = two_assistants();
    let mut app = test_app_with(&server, None, None);

    assert!(take_jobs(&mut app).is_empty());
    assert!(app.client.is_none());
    assert!(app.directory.assistants.is_empty());
    assert!(app.last_status.contains("no access token"));
}

#[test]
fn stale_assistant_list_is_discarded_after_session_change() {
    let server = two_assistants();
    let mut app = test_app_with(&server, None, Some("old"));
    let old_generation = match take_jobs(&mut app).as_slice() {
        [Job::FetchAssistants { generation }] => *generation,
        other => panic!("unexpected jobs: {other:?}"),
    };

    app.set_session(Session::with_token("new"));
    app.tx
        .send(WorkerEvent::Assistants {
            generation: old_generation,
            result: Ok(vec![assistants::Assistant {
                id: "stale".to_string(),
                name: "Stale".to_string(),
            }]),
        })
        .expect("send stale list");
    app.poll_worker();
    assert!(app.directory.assistants.is_empty());

    drain(&mut app);
    assert_eq!(app.active_assistant_id(), Some("A"));
}

#[test]
fn thread_ids_are_kept_per_assistant() {
    let server = two_assistants();
    let mut app = test_app(&server);

    app.send_message("hello A".to_string());
    drain(&mut app);
    assert_eq!(app.active_thread_id(), Some("thread-1"));

    app.select_assistant("B");
    assert_eq!(app.active_thread_id(), None);
    assert!(app.sync.messages.is_empty());

    app.send_message("hello B".to_string());
    drain(&mut app);
    assert_eq!(app.active_thread_id(), Some("thread-2"));

    app.select_assistant("A");
    drain(&mut app);
    assert_eq!(app.active_thread_id(), Some("thread-1"));
    assert_eq!(app.sync.messages[0].text, "hello A");
    assert_eq!(app.thread_ids.get("B"), Some("thread-2"));
}

#[test]
fn stale_thread_state_does_not_overwrite_newer_thread() {
    let server = two_assistants();
    {
        let mut s = server.lock().expect("lock server");
        s.threads.insert("t1".to_string(), json!({ "todos": ["from t1"] }));
        s.threads.insert("t2".to_string(), json!({ "todos": ["from t2"] }));
    }
    let mut app = test_app(&server);

    app.thread_ids.set("A", Some("t1".to_string()));
    app.sync_thread_state();
    app.thread_ids.set("A", Some("t2".to_string()));
    app.sync_thread_state();

    let mut jobs = take_jobs(&mut app);
    assert_eq!(jobs.len(), 2);
    let first = jobs.remove(0);
    let second = jobs.remove(0);

    execute(&app, second);
    app.poll_worker();
    execute(&app, first);
    app.poll_worker();

    assert_eq!(app.sync.todos, vec![json!("from t2")]);
    assert!(!app.sync.loading);
}

#[test]
fn failed_fetch_leaves_empty_state_and_stops_loading() {
    let server = two_assistants();
    {
        let mut s = server.lock().expect("lock server");
        s.threads.insert("t1".to_string(), tool_thread());
        s.failing.insert("t2".to_string());
    }
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");
    assert_eq!(app.sync.files.len(), 2);

    open_thread(&mut app, "t2");

    assert!(app.sync.todos.is_empty());
    assert!(app.sync.files.is_empty());
    assert!(!app.sync.loading);
    assert!(app.last_status.contains("thread state unavailable"));
}

#[test]
fn thread_created_after_switch_is_stored_under_originating_assistant() {
    let server = two_assistants();
    let mut app = test_app(&server);

    app.send_message("start".to_string());
    app.select_assistant("B");
    drain(&mut app);

    assert_eq!(app.thread_ids.get("A"), Some("thread-1"));
    assert_eq!(app.thread_ids.get("B"), None);
    assert_eq!(app.active_thread_id(), None);
    assert!(app.run.is_none());
}

#[test]
fn finished_run_refreshes_active_thread() {
    let server = two_assistants();
    {
        let mut s = server.lock().expect("lock server");
        s.threads.insert("t1".to_string(), json!({ "messages": [] }));
    }
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");
    assert!(app.sync.messages.is_empty());

    app.send_message("what changed?".to_string());
    assert!(app.is_running());
    drain(&mut app);

    assert!(!app.is_running());
    assert_eq!(app.sync.messages.len(), 2);
    assert_eq!(app.sync.messages[1].text, "reply from A");
    let server = server.lock().expect("lock server");
    assert_eq!(
        server.runs.as_slice(),
        &[("t1".to_string(), "A".to_string(), "what changed?".to_string())]
    );
}

#[test]
fn failed_run_keeps_prompt_and_reports_error() {
    let server = two_assistants();
    server.lock().expect("lock server").fail_runs = true;
    let mut app = test_app(&server);

    app.send_message("doomed".to_string());
    drain(&mut app);

    assert!(!app.is_running());
    assert!(app
        .notices
        .iter()
        .any(|n| n.kind == EntryKind::User && n.text == "doomed"));
    assert!(app
        .notices
        .iter()
        .any(|n| n.kind == EntryKind::Error && n.text.contains("graph raised an exception")));
}

#[test]
fn second_message_is_rejected_while_running() {
    let server = two_assistants();
    let mut app = test_app(&server);

    app.send_message("one".to_string());
    app.send_message("two".to_string());

    assert_eq!(take_jobs(&mut app).len(), 1);
    assert!(app.last_notice_is("run in progress, wait..."));
}

#[test]
fn tool_row_toggles_from_transcript_focus_and_survives_refresh() {
    let server = two_assistants();
    server
        .lock()
        .expect("lock server")
        .threads
        .insert("t1".to_string(), tool_thread());
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");

    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.focus, Focus::Transcript);
    app.handle_key(key(KeyCode::Enter));
    assert!(app.tool_boxes["c1"].is_expanded());

    app.handle_key(ctrl('r'));
    drain(&mut app);
    assert!(app.tool_boxes["c1"].is_expanded());

    app.handle_key(key(KeyCode::Char(' ')));
    assert!(!app.tool_boxes["c1"].is_expanded());
}

#[test]
fn sub_agent_panel_opens_for_task_calls_only() {
    let server = two_assistants();
    server
        .lock()
        .expect("lock server")
        .threads
        .insert("t1".to_string(), tool_thread());
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");
    app.handle_key(key(KeyCode::Tab));

    app.handle_key(key(KeyCode::Char('s')));
    assert!(app.selected_sub_agent.is_none());

    app.handle_key(key(KeyCode::Down));
    app.handle_key(key(KeyCode::Char('s')));
    let agent = app.selected_sub_agent.as_ref().expect("sub-agent open");
    assert_eq!(agent.name, "researcher");
    assert_eq!(agent.input, "dig deeper");

    app.handle_key(key(KeyCode::Esc));
    assert!(app.selected_sub_agent.is_none());
}

#[test]
fn opened_sub_agent_matches_listed_one_when_calls_have_no_ids() {
    let server = two_assistants();
    server.lock().expect("lock server").threads.insert(
        "t1".to_string(),
        json!({
            "messages": [{
                "type": "ai",
                "id": "m1",
                "content": "",
                "tool_calls": [
                    { "name": "read_file", "args": { "path": "/a.txt" } },
                    { "name": "task", "args": { "description": "plan" } }
                ]
            }]
        }),
    );
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Down));
    app.handle_key(key(KeyCode::Char('s')));

    let opened = app.selected_sub_agent.clone().expect("sub-agent open");
    assert_eq!(opened.id, "m1:1");
    assert_eq!(messages::sub_agents(&app.sync.messages), vec![opened.clone()]);

    let panel = plain_lines(&app.sub_agent_panel_lines(&opened));
    assert!(panel[0].ends_with("  pending"), "{:?}", panel[0]);
}

#[test]
fn files_open_in_dialog_in_path_order() {
    let server = two_assistants();
    server
        .lock()
        .expect("lock server")
        .threads
        .insert("t1".to_string(), tool_thread());
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");

    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.focus, Focus::Files);
    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.open_file.as_deref(), Some("a.md"));
    assert_eq!(plain_lines(&app.file_dialog_lines("a.md")), vec!["A"]);

    app.handle_key(key(KeyCode::Esc));
    assert!(app.open_file.is_none());
    assert_eq!(app.focus, Focus::Files);
}

#[test]
fn new_thread_clears_local_state() {
    let server = two_assistants();
    server
        .lock()
        .expect("lock server")
        .threads
        .insert("t1".to_string(), tool_thread());
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");
    assert!(!app.tool_boxes.is_empty());

    app.handle_key(ctrl('n'));

    assert_eq!(app.active_thread_id(), None);
    assert!(app.sync.todos.is_empty());
    assert!(app.sync.messages.is_empty());
    assert!(app.tool_boxes.is_empty());
}

#[test]
fn transcript_shows_tool_name_and_preview() {
    let server = two_assistants();
    server
        .lock()
        .expect("lock server")
        .threads
        .insert("t1".to_string(), tool_thread());
    let mut app = test_app(&server);
    open_thread(&mut app, "t1");

    let text = plain_lines(&app.render_transcript_lines(100)).join("\n");
    assert!(text.contains("summarize a.txt"));
    assert!(text.contains("read_file  hello"));
    assert!(text.contains("Alpha"));
    assert!(!text.contains("Arguments"));

    app.handle_key(key(KeyCode::Tab));
    app.handle_key(key(KeyCode::Enter));
    let text = plain_lines(&app.render_transcript_lines(100)).join("\n");
    assert!(text.contains("Arguments"));
    assert!(text.contains("\"path\": \"/a.txt\""));
}

#[test]
fn slash_commands_switch_assistant_and_theme() {
    let server = two_assistants();
    let mut app = test_app(&server);

    type_line(&mut app, "/assistant beta");
    assert_eq!(app.active_assistant_id(), Some("B"));

    type_line(&mut app, "/theme ember");
    assert_eq!(app.theme, ThemePreset::Ember);

    type_line(&mut app, "/assistant nobody");
    assert_eq!(app.active_assistant_id(), Some("B"));
    assert_eq!(app.notices.last().map(|n| n.kind), Some(EntryKind::Error));
}

#[test]
fn login_bootstraps_and_keeps_token_out_of_history() {
    let server = two_assistants();
    let mut app = test_app_with(&server, None, None);

    type_line(&mut app, "/login secret-token");
    drain(&mut app);

    assert_eq!(app.session.token(), Some("secret-token"));
    assert_eq!(app.active_assistant_id(), Some("A"));
    assert!(app.history.iter().all(|h| !h.contains("secret-token")));
}

#[test]
fn pageup_disables_autoscroll_and_moves_up() {
    let server = two_assistants();
    let mut app = test_app(&server);
    app.update_viewport(40, 5);
    for i in 0..40 {
        app.push_notice(EntryKind::System, format!("entry {i}"));
    }
    let before = app.scroll;
    assert!(before > 0);

    app.handle_key(key(KeyCode::PageUp));

    assert!(!app.autoscroll);
    assert_eq!(app.scroll, before.saturating_sub(5));
}

#[test]
fn pagedown_at_bottom_reenables_autoscroll() {
    let server = two_assistants();
    let mut app = test_app(&server);
    app.update_viewport(40, 5);
    for i in 0..40 {
        app.push_notice(EntryKind::System, format!("entry {i}"));
    }
    let max = app.scroll_max();
    app.autoscroll = false;
    app.scroll = max.saturating_sub(1);

    app.handle_key(key(KeyCode::PageDown));

    assert_eq!(app.scroll, max);
    assert!(app.autoscroll);
}
