use std::collections::BTreeMap;

use serde_json::Value;

use super::messages::{project_messages, reuse_unchanged_calls, ChatMessage};
use super::tool_call::pretty_json;
use crate::client::ThreadState;

pub(crate) type TodoItem = Value;
pub(crate) type FileMap = BTreeMap<String, String>;

/// Identifies one issued thread-state request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct FetchTicket {
    pub(crate) generation: u64,
    pub(crate) thread_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SyncAction {
    Unchanged,
    Cleared,
    Fetch(FetchTicket),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SyncOutcome {
    Applied,
    Failed,
    Stale,
}

/// Local projection of the active thread's remote state.
///
/// Every request is stamped with a generation; only the response carrying
/// the current generation may touch local state.
#[derive(Debug, Default)]
pub(crate) struct ThreadStateSync {
    generation: u64,
    key: Option<(Option<String>, Option<String>)>,
    pub(crate) todos: Vec<TodoItem>,
    pub(crate) files: FileMap,
    pub(crate) messages: Vec<ChatMessage>,
    pub(crate) loading: bool,
}

impl ThreadStateSync {
    /// Called whenever the active thread id or access token may have changed.
    pub(crate) fn observe(&mut self, thread_id: Option<&str>, access_token: Option<&str>) -> SyncAction {
        let key = (
            thread_id.map(str::to_string),
            access_token.map(str::to_string),
        );
        if self.key.as_ref() == Some(&key) {
            return SyncAction::Unchanged;
        }
        self.key = Some(key);
        self.issue()
    }

    /// Re-issues the request for the current key.
    pub(crate) fn refresh(&mut self) -> SyncAction {
        if self.key.is_none() {
            return SyncAction::Unchanged;
        }
        self.issue()
    }

    fn issue(&mut self) -> SyncAction {
        self.generation = self.generation.wrapping_add(1);
        let Some((Some(thread_id), Some(_))) = self.key.clone() else {
            self.reset();
            self.loading = false;
            return SyncAction::Cleared;
        };
        self.loading = true;
        SyncAction::Fetch(FetchTicket {
            generation: self.generation,
            thread_id,
        })
    }

    pub(crate) fn is_current(&self, ticket: &FetchTicket) -> bool {
        ticket.generation == self.generation
            && self
                .key
                .as_ref()
                .and_then(|(thread_id, _)| thread_id.as_deref())
                == Some(ticket.thread_id.as_str())
    }

    pub(crate) fn apply(
        &mut self,
        ticket: &FetchTicket,
        result: Result<ThreadState, String>,
    ) -> SyncOutcome {
        if !self.is_current(ticket) {
            return SyncOutcome::Stale;
        }
        self.loading = false;
        match result {
            Ok(state) => {
                if let Some(values) = state.values {
                    self.replace_from_values(&values);
                }
                SyncOutcome::Applied
            }
            Err(_) => {
                self.reset();
                SyncOutcome::Failed
            }
        }
    }

    pub(crate) fn reset(&mut self) {
        self.todos.clear();
        self.files.clear();
        self.messages.clear();
    }

    fn replace_from_values(&mut self, values: &Value) {
        self.todos = values
            .get("todos")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        self.files = values
            .get("files")
            .and_then(Value::as_object)
            .map(|files| {
                files
                    .iter()
                    .map(|(path, content)| (path.clone(), file_content(content)))
                    .collect()
            })
            .unwrap_or_default();
        let messages = project_messages(values.get("messages"));
        self.messages = reuse_unchanged_calls(&self.messages, messages);
    }
}

/// Files are usually plain strings; structured file records carry their
/// text as a list of lines under `content`.
fn file_content(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(record) => match record.get("content") {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Array(lines)) if lines.iter().all(Value::is_string) => lines
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            _ => pretty_json(value),
        },
        other => pretty_json(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state(values: Value) -> ThreadState {
        ThreadState {
            values: Some(values),
        }
    }

    fn ticket(action: SyncAction) -> FetchTicket {
        match action {
            SyncAction::Fetch(ticket) => ticket,
            other => panic!("expected fetch, got {other:?}"),
        }
    }

    #[test]
    fn missing_thread_or_token_clears_without_fetch() {
        let mut sync = ThreadStateSync::default();
        sync.todos.push(json!({ "content": "old" }));
        sync.files.insert("a.txt".to_string(), "x".to_string());
        sync.loading = true;

        assert_eq!(sync.observe(None, Some("tok")), SyncAction::Cleared);
        assert!(sync.todos.is_empty());
        assert!(sync.files.is_empty());
        assert!(!sync.loading);

        assert_eq!(sync.observe(Some("t1"), None), SyncAction::Cleared);
    }

    #[test]
    fn unchanged_key_does_not_refetch() {
        let mut sync = ThreadStateSync::default();
        let first = ticket(sync.observe(Some("t1"), Some("tok")));
        assert_eq!(first.thread_id, "t1");
        assert!(sync.loading);
        assert_eq!(sync.observe(Some("t1"), Some("tok")), SyncAction::Unchanged);
    }

    #[test]
    fn token_change_triggers_fetch() {
        let mut sync = ThreadStateSync::default();
        let first = ticket(sync.observe(Some("t1"), Some("tok")));
        let second = ticket(sync.observe(Some("t1"), Some("other")));
        assert!(second.generation > first.generation);
        assert!(!sync.is_current(&first));
    }

    #[test]
    fn success_replaces_state_wholesale() {
        let mut sync = ThreadStateSync::default();
        sync.files.insert("stale.txt".to_string(), "old".to_string());
        let t = ticket(sync.observe(Some("t1"), Some("tok")));

        let outcome = sync.apply(
            &t,
            Ok(state(json!({
                "todos": [{ "content": "write tests", "status": "in_progress" }],
                "files": { "notes.md": "# notes" }
            }))),
        );

        assert_eq!(outcome, SyncOutcome::Applied);
        assert_eq!(sync.todos.len(), 1);
        assert_eq!(sync.files.len(), 1);
        assert_eq!(sync.files.get("notes.md").map(String::as_str), Some("# notes"));
        assert!(!sync.loading);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let mut sync = ThreadStateSync::default();
        sync.todos.push(json!("old"));
        let t = ticket(sync.observe(Some("t1"), Some("tok")));
        sync.apply(&t, Ok(state(json!({ "messages": [] }))));
        assert!(sync.todos.is_empty());
        assert!(sync.files.is_empty());
    }

    #[test]
    fn response_without_values_keeps_state() {
        let mut sync = ThreadStateSync::default();
        sync.todos.push(json!("kept"));
        let t = ticket(sync.observe(Some("t1"), Some("tok")));
        let outcome = sync.apply(&t, Ok(ThreadState::default()));
        assert_eq!(outcome, SyncOutcome::Applied);
        assert_eq!(sync.todos, vec![json!("kept")]);
        assert!(!sync.loading);
    }

    #[test]
    fn failure_resets_to_empty_and_stops_loading() {
        let mut sync = ThreadStateSync::default();
        let t1 = ticket(sync.observe(Some("t1"), Some("tok")));
        sync.apply(
            &t1,
            Ok(state(json!({ "todos": ["a"], "files": { "f": "x" } }))),
        );

        let t2 = ticket(sync.refresh());
        let outcome = sync.apply(&t2, Err("connection refused".to_string()));

        assert_eq!(outcome, SyncOutcome::Failed);
        assert!(sync.todos.is_empty());
        assert!(sync.files.is_empty());
        assert!(!sync.loading);
    }

    #[test]
    fn stale_response_does_not_clobber_newer_thread() {
        let mut sync = ThreadStateSync::default();
        let t1 = ticket(sync.observe(Some("t1"), Some("tok")));
        let t2 = ticket(sync.observe(Some("t2"), Some("tok")));

        let outcome = sync.apply(&t2, Ok(state(json!({ "todos": ["from t2"] }))));
        assert_eq!(outcome, SyncOutcome::Applied);

        let outcome = sync.apply(&t1, Ok(state(json!({ "todos": ["from t1"] }))));
        assert_eq!(outcome, SyncOutcome::Stale);
        assert_eq!(sync.todos, vec![json!("from t2")]);
    }

    #[test]
    fn stale_response_leaves_loading_flag_for_pending_fetch() {
        let mut sync = ThreadStateSync::default();
        let t1 = ticket(sync.observe(Some("t1"), Some("tok")));
        let _t2 = ticket(sync.observe(Some("t2"), Some("tok")));

        assert_eq!(sync.apply(&t1, Err("late".to_string())), SyncOutcome::Stale);
        assert!(sync.loading);
    }

    #[test]
    fn clearing_invalidates_in_flight_fetch() {
        let mut sync = ThreadStateSync::default();
        let t1 = ticket(sync.observe(Some("t1"), Some("tok")));
        assert_eq!(sync.observe(None, Some("tok")), SyncAction::Cleared);
        assert_eq!(
            sync.apply(&t1, Ok(state(json!({ "todos": ["late"] })))),
            SyncOutcome::Stale
        );
        assert!(sync.todos.is_empty());
    }

    #[test]
    fn structured_files_are_flattened() {
        assert_eq!(file_content(&json!({ "content": ["a", "b"] })), "a\nb");
        assert_eq!(file_content(&json!({ "content": "plain" })), "plain");
        assert_eq!(file_content(&json!(42)), "42");
    }
}
