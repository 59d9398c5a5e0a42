use std::collections::HashMap;

use serde_json::Value;

pub(crate) const ASSISTANT_SEARCH_LIMIT: usize = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Assistant {
    pub(crate) id: String,
    pub(crate) name: String,
}

impl Assistant {
    /// `id` comes from `assistant_id`, then `id`; `name` falls back to the id.
    pub(crate) fn from_value(raw: &Value) -> Option<Self> {
        let field = |key: &str| {
            raw.get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        let id = field("assistant_id").or_else(|| field("id"))?;
        let name = field("name").unwrap_or_else(|| id.clone());
        Some(Self { id, name })
    }
}

pub(crate) fn parse_assistant_list(raw: &Value) -> Vec<Assistant> {
    raw.as_array()
        .map(|items| items.iter().filter_map(Assistant::from_value).collect())
        .unwrap_or_default()
}

/// Finds an assistant whose id, then whose name, equals `query` ignoring case.
pub(crate) fn find_assistant<'a>(assistants: &'a [Assistant], query: &str) -> Option<&'a Assistant> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    assistants
        .iter()
        .find(|a| a.id.to_lowercase() == query)
        .or_else(|| assistants.iter().find(|a| a.name.to_lowercase() == query))
}

/// Default choice: id match, then name match, then the first listed assistant.
pub(crate) fn select_default<'a>(
    assistants: &'a [Assistant],
    desired: Option<&str>,
) -> Option<&'a Assistant> {
    desired
        .and_then(|desired| find_assistant(assistants, desired))
        .or_else(|| assistants.first())
}

/// Assistant list plus the current selection, refreshed once per session.
#[derive(Debug, Default)]
pub(crate) struct AssistantDirectory {
    generation: u64,
    pub(crate) assistants: Vec<Assistant>,
    pub(crate) selected: Option<String>,
}

impl AssistantDirectory {
    /// Starts a list fetch for a new session; `None` when there is no token.
    pub(crate) fn begin(&mut self, access_token: Option<&str>) -> Option<u64> {
        self.generation = self.generation.wrapping_add(1);
        access_token?;
        Some(self.generation)
    }

    /// Applies a fetched list. Returns false for superseded responses.
    pub(crate) fn apply(&mut self, generation: u64, assistants: Vec<Assistant>, desired: Option<&str>) -> bool {
        if generation != self.generation {
            return false;
        }
        if let Some(default) = select_default(&assistants, desired) {
            self.selected = Some(default.id.clone());
        }
        self.assistants = assistants;
        true
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub(crate) fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    pub(crate) fn selected_assistant(&self) -> Option<&Assistant> {
        let selected = self.selected.as_deref()?;
        self.assistants.iter().find(|a| a.id == selected)
    }

    /// Display label for the selection, even when it is not in the list.
    pub(crate) fn selected_label(&self) -> Option<&str> {
        self.selected_assistant()
            .map(|a| a.name.as_str())
            .or(self.selected.as_deref())
    }

    pub(crate) fn next_after_selected(&self) -> Option<&Assistant> {
        if self.assistants.is_empty() {
            return None;
        }
        let current = self
            .selected
            .as_deref()
            .and_then(|id| self.assistants.iter().position(|a| a.id == id));
        let next = match current {
            Some(idx) => (idx + 1) % self.assistants.len(),
            None => 0,
        };
        self.assistants.get(next)
    }
}

/// Last thread id per assistant. Writing one assistant's entry never
/// touches another's.
#[derive(Debug, Default)]
pub(crate) struct ThreadIdStore {
    by_assistant: HashMap<String, Option<String>>,
}

impl ThreadIdStore {
    pub(crate) fn get(&self, assistant_id: &str) -> Option<&str> {
        self.by_assistant
            .get(assistant_id)
            .and_then(|thread| thread.as_deref())
    }

    pub(crate) fn set(&mut self, assistant_id: &str, thread_id: Option<String>) {
        self.by_assistant.insert(assistant_id.to_string(), thread_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn assistant(id: &str, name: &str) -> Assistant {
        Assistant {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_assistant_id_then_id_then_name_fallback() {
        let list = parse_assistant_list(&json!([
            { "assistant_id": "a1", "id": "ignored", "name": "Research" },
            { "id": "a2" },
            { "assistant_id": "", "id": "a3", "name": "" },
            { "name": "no id" },
            "garbage"
        ]));
        assert_eq!(
            list,
            vec![
                assistant("a1", "Research"),
                assistant("a2", "a2"),
                assistant("a3", "a3"),
            ]
        );
    }

    #[test]
    fn non_list_response_yields_no_assistants() {
        assert!(parse_assistant_list(&json!({ "items": [] })).is_empty());
    }

    #[test]
    fn id_match_wins_over_name_match() {
        let list = vec![assistant("helper", "Other"), assistant("x2", "HELPER")];
        assert_eq!(select_default(&list, Some("Helper")).map(|a| a.id.as_str()), Some("helper"));
    }

    #[test]
    fn name_match_used_when_no_id_matches() {
        let list = vec![assistant("x1", "Helper")];
        assert_eq!(select_default(&list, Some("HELPER")).map(|a| a.id.as_str()), Some("x1"));
    }

    #[test]
    fn falls_back_to_first_listed() {
        let list = vec![assistant("b", "Beta"), assistant("a", "Alpha")];
        assert_eq!(select_default(&list, Some("missing")).map(|a| a.id.as_str()), Some("b"));
        assert_eq!(select_default(&list, None).map(|a| a.id.as_str()), Some("b"));
        assert_eq!(select_default(&list, Some("  ")).map(|a| a.id.as_str()), Some("b"));
    }

    #[test]
    fn empty_list_selects_nothing() {
        assert_eq!(select_default(&[], Some("any")), None);

        let mut directory = AssistantDirectory::default();
        let generation = directory.begin(Some("tok")).expect("generation");
        assert!(directory.apply(generation, Vec::new(), Some("any")));
        assert_eq!(directory.selected, None);
        assert_eq!(directory.selected_label(), None);
    }

    #[test]
    fn begin_without_token_skips_fetch() {
        let mut directory = AssistantDirectory::default();
        assert_eq!(directory.begin(None), None);
    }

    #[test]
    fn superseded_list_is_discarded() {
        let mut directory = AssistantDirectory::default();
        let first = directory.begin(Some("old")).expect("first");
        let second = directory.begin(Some("new")).expect("second");

        assert!(!directory.apply(first, vec![assistant("stale", "Stale")], None));
        assert!(directory.assistants.is_empty());

        assert!(directory.apply(second, vec![assistant("fresh", "Fresh")], None));
        assert_eq!(directory.selected.as_deref(), Some("fresh"));
    }

    #[test]
    fn next_after_selected_wraps() {
        let mut directory = AssistantDirectory::default();
        let generation = directory.begin(Some("tok")).expect("generation");
        directory.apply(generation, vec![assistant("a", "A"), assistant("b", "B")], None);
        assert_eq!(directory.next_after_selected().map(|a| a.id.as_str()), Some("b"));
        directory.select("b");
        assert_eq!(directory.next_after_selected().map(|a| a.id.as_str()), Some("a"));
    }

    #[test]
    fn thread_ids_are_isolated_per_assistant() {
        let mut store = ThreadIdStore::default();
        store.set("A", Some("thread-a".to_string()));
        store.set("B", Some("thread-b".to_string()));
        store.set("B", None);

        assert_eq!(store.get("A"), Some("thread-a"));
        assert_eq!(store.get("B"), None);
        assert_eq!(store.get("C"), None);
    }
}
