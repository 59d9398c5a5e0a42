use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use super::tool_call::{ToolCall, ToolPayload};
use super::tool_key;

const TASK_TOOL_NAME: &str = "task";
const DEFAULT_SUBAGENT_NAME: &str = "general-purpose";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ChatRole {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ChatMessage {
    pub(crate) id: String,
    pub(crate) role: ChatRole,
    pub(crate) text: String,
    pub(crate) tool_calls: Vec<Arc<ToolCall>>,
}

/// A delegated `task` tool call, shown in the sub-agent panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SubAgent {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) input: String,
    pub(crate) output: String,
    pub(crate) status: String,
}

/// Projects `values.messages` into chat messages. Tool messages are folded
/// into the tool call they answer instead of being shown on their own.
pub(crate) fn project_messages(raw: Option<&Value>) -> Vec<ChatMessage> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut messages: Vec<(ChatMessage, Vec<ToolCall>)> = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let kind = item
            .get("type")
            .or_else(|| item.get("role"))
            .and_then(Value::as_str)
            .unwrap_or_default();
        if kind == "tool" {
            attach_tool_result(&mut messages, item);
            continue;
        }
        let role = match kind {
            "human" | "user" => ChatRole::User,
            "ai" | "assistant" => ChatRole::Assistant,
            _ => ChatRole::System,
        };
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("msg-{idx}"));
        let calls = if role == ChatRole::Assistant {
            pending_tool_calls(item)
        } else {
            Vec::new()
        };
        messages.push((
            ChatMessage {
                id,
                role,
                text: content_text(item.get("content")),
                tool_calls: Vec::new(),
            },
            calls,
        ));
    }

    messages
        .into_iter()
        .map(|(mut message, calls)| {
            message.tool_calls = calls.into_iter().map(Arc::new).collect();
            message
        })
        .collect()
}

/// Keeps the previous `Arc` for every tool call whose record is unchanged,
/// so its row is not re-derived after a refetch.
pub(crate) fn reuse_unchanged_calls(
    previous: &[ChatMessage],
    mut next: Vec<ChatMessage>,
) -> Vec<ChatMessage> {
    let known: HashMap<String, &Arc<ToolCall>> = keyed_calls(previous).collect();
    if known.is_empty() {
        return next;
    }
    for message in &mut next {
        for (idx, call) in message.tool_calls.iter_mut().enumerate() {
            let key = tool_key(&message.id, idx, call.id.as_deref());
            if let Some(prev) = known.get(&key) {
                if **prev == *call {
                    *call = Arc::clone(prev);
                }
            }
        }
    }
    next
}

pub(crate) fn sub_agents(messages: &[ChatMessage]) -> Vec<SubAgent> {
    keyed_calls(messages)
        .filter(|(_, call)| call.name.as_deref() == Some(TASK_TOOL_NAME))
        .map(|(key, call)| sub_agent_from_call(key, call))
        .collect()
}

fn keyed_calls(messages: &[ChatMessage]) -> impl Iterator<Item = (String, &Arc<ToolCall>)> {
    messages.iter().flat_map(|message| {
        message
            .tool_calls
            .iter()
            .enumerate()
            .map(move |(idx, call)| (tool_key(&message.id, idx, call.id.as_deref()), call))
    })
}

/// `key` is the row key of the call; it doubles as the sub-agent id.
pub(crate) fn sub_agent_from_call(key: String, call: &ToolCall) -> SubAgent {
    let args = match &call.args {
        Some(ToolPayload::Structured(value)) => value.clone(),
        Some(ToolPayload::Text(raw)) => serde_json::from_str(raw).unwrap_or(Value::Null),
        None => Value::Null,
    };
    let name = args
        .get("subagent_type")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_SUBAGENT_NAME)
        .to_string();
    let input = match args.get("description") {
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    SubAgent {
        id: key,
        name,
        input,
        output: call
            .result
            .as_ref()
            .map(ToolPayload::to_display_string)
            .unwrap_or_default(),
        status: call
            .status
            .clone()
            .unwrap_or_else(|| "completed".to_string()),
    }
}

fn pending_tool_calls(item: &Value) -> Vec<ToolCall> {
    let Some(calls) = item.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    calls
        .iter()
        .map(|raw| ToolCall {
            id: raw.get("id").and_then(Value::as_str).map(str::to_string),
            name: raw.get("name").and_then(Value::as_str).map(str::to_string),
            args: raw.get("args").and_then(payload_from_value),
            result: None,
            status: Some("pending".to_string()),
        })
        .collect()
}

fn attach_tool_result(messages: &mut [(ChatMessage, Vec<ToolCall>)], item: &Value) {
    let Some(call_id) = item.get("tool_call_id").and_then(Value::as_str) else {
        return;
    };
    let target = messages
        .iter_mut()
        .rev()
        .flat_map(|(_, calls)| calls.iter_mut())
        .find(|call| call.id.as_deref() == Some(call_id));
    let Some(call) = target else {
        return;
    };
    let failed = item.get("status").and_then(Value::as_str) == Some("error");
    call.result = result_payload(item.get("content"));
    call.status = Some(if failed { "error" } else { "completed" }.to_string());
}

fn payload_from_value(value: &Value) -> Option<ToolPayload> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(ToolPayload::Text(text.clone())),
        other => Some(ToolPayload::Structured(other.clone())),
    }
}

/// Tool output stays structured unless it is text or a list of text parts.
fn result_payload(content: Option<&Value>) -> Option<ToolPayload> {
    match content {
        Some(Value::Array(parts)) if parts.iter().all(is_text_part) => {
            Some(ToolPayload::Text(content_text(content)))
        }
        Some(value) => payload_from_value(value),
        None => None,
    }
}

fn is_text_part(part: &Value) -> bool {
    part.is_string() || part.get("text").and_then(Value::as_str).is_some()
}

/// Message content is either plain text or a list of typed parts.
fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| match part {
                Value::String(text) => Some(text.as_str()),
                Value::Object(_) => part.get("text").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
