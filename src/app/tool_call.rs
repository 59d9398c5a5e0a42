use std::sync::Arc;

use serde_json::{Map, Value};

use super::tool_meta::{self, ToolMeta};

pub(crate) const UNKNOWN_TOOL_NAME: &str = "Unknown Tool";
pub(crate) const PREVIEW_MAX_CHARS: usize = 50;

/// Tool arguments and results arrive either as JSON-encoded text or as an
/// already structured value.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ToolPayload {
    Text(String),
    Structured(Value),
}

impl ToolPayload {
    /// Single-line friendly form: text verbatim, structured values as compact JSON.
    pub(crate) fn to_compact_string(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Structured(value) => value.to_string(),
        }
    }

    pub(crate) fn to_display_string(&self) -> String {
        match self {
            ToolPayload::Text(text) => text.clone(),
            ToolPayload::Structured(value) => pretty_json(value),
        }
    }

    fn is_truthy(&self) -> bool {
        match self {
            ToolPayload::Text(text) => !text.is_empty(),
            ToolPayload::Structured(value) => is_truthy(value),
        }
    }
}

/// One recorded tool invocation, as received.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ToolCall {
    pub(crate) id: Option<String>,
    pub(crate) name: Option<String>,
    pub(crate) args: Option<ToolPayload>,
    pub(crate) result: Option<ToolPayload>,
    pub(crate) status: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum ToolStatus {
    Completed,
    Error,
    Pending,
    Other(String),
}

impl ToolStatus {
    pub(crate) fn parse(raw: Option<&str>) -> Self {
        match raw.unwrap_or_default() {
            "" | "completed" => ToolStatus::Completed,
            "error" => ToolStatus::Error,
            "pending" => ToolStatus::Pending,
            other => ToolStatus::Other(other.to_string()),
        }
    }

    pub(crate) fn as_str(&self) -> &str {
        match self {
            ToolStatus::Completed => "completed",
            ToolStatus::Error => "error",
            ToolStatus::Pending => "pending",
            ToolStatus::Other(raw) => raw.as_str(),
        }
    }

    pub(crate) fn glyph(&self) -> StatusGlyph {
        match self {
            ToolStatus::Completed => StatusGlyph::Success,
            ToolStatus::Error => StatusGlyph::Alert,
            ToolStatus::Pending => StatusGlyph::InProgress,
            ToolStatus::Other(_) => StatusGlyph::Generic,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum StatusGlyph {
    Success,
    Alert,
    InProgress,
    Generic,
}

impl StatusGlyph {
    pub(crate) fn symbol(self) -> &'static str {
        match self {
            StatusGlyph::Success => "\u{2714}",
            StatusGlyph::Alert => "\u{2716}",
            StatusGlyph::InProgress => "\u{25cc}",
            StatusGlyph::Generic => "\u{25aa}",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DetailSection {
    pub(crate) title: &'static str,
    pub(crate) body: String,
}

/// Render-ready form of a [`ToolCall`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ToolCallView {
    pub(crate) name: String,
    pub(crate) args: Map<String, Value>,
    pub(crate) result: Option<ToolPayload>,
    pub(crate) status: ToolStatus,
    pub(crate) meta: ToolMeta,
    pub(crate) preview: String,
}

impl ToolCallView {
    pub(crate) fn derive(call: &ToolCall) -> Self {
        let name = call
            .name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN_TOOL_NAME)
            .to_string();
        let args = normalize_args(call.args.as_ref());
        let result = call.result.clone().filter(ToolPayload::is_truthy);
        let status = ToolStatus::parse(call.status.as_deref());
        let meta = tool_meta::resolve(&name);
        let preview = preview_text(result.as_ref(), &args);
        Self {
            name,
            args,
            result,
            status,
            meta,
            preview,
        }
    }

    pub(crate) fn has_content(&self) -> bool {
        self.result.is_some() || !self.args.is_empty()
    }

    pub(crate) fn sections(&self) -> Vec<DetailSection> {
        let mut sections = Vec::new();
        if !self.args.is_empty() {
            sections.push(DetailSection {
                title: "Arguments",
                body: pretty_json(&Value::Object(self.args.clone())),
            });
        }
        if let Some(result) = &self.result {
            sections.push(DetailSection {
                title: "Result",
                body: result.to_display_string(),
            });
        }
        sections
    }
}

/// A tool call row: the derived view plus its expand/collapse state.
///
/// The view is recomputed only when a different `Arc<ToolCall>` is synced in.
#[derive(Clone, Debug)]
pub(crate) struct ToolCallBox {
    source: Arc<ToolCall>,
    view: ToolCallView,
    expanded: bool,
}

impl ToolCallBox {
    pub(crate) fn new(call: Arc<ToolCall>) -> Self {
        let view = ToolCallView::derive(&call);
        Self {
            source: call,
            view,
            expanded: false,
        }
    }

    /// Returns true when the view had to be recomputed.
    pub(crate) fn sync(&mut self, call: &Arc<ToolCall>) -> bool {
        if Arc::ptr_eq(&self.source, call) {
            return false;
        }
        self.source = Arc::clone(call);
        self.view = ToolCallView::derive(call);
        true
    }

    pub(crate) fn toggle(&mut self) -> bool {
        if !self.view.has_content() {
            return false;
        }
        self.expanded = !self.expanded;
        true
    }

    pub(crate) fn is_expanded(&self) -> bool {
        self.expanded && self.view.has_content()
    }

    pub(crate) fn view(&self) -> &ToolCallView {
        &self.view
    }

    /// Detail blocks shown under the header; empty while collapsed.
    pub(crate) fn visible_sections(&self) -> Vec<DetailSection> {
        if self.is_expanded() {
            self.view.sections()
        } else {
            Vec::new()
        }
    }
}

fn normalize_args(args: Option<&ToolPayload>) -> Map<String, Value> {
    match args {
        None => Map::new(),
        Some(payload) if !payload.is_truthy() => Map::new(),
        Some(ToolPayload::Text(raw)) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => raw_wrapper(Value::String(raw.clone())),
        },
        Some(ToolPayload::Structured(Value::Object(map))) => map.clone(),
        Some(ToolPayload::Structured(other)) => raw_wrapper(other.clone()),
    }
}

fn raw_wrapper(raw: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("raw".to_string(), raw);
    map
}

fn preview_text(result: Option<&ToolPayload>, args: &Map<String, Value>) -> String {
    if let Some(result) = result {
        let text = result.to_compact_string();
        let first_line = text.split('\n').next().unwrap_or_default();
        return take_chars(first_line, PREVIEW_MAX_CHARS);
    }
    if let Some((key, value)) = args.iter().next() {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return take_chars(&format!("{key}: {value}"), PREVIEW_MAX_CHARS);
    }
    String::new()
}

fn take_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

pub(crate) fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
