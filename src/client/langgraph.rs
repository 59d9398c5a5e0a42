use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde_json::{json, Value};

use super::{AgentClient, ThreadState};

const CONNECT_TIMEOUT_SECS: u64 = 5;
const REQUEST_TIMEOUT_SECS: u64 = 30;
// Runs block until the graph finishes; agents with many tool steps take a while.
const RUN_TIMEOUT_SECS: u64 = 900;

/// Blocking client for the LangGraph-compatible HTTP API.
pub(crate) struct LangGraphClient {
    http: Client,
    base_url: String,
    access_token: String,
}

impl LangGraphClient {
    pub(crate) fn new(base_url: &str, access_token: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.access_token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.access_token)
        }
    }

    fn send_json(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let response = self
            .authorized(request)
            .send()
            .with_context(|| format!("{what}: request failed"))?
            .error_for_status()
            .with_context(|| format!("{what}: server rejected request"))?;
        response
            .json::<Value>()
            .with_context(|| format!("{what}: decode response"))
    }
}

impl AgentClient for LangGraphClient {
    fn search_assistants(&self, limit: usize) -> Result<Value> {
        let request = self
            .http
            .post(self.url("/assistants/search"))
            .json(&json!({ "limit": limit }));
        self.send_json(request, "search assistants")
    }

    fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState> {
        let request = self
            .http
            .get(self.url(&thread_path(thread_id, "state")?));
        let value = self.send_json(request, "get thread state")?;
        serde_json::from_value(value).context("get thread state: unexpected shape")
    }

    fn create_thread(&self) -> Result<String> {
        let request = self.http.post(self.url("/threads")).json(&json!({}));
        let value = self.send_json(request, "create thread")?;
        thread_id_from_response(&value)
    }

    fn run_wait(&self, thread_id: &str, assistant_id: &str, message: &str) -> Result<()> {
        let request = self
            .http
            .post(self.url(&thread_path(thread_id, "runs/wait")?))
            .timeout(Duration::from_secs(RUN_TIMEOUT_SECS))
            .json(&run_payload(assistant_id, message));
        self.send_json(request, "run thread").map(|_| ())
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Thread ids go into the URL path as-is, so only unreserved characters pass.
fn thread_path(thread_id: &str, suffix: &str) -> Result<String> {
    let valid = !thread_id.is_empty()
        && thread_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.' | '~'));
    if !valid || thread_id == "." || thread_id == ".." {
        bail!("invalid thread id {thread_id:?}");
    }
    Ok(format!("/threads/{thread_id}/{suffix}"))
}

fn run_payload(assistant_id: &str, message: &str) -> Value {
    json!({
        "assistant_id": assistant_id,
        "input": {
            "messages": [{ "role": "user", "content": message }]
        }
    })
}

fn thread_id_from_response(value: &Value) -> Result<String> {
    value
        .get("thread_id")
        .or_else(|| value.get("id"))
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("create thread: response has no thread_id"))
}
