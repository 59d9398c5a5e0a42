use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::config::{Deployment, Session};

pub(crate) mod langgraph;

/// Raw thread snapshot as returned by the server. `values` is left loosely
/// typed and projected by `app::thread_state`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub(crate) struct ThreadState {
    #[serde(default)]
    pub(crate) values: Option<Value>,
}

/// Request/response boundary to the agent graph server. Transport, auth
/// headers and timeouts belong to the implementation.
pub(crate) trait AgentClient: Send + Sync {
    fn search_assistants(&self, limit: usize) -> Result<Value>;
    fn get_thread_state(&self, thread_id: &str) -> Result<ThreadState>;
    fn create_thread(&self) -> Result<String>;
    fn run_wait(&self, thread_id: &str, assistant_id: &str, message: &str) -> Result<()>;
}

/// Builds a client for the given session; called again whenever the session changes.
pub(crate) type ClientFactory =
    Box<dyn Fn(&Deployment, &Session) -> Result<Arc<dyn AgentClient>> + Send>;

pub(crate) fn langgraph_factory() -> ClientFactory {
    Box::new(|deployment, session| {
        let client = langgraph::LangGraphClient::new(
            &deployment.deployment_url,
            session.token().unwrap_or_default(),
        )?;
        Ok(Arc::new(client) as Arc<dyn AgentClient>)
    })
}
