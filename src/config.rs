use std::path::PathBuf;

const DEFAULT_DEPLOYMENT_NAME: &str = "Deep Agent";
const DEFAULT_DEPLOYMENT_URL: &str = "http://127.0.0.1:2024";

/// Where the agent graph server lives and which assistant to prefer on start-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Deployment {
    pub(crate) name: String,
    pub(crate) deployment_url: String,
    pub(crate) default_agent_id: Option<String>,
}

impl Deployment {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let deployment_url = non_empty(lookup("DEEPAGENT_DEPLOYMENT_URL"))
            .unwrap_or_else(|| DEFAULT_DEPLOYMENT_URL.to_string());
        Self {
            name: DEFAULT_DEPLOYMENT_NAME.to_string(),
            deployment_url,
            default_agent_id: non_empty(lookup("DEEPAGENT_AGENT_ID")),
        }
    }
}

/// Current credential. A missing token disables every remote call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Session {
    pub(crate) access_token: Option<String>,
}

impl Session {
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let access_token = non_empty(lookup("DEEPAGENT_ACCESS_TOKEN"))
            .or_else(|| non_empty(lookup("LANGSMITH_API_KEY")));
        Self { access_token }
    }

    pub(crate) fn with_token(token: impl Into<String>) -> Self {
        Self {
            access_token: non_empty(Some(token.into())),
        }
    }

    pub(crate) fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }
}

pub(crate) fn theme_name_from_env() -> Option<String> {
    non_empty(std::env::var("DEEPAGENT_THEME").ok())
}

pub(crate) fn log_file_path() -> PathBuf {
    if let Some(path) = non_empty(std::env::var("DEEPAGENT_LOG_FILE").ok()) {
        return PathBuf::from(path);
    }
    if let Some(home) = std::env::var_os("HOME") {
        PathBuf::from(home).join(".deepagent").join("tui.log")
    } else {
        PathBuf::from(".deepagent").join("tui.log")
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
