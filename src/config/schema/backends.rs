use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub(crate) const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:11434";
pub(crate) const DEFAULT_MODEL: &str = "gpt-oss:120b";

/// Wire dialect spoken by a backend endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendApi {
    /// Ollama `/api/chat` with newline-delimited JSON streaming.
    #[default]
    Ollama,
    /// OpenAI-compatible `/v1/chat/completions` with SSE streaming.
    #[serde(alias = "openai-compatible", alias = "compatible")]
    OpenAi,
}

/// One configured backend profile (`[[backends]]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api: BackendApi,
    #[serde(default)]
    pub is_default: bool,
    /// Send tool schemas in the request instead of relying only on the
    /// text protocol described in the system prompt.
    #[serde(default)]
    pub native_tools: bool,
    /// Environment variable holding a bearer token for this endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.into()
}

impl BackendConfig {
    pub fn default_profiles() -> Vec<Self> {
        vec![Self {
            name: "local".into(),
            endpoint: DEFAULT_ENDPOINT.into(),
            model: default_model(),
            api: BackendApi::Ollama,
            is_default: true,
            native_tools: false,
            api_key_env: None,
        }]
    }

    /// Validate a profile list, returning one message per problem.
    #[must_use]
    pub fn validate_all(profiles: &[Self]) -> Vec<String> {
        let mut errors = Vec::new();
        if profiles.is_empty() {
            errors.push("at least one [[backends]] profile is required".to_string());
        }

        let mut names: HashSet<&str> = HashSet::new();
        for profile in profiles {
            if profile.name.trim().is_empty() {
                errors.push("backend name cannot be empty".to_string());
            }
            if !names.insert(profile.name.as_str()) {
                errors.push(format!("duplicate backend name: {}", profile.name));
            }
            if profile.model.trim().is_empty() {
                errors.push(format!("backend '{}': model cannot be empty", profile.name));
            }
            match url::Url::parse(&profile.endpoint) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(format!(
                    "backend '{}': unsupported endpoint scheme '{}'",
                    profile.name,
                    url.scheme()
                )),
                Err(e) => errors.push(format!(
                    "backend '{}': invalid endpoint '{}': {e}",
                    profile.name, profile.endpoint
                )),
            }
        }

        let defaults = profiles.iter().filter(|p| p.is_default).count();
        if defaults > 1 {
            errors.push(format!(
                "only one backend may set is_default (found {defaults})"
            ));
        }
        errors
    }
}
