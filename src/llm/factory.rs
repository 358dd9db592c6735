use super::compatible::OpenAiCompatibleBackend;
use super::ollama::OllamaBackend;
use super::traits::Backend;
use super::transport::StreamLimits;
use crate::config::{AgentConfig, BackendApi, BackendConfig};
use std::sync::Arc;

/// Builds a connector for a profile. Swappable so tests can script backends.
pub type BackendFactory = Arc<dyn Fn(&BackendConfig, StreamLimits) -> Arc<dyn Backend> + Send + Sync>;

/// Resolve the bearer token for a profile.
///
/// Resolution order:
/// 1. The variable named by the profile's `api_key_env`
/// 2. `CAMEL_API_KEY`
pub fn resolve_api_key(profile: &BackendConfig) -> Option<String> {
    let candidates = profile
        .api_key_env
        .as_deref()
        .into_iter()
        .chain(std::iter::once("CAMEL_API_KEY"));

    for env_var in candidates {
        if let Ok(value) = std::env::var(env_var) {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

pub fn stream_limits(agent: &AgentConfig) -> StreamLimits {
    StreamLimits {
        total: agent.stream_timeout(),
        idle: agent.idle_timeout(),
    }
}

/// Create the connector matching the profile's wire dialect.
pub fn create_backend(profile: &BackendConfig, limits: StreamLimits) -> Arc<dyn Backend> {
    let api_key = resolve_api_key(profile);
    match profile.api {
        BackendApi::Ollama => Arc::new(OllamaBackend::new(
            profile.name.clone(),
            &profile.endpoint,
            api_key,
            limits,
        )),
        BackendApi::OpenAi => Arc::new(OpenAiCompatibleBackend::new(
            profile.name.clone(),
            &profile.endpoint,
            api_key,
            limits,
        )),
    }
}

pub fn default_factory() -> BackendFactory {
    Arc::new(create_backend)
}
