use super::factory::{BackendFactory, default_factory, stream_limits};
use super::traits::Backend;
use super::transport::StreamLimits;
use crate::config::{BackendConfig, Config};
use crate::error::BackendError;
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Configured backend profiles plus the one currently active.
///
/// The active profile sits in an [`ArcSwap`] so status lines and prompts can
/// read it without locking. Switching never touches any conversation; the
/// agent session decides *when* a switch is allowed.
pub struct BackendSwitchManager {
    profiles: Vec<BackendConfig>,
    active: ArcSwap<BackendConfig>,
    limits: StreamLimits,
    factory: BackendFactory,
    connectors: Mutex<HashMap<(String, String), Arc<dyn Backend>>>,
}

impl BackendSwitchManager {
    pub fn new(
        profiles: Vec<BackendConfig>,
        initial: &str,
        limits: StreamLimits,
    ) -> Result<Self, BackendError> {
        Self::with_factory(profiles, initial, limits, default_factory())
    }

    pub fn with_factory(
        profiles: Vec<BackendConfig>,
        initial: &str,
        limits: StreamLimits,
        factory: BackendFactory,
    ) -> Result<Self, BackendError> {
        let active = profiles
            .iter()
            .find(|p| p.name == initial)
            .cloned()
            .ok_or_else(|| BackendError::UnknownProfile(initial.to_string()))?;
        Ok(Self {
            profiles,
            active: ArcSwap::from_pointee(active),
            limits,
            factory,
            connectors: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, BackendError> {
        let initial = config
            .initial_backend()
            .ok_or_else(|| BackendError::UnknownProfile("<none configured>".to_string()))?;
        Self::new(
            config.backends.clone(),
            &initial.name,
            stream_limits(&config.agent),
        )
    }

    pub fn profiles(&self) -> &[BackendConfig] {
        &self.profiles
    }

    pub fn active(&self) -> Arc<BackendConfig> {
        self.active.load_full()
    }

    /// Make `name` the active profile, with its configured model.
    pub fn switch_to(&self, name: &str) -> Result<Arc<BackendConfig>, BackendError> {
        let profile = self
            .profiles
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| BackendError::UnknownProfile(name.to_string()))?;
        let profile = Arc::new(profile);
        self.active.store(Arc::clone(&profile));
        tracing::info!(backend = name, model = profile.model, "switched backend");
        Ok(profile)
    }

    /// Keep the active profile but talk to a different model.
    pub fn set_model(&self, model: &str) -> Arc<BackendConfig> {
        let model = model.trim();
        let current = self.active();
        if model.is_empty() || model == current.model {
            return current;
        }
        let mut next = (*current).clone();
        next.model = model.to_string();
        let next = Arc::new(next);
        self.active.store(Arc::clone(&next));
        tracing::info!(backend = next.name, model, "switched model");
        next
    }

    /// Connector for the active profile.
    pub fn connector(&self) -> Arc<dyn Backend> {
        self.connector_for(&self.active())
    }

    /// Connector for any profile, built on first use and cached.
    pub fn connector_for(&self, profile: &BackendConfig) -> Arc<dyn Backend> {
        let key = (profile.name.clone(), profile.model.clone());
        let mut connectors = self
            .connectors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            connectors
                .entry(key)
                .or_insert_with(|| (self.factory)(profile, self.limits)),
        )
    }

    /// Health-check the active profile, then the others in order, and
    /// activate the first one that answers.
    pub async fn activate_first_reachable(&self) -> Result<Arc<BackendConfig>, BackendError> {
        let active = self.active();
        let mut candidates = vec![(*active).clone()];
        candidates.extend(
            self.profiles
                .iter()
                .filter(|p| p.name != active.name)
                .cloned(),
        );

        for candidate in &candidates {
            match self.connector_for(candidate).health_check().await {
                Ok(()) => {
                    if candidate.name == active.name {
                        return Ok(active);
                    }
                    return self.switch_to(&candidate.name);
                }
                Err(error) => {
                    tracing::warn!(backend = candidate.name, "backend unreachable: {error:#}");
                }
            }
        }

        Err(BackendError::NoneReachable(
            candidates
                .iter()
                .map(|c| c.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::streaming::ChatStream;
    use crate::llm::traits::BackendFuture;
    use crate::llm::types::ChatRequest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    struct Probe {
        name: String,
        healthy: bool,
    }

    impl Backend for Probe {
        fn profile_name(&self) -> &str {
            &self.name
        }

        fn stream_chat(&self, _request: ChatRequest, _cancel: CancellationToken) -> ChatStream {
            Box::pin(futures_util::stream::empty())
        }

        fn health_check(&self) -> BackendFuture<'_, ()> {
            let healthy = self.healthy;
            Box::pin(async move {
                anyhow::ensure!(healthy, "connection refused");
                Ok(())
            })
        }

        fn list_models(&self) -> BackendFuture<'_, Vec<String>> {
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn profiles() -> Vec<BackendConfig> {
        let local = BackendConfig::default_profiles().remove(0);
        let mut remote = local.clone();
        remote.name = "remote".into();
        remote.is_default = false;
        remote.model = "qwen3".into();
        vec![local, remote]
    }

    fn manager(built: Arc<AtomicUsize>) -> BackendSwitchManager {
        BackendSwitchManager::with_factory(
            profiles(),
            "local",
            StreamLimits::default(),
            Arc::new(move |profile: &BackendConfig, _limits: StreamLimits| {
                built.fetch_add(1, Ordering::SeqCst);
                Arc::new(Probe {
                    name: profile.name.clone(),
                    healthy: profile.name == "remote",
                }) as Arc<dyn Backend>
            }),
        )
        .unwrap()
    }

    #[test]
    fn unknown_initial_profile_is_rejected() {
        let err = BackendSwitchManager::new(profiles(), "ghost", StreamLimits::default())
            .err()
            .unwrap();
        assert!(matches!(err, BackendError::UnknownProfile(name) if name == "ghost"));
    }

    #[test]
    fn switch_and_model_swap() {
        let manager = manager(Arc::new(AtomicUsize::new(0)));
        assert_eq!(manager.active().name, "local");

        let remote = manager.switch_to("remote").unwrap();
        assert_eq!(remote.model, "qwen3");

        let swapped = manager.set_model("llama3.2");
        assert_eq!(swapped.name, "remote");
        assert_eq!(manager.active().model, "llama3.2");

        assert!(matches!(
            manager.switch_to("nowhere"),
            Err(BackendError::UnknownProfile(_))
        ));
        assert_eq!(manager.active().model, "llama3.2");
    }

    #[test]
    fn connectors_are_cached_per_profile_and_model() {
        let built = Arc::new(AtomicUsize::new(0));
        let manager = manager(Arc::clone(&built));

        let first = manager.connector();
        let again = manager.connector();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(built.load(Ordering::SeqCst), 1);

        manager.set_model("other");
        manager.connector();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn first_reachable_profile_is_activated() {
        let manager = manager(Arc::new(AtomicUsize::new(0)));
        let active = manager.activate_first_reachable().await.unwrap();
        assert_eq!(active.name, "remote");
        assert_eq!(manager.active().name, "remote");
    }
}
