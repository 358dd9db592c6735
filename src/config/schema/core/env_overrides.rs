use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("CAMEL_BACKEND")
            && !backend.is_empty()
        {
            self.default_backend = Some(backend);
        }

        if let Ok(workspace) = std::env::var("CAMEL_WORKSPACE")
            && !workspace.is_empty()
        {
            self.workspace = Some(workspace);
        }

        if let Ok(budget) = std::env::var("CAMEL_TURN_BUDGET")
            && let Ok(budget) = budget.parse::<u32>()
            && budget > 0
        {
            self.agent.turn_budget = budget;
        }

        let model = std::env::var("CAMEL_MODEL").ok().filter(|m| !m.is_empty());
        let endpoint = std::env::var("CAMEL_ENDPOINT")
            .ok()
            .filter(|e| !e.is_empty());
        if model.is_none() && endpoint.is_none() {
            return;
        }

        let target = self.initial_backend().map(|b| b.name.clone());
        if let Some(target) = target
            && let Some(profile) = self.backends.iter_mut().find(|b| b.name == target)
        {
            if let Some(model) = model {
                profile.model = model;
            }
            if let Some(endpoint) = endpoint {
                profile.endpoint = endpoint;
            }
        }
    }
}
