use super::super::{BackendConfig, Config};
use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load `~/.camel/config.toml` (or `explicit`), writing defaults on first run.
    pub fn load_or_init(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let home = UserDirs::new()
                    .map(|u| u.home_dir().to_path_buf())
                    .context("Could not find home directory")?;
                home.join(".camel").join("config.toml")
            }
        };
        let camel_dir = config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        if !camel_dir.exists() {
            fs::create_dir_all(&camel_dir).with_context(|| {
                format!("Failed to create config directory {}", camel_dir.display())
            })?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(&config_path).context("Failed to read config file")?;
            toml::from_str::<Config>(&contents)
                .map_err(|e| ConfigError::Load(format!("{}: {e}", config_path.display())))?
        } else {
            let config = Self {
                config_path: config_path.clone(),
                ..Self::default()
            };
            config.save()?;
            tracing::info!(path = %config_path.display(), "wrote default config");
            config
        };

        config.config_path = config_path;
        config.camel_dir = camel_dir;
        config.apply_env_overrides();
        config.workspace_dir = config.resolve_workspace()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }

    /// Startup validation. Any message here is fatal before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = BackendConfig::validate_all(&self.backends);
        errors.extend(self.guardian.validate());

        if let Some(name) = &self.default_backend
            && !self.backends.iter().any(|b| &b.name == name)
        {
            errors.push(format!("default_backend '{name}' is not a configured backend"));
        }
        if self.coordinator.max_parallel == 0 {
            errors.push("coordinator.max_parallel must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors.join("; ")))
        }
    }

    /// Profile activated at startup: `default_backend`, then the profile
    /// flagged `is_default`, then the first one.
    pub fn initial_backend(&self) -> Option<&BackendConfig> {
        self.default_backend
            .as_deref()
            .and_then(|name| self.backends.iter().find(|b| b.name == name))
            .or_else(|| self.backends.iter().find(|b| b.is_default))
            .or_else(|| self.backends.first())
    }

    fn resolve_workspace(&self) -> Result<PathBuf> {
        let cwd = std::env::current_dir().context("Could not determine current directory")?;
        Ok(match &self.workspace {
            Some(raw) => {
                let expanded = PathBuf::from(shellexpand::tilde(raw).into_owned());
                if expanded.is_absolute() {
                    expanded
                } else {
                    cwd.join(expanded)
                }
            }
            None => cwd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendApi;
    use tempfile::TempDir;

    #[test]
    fn first_run_writes_defaults() {
        let _lock = super::super::test_env::lock_env();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");

        let config = Config::load_or_init(Some(&path)).unwrap();

        assert!(path.exists());
        assert_eq!(config.camel_dir, tmp.path().join("nested"));
        assert_eq!(config.initial_backend().unwrap().name, "local");
    }

    #[test]
    fn existing_file_is_parsed() {
        let _lock = super::super::test_env::lock_env();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
default_backend = "remote"

[agent]
turn_budget = 4

[[backends]]
name = "local"
endpoint = "http://127.0.0.1:11434"

[[backends]]
name = "remote"
endpoint = "https://llm.example.com"
model = "qwen3"
api = "openai"
"#,
        )
        .unwrap();

        let config = Config::load_or_init(Some(&path)).unwrap();

        assert_eq!(config.agent.turn_budget, 4);
        let active = config.initial_backend().unwrap();
        assert_eq!(active.name, "remote");
        assert_eq!(active.api, BackendApi::OpenAi);
    }

    #[test]
    fn unknown_default_backend_fails_validation() {
        let config = Config {
            default_backend: Some("ghost".into()),
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn empty_backend_list_is_fatal() {
        let _lock = super::super::test_env::lock_env();
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "backends = []\n").unwrap();

        let err = Config::load_or_init(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("at least one"));
    }

    #[test]
    fn initial_backend_prefers_is_default_flag() {
        let mut config = Config::default();
        let mut second = config.backends[0].clone();
        second.name = "second".into();
        config.backends[0].is_default = false;
        second.is_default = true;
        config.backends.push(second);
        assert_eq!(config.initial_backend().unwrap().name, "second");
    }
}
