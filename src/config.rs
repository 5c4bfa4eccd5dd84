// ABOUTME: Plugin configuration loaded from the host's JSON config file.
// ABOUTME: Carries background task concurrency overrides and per-agent model overrides.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::coordinator::ConcurrencyConfig;
use crate::error::ConfigError;

/// File name looked up by [`Config::discover`].
pub const CONFIG_FILE: &str = "undertow.json";

/// Per-agent overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentOverride {
    /// Replaces the persona's default model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Top-level plugin configuration.
///
/// Every section is optional and unknown keys are ignored, so a config
/// written for a newer host still loads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Concurrency limits for background agent invocations.
    pub background_task: ConcurrencyConfig,

    /// Overrides keyed by persona name.
    pub agents: HashMap<String, AgentOverride>,

    /// Host hooks the user has switched off.
    pub disabled_hooks: Vec<String>,
}

impl Config {
    /// Parse a config from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Load [`CONFIG_FILE`] from `dir`, or the default config if it is absent.
    pub fn discover(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(CONFIG_FILE);
        match Self::load(&path) {
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(
                    target: "undertow::config",
                    path = %path.display(),
                    "no config file, using defaults"
                );
                Ok(Self::default())
            }
            result => result,
        }
    }

    /// Whether a host hook has been disabled.
    pub fn is_hook_disabled(&self, hook: &str) -> bool {
        self.disabled_hooks.iter().any(|h| h == hook)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{ConcurrencyLimit, ResourceKey};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_json(
            r#"{
                "$schema": "https://example.invalid/schema.json",
                "disabledHooks": ["comment-checker"],
                "agents": { "Kraken": { "model": "openai/gpt-5.2" } },
                "backgroundTask": {
                    "modelConcurrency": { "openai/gpt-5.2": 2 },
                    "providerConcurrency": { "google": 0 }
                }
            }"#,
        )
        .unwrap();

        assert!(config.is_hook_disabled("comment-checker"));
        assert!(!config.is_hook_disabled("rules-injector"));
        assert_eq!(
            config.agents["Kraken"].model.as_deref(),
            Some("openai/gpt-5.2")
        );
        assert_eq!(
            config
                .background_task
                .resolve(&ResourceKey::new("openai/gpt-5.2")),
            ConcurrencyLimit::Bounded(2)
        );
        assert!(
            config
                .background_task
                .resolve(&ResourceKey::new("google/gemini-3-pro-preview"))
                .is_unbounded()
        );
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = Config::from_json("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.json"));
    }

    #[test]
    fn test_discover() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::discover(dir.path()).unwrap(), Config::default());

        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "backgroundTask": { "defaultConcurrency": 1 } }"#,
        )
        .unwrap();
        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.background_task.default_concurrency, Some(1));
    }

    #[test]
    fn test_discover_unreadable_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(CONFIG_FILE)).unwrap();

        let err = Config::discover(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
