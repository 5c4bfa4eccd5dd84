// ABOUTME: Resource keys and concurrency configuration for admission control.
// ABOUTME: Resolves a per-key limit from model, provider, and default overrides.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Limit applied when no override matches a key.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Identifies a contention domain, conventionally `"<provider>/<model>"`.
///
/// Any string is a valid key. The provider is everything before the first
/// `/`; a key without a `/` is treated as a bare provider name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Create a key from any string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The provider segment: the text before the first `/`, or the whole key.
    pub fn provider(&self) -> &str {
        match self.0.split_once('/') {
            Some((provider, _)) => provider,
            None => &self.0,
        }
    }

    /// The model segment after the first `/`, if the key has one.
    pub fn model(&self) -> Option<&str> {
        self.0.split_once('/').map(|(_, model)| model)
    }

    /// The full key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ResourceKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ResourceKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A resolved admission limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcurrencyLimit {
    /// At most this many admissions may be outstanding.
    Bounded(usize),
    /// No cap. Configured as `0`.
    Unbounded,
}

impl ConcurrencyLimit {
    /// Map a configured value to a limit; `0` means unbounded.
    pub fn from_configured(value: usize) -> Self {
        if value == 0 {
            ConcurrencyLimit::Unbounded
        } else {
            ConcurrencyLimit::Bounded(value)
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ConcurrencyLimit::Unbounded)
    }
}

impl fmt::Display for ConcurrencyLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyLimit::Bounded(n) => write!(f, "{}", n),
            ConcurrencyLimit::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Per-model and per-provider concurrency overrides.
///
/// Deserializes from the `backgroundTask` section of the plugin config:
///
/// ```json
/// {
///   "modelConcurrency": { "openai/gpt-4": 2 },
///   "providerConcurrency": { "anthropic": 3 },
///   "defaultConcurrency": 4
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConcurrencyConfig {
    /// Exact-match overrides keyed by full resource key.
    pub model_concurrency: HashMap<String, usize>,

    /// Overrides keyed by provider prefix.
    pub provider_concurrency: HashMap<String, usize>,

    /// Fallback when neither map matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_concurrency: Option<usize>,
}

impl ConcurrencyConfig {
    /// Create an empty config. Every key resolves to [`DEFAULT_CONCURRENCY`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an exact-match limit for a full resource key.
    pub fn model(mut self, key: impl Into<String>, limit: usize) -> Self {
        self.model_concurrency.insert(key.into(), limit);
        self
    }

    /// Set a limit for every key under a provider.
    pub fn provider(mut self, provider: impl Into<String>, limit: usize) -> Self {
        self.provider_concurrency.insert(provider.into(), limit);
        self
    }

    /// Set the fallback limit.
    pub fn default_concurrency(mut self, limit: usize) -> Self {
        self.default_concurrency = Some(limit);
        self
    }

    /// Resolve the limit for a key.
    ///
    /// Precedence: exact model entry, then provider prefix, then
    /// `default_concurrency`, then [`DEFAULT_CONCURRENCY`]. A zero at any
    /// tier resolves to [`ConcurrencyLimit::Unbounded`].
    pub fn resolve(&self, key: &ResourceKey) -> ConcurrencyLimit {
        if let Some(&limit) = self.model_concurrency.get(key.as_str()) {
            return ConcurrencyLimit::from_configured(limit);
        }

        if let Some(&limit) = self.provider_concurrency.get(key.provider()) {
            return ConcurrencyLimit::from_configured(limit);
        }

        if let Some(limit) = self.default_concurrency {
            return ConcurrencyLimit::from_configured(limit);
        }

        ConcurrencyLimit::Bounded(DEFAULT_CONCURRENCY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_key_provider_and_model() {
        let key = ResourceKey::new("openai/gpt-4");
        assert_eq!(key.provider(), "openai");
        assert_eq!(key.model(), Some("gpt-4"));
    }

    #[test]
    fn test_resource_key_splits_on_first_slash_only() {
        let key = ResourceKey::new("openrouter/meta-llama/llama-3");
        assert_eq!(key.provider(), "openrouter");
        assert_eq!(key.model(), Some("meta-llama/llama-3"));
    }

    #[test]
    fn test_resource_key_without_slash_is_provider() {
        let key = ResourceKey::new("ollama");
        assert_eq!(key.provider(), "ollama");
        assert_eq!(key.model(), None);
    }

    #[test]
    fn test_resolve_precedence_across_all_tiers() {
        let config = ConcurrencyConfig::new()
            .model("anthropic/claude-opus-4-5", 1)
            .provider("anthropic", 2)
            .default_concurrency(3);

        assert_eq!(
            config.resolve(&"anthropic/claude-opus-4-5".into()),
            ConcurrencyLimit::Bounded(1)
        );
        assert_eq!(
            config.resolve(&"anthropic/claude-sonnet-4".into()),
            ConcurrencyLimit::Bounded(2)
        );
        assert_eq!(
            config.resolve(&"openai/gpt-5.2".into()),
            ConcurrencyLimit::Bounded(3)
        );
        assert_eq!(
            ConcurrencyConfig::new().resolve(&"openai/gpt-5.2".into()),
            ConcurrencyLimit::Bounded(DEFAULT_CONCURRENCY)
        );
    }

    #[test]
    fn test_zero_is_unbounded_at_every_tier() {
        let key: ResourceKey = "google/gemini-3-pro-preview".into();

        let by_model = ConcurrencyConfig::new()
            .model("google/gemini-3-pro-preview", 0)
            .provider("google", 2);
        assert_eq!(by_model.resolve(&key), ConcurrencyLimit::Unbounded);

        let by_provider = ConcurrencyConfig::new()
            .provider("google", 0)
            .default_concurrency(1);
        assert_eq!(by_provider.resolve(&key), ConcurrencyLimit::Unbounded);

        let by_default = ConcurrencyConfig::new().default_concurrency(0);
        assert_eq!(by_default.resolve(&key), ConcurrencyLimit::Unbounded);
    }

    #[test]
    fn test_exact_model_zero_overrides_provider_cap() {
        let config = ConcurrencyConfig::new()
            .provider("openai", 1)
            .model("openai/gpt-4", 0);
        assert!(config.resolve(&"openai/gpt-4".into()).is_unbounded());
        assert_eq!(
            config.resolve(&"openai/gpt-4o".into()),
            ConcurrencyLimit::Bounded(1)
        );
    }

    #[test]
    fn test_bare_key_matches_provider_entry() {
        let config = ConcurrencyConfig::new().provider("ollama", 1);
        assert_eq!(
            config.resolve(&"ollama".into()),
            ConcurrencyLimit::Bounded(1)
        );
    }

    #[test]
    fn test_config_deserializes_camel_case() {
        let config: ConcurrencyConfig = serde_json::from_str(
            r#"{
                "modelConcurrency": {"openai/gpt-4": 2},
                "providerConcurrency": {"anthropic": 0},
                "defaultConcurrency": 7
            }"#,
        )
        .unwrap();

        assert_eq!(config.model_concurrency.get("openai/gpt-4"), Some(&2));
        assert_eq!(config.provider_concurrency.get("anthropic"), Some(&0));
        assert_eq!(config.default_concurrency, Some(7));
    }

    #[test]
    fn test_config_rejects_negative_limits() {
        let result: Result<ConcurrencyConfig, _> =
            serde_json::from_str(r#"{"defaultConcurrency": -1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_limit_display() {
        assert_eq!(ConcurrencyLimit::Bounded(3).to_string(), "3");
        assert_eq!(ConcurrencyLimit::Unbounded.to_string(), "unbounded");
    }
}
