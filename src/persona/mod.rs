// ABOUTME: Persona store - named agents with a description and default model.
// ABOUTME: PersonaRegistry holds the personas background tasks are scheduled against.

mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::Config;
use crate::coordinator::ResourceKey;

pub use builtin::builtin;

/// An agent persona as seen by the scheduler.
///
/// Prompt content lives with the host; the scheduler only needs the name
/// and the model the persona runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    /// Unique display name, e.g. "Nautilus".
    pub name: String,

    /// One-line summary of what the persona does.
    pub description: String,

    /// Resource key the persona's invocations are admitted against.
    pub default_model: ResourceKey,
}

impl Persona {
    /// Create a persona with required fields.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        default_model: impl Into<ResourceKey>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            default_model: default_model.into(),
        }
    }

    /// Override the model for this persona.
    pub fn model(mut self, model: impl Into<ResourceKey>) -> Self {
        self.default_model = model.into();
        self
    }
}

/// Registry of available personas.
#[derive(Default)]
pub struct PersonaRegistry {
    personas: Arc<RwLock<HashMap<String, Persona>>>,
}

impl PersonaRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry preloaded with the built-in personas.
    pub async fn with_builtins() -> Self {
        let registry = Self::new();
        for persona in builtin() {
            registry.register(persona).await;
        }
        registry
    }

    /// Register a persona, replacing any existing one with the same name.
    pub async fn register(&self, persona: Persona) {
        let mut personas = self.personas.write().await;
        personas.insert(persona.name.clone(), persona);
    }

    /// Get a persona by name.
    pub async fn get(&self, name: &str) -> Option<Persona> {
        let personas = self.personas.read().await;
        personas.get(name).cloned()
    }

    /// List all registered persona names, sorted.
    pub async fn list(&self) -> Vec<String> {
        let personas = self.personas.read().await;
        let mut names: Vec<_> = personas.keys().cloned().collect();
        names.sort();
        names
    }

    /// Apply per-agent model overrides from the plugin config.
    ///
    /// Overrides naming an unregistered persona are ignored.
    pub async fn apply_overrides(&self, config: &Config) {
        let mut personas = self.personas.write().await;
        for (name, agent) in &config.agents {
            let (Some(persona), Some(model)) = (personas.get_mut(name), &agent.model) else {
                continue;
            };
            persona.default_model = ResourceKey::new(model.clone());
        }
    }
}

impl Clone for PersonaRegistry {
    fn clone(&self) -> Self {
        Self {
            personas: Arc::clone(&self.personas),
        }
    }
}
