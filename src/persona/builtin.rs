// ABOUTME: Built-in sea-themed personas shipped with the host extension.
// ABOUTME: Names, one-line descriptions, and the model each runs on by default.

use super::Persona;

/// Built-in personas as `(name, description, default model)`.
const BUILTIN: &[(&str, &str, &str)] = &[
    (
        "Kraken",
        "Primary coding agent. Orchestrates development tasks, delegates to specialists, writes production-ready code.",
        "anthropic/claude-opus-4-5",
    ),
    (
        "Maelstrom",
        "Read-only consultation agent for complex architecture challenges and trade-off analysis.",
        "openai/gpt-5.2",
    ),
    (
        "Nautilus",
        "Contextual grep for codebases. Locates code with systematic search strategies.",
        "opencode/grok-code",
    ),
    (
        "Abyssal",
        "Research specialist that investigates external libraries and frameworks with cited evidence.",
        "opencode/glm-4-7-free",
    ),
    (
        "Coral",
        "Visual design specialist that implements interfaces using design system principles.",
        "google/gemini-3-pro-preview",
    ),
    (
        "Siren",
        "Technical documentation specialist that writes clear, well-structured documentation.",
        "google/gemini-3-flash-preview",
    ),
    (
        "Leviathan",
        "Master architect for system design and code structure analysis.",
        "anthropic/claude-opus-4-5",
    ),
    (
        "Poseidon (Plan Consultant)",
        "Pre-planning consultant that identifies requirements, boundaries, and ambiguities before planning.",
        "anthropic/claude-opus-4-5",
    ),
    (
        "Scylla (Plan Reviewer)",
        "Quality assurance specialist that evaluates work plans for implementability.",
        "openai/gpt-5.2",
    ),
    (
        "Pearl",
        "Multimedia analysis specialist for PDFs, images, and diagrams.",
        "google/gemini-3-pro-preview",
    ),
];

/// The built-in personas, in registration order.
pub fn builtin() -> Vec<Persona> {
    BUILTIN
        .iter()
        .map(|&(name, description, model)| Persona::new(name, description, model))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_unique() {
        let personas = builtin();
        let mut names: Vec<_> = personas.iter().map(|p| p.name.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), personas.len());
    }

    #[test]
    fn test_builtin_models_have_provider() {
        for persona in builtin() {
            assert!(
                persona.default_model.model().is_some(),
                "{} has no provider/model split",
                persona.name
            );
        }
    }
}
