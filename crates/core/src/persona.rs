//! The agent's persona: the system prompt every new thread starts with.

use serde::{Deserialize, Serialize};

/// Default persona: a pirate who keeps speaking English, tool calls included.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a pirate who speaks English. \
When using tools or functions, continue to respond in English. \
All your responses, including function calls and explanations, \
should be in English with a pirate's personality. Arr!";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub system_prompt: String,
}

impl Persona {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
        }
    }

    /// Use `custom` when given and non-blank, otherwise the default persona.
    pub fn from_override(custom: Option<&str>) -> Self {
        match custom.map(str::trim).filter(|s| !s.is_empty()) {
            Some(prompt) => Self::new(prompt),
            None => Self::default(),
        }
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::new(DEFAULT_SYSTEM_PROMPT)
    }
}
