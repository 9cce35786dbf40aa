//! Prompt templates for Pensum.
//!
//! Prompts can be customized by placing a `generation.toml` file in the
//! custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub generation: GenerationPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for answer generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationPrompts {
    /// Base system prompt.
    pub system: String,
    /// Wrapper around the user's question. Receives `{{query}}`.
    pub query: String,
    /// Appended to the system prompt when the session has history.
    /// Receives `{{history}}`.
    pub history: String,
}

impl Default for GenerationPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an AI assistant specialized in course materials and educational content, with access to a search tool for course information.

Search tool usage:
- Use the search tool only for questions about specific course content or detailed educational materials
- Search at most once per query
- Synthesize search results into accurate, fact-based responses
- If the search yields no results, say so clearly without offering alternatives

Response protocol:
- General knowledge questions: answer from existing knowledge without searching
- Course-specific questions: search first, then answer
- No meta-commentary: do not explain your search process or mention "based on the search results"

All responses must be:
1. Brief and focused on the question
2. Educational, maintaining instructional value
3. Clear, using accessible language
4. Supported by examples when they aid understanding

Provide only the direct answer to what was asked."#
                .to_string(),
            query: "Answer this question about course materials: {{query}}".to_string(),
            history: "\n\nPrevious conversation:\n{{history}}".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let generation_path = custom_path.join("generation.toml");
            if generation_path.exists() {
                let content = std::fs::read_to_string(&generation_path)?;
                prompts.generation = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables and are
    /// substituted last, so placeholders inside their values are left as written.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let custom: HashMap<String, String> = self
            .variables
            .iter()
            .filter(|(key, _)| !vars.contains_key(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self::render(&Self::render(template, &custom), vars)
    }

    /// System prompt, with the conversation history appended when present.
    pub fn system_prompt(&self, history: Option<&str>) -> String {
        let base = self.render_with_custom(&self.generation.system, &HashMap::new());
        match history {
            Some(history) if !history.is_empty() => {
                let vars = HashMap::from([("history".to_string(), history.to_string())]);
                format!("{}{}", base, self.render_with_custom(&self.generation.history, &vars))
            }
            _ => base,
        }
    }

    /// The user turn sent for a question.
    pub fn query_prompt(&self, query: &str) -> String {
        let vars = HashMap::from([("query".to_string(), query.to_string())]);
        self.render_with_custom(&self.generation.query, &vars)
    }
}
