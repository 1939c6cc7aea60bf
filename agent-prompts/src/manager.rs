//! Coordinates prompt templates, system instructions, and context budgeting
//! into the final string handed to a Model Provider call.

use agent_primitives::AgentManifest;

use crate::context::{ContextMessage, ContextWindowConfig, ContextWindowManager};
use crate::error::{PromptError, PromptResult};
use crate::system::{SystemInstruction, SystemInstructionBuilder};
use crate::template::PromptTemplate;

/// Coordinates prompt templates, system instructions, and context budgeting.
pub struct PromptManager {
    system: Option<SystemInstruction>,
    template: Option<PromptTemplate>,
    context: ContextWindowManager,
}

impl std::fmt::Debug for PromptManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptManager")
            .field("has_system", &self.system.is_some())
            .field("has_template", &self.template.is_some())
            .field("current_tokens", &self.context.current_tokens())
            .finish()
    }
}

/// Builder for [`PromptManager`].
#[derive(Debug, Default)]
pub struct PromptManagerBuilder {
    system: Option<SystemInstruction>,
    template: Option<PromptTemplate>,
    context_config: ContextWindowConfig,
}

impl PromptManagerBuilder {
    /// Creates a new builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the system instruction prepended to every rendered prompt.
    #[must_use]
    pub fn system(mut self, instruction: SystemInstruction) -> Self {
        self.system = Some(instruction);
        self
    }

    /// Installs the system instruction from an agent's declarative
    /// `system_prompt` field, per §3's "declarative metadata used by
    /// handlers to shape prompts". A manifest with no `system_prompt`
    /// leaves the builder's system instruction unset.
    #[must_use]
    pub fn system_from_manifest(self, manifest: &AgentManifest) -> Self {
        match manifest.system_prompt() {
            Some(content) => {
                let instruction = SystemInstructionBuilder::new()
                    .content(content)
                    .build()
                    .unwrap_or_default();
                self.system(instruction)
            }
            None => self,
        }
    }

    /// Installs the template rendered as the prompt body.
    #[must_use]
    pub fn template(mut self, template: PromptTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Overrides the context window budget and compression behavior.
    #[must_use]
    pub fn context_config(mut self, config: ContextWindowConfig) -> Self {
        self.context_config = config;
        self
    }

    /// Finalises builder construction.
    pub fn build(self) -> PromptResult<PromptManager> {
        Ok(PromptManager {
            system: self.system,
            template: self.template,
            context: ContextWindowManager::new(self.context_config),
        })
    }
}

impl PromptManager {
    /// Returns a new builder instance.
    #[must_use]
    pub fn builder() -> PromptManagerBuilder {
        PromptManagerBuilder::new()
    }

    /// Appends a conversation message to the managed context window,
    /// triggering compression if the configured budget is exceeded.
    pub fn push_message(&mut self, message: ContextMessage) {
        self.context.add_message(message);
    }

    /// Returns the messages currently retained in the context window.
    #[must_use]
    pub fn context_messages(&self) -> Vec<ContextMessage> {
        self.context.get_messages()
    }

    /// Renders the configured template, prepending the system instruction
    /// and any summarized context history produced by compression.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingTemplate`] if no template was
    /// configured, or propagates [`PromptError::Template`] if rendering
    /// fails because a required variable is missing.
    pub fn render(&self) -> PromptResult<String> {
        self.render_with(&std::collections::HashMap::new())
    }

    /// Renders the configured template with additional runtime variables
    /// (overriding any template-default of the same name), prepending the
    /// system instruction and any summarized context history.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingTemplate`] if no template was
    /// configured, or propagates [`PromptError::Template`] if rendering
    /// fails because a required variable is missing.
    pub fn render_with(
        &self,
        runtime_vars: &std::collections::HashMap<String, String>,
    ) -> PromptResult<String> {
        let template = self.template.as_ref().ok_or(PromptError::MissingTemplate)?;
        let mut sections = Vec::new();

        if let Some(system) = &self.system {
            if !system.content().is_empty() {
                sections.push(system.content().to_owned());
            }
        }

        if let Some(history) = self.context.summarized_history() {
            sections.push(history.to_owned());
        }

        sections.push(template.render_with(runtime_vars)?);

        Ok(sections.join("\n\n"))
    }

    /// Validates that the manager is ready to render a prompt.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError::MissingTemplate`] if no template has been
    /// configured yet.
    pub fn validate(&self) -> PromptResult<()> {
        if self.template.is_none() {
            return Err(PromptError::MissingTemplate);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use agent_primitives::{AgentId, AgentManifest};

    use super::*;
    use crate::template::TemplateBuilder;

    fn system(content: &str) -> SystemInstruction {
        SystemInstructionBuilder::new()
            .content(content)
            .build()
            .unwrap()
    }

    #[test]
    fn render_fails_without_template() {
        let manager = PromptManager::builder().build().unwrap();
        assert!(matches!(manager.render(), Err(PromptError::MissingTemplate)));
    }

    #[test]
    fn render_joins_system_instruction_and_template() {
        let template = TemplateBuilder::new("Answer: {{question}}")
            .with_variable("question", "what is 2+2?")
            .build()
            .unwrap();

        let manager = PromptManager::builder()
            .system(system("You are a concise assistant."))
            .template(template)
            .build()
            .unwrap();

        let rendered = manager.render().unwrap();
        assert!(rendered.starts_with("You are a concise assistant."));
        assert!(rendered.contains("Answer: what is 2+2?"));
    }

    #[test]
    fn push_message_feeds_context_window() {
        let mut manager = PromptManager::builder().build().unwrap();
        manager.push_message(ContextMessage::new("user", "hello"));
        assert_eq!(manager.context_messages().len(), 1);
    }

    #[test]
    fn system_from_manifest_uses_declared_system_prompt() {
        let manifest = AgentManifest::builder(AgentId::random())
            .name("researcher")
            .unwrap()
            .role("researcher")
            .system_prompt("You are a careful researcher.")
            .build()
            .unwrap();

        let template = TemplateBuilder::new("Answer: {{question}}")
            .with_variable("question", "what is 2+2?")
            .build()
            .unwrap();

        let manager = PromptManager::builder()
            .system_from_manifest(&manifest)
            .template(template)
            .build()
            .unwrap();

        let rendered = manager.render().unwrap();
        assert!(rendered.starts_with("You are a careful researcher."));
    }

    #[test]
    fn render_with_overrides_template_variable() {
        let template = TemplateBuilder::new("Answer: {{question}}")
            .with_variable("question", "default question")
            .build()
            .unwrap();

        let manager = PromptManager::builder().template(template).build().unwrap();

        let mut runtime = std::collections::HashMap::new();
        runtime.insert("question".to_owned(), "what is 2+2?".to_owned());

        let rendered = manager.render_with(&runtime).unwrap();
        assert!(rendered.contains("Answer: what is 2+2?"));
    }

    #[test]
    fn validate_requires_template() {
        let manager = PromptManager::builder().build().unwrap();
        assert!(manager.validate().is_err());

        let manager = PromptManager::builder()
            .template(PromptTemplate::new("static"))
            .build()
            .unwrap();
        assert!(manager.validate().is_ok());
    }
}
