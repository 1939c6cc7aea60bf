//! Error types shared across the prompt management subsystem.

use thiserror::Error;

use crate::context::ContextError;
use crate::template::TemplateError;

/// Result alias for prompt management operations.
pub type PromptResult<T> = Result<T, PromptError>;

/// Errors produced while composing or rendering a prompt.
#[derive(Debug, Error)]
pub enum PromptError {
    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// Context window management failed.
    #[error("context error: {0}")]
    Context(#[from] ContextError),

    /// The manager was asked to render before a template was configured.
    #[error("prompt manager has no template configured")]
    MissingTemplate,
}
