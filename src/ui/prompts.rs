//! ui::prompts
//!
//! Interactive confirmation.
//!
//! # Design
//!
//! Destructive or outward-facing steps may ask for confirmation through
//! the [`Prompter`] seam. Under `--yes`-style automation the
//! [`AssumeYesPrompter`] answers without querying; tests script answers
//! with [`StaticPrompter`].

use async_trait::async_trait;
use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Clone, Error)]
pub enum PromptError {
    /// The user aborted the prompt.
    #[error("prompt cancelled by user")]
    Cancelled,

    /// No interactive terminal is available.
    #[error("not in interactive mode")]
    NotInteractive,
}

/// Yes/no confirmation capability.
#[async_trait]
pub trait Prompter: Send + Sync {
    /// Ask the user to confirm `message`.
    async fn confirm(&self, message: &str, default: bool) -> Result<bool, PromptError>;
}

/// Prompter that answers "yes" without querying.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYesPrompter;

impl AssumeYesPrompter {
    /// Create the assume-yes prompter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prompter for AssumeYesPrompter {
    async fn confirm(&self, _message: &str, _default: bool) -> Result<bool, PromptError> {
        Ok(true)
    }
}

/// Prompter with a fixed answer, for tests.
#[derive(Debug, Clone, Copy)]
pub struct StaticPrompter {
    answer: bool,
}

impl StaticPrompter {
    /// Always answer `answer`.
    pub fn answering(answer: bool) -> Self {
        Self { answer }
    }
}

#[async_trait]
impl Prompter for StaticPrompter {
    async fn confirm(&self, _message: &str, _default: bool) -> Result<bool, PromptError> {
        Ok(self.answer)
    }
}
