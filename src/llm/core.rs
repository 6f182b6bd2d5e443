use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while talking to a completion endpoint.
#[derive(Error, Debug)]
pub enum LLMError {
    /// The provider rejected the prompt or could not be reached.
    ///
    /// Wraps the provider's own error text so both orchestrators report
    /// failures the same way regardless of which backend is configured.
    #[error("Failed to prompt the model: {0}")]
    PromptError(String),
    /// The provider could not be configured (unknown name, missing key).
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// Text-in, text-out completion contract.
///
/// Structure is never requested from the provider: the calendar orchestrator
/// embeds format instructions in the prompt and parses the reply afterwards,
/// the mail orchestrator returns the reply verbatim.
///
/// # Examples
///
/// ```rust
/// use mailcal::llm::{LLM, LLMError};
/// use async_trait::async_trait;
///
/// struct Canned(&'static str);
///
/// #[async_trait]
/// impl LLM for Canned {
///     async fn prompt(&mut self, _text: String) -> Result<String, LLMError> {
///         Ok(self.0.to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait LLM: Send + Sync {
    /// Sends `text` as a single prompt and returns the completion.
    ///
    /// One attempt only. Any transport, rate-limit or authentication failure
    /// surfaces as [`LLMError::PromptError`].
    async fn prompt(&mut self, text: String) -> Result<String, LLMError>;
}
