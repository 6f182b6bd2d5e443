use crate::llm::core::{LLM, LLMError};
use async_trait::async_trait;
use rig::{agent::Agent as RigAgent, completion::CompletionModel};
use tracing::debug;

/// Lets any `rig::Agent` act as the completion endpoint of an orchestrator.
///
/// The agent is built without tools or preamble: the orchestrators render
/// the whole prompt themselves, so the agent only forwards text.
///
/// ```rust,ignore
/// use mailcal::llm::LLM;
/// use rig::{client::CompletionClient, providers::openai};
///
/// let agent = openai::Client::new("sk-...")
///     .agent("gpt-4o-mini")
///     .temperature(0.0)
///     .build();
/// let llm: Box<dyn LLM> = Box::new(agent);
/// ```
#[async_trait]
impl<M> LLM for RigAgent<M>
where
    M: CompletionModel,
{
    async fn prompt(&mut self, text: String) -> Result<String, LLMError> {
        rig::completion::Prompt::prompt(self, text)
            .await
            .map(|response| response.to_string())
            .map_err(|e| {
                debug!("Rig agent error: {}", e);
                LLMError::PromptError(e.to_string())
            })
    }
}
