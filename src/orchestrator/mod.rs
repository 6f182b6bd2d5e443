// The `orchestrator` module turns free text into LLM calls and calendar actions.

pub mod calendar;
pub mod mail;

use crate::calendar::CalendarError;
use crate::llm::{LLM, LLMError};
use crate::schema::SchemaParseError;
use crate::utils::TEngineError;
use thiserror::Error;
use tracing::debug;

pub use calendar::{CALENDAR_PROMPT, CalendarOrchestrator};
pub use mail::{MAIL_PROMPT, MailOrchestrator};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Prompt template error: {0}")]
    Template(#[from] TEngineError),
    #[error(transparent)]
    Llm(#[from] LLMError),
    #[error(transparent)]
    Schema(#[from] SchemaParseError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error("Cannot encode prompt variables: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Sends one rendered prompt.
async fn complete(llm: &mut dyn LLM, prompt: String) -> Result<String, OrchestratorError> {
    debug!(prompt = %prompt, "Prompting model");
    let reply = llm.prompt(prompt).await?;
    debug!(reply = %reply, "Model replied");
    Ok(reply)
}
