use crate::llm::LLM;
use crate::mailbox::EmailMessage;
use crate::orchestrator::{OrchestratorError, complete};
use crate::utils::TEngine;
use serde_json::json;

/// Built-in mail prompt. The model answers `nothing` when the mail holds no
/// event.
pub const MAIL_PROMPT: &str = "You will be given the email content. If this email contains something that you need to add to the calendar,
report it to tell to add that event to calendar with detail.
If not please say \"nothing\".

History: {{chat_history}}
Email content: {{email_content}}";

const TEMPLATE_NAME: &str = "mail";

/// Asks the model whether an email describes something for the calendar.
pub struct MailOrchestrator {
    llm: Box<dyn LLM>,
    engine: TEngine,
    chat_history: String,
}

impl MailOrchestrator {
    pub fn new(llm: Box<dyn LLM>) -> Result<Self, OrchestratorError> {
        let mut engine = TEngine::new();
        engine.register_template_string(TEMPLATE_NAME, MAIL_PROMPT)?;
        Ok(Self {
            llm,
            engine,
            chat_history: String::new(),
        })
    }

    /// Replaces the built-in prompt. The template may use `email_content` and
    /// `chat_history`.
    pub fn with_prompt_template(mut self, template: &str) -> Result<Self, OrchestratorError> {
        self.engine.register_template_string(TEMPLATE_NAME, template)?;
        Ok(self)
    }

    pub fn with_chat_history(mut self, chat_history: impl Into<String>) -> Self {
        self.chat_history = chat_history.into();
        self
    }

    pub fn render_prompt(&self, email: &EmailMessage) -> Result<String, OrchestratorError> {
        let email_content = serde_json::to_string(email)?;
        let variables = json!({
            "email_content": email_content,
            "chat_history": self.chat_history,
        });
        Ok(self.engine.render(TEMPLATE_NAME, &variables)?)
    }

    /// The model's reply, verbatim.
    pub async fn summarize(&mut self, email: &EmailMessage) -> Result<String, OrchestratorError> {
        let prompt = self.render_prompt(email)?;
        complete(self.llm.as_mut(), prompt).await
    }
}
