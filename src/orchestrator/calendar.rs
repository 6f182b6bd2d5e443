use crate::calendar::{ActionDispatcher, CalendarClient, DispatchOutcome};
use crate::llm::LLM;
use crate::orchestrator::{OrchestratorError, complete};
use crate::schema::{Action, format_instructions, parse_action};
use crate::utils::TEngine;
use chrono::Local;
use serde_json::json;
use tracing::info;

/// Built-in calendar prompt.
pub const CALENDAR_PROMPT: &str = "Follow the user query and take action on the calendar appointments.
Current time: {{current_time}}, timeZone: {{time_zone}}.
History: {{chat_history}}
Format: {{format_instructions}}

User Query: {{query}}
Processing and reporting must be done in Japanese. If unclear, do not process and ask questions.";

const TEMPLATE_NAME: &str = "calendar";

/// Translates a natural-language request into one calendar action and
/// applies it.
pub struct CalendarOrchestrator<C: CalendarClient> {
    llm: Box<dyn LLM>,
    engine: TEngine,
    dispatcher: ActionDispatcher<C>,
    chat_history: String,
    time_zone: String,
}

impl<C: CalendarClient> CalendarOrchestrator<C> {
    pub fn new(llm: Box<dyn LLM>, dispatcher: ActionDispatcher<C>) -> Result<Self, OrchestratorError> {
        let mut engine = TEngine::new();
        engine.register_template_string(TEMPLATE_NAME, CALENDAR_PROMPT)?;
        Ok(Self {
            llm,
            engine,
            dispatcher,
            chat_history: String::new(),
            time_zone: "JST".to_string(),
        })
    }

    /// Replaces the built-in prompt. The template may use `query`,
    /// `current_time`, `time_zone`, `chat_history` and `format_instructions`.
    pub fn with_prompt_template(mut self, template: &str) -> Result<Self, OrchestratorError> {
        self.engine.register_template_string(TEMPLATE_NAME, template)?;
        Ok(self)
    }

    pub fn with_chat_history(mut self, chat_history: impl Into<String>) -> Self {
        self.chat_history = chat_history.into();
        self
    }

    pub fn with_time_zone(mut self, time_zone: impl Into<String>) -> Self {
        self.time_zone = time_zone.into();
        self
    }

    pub fn render_prompt(&self, query: &str, current_time: &str) -> Result<String, OrchestratorError> {
        let variables = json!({
            "query": query,
            "current_time": current_time,
            "time_zone": self.time_zone,
            "chat_history": self.chat_history,
            "format_instructions": format_instructions(),
        });
        Ok(self.engine.render(TEMPLATE_NAME, &variables)?)
    }

    /// Asks the model for the action matching `query` without applying it.
    pub async fn plan(&mut self, query: &str) -> Result<Action, OrchestratorError> {
        let current_time = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let prompt = self.render_prompt(query, &current_time)?;
        let reply = complete(self.llm.as_mut(), prompt).await?;
        Ok(parse_action(&reply)?)
    }

    pub async fn run(&mut self, query: &str) -> Result<DispatchOutcome, OrchestratorError> {
        let action = self.plan(query).await?;
        info!(action = %action.kind, "Dispatching calendar action");
        Ok(self.dispatcher.dispatch(&action).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::dispatcher::tests::{Call, MockCalendar};
    use crate::orchestrator::tests::MockLLM;
    use crate::schema::SchemaParseError;
    use crate::utils::TEngineError;

    const CREATE_REPLY: &str = r#"```json
{"action": "create", "event_data": {"summary": "デート",
 "start": {"dateTime": "2024-01-02T12:00:00+09:00", "timeZone": "Asia/Tokyo"},
 "end": {"dateTime": "2024-01-02T13:00:00+09:00", "timeZone": "Asia/Tokyo"}}}
```"#;

    fn orchestrator(llm: MockLLM, calendar: MockCalendar) -> CalendarOrchestrator<MockCalendar> {
        CalendarOrchestrator::new(Box::new(llm), ActionDispatcher::new(calendar, "primary")).unwrap()
    }

    #[test]
    fn test_prompt_carries_every_variable() {
        let orchestrator = orchestrator(MockLLM::replying(""), MockCalendar::default())
            .with_chat_history("user: 先週の会議")
            .with_time_zone("Asia/Tokyo");

        let prompt = orchestrator
            .render_prompt("明日の12時にデートの約束を入れて", "2024-01-01 09:00:00")
            .unwrap();

        assert!(prompt.contains("User Query: 明日の12時にデートの約束を入れて"));
        assert!(prompt.contains("Current time: 2024-01-01 09:00:00, timeZone: Asia/Tokyo."));
        assert!(prompt.contains("History: user: 先週の会議"));
        assert!(prompt.contains("\"event_data\""));
    }

    #[test]
    fn test_custom_template_with_unknown_placeholder_fails() {
        let orchestrator = orchestrator(MockLLM::replying(""), MockCalendar::default())
            .with_prompt_template("{{query}} at {{location}}")
            .unwrap();

        let result = orchestrator.render_prompt("lunch", "now");

        assert!(matches!(
            result,
            Err(OrchestratorError::Template(TEngineError::RenderError(_)))
        ));
    }

    #[tokio::test]
    async fn test_run_creates_event_from_fenced_reply() {
        let llm = MockLLM::replying(CREATE_REPLY);
        let calendar = MockCalendar::default();
        let mut orchestrator = orchestrator(llm.clone(), calendar.clone());

        let outcome = orchestrator.run("明日の12時にデートの約束を入れて").await.unwrap();

        assert!(matches!(outcome, DispatchOutcome::Created(_)));
        let calls = calendar.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Create(payload) => assert_eq!(payload.summary.as_deref(), Some("デート")),
            other => panic!("Expected a create call, got {other:?}"),
        }
        assert_eq!(llm.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_makes_no_calendar_call() {
        let calendar = MockCalendar::default();
        let mut orchestrator = orchestrator(
            MockLLM::replying("いつの予定ですか？"),
            calendar.clone(),
        );

        let result = orchestrator.run("予定を入れて").await;

        assert!(matches!(
            result,
            Err(OrchestratorError::Schema(SchemaParseError::InvalidJson { .. }))
        ));
        assert!(calendar.calls().is_empty());
    }
}
