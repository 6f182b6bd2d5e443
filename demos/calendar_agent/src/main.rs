// Applies a single natural-language request to the calendar, e.g.
// `calendar_agent 明日の12時にデートの約束を入れて`.

use mailcal::{
    ActionDispatcher, AssistantConfig, CalendarOrchestrator, DispatchOutcome, GoogleCalendar,
    llm::LLMFactory,
};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let query = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if query.trim().is_empty() {
        error!("Usage: calendar_agent <request>");
        std::process::exit(2);
    }

    let config = AssistantConfig::load().expect("invalid configuration");
    let calendar = GoogleCalendar::connect(&config.calendar.gconf())
        .await
        .expect("calendar authentication failed");
    let llm = LLMFactory::create(&config.llm).expect("cannot build the model");

    let mut orchestrator =
        CalendarOrchestrator::new(llm, ActionDispatcher::new(calendar, &config.calendar.calendar_id))
            .expect("invalid built-in prompt")
            .with_time_zone(&config.calendar.time_zone)
            .with_chat_history(&config.chat_history);
    if let Some(template) = &config.calendar.prompt_template {
        orchestrator = orchestrator
            .with_prompt_template(template)
            .expect("invalid calendar prompt template");
    }

    match orchestrator.run(&query).await {
        Ok(DispatchOutcome::Unrecognized(kind)) => error!(action = %kind, "Finish with Error!"),
        Ok(outcome) => info!(affected = outcome.affected(), "Finish."),
        Err(e) => {
            error!(error = %e, "Calendar request failed");
            std::process::exit(1);
        }
    }
}
