// Reads unread mail, asks the model which messages describe events and puts
// those on the calendar.

use mailcal::{
    ActionDispatcher, AssistantConfig, CalendarOrchestrator, GoogleCalendar, ImapMailbox,
    MailOrchestrator, Pipeline, config::MailCredentials, llm::LLMFactory,
};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = AssistantConfig::load().expect("invalid configuration");
    let credentials =
        MailCredentials::from_file(&config.mail.credentials_path).expect("cannot read mail credentials");

    let mailbox = ImapMailbox::connect(&config.mail, &credentials)
        .await
        .expect("cannot open mailbox");
    let calendar = GoogleCalendar::connect(&config.calendar.gconf())
        .await
        .expect("calendar authentication failed");
    info!("Mailbox and calendar ready");

    // one backend per orchestrator
    let mut mail = MailOrchestrator::new(LLMFactory::create(&config.llm).expect("cannot build the model"))
        .expect("invalid built-in prompt")
        .with_chat_history(&config.chat_history);
    if let Some(template) = &config.mail.prompt_template {
        mail = mail.with_prompt_template(template).expect("invalid mail prompt template");
    }

    let mut calendar = CalendarOrchestrator::new(
        LLMFactory::create(&config.llm).expect("cannot build the model"),
        ActionDispatcher::new(calendar, &config.calendar.calendar_id),
    )
    .expect("invalid built-in prompt")
    .with_time_zone(&config.calendar.time_zone)
    .with_chat_history(&config.chat_history);
    if let Some(template) = &config.calendar.prompt_template {
        calendar = calendar
            .with_prompt_template(template)
            .expect("invalid calendar prompt template");
    }

    let mut pipeline = Pipeline::new(mailbox, mail, calendar, config.mail.fetch_limit);
    let result = pipeline.run().await;

    if let Err(e) = pipeline.into_mailbox().logout().await {
        warn!(error = %e, "IMAP logout failed");
    }

    match result {
        Ok(report) => {
            let errors = report.outcomes.iter().filter(|o| o.is_error()).count();
            info!(
                fetched = report.fetched,
                skipped = report.skipped,
                dispatched = report.outcomes.len(),
                errors,
                "Done"
            );
        }
        Err(e) => {
            error!(error = %e, "Pipeline aborted");
            std::process::exit(1);
        }
    }
}
