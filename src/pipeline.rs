// The `pipeline` module runs one mail-to-calendar pass.

use crate::calendar::{CalendarClient, DispatchOutcome};
use crate::mailbox::{MailError, Mailbox};
use crate::orchestrator::{CalendarOrchestrator, MailOrchestrator, OrchestratorError};
use thiserror::Error;
use tracing::info;

/// Reply of the mail prompt for an email without an event.
pub const NO_ACTION: &str = "nothing";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Mail(#[from] MailError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// What one run did.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub fetched: usize,
    /// Summaries that asked for no calendar change.
    pub skipped: usize,
    pub outcomes: Vec<DispatchOutcome>,
}

/// `true` when a mail summary asks for no calendar change: exactly
/// [`NO_ACTION`], or a blank reply.
pub fn is_no_action(summary: &str) -> bool {
    summary == NO_ACTION || summary.trim().is_empty()
}

/// Mailbox → mail prompt → calendar prompt → calendar, strictly in sequence.
pub struct Pipeline<M: Mailbox, C: CalendarClient> {
    mailbox: M,
    mail: MailOrchestrator,
    calendar: CalendarOrchestrator<C>,
    fetch_limit: usize,
}

impl<M: Mailbox, C: CalendarClient> Pipeline<M, C> {
    pub fn new(
        mailbox: M,
        mail: MailOrchestrator,
        calendar: CalendarOrchestrator<C>,
        fetch_limit: usize,
    ) -> Self {
        Self {
            mailbox,
            mail,
            calendar,
            fetch_limit,
        }
    }

    /// Gives the mailbox back, e.g. to log out.
    pub fn into_mailbox(self) -> M {
        self.mailbox
    }

    /// Summarizes every fetched email first, then forwards each summary that
    /// is not [`NO_ACTION`] to the calendar verbatim. The first error aborts
    /// the run.
    pub async fn run(&mut self) -> Result<PipelineReport, PipelineError> {
        let emails = self.mailbox.fetch_unseen(self.fetch_limit).await?;
        let mut report = PipelineReport {
            fetched: emails.len(),
            ..Default::default()
        };

        let mut summaries = Vec::with_capacity(emails.len());
        for email in &emails {
            let summary = self.mail.summarize(email).await?;
            info!(subject = %email.subject, summary = %summary, "Email summarized");
            summaries.push(summary);
        }

        for summary in summaries {
            if is_no_action(&summary) {
                report.skipped += 1;
                continue;
            }
            let outcome = self.calendar.run(&summary).await?;
            report.outcomes.push(outcome);
        }

        info!(
            fetched = report.fetched,
            skipped = report.skipped,
            dispatched = report.outcomes.len(),
            "Pipeline finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::ActionDispatcher;
    use crate::calendar::dispatcher::tests::{Call, MockCalendar};
    use crate::mailbox::EmailMessage;
    use crate::orchestrator::tests::MockLLM;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockMailbox {
        emails: Vec<EmailMessage>,
        requested_limit: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Mailbox for MockMailbox {
        async fn fetch_unseen(&mut self, limit: usize) -> Result<Vec<EmailMessage>, MailError> {
            self.requested_limit.store(limit, Ordering::SeqCst);
            Ok(self.emails.iter().take(limit).cloned().collect())
        }
    }

    fn email(subject: &str) -> EmailMessage {
        EmailMessage {
            from: "friend@example.com".to_string(),
            subject: subject.to_string(),
            date: "2024/01/01 09:00:00".to_string(),
            body: String::new(),
        }
    }

    const CREATE_REPLY: &str = r#"{"action": "create", "event_data": {"summary": "打ち合わせ",
        "start": {"dateTime": "2024-01-05T15:00:00+09:00", "timeZone": "Asia/Tokyo"},
        "end": {"dateTime": "2024-01-05T16:00:00+09:00", "timeZone": "Asia/Tokyo"}}}"#;

    fn pipeline(
        emails: Vec<EmailMessage>,
        mail_llm: MockLLM,
        calendar_llm: MockLLM,
        calendar: MockCalendar,
    ) -> (Pipeline<MockMailbox, MockCalendar>, Arc<AtomicUsize>) {
        let requested_limit = Arc::new(AtomicUsize::new(0));
        let mailbox = MockMailbox {
            emails,
            requested_limit: requested_limit.clone(),
        };
        let mail = MailOrchestrator::new(Box::new(mail_llm)).unwrap();
        let calendar = CalendarOrchestrator::new(
            Box::new(calendar_llm),
            ActionDispatcher::new(calendar, "primary"),
        )
        .unwrap();
        (Pipeline::new(mailbox, mail, calendar, 5), requested_limit)
    }

    #[test]
    fn test_no_action_matching() {
        assert!(is_no_action("nothing"));
        assert!(is_no_action(""));
        assert!(is_no_action("  \n"));
        assert!(!is_no_action("Nothing."));
        assert!(!is_no_action("NOTHING"));
        assert!(!is_no_action("nothing urgent, but add lunch on Friday"));
    }

    #[tokio::test]
    async fn test_only_event_emails_reach_the_calendar() {
        let summary = "Add a meeting on 2024-01-05 15:00 about the launch";
        let mail_llm = MockLLM::with(move |prompt| {
            Ok(if prompt.contains("launch") {
                summary.to_string()
            } else {
                "nothing".to_string()
            })
        });
        let calendar_llm = MockLLM::replying(CREATE_REPLY);
        let calendar = MockCalendar::default();
        let (mut pipeline, requested_limit) = pipeline(
            vec![email("newsletter"), email("launch meeting"), email("receipt")],
            mail_llm.clone(),
            calendar_llm.clone(),
            calendar.clone(),
        );

        let report = pipeline.run().await.unwrap();

        assert_eq!(requested_limit.load(Ordering::SeqCst), 5);
        assert_eq!(report.fetched, 3);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(mail_llm.prompts().len(), 3);
        let calendar_prompts = calendar_llm.prompts();
        assert_eq!(calendar_prompts.len(), 1);
        assert!(calendar_prompts[0].contains(&format!("User Query: {summary}")));
        assert!(matches!(calendar.calls().as_slice(), [Call::Create(_)]));
    }

    #[tokio::test]
    async fn test_nothing_makes_no_calendar_call() {
        let calendar_llm = MockLLM::replying(CREATE_REPLY);
        let calendar = MockCalendar::default();
        let (mut pipeline, _) = pipeline(
            vec![email("hello")],
            MockLLM::replying("nothing"),
            calendar_llm.clone(),
            calendar.clone(),
        );

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.skipped, 1);
        assert!(report.outcomes.is_empty());
        assert!(calendar_llm.prompts().is_empty());
        assert!(calendar.calls().is_empty());
    }

    #[tokio::test]
    async fn test_inexact_nothing_is_forwarded_verbatim() {
        let calendar_llm = MockLLM::replying(r#"{"action": "get"}"#);
        let calendar = MockCalendar::default();
        let (mut pipeline, _) = pipeline(
            vec![email("hello")],
            MockLLM::replying("Nothing."),
            calendar_llm.clone(),
            calendar.clone(),
        );

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.skipped, 0);
        assert_eq!(report.outcomes.len(), 1);
        let prompts = calendar_llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("User Query: Nothing.\n"));
    }

    #[tokio::test]
    async fn test_empty_mailbox() {
        let mail_llm = MockLLM::replying("nothing");
        let (mut pipeline, _) = pipeline(
            Vec::new(),
            mail_llm.clone(),
            MockLLM::replying(CREATE_REPLY),
            MockCalendar::default(),
        );

        let report = pipeline.run().await.unwrap();

        assert_eq!(report.fetched, 0);
        assert!(mail_llm.prompts().is_empty());
    }
}
