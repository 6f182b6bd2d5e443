// The `dispatcher` module applies a parsed action to a calendar.

use crate::calendar::{CalendarClient, CalendarError, CalendarEvent, default_window};
use crate::schema::{Action, ActionKind};
use chrono::{DateTime, Utc};
use serde_json::Map;
use tracing::{error, info};

/// Most events a single update or delete may touch.
///
/// A vague instruction ("delete the meeting") can match far more events than
/// intended; anything past the cap is left alone.
pub const BULK_CAP: usize = 20;

/// How a dispatched action finished.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Listed(Vec<CalendarEvent>),
    Created(CalendarEvent),
    Found(Vec<CalendarEvent>),
    Updated(Vec<CalendarEvent>),
    /// Ids of the deleted events, in search order.
    Deleted(Vec<String>),
    /// The action kind is not one the dispatcher knows.
    Unrecognized(String),
}

impl DispatchOutcome {
    /// `true` for the "finished with error" outcome.
    pub fn is_error(&self) -> bool {
        matches!(self, DispatchOutcome::Unrecognized(_))
    }

    /// Number of events the action listed, found or changed.
    pub fn affected(&self) -> usize {
        match self {
            DispatchOutcome::Listed(events)
            | DispatchOutcome::Found(events)
            | DispatchOutcome::Updated(events) => events.len(),
            DispatchOutcome::Deleted(ids) => ids.len(),
            DispatchOutcome::Created(_) => 1,
            DispatchOutcome::Unrecognized(_) => 0,
        }
    }
}

/// Drives a [`CalendarClient`] from [`Action`]s.
pub struct ActionDispatcher<C: CalendarClient> {
    client: C,
    calendar_id: String,
}

impl<C: CalendarClient> ActionDispatcher<C> {
    pub fn new(client: C, calendar_id: impl Into<String>) -> Self {
        Self {
            client,
            calendar_id: calendar_id.into(),
        }
    }

    pub async fn dispatch(&self, action: &Action) -> Result<DispatchOutcome, CalendarError> {
        self.dispatch_at(action, Utc::now()).await
    }

    /// Dispatches with `now` as the start of the `get` window.
    ///
    /// Bulk update/delete stop at the first provider error; changes already
    /// applied stay applied.
    pub async fn dispatch_at(
        &self,
        action: &Action,
        now: DateTime<Utc>,
    ) -> Result<DispatchOutcome, CalendarError> {
        let calendar_id = self.calendar_id.as_str();
        let event = action.event.as_ref();
        let query = action.query().unwrap_or_default();

        match &action.kind {
            ActionKind::Get => {
                let events = self
                    .client
                    .list_events(calendar_id, now, now + default_window())
                    .await?;
                log_events(&events);
                Ok(DispatchOutcome::Listed(events))
            }
            ActionKind::Create => {
                let payload = event.cloned().unwrap_or_default();
                let created = self.client.create_event(calendar_id, &payload).await?;
                info!(event_id = %created.id, "Event created");
                Ok(DispatchOutcome::Created(created))
            }
            ActionKind::Search => {
                let events = self.client.search_events(calendar_id, query).await?;
                log_events(&events);
                Ok(DispatchOutcome::Found(events))
            }
            ActionKind::Update => {
                let fields = event
                    .and_then(|e| e.updated_fields.clone())
                    .unwrap_or_else(Map::new);
                let matches = self.client.search_events(calendar_id, query).await?;
                let mut updated = Vec::new();
                for target in matches.iter().take(BULK_CAP) {
                    let event = self
                        .client
                        .update_event(calendar_id, &target.id, &fields)
                        .await?;
                    info!(event_id = %event.id, "Event updated");
                    updated.push(event);
                }
                Ok(DispatchOutcome::Updated(updated))
            }
            ActionKind::Delete => {
                let matches = self.client.search_events(calendar_id, query).await?;
                let mut deleted = Vec::new();
                for target in matches.iter().take(BULK_CAP) {
                    self.client.delete_event(calendar_id, &target.id).await?;
                    info!(event_id = %target.id, "Event deleted");
                    deleted.push(target.id.clone());
                }
                Ok(DispatchOutcome::Deleted(deleted))
            }
            ActionKind::Unknown(kind) => {
                error!(action = %kind, "Invalid action");
                Ok(DispatchOutcome::Unrecognized(kind.clone()))
            }
        }
    }
}

fn log_events(events: &[CalendarEvent]) {
    for event in events {
        info!(summary = %event.summary_label(), start = %event.start_label(), "Event");
    }
}
