// The `calendar` module wraps the calendar provider behind five operations.

pub mod dispatcher;
pub mod google;

use crate::schema::{EventPayload, EventTime};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use dispatcher::{ActionDispatcher, BULK_CAP, DispatchOutcome};
pub use google::GoogleCalendar;

/// Calendar used when none is configured.
pub const DEFAULT_CALENDAR_ID: &str = "primary";

/// Width of the window listed by a `get` action.
pub fn default_window() -> Duration {
    Duration::days(7)
}

#[derive(Error, Debug)]
pub enum CalendarError {
    /// No access token could be obtained for the call.
    #[error("Calendar authentication failed: {0}")]
    Auth(String),
    /// The provider could not be reached.
    #[error("Calendar transport error: {0}")]
    Transport(String),
    /// The provider answered and rejected the call.
    #[error("Calendar provider error ({}): {message}", status_label(.status))]
    Provider { status: Option<u16>, message: String },
    /// The payload cannot be expressed as a provider event.
    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no status".to_string(), |s| s.to_string())
}

/// The parts of a provider event this crate reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
}

impl CalendarEvent {
    /// Start as text: the date-time, or the date for all-day events.
    pub fn start_label(&self) -> &str {
        self.start
            .as_ref()
            .and_then(|s| s.date_time.as_deref().or(s.date.as_deref()))
            .unwrap_or("")
    }

    pub fn summary_label(&self) -> &str {
        self.summary.as_deref().unwrap_or("(no title)")
    }
}

/// Request/response access to one calendar provider.
///
/// Every call is a single attempt; failures are returned to the caller, which
/// decides whether to continue.
#[async_trait]
pub trait CalendarClient: Send + Sync {
    /// Events starting in `[time_min, time_max)`, recurring instances
    /// expanded, ordered by start time.
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;

    async fn create_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> Result<CalendarEvent, CalendarError>;

    /// Partial update: fields absent from `fields` are left unchanged.
    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<CalendarEvent, CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;

    /// Free-text search over summary and description, without a time bound.
    async fn search_events(
        &self,
        calendar_id: &str,
        query: &str,
    ) -> Result<Vec<CalendarEvent>, CalendarError>;
}
