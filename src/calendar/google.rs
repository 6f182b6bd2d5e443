// The `google` module implements `CalendarClient` on top of Google Calendar v3.

use crate::calendar::{CalendarClient, CalendarError, CalendarEvent};
use crate::schema::{EventPayload, EventTime};
use crate::utils::google_auth::{AuthError, CalendarHubType, GConf, calendar_auth};
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use google_calendar3::api::{Event, EventDateTime, Scope};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Google Calendar backed by an authenticated hub.
#[derive(Clone)]
pub struct GoogleCalendar {
    hub: CalendarHubType,
}

impl GoogleCalendar {
    pub fn new(hub: CalendarHubType) -> Self {
        Self { hub }
    }

    /// Authenticates with full calendar scope and wraps the resulting hub.
    pub async fn connect(conf: &GConf) -> Result<Self, AuthError> {
        let hub = calendar_auth(conf, &[Scope::Full]).await?;
        Ok(Self::new(hub))
    }
}

#[async_trait]
impl CalendarClient for GoogleCalendar {
    async fn list_events(
        &self,
        calendar_id: &str,
        time_min: DateTime<Utc>,
        time_max: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!(%calendar_id, %time_min, %time_max, "events.list");
        let (_, events) = self
            .hub
            .events()
            .list(calendar_id)
            .time_min(time_min)
            .time_max(time_max)
            .single_events(true)
            .order_by("startTime")
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(provider_error)?;
        Ok(into_events(events.items))
    }

    async fn create_event(
        &self,
        calendar_id: &str,
        payload: &EventPayload,
    ) -> Result<CalendarEvent, CalendarError> {
        let request = to_provider_event(payload)?;
        debug!(%calendar_id, "events.insert");
        let (_, created) = self
            .hub
            .events()
            .insert(request, calendar_id)
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(provider_error)?;
        Ok(created.into())
    }

    async fn update_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<CalendarEvent, CalendarError> {
        let request = to_provider_event(fields)?;
        debug!(%calendar_id, %event_id, "events.patch");
        let (_, updated) = self
            .hub
            .events()
            .patch(request, calendar_id, event_id)
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(provider_error)?;
        Ok(updated.into())
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError> {
        debug!(%calendar_id, %event_id, "events.delete");
        self.hub
            .events()
            .delete(calendar_id, event_id)
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(provider_error)?;
        Ok(())
    }

    async fn search_events(
        &self,
        calendar_id: &str,
        query: &str,
    ) -> Result<Vec<CalendarEvent>, CalendarError> {
        debug!(%calendar_id, %query, "events.list with query");
        let (_, events) = self
            .hub
            .events()
            .list(calendar_id)
            .q(query)
            .single_events(true)
            .order_by("startTime")
            .add_scope(Scope::Full)
            .doit()
            .await
            .map_err(provider_error)?;
        Ok(into_events(events.items))
    }
}

fn into_events(items: Option<Vec<Event>>) -> Vec<CalendarEvent> {
    items
        .unwrap_or_default()
        .into_iter()
        .map(CalendarEvent::from)
        .collect()
}

/// Re-reads a payload through the provider's event type. Keys the provider
/// does not know (such as `query`) are dropped.
fn to_provider_event<T: Serialize>(payload: &T) -> Result<Event, CalendarError> {
    let invalid = |e: serde_json::Error| CalendarError::InvalidPayload(e.to_string());
    let mut value = serde_json::to_value(payload).map_err(invalid)?;
    for key in ["start", "end"] {
        if let Some(time) = value.get_mut(key) {
            resolve_wall_clock(time);
        }
    }
    serde_json::from_value(value).map_err(invalid)
}

/// Gives an offset to a `dateTime` written as wall-clock time.
///
/// The time is read in the event's `timeZone` when that is an IANA name,
/// otherwise in the local zone. Values that already carry an offset, or that
/// do not parse at all, are left for the provider to judge.
fn resolve_wall_clock(time: &mut Value) {
    let Some(raw) = time.get("dateTime").and_then(Value::as_str).map(str::to_string) else {
        return;
    };
    if DateTime::parse_from_rfc3339(&raw).is_ok() {
        return;
    }
    let Ok(naive) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M"))
    else {
        return;
    };
    let zone = time
        .get("timeZone")
        .and_then(Value::as_str)
        .and_then(|tz| tz.parse::<Tz>().ok());
    let resolved = match zone {
        Some(tz) => tz.from_local_datetime(&naive).earliest().map(|dt| dt.to_rfc3339()),
        None => Local.from_local_datetime(&naive).earliest().map(|dt| dt.to_rfc3339()),
    };
    if let Some(resolved) = resolved {
        time["dateTime"] = Value::String(resolved);
    }
}

impl From<Event> for CalendarEvent {
    fn from(event: Event) -> Self {
        CalendarEvent {
            id: event.id.unwrap_or_default(),
            summary: event.summary,
            start: event.start.map(event_time),
        }
    }
}

fn event_time(time: EventDateTime) -> EventTime {
    EventTime {
        date_time: time.date_time.map(|dt| dt.to_rfc3339()),
        time_zone: time.time_zone,
        date: time.date.map(|d| d.to_string()),
    }
}

fn provider_error(error: google_calendar3::Error) -> CalendarError {
    use google_calendar3::Error;
    match error {
        Error::MissingToken(e) => CalendarError::Auth(e.to_string()),
        Error::HttpError(e) => CalendarError::Transport(e.to_string()),
        Error::Io(e) => CalendarError::Transport(e.to_string()),
        Error::BadRequest(body) => CalendarError::Provider {
            status: body["error"]["code"].as_u64().and_then(|c| u16::try_from(c).ok()),
            message: body["error"]["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
        },
        Error::Failure(response) => CalendarError::Provider {
            status: Some(response.status().as_u16()),
            message: response.status().to_string(),
        },
        other => CalendarError::Provider {
            status: None,
            message: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_converts_to_provider_event() {
        let payload = EventPayload {
            summary: Some("歯医者".to_string()),
            start: Some(EventTime {
                date_time: Some("2024-01-02T12:00:00+09:00".to_string()),
                time_zone: Some("Asia/Tokyo".to_string()),
                date: None,
            }),
            query: Some("ignored by the provider".to_string()),
            ..Default::default()
        };

        let event = to_provider_event(&payload).unwrap();

        assert_eq!(event.summary.as_deref(), Some("歯医者"));
        let start = event.start.unwrap();
        assert!(start.date_time.is_some());
        assert_eq!(start.time_zone.as_deref(), Some("Asia/Tokyo"));
    }

    #[test]
    fn partial_fields_convert_to_provider_event() {
        let fields = json!({"summary": "Renamed", "location": "Room 4"});
        let event = to_provider_event(fields.as_object().unwrap()).unwrap();
        assert_eq!(event.summary.as_deref(), Some("Renamed"));
        assert_eq!(event.location.as_deref(), Some("Room 4"));
        assert!(event.start.is_none());
    }

    #[test]
    fn wall_clock_time_is_read_in_event_time_zone() {
        let payload = EventPayload {
            summary: Some("デート".to_string()),
            start: Some(EventTime {
                date_time: Some("2024-01-02T12:00:00".to_string()),
                time_zone: Some("Asia/Tokyo".to_string()),
                date: None,
            }),
            end: Some(EventTime {
                date_time: Some("2024-01-02T13:00".to_string()),
                time_zone: Some("Asia/Tokyo".to_string()),
                date: None,
            }),
            ..Default::default()
        };

        let event = to_provider_event(&payload).unwrap();

        let start = event.start.unwrap();
        assert_eq!(start.date_time.unwrap().to_rfc3339(), "2024-01-02T03:00:00+00:00");
        assert_eq!(start.time_zone.as_deref(), Some("Asia/Tokyo"));
        assert_eq!(
            event.end.unwrap().date_time.unwrap().to_rfc3339(),
            "2024-01-02T04:00:00+00:00"
        );
    }

    #[test]
    fn wall_clock_time_in_updated_fields_is_resolved() {
        let fields = json!({
            "start": {"dateTime": "2024-07-01T09:30:00", "timeZone": "Europe/Paris"}
        });

        let event = to_provider_event(fields.as_object().unwrap()).unwrap();

        assert_eq!(
            event.start.unwrap().date_time.unwrap().to_rfc3339(),
            "2024-07-01T07:30:00+00:00"
        );
    }

    #[test]
    fn provider_event_keeps_id_summary_and_start() {
        let event = Event {
            id: Some("evt-1".to_string()),
            summary: Some("Standup".to_string()),
            start: Some(EventDateTime {
                time_zone: Some("Asia/Tokyo".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let converted = CalendarEvent::from(event);

        assert_eq!(converted.id, "evt-1");
        assert_eq!(converted.summary_label(), "Standup");
        assert_eq!(
            converted.start.unwrap().time_zone.as_deref(),
            Some("Asia/Tokyo")
        );
    }

    #[test]
    fn bad_request_maps_to_provider_error() {
        let error = google_calendar3::Error::BadRequest(json!({
            "error": {"code": 404, "message": "Not Found"}
        }));
        match provider_error(error) {
            CalendarError::Provider { status, message } => {
                assert_eq!(status, Some(404));
                assert_eq!(message, "Not Found");
            }
            e => panic!("Expected Provider error, got {e}"),
        }
    }
}
