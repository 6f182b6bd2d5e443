// The `schema` module defines the calendar action the LLM is asked to emit.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use thiserror::Error;

/// The model's reply could not be turned into an [`Action`].
#[derive(Error, Debug)]
pub enum SchemaParseError {
    /// The reply is not JSON, or the JSON does not have the action shape.
    #[error("LLM output is not a valid calendar action: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        raw: String,
    },
    /// A field required by this kind of action is absent.
    #[error("'{kind}' action requires event_data.{field}")]
    MissingField { kind: String, field: &'static str },
}

/// Point in time as the calendar provider spells it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime", default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<String>,
    #[serde(rename = "timeZone", default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    /// All-day events carry a date instead of a date-time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// Event fields or search query attached to an action.
///
/// Only presence is checked; the provider judges date strings and time zones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<EventTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(
        default,
        alias = "updated_data",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_fields: Option<Map<String, Value>>,
}

/// What the action does to the calendar.
///
/// Any string the dispatcher does not know parses into `Unknown` so that it
/// can be reported as an outcome rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Get,
    Create,
    Search,
    Update,
    Delete,
    Unknown(String),
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "get" => ActionKind::Get,
            "create" => ActionKind::Create,
            "search" => ActionKind::Search,
            "update" => ActionKind::Update,
            "delete" => ActionKind::Delete,
            _ => ActionKind::Unknown(value),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Get => f.write_str("get"),
            ActionKind::Create => f.write_str("create"),
            ActionKind::Search => f.write_str("search"),
            ActionKind::Update => f.write_str("update"),
            ActionKind::Delete => f.write_str("delete"),
            ActionKind::Unknown(other) => f.write_str(other),
        }
    }
}

/// One calendar action derived from free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action")]
    pub kind: ActionKind,
    #[serde(
        rename = "event_data",
        alias = "event",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub event: Option<EventPayload>,
}

impl Action {
    /// Search query of a search/update/delete action.
    pub fn query(&self) -> Option<&str> {
        self.event.as_ref().and_then(|e| e.query.as_deref())
    }

    /// Checks the presence invariants for this action's kind.
    pub fn validate(&self) -> Result<(), SchemaParseError> {
        let missing = |field| SchemaParseError::MissingField {
            kind: self.kind.to_string(),
            field,
        };
        let event = self.event.as_ref();
        match self.kind {
            ActionKind::Create => {
                let event = event.ok_or_else(|| missing("summary"))?;
                if event.summary.is_none() {
                    return Err(missing("summary"));
                }
                if event.start.is_none() {
                    return Err(missing("start"));
                }
                if event.end.is_none() {
                    return Err(missing("end"));
                }
            }
            ActionKind::Search | ActionKind::Delete => {
                if self.query().is_none() {
                    return Err(missing("query"));
                }
            }
            ActionKind::Update => {
                if self.query().is_none() {
                    return Err(missing("query"));
                }
                if event.and_then(|e| e.updated_fields.as_ref()).is_none() {
                    return Err(missing("updated_fields"));
                }
            }
            ActionKind::Get | ActionKind::Unknown(_) => {}
        }
        Ok(())
    }
}

/// Parses a model reply into a validated [`Action`].
///
/// Accepts bare JSON, JSON inside a Markdown code fence, or a JSON object
/// surrounded by prose (the outermost `{...}` is used).
pub fn parse_action(raw: &str) -> Result<Action, SchemaParseError> {
    let candidate = json_candidate(raw);
    let action: Action =
        serde_json::from_str(candidate).map_err(|source| SchemaParseError::InvalidJson {
            source,
            raw: raw.to_string(),
        })?;
    action.validate()?;
    Ok(action)
}

fn json_candidate(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Instructions embedded in the calendar prompt describing the reply format.
pub fn format_instructions() -> String {
    let event_time = json!({
        "type": "object",
        "properties": {
            "dateTime": {"type": "string", "description": "RFC 3339 date-time, e.g. 2024-12-28T16:25:00+09:00"},
            "timeZone": {"type": "string", "description": "IANA time zone, e.g. Asia/Tokyo"}
        }
    });
    let schema = json!({
        "type": "object",
        "properties": {
            "action": {
                "type": "string",
                "enum": ["get", "create", "search", "update", "delete"],
                "description": "The action to be performed."
            },
            "event_data": {
                "type": "object",
                "description": "The data for the event or query.",
                "properties": {
                    "summary": {"type": "string", "description": "The summary of the event."},
                    "start": event_time,
                    "end": event_time,
                    "query": {"type": "string", "description": "The search query to find matching events."},
                    "updated_fields": {
                        "type": "object",
                        "description": "Fields to change on every matching event, such as summary, start and end."
                    }
                }
            }
        },
        "required": ["action"]
    });
    format!(
        "The output should be a single JSON object that conforms to the JSON schema below, with no other text.\n\
         'create' needs summary, start and end; 'search' and 'delete' need query; \
         'update' needs query and updated_fields.\n\n{schema:#}"
    )
}
