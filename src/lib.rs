//! # mailcal: turns unread email into Google Calendar changes through an LLM.

/// The `calendar` module wraps the calendar provider and applies actions to it.
pub mod calendar;
/// The `config` module reads settings from the environment and credential files.
pub mod config;
/// The `itinerary` module exports flight itineraries as iCalendar files.
pub mod itinerary;
/// The `llm` module provides a trait for interacting with language models.
pub mod llm;
/// The `mailbox` module fetches and decodes unread mail.
pub mod mailbox;
/// The `orchestrator` module renders prompts and interprets the model's replies.
pub mod orchestrator;
/// The `pipeline` module chains mailbox, orchestrators and calendar.
pub mod pipeline;
/// The `schema` module defines the calendar action contract.
pub mod schema;
/// The `utils` module provides authentication and templating helpers.
pub mod utils;

pub use calendar::{ActionDispatcher, CalendarClient, DispatchOutcome, GoogleCalendar};
pub use config::AssistantConfig;
pub use mailbox::{EmailMessage, ImapMailbox, Mailbox};
pub use orchestrator::{CalendarOrchestrator, MailOrchestrator};
pub use pipeline::{Pipeline, PipelineReport};
pub use schema::{Action, ActionKind};
