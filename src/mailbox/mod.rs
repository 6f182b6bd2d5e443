// The `mailbox` module reads unread mail and hands it over as `EmailMessage`s.

pub mod decode;
pub mod imap_client;

use async_trait::async_trait;
use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

pub use decode::{DEFAULT_FALLBACK_ENCODING, decode_message};
pub use imap_client::ImapMailbox;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("IMAP login rejected for {user}: {message}")]
    Auth { user: String, message: String },
    #[error("IMAP transport error: {0}")]
    Transport(String),
    #[error("Cannot parse message: {0}")]
    Parse(String),
    #[error("Mailbox session is closed")]
    SessionClosed,
}

impl From<imap::Error> for MailError {
    fn from(error: imap::Error) -> Self {
        MailError::Transport(error.to_string())
    }
}

/// One decoded email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub from: String,
    pub subject: String,
    /// `%Y/%m/%d %H:%M:%S`, or the raw header when it cannot be parsed.
    pub date: String,
    /// First `text/plain` part; empty for multipart mail without one.
    pub body: String,
}

/// The IMAP commands the fetch algorithm needs.
pub trait MailSession {
    fn select_mailbox(&mut self, mailbox: &str) -> Result<(), MailError>;
    fn search_unseen(&mut self) -> Result<Vec<u32>, MailError>;
    /// Full RFC 822 source of one message. Fetching sets `\Seen`.
    fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>, MailError>;
    fn mark_unseen(&mut self, seq: u32) -> Result<(), MailError>;
}

/// Fetches up to `limit` unseen messages, lowest sequence number first.
///
/// Every fetched message gets its unseen flag back. A message that cannot be
/// parsed is skipped with a warning; a failed flag restore is only logged.
pub fn fetch_unseen<S: MailSession + ?Sized>(
    session: &mut S,
    mailbox: &str,
    limit: usize,
    fallback: &'static Encoding,
) -> Result<Vec<EmailMessage>, MailError> {
    session.select_mailbox(mailbox)?;
    let mut ids = session.search_unseen()?;
    ids.sort_unstable();
    info!(mailbox, unseen = ids.len(), "Number of emails");

    let mut messages = Vec::new();
    for seq in ids.into_iter().take(limit) {
        let raw = session.fetch_raw(seq)?;
        match decode_message(&raw, fallback) {
            Ok(message) => {
                info!(seq, from = %message.from, subject = %message.subject, "Fetched email");
                messages.push(message);
            }
            Err(e) => warn!(seq, error = %e, "Skipping undecodable email"),
        }
        if let Err(e) = session.mark_unseen(seq) {
            warn!(seq, error = %e, "Failed to restore unseen flag");
        }
    }
    Ok(messages)
}

/// Source of unread mail for the pipeline.
#[async_trait]
pub trait Mailbox: Send {
    async fn fetch_unseen(&mut self, limit: usize) -> Result<Vec<EmailMessage>, MailError>;
}
