// The `imap_client` module implements `Mailbox` over IMAP with TLS.

use crate::config::{MailConfig, MailCredentials};
use crate::mailbox::{EmailMessage, MailError, MailSession, Mailbox, fetch_unseen};
use async_trait::async_trait;
use encoding_rs::Encoding;
use native_tls::{TlsConnector, TlsStream};
use std::io::{Read, Write};
use std::net::TcpStream;
use tracing::{debug, info};

pub type ImapSession = imap::Session<TlsStream<TcpStream>>;

impl<T: Read + Write> MailSession for imap::Session<T> {
    fn select_mailbox(&mut self, mailbox: &str) -> Result<(), MailError> {
        self.select(mailbox)?;
        Ok(())
    }

    fn search_unseen(&mut self) -> Result<Vec<u32>, MailError> {
        Ok(self.search("UNSEEN")?.into_iter().collect())
    }

    fn fetch_raw(&mut self, seq: u32) -> Result<Vec<u8>, MailError> {
        let fetches = self.fetch(seq.to_string(), "RFC822")?;
        fetches
            .iter()
            .find_map(|fetch| fetch.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| MailError::Transport(format!("No body returned for message {seq}")))
    }

    fn mark_unseen(&mut self, seq: u32) -> Result<(), MailError> {
        self.store(seq.to_string(), "-FLAGS (\\Seen)")?;
        Ok(())
    }
}

/// A logged-in IMAP session bound to one mailbox.
///
/// The underlying client is blocking; every call runs on tokio's blocking
/// pool.
pub struct ImapMailbox {
    session: Option<ImapSession>,
    mailbox: String,
    fallback: &'static Encoding,
}

impl ImapMailbox {
    pub async fn connect(config: &MailConfig, credentials: &MailCredentials) -> Result<Self, MailError> {
        let host = config.host.clone();
        let port = config.port;
        let credentials = credentials.clone();
        info!(%host, port, user = %credentials.user, "Connecting to IMAP server");

        let session = tokio::task::spawn_blocking(move || login(&host, port, &credentials))
            .await
            .map_err(|e| MailError::Transport(e.to_string()))??;

        Ok(Self {
            session: Some(session),
            mailbox: config.mailbox.clone(),
            fallback: config.fallback_encoding,
        })
    }

    pub async fn logout(mut self) -> Result<(), MailError> {
        let Some(mut session) = self.session.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || session.logout())
            .await
            .map_err(|e| MailError::Transport(e.to_string()))??;
        debug!("IMAP session closed");
        Ok(())
    }
}

fn login(host: &str, port: u16, credentials: &MailCredentials) -> Result<ImapSession, MailError> {
    let tls = TlsConnector::builder()
        .build()
        .map_err(|e| MailError::Transport(e.to_string()))?;
    let client = imap::connect((host, port), host, &tls)?;
    client
        .login(&credentials.user, &credentials.password)
        .map_err(|(e, _)| MailError::Auth {
            user: credentials.user.clone(),
            message: e.to_string(),
        })
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn fetch_unseen(&mut self, limit: usize) -> Result<Vec<EmailMessage>, MailError> {
        let mut session = self.session.take().ok_or(MailError::SessionClosed)?;
        let mailbox = self.mailbox.clone();
        let fallback = self.fallback;

        let (session, result) = tokio::task::spawn_blocking(move || {
            let result = fetch_unseen(&mut session, &mailbox, limit, fallback);
            (session, result)
        })
        .await
        .map_err(|e| MailError::Transport(e.to_string()))?;

        self.session = Some(session);
        result
    }
}
