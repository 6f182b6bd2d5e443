// The `google_auth` module authenticates against the Google Calendar API.

use google_calendar3::{
    CalendarHub,
    api::Scope,
    yup_oauth2::{self, InstalledFlowAuthenticator, InstalledFlowReturnMethod},
};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::{client::legacy::Client, client::legacy::connect::HttpConnector, rt::TokioExecutor};
use rustls::crypto::{CryptoProvider, ring::default_provider};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// A type alias for the HTTPS connector.
pub type HttpsConnectorType = HttpsConnector<HttpConnector>;
/// A type alias for the authenticated calendar hub.
pub type CalendarHubType = CalendarHub<HttpsConnectorType>;

/// Failures while obtaining calendar credentials. All of them are fatal.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The OAuth client-secret file is missing or unreadable.
    #[error("Cannot read OAuth client secret {path}: {source}")]
    MissingSecret {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The installed-app authenticator could not be built.
    #[error("Cannot build OAuth authenticator: {0}")]
    Authenticator(#[source] std::io::Error),
    /// The interactive flow finished without a usable token.
    #[error("OAuth token request failed: {0}")]
    Token(String),
    /// The TLS connector could not load the platform roots.
    #[error("Cannot load TLS roots: {0}")]
    Tls(#[source] std::io::Error),
}

/// Where calendar credentials live on disk.
#[derive(Clone, Debug)]
pub struct GConf(Arc<InnerConf>);

/// The inner configuration for `GConf`.
#[derive(Clone, Debug)]
pub struct InnerConf {
    /// The OAuth client-secret file downloaded from the Google console.
    pub credentials_path: PathBuf,
    /// Token cache written by the authenticator after the first consent.
    pub token_path: PathBuf,
}

impl GConf {
    /// Creates a new `GConf`.
    pub fn new(credentials_path: PathBuf, token_path: PathBuf) -> GConf {
        GConf(Arc::new(InnerConf {
            credentials_path,
            token_path,
        }))
    }

    pub fn credentials_path(&self) -> &PathBuf {
        &self.0.credentials_path
    }

    pub fn token_path(&self) -> &PathBuf {
        &self.0.token_path
    }
}

/// Runs the installed-app OAuth flow and returns an authenticated hub.
///
/// The first run opens a local redirect listener and asks the user for
/// consent; later runs reuse the token cache.
pub async fn calendar_auth(conf: &GConf, scopes: &[Scope]) -> Result<CalendarHubType, AuthError> {
    info!(credentials = %conf.credentials_path().display(), "Authenticating with Google Calendar API");

    let secret = yup_oauth2::read_application_secret(conf.credentials_path())
        .await
        .map_err(|source| AuthError::MissingSecret {
            path: conf.credentials_path().clone(),
            source,
        })?;

    let auth = InstalledFlowAuthenticator::builder(secret, InstalledFlowReturnMethod::HTTPRedirect)
        .persist_tokens_to_disk(conf.token_path())
        .build()
        .await
        .map_err(AuthError::Authenticator)?;

    // Request the token up front so a bad secret fails here, not mid-run.
    auth.token(scopes)
        .await
        .map_err(|e| AuthError::Token(e.to_string()))?;

    _ = CryptoProvider::install_default(default_provider());

    let https = HttpsConnectorBuilder::new()
        .with_native_roots()
        .map_err(AuthError::Tls)?
        .https_or_http()
        .enable_http1()
        .build();

    let client = Client::builder(TokioExecutor::new()).build(https);

    let hub = CalendarHub::new(client, auth);
    info!("Successfully authenticated with Google Calendar API");
    Ok(hub)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_secret_is_reported_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let conf = GConf::new(dir.path().join("credentials.json"), dir.path().join("token.json"));

        let result = calendar_auth(&conf, &[Scope::Full]).await;

        match result {
            Err(AuthError::MissingSecret { path, .. }) => {
                assert!(path.ends_with("credentials.json"))
            }
            Err(e) => panic!("Expected MissingSecret, got {e}"),
            Ok(_) => panic!("Expected MissingSecret, got a hub"),
        }
    }
}
