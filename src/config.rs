// The `config` module gathers settings from the environment and credential files.

use crate::calendar::DEFAULT_CALENDAR_ID;
use crate::llm::{LlmConfig, LlmProvider};
use crate::mailbox::decode::{DEFAULT_FALLBACK_ENCODING, encoding_for_label};
use crate::utils::google_auth::GConf;
use encoding_rs::Encoding;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid mail credentials in {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Invalid value for {name}: {message}")]
    InvalidVar { name: &'static str, message: String },
}

/// IMAP login, read from a YAML file with `user` and `password` keys.
#[derive(Clone, Deserialize)]
pub struct MailCredentials {
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for MailCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailCredentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

impl MailCredentials {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = read_file(path)?;
        serde_yaml::from_str(&text).map_err(|source| ConfigError::Credentials {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub mailbox: String,
    pub fetch_limit: usize,
    /// Header charset used when the subject does not name one.
    pub fallback_encoding: &'static Encoding,
    pub credentials_path: PathBuf,
    /// Template overriding the built-in mail prompt.
    pub prompt_template: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            host: "imap.gmail.com".to_string(),
            port: 993,
            mailbox: "INBOX".to_string(),
            fetch_limit: 5,
            fallback_encoding: encoding_rs::ISO_2022_JP,
            credentials_path: PathBuf::from("credentials.yml"),
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalendarConfig {
    pub credentials_path: PathBuf,
    pub token_path: PathBuf,
    pub calendar_id: String,
    pub time_zone: String,
    /// Template overriding the built-in calendar prompt.
    pub prompt_template: Option<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            credentials_path: PathBuf::from("credentials.json"),
            token_path: PathBuf::from("token.json"),
            calendar_id: DEFAULT_CALENDAR_ID.to_string(),
            time_zone: "JST".to_string(),
            prompt_template: None,
        }
    }
}

impl CalendarConfig {
    pub fn gconf(&self) -> GConf {
        GConf::new(self.credentials_path.clone(), self.token_path.clone())
    }
}

/// Everything the assistant binaries need.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub calendar: CalendarConfig,
    pub mail: MailConfig,
    pub llm: LlmConfig,
    /// Earlier conversation, passed verbatim to both prompts.
    pub chat_history: String,
}

impl AssistantConfig {
    /// Loads `.env` if present, then reads the environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let calendar_defaults = CalendarConfig::default();
        let calendar = CalendarConfig {
            credentials_path: var("CALENDAR_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(calendar_defaults.credentials_path),
            token_path: var("CALENDAR_TOKEN_PATH")
                .map(PathBuf::from)
                .unwrap_or(calendar_defaults.token_path),
            calendar_id: var("CALENDAR_ID").unwrap_or(calendar_defaults.calendar_id),
            time_zone: var("CALENDAR_TIME_ZONE").unwrap_or(calendar_defaults.time_zone),
            prompt_template: var("CALENDAR_PROMPT_PATH")
                .map(|p| read_file(Path::new(&p)))
                .transpose()?,
        };

        let mail_defaults = MailConfig::default();
        let fallback_label =
            var("MAIL_FALLBACK_ENCODING").unwrap_or_else(|| DEFAULT_FALLBACK_ENCODING.to_string());
        let mail = MailConfig {
            host: var("MAIL_IMAP_HOST").unwrap_or(mail_defaults.host),
            port: parse_var(&var, "MAIL_IMAP_PORT")?.unwrap_or(mail_defaults.port),
            mailbox: var("MAIL_MAILBOX").unwrap_or(mail_defaults.mailbox),
            fetch_limit: parse_var(&var, "MAIL_FETCH_LIMIT")?.unwrap_or(mail_defaults.fetch_limit),
            fallback_encoding: encoding_for_label(&fallback_label).ok_or_else(|| {
                ConfigError::InvalidVar {
                    name: "MAIL_FALLBACK_ENCODING",
                    message: format!("unknown encoding '{fallback_label}'"),
                }
            })?,
            credentials_path: var("MAIL_CREDENTIALS_PATH")
                .map(PathBuf::from)
                .unwrap_or(mail_defaults.credentials_path),
            prompt_template: var("MAIL_PROMPT_PATH")
                .map(|p| read_file(Path::new(&p)))
                .transpose()?,
        };

        let provider: LlmProvider = parse_var(&var, "LLM_PROVIDER")?.unwrap_or_default();
        let llm = LlmConfig {
            model: var("LLM_MODEL").unwrap_or_else(|| provider.default_model().to_string()),
            temperature: parse_var(&var, "LLM_TEMPERATURE")?.unwrap_or(0.0),
            api_key: var(provider.api_key_var()),
            provider,
        };

        Ok(Self {
            calendar,
            mail,
            llm,
            chat_history: lookup("CHAT_HISTORY").unwrap_or_default(),
        })
    }
}

fn parse_var<T, V>(var: &V, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidVar {
                name,
                message: e.to_string(),
            })
        })
        .transpose()
}

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
