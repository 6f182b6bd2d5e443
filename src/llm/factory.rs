use crate::llm::core::{LLM, LLMError};
use rig::client::CompletionClient;
use rig::providers::{gemini, openai};
use std::str::FromStr;

/// Completion backends the assistant knows how to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    #[default]
    OpenAI,
    Gemini,
}

impl LlmProvider {
    /// Model used when `LLM_MODEL` is not set.
    pub fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.0-flash",
        }
    }

    /// Environment variable holding the provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = LLMError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAI),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(LLMError::ConfigError(format!(
                "unknown LLM provider '{other}'"
            ))),
        }
    }
}

/// Settings needed to build one completion backend.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub temperature: f64,
    pub api_key: Option<String>,
}

/// Builds boxed [`LLM`] instances from configuration.
///
/// Each orchestrator owns its own backend, mirroring the two independent
/// chat models of the pipeline, so the factory is called once per
/// orchestrator.
pub struct LLMFactory;

impl LLMFactory {
    /// Creates a rig agent for the configured provider.
    ///
    /// Fails with [`LLMError::ConfigError`] when no API key is configured.
    pub fn create(config: &LlmConfig) -> Result<Box<dyn LLM>, LLMError> {
        let api_key = config.api_key.as_deref().ok_or_else(|| {
            LLMError::ConfigError(format!("{} is not set", config.provider.api_key_var()))
        })?;

        tracing::debug!(
            provider = ?config.provider,
            model = %config.model,
            temperature = config.temperature,
            "Building completion backend"
        );

        let llm: Box<dyn LLM> = match config.provider {
            LlmProvider::OpenAI => Box::new(
                openai::Client::new(api_key)
                    .agent(&config.model)
                    .temperature(config.temperature)
                    .build(),
            ),
            LlmProvider::Gemini => Box::new(
                gemini::Client::new(api_key)
                    .agent(&config.model)
                    .temperature(config.temperature)
                    .build(),
            ),
        };
        Ok(llm)
    }
}
