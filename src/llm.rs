// The `llm` module provides the completion seam used by both orchestrators.

pub mod adapters;
pub mod core;
pub mod factory;

pub use self::core::{LLM, LLMError};
pub use self::factory::{LLMFactory, LlmConfig, LlmProvider};
