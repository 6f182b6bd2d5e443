// The `utils` module holds the Google OAuth helper and the prompt renderer.

pub mod google_auth;
pub mod template;

pub use crate::utils::template::{TEngine, TEngineError};
