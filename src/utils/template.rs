use handlebars::{Handlebars, no_escape};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TEngineError {
    #[error("Template error: {0}")]
    TemplateError(#[from] handlebars::TemplateError),
    #[error("Render error: {0}")]
    RenderError(#[from] handlebars::RenderError),
}

/// Prompt renderer.
///
/// Strict mode is always on: a placeholder the caller did not supply is a
/// render error, never an empty string. Escaping is off because prompts embed
/// JSON (format instructions, email content) that must reach the model as-is.
pub struct TEngine {
    handlebars: Handlebars<'static>,
}

impl Default for TEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        handlebars.set_strict_mode(true);
        TEngine { handlebars }
    }

    /// Compiles `template` under `name`; syntax errors surface here.
    pub fn register_template_string(
        &mut self,
        name: &str,
        template: &str,
    ) -> Result<(), TEngineError> {
        self.handlebars.register_template_string(name, template)?;
        Ok(())
    }

    /// Renders a template previously registered under `name`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String, TEngineError> {
        Ok(self.handlebars.render(name, data)?)
    }
}
