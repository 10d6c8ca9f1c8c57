use crate::{
    block::TAG,
    error::{Error, Result},
};
use std::{fs, path::Path};
use tera::{Context, Tera};
use tracing::{debug, warn};

const SYSTEM_TEMPLATE: &str = "system";
const MESSAGE_TEMPLATE: &str = "message";

/// Maximum external template size (1MB)
const MAX_TEMPLATE_SIZE: u64 = 1024 * 1024;

/// Tera templates for the system prompt and the user message.
pub struct PromptTemplates {
    tera: Tera,
}

impl PromptTemplates {
    /// Creates the built-in templates.
    ///
    /// # Errors
    ///
    /// Returns an error if a built-in template fails to compile.
    pub fn builtin() -> Result<Self> {
        let mut tera = Tera::default();

        tera.add_raw_template(SYSTEM_TEMPLATE, include_str!("../templates/system.tera"))
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, &e))?;

        tera.add_raw_template(MESSAGE_TEMPLATE, include_str!("../templates/message.tera"))
            .map_err(|e| Error::template(MESSAGE_TEMPLATE, &e))?;

        Ok(Self { tera })
    }

    /// Creates the templates, replacing the system prompt with `system_template` if given.
    ///
    /// # Errors
    ///
    /// Returns an error if the external template is unreadable or invalid.
    pub fn new(system_template: Option<&Path>) -> Result<Self> {
        let mut templates = Self::builtin()?;

        if let Some(path) = system_template {
            let content = Self::read_system_template(path)?;
            templates
                .tera
                .add_raw_template(SYSTEM_TEMPLATE, &content)
                .map_err(|e| Error::template(path.display().to_string(), &e))?;
            debug!("Using system template from {}", path.display());
        }

        Ok(templates)
    }

    /// Checks that an external system template can be loaded and compiled.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, too large, empty or fails to compile.
    pub fn validate_system_template(path: &Path) -> Result<()> {
        let content = Self::read_system_template(path)?;

        Tera::default()
            .add_raw_template("validation", &content)
            .map_err(|e| Error::template(path.display().to_string(), &e))?;

        if !content.contains("tag") && !content.contains(TAG) {
            warn!(
                "System template {} never mentions the [{}] markers; responses may not decode",
                path.display(),
                TAG
            );
        }

        Ok(())
    }

    fn read_system_template(path: &Path) -> Result<String> {
        let metadata = fs::metadata(path).map_err(|e| Error::io(path, e))?;
        if metadata.len() > MAX_TEMPLATE_SIZE {
            return Err(Error::config(format!(
                "Template file too large: {} bytes (max: {} bytes)",
                metadata.len(),
                MAX_TEMPLATE_SIZE
            )));
        }

        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        if content.trim().is_empty() {
            return Err(Error::config(format!(
                "Template file is empty: {}",
                path.display()
            )));
        }

        Ok(content)
    }

    /// Renders the system prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render_system(&self) -> Result<String> {
        let mut context = Context::new();
        context.insert("tag", TAG);

        self.tera
            .render(SYSTEM_TEMPLATE, &context)
            .map_err(|e| Error::template(SYSTEM_TEMPLATE, &e))
    }

    /// Renders the user message: encoded body, separator, question and reminder.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    pub fn render_message(&self, body: &str, question: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("tag", TAG);
        context.insert("body", body);
        context.insert("question", question);

        self.tera
            .render(MESSAGE_TEMPLATE, &context)
            .map_err(|e| Error::template(MESSAGE_TEMPLATE, &e))
    }
}
