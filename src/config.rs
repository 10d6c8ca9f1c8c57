use crate::error::{Error, Result};
use crate::filter::FileFilterConfig;
use std::path::PathBuf;

const DEFAULT_DEBUG_LOG: &str = ".messages.md";
const DEFAULT_RESPONSE_PATH: &str = ".response.md";
const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";
const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MAX_TOKENS: u32 = 60_000;
const DEFAULT_THINKING_TOKENS: u32 = 16_000;
const DEFAULT_TEMPERATURE: f32 = 1.0;

/// Environment variable consulted when no API key is configured.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Configuration shared by the `prompt` and `apply` flows.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Project root scanned when no explicit files are given
    pub root_dir: PathBuf,

    /// Where the composed prompt is written for inspection (overwritten each run)
    pub debug_log_path: PathBuf,

    /// Where the assembled model response is written
    pub response_path: PathBuf,

    /// Model identifier
    pub model: String,

    /// Base URL of the model API
    pub api_base_url: String,

    /// API key; falls back to `ANTHROPIC_API_KEY` when unset
    pub api_key: Option<String>,

    /// Maximum tokens in the response
    pub max_tokens: u32,

    /// Token budget for extended thinking (0 disables thinking)
    pub thinking_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Path filtering for project discovery
    pub file_filter_config: FileFilterConfig,

    /// External template replacing the built-in system prompt
    pub system_template: Option<PathBuf>,

    /// Decode and report without writing files
    pub dry_run: bool,

    /// Keep a timestamped copy of files before overwriting them
    pub backup_existing: bool,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use llm_blocks::Config;
    ///
    /// let config = Config::builder()
    ///     .root_dir(".")
    ///     .max_tokens(32_000)
    ///     .thinking_tokens(8_000)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Root directory doesn't exist
    /// - Token limits are inconsistent
    /// - Temperature is out of range
    /// - The system template is missing or does not compile
    pub fn validate(&self) -> Result<()> {
        if !self.root_dir.is_dir() {
            return Err(Error::config(format!(
                "Root path is not a directory: {}",
                self.root_dir.display()
            )));
        }

        if self.max_tokens == 0 {
            return Err(Error::config("max_tokens must be greater than 0"));
        }

        if self.thinking_tokens >= self.max_tokens {
            return Err(Error::config(format!(
                "thinking_tokens ({}) must be less than max_tokens ({})",
                self.thinking_tokens, self.max_tokens
            )));
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be between 0.0 and 1.0, got {}",
                self.temperature
            )));
        }

        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }

        if let Some(ref template_path) = self.system_template {
            if !template_path.is_file() {
                return Err(Error::config(format!(
                    "System template is not a file: {}",
                    template_path.display()
                )));
            }
            crate::template::PromptTemplates::validate_system_template(template_path)?;
        }

        Ok(())
    }

    /// Returns the configured API key or the one from the environment.
    #[must_use]
    pub fn resolved_api_key(&self) -> Option<String> {
        let non_blank = |key: &String| !key.trim().is_empty();

        self.api_key
            .clone()
            .filter(non_blank)
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(non_blank))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("."),
            debug_log_path: PathBuf::from(DEFAULT_DEBUG_LOG),
            response_path: PathBuf::from(DEFAULT_RESPONSE_PATH),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            thinking_tokens: DEFAULT_THINKING_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            file_filter_config: FileFilterConfig::default(),
            system_template: None,
            dry_run: false,
            backup_existing: false,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    root_dir: Option<PathBuf>,
    debug_log_path: Option<PathBuf>,
    response_path: Option<PathBuf>,
    model: Option<String>,
    api_base_url: Option<String>,
    api_key: Option<String>,
    max_tokens: Option<u32>,
    thinking_tokens: Option<u32>,
    temperature: Option<f32>,
    file_filter_config: Option<FileFilterConfig>,
    system_template: Option<PathBuf>,
    dry_run: bool,
    backup_existing: bool,
}

impl ConfigBuilder {
    /// Sets the project root directory.
    #[must_use]
    pub fn root_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_dir = Some(path.into());
        self
    }

    /// Sets the debug log location.
    #[must_use]
    pub fn debug_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_log_path = Some(path.into());
        self
    }

    /// Sets where the model response is written.
    #[must_use]
    pub fn response_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.response_path = Some(path.into());
        self
    }

    /// Sets the model identifier.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the API base URL.
    #[must_use]
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Sets the API key explicitly.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the maximum number of response tokens.
    #[must_use]
    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = Some(tokens);
        self
    }

    /// Sets the extended thinking budget.
    #[must_use]
    pub fn thinking_tokens(mut self, tokens: u32) -> Self {
        self.thinking_tokens = Some(tokens);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the file filtering configuration.
    #[must_use]
    pub fn file_filter_config(mut self, config: FileFilterConfig) -> Self {
        self.file_filter_config = Some(config);
        self
    }

    /// Replaces the built-in system prompt with a Tera template file.
    #[must_use]
    pub fn system_template(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_template = Some(path.into());
        self
    }

    /// Enables dry run mode (no file writes on apply).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Enables or disables backups of overwritten files.
    #[must_use]
    pub fn backup_existing(mut self, enabled: bool) -> Self {
        self.backup_existing = enabled;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            root_dir: self.root_dir.unwrap_or_else(|| PathBuf::from(".")),
            debug_log_path: self
                .debug_log_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DEBUG_LOG)),
            response_path: self
                .response_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESPONSE_PATH)),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_base_url: self
                .api_base_url
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            api_key: self.api_key,
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            thinking_tokens: self.thinking_tokens.unwrap_or(DEFAULT_THINKING_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            file_filter_config: self.file_filter_config.unwrap_or_default(),
            system_template: self.system_template,
            dry_run: self.dry_run,
            backup_existing: self.backup_existing,
        };

        config.validate()?;
        Ok(config)
    }
}
