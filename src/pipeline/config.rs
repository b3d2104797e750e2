//! Batch configuration.
//!
//! Values are layered: defaults, then an optional YAML file, then
//! `CASEFORGE_*` environment variables, then CLI flags (applied by the
//! caller through the `with_*` builders). [`BatchConfig::validate`] runs last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::export::TableFormat;
use crate::llm::{ProviderKind, ProviderSettings};
use crate::schema::Department;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The selected provider has no API key.
    #[error("Missing credential for {provider}: set {env_var} or pass --api-key")]
    MissingCredential {
        provider: ProviderKind,
        env_var: &'static str,
    },

    /// An environment variable or file entry has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// IO error while reading configuration.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML for [`FileConfig`].
    #[error("Invalid configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Settings for one generation batch.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    // Batch shape
    /// Number of records to generate.
    pub record_count: usize,
    /// Maximum number of record pipelines in flight at once.
    pub concurrency_limit: usize,
    /// Size of the representative roster built before the batch.
    pub representative_count: usize,

    // LLM settings
    pub provider: ProviderKind,
    /// Model override; `None` uses the provider default.
    pub model: Option<String>,
    /// Sampling temperature, 0.0 to 2.0.
    pub temperature: f64,
    pub max_tokens: u32,
    pub request_timeout: Duration,
    /// Endpoint override, mostly for proxies and tests.
    pub api_base: Option<String>,
    /// API key; when unset it is read from the provider's variable.
    pub api_key: Option<String>,
    /// Seed for the local sampler. `None` draws a fresh seed.
    pub seed: Option<u64>,

    // Output settings
    pub log_path: PathBuf,
    pub table_path: PathBuf,
    /// Draw a progress bar while the batch runs.
    pub show_progress: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            record_count: 10,
            concurrency_limit: 5,
            representative_count: 4,

            provider: ProviderKind::OpenAi,
            model: None,
            temperature: 0.7,
            max_tokens: 1024,
            request_timeout: Duration::from_secs(120),
            api_base: None,
            api_key: None,
            seed: None,

            log_path: PathBuf::from("data/output.jsonl"),
            table_path: PathBuf::from("data/output.xlsx"),
            show_progress: true,
        }
    }
}

/// Shape of a `--config` YAML file. Every key is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub record_count: Option<usize>,
    pub concurrency_limit: Option<usize>,
    pub representative_count: Option<usize>,
    pub provider: Option<ProviderKind>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub api_base: Option<String>,
    pub seed: Option<u64>,
    pub log_path: Option<PathBuf>,
    pub table_path: Option<PathBuf>,
    pub show_progress: Option<bool>,
}

impl BatchConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, overlaid with `file` when given, then with the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(path) = file {
            config.apply_file(&FileConfig::from_path(path)?);
        }
        config.apply_env_with(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlays values from a parsed configuration file.
    pub fn apply_file(&mut self, file: &FileConfig) {
        if let Some(v) = file.record_count {
            self.record_count = v;
        }
        if let Some(v) = file.concurrency_limit {
            self.concurrency_limit = v;
        }
        if let Some(v) = file.representative_count {
            self.representative_count = v;
        }
        if let Some(v) = file.provider {
            self.provider = v;
        }
        if let Some(v) = &file.model {
            self.model = Some(v.clone());
        }
        if let Some(v) = file.temperature {
            self.temperature = v;
        }
        if let Some(v) = file.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = file.request_timeout_secs {
            self.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = &file.api_base {
            self.api_base = Some(v.clone());
        }
        if let Some(v) = file.seed {
            self.seed = Some(v);
        }
        if let Some(v) = &file.log_path {
            self.log_path = v.clone();
        }
        if let Some(v) = &file.table_path {
            self.table_path = v.clone();
        }
        if let Some(v) = file.show_progress {
            self.show_progress = v;
        }
    }

    /// Overlays `CASEFORGE_*` values produced by `lookup`.
    ///
    /// # Environment Variables
    ///
    /// - `CASEFORGE_RECORD_COUNT`: Records to generate (default: 10)
    /// - `CASEFORGE_CONCURRENCY_LIMIT`: Pipelines in flight (default: 5)
    /// - `CASEFORGE_REPRESENTATIVE_COUNT`: Roster size (default: 4)
    /// - `CASEFORGE_PROVIDER`: `openai` or `gemini` (default: openai)
    /// - `CASEFORGE_MODEL`: Model override
    /// - `CASEFORGE_TEMPERATURE`: Sampling temperature (default: 0.7)
    /// - `CASEFORGE_MAX_TOKENS`: Completion token cap (default: 1024)
    /// - `CASEFORGE_REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 120)
    /// - `CASEFORGE_API_BASE`: Endpoint override
    /// - `CASEFORGE_SEED`: Sampler seed
    /// - `CASEFORGE_LOG_PATH`: Record log (default: data/output.jsonl)
    /// - `CASEFORGE_TABLE_PATH`: Tabular export, `.xlsx` or `.parquet` (default: data/output.xlsx)
    /// - `CASEFORGE_PROGRESS`: Show the progress bar (default: true)
    ///
    /// Unset variables leave the current value. The API key is not read
    /// here; see [`BatchConfig::provider_settings`].
    pub fn apply_env_with(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(val) = lookup("CASEFORGE_RECORD_COUNT") {
            self.record_count = parse_env_value(&val, "CASEFORGE_RECORD_COUNT")?;
        }
        if let Some(val) = lookup("CASEFORGE_CONCURRENCY_LIMIT") {
            self.concurrency_limit = parse_env_value(&val, "CASEFORGE_CONCURRENCY_LIMIT")?;
        }
        if let Some(val) = lookup("CASEFORGE_REPRESENTATIVE_COUNT") {
            self.representative_count = parse_env_value(&val, "CASEFORGE_REPRESENTATIVE_COUNT")?;
        }

        if let Some(val) = lookup("CASEFORGE_PROVIDER") {
            self.provider = val.parse().map_err(|message| ConfigError::InvalidValue {
                key: "CASEFORGE_PROVIDER".to_string(),
                message,
            })?;
        }
        if let Some(val) = lookup("CASEFORGE_MODEL") {
            self.model = Some(val);
        }
        if let Some(val) = lookup("CASEFORGE_TEMPERATURE") {
            self.temperature = parse_env_value(&val, "CASEFORGE_TEMPERATURE")?;
        }
        if let Some(val) = lookup("CASEFORGE_MAX_TOKENS") {
            self.max_tokens = parse_env_value(&val, "CASEFORGE_MAX_TOKENS")?;
        }
        if let Some(val) = lookup("CASEFORGE_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = parse_env_value(&val, "CASEFORGE_REQUEST_TIMEOUT_SECS")?;
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(val) = lookup("CASEFORGE_API_BASE") {
            self.api_base = Some(val);
        }
        if let Some(val) = lookup("CASEFORGE_SEED") {
            self.seed = Some(parse_env_value(&val, "CASEFORGE_SEED")?);
        }

        if let Some(val) = lookup("CASEFORGE_LOG_PATH") {
            self.log_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("CASEFORGE_TABLE_PATH") {
            self.table_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("CASEFORGE_PROGRESS") {
            self.show_progress = parse_env_bool(&val, "CASEFORGE_PROGRESS")?;
        }
        Ok(())
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` if any values are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.record_count == 0 {
            return Err(ConfigError::ValidationFailed(
                "record_count must be greater than 0".to_string(),
            ));
        }

        if self.concurrency_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "concurrency_limit must be greater than 0".to_string(),
            ));
        }

        let departments = Department::ALL.len();
        if self.representative_count < departments {
            return Err(ConfigError::ValidationFailed(format!(
                "representative_count must be at least {departments} (one per department)"
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationFailed(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed(
                "model cannot be empty".to_string(),
            ));
        }

        if self.log_path.as_os_str().is_empty() || self.table_path.as_os_str().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "log_path and table_path cannot be empty".to_string(),
            ));
        }

        if self.log_path == self.table_path {
            return Err(ConfigError::ValidationFailed(
                "log_path and table_path must differ".to_string(),
            ));
        }

        TableFormat::from_path(&self.table_path)
            .map_err(|e| ConfigError::ValidationFailed(format!("table_path: {e}")))?;

        Ok(())
    }

    /// Model used for every call.
    pub fn effective_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Provider settings, reading the API key from the environment if unset.
    pub fn provider_settings(&self) -> Result<ProviderSettings, ConfigError> {
        self.provider_settings_with(|key| std::env::var(key).ok())
    }

    /// Provider settings, resolving a missing API key through `lookup`.
    pub fn provider_settings_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<ProviderSettings, ConfigError> {
        let env_var = self.provider.api_key_env();
        let api_key = self
            .api_key
            .clone()
            .or_else(|| lookup(env_var))
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingCredential {
                provider: self.provider,
                env_var,
            })?;

        let mut settings = ProviderSettings::new(self.provider, api_key)
            .with_model(self.effective_model())
            .with_timeout(self.request_timeout);
        if let Some(base) = &self.api_base {
            settings = settings.with_base_url(base.clone());
        }
        Ok(settings)
    }

    /// Builder method to set the record count.
    pub fn with_record_count(mut self, count: usize) -> Self {
        self.record_count = count;
        self
    }

    /// Builder method to set the concurrency limit.
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    /// Builder method to set the roster size.
    pub fn with_representative_count(mut self, count: usize) -> Self {
        self.representative_count = count;
        self
    }

    /// Builder method to set the provider.
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// Builder method to set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Builder method to set temperature.
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = Some(base.into());
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method to set the record log path.
    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Builder method to set the tabular export path.
    pub fn with_table_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.table_path = path.into();
        self
    }

    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }
}

impl FileConfig {
    /// Reads and parses a YAML configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
