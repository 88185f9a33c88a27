//! Configuration loading, validation, and management for Quillwork.
//!
//! Loads configuration from `~/.quillwork/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quillwork_core::{AssembleDocumentSettings, DocumentType, InterviewFormat, InterviewSettings};
use quillwork_core::service::{DOC_PREVIEW_URL, SAVE_ANSWERS_PAGE_URL, TEMP_INTERVIEW_URL};

/// Interview setting naming the interview theme.
pub const THEME_SETTING: &str = "Theme";

/// The root configuration structure.
///
/// Maps directly to `~/.quillwork/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Remote assembly engine
    #[serde(default)]
    pub service: ServiceConfig,

    /// Defaults for document assembly
    #[serde(default)]
    pub assembly: AssemblyConfig,

    /// Defaults for interviews
    #[serde(default)]
    pub interview: InterviewConfig,

    /// Locator encryption
    #[serde(default)]
    pub locator: LocatorConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the engine, e.g. `https://assembly.example.com/api`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscriber_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_key: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Billing reference recorded in the engine's usage logs
    #[serde(default)]
    pub billing_ref: String,
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            subscriber_id: None,
            signing_key: None,
            timeout_secs: default_timeout_secs(),
            billing_ref: String::new(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("endpoint", &self.endpoint)
            .field("subscriber_id", &self.subscriber_id)
            .field("signing_key", &redact(&self.signing_key))
            .field("timeout_secs", &self.timeout_secs)
            .field("billing_ref", &self.billing_ref)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssemblyConfig {
    #[serde(default)]
    pub retain_transient_answers: bool,

    #[serde(default)]
    pub use_markup_syntax: bool,

    /// Engine settings sent with every assembly
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl AssemblyConfig {
    /// Session-wide assembly defaults. Format stays native; the session sets
    /// it per template.
    pub fn to_settings(&self) -> AssembleDocumentSettings {
        AssembleDocumentSettings {
            format: DocumentType::Native,
            retain_transient_answers: self.retain_transient_answers,
            use_markup_syntax: self.use_markup_syntax,
            settings: self.settings.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterviewConfig {
    #[serde(default)]
    pub format: InterviewFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<String>,

    /// URL interview images are served from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_interview_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_preview_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub save_answers_page_url: Option<String>,

    #[serde(default)]
    pub disable_document_preview: bool,

    #[serde(default)]
    pub disable_save_answers: bool,

    /// Additional engine settings
    #[serde(default)]
    pub settings: BTreeMap<String, String>,
}

impl InterviewConfig {
    /// Session-wide interview defaults. Named fields take precedence over
    /// entries of the same name in `settings`.
    pub fn to_settings(&self) -> InterviewSettings {
        let mut settings = self.settings.clone();
        let named = [
            (THEME_SETTING, &self.theme),
            (TEMP_INTERVIEW_URL, &self.temp_interview_url),
            (DOC_PREVIEW_URL, &self.doc_preview_url),
            (SAVE_ANSWERS_PAGE_URL, &self.save_answers_page_url),
        ];
        for (key, value) in named {
            if let Some(value) = value {
                settings.insert(key.to_string(), value.clone());
            }
        }

        InterviewSettings {
            format: self.format,
            title: None,
            disable_document_preview: self.disable_document_preview,
            disable_save_answers: self.disable_save_answers,
            settings,
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Passphrase locators are encrypted with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl std::fmt::Debug for LocatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocatorConfig")
            .field("key", &redact(&self.key))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.quillwork/config.toml).
    ///
    /// Environment variables override the file:
    /// - `QUILLWORK_ENDPOINT`
    /// - `QUILLWORK_SUBSCRIBER_ID`
    /// - `QUILLWORK_SIGNING_KEY`
    /// - `QUILLWORK_LOCATOR_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from `path`, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(endpoint) = lookup("QUILLWORK_ENDPOINT") {
            self.service.endpoint = Some(endpoint);
        }
        if let Some(subscriber_id) = lookup("QUILLWORK_SUBSCRIBER_ID") {
            self.service.subscriber_id = Some(subscriber_id);
        }
        if let Some(signing_key) = lookup("QUILLWORK_SIGNING_KEY") {
            self.service.signing_key = Some(signing_key);
        }
        if let Some(key) = lookup("QUILLWORK_LOCATOR_KEY") {
            self.locator.key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".quillwork")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "service.timeout_secs must be > 0".into(),
            ));
        }

        if let Some(endpoint) = &self.service.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(ConfigError::ValidationError(format!(
                "service.endpoint must start with http:// or https://, got '{endpoint}'"
            )));
        }

        Ok(())
    }

    /// Check that everything needed to call the engine is present.
    pub fn has_service_credentials(&self) -> bool {
        self.service.endpoint.is_some()
            && self.service.subscriber_id.is_some()
            && self.service.signing_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
