use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Environment variable holding the Airtable API key
pub const AIRTABLE_API_KEY_VAR: &str = "AIRTABLE_API_KEY";
/// Environment variable holding the OpenStates API key
pub const OPENSTATES_API_KEY_VAR: &str = "OPENSTATES_API_KEY";
/// Environment variable pointing at an optional YAML settings file
pub const SETTINGS_PATH_VAR: &str = "BILL_SYNC_CONFIG";

pub const DEFAULT_AIRTABLE_BASE_ID: &str = "appVuarUc0kCpjwWn";
pub const DEFAULT_BILLS_TABLE: &str = "State";
pub const DEFAULT_UPDATES_TABLE: &str = "State status";
pub const DEFAULT_JURISDICTION: &str = "CA";
/// Status written when the tracked bill has none
pub const DEFAULT_STATUS: &str = "Moving";
/// OpenStates allows 2 requests/sec with bursts of 10
pub const DEFAULT_RATE_PER_SECOND: f64 = 2.0;
pub const DEFAULT_BURST: usize = 10;
pub const DEFAULT_OPENSTATES_URL: &str = "https://openstates.org/api/v1";
pub const DEFAULT_AIRTABLE_URL: &str = "https://api.airtable.com/v0";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Non-secret settings, optionally read from a YAML file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub airtable_base_id: String,
    pub bills_table: String,
    pub updates_table: String,
    pub jurisdiction: String,
    pub default_status: String,
    pub rate_per_second: f64,
    pub burst: usize,
    pub openstates_url: String,
    pub airtable_url: String,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            airtable_base_id: DEFAULT_AIRTABLE_BASE_ID.to_string(),
            bills_table: DEFAULT_BILLS_TABLE.to_string(),
            updates_table: DEFAULT_UPDATES_TABLE.to_string(),
            jurisdiction: DEFAULT_JURISDICTION.to_string(),
            default_status: DEFAULT_STATUS.to_string(),
            rate_per_second: DEFAULT_RATE_PER_SECOND,
            burst: DEFAULT_BURST,
            openstates_url: DEFAULT_OPENSTATES_URL.to_string(),
            airtable_url: DEFAULT_AIRTABLE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file; absent keys keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read settings file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Web link to the destination base
    pub fn dataset_url(&self) -> String {
        format!("https://airtable.com/{}", self.airtable_base_id)
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("airtable_base_id", &self.airtable_base_id),
            ("bills_table", &self.bills_table),
            ("updates_table", &self.updates_table),
            ("jurisdiction", &self.jurisdiction),
            ("default_status", &self.default_status),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }

        if !(self.rate_per_second.is_finite() && self.rate_per_second > 0.0) {
            return Err(Error::Config(format!(
                "rate_per_second must be positive, got {}",
                self.rate_per_second
            )));
        }

        for (name, value) in [
            ("openstates_url", &self.openstates_url),
            ("airtable_url", &self.airtable_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| Error::Config(format!("{} is not a valid URL ({}): {}", name, value, e)))?;
        }

        Ok(())
    }
}

/// Full run configuration: API keys plus settings
#[derive(Clone)]
pub struct Config {
    pub airtable_api_key: String,
    pub openstates_api_key: String,
    pub settings: Settings,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("airtable_api_key", &"<redacted>")
            .field("openstates_api_key", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through `lookup`, which maps a variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ConfigBuilder::new();
        if let Some(key) = lookup(AIRTABLE_API_KEY_VAR) {
            builder = builder.airtable_api_key(key);
        }
        if let Some(key) = lookup(OPENSTATES_API_KEY_VAR) {
            builder = builder.openstates_api_key(key);
        }
        if let Some(path) = lookup(SETTINGS_PATH_VAR).filter(|p| !p.trim().is_empty()) {
            builder = builder.settings(Settings::load(Path::new(&path))?);
        }
        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        check_api_key(AIRTABLE_API_KEY_VAR, &self.airtable_api_key)?;
        check_api_key(OPENSTATES_API_KEY_VAR, &self.openstates_api_key)?;
        self.settings.validate()
    }
}

/// A usable key is present and has at least one lowercase letter.
fn check_api_key(name: &str, value: &str) -> Result<()> {
    if value.chars().any(|c| c.is_ascii_lowercase()) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} is not configured", name)))
    }
}

/// Builder for creating configurations
#[derive(Clone, Default)]
pub struct ConfigBuilder {
    airtable_api_key: Option<String>,
    openstates_api_key: Option<String>,
    settings: Settings,
}

impl ConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn airtable_api_key(mut self, key: impl Into<String>) -> Self {
        self.airtable_api_key = Some(key.into());
        self
    }

    pub fn openstates_api_key(mut self, key: impl Into<String>) -> Self {
        self.openstates_api_key = Some(key.into());
        self
    }

    /// Replace all settings
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the jurisdiction bills are fetched for
    pub fn jurisdiction(mut self, jurisdiction: impl Into<String>) -> Self {
        self.settings.jurisdiction = jurisdiction.into();
        self
    }

    /// Set the upstream rate limit
    pub fn rate_limit(mut self, rate_per_second: f64, burst: usize) -> Self {
        self.settings.rate_per_second = rate_per_second;
        self.settings.burst = burst;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> Result<Config> {
        let config = Config {
            airtable_api_key: self.airtable_api_key.unwrap_or_default(),
            openstates_api_key: self.openstates_api_key.unwrap_or_default(),
            settings: self.settings,
        };
        config.validate()?;
        Ok(config)
    }
}
