//! Application configuration
//!
//! Read from `hostel.toml` at `$HOSTEL_CONFIG` or the platform config
//! directory. Every key is optional; secrets can come from the environment.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use hostel_net::{MailConfig, PaystackConfig};

pub const CONFIG_ENV: &str = "HOSTEL_CONFIG";
pub const PAYSTACK_KEY_ENV: &str = "PAYSTACK_KEY";
pub const MAIL_KEY_ENV: &str = "MAIL_API_KEY";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub paystack: PaystackSection,
    pub mail: MailSection,
    pub billing: BillingSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 4000)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaystackSection {
    pub base_url: String,
    pub secret_key: String,
    pub timeout_secs: u64,
    pub callback_url: Option<String>,
}

impl Default for PaystackSection {
    fn default() -> Self {
        Self {
            base_url: hostel_net::paystack::DEFAULT_BASE_URL.to_string(),
            secret_key: String::new(),
            timeout_secs: hostel_net::paystack::DEFAULT_TIMEOUT.as_secs(),
            callback_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailSection {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
}

impl Default for MailSection {
    fn default() -> Self {
        Self {
            api_url: hostel_net::mailer::DEFAULT_MAIL_API.to_string(),
            api_key: String::new(),
            sender_email: "noreply@hostel.local".to_string(),
            sender_name: "Hostel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BillingSection {
    pub minimum_deposit_ratio: Decimal,
}

impl Default for BillingSection {
    fn default() -> Self {
        Self {
            minimum_deposit_ratio: Decimal::new(70, 2),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// EnvFilter directive used when RUST_LOG is unset
    pub filter: Option<String>,
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&text)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Secrets set in the environment win over the file
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(key) = var(PAYSTACK_KEY_ENV).filter(|k| !k.is_empty()) {
            self.paystack.secret_key = key;
        }
        if let Some(key) = var(MAIL_KEY_ENV).filter(|k| !k.is_empty()) {
            self.mail.api_key = key;
        }
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        project_dirs()
            .map(|dirs| dirs.data_dir().join("hostel.db"))
            .ok_or_else(|| ConfigError::Invalid("Could not determine data directory".into()))
    }

    pub fn paystack(&self) -> Result<PaystackConfig, ConfigError> {
        if self.paystack.secret_key.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "Paystack secret key is not set (set {PAYSTACK_KEY_ENV})"
            )));
        }
        Ok(PaystackConfig {
            base_url: self.paystack.base_url.clone(),
            secret_key: self.paystack.secret_key.clone(),
            timeout: Duration::from_secs(self.paystack.timeout_secs),
            callback_url: self.paystack.callback_url.clone(),
        })
    }

    /// Mail settings, or `None` when no API key is configured
    pub fn mail(&self) -> Option<MailConfig> {
        if self.mail.api_key.trim().is_empty() {
            return None;
        }
        Some(MailConfig {
            api_url: self.mail.api_url.clone(),
            api_key: self.mail.api_key.clone(),
            sender_email: self.mail.sender_email.clone(),
            sender_name: self.mail.sender_name.clone(),
        })
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "hostel", "hostel")
}

fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return Some(PathBuf::from(path));
    }
    project_dirs().map(|dirs| dirs.config_dir().join("hostel.toml"))
}
