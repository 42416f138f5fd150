//! # Runtime Settings
//!
//! Environment detection (the development-mode flag) and settings loading
//! for the logging stack.

use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;
use once_cell::sync::Lazy;
use serde::{Serialize, Deserialize};

use crate::types::SetupError;

/// Environment variable holding the environment name
pub const ENV_VAR: &str = "APP_ENV";
/// Secondary environment variable consulted when `APP_ENV` is unset
pub const FALLBACK_ENV_VAR: &str = "RUST_ENV";

/// Deployment environment.
///
/// Only `Development` counts as development mode: it enables debug logs,
/// quiets the default panic output once a panic is logged, and allows
/// details in error responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Test,
    #[default]
    Production,
}

impl Environment {
    /// Reads the environment from `APP_ENV` / `RUST_ENV` (after loading
    /// `.env`). Unset or unrecognised values mean production.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let raw = std::env::var(ENV_VAR)
            .or_else(|_| std::env::var(FALLBACK_ENV_VAR))
            .ok();

        match raw {
            Some(name) => name.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %name, "Unrecognised environment, assuming production");
                Environment::Production
            }),
            None => Environment::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Test),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(SetupError::InvalidEnvironment(other.to_string())),
        }
    }
}

static ENVIRONMENT: Lazy<RwLock<Environment>> = Lazy::new(|| RwLock::new(Environment::from_env()));

/// The process-wide environment
pub fn environment() -> Environment {
    *ENVIRONMENT.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Overrides the process-wide environment. Meant for the composition root.
pub fn set_environment(env: Environment) {
    *ENVIRONMENT.write().unwrap_or_else(|poisoned| poisoned.into_inner()) = env;
}

/// Configuration for the tracing backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// The log level to use (trace, debug, info, warn, error)
    pub level: String,
    /// The service name for identification
    pub service_name: String,
    /// Whether to use JSON formatting
    pub json_format: bool,
    /// Whether to also write logs to a daily rolling file
    pub file_output: bool,
    /// The directory to store log files in
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            service_name: "event-marketplace".to_string(),
            json_format: false,
            file_output: false,
            log_dir: None,
        }
    }
}

impl TryFrom<config::Config> for LoggingConfig {
    type Error = config::ConfigError;

    fn try_from(cfg: config::Config) -> std::result::Result<Self, Self::Error> {
        let mut base = LoggingConfig::default();

        if let Ok(level) = cfg.get::<String>("logging.level") {
            base.level = level;
        }
        if let Ok(service_name) = cfg.get::<String>("logging.service_name") {
            base.service_name = service_name;
        }
        if let Ok(json_format) = cfg.get::<bool>("logging.json_format") {
            base.json_format = json_format;
        }
        if let Ok(file_output) = cfg.get::<bool>("logging.file_output") {
            base.file_output = file_output;
        }
        if let Ok(log_dir) = cfg.get::<String>("logging.log_dir") {
            base.log_dir = Some(log_dir);
        }

        Ok(base)
    }
}

/// Top-level settings for the logging/error stack
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Settings {
    pub environment: Environment,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Loads settings from the optional `config/app` file and `APP_*`
    /// variables (`APP_LOGGING__LEVEL=debug`, `APP_ENVIRONMENT=development`).
    pub fn load() -> Result<Self, SetupError> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(config::File::with_name("config/app").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        Self::try_from(cfg)
    }
}

impl TryFrom<config::Config> for Settings {
    type Error = SetupError;

    fn try_from(cfg: config::Config) -> Result<Self, Self::Error> {
        let environment = match cfg.get::<String>("environment") {
            Ok(name) => name.parse()?,
            Err(_) => Environment::from_env(),
        };
        let logging = LoggingConfig::try_from(cfg)?;

        Ok(Self { environment, logging })
    }
}
