use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::screening::{SuppressionScope, DEFAULT_CONCURRENCY};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub screening: ScreeningConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            screening: ScreeningConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Where the ruleset document is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RulesetLocation {
    Url(String),
    Path(PathBuf),
}

/// Where worn items are resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemLocation {
    Catalog(String),
    Csv(PathBuf),
}

/// Collaborator endpoints and evaluation policy.
#[derive(Debug, Clone)]
pub struct ScreeningConfig {
    pub ruleset: Option<RulesetLocation>,
    pub items: Option<ItemLocation>,
    pub http_timeout: Duration,
    pub suppression: SuppressionScope,
    /// Upper bound on concurrent item lookups per batch and per subject.
    pub concurrency: usize,
}

impl ScreeningConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let ruleset = match (non_empty_var("RULESET_URL"), non_empty_var("RULESET_PATH")) {
            (Some(url), _) => Some(RulesetLocation::Url(url)),
            (None, Some(path)) => Some(RulesetLocation::Path(PathBuf::from(path))),
            (None, None) => None,
        };

        let items = match (non_empty_var("CATALOG_BASE_URL"), non_empty_var("ITEMS_CSV")) {
            (Some(url), _) => Some(ItemLocation::Catalog(url)),
            (None, Some(path)) => Some(ItemLocation::Csv(PathBuf::from(path))),
            (None, None) => None,
        };

        let http_timeout = match non_empty_var("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .ok_or(ConfigError::InvalidTimeout)?,
            None => Duration::from_secs(10),
        };

        let suppression = match non_empty_var("WHITELIST_SCOPE") {
            Some(raw) => SuppressionScope::parse(&raw).ok_or(ConfigError::InvalidSuppressionScope)?,
            None => SuppressionScope::default(),
        };

        let concurrency = match non_empty_var("SCREENING_CONCURRENCY") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|limit| *limit > 0)
                .ok_or(ConfigError::InvalidConcurrency)?,
            None => DEFAULT_CONCURRENCY,
        };

        Ok(Self {
            ruleset,
            items,
            http_timeout,
            suppression,
            concurrency,
        })
    }

    pub fn ruleset_location(&self) -> Result<&RulesetLocation, ConfigError> {
        self.ruleset
            .as_ref()
            .ok_or(ConfigError::MissingRulesetSource)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidTimeout,
    InvalidConcurrency,
    InvalidSuppressionScope,
    MissingRulesetSource,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "HTTP_TIMEOUT_SECS must be a positive number of seconds")
            }
            ConfigError::InvalidConcurrency => {
                write!(f, "SCREENING_CONCURRENCY must be a positive integer")
            }
            ConfigError::InvalidSuppressionScope => {
                write!(f, "WHITELIST_SCOPE must be either 'name' or 'span'")
            }
            ConfigError::MissingRulesetSource => {
                write!(f, "set RULESET_URL or RULESET_PATH to locate the ruleset")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidConcurrency
            | ConfigError::InvalidSuppressionScope
            | ConfigError::MissingRulesetSource => None,
        }
    }
}
