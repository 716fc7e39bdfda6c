use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::ParseIntError;
use std::time::Duration;

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
    pub model: ModelConfig,
    pub review: ReviewConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("LENDFLOW_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("LENDFLOW_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("LENDFLOW_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("LENDFLOW_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let endpoint = env::var("MODEL_SERVICE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let timeout_ms = match env::var("MODEL_TIMEOUT_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|source| ConfigError::InvalidModelTimeout { source })?,
            Err(_) => DEFAULT_MODEL_TIMEOUT_MS,
        };

        let reviewer_emails = env::var("REVIEWER_EMAILS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|email| !email.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            model: ModelConfig {
                endpoint,
                timeout: Duration::from_millis(timeout_ms),
            },
            review: ReviewConfig { reviewer_emails },
        })
    }
}

const DEFAULT_MODEL_TIMEOUT_MS: u64 = 1500;

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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// External advisory model settings. No endpoint means the scorer runs in
/// fallback-only mode.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub endpoint: Option<String>,
    pub timeout: Duration,
}

/// Reviewer directory sourced from the environment.
#[derive(Debug, Clone)]
pub struct ReviewConfig {
    pub reviewer_emails: Vec<String>,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidModelTimeout { source: ParseIntError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "LENDFLOW_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "LENDFLOW_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidModelTimeout { .. } => {
                write!(f, "MODEL_TIMEOUT_MS must be a duration in milliseconds")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort => None,
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidModelTimeout { source } => Some(source),
        }
    }
}
