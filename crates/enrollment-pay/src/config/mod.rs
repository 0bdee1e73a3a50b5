use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::workflows::enrollment::{PricingPolicy, RetryPolicy};

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
    pub enrollment: EnrollmentSettings,
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
            enrollment: EnrollmentSettings::from_env()?,
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

/// Where the tier catalog comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    /// Four fixed program fees selected by their formatted price (`"$13,500"`).
    FixedDollar,
    /// Symbolic tiers (`"scholarship"`, `"vip"`).
    Named,
    /// CSV file with `key,label,base_cents` columns.
    File(PathBuf),
}

impl CatalogSource {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "fixed" | "dollar" => Self::FixedDollar,
            "named" => Self::Named,
            _ => Self::File(PathBuf::from(raw.trim())),
        }
    }
}

/// Pricing, notification, and collaborator settings for the payment endpoint.
#[derive(Debug, Clone)]
pub struct EnrollmentSettings {
    pub allowed_origin: String,
    pub catalog: CatalogSource,
    pub currency: String,
    pub seat_surcharge_bps: u64,
    pub support_hourly_rate_cents: u64,
    pub mail_from: String,
    pub support_email: String,
    pub template_dir: Option<PathBuf>,
    pub seed_applications: Option<PathBuf>,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for EnrollmentSettings {
    fn default() -> Self {
        Self {
            allowed_origin: "http://localhost:8080".to_string(),
            catalog: CatalogSource::FixedDollar,
            currency: "usd".to_string(),
            seat_surcharge_bps: 1_000,
            support_hourly_rate_cents: 30_000,
            mail_from: "enrollment@example.com".to_string(),
            support_email: "support@example.com".to_string(),
            template_dir: None,
            seed_applications: None,
            retry_attempts: 3,
            retry_base_delay_ms: 100,
        }
    }
}

impl EnrollmentSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            allowed_origin: env::var("APP_ALLOWED_ORIGIN").unwrap_or(defaults.allowed_origin),
            catalog: env::var("APP_TIER_CATALOG")
                .map(|raw| CatalogSource::parse(&raw))
                .unwrap_or(defaults.catalog),
            currency: env::var("APP_CURRENCY")
                .map(|raw| raw.trim().to_ascii_lowercase())
                .unwrap_or(defaults.currency),
            seat_surcharge_bps: parse_var("APP_SEAT_SURCHARGE_BPS", defaults.seat_surcharge_bps)?,
            support_hourly_rate_cents: parse_var(
                "APP_SUPPORT_HOURLY_RATE_CENTS",
                defaults.support_hourly_rate_cents,
            )?,
            mail_from: env::var("APP_MAIL_FROM").unwrap_or(defaults.mail_from),
            support_email: env::var("APP_SUPPORT_EMAIL").unwrap_or(defaults.support_email),
            template_dir: env::var("APP_TEMPLATE_DIR").ok().map(PathBuf::from),
            seed_applications: env::var("APP_SEED_APPLICATIONS").ok().map(PathBuf::from),
            retry_attempts: parse_var("APP_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_base_delay_ms: parse_var(
                "APP_RETRY_BASE_DELAY_MS",
                defaults.retry_base_delay_ms,
            )?,
        })
    }
}

impl EnrollmentSettings {
    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy {
            seat_surcharge_bps: self.seat_surcharge_bps,
            support_hourly_rate_cents: self.support_hourly_rate_cents,
            ..PricingPolicy::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

fn parse_var<T: FromStr>(variable: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { variable, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    InvalidOrigin { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a non-negative integer (found '{value}')")
            }
            ConfigError::InvalidOrigin { value } => {
                write!(f, "APP_ALLOWED_ORIGIN is not a valid header value (found '{value}')")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidOrigin { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
