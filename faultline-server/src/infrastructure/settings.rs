use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

/// Deployment mode driving how much of a failure reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    /// Restricted mode; any value other than `development` selects it.
    Production,
}

impl Environment {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("development") {
            Environment::Development
        } else {
            Environment::Production
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: Environment,
    pub http_addr: String,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Directory for `combined.log` and `error.log`; `None` keeps logs on the console.
    pub log_dir: Option<PathBuf>,
    pub http_request_body_limit_bytes: usize,
    pub http_concurrency_limit: usize,
    pub shutdown_drain: Duration,
    pub jwt_secret: String,
    pub jwt_secret_is_default: bool,
    pub jwt_ttl_seconds: i64,
}

impl Settings {
    const DEVELOPMENT_JWT_SECRET: &'static str = "development-only-secret-change-me-now";

    pub fn from_env() -> Result<Self> {
        let environment = Environment::parse(
            &std::env::var("APP_ENV").unwrap_or_else(|_| "production".to_string()),
        );
        let http_addr = std::env::var("HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let cors_origins =
            parse_cors_origins(std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string()));
        let log_level = std::env::var("LOG_LEVEL")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| "info".to_string());
        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) => parse_log_format(&raw)?,
            Err(_) if environment.is_development() => LogFormat::Compact,
            Err(_) => LogFormat::Json,
        };
        let log_dir = parse_log_dir(std::env::var("LOG_DIR").ok());
        let http_request_body_limit_bytes =
            parse_positive_env("HTTP_REQUEST_BODY_LIMIT_BYTES", 10 * 1024 * 1024usize)?;
        let http_concurrency_limit = parse_positive_env("HTTP_CONCURRENCY_LIMIT", 256usize)?;
        let shutdown_drain = Duration::from_secs(parse_positive_env("SHUTDOWN_DRAIN_SECS", 10u64)?);

        // only development may run without a configured signing secret
        let (jwt_secret, jwt_secret_is_default) = match std::env::var("JWT_SECRET") {
            Ok(secret) => (secret.trim().to_string(), false),
            Err(_) if environment.is_development() => (Self::DEVELOPMENT_JWT_SECRET.to_string(), true),
            Err(_) => return Err(anyhow!("JWT_SECRET is required outside development")),
        };
        if jwt_secret.chars().count() < 32 {
            return Err(anyhow!("JWT_SECRET must be at least 32 characters"));
        }
        let jwt_ttl_seconds = parse_positive_env("JWT_TTL_SECONDS", 3600i64)?;

        Ok(Self {
            environment,
            http_addr,
            cors_origins,
            log_level,
            log_format,
            log_dir,
            http_request_body_limit_bytes,
            http_concurrency_limit,
            shutdown_drain,
            jwt_secret,
            jwt_secret_is_default,
            jwt_ttl_seconds,
        })
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "compact" | "text" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        other => Err(anyhow!("LOG_FORMAT must be `compact` or `json`, got `{other}`")),
    }
}

/// Unset means `logs`; an empty value turns the file sinks off.
fn parse_log_dir(raw: Option<String>) -> Option<PathBuf> {
    match raw {
        None => Some(PathBuf::from("logs")),
        Some(raw) if raw.trim().is_empty() => None,
        Some(raw) => Some(PathBuf::from(raw.trim())),
    }
}

fn parse_cors_origins(raw: String) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Reads a strictly positive number, falling back to `default` when unset.
fn parse_positive_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr + Default + PartialOrd,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value = match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Failed to parse {key}, expecting positive integer"))?,
        Err(_) => default,
    };

    if value <= T::default() {
        return Err(anyhow!("{key} must be > 0"));
    }
    Ok(value)
}

/// Settings for in-process servers: loopback on an ephemeral port, console
/// logging only and a short drain window.
#[cfg(test)]
impl Settings {
    pub(crate) fn for_tests(environment: Environment, shutdown_drain: Duration) -> Self {
        Self {
            environment,
            http_addr: "127.0.0.1:0".to_string(),
            cors_origins: vec!["*".to_string()],
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            log_dir: None,
            http_request_body_limit_bytes: 1024 * 1024,
            http_concurrency_limit: 16,
            shutdown_drain,
            jwt_secret: "0123456789abcdef0123456789abcdef".to_string(),
            jwt_secret_is_default: false,
            jwt_ttl_seconds: 3600,
        }
    }
}
