use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::vectra::retry::RetryPolicy;

pub const SUPPORTED_API_VERSIONS: &[&str] = &["v2.5"];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Unsupported API version: {0}. Supported versions: {supported:?}", supported = SUPPORTED_API_VERSIONS)]
    UnsupportedApiVersion(String),
}

/// Upstream credential. Only the session manager reads `api_key`.
#[derive(Clone)]
pub struct Credential {
    pub base_url: String,
    pub api_key: String,
    pub api_version: String,
    pub verify_tls: bool,
}

impl Credential {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: normalize_base_url(&base_url.into()),
            api_key: api_key.into(),
            api_version: "v2.5".to_string(),
            verify_tls: true,
        }
    }

    /// Root of the versioned REST API, e.g. `https://brain.example/api/v2.5`.
    pub fn api_root(&self) -> String {
        format!("{}/api/{}", self.base_url, self.api_version)
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base_url)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("api_version", &self.api_version)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

/// Validated configuration consumed by the bridging core.
#[derive(Debug, Clone)]
pub struct VectraConfig {
    pub credential: Credential,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub rate_limit_requests: u32,
    pub rate_limit_period: Duration,
    /// Upper bound on items collected by one paginated call.
    pub max_items: usize,
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub auth_retry: RetryPolicy,
    /// Tokens expiring within this margin are refreshed before use.
    pub token_refresh_margin: Duration,
}

impl VectraConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            credential,
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            rate_limit_requests: 100,
            rate_limit_period: Duration::from_secs(60),
            max_items: 1000,
            page_size: 200,
            retry: RetryPolicy::new(5, Duration::from_millis(500), Duration::from_secs(30)),
            auth_retry: RetryPolicy::new(3, Duration::from_millis(500), Duration::from_secs(30)),
            token_refresh_margin: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = required(&lookup, "VECTRA_BASE_URL")?;
        let api_key = required(&lookup, "VECTRA_API_KEY")?;

        let api_version = lookup("VECTRA_API_VERSION")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "v2.5".to_string());
        if !SUPPORTED_API_VERSIONS.contains(&api_version.as_str()) {
            return Err(ConfigError::UnsupportedApiVersion(api_version));
        }

        let mut credential = Credential::new(base_url, api_key);
        credential.api_version = api_version;
        credential.verify_tls = parse_bool(&lookup, "VECTRA_VERIFY_SSL", true)?;

        let mut config = Self::new(credential);
        config.request_timeout =
            Duration::from_secs(parse_positive(&lookup, "VECTRA_REQUEST_TIMEOUT", 30)?);
        config.connect_timeout =
            Duration::from_secs(parse_positive(&lookup, "VECTRA_CONNECT_TIMEOUT", 10)?);
        config.rate_limit_requests = parse_positive(&lookup, "VECTRA_RATE_LIMIT_REQUESTS", 100)?;
        config.rate_limit_period =
            Duration::from_secs(parse_positive(&lookup, "VECTRA_RATE_LIMIT_PERIOD", 60)?);
        config.max_items = parse_positive(&lookup, "VECTRA_MAX_ITEMS", 1000)?;
        config.page_size = parse_positive(&lookup, "VECTRA_PAGE_SIZE", 200)?;

        let base_delay =
            Duration::from_millis(parse_positive(&lookup, "VECTRA_RETRY_BASE_DELAY_MS", 500)?);
        let max_delay =
            Duration::from_millis(parse_positive(&lookup, "VECTRA_RETRY_MAX_DELAY_MS", 30_000)?);
        if max_delay < base_delay {
            return Err(ConfigError::Invalid {
                key: "VECTRA_RETRY_MAX_DELAY_MS",
                value: max_delay.as_millis().to_string(),
                reason: "must not be smaller than VECTRA_RETRY_BASE_DELAY_MS".to_string(),
            });
        }
        config.retry = RetryPolicy::new(
            parse_positive(&lookup, "VECTRA_MAX_RETRIES", 5)?,
            base_delay,
            max_delay,
        );
        config.auth_retry = RetryPolicy::new(
            parse_positive(&lookup, "VECTRA_AUTH_MAX_RETRIES", 3)?,
            base_delay,
            max_delay,
        );

        Ok(config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// A `tracing` level directive: trace, debug, info, warn or error.
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_level = lookup("LOG_LEVEL").unwrap_or_else(|| "INFO".to_string());
        let level = match raw_level.trim().to_uppercase().as_str() {
            "DEBUG" => "debug",
            "INFO" => "info",
            "WARNING" | "WARN" => "warn",
            "ERROR" | "CRITICAL" => "error",
            _ => {
                return Err(ConfigError::Invalid {
                    key: "LOG_LEVEL",
                    value: raw_level,
                    reason: "expected one of DEBUG, INFO, WARNING, ERROR, CRITICAL".to_string(),
                })
            }
        };

        let raw_format = lookup("LOG_FORMAT").unwrap_or_else(|| "text".to_string());
        let format = match raw_format.trim().to_lowercase().as_str() {
            "text" => LogFormat::Text,
            "json" => LogFormat::Json,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: raw_format,
                    reason: "expected 'json' or 'text'".to_string(),
                })
            }
        };

        Ok(Self {
            level: level.to_string(),
            format,
        })
    }
}

fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn parse_bool<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        "" => Ok(default),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected a boolean".to_string(),
        }),
    }
}

fn parse_positive<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        Ok(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "must be greater than zero".to_string(),
        }),
        Err(_) => Err(ConfigError::Invalid {
            key,
            value: raw,
            reason: "expected a number".to_string(),
        }),
    }
}
