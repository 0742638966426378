//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;

use chrono::Duration;

use cyberbank_auth::ConfigurationError;
use cyberbank_cards::RetryPolicy;

const DEV_SECRET: &str = "dev-secret";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bind_addr: SocketAddr,
    pub transfer_retry: RetryPolicy,
    /// Header carrying the bearer credential on guarded routes.
    pub credential_header: String,
}

impl AppConfig {
    /// Defaults for everything except the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            token_ttl: Duration::minutes(60),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            transfer_retry: RetryPolicy::default(),
            credential_header: "Authorization".to_string(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigurationError> {
        let jwt_secret = lookup("JWT_SECRET").filter(|s| !s.is_empty()).unwrap_or_else(|| {
            tracing::warn!("JWT_SECRET not set; using insecure dev default");
            DEV_SECRET.to_string()
        });
        let mut config = Self::with_secret(jwt_secret);

        if let Some(raw) = lookup("TOKEN_TTL_MINUTES") {
            let minutes: i64 = parse("TOKEN_TTL_MINUTES", &raw)?;
            if minutes <= 0 {
                return Err(invalid("TOKEN_TTL_MINUTES", "must be positive"));
            }
            config.token_ttl = Duration::minutes(minutes);
        }
        if let Some(raw) = lookup("BIND_ADDR") {
            config.bind_addr = parse("BIND_ADDR", &raw)?;
        }
        if let Some(raw) = lookup("TRANSFER_MAX_ATTEMPTS") {
            let attempts: u32 = parse("TRANSFER_MAX_ATTEMPTS", &raw)?;
            if attempts == 0 {
                return Err(invalid("TRANSFER_MAX_ATTEMPTS", "must be at least 1"));
            }
            config.transfer_retry = RetryPolicy::new(attempts);
        }
        if let Some(raw) = lookup("CREDENTIAL_HEADER") {
            config.credential_header = raw.trim().to_string();
        }

        Ok(config)
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, ConfigurationError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| invalid(key, e.to_string()))
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidSetting {
        key: key.to_string(),
        message: message.into(),
    }
}
