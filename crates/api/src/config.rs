//! Process configuration from environment variables.

use chrono::Duration;
use thiserror::Error;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_SECRET: &str = "warden-dev-secret-change-me";
const DEFAULT_ISSUER: &str = "warden";
const DEFAULT_TOKEN_DURATION: &str = "24h";
const DEFAULT_ADMIN_PASSWORD: &str = "adminpassword";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl ConfigError {
    fn invalid(name: &'static str, value: &str, reason: &'static str) -> Self {
        ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    /// `None` selects the in-memory credential store.
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub admin_password: String,
    pub seed_default_data: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let port = match var("SERVER_PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid("SERVER_PORT", &raw, "expected a port number"))?,
            None => DEFAULT_PORT,
        };

        let jwt_secret = var("JWT_SECRETKEY").unwrap_or_else(|| {
            tracing::warn!("JWT_SECRETKEY not set; using insecure dev default");
            DEFAULT_SECRET.to_string()
        });

        let raw_ttl = var("JWT_TOKENDURATION").unwrap_or_else(|| DEFAULT_TOKEN_DURATION.to_string());
        let token_ttl = parse_duration(&raw_ttl)?;

        let bcrypt_cost = match var("BCRYPT_COST") {
            Some(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|c| (4..=31).contains(c))
                .ok_or_else(|| ConfigError::invalid("BCRYPT_COST", &raw, "expected an integer in 4..=31"))?,
            None => bcrypt_default_cost(),
        };

        let seed_default_data = match var("SEED_DEFAULT_DATA") {
            Some(raw) => parse_bool("SEED_DEFAULT_DATA", &raw)?,
            None => true,
        };

        Ok(Self {
            port,
            database_url: var("DATABASE_URL"),
            jwt_secret,
            jwt_issuer: var("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            token_ttl,
            bcrypt_cost,
            admin_password: var("ADMIN_PASSWORD").unwrap_or_else(|| DEFAULT_ADMIN_PASSWORD.to_string()),
            seed_default_data,
        })
    }
}

fn bcrypt_default_cost() -> u32 {
    warden_auth::PasswordHasher::default().cost()
}

impl core::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("jwt_secret", &"<redacted>")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("token_ttl", &self.token_ttl)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("admin_password", &"<redacted>")
            .field("seed_default_data", &self.seed_default_data)
            .finish()
    }
}

/// Parse a positive duration such as `90s`, `15m` or `24h`.
pub fn parse_duration(raw: &str) -> Result<Duration, ConfigError> {
    const NAME: &str = "JWT_TOKENDURATION";
    let value = raw.trim();

    let Some(unit) = value.chars().last() else {
        return Err(ConfigError::invalid(NAME, raw, "expected <integer><s|m|h>"));
    };
    let digits = &value[..value.len() - unit.len_utf8()];
    let amount: i64 = digits
        .parse()
        .map_err(|_| ConfigError::invalid(NAME, raw, "expected <integer><s|m|h>"))?;
    if amount <= 0 {
        return Err(ConfigError::invalid(NAME, raw, "duration must be positive"));
    }

    let duration = match unit {
        's' => Duration::try_seconds(amount),
        'm' => Duration::try_minutes(amount),
        'h' => Duration::try_hours(amount),
        _ => return Err(ConfigError::invalid(NAME, raw, "expected <integer><s|m|h>")),
    };
    duration.ok_or_else(|| ConfigError::invalid(NAME, raw, "duration out of range"))
}

fn parse_bool(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(name, raw, "expected true or false")),
    }
}
