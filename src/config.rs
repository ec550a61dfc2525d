use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::ConfigError;

// Limits applied to inbound transfer requests. Built once at startup and
// shared read-only with the router.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRules {
    pub max_reference_length: usize,
    pub max_amount: Decimal,
}

impl Default for RequestRules {
    fn default() -> Self {
        Self {
            max_reference_length: 64,
            max_amount: Decimal::new(100_000_000, 2),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connection_pooling: u32,
    pub port: u16,
    pub log_file: String,
    pub payment_gateway_url: Option<String>,
    pub payment_timeout: Duration,
    pub rules: RequestRules,
}

impl Config {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // mandatory fields
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        // optional fields
        let max_connection_pooling = parse_or(&lookup, "MAX_CONNECTION_POOLING", 5u32)?;
        let port = parse_or(&lookup, "PORT", 3000u16)?;
        let log_file = lookup("LOG_FILE").unwrap_or_else(|| "app.log".to_string());
        let payment_gateway_url = lookup("PAYMENT_GATEWAY_URL").filter(|url| !url.is_empty());
        let payment_timeout = Duration::from_secs(parse_or(&lookup, "PAYMENT_TIMEOUT_SECS", 10u64)?);

        let defaults = RequestRules::default();
        let rules = RequestRules {
            max_reference_length: parse_or(
                &lookup,
                "MAX_REFERENCE_LENGTH",
                defaults.max_reference_length,
            )?,
            max_amount: parse_or(&lookup, "MAX_TRANSFER_AMOUNT", defaults.max_amount)?,
        };

        if payment_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                name: "PAYMENT_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connection_pooling,
            port,
            log_file,
            payment_gateway_url,
            payment_timeout,
            rules,
        })
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { name, value }),
        None => Ok(default),
    }
}
