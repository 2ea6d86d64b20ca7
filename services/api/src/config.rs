//! Service configuration loaded from the environment

use std::env;
use std::fmt;
use std::time::Duration;

use common::cache::RedisConfig;
use common::database::DatabaseConfig;
use common::error::DatabaseError;
use thiserror::Error;

use crate::rate_limiter::RateLimiterConfig;

/// Secrets shorter than this are rejected in production
pub const MIN_SECRET_LEN: usize = 32;

pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
/// Top of every hour
pub const DEFAULT_CSRF_CLEANUP_SCHEDULE: &str = "0 0 * * * *";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    #[error("{name} must be at least {min} characters long in production")]
    TooShort { name: &'static str, min: usize },

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
            Environment::Test => "test",
        }
    }

    pub fn is_production(&self) -> bool {
        *self == Environment::Production
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where session records are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStoreKind {
    Redis,
    Memory,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub port: u16,
    pub csrf_secret: String,
    pub session_secret: String,
    /// HS256 secret of the auth provider's access tokens
    pub auth_jwt_secret: String,
    pub cors_origins: Vec<String>,
    pub rate_limit: RateLimiterConfig,
    pub session_store: SessionStoreKind,
    pub csrf_cleanup_schedule: String,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
}

impl AppConfig {
    /// Create a new AppConfig from environment variables
    ///
    /// # Environment Variables
    /// - `APP_ENV` or `NODE_ENV`: `development`, `production` or `test` (default: development)
    /// - `PORT`: Listen port (default: 3001)
    /// - `CSRF_SECRET`, `SESSION_SECRET`: Required, at least 32 characters in production
    /// - `AUTH_JWT_SECRET`: Required
    /// - `CORS_ORIGIN`: Comma-separated allowed origins (default: http://localhost:3000)
    /// - `RATE_LIMIT_WINDOW_MS`: Rate limit window (default: 900000)
    /// - `RATE_LIMIT_MAX_REQUESTS`: Requests per window and IP (default: 100)
    /// - `SESSION_STORE`: `redis` or `memory` (default: redis)
    /// - `CSRF_CLEANUP_SCHEDULE`: Cron expression of the token sweep (default: hourly)
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").or_else(|_| env::var("NODE_ENV")) {
            Ok(value) => parse_environment(&value)?,
            Err(_) => Environment::Development,
        };

        let port = parse_or("PORT", DEFAULT_PORT)?;
        let csrf_secret = secret("CSRF_SECRET", environment)?;
        let session_secret = secret("SESSION_SECRET", environment)?;
        let auth_jwt_secret = required("AUTH_JWT_SECRET")?;

        let cors_origins = env::var("CORS_ORIGIN")
            .unwrap_or_else(|_| DEFAULT_CORS_ORIGIN.to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let rate_limit = RateLimiterConfig {
            window: Duration::from_millis(parse_or("RATE_LIMIT_WINDOW_MS", 900_000u64)?),
            max_requests: parse_or("RATE_LIMIT_MAX_REQUESTS", 100u32)?,
        };

        let session_store = match env::var("SESSION_STORE").as_deref() {
            Err(_) | Ok("redis") => SessionStoreKind::Redis,
            Ok("memory") => SessionStoreKind::Memory,
            Ok(other) => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_STORE",
                    value: other.to_string(),
                });
            }
        };

        let csrf_cleanup_schedule = env::var("CSRF_CLEANUP_SCHEDULE")
            .unwrap_or_else(|_| DEFAULT_CSRF_CLEANUP_SCHEDULE.to_string());

        Ok(Self {
            environment,
            port,
            csrf_secret,
            session_secret,
            auth_jwt_secret,
            cors_origins,
            rate_limit,
            session_store,
            csrf_cleanup_schedule,
            database: DatabaseConfig::from_env()?,
            redis: RedisConfig::from_env(),
        })
    }
}

fn parse_environment(value: &str) -> Result<Environment, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "development" | "dev" => Ok(Environment::Development),
        "production" | "prod" => Ok(Environment::Production),
        "test" => Ok(Environment::Test),
        _ => Err(ConfigError::Invalid {
            name: "APP_ENV",
            value: value.to_string(),
        }),
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn secret(name: &'static str, environment: Environment) -> Result<String, ConfigError> {
    let value = required(name)?;

    if environment.is_production() && value.chars().count() < MIN_SECRET_LEN {
        return Err(ConfigError::TooShort {
            name,
            min: MIN_SECRET_LEN,
        });
    }

    Ok(value)
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
        }),
        Err(_) => Ok(default),
    }
}
