use std::env;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub quota: QuotaConfig,
    pub accounts: AccountsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long an operation may wait for a transaction to begin before it
    /// fails with a store error. Read from `DATABASE_BEGIN_TIMEOUT_MS`.
    pub begin_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Allowed requests per second (per IP) for account creation
    pub signup_per_second: u32,
    /// Burst size for account creation
    pub signup_burst: u32,
}

/// Collection quota ceilings per subscription tier.
#[derive(Debug, Clone, Deserialize)]
pub struct QuotaConfig {
    pub unsubscribed_max: i64,
    pub subscribed_max: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AccountsConfig {
    /// Username of the shared guest account. The guest never shares or receives.
    pub guest_username: String,
    pub guest_email: String,
    pub verification_from: String,
    pub verification_redirect: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env::var("PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite://data/app.db".to_string()),
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                begin_timeout_ms: env::var("DATABASE_BEGIN_TIMEOUT_MS")
                    .unwrap_or_else(|_| "10000".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("DATABASE_BEGIN_TIMEOUT_MS".to_string()))?,
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET")
                    .map_err(|_| ConfigError::MissingEnv("JWT_SECRET".to_string()))?,
                expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                    .unwrap_or_else(|_| "24".to_string())
                    .parse()
                    .unwrap_or(24),
            },
            rate_limit: RateLimitConfig {
                signup_per_second: env::var("RATE_LIMIT_SIGNUP_PER_SECOND")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
                signup_burst: env::var("RATE_LIMIT_SIGNUP_BURST")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
            },
            quota: QuotaConfig {
                unsubscribed_max: env::var("QUOTA_UNSUBSCRIBED_MAX")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("QUOTA_UNSUBSCRIBED_MAX".to_string()))?,
                subscribed_max: env::var("QUOTA_SUBSCRIBED_MAX")
                    .unwrap_or_else(|_| "100".to_string())
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue("QUOTA_SUBSCRIBED_MAX".to_string()))?,
            },
            accounts: AccountsConfig {
                guest_username: env::var("GUEST_USERNAME").unwrap_or_else(|_| "guest".to_string()),
                guest_email: env::var("GUEST_EMAIL")
                    .unwrap_or_else(|_| "guest@guest.com".to_string()),
                verification_from: env::var("VERIFICATION_FROM")
                    .unwrap_or_else(|_| "noreply@stick-ctrl.com".to_string()),
                verification_redirect: env::var("VERIFICATION_REDIRECT")
                    .unwrap_or_else(|_| "/verification.html".to_string()),
            },
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                frontend_url: "http://localhost:3000".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://data/app.db".to_string(),
                max_connections: 5,
                begin_timeout_ms: 10_000,
            },
            jwt: JwtConfig {
                secret: String::new(),
                expiration_hours: 24,
            },
            rate_limit: RateLimitConfig {
                signup_per_second: 2,
                signup_burst: 5,
            },
            quota: QuotaConfig {
                unsubscribed_max: 3,
                subscribed_max: 100,
            },
            accounts: AccountsConfig {
                guest_username: "guest".to_string(),
                guest_email: "guest@guest.com".to_string(),
                verification_from: "noreply@stick-ctrl.com".to_string(),
                verification_redirect: "/verification.html".to_string(),
            },
        }
    }
}
