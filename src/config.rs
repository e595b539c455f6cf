/// Configuration management for the toolhub marketplace
use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub cache: CacheSettings,
    pub rate_limit: RateLimitSettings,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    /// Base URL used when building links to uploaded media
    pub public_url: String,
    pub upload_limit: usize,
    pub cors_origins: Vec<String>,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub media_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued bearer tokens, in days
    pub token_ttl_days: i64,
    /// OAuth client id accepted as the audience of Google ID tokens
    pub google_client_id: Option<String>,
}

/// Read cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Use Redis; otherwise an in-process cache is used
    pub redis_enabled: bool,
    pub redis_url: String,
    pub key_prefix: String,
    pub tool_ttl: u64,
    pub comment_ttl: u64,
    pub pending_signup_ttl: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitSettings {
    pub enabled: bool,
    pub anonymous_rps: u32,
    pub authenticated_rps: u32,
    pub admin_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> MarketResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("TOOLHUB_HOSTNAME", "0.0.0.0");
        let port = env_or("TOOLHUB_PORT", "5001")
            .parse()
            .map_err(|_| MarketError::Validation("Invalid port number".to_string()))?;
        let public_url =
            env::var("TOOLHUB_PUBLIC_URL").unwrap_or_else(|_| format!("http://localhost:{}", port));
        let upload_limit = env_parse("TOOLHUB_UPLOAD_LIMIT", 100 * 1024 * 1024);
        let cors_origins = env_or(
            "TOOLHUB_CORS_ORIGINS",
            "http://localhost:5173,http://localhost:5001",
        )
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

        let data_directory: PathBuf = env_or("TOOLHUB_DATA_DIRECTORY", "./data").into();
        let database = env::var("TOOLHUB_DATABASE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("toolhub.sqlite"));
        let media_directory = env::var("TOOLHUB_MEDIA_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));

        let jwt_secret = env::var("TOOLHUB_JWT_SECRET")
            .map_err(|_| MarketError::Validation("JWT secret required".to_string()))?;
        let token_ttl_days = env_parse("TOOLHUB_TOKEN_TTL_DAYS", 30);
        let google_client_id = env::var("TOOLHUB_GOOGLE_CLIENT_ID").ok();

        let cache = CacheSettings {
            redis_enabled: env_parse("CACHE_ENABLED", false),
            redis_url: env_or("REDIS_URL", "redis://localhost:6379"),
            key_prefix: env_or("CACHE_KEY_PREFIX", "toolhub:"),
            tool_ttl: env_parse("CACHE_TOOL_TTL", 3600),
            comment_ttl: env_parse("CACHE_COMMENT_TTL", 120),
            pending_signup_ttl: env_parse("CACHE_PENDING_SIGNUP_TTL", 600),
        };

        let rate_limit = RateLimitSettings {
            enabled: env_parse("TOOLHUB_RATE_LIMITS_ENABLED", true),
            anonymous_rps: env_parse("TOOLHUB_RATE_LIMIT_ANONYMOUS_RPS", 20),
            authenticated_rps: env_parse("TOOLHUB_RATE_LIMIT_AUTHENTICATED_RPS", 100),
            admin_rps: env_parse("TOOLHUB_RATE_LIMIT_ADMIN_RPS", 1000),
            burst_size: env_parse("TOOLHUB_RATE_LIMIT_BURST", 50),
        };

        let logging = LoggingConfig {
            level: env_or("RUST_LOG", "info"),
            json: env_or("LOG_FORMAT", "text").eq_ignore_ascii_case("json"),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                public_url,
                upload_limit,
                cors_origins,
            },
            storage: StorageConfig {
                data_directory,
                database,
                media_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                token_ttl_days,
                google_client_id,
            },
            cache,
            rate_limit,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> MarketResult<()> {
        if self.service.hostname.is_empty() {
            return Err(MarketError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(MarketError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.cache.tool_ttl == 0 || self.cache.comment_ttl == 0 {
            return Err(MarketError::Validation(
                "Cache TTLs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration for tests and local tooling: in-process cache, no rate limits
    pub fn for_tests(data_directory: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "127.0.0.1".to_string(),
                port: 0,
                public_url: "http://localhost:5001".to_string(),
                upload_limit: 10 * 1024 * 1024,
                cors_origins: Vec::new(),
            },
            storage: StorageConfig {
                database: data_directory.join("toolhub.sqlite"),
                media_directory: data_directory.join("uploads"),
                data_directory,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-that-is-long-enough-for-hs256".to_string(),
                token_ttl_days: 1,
                google_client_id: None,
            },
            cache: CacheSettings {
                redis_enabled: false,
                redis_url: String::new(),
                key_prefix: "toolhub:".to_string(),
                tool_ttl: 3600,
                comment_ttl: 120,
                pending_signup_ttl: 600,
            },
            rate_limit: RateLimitSettings {
                enabled: false,
                anonymous_rps: 20,
                authenticated_rps: 100,
                admin_rps: 1000,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_tests(PathBuf::from("./data"));
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(MarketError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let mut config = ServerConfig::for_tests(PathBuf::from("./data"));
        config.service.hostname.clear();
        assert!(config.validate().is_err());
    }
}
