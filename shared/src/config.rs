// ============================================================================
// MERIDIAN COMMERCE - CONFIGURATION MANAGEMENT
// ============================================================================
// Module: shared/src/config.rs
// Description: Environment-based configuration for all services
// ============================================================================

use config::{Config, Environment as EnvSource};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub security: SecurityConfig,
    pub oauth: OAuthConfig,
    pub carriers: CarrierDefaults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl std::str::FromStr for Environment {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "staging" => Ok(Environment::Staging),
            "development" | "dev" | "test" => Ok(Environment::Development),
            other => Err(Error::Configuration(format!("unknown environment: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
}

/// Security configuration. The encryption key is required and validated at
/// startup; a process without a usable key must not come up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub credentials_encryption_key: String,
}

impl SecurityConfig {
    pub fn validate(&self) -> Result<()> {
        let key = &self.credentials_encryption_key;
        if key.len() != 64 || hex::decode(key).is_err() {
            return Err(Error::Configuration(
                "CREDENTIALS_ENCRYPTION_KEY must be 64 hex characters (32 bytes)".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// Explicit allow-listed origins (from OAUTH_ALLOWED_ORIGINS, CSV).
    pub allowed_origins: Vec<String>,
    pub frontend_url: Option<String>,
    pub app_url: Option<String>,
    /// Where invalid redirect candidates are sent instead.
    pub fallback_redirect: String,
}

impl OAuthConfig {
    /// Full redirect-origin allow list: explicit origins, frontend/app URLs,
    /// and localhost origins outside production.
    pub fn redirect_allow_list(&self, environment: Environment) -> Vec<String> {
        let mut origins: Vec<String> = self.allowed_origins.clone();
        for url in [&self.frontend_url, &self.app_url].into_iter().flatten() {
            origins.push(url.clone());
        }
        if !environment.is_production() {
            origins.push("http://localhost:3000".to_string());
            origins.push("http://localhost:5173".to_string());
            origins.push("http://127.0.0.1:3000".to_string());
        }
        origins
    }
}

/// Development fallback credentials for carrier sandboxes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarrierDefaults {
    pub dhl_client_id: Option<String>,
    pub dhl_client_secret: Option<String>,
    pub fedex_client_id: Option<String>,
    pub fedex_client_secret: Option<String>,
}

impl AppConfig {
    /// Load configuration from the environment (with `.env` support).
    ///
    /// Structured settings come in under the `MERIDIAN__` prefix; the
    /// well-known flat variables (DATABASE_URL, REDIS_URL,
    /// CREDENTIALS_ENCRYPTION_KEY, ...) override them.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let base = Config::builder()
            .set_default("environment", "development")
            .and_then(|b| b.set_default("server.host", "0.0.0.0"))
            .and_then(|b| b.set_default("server.port", 8080))
            .and_then(|b| b.set_default("server.request_timeout_secs", 30))
            .and_then(|b| b.set_default("database.url", "postgresql://localhost/meridian_dev"))
            .and_then(|b| b.set_default("database.max_connections", 20))
            .and_then(|b| b.set_default("database.min_connections", 1))
            .and_then(|b| b.set_default("database.acquire_timeout_secs", 30))
            .and_then(|b| b.set_default("redis.url", "redis://127.0.0.1:6379"))
            .and_then(|b| b.set_default("security.credentials_encryption_key", ""))
            .and_then(|b| b.set_default("oauth.allowed_origins", Vec::<String>::new()))
            .and_then(|b| b.set_default("oauth.fallback_redirect", "/"))
            .map_err(|e| Error::Configuration(e.to_string()))?
            .add_source(EnvSource::with_prefix("MERIDIAN").separator("__"))
            .build()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let mut config: AppConfig = base
            .try_deserialize()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        config.apply_flat_env();
        config.security.validate()?;
        Ok(config)
    }

    fn apply_flat_env(&mut self) {
        if let Ok(env) = std::env::var("ENVIRONMENT").or_else(|_| std::env::var("NODE_ENV")) {
            if let Ok(parsed) = env.parse() {
                self.environment = parsed;
            }
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(url) = std::env::var("REDIS_URL") {
            self.redis.url = url;
        }
        if let Ok(key) = std::env::var("CREDENTIALS_ENCRYPTION_KEY") {
            self.security.credentials_encryption_key = key;
        }
        if let Ok(origins) = std::env::var("OAUTH_ALLOWED_ORIGINS") {
            self.oauth.allowed_origins = origins
                .split(',')
                .map(|s| s.trim().trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Ok(url) = std::env::var("FRONTEND_URL") {
            self.oauth.frontend_url = Some(url.trim_end_matches('/').to_string());
        }
        if let Ok(url) = std::env::var("APP_URL") {
            self.oauth.app_url = Some(url.trim_end_matches('/').to_string());
        }
        self.carriers.dhl_client_id = std::env::var("DHL_CLIENT_ID").ok();
        self.carriers.dhl_client_secret = std::env::var("DHL_CLIENT_SECRET").ok();
        self.carriers.fedex_client_id = std::env::var("FEDEX_CLIENT_ID").ok();
        self.carriers.fedex_client_secret = std::env::var("FEDEX_CLIENT_SECRET").ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encryption_key_must_be_64_hex_chars() {
        let ok = SecurityConfig {
            credentials_encryption_key: "ab".repeat(32),
        };
        assert!(ok.validate().is_ok());

        let short = SecurityConfig {
            credentials_encryption_key: "abcd".to_string(),
        };
        assert!(short.validate().is_err());

        let not_hex = SecurityConfig {
            credentials_encryption_key: "zz".repeat(32),
        };
        assert!(not_hex.validate().is_err());
    }

    #[test]
    fn redirect_allow_list_includes_localhost_outside_production() {
        let oauth = OAuthConfig {
            allowed_origins: vec!["https://shop.example.com".to_string()],
            frontend_url: Some("https://app.example.com".to_string()),
            app_url: None,
            fallback_redirect: "/".to_string(),
        };

        let dev = oauth.redirect_allow_list(Environment::Development);
        assert!(dev.iter().any(|o| o == "http://localhost:3000"));
        assert!(dev.iter().any(|o| o == "https://shop.example.com"));
        assert!(dev.iter().any(|o| o == "https://app.example.com"));

        let prod = oauth.redirect_allow_list(Environment::Production);
        assert!(!prod.iter().any(|o| o.contains("localhost")));
    }
}
