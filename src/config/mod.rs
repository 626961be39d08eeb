pub mod plans;

use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

pub use plans::{PlanCatalog, PlanDefinition, ResolvedPlan};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read plans file {path}: {source}")]
    PlansFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid plans file: {0}")]
    PlansYaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub notify: NotifyConfig,
    pub plans: PlanCatalog,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_search_length: usize,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub session_cookie: String,
    pub api_key_prefix: String,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub timeout_ms: u64,
}

impl AppConfig {
    /// Build configuration from the environment: preset by `APP_ENV`, then per-key overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let plans = match env::var("PLANS_FILE") {
            Ok(path) if !path.trim().is_empty() => PlanCatalog::from_file(path.trim())?,
            _ => PlanCatalog::embedded()?,
        };

        let config = Self::preset(environment, plans).with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn preset(environment: Environment, plans: PlanCatalog) -> Self {
        match environment {
            Environment::Production => Self::production(plans),
            Environment::Staging => Self::staging(plans),
            Environment::Development => Self::development(plans),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.security.jwt_secret.is_empty() && self.environment != Environment::Development {
            return Err(ConfigError::Invalid("JWT_SECRET must be set outside development".to_string()));
        }
        if self.api.default_page_size == 0 || self.api.default_page_size > self.api.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default page size {} must be between 1 and max page size {}",
                self.api.default_page_size, self.api.max_page_size
            )));
        }
        if self.security.api_key_prefix.is_empty() {
            return Err(ConfigError::Invalid("API key prefix cannot be empty".to_string()));
        }
        Ok(())
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Some(port) = env::var("LEADGEN_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            if !v.trim().is_empty() {
                self.database.url = Some(v);
            }
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_SEARCH_LENGTH") {
            self.api.max_search_length = v.parse().unwrap_or(self.api.max_search_length);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_COOKIE") {
            self.security.session_cookie = v;
        }
        if let Ok(v) = env::var("SECURITY_API_KEY_PREFIX") {
            self.security.api_key_prefix = v;
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }

        // Notification overrides
        if let Ok(v) = env::var("NOTIFY_ENABLED") {
            self.notify.enabled = v.parse().unwrap_or(self.notify.enabled);
        }
        if let Ok(v) = env::var("NOTIFY_TIMEOUT_MS") {
            self.notify.timeout_ms = v.parse().unwrap_or(self.notify.timeout_ms);
        }

        self
    }

    pub fn development(plans: PlanCatalog) -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                enable_query_logging: true,
            },
            api: ApiConfig {
                default_page_size: 25,
                max_page_size: 500,
                max_search_length: 200,
                enable_request_logging: true,
                max_request_size_bytes: 2 * 1024 * 1024, // 2MB
            },
            security: SecurityConfig {
                jwt_secret: "development-only-secret".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                session_cookie: "leadgen_session".to_string(),
                api_key_prefix: "lg_".to_string(),
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            notify: NotifyConfig {
                enabled: false,
                timeout_ms: 5_000,
            },
            plans,
        }
    }

    pub fn staging(plans: PlanCatalog) -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
                enable_query_logging: true,
            },
            api: ApiConfig {
                default_page_size: 25,
                max_page_size: 200,
                max_search_length: 200,
                enable_request_logging: true,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                session_cookie: "leadgen_session".to_string(),
                api_key_prefix: "lg_".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
            },
            notify: NotifyConfig {
                enabled: true,
                timeout_ms: 3_000,
            },
            plans,
        }
    }

    pub fn production(plans: PlanCatalog) -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                enable_query_logging: false,
            },
            api: ApiConfig {
                default_page_size: 25,
                max_page_size: 100,
                max_search_length: 100,
                enable_request_logging: false,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 12,
                session_cookie: "leadgen_session".to_string(),
                api_key_prefix: "lg_".to_string(),
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
            },
            notify: NotifyConfig {
                enabled: true,
                timeout_ms: 2_000,
            },
            plans,
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }
}
