use std::env;
use std::str::FromStr;
use std::time::Duration;

use docshelf_core::pagination::PageLimits;
use docshelf_core::versioning::{Retention, RetentionPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} is required")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StorageBackend::Postgres),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(format!("expected postgres or memory, got {other}")),
        }
    }
}

/// Outbound AI enhancer endpoint. Enhancement is disabled without one.
#[derive(Debug, Clone)]
pub struct EnhancerConfig {
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Server host to bind to.
    pub host: String,
    /// Server port to bind to.
    pub port: u16,
    pub storage: StorageBackend,
    /// PostgreSQL connection URL. Required for the postgres backend.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    /// JWT signing secret.
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    /// Per-topic event bus backlog.
    pub event_bus_capacity: usize,
    /// History rows kept per document; 0 keeps everything.
    pub document_version_retention: usize,
    /// History rows kept per API spec; 0 keeps everything.
    pub api_spec_version_retention: usize,
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
    pub github_api_url: String,
    pub bitbucket_api_url: String,
    pub enhancer: Option<EnhancerConfig>,
    pub upstream_timeout: Duration,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let value = var_or(name, default);
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let storage: StorageBackend = parsed("STORAGE_BACKEND", "postgres")?;
        let database_url = env::var("DATABASE_URL").ok().filter(|u| !u.is_empty());
        if storage == StorageBackend::Postgres && database_url.is_none() {
            return Err(ConfigError::Missing {
                name: "DATABASE_URL",
            });
        }

        let default_page_size: u32 = parsed("DEFAULT_PAGE_SIZE", "20")?;
        let max_page_size: u32 = parsed("MAX_PAGE_SIZE", "100")?;
        if default_page_size == 0 || max_page_size == 0 {
            return Err(ConfigError::Invalid {
                name: "MAX_PAGE_SIZE",
                value: max_page_size.to_string(),
                reason: "page sizes must be at least 1".into(),
            });
        }

        let enhancer = env::var("ENHANCER_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .map(|url| EnhancerConfig {
                url,
                api_key: env::var("ENHANCER_API_KEY").ok().filter(|k| !k.is_empty()),
                model: var_or("ENHANCER_MODEL", "gpt-4o-mini"),
            });

        Ok(Self {
            host: var_or("HOST", "0.0.0.0"),
            port: parsed("PORT", "3030")?,
            storage,
            database_url,
            db_max_connections: parsed("DB_MAX_CONNECTIONS", "20")?,
            db_min_connections: parsed("DB_MIN_CONNECTIONS", "5")?,
            jwt_secret: var_or("JWT_SECRET", "dev-secret-change-me-in-production"),
            jwt_ttl_hours: parsed("JWT_TTL_HOURS", "24")?,
            event_bus_capacity: parsed("EVENT_BUS_CAPACITY", "1024")?,
            document_version_retention: parsed("DOCUMENT_VERSION_RETENTION", "0")?,
            api_spec_version_retention: parsed("API_SPEC_VERSION_RETENTION", "4")?,
            default_page_size: default_page_size.min(max_page_size),
            max_page_size,
            log_level: var_or("LOG_LEVEL", "info"),
            github_api_url: var_or("GITHUB_API_URL", "https://api.github.com"),
            bitbucket_api_url: var_or("BITBUCKET_API_URL", "https://api.bitbucket.org/2.0"),
            enhancer,
            upstream_timeout: Duration::from_secs(parsed("UPSTREAM_TIMEOUT_SECS", "30")?),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy {
            documents: Retention::from_limit(self.document_version_retention),
            api_specs: Retention::from_limit(self.api_spec_version_retention),
        }
    }

    pub fn page_limits(&self) -> PageLimits {
        PageLimits {
            default_limit: self.default_page_size,
            max_limit: self.max_page_size,
        }
    }

    pub fn jwt_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.jwt_ttl_hours)
    }

    /// Settings for tests and local runs against the memory store.
    pub fn for_memory() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            storage: StorageBackend::Memory,
            database_url: None,
            db_max_connections: 1,
            db_min_connections: 0,
            jwt_secret: "test-secret".into(),
            jwt_ttl_hours: 1,
            event_bus_capacity: 64,
            document_version_retention: 0,
            api_spec_version_retention: 4,
            default_page_size: 20,
            max_page_size: 100,
            log_level: "debug".into(),
            github_api_url: "http://127.0.0.1:9".into(),
            bitbucket_api_url: "http://127.0.0.1:9".into(),
            enhancer: None,
            upstream_timeout: Duration::from_secs(5),
        }
    }
}
