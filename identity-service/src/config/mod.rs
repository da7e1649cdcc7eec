use rest_core::config as core_config;
use rest_core::error::AppError;
use rest_core::rest::Paging;
use std::env;

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub store: StoreBackend,
    pub database: Option<DatabaseConfig>,
    pub auth: AuthConfig,
    pub rest: RestConfig,
    /// Fixed token generator seed. Reproducible sequences are for local
    /// runs only; refused in production.
    pub token_seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token_header: String,
    /// Trust principal headers set by a fronting proxy.
    pub trust_principal_headers: bool,
    pub principal_email_header: String,
    pub principal_admin_header: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_header: "x-auth-token".to_string(),
            trust_principal_headers: false,
            principal_email_header: "x-principal-email".to_string(),
            principal_admin_header: "x-principal-admin".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RestConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub export_page_size: u32,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 1000,
            export_page_size: 500,
        }
    }
}

impl RestConfig {
    pub fn paging(&self) -> Paging {
        Paging {
            default_size: self.default_page_size,
            max_size: self.max_page_size,
        }
    }
}

impl IdentityConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let store: StoreBackend = get_env("STORE_BACKEND", Some("postgres"), false)?
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let database = match store {
            StoreBackend::Postgres => Some(DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "10")?,
                min_connections: parse_env("DATABASE_MIN_CONNECTIONS", "1")?,
            }),
            StoreBackend::Memory => None,
        };

        let defaults = AuthConfig::default();
        let auth = AuthConfig {
            token_header: get_env("AUTH_TOKEN_HEADER", Some(&defaults.token_header), false)?
                .to_lowercase(),
            trust_principal_headers: parse_env("AUTH_TRUST_PRINCIPAL_HEADERS", "false")?,
            principal_email_header: get_env(
                "AUTH_PRINCIPAL_EMAIL_HEADER",
                Some(&defaults.principal_email_header),
                false,
            )?
            .to_lowercase(),
            principal_admin_header: get_env(
                "AUTH_PRINCIPAL_ADMIN_HEADER",
                Some(&defaults.principal_admin_header),
                false,
            )?
            .to_lowercase(),
        };

        let rest = RestConfig {
            default_page_size: parse_env("REST_DEFAULT_PAGE_SIZE", "20")?,
            max_page_size: parse_env("REST_MAX_PAGE_SIZE", "1000")?,
            export_page_size: parse_env("REST_EXPORT_PAGE_SIZE", "500")?,
        };

        let token_seed = match env::var("TOKEN_SEED") {
            Ok(raw) => Some(raw.parse::<u64>().map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!("TOKEN_SEED must be an integer: {}", e))
            })?),
            Err(_) => None,
        };

        let config = IdentityConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("identity-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), false)?,
            log_level: get_env("LOG_LEVEL", Some("info"), false)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            store,
            database,
            auth,
            rest,
            token_seed,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.common.port == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "PORT must be greater than 0"
            )));
        }

        if self.rest.default_page_size == 0 || self.rest.export_page_size == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REST page sizes must be positive"
            )));
        }

        if self.rest.default_page_size > self.rest.max_page_size {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "REST_DEFAULT_PAGE_SIZE can't exceed REST_MAX_PAGE_SIZE"
            )));
        }

        if self.environment == Environment::Prod {
            if self.token_seed.is_some() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "TOKEN_SEED makes tokens predictable and is not allowed in production"
                )));
            }

            if self.store == StoreBackend::Memory {
                tracing::warn!("In-memory store selected in production - data is lost on restart");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), false)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{} is invalid: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(format!("Invalid store backend: {}", s)),
        }
    }
}
