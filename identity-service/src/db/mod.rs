//! PostgreSQL pool and schema for the identity tables.

use std::time::Duration;

use rest_core::error::AppError;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::config::DatabaseConfig;
use crate::store::PgStore;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);
const IDLE_TIMEOUT: Duration = Duration::from_secs(600);
const MAX_LIFETIME: Duration = Duration::from_secs(1800);

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    if config.min_connections > config.max_connections {
        tracing::warn!(
            min = config.min_connections,
            max = config.max_connections,
            "DATABASE_MIN_CONNECTIONS exceeds the maximum; capping"
        );
    }

    // list filters compare `created::text`, which follows the session zone
    let options = config
        .url
        .parse::<PgConnectOptions>()?
        .options([("TimeZone", "UTC")]);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections.min(config.max_connections))
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .max_lifetime(MAX_LIFETIME)
        .connect_with(options)
        .await?;

    tracing::info!(
        max_connections = config.max_connections,
        "Connected to PostgreSQL"
    );
    Ok(pool)
}

/// Creates `service_accounts` and `users` when missing.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Identity schema is up to date");
    Ok(())
}

/// Pool, migrations and store in one step for start-up.
pub async fn connect_store(config: &DatabaseConfig) -> Result<PgStore, AppError> {
    let pool = create_pool(config).await?;
    run_migrations(&pool).await?;
    Ok(PgStore::new(pool))
}
