use mirror_domain::MirrorError;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

/// Connection pool limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_open_connections: u32,
    pub max_idle_connections: u32,
    /// Maximum connection lifetime in minutes.
    pub max_lifetime: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_open_connections: 20,
            max_idle_connections: 5,
            max_lifetime: 30,
        }
    }
}

/// PostgreSQL connectivity settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub username: String,
    pub password: String,
    /// Per-statement deadline in seconds; 0 disables the deadline.
    pub statement_timeout: u64,
    pub pool: PoolConfig,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5432,
            name: "mirror_node".to_string(),
            username: "mirror_rosetta".to_string(),
            password: String::new(),
            statement_timeout: 20,
            pool: PoolConfig::default(),
        }
    }
}

/// A typed handle on the shared connection pool that applies the configured
/// statement timeout to every query it runs.
#[derive(Clone)]
pub struct DbClient {
    pool: PgPool,
    statement_timeout: Duration,
}

impl DbClient {
    pub fn new(pool: PgPool, statement_timeout: Duration) -> Self {
        Self {
            pool,
            statement_timeout,
        }
    }

    /// Establish the process-wide pool from config. Connections are created
    /// lazily, so this does not fail on an unreachable database.
    pub fn connect(config: &DbConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.name)
            .username(&config.username)
            .password(&config.password);

        let pool = PgPoolOptions::new()
            .max_connections(config.pool.max_open_connections)
            .min_connections(config.pool.max_idle_connections)
            .max_lifetime(Duration::from_secs(config.pool.max_lifetime * 60))
            .connect_lazy_with(options);

        info!("Database pool created for {}:{}/{}", config.host, config.port, config.name);
        Self::new(pool, Duration::from_secs(config.statement_timeout))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run a database future under the statement deadline. Timeouts and
    /// driver errors both surface as the retriable `DatabaseError`; "no rows"
    /// is not an error at this layer and must be handled by the caller.
    pub async fn scoped<T, F>(&self, fut: F) -> Result<T, MirrorError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        let result = if self.statement_timeout.is_zero() {
            fut.await
        } else {
            match tokio::time::timeout(self.statement_timeout, fut).await {
                Ok(result) => result,
                Err(_) => {
                    error!("Statement timed out after {:?}", self.statement_timeout);
                    return Err(MirrorError::DatabaseError);
                }
            }
        };

        result.map_err(|err| {
            error!("Database error: {err}");
            MirrorError::DatabaseError
        })
    }
}
