//! Connection pool wrapper.
//!
//! Simplified from the teacher's `DbPool`: this workspace has no read
//! replica concept in its configuration, so there is a single connection
//! used for both reads and writes.

use feedengine_common::config::DatabaseConfig;
use feedengine_common::errors::{AppError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use tracing::info;

#[derive(Clone)]
pub struct DbPool {
    conn: DatabaseConnection,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("connecting to activity store database");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts)
            .await
            .map_err(|e| AppError::Transient { message: format!("failed to connect to database: {e}") })?;

        Ok(Self { conn })
    }

    pub fn conn(&self) -> &DatabaseConnection {
        &self.conn
    }

    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| AppError::Transient { message: format!("database ping failed: {e}") })?;
        Ok(())
    }
}
