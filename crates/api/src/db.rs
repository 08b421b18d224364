//! Database pool setup.

use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::config::Config;

const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Connects to PostgreSQL, retrying a bounded number of times while the
/// database comes up.
pub async fn connect_with_retry(config: &Config) -> Result<PgPool, sqlx::Error> {
    let attempts = config.db_connect_attempts.max(1);
    let mut attempt = 1;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                tracing::info!(attempt, "connected to database");
                return Ok(pool);
            }
            Err(e) if attempt < attempts => {
                tracing::warn!(
                    attempt,
                    attempts,
                    error = %e,
                    "database connection failed, retrying"
                );
                metrics::counter!("db_connect_retries_total").increment(1);
                tokio::time::sleep(RETRY_DELAY).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(attempts, error = %e, "giving up on database connection");
                return Err(e);
            }
        }
    }
}
