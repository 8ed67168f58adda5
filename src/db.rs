use std::time::Duration;

use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;

const SCHEMA: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS day_off_requests (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
        requested_by VARCHAR(64) NOT NULL,
        target_date DATE NOT NULL,
        reason TEXT NULL,
        votes TEXT NOT NULL,
        created_at DATETIME NOT NULL,
        deadline DATETIME NOT NULL,
        closed BOOLEAN NOT NULL DEFAULT FALSE,
        result VARCHAR(16) NOT NULL DEFAULT 'unresolved',
        announced BOOLEAN NOT NULL DEFAULT FALSE,
        message_id VARCHAR(64) NULL,
        version INT UNSIGNED NOT NULL DEFAULT 0,
        INDEX idx_dayoff_open (closed, result),
        INDEX idx_dayoff_target (target_date),
        INDEX idx_dayoff_message (message_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS daily_logs (
        id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
        participant_id VARCHAR(64) NOT NULL,
        log_date DATE NOT NULL,
        amount BIGINT NOT NULL,
        notes TEXT NULL,
        logged_at DATETIME NOT NULL,
        INDEX idx_logs_participant_date (participant_id, log_date)
    )
    "#,
];

pub async fn init_db(database_url: &str, acquire_timeout: Duration) -> Result<MySqlPool, sqlx::Error> {
    MySqlPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await
}

/// Creates the tables on first start.
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
