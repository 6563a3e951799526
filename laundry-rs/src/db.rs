//! Database connection and schema setup
//!
//! All state lives in a single SQLite database: student accounts with
//! their garment quotas, laundry requests, and admin accounts. Quota
//! invariants are enforced both in the ledger transactions and by CHECK
//! constraints here, so a bug in one layer cannot silently corrupt the
//! books.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::error::Result;

/// Open a connection pool for the given database URL
///
/// Creates the database file if it does not exist yet. WAL mode keeps
/// readers unblocked while a ledger transaction holds the write lock.
pub async fn connect(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    info!("Connected to database: {}", config.url);
    Ok(pool)
}

/// Create tables and indexes if they do not exist
pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            student_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            email TEXT UNIQUE,
            password_hash TEXT,
            quota_limit INTEGER NOT NULL DEFAULT 30,
            remaining_quota INTEGER NOT NULL DEFAULT 30,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (quota_limit > 0),
            CHECK (remaining_quota >= 0 AND remaining_quota <= quota_limit),
            CHECK (student_id GLOB 'STU[0-9][0-9][0-9]*')
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS laundry_jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL REFERENCES students(id),
            student_id TEXT NOT NULL,
            num_clothes INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'submitted',
            priority TEXT NOT NULL DEFAULT 'normal',
            notes TEXT,
            submission_date TEXT NOT NULL,
            started_date TEXT,
            completed_date TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (num_clothes > 0 AND num_clothes <= 50),
            CHECK (status IN ('submitted', 'processing', 'completed', 'cancelled')),
            CHECK (priority IN ('low', 'normal', 'high', 'urgent')),
            CHECK (started_date IS NULL OR started_date >= submission_date),
            CHECK (completed_date IS NULL OR completed_date >= submission_date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'admin',
            is_active INTEGER NOT NULL DEFAULT 1,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK (length(username) >= 3)
        )
        "#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_laundry_jobs_user_id ON laundry_jobs(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_laundry_jobs_student_id ON laundry_jobs(student_id)",
        "CREATE INDEX IF NOT EXISTS idx_laundry_jobs_status ON laundry_jobs(status)",
        "CREATE INDEX IF NOT EXISTS idx_laundry_jobs_status_date ON laundry_jobs(status, submission_date)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }

    info!("Database schema initialized");
    Ok(())
}

/// Health check - verify database connectivity
pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}
