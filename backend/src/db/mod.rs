use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

pub mod campaigns;
pub mod contacts;
pub mod models;
pub mod templates;

pub type DbPool = SqlitePool;

pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Single-connection in-memory database; every pooled connection to
/// `sqlite::memory:` would otherwise see its own empty database.
pub async fn create_memory_pool() -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create tables and indexes if they do not exist yet.
pub async fn init_schema(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS campaigns (
            id BLOB PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            variant TEXT NOT NULL DEFAULT 'networking',
            spreadsheet_url TEXT,
            connection_template TEXT,
            status TEXT NOT NULL DEFAULT 'draft',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id BLOB PRIMARY KEY NOT NULL,
            campaign_id BLOB NOT NULL REFERENCES campaigns (id) ON DELETE CASCADE,
            linkedin_url TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT,
            company TEXT,
            job_title TEXT,
            status TEXT NOT NULL DEFAULT 'created',
            variant TEXT NOT NULL DEFAULT 'networking',
            external_id TEXT,
            followup_attempts INTEGER NOT NULL DEFAULT 0,
            connection_message TEXT,
            followup_message TEXT,
            last_reply TEXT,
            reply_analysis TEXT,
            reply_analyzed_at TEXT,
            last_contacted_at TEXT,
            last_followup_at TEXT,
            accepted_at TEXT,
            replied_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            UNIQUE (campaign_id, linkedin_url)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_templates (
            id BLOB PRIMARY KEY NOT NULL,
            name TEXT NOT NULL,
            variant TEXT NOT NULL DEFAULT 'networking',
            template_type TEXT NOT NULL,
            content TEXT NOT NULL,
            is_active BOOLEAN NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_contacts_status ON contacts (status)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_variant ON contacts (variant)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_external_id ON contacts (external_id)",
        "CREATE INDEX IF NOT EXISTS idx_contacts_created_at ON contacts (created_at)",
        "CREATE INDEX IF NOT EXISTS idx_templates_lookup ON message_templates (variant, template_type)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    info!("Database schema ready");
    Ok(())
}
