use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Creates the schema if missing. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // One row per uploaded file
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            filename TEXT NOT NULL,
            original_filename TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            extension TEXT NOT NULL,
            uploaded_at INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            chunk_count INTEGER,
            error_message TEXT,
            updated_at INTEGER NOT NULL,
            UNIQUE(tenant_id, filename)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Per-tenant usage counters, created lazily
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenant_quotas (
            tenant_id TEXT PRIMARY KEY,
            tier TEXT NOT NULL DEFAULT 'free',
            document_count INTEGER NOT NULL DEFAULT 0,
            total_storage_bytes INTEGER NOT NULL DEFAULT 0,
            queries_today INTEGER NOT NULL DEFAULT 0,
            last_query_reset TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_tenant ON documents(tenant_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_tenant_status ON documents(tenant_id, status)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at ON documents(uploaded_at DESC)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
