//! Per-tenant quota ledger: tier limits on document count, total storage,
//! and daily query volume.
//!
//! Quota rows are created lazily on first touch. Document/storage counters
//! are reserved only after an upload fully succeeds and released if a later
//! step fails, so a failed upload never consumes quota. The daily query
//! counter resets lazily when the stored UTC date differs from today.

use sqlx::{Row, SqlitePool};

use crate::error::{EngineError, QuotaResource, Result};
use crate::models::{TenantQuota, Tier};

/// Per-tier limits. `-1` means unlimited.
#[derive(Debug, Clone, Copy)]
pub struct TierLimits {
    pub max_documents: i64,
    pub max_storage_bytes: i64,
    pub max_queries_per_day: i64,
}

pub fn limits_for(tier: Tier) -> TierLimits {
    match tier {
        Tier::Free => TierLimits {
            max_documents: 50,
            max_storage_bytes: 500 * 1024 * 1024,
            max_queries_per_day: 1000,
        },
        Tier::Pro => TierLimits {
            max_documents: 1000,
            max_storage_bytes: 10 * 1024 * 1024 * 1024,
            max_queries_per_day: 50_000,
        },
        Tier::Enterprise => TierLimits {
            max_documents: -1,
            max_storage_bytes: -1,
            max_queries_per_day: -1,
        },
    }
}

fn today_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Fetch the tenant's quota row, creating a free-tier row if absent.
pub async fn get_or_create(pool: &SqlitePool, tenant_id: &str) -> Result<TenantQuota> {
    sqlx::query(
        r#"
        INSERT INTO tenant_quotas (tenant_id, tier, document_count, total_storage_bytes,
                                   queries_today, last_query_reset)
        VALUES (?, 'free', 0, 0, 0, ?)
        ON CONFLICT(tenant_id) DO NOTHING
        "#,
    )
    .bind(tenant_id)
    .bind(today_utc())
    .execute(pool)
    .await?;

    let row = sqlx::query("SELECT * FROM tenant_quotas WHERE tenant_id = ?")
        .bind(tenant_id)
        .fetch_one(pool)
        .await?;

    row_to_quota(&row)
}

/// Check that a document of `size_bytes` would not exceed the tenant's
/// document-count or storage limits. Does NOT reserve anything.
pub async fn check_document_quota(
    pool: &SqlitePool,
    tenant_id: &str,
    size_bytes: i64,
) -> Result<()> {
    let quota = get_or_create(pool, tenant_id).await?;
    let limits = limits_for(quota.tier);

    if limits.max_documents >= 0 && quota.document_count + 1 > limits.max_documents {
        return Err(EngineError::QuotaExceeded {
            resource: QuotaResource::Documents,
            tier: quota.tier.as_str().to_string(),
            used: quota.document_count,
            limit: limits.max_documents,
            remediation: "delete documents or upgrade your tier".to_string(),
        });
    }

    if limits.max_storage_bytes >= 0
        && quota.total_storage_bytes + size_bytes > limits.max_storage_bytes
    {
        return Err(EngineError::QuotaExceeded {
            resource: QuotaResource::Storage,
            tier: quota.tier.as_str().to_string(),
            used: quota.total_storage_bytes,
            limit: limits.max_storage_bytes,
            remediation: "delete documents or upgrade your tier".to_string(),
        });
    }

    Ok(())
}

/// Reserve one document slot and `size_bytes` of storage. Call only after
/// the upload has fully succeeded.
pub async fn reserve_document(pool: &SqlitePool, tenant_id: &str, size_bytes: i64) -> Result<()> {
    get_or_create(pool, tenant_id).await?;
    sqlx::query(
        r#"
        UPDATE tenant_quotas
        SET document_count = document_count + 1,
            total_storage_bytes = total_storage_bytes + ?
        WHERE tenant_id = ?
        "#,
    )
    .bind(size_bytes)
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Release a previously reserved document slot and its storage. Counters
/// are clamped at zero.
pub async fn release_document(pool: &SqlitePool, tenant_id: &str, size_bytes: i64) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE tenant_quotas
        SET document_count = MAX(document_count - 1, 0),
            total_storage_bytes = MAX(total_storage_bytes - ?, 0)
        WHERE tenant_id = ?
        "#,
    )
    .bind(size_bytes)
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Check the daily query limit and count one query against it.
///
/// The counter resets when the stored reset date is not today (UTC).
pub async fn record_query(pool: &SqlitePool, tenant_id: &str) -> Result<()> {
    let quota = get_or_create(pool, tenant_id).await?;
    let limits = limits_for(quota.tier);
    let today = today_utc();

    let queries_today = if quota.last_query_reset == today {
        quota.queries_today
    } else {
        0
    };

    if limits.max_queries_per_day >= 0 && queries_today + 1 > limits.max_queries_per_day {
        return Err(EngineError::QuotaExceeded {
            resource: QuotaResource::Queries,
            tier: quota.tier.as_str().to_string(),
            used: queries_today,
            limit: limits.max_queries_per_day,
            remediation: "wait until tomorrow (UTC) or upgrade your tier".to_string(),
        });
    }

    sqlx::query(
        r#"
        UPDATE tenant_quotas
        SET queries_today = ?, last_query_reset = ?
        WHERE tenant_id = ?
        "#,
    )
    .bind(queries_today + 1)
    .bind(&today)
    .bind(tenant_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Usage snapshot for display: current counters alongside tier limits.
#[derive(Debug, serde::Serialize)]
pub struct QuotaUsage {
    pub tenant_id: String,
    pub tier: String,
    pub document_count: i64,
    pub max_documents: i64,
    pub total_storage_bytes: i64,
    pub max_storage_bytes: i64,
    pub queries_today: i64,
    pub max_queries_per_day: i64,
}

pub async fn usage(pool: &SqlitePool, tenant_id: &str) -> Result<QuotaUsage> {
    let quota = get_or_create(pool, tenant_id).await?;
    let limits = limits_for(quota.tier);
    let queries_today = if quota.last_query_reset == today_utc() {
        quota.queries_today
    } else {
        0
    };

    Ok(QuotaUsage {
        tenant_id: quota.tenant_id,
        tier: quota.tier.as_str().to_string(),
        document_count: quota.document_count,
        max_documents: limits.max_documents,
        total_storage_bytes: quota.total_storage_bytes,
        max_storage_bytes: limits.max_storage_bytes,
        queries_today,
        max_queries_per_day: limits.max_queries_per_day,
    })
}

/// Change a tenant's tier. Existing usage is kept; only the limits change.
pub async fn upgrade_tier(pool: &SqlitePool, tenant_id: &str, tier: Tier) -> Result<()> {
    get_or_create(pool, tenant_id).await?;
    sqlx::query("UPDATE tenant_quotas SET tier = ? WHERE tenant_id = ?")
        .bind(tier.as_str())
        .bind(tenant_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Recompute document/storage counters from the documents table. Repairs
/// drift after a crash between upload steps.
pub async fn recalculate(pool: &SqlitePool, tenant_id: &str) -> Result<()> {
    get_or_create(pool, tenant_id).await?;
    sqlx::query(
        r#"
        UPDATE tenant_quotas
        SET document_count = (SELECT COUNT(*) FROM documents WHERE tenant_id = ?),
            total_storage_bytes =
                (SELECT COALESCE(SUM(size_bytes), 0) FROM documents WHERE tenant_id = ?)
        WHERE tenant_id = ?
        "#,
    )
    .bind(tenant_id)
    .bind(tenant_id)
    .bind(tenant_id)
    .execute(pool)
    .await?;
    Ok(())
}

fn row_to_quota(row: &sqlx::sqlite::SqliteRow) -> Result<TenantQuota> {
    let tier_raw: String = row.get("tier");
    let tier = Tier::parse(&tier_raw)
        .ok_or_else(|| EngineError::Other(format!("unknown tier: {}", tier_raw)))?;

    Ok(TenantQuota {
        tenant_id: row.get("tenant_id"),
        tier,
        document_count: row.get("document_count"),
        total_storage_bytes: row.get("total_storage_bytes"),
        queries_today: row.get("queries_today"),
        last_query_reset: row.get("last_query_reset"),
    })
}
