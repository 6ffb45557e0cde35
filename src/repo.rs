//! Document Repository: durable metadata, one row per uploaded file.
//!
//! Owns the `documents` table and the stored files under the upload root.
//! Deleting a document does NOT rebuild the tenant's index — callers must
//! run ingestion afterward so the index stays consistent.

use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::models::{Document, DocumentStatus};

/// Create a pending document row. `filename` must already be sanitized and
/// unique for the tenant (see [`unique_filename`]).
pub async fn create(
    pool: &SqlitePool,
    tenant_id: &str,
    filename: &str,
    original_filename: &str,
    size_bytes: i64,
    extension: &str,
) -> Result<Document> {
    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO documents
            (id, tenant_id, filename, original_filename, size_bytes, extension,
             uploaded_at, status, chunk_count, error_message, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', NULL, NULL, ?)
        "#,
    )
    .bind(&id)
    .bind(tenant_id)
    .bind(filename)
    .bind(original_filename)
    .bind(size_bytes)
    .bind(extension)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(Document {
        id,
        tenant_id: tenant_id.to_string(),
        filename: filename.to_string(),
        original_filename: original_filename.to_string(),
        size_bytes,
        extension: extension.to_string(),
        uploaded_at: now,
        status: DocumentStatus::Pending,
        chunk_count: None,
        error_message: None,
        updated_at: now,
    })
}

/// Resolve filename collisions by suffixing `_1`, `_2`, … before the
/// extension until the name is free for this tenant.
pub async fn unique_filename(pool: &SqlitePool, tenant_id: &str, filename: &str) -> Result<String> {
    let mut candidate = filename.to_string();
    let (stem, ext) = match filename.rsplit_once('.') {
        Some((s, e)) => (s.to_string(), format!(".{}", e)),
        None => (filename.to_string(), String::new()),
    };

    let mut counter = 1u32;
    loop {
        let taken: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM documents WHERE tenant_id = ? AND filename = ?",
        )
        .bind(tenant_id)
        .bind(&candidate)
        .fetch_one(pool)
        .await?;

        if !taken {
            return Ok(candidate);
        }
        candidate = format!("{}_{}{}", stem, counter, ext);
        counter += 1;
    }
}

pub async fn get(pool: &SqlitePool, id: &str) -> Result<Option<Document>> {
    let row = sqlx::query("SELECT * FROM documents WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| row_to_document(&r)).transpose()
}

/// List a tenant's documents, newest upload first, optionally filtered by
/// status.
pub async fn list(
    pool: &SqlitePool,
    tenant_id: &str,
    status: Option<DocumentStatus>,
) -> Result<Vec<Document>> {
    let rows = match status {
        Some(s) => {
            sqlx::query(
                "SELECT * FROM documents WHERE tenant_id = ? AND status = ? ORDER BY uploaded_at DESC",
            )
            .bind(tenant_id)
            .bind(s.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query("SELECT * FROM documents WHERE tenant_id = ? ORDER BY uploaded_at DESC")
                .bind(tenant_id)
                .fetch_all(pool)
                .await?
        }
    };

    rows.iter().map(row_to_document).collect()
}

/// Update a document's status. Ingested requires a chunk count; Error
/// requires a message — enforced here so the invariant cannot be bypassed.
pub async fn update_status(
    pool: &SqlitePool,
    id: &str,
    status: DocumentStatus,
    chunk_count: Option<i64>,
    error_message: Option<String>,
) -> Result<()> {
    match status {
        DocumentStatus::Ingested if chunk_count.is_none() => {
            return Err(EngineError::Other(
                "ingested status requires a chunk count".to_string(),
            ));
        }
        DocumentStatus::Error if error_message.is_none() => {
            return Err(EngineError::Other(
                "error status requires an error message".to_string(),
            ));
        }
        _ => {}
    }

    let now = chrono::Utc::now().timestamp();
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET status = ?, chunk_count = ?, error_message = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(chunk_count)
    .bind(&error_message)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(EngineError::NotFound(format!("document {}", id)));
    }
    Ok(())
}

/// Hard-delete the metadata row and the stored file. Callers must re-run
/// ingestion for the tenant afterward.
pub async fn delete(pool: &SqlitePool, upload_root: &Path, id: &str) -> Result<Document> {
    let doc = get(pool, id)
        .await?
        .ok_or_else(|| EngineError::NotFound(format!("document {}", id)))?;

    sqlx::query("DELETE FROM documents WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    let path = stored_path(upload_root, &doc.tenant_id, &doc.filename);
    if path.exists() {
        std::fs::remove_file(&path)?;
    }

    Ok(doc)
}

/// Delete every document row and stored file for a tenant. Returns the
/// number of rows removed.
pub async fn delete_all(pool: &SqlitePool, upload_root: &Path, tenant_id: &str) -> Result<u64> {
    let docs = list(pool, tenant_id, None).await?;

    let result = sqlx::query("DELETE FROM documents WHERE tenant_id = ?")
        .bind(tenant_id)
        .execute(pool)
        .await?;

    for doc in &docs {
        let path = stored_path(upload_root, tenant_id, &doc.filename);
        if path.exists() {
            std::fs::remove_file(&path)?;
        }
    }

    Ok(result.rows_affected())
}

/// On-disk location of a stored upload.
pub fn stored_path(upload_root: &Path, tenant_id: &str, filename: &str) -> std::path::PathBuf {
    upload_root.join(tenant_id).join(filename)
}

fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Result<Document> {
    let status_raw: String = row.get("status");
    let status = DocumentStatus::parse(&status_raw)
        .ok_or_else(|| EngineError::Other(format!("unknown document status: {}", status_raw)))?;

    Ok(Document {
        id: row.get("id"),
        tenant_id: row.get("tenant_id"),
        filename: row.get("filename"),
        original_filename: row.get("original_filename"),
        size_bytes: row.get("size_bytes"),
        extension: row.get("extension"),
        uploaded_at: row.get("uploaded_at"),
        status,
        chunk_count: row.get("chunk_count"),
        error_message: row.get("error_message"),
        updated_at: row.get("updated_at"),
    })
}
