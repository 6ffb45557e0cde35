//! Upload flow: validate, admit against quota, store, record.
//!
//! Ordering matters: validation and quota checks run before any byte is
//! written, the file is staged to a temp path and renamed into place, and
//! quota is reserved only once both the file and the metadata row exist.
//! Any later failure unwinds the earlier steps, so a failed upload leaves
//! no file, no row, and no quota consumed.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::models::Document;
use crate::{quota, repo, validate};

pub async fn upload_document(
    pool: &SqlitePool,
    config: &Config,
    tenant_id: &str,
    declared_filename: &str,
    bytes: &[u8],
) -> Result<Document> {
    let checked = validate::validate(bytes, declared_filename, config.validation.max_file_bytes)?;
    let size_bytes = bytes.len() as i64;

    quota::check_document_quota(pool, tenant_id, size_bytes).await?;

    let filename = repo::unique_filename(pool, tenant_id, &checked.filename).await?;

    let tenant_dir = config.storage.upload_root.join(tenant_id);
    std::fs::create_dir_all(&tenant_dir)?;

    // Stage then rename so readers never see a partial file
    let final_path = tenant_dir.join(&filename);
    let tmp_path = tenant_dir.join(format!(".{}.tmp", filename));
    std::fs::write(&tmp_path, bytes)?;
    if let Err(e) = std::fs::rename(&tmp_path, &final_path) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    let doc = match repo::create(
        pool,
        tenant_id,
        &filename,
        declared_filename,
        size_bytes,
        &checked.extension,
    )
    .await
    {
        Ok(doc) => doc,
        Err(e) => {
            let _ = std::fs::remove_file(&final_path);
            return Err(e);
        }
    };

    if let Err(e) = quota::reserve_document(pool, tenant_id, size_bytes).await {
        warn!(tenant = tenant_id, error = %e, "quota reservation failed, unwinding upload");
        let _ = repo::delete(pool, &config.storage.upload_root, &doc.id).await;
        return Err(e);
    }

    info!(
        tenant = tenant_id,
        document = %doc.id,
        filename = %doc.filename,
        size = size_bytes,
        "document uploaded"
    );
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::migrate;
    use crate::models::DocumentStatus;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
    use std::str::FromStr;

    async fn test_setup(dir: &std::path::Path) -> (SqlitePool, Config) {
        let options =
            SqliteConnectOptions::from_str(&format!("sqlite:{}/test.sqlite", dir.display()))
                .unwrap()
                .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        migrate::apply_schema(&pool).await.unwrap();

        let mut config = Config::default();
        config.storage.upload_root = dir.join("uploads");
        config.storage.vector_root = dir.join("vectors");
        (pool, config)
    }

    #[tokio::test]
    async fn successful_upload_stores_file_row_and_quota() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (pool, config) = test_setup(tmp.path()).await;

        let doc = upload_document(&pool, &config, "acme", "Notes.TXT", b"hello world")
            .await
            .unwrap();

        assert_eq!(doc.filename, "notes.txt");
        assert_eq!(doc.original_filename, "Notes.TXT");
        assert_eq!(doc.status, DocumentStatus::Pending);

        let path = repo::stored_path(&config.storage.upload_root, "acme", &doc.filename);
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");

        let q = quota::get_or_create(&pool, "acme").await.unwrap();
        assert_eq!(q.document_count, 1);
        assert_eq!(q.total_storage_bytes, 11);
    }

    #[tokio::test]
    async fn rejected_upload_leaves_no_trace() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (pool, config) = test_setup(tmp.path()).await;

        let err = upload_document(&pool, &config, "acme", "evil.exe", b"MZ\x90\x00")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let docs = repo::list(&pool, "acme", None).await.unwrap();
        assert!(docs.is_empty());
        let q = quota::get_or_create(&pool, "acme").await.unwrap();
        assert_eq!(q.document_count, 0);
        assert!(!config.storage.upload_root.join("acme").exists());
    }

    #[tokio::test]
    async fn quota_denial_precedes_storage() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (pool, config) = test_setup(tmp.path()).await;

        // Exhaust the free tier's document allowance directly
        for _ in 0..50 {
            quota::reserve_document(&pool, "acme", 1).await.unwrap();
        }

        let err = upload_document(&pool, &config, "acme", "one-more.txt", b"text")
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::QuotaExceeded { .. }));
        assert!(!config.storage.upload_root.join("acme").exists());
    }

    #[tokio::test]
    async fn colliding_names_get_suffixes_and_keep_both_files() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (pool, config) = test_setup(tmp.path()).await;

        let first = upload_document(&pool, &config, "acme", "report.txt", b"v1")
            .await
            .unwrap();
        let second = upload_document(&pool, &config, "acme", "report.txt", b"v2")
            .await
            .unwrap();

        assert_eq!(first.filename, "report.txt");
        assert_eq!(second.filename, "report_1.txt");
        let root = &config.storage.upload_root;
        assert_eq!(
            std::fs::read(repo::stored_path(root, "acme", "report.txt")).unwrap(),
            b"v1"
        );
        assert_eq!(
            std::fs::read(repo::stored_path(root, "acme", "report_1.txt")).unwrap(),
            b"v2"
        );
    }
}
