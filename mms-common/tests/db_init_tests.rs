//! Database bootstrap tests against real database files

use mms_common::config::StoreConfig;
use mms_common::db::{get_schema_version, init_database, Collection, DocumentStore, CURRENT_SCHEMA_VERSION};
use serde_json::json;
use sqlx::Row;
use tempfile::TempDir;

#[tokio::test]
async fn test_init_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mms.db");

    let pool = init_database(&db_path, &StoreConfig::default()).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
    pool.close().await;

    let pool = init_database(&db_path, &StoreConfig::default()).await.unwrap();
    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_documents_survive_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("mms.db");

    let pool = init_database(&db_path, &StoreConfig::default()).await.unwrap();
    let store = DocumentStore::new(pool.clone(), 1000);
    store
        .upsert(Collection::Mentors, "MUJ00007", &json!({"MUJid": "MUJ00007"}))
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path, &StoreConfig::default()).await.unwrap();
    let store = DocumentStore::new(pool, 1000);
    let raw = store.find_raw(Collection::Mentors, "MUJ00007").await.unwrap().unwrap();
    assert_eq!(raw.body["MUJid"], "MUJ00007");
}

#[tokio::test]
async fn test_invalid_json_body_rejected_by_schema() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mms.db"), &StoreConfig::default())
        .await
        .unwrap();

    let result = sqlx::query(
        "INSERT INTO documents (collection, doc_key, body, created_at, updated_at) \
         VALUES ('mentors', 'X', '{not json', CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err());
}

#[tokio::test]
async fn test_wal_mode_enabled() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mms.db"), &StoreConfig::default())
        .await
        .unwrap();

    let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(mode.to_lowercase(), "wal");
}

#[tokio::test]
async fn test_mentor_lookup_uses_expression_index() {
    let temp_dir = TempDir::new().unwrap();
    let pool = init_database(&temp_dir.path().join("mms.db"), &StoreConfig::default())
        .await
        .unwrap();

    // Same shape as DocumentStore::find_where on $.mentorMujid
    let plan = sqlx::query(
        "EXPLAIN QUERY PLAN SELECT doc_key FROM documents \
         WHERE collection = ? AND (body -> '$.mentorMujid') = ?",
    )
    .bind("mentees")
    .bind("\"MUJ00007\"")
    .fetch_all(&pool)
    .await
    .unwrap();

    let details: Vec<String> = plan.iter().map(|row| row.get("detail")).collect();
    assert!(
        details.iter().any(|d| d.contains("idx_documents_mentee_mentor")),
        "plan: {:?}",
        details
    );
}
