//! JSON document store
//!
//! Every logical collection lives in the `documents` table, keyed by
//! `(collection, doc_key)`. Nested mutations are path-addressed single
//! statements (`json_insert` / `json_set`) so concurrent writers to the same
//! document never lose each other's appends the way a read-modify-write would.
//!
//! Paths use SQLite JSON path syntax (`$.sessions[0].semesters`).

use crate::db::retry_on_lock;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

/// Logical collections persisted by the core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    AcademicSessions,
    MentorMeetingLogs,
    MentorMenteeRelationships,
    Mentors,
    Mentees,
    HistoricalData,
}

impl Collection {
    /// Collections the archival engine may relocate, in processing order
    pub const LIVE: [Collection; 5] = [
        Collection::MentorMenteeRelationships,
        Collection::MentorMeetingLogs,
        Collection::Mentees,
        Collection::Mentors,
        Collection::AcademicSessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::AcademicSessions => "academic_sessions",
            Collection::MentorMeetingLogs => "mentor_meeting_logs",
            Collection::MentorMenteeRelationships => "mentor_mentee_relationships",
            Collection::Mentors => "mentors",
            Collection::Mentees => "mentees",
            Collection::HistoricalData => "historical_data",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::LIVE
            .iter()
            .chain(std::iter::once(&Collection::HistoricalData))
            .find(|c| c.as_str() == name)
            .copied()
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw document with store bookkeeping
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub key: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.body.clone())?)
    }
}

/// Write-once archival record
///
/// `data` is the serialized body of what was archived at that moment: the
/// whole live document, or one nested node of it when `path` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalData {
    #[serde(rename = "collectionName")]
    pub collection_name: String,
    #[serde(rename = "documentId")]
    pub document_id: String,
    /// Location of the node inside the live document when it was moved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

/// Nested node to relocate with [`DocumentStore::move_parts_to_history`]
#[derive(Debug, Clone)]
pub struct ArchivedPart {
    /// Path of the node, e.g. `$.meetings[2]`
    pub path: String,
    /// Must hold on the stored body, pinning `path` to the node the caller read
    pub guard: PathGuard,
}

/// One element of a multi-document batch
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Insert or replace the whole body, keeping the original `created_at`
    Upsert {
        collection: Collection,
        key: String,
        body: Value,
    },
    /// Path-addressed field updates on an existing document
    SetFields {
        collection: Collection,
        key: String,
        fields: Vec<(String, Value)>,
    },
}

/// Predicate that must hold on the stored body for a path-addressed write
/// to apply; pins an index-addressed path to the element the caller read
#[derive(Debug, Clone)]
pub struct PathGuard {
    pub path: String,
    pub equals: Value,
}

impl PathGuard {
    pub fn new(path: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            equals: equals.into(),
        }
    }
}

/// Persistence primitive shared by every component
#[derive(Debug, Clone)]
pub struct DocumentStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl DocumentStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Load and decode one document
    pub async fn find<T: DeserializeOwned>(&self, collection: Collection, key: &str) -> Result<Option<T>> {
        match self.find_raw(collection, key).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    pub async fn find_raw(&self, collection: Collection, key: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query(
            r#"
            SELECT doc_key, body, created_at, updated_at
            FROM documents
            WHERE collection = ? AND doc_key = ?
            "#,
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| stored_from_row(&row)).transpose()
    }

    /// Whether a document exists
    pub async fn exists(&self, collection: Collection, key: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM documents WHERE collection = ? AND doc_key = ?)",
        )
        .bind(collection.as_str())
        .bind(key)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// All documents of a collection, ordered by key
    pub async fn find_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        self.find_all_raw(collection)
            .await?
            .iter()
            .map(StoredDocument::decode)
            .collect()
    }

    pub async fn find_all_raw(&self, collection: Collection) -> Result<Vec<StoredDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT doc_key, body, created_at, updated_at
            FROM documents
            WHERE collection = ?
            ORDER BY doc_key
            "#,
        )
        .bind(collection.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(stored_from_row).collect()
    }

    /// Documents whose value at `path` equals `value`, ordered by key
    ///
    /// The path is written into the statement as a literal so the expression
    /// indexes on `body -> '<path>'` apply.
    pub async fn find_where<T: DeserializeOwned>(
        &self,
        collection: Collection,
        path: &str,
        value: &Value,
    ) -> Result<Vec<T>> {
        let sql = format!(
            r#"
            SELECT doc_key, body, created_at, updated_at
            FROM documents
            WHERE collection = ? AND (body -> {}) = ?
            ORDER BY doc_key
            "#,
            path_literal(path)?
        );
        let rows = sqlx::query(&sql)
            .bind(collection.as_str())
            .bind(serde_json::to_string(value)?)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| stored_from_row(row)?.decode())
            .collect()
    }

    pub async fn count(&self, collection: Collection) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE collection = ?")
            .bind(collection.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Whether any document of the collection has an element of the array at
    /// `array_path` whose `natural_key` equals `key_value`
    pub async fn exists_in_array(
        &self,
        collection: Collection,
        array_path: &str,
        natural_key: &str,
        key_value: &Value,
    ) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM documents, json_each(documents.body, ?) AS element
                WHERE documents.collection = ? AND (element.value -> ?) = ?
            )
            "#,
        )
        .bind(array_path)
        .bind(collection.as_str())
        .bind(natural_key)
        .bind(serde_json::to_string(key_value)?)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    // ------------------------------------------------------------------
    // Whole-document writes
    // ------------------------------------------------------------------

    /// Insert the document unless the key already exists
    ///
    /// Returns `true` when this call created the document.
    pub async fn insert_if_absent<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        doc: &T,
    ) -> Result<bool> {
        let body = serde_json::to_string(doc)?;

        retry_on_lock("insert_if_absent", self.max_lock_wait_ms, || async {
            let now = Utc::now();
            let result = sqlx::query(
                r#"
                INSERT INTO documents (collection, doc_key, body, created_at, updated_at)
                VALUES (?, ?, json(?), ?, ?)
                ON CONFLICT(collection, doc_key) DO NOTHING
                "#,
            )
            .bind(collection.as_str())
            .bind(key)
            .bind(&body)
            .bind(now)
            .bind(now)
            .execute(&self.pool)
            .await?;

            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await
    }

    /// Insert or replace by key; `created_at` of an existing document is kept
    pub async fn upsert<T: Serialize>(&self, collection: Collection, key: &str, doc: &T) -> Result<()> {
        let body = serde_json::to_string(doc)?;

        retry_on_lock("upsert", self.max_lock_wait_ms, || async {
            upsert_query(collection, key, &body, Utc::now())
                .execute(&self.pool)
                .await?;
            Ok::<_, Error>(())
        })
        .await
    }

    /// Delete a document; returns whether it existed
    pub async fn delete(&self, collection: Collection, key: &str) -> Result<bool> {
        retry_on_lock("delete", self.max_lock_wait_ms, || async {
            let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_key = ?")
                .bind(collection.as_str())
                .bind(key)
                .execute(&self.pool)
                .await?;
            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Path-addressed writes
    // ------------------------------------------------------------------

    /// Append `element` to the array at `array_path`
    pub async fn push_at_path<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        array_path: &str,
        element: &T,
        guard: Option<&PathGuard>,
    ) -> Result<()> {
        let element = serde_json::to_string(element)?;
        let append_path = format!("{}[#]", array_path);
        let guard_value = encode_guard(guard)?;
        let mut sql = String::from(
            r#"
            UPDATE documents
            SET body = json_insert(body, ?, json(?)), updated_at = ?
            WHERE collection = ? AND doc_key = ? AND json_type(body, ?) = 'array'
            "#,
        );
        if guard.is_some() {
            sql.push_str(" AND (body -> ?) = ?");
        }

        let applied = retry_on_lock("push_at_path", self.max_lock_wait_ms, || async {
            let mut query = sqlx::query(&sql)
                .bind(&append_path)
                .bind(&element)
                .bind(Utc::now())
                .bind(collection.as_str())
                .bind(key)
                .bind(array_path);
            if let (Some(g), Some(v)) = (guard, &guard_value) {
                query = query.bind(&g.path).bind(v);
            }
            let result = query.execute(&self.pool).await?;
            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await?;

        if !applied {
            return Err(Error::NotFound(format!(
                "{} array {} in {}",
                collection, array_path, key
            )));
        }
        Ok(())
    }

    /// Append `element` unless an element of the array already has
    /// `natural_key` (a path relative to the element) equal to `key_value`
    ///
    /// Returns `true` when appended, `false` when an equal element exists.
    /// The existence check and the append are one statement.
    #[allow(clippy::too_many_arguments)]
    pub async fn push_unique_at_path<T: Serialize>(
        &self,
        collection: Collection,
        key: &str,
        array_path: &str,
        natural_key: &str,
        key_value: &Value,
        element: &T,
        guard: Option<&PathGuard>,
    ) -> Result<bool> {
        let element = serde_json::to_string(element)?;
        let key_value = serde_json::to_string(key_value)?;
        let append_path = format!("{}[#]", array_path);
        let guard_value = encode_guard(guard)?;
        let guard_clause = if guard.is_some() { " AND (body -> ?) = ?" } else { "" };
        let sql = format!(
            r#"
            UPDATE documents
            SET body = json_insert(body, ?, json(?)), updated_at = ?
            WHERE collection = ? AND doc_key = ?
              AND json_type(body, ?) = 'array'
              AND NOT EXISTS (
                  SELECT 1 FROM json_each(documents.body, ?) AS element
                  WHERE (element.value -> ?) = ?
              ){}
            "#,
            guard_clause
        );

        let applied = retry_on_lock("push_unique_at_path", self.max_lock_wait_ms, || async {
            let mut query = sqlx::query(&sql)
                .bind(&append_path)
                .bind(&element)
                .bind(Utc::now())
                .bind(collection.as_str())
                .bind(key)
                .bind(array_path)
                .bind(array_path)
                .bind(natural_key)
                .bind(&key_value);
            if let (Some(g), Some(v)) = (guard, &guard_value) {
                query = query.bind(&g.path).bind(v);
            }
            let result = query.execute(&self.pool).await?;
            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await?;

        if applied {
            return Ok(true);
        }

        // Not appended: either an equal element exists, or the target is gone
        let check_sql = format!(
            "SELECT EXISTS(SELECT 1 FROM documents \
             WHERE collection = ? AND doc_key = ? AND json_type(body, ?) = 'array'{})",
            guard_clause
        );
        let mut check = sqlx::query_scalar::<_, bool>(&check_sql)
            .bind(collection.as_str())
            .bind(key)
            .bind(array_path);
        if let (Some(g), Some(v)) = (guard, &guard_value) {
            check = check.bind(&g.path).bind(v);
        }
        let array_exists = check.fetch_one(&self.pool).await?;

        if !array_exists {
            return Err(Error::NotFound(format!(
                "{} array {} in {}",
                collection, array_path, key
            )));
        }
        Ok(false)
    }

    /// Set one or more paths in a single statement
    ///
    /// Returns `false` when the document is missing or the guard does not hold.
    pub async fn set_at_paths(
        &self,
        collection: Collection,
        key: &str,
        fields: &[(String, Value)],
        guard: Option<&PathGuard>,
    ) -> Result<bool> {
        if fields.is_empty() {
            return Ok(true);
        }

        let encoded: Vec<(String, String)> = fields
            .iter()
            .map(|(path, value)| Ok((path.clone(), serde_json::to_string(value)?)))
            .collect::<Result<_>>()?;
        let guard_value = encode_guard(guard)?;
        let sql = set_fields_sql(encoded.len(), guard.is_some());

        retry_on_lock("set_at_paths", self.max_lock_wait_ms, || async {
            let mut query = sqlx::query(&sql);
            for (path, value) in &encoded {
                query = query.bind(path).bind(value);
            }
            query = query
                .bind(Utc::now())
                .bind(collection.as_str())
                .bind(key);
            if let (Some(g), Some(v)) = (guard, &guard_value) {
                query = query.bind(&g.path).bind(v);
            }
            let result = query.execute(&self.pool).await?;
            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await
    }

    /// Add `by` to the integer at `path` (missing counts as 0)
    pub async fn increment_at_path(
        &self,
        collection: Collection,
        key: &str,
        path: &str,
        by: i64,
        guard: Option<&PathGuard>,
    ) -> Result<bool> {
        let guard_value = encode_guard(guard)?;
        let mut sql = String::from(
            r#"
            UPDATE documents
            SET body = json_set(body, ?, COALESCE(json_extract(body, ?), 0) + ?), updated_at = ?
            WHERE collection = ? AND doc_key = ?
            "#,
        );
        if guard.is_some() {
            sql.push_str(" AND (body -> ?) = ?");
        }

        retry_on_lock("increment_at_path", self.max_lock_wait_ms, || async {
            let mut query = sqlx::query(&sql)
                .bind(path)
                .bind(path)
                .bind(by)
                .bind(Utc::now())
                .bind(collection.as_str())
                .bind(key);
            if let (Some(g), Some(v)) = (guard, &guard_value) {
                query = query.bind(&g.path).bind(v);
            }
            let result = query.execute(&self.pool).await?;
            Ok::<_, Error>(result.rows_affected() == 1)
        })
        .await
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// Apply every operation in one transaction; any failure rolls back all
    pub async fn write_batch(&self, ops: &[WriteOp]) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let encoded: Vec<EncodedOp> = ops.iter().map(EncodedOp::encode).collect::<Result<_>>()?;

        retry_on_lock("write_batch", self.max_lock_wait_ms, || async {
            let mut tx = self.pool.begin().await?;
            let now = Utc::now();

            for op in &encoded {
                match op {
                    EncodedOp::Upsert { collection, key, body } => {
                        upsert_query(*collection, key, body, now)
                            .execute(&mut *tx)
                            .await?;
                    }
                    EncodedOp::SetFields { collection, key, fields } => {
                        let sql = set_fields_sql(fields.len(), false);
                        let mut query = sqlx::query(&sql);
                        for (path, value) in fields {
                            query = query.bind(path).bind(value);
                        }
                        let result = query
                            .bind(now)
                            .bind(collection.as_str())
                            .bind(key)
                            .execute(&mut *tx)
                            .await?;
                        if result.rows_affected() != 1 {
                            return Err(Error::NotFound(format!("{} {}", collection, key)));
                        }
                    }
                }
            }

            tx.commit().await?;
            Ok::<_, Error>(())
        })
        .await?;

        debug!(operations = ops.len(), "Batch write committed");
        Ok(())
    }

    /// Relocate a live document into `historical_data`
    ///
    /// The historical copy is written first and the live row deleted second,
    /// inside one transaction: either both happen or neither does. Returns the
    /// historical record key, or `None` when the live document is already gone.
    pub async fn move_to_history(&self, collection: Collection, key: &str) -> Result<Option<String>> {
        if collection == Collection::HistoricalData {
            return Err(Error::Archival("historical records are write-once".to_string()));
        }

        retry_on_lock("move_to_history", self.max_lock_wait_ms, || async {
            let historical_key = Uuid::new_v4().to_string();
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;

            let copied = sqlx::query(
                r#"
                INSERT INTO documents (collection, doc_key, body, created_at, updated_at)
                SELECT ?, ?,
                       json_object(
                           'collectionName', collection,
                           'documentId', doc_key,
                           'data', json(body),
                           'created_at', ?
                       ),
                       ?, ?
                FROM documents
                WHERE collection = ? AND doc_key = ?
                "#,
            )
            .bind(Collection::HistoricalData.as_str())
            .bind(&historical_key)
            .bind(now.to_rfc3339())
            .bind(now)
            .bind(now)
            .bind(collection.as_str())
            .bind(key)
            .execute(&mut *tx)
            .await?;

            if copied.rows_affected() == 0 {
                tx.rollback().await?;
                return Ok(None);
            }

            let deleted = sqlx::query("DELETE FROM documents WHERE collection = ? AND doc_key = ?")
                .bind(collection.as_str())
                .bind(key)
                .execute(&mut *tx)
                .await?;

            if deleted.rows_affected() != 1 {
                tx.rollback().await?;
                return Err(Error::Archival(format!(
                    "live document {} {} vanished during archival",
                    collection, key
                )));
            }

            tx.commit().await?;
            Ok::<_, Error>(Some(historical_key))
        })
        .await
    }

    /// Relocate nested nodes of a live document into `historical_data`
    ///
    /// Parts are applied in order inside one transaction; each is copied
    /// first and removed second. Removing a node shifts its later siblings,
    /// so callers list parts of one array from the highest index down. A
    /// guard that no longer holds rolls the whole document back. Returns the
    /// historical record keys, one per part.
    pub async fn move_parts_to_history(
        &self,
        collection: Collection,
        key: &str,
        parts: &[ArchivedPart],
    ) -> Result<Vec<String>> {
        if collection == Collection::HistoricalData {
            return Err(Error::Archival("historical records are write-once".to_string()));
        }
        if parts.is_empty() {
            return Ok(Vec::new());
        }

        let guards: Vec<String> = parts
            .iter()
            .map(|part| serde_json::to_string(&part.guard.equals))
            .collect::<std::result::Result<_, _>>()?;

        retry_on_lock("move_parts_to_history", self.max_lock_wait_ms, || async {
            let now = Utc::now();
            let mut tx = self.pool.begin().await?;
            let mut historical_keys = Vec::with_capacity(parts.len());

            for (part, guard_value) in parts.iter().zip(&guards) {
                let historical_key = Uuid::new_v4().to_string();
                let copied = sqlx::query(
                    r#"
                    INSERT INTO documents (collection, doc_key, body, created_at, updated_at)
                    SELECT ?, ?,
                           json_object(
                               'collectionName', collection,
                               'documentId', doc_key,
                               'path', ?,
                               'data', json(body -> ?),
                               'created_at', ?
                           ),
                           ?, ?
                    FROM documents
                    WHERE collection = ? AND doc_key = ?
                      AND json_type(body, ?) IS NOT NULL
                      AND (body -> ?) = ?
                    "#,
                )
                .bind(Collection::HistoricalData.as_str())
                .bind(&historical_key)
                .bind(&part.path)
                .bind(&part.path)
                .bind(now.to_rfc3339())
                .bind(now)
                .bind(now)
                .bind(collection.as_str())
                .bind(key)
                .bind(&part.path)
                .bind(&part.guard.path)
                .bind(guard_value)
                .execute(&mut *tx)
                .await?;

                if copied.rows_affected() != 1 {
                    tx.rollback().await?;
                    return Err(Error::Archival(format!(
                        "{} {} changed during archival at {}",
                        collection, key, part.path
                    )));
                }

                sqlx::query(
                    "UPDATE documents SET body = json_remove(body, ?), updated_at = ? \
                     WHERE collection = ? AND doc_key = ?",
                )
                .bind(&part.path)
                .bind(now)
                .bind(collection.as_str())
                .bind(key)
                .execute(&mut *tx)
                .await?;

                historical_keys.push(historical_key);
            }

            tx.commit().await?;
            Ok::<_, Error>(historical_keys)
        })
        .await
    }
}

/// Quote a JSON path for use as an SQL literal
///
/// Only plain member and index steps are accepted, so the result never needs
/// escaping.
fn path_literal(path: &str) -> Result<String> {
    let valid = path.starts_with('$')
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '$' | '.' | '_' | '[' | ']' | '#' | '-'));
    if !valid {
        return Err(Error::Validation(format!("unsupported document path {:?}", path)));
    }
    Ok(format!("'{}'", path))
}

/// Pre-serialized form of a [`WriteOp`] so retries don't re-encode
enum EncodedOp {
    Upsert {
        collection: Collection,
        key: String,
        body: String,
    },
    SetFields {
        collection: Collection,
        key: String,
        fields: Vec<(String, String)>,
    },
}

impl EncodedOp {
    fn encode(op: &WriteOp) -> Result<Self> {
        Ok(match op {
            WriteOp::Upsert { collection, key, body } => EncodedOp::Upsert {
                collection: *collection,
                key: key.clone(),
                body: serde_json::to_string(body)?,
            },
            WriteOp::SetFields { collection, key, fields } => EncodedOp::SetFields {
                collection: *collection,
                key: key.clone(),
                fields: fields
                    .iter()
                    .map(|(path, value)| Ok((path.clone(), serde_json::to_string(value)?)))
                    .collect::<Result<_>>()?,
            },
        })
    }
}

fn upsert_query<'q>(
    collection: Collection,
    key: &'q str,
    body: &'q str,
    now: DateTime<Utc>,
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    sqlx::query(
        r#"
        INSERT INTO documents (collection, doc_key, body, created_at, updated_at)
        VALUES (?, ?, json(?), ?, ?)
        ON CONFLICT(collection, doc_key) DO UPDATE SET
            body = excluded.body,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(collection.as_str())
    .bind(key)
    .bind(body)
    .bind(now)
    .bind(now)
}

fn encode_guard(guard: Option<&PathGuard>) -> Result<Option<String>> {
    Ok(guard.map(|g| serde_json::to_string(&g.equals)).transpose()?)
}

/// `UPDATE` with one `json_set` path/value pair per field
///
/// Bind order: (path, value) per field, updated_at, collection, key, then
/// guard path and guard value when guarded.
fn set_fields_sql(field_count: usize, guarded: bool) -> String {
    let pairs = vec!["?, json(?)"; field_count].join(", ");
    let mut sql = format!(
        "UPDATE documents SET body = json_set(body, {}), updated_at = ? \
         WHERE collection = ? AND doc_key = ?",
        pairs
    );
    if guarded {
        sql.push_str(" AND (body -> ?) = ?");
    }
    sql
}

fn stored_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StoredDocument> {
    let body: String = row.try_get("body")?;
    Ok(StoredDocument {
        key: row.try_get("doc_key")?,
        body: serde_json::from_str(&body)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
