//! Document store
//!
//! Schema-flexible persistence addressed by collection + document id. Every
//! document is a JSON object kept as text in the `documents` table.
//!
//! This module provides:
//! - `DocumentStore` trait used by the services
//! - `SqlxDocumentStore` implementing it for SQLite and MySQL
//! - `Snapshot`, the tagged result of a point lookup

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::DynDatabasePool;

/// JSON object body of a document
pub type Fields = Map<String, Value>;

/// Named document collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Posts,
    Comments,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document: its id plus its JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    /// Deserialize into a model, exposing the document id as an `id` field.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let mut data = self.data;
        data.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(data))
            .with_context(|| format!("Malformed document {}", self.id))
    }
}

/// Outcome of a point lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot<T> {
    Found(T),
    NotFound,
}

impl<T> Snapshot<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Snapshot::Found(_))
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            Snapshot::Found(value) => Some(value),
            Snapshot::NotFound => None,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Snapshot<U>, E> {
        match self {
            Snapshot::Found(value) => f(value).map(Snapshot::Found),
            Snapshot::NotFound => Ok(Snapshot::NotFound),
        }
    }
}

impl Snapshot<Document> {
    pub fn decode<T: DeserializeOwned>(self) -> Result<Snapshot<T>> {
        self.try_map(Document::decode)
    }
}

/// Scan filter applied to a document's top-level fields
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq { field: String, value: Value },
    /// `field` is an array holding `value`
    ArrayContains { field: String, value: Value },
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, data: &Fields) -> bool {
        match self {
            Filter::Eq { field, value } => data.get(field) == Some(value),
            Filter::ArrayContains { field, value } => data
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Document store operations used by the services
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> Result<Snapshot<Document>>;

    /// Store a new document under a generated id and return the id
    async fn insert(&self, collection: Collection, data: Fields) -> Result<String>;

    /// Shallow-merge `patch` into an existing document.
    ///
    /// Returns `false` if the document does not exist.
    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<bool>;

    /// Returns `false` if the document does not exist
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool>;

    /// All documents of a collection in insertion order, optionally filtered
    async fn list(&self, collection: Collection, filter: Option<&Filter>) -> Result<Vec<Document>>;

    /// Atomically add `delta` to a numeric field (absent counts as 0) and
    /// stamp `updatedAt`. Returns the document after the write.
    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Snapshot<Document>>;
}

/// SQLx-based document store supporting SQLite and MySQL
pub struct SqlxDocumentStore {
    pool: DynDatabasePool,
}

enum Backend<'a> {
    Sqlite(&'a SqlitePool),
    Mysql(&'a MySqlPool),
}

impl SqlxDocumentStore {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a shared store for dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DocumentStore> {
        Arc::new(Self::new(pool))
    }

    fn backend(&self) -> Result<Backend<'_>> {
        if let Some(pool) = self.pool.as_sqlite() {
            Ok(Backend::Sqlite(pool))
        } else if let Some(pool) = self.pool.as_mysql() {
            Ok(Backend::Mysql(pool))
        } else {
            anyhow::bail!("Unsupported database pool")
        }
    }
}

#[async_trait]
impl DocumentStore for SqlxDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Snapshot<Document>> {
        let data = match self.backend()? {
            Backend::Sqlite(pool) => get_sqlite(pool, collection, id).await?,
            Backend::Mysql(pool) => get_mysql(pool, collection, id).await?,
        };

        match data {
            Some(raw) => Ok(Snapshot::Found(Document {
                id: id.to_string(),
                data: parse_fields(id, &raw)?,
            })),
            None => Ok(Snapshot::NotFound),
        }
    }

    async fn insert(&self, collection: Collection, data: Fields) -> Result<String> {
        let id = Uuid::new_v4().simple().to_string();
        let body = serde_json::to_string(&data)?;

        let query = "INSERT INTO documents (collection, id, data) VALUES (?, ?, ?)";
        match self.backend()? {
            Backend::Sqlite(pool) => {
                sqlx::query(query)
                    .bind(collection.as_str())
                    .bind(&id)
                    .bind(&body)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
            }
            Backend::Mysql(pool) => {
                sqlx::query(query)
                    .bind(collection.as_str())
                    .bind(&id)
                    .bind(&body)
                    .execute(pool)
                    .await
                    .map(|r| r.rows_affected())
            }
        }
        .with_context(|| format!("Failed to insert into {}", collection))?;

        Ok(id)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Fields) -> Result<bool> {
        let patch = serde_json::to_string(&patch)?;

        let affected = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(
                r#"
                UPDATE documents
                SET data = json_patch(data, ?), updated_at = CURRENT_TIMESTAMP
                WHERE collection = ? AND id = ?
                "#,
            )
            .bind(&patch)
            .bind(collection.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(
                r#"
                UPDATE documents
                SET data = JSON_MERGE_PATCH(data, ?)
                WHERE collection = ? AND id = ?
                "#,
            )
            .bind(&patch)
            .bind(collection.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to update {}/{}", collection, id))?;

        Ok(affected > 0)
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let query = "DELETE FROM documents WHERE collection = ? AND id = ?";
        let affected = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(query)
                .bind(collection.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(query)
                .bind(collection.as_str())
                .bind(id)
                .execute(pool)
                .await
                .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to delete {}/{}", collection, id))?;

        Ok(affected > 0)
    }

    async fn list(&self, collection: Collection, filter: Option<&Filter>) -> Result<Vec<Document>> {
        let rows = match self.backend()? {
            Backend::Sqlite(pool) => list_sqlite(pool, collection).await?,
            Backend::Mysql(pool) => list_mysql(pool, collection).await?,
        };

        let mut documents = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
            let data = parse_fields(&id, &raw)?;
            if filter.map_or(true, |f| f.matches(&data)) {
                documents.push(Document { id, data });
            }
        }
        Ok(documents)
    }

    async fn increment(
        &self,
        collection: Collection,
        id: &str,
        field: &str,
        delta: i64,
        at: DateTime<Utc>,
    ) -> Result<Snapshot<Document>> {
        let path = format!("$.{}", field);
        let stamp = serde_json::to_value(at)?;
        let stamp = stamp.as_str().unwrap_or_default().to_string();

        // One statement, so concurrent increments never lose an update.
        let affected = match self.backend()? {
            Backend::Sqlite(pool) => sqlx::query(
                r#"
                UPDATE documents
                SET data = json_set(
                        data,
                        ?, COALESCE(json_extract(data, ?), 0) + ?,
                        '$.updatedAt', ?
                    ),
                    updated_at = CURRENT_TIMESTAMP
                WHERE collection = ? AND id = ?
                "#,
            )
            .bind(&path)
            .bind(&path)
            .bind(delta)
            .bind(&stamp)
            .bind(collection.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
            Backend::Mysql(pool) => sqlx::query(
                r#"
                UPDATE documents
                SET data = JSON_SET(
                        data,
                        ?, CAST(COALESCE(JSON_EXTRACT(data, ?), 0) AS SIGNED) + ?,
                        '$.updatedAt', ?
                    )
                WHERE collection = ? AND id = ?
                "#,
            )
            .bind(&path)
            .bind(&path)
            .bind(delta)
            .bind(&stamp)
            .bind(collection.as_str())
            .bind(id)
            .execute(pool)
            .await
            .map(|r| r.rows_affected()),
        }
        .with_context(|| format!("Failed to increment {} on {}/{}", field, collection, id))?;

        if affected == 0 {
            return Ok(Snapshot::NotFound);
        }
        self.get(collection, id).await
    }
}

/// Serialize a model into a document body
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value).context("Failed to serialize document")? {
        Value::Object(map) => Ok(map),
        other => anyhow::bail!("Expected a JSON object, got {}", other),
    }
}

fn parse_fields(id: &str, raw: &str) -> Result<Fields> {
    serde_json::from_str(raw).with_context(|| format!("Corrupt document body for {}", id))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn get_sqlite(pool: &SqlitePool, collection: Collection, id: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT data FROM documents WHERE collection = ? AND id = ?")
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to fetch {}/{}", collection, id))?;

    Ok(row.map(|r| r.get("data")))
}

async fn list_sqlite(pool: &SqlitePool, collection: Collection) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query("SELECT id, data FROM documents WHERE collection = ? ORDER BY seq")
        .bind(collection.as_str())
        .fetch_all(pool)
        .await
        .with_context(|| format!("Failed to list {}", collection))?;

    Ok(rows.iter().map(|r| (r.get("id"), r.get("data"))).collect())
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn get_mysql(pool: &MySqlPool, collection: Collection, id: &str) -> Result<Option<String>> {
    let row = sqlx::query(
        "SELECT CAST(data AS CHAR) AS data FROM documents WHERE collection = ? AND id = ?",
    )
    .bind(collection.as_str())
    .bind(id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to fetch {}/{}", collection, id))?;

    Ok(row.map(|r| r.get("data")))
}

async fn list_mysql(pool: &MySqlPool, collection: Collection) -> Result<Vec<(String, String)>> {
    let rows = sqlx::query(
        "SELECT id, CAST(data AS CHAR) AS data FROM documents WHERE collection = ? ORDER BY seq",
    )
    .bind(collection.as_str())
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to list {}", collection))?;

    Ok(rows.iter().map(|r| (r.get("id"), r.get("data"))).collect())
}
