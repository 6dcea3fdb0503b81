//! SQLite artifact repository implementation.
//!
//! Implements `ArtifactRepository` from `mentis-core` using sqlx with split
//! read/write pools. Metadata is stored as a JSON blob; `source_url` is a
//! generated column over `json_extract(metadata, '$.source_url')` so that
//! invalidation sweeps stay indexed. Embeddings live in the vector index,
//! not here.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use mentis_core::hash;
use mentis_core::repository::ArtifactRepository;
use mentis_types::artifact::{Artifact, ArtifactType};
use mentis_types::error::RepositoryError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ArtifactRepository`.
#[derive(Clone)]
pub struct SqliteArtifactRepository {
    pool: DatabasePool,
}

impl SqliteArtifactRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct ArtifactRow {
    id: String,
    artifact_type: String,
    content_hash: String,
    content: Option<Vec<u8>>,
    metadata: String,
    created_at: String,
    updated_at: String,
    stale: bool,
}

impl ArtifactRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            artifact_type: row.try_get("type")?,
            content_hash: row.try_get("content_hash")?,
            content: row.try_get("content")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            stale: row.try_get("stale")?,
        })
    }

    fn into_artifact(self) -> Result<Artifact, RepositoryError> {
        let id = parse_uuid(&self.id)?;
        let artifact_type: ArtifactType = self
            .artifact_type
            .parse()
            .map_err(RepositoryError::Query)?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid metadata JSON: {e}")))?;

        Ok(Artifact {
            id,
            artifact_type,
            content_hash: self.content_hash,
            content: self.content,
            // Embeddings are held by the vector index, not this store
            embedding: Vec::new(),
            dependencies: Vec::new(),
            metadata,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            stale: self.stale,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Map sqlx errors, surfacing unique-index violations as `Conflict` so the
/// services can downgrade dedup races to skips.
pub(crate) fn map_sqlx_error(e: sqlx::Error) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(db.message().to_string())
        }
        _ => RepositoryError::Query(e.to_string()),
    }
}

/// The store refuses (content, content_hash) pairs that disagree.
fn check_content_hash(artifact: &Artifact) -> Result<(), RepositoryError> {
    if let Some(content) = &artifact.content {
        let computed = hash::content_hash(content);
        if artifact.content_hash != computed {
            return Err(RepositoryError::Invariant(format!(
                "content_hash '{}' does not match content (expected '{computed}')",
                artifact.content_hash
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// ArtifactRepository impl
// ---------------------------------------------------------------------------

impl ArtifactRepository for SqliteArtifactRepository {
    async fn store(&self, artifact: &Artifact) -> Result<(), RepositoryError> {
        check_content_hash(artifact)?;

        let metadata_json = serde_json::to_string(&artifact.metadata)
            .map_err(|e| RepositoryError::Query(format!("serialize metadata: {e}")))?;

        sqlx::query(
            r#"INSERT INTO artifacts (id, type, content_hash, content, metadata, created_at, updated_at, stale)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 type = excluded.type,
                 content_hash = excluded.content_hash,
                 content = excluded.content,
                 metadata = excluded.metadata,
                 updated_at = excluded.updated_at,
                 stale = excluded.stale"#,
        )
        .bind(artifact.id.to_string())
        .bind(artifact.artifact_type.as_str())
        .bind(&artifact.content_hash)
        .bind(&artifact.content)
        .bind(&metadata_json)
        .bind(format_datetime(&artifact.created_at))
        .bind(format_datetime(&artifact.updated_at))
        .bind(artifact.stale)
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Artifact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, type, content_hash, content, metadata, created_at, updated_at, stale FROM artifacts WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = ArtifactRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(r.into_artifact()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_content_hash(&self, hash: &str) -> Result<Option<Artifact>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, type, content_hash, content, metadata, created_at, updated_at, stale FROM artifacts WHERE content_hash = ?",
        )
        .bind(hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = ArtifactRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(r.into_artifact()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Artifact>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, type, content_hash, content, metadata, created_at, updated_at, stale FROM artifacts ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut artifacts = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = ArtifactRow::from_row(row).map_err(map_sqlx_error)?;
            artifacts.push(r.into_artifact()?);
        }
        Ok(artifacts)
    }

    async fn update(&self, artifact: &Artifact) -> Result<(), RepositoryError> {
        check_content_hash(artifact)?;

        let metadata_json = serde_json::to_string(&artifact.metadata)
            .map_err(|e| RepositoryError::Query(format!("serialize metadata: {e}")))?;

        let result = sqlx::query(
            "UPDATE artifacts SET type = ?, content_hash = ?, content = ?, metadata = ?, updated_at = ?, stale = ? WHERE id = ?",
        )
        .bind(artifact.artifact_type.as_str())
        .bind(&artifact.content_hash)
        .bind(&artifact.content)
        .bind(&metadata_json)
        .bind(format_datetime(&Utc::now()))
        .bind(artifact.stale)
        .bind(artifact.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        // Dependency edges cascade via foreign keys
        sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn store_dependency(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO artifact_dependencies (parent_id, child_id, created_at)
               VALUES (?, ?, ?)
               ON CONFLICT (parent_id, child_id) DO NOTHING"#,
        )
        .bind(parent_id.to_string())
        .bind(child_id.to_string())
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_dependencies(&self, id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let rows = sqlx::query("SELECT parent_id FROM artifact_dependencies WHERE child_id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let mut parents = Vec::with_capacity(rows.len());
        for row in &rows {
            let parent_id: String = row.try_get("parent_id").map_err(map_sqlx_error)?;
            parents.push(parse_uuid(&parent_id)?);
        }
        Ok(parents)
    }

    async fn get_dependents(&self, id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        let rows = sqlx::query("SELECT child_id FROM artifact_dependencies WHERE parent_id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(map_sqlx_error)?;

        let mut children = Vec::with_capacity(rows.len());
        for row in &rows {
            let child_id: String = row.try_get("child_id").map_err(map_sqlx_error)?;
            children.push(parse_uuid(&child_id)?);
        }
        Ok(children)
    }

    async fn mark_stale(&self, id: Uuid) -> Result<bool, RepositoryError> {
        // Already-stale rows are untouched so updated_at is not re-bumped
        let result = sqlx::query(
            "UPDATE artifacts SET stale = 1, updated_at = ? WHERE id = ? AND stale = 0",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_stale_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let rows = sqlx::query(
            "UPDATE artifacts SET stale = 1, updated_at = ? WHERE source_url = ? AND stale = 0 RETURNING id",
        )
        .bind(format_datetime(&Utc::now()))
        .bind(source_url)
        .fetch_all(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        let mut ids = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(map_sqlx_error)?;
            ids.push(parse_uuid(&id)?);
        }
        Ok(ids)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
