//! SQLite workflow repository implementation.
//!
//! Implements `WorkflowRepository` from `mentis-core` using sqlx with split
//! read/write pools. Session context and step metadata are stored as JSON
//! blobs. A partial unique index on `(step_type, input_hash)` for completed
//! rows enforces the dedup invariant; violations surface as
//! `RepositoryError::Conflict` for the service to resolve.

use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use mentis_core::repository::WorkflowRepository;
use mentis_types::error::RepositoryError;
use mentis_types::workflow::{SessionStatus, StepStatus, WorkflowSession, WorkflowStep};

use super::artifact::map_sqlx_error;
use super::pool::DatabasePool;

/// SQLite-backed implementation of `WorkflowRepository`.
#[derive(Clone)]
pub struct SqliteWorkflowRepository {
    pool: DatabasePool,
}

impl SqliteWorkflowRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row types
// ---------------------------------------------------------------------------

struct SessionRow {
    id: String,
    goal: String,
    context: String,
    created_at: String,
    updated_at: String,
    status: String,
}

impl SessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            goal: row.try_get("goal")?,
            context: row.try_get("context")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            status: row.try_get("status")?,
        })
    }

    fn into_session(self) -> Result<WorkflowSession, RepositoryError> {
        let status: SessionStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let context = serde_json::from_str(&self.context)
            .map_err(|e| RepositoryError::Query(format!("invalid context JSON: {e}")))?;

        Ok(WorkflowSession {
            id: parse_uuid(&self.id)?,
            goal: self.goal,
            context,
            steps: Vec::new(),
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            status,
        })
    }
}

struct StepRow {
    id: String,
    session_id: String,
    step_type: String,
    artifact_id: Option<String>,
    input_hash: String,
    output_hash: Option<String>,
    metadata: String,
    created_at: String,
    completed_at: Option<String>,
    status: String,
}

impl StepRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            session_id: row.try_get("session_id")?,
            step_type: row.try_get("step_type")?,
            artifact_id: row.try_get("artifact_id")?,
            input_hash: row.try_get("input_hash")?,
            output_hash: row.try_get("output_hash")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
            status: row.try_get("status")?,
        })
    }

    fn into_step(self) -> Result<WorkflowStep, RepositoryError> {
        let status: StepStatus = self.status.parse().map_err(RepositoryError::Query)?;
        let metadata = serde_json::from_str(&self.metadata)
            .map_err(|e| RepositoryError::Query(format!("invalid step metadata JSON: {e}")))?;

        let artifact_id = self
            .artifact_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?;
        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(WorkflowStep {
            id: parse_uuid(&self.id)?,
            session_id: parse_uuid(&self.session_id)?,
            step_type: self.step_type,
            artifact_id,
            input_hash: self.input_hash,
            output_hash: self.output_hash,
            metadata,
            created_at: parse_datetime(&self.created_at)?,
            completed_at,
            status,
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

const STEP_COLUMNS: &str = "id, session_id, step_type, artifact_id, input_hash, output_hash, metadata, created_at, completed_at, status";

// ---------------------------------------------------------------------------
// WorkflowRepository impl
// ---------------------------------------------------------------------------

impl WorkflowRepository for SqliteWorkflowRepository {
    async fn store_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let context_json = serde_json::to_string(&session.context)
            .map_err(|e| RepositoryError::Query(format!("serialize context: {e}")))?;

        sqlx::query(
            r#"INSERT INTO workflow_sessions (id, goal, context, created_at, updated_at, status)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 goal = excluded.goal,
                 context = excluded.context,
                 updated_at = excluded.updated_at,
                 status = excluded.status"#,
        )
        .bind(session.id.to_string())
        .bind(&session.goal)
        .bind(&context_json)
        .bind(format_datetime(&session.created_at))
        .bind(format_datetime(&session.updated_at))
        .bind(session.status.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<WorkflowSession>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, goal, context, created_at, updated_at, status FROM workflow_sessions WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = SessionRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(r.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn update_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let context_json = serde_json::to_string(&session.context)
            .map_err(|e| RepositoryError::Query(format!("serialize context: {e}")))?;

        let result = sqlx::query(
            "UPDATE workflow_sessions SET goal = ?, context = ?, updated_at = ?, status = ? WHERE id = ?",
        )
        .bind(&session.goal)
        .bind(&context_json)
        .bind(format_datetime(&session.updated_at))
        .bind(session.status.as_str())
        .bind(session.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn store_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&step.metadata)
            .map_err(|e| RepositoryError::Query(format!("serialize step metadata: {e}")))?;

        sqlx::query(&format!(
            "INSERT INTO workflow_steps ({STEP_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(step.id.to_string())
        .bind(step.session_id.to_string())
        .bind(&step.step_type)
        .bind(step.artifact_id.map(|id| id.to_string()))
        .bind(&step.input_hash)
        .bind(&step.output_hash)
        .bind(&metadata_json)
        .bind(format_datetime(&step.created_at))
        .bind(step.completed_at.as_ref().map(format_datetime))
        .bind(step.status.as_str())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<WorkflowStep>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = StepRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(r.into_step()?))
            }
            None => Ok(None),
        }
    }

    async fn update_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        let metadata_json = serde_json::to_string(&step.metadata)
            .map_err(|e| RepositoryError::Query(format!("serialize step metadata: {e}")))?;

        // A transition to 'completed' that collides with the partial unique
        // index on (step_type, input_hash) surfaces as Conflict here.
        let result = sqlx::query(
            "UPDATE workflow_steps SET artifact_id = ?, output_hash = ?, metadata = ?, completed_at = ?, status = ? WHERE id = ?",
        )
        .bind(step.artifact_id.map(|id| id.to_string()))
        .bind(&step.output_hash)
        .bind(&metadata_json)
        .bind(step.completed_at.as_ref().map(format_datetime))
        .bind(step.status.as_str())
        .bind(step.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }

    async fn get_steps_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE session_id = ? ORDER BY created_at ASC"
        ))
        .bind(session_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        let mut steps = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = StepRow::from_row(row).map_err(map_sqlx_error)?;
            steps.push(r.into_step()?);
        }
        Ok(steps)
    }

    async fn find_step_by_input_hash(
        &self,
        step_type: &str,
        input_hash: &str,
    ) -> Result<Option<WorkflowStep>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_steps WHERE step_type = ? AND input_hash = ? AND status = 'completed' ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(step_type)
        .bind(input_hash)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => {
                let r = StepRow::from_row(&row).map_err(map_sqlx_error)?;
                Ok(Some(r.into_step()?))
            }
            None => Ok(None),
        }
    }

    async fn reap_stale_running_steps(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE workflow_steps SET status = 'failed' WHERE status = 'running' AND created_at < ?",
        )
        .bind(format_datetime(&cutoff))
        .execute(&self.pool.writer)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
