//! Workflow repository trait definition.
//!
//! Storage for workflow sessions and steps, including the exact-match dedup
//! probe. The uniqueness constraint on `(step_type, input_hash)` for
//! completed rows is enforced by the backing store; the implementation maps
//! unique-violation errors to [`RepositoryError::Conflict`] so the workflow
//! service can resolve completion races.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use mentis_types::error::RepositoryError;
use mentis_types::workflow::{WorkflowSession, WorkflowStep};

/// Repository trait for workflow persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait WorkflowRepository: Send + Sync {
    /// Upsert a session by id.
    fn store_session(
        &self,
        session: &WorkflowSession,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a session by id. Steps are not loaded here; the workflow service
    /// loads them with [`WorkflowRepository::get_steps_by_session`].
    fn get_session(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<WorkflowSession>, RepositoryError>> + Send;

    /// Update a session's goal, context, status, and `updated_at`.
    fn update_session(
        &self,
        session: &WorkflowSession,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Insert a new step row.
    fn store_step(
        &self,
        step: &WorkflowStep,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a step by id.
    fn get_step(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<WorkflowStep>, RepositoryError>> + Send;

    /// Update a step's artifact link, output hash, metadata, completion time,
    /// and status. A transition to `completed` that collides with an existing
    /// completed `(step_type, input_hash)` row fails with `Conflict`.
    fn update_step(
        &self,
        step: &WorkflowStep,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// All steps of a session, ordered by `created_at` ascending.
    fn get_steps_by_session(
        &self,
        session_id: Uuid,
    ) -> impl Future<Output = Result<Vec<WorkflowStep>, RepositoryError>> + Send;

    /// The most recent completed step matching `(step_type, input_hash)`.
    /// This is the exact-match dedup lookup.
    fn find_step_by_input_hash(
        &self,
        step_type: &str,
        input_hash: &str,
    ) -> impl Future<Output = Result<Option<WorkflowStep>, RepositoryError>> + Send;

    /// Mark `running` steps created before the cutoff as `failed`, reclaiming
    /// rows orphaned by lost tasks. Returns the number of steps reaped.
    fn reap_stale_running_steps(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64, RepositoryError>> + Send;
}
