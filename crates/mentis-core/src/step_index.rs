//! The step index: workflow sessions and steps with an exact-match dedup
//! probe and a similarity-search bridge.
//!
//! Backed by the same durable store as the artifact model but kept as a
//! separate component. Exact-match lookup delegates straight to the
//! repository; similarity lookup composes a filtered vector search over
//! artifact embeddings (payload `step_type`) and rehydrates step rows from
//! the `step_id` payload field.

use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_types::error::{RepositoryError, WorkflowError};
use mentis_types::workflow::{StepStatus, WorkflowSession, WorkflowStep};

use crate::repository::WorkflowRepository;
use crate::vector::VectorIndex;

/// Session and step state with dedup and similarity lookups.
pub struct StepIndex<W, V> {
    repo: W,
    vectors: V,
}

impl<W: WorkflowRepository, V: VectorIndex> StepIndex<W, V> {
    pub fn new(repo: W, vectors: V) -> Self {
        Self { repo, vectors }
    }

    pub async fn store_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        self.repo.store_session(session).await
    }

    pub async fn get_session(
        &self,
        id: Uuid,
    ) -> Result<Option<WorkflowSession>, RepositoryError> {
        self.repo.get_session(id).await
    }

    pub async fn update_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        self.repo.update_session(session).await
    }

    pub async fn store_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        self.repo.store_step(step).await
    }

    pub async fn get_step(&self, id: Uuid) -> Result<Option<WorkflowStep>, RepositoryError> {
        self.repo.get_step(id).await
    }

    pub async fn update_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        self.repo.update_step(step).await
    }

    pub async fn get_steps_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, RepositoryError> {
        self.repo.get_steps_by_session(session_id).await
    }

    /// The most recent completed step matching `(step_type, input_hash)`.
    pub async fn find_step_by_input_hash(
        &self,
        step_type: &str,
        input_hash: &str,
    ) -> Result<Option<WorkflowStep>, RepositoryError> {
        self.repo.find_step_by_input_hash(step_type, input_hash).await
    }

    /// Completed steps of the given type ranked by similarity of their
    /// artifact embeddings to the query embedding.
    ///
    /// Hits whose payload lacks a parseable `step_id`, or whose step row has
    /// since disappeared or never completed, are skipped.
    pub async fn find_similar_steps(
        &self,
        step_type: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<(WorkflowStep, f32)>, WorkflowError> {
        let mut filter = Map::new();
        filter.insert(
            "step_type".to_string(),
            Value::String(step_type.to_string()),
        );

        let hits = self.vectors.search(embedding, top_k, 0.0, &filter).await?;

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let Some(step_id) = hit
                .payload
                .get("step_id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
            else {
                continue;
            };

            match self.repo.get_step(step_id).await? {
                Some(step)
                    if step.status == StepStatus::Completed && step.step_type == step_type =>
                {
                    results.push((step, hit.score));
                }
                _ => {
                    tracing::debug!(%step_id, "similar-step hit without a completed step row");
                }
            }
        }

        Ok(results)
    }
}
