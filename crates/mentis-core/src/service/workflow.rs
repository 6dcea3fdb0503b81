//! The workflow service: session lifecycle and memoized step execution.
//!
//! Exact-hash dedup is scoped globally by `(step_type, input_hash)` -- no
//! session filter -- matching the cross-session reuse goal. Concurrent
//! executors of the same pair may both run; the uniqueness constraint on
//! completed steps picks the winner and the loser returns the winner's
//! result as a cache hit.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use mentis_types::artifact::Artifact;
use mentis_types::error::{RepositoryError, WorkflowError};
use mentis_types::workflow::{
    CreateSessionRequest, ExecuteStepRequest, ExecuteStepResponse, SessionStatus,
    StepLookupRequest, StepLookupResponse, StepLookupResult, StepStatus, WorkflowSession,
    WorkflowStep,
};

use crate::embedding::EmbeddingEngine;
use crate::hash;
use crate::processor::{StepProcessorRegistry, input_text};
use crate::repository::{ArtifactRepository, WorkflowRepository};
use crate::service::vector_payload;
use crate::step_index::StepIndex;
use crate::vector::VectorIndex;

/// Default similarity-lookup breadth when the request leaves `top_k` unset.
const DEFAULT_LOOKUP_TOP_K: usize = 10;

/// Workflow operations over the step index, artifact store, vector index,
/// embedding engine, and step processors.
pub struct WorkflowService<W, V, A> {
    steps: StepIndex<W, V>,
    artifacts: A,
    vectors: V,
    engine: Arc<EmbeddingEngine>,
    processors: StepProcessorRegistry,
}

impl<W, V, A> WorkflowService<W, V, A>
where
    W: WorkflowRepository,
    V: VectorIndex + Clone,
    A: ArtifactRepository,
{
    pub fn new(
        workflow_repo: W,
        vectors: V,
        artifacts: A,
        engine: Arc<EmbeddingEngine>,
        processors: StepProcessorRegistry,
    ) -> Self {
        Self {
            steps: StepIndex::new(workflow_repo, vectors.clone()),
            artifacts,
            vectors,
            engine,
            processors,
        }
    }

    /// Create a new active session.
    pub async fn create_session(
        &self,
        req: CreateSessionRequest,
    ) -> Result<WorkflowSession, WorkflowError> {
        let now = Utc::now();
        let session = WorkflowSession {
            id: Uuid::now_v7(),
            goal: req.goal,
            context: req.context,
            steps: Vec::new(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
        };

        self.steps.store_session(&session).await?;
        Ok(session)
    }

    /// Load a session with its steps, ordered by creation time.
    pub async fn get_session(&self, id: Uuid) -> Result<WorkflowSession, WorkflowError> {
        let mut session = self
            .steps
            .get_session(id)
            .await?
            .ok_or(WorkflowError::SessionNotFound)?;

        session.steps = self.steps.get_steps_by_session(id).await?;
        Ok(session)
    }

    /// Execute a step, or return the memoized result of a prior completion.
    ///
    /// Misses insert a `running` row, drive the processor, persist the
    /// resulting artifact (reusing an existing row on content-hash match),
    /// index its embedding, and complete the step. A completion conflict
    /// means another executor won the race; the winner's result is returned
    /// with `cached = true` and this executor's row is marked failed.
    pub async fn execute_step(
        &self,
        req: &ExecuteStepRequest,
    ) -> Result<ExecuteStepResponse, WorkflowError> {
        let input_hash = hash::input_hash(&req.input);

        if let Some(step) = self
            .steps
            .find_step_by_input_hash(&req.step_type, &input_hash)
            .await?
        {
            let artifact = self.load_step_artifact(&step).await?;
            return Ok(ExecuteStepResponse {
                step,
                artifact,
                cached: true,
            });
        }

        let mut step = WorkflowStep {
            id: Uuid::now_v7(),
            session_id: req.session_id,
            step_type: req.step_type.clone(),
            artifact_id: None,
            input_hash: input_hash.clone(),
            output_hash: None,
            metadata: req.metadata.clone(),
            created_at: Utc::now(),
            completed_at: None,
            status: StepStatus::Running,
        };
        self.steps.store_step(&step).await?;

        let artifact = match self.processors.process(&step, &req.input, &self.engine).await {
            Ok(artifact) => artifact,
            Err(e) => {
                step.status = StepStatus::Failed;
                if let Err(update_err) = self.steps.update_step(&step).await {
                    tracing::warn!(step_id = %step.id, error = %update_err, "failed to record step failure");
                }
                return Err(e);
            }
        };

        let artifact = self.store_or_reuse_artifact(artifact).await?;

        step.artifact_id = Some(artifact.id);
        step.output_hash = Some(artifact.content_hash.clone());
        step.status = StepStatus::Completed;
        step.completed_at = Some(Utc::now());

        match self.steps.update_step(&step).await {
            Ok(()) => Ok(ExecuteStepResponse {
                step,
                artifact: Some(artifact),
                cached: false,
            }),
            Err(RepositoryError::Conflict(_)) => {
                self.resolve_completion_race(step, &req.step_type, &input_hash)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Similarity-based reuse: rank completed steps of the same type by
    /// cosine similarity of their artifact embeddings to the input.
    pub async fn lookup_step(
        &self,
        req: &StepLookupRequest,
    ) -> Result<StepLookupResponse, WorkflowError> {
        let top_k = if req.top_k == 0 {
            DEFAULT_LOOKUP_TOP_K
        } else {
            req.top_k
        };

        let embedding = self.engine.embed(&input_text(&req.input)).await?;
        let similar = self
            .steps
            .find_similar_steps(&req.step_type, &embedding, top_k)
            .await?;

        let mut results = Vec::with_capacity(similar.len());
        for (step, score) in similar {
            let artifact = match step.artifact_id {
                Some(artifact_id) => self.artifacts.get_by_id(artifact_id).await.ok().flatten(),
                None => None,
            };
            results.push(StepLookupResult {
                step,
                artifact,
                score,
            });
        }

        Ok(StepLookupResponse { results })
    }

    /// Transition a session to `completed`.
    pub async fn complete_session(&self, session_id: Uuid) -> Result<(), WorkflowError> {
        let mut session = self
            .steps
            .get_session(session_id)
            .await?
            .ok_or(WorkflowError::SessionNotFound)?;

        session.status = SessionStatus::Completed;
        session.updated_at = Utc::now();
        Ok(self.steps.update_session(&session).await?)
    }

    /// Transition a session to `failed`, recording the reason in its context.
    pub async fn fail_session(&self, session_id: Uuid, reason: &str) -> Result<(), WorkflowError> {
        let mut session = self
            .steps
            .get_session(session_id)
            .await?
            .ok_or(WorkflowError::SessionNotFound)?;

        session.status = SessionStatus::Failed;
        session.updated_at = Utc::now();
        session.context.insert(
            "failure_reason".to_string(),
            Value::String(reason.to_string()),
        );
        Ok(self.steps.update_session(&session).await?)
    }

    async fn load_step_artifact(
        &self,
        step: &WorkflowStep,
    ) -> Result<Option<Artifact>, WorkflowError> {
        match step.artifact_id {
            Some(artifact_id) => Ok(self.artifacts.get_by_id(artifact_id).await?),
            None => Ok(None),
        }
    }

    /// Persist a processor-produced artifact, reusing the existing row when
    /// the content hash is already stored. New rows get their embedding
    /// indexed under the artifact id.
    async fn store_or_reuse_artifact(&self, artifact: Artifact) -> Result<Artifact, WorkflowError> {
        if let Some(existing) = self
            .artifacts
            .get_by_content_hash(&artifact.content_hash)
            .await?
        {
            return Ok(existing);
        }

        match self.artifacts.store(&artifact).await {
            Ok(()) => {
                if !artifact.embedding.is_empty() {
                    self.vectors
                        .upsert(artifact.id, &artifact.embedding, &vector_payload(&artifact))
                        .await?;
                }
                Ok(artifact)
            }
            Err(RepositoryError::Conflict(_)) => {
                // A concurrent executor stored identical content first.
                self.artifacts
                    .get_by_content_hash(&artifact.content_hash)
                    .await?
                    .ok_or_else(|| {
                        WorkflowError::Repository(RepositoryError::Conflict(format!(
                            "artifact insert conflicted but no row found for hash '{}'",
                            artifact.content_hash
                        )))
                    })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Another executor completed the same `(step_type, input_hash)` first:
    /// mark this row failed and return the winner as a cache hit.
    async fn resolve_completion_race(
        &self,
        mut step: WorkflowStep,
        step_type: &str,
        input_hash: &str,
    ) -> Result<ExecuteStepResponse, WorkflowError> {
        let winner = self
            .steps
            .find_step_by_input_hash(step_type, input_hash)
            .await?
            .ok_or_else(|| {
                WorkflowError::Repository(RepositoryError::Conflict(format!(
                    "completion conflicted but no completed step found for ({step_type}, {input_hash})"
                )))
            })?;

        tracing::debug!(
            loser = %step.id,
            winner = %winner.id,
            step_type,
            "lost step completion race, returning winner as cache hit"
        );

        step.status = StepStatus::Failed;
        step.completed_at = None;
        if let Err(e) = self.steps.update_step(&step).await {
            tracing::warn!(step_id = %step.id, error = %e, "failed to mark racing step as failed");
        }

        let artifact = self.load_step_artifact(&winner).await?;
        Ok(ExecuteStepResponse {
            step: winner,
            artifact,
            cached: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        MemoryArtifactRepository, MemoryVectorIndex, MemoryWorkflowRepository, test_engine,
    };
    use mentis_types::artifact::ArtifactType;
    use serde_json::{Map, json};

    type TestService =
        WorkflowService<MemoryWorkflowRepository, MemoryVectorIndex, MemoryArtifactRepository>;

    fn make_service() -> TestService {
        WorkflowService::new(
            MemoryWorkflowRepository::new(),
            MemoryVectorIndex::new(),
            MemoryArtifactRepository::new(),
            Arc::new(test_engine()),
            StepProcessorRegistry::new(),
        )
    }

    async fn make_session(service: &TestService) -> WorkflowSession {
        service
            .create_session(CreateSessionRequest {
                goal: "answer the question".to_string(),
                context: Map::new(),
            })
            .await
            .unwrap()
    }

    fn step_request(session_id: Uuid, step_type: &str, input: Value) -> ExecuteStepRequest {
        ExecuteStepRequest {
            session_id,
            step_type: step_type.to_string(),
            input,
            metadata: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session_roundtrip() {
        let service = make_service();
        let session = make_session(&service).await;

        assert_eq!(session.status, SessionStatus::Active);

        let loaded = service.get_session(session.id).await.unwrap();
        assert_eq!(loaded.id, session.id);
        assert_eq!(loaded.goal, "answer the question");
        assert!(loaded.steps.is_empty());
    }

    #[tokio::test]
    async fn test_get_session_not_found() {
        let service = make_service();
        let err = service.get_session(Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SessionNotFound));
    }

    #[tokio::test]
    async fn test_execute_step_miss_then_hit() {
        let service = make_service();
        let session = make_session(&service).await;
        let req = step_request(session.id, "scrape", json!("https://example.com/a"));

        let first = service.execute_step(&req).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.step.status, StepStatus::Completed);
        assert!(first.step.completed_at.is_some());
        let artifact = first.artifact.unwrap();
        assert_eq!(artifact.artifact_type, ArtifactType::Raw);
        assert_eq!(first.step.output_hash.as_deref(), Some(artifact.content_hash.as_str()));

        let second = service.execute_step(&req).await.unwrap();
        assert!(second.cached);
        assert_eq!(second.step.id, first.step.id);
        assert_eq!(second.artifact.unwrap().id, artifact.id);
    }

    #[tokio::test]
    async fn test_execute_step_dedup_is_key_order_independent() {
        let service = make_service();
        let session = make_session(&service).await;

        let a: Value = serde_json::from_str(r#"{"url": "https://x", "depth": 1}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"depth": 1, "url": "https://x"}"#).unwrap();

        let first = service
            .execute_step(&step_request(session.id, "process", a))
            .await
            .unwrap();
        let second = service
            .execute_step(&step_request(session.id, "process", b))
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.step.id, second.step.id);
    }

    #[tokio::test]
    async fn test_execute_step_dedup_is_global_across_sessions() {
        let service = make_service();
        let session_a = make_session(&service).await;
        let session_b = make_session(&service).await;

        let first = service
            .execute_step(&step_request(session_a.id, "reason", json!("why?")))
            .await
            .unwrap();
        let second = service
            .execute_step(&step_request(session_b.id, "reason", json!("why?")))
            .await
            .unwrap();

        assert!(second.cached);
        assert_eq!(second.step.session_id, session_a.id);
        assert_eq!(first.step.id, second.step.id);
    }

    #[tokio::test]
    async fn test_execute_step_different_inputs_run_separately() {
        let service = make_service();
        let session = make_session(&service).await;

        let a = service
            .execute_step(&step_request(session.id, "scrape", json!("https://x/a")))
            .await
            .unwrap();
        let b = service
            .execute_step(&step_request(session.id, "scrape", json!("https://x/b")))
            .await
            .unwrap();

        assert!(!a.cached);
        assert!(!b.cached);
        assert_ne!(a.step.id, b.step.id);
        assert_ne!(a.artifact.unwrap().id, b.artifact.unwrap().id);
    }

    #[tokio::test]
    async fn test_execute_step_indexes_artifact_vector() {
        let service = make_service();
        let session = make_session(&service).await;

        let response = service
            .execute_step(&step_request(session.id, "answer", json!("the answer")))
            .await
            .unwrap();

        assert_eq!(service.vectors.len(), 1);
        let artifact = response.artifact.unwrap();
        assert!(!artifact.embedding.is_empty());
    }

    #[tokio::test]
    async fn test_execute_step_failure_marks_step_failed() {
        struct FailingProcessor;

        impl crate::processor::StepProcessor for FailingProcessor {
            async fn process(
                &self,
                _step: &WorkflowStep,
                _input: &Value,
                _artifact_type: ArtifactType,
                _engine: &EmbeddingEngine,
            ) -> Result<Artifact, WorkflowError> {
                Err(WorkflowError::Processor("upstream exploded".to_string()))
            }
        }

        let mut registry = StepProcessorRegistry::new();
        registry.register("scrape", FailingProcessor);

        let service = WorkflowService::new(
            MemoryWorkflowRepository::new(),
            MemoryVectorIndex::new(),
            MemoryArtifactRepository::new(),
            Arc::new(test_engine()),
            registry,
        );
        let session = make_session(&service).await;

        let err = service
            .execute_step(&step_request(session.id, "scrape", json!("boom")))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Processor(_)));

        let loaded = service.get_session(session.id).await.unwrap();
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].status, StepStatus::Failed);

        // A failed row does not satisfy the dedup probe; a retry runs again
        let retry_err = service
            .execute_step(&step_request(session.id, "scrape", json!("boom")))
            .await
            .unwrap_err();
        assert!(matches!(retry_err, WorkflowError::Processor(_)));
        let reloaded = service.get_session(session.id).await.unwrap();
        assert_eq!(reloaded.steps.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_execute_step_single_completion() {
        let service = Arc::new(make_service());
        let session = make_session(&service).await;
        let req = step_request(session.id, "scrape", json!("https://example.com/race"));

        let (a, b) = tokio::join!(service.execute_step(&req), service.execute_step(&req));
        let a = a.unwrap();
        let b = b.unwrap();

        // Exactly one execution is fresh; both observe the same artifact.
        assert!(a.cached || b.cached);
        assert_eq!(
            a.artifact.as_ref().unwrap().id,
            b.artifact.as_ref().unwrap().id
        );

        let completed: Vec<_> = service
            .get_session(session.id)
            .await
            .unwrap()
            .steps
            .into_iter()
            .filter(|s| s.status == StepStatus::Completed)
            .collect();
        assert_eq!(completed.len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_step_finds_similar_completed_steps() {
        let service = make_service();
        let session = make_session(&service).await;

        service
            .execute_step(&step_request(session.id, "reason", json!("why is the sky blue")))
            .await
            .unwrap();

        let response = service
            .lookup_step(&StepLookupRequest {
                session_id: session.id,
                step_type: "reason".to_string(),
                input: json!("why is the sky blue"),
                top_k: 0,
            })
            .await
            .unwrap();

        assert_eq!(response.results.len(), 1);
        assert_eq!(response.results[0].step.step_type, "reason");
        assert!(response.results[0].artifact.is_some());
    }

    #[tokio::test]
    async fn test_lookup_step_respects_type_filter() {
        let service = make_service();
        let session = make_session(&service).await;

        service
            .execute_step(&step_request(session.id, "scrape", json!("page")))
            .await
            .unwrap();

        let response = service
            .lookup_step(&StepLookupRequest {
                session_id: session.id,
                step_type: "reason".to_string(),
                input: json!("page"),
                top_k: 5,
            })
            .await
            .unwrap();
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_complete_session() {
        let service = make_service();
        let session = make_session(&service).await;

        service.complete_session(session.id).await.unwrap();
        let loaded = service.get_session(session.id).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Completed);
    }

    #[tokio::test]
    async fn test_fail_session_records_reason() {
        let service = make_service();
        let session = make_session(&service).await;

        service
            .fail_session(session.id, "budget exhausted")
            .await
            .unwrap();

        let loaded = service.get_session(session.id).await.unwrap();
        assert_eq!(loaded.status, SessionStatus::Failed);
        assert_eq!(loaded.context["failure_reason"], json!("budget exhausted"));
    }

    #[tokio::test]
    async fn test_fail_session_not_found() {
        let service = make_service();
        let err = service
            .fail_session(Uuid::now_v7(), "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::SessionNotFound));
    }
}
