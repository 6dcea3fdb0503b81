//! In-memory fakes for exercising the services without infrastructure.
//!
//! These mirror the contracts the SQLite and vector adapters implement,
//! including the conflict behaviour the services must handle: content-hash
//! uniqueness on artifact insert and the completed-step uniqueness on
//! `(step_type, input_hash)`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use mentis_types::artifact::Artifact;
use mentis_types::error::{EmbeddingError, RepositoryError, VectorError};
use mentis_types::workflow::{StepStatus, WorkflowSession, WorkflowStep};

use crate::embedding::{BoxEmbeddingProvider, EmbeddingEngine, EmbeddingProvider};
use crate::hash;
use crate::repository::{ArtifactRepository, WorkflowRepository};
use crate::vector::{VectorHit, VectorIndex};

/// Deterministic 16-dimensional test provider: distinct texts get distinct,
/// near-orthogonal directions, equal texts get equal vectors. Components are
/// centered on zero so unrelated texts stay well below high score thresholds.
pub struct HashProvider;

impl EmbeddingProvider for HashProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let digest = Sha256::digest(text.as_bytes());
        Ok(digest[..16]
            .iter()
            .map(|b| (*b as f32 / 255.0) * 2.0 - 1.0)
            .collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn model_name(&self) -> &str {
        "hash-test"
    }

    fn dimension(&self) -> usize {
        16
    }
}

pub fn test_engine() -> EmbeddingEngine {
    EmbeddingEngine::new(BoxEmbeddingProvider::new(HashProvider))
}

/// A unit vector whose direction is derived from `seed`.
pub fn unit_vector(seed: f32, dimension: usize) -> Vec<f32> {
    let mut v: Vec<f32> = (0..dimension)
        .map(|i| ((i as f32 + seed) * 0.37).sin())
        .collect();
    crate::embedding::l2_normalize(&mut v);
    v
}

pub fn make_step(step_type: &str, hash_seed: &str) -> WorkflowStep {
    WorkflowStep {
        id: Uuid::now_v7(),
        session_id: Uuid::now_v7(),
        step_type: step_type.to_string(),
        artifact_id: None,
        input_hash: hash_seed.repeat(32),
        output_hash: None,
        metadata: Map::new(),
        created_at: Utc::now(),
        completed_at: None,
        status: StepStatus::Running,
    }
}

// ---------------------------------------------------------------------------
// In-memory artifact repository
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryArtifactRepository {
    state: Arc<Mutex<ArtifactState>>,
}

#[derive(Default)]
struct ArtifactState {
    artifacts: HashMap<Uuid, Artifact>,
    // (parent, child): child depends on parent
    edges: Vec<(Uuid, Uuid)>,
}

impl MemoryArtifactRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactRepository for MemoryArtifactRepository {
    async fn store(&self, artifact: &Artifact) -> Result<(), RepositoryError> {
        if let Some(content) = &artifact.content {
            if artifact.content_hash != hash::content_hash(content) {
                return Err(RepositoryError::Invariant(
                    "content hash does not match content".to_string(),
                ));
            }
        }
        let mut state = self.state.lock().unwrap();
        let duplicate = state
            .artifacts
            .values()
            .any(|a| a.content_hash == artifact.content_hash && a.id != artifact.id);
        if duplicate {
            return Err(RepositoryError::Conflict(format!(
                "content_hash '{}' already stored",
                artifact.content_hash
            )));
        }
        state.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Artifact>, RepositoryError> {
        Ok(self.state.lock().unwrap().artifacts.get(&id).cloned())
    }

    async fn get_by_content_hash(&self, hash: &str) -> Result<Option<Artifact>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .artifacts
            .values()
            .find(|a| a.content_hash == hash)
            .cloned())
    }

    async fn list(&self, limit: u32, offset: u32) -> Result<Vec<Artifact>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut all: Vec<Artifact> = state.artifacts.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn update(&self, artifact: &Artifact) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.artifacts.contains_key(&artifact.id) {
            return Err(RepositoryError::NotFound);
        }
        state.artifacts.insert(artifact.id, artifact.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.artifacts.remove(&id);
        state.edges.retain(|(p, c)| *p != id && *c != id);
        Ok(())
    }

    async fn store_dependency(
        &self,
        parent_id: Uuid,
        child_id: Uuid,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.artifacts.contains_key(&parent_id) || !state.artifacts.contains_key(&child_id) {
            return Err(RepositoryError::Query(
                "dependency references a missing artifact".to_string(),
            ));
        }
        if !state.edges.contains(&(parent_id, child_id)) {
            state.edges.push((parent_id, child_id));
        }
        Ok(())
    }

    async fn get_dependencies(&self, id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .edges
            .iter()
            .filter(|(_, c)| *c == id)
            .map(|(p, _)| *p)
            .collect())
    }

    async fn get_dependents(&self, id: Uuid) -> Result<Vec<Uuid>, RepositoryError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .edges
            .iter()
            .filter(|(p, _)| *p == id)
            .map(|(_, c)| *c)
            .collect())
    }

    async fn mark_stale(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        match state.artifacts.get_mut(&id) {
            Some(a) if !a.stale => {
                a.stale = true;
                a.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_stale_by_source_url(
        &self,
        source_url: &str,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut marked = Vec::new();
        for artifact in state.artifacts.values_mut() {
            let matches = artifact
                .metadata
                .get("source_url")
                .and_then(Value::as_str)
                .is_some_and(|url| url == source_url);
            if matches && !artifact.stale {
                artifact.stale = true;
                artifact.updated_at = Utc::now();
                marked.push(artifact.id);
            }
        }
        Ok(marked)
    }
}

// ---------------------------------------------------------------------------
// In-memory workflow repository
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryWorkflowRepository {
    state: Arc<Mutex<WorkflowState>>,
}

#[derive(Default)]
struct WorkflowState {
    sessions: HashMap<Uuid, WorkflowSession>,
    steps: HashMap<Uuid, WorkflowStep>,
}

impl MemoryWorkflowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WorkflowRepository for MemoryWorkflowRepository {
    async fn store_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let mut stored = session.clone();
        stored.steps = Vec::new();
        self.state
            .lock()
            .unwrap()
            .sessions
            .insert(session.id, stored);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<WorkflowSession>, RepositoryError> {
        Ok(self.state.lock().unwrap().sessions.get(&id).cloned())
    }

    async fn update_session(&self, session: &WorkflowSession) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if !state.sessions.contains_key(&session.id) {
            return Err(RepositoryError::NotFound);
        }
        let mut stored = session.clone();
        stored.steps = Vec::new();
        state.sessions.insert(session.id, stored);
        Ok(())
    }

    async fn store_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        self.state.lock().unwrap().steps.insert(step.id, step.clone());
        Ok(())
    }

    async fn get_step(&self, id: Uuid) -> Result<Option<WorkflowStep>, RepositoryError> {
        Ok(self.state.lock().unwrap().steps.get(&id).cloned())
    }

    async fn update_step(&self, step: &WorkflowStep) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if step.status == StepStatus::Completed {
            let duplicate = state.steps.values().any(|s| {
                s.id != step.id
                    && s.status == StepStatus::Completed
                    && s.step_type == step.step_type
                    && s.input_hash == step.input_hash
            });
            if duplicate {
                return Err(RepositoryError::Conflict(format!(
                    "completed step already exists for ({}, {})",
                    step.step_type, step.input_hash
                )));
            }
        }
        if !state.steps.contains_key(&step.id) {
            return Err(RepositoryError::NotFound);
        }
        state.steps.insert(step.id, step.clone());
        Ok(())
    }

    async fn get_steps_by_session(
        &self,
        session_id: Uuid,
    ) -> Result<Vec<WorkflowStep>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut steps: Vec<WorkflowStep> = state
            .steps
            .values()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        steps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(steps)
    }

    async fn find_step_by_input_hash(
        &self,
        step_type: &str,
        input_hash: &str,
    ) -> Result<Option<WorkflowStep>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .steps
            .values()
            .filter(|s| {
                s.status == StepStatus::Completed
                    && s.step_type == step_type
                    && s.input_hash == input_hash
            })
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn reap_stale_running_steps(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let mut reaped = 0;
        for step in state.steps.values_mut() {
            if step.status == StepStatus::Running && step.created_at < cutoff {
                step.status = StepStatus::Failed;
                reaped += 1;
            }
        }
        Ok(reaped)
    }
}

// ---------------------------------------------------------------------------
// In-memory vector index
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
pub struct MemoryVectorIndex {
    points: Arc<Mutex<HashMap<Uuid, (Vec<f32>, Map<String, Value>)>>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.lock().unwrap().len()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

impl VectorIndex for MemoryVectorIndex {
    async fn upsert(
        &self,
        id: Uuid,
        vector: &[f32],
        payload: &Map<String, Value>,
    ) -> Result<(), VectorError> {
        self.points
            .lock()
            .unwrap()
            .insert(id, (vector.to_vec(), payload.clone()));
        Ok(())
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &Map<String, Value>,
    ) -> Result<Vec<VectorHit>, VectorError> {
        let points = self.points.lock().unwrap();
        let mut hits: Vec<VectorHit> = points
            .iter()
            .filter(|(_, (_, payload))| {
                // AND of string equality matches; non-string values ignored
                filter.iter().all(|(key, expected)| match expected {
                    Value::String(s) => {
                        payload.get(key).and_then(Value::as_str) == Some(s.as_str())
                    }
                    _ => true,
                })
            })
            .map(|(id, (vector, payload))| VectorHit {
                id: *id,
                score: cosine(query, vector),
                payload: payload.clone(),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete(&self, id: Uuid) -> Result<(), VectorError> {
        self.points.lock().unwrap().remove(&id);
        Ok(())
    }
}
