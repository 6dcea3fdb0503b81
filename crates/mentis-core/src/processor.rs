//! Step processors: the pluggable execution layer behind workflow steps.
//!
//! Each `step_type` may register its own [`StepProcessor`]; unregistered
//! types fall back to [`SynthesizedStepProcessor`], which derives a
//! deterministic artifact from the input so that memoization can be
//! exercised without external systems. The registry also owns the
//! step-type to artifact-type mapping policy, which callers can override.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

use mentis_types::artifact::{Artifact, ArtifactType};
use mentis_types::error::WorkflowError;
use mentis_types::workflow::WorkflowStep;

use crate::embedding::EmbeddingEngine;
use crate::hash;

/// Render a step input as text for embedding and content synthesis.
///
/// Bare strings stay unquoted; everything else is compact JSON.
pub fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Trait for executing a single workflow step into an artifact.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition).
pub trait StepProcessor: Send + Sync {
    /// Execute the step against its input, producing the result artifact.
    ///
    /// The artifact's metadata must link back to the step and session so
    /// that similarity search can rehydrate step rows from vector payloads.
    fn process(
        &self,
        step: &WorkflowStep,
        input: &Value,
        artifact_type: ArtifactType,
        engine: &EmbeddingEngine,
    ) -> impl Future<Output = Result<Artifact, WorkflowError>> + Send;
}

/// Object-safe version of [`StepProcessor`] with boxed futures, blanket
/// implemented for all processors so the registry can hold them uniformly.
trait StepProcessorDyn: Send + Sync {
    fn process_boxed<'a>(
        &'a self,
        step: &'a WorkflowStep,
        input: &'a Value,
        artifact_type: ArtifactType,
        engine: &'a EmbeddingEngine,
    ) -> Pin<Box<dyn Future<Output = Result<Artifact, WorkflowError>> + Send + 'a>>;
}

impl<T: StepProcessor> StepProcessorDyn for T {
    fn process_boxed<'a>(
        &'a self,
        step: &'a WorkflowStep,
        input: &'a Value,
        artifact_type: ArtifactType,
        engine: &'a EmbeddingEngine,
    ) -> Pin<Box<dyn Future<Output = Result<Artifact, WorkflowError>> + Send + 'a>> {
        Box::pin(self.process(step, input, artifact_type, engine))
    }
}

/// Default processor: synthesizes a deterministic artifact from the input.
///
/// Content is a stable rendering of the step type and input, so identical
/// inputs always produce identical content (and therefore identical content
/// hashes). The embedding is generated from the content through the engine.
pub struct SynthesizedStepProcessor;

impl StepProcessor for SynthesizedStepProcessor {
    async fn process(
        &self,
        step: &WorkflowStep,
        input: &Value,
        artifact_type: ArtifactType,
        engine: &EmbeddingEngine,
    ) -> Result<Artifact, WorkflowError> {
        let content = format!(
            "Result of {} step with input: {}",
            step.step_type,
            input_text(input)
        );
        let embedding = engine.embed(&content).await?;
        let content_bytes = content.into_bytes();

        let mut metadata = Map::new();
        metadata.insert("step_type".to_string(), Value::String(step.step_type.clone()));
        metadata.insert("step_id".to_string(), Value::String(step.id.to_string()));
        metadata.insert(
            "session_id".to_string(),
            Value::String(step.session_id.to_string()),
        );

        let now = Utc::now();
        Ok(Artifact {
            id: Uuid::now_v7(),
            artifact_type,
            content_hash: hash::content_hash(&content_bytes),
            content: Some(content_bytes),
            embedding,
            dependencies: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
            stale: false,
        })
    }
}

/// Registry of step processors plus the step-type to artifact-type policy.
pub struct StepProcessorRegistry {
    processors: HashMap<String, Box<dyn StepProcessorDyn>>,
    type_mapping: HashMap<String, ArtifactType>,
    fallback_type: ArtifactType,
    default_processor: SynthesizedStepProcessor,
}

impl Default for StepProcessorRegistry {
    fn default() -> Self {
        let mut type_mapping = HashMap::new();
        type_mapping.insert("scrape".to_string(), ArtifactType::Raw);
        type_mapping.insert("process".to_string(), ArtifactType::Derived);
        type_mapping.insert("embed".to_string(), ArtifactType::Derived);
        type_mapping.insert("reason".to_string(), ArtifactType::Reasoning);
        type_mapping.insert("answer".to_string(), ArtifactType::Answer);

        Self {
            processors: HashMap::new(),
            type_mapping,
            fallback_type: ArtifactType::Derived,
            default_processor: SynthesizedStepProcessor,
        }
    }
}

impl StepProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a processor for a step type, replacing any previous one.
    pub fn register<P: StepProcessor + 'static>(&mut self, step_type: &str, processor: P) {
        self.processors
            .insert(step_type.to_string(), Box::new(processor));
    }

    /// Override the artifact type produced for a step type.
    pub fn with_type_override(mut self, step_type: &str, artifact_type: ArtifactType) -> Self {
        self.type_mapping
            .insert(step_type.to_string(), artifact_type);
        self
    }

    /// The artifact type a step of this type produces.
    pub fn artifact_type_for(&self, step_type: &str) -> ArtifactType {
        self.type_mapping
            .get(step_type)
            .copied()
            .unwrap_or(self.fallback_type)
    }

    /// Run the processor registered for the step's type, or the default
    /// synthesizer when none is registered.
    pub async fn process(
        &self,
        step: &WorkflowStep,
        input: &Value,
        engine: &EmbeddingEngine,
    ) -> Result<Artifact, WorkflowError> {
        let artifact_type = self.artifact_type_for(&step.step_type);
        match self.processors.get(&step.step_type) {
            Some(processor) => processor.process_boxed(step, input, artifact_type, engine).await,
            None => {
                self.default_processor
                    .process(step, input, artifact_type, engine)
                    .await
            }
        }
    }
}
