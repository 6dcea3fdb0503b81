//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the REST API.
//! Services are generic over repository/index/provider traits, but AppState
//! pins them to the concrete infra implementations. The embedding provider
//! is built first because its declared dimension sizes the vector
//! collection.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use mentis_core::embedding::EmbeddingEngine;
use mentis_core::processor::StepProcessorRegistry;
use mentis_core::repository::WorkflowRepository;
use mentis_core::service::{CacheService, WorkflowService};
use mentis_infra::embedding::build_provider;
use mentis_infra::sqlite::{DatabasePool, SqliteArtifactRepository, SqliteWorkflowRepository};
use mentis_infra::vector::VectorStore;
use mentis_types::config::MentisConfig;

/// Concrete type aliases for the service generics pinned to infra
/// implementations.
pub type ConcreteCacheService = CacheService<SqliteArtifactRepository, VectorStore>;
pub type ConcreteWorkflowService =
    WorkflowService<SqliteWorkflowRepository, VectorStore, SqliteArtifactRepository>;

/// How long a step may sit in `running` before the reaper marks it failed.
const STALE_RUNNING_AFTER_MINUTES: i64 = 30;

/// How often the background reaper sweeps for stale running steps.
const REAPER_INTERVAL: Duration = Duration::from_secs(300);

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ConcreteCacheService>,
    pub workflow: Arc<ConcreteWorkflowService>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, build the
    /// embedding engine and vector index, wire the services, and start the
    /// stale-step reaper.
    pub async fn init(config: &MentisConfig) -> anyhow::Result<Self> {
        let db_pool = DatabasePool::new(&config.database.url).await?;

        let provider = build_provider(&config.embedding)
            .map_err(|e| anyhow::anyhow!("failed to create embedding provider: {e}"))?;
        let engine = Arc::new(EmbeddingEngine::new(provider));
        tracing::info!(
            provider = %config.embedding.provider,
            model = engine.model_name(),
            dimension = engine.dimension(),
            "embedding engine ready"
        );

        let vectors = VectorStore::from_config(&config.vector, engine.dimension())
            .map_err(|e| anyhow::anyhow!("failed to create vector index: {e}"))?;
        tracing::info!(provider = %config.vector.provider, "vector index ready");

        let artifact_repo = SqliteArtifactRepository::new(db_pool.clone());
        let workflow_repo = SqliteWorkflowRepository::new(db_pool.clone());

        // Crash recovery: any step still 'running' at startup belongs to a
        // task that no longer exists.
        match workflow_repo.reap_stale_running_steps(Utc::now()).await {
            Ok(0) => {}
            Ok(reaped) => {
                tracing::warn!(reaped, "marked interrupted running steps as failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to reap interrupted running steps");
            }
        }

        let cache = Arc::new(CacheService::new(
            artifact_repo.clone(),
            vectors.clone(),
            Arc::clone(&engine),
        ));

        let workflow = Arc::new(WorkflowService::new(
            workflow_repo,
            vectors,
            artifact_repo,
            engine,
            StepProcessorRegistry::new(),
        ));

        spawn_step_reaper(SqliteWorkflowRepository::new(db_pool.clone()));

        Ok(Self {
            cache,
            workflow,
            db_pool,
        })
    }
}

/// Periodically mark long-running steps as failed so lost tasks cannot leave
/// `running` rows behind forever.
fn spawn_step_reaper(repo: SqliteWorkflowRepository) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(REAPER_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let cutoff = Utc::now() - chrono::Duration::minutes(STALE_RUNNING_AFTER_MINUTES);
            match repo.reap_stale_running_steps(cutoff).await {
                Ok(0) => {}
                Ok(reaped) => {
                    tracing::warn!(reaped, "reaped stale running steps");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stale step reaper sweep failed");
                }
            }
        }
    });
}
