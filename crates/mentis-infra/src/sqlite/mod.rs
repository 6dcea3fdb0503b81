//! SQLite persistence for artifacts and workflow state.

pub mod artifact;
pub mod pool;
pub mod workflow;

pub use artifact::SqliteArtifactRepository;
pub use pool::DatabasePool;
pub use workflow::SqliteWorkflowRepository;
