//! Infrastructure layer for Mentis.
//!
//! Contains implementations of the ports defined in `mentis-core`: SQLite
//! storage for artifacts and workflow state, vector index adapters (Qdrant
//! REST, in-memory), the embedding providers, and environment configuration
//! loading.

pub mod config;
pub mod embedding;
pub mod sqlite;
pub mod vector;
