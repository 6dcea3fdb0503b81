//! Shared domain types for Mentis.
//!
//! This crate contains the core domain types used across the Mentis cache:
//! Artifact, WorkflowSession, WorkflowStep, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod artifact;
pub mod config;
pub mod error;
pub mod workflow;
