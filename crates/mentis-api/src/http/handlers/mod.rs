//! REST API handlers for the cache and workflow services.

pub mod cache;
pub mod workflow;
