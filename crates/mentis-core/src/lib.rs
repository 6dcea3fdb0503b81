//! Core logic and port definitions for Mentis.
//!
//! This crate defines the "ports" (repository and index traits) that the
//! infrastructure layer implements, plus the pure hashing functions, the
//! embedding engine, the step index, and the cache and workflow services
//! composed over those ports. It depends only on `mentis-types` -- never on
//! `mentis-infra` or any database/IO crate.

pub mod embedding;
pub mod hash;
pub mod processor;
pub mod repository;
pub mod service;
pub mod step_index;
pub mod vector;

#[cfg(test)]
pub(crate) mod testutil;
