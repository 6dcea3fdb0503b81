//! Artifact domain types for Mentis.
//!
//! An artifact is an immutable, content-hashed, typed cache record that
//! optionally carries an embedding and edges to the artifacts it was derived
//! from. This module also defines the publish/lookup request and response
//! shapes used by the cache service and the HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// The position of an artifact in the pipeline progression.
///
/// Raw ingestion -> processed -> reasoning -> final answer. The type is
/// opaque policy metadata; only membership in this set is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactType {
    Raw,
    Derived,
    Reasoning,
    Answer,
}

impl ArtifactType {
    /// The canonical uppercase string form, as stored and sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Raw => "RAW",
            ArtifactType::Derived => "DERIVED",
            ArtifactType::Reasoning => "REASONING",
            ArtifactType::Answer => "ANSWER",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ArtifactType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RAW" => Ok(ArtifactType::Raw),
            "DERIVED" => Ok(ArtifactType::Derived),
            "REASONING" => Ok(ArtifactType::Reasoning),
            "ANSWER" => Ok(ArtifactType::Answer),
            other => Err(format!("invalid artifact type: '{other}'")),
        }
    }
}

/// An immutable cache record once published.
///
/// `id` and timestamps are server-assigned at publish time when absent
/// (a nil id and an epoch timestamp both mean "unset" on the wire).
/// `content` travels base64-encoded and may be stripped from read responses;
/// `embedding` is a unit-normalized vector sized to the embedding engine's
/// declared dimension.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Unique identifier, assigned at publish time if nil.
    #[serde(default)]
    pub id: Uuid,
    /// Pipeline position of this record.
    #[serde(rename = "type")]
    pub artifact_type: ArtifactType,
    /// Lowercase hex SHA-256 of the content bytes. Computed at publish
    /// time when empty.
    #[serde(default)]
    pub content_hash: String,
    /// Raw content bytes, base64 on the wire. Absent when the caller opted
    /// out of content on read.
    #[serde(
        default,
        with = "base64_bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub content: Option<Vec<u8>>,
    /// Unit-normalized embedding vector. Empty when not embedded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embedding: Vec<f32>,
    /// Ids of the parent artifacts this record was derived from.
    #[serde(default)]
    pub dependencies: Vec<Uuid>,
    /// Free-form metadata. Recognized keys: `source_url`, `step_type`,
    /// `step_id`, `session_id`.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default = "unset_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "unset_timestamp")]
    pub updated_at: DateTime<Utc>,
    /// True once the artifact has been invalidated. Stale artifacts remain
    /// readable but are excluded from non-stale lookups.
    #[serde(default)]
    pub stale: bool,
}

/// Sentinel for "not provided" timestamps, replaced at publish time.
fn unset_timestamp() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

impl Artifact {
    /// Whether a timestamp still carries the "not provided" sentinel.
    pub fn timestamp_is_unset(ts: &DateTime<Utc>) -> bool {
        *ts == DateTime::UNIX_EPOCH
    }
}

/// Serde adapter encoding `Option<Vec<u8>>` as a base64 string on the wire.
mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => STANDARD.encode(b).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        match encoded {
            Some(s) => STANDARD
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

/// A single semantic lookup hit: the enriched artifact and its cosine score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    pub artifact: Artifact,
    pub score: f32,
}

/// Options controlling a semantic lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupOptions {
    /// Query text, embedded through the embedding engine.
    pub query: String,
    /// Maximum number of results. An explicit zero returns an empty list.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Minimum cosine similarity for a hit to be returned.
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Restrict results to a single artifact type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_type: Option<ArtifactType>,
    /// Include artifacts that have been marked stale.
    #[serde(default)]
    pub include_stale: bool,
    /// Include the raw content bytes in each result.
    #[serde(default)]
    pub include_content: bool,
    /// Include the embedding vector in each result.
    #[serde(default)]
    pub include_embedding: bool,
}

fn default_top_k() -> usize {
    10
}

fn default_min_score() -> f32 {
    0.85
}

/// A batch of artifacts to publish.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishRequest {
    pub objects: Vec<Artifact>,
}

/// Outcome of a publish: newly stored ids and content-hash dedup skips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(default)]
    pub published: Vec<Uuid>,
    #[serde(default)]
    pub skipped: Vec<Uuid>,
}

/// Wrapper around [`LookupOptions`] for the POST lookup endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupRequest {
    pub options: LookupOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default)]
    pub results: Vec<LookupResult>,
}

/// Invalidation target: every artifact whose `metadata.source_url` matches
/// is marked stale, then staleness propagates through the dependency DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateRequest {
    pub source_url: String,
}
