//! Workflow domain types for Mentis.
//!
//! A session groups related steps toward a stated goal; each step is a single
//! named operation memoized by `(step_type, input_hash)`. Steps move through
//! a monotonic state machine: pending -> running -> completed | failed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::artifact::Artifact;

/// Workflow session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "completed" => Ok(SessionStatus::Completed),
            "failed" => Ok(SessionStatus::Failed),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Workflow step lifecycle status.
///
/// `completed` and `failed` are terminal; a step is never re-opened. The
/// `(step_type, input_hash)` uniqueness constraint applies only to
/// `completed` rows, so concurrent running attempts may coexist until one
/// wins the completion transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StepStatus::Pending),
            "running" => Ok(StepStatus::Running),
            "completed" => Ok(StepStatus::Completed),
            "failed" => Ok(StepStatus::Failed),
            other => Err(format!("invalid step status: '{other}'")),
        }
    }
}

/// A named workflow scope grouping related steps toward a stated goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSession {
    pub id: Uuid,
    pub goal: String,
    /// Session-scoped metadata. `failure_reason` is written here when the
    /// session fails.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Steps, eagerly loaded on read, ordered by creation time ascending.
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
}

/// A single memoized operation within a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: Uuid,
    pub session_id: Uuid,
    pub step_type: String,
    /// The artifact produced by this step, set on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<Uuid>,
    /// 64-hex SHA-256 of the canonical serialization of the step input.
    pub input_hash: String,
    /// Content hash of the produced artifact, null until completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_hash: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub status: StepStatus,
}

/// Request to create a workflow session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub goal: String,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// Request to execute (or memoize) a single workflow step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteStepRequest {
    pub session_id: Uuid,
    pub step_type: String,
    /// Arbitrary step input; hashed canonically for exact-match dedup.
    pub input: Value,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Outcome of a step execution or cache hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteStepResponse {
    pub step: WorkflowStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    /// True when the step was served from a prior completion.
    pub cached: bool,
}

/// Request for similarity-based reuse of prior step results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLookupRequest {
    #[serde(default)]
    pub session_id: Uuid,
    pub step_type: String,
    pub input: Value,
    #[serde(default)]
    pub top_k: usize,
}

/// A similar completed step with its artifact and similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLookupResult {
    pub step: WorkflowStep,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepLookupResponse {
    #[serde(default)]
    pub results: Vec<StepLookupResult>,
}

/// Request to fail a session with a recorded reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailSessionRequest {
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_string_roundtrip() {
        for s in [
            StepStatus::Pending,
            StepStatus::Running,
            StepStatus::Completed,
            StepStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<StepStatus>().unwrap(), s);
        }
        for s in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<SessionStatus>().unwrap(), s);
        }
    }

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&StepStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
    }

    #[test]
    fn test_execute_step_request_accepts_arbitrary_input() {
        let req: ExecuteStepRequest = serde_json::from_value(json!({
            "session_id": Uuid::now_v7(),
            "step_type": "scrape",
            "input": {"url": "https://example.com/a", "depth": 2},
        }))
        .unwrap();

        assert_eq!(req.step_type, "scrape");
        assert_eq!(req.input["depth"], 2);
        assert!(req.metadata.is_empty());
    }

    #[test]
    fn test_step_optional_fields_omitted_when_absent() {
        let step = WorkflowStep {
            id: Uuid::now_v7(),
            session_id: Uuid::now_v7(),
            step_type: "reason".to_string(),
            artifact_id: None,
            input_hash: "00".repeat(32),
            output_hash: None,
            metadata: Map::new(),
            created_at: Utc::now(),
            completed_at: None,
            status: StepStatus::Running,
        };

        let json = serde_json::to_value(&step).unwrap();
        assert!(json.get("artifact_id").is_none());
        assert!(json.get("output_hash").is_none());
        assert!(json.get("completed_at").is_none());
    }
}
