//! Workflow handlers: session lifecycle, step execution, similarity lookup.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde_json::{Value, json};
use uuid::Uuid;

use mentis_types::workflow::{
    CreateSessionRequest, ExecuteStepRequest, ExecuteStepResponse, FailSessionRequest,
    StepLookupRequest, StepLookupResponse, WorkflowSession,
};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /v1/workflow/sessions - Create a new workflow session.
pub async fn create_session(
    State(state): State<AppState>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<WorkflowSession>), AppError> {
    if req.goal.is_empty() {
        return Err(AppError::Validation("goal is required".to_string()));
    }
    let session = state.workflow.create_session(req).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /v1/workflow/sessions/{id} - Fetch a session with its steps.
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkflowSession>, AppError> {
    let session = state.workflow.get_session(id).await?;
    Ok(Json(session))
}

/// POST /v1/workflow/sessions/{id}/complete - Mark a session completed.
pub async fn complete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    state.workflow.complete_session(id).await?;
    Ok(Json(json!({"message": "session completed"})))
}

/// POST /v1/workflow/sessions/{id}/fail - Mark a session failed.
pub async fn fail_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FailSessionRequest>,
) -> Result<Json<Value>, AppError> {
    if req.reason.is_empty() {
        return Err(AppError::Validation("reason is required".to_string()));
    }
    state.workflow.fail_session(id, &req.reason).await?;
    Ok(Json(json!({"message": "session failed"})))
}

/// POST /v1/workflow/steps - Execute a step or return its memoized result.
pub async fn execute_step(
    State(state): State<AppState>,
    Json(req): Json<ExecuteStepRequest>,
) -> Result<Json<ExecuteStepResponse>, AppError> {
    if req.step_type.is_empty() {
        return Err(AppError::Validation("step_type is required".to_string()));
    }
    let response = state.workflow.execute_step(&req).await?;
    Ok(Json(response))
}

/// POST /v1/workflow/steps/lookup - Find similar completed steps.
pub async fn lookup_step(
    State(state): State<AppState>,
    Json(req): Json<StepLookupRequest>,
) -> Result<Json<StepLookupResponse>, AppError> {
    if req.step_type.is_empty() {
        return Err(AppError::Validation("step_type is required".to_string()));
    }
    let response = state.workflow.lookup_step(&req).await?;
    Ok(Json(response))
}
