//! HTTP routes.
//!
//! JSON in, JSON out. Successful responses carry `"success": true`; failures
//! go through [`ApiError`] or, for deployments the engine rejected, through
//! the deployment failure body.

use crate::error::{ApiError, engine_status};
use crate::state::AppState;
use autoflow_core::{DeploymentId, UserId, WorkflowId};
use autoflow_deployment::DeploymentOutcome;
use autoflow_workflow::ValidationResult;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Sync log rows returned when no limit is given.
const DEFAULT_SYNC_LOG_LIMIT: u32 = 20;

/// Upper bound on sync log rows per request.
const MAX_SYNC_LOG_LIMIT: u32 = 100;

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/workflows/validate", post(validate_workflow))
        .route("/api/workflows/{id}/deploy", post(deploy_workflow))
        .route("/api/workflows/{id}/deployments", get(list_deployments))
        .route(
            "/api/workflows/{id}/deployments/{version}/rollback",
            post(rollback_deployment),
        )
        .route("/api/workflows/{id}/activate", post(activate_workflow))
        .route("/api/workflows/{id}/deactivate", post(deactivate_workflow))
        .route("/api/workflows/{id}/deployment", delete(undeploy_workflow))
        .route("/api/workflows/{id}/sync", post(sync_workflow))
        .route("/api/sync", post(sync_all))
        .route("/api/sync/logs", get(sync_logs))
        .route("/api/engine/health", get(engine_health))
        .route("/api/engine/connection", get(engine_connection))
        .route("/api/engine/node-types", get(engine_node_types))
        .route("/api/node-types", get(node_types))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parse_workflow_id(raw: &str) -> Result<WorkflowId, ApiError> {
    raw.parse().map_err(|_| ApiError::InvalidId {
        value: raw.to_string(),
    })
}

#[derive(Debug, Serialize)]
struct ValidateResponse {
    success: bool,
    validation: ValidationResult,
    timestamp: DateTime<Utc>,
}

/// Takes the document as raw JSON so that mistyped fields reach the
/// validator and come back as validation errors.
async fn validate_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<JsonValue>, JsonRejection>,
) -> Result<Json<ValidateResponse>, ApiError> {
    let Json(document) = body?;
    Ok(Json(ValidateResponse {
        success: true,
        validation: state.validator.validate_json(&document),
        timestamp: Utc::now(),
    }))
}

/// Body of a deploy request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployRequest {
    /// Activate the workflow on the engine once created.
    #[serde(default)]
    pub activate: bool,
    /// The user the deployment is attributed to.
    pub actor_id: UserId,
    /// Retry transient engine failures with the configured backoff.
    #[serde(default)]
    pub retry: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploySuccess {
    success: bool,
    /// The engine's id for the deployed workflow.
    workflow_id: String,
    deployment_id: DeploymentId,
    version: u32,
    n8n_response: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationResult>,
    first_deployment: bool,
    /// Whether the engine workflow is running.
    active: bool,
    /// Set when activation was requested and the engine refused it.
    #[serde(skip_serializing_if = "Option::is_none")]
    activation_error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeployFailure {
    success: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<ValidationResult>,
    deployment_id: DeploymentId,
    version: u32,
    retryable: bool,
}

async fn deploy_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Result<Json<DeployRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let Json(request) = request?;
    let outcome = if request.retry {
        state
            .orchestrator
            .deploy_with_retry(workflow_id, request.activate, request.actor_id, &state.retry)
            .await?
    } else {
        state
            .orchestrator
            .deploy(workflow_id, request.activate, request.actor_id)
            .await?
    };
    Ok(deploy_response(outcome))
}

fn deploy_response(outcome: DeploymentOutcome) -> Response {
    let success = outcome.is_success();
    let retryable = outcome.is_retryable();
    let status = outcome
        .engine_error
        .as_ref()
        .map_or(StatusCode::BAD_GATEWAY, engine_status);
    let record = outcome.record;

    if success {
        let body = DeploySuccess {
            success: true,
            workflow_id: record.engine_workflow_id.unwrap_or_default(),
            deployment_id: record.id,
            version: record.version,
            n8n_response: record.engine_response.unwrap_or(JsonValue::Null),
            validation: outcome.validation,
            first_deployment: outcome.first_deployment,
            active: outcome.active,
            activation_error: record.error_message,
        };
        return (StatusCode::OK, Json(body)).into_response();
    }

    let body = DeployFailure {
        success: false,
        error: record.error_message.unwrap_or_default(),
        validation: outcome.validation,
        deployment_id: record.id,
        version: record.version,
        retryable,
    };
    (status, Json(body)).into_response()
}

async fn list_deployments(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let deployments = state.orchestrator.history(workflow_id).await?;
    Ok(Json(json!({ "success": true, "deployments": deployments })))
}

async fn rollback_deployment(
    State(state): State<Arc<AppState>>,
    Path((id, version)): Path<(String, u32)>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let deployment = state.orchestrator.rollback(workflow_id, version).await?;
    Ok(Json(json!({ "success": true, "deployment": deployment })))
}

async fn activate_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let response = state.orchestrator.activate(workflow_id).await?;
    Ok(Json(json!({ "success": true, "n8nResponse": response })))
}

async fn deactivate_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let response = state.orchestrator.deactivate(workflow_id).await?;
    Ok(Json(json!({ "success": true, "n8nResponse": response })))
}

async fn undeploy_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    state.orchestrator.undeploy(workflow_id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn sync_workflow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let workflow_id = parse_workflow_id(&id)?;
    let outcome = state.sync.reconcile(workflow_id).await?;
    Ok(Json(json!({
        "success": true,
        "workflowId": outcome.workflow_id,
        "executionsUpdated": outcome.executions_updated,
        "stats": outcome.stats,
    })))
}

async fn sync_all(State(state): State<Arc<AppState>>) -> Result<Json<JsonValue>, ApiError> {
    let entry = state.sync.reconcile_all().await?;
    Ok(Json(json!({ "success": true, "sync": entry })))
}

#[derive(Debug, Deserialize)]
struct SyncLogQuery {
    limit: Option<u32>,
}

async fn sync_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncLogQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_SYNC_LOG_LIMIT)
        .clamp(1, MAX_SYNC_LOG_LIMIT);
    let logs = state.sync.history(limit).await?;
    Ok(Json(json!({ "success": true, "logs": logs })))
}

async fn engine_health(State(state): State<Arc<AppState>>) -> Response {
    let health = state.engine.health().await;
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health)).into_response()
}

async fn engine_connection(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JsonValue>, ApiError> {
    let connection = state.engine.test_connection().await?;
    Ok(Json(json!({
        "success": true,
        "workflowCount": connection.workflow_count,
    })))
}

async fn engine_node_types(
    State(state): State<Arc<AppState>>,
) -> Result<Json<JsonValue>, ApiError> {
    let node_types = state.engine.node_types().await?;
    Ok(Json(json!({ "success": true, "nodeTypes": node_types })))
}

async fn node_types(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let node_types: Vec<_> = state.validator.registry().iter().collect();
    Json(json!({ "success": true, "nodeTypes": node_types }))
}
