//! Handlers for the local workflow store routes.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flowdeck_core::mirror::UpstreamScheduler;
use flowdeck_core::projection::combined_view;
use flowdeck_types::error::WorkflowError;
use flowdeck_types::workflow::{
    CommitEntry, DeletedWorkflow, LocalWorkflow, SaveWorkflowOutcome, SaveWorkflowRequest,
    WorkflowDetails,
};

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /api/workflow/yaml - Save a workflow definition.
pub async fn save_workflow(
    State(state): State<AppState>,
    Json(body): Json<SaveWorkflowRequest>,
) -> Result<Json<SaveWorkflowOutcome>, AppError> {
    let outcome = state.store.save(body).await?;
    Ok(Json(outcome))
}

/// GET /api/workflow/local - List locally stored workflows.
pub async fn list_local(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocalWorkflow>>, AppError> {
    let entries = state.store.list().await?;
    Ok(Json(entries))
}

/// GET /api/workflow/combined - Local and remote workflows joined by name.
///
/// An unreachable upstream fails the whole listing; the UI falls back to
/// the local-only view through `/workflow/local`.
pub async fn list_combined(State(state): State<AppState>) -> Result<Json<Vec<Value>>, AppError> {
    let cancel = CancellationToken::new();
    let (local, remote) = tokio::join!(state.store.list(), state.ds.list_workflows(&cancel));
    let local = local?;
    let remote = remote?;
    Ok(Json(combined_view(&local, &remote)))
}

/// GET /api/workflow/deleted - Deleted-but-recoverable workflows.
pub async fn list_deleted(
    State(state): State<AppState>,
) -> Result<Json<Vec<DeletedWorkflow>>, AppError> {
    let entries = state.store.deleted_list().await?;
    Ok(Json(entries))
}

/// GET /api/workflow/:uuid - Workflow detail including the raw YAML.
pub async fn details(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<WorkflowDetails>, AppError> {
    match state.store.details(&uuid).await {
        Ok(details) => Ok(Json(details)),
        Err(e @ WorkflowError::NotFound(_)) => Err(AppError::NotFound(e.to_string())),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    #[serde(rename = "projectCode")]
    project_code: Option<i64>,
    #[serde(rename = "workflowCode")]
    workflow_code: Option<i64>,
}

/// DELETE /api/workflow/:uuid - Delete a workflow locally and upstream.
///
/// A `ds-<projectCode>-<workflowCode>` identifier names a remote-only row;
/// only the upstream definition is deleted then. For a local workflow the
/// index row and file go first, followed by the upstream cascade: explicit
/// `projectCode`/`workflowCode` query parameters when the UI knows them,
/// otherwise a name-based lookup for workflows that were ever online.
pub async fn delete_workflow(
    State(state): State<AppState>,
    Path(uuid): Path<String>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<Value>, AppError> {
    if let Some((project_code, workflow_code)) = parse_synthetic_uuid(&uuid) {
        state.mirror.delete_remote(project_code, workflow_code).await?;
        return Ok(Json(json!({"deleted": true, "uuid": uuid})));
    }

    let uuid = Uuid::parse_str(&uuid)
        .map_err(|_| AppError::Internal(format!("invalid workflow identifier '{uuid}'")))?;
    let record = state.store.delete(&uuid).await?;

    match (query.project_code, query.workflow_code) {
        (Some(project_code), Some(workflow_code)) => {
            state.mirror.delete_remote(project_code, workflow_code).await?;
        }
        _ if record.online_version.is_some() => {
            if state.mirror.delete_remote_by_name(&record.name).await? {
                tracing::info!(workflow = %record.name, "deleted upstream counterpart by name");
            }
        }
        _ => {}
    }

    Ok(Json(json!({"deleted": true, "uuid": uuid})))
}

#[derive(Debug, Deserialize)]
pub struct ReparseRequest {
    content: String,
}

/// POST /api/workflow/reparse - Parse YAML without persisting anything.
pub async fn reparse(Json(body): Json<ReparseRequest>) -> Result<Json<Value>, AppError> {
    let parsed: Value = serde_yaml_ng::from_str(&body.content)
        .map_err(|e| AppError::Internal(format!("invalid YAML: {e}")))?;
    Ok(Json(json!({"parsed": parsed})))
}

/// GET /api/workflow/:uuid/history - Commit history of a workflow file.
pub async fn history(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Vec<CommitEntry>>, AppError> {
    let entries = state.store.history(&uuid).await?;
    Ok(Json(entries))
}

/// GET /api/workflow/:uuid/commit/:hash - Diff a commit introduced.
pub async fn commit_diff(
    State(state): State<AppState>,
    Path((uuid, hash)): Path<(Uuid, String)>,
) -> Result<Json<Value>, AppError> {
    let diff = state.store.diff_at(&uuid, &hash).await?;
    Ok(Json(json!({"diff": diff})))
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    path: String,
    commit: String,
}

/// POST /api/workflow/restore - Bring a deleted workflow file back.
pub async fn restore(
    State(state): State<AppState>,
    Json(body): Json<RestoreRequest>,
) -> Result<Json<Value>, AppError> {
    state.store.restore(&body.path, &body.commit).await?;
    Ok(Json(json!({"restored": true, "path": body.path})))
}

#[derive(Debug, Deserialize)]
pub struct RevertRequest {
    workflow_uuid: Uuid,
    commit_hash: String,
}

/// POST /api/workflow/revert - Roll a workflow back to an earlier commit.
pub async fn revert(
    State(state): State<AppState>,
    Json(body): Json<RevertRequest>,
) -> Result<Json<Value>, AppError> {
    state.store.revert(&body.workflow_uuid, &body.commit_hash).await?;
    Ok(Json(json!({"reverted": true, "uuid": body.workflow_uuid})))
}

/// GET /api/workflow/content/:hash/:filename - File content just before the
/// change at `hash`; for a deletion commit this is the deleted content.
pub async fn content_at_change(
    State(state): State<AppState>,
    Path((hash, filename)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let content = state.store.content_before_change(&filename, &hash).await?;
    Ok(Json(json!({"content": content})))
}

/// Parse the synthetic `ds-<projectCode>-<workflowCode>` identifier the
/// combined view assigns to remote-only workflows.
fn parse_synthetic_uuid(raw: &str) -> Option<(i64, i64)> {
    let rest = raw.strip_prefix("ds-")?;
    let (project, workflow) = rest.split_once('-')?;
    Some((project.parse().ok()?, workflow.parse().ok()?))
}
