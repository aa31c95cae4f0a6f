//! Handlers for upstream mirroring and the read-side passthrough routes.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use flowdeck_core::mirror::UpstreamScheduler;
use flowdeck_infra::ds::InstanceQuery;
use flowdeck_types::error::UpstreamError;
use flowdeck_types::upstream::{ExecuteRequest, InstancePage, ReconcileOutcome, ReconcileRequest};
use flowdeck_types::workflow::WorkflowDoc;

use crate::http::error::AppError;
use crate::state::AppState;

/// POST /api/workflow/:uuid/online - Reconcile a local workflow upstream and
/// record which commit went online.
///
/// The body is the UI-built upstream payload and may be absent entirely; the
/// gaps are filled from the stored record and its YAML (name, project,
/// schedule).
pub async fn online_workflow(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: Option<Json<ReconcileRequest>>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let details = state.store.details(&uuid).await?;
    let doc = WorkflowDoc::parse(&details.yaml_content);

    let mut request = body.map(|Json(b)| b).unwrap_or_default();
    if request.name.trim().is_empty() {
        request.name = details.name.clone();
    }
    if request.project.is_none() {
        request.project = doc.as_ref().and_then(|d| d.workflow.project.clone());
    }
    if request.schedule.is_none() {
        request.schedule = doc.as_ref().and_then(|d| d.schedule_spec());
    }

    let outcome = state.mirror.reconcile_for(uuid, &request).await?;
    state.store.record_online_version(&uuid).await?;
    state
        .store
        .set_remote_link(&uuid, outcome.project_code, request.project_name())
        .await?;

    Ok(Json(outcome))
}

/// POST /api/workflow/ds - Reconcile a UI-built payload directly.
pub async fn reconcile_direct(
    State(state): State<AppState>,
    Json(body): Json<ReconcileRequest>,
) -> Result<Json<ReconcileOutcome>, AppError> {
    let outcome = state.mirror.reconcile(&body).await?;
    Ok(Json(outcome))
}

/// POST /api/workflow/:uuid/execute - Start an instance of the workflow's
/// upstream counterpart (start-process or backfill).
pub async fn execute_workflow(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
    body: Option<Json<ExecuteRequest>>,
) -> Result<Json<Value>, AppError> {
    let record = state.store.get_record(&uuid).await?;
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let data = state.mirror.execute(uuid, &record.name, &request).await?;
    Ok(Json(data))
}

fn default_page_no() -> i64 {
    1
}

fn default_page_size() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct InstanceListQuery {
    #[serde(rename = "projectCode")]
    project_code: Option<i64>,
    #[serde(rename = "stateType")]
    state_type: Option<String>,
    #[serde(rename = "startTime")]
    start_time: Option<String>,
    #[serde(rename = "endTime")]
    end_time: Option<String>,
    #[serde(rename = "pageNo", default = "default_page_no")]
    page_no: i64,
    #[serde(rename = "pageSize", default = "default_page_size")]
    page_size: i64,
}

impl InstanceListQuery {
    fn to_instance_query(&self) -> InstanceQuery {
        InstanceQuery {
            page_no: self.page_no,
            page_size: self.page_size,
            state_type: self.state_type.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
        }
    }
}

/// GET /api/workflow/instances - Workflow instance listing.
///
/// With `projectCode` this is one project's page; without, the listing fans
/// out across every project, skipping the ones that fail.
pub async fn list_instances(
    State(state): State<AppState>,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<InstancePage>, AppError> {
    let cancel = CancellationToken::new();
    let instance_query = query.to_instance_query();

    let (total_list, total) = match query.project_code {
        Some(project_code) => {
            let page = state
                .ds
                .list_instances(project_code, &instance_query, &cancel)
                .await?;
            (page.total_list, page.total)
        }
        None => {
            let mut total_list = Vec::new();
            let mut total = 0;
            for project in state.ds.list_projects(&cancel).await? {
                match state
                    .ds
                    .list_instances(project.code, &instance_query, &cancel)
                    .await
                {
                    Ok(page) => {
                        total_list.extend(page.total_list);
                        total += page.total;
                    }
                    Err(UpstreamError::Cancelled) => return Err(UpstreamError::Cancelled.into()),
                    Err(err) => {
                        tracing::warn!(project = %project.name, error = %err, "skipping project in instance listing");
                    }
                }
            }
            (total_list, total)
        }
    };

    Ok(Json(InstancePage {
        total_list,
        total,
        current_page: query.page_no,
        page_size: query.page_size,
    }))
}

/// GET /api/task/instances - Task instance listing, same fan-out semantics
/// as the workflow instance listing.
pub async fn list_task_instances(
    State(state): State<AppState>,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<InstancePage>, AppError> {
    let cancel = CancellationToken::new();
    let instance_query = query.to_instance_query();

    let (total_list, total) = match query.project_code {
        Some(project_code) => {
            let page = state
                .ds
                .list_task_instances(project_code, &instance_query, &cancel)
                .await?;
            (page.total_list, page.total)
        }
        None => {
            let mut total_list = Vec::new();
            let mut total = 0;
            for project in state.ds.list_projects(&cancel).await? {
                match state
                    .ds
                    .list_task_instances(project.code, &instance_query, &cancel)
                    .await
                {
                    Ok(page) => {
                        total_list.extend(page.total_list);
                        total += page.total;
                    }
                    Err(UpstreamError::Cancelled) => return Err(UpstreamError::Cancelled.into()),
                    Err(err) => {
                        tracing::warn!(project = %project.name, error = %err, "skipping project in task instance listing");
                    }
                }
            }
            (total_list, total)
        }
    };

    Ok(Json(InstancePage {
        total_list,
        total,
        current_page: query.page_no,
        page_size: query.page_size,
    }))
}

/// GET /api/workflow/instances/:projectCode/:instanceId/tasks - Task list of
/// one workflow instance (passthrough).
pub async fn instance_tasks(
    State(state): State<AppState>,
    Path((project_code, instance_id)): Path<(i64, i64)>,
) -> Result<Json<Value>, AppError> {
    let cancel = CancellationToken::new();
    let tasks = state
        .ds
        .instance_tasks(project_code, instance_id, &cancel)
        .await?;
    Ok(Json(tasks))
}

fn default_log_limit() -> i64 {
    1000
}

#[derive(Debug, Deserialize)]
pub struct TaskLogQuery {
    #[serde(rename = "taskInstanceId")]
    task_instance_id: i64,
    #[serde(rename = "skipLineNum", default)]
    skip_line_num: i64,
    #[serde(default = "default_log_limit")]
    limit: i64,
}

/// GET /api/task/log - Task log excerpt (passthrough).
pub async fn task_log(
    State(state): State<AppState>,
    Query(query): Query<TaskLogQuery>,
) -> Result<Json<Value>, AppError> {
    let cancel = CancellationToken::new();
    let log = state
        .ds
        .task_log(query.task_instance_id, query.skip_line_num, query.limit, &cancel)
        .await?;
    Ok(Json(log))
}

#[derive(Debug, Deserialize)]
pub struct StateCountQuery {
    #[serde(rename = "startDate")]
    start_date: Option<String>,
    #[serde(rename = "endDate")]
    end_date: Option<String>,
}

/// GET /api/dashboard/state-counts - Instance counts per state from the
/// upstream analysis endpoints, verbatim.
pub async fn state_counts(
    State(state): State<AppState>,
    Query(query): Query<StateCountQuery>,
) -> Result<Json<Value>, AppError> {
    let cancel = CancellationToken::new();
    let (process, task) = tokio::join!(
        state
            .ds
            .process_state_count(query.start_date.as_deref(), query.end_date.as_deref(), &cancel),
        state
            .ds
            .task_state_count(query.start_date.as_deref(), query.end_date.as_deref(), &cancel),
    );

    Ok(Json(json!({
        "processStateCount": process?,
        "taskStateCount": task?,
    })))
}
