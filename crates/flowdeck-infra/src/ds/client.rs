//! DsClient -- HTTP client for the DolphinScheduler-compatible API.
//!
//! Implements the `UpstreamScheduler` port plus the read-side passthrough
//! endpoints (instances, task logs, state counts). Every response arrives in
//! the `{code, msg, data}` envelope; requests are form-encoded and carry the
//! access token in the `token` header. All calls race against the caller's
//! cancellation token so a superseded operation stops at the next request
//! boundary.

use std::collections::BTreeMap;
use std::time::Duration;

use flowdeck_core::mirror::UpstreamScheduler;
use flowdeck_types::error::UpstreamError;
use flowdeck_types::upstream::{
    DsEnvelope, Environment, PageData, Project, ReleaseState, RemoteSchedule, RemoteWorkflow,
    ScheduleSpec,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// Page size used for upstream listings; the console never pages further.
const LIST_PAGE_SIZE: i64 = 1000;

/// Client for the upstream scheduler HTTP API.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct DsClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl DsClient {
    /// Create a new client against `base_url`, authenticating with `token`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode the response envelope.
    ///
    /// HTTP 404 maps to [`UpstreamError::NotFound`]; other non-success
    /// statuses become API errors tagged with `op`.
    async fn send<T: serde::de::DeserializeOwned>(
        &self,
        op: &str,
        request: reqwest::RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<DsEnvelope<T>, UpstreamError> {
        let request = request.header("token", &self.token);
        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(UpstreamError::Cancelled),
            result = request.send() => {
                result.map_err(|e| UpstreamError::Unavailable(e.to_string()))?
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(UpstreamError::NotFound);
        }
        let body = tokio::select! {
            _ = cancel.cancelled() => return Err(UpstreamError::Cancelled),
            result = response.text() => {
                result.map_err(|e| UpstreamError::Unavailable(e.to_string()))?
            }
        };
        if !status.is_success() {
            return Err(UpstreamError::Api {
                op: op.to_string(),
                code: i64::from(status.as_u16()),
                msg: format!("HTTP {status}: {body}"),
            });
        }

        serde_json::from_str(&body).map_err(|e| UpstreamError::Decode(format!("{op}: {e}")))
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        op: &str,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<DsEnvelope<T>, UpstreamError> {
        let request = self.client.get(self.url(path)).query(query);
        self.send(op, request, cancel).await
    }

    /// Detail record for one workflow definition, or `NotFound`.
    async fn workflow_detail(
        &self,
        project_code: i64,
        workflow_code: i64,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let path = format!("/projects/{project_code}/process-definition/{workflow_code}");
        let envelope: DsEnvelope<Value> = self.get("get workflow", &path, &[], cancel).await?;
        envelope.ok("get workflow")?.ok_or(UpstreamError::NotFound)
    }

    // -----------------------------------------------------------------------
    // Read-side passthrough
    // -----------------------------------------------------------------------

    /// One page of workflow instances for a project.
    pub async fn list_instances(
        &self,
        project_code: i64,
        query: &InstanceQuery,
        cancel: &CancellationToken,
    ) -> Result<PageData<Value>, UpstreamError> {
        let path = format!("/projects/{project_code}/process-instances");
        let envelope: DsEnvelope<PageData<Value>> = self
            .get("process-instances", &path, &query.to_params(), cancel)
            .await?;
        envelope.require_data("process-instances")
    }

    /// One page of task instances for a project.
    pub async fn list_task_instances(
        &self,
        project_code: i64,
        query: &InstanceQuery,
        cancel: &CancellationToken,
    ) -> Result<PageData<Value>, UpstreamError> {
        let path = format!("/projects/{project_code}/task-instances");
        let envelope: DsEnvelope<PageData<Value>> = self
            .get("task-instances", &path, &query.to_params(), cancel)
            .await?;
        envelope.require_data("task-instances")
    }

    /// Task list of one workflow instance.
    pub async fn instance_tasks(
        &self,
        project_code: i64,
        instance_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let path = format!("/projects/{project_code}/process-instances/{instance_id}/tasks");
        let envelope: DsEnvelope<Value> = self.get("instance tasks", &path, &[], cancel).await?;
        envelope.require_data("instance tasks")
    }

    /// A window of one task instance's log.
    pub async fn task_log(
        &self,
        task_instance_id: i64,
        skip_line_num: i64,
        limit: i64,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let query = [
            ("taskInstanceId", task_instance_id.to_string()),
            ("skipLineNum", skip_line_num.to_string()),
            ("limit", limit.to_string()),
        ];
        let envelope: DsEnvelope<Value> = self.get("task log", "/log/detail", &query, cancel).await?;
        Ok(envelope.ok("task log")?.unwrap_or(Value::Null))
    }

    /// Workflow instance counts per state across projects.
    pub async fn process_state_count(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let query = state_count_params(start_date, end_date);
        let envelope: DsEnvelope<Value> = self
            .get("process state count", "/projects/analysis/process-state-count", &query, cancel)
            .await?;
        Ok(envelope.ok("process state count")?.unwrap_or(Value::Null))
    }

    /// Task instance counts per state across projects.
    pub async fn task_state_count(
        &self,
        start_date: Option<&str>,
        end_date: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let query = state_count_params(start_date, end_date);
        let envelope: DsEnvelope<Value> = self
            .get("task state count", "/projects/analysis/task-state-count", &query, cancel)
            .await?;
        Ok(envelope.ok("task state count")?.unwrap_or(Value::Null))
    }
}

/// Query parameters shared by the instance listings.
#[derive(Debug, Clone, Default)]
pub struct InstanceQuery {
    pub page_no: i64,
    pub page_size: i64,
    pub state_type: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl InstanceQuery {
    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("pageNo", self.page_no.to_string()),
            ("pageSize", self.page_size.to_string()),
        ];
        if let Some(state) = &self.state_type {
            params.push(("stateType", state.clone()));
        }
        if let Some(start) = &self.start_time {
            params.push(("startDate", start.clone()));
        }
        if let Some(end) = &self.end_time {
            params.push(("endDate", end.clone()));
        }
        params
    }
}

fn state_count_params(
    start_date: Option<&str>,
    end_date: Option<&str>,
) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(start) = start_date {
        params.push(("startDate", start.to_string()));
    }
    if let Some(end) = end_date {
        params.push(("endDate", end.to_string()));
    }
    params
}

/// Fill in the listing fields the wire format lacks: owning project and the
/// synthetic identifier for remote-only workflows.
fn decorate(workflows: Vec<RemoteWorkflow>, project: &Project) -> Vec<RemoteWorkflow> {
    workflows
        .into_iter()
        .map(|mut workflow| {
            workflow.project_code = Some(project.code);
            workflow.project_name = Some(project.name.clone());
            workflow.uuid = Some(RemoteWorkflow::synthetic_uuid(project.code, workflow.code));
            workflow
        })
        .collect()
}

/// Default form fields for schedule creation.
fn schedule_form(
    workflow_code: i64,
    spec: &ScheduleSpec,
    environment_code: Option<i64>,
) -> BTreeMap<String, String> {
    let mut form = BTreeMap::new();
    form.insert("processDefinitionCode".to_string(), workflow_code.to_string());
    form.insert("schedule".to_string(), spec.to_form_value());
    form.insert("failureStrategy".to_string(), "CONTINUE".to_string());
    form.insert("warningType".to_string(), "NONE".to_string());
    form.insert("warningGroupId".to_string(), "0".to_string());
    form.insert("processInstancePriority".to_string(), "MEDIUM".to_string());
    form.insert("workerGroup".to_string(), "default".to_string());
    form.insert("tenantCode".to_string(), "default".to_string());
    if let Some(code) = environment_code {
        form.insert("environmentCode".to_string(), code.to_string());
    }
    form
}

fn page_params() -> Vec<(&'static str, String)> {
    vec![
        ("pageNo", "1".to_string()),
        ("pageSize", LIST_PAGE_SIZE.to_string()),
    ]
}

impl UpstreamScheduler for DsClient {
    async fn list_projects(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Project>, UpstreamError> {
        let envelope: DsEnvelope<PageData<Project>> = self
            .get("listing projects", "/projects", &page_params(), cancel)
            .await?;
        Ok(envelope.require_data("listing projects")?.total_list)
    }

    async fn create_project(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Project, UpstreamError> {
        let form = BTreeMap::from([
            ("projectName".to_string(), name.to_string()),
            ("description".to_string(), String::new()),
        ]);
        let request = self.client.post(self.url("/projects")).form(&form);
        let envelope: DsEnvelope<Project> = self.send("create project", request, cancel).await?;
        envelope.require_data("create project")
    }

    async fn list_workflows(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteWorkflow>, UpstreamError> {
        let projects = self.list_projects(cancel).await?;
        let mut all = Vec::new();
        for project in &projects {
            match self.list_workflows_by_project(project.code, cancel).await {
                Ok(workflows) => all.extend(decorate(workflows, project)),
                Err(UpstreamError::Cancelled) => return Err(UpstreamError::Cancelled),
                Err(err) => {
                    tracing::warn!(
                        project = %project.name,
                        error = %err,
                        "skipping project in workflow listing"
                    );
                }
            }
        }
        Ok(all)
    }

    async fn list_workflows_by_project(
        &self,
        project_code: i64,
        cancel: &CancellationToken,
    ) -> Result<Vec<RemoteWorkflow>, UpstreamError> {
        let path = format!("/projects/{project_code}/process-definition");
        let envelope: DsEnvelope<PageData<RemoteWorkflow>> = self
            .get("listing workflows", &path, &page_params(), cancel)
            .await?;
        Ok(envelope.require_data("listing workflows")?.total_list)
    }

    async fn set_release(
        &self,
        project_code: i64,
        workflow_code: i64,
        state: ReleaseState,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let path = format!("/projects/{project_code}/process-definition/{workflow_code}/release");
        let form = BTreeMap::from([("releaseState".to_string(), state.as_str().to_string())]);
        let request = self.client.post(self.url(&path)).form(&form);
        let envelope: DsEnvelope<Value> = self.send("release workflow", request, cancel).await?;
        envelope.ok("release workflow")?;
        Ok(())
    }

    async fn create_workflow(
        &self,
        project_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<i64, UpstreamError> {
        let path = format!("/projects/{project_code}/process-definition");
        let request = self.client.post(self.url(&path)).form(form);
        let envelope: DsEnvelope<Value> = self.send("create workflow", request, cancel).await?;
        let data = envelope.require_data("create workflow")?;
        data.get("code").and_then(Value::as_i64).ok_or_else(|| {
            UpstreamError::Decode("create workflow response did not contain a code".to_string())
        })
    }

    async fn update_workflow(
        &self,
        project_code: i64,
        workflow_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let path = format!("/projects/{project_code}/process-definition/{workflow_code}");
        let request = self.client.put(self.url(&path)).form(form);
        let envelope: DsEnvelope<Value> = self.send("update workflow", request, cancel).await?;
        envelope.ok("update workflow")?;
        Ok(())
    }

    async fn delete_workflow(
        &self,
        project_code: i64,
        workflow_code: i64,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let detail = match self.workflow_detail(project_code, workflow_code, cancel).await {
            Ok(detail) => detail,
            Err(UpstreamError::NotFound) => {
                tracing::warn!(
                    project_code,
                    workflow_code,
                    "workflow not found upstream, assuming already deleted"
                );
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        // An ONLINE definition cannot be deleted; take it offline first.
        let release_state = detail
            .pointer("/processDefinition/releaseState")
            .or_else(|| detail.get("releaseState"))
            .and_then(Value::as_str);
        if release_state == Some(ReleaseState::Online.as_str()) {
            self.set_release(project_code, workflow_code, ReleaseState::Offline, cancel)
                .await
                .map_err(|err| match err {
                    UpstreamError::Api { code, msg, .. } => UpstreamError::Api {
                        op: "set offline".to_string(),
                        code,
                        msg,
                    },
                    other => other,
                })?;
        }

        let path = format!("/projects/{project_code}/process-definition/{workflow_code}");
        let request = self.client.delete(self.url(&path));
        let envelope: DsEnvelope<Value> = self.send("delete workflow", request, cancel).await?;
        envelope.ok("delete workflow")?;
        Ok(())
    }

    async fn start_instance(
        &self,
        project_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<Value, UpstreamError> {
        let path = format!("/projects/{project_code}/executors/start-process-instance");
        let request = self.client.post(self.url(&path)).form(form);
        let envelope: DsEnvelope<Value> = self.send("execute", request, cancel).await?;
        Ok(envelope.ok("execute")?.unwrap_or(Value::Null))
    }

    async fn find_schedule(
        &self,
        project_code: i64,
        workflow_code: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteSchedule>, UpstreamError> {
        let path = format!("/projects/{project_code}/schedules");
        let mut query = page_params();
        query.push(("processDefinitionCode", workflow_code.to_string()));
        let envelope: DsEnvelope<PageData<RemoteSchedule>> =
            self.get("schedules", &path, &query, cancel).await?;
        Ok(envelope
            .require_data("schedules")?
            .total_list
            .into_iter()
            .next())
    }

    async fn create_schedule(
        &self,
        project_code: i64,
        workflow_code: i64,
        spec: &ScheduleSpec,
        environment_code: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<i64, UpstreamError> {
        let path = format!("/projects/{project_code}/schedules");
        let form = schedule_form(workflow_code, spec, environment_code);
        let request = self.client.post(self.url(&path)).form(&form);
        let envelope: DsEnvelope<Value> = self.send("create schedule", request, cancel).await?;
        let data = envelope.require_data("create schedule")?;
        // The endpoint has returned both the bare id and the full row.
        data.as_i64()
            .or_else(|| data.get("id").and_then(Value::as_i64))
            .ok_or_else(|| {
                UpstreamError::Decode("create schedule response did not contain an id".to_string())
            })
    }

    async fn online_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let path = format!("/projects/{project_code}/schedules/{schedule_id}/online");
        let request = self.client.post(self.url(&path));
        let envelope: DsEnvelope<Value> = self.send("online schedule", request, cancel).await?;
        envelope.ok("online schedule")?;
        Ok(())
    }

    async fn offline_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let path = format!("/projects/{project_code}/schedules/{schedule_id}/offline");
        let request = self.client.post(self.url(&path));
        let envelope: DsEnvelope<Value> = self.send("offline schedule", request, cancel).await?;
        envelope.ok("offline schedule")?;
        Ok(())
    }

    async fn delete_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        let path = format!("/projects/{project_code}/schedules/{schedule_id}");
        let request = self.client.delete(self.url(&path));
        let envelope: DsEnvelope<Value> = self.send("delete schedule", request, cancel).await?;
        envelope.ok("delete schedule")?;
        Ok(())
    }

    async fn list_environments(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<Environment>, UpstreamError> {
        let mut query = page_params();
        query.push(("searchVal", String::new()));
        let envelope: DsEnvelope<PageData<Environment>> = self
            .get("environments", "/environment/list-paging", &query, cancel)
            .await?;
        Ok(envelope.require_data("environments")?.total_list)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
