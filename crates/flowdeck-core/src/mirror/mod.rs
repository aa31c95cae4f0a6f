//! Upstream mirror: reconciling local workflows into the scheduler.
//!
//! [`UpstreamScheduler`] is the port over the scheduler's HTTP API;
//! [`MirrorService`] drives it through the reconcile, execute, and delete
//! flows. Every port method takes a cancellation token so a superseded
//! operation stops issuing calls promptly; the remote side effect of the
//! in-flight call may still land (at-least-once).

pub mod execute;
pub mod service;

use std::collections::BTreeMap;

use flowdeck_types::error::UpstreamError;
use flowdeck_types::upstream::{
    Environment, Project, ReleaseState, RemoteSchedule, RemoteWorkflow, ScheduleSpec,
};
use tokio_util::sync::CancellationToken;

pub use service::MirrorService;

/// Port over the upstream scheduler's workflow, project, schedule, and
/// environment APIs. Write payloads are pre-rendered form fields; the
/// implementation owns transport, auth, and envelope decoding.
pub trait UpstreamScheduler: Send + Sync {
    fn list_projects(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Project>, UpstreamError>> + Send;

    fn create_project(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Project, UpstreamError>> + Send;

    /// Every workflow definition across every project, decorated with its
    /// project name and synthetic `ds-` identifier. Projects that fail to
    /// list are skipped with a warning.
    fn list_workflows(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<RemoteWorkflow>, UpstreamError>> + Send;

    fn list_workflows_by_project(
        &self,
        project_code: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<RemoteWorkflow>, UpstreamError>> + Send;

    fn set_release(
        &self,
        project_code: i64,
        workflow_code: i64,
        state: ReleaseState,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    /// Create a definition; returns the assigned workflow code.
    fn create_workflow(
        &self,
        project_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<i64, UpstreamError>> + Send;

    fn update_workflow(
        &self,
        project_code: i64,
        workflow_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    /// Delete a definition. Idempotent: an absent definition is success,
    /// and an ONLINE definition is transitioned OFFLINE first.
    fn delete_workflow(
        &self,
        project_code: i64,
        workflow_code: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    /// Start an instance; returns the upstream `data` payload unchanged.
    fn start_instance(
        &self,
        project_code: i64,
        form: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, UpstreamError>> + Send;

    fn find_schedule(
        &self,
        project_code: i64,
        workflow_code: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Option<RemoteSchedule>, UpstreamError>> + Send;

    /// Create a schedule for a definition; returns the schedule id.
    fn create_schedule(
        &self,
        project_code: i64,
        workflow_code: i64,
        spec: &ScheduleSpec,
        environment_code: Option<i64>,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<i64, UpstreamError>> + Send;

    fn online_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    fn offline_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    fn delete_schedule(
        &self,
        project_code: i64,
        schedule_id: i64,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<(), UpstreamError>> + Send;

    fn list_environments(
        &self,
        cancel: &CancellationToken,
    ) -> impl std::future::Future<Output = Result<Vec<Environment>, UpstreamError>> + Send;
}
