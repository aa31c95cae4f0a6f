//! Upstream mirror service.
//!
//! Drives the reconcile, execute, and delete flows against the
//! [`UpstreamScheduler`] port. Operations are keyed by workflow UUID: a new
//! operation for the same workflow cancels the one still in flight, so a
//! stale reconcile never finishes after a newer one started. The local store
//! is never touched from here; callers commit locally first and only record
//! upstream outcomes afterwards.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use flowdeck_types::error::UpstreamError;
use flowdeck_types::upstream::{
    ExecuteRequest, Project, ReconcileOutcome, ReconcileRequest, ReleaseState, RemoteWorkflow,
    ScheduleSpec,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::mirror::{UpstreamScheduler, execute::build_start_form};

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

/// Removes the registry entry when the operation ends, unless a newer
/// operation has already replaced it.
struct OperationGuard<'a> {
    operations: &'a DashMap<Uuid, InFlight>,
    uuid: Uuid,
    generation: u64,
    token: CancellationToken,
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        self.operations
            .remove_if(&self.uuid, |_, in_flight| {
                in_flight.generation == self.generation
            });
    }
}

/// Service reconciling local workflows into the upstream scheduler.
pub struct MirrorService<U: UpstreamScheduler> {
    upstream: U,
    operations: DashMap<Uuid, InFlight>,
    generation: AtomicU64,
}

impl<U: UpstreamScheduler> MirrorService<U> {
    pub fn new(upstream: U) -> Self {
        Self {
            upstream,
            operations: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Register an operation for `uuid`, cancelling any still in flight.
    fn begin(&self, uuid: Uuid) -> OperationGuard<'_> {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let replaced = self.operations.insert(
            uuid,
            InFlight {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = replaced {
            previous.token.cancel();
            tracing::debug!(%uuid, "superseded in-flight upstream operation");
        }
        OperationGuard {
            operations: &self.operations,
            uuid,
            generation,
            token,
        }
    }

    /// Reconcile on behalf of a local workflow; a newer call for the same
    /// UUID cancels this one.
    pub async fn reconcile_for(
        &self,
        uuid: Uuid,
        request: &ReconcileRequest,
    ) -> Result<ReconcileOutcome, UpstreamError> {
        let op = self.begin(uuid);
        let cancel = op.token.clone();
        self.reconcile_with(request, &cancel).await
    }

    /// Reconcile a UI-built payload not tied to a local record.
    pub async fn reconcile(
        &self,
        request: &ReconcileRequest,
    ) -> Result<ReconcileOutcome, UpstreamError> {
        let cancel = CancellationToken::new();
        self.reconcile_with(request, &cancel).await
    }

    async fn reconcile_with(
        &self,
        request: &ReconcileRequest,
        cancel: &CancellationToken,
    ) -> Result<ReconcileOutcome, UpstreamError> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(UpstreamError::PreconditionFailed(
                "Workflow name cannot be empty.".to_string(),
            ));
        }

        let project_code = self
            .find_or_create_project(request.project_name(), cancel)
            .await?;
        let existing = self.find_in_project(project_code, name, cancel).await?;

        if request.is_new == Some(true) && existing.is_some() {
            return Err(UpstreamError::DuplicateName(name.to_string()));
        }

        let form = request.to_form();
        let workflow_code = match &existing {
            Some(remote) => {
                // The upstream rejects updates to an ONLINE definition.
                if let Err(err) = self
                    .upstream
                    .set_release(project_code, remote.code, ReleaseState::Offline, cancel)
                    .await
                {
                    tracing::warn!(
                        workflow = name,
                        code = remote.code,
                        error = %err,
                        "could not take workflow offline before update"
                    );
                }
                self.upstream
                    .update_workflow(project_code, remote.code, &form, cancel)
                    .await?;
                remote.code
            }
            None => {
                self.upstream
                    .create_workflow(project_code, &form, cancel)
                    .await?
            }
        };

        // Definitions without tasks are upserted but never released.
        if request.has_tasks() {
            self.upstream
                .set_release(project_code, workflow_code, ReleaseState::Online, cancel)
                .await?;
        }

        self.replace_schedule(project_code, workflow_code, request.schedule.as_ref(), cancel)
            .await?;

        Ok(ReconcileOutcome {
            project_code,
            process_definition_code: workflow_code,
        })
    }

    async fn find_or_create_project(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<i64, UpstreamError> {
        let projects = self.upstream.list_projects(cancel).await?;
        if let Some(project) = projects.iter().find(|p| p.name == name) {
            return Ok(project.code);
        }
        let created = self.upstream.create_project(name, cancel).await?;
        tracing::info!(project = name, code = created.code, "created upstream project");
        Ok(created.code)
    }

    async fn find_in_project(
        &self,
        project_code: i64,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<RemoteWorkflow>, UpstreamError> {
        let workflows = self
            .upstream
            .list_workflows_by_project(project_code, cancel)
            .await?;
        Ok(workflows.into_iter().find(|w| w.name == name))
    }

    /// Drop any existing schedule and install the requested one.
    async fn replace_schedule(
        &self,
        project_code: i64,
        workflow_code: i64,
        spec: Option<&ScheduleSpec>,
        cancel: &CancellationToken,
    ) -> Result<(), UpstreamError> {
        if let Some(existing) = self
            .upstream
            .find_schedule(project_code, workflow_code, cancel)
            .await?
        {
            if existing.is_online() {
                if let Err(err) = self
                    .upstream
                    .offline_schedule(project_code, existing.id, cancel)
                    .await
                {
                    tracing::warn!(
                        schedule_id = existing.id,
                        error = %err,
                        "could not take schedule offline before delete"
                    );
                }
            }
            self.upstream
                .delete_schedule(project_code, existing.id, cancel)
                .await?;
        }

        let Some(spec) = spec else {
            return Ok(());
        };

        let environment_code = match self.default_environment(cancel).await {
            Ok(code) => code,
            Err(err) => {
                tracing::warn!(error = %err, "could not resolve environments for schedule");
                None
            }
        };
        let schedule_id = self
            .upstream
            .create_schedule(project_code, workflow_code, spec, environment_code, cancel)
            .await?;
        self.upstream
            .online_schedule(project_code, schedule_id, cancel)
            .await?;
        Ok(())
    }

    async fn default_environment(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<i64>, UpstreamError> {
        let environments = self.upstream.list_environments(cancel).await?;
        Ok(environments
            .into_iter()
            .find(|e| e.name == "default")
            .map(|e| e.code))
    }

    /// Start an instance of the remote workflow matching `name`.
    ///
    /// The remote copy is resolved by name across all projects, the
    /// `default` environment is required, and the translated form is posted
    /// to the start endpoint. Returns the upstream `data` payload.
    pub async fn execute(
        &self,
        uuid: Uuid,
        name: &str,
        request: &ExecuteRequest,
    ) -> Result<serde_json::Value, UpstreamError> {
        let op = self.begin(uuid);
        let cancel = op.token.clone();

        let workflows = self.upstream.list_workflows(&cancel).await?;
        let Some(remote) = workflows.into_iter().find(|w| w.name == name) else {
            return Err(UpstreamError::PreconditionFailed(
                "Could not find a corresponding online workflow in DolphinScheduler.".to_string(),
            ));
        };
        let project_code = remote.project_code.ok_or_else(|| {
            UpstreamError::Decode("remote workflow listing is missing projectCode".to_string())
        })?;

        let environment_code = self.default_environment(&cancel).await?.ok_or_else(|| {
            UpstreamError::PreconditionFailed(
                "A 'default' environment was not found in DolphinScheduler. Please create one."
                    .to_string(),
            )
        })?;

        let form = build_start_form(remote.code, environment_code, request);
        self.upstream
            .start_instance(project_code, &form, &cancel)
            .await
    }

    /// Delete a remote definition by its coordinates.
    pub async fn delete_remote(
        &self,
        project_code: i64,
        workflow_code: i64,
    ) -> Result<(), UpstreamError> {
        let cancel = CancellationToken::new();
        self.upstream
            .delete_workflow(project_code, workflow_code, &cancel)
            .await
    }

    /// Delete the remote definition matching `name`, if any. Returns whether
    /// a definition was found.
    pub async fn delete_remote_by_name(&self, name: &str) -> Result<bool, UpstreamError> {
        let cancel = CancellationToken::new();
        let workflows = self.upstream.list_workflows(&cancel).await?;
        let Some(remote) = workflows.into_iter().find(|w| w.name == name) else {
            return Ok(false);
        };
        let Some(project_code) = remote.project_code else {
            return Ok(false);
        };
        self.upstream
            .delete_workflow(project_code, remote.code, &cancel)
            .await?;
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
