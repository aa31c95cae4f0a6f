//! Payload types for the upstream DolphinScheduler-compatible API.
//!
//! Every response arrives wrapped in the `{code, msg, data}` envelope; a
//! non-zero `code` is an application-level failure even on HTTP 200. Requests
//! are form-encoded, so the write-side payloads know how to render themselves
//! into string form fields. Fields the console does not interpret are carried
//! through untouched in `extra` maps.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::UpstreamError;

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Response envelope for every upstream scheduler API call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(deserialize = "T: serde::Deserialize<'de>"))]
pub struct DsEnvelope<T> {
    pub code: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> DsEnvelope<T> {
    /// Unwrap the envelope, mapping a non-zero `code` to an API error tagged
    /// with the operation name. `data` may legitimately be absent.
    pub fn ok(self, op: &str) -> Result<Option<T>, UpstreamError> {
        if self.code != 0 {
            return Err(UpstreamError::Api {
                op: op.to_string(),
                code: self.code,
                msg: self.msg.unwrap_or_default(),
            });
        }
        Ok(self.data)
    }

    /// Unwrap the envelope and require a `data` payload.
    pub fn require_data(self, op: &str) -> Result<T, UpstreamError> {
        let op_name = op.to_string();
        self.ok(op)?
            .ok_or_else(|| UpstreamError::Decode(format!("missing data in {op_name} response")))
    }
}

/// One page of a paged listing (`totalList` plus the total row count).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData<T> {
    #[serde(rename = "totalList", default = "Vec::new")]
    pub total_list: Vec<T>,
    #[serde(default)]
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// An upstream project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub code: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A workflow definition as known to the upstream scheduler.
///
/// `project_name` and `uuid` are not part of the wire format; the client
/// fills them in when flattening the per-project listings into one view.
/// The synthetic `uuid` is `ds-<projectCode>-<code>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteWorkflow {
    pub code: i64,
    pub name: String,
    #[serde(rename = "projectCode", default, skip_serializing_if = "Option::is_none")]
    pub project_code: Option<i64>,
    #[serde(rename = "releaseState", default, skip_serializing_if = "Option::is_none")]
    pub release_state: Option<String>,
    #[serde(rename = "projectName", default, skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteWorkflow {
    /// Whether the definition is currently released ONLINE.
    pub fn is_online(&self) -> bool {
        self.release_state.as_deref() == Some("ONLINE")
    }

    /// The synthetic identifier for a remote-only workflow.
    pub fn synthetic_uuid(project_code: i64, workflow_code: i64) -> String {
        format!("ds-{project_code}-{workflow_code}")
    }
}

/// An execution environment registered in the upstream scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub code: i64,
    pub name: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A schedule attached to an upstream workflow definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteSchedule {
    pub id: i64,
    #[serde(rename = "releaseState", default, skip_serializing_if = "Option::is_none")]
    pub release_state: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RemoteSchedule {
    pub fn is_online(&self) -> bool {
        self.release_state.as_deref() == Some("ONLINE")
    }
}

/// Release state transition target for a workflow definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    Online,
    Offline,
}

impl ReleaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseState::Online => "ONLINE",
            ReleaseState::Offline => "OFFLINE",
        }
    }
}

// ---------------------------------------------------------------------------
// Reconcile payload
// ---------------------------------------------------------------------------

/// Payload for reconciling a workflow definition to the upstream scheduler.
///
/// Built by the UI's YAML compiler; the console interprets only `name`,
/// `project`, `isNew`, `schedule`, and `taskDefinitionJson`. Everything else
/// is passed through to the upstream form encoding as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub name: String,
    /// Target project name; defaults to `default` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Set by the UI when the user explicitly created a new workflow; a name
    /// collision is then rejected instead of treated as an update.
    #[serde(rename = "isNew", default, skip_serializing_if = "Option::is_none")]
    pub is_new: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<ScheduleSpec>,
    #[serde(
        rename = "taskDefinitionJson",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub task_definition_json: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ReconcileRequest {
    /// The project name to reconcile into.
    pub fn project_name(&self) -> &str {
        self.project.as_deref().unwrap_or("default")
    }

    /// Whether the payload carries a non-empty task list. Definitions without
    /// tasks are upserted but never released ONLINE.
    pub fn has_tasks(&self) -> bool {
        match self.task_definition_json.as_deref().map(str::trim) {
            Some("") | Some("[]") | None => false,
            Some(_) => true,
        }
    }

    /// Render the payload as upstream form fields.
    ///
    /// `project`, `isNew`, and `schedule` are consumed by the reconcile flow
    /// itself and never sent; null passthrough values are dropped.
    pub fn to_form(&self) -> BTreeMap<String, String> {
        let mut form = BTreeMap::new();
        form.insert("name".to_string(), self.name.clone());
        if let Some(json) = &self.task_definition_json {
            form.insert("taskDefinitionJson".to_string(), json.clone());
        }
        for (key, value) in &self.extra {
            if value.is_null() {
                continue;
            }
            form.insert(key.clone(), form_value(value));
        }
        form
    }
}

/// Schedule definition in the shape the upstream scheduler expects as the
/// JSON-encoded `schedule` form field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(rename = "endTime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    pub crontab: String,
    #[serde(rename = "timezoneId", default, skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
}

impl ScheduleSpec {
    /// The JSON string sent as the `schedule` form field.
    pub fn to_form_value(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Outcome of a successful reconcile: where the definition now lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub project_code: i64,
    pub process_definition_code: i64,
}

// ---------------------------------------------------------------------------
// Execute payload
// ---------------------------------------------------------------------------

/// Request body for starting a workflow instance.
///
/// Carries either plain start-process semantics or a backfill window.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteRequest {
    #[serde(rename = "isBackfill", default)]
    pub is_backfill: bool,
    /// Backfill run mode: `parallel` or `serial`.
    #[serde(rename = "runMode", default, skip_serializing_if = "Option::is_none")]
    pub run_mode: Option<String>,
    /// Backfill execution order: `ASC` or `DESC` (case-insensitive).
    #[serde(rename = "runOrder", default, skip_serializing_if = "Option::is_none")]
    pub run_order: Option<String>,
    #[serde(rename = "startDate", default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Process definition version to run, when the UI pins one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Accumulated instance listing, either one project's page or the fan-out
/// across every project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstancePage {
    pub total_list: Vec<serde_json::Value>,
    pub total: i64,
    pub current_page: i64,
    pub page_size: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Render a passthrough JSON value as a form field: strings stay bare,
/// everything else is JSON-encoded.
pub fn form_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_nonzero_code_maps_to_api_error() {
        let envelope: DsEnvelope<serde_json::Value> = serde_json::from_value(json!({
            "code": 10018,
            "msg": "project already exists",
        }))
        .unwrap();

        let err = envelope.ok("createProject").unwrap_err();
        assert_eq!(
            err.to_string(),
            "DS API error (createProject): project already exists"
        );
    }

    #[test]
    fn test_envelope_success_without_data() {
        let envelope: DsEnvelope<serde_json::Value> =
            serde_json::from_value(json!({"code": 0, "msg": "success"})).unwrap();
        assert!(envelope.ok("releaseWorkflow").unwrap().is_none());
    }

    #[test]
    fn test_envelope_require_data_on_empty_success() {
        let envelope: DsEnvelope<Project> =
            serde_json::from_value(json!({"code": 0, "msg": "success"})).unwrap();
        let err = envelope.require_data("createProject").unwrap_err();
        assert!(err.to_string().contains("missing data"));
    }

    #[test]
    fn test_page_data_tolerates_missing_total_list() {
        let page: PageData<Project> = serde_json::from_value(json!({"total": 0})).unwrap();
        assert!(page.total_list.is_empty());
    }

    #[test]
    fn test_remote_workflow_decodes_listing_entry() {
        let workflow: RemoteWorkflow = serde_json::from_value(json!({
            "code": 14255907195776_i64,
            "name": "daily-etl",
            "projectCode": 13942964864352_i64,
            "releaseState": "ONLINE",
            "updateTime": "2024-05-01 10:00:00",
        }))
        .unwrap();

        assert_eq!(workflow.code, 14255907195776);
        assert!(workflow.is_online());
        assert_eq!(
            workflow.extra.get("updateTime"),
            Some(&json!("2024-05-01 10:00:00"))
        );
    }

    #[test]
    fn test_synthetic_uuid_format() {
        assert_eq!(RemoteWorkflow::synthetic_uuid(7, 42), "ds-7-42");
    }

    #[test]
    fn test_reconcile_request_strips_control_fields_from_form() {
        let request: ReconcileRequest = serde_json::from_value(json!({
            "name": "daily-etl",
            "project": "analytics",
            "isNew": true,
            "schedule": {"crontab": "0 0 2 * * ?"},
            "taskDefinitionJson": "[{\"code\":1}]",
            "taskRelationJson": "[]",
            "executionType": "PARALLEL",
            "description": null,
        }))
        .unwrap();

        let form = request.to_form();
        assert_eq!(form.get("name").map(String::as_str), Some("daily-etl"));
        assert_eq!(
            form.get("taskDefinitionJson").map(String::as_str),
            Some("[{\"code\":1}]")
        );
        assert_eq!(form.get("taskRelationJson").map(String::as_str), Some("[]"));
        assert_eq!(form.get("executionType").map(String::as_str), Some("PARALLEL"));
        assert!(!form.contains_key("project"));
        assert!(!form.contains_key("isNew"));
        assert!(!form.contains_key("schedule"));
        assert!(!form.contains_key("description"), "null values are dropped");
    }

    #[test]
    fn test_reconcile_request_passthrough_objects_are_json_encoded() {
        let request: ReconcileRequest = serde_json::from_value(json!({
            "name": "daily-etl",
            "locations": [{"taskCode": 1, "x": 10, "y": 20}],
        }))
        .unwrap();

        let form = request.to_form();
        assert_eq!(
            form.get("locations").map(String::as_str),
            Some("[{\"taskCode\":1,\"x\":10,\"y\":20}]")
        );
    }

    #[test]
    fn test_has_tasks_rejects_empty_task_list() {
        let mut request = ReconcileRequest {
            name: "daily-etl".to_string(),
            ..Default::default()
        };
        assert!(!request.has_tasks());

        request.task_definition_json = Some("[]".to_string());
        assert!(!request.has_tasks());

        request.task_definition_json = Some("  [] ".to_string());
        assert!(!request.has_tasks());

        request.task_definition_json = Some("[{\"code\":1}]".to_string());
        assert!(request.has_tasks());
    }

    #[test]
    fn test_project_name_defaults() {
        let request = ReconcileRequest::default();
        assert_eq!(request.project_name(), "default");
    }

    #[test]
    fn test_schedule_spec_form_value_uses_upstream_keys() {
        let spec = ScheduleSpec {
            start_time: Some("2024-01-01 00:00:00".to_string()),
            end_time: Some("2124-01-01 00:00:00".to_string()),
            crontab: "0 0 2 * * ?".to_string(),
            timezone_id: Some("UTC".to_string()),
        };
        let value: serde_json::Value = serde_json::from_str(&spec.to_form_value()).unwrap();
        assert_eq!(value["startTime"], "2024-01-01 00:00:00");
        assert_eq!(value["endTime"], "2124-01-01 00:00:00");
        assert_eq!(value["crontab"], "0 0 2 * * ?");
        assert_eq!(value["timezoneId"], "UTC");
    }

    #[test]
    fn test_reconcile_outcome_wire_keys() {
        let outcome = ReconcileOutcome {
            project_code: 7,
            process_definition_code: 42,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["projectCode"], 7);
        assert_eq!(value["processDefinitionCode"], 42);
    }

    #[test]
    fn test_form_value_rendering() {
        assert_eq!(form_value(&json!("plain")), "plain");
        assert_eq!(form_value(&json!(42)), "42");
        assert_eq!(form_value(&json!(true)), "true");
        assert_eq!(form_value(&json!({"a": 1})), "{\"a\":1}");
    }
}
