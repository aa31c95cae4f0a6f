//! Workflow domain types.
//!
//! A workflow is a YAML definition stored as `<uuid>.yaml` in the git-backed
//! workflow repository, with a metadata row in the SQLite index. These types
//! cover the index record, the commit-store entries (history, deletions), the
//! list/detail projections served to the UI, and the shallow YAML document
//! parse used to extract identifying fields.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::upstream::ScheduleSpec;

// ---------------------------------------------------------------------------
// Index record
// ---------------------------------------------------------------------------

/// Metadata index row for a locally stored workflow.
///
/// The YAML content itself lives in the commit-graph store; this row carries
/// the stable identifier, the unique name, and display attributes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub uuid: Uuid,
    pub name: String,
    /// Commit hash last pushed to the upstream scheduler, if any.
    pub online_version: Option<String>,
    /// Serialized UI canvas layout.
    pub locations: Option<String>,
    /// Cached upstream project link.
    pub project_code: Option<i64>,
    pub project_name: Option<String>,
}

impl WorkflowRecord {
    /// Store filename for this workflow, `<uuid>.yaml`.
    pub fn filename(&self) -> String {
        format!("{}.yaml", self.uuid)
    }
}

// ---------------------------------------------------------------------------
// Commit-graph entries
// ---------------------------------------------------------------------------

/// How two commits relate in the commit graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitRelation {
    /// Same commit.
    Equal,
    /// The first commit is a descendant of the second.
    Ahead,
    /// The first commit is an ancestor of the second.
    Behind,
    /// Neither is an ancestor of the other.
    Diverged,
    /// One or both commits could not be resolved.
    Unknown,
}

/// Drift between a workflow's local head and its last online version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftState {
    Synced,
    Ahead,
    Behind,
    Diverged,
    /// Never pushed upstream (no online version recorded).
    Unsubmitted,
    Unknown,
}

impl From<CommitRelation> for DriftState {
    fn from(rel: CommitRelation) -> Self {
        match rel {
            CommitRelation::Equal => DriftState::Synced,
            CommitRelation::Ahead => DriftState::Ahead,
            CommitRelation::Behind => DriftState::Behind,
            CommitRelation::Diverged => DriftState::Diverged,
            CommitRelation::Unknown => DriftState::Unknown,
        }
    }
}

/// One commit touching a workflow file, newest first in history listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitEntry {
    pub hash: String,
    pub author: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
    pub message: String,
}

/// A workflow file whose most recent change is a deletion commit.
///
/// `name` is parsed from the `Delete workflow: ` commit message prefix when
/// present, otherwise from the YAML content at the deletion commit's parent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedWorkflow {
    pub filename: String,
    pub commit_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub author: String,
    /// Unix timestamp in seconds of the deletion commit.
    pub timestamp: i64,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Store requests and projections
// ---------------------------------------------------------------------------

/// Request body for saving a workflow YAML definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveWorkflowRequest {
    pub name: String,
    pub content: String,
    /// Absent on create; present on update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Uuid>,
    /// Pre-migration filename to replace, when it differs from `<uuid>.yaml`.
    #[serde(
        rename = "originalFilename",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locations: Option<String>,
}

/// Result of a save: where the file landed and under which identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveWorkflowOutcome {
    pub filename: String,
    pub uuid: Uuid,
}

/// Full detail for one workflow, including its raw YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDetails {
    pub name: String,
    pub uuid: Uuid,
    pub filename: String,
    pub yaml_content: String,
}

/// One entry in the local workflow listing.
///
/// Field names follow the UI contract: camelCase display attributes alongside
/// the snake_case `local_status` drift marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalWorkflow {
    pub name: String,
    pub uuid: Uuid,
    /// Store filename, doubles as the UI's `code` column.
    pub code: String,
    #[serde(rename = "projectName")]
    pub project_name: String,
    #[serde(rename = "releaseState")]
    pub release_state: String,
    /// File modification time in milliseconds since the epoch.
    #[serde(rename = "updateTime")]
    pub update_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<serde_json::Value>,
    pub local_status: DriftState,
    #[serde(rename = "isLocal")]
    pub is_local: bool,
}

// ---------------------------------------------------------------------------
// Shallow YAML document
// ---------------------------------------------------------------------------

/// Shallow parse of a workflow YAML definition.
///
/// Only the identifying fields under the top-level `workflow:` mapping are
/// extracted; the task graph itself is never interpreted by the console.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowDoc {
    #[serde(default)]
    pub workflow: WorkflowMeta,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub schedule: Option<serde_yaml_ng::Value>,
    #[serde(default)]
    pub project: Option<String>,
}

impl WorkflowDoc {
    /// Parse a YAML definition, returning `None` when the document is not
    /// valid YAML or not a mapping. Callers treat unparseable content as a
    /// definition without identifying fields.
    pub fn parse(content: &str) -> Option<Self> {
        serde_yaml_ng::from_str(content).ok()
    }

    /// The declared workflow name, if any.
    pub fn name(&self) -> Option<&str> {
        self.workflow.name.as_deref()
    }

    /// The schedule field converted to JSON for downstream projections.
    pub fn schedule_json(&self) -> Option<serde_json::Value> {
        let value = self.workflow.schedule.as_ref()?;
        serde_json::to_value(value).ok().filter(|v| !v.is_null())
    }

    /// The schedule field lifted into the upstream schedule shape.
    ///
    /// A mapping deserializes field-for-field; a bare scalar becomes the
    /// crontab expression.
    pub fn schedule_spec(&self) -> Option<ScheduleSpec> {
        match self.schedule_json()? {
            serde_json::Value::String(crontab) => Some(ScheduleSpec {
                start_time: None,
                end_time: None,
                crontab,
                timezone_id: None,
            }),
            mapping @ serde_json::Value::Object(_) => serde_json::from_value(mapping).ok(),
            _ => None,
        }
    }
}

/// Normalize a schedule value to its display text.
///
/// A mapping contributes its `crontab` field; a scalar is used as-is.
pub fn schedule_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Object(map) => map.get("crontab").and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
