//! Combined workflow listing.
//!
//! Merges the local store listing with the upstream scheduler listing into
//! the single table the UI renders. Entries are keyed by workflow name:
//! a name present on both sides becomes one row that shows the upstream
//! attributes but keeps the local identity and drift marker.

use std::collections::{BTreeMap, BTreeSet};

use flowdeck_types::upstream::RemoteWorkflow;
use flowdeck_types::workflow::{LocalWorkflow, schedule_text};
use serde_json::{Map, Value};

fn into_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Merge local and remote listings into one name-sorted table.
///
/// Rules, in order:
/// - a name on both sides takes the remote row's attributes, with `uuid`,
///   `isLocal: true`, and `local_status` restored from the local row;
/// - a remote-only name keeps its listing as-is with `isLocal: false` and a
///   `ds-<projectCode>-<code>` identifier when no UUID was decorated;
/// - a local-only name is reported with `releaseState: "UNSUBMITTED"`;
/// - duplicate names within one side keep the first occurrence;
/// - `code` and `projectCode` are rendered as strings to match the local
///   rows;
/// - every row carries `schedule_text` and `schedule_human_readable` (null
///   when it has no schedule), leaving the raw `schedule` value untouched.
pub fn combined_view(local: &[LocalWorkflow], remote: &[RemoteWorkflow]) -> Vec<Value> {
    let mut entries: BTreeMap<String, Map<String, Value>> = BTreeMap::new();
    let mut remote_names: BTreeSet<String> = BTreeSet::new();

    for item in local {
        let Some(object) = serde_json::to_value(item).ok().and_then(into_object) else {
            continue;
        };
        entries.entry(item.name.clone()).or_insert(object);
    }

    for item in remote {
        if remote_names.contains(&item.name) {
            continue;
        }
        let Some(mut object) = serde_json::to_value(item).ok().and_then(into_object) else {
            continue;
        };
        object.insert("code".to_string(), Value::String(item.code.to_string()));
        if let Some(project_code) = item.project_code {
            object.insert(
                "projectCode".to_string(),
                Value::String(project_code.to_string()),
            );
        }
        match entries.get(&item.name) {
            Some(local_entry) => {
                object.insert(
                    "uuid".to_string(),
                    local_entry.get("uuid").cloned().unwrap_or(Value::Null),
                );
                object.insert("isLocal".to_string(), Value::Bool(true));
                object.insert(
                    "local_status".to_string(),
                    local_entry
                        .get("local_status")
                        .cloned()
                        .unwrap_or_else(|| Value::String("synced".to_string())),
                );
            }
            None => {
                let uuid = item.uuid.clone().unwrap_or_else(|| {
                    RemoteWorkflow::synthetic_uuid(
                        item.project_code.unwrap_or_default(),
                        item.code,
                    )
                });
                object.insert("uuid".to_string(), Value::String(uuid));
                object.insert("isLocal".to_string(), Value::Bool(false));
            }
        }
        entries.insert(item.name.clone(), object);
        remote_names.insert(item.name.clone());
    }

    for (name, entry) in entries.iter_mut() {
        if !remote_names.contains(name) {
            entry.insert(
                "releaseState".to_string(),
                Value::String("UNSUBMITTED".to_string()),
            );
        }
        let text = entry
            .get("schedule")
            .and_then(schedule_text)
            .map(Value::String)
            .unwrap_or(Value::Null);
        entry.insert("schedule_text".to_string(), text.clone());
        entry.insert("schedule_human_readable".to_string(), text);
    }

    entries.into_values().map(Value::Object).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
