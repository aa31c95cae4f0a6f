//! Start-instance form translation.
//!
//! The upstream start endpoint takes a flat x-www-form-urlencoded body with
//! enumerated values. This module is the single place that maps an
//! [`ExecuteRequest`] (plain run or backfill window) onto those fields.

use std::collections::BTreeMap;

use flowdeck_types::upstream::ExecuteRequest;

/// Render the form fields for `POST /projects/{p}/executors/start-process-instance`.
///
/// A backfill request becomes `execType=COMPLEMENT_DATA` with a JSON
/// `scheduleTime` window; anything else is a plain `START_PROCESS` with an
/// empty `scheduleTime`. `runMode` stays serial unless the backfill asks for
/// `parallel`, and `runOrder` defaults to descending.
pub fn build_start_form(
    workflow_code: i64,
    environment_code: i64,
    request: &ExecuteRequest,
) -> BTreeMap<String, String> {
    let mut form = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        form.insert(key.to_string(), value);
    };

    put("processDefinitionCode", workflow_code.to_string());
    put("failureStrategy", "CONTINUE".to_string());
    put("warningType", "NONE".to_string());
    put("warningGroupId", String::new());
    put("startNodeList", String::new());
    put("taskDependType", "TASK_POST".to_string());
    put("complementDependentMode", "OFF_MODE".to_string());
    put("processInstancePriority", "MEDIUM".to_string());
    put("workerGroup", "default".to_string());
    put("tenantCode", "default".to_string());
    put("environmentCode", environment_code.to_string());
    put("startParams", "[]".to_string());
    put("expectedParallelismNumber", "2".to_string());
    put("dryRun", "0".to_string());
    put("testFlag", "0".to_string());
    put("allLevelDependent", "false".to_string());
    if let Some(version) = request.version {
        put("version", version.to_string());
    }

    if request.is_backfill {
        put("execType", "COMPLEMENT_DATA".to_string());
        let run_mode = if request.run_mode.as_deref() == Some("parallel") {
            "RUN_MODE_PARALLEL"
        } else {
            "RUN_MODE_SERIAL"
        };
        put("runMode", run_mode.to_string());
        let order = if request
            .run_order
            .as_deref()
            .is_some_and(|o| o.eq_ignore_ascii_case("ASC"))
        {
            "ASC_ORDER"
        } else {
            "DESC_ORDER"
        };
        put("executionOrder", order.to_string());
        let window = serde_json::json!({
            "complementStartDate": request.start_date.clone().unwrap_or_default(),
            "complementEndDate": request.end_date.clone().unwrap_or_default(),
        });
        put("scheduleTime", window.to_string());
    } else {
        put("execType", "START_PROCESS".to_string());
        put("runMode", "RUN_MODE_SERIAL".to_string());
        put("executionOrder", "DESC_ORDER".to_string());
        put("scheduleTime", String::new());
    }

    form
}
