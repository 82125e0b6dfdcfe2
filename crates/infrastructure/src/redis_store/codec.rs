//! Conversion between domain models and Redis hash fields.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use fastgets_core::models::{ScriptLog, Task, TaskState, Traceback};
use fastgets_core::{FastgetsError, FastgetsResult};

pub fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_time(value: &str) -> FastgetsResult<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)?.with_timezone(&Utc))
}

/// Sorted-set score for a task. Microsecond epoch values stay exact in an f64.
pub fn queue_score(time: &DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64
}

pub fn encode_task(task: &Task) -> FastgetsResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("id", task.id.clone()),
        ("job_name", task.job_name.clone()),
        ("state", task.state.as_str().to_string()),
        ("fingerprint", task.fingerprint.clone()),
        ("enqueued_at", encode_time(&task.enqueued_at)),
        ("payload", serde_json::to_string(&task.payload)?),
    ];
    if let Some(origin) = &task.origin_instance {
        fields.push(("origin_instance", origin.clone()));
    }
    if let Some(instance) = &task.instance_id {
        fields.push(("instance_id", instance.clone()));
    }
    if let Some(started_at) = &task.started_at {
        fields.push(("started_at", encode_time(started_at)));
    }
    if let Some(finished_at) = &task.finished_at {
        fields.push(("finished_at", encode_time(finished_at)));
    }
    if let Some(result) = &task.result {
        fields.push(("result", serde_json::to_string(result)?));
    }
    if let Some(traceback) = &task.traceback {
        fields.push(("traceback", serde_json::to_string(traceback)?));
    }
    Ok(fields)
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> FastgetsResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| FastgetsError::Serialization(format!("missing field '{name}'")))
}

pub fn decode_task(fields: &HashMap<String, String>) -> FastgetsResult<Task> {
    let state = required(fields, "state")?
        .parse::<TaskState>()
        .map_err(FastgetsError::Serialization)?;

    Ok(Task {
        id: required(fields, "id")?.to_string(),
        job_name: required(fields, "job_name")?.to_string(),
        origin_instance: fields.get("origin_instance").cloned(),
        instance_id: fields.get("instance_id").cloned(),
        state,
        fingerprint: required(fields, "fingerprint")?.to_string(),
        enqueued_at: decode_time(required(fields, "enqueued_at")?)?,
        started_at: fields.get("started_at").map(|v| decode_time(v)).transpose()?,
        finished_at: fields.get("finished_at").map(|v| decode_time(v)).transpose()?,
        payload: serde_json::from_str(required(fields, "payload")?)?,
        result: fields
            .get("result")
            .map(|v| serde_json::from_str(v))
            .transpose()?,
        traceback: fields
            .get("traceback")
            .map(|v| serde_json::from_str::<Traceback>(v))
            .transpose()?,
    })
}

pub fn encode_script_log(log: &ScriptLog) -> FastgetsResult<Vec<(&'static str, String)>> {
    let mut fields = vec![
        ("id", log.id.clone()),
        ("name", log.name.clone()),
        ("start_at", encode_time(&log.start_at)),
    ];
    if let Some(end_at) = &log.end_at {
        fields.push(("end_at", encode_time(end_at)));
    }
    if let Some(traceback) = &log.traceback {
        fields.push(("traceback", serde_json::to_string(traceback)?));
    }
    Ok(fields)
}

pub fn decode_script_log(fields: &HashMap<String, String>) -> FastgetsResult<ScriptLog> {
    Ok(ScriptLog {
        id: required(fields, "id")?.to_string(),
        name: required(fields, "name")?.to_string(),
        start_at: decode_time(required(fields, "start_at")?)?,
        end_at: fields.get("end_at").map(|v| decode_time(v)).transpose()?,
        traceback: fields
            .get("traceback")
            .map(|v| serde_json::from_str::<Traceback>(v))
            .transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fastgets_core::models::timestamp_now;
    use serde_json::json;

    fn as_map(fields: Vec<(&'static str, String)>) -> HashMap<String, String> {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    #[test]
    fn finished_task_survives_hash_encoding() {
        let mut task = Task::new("crawl", json!({"url": "https://a"}), "ff00", None);
        task.state = TaskState::Failed;
        task.instance_id = Some("w1".to_string());
        task.started_at = Some(timestamp_now());
        task.finished_at = Some(timestamp_now());
        task.traceback = Some(Traceback::new(vec!["boom".to_string()]));

        let decoded = decode_task(&as_map(encode_task(&task).unwrap())).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn missing_required_field_is_a_serialization_error() {
        let mut fields = as_map(encode_task(&Task::new("a", json!({}), "x", None)).unwrap());
        fields.remove("payload");
        assert!(matches!(
            decode_task(&fields),
            Err(FastgetsError::Serialization(_))
        ));
    }

    #[test]
    fn score_preserves_microsecond_order() {
        let earlier = timestamp_now();
        let later = earlier + chrono::Duration::microseconds(1);
        assert!(queue_score(&earlier) < queue_score(&later));
    }
}
