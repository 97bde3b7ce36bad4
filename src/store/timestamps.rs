//! Rewrites provider timestamp encodings into the string forms the model
//! deserializes: RFC 3339 for audit stamps, `YYYY-MM-DD` for civil dates.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

const AUDIT_FIELDS: [&str; 3] = ["createdAt", "modifiedAt", "updatedAt"];
const DATE_FIELDS: [&str; 4] = ["startDate", "finishDate", "dueDate", "completionDate"];

pub fn normalize_record(record: &mut Value) {
    let Some(object) = record.as_object_mut() else {
        return;
    };
    normalize_object(object);

    if let Some(Value::Array(tasks)) = object.get_mut("toDos") {
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            normalize_object(task);
        }
    }
}

fn normalize_object(object: &mut Map<String, Value>) {
    for field in AUDIT_FIELDS {
        if let Some(value) = object.get_mut(field) {
            if let Some(instant) = instant_of(value) {
                *value = Value::String(instant.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
        }
    }

    for field in DATE_FIELDS {
        if let Some(value) = object.get_mut(field) {
            if let Some(date) = civil_date_of(value) {
                *value = Value::String(date);
            }
        }
    }
}

fn instant_of(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(number) => DateTime::from_timestamp_millis(number.as_f64()? as i64),
        Value::Object(object) => {
            let seconds = object
                .get("seconds")
                .or_else(|| object.get("_seconds"))?
                .as_i64()?;
            let nanos = object
                .get("nanoseconds")
                .or_else(|| object.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

fn civil_date_of(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            // Full datetimes keep only their date part.
            let (date, _) = text.split_once('T')?;
            Some(date.to_string())
        }
        other => instant_of(other).map(|instant| instant.date_naive().to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn provider_objects_and_millis_become_rfc3339() {
        let mut record = json!({
            "createdAt": { "seconds": 1_704_067_200, "nanoseconds": 500 },
            "modifiedAt": { "_seconds": 1_704_153_600, "_nanoseconds": 0 },
            "updatedAt": 1_704_240_000_000_i64,
            "name": "Harbor Bridge",
        });
        normalize_record(&mut record);

        assert_eq!(record["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(record["modifiedAt"], "2024-01-02T00:00:00Z");
        assert_eq!(record["updatedAt"], "2024-01-03T00:00:00Z");
        assert_eq!(record["name"], "Harbor Bridge");
    }

    #[test]
    fn nested_tasks_and_dates_are_normalized() {
        let mut record = json!({
            "startDate": "2024-03-01T00:00:00.000Z",
            "toDos": [{
                "createdAt": { "seconds": 1_704_067_200 },
                "dueDate": { "seconds": 1_709_251_200, "nanoseconds": 0 },
                "startDate": "2024-02-20",
            }],
        });
        normalize_record(&mut record);

        assert_eq!(record["startDate"], "2024-03-01");
        let task = &record["toDos"][0];
        assert_eq!(task["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(task["dueDate"], "2024-03-01");
        assert_eq!(task["startDate"], "2024-02-20");
    }

    #[test]
    fn strings_and_unknown_shapes_are_left_alone() {
        let mut record = json!({
            "createdAt": "2024-01-01T00:00:00Z",
            "modifiedAt": { "when": "yesterday" },
        });
        let before = record.clone();
        normalize_record(&mut record);
        assert_eq!(record, before);
    }
}
