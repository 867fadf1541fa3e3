//! JSON encoding of the task sequence.
//!
//! # Responsibility
//! - Encode/decode the persisted sequence (one JSON array under one key).
//! - Produce the pretty-printed export document.
//! - Parse and validate import payloads.
//!
//! # Invariants
//! - Decoding is per record: one damaged record never hides the others.
//! - Decoded collections have unique, non-blank ids; later duplicates and
//!   records without an id or a name are dropped and reported.
//! - Records with missing or foreign-typed fields decode with defaults and
//!   are counted as upgraded so the store can persist the repair.
//! - Import records must carry an identifying field and a non-blank name.

use crate::model::task::{
    now_epoch_ms, Optimize, Priority, Survey, Task, TaskId, TaskStatus,
};
use crate::repo::kv_repo::StorageResult;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Persisted record shape; every field is checked by hand so that older or
/// foreign-written data degrades field by field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTask {
    id: Option<Value>,
    name: Option<Value>,
    survey: Option<Value>,
    priority: Option<Value>,
    optimize: Option<Value>,
    status: Option<Value>,
    demo: Option<Value>,
    group: Option<Value>,
    created_at: Option<Value>,
    updated_at: Option<Value>,
}

impl StoredTask {
    fn into_task(self, now: i64) -> Result<(Task, bool), String> {
        let id = stored_id(self.id).ok_or_else(|| "missing id".to_string())?;
        let name = match self.name {
            Some(Value::String(name)) => name,
            _ => return Err("missing name".to_string()),
        };

        let mut upgraded = false;
        let created_at = stored_timestamp(self.created_at, &mut upgraded).unwrap_or(now);
        let mut updated_at = stored_timestamp(self.updated_at, &mut upgraded).unwrap_or(created_at);
        if updated_at < created_at {
            updated_at = created_at;
            upgraded = true;
        }

        let task = Task {
            id,
            name,
            survey: lenient(self.survey, &mut upgraded),
            priority: lenient(self.priority, &mut upgraded),
            optimize: defaulted(self.optimize, &mut upgraded),
            status: defaulted(self.status, &mut upgraded),
            demo: matches!(self.demo, Some(Value::Bool(true))),
            group: match self.group {
                Some(Value::String(group)) => Some(group),
                _ => None,
            },
            created_at,
            updated_at,
        };
        task.validate().map_err(|err| err.to_string())?;
        Ok((task, upgraded))
    }
}

fn stored_id(value: Option<Value>) -> Option<TaskId> {
    match value? {
        Value::String(id) => TaskId::parse(id).ok(),
        Value::Number(id) => TaskId::parse(id.to_string()).ok(),
        _ => None,
    }
}

/// Optional enum field: absent or null stays `None`; an unknown value is
/// cleared and flags the record as upgraded.
fn lenient<T: DeserializeOwned>(value: Option<Value>, upgraded: &mut bool) -> Option<T> {
    match value {
        None | Some(Value::Null) => None,
        Some(value) => {
            let parsed = serde_json::from_value(value).ok();
            *upgraded |= parsed.is_none();
            parsed
        }
    }
}

/// Required enum field: anything but a known value takes the default.
fn defaulted<T: DeserializeOwned + Default>(value: Option<Value>, upgraded: &mut bool) -> T {
    let parsed = lenient(value, upgraded);
    *upgraded |= parsed.is_none();
    parsed.unwrap_or_default()
}

/// Epoch milliseconds, or an RFC 3339 / numeric string rewritten as one.
fn stored_timestamp(value: Option<Value>, upgraded: &mut bool) -> Option<i64> {
    let parsed = match value {
        Some(Value::Number(millis)) => millis
            .as_i64()
            .or_else(|| millis.as_f64().map(|millis| millis as i64)),
        Some(Value::String(text)) => {
            *upgraded = true;
            parse_text_timestamp(&text)
        }
        _ => None,
    };
    *upgraded |= parsed.is_none();
    parsed
}

fn parse_text_timestamp(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Ok(millis) = text.parse::<i64>() {
        return Some(millis);
    }
    let parsed = OffsetDateTime::parse(text, &Rfc3339).ok()?;
    i64::try_from(parsed.unix_timestamp_nanos() / 1_000_000).ok()
}

/// A persisted record that could not be repaired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRecord {
    pub index: usize,
    pub reason: String,
}

/// Result of decoding the persisted sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedTasks {
    pub tasks: Vec<Task>,
    /// Number of kept records that needed defaults filled in.
    pub upgraded: usize,
    pub dropped: Vec<DroppedRecord>,
}

/// Encodes the sequence for durable storage (compact JSON array).
pub fn encode_tasks(tasks: &[Task]) -> StorageResult<String> {
    Ok(serde_json::to_string(tasks)?)
}

/// Decodes the persisted sequence, preserving order.
///
/// # Errors
/// - `StorageError::Encoding` when the text is not a JSON array.
pub fn decode_tasks(text: &str) -> StorageResult<DecodedTasks> {
    let records: Vec<Value> = serde_json::from_str(text)?;
    let now = now_epoch_ms();
    let mut seen = HashSet::with_capacity(records.len());
    let mut decoded = DecodedTasks {
        tasks: Vec::with_capacity(records.len()),
        upgraded: 0,
        dropped: Vec::new(),
    };

    for (index, record) in records.into_iter().enumerate() {
        let stored = match record {
            Value::Object(fields) => stored_fields(fields),
            _ => Err("record is not an object".to_string()),
        };
        match stored.and_then(|stored| stored.into_task(now)) {
            Ok((task, _)) if seen.contains(&task.id) => decoded.dropped.push(DroppedRecord {
                index,
                reason: format!("duplicate task id `{}`", task.id),
            }),
            Ok((task, was_upgraded)) => {
                seen.insert(task.id.clone());
                if was_upgraded {
                    decoded.upgraded += 1;
                }
                decoded.tasks.push(task);
            }
            Err(reason) => decoded.dropped.push(DroppedRecord { index, reason }),
        }
    }

    Ok(decoded)
}

fn stored_fields(fields: Map<String, Value>) -> Result<StoredTask, String> {
    serde_json::from_value(Value::Object(fields)).map_err(|err| err.to_string())
}

/// Pretty-printed export document.
pub fn export_document(tasks: &[Task]) -> StorageResult<String> {
    Ok(serde_json::to_string_pretty(tasks)?)
}

/// Import payload validation errors.
#[derive(Debug)]
pub enum ImportError {
    /// Payload is not valid JSON.
    Syntax(serde_json::Error),
    /// Top-level JSON value is not an array.
    NotAnArray,
    /// Array element is not a JSON object.
    RecordNotObject { index: usize },
    /// Record has no usable identifying field.
    MissingId { index: usize },
    /// Record has no non-blank name.
    MissingName { index: usize },
    /// Record fields have unexpected types or unknown enum values.
    InvalidRecord { index: usize, message: String },
}

impl Display for ImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(err) => write!(f, "import is not valid JSON: {err}"),
            Self::NotAnArray => write!(f, "import must be a JSON array of tasks"),
            Self::RecordNotObject { index } => write!(f, "import record {index} is not an object"),
            Self::MissingId { index } => write!(f, "import record {index} has no id"),
            Self::MissingName { index } => write!(f, "import record {index} has no name"),
            Self::InvalidRecord { index, message } => {
                write!(f, "import record {index} is invalid: {message}")
            }
        }
    }
}

impl Error for ImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Syntax(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawImportRecord {
    id: Option<Value>,
    name: Option<String>,
    survey: Option<Survey>,
    priority: Option<Priority>,
    optimize: Option<Optimize>,
    status: Option<TaskStatus>,
    #[serde(default)]
    demo: bool,
}

/// One validated import record.
///
/// `source_id` is the id carried by the payload; it is informational only,
/// since every imported task receives a fresh id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRecord {
    pub source_id: String,
    pub name: String,
    pub survey: Option<Survey>,
    pub priority: Option<Priority>,
    pub optimize: Option<Optimize>,
    pub status: Option<TaskStatus>,
    pub demo: bool,
}

impl ImportRecord {
    /// Builds a task with a fresh id and fresh timestamps.
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.name, self.survey);
        task.priority = self.priority;
        task.optimize = self.optimize.unwrap_or_default();
        task.status = self.status.unwrap_or_default();
        task.demo = self.demo;
        task
    }
}

/// Parses and validates an import payload without touching any state.
pub fn parse_import(text: &str) -> Result<Vec<ImportRecord>, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(ImportError::Syntax)?;
    let Value::Array(items) = value else {
        return Err(ImportError::NotAnArray);
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| parse_import_record(index, item))
        .collect()
}

fn parse_import_record(index: usize, item: Value) -> Result<ImportRecord, ImportError> {
    if !item.is_object() {
        return Err(ImportError::RecordNotObject { index });
    }
    let raw: RawImportRecord =
        serde_json::from_value(item).map_err(|err| ImportError::InvalidRecord {
            index,
            message: err.to_string(),
        })?;

    let source_id = match raw.id {
        Some(Value::String(id)) if !id.trim().is_empty() => id,
        Some(Value::Number(id)) => id.to_string(),
        _ => return Err(ImportError::MissingId { index }),
    };
    let name = match raw.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => return Err(ImportError::MissingName { index }),
    };

    Ok(ImportRecord {
        source_id,
        name,
        survey: raw.survey,
        priority: raw.priority,
        optimize: raw.optimize,
        status: raw.status,
        demo: raw.demo,
    })
}

#[cfg(test)]
mod tests {
    use super::{decode_tasks, parse_import, ImportError};
    use crate::model::task::{Optimize, TaskStatus};
    use crate::repo::kv_repo::StorageError;

    #[test]
    fn decode_fills_defaults_and_counts_upgrades() {
        let decoded = decode_tasks(
            r#"[
                {"id":"a","name":"A","survey":"primary","createdAt":1,"updatedAt":2},
                {"id":"b","name":"B","optimize":"less","status":"doing","createdAt":1,"updatedAt":1}
            ]"#,
        )
        .unwrap();
        assert_eq!(decoded.upgraded, 1);
        assert_eq!(decoded.tasks[0].status, TaskStatus::Todo);
        assert_eq!(decoded.tasks[0].optimize, Optimize::More);
        assert_eq!(decoded.tasks[1].status, TaskStatus::Doing);
    }

    #[test]
    fn decode_drops_later_duplicates_and_unnamed_records() {
        let decoded = decode_tasks(
            r#"[{"id":"a","name":"A","status":"todo","optimize":"more","createdAt":1,"updatedAt":1},
                {"id":"a","name":"B","status":"todo","optimize":"more","createdAt":1,"updatedAt":1},
                {"id":"c","status":"todo"},
                "stray",
                {"id":" ","name":"blank id"}]"#,
        )
        .unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert_eq!(decoded.tasks[0].name, "A");
        let indices: Vec<usize> = decoded.dropped.iter().map(|dropped| dropped.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert!(decoded.dropped[0].reason.contains("duplicate"));
        assert_eq!(decoded.upgraded, 0);
    }

    #[test]
    fn decode_repairs_foreign_field_types() {
        let decoded = decode_tasks(
            r#"[{"id":42,"name":"iso","survey":"tertiary","optimize":"less","status":"done",
                 "createdAt":"2024-05-01T10:00:00.000Z","updatedAt":"1714557600500","demo":"yes"}]"#,
        )
        .unwrap();
        let task = &decoded.tasks[0];
        assert_eq!(task.id.as_str(), "42");
        assert_eq!(task.survey, None);
        assert_eq!(task.optimize, Optimize::Less);
        assert_eq!(task.status, TaskStatus::Done);
        assert_eq!(task.created_at, 1_714_557_600_000);
        assert_eq!(task.updated_at, 1_714_557_600_500);
        assert!(!task.demo);
        assert_eq!(decoded.upgraded, 1);
        assert!(decoded.dropped.is_empty());
    }

    #[test]
    fn decode_clamps_reversed_timestamps() {
        let decoded = decode_tasks(
            r#"[{"id":"a","name":"A","optimize":"more","status":"todo","createdAt":10,"updatedAt":5}]"#,
        )
        .unwrap();
        assert_eq!(decoded.tasks[0].updated_at, 10);
        assert_eq!(decoded.upgraded, 1);
    }

    #[test]
    fn decode_fails_only_when_text_is_not_an_array() {
        assert!(matches!(decode_tasks("{not json"), Err(StorageError::Encoding(_))));
        assert!(matches!(decode_tasks(r#"{"id":"a"}"#), Err(StorageError::Encoding(_))));
        let clean = decode_tasks("[]").unwrap();
        assert!(clean.tasks.is_empty() && clean.dropped.is_empty());
    }

    #[test]
    fn import_requires_id_and_name() {
        let err = parse_import(r#"[{"name":"no id"}]"#).unwrap_err();
        assert!(matches!(err, ImportError::MissingId { index: 0 }));

        let err = parse_import(r#"[{"id":"x","name":"ok"},{"id":"y","name":"  "}]"#).unwrap_err();
        assert!(matches!(err, ImportError::MissingName { index: 1 }));
    }

    #[test]
    fn import_accepts_numeric_ids_and_ignores_foreign_timestamps() {
        let records = parse_import(
            r#"[{"id":7,"name":"seven","createdAt":"2024-01-01T00:00:00.000Z","extra":true}]"#,
        )
        .unwrap();
        assert_eq!(records[0].source_id, "7");
    }

    #[test]
    fn import_rejects_unknown_enum_values_and_non_arrays() {
        let err = parse_import(r#"[{"id":"x","name":"n","status":"pending"}]"#).unwrap_err();
        assert!(matches!(err, ImportError::InvalidRecord { index: 0, .. }));
        assert!(matches!(parse_import("{}").unwrap_err(), ImportError::NotAnArray));
        assert!(matches!(parse_import("[1]").unwrap_err(), ImportError::RecordNotObject { index: 0 }));
        assert!(matches!(parse_import("not json").unwrap_err(), ImportError::Syntax(_)));
    }
}
