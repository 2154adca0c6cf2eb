use super::ChainEvent;
use serde_json::Value;

pub const EXTRINSIC_FAILED: (&str, &str) = ("system", "ExtrinsicFailed");
pub const DATA_OBJECTS_UPLOADED: (&str, &str) = ("storage", "DataObjectsUploaded");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The extrinsic was included but its dispatch failed.
    ExtrinsicFailed,
    /// No event carrying a data object id was emitted.
    Missing(&'static str),
}

/// Finds the id of the data object created by an `updateVideo` call.
///
/// `DataObjectsUploaded` carries the list of new ids as its first argument;
/// the pipeline always uploads a single asset so the first id is the one.
pub fn created_data_object_id(events: &[ChainEvent]) -> Result<String, EventError> {
    let (section, method) = EXTRINSIC_FAILED;
    if events.iter().any(|e| e.is(section, method)) {
        return Err(EventError::ExtrinsicFailed);
    }

    let (section, method) = DATA_OBJECTS_UPLOADED;
    events
        .iter()
        .filter(|e| e.is(section, method))
        .find_map(|e| e.data.first().and_then(first_id))
        .ok_or(EventError::Missing("storage.DataObjectsUploaded"))
}

fn first_id(ids: &Value) -> Option<String> {
    match ids {
        Value::Array(items) => items.first().and_then(scalar_id),
        other => scalar_id(other),
    }
}

fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
