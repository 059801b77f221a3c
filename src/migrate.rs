// src/migrate.rs
use crate::error::{StoreError, StoreResult};
use crate::models::Label;
use log;
use serde_json::Value;

pub const LABEL_SEPARATOR: char = ';';

/// Splits free label text such as `"work; urgent ; "` into labels.
/// Segments are trimmed and empty ones dropped; order is kept.
pub fn parse_labels(text: &str) -> Vec<Label> {
    text.split(LABEL_SEPARATOR)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
        .map(Label::new)
        .collect()
}

/// Rewrites a legacy string `labels` field of one stored record into an array
/// of `{ "text": ... }` objects. Returns `true` if the record was changed.
pub fn migrate_record(record: &mut Value) -> bool {
    let Some(fields) = record.as_object_mut() else {
        return false;
    };
    let legacy_text = match fields.get("labels") {
        Some(Value::String(text)) => text.clone(),
        _ => return false,
    };
    let labels: Vec<Value> = parse_labels(&legacy_text)
        .into_iter()
        .map(|label| serde_json::json!({ "text": label.text }))
        .collect();
    fields.insert("labels".to_string(), Value::Array(labels));
    true
}

/// Migrates every record of a stored snapshot in place.
/// Returns how many records were rewritten.
pub fn migrate_snapshot(snapshot: &mut Value) -> StoreResult<usize> {
    let records = snapshot.as_array_mut().ok_or_else(|| {
        let msg = "stored snapshot is not a JSON array".to_string();
        log::error!("migrate_snapshot: {}", msg);
        StoreError::FormatError(msg)
    })?;

    let migrated = records
        .iter_mut()
        .map(migrate_record)
        .filter(|changed| *changed)
        .count();
    if migrated > 0 {
        log::info!("Migrated {} record(s) from legacy label strings", migrated);
    }
    Ok(migrated)
}
