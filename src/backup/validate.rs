//! Structural gate over inbound backup payloads.
//!
//! Runs before any store mutation: a payload that fails here produces a 400
//! and leaves the target store untouched. Per-record problems are a separate
//! concern handled during reconciliation.

use serde_json::Value as JsonValue;

use crate::backup::{BackupDocument, BackupError, EntityKind};

/// Validate and decode an inbound payload into a [`BackupDocument`].
///
/// Checks, in order: the payload is present and non-null, it is a JSON
/// object, and it carries an object-valued `data` field. Unknown collection
/// names inside `data`/`statistics` are dropped with a warning rather than
/// rejecting the whole document, mirroring how older exports stay importable
/// after a kind is retired.
pub fn validate_payload(payload: Option<&JsonValue>) -> Result<BackupDocument, BackupError> {
    let value = match payload {
        Some(value) if !value.is_null() => value,
        _ => {
            return Err(BackupError::InvalidDocument(
                "no backup data provided".to_string(),
            ));
        }
    };

    let object = value.as_object().ok_or_else(|| {
        BackupError::InvalidDocument("backup payload must be a JSON object".to_string())
    })?;

    match object.get("data") {
        Some(data) if data.is_object() => {}
        _ => {
            return Err(BackupError::InvalidDocument(
                "backup payload must contain an object-valued 'data' field".to_string(),
            ));
        }
    }

    let mut pruned = value.clone();
    for field in ["data", "statistics"] {
        if let Some(map) = pruned.get_mut(field).and_then(JsonValue::as_object_mut) {
            map.retain(|key, _| {
                let known = EntityKind::from_wire(key).is_some();
                if !known {
                    log::warn!("ignoring unknown collection '{key}' in backup {field}");
                }
                known
            });
        }
    }

    serde_json::from_value(pruned)
        .map_err(|err| BackupError::InvalidDocument(format!("malformed backup document: {err}")))
}
