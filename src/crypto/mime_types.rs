//! Content types a secret's material can be requested in.

use crate::domain::{EncryptedDatum, Secret};
use crate::errors::{Result, StrongroomError};
use serde_json::{json, Value};

use crate::domain::Values;

/// Stored mime type → content type offered as the default representation
const CONTENT_TYPE_MAPPINGS: &[(&str, &str)] = &[
    ("text/plain", "text/plain"),
    ("application/aes", "application/aes"),
    ("application/aes-256-cbc", "application/aes"),
    ("application/aes-128-cbc", "application/aes"),
    ("application/octet-stream", "application/octet-stream"),
];

/// Strip parameters and case from a mime type, e.g. `Text/Plain; charset=utf-8` → `text/plain`
pub fn normalize_mime_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Default content type for material stored as `mime_type`
pub fn default_content_type(mime_type: &str) -> Option<&'static str> {
    let normalized = normalize_mime_type(mime_type);
    CONTENT_TYPE_MAPPINGS
        .iter()
        .find(|(stored, _)| *stored == normalized)
        .map(|(_, offered)| *offered)
}

/// The secret's fields plus a `content_types` entry derived from its data.
///
/// When several data carry a known mime type the last one wins.
pub fn augment_fields_with_content_types(
    secret: &Secret,
    encrypted_data: &[EncryptedDatum],
) -> Result<Values> {
    let mut fields = match serde_json::to_value(secret) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(StrongroomError::internal("Secret did not serialize to an object")),
        Err(e) => {
            return Err(StrongroomError::Serialization {
                source: e,
                context: "Failed to serialize secret fields".to_string(),
            })
        }
    };

    for datum in encrypted_data {
        if let Some(content_type) = datum.mime_type.as_deref().and_then(default_content_type) {
            fields.insert("content_types".to_string(), json!({ "default": content_type }));
        }
    }

    Ok(fields)
}
