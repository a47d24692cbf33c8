//! Field extraction helpers shared by the capability handlers. Errors are
//! plain strings in the exact wording recorded to the validation ledger.

use serde_json::Value;

pub fn require_u64(payload: &Value, field: &str) -> Result<u64, String> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(format!("{field} is required")),
        Some(value) => value
            .as_u64()
            .ok_or_else(|| format!("{field} must be a number")),
    }
}

pub fn require_str<'a>(payload: &'a Value, field: &str) -> Result<&'a str, String> {
    match payload.get(field) {
        None | Some(Value::Null) => Err(format!("{field} is required")),
        Some(value) => value
            .as_str()
            .ok_or_else(|| format!("{field} must be a string")),
    }
}

pub fn optional_str<'a>(payload: &'a Value, field: &str) -> Result<Option<&'a str>, String> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| format!("{field} must be a string")),
    }
}

pub fn optional_u64(payload: &Value, field: &str) -> Result<Option<u64>, String> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| format!("{field} must be a number")),
    }
}

/// Optional array of strings; a present non-array or non-string element is
/// an error.
pub fn optional_string_array(payload: &Value, field: &str) -> Result<Option<Vec<String>>, String> {
    match payload.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(text) => values.push(text.to_string()),
                    None => return Err(format!("{field} entries must be strings")),
                }
            }
            Ok(Some(values))
        }
        Some(_) => Err(format!("{field} field must be an array")),
    }
}
