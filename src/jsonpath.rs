//! Minimal JSON path lookup
//!
//! Supports:
//! - object field access (`A.B`)
//! - array index access (`Sites.2.SiteDomain`)
//!
//! Does NOT support:
//! - Filters, wildcards, slices

use serde_json::Value;

/// A resolved path segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object field access
    Field(String),
    /// Array index access
    Index(usize),
}

/// Walk `segments` from `value`. `None` as soon as a segment does not exist.
///
/// A JSON `null` at the end of the path counts as present.
pub fn apply<'v>(value: &'v Value, segments: &[Segment]) -> Option<&'v Value> {
    let mut current = value;

    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.as_object()?.get(name)?,
            Segment::Index(idx) => current.as_array()?.get(*idx)?,
        };
    }

    Some(current)
}

/// Raw text of a JSON value, the way it is handed to convertors
///
/// Strings lose their quotes, `null` becomes the empty string, numbers keep
/// their literal text (`1.10`, `1e400`), everything else is compact JSON text.
pub fn raw_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Length of the array at `segments`; 0 when absent or not an array
pub fn array_len(value: &Value, segments: &[Segment]) -> usize {
    apply(value, segments)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}

/// Explode a raw string that is itself a JSON array into its elements' raw
/// texts. `None` when the string is not a JSON array.
pub fn explode_array(raw: &str) -> Option<Vec<String>> {
    if !raw.trim_start().starts_with('[') {
        return None;
    }
    let items: Vec<Value> = serde_json::from_str(raw).ok()?;
    Some(items.iter().map(raw_text).collect())
}
