//! Source rows and cell helpers
//!
//! Rows are kept as ordered JSON maps so that any table shape can flow through the
//! encoder without a compile-time row type.

use serde_json::Value;

/// One source row: column name to cell value, in the table's column order.
pub type Row = serde_json::Map<String, Value>;

/// Whether a cell carries no value.
///
/// Missing cells, `null` and the empty string are absent. `0` and `false` are real values.
pub fn is_absent(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

/// Stringified form of a scalar cell, used as a dictionary key.
///
/// Returns `None` for absent cells. Integral floats drop the fraction (`10.0` is `"10"`), and
/// composite values are rendered as JSON text.
pub fn dictionary_key(value: Option<&Value>) -> Option<String> {
    if is_absent(value) {
        return None;
    }
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(float) if n.is_f64() => Some(float.to_string()),
            _ => Some(n.to_string()),
        },
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Text of a cell, empty when absent.
pub fn text(row: &Row, column: &str) -> String {
    dictionary_key(row.get(column)).unwrap_or_default()
}

/// Whether an `is_new` style flag column is set.
pub fn is_flagged(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "yes" | "y" | "true" | "1")
        }
        _ => false,
    }
}
